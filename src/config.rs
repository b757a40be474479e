//! Pipeline configuration surface.
//!
//! Deserialized from the caller's JSON (or built in code). Field names are
//! camelCase on the wire; a handful of aliases accept the older spellings
//! (`errRetry`, `dataType`, `resultModel`, `isMergeResult`).

use crate::step::{BodyEncoding, Method, DEFAULT_STEP_KEY};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Open key/value bag readable by `v-meta` directives.
    #[serde(default)]
    pub meta: Map<String, Value>,
    #[serde(default)]
    pub options: Options,
    pub steps: Vec<StepConfig>,
}

/// Execution knobs shared by every step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Options {
    /// Pause between consecutive requests, in milliseconds.
    #[serde(default = "default_delay")]
    pub delay: u64,
    /// Additional attempts after a failed request.
    #[serde(default, alias = "errRetry")]
    pub retry_count: u32,
    /// Per-request transport timeout, in milliseconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            delay: default_delay(),
            retry_count: 0,
            timeout: default_timeout(),
        }
    }
}

fn default_delay() -> u64 {
    100
}

fn default_timeout() -> u64 {
    10_000
}

/// Declarative description of one step.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepConfig {
    /// Merge identity: `"default"` spreads result fields into the record,
    /// anything else nests the result under this key.
    #[serde(default = "default_key")]
    pub key: String,
    #[serde(default = "default_url")]
    pub url: Value,
    #[serde(default = "default_object")]
    pub params: Value,
    #[serde(default = "default_object")]
    pub data: Value,
    #[serde(default = "default_object")]
    pub header: Value,
    #[serde(default)]
    pub method: Method,
    #[serde(default, alias = "dataType")]
    pub body_encoding: BodyEncoding,
    /// Template rendered against each response to extract a record.
    #[serde(default = "default_object", alias = "resultModel")]
    pub result_template: Value,
    /// Flatten per-response result arrays into one sequence.
    #[serde(default = "default_true", alias = "isMergeResult")]
    pub merge_flattened: bool,
}

fn default_key() -> String {
    DEFAULT_STEP_KEY.to_string()
}

fn default_url() -> Value {
    Value::String(String::new())
}

fn default_object() -> Value {
    Value::Object(serde_json::Map::new())
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config: PipelineConfig = serde_json::from_value(json!({
            "steps": [ { "url": "https://example.com" } ]
        }))
        .unwrap();
        assert_eq!(config.options.delay, 100);
        assert_eq!(config.options.retry_count, 0);
        assert_eq!(config.options.timeout, 10_000);

        let step = &config.steps[0];
        assert_eq!(step.key, "default");
        assert_eq!(step.method, Method::Get);
        assert_eq!(step.body_encoding, BodyEncoding::Json);
        assert!(step.merge_flattened);
        assert_eq!(step.result_template, json!({}));
        assert_eq!(step.params, json!({}));
    }

    #[test]
    fn test_full_config() {
        let config: PipelineConfig = serde_json::from_value(json!({
            "meta": { "page": 1 },
            "options": { "delay": 0, "retryCount": 2, "timeout": 500 },
            "steps": [{
                "key": "detail",
                "method": "POST",
                "bodyEncoding": "FORM",
                "url": "https://example.com/search",
                "data": { "q": "{{v-meta=page}}" },
                "resultTemplate": { "title": "{{v-resp=data.title}}" },
                "mergeFlattened": false
            }]
        }))
        .unwrap();
        assert_eq!(config.meta["page"], json!(1));
        assert_eq!(config.options.retry_count, 2);
        let step = &config.steps[0];
        assert_eq!(step.key, "detail");
        assert_eq!(step.method, Method::Post);
        assert_eq!(step.body_encoding, BodyEncoding::Form);
        assert!(!step.merge_flattened);
    }

    #[test]
    fn test_legacy_aliases() {
        let config: PipelineConfig = serde_json::from_value(json!({
            "options": { "errRetry": 3 },
            "steps": [{
                "dataType": "formdata",
                "resultModel": { "x": 1 },
                "isMergeResult": false
            }]
        }))
        .unwrap();
        assert_eq!(config.options.retry_count, 3);
        assert_eq!(config.steps[0].body_encoding, BodyEncoding::Form);
        assert_eq!(config.steps[0].result_template, json!({ "x": 1 }));
        assert!(!config.steps[0].merge_flattened);
    }
}
