//! Step model: declarative templates plus per-run state.
//!
//! A step owns its templates (constructed once from config) and the mutable
//! arrays written during execution. `requests`, `responses` and
//! `raw_results` are index-aligned: `responses[i]` answers `requests[i]`,
//! and a `None` response marks a request whose retries were exhausted.

use crate::config::StepConfig;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Key under which a step with no explicit key merges its results.
pub const DEFAULT_STEP_KEY: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    #[serde(alias = "get")]
    Get,
    #[serde(alias = "post")]
    Post,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BodyEncoding {
    #[default]
    #[serde(alias = "json")]
    Json,
    #[serde(alias = "form", alias = "formdata")]
    Form,
}

/// One concrete, fully rendered request descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestConfig {
    #[serde(default)]
    pub method: Method,
    #[serde(default)]
    pub body_encoding: BodyEncoding,
    #[serde(default)]
    pub url: Value,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub header: Value,
}

impl RequestConfig {
    /// The URL as a plain string, however the template rendered it.
    pub fn url_str(&self) -> String {
        match &self.url {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// A response as directives see it: status, headers, structured body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseData {
    pub status: u16,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Body parsed as JSON when possible, otherwise the raw text.
    #[serde(default)]
    pub data: Value,
}

impl ResponseData {
    /// The raw body text, for HTML selection.
    pub fn body_text(&self) -> String {
        match &self.data {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// One pipeline step. Serializes with camelCase keys so directive
/// arguments address fields the same way the config file spells them.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub key: String,
    pub url: Value,
    pub params: Value,
    pub data: Value,
    pub header: Value,
    pub method: Method,
    pub body_encoding: BodyEncoding,
    pub result_template: Value,
    pub merge_flattened: bool,
    pub requests: Vec<RequestConfig>,
    pub responses: Vec<Option<ResponseData>>,
    pub raw_results: Vec<Value>,
    pub results: Vec<Value>,
}

impl Step {
    pub fn from_config(config: StepConfig) -> Self {
        Self {
            key: config.key,
            url: config.url,
            params: config.params,
            data: config.data,
            header: config.header,
            method: config.method,
            body_encoding: config.body_encoding,
            result_template: config.result_template,
            merge_flattened: config.merge_flattened,
            requests: Vec::new(),
            responses: Vec::new(),
            raw_results: Vec::new(),
            results: Vec::new(),
        }
    }

    /// Whether this step merges into records directly instead of nesting
    /// under its key.
    pub fn is_default_key(&self) -> bool {
        self.key == DEFAULT_STEP_KEY
    }

    /// Clear every mutable run array. Templates are untouched.
    pub fn reset_run_state(&mut self) {
        self.requests.clear();
        self.responses.clear();
        self.raw_results.clear();
        self.results.clear();
    }

    /// The unrendered request template handed to the directive engine.
    pub(crate) fn request_template(&self) -> Value {
        json!({
            "method": self.method,
            "bodyEncoding": self.body_encoding,
            "url": self.url,
            "params": self.params,
            "data": self.data,
            "header": self.header,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_aliases() {
        assert_eq!(serde_json::from_str::<Method>(r#""GET""#).unwrap(), Method::Get);
        assert_eq!(serde_json::from_str::<Method>(r#""post""#).unwrap(), Method::Post);
    }

    #[test]
    fn test_body_encoding_aliases() {
        for raw in [r#""FORM""#, r#""form""#, r#""formdata""#] {
            assert_eq!(
                serde_json::from_str::<BodyEncoding>(raw).unwrap(),
                BodyEncoding::Form
            );
        }
        assert_eq!(
            serde_json::from_str::<BodyEncoding>(r#""JSON""#).unwrap(),
            BodyEncoding::Json
        );
    }

    #[test]
    fn test_step_serializes_camel_case() {
        let config: StepConfig = serde_json::from_value(json!({
            "key": "b",
            "url": "https://example.com",
            "resultTemplate": { "x": 1 }
        }))
        .unwrap();
        let step = Step::from_config(config);
        let value = serde_json::to_value(&step).unwrap();
        assert_eq!(value["resultTemplate"], json!({ "x": 1 }));
        assert_eq!(value["mergeFlattened"], json!(true));
        assert_eq!(value["rawResults"], json!([]));
    }

    #[test]
    fn test_reset_run_state_keeps_templates() {
        let config: StepConfig =
            serde_json::from_value(json!({ "url": "https://example.com" })).unwrap();
        let mut step = Step::from_config(config);
        step.results.push(json!({ "a": 1 }));
        step.raw_results.push(json!([]));
        step.reset_run_state();
        assert!(step.results.is_empty());
        assert!(step.raw_results.is_empty());
        assert_eq!(step.url, json!("https://example.com"));
    }
}
