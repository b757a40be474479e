//! HTTP transport seam.
//!
//! The pipeline talks to the network through the [`Transport`] trait and
//! never retries or delays in here — that policy lives in the executor.
//! [`HttpTransport`] is the reqwest-backed default; tests substitute their
//! own implementations.

use crate::error::{Error, Result};
use crate::step::{BodyEncoding, Method, RequestConfig, ResponseData};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// Issues one concrete request per call.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &RequestConfig, timeout: Duration) -> Result<ResponseData>;
}

/// Default transport over a shared `reqwest::Client`.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &RequestConfig, timeout: Duration) -> Result<ResponseData> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        };
        let mut builder = self
            .client
            .request(method, request.url_str())
            .timeout(timeout);

        if let Some(pairs) = scalar_pairs(&request.params) {
            if !pairs.is_empty() {
                builder = builder.query(&pairs);
            }
        }
        if let Some(pairs) = scalar_pairs(&request.header) {
            for (name, value) in &pairs {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }
        if request.method == Method::Post {
            // form() and json() set the matching content-type themselves.
            builder = match request.body_encoding {
                BodyEncoding::Form => {
                    builder.form(&scalar_pairs(&request.data).unwrap_or_default())
                }
                BodyEncoding::Json => builder.json(&request.data),
            };
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (name.to_string(), value.to_str().unwrap_or("").to_string())
            })
            .collect();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        let data = serde_json::from_str(&text).unwrap_or(Value::String(text));

        Ok(ResponseData {
            status,
            headers,
            data,
        })
    }
}

/// Flatten a top-level object of scalars into string pairs for query
/// strings, form bodies and headers. Null fields are dropped; non-objects
/// yield nothing.
fn scalar_pairs(value: &Value) -> Option<Vec<(String, String)>> {
    match value {
        Value::Object(map) => Some(
            map.iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| {
                    let text = match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (k.clone(), text)
                })
                .collect(),
        ),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_pairs_from_object() {
        let mut pairs = scalar_pairs(&json!({ "q": "rust", "page": 2, "skip": null })).unwrap();
        pairs.sort();
        assert_eq!(
            pairs,
            vec![("page".to_string(), "2".to_string()), ("q".to_string(), "rust".to_string())]
        );
    }

    #[test]
    fn test_scalar_pairs_from_non_object() {
        assert!(scalar_pairs(&Value::Null).is_none());
        assert!(scalar_pairs(&json!("text")).is_none());
    }
}
