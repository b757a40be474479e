//! Step execution: render, fan out, request loop, extraction.
//!
//! Requests run strictly one at a time. A failed request is retried
//! immediately up to `retry_count` extra times; when all attempts are
//! exhausted the response slot stays `None` and the step carries on.
//! Template errors, by contrast, propagate and abort the run.

use crate::config::Options;
use crate::directive::{DirectiveEngine, RenderContext};
use crate::error::{Error, Result};
use crate::events::{EventBus, PipelineEvent};
use crate::expand;
use crate::step::Step;
use crate::transport::Transport;
use serde_json::Value;
use std::time::Duration;

/// Render the step's request template, fan it out into concrete requests,
/// and issue them sequentially with retry and inter-request delay.
pub(crate) async fn execute_requests(
    step: &mut Step,
    ctx: &RenderContext,
    engine: &DirectiveEngine,
    transport: &dyn Transport,
    events: &EventBus,
    options: &Options,
) -> Result<()> {
    let rendered = engine.deep_transform(&step.request_template(), ctx)?;
    step.requests = expand::expand(&rendered)
        .into_iter()
        .map(|variant| serde_json::from_value(variant).map_err(Error::InvalidRequest))
        .collect::<Result<Vec<_>>>()?;
    step.responses = vec![None; step.requests.len()];

    let timeout = Duration::from_millis(options.timeout);
    for (index, request) in step.requests.iter().enumerate() {
        for attempt in 0..=options.retry_count {
            events.emit(&PipelineEvent::Request {
                index,
                attempt,
                config: request.clone(),
            });
            match transport.execute(request, timeout).await {
                Ok(response) => {
                    tracing::debug!(index, status = response.status, "request succeeded");
                    events.emit(&PipelineEvent::Response {
                        index,
                        response: response.clone(),
                    });
                    step.responses[index] = Some(response);
                    break;
                }
                Err(err) => {
                    tracing::warn!(index, attempt, %err, "request failed");
                    events.emit(&PipelineEvent::RequestError {
                        index,
                        attempt,
                        error: err.to_string(),
                    });
                }
            }
        }
        // Mandatory pause after every request, success or not.
        tokio::time::sleep(Duration::from_millis(options.delay)).await;
    }
    Ok(())
}

/// Render the result template against every stored response, fan each
/// render out, and derive the step's results.
pub(crate) fn extract_results(
    step: &mut Step,
    ctx: &RenderContext,
    engine: &DirectiveEngine,
) -> Result<Vec<Value>> {
    step.raw_results = Vec::with_capacity(step.responses.len());
    for response in &step.responses {
        let raw = match response {
            Some(response) => {
                let ctx = ctx.with_response(response)?;
                let rendered = engine.deep_transform(&step.result_template, &ctx)?;
                Value::Array(expand::expand(&rendered))
            }
            // Exhausted failure: the slot stays aligned but yields nothing.
            None => Value::Array(Vec::new()),
        };
        step.raw_results.push(raw);
    }

    step.results = if step.merge_flattened {
        flatten(&step.raw_results)
    } else {
        step.raw_results.clone()
    };
    Ok(step.results.clone())
}

/// Spread array entries, append everything else as-is.
pub(crate) fn flatten(raw_results: &[Value]) -> Vec<Value> {
    let mut out = Vec::new();
    for entry in raw_results {
        match entry {
            Value::Array(items) => out.extend(items.iter().cloned()),
            other => out.push(other.clone()),
        }
    }
    out
}
