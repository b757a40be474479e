//! Synchronous registry for pipeline lifecycle hooks.
//!
//! Handlers run inline on the pipeline task, per event kind, in
//! registration order. Nothing executes concurrently with a handler, so a
//! handler that blocks indefinitely stalls the whole run.

use crate::error::Error;
use crate::step::{RequestConfig, ResponseData};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// The lifecycle hook points a pipeline exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Start,
    BeforeStep,
    AfterStep,
    End,
    Request,
    Response,
    RequestError,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Start => "start",
            EventKind::BeforeStep => "before-step",
            EventKind::AfterStep => "after-step",
            EventKind::End => "end",
            EventKind::Request => "request",
            EventKind::Response => "response",
            EventKind::RequestError => "request-error",
        };
        write!(f, "{name}")
    }
}

impl FromStr for EventKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(EventKind::Start),
            "before-step" => Ok(EventKind::BeforeStep),
            "after-step" => Ok(EventKind::AfterStep),
            "end" => Ok(EventKind::End),
            "request" => Ok(EventKind::Request),
            "response" => Ok(EventKind::Response),
            "request-error" => Ok(EventKind::RequestError),
            other => Err(Error::UnknownEvent(other.to_string())),
        }
    }
}

/// A lifecycle event with its payload.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// A run has started.
    Start,
    /// A step is about to execute.
    BeforeStep { index: usize, key: String },
    /// A step finished and the cursor advanced.
    AfterStep {
        index: usize,
        key: String,
        result_count: usize,
    },
    /// The run completed; carries the merged records.
    End { records: Vec<Value> },
    /// One request attempt is about to be issued.
    Request {
        index: usize,
        attempt: u32,
        config: RequestConfig,
    },
    /// A request attempt succeeded; carries the full response.
    Response { index: usize, response: ResponseData },
    /// A request attempt failed.
    RequestError {
        index: usize,
        attempt: u32,
        error: String,
    },
}

impl PipelineEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            PipelineEvent::Start => EventKind::Start,
            PipelineEvent::BeforeStep { .. } => EventKind::BeforeStep,
            PipelineEvent::AfterStep { .. } => EventKind::AfterStep,
            PipelineEvent::End { .. } => EventKind::End,
            PipelineEvent::Request { .. } => EventKind::Request,
            PipelineEvent::Response { .. } => EventKind::Response,
            PipelineEvent::RequestError { .. } => EventKind::RequestError,
        }
    }
}

type Handler = Box<dyn Fn(&PipelineEvent) + Send + Sync>;

/// Plain synchronous callback registry, one handler list per event kind.
#[derive(Default)]
pub struct EventBus {
    handlers: HashMap<EventKind, Vec<Handler>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one event kind. Handlers for the same kind
    /// fire in registration order.
    pub fn on<F>(&mut self, kind: EventKind, handler: F)
    where
        F: Fn(&PipelineEvent) + Send + Sync + 'static,
    {
        self.handlers.entry(kind).or_default().push(Box::new(handler));
    }

    /// Invoke every handler registered for the event's kind.
    pub fn emit(&self, event: &PipelineEvent) {
        if let Some(handlers) = self.handlers.get(&event.kind()) {
            for handler in handlers {
                handler(event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_kind_name_round_trip() {
        for kind in [
            EventKind::Start,
            EventKind::BeforeStep,
            EventKind::AfterStep,
            EventKind::End,
            EventKind::Request,
            EventKind::Response,
            EventKind::RequestError,
        ] {
            assert_eq!(kind.to_string().parse::<EventKind>().unwrap(), kind);
        }
        assert!("request:err".parse::<EventKind>().is_err());
    }

    #[test]
    fn test_handlers_fire_in_registration_order() {
        let mut bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let seen = Arc::clone(&seen);
            bus.on(EventKind::Start, move |_| seen.lock().unwrap().push(tag));
        }
        bus.emit(&PipelineEvent::Start);
        assert_eq!(*seen.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_emit_dispatches_by_kind() {
        let mut bus = EventBus::new();
        let hits = Arc::new(Mutex::new(0));
        {
            let hits = Arc::clone(&hits);
            bus.on(EventKind::Response, move |_| *hits.lock().unwrap() += 1);
        }
        bus.emit(&PipelineEvent::Start);
        bus.emit(&PipelineEvent::Response {
            index: 0,
            response: canned_response(),
        });
        assert_eq!(*hits.lock().unwrap(), 1);
    }

    #[test]
    fn test_response_event_carries_the_response() {
        let mut bus = EventBus::new();
        let seen = Arc::new(Mutex::new(None));
        {
            let seen = Arc::clone(&seen);
            bus.on(EventKind::Response, move |event| {
                if let PipelineEvent::Response { response, .. } = event {
                    *seen.lock().unwrap() = Some(response.clone());
                }
            });
        }
        bus.emit(&PipelineEvent::Response {
            index: 0,
            response: canned_response(),
        });

        let seen = seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen.status, 200);
        assert_eq!(seen.data, serde_json::json!({ "ok": true }));
    }

    fn canned_response() -> ResponseData {
        ResponseData {
            status: 200,
            headers: Default::default(),
            data: serde_json::json!({ "ok": true }),
        }
    }
}
