//! Pipeline orchestration: run steps in order, merge results, reset.

use crate::config::{Options, PipelineConfig};
use crate::directive::{DirectiveEngine, RenderContext};
use crate::error::{Error, Result};
use crate::events::{EventBus, EventKind, PipelineEvent};
use crate::executor;
use crate::step::Step;
use crate::transport::{HttpTransport, Transport};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// Cursor into the step sequence plus run timestamps. Advanced only after
/// a step fully completes.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub current: usize,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl Position {
    fn new() -> Self {
        Self {
            current: 0,
            start_time: Some(Utc::now()),
            end_time: None,
        }
    }
}

/// A configured pipeline: steps, cursor, meta bag, events, transport.
pub struct Pipeline {
    steps: Vec<Step>,
    position: Position,
    meta: Map<String, Value>,
    options: Options,
    engine: DirectiveEngine,
    events: EventBus,
    transport: Box<dyn Transport>,
}

impl Pipeline {
    /// Build a pipeline with the default HTTP transport.
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_transport(config, HttpTransport::new())
    }

    /// Build a pipeline with a caller-supplied transport.
    pub fn with_transport<T: Transport + 'static>(config: PipelineConfig, transport: T) -> Self {
        Self {
            steps: config.steps.into_iter().map(Step::from_config).collect(),
            position: Position::new(),
            meta: config.meta,
            options: config.options,
            engine: DirectiveEngine::new(),
            events: EventBus::new(),
            transport: Box::new(transport),
        }
    }

    /// Register a lifecycle event handler.
    pub fn on<F>(&mut self, kind: EventKind, handler: F)
    where
        F: Fn(&PipelineEvent) + Send + Sync + 'static,
    {
        self.events.on(kind, handler);
    }

    /// Register a custom directive, consulted when no builtin matches.
    /// Templates address it as `{{v-<name>=<arg>}}`; the `v-` prefix is
    /// added when missing.
    pub fn register_directive<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(&RenderContext, &str) -> Result<Value> + Send + Sync + 'static,
    {
        self.engine.register(name, handler);
    }

    /// Run every remaining step in order, then merge per-step results into
    /// final records.
    pub async fn run(&mut self, meta: Option<Map<String, Value>>) -> Result<Vec<Value>> {
        self.merge_meta(meta);
        self.events.emit(&PipelineEvent::Start);
        while self.position.current < self.steps.len() {
            self.go(None).await?;
        }
        let records = self.merge_results();
        tracing::info!(records = records.len(), "run finished");
        self.events.emit(&PipelineEvent::End {
            records: records.clone(),
        });
        Ok(records)
    }

    /// Execute the step under the cursor, then advance the cursor.
    pub async fn go(&mut self, meta: Option<Map<String, Value>>) -> Result<Vec<Value>> {
        self.merge_meta(meta);
        let index = self.position.current;
        if index >= self.steps.len() {
            return Err(Error::Exhausted(index));
        }

        let key = self.steps[index].key.clone();
        tracing::info!(step = index, key = %key, "step started");
        self.events.emit(&PipelineEvent::BeforeStep {
            index,
            key: key.clone(),
        });

        // Requests render against the state before this step ran.
        let ctx = RenderContext::snapshot(&self.steps, &self.position, &self.meta)?;
        executor::execute_requests(
            &mut self.steps[index],
            &ctx,
            &self.engine,
            self.transport.as_ref(),
            &self.events,
            &self.options,
        )
        .await?;

        // Result templates see the responses just stored.
        let ctx = RenderContext::snapshot(&self.steps, &self.position, &self.meta)?;
        let results =
            executor::extract_results(&mut self.steps[index], &ctx, &self.engine)?;

        self.position.current += 1;
        self.position.end_time = Some(Utc::now());
        tracing::info!(step = index, results = results.len(), "step finished");
        self.events.emit(&PipelineEvent::AfterStep {
            index,
            key,
            result_count: results.len(),
        });
        Ok(results)
    }

    /// Zip same-index results across steps into one record per index.
    ///
    /// The first step's result count is canonical. A default-keyed step
    /// shallow-merges its result's fields into the record, with fields
    /// already present winning on conflict; any other step nests its result
    /// under its key. A missing result at some index contributes Null.
    pub fn merge_results(&self) -> Vec<Value> {
        let count = self.steps.first().map(|s| s.results.len()).unwrap_or(0);
        let mut records = Vec::with_capacity(count);
        for i in 0..count {
            let mut record = Map::new();
            for step in &self.steps {
                let result = step.results.get(i).cloned().unwrap_or(Value::Null);
                match result {
                    Value::Object(fields) if step.is_default_key() => {
                        for (key, value) in fields {
                            record.entry(key).or_insert(value);
                        }
                    }
                    other => {
                        record.insert(step.key.clone(), other);
                    }
                }
            }
            records.push(Value::Object(record));
        }
        records
    }

    /// Clear every step's run state and rewind the cursor. Templates and
    /// registered handlers are untouched.
    pub fn reset(&mut self) {
        self.position.current = 0;
        self.position.end_time = None;
        for step in &mut self.steps {
            step.reset_run_state();
        }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// The step under the cursor, if any remain.
    pub fn current_step(&self) -> Option<&Step> {
        self.steps.get(self.position.current)
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn meta(&self) -> &Map<String, Value> {
        &self.meta
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    fn merge_meta(&mut self, meta: Option<Map<String, Value>>) {
        if let Some(meta) = meta {
            self.meta.extend(meta);
        }
    }
}
