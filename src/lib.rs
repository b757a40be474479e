//! Crawlflow — declarative multi-step HTTP extraction pipelines.
//!
//! A pipeline is a sequence of steps. Each step renders its request
//! template through the directive engine, fans the rendered template out
//! into one or more concrete requests, issues them sequentially, renders
//! its result template against every response, and fans those out into
//! records. Later steps can reach back into earlier steps' results through
//! directives; when every step has run, the orchestrator zips per-step
//! results into one output record per index.
//!
//! ```no_run
//! use crawlflow::{Pipeline, PipelineConfig};
//!
//! # async fn demo() -> crawlflow::Result<()> {
//! let config: PipelineConfig = serde_json::from_str(
//!     r#"{
//!         "steps": [{
//!             "url": "https://api.example.com/items",
//!             "resultTemplate": { "id": "{{v-resp=data.items[*].id}}" }
//!         }]
//!     }"#,
//! )
//! .expect("valid config");
//!
//! let mut pipeline = Pipeline::new(config);
//! let records = pipeline.run(None).await?;
//! # let _ = records;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod directive;
pub mod error;
pub mod events;
mod executor;
pub mod expand;
pub mod pipeline;
pub mod query;
pub mod step;
pub mod transport;
pub mod tree;

pub use config::{Options, PipelineConfig, StepConfig};
pub use directive::{DirectiveEngine, DirectiveKind, RenderContext, Rendered};
pub use error::{Error, Result};
pub use events::{EventBus, EventKind, PipelineEvent};
pub use pipeline::{Pipeline, Position};
pub use step::{BodyEncoding, Method, RequestConfig, ResponseData, Step};
pub use transport::{HttpTransport, Transport};
