//! Error types for the pipeline.
//!
//! Two classes of failure exist: template/directive errors abort the run
//! (they are authoring mistakes), while transport errors are tolerated —
//! the executor retries, emits an event, and moves on with a missing
//! response slot.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A directive token named something neither builtin nor registered.
    #[error("unknown directive `{0}`")]
    UnknownDirective(String),

    /// A directive token without an argument, or an HTML directive
    /// argument missing its `selector|query` separator.
    #[error("malformed directive token `{0}`")]
    MalformedDirective(String),

    /// The structured-query evaluator rejected an expression or its input.
    #[error("query `{expr}` failed: {message}")]
    Query { expr: String, message: String },

    /// A CSS selector failed to parse.
    #[error("invalid selector `{0}`")]
    Selector(String),

    /// An expanded request variant did not form a valid request descriptor.
    #[error("rendered template is not a valid request descriptor: {0}")]
    InvalidRequest(#[source] serde_json::Error),

    /// The transport failed to issue a request or read its response.
    #[error("transport error: {0}")]
    Transport(String),

    /// Snapshotting pipeline state for directive evaluation failed.
    #[error("failed to snapshot render context: {0}")]
    Snapshot(#[from] serde_json::Error),

    /// `go()` was called with the cursor already past the last step.
    #[error("no step left to execute (cursor at {0})")]
    Exhausted(usize),

    /// An event name that is not part of the lifecycle surface.
    #[error("unknown event `{0}`")]
    UnknownEvent(String),
}
