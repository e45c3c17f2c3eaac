use thiserror::Error;

use crate::model::{NodeIndex, TrialId};

/// Errors raised by [`crate::graph::TrialGraph`] operations.
#[derive(Debug, Error)]
pub enum TrialGraphError {
    #[error("no trial has been loaded")]
    NotLoaded,
    #[error("unknown node index {0}")]
    UnknownNode(NodeIndex),
    #[error(transparent)]
    Diff(#[from] DiffError),
    #[error(transparent)]
    Export(#[from] ExportError),
}

/// Failure of an outbound backend request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    #[error("invalid request url: {0}")]
    InvalidUrl(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("backend responded with HTTP {0}")]
    HttpStatus(u16),
    #[error("malformed response body: {0}")]
    Body(String),
}

/// Errors surfaced by the diff selection flow.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DiffError {
    #[error("node has no activations to compare in two trials")]
    NotComparable,
    #[error("a diff request is already in progress")]
    Busy,
    #[error("no activation selected for trial {0}")]
    NoSelection(TrialId),
    #[error("activation {activation} is not a candidate for trial {trial}")]
    UnknownActivation { trial: TrialId, activation: String },
    #[error("comparison request failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("comparison request timed out")]
    Timeout,
}

/// Errors raised while exporting the current rendering.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("nothing has been rendered yet")]
    Empty,
    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
