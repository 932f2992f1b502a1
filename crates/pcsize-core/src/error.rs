use pcsize_protocol::{DependencyKind, PipelineIdentifier, ProtocolError, SessionHandle};

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("unknown pipeline: {0}")]
    UnknownPipeline(PipelineIdentifier),

    #[error("unknown {kind} dependency: {handle}")]
    UnknownDependency {
        kind: DependencyKind,
        handle: SessionHandle,
    },

    #[error("{kind} handle {handle} cannot be shifted by {offset} without overflow")]
    HandleOverflow {
        kind: DependencyKind,
        handle: SessionHandle,
        offset: u64,
    },

    #[error("reservation under-sized: {field} reserves {reserved} but {required} observed")]
    Undersized {
        field: &'static str,
        reserved: u64,
        required: u64,
    },

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
