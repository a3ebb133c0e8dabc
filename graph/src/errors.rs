use crate::types::{Timestamp, VertexIdentifier};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("timestamp {0} precedes the latest recorded timestamp {1}")]
    InvalidTimestamp(Timestamp, Timestamp),

    #[error("vertex {0} does not exist")]
    UnknownVertex(VertexIdentifier),

    #[error("arc ({0}, {1}) does not exist")]
    UnknownArc(VertexIdentifier, VertexIdentifier),

    #[error("a vertex with id {0} already exists")]
    DuplicateVertex(VertexIdentifier),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

pub type GraphResult<T> = std::result::Result<T, GraphError>;
