use dynreach_graph::GraphError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReadError {
    #[error("input could not be read: {0}")]
    Io(#[from] std::io::Error),

    #[error("input could not be parsed:\n{0}")]
    Parse(String),

    #[error("graph construction failed: {0}")]
    Graph(#[from] GraphError),
}

pub type ReadResult<T> = std::result::Result<T, ReadError>;
