use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReachabilityError {
    /// The event stream diverged from the graph the tree was built for,
    /// e.g. the removal of an arc whose head was never registered.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

pub type Result<T> = std::result::Result<T, ReachabilityError>;
