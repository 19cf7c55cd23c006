use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum RunError {
    /// A write or query failed while a real link was in use. The output may
    /// have been left enabled; callers get a best-effort disable but never a
    /// masked error.
    #[error("communication error: {0}")]
    Communication(String),
    /// A caller-supplied value cannot be used and has no documented fallback.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("invalid state: {0}")]
    State(String),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
