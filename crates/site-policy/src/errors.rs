use thiserror::Error;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("invalid blocked host pattern: {0:?}")]
    InvalidHostPattern(String),
    #[error("invalid scheme: {0:?}")]
    InvalidScheme(String),
}
