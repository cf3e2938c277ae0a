//! Error type for the estimation core.
//!
//! Infeasible configurations are not errors: they come back as
//! [`crate::Calculation::Failure`]. This type covers caller mistakes and
//! catalog loading only.

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A request parameter is outside its documented domain
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A GPU or model spec breaks one of its invariants
    #[error("Invalid spec: {0}")]
    InvalidSpec(String),

    /// Catalog lookup miss
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
