//! Error Types
//!
//! Genuinely invalid inputs are rejected here before any computation runs.
//! Recoverable numerical situations (extreme response patterns, sparse
//! calibration data, iteration caps) are reported as flags on successful
//! results instead.

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, IrtError>;

/// Errors surfaced by the psychometric core
#[derive(Error, Debug)]
pub enum IrtError {
    /// Item parameter or numeric argument outside its declared range
    #[error("invalid parameter `{field}` = {value}: {reason}")]
    InvalidParameter {
        field: &'static str,
        value: f64,
        reason: &'static str,
    },

    /// Q-matrix row that is not a valid weight distribution
    #[error("invalid Q-matrix row: {reason} (weight sum {sum})")]
    InvalidQMatrix { sum: f64, reason: &'static str },

    /// Partial-credit score outside [0, 1]
    #[error("invalid score for component {component}: {value}")]
    InvalidScore { component: &'static str, value: f64 },

    /// Inputs whose lengths do not line up
    #[error("dimension mismatch for {what}: expected {expected}, found {found}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    /// Response referencing an item that was not supplied
    #[error("response references unknown item index {index} (pool size {pool_size})")]
    UnknownItem { index: usize, pool_size: usize },

    /// Newton-Raphson curvature collapsed; callers should fall back to EAP
    #[error("MLE diverged at iteration {iteration}: theta = {theta}, curvature = {curvature}")]
    Divergence {
        iteration: u32,
        theta: f64,
        curvature: f64,
    },

    /// Component name that matches no known component
    #[error("unknown component `{0}`")]
    UnknownComponent(String),

    /// Configuration value rejected by validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration document could not be parsed
    #[error("configuration parse error: {0}")]
    Config(#[from] serde_json::Error),
}

impl IrtError {
    pub(crate) fn invalid(field: &'static str, value: f64, reason: &'static str) -> Self {
        IrtError::InvalidParameter {
            field,
            value,
            reason,
        }
    }
}
