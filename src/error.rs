#[cfg(feature = "python")]
use pyo3::exceptions::PyRuntimeError;
#[cfg(feature = "python")]
use pyo3::PyErr;
use thiserror::Error;

use crate::types::Origin;

#[derive(Error, Debug)]
pub enum PlanError {
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("No open storage available for market {0}")]
    NoFacilityAvailable(String),

    #[error("No route from {origin} to {facility}: facility closed or distance missing")]
    MissingDistance { origin: Origin, facility: String },

    #[error("Flow problem is infeasible: {0}")]
    Infeasible(String),

    #[error("Flow problem is unbounded: {0}")]
    Unbounded(String),

    #[error("Flow solve timed out after {0} pivots")]
    Timeout(usize),

    #[error("Flow solve cancelled after {0} pivots")]
    Cancelled(usize),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),
}

impl PlanError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        PlanError::MalformedInput(msg.into())
    }
}

#[cfg(feature = "python")]
impl From<PlanError> for PyErr {
    fn from(err: PlanError) -> PyErr {
        PyRuntimeError::new_err(err.to_string())
    }
}
