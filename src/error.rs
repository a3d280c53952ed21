//! Error type shared by the whole crate.
//!
//! Only construction-time problems (bad input data, bad configuration, I/O) are
//! errors. Capacity violations found during the search are scored, not raised.

use std::fmt;

/// Errors raised while building an instance, loading data or writing results.
#[derive(Debug)]
pub enum SolverError {
    /// The instance data breaks an invariant (duplicate ids, bad capacity, ...)
    InvalidInstance(String),
    /// The vehicle table is empty, so no homogeneous capacity can be chosen
    NoVehicles,
    /// A required cost parameter is missing or not numeric
    MissingParameter(String),
    /// The algorithm configuration is out of range
    InvalidConfig(String),
    Io(std::io::Error),
    Csv(csv::Error),
    Json(serde_json::Error),
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, SolverError>;

impl fmt::Display for SolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverError::InvalidInstance(msg) => write!(f, "invalid instance: {}", msg),
            SolverError::NoVehicles => write!(f, "no vehicles found in the vehicle table"),
            SolverError::MissingParameter(name) => write!(f, "missing or invalid parameter: {}", name),
            SolverError::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
            SolverError::Io(e) => write!(f, "I/O error: {}", e),
            SolverError::Csv(e) => write!(f, "CSV error: {}", e),
            SolverError::Json(e) => write!(f, "JSON error: {}", e),
        }
    }
}

impl std::error::Error for SolverError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SolverError::Io(e) => Some(e),
            SolverError::Csv(e) => Some(e),
            SolverError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SolverError {
    fn from(value: std::io::Error) -> Self {
        SolverError::Io(value)
    }
}

impl From<csv::Error> for SolverError {
    fn from(value: csv::Error) -> Self {
        SolverError::Csv(value)
    }
}

impl From<serde_json::Error> for SolverError {
    fn from(value: serde_json::Error) -> Self {
        SolverError::Json(value)
    }
}
