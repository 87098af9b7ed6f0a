use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error body returned by the processing service on a non-success status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParameterError {
    #[error("{control} must be within {min}..={max}, got {value}")]
    OutOfRange {
        control: &'static str,
        value: i32,
        min: i32,
        max: i32,
    },
}
