//! Controller errors

use thiserror::Error;

/// Errors reported to command submitters
///
/// None of these are fatal to the serializer; each is returned to the
/// caller that submitted the offending command.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControllerError {
    #[error("LED index {index} out of range for a strip of {count}")]
    OutOfRange { index: usize, count: usize },

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Scene not found: {name}")]
    NotFound {
        name: String,
        available: Vec<String>,
    },

    /// Scene tick computed for an activation that has since been replaced
    #[error("Scene tick for generation {generation} is stale")]
    Superseded { generation: u64 },

    #[error("Timed out after {0:?} waiting for acknowledgement")]
    SubmissionTimeout(std::time::Duration),

    #[error("Command serializer is not running")]
    ChannelClosed,
}
