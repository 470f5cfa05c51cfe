//! Error types for the focus engine.

use thiserror::Error;

use audiofocus_ipc::{ErrorCode, ParseError, StreamId};
use audiofocus_policy::PolicyError;

/// Errors that can occur during focus operations.
#[derive(Debug, Error)]
pub enum FocusError {
    /// Usage, content type and volume type do not form a recognized combination.
    #[error("Invalid stream descriptor: {0}")]
    InvalidDescriptor(String),

    /// The handle does not name a registered stream.
    #[error("Unknown stream: {0}")]
    UnknownStream(StreamId),

    /// Argument of the wrong shape, such as a command that does not parse.
    #[error("Parameter type mismatch: {0}")]
    ParameterType(String),

    /// Argument outside its valid range.
    #[error("Parameter value error: {0}")]
    ParameterValue(String),

    /// Operation not valid in the current state.
    #[error("Caller state error: {0}")]
    CallerState(String),

    /// Policy table could not be built.
    #[error(transparent)]
    Policy(#[from] PolicyError),
}

impl FocusError {
    /// Caller-facing error category.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidDescriptor(_) => ErrorCode::InvalidDescriptor,
            Self::UnknownStream(_) => ErrorCode::UnknownStream,
            Self::ParameterType(_) => ErrorCode::ParameterTypeMismatch,
            Self::ParameterValue(_) => ErrorCode::ParameterValueError,
            Self::CallerState(_) => ErrorCode::CallerStateError,
            Self::Policy(_) => ErrorCode::Internal,
        }
    }
}

impl From<ParseError> for FocusError {
    fn from(err: ParseError) -> Self {
        Self::ParameterValue(err.to_string())
    }
}

/// Result type for focus operations.
pub type FocusResult<T> = Result<T, FocusError>;

#[cfg(test)]
mod tests {
    use super::*;
    use audiofocus_ipc::VolumeType;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            FocusError::UnknownStream(StreamId(4)).code(),
            ErrorCode::UnknownStream
        );
        assert_eq!(
            FocusError::ParameterType("x".into()).code().numeric(),
            401
        );
        assert_eq!(
            FocusError::ParameterValue("x".into()).code().numeric(),
            6_800_101
        );

        let parse = VolumeType::try_from(99).unwrap_err();
        assert_eq!(FocusError::from(parse).code(), ErrorCode::ParameterValueError);
    }
}
