//! Error types for raw-code conversion at the binding boundary.

use thiserror::Error;

/// Errors produced while converting raw values into closed types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A numeric code outside the enumerated set.
    #[error("Unknown {kind} code: {code}")]
    UnknownCode { kind: &'static str, code: i32 },
}
