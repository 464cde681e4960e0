//! Error taxonomy for the sizing core.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CalcError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalcError {
    /// Caller error: the request cannot be resolved. No derivation was attempted.
    #[error("Possible Malformed request: {0}")]
    InvalidRequest(String),

    /// Catalog data failed to parse or violates its own bounds.
    #[error("Catalog entry {param} is corrupt: {reason}")]
    CatalogCorrupt { param: String, reason: String },

    #[error("Parameter {family}/{group}/{name} is not in the catalog")]
    MissingParameter {
        family: &'static str,
        group: String,
        name: String,
    },

    #[error("Connection search gave up after {iterations} attempts at {connections} connections")]
    SearchExhausted { iterations: u32, connections: u32 },

    #[error("Derivation stage out of order: {0}")]
    OutOfOrder(&'static str),
}

impl CalcError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        CalcError::InvalidRequest(msg.into())
    }

    pub fn corrupt(param: impl Into<String>, reason: impl Into<String>) -> Self {
        CalcError::CatalogCorrupt {
            param: param.into(),
            reason: reason.into(),
        }
    }

    /// Stable code for the wire.
    pub fn code(&self) -> &'static str {
        match self {
            CalcError::InvalidRequest(_) => "INVALID_REQUEST",
            CalcError::SearchExhausted { .. } => "SEARCH_EXHAUSTED",
            _ => "INTERNAL_ERROR",
        }
    }

    /// True when the caller caused the failure (as opposed to catalog or engine faults).
    pub fn is_user_error(&self) -> bool {
        matches!(self, CalcError::InvalidRequest(_))
    }
}
