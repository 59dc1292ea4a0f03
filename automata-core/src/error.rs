//! Core error types.

use thiserror::Error;

/// Errors raised while building a transition table from a definition.
///
/// These only occur at load time. Event processing cannot fail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("missing start entry")]
    MissingStart,

    #[error("missing states entries")]
    MissingStates,

    #[error("missing transitions entries")]
    MissingTransitions,

    #[error("start state '{start}' is not a declared state")]
    InvalidStart { start: String },

    #[error("state '{name}' referenced by '{spec}' not found")]
    UnknownState { name: String, spec: String },
}

impl LoadError {
    /// Returns a stable code identifying the kind of failure.
    pub fn error_code(&self) -> &'static str {
        match self {
            LoadError::MissingStart => "MISSING_START",
            LoadError::MissingStates => "MISSING_STATES",
            LoadError::MissingTransitions => "MISSING_TRANSITIONS",
            LoadError::InvalidStart { .. } => "INVALID_START",
            LoadError::UnknownState { .. } => "UNKNOWN_STATE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_offender() {
        let err = LoadError::UnknownState {
            name: "Sleeping".to_string(),
            spec: "Hungry->Sleeping".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "state 'Sleeping' referenced by 'Hungry->Sleeping' not found"
        );
        assert_eq!(err.error_code(), "UNKNOWN_STATE");

        let err = LoadError::InvalidStart {
            start: "Nowhere".to_string(),
        };
        assert!(err.to_string().contains("Nowhere"));
    }
}
