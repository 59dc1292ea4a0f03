//! Runtime error types.

use automata_core::LoadError;
use thiserror::Error;

/// Errors from loading a set of automata.
#[derive(Debug, Error)]
pub enum AutomataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{automaton}: {source}")]
    Load {
        automaton: String,
        #[source]
        source: LoadError,
    },
}

impl AutomataError {
    /// Returns the name of the automaton that failed to build, if any.
    pub fn automaton(&self) -> Option<&str> {
        match self {
            AutomataError::Load { automaton, .. } => Some(automaton),
            _ => None,
        }
    }

    /// Returns the build failure, if this is one.
    pub fn load_error(&self) -> Option<&LoadError> {
        match self {
            AutomataError::Load { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Errors from the snapshot store.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("data corruption: {0}")]
    Corruption(String),
}
