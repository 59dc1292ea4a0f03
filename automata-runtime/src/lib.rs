//! # automata-runtime
//!
//! Runtime for automata.
//!
//! This crate provides:
//! - Loading a YAML document of named automata
//! - Broadcasting events to every automaton over shared bounded queues
//! - Persisting and restoring automaton positions
//! - A checksummed file store for snapshots

pub mod error;
pub mod registry;
pub mod snapshot;

pub use error::{AutomataError, SnapshotError};
pub use registry::{Automata, DEFAULT_CHANNEL_CAPACITY};
pub use snapshot::{AutomataState, AutomatonState, SnapshotMeta, SnapshotStore};
