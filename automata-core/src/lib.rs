//! # automata-core
//!
//! Automaton model for automata.
//!
//! This crate provides:
//! - Definition types for the YAML automaton format
//! - Transition table construction from the from-to wildcard grammar
//! - Glob-style condition matching
//! - Event processing with ordered action and change emission

pub mod automaton;
pub mod condition;
pub mod definition;
pub mod error;
pub mod graph;

pub use automaton::{Action, Automaton, Change, Outputs};
pub use condition::Condition;
pub use definition::{
    AutomataDefinition, AutomatonDefinition, FromTo, Side, StateDefinition, TransitionRule,
};
pub use error::LoadError;
pub use graph::{State, StateGraph, Step};
