//! Automaton definition types.
//!
//! Definitions are written in YAML, one document holding any number of
//! automata keyed by name:
//!
//! ```yaml
//! dog:
//!   start: Hungry
//!   states:
//!     Hungry:
//!     Eating:
//!       entering: ["eat('apple')"]
//!       leaving: ["groan()"]
//!   transitions:
//!     Hungry:
//!       - when: itch.* or sniff.*
//!         actions: ["scratch()"]
//!     Hungry->Eating:
//!       - when: food.*
//!         actions: ["woof()"]
//!     "*->Hungry":
//!       - when: run
//! ```
//!
//! Transition keys use the from-to grammar (see [`FromTo`]).

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Multi-automaton document, keyed by automaton name.
pub type AutomataDefinition = BTreeMap<String, AutomatonDefinition>;

/// Declarative description of one automaton.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomatonDefinition {
    /// Name of the initial state.
    #[serde(alias = "Start", deserialize_with = "null_as_default")]
    pub start: String,

    /// Declared states and their entry/exit actions.
    #[serde(alias = "States", deserialize_with = "deserialize_states")]
    pub states: BTreeMap<String, StateDefinition>,

    /// Transition rules keyed by from-to spec.
    #[serde(alias = "Transitions", deserialize_with = "null_as_default")]
    pub transitions: BTreeMap<String, Vec<TransitionRule>>,
}

/// Entry and exit actions of a state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateDefinition {
    #[serde(alias = "Entering", deserialize_with = "null_as_default")]
    pub entering: Vec<String>,

    #[serde(alias = "Leaving", deserialize_with = "null_as_default")]
    pub leaving: Vec<String>,
}

/// A single rule under a from-to key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionRule {
    /// Condition expression, see [`crate::condition`].
    #[serde(alias = "When", deserialize_with = "null_as_default")]
    pub when: String,

    #[serde(alias = "Actions", deserialize_with = "null_as_default")]
    pub actions: Vec<String>,
}

impl TransitionRule {
    pub fn new(when: impl Into<String>) -> Self {
        Self {
            when: when.into(),
            actions: Vec::new(),
        }
    }

    pub fn with_actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.actions = actions.into_iter().map(Into::into).collect();
        self
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// States may be declared with an empty body (`Hungry:`).
fn deserialize_states<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<String, StateDefinition>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, Option<StateDefinition>>> =
        Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(name, state)| (name, state.unwrap_or_default()))
        .collect())
}

/// Wildcard for "every declared state".
pub const ALL_STATES: &str = "*";

/// One side of a from-to spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Side {
    /// `*`
    All,
    /// Comma-separated names, taken verbatim.
    Names(Vec<String>),
}

impl Side {
    fn parse(s: &str) -> Self {
        if s == ALL_STATES {
            Side::All
        } else {
            Side::Names(s.split(',').map(str::to_string).collect())
        }
    }

    fn resolve<'a>(&'a self, all_states: &'a [String]) -> &'a [String] {
        match self {
            Side::All => all_states,
            Side::Names(names) => names,
        }
    }
}

/// Parsed from-to spec.
///
/// - `A,B` expands to the self-loops `A->A`, `B->B`
/// - `A,B->C,D` expands to the cross product of both sides
/// - `*` on either side stands for every declared state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FromTo {
    SelfLoops(Side),
    Cross(Side, Side),
}

impl FromTo {
    /// Parses a from-to spec. Only the first `->` splits the sides.
    pub fn parse(spec: &str) -> Self {
        match spec.split_once("->") {
            Some((from, to)) => FromTo::Cross(Side::parse(from), Side::parse(to)),
            None => FromTo::SelfLoops(Side::parse(spec)),
        }
    }

    /// Expands to `(from, to)` pairs. Names are not checked here.
    pub fn expand(&self, all_states: &[String]) -> Vec<(String, String)> {
        match self {
            FromTo::SelfLoops(side) => side
                .resolve(all_states)
                .iter()
                .map(|f| (f.clone(), f.clone()))
                .collect(),
            FromTo::Cross(from, to) => {
                let tos = to.resolve(all_states);
                from.resolve(all_states)
                    .iter()
                    .flat_map(|f| tos.iter().map(move |t| (f.clone(), t.clone())))
                    .collect()
            }
        }
    }
}
