//! Transition table construction.
//!
//! [`StateGraph::build`] validates an [`AutomatonDefinition`] and expands its
//! from-to keys into an ordered list of [`Step`]s per source state. The graph
//! is immutable once built; automata share it through an `Arc` and only swap
//! which [`State`] is current.

use crate::condition::Condition;
use crate::definition::{AutomatonDefinition, FromTo};
use crate::error::LoadError;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A compiled transition rule attached to a source state.
#[derive(Debug, Clone)]
pub struct Step {
    pub condition: Condition,
    pub actions: Vec<String>,
    /// Target state, looked up by name in the owning graph.
    pub next: String,
}

/// A state with its entry/exit actions and outgoing steps.
#[derive(Debug, Clone)]
pub struct State {
    pub name: String,
    pub entering: Vec<String>,
    pub leaving: Vec<String>,
    /// Outgoing steps in the order they are tried.
    pub steps: Vec<Step>,
}

impl State {
    fn new(name: &str, entering: Vec<String>, leaving: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            entering,
            leaving,
            steps: Vec::new(),
        }
    }
}

/// The built, read-only state graph of one automaton.
#[derive(Debug, Clone)]
pub struct StateGraph {
    start: Arc<State>,
    states: BTreeMap<String, Arc<State>>,
}

impl StateGraph {
    /// Validates a definition and builds its transition table.
    ///
    /// Checks run in a fixed order and the first violation is returned.
    /// From-to keys are visited in lexicographic order, and rules keep their
    /// declared order within a key.
    pub fn build(definition: &AutomatonDefinition) -> Result<Self, LoadError> {
        if definition.start.is_empty() {
            return Err(LoadError::MissingStart);
        }
        if definition.states.is_empty() {
            return Err(LoadError::MissingStates);
        }
        if definition.transitions.is_empty() {
            return Err(LoadError::MissingTransitions);
        }

        let mut states: BTreeMap<String, State> = definition
            .states
            .iter()
            .map(|(name, def)| {
                (
                    name.clone(),
                    State::new(name, def.entering.clone(), def.leaving.clone()),
                )
            })
            .collect();
        let all_states: Vec<String> = states.keys().cloned().collect();

        if !states.contains_key(&definition.start) {
            return Err(LoadError::InvalidStart {
                start: definition.start.clone(),
            });
        }

        for (spec, rules) in &definition.transitions {
            for (from, to) in FromTo::parse(spec).expand(&all_states) {
                for name in [&from, &to] {
                    if !states.contains_key(name) {
                        return Err(LoadError::UnknownState {
                            name: name.clone(),
                            spec: spec.clone(),
                        });
                    }
                }

                if let Some(source) = states.get_mut(&from) {
                    source.steps.extend(rules.iter().map(|rule| Step {
                        condition: Condition::new(rule.when.clone()),
                        actions: rule.actions.clone(),
                        next: to.clone(),
                    }));
                }
            }
        }

        let states: BTreeMap<String, Arc<State>> = states
            .into_iter()
            .map(|(name, state)| (name, Arc::new(state)))
            .collect();
        let start = states
            .get(&definition.start)
            .cloned()
            .ok_or_else(|| LoadError::InvalidStart {
                start: definition.start.clone(),
            })?;

        tracing::debug!(
            "Built state graph: {} states, {} steps, start '{}'",
            states.len(),
            states.values().map(|s| s.steps.len()).sum::<usize>(),
            start.name
        );

        Ok(Self { start, states })
    }

    /// Returns the initial state.
    pub fn start(&self) -> &Arc<State> {
        &self.start
    }

    /// Looks up a state by name.
    pub fn get(&self, name: &str) -> Option<&Arc<State>> {
        self.states.get(name)
    }

    /// Returns true if the given state is declared.
    pub fn has_state(&self, name: &str) -> bool {
        self.states.contains_key(name)
    }

    /// Returns all state names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.states.keys().map(String::as_str)
    }

    /// Returns all states in name order.
    pub fn states(&self) -> impl Iterator<Item = &Arc<State>> {
        self.states.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{StateDefinition, TransitionRule};

    fn definition(
        start: &str,
        states: &[&str],
        transitions: &[(&str, Vec<TransitionRule>)],
    ) -> AutomatonDefinition {
        AutomatonDefinition {
            start: start.to_string(),
            states: states
                .iter()
                .map(|s| (s.to_string(), StateDefinition::default()))
                .collect(),
            transitions: transitions
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        }
    }

    fn targets(state: &State) -> Vec<(&str, &str)> {
        state
            .steps
            .iter()
            .map(|s| (s.condition.when(), s.next.as_str()))
            .collect()
    }

    #[test]
    fn test_build_simple_graph() {
        let mut def = definition(
            "Hungry",
            &["Hungry", "Eating"],
            &[(
                "Hungry->Eating",
                vec![TransitionRule::new("food.*").with_actions(["woof()"])],
            )],
        );
        def.states.get_mut("Eating").unwrap().entering = vec!["eat()".to_string()];

        let graph = StateGraph::build(&def).unwrap();
        assert_eq!(graph.start().name, "Hungry");
        assert_eq!(graph.names().collect::<Vec<_>>(), vec!["Eating", "Hungry"]);

        let hungry = graph.get("Hungry").unwrap();
        assert_eq!(targets(hungry), vec![("food.*", "Eating")]);
        assert_eq!(hungry.steps[0].actions, vec!["woof()"]);
        assert_eq!(graph.get("Eating").unwrap().entering, vec!["eat()"]);
        assert!(graph.get("Eating").unwrap().steps.is_empty());
    }

    #[test]
    fn test_validation_order() {
        let empty = AutomatonDefinition::default();
        assert_eq!(StateGraph::build(&empty).unwrap_err(), LoadError::MissingStart);

        let def = definition("A", &[], &[("A", vec![TransitionRule::new("x")])]);
        assert_eq!(StateGraph::build(&def).unwrap_err(), LoadError::MissingStates);

        let def = definition("A", &["A"], &[]);
        assert_eq!(
            StateGraph::build(&def).unwrap_err(),
            LoadError::MissingTransitions
        );

        let def = definition("Z", &["A"], &[("Q", vec![TransitionRule::new("x")])]);
        assert_eq!(
            StateGraph::build(&def).unwrap_err(),
            LoadError::InvalidStart {
                start: "Z".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_states_are_rejected() {
        let def = definition("A", &["A"], &[("B", vec![TransitionRule::new("x")])]);
        assert_eq!(
            StateGraph::build(&def).unwrap_err(),
            LoadError::UnknownState {
                name: "B".to_string(),
                spec: "B".to_string()
            }
        );

        let def = definition("A", &["A"], &[("A->C", vec![TransitionRule::new("x")])]);
        assert_eq!(
            StateGraph::build(&def).unwrap_err(),
            LoadError::UnknownState {
                name: "C".to_string(),
                spec: "A->C".to_string()
            }
        );

        let def = definition("A", &["A", "B"], &[("A, B", vec![TransitionRule::new("x")])]);
        assert!(matches!(
            StateGraph::build(&def),
            Err(LoadError::UnknownState { name, .. }) if name == " B"
        ));
    }

    #[test]
    fn test_wildcards_cover_every_state() {
        let def = definition(
            "A",
            &["A", "B", "C"],
            &[("*->*", vec![TransitionRule::new("go")])],
        );
        let graph = StateGraph::build(&def).unwrap();
        for state in graph.states() {
            let nexts: Vec<&str> = state.steps.iter().map(|s| s.next.as_str()).collect();
            assert_eq!(nexts, vec!["A", "B", "C"]);
        }

        let def = definition("A", &["A", "B"], &[("*", vec![TransitionRule::new("tick")])]);
        let graph = StateGraph::build(&def).unwrap();
        assert_eq!(targets(graph.get("A").unwrap()), vec![("tick", "A")]);
        assert_eq!(targets(graph.get("B").unwrap()), vec![("tick", "B")]);
    }

    #[test]
    fn test_rules_keep_declared_order_within_key() {
        let def = definition(
            "A",
            &["A", "B"],
            &[(
                "A->B",
                vec![
                    TransitionRule::new("second"),
                    TransitionRule::new("first"),
                    TransitionRule::new("third"),
                ],
            )],
        );
        let graph = StateGraph::build(&def).unwrap();
        assert_eq!(
            targets(graph.get("A").unwrap()),
            vec![("second", "B"), ("first", "B"), ("third", "B")]
        );
    }

    #[test]
    fn test_unreachable_states_are_allowed() {
        let def = definition(
            "A",
            &["A", "Orphan"],
            &[("A", vec![TransitionRule::new("x")])],
        );
        let graph = StateGraph::build(&def).unwrap();
        assert!(graph.has_state("Orphan"));
        assert!(graph.get("Orphan").unwrap().steps.is_empty());
    }
}
