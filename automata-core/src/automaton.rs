//! Automaton engine - tracks the current state and processes events.

use crate::graph::{State, StateGraph};
use chrono::{DateTime, Utc};
use crossbeam::channel::{self, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// A named side effect for the host to carry out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action<E> {
    pub name: String,
    /// The event that triggered the action.
    pub trigger: E,
}

impl<E> fmt::Display for Action<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A completed state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub automaton: String,
    pub old: String,
    pub new: String,
    /// When the automaton entered `old`.
    pub since: DateTime<Utc>,
    /// Time spent in `old`.
    pub duration: Duration,
}

/// Sending halves of the shared action and change queues.
///
/// Both queues are bounded; a full queue blocks the sender until a consumer
/// drains it.
#[derive(Debug)]
pub struct Outputs<E> {
    actions: Sender<Action<E>>,
    changes: Sender<Change>,
}

impl<E> Clone for Outputs<E> {
    fn clone(&self) -> Self {
        Self {
            actions: self.actions.clone(),
            changes: self.changes.clone(),
        }
    }
}

impl<E> Outputs<E> {
    pub fn new(actions: Sender<Action<E>>, changes: Sender<Change>) -> Self {
        Self { actions, changes }
    }

    /// Creates a pair of bounded queues and returns their receivers.
    pub fn bounded(capacity: usize) -> (Self, Receiver<Action<E>>, Receiver<Change>) {
        let (actions_tx, actions_rx) = channel::bounded(capacity);
        let (changes_tx, changes_rx) = channel::bounded(capacity);
        (Self::new(actions_tx, changes_tx), actions_rx, changes_rx)
    }
}

/// One running state machine.
///
/// Events are any value with a `Display` rendering; that text is what
/// conditions are matched against. Calls to [`Automaton::process`] must be
/// serialized by the caller.
#[derive(Debug)]
pub struct Automaton<E> {
    name: String,
    graph: Arc<StateGraph>,
    state: Arc<State>,
    since: DateTime<Utc>,
    outputs: Outputs<E>,
}

impl<E> Automaton<E>
where
    E: fmt::Display + Clone,
{
    /// Creates an automaton in the graph's start state.
    pub fn new(name: impl Into<String>, graph: Arc<StateGraph>, outputs: Outputs<E>) -> Self {
        let state = Arc::clone(graph.start());
        Self {
            name: name.into(),
            graph,
            state,
            since: Utc::now(),
            outputs,
        }
    }

    /// Processes one event.
    ///
    /// Every step of the current state whose condition matches fires, in step
    /// order. For each one: the current state's leaving actions, the step's
    /// actions, a [`Change`] if the target state differs, then the entering
    /// actions of whatever state is current afterwards.
    pub fn process(&mut self, event: &E) {
        let text = event.to_string();
        let source = Arc::clone(&self.state);

        for step in source.steps.iter().filter(|s| s.condition.matches(&text)) {
            tracing::debug!(
                "{}: '{}' matched '{}' in {}",
                self.name,
                text,
                step.condition,
                self.state.name
            );

            let leaving = Arc::clone(&self.state);
            self.emit(&leaving.leaving, event);
            self.emit(&step.actions, event);

            if self.state.name != step.next {
                match self.graph.get(&step.next).cloned() {
                    Some(next) => self.change_to(next),
                    None => tracing::warn!(
                        "{}: step target '{}' missing from graph",
                        self.name,
                        step.next
                    ),
                }
            }

            let entering = Arc::clone(&self.state);
            self.emit(&entering.entering, event);
        }
    }

    fn emit(&self, names: &[String], event: &E) {
        for name in names {
            let action = Action {
                name: name.clone(),
                trigger: event.clone(),
            };
            if self.outputs.actions.send(action).is_err() {
                tracing::debug!("{}: action '{}' dropped, no receiver", self.name, name);
            }
        }
    }

    fn change_to(&mut self, next: Arc<State>) {
        let now = Utc::now().max(self.since);
        let old = std::mem::replace(&mut self.state, next);
        let old_since = std::mem::replace(&mut self.since, now);
        let duration = (now - old_since).to_std().unwrap_or_default();

        let change = Change {
            automaton: self.name.clone(),
            old: old.name.clone(),
            new: self.state.name.clone(),
            since: old_since,
            duration,
        };
        if self.outputs.changes.send(change).is_err() {
            tracing::debug!(
                "{}: change {} -> {} dropped, no receiver",
                self.name,
                old.name,
                self.state.name
            );
        }
    }

    /// Switches to the named state and overwrites the timestamp.
    ///
    /// The timestamp is always taken. Returns false and keeps the current
    /// state if the state is not in this automaton's graph.
    pub fn restore(&mut self, state: &str, since: DateTime<Utc>) -> bool {
        self.since = since;
        match self.graph.get(state) {
            Some(target) => {
                self.state = Arc::clone(target);
                true
            }
            None => false,
        }
    }
}

impl<E> Automaton<E> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the current state.
    pub fn state(&self) -> &Arc<State> {
        &self.state
    }

    pub fn state_name(&self) -> &str {
        &self.state.name
    }

    /// Returns when the current state was entered.
    pub fn since(&self) -> DateTime<Utc> {
        self.since
    }

    pub fn graph(&self) -> &Arc<StateGraph> {
        &self.graph
    }
}
