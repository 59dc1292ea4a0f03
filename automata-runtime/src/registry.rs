//! Registry of named automata sharing one pair of output queues.

use crate::error::AutomataError;
use crate::snapshot::{AutomataState, AutomatonState};
use automata_core::{Action, AutomataDefinition, Automaton, Change, Outputs, StateGraph};
use crossbeam::channel::Receiver;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

/// Default capacity of the action and change queues.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 32;

/// A set of independent automata fed from one event stream.
///
/// Every automaton sends into the same two bounded queues. When a queue is
/// full, [`Automata::process`] blocks until a consumer drains it, so hosts
/// that let more than the queue capacity pile up per event must drain from
/// another thread.
#[derive(Debug)]
pub struct Automata<E = String> {
    automata: BTreeMap<String, Automaton<E>>,
    actions: Receiver<Action<E>>,
    changes: Receiver<Change>,
}

impl<E> Automata<E>
where
    E: fmt::Display + Clone,
{
    /// Builds every automaton in `definitions`.
    ///
    /// The first automaton that fails to build aborts the whole load. A
    /// capacity of 0 is raised to 1.
    pub fn from_definitions(
        definitions: AutomataDefinition,
        capacity: usize,
    ) -> Result<Self, AutomataError> {
        if capacity == 0 {
            tracing::warn!("Channel capacity 0 would block every emission, using 1");
        }
        let (outputs, actions, changes) = Outputs::bounded(capacity.max(1));

        let mut automata = BTreeMap::new();
        for (name, definition) in definitions {
            let graph = StateGraph::build(&definition).map_err(|source| AutomataError::Load {
                automaton: name.clone(),
                source,
            })?;
            let automaton = Automaton::new(name.clone(), Arc::new(graph), outputs.clone());
            automata.insert(name, automaton);
        }

        tracing::info!("Loaded {} automata", automata.len());

        Ok(Self {
            automata,
            actions,
            changes,
        })
    }

    /// Parses and builds a YAML automata document.
    pub fn from_slice(data: &[u8]) -> Result<Self, AutomataError> {
        Self::from_slice_with_capacity(data, DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn from_slice_with_capacity(data: &[u8], capacity: usize) -> Result<Self, AutomataError> {
        let definitions: AutomataDefinition = serde_yaml::from_slice(data)?;
        Self::from_definitions(definitions, capacity)
    }

    /// Reads and builds a YAML automata file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AutomataError> {
        Self::from_file_with_capacity(path, DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn from_file_with_capacity(
        path: impl AsRef<Path>,
        capacity: usize,
    ) -> Result<Self, AutomataError> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        tracing::debug!("Read {} bytes from {}", data.len(), path.display());
        Self::from_slice_with_capacity(&data, capacity)
    }

    /// Hands the event to every automaton, in name order.
    pub fn process(&mut self, event: &E) {
        for automaton in self.automata.values_mut() {
            automaton.process(event);
        }
    }

    /// Captures the current state and timestamp of every automaton.
    pub fn persist(&self) -> AutomataState {
        self.automata
            .iter()
            .map(|(name, automaton)| {
                (
                    name.clone(),
                    AutomatonState {
                        state: automaton.state_name().to_string(),
                        since: automaton.since(),
                    },
                )
            })
            .collect()
    }

    /// Moves automata back to persisted positions.
    ///
    /// Entries naming an unknown automaton are skipped. An unknown state
    /// keeps the automaton where it is, but its timestamp is still restored.
    pub fn restore(&mut self, snapshot: &AutomataState) {
        for (name, persisted) in snapshot {
            let Some(automaton) = self.automata.get_mut(name) else {
                tracing::warn!("Snapshot names unknown automaton '{}', skipping", name);
                continue;
            };
            if !automaton.restore(&persisted.state, persisted.since) {
                tracing::warn!(
                    "Snapshot state '{}' not found in automaton '{}', keeping '{}'",
                    persisted.state,
                    name,
                    automaton.state_name()
                );
            }
        }
    }
}

impl<E> FromStr for Automata<E>
where
    E: fmt::Display + Clone,
{
    type Err = AutomataError;

    /// Parses and builds a YAML automata document.
    fn from_str(data: &str) -> Result<Self, Self::Err> {
        Self::from_slice(data.as_bytes())
    }
}

impl<E> Automata<E> {
    /// Receiving end of the shared action queue.
    pub fn actions(&self) -> &Receiver<Action<E>> {
        &self.actions
    }

    /// Receiving end of the shared change queue.
    pub fn changes(&self) -> &Receiver<Change> {
        &self.changes
    }

    /// Takes every queued action without blocking.
    pub fn try_drain_actions(&self) -> Vec<Action<E>> {
        self.actions.try_iter().collect()
    }

    /// Takes every queued change without blocking.
    pub fn try_drain_changes(&self) -> Vec<Change> {
        self.changes.try_iter().collect()
    }

    pub fn get(&self, name: &str) -> Option<&Automaton<E>> {
        self.automata.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Automaton<E>> {
        self.automata.get_mut(name)
    }

    /// Returns all automaton names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.automata.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.automata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.automata.is_empty()
    }
}

impl<E> fmt::Display for Automata<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, automaton)) in self.automata.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", name, automaton.state_name())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use automata_core::LoadError;
    use chrono::Utc;

    const HOUSE: &str = r#"
door:
  start: Closed
  states:
    Closed:
    Open:
      entering: [light_on]
      leaving: [light_off]
  transitions:
    Closed->Open:
      - when: door.open
    Open->Closed:
      - when: door.close
alarm:
  start: Disarmed
  states:
    Disarmed:
    Armed:
    Ringing:
      entering: [siren]
  transitions:
    Disarmed->Armed:
      - when: alarm.arm
    Armed->Ringing:
      - when: door.* or window.*
    Armed,Ringing->Disarmed:
      - when: alarm.disarm
"#;

    fn house() -> Automata<String> {
        HOUSE.parse().unwrap()
    }

    fn event(s: &str) -> String {
        s.to_string()
    }

    #[test]
    fn test_load_multiple_automata() {
        let automata = house();
        assert_eq!(automata.len(), 2);
        assert!(!automata.is_empty());
        assert_eq!(automata.names().collect::<Vec<_>>(), vec!["alarm", "door"]);
        assert_eq!(automata.get("door").unwrap().state_name(), "Closed");
        assert_eq!(automata.to_string(), "alarm: Disarmed, door: Closed");
    }

    #[test]
    fn test_broadcast_reaches_every_automaton() {
        let mut automata = house();
        automata.process(&event("alarm.arm"));
        automata.process(&event("door.open"));

        assert_eq!(automata.to_string(), "alarm: Ringing, door: Open");

        let actions: Vec<String> = automata
            .try_drain_actions()
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(actions, vec!["siren", "light_on"]);

        let changes = automata.try_drain_changes();
        let moves: Vec<(&str, &str, &str)> = changes
            .iter()
            .map(|c| (c.automaton.as_str(), c.old.as_str(), c.new.as_str()))
            .collect();
        assert_eq!(
            moves,
            vec![
                ("alarm", "Disarmed", "Armed"),
                ("alarm", "Armed", "Ringing"),
                ("door", "Closed", "Open"),
            ]
        );
    }

    #[test]
    fn test_build_failure_names_automaton() {
        let yaml = r#"
good:
  start: A
  states: {A: {}}
  transitions: {A: [{when: x}]}
bad:
  start: A
  states: {A: {}}
"#;
        let err = yaml.parse::<Automata>().unwrap_err();
        assert_eq!(err.automaton(), Some("bad"));
        assert_eq!(err.load_error(), Some(&LoadError::MissingTransitions));
        assert_eq!(err.to_string(), "bad: missing transitions entries");
    }

    #[test]
    fn test_invalid_document() {
        let err = "invalid: {}".parse::<Automata>().unwrap_err();
        assert_eq!(err.load_error(), Some(&LoadError::MissingStart));

        let err = "- not\n- a map\n".parse::<Automata>().unwrap_err();
        assert!(matches!(err, AutomataError::Yaml(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = Automata::<String>::from_file("/nonexistent/automata.yaml").unwrap_err();
        match err {
            AutomataError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            other => panic!("expected I/O error, got {other}"),
        }
    }

    #[test]
    fn test_persist_restore_roundtrip() {
        let mut automata = house();
        automata.process(&event("door.open"));
        let snapshot = automata.persist();
        assert_eq!(snapshot["door"].state, "Open");
        assert_eq!(snapshot["alarm"].state, "Disarmed");

        let mut fresh = house();
        fresh.restore(&snapshot);
        assert_eq!(fresh.persist(), snapshot);
        assert!(fresh.try_drain_actions().is_empty());
        assert!(fresh.try_drain_changes().is_empty());

        let mut same = house();
        let before = same.persist();
        same.restore(&before);
        assert_eq!(same.persist(), before);
    }

    #[test]
    fn test_restore_skips_unknown_entries() {
        let mut automata = house();
        let before = automata.persist();
        let since = Utc::now() - chrono::Duration::hours(3);

        let mut snapshot = AutomataState::new();
        snapshot.insert(
            "door".to_string(),
            AutomatonState {
                state: "Ajar".to_string(),
                since,
            },
        );
        snapshot.insert(
            "garage".to_string(),
            AutomatonState {
                state: "Open".to_string(),
                since: Utc::now(),
            },
        );
        automata.restore(&snapshot);

        let after = automata.persist();
        assert_eq!(after["door"].state, "Closed");
        assert_eq!(after["door"].since, since);
        assert_eq!(after["alarm"], before["alarm"]);
        assert!(automata.get("garage").is_none());
    }

    #[test]
    fn test_zero_capacity_is_raised() {
        let mut automata: Automata = Automata::from_slice_with_capacity(HOUSE.as_bytes(), 0).unwrap();
        automata.process(&event("door.open"));

        let actions: Vec<String> = automata
            .try_drain_actions()
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(actions, vec!["light_on"]);
        assert_eq!(automata.try_drain_changes().len(), 1);
    }

    #[test]
    fn test_full_queue_blocks_until_drained() {
        let mut automata: Automata = Automata::from_slice_with_capacity(HOUSE.as_bytes(), 1).unwrap();
        let actions = automata.actions().clone();
        let changes = automata.changes().clone();

        let action_consumer = std::thread::spawn(move || {
            actions.iter().take(3).map(|a| a.name).collect::<Vec<_>>()
        });
        let change_consumer = std::thread::spawn(move || {
            changes.iter().take(3).map(|c| c.new).collect::<Vec<_>>()
        });

        automata.process(&event("door.open"));
        automata.process(&event("door.close"));
        automata.process(&event("door.open"));

        assert_eq!(
            action_consumer.join().unwrap(),
            vec!["light_on", "light_off", "light_on"]
        );
        assert_eq!(change_consumer.join().unwrap(), vec!["Open", "Closed", "Open"]);
    }
}
