//! Rendering of actions and changes for the terminal.

use automata_core::{Action, Change};
use colored::Colorize;
use serde_json::json;

#[derive(Debug, Clone, Copy)]
pub struct Printer {
    pub json: bool,
}

impl Printer {
    pub fn action(&self, action: &Action<String>) -> String {
        if self.json {
            json!({
                "type": "action",
                "name": action.name,
                "trigger": action.trigger,
            })
            .to_string()
        } else {
            format!(
                "{} {} (on {})",
                "action".green(),
                action.name.bold(),
                action.trigger
            )
        }
    }

    pub fn change(&self, change: &Change) -> String {
        if self.json {
            json!({
                "type": "change",
                "automaton": change.automaton,
                "old": change.old,
                "new": change.new,
                "since": change.since.to_rfc3339(),
                "duration_ms": change.duration.as_millis() as u64,
            })
            .to_string()
        } else {
            format!(
                "{} {}: {} -> {} after {:?}",
                "change".cyan(),
                change.automaton.bold(),
                change.old,
                change.new,
                change.duration
            )
        }
    }
}
