//! automata - feed events to a set of automata and print what they do.
//!
//! Events come from the command line or from stdin, one per line. Actions and
//! changes are printed as they are emitted.

mod config;
mod output;

use automata_runtime::{Automata, SnapshotStore};
use clap::Parser;
use config::Config;
use output::Printer;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::thread;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "automata")]
#[command(about = "Feed events to a set of automata and print their actions and state changes")]
#[command(version)]
struct Cli {
    /// Automata definition file (YAML)
    #[arg(short, long)]
    definition: Option<PathBuf>,

    /// Snapshot directory; restored on start and written after the last event
    #[arg(short, long)]
    snapshot_dir: Option<PathBuf>,

    /// Capacity of the action and change queues
    #[arg(short, long)]
    capacity: Option<usize>,

    /// Print one JSON object per line
    #[arg(long)]
    json: bool,

    /// Events to process (read from stdin when omitted)
    events: Vec<String>,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(path) = &self.definition {
            config.definition = Some(path.clone());
        }
        if let Some(dir) = &self.snapshot_dir {
            config.snapshot_dir = Some(dir.clone());
        }
        if let Some(capacity) = self.capacity {
            config.channel_capacity = capacity;
        }
        if self.json {
            config.json = true;
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::load()?;
    cli.apply(&mut config);

    let definition = config.definition_path()?;
    let mut automata: Automata =
        Automata::from_file_with_capacity(definition, config.channel_capacity)?;
    tracing::info!("Loaded {} from {}", automata, definition.display());

    let store = config
        .snapshot_dir
        .as_ref()
        .map(SnapshotStore::open)
        .transpose()?;
    if let Some(store) = &store {
        if let Some(snapshot) = store.load()? {
            automata.restore(&snapshot);
            tracing::info!("Restored snapshot: {}", automata);
        }
    }

    // Drain both queues off-thread so a full queue never stalls processing
    let printer = Printer { json: config.json };
    let actions = automata.actions().clone();
    let changes = automata.changes().clone();
    let action_printer = thread::spawn(move || {
        for action in actions.iter() {
            println!("{}", printer.action(&action));
        }
    });
    let change_printer = thread::spawn(move || {
        for change in changes.iter() {
            println!("{}", printer.change(&change));
        }
    });

    let mut processed = 0usize;
    if cli.events.is_empty() {
        for line in io::stdin().lock().lines() {
            let line = line?;
            let event = line.trim();
            if event.is_empty() {
                continue;
            }
            automata.process(&event.to_string());
            processed += 1;
        }
    } else {
        for event in &cli.events {
            automata.process(event);
            processed += 1;
        }
    }

    tracing::info!("Processed {} events: {}", processed, automata);

    if let Some(store) = &store {
        store.save(&automata.persist())?;
    }

    // Dropping the automata closes the queues and ends both printers
    drop(automata);
    if action_printer.join().is_err() || change_printer.join().is_err() {
        tracing::error!("Output thread panicked");
    }

    Ok(())
}
