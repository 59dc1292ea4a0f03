//! Snapshot types and a file-backed snapshot store.

use crate::error::SnapshotError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

/// Persisted position of one automaton.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomatonState {
    pub state: String,
    pub since: DateTime<Utc>,
}

/// Persisted positions of every automaton, keyed by automaton name.
pub type AutomataState = BTreeMap<String, AutomatonState>;

/// Metadata stored alongside the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub automata: usize,
    pub created_at: DateTime<Utc>,
    pub size_bytes: u64,
    pub checksum: String,
}

/// Keeps the latest [`AutomataState`] in a directory.
///
/// The snapshot is written as JSON next to a metadata file holding its
/// CRC32C checksum, which is verified on load. Both files are written to a
/// temporary path and renamed into place, snapshot first. A save cut short
/// between the two renames is finished by the next [`SnapshotStore::load`].
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    /// Opens or creates a snapshot store at the given directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Writes a snapshot, replacing the previous one.
    pub fn save(&self, state: &AutomataState) -> Result<SnapshotMeta, SnapshotError> {
        let data = serde_json::to_vec_pretty(state)?;
        let checksum = format!("{:08x}", crc32c::crc32c(&data));

        let meta = SnapshotMeta {
            automata: state.len(),
            created_at: Utc::now(),
            size_bytes: data.len() as u64,
            checksum,
        };

        let snapshot_temp = temp_path(&self.snapshot_path());
        let meta_temp = temp_path(&self.meta_path());
        write_synced(&snapshot_temp, &data)?;
        write_synced(&meta_temp, &serde_json::to_vec_pretty(&meta)?)?;
        fs::rename(&snapshot_temp, self.snapshot_path())?;
        fs::rename(&meta_temp, self.meta_path())?;

        tracing::info!(
            "Saved snapshot of {} automata to {}",
            meta.automata,
            self.dir.display()
        );

        Ok(meta)
    }

    /// Loads the stored snapshot, or `None` if nothing has been saved yet.
    pub fn load(&self) -> Result<Option<AutomataState>, SnapshotError> {
        self.recover()?;

        let snapshot_path = self.snapshot_path();
        if !snapshot_path.exists() {
            return Ok(None);
        }

        let data = fs::read(&snapshot_path)?;
        let meta = self.meta()?.ok_or_else(|| {
            SnapshotError::Corruption(format!(
                "snapshot {} has no metadata",
                snapshot_path.display()
            ))
        })?;

        let actual_checksum = format!("{:08x}", crc32c::crc32c(&data));
        if actual_checksum != meta.checksum {
            return Err(SnapshotError::Corruption(format!(
                "snapshot {} checksum mismatch",
                snapshot_path.display()
            )));
        }

        let state: AutomataState = serde_json::from_slice(&data)?;
        Ok(Some(state))
    }

    /// Returns metadata of the stored snapshot, if any.
    pub fn meta(&self) -> Result<Option<SnapshotMeta>, SnapshotError> {
        let meta_path = self.meta_path();
        if !meta_path.exists() {
            return Ok(None);
        }
        let reader = BufReader::new(File::open(meta_path)?);
        Ok(Some(serde_json::from_reader(reader)?))
    }

    /// Cleans up after a save that did not finish.
    ///
    /// If the snapshot was already renamed into place its pending metadata
    /// is renamed after it; any other leftover temporary file is removed.
    fn recover(&self) -> Result<(), SnapshotError> {
        let snapshot_temp = temp_path(&self.snapshot_path());
        let meta_temp = temp_path(&self.meta_path());

        if snapshot_temp.exists() {
            tracing::warn!("Discarding unfinished snapshot in {}", self.dir.display());
            fs::remove_file(&snapshot_temp)?;
            if meta_temp.exists() {
                fs::remove_file(&meta_temp)?;
            }
        } else if meta_temp.exists() {
            tracing::warn!("Completing interrupted snapshot save in {}", self.dir.display());
            fs::rename(&meta_temp, self.meta_path())?;
        }

        Ok(())
    }

    fn snapshot_path(&self) -> PathBuf {
        self.dir.join("automata.snap")
    }

    fn meta_path(&self) -> PathBuf {
        self.dir.join("automata.meta.json")
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

fn write_synced(path: &Path, data: &[u8]) -> Result<(), SnapshotError> {
    let mut file = File::create(path)?;
    file.write_all(data)?;
    file.sync_all()?;
    Ok(())
}
