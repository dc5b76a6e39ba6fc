use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::task::Task;

/// File name of the single persisted record inside the data directory.
pub const STORAGE_KEY: &str = "todo-storage.json";

pub const SNAPSHOT_VERSION: u32 = 0;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PersistedState {
    #[serde(default)]
    pub todos: Vec<Task>,
}

/// The full persisted document: the task collection plus store metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    pub state: PersistedState,
    #[serde(default)]
    pub version: u32,
}

impl Snapshot {
    pub fn new(todos: Vec<Task>) -> Self {
        Self {
            state: PersistedState { todos },
            version: SNAPSHOT_VERSION,
        }
    }
}

/// Durable key-value collaborator the task store saves into.
pub trait Storage {
    /// Returns `None` when nothing has been saved yet.
    fn load(&self) -> anyhow::Result<Option<Snapshot>>;

    fn save(&mut self, snapshot: &Snapshot) -> anyhow::Result<()>;
}

#[derive(Debug)]
pub struct JsonFileStorage {
    pub data_dir: PathBuf,
    pub path: PathBuf,
}

impl JsonFileStorage {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let path = data_dir.join(STORAGE_KEY);

        info!(
            data_dir = %data_dir.display(),
            file = %path.display(),
            "opened storage"
        );

        Ok(Self { data_dir, path })
    }
}

impl Storage for JsonFileStorage {
    #[tracing::instrument(skip(self))]
    fn load(&self) -> anyhow::Result<Option<Snapshot>> {
        if !self.path.exists() {
            debug!(file = %self.path.display(), "no saved snapshot yet");
            return Ok(None);
        }

        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed reading {}", self.path.display()))?;
        if raw.trim().is_empty() {
            return Ok(None);
        }

        let snapshot: Snapshot = serde_json::from_str(&raw)
            .with_context(|| format!("failed parsing {}", self.path.display()))?;
        if snapshot.version != SNAPSHOT_VERSION {
            warn!(
                found = snapshot.version,
                expected = SNAPSHOT_VERSION,
                "snapshot version differs; loading anyway"
            );
        }

        debug!(count = snapshot.state.todos.len(), "loaded snapshot");
        Ok(Some(snapshot))
    }

    #[tracing::instrument(skip(self, snapshot))]
    fn save(&mut self, snapshot: &Snapshot) -> anyhow::Result<()> {
        debug!(
            file = %self.path.display(),
            count = snapshot.state.todos.len(),
            "saving snapshot atomically"
        );
        save_json_atomic(&self.path, snapshot)
            .with_context(|| format!("failed to save {}", self.path.display()))
    }
}

/// Keeps the snapshot in memory. Used by tests and embedders that bring
/// their own durability.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    saved: Option<Snapshot>,
    pub saves: usize,
}

impl MemoryStorage {
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            saved: Some(snapshot),
            saves: 0,
        }
    }
}

impl Storage for MemoryStorage {
    fn load(&self) -> anyhow::Result<Option<Snapshot>> {
        Ok(self.saved.clone())
    }

    fn save(&mut self, snapshot: &Snapshot) -> anyhow::Result<()> {
        self.saved = Some(snapshot.clone());
        self.saves += 1;
        Ok(())
    }
}

fn save_json_atomic(path: &Path, snapshot: &Snapshot) -> anyhow::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    let serialized = serde_json::to_string(snapshot)?;
    writeln!(temp, "{serialized}")?;
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
