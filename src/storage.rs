//! Local persistence for schedule snapshots.
//!
//! One file per date under the storage root:
//!
//! ```text
//! <root>/
//!   gpv_03-11-2025.json   # Last observed snapshot for that date
//! ```

use std::{fs, io, path::PathBuf};

use crate::model::{ScheduleDate, ScheduleSnapshot};

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = core::result::Result<T, StorageError>;

/// Date-keyed snapshot persistence.
pub trait SnapshotStore: Send + Sync {
    /// The stored snapshot for `date`, or `None` if there is none.
    fn load(&self, date: ScheduleDate) -> Result<Option<ScheduleSnapshot>>;

    /// Store `snapshot` under `date`, replacing any previous value.
    fn save(&self, date: ScheduleDate, snapshot: &ScheduleSnapshot) -> Result<()>;
}

/// Local file-based snapshot storage.
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    /// Creates a new storage instance rooted at the given directory.
    ///
    /// The directory is created if it doesn't exist.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Returns the default storage root: `~/.blackout/data/`.
    pub fn default_root() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".blackout").join("data"))
    }

    fn snapshot_path(&self, date: ScheduleDate) -> PathBuf {
        self.root.join(format!("gpv_{date}.json"))
    }
}

impl SnapshotStore for Storage {
    fn load(&self, date: ScheduleDate) -> Result<Option<ScheduleSnapshot>> {
        let json = match fs::read_to_string(self.snapshot_path(date)) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&json)?))
    }

    fn save(&self, date: ScheduleDate, snapshot: &ScheduleSnapshot) -> Result<()> {
        let json = serde_json::to_string_pretty(snapshot)?;
        // Readers never see a partially written file.
        let path = self.snapshot_path(date);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(tmp, path)?;
        Ok(())
    }
}
