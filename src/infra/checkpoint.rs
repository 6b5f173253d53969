// ============================================================
// Layer 6 — Run Checkpoint
// ============================================================
// Remembers how far a corpus run got so an interrupted job can
// pick up where it stopped.
//
//   checkpoint.json
//     { "groups_processed": 40000, "input": "args.csv", "updated_unix": 1760000000 }
//
// `groups_processed` counts input rows fully handled, skipped
// rows included, so it can be fed straight back in as the
// resume offset. The file is replaced atomically after every
// group: written to a sibling temp file, then renamed.

use std::{
    fs,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};

use crate::domain::error::{Result, StanceError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointState {
    pub groups_processed: usize,
    pub input:            String,
    pub updated_unix:     u64,
}

pub struct RunCheckpoint {
    path: PathBuf,
}

impl RunCheckpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read the saved state. A missing file means "nothing to resume".
    pub fn load(&self) -> Result<Option<CheckpointState>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&self.path)?;
        let state = serde_json::from_str(&json).map_err(|e| {
            StanceError::config(format!(
                "checkpoint '{}' is unreadable: {e}",
                self.path.display()
            ))
        })?;
        Ok(Some(state))
    }

    pub fn save(&self, groups_processed: usize, input: &Path) -> Result<()> {
        let state = CheckpointState {
            groups_processed,
            input:        input.display().to_string(),
            updated_unix: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        };
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string(&state)?)?;
        fs::rename(&tmp, &self.path)?;
        tracing::trace!("Checkpoint: {} groups processed", groups_processed);
        Ok(())
    }
}
