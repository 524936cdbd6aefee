use chrono::{Local, NaiveDateTime, Timelike};
use std::{
    fmt, fs,
    io::Write,
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::{error::StoreError, model::ForecastResponse};

const FILE_PREFIX: &str = "forecast_";
const FILE_SUFFIX: &str = ".json";
/// Fixed width and zero padded, so names sort in creation order.
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Identifies a snapshot by its creation time, at second granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SnapshotId {
    created: NaiveDateTime,
}

impl SnapshotId {
    pub fn at(created: NaiveDateTime) -> Self {
        // sub-second precision is not representable in the file name
        let created = created.with_nanosecond(0).unwrap_or(created);
        Self { created }
    }

    /// Recognizes `forecast_YYYYMMDD_HHMMSS.json`; anything else is `None`.
    pub fn parse(file_name: &str) -> Option<Self> {
        let stamp = file_name.strip_prefix(FILE_PREFIX)?.strip_suffix(FILE_SUFFIX)?;
        let created = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()?;
        let id = Self { created };
        // reject loose widths chrono would otherwise accept
        (id.file_name() == file_name).then_some(id)
    }

    pub fn file_name(&self) -> String {
        format!("{FILE_PREFIX}{}{FILE_SUFFIX}", self.created.format(TIMESTAMP_FORMAT))
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub id: SnapshotId,
    pub response: ForecastResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Created(SnapshotId),
    /// The newest snapshot already holds the same hourly data.
    Unchanged(SnapshotId),
}

/// Flat directory of dated forecast snapshots.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Snapshot ids, oldest first. A missing directory is simply empty.
    pub fn list(&self) -> Vec<SnapshotId> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(dir = %self.dir.display(), error = %e, "cannot list backups");
                }
                return Vec::new();
            }
        };

        let mut ids: Vec<SnapshotId> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|entry| entry.file_name().to_str().and_then(SnapshotId::parse))
            .collect();
        ids.sort();
        ids
    }

    /// The newest snapshot. An unreadable newest file is reported as such;
    /// older snapshots are not consulted.
    pub fn latest(&self) -> Result<Snapshot, StoreError> {
        let id = self
            .list()
            .pop()
            .ok_or_else(|| StoreError::NotFound(self.dir.clone()))?;
        self.read(id)
    }

    pub fn read(&self, id: SnapshotId) -> Result<Snapshot, StoreError> {
        let path = self.path_of(id);
        let bytes = fs::read(&path)
            .map_err(|source| StoreError::Unreadable { path: path.clone(), source })?;
        let response = serde_json::from_slice(&bytes)
            .map_err(|source| StoreError::Corrupt { path, source })?;
        Ok(Snapshot { id, response })
    }

    /// Persists `response` stamped with the current local time, unless its
    /// hourly data matches the newest snapshot.
    pub fn save(&self, response: &ForecastResponse) -> Result<SaveOutcome, StoreError> {
        self.save_at(response, Local::now().naive_local())
    }

    pub fn save_at(
        &self,
        response: &ForecastResponse,
        now: NaiveDateTime,
    ) -> Result<SaveOutcome, StoreError> {
        match self.latest() {
            Ok(latest) if latest.response.hourly() == response.hourly() => {
                debug!(snapshot = %latest.id, "hourly data unchanged");
                return Ok(SaveOutcome::Unchanged(latest.id));
            }
            Ok(_) | Err(StoreError::NotFound(_)) => {}
            Err(e) => debug!(error = %e, "newest backup unusable for comparison"),
        }

        fs::create_dir_all(&self.dir)
            .map_err(|e| StoreError::DirCreation(self.dir.clone(), e))?;

        let id = SnapshotId::at(now);
        let path = self.path_of(id);
        let bytes = serde_json::to_vec(response).map_err(StoreError::Encode)?;

        // write beside the target, then rename, so readers never see a partial file
        let mut tmp = NamedTempFile::new_in(&self.dir)
            .map_err(|e| StoreError::Write(path.clone(), e))?;
        tmp.write_all(&bytes)
            .map_err(|e| StoreError::Write(path.clone(), e))?;
        tmp.persist(&path)
            .map_err(|e| StoreError::Write(path.clone(), e.error))?;

        info!(snapshot = %id, bytes = bytes.len(), "backup saved");
        Ok(SaveOutcome::Created(id))
    }

    fn path_of(&self, id: SnapshotId) -> PathBuf {
        self.dir.join(id.file_name())
    }
}
