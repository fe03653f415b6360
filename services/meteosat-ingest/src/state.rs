//! Cursor state persistence.
//!
//! One small JSON file per source holds the last fully processed scene time.
//! It is only ever replaced through [`atomic_write`], so a reader sees either
//! the previous record or the new one, never a torn write.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use eumdac_client::product::truncate_to_minute;

/// Result type alias using StateError.
pub type StateResult<T> = Result<T, StateError>;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt state file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StateError + '_ {
    move |source| StateError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// The persisted record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorState {
    /// Acquisition time of the last fully processed scene
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "cursor_date"
    )]
    pub date: Option<DateTime<Utc>>,
    /// Local wall-clock time of the last commit, diagnostic only.
    /// Non-string values written by other tools are kept as their JSON text.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_text"
    )]
    pub last_updated: Option<String>,
}

impl CursorState {
    pub fn completed_at(date: DateTime<Utc>) -> Self {
        Self {
            date: Some(truncate_to_minute(date)),
            last_updated: Some(Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()),
        }
    }
}

/// Format of the `date` field: seconds zeroed, literal `Z`.
pub fn format_cursor_date(dt: DateTime<Utc>) -> String {
    truncate_to_minute(dt).format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

mod cursor_date {
    use chrono::{DateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    use eumdac_client::product::truncate_to_minute;

    pub fn serialize<S: Serializer>(value: &Option<DateTime<Utc>>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(dt) => s.serialize_str(&super::format_cursor_date(*dt)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<String>::deserialize(d)? {
            Some(raw) => DateTime::parse_from_rfc3339(&raw)
                .map(|dt| Some(truncate_to_minute(dt.with_timezone(&Utc))))
                .map_err(|e| de::Error::custom(format!("invalid date '{}': {}", raw, e))),
            None => Ok(None),
        }
    }
}

fn lenient_text<'de, D: serde::Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match serde_json::Value::deserialize(d)? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

/// Replace `path` with `contents` atomically.
///
/// The data goes to a fresh temporary file in the same directory, is synced to
/// disk, takes over the permissions (and on unix the ownership) of any existing
/// file, and is then renamed over the target. The temporary file is removed on
/// every failure path.
pub fn atomic_write(path: &Path, contents: &[u8]) -> StateResult<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::Builder::new()
        .prefix(".state-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(io_err(dir))?;

    if let Ok(existing) = fs::metadata(path) {
        copy_metadata(&existing, tmp.path())?;
    }

    tmp.write_all(contents).map_err(io_err(tmp.path()))?;
    tmp.flush().map_err(io_err(tmp.path()))?;
    tmp.as_file().sync_all().map_err(io_err(tmp.path()))?;

    tmp.persist(path).map_err(|e| StateError::Io {
        path: path.to_path_buf(),
        source: e.error,
    })?;

    sync_dir(dir);
    Ok(())
}

fn copy_metadata(existing: &fs::Metadata, tmp: &Path) -> StateResult<()> {
    fs::set_permissions(tmp, existing.permissions()).map_err(io_err(tmp))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        // Only root can give a file away; a failed chown leaves our own ownership.
        if let Err(e) = std::os::unix::fs::chown(tmp, Some(existing.uid()), Some(existing.gid())) {
            debug!(path = %tmp.display(), error = %e, "Could not copy ownership to temp state file");
        }
    }

    Ok(())
}

#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Err(e) = fs::File::open(dir).and_then(|d| d.sync_all()) {
        debug!(dir = %dir.display(), error = %e, "Directory sync failed");
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}

/// The state file of one source.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// Open `{state_dir}/{source}.json`, creating the directory and an empty
    /// `{}` record if they do not exist yet.
    pub fn open(state_dir: &Path, source: &str) -> StateResult<Self> {
        fs::create_dir_all(state_dir).map_err(io_err(state_dir))?;
        let path = state_dir.join(format!("{}.json", source));

        if !path.exists() {
            atomic_write(&path, b"{}")?;
            info!(path = %path.display(), "Initialized empty state file");
        }

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the current record. A missing file reads as the empty record.
    pub fn read(&self) -> StateResult<CursorState> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %self.path.display(), "State file missing, treating as empty");
                return Ok(CursorState::default());
            }
            Err(e) => return Err(io_err(&self.path)(e)),
        };

        serde_json::from_slice(&raw).map_err(|source| StateError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    /// Record `completed` as the last fully processed scene.
    pub fn commit(&self, completed: DateTime<Utc>) -> StateResult<CursorState> {
        let state = CursorState::completed_at(completed);
        let json = serde_json::to_vec(&state)?;
        atomic_write(&self.path, &json)?;
        info!(
            path = %self.path.display(),
            date = %format_cursor_date(completed),
            "Committed cursor state"
        );
        Ok(state)
    }
}
