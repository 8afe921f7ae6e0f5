//! Data structures for journal records.

use chrono::{Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Timestamp format used in journal records (local time, second precision).
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// What happened to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordAction {
    /// Relocated into the batch.
    Moved,
    /// Moved back out of the batch.
    Restored,
    /// Relocation was attempted and failed; nothing was moved.
    Failed,
}

impl std::fmt::Display for RecordAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Moved => write!(f, "moved"),
            Self::Restored => write!(f, "restored"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// One relocation event.
///
/// Identity is `(original, time)`. Records are immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Where the file lived before quarantine.
    pub original: PathBuf,
    /// Location inside the batch (intended location for `failed`).
    pub moved_to: PathBuf,
    /// File size in bytes.
    pub size: u64,
    /// When the event happened.
    #[serde(with = "record_time")]
    pub time: NaiveDateTime,
    /// Event kind.
    pub action: RecordAction,
    /// Final path of a restore that could not use `original`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restored_to: Option<PathBuf>,
    /// Failure cause for `failed` records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileRecord {
    /// A successful relocation into a batch.
    #[must_use]
    pub fn moved(original: PathBuf, moved_to: PathBuf, size: u64) -> Self {
        Self {
            original,
            moved_to,
            size,
            time: now(),
            action: RecordAction::Moved,
            restored_to: None,
            error: None,
        }
    }

    /// A relocation that did not happen.
    #[must_use]
    pub fn failed(original: PathBuf, moved_to: PathBuf, size: u64, error: String) -> Self {
        Self {
            original,
            moved_to,
            size,
            time: now(),
            action: RecordAction::Failed,
            restored_to: None,
            error: Some(error),
        }
    }

    /// The file at `moved_to` was returned to `final_path`.
    ///
    /// `restored_to` is only set when `final_path` differs from `original`.
    #[must_use]
    pub fn restored(from: &FileRecord, final_path: &Path) -> Self {
        let restored_to = (final_path != from.original).then(|| final_path.to_path_buf());
        Self {
            original: from.original.clone(),
            moved_to: from.moved_to.clone(),
            size: from.size,
            time: now(),
            action: RecordAction::Restored,
            restored_to,
            error: None,
        }
    }

    /// Path the file ended up at after a restore.
    #[must_use]
    pub fn final_path(&self) -> &Path {
        self.restored_to.as_deref().unwrap_or(&self.original)
    }
}

/// Current local time truncated to whole seconds.
#[must_use]
pub fn now() -> NaiveDateTime {
    let t = Local::now().naive_local();
    t.with_nanosecond(0).unwrap_or(t)
}

mod record_time {
    use super::TIME_FORMAT;
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&time.format(TIME_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(&raw, TIME_FORMAT).map_err(serde::de::Error::custom)
    }
}
