//! Recycle metadata encoded into a trashed item's own filename.
//!
//! # Design
//! - Layout: `{deleted_at}␞{percent-encoded parent}␞{original name}`.
//! - The parent is percent-encoded, so it never contains a separator or `␞`
//!   and decoding is exact.
//! - Timestamps are truncated to milliseconds when an entry is built so the
//!   encoded form carries every bit of the stored value.
//! - Percent-encoding grows with the parent's depth; entries whose name would
//!   not fit in one device filename are refused when built.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::path::{FsPath, PathKind, validate_segment};
use crate::error::{CoreError, CoreResult};

/// Reserved separator between the fields of a recycle filename (U+241E).
pub const RECYCLE_SEPARATOR: char = '\u{241E}';

/// Deletion timestamp format used inside recycle filenames.
pub const RECYCLE_TIME_FORMAT: &str = "%Y%m%dT%H%M%S%.3fZ";

/// Longest recycle filename, in bytes, the device filesystem accepts.
pub const RECYCLE_NAME_MAX: usize = 255;

/// Information needed to restore a trashed item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecycleIndexEntry {
    original_parent: FsPath,
    original_name: String,
    deleted_at: DateTime<Utc>,
}

impl RecycleIndexEntry {
    /// Build an entry for an item named `original_name` deleted from `original_parent`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidPath`] when the parent is not a remote path,
    /// the name is not a single valid segment, or the encoded name would be
    /// longer than [`RECYCLE_NAME_MAX`] bytes.
    pub fn new(
        original_parent: FsPath,
        original_name: impl Into<String>,
        deleted_at: DateTime<Utc>,
    ) -> CoreResult<Self> {
        let original_name = original_name.into();
        if original_parent.kind() != PathKind::Remote {
            return Err(CoreError::invalid_path(
                "recycle_index",
                original_parent.full_path(),
                "recycle entries track remote paths only",
            ));
        }
        validate_segment(PathKind::Remote, &original_name)?;
        let deleted_at =
            DateTime::from_timestamp_millis(deleted_at.timestamp_millis()).unwrap_or(deleted_at);
        let entry = Self {
            original_parent: original_parent.as_directory(true),
            original_name,
            deleted_at,
        };
        if entry.encode().len() > RECYCLE_NAME_MAX {
            let original = entry
                .original_path(false)
                .map_or_else(|_| entry.original_name.clone(), |path| path.full_path().to_string());
            return Err(CoreError::invalid_path(
                "recycle_index",
                original,
                "recycle name exceeds 255 bytes",
            ));
        }
        Ok(entry)
    }

    /// Directory the item was deleted from.
    #[must_use]
    pub const fn original_parent(&self) -> &FsPath {
        &self.original_parent
    }

    /// Name the item had before it was trashed.
    #[must_use]
    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    /// Deletion time, millisecond precision.
    #[must_use]
    pub const fn deleted_at(&self) -> DateTime<Utc> {
        self.deleted_at
    }

    /// Location the item is restored to.
    ///
    /// # Errors
    ///
    /// Propagates [`CoreError::InvalidPath`] from joining the stored name.
    pub fn original_path(&self, is_directory: bool) -> CoreResult<FsPath> {
        self.original_parent.join(&self.original_name, is_directory)
    }

    /// Filename used for the item while it sits in the recycle root.
    #[must_use]
    pub fn encode(&self) -> String {
        format!(
            "{}{sep}{}{sep}{}",
            self.deleted_at.format(RECYCLE_TIME_FORMAT),
            urlencoding::encode(self.original_parent.full_path()),
            self.original_name,
            sep = RECYCLE_SEPARATOR,
        )
    }

    /// Decode a recycle filename for an item on `device_id`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CorruptTrashEntry`] when any field is missing or
    /// malformed.
    pub fn decode(trashed_name: &str, device_id: &str) -> CoreResult<Self> {
        let mut fields = trashed_name.splitn(3, RECYCLE_SEPARATOR);
        let (Some(stamp), Some(parent), Some(name)) = (fields.next(), fields.next(), fields.next())
        else {
            return Err(CoreError::corrupt_trash(
                trashed_name,
                "missing recycle separator",
            ));
        };

        let deleted_at = NaiveDateTime::parse_from_str(stamp, RECYCLE_TIME_FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(|_| CoreError::corrupt_trash(trashed_name, "unreadable deletion time"))?;
        let parent = urlencoding::decode(parent)
            .map_err(|_| CoreError::corrupt_trash(trashed_name, "unreadable parent path"))?;
        let parent = FsPath::remote(device_id, &parent, true)
            .map_err(|_| CoreError::corrupt_trash(trashed_name, "invalid parent path"))?;

        Self::new(parent, name, deleted_at)
            .map_err(|_| CoreError::corrupt_trash(trashed_name, "invalid original name"))
    }
}
