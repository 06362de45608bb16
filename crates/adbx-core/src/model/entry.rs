//! Directory entries produced by the listing collaborator.

use serde::{Deserialize, Serialize};

use super::path::{FsPath, display_name_for};
use super::recycle::RecycleIndexEntry;

/// Type tag for a listed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    /// Regular file.
    File,
    /// Directory.
    Folder,
    /// Symbolic link.
    Link,
    /// Device nodes, sockets, pipes, and anything else.
    Other,
}

impl EntryType {
    /// Lowercase label used in logs and CLI output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Folder => "folder",
            Self::Link => "link",
            Self::Other => "other",
        }
    }
}

/// A path observed in a directory listing, with the metadata the listing reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    path: FsPath,
    size: Option<u64>,
    entry_type: EntryType,
    is_hidden: bool,
    trash_origin: Option<RecycleIndexEntry>,
}

impl FileEntry {
    /// Wrap a listed path. Folders never carry a size.
    #[must_use]
    pub fn new(path: FsPath, entry_type: EntryType, size: Option<u64>) -> Self {
        let is_folder = entry_type == EntryType::Folder;
        let path = path.as_directory(is_folder);
        let is_hidden = path.full_name().starts_with('.');
        Self {
            path,
            size: if is_folder { None } else { size },
            entry_type,
            is_hidden,
            trash_origin: None,
        }
    }

    /// Wrap a listed path that lives directly under the recycle root, decoding
    /// its recycle metadata when the name carries any.
    #[must_use]
    pub fn in_recycle_root(
        path: FsPath,
        entry_type: EntryType,
        size: Option<u64>,
        recycle_root: &FsPath,
    ) -> Self {
        let mut entry = Self::new(path, entry_type, size);
        let directly_under_root = entry
            .path
            .parent()
            .is_ok_and(|parent| parent.full_path() == recycle_root.full_path());
        if directly_under_root {
            let device = entry.path.device_id().unwrap_or_default();
            entry.trash_origin = RecycleIndexEntry::decode(entry.path.full_name(), device).ok();
        }
        entry
    }

    /// Location of the entry.
    #[must_use]
    pub const fn path(&self) -> &FsPath {
        &self.path
    }

    /// Reported size in bytes, when known.
    #[must_use]
    pub const fn size(&self) -> Option<u64> {
        self.size
    }

    /// Entry type tag.
    #[must_use]
    pub const fn entry_type(&self) -> EntryType {
        self.entry_type
    }

    /// Whether the name starts with a dot.
    #[must_use]
    pub const fn is_hidden(&self) -> bool {
        self.is_hidden
    }

    /// Recycle metadata for entries living under the recycle root.
    #[must_use]
    pub const fn trash_origin(&self) -> Option<&RecycleIndexEntry> {
        self.trash_origin.as_ref()
    }

    /// Name shown to users. Only regular files lose their extension.
    #[must_use]
    pub fn display_name(&self, show_extension: bool) -> String {
        let regular_file = match self.entry_type {
            EntryType::File => true,
            EntryType::Folder | EntryType::Link | EntryType::Other => false,
        };
        display_name_for(self.path.full_name(), regular_file, show_extension)
    }
}
