//! Normalized path values for remote-device and host filesystems.
//!
//! # Design
//! - A path is an immutable value; every constructor normalizes its input.
//! - `full_name` is always derived from `full_path` and never accepted from callers.
//! - Relation checks compare whole segments, so `/sd/foobar` is unrelated to `/sd/foo`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Separator used by remote-device paths.
pub const REMOTE_SEPARATOR: char = '/';
/// Separator used by host paths on the current platform.
pub const HOST_SEPARATOR: char = std::path::MAIN_SEPARATOR;

/// Which filesystem a path belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathKind {
    /// Path on the remote device, reachable only through the external tool.
    Remote,
    /// Path on the host running the engine.
    Host,
}

impl PathKind {
    /// Separator character for this kind of path.
    #[must_use]
    pub const fn separator(self) -> char {
        match self {
            Self::Remote => REMOTE_SEPARATOR,
            Self::Host => HOST_SEPARATOR,
        }
    }

    /// Lowercase label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Host => "host",
        }
    }
}

/// How one path relates to another in the directory hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    /// Both paths name the same location.
    SelfPath,
    /// The other path contains this one.
    Ancestor,
    /// The other path lives underneath this one.
    Descendant,
    /// Neither path contains the other.
    Unrelated,
}

impl Relation {
    /// Relation seen from the opposite side.
    #[must_use]
    pub const fn inverse(self) -> Self {
        match self {
            Self::Ancestor => Self::Descendant,
            Self::Descendant => Self::Ancestor,
            other => other,
        }
    }

    /// Whether a change at a path with this relation to the displayed directory
    /// changes what that directory shows.
    #[must_use]
    pub const fn requires_refresh(self) -> bool {
        matches!(self, Self::SelfPath | Self::Descendant)
    }

    /// Lowercase label used in logs and events.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SelfPath => "self",
            Self::Ancestor => "ancestor",
            Self::Descendant => "descendant",
            Self::Unrelated => "unrelated",
        }
    }
}

/// Normalized filesystem path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "FsPathRepr", into = "FsPathRepr")]
pub struct FsPath {
    kind: PathKind,
    full_path: String,
    full_name: String,
    is_directory: bool,
    device_id: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct FsPathRepr {
    kind: PathKind,
    full_path: String,
    is_directory: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    device_id: Option<String>,
}

impl TryFrom<FsPathRepr> for FsPath {
    type Error = CoreError;

    fn try_from(repr: FsPathRepr) -> Result<Self, Self::Error> {
        match repr.kind {
            PathKind::Remote => {
                let device = repr.device_id.ok_or_else(|| {
                    CoreError::invalid_path(
                        "deserialize",
                        repr.full_path.clone(),
                        "remote path requires a device id",
                    )
                })?;
                Self::remote(device, &repr.full_path, repr.is_directory)
            }
            PathKind::Host => Self::host(&repr.full_path, repr.is_directory),
        }
    }
}

impl From<FsPath> for FsPathRepr {
    fn from(path: FsPath) -> Self {
        Self {
            kind: path.kind,
            full_path: path.full_path,
            is_directory: path.is_directory,
            device_id: path.device_id,
        }
    }
}

impl FsPath {
    /// Build a path on the given remote device.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidPath`] when the input is empty, relative, or
    /// the device identifier is blank.
    pub fn remote(
        device_id: impl Into<String>,
        raw: &str,
        is_directory: bool,
    ) -> CoreResult<Self> {
        let device_id = device_id.into();
        if device_id.trim().is_empty() {
            return Err(CoreError::invalid_path(
                "remote",
                raw,
                "remote path requires a device id",
            ));
        }
        let full_path = normalize(PathKind::Remote, raw)?;
        if !full_path.starts_with(REMOTE_SEPARATOR) {
            return Err(CoreError::invalid_path(
                "remote",
                raw,
                "remote paths must be absolute",
            ));
        }
        Ok(Self::from_normalized(
            PathKind::Remote,
            full_path,
            is_directory,
            Some(device_id),
        ))
    }

    /// Build a path on the host filesystem.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidPath`] when the input is empty.
    pub fn host(raw: &str, is_directory: bool) -> CoreResult<Self> {
        let full_path = normalize(PathKind::Host, raw)?;
        Ok(Self::from_normalized(
            PathKind::Host,
            full_path,
            is_directory,
            None,
        ))
    }

    fn from_normalized(
        kind: PathKind,
        full_path: String,
        is_directory: bool,
        device_id: Option<String>,
    ) -> Self {
        let full_name = name_of(&full_path, kind.separator());
        Self {
            kind,
            full_path,
            full_name,
            is_directory,
            device_id,
        }
    }

    /// Filesystem this path belongs to.
    #[must_use]
    pub const fn kind(&self) -> PathKind {
        self.kind
    }

    /// Normalized full path.
    #[must_use]
    pub fn full_path(&self) -> &str {
        &self.full_path
    }

    /// Last path segment (empty for a root).
    #[must_use]
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Whether the path names a directory.
    #[must_use]
    pub const fn is_directory(&self) -> bool {
        self.is_directory
    }

    /// Owning device for remote paths.
    #[must_use]
    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    /// Whether this path is the root of its filesystem.
    #[must_use]
    pub fn is_root(&self) -> bool {
        is_root(&self.full_path, self.kind.separator())
    }

    /// Same location with a different directory flag.
    #[must_use]
    pub fn as_directory(&self, is_directory: bool) -> Self {
        Self {
            is_directory,
            ..self.clone()
        }
    }

    /// Parent directory of this path.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidPath`] when the path is already a root or has
    /// no separator to strip.
    pub fn parent(&self) -> CoreResult<Self> {
        let sep = self.kind.separator();
        if self.is_root() {
            return Err(CoreError::invalid_path(
                "parent",
                self.full_path.clone(),
                "root has no parent",
            ));
        }
        let Some(index) = self.full_path.rfind(sep) else {
            return Err(CoreError::invalid_path(
                "parent",
                self.full_path.clone(),
                "path has no parent segment",
            ));
        };
        let head = &self.full_path[..index];
        let parent = if head.is_empty() {
            sep.to_string()
        } else if sep == '\\' && head.ends_with(':') {
            format!("{head}{sep}")
        } else {
            head.to_string()
        };
        Ok(Self::from_normalized(
            self.kind,
            parent,
            true,
            self.device_id.clone(),
        ))
    }

    /// Append a single segment to this path.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidPath`] when `name` is empty, `.`/`..`, or
    /// contains a separator.
    pub fn join(&self, name: &str, is_directory: bool) -> CoreResult<Self> {
        validate_segment(self.kind, name)?;
        let sep = self.kind.separator();
        let joined = if self.full_path.ends_with(sep) {
            format!("{}{name}", self.full_path)
        } else {
            format!("{}{sep}{name}", self.full_path)
        };
        Ok(Self::from_normalized(
            self.kind,
            joined,
            is_directory,
            self.device_id.clone(),
        ))
    }

    /// Sibling path with the last segment replaced.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidPath`] for roots and invalid names.
    pub fn with_name(&self, name: &str) -> CoreResult<Self> {
        self.parent()?.join(name, self.is_directory)
    }

    /// Describes how `other` relates to `self`.
    ///
    /// `Descendant` means `other` lives underneath `self`; `Ancestor` means
    /// `other` contains `self`. Paths on different filesystems or devices are
    /// always `Unrelated`.
    #[must_use]
    pub fn relation_from(&self, other: &Self) -> Relation {
        if self.kind != other.kind || self.device_id != other.device_id {
            return Relation::Unrelated;
        }
        let sep = self.kind.separator();
        if self.full_path == other.full_path {
            Relation::SelfPath
        } else if is_within(&other.full_path, &self.full_path, sep) {
            Relation::Descendant
        } else if is_within(&self.full_path, &other.full_path, sep) {
            Relation::Ancestor
        } else {
            Relation::Unrelated
        }
    }

    /// Name shown to users; hides the final extension of regular files when
    /// `show_extension` is false.
    #[must_use]
    pub fn display_name(&self, show_extension: bool) -> String {
        display_name_for(&self.full_name, !self.is_directory, show_extension)
    }
}

impl fmt::Display for FsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_path)
    }
}

pub(crate) fn display_name_for(name: &str, regular_file: bool, show_extension: bool) -> String {
    if show_extension || !regular_file {
        return name.to_string();
    }
    match name.rfind('.') {
        None | Some(0) => name.to_string(),
        Some(index) => name[..index].to_string(),
    }
}

pub(crate) fn validate_segment(kind: PathKind, name: &str) -> CoreResult<()> {
    let reason = if name.is_empty() {
        Some("segment is empty")
    } else if name == "." || name == ".." {
        Some("segment must not be a relative marker")
    } else if name.contains(kind.separator()) || name.contains(REMOTE_SEPARATOR) {
        Some("segment contains a separator")
    } else if name.contains('\0') {
        Some("segment contains a NUL byte")
    } else {
        None
    };
    reason.map_or(Ok(()), |reason| {
        Err(CoreError::invalid_path("join", name, reason))
    })
}

fn normalize(kind: PathKind, raw: &str) -> CoreResult<String> {
    if raw.trim().is_empty() {
        return Err(CoreError::invalid_path(
            "normalize",
            raw,
            "path is empty",
        ));
    }
    if raw.contains('\0') {
        return Err(CoreError::invalid_path(
            "normalize",
            raw,
            "path contains a NUL byte",
        ));
    }

    let sep = kind.separator();
    let mut normalized = String::with_capacity(raw.len());
    for ch in raw.chars() {
        let ch = if kind == PathKind::Host && ch == '/' {
            sep
        } else {
            ch
        };
        if ch == sep && normalized.ends_with(sep) {
            continue;
        }
        normalized.push(ch);
    }
    while normalized.len() > 1 && normalized.ends_with(sep) && !is_root(&normalized, sep) {
        normalized.pop();
    }
    Ok(normalized)
}

fn is_root(path: &str, sep: char) -> bool {
    let mut chars = path.chars();
    match (chars.next(), chars.next(), chars.next(), chars.next()) {
        (Some(first), None, None, None) => first == sep,
        (Some(drive), Some(':'), Some(last), None) => {
            sep == '\\' && drive.is_ascii_alphabetic() && last == sep
        }
        _ => false,
    }
}

fn name_of(full_path: &str, sep: char) -> String {
    if is_root(full_path, sep) {
        return String::new();
    }
    full_path
        .rfind(sep)
        .map_or(full_path, |index| &full_path[index + sep.len_utf8()..])
        .to_string()
}

fn is_within(candidate: &str, base: &str, sep: char) -> bool {
    candidate.len() > base.len()
        && candidate.starts_with(base)
        && (base.ends_with(sep) || candidate[base.len()..].starts_with(sep))
}
