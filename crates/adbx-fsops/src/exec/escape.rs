//! Remote shell command lines built from static words and escaped values.
//!
//! # Design
//! - `ShellCommand` only accepts `&'static str` for anything that is not escaped,
//!   so a runtime string can never reach the device shell unquoted.
//! - Every dynamic value is wrapped in single quotes, with embedded quotes
//!   written as `'\''`.

use adbx_core::FsPath;

/// Quote `value` so a POSIX shell reads it back as exactly one word.
#[must_use]
pub fn escape_shell_arg(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    escaped.push('\'');
    for ch in value.chars() {
        if ch == '\'' {
            escaped.push_str("'\\''");
        } else {
            escaped.push(ch);
        }
    }
    escaped.push('\'');
    escaped
}

/// Command line executed by the device shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    words: Vec<String>,
}

impl ShellCommand {
    /// Start a command line with a fixed program name.
    #[must_use]
    pub fn new(program: &'static str) -> Self {
        Self {
            words: vec![program.to_string()],
        }
    }

    /// Append a fixed flag or shell operator.
    #[must_use]
    pub fn flag(mut self, flag: &'static str) -> Self {
        self.words.push(flag.to_string());
        self
    }

    /// Append a value, always escaped.
    #[must_use]
    pub fn arg(mut self, value: impl AsRef<str>) -> Self {
        self.words.push(escape_shell_arg(value.as_ref()));
        self
    }

    /// Append a path's full path, always escaped.
    #[must_use]
    pub fn path(self, path: &FsPath) -> Self {
        self.arg(path.full_path())
    }

    /// Append every path in order.
    #[must_use]
    pub fn paths<'a>(self, paths: impl IntoIterator<Item = &'a FsPath>) -> Self {
        paths.into_iter().fold(self, Self::path)
    }

    /// Redirect standard output, appending to `path`.
    #[must_use]
    pub fn append_to(self, path: &FsPath) -> Self {
        self.flag(">>").path(path)
    }

    /// Program name this command line starts with.
    #[must_use]
    pub fn program(&self) -> &str {
        self.words.first().map_or("", String::as_str)
    }

    /// Render the single string handed to the device shell.
    #[must_use]
    pub fn render(&self) -> String {
        self.words.join(" ")
    }
}
