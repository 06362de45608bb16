//! In-memory device answering the command lines the executor produces.
//!
//! Understands `version`, `devices -l`, `push`, `pull`, and the shell commands issued by
//! the remote file operations (`mkdir -p`, `touch`, `rm`, `mv`, `cat`,
//! `printf ... >>`, `ls -la`). Error text mimics the device's toolbox.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use adbx_fsops::{CommandOutput, CommandRunner, ExecError, ExecResult, Invocation};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Dir,
    File(Vec<u8>),
}

/// Scripted [`CommandRunner`] backed by an in-memory remote filesystem.
#[derive(Debug)]
pub struct FakeDevice {
    device_id: String,
    tool_version: Option<String>,
    latency: Duration,
    nodes: Mutex<BTreeMap<String, Node>>,
    commands: Mutex<Vec<String>>,
    failures: Mutex<Vec<(String, String)>>,
}

impl FakeDevice {
    /// Empty device (only `/` exists) answering to `device_id`.
    #[must_use]
    pub fn new(device_id: impl Into<String>) -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert("/".to_string(), Node::Dir);
        Self {
            device_id: device_id.into(),
            tool_version: Some("1.0.41".to_string()),
            latency: Duration::ZERO,
            nodes: Mutex::new(nodes),
            commands: Mutex::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
        }
    }

    /// Delay every command by `latency`, honouring cancellation.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Report `version` from `adb version`; `None` prints no version line.
    #[must_use]
    pub fn with_tool_version(mut self, version: Option<&str>) -> Self {
        self.tool_version = version.map(str::to_string);
        self
    }

    /// Identifier the device answers to.
    #[must_use]
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Create `path` and its parents.
    pub fn add_dir(&self, path: &str) {
        let mut nodes = self.lock_nodes();
        for prefix in prefixes(&normalize(path)) {
            nodes.entry(prefix).or_insert(Node::Dir);
        }
    }

    /// Create a file with `contents`, creating parents as needed.
    pub fn add_file(&self, path: &str, contents: impl Into<Vec<u8>>) {
        let path = normalize(path);
        if let Some(parent) = parent_of(&path) {
            self.add_dir(parent);
        }
        self.lock_nodes().insert(path, Node::File(contents.into()));
    }

    /// Whether anything exists at `path`.
    #[must_use]
    pub fn exists(&self, path: &str) -> bool {
        self.lock_nodes().contains_key(&normalize(path))
    }

    /// Whether `path` is a directory.
    #[must_use]
    pub fn is_dir(&self, path: &str) -> bool {
        matches!(self.lock_nodes().get(&normalize(path)), Some(Node::Dir))
    }

    /// Contents of the file at `path`.
    #[must_use]
    pub fn read(&self, path: &str) -> Option<String> {
        match self.lock_nodes().get(&normalize(path)) {
            Some(Node::File(bytes)) => Some(String::from_utf8_lossy(bytes).into_owned()),
            _ => None,
        }
    }

    /// Names directly under `path`, sorted.
    #[must_use]
    pub fn children(&self, path: &str) -> Vec<String> {
        let path = normalize(path);
        self.lock_nodes()
            .keys()
            .filter(|key| parent_of(key) == Some(path.as_str()))
            .map(|key| name_of(key).to_string())
            .collect()
    }

    /// Every invocation received, arguments joined by spaces.
    #[must_use]
    pub fn commands(&self) -> Vec<String> {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Fail any shell command line starting with `prefix`, printing `stderr`.
    pub fn fail_when(&self, prefix: impl Into<String>, stderr: impl Into<String>) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((prefix.into(), stderr.into()));
    }

    fn lock_nodes(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Node>> {
        self.nodes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn scripted_failure(&self, line: &str) -> Option<CommandOutput> {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()))
            .map(|(_, stderr)| CommandOutput::failure(1, stderr.clone()))
    }

    fn dispatch(&self, args: &[String]) -> CommandOutput {
        match args {
            [version] if version == "version" => match &self.tool_version {
                Some(release) => CommandOutput::success(format!(
                    "Android Debug Bridge version {release}\nVersion 35.0.2-12147458\nInstalled as /usr/bin/adb\n"
                )),
                None => CommandOutput::success("adb: unknown tool\n"),
            },
            [devices, long] if devices == "devices" && long == "-l" => CommandOutput::success(
                format!(
                    "List of devices attached\n{} device product:fake model:Fake_Device transport_id:1\n\n",
                    self.device_id
                ),
            ),
            [flag, device, rest @ ..] if flag == "-s" => {
                if *device != self.device_id {
                    return CommandOutput::failure(1, format!("adb: device '{device}' not found"));
                }
                self.device_command(rest)
            }
            _ => CommandOutput::failure(1, "adb: unknown command"),
        }
    }

    fn device_command(&self, args: &[String]) -> CommandOutput {
        match args {
            [shell, line] if shell == "shell" => {
                if let Some(failure) = self.scripted_failure(line) {
                    return failure;
                }
                self.shell(&split_words(line))
            }
            [verb, source, destination] if verb == "push" => {
                self.push(Path::new(source), &normalize(destination))
            }
            [verb, source, destination] if verb == "pull" => {
                self.pull(&normalize(source), Path::new(destination))
            }
            _ => CommandOutput::failure(1, "adb: usage: unknown command"),
        }
    }

    fn shell(&self, words: &[String]) -> CommandOutput {
        let words: Vec<&str> = words.iter().map(String::as_str).collect();
        match words.as_slice() {
            ["mkdir", "-p", path] => self.mkdir(&normalize(path)),
            ["touch", path] => self.touch(&normalize(path)),
            ["rm", flag, paths @ ..] if flag.starts_with('-') => {
                self.rm(flag.contains('r'), paths)
            }
            ["mv", source, destination] => self.mv(&normalize(source), &normalize(destination)),
            ["cat", path] => self.cat(&normalize(path)),
            ["printf", _, text, ">>", path] => self.append(&normalize(path), text),
            ["ls", "-la", path] => self.ls(&normalize(path)),
            [program, ..] => CommandOutput::failure(127, format!("/system/bin/sh: {program}: inaccessible or not found")),
            [] => CommandOutput::success(""),
        }
    }

    fn mkdir(&self, path: &str) -> CommandOutput {
        let mut nodes = self.lock_nodes();
        for prefix in prefixes(path) {
            match nodes.get(&prefix) {
                Some(Node::File(_)) => {
                    return CommandOutput::failure(1, format!("mkdir: '{prefix}': Not a directory"));
                }
                Some(Node::Dir) => {}
                None => {
                    nodes.insert(prefix, Node::Dir);
                }
            }
        }
        CommandOutput::success("")
    }

    fn touch(&self, path: &str) -> CommandOutput {
        let mut nodes = self.lock_nodes();
        if !parent_is_dir(&nodes, path) {
            return CommandOutput::failure(1, format!("touch: '{path}': No such file or directory"));
        }
        nodes.entry(path.to_string()).or_insert_with(|| Node::File(Vec::new()));
        CommandOutput::success("")
    }

    fn rm(&self, recursive: bool, paths: &[&str]) -> CommandOutput {
        let mut nodes = self.lock_nodes();
        let mut errors = Vec::new();
        for raw in paths {
            let path = normalize(raw);
            match nodes.get(&path) {
                None => {}
                Some(Node::Dir) if !recursive => errors.push(format!("rm: {path}: Is a directory")),
                Some(_) => remove_tree(&mut nodes, &path),
            }
        }
        if errors.is_empty() {
            CommandOutput::success("")
        } else {
            CommandOutput::failure(1, errors.join("\n"))
        }
    }

    fn mv(&self, source: &str, destination: &str) -> CommandOutput {
        let mut nodes = self.lock_nodes();
        if !nodes.contains_key(source) {
            return CommandOutput::failure(1, format!("mv: bad '{source}': No such file or directory"));
        }
        let target = match nodes.get(destination) {
            Some(Node::Dir) => join(destination, name_of(source)),
            _ => destination.to_string(),
        };
        if target == source || is_inside(&target, source) {
            return CommandOutput::failure(1, format!("mv: '{source}' to '{target}': Invalid argument"));
        }
        if !parent_is_dir(&nodes, &target) {
            return CommandOutput::failure(1, format!("mv: '{target}': No such file or directory"));
        }
        if nodes.get(&target) == Some(&Node::Dir) {
            return CommandOutput::failure(1, format!("mv: '{target}': Directory not empty"));
        }
        let moved: Vec<(String, Node)> = nodes
            .iter()
            .filter(|(key, _)| *key == source || is_inside(key, source))
            .map(|(key, node)| (format!("{target}{}", &key[source.len()..]), node.clone()))
            .collect();
        remove_tree(&mut nodes, source);
        nodes.extend(moved);
        CommandOutput::success("")
    }

    fn cat(&self, path: &str) -> CommandOutput {
        match self.lock_nodes().get(path) {
            Some(Node::File(bytes)) => CommandOutput::success(String::from_utf8_lossy(bytes)),
            Some(Node::Dir) => CommandOutput::failure(1, format!("cat: {path}: Is a directory")),
            None => CommandOutput::failure(1, format!("cat: {path}: No such file or directory")),
        }
    }

    fn append(&self, path: &str, text: &str) -> CommandOutput {
        let mut nodes = self.lock_nodes();
        if !parent_is_dir(&nodes, path) {
            return CommandOutput::failure(1, format!("/system/bin/sh: can't create {path}: No such file or directory"));
        }
        match nodes.entry(path.to_string()).or_insert_with(|| Node::File(Vec::new())) {
            Node::File(bytes) => {
                bytes.extend_from_slice(text.as_bytes());
                bytes.push(b'\n');
                CommandOutput::success("")
            }
            Node::Dir => CommandOutput::failure(1, format!("/system/bin/sh: can't create {path}: Is a directory")),
        }
    }

    fn ls(&self, path: &str) -> CommandOutput {
        let nodes = self.lock_nodes();
        match nodes.get(path) {
            None => CommandOutput::failure(1, format!("ls: {path}: No such file or directory")),
            Some(node @ Node::File(_)) => CommandOutput::success(format!("{}\n", ls_line(node, path))),
            Some(Node::Dir) => {
                let mut lines = vec![
                    format!("total {}", nodes.len()),
                    ls_line(&Node::Dir, "."),
                    ls_line(&Node::Dir, ".."),
                ];
                lines.extend(
                    nodes
                        .iter()
                        .filter(|(key, _)| parent_of(key) == Some(path))
                        .map(|(key, node)| ls_line(node, name_of(key))),
                );
                CommandOutput::success(lines.join("\n") + "\n")
            }
        }
    }

    fn push(&self, source: &Path, destination: &str) -> CommandOutput {
        let Ok(bytes) = std::fs::read(source) else {
            return CommandOutput::failure(
                1,
                format!("adb: error: cannot stat '{}': No such file or directory", source.display()),
            );
        };
        let mut nodes = self.lock_nodes();
        let target = match nodes.get(destination) {
            Some(Node::Dir) => join(
                destination,
                &source.file_name().map_or_else(String::new, |name| name.to_string_lossy().into_owned()),
            ),
            _ => destination.to_string(),
        };
        if !parent_is_dir(&nodes, &target) {
            return CommandOutput::failure(
                1,
                format!("adb: error: failed to copy '{}' to '{target}': remote couldn't create file: No such file or directory", source.display()),
            );
        }
        nodes.insert(target, Node::File(bytes));
        CommandOutput::success(format!("{}: 1 file pushed, 0 skipped.\n", source.display()))
    }

    fn pull(&self, source: &str, destination: &Path) -> CommandOutput {
        let tree: Vec<(String, Node)> = {
            let nodes = self.lock_nodes();
            nodes
                .iter()
                .filter(|(key, _)| *key == source || is_inside(key, source))
                .map(|(key, node)| (key.clone(), node.clone()))
                .collect()
        };
        if tree.is_empty() {
            return CommandOutput::failure(
                1,
                format!("adb: error: failed to stat remote object '{source}': No such file or directory"),
            );
        }
        let root: PathBuf = if destination.is_dir() {
            destination.join(name_of(source))
        } else {
            destination.to_path_buf()
        };
        for (key, node) in tree {
            let relative = key[source.len()..].trim_start_matches('/');
            let host = if relative.is_empty() { root.clone() } else { root.join(relative) };
            let written = match node {
                Node::Dir => std::fs::create_dir_all(&host),
                Node::File(bytes) => std::fs::write(&host, bytes),
            };
            if let Err(err) = written {
                return CommandOutput::failure(
                    1,
                    format!("adb: error: cannot create '{}': {err}", host.display()),
                );
            }
        }
        CommandOutput::success(format!("{source}: 1 file pulled, 0 skipped.\n"))
    }
}

#[async_trait]
impl CommandRunner for FakeDevice {
    async fn run(
        &self,
        invocation: Invocation,
        cancel: CancellationToken,
    ) -> ExecResult<CommandOutput> {
        let args = invocation.args_lossy();
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(args.join(" "));
        if !self.latency.is_zero() {
            tokio::select! {
                () = tokio::time::sleep(self.latency) => {}
                () = cancel.cancelled() => return Err(ExecError::Interrupted),
            }
        }
        Ok(self.dispatch(&args))
    }
}

fn ls_line(node: &Node, name: &str) -> String {
    match node {
        Node::Dir => format!("drwxrwx--x 2 root sdcard_rw 3488 2026-10-16 09:30 {name}"),
        Node::File(bytes) => format!(
            "-rw-rw---- 1 root sdcard_rw {} 2026-10-16 09:30 {name}",
            bytes.len()
        ),
    }
}

/// Split a command line the way a POSIX shell would for single-quoted words.
fn split_words(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut started = false;
    let mut quoted = false;
    let mut chars = line.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\'' => {
                quoted = !quoted;
                started = true;
            }
            '\\' if !quoted => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
                started = true;
            }
            ' ' if !quoted => {
                if started {
                    words.push(std::mem::take(&mut current));
                    started = false;
                }
            }
            other => {
                current.push(other);
                started = true;
            }
        }
    }
    if started {
        words.push(current);
    }
    words
}

fn normalize(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

fn parent_of(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/"),
        Some(index) => Some(&path[..index]),
        None => None,
    }
}

fn name_of(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn join(directory: &str, name: &str) -> String {
    if directory == "/" {
        format!("/{name}")
    } else {
        format!("{directory}/{name}")
    }
}

fn is_inside(path: &str, ancestor: &str) -> bool {
    (ancestor == "/" && path != "/")
        || path
            .strip_prefix(ancestor)
            .is_some_and(|rest| rest.starts_with('/'))
}

fn prefixes(path: &str) -> Vec<String> {
    let mut out = vec!["/".to_string()];
    let mut current = String::new();
    for segment in path.split('/').filter(|segment| !segment.is_empty()) {
        current.push('/');
        current.push_str(segment);
        out.push(current.clone());
    }
    out
}

fn parent_is_dir(nodes: &BTreeMap<String, Node>, path: &str) -> bool {
    parent_of(path).is_some_and(|parent| nodes.get(parent) == Some(&Node::Dir))
}

fn remove_tree(nodes: &mut BTreeMap<String, Node>, path: &str) {
    nodes.retain(|key, _| key != path && !is_inside(key, path));
}
