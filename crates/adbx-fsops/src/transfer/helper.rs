//! Host-side helper that gives the transfer tool a pseudo-terminal.
//!
//! The tool only prints `[ NN%]` progress when its output is a terminal. The
//! helper runs it under `script(1)` and captures the terminal stream into a
//! progress file the queue can poll.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{FsOpsError, FsOpsResult};
use crate::exec::{CommandRunner, Invocation};

/// File name of the deployed helper.
pub const HELPER_FILE_NAME: &str = "adbx-progress.sh";

const HELPER_SCRIPT: &str = r#"#!/bin/sh
# usage: adbx-progress.sh --check
#        adbx-progress.sh <progress-file> <program> [args...]
if [ "$1" = "--check" ]; then
    script -qfec true /dev/null >/dev/null 2>&1
    exit $?
fi
progress_file=$1
shift
command_line=""
for word in "$@"; do
    quoted=$(printf '%s' "$word" | sed "s/'/'\\\\''/g")
    command_line="$command_line '$quoted'"
done
exec script -qfec "$command_line" /dev/null > "$progress_file" 2>&1
"#;

/// Deploys and verifies the progress helper once per process.
pub struct ProgressHelper {
    dir: PathBuf,
    runner: Arc<dyn CommandRunner>,
    deployed: OnceLock<PathBuf>,
}

impl ProgressHelper {
    /// Helper that will live in `dir`.
    pub fn new(dir: impl Into<PathBuf>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            dir: dir.into(),
            runner,
            deployed: OnceLock::new(),
        }
    }

    /// Directory holding the helper and progress files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the helper once [`ProgressHelper::deploy`] has succeeded.
    #[must_use]
    pub fn script_path(&self) -> Option<&Path> {
        self.deployed.get().map(PathBuf::as_path)
    }

    /// Write the helper if missing or stale, make it executable, and check it.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::Io`] when the helper cannot be written and
    /// [`FsOpsError::RemoteOperationFailed`] when the check fails (no usable
    /// `script` on the host).
    pub async fn deploy(&self) -> FsOpsResult<PathBuf> {
        if let Some(path) = self.deployed.get() {
            return Ok(path.clone());
        }
        let path = self.dir.join(HELPER_FILE_NAME);
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|err| FsOpsError::io("helper.create_dir", &self.dir, err))?;

        if is_current(&path).await {
            debug!(path = %path.display(), "progress helper already deployed");
        } else {
            tokio::fs::write(&path, HELPER_SCRIPT)
                .await
                .map_err(|err| FsOpsError::io("helper.write", &path, err))?;
            info!(path = %path.display(), "progress helper deployed");
        }
        make_executable(&path).await?;

        let check = Invocation::new(&path).arg("--check");
        let output = self
            .runner
            .run(check, CancellationToken::new())
            .await
            .map_err(|err| FsOpsError::from_exec("helper.check", err))?;
        if !output.succeeded() {
            return Err(FsOpsError::RemoteOperationFailed {
                operation: "helper.check",
                exit_code: output.exit_code,
                message: output.stderr,
            });
        }
        Ok(self.deployed.get_or_init(|| path).clone())
    }
}

async fn is_current(path: &Path) -> bool {
    match tokio::fs::read(path).await {
        Ok(existing) => Sha256::digest(&existing) == Sha256::digest(HELPER_SCRIPT.as_bytes()),
        Err(_) => false,
    }
}

#[cfg(unix)]
async fn make_executable(path: &Path) -> FsOpsResult<()> {
    use std::os::unix::fs::PermissionsExt;

    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .await
        .map_err(|err| FsOpsError::io("helper.chmod", path, err))
}

#[cfg(not(unix))]
async fn make_executable(_path: &Path) -> FsOpsResult<()> {
    Ok(())
}
