//! Test fixtures and environment helpers.

use std::path::Path;
use std::process::Command;
use std::time::{Duration, Instant};

/// Returns `true` if a real `adb` binary is reachable for live tests.
#[must_use]
pub fn adb_available() -> bool {
    adb_available_with_path(std::env::var("ADBX_ADB_PATH").ok())
}

fn adb_available_with_path(path: Option<String>) -> bool {
    if let Some(path) = path {
        return Path::new(&path).exists();
    }
    Command::new("adb")
        .arg("version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Poll `condition` every few milliseconds until it holds or `timeout` passes.
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adb_available_respects_path_env() {
        assert!(!adb_available_with_path(Some(
            "/definitely/missing/adb".into()
        )));
    }

    #[test]
    fn adb_available_checks_default_binary() {
        let _ = adb_available_with_path(None);
    }

    #[tokio::test]
    async fn wait_until_times_out() {
        assert!(!wait_until(Duration::from_millis(20), || false).await);
        let mut calls = 0;
        assert!(
            wait_until(Duration::from_secs(1), || {
                calls += 1;
                calls > 2
            })
            .await
        );
    }
}
