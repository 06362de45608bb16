//! Transfer engine double with controllable pacing and outcomes.

use std::collections::HashMap;
use std::io::Write as _;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use adbx_core::{ProgressSink, TransferEngine, TransferOutcome, TransferRequest};
use anyhow::bail;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// [`TransferEngine`] that advances in fixed steps and records concurrency.
///
/// When a request carries a progress file, each step also appends a
/// `[ NN%]` line to it, the way the progress helper would.
#[derive(Debug)]
pub struct FakeTransferEngine {
    steps: u32,
    step_delay: Duration,
    helper_available: bool,
    running: AtomicUsize,
    max_running: AtomicUsize,
    started: Mutex<Vec<String>>,
    outcomes: Mutex<HashMap<String, TransferOutcome>>,
}

impl FakeTransferEngine {
    /// Engine taking `steps` steps of `step_delay` per transfer.
    #[must_use]
    pub fn new(steps: u32, step_delay: Duration) -> Self {
        Self {
            steps: steps.max(1),
            step_delay,
            helper_available: true,
            running: AtomicUsize::new(0),
            max_running: AtomicUsize::new(0),
            started: Mutex::new(Vec::new()),
            outcomes: Mutex::new(HashMap::new()),
        }
    }

    /// Make helper deployment fail.
    #[must_use]
    pub const fn without_helper(mut self) -> Self {
        self.helper_available = false;
        self
    }

    /// Finish transfers whose source is `source` with `exit_code`/`stderr`.
    pub fn fail_source(&self, source: impl Into<String>, exit_code: i32, stderr: impl Into<String>) {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                source.into(),
                TransferOutcome {
                    exit_code: Some(exit_code),
                    stderr: stderr.into(),
                },
            );
    }

    /// Transfers currently in flight.
    #[must_use]
    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Highest number of transfers observed in flight at once.
    #[must_use]
    pub fn max_running(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }

    /// Source paths in the order their transfers started.
    #[must_use]
    pub fn started(&self) -> Vec<String> {
        self.started
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl TransferEngine for FakeTransferEngine {
    async fn transfer(
        &self,
        request: TransferRequest,
        progress: ProgressSink,
        cancel: CancellationToken,
    ) -> anyhow::Result<TransferOutcome> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        let _in_flight = InFlight(&self.running);
        self.max_running.fetch_max(now, Ordering::SeqCst);
        let source = request.source.full_path().to_string();
        self.started
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(source.clone());

        for step in 1..=self.steps {
            tokio::select! {
                () = tokio::time::sleep(self.step_delay) => {}
                () = cancel.cancelled() => bail!("transfer interrupted"),
            }
            let fraction = f64::from(step) / f64::from(self.steps);
            if let Some(file) = &request.progress_file {
                let mut handle = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(file)?;
                write!(handle, "[{:>3}%] {source}\r", step * 100 / self.steps)?;
            } else {
                progress.report(fraction);
            }
        }

        let outcome = self
            .outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&source)
            .cloned()
            .unwrap_or(TransferOutcome {
                exit_code: Some(0),
                stderr: String::new(),
            });
        Ok(outcome)
    }

    async fn deploy_progress_helper(&self) -> anyhow::Result<()> {
        if self.helper_available {
            Ok(())
        } else {
            bail!("script: not found")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adbx_core::{FsPath, TransferDirection};
    use std::sync::Arc;
    use uuid::Uuid;

    fn request(source: &str) -> Result<TransferRequest, Box<dyn std::error::Error>> {
        Ok(TransferRequest {
            operation_id: Uuid::new_v4(),
            direction: TransferDirection::Pull,
            device_id: "dev".into(),
            source: FsPath::remote("dev", source, false)?,
            destination: FsPath::host("/tmp/out", false)?,
            progress_file: None,
        })
    }

    #[tokio::test]
    async fn reports_steps_and_configured_outcome() -> Result<(), Box<dyn std::error::Error>> {
        let engine = FakeTransferEngine::new(4, Duration::from_millis(1));
        engine.fail_source("/sd/bad", 1, "adb: error: remote read failed");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let seen = Arc::clone(&seen);
            ProgressSink::new(move |fraction| seen.lock().expect("lock").push(fraction))
        };

        let ok = engine
            .transfer(request("/sd/good")?, sink, CancellationToken::new())
            .await?;
        assert!(ok.succeeded());
        assert_eq!(*seen.lock().expect("lock"), vec![0.25, 0.5, 0.75, 1.0]);

        let bad = engine
            .transfer(request("/sd/bad")?, ProgressSink::noop(), CancellationToken::new())
            .await?;
        assert_eq!(bad.exit_code, Some(1));
        assert_eq!(engine.started(), vec!["/sd/good", "/sd/bad"]);
        assert_eq!(engine.running(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn cancellation_stops_the_transfer() -> Result<(), Box<dyn std::error::Error>> {
        let engine = FakeTransferEngine::new(100, Duration::from_secs(1));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = engine
            .transfer(request("/sd/slow")?, ProgressSink::noop(), cancel)
            .await;
        assert!(result.is_err());
        assert_eq!(engine.running(), 0);
        Ok(())
    }
}
