//! Progress strategies for running transfers.
//!
//! # Design
//! - `SideChannel` polls the per-operation file the progress helper writes
//!   and reports the last `[ NN%]` marker.
//! - `Estimate` reports elapsed time × last observed throughput ÷ size, capped
//!   below completion; the queue reports 1.0 itself when the transfer ends.
//! - Both poll on a fixed interval; neither can fail a transfer.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use adbx_core::{OperationId, ProgressSink};
use adbx_fsops::parse_progress_output;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

const ESTIMATE_CEILING: f64 = 0.99;

/// How transfer progress is observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressStrategy {
    /// Poll progress files under the helper directory.
    SideChannel {
        /// Directory receiving per-operation progress files.
        dir: PathBuf,
    },
    /// Derive progress from elapsed time and observed throughput.
    Estimate,
}

impl ProgressStrategy {
    /// Label used in logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SideChannel { .. } => "side_channel",
            Self::Estimate => "estimate",
        }
    }
}

/// Shared progress state for all transfers of one queue.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    strategy: ProgressStrategy,
    poll: Duration,
    throughput_bps: Arc<AtomicU64>,
}

impl ProgressTracker {
    /// Tracker using `strategy`, polling every `poll`, seeded with
    /// `throughput_bps` for estimates.
    #[must_use]
    pub fn new(strategy: ProgressStrategy, poll: Duration, throughput_bps: u64) -> Self {
        Self {
            strategy,
            poll: poll.max(Duration::from_millis(1)),
            throughput_bps: Arc::new(AtomicU64::new(throughput_bps.max(1))),
        }
    }

    /// Active strategy.
    #[must_use]
    pub const fn strategy(&self) -> &ProgressStrategy {
        &self.strategy
    }

    /// Most recently observed throughput in bytes per second.
    #[must_use]
    pub fn throughput_bps(&self) -> u64 {
        self.throughput_bps.load(Ordering::Relaxed)
    }

    /// Progress file for `id`, when the side channel is active.
    pub(crate) async fn prepare(&self, id: OperationId) -> Option<PathBuf> {
        let ProgressStrategy::SideChannel { dir } = &self.strategy else {
            return None;
        };
        if let Err(err) = tokio::fs::create_dir_all(dir).await {
            debug!(error = %err, dir = %dir.display(), "progress directory unavailable");
            return None;
        }
        Some(dir.join(format!("progress-{id}.log")))
    }

    /// Start reporting progress for one transfer; abort the handle when the
    /// transfer ends.
    pub(crate) fn spawn(
        &self,
        progress_file: Option<PathBuf>,
        size: Option<u64>,
        sink: ProgressSink,
    ) -> Option<JoinHandle<()>> {
        let poll = self.poll;
        match (&self.strategy, progress_file, size) {
            (ProgressStrategy::SideChannel { .. }, Some(file), _) => {
                Some(tokio::spawn(poll_side_channel(file, poll, sink)))
            }
            (ProgressStrategy::Estimate, _, Some(size)) if size > 0 => {
                let throughput = Arc::clone(&self.throughput_bps);
                Some(tokio::spawn(estimate(size, throughput, poll, sink)))
            }
            _ => None,
        }
    }

    /// Fold a finished transfer into the throughput used for estimates.
    pub(crate) fn record(&self, bytes: u64, elapsed: Duration) {
        let millis = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        if bytes == 0 || millis == 0 {
            return;
        }
        let bps = bytes.saturating_mul(1_000) / millis;
        self.throughput_bps.store(bps.max(1), Ordering::Relaxed);
        debug!(bytes, millis, bps, "throughput updated");
    }

    /// Remove a progress file once its transfer has finished.
    pub(crate) async fn finish(progress_file: Option<&Path>) {
        let Some(file) = progress_file else {
            return;
        };
        match tokio::fs::remove_file(file).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => debug!(error = %err, file = %file.display(), "progress file left behind"),
        }
    }
}

async fn poll_side_channel(file: PathBuf, poll: Duration, sink: ProgressSink) {
    let mut ticker = tokio::time::interval(poll);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if let Ok(contents) = tokio::fs::read_to_string(&file).await
            && let Some(fraction) = parse_progress_output(&contents)
        {
            sink.report(fraction);
        }
    }
}

#[allow(clippy::cast_precision_loss)]
async fn estimate(size: u64, throughput: Arc<AtomicU64>, poll: Duration, sink: ProgressSink) {
    let started = Instant::now();
    let mut ticker = tokio::time::interval(poll);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let bps = throughput.load(Ordering::Relaxed) as f64;
        let fraction = started.elapsed().as_secs_f64() * bps / size as f64;
        sink.report(fraction.min(ESTIMATE_CEILING));
    }
}
