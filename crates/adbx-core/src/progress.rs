//! Progress reporting handle passed to transfer engines.

use std::fmt;
use std::sync::Arc;

/// Cloneable callback receiving completion fractions.
///
/// Values are clamped to `0.0..=1.0`; non-finite values are dropped.
#[derive(Clone)]
pub struct ProgressSink {
    report: Arc<dyn Fn(f64) + Send + Sync>,
}

impl ProgressSink {
    /// Wrap a callback.
    pub fn new(report: impl Fn(f64) + Send + Sync + 'static) -> Self {
        Self {
            report: Arc::new(report),
        }
    }

    /// Sink that discards every report.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    /// Report a completion fraction.
    pub fn report(&self, fraction: f64) {
        if fraction.is_finite() {
            (self.report)(fraction.clamp(0.0, 1.0));
        }
    }
}

impl fmt::Debug for ProgressSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressSink").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn report_clamps_and_drops_non_finite() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let seen = Arc::clone(&seen);
            ProgressSink::new(move |value| seen.lock().expect("lock").push(value))
        };
        sink.report(-0.5);
        sink.report(0.25);
        sink.report(f64::NAN);
        sink.report(f64::INFINITY);
        sink.clone().report(3.0);
        assert_eq!(*seen.lock().expect("lock"), vec![0.0, 0.25, 1.0]);
    }
}
