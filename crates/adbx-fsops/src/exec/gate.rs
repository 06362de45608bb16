//! Per-device FIFO gate serializing device-targeted commands.
//!
//! # Design
//! - `reserve` is synchronous and hands out sequence numbers, so callers fix
//!   their place in line at submission time even if they only start waiting later.
//! - A ticket dropped before it is served is skipped; a dropped permit hands the
//!   device to the next live ticket.
//! - A permit can be wrapped back into a ticket so code written against tickets
//!   runs under a device the caller already holds.
//! - Waiters register with `Notify` before checking the state, so no wakeup is lost.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

#[derive(Default)]
struct LineState {
    next: u64,
    serving: u64,
    abandoned: BTreeSet<u64>,
}

impl LineState {
    fn advance(&mut self) {
        self.serving += 1;
        while self.abandoned.remove(&self.serving) {
            self.serving += 1;
        }
    }
}

#[derive(Default)]
struct Line {
    state: Mutex<LineState>,
    notify: Notify,
}

impl Line {
    fn lock(&self) -> MutexGuard<'_, LineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Gate handing out per-device places in line.
#[derive(Default)]
pub struct DeviceGate {
    lines: Mutex<HashMap<String, Arc<Line>>>,
}

impl DeviceGate {
    /// Empty gate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the next place in line for `device_id`.
    #[must_use]
    pub fn reserve(&self, device_id: &str) -> DeviceTicket {
        let line = {
            let mut lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(lines.entry(device_id.to_string()).or_default())
        };
        let seq = {
            let mut state = line.lock();
            let seq = state.next;
            state.next += 1;
            seq
        };
        DeviceTicket {
            device_id: device_id.to_string(),
            seq,
            line: Some(line),
            held: None,
        }
    }
}

/// A reserved place in a device's line.
pub struct DeviceTicket {
    device_id: String,
    seq: u64,
    line: Option<Arc<Line>>,
    held: Option<DevicePermit>,
}

impl DeviceTicket {
    /// Device the ticket belongs to.
    #[must_use]
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Whether the ticket already carries the device permit.
    #[must_use]
    pub const fn is_served(&self) -> bool {
        self.held.is_some()
    }

    /// Wait until every earlier ticket for the device has been served.
    pub async fn acquire(mut self) -> DevicePermit {
        if let Some(permit) = self.held.take() {
            return permit;
        }
        let Some(line) = self.line.clone() else {
            return DevicePermit {
                device_id: std::mem::take(&mut self.device_id),
                line: None,
            };
        };
        loop {
            let notified = line.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if line.lock().serving == self.seq {
                break;
            }
            notified.await;
        }
        self.line = None;
        DevicePermit {
            device_id: std::mem::take(&mut self.device_id),
            line: Some(line),
        }
    }
}

impl Drop for DeviceTicket {
    fn drop(&mut self) {
        let Some(line) = self.line.take() else {
            return;
        };
        {
            let mut state = line.lock();
            if state.serving == self.seq {
                state.advance();
            } else {
                state.abandoned.insert(self.seq);
            }
        }
        line.notify.notify_waiters();
    }
}

impl fmt::Debug for DeviceTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceTicket")
            .field("device_id", &self.device_id)
            .field("seq", &self.seq)
            .field("served", &self.held.is_some())
            .finish_non_exhaustive()
    }
}

impl From<DevicePermit> for DeviceTicket {
    fn from(permit: DevicePermit) -> Self {
        Self {
            device_id: permit.device_id.clone(),
            seq: 0,
            line: None,
            held: Some(permit),
        }
    }
}

/// Exclusive use of a device until dropped.
pub struct DevicePermit {
    device_id: String,
    line: Option<Arc<Line>>,
}

impl DevicePermit {
    /// Device the permit grants access to.
    #[must_use]
    pub fn device_id(&self) -> &str {
        &self.device_id
    }
}

impl Drop for DevicePermit {
    fn drop(&mut self) {
        if let Some(line) = self.line.take() {
            line.lock().advance();
            line.notify.notify_waiters();
        }
    }
}

impl fmt::Debug for DevicePermit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DevicePermit")
            .field("device_id", &self.device_id)
            .finish_non_exhaustive()
    }
}
