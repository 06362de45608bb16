//! Operation queue: lanes, scheduling, cancellation, and read models.
//!
//! # Design
//! - Administrative work (move, delete, make-dir, rename, write) gets its own
//!   task immediately and a device-gate ticket at submission, so it runs in
//!   submission order per device. It reports Running only once the gate
//!   has let it through.
//! - Transfers wait in a FIFO list drained by `transfer_concurrency` slots;
//!   their gate ticket is taken when a slot picks them up.
//! - Status, progress, and error live in one `watch` value per operation;
//!   transitions go through `send_if_modified`, so a late writer can never
//!   move a terminal operation.
//! - The queue mutex guards bookkeeping only and is never held across `.await`.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use adbx_core::{
    BatchRequest, CoreError, DeviceRegistry, DirectoryListing, FsPath, Lane, OperationId,
    OperationKind, OperationRequest, OperationSnapshot, OperationState, OperationStatus,
    PathKind, ProgressSink, TransferDirection, TransferEngine, TransferOutcome, TransferRequest,
    WritePayload,
};
use adbx_events::{Event, EventBus};
use adbx_fsops::{DeviceTicket, FsOpsError, RemoteFileOps};
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, info, warn};
use uuid::Uuid;

use crate::error::{QueueError, QueueResult};
use crate::progress::ProgressTracker;

/// Label recorded when a failed transfer printed nothing.
const TRANSFER_FAILED: &str = "command failed";
/// Label recorded when a transfer stopped without being canceled.
const TRANSFER_INTERRUPTED: &str = "transfer interrupted";

/// Collaborators and limits a queue is built from.
pub struct QueueParts {
    /// Remote file operations for the administrative lane.
    pub fsops: RemoteFileOps,
    /// Byte mover for the transfer lane.
    pub transfers: Arc<dyn TransferEngine>,
    /// Source of the default device.
    pub devices: Arc<dyn DeviceRegistry>,
    /// Listing notified when operations finish.
    pub listing: Option<Arc<dyn DirectoryListing>>,
    /// Bus receiving lifecycle events.
    pub events: EventBus,
    /// Progress strategy for transfers.
    pub progress: ProgressTracker,
    /// Transfer slots.
    pub transfer_concurrency: usize,
}

/// Schedules and tracks remote operations.
#[derive(Clone)]
pub struct OperationQueue {
    inner: Arc<Inner>,
}

struct Inner {
    fsops: RemoteFileOps,
    transfers: Arc<dyn TransferEngine>,
    devices: Arc<dyn DeviceRegistry>,
    listing: Option<Arc<dyn DirectoryListing>>,
    events: EventBus,
    progress: ProgressTracker,
    transfer_concurrency: usize,
    tasks: TaskTracker,
    shutdown: CancellationToken,
    state: Mutex<QueueState>,
}

#[derive(Default)]
struct QueueState {
    order: Vec<OperationId>,
    records: HashMap<OperationId, Record>,
    waiting: VecDeque<OperationId>,
    running_transfers: usize,
    closed: bool,
}

struct Record {
    info: Arc<OperationInfo>,
    action: Action,
    state: watch::Sender<OperationState>,
    cancel: CancellationToken,
}

#[derive(Debug)]
struct OperationInfo {
    id: OperationId,
    kind: OperationKind,
    device_id: String,
    source: FsPath,
    destination: Option<FsPath>,
    submitted_at: DateTime<Utc>,
}

impl OperationInfo {
    fn snapshot(&self, state: OperationState) -> OperationSnapshot {
        OperationSnapshot {
            id: self.id,
            kind: self.kind,
            device_id: self.device_id.clone(),
            source: self.source.clone(),
            destination: self.destination.clone(),
            submitted_at: self.submitted_at,
            state,
        }
    }

    fn affected_paths(&self) -> Vec<&FsPath> {
        match (self.kind, &self.destination) {
            (OperationKind::Move | OperationKind::Rename, Some(destination)) => {
                vec![&self.source, destination]
            }
            (OperationKind::Push | OperationKind::Pull, Some(destination)) => vec![destination],
            _ => vec![&self.source],
        }
    }
}

#[derive(Debug, Clone)]
enum Action {
    Delete(FsPath),
    Move { source: FsPath, destination: FsPath },
    MakeDir(FsPath),
    Write { path: FsPath, payload: WritePayload },
    Transfer {
        direction: TransferDirection,
        source: FsPath,
        destination: FsPath,
        size: Option<u64>,
    },
}

impl Action {
    fn plan(request: OperationRequest) -> QueueResult<Self> {
        let OperationRequest {
            kind,
            source,
            destination,
            write,
            ..
        } = request;
        let source_path = source.path.full_path().to_string();
        let missing = |reason: &'static str| QueueError::InvalidPath {
            source: CoreError::InvalidPath {
                operation: kind.as_str(),
                path: source_path.clone(),
                reason,
            },
        };
        let action = match (kind, destination, write) {
            (OperationKind::Delete, _, _) => Self::Delete(source.path),
            (OperationKind::MakeDir, _, _) => Self::MakeDir(source.path),
            (OperationKind::Write, _, Some(payload)) => Self::Write {
                path: source.path,
                payload,
            },
            (OperationKind::Move | OperationKind::Rename, Some(destination), _) => Self::Move {
                source: source.path,
                destination,
            },
            (OperationKind::Push | OperationKind::Pull, Some(destination), _) => Self::Transfer {
                direction: if kind == OperationKind::Push {
                    TransferDirection::Push
                } else {
                    TransferDirection::Pull
                },
                source: source.path,
                destination,
                size: source.size,
            },
            (OperationKind::Write, _, None) => return Err(missing("write payload is required")),
            _ => return Err(missing("destination is required")),
        };
        Ok(action)
    }
}

/// Caller-side view of one submitted operation.
#[derive(Clone)]
pub struct OperationHandle {
    info: Arc<OperationInfo>,
    state: watch::Receiver<OperationState>,
    queue: OperationQueue,
}

impl std::fmt::Debug for OperationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationHandle")
            .field("id", &self.info.id)
            .field("kind", &self.info.kind)
            .finish_non_exhaustive()
    }
}

impl OperationHandle {
    /// Operation identifier.
    #[must_use]
    pub fn id(&self) -> OperationId {
        self.info.id
    }

    /// Kind of work.
    #[must_use]
    pub fn kind(&self) -> OperationKind {
        self.info.kind
    }

    /// Current state, read without touching the queue lock.
    #[must_use]
    pub fn snapshot(&self) -> OperationSnapshot {
        self.info.snapshot(self.state.borrow().clone())
    }

    /// Wait until the operation reaches a terminal status.
    pub async fn wait(&self) -> OperationSnapshot {
        let mut state = self.state.clone();
        let terminal = state
            .wait_for(|state| state.status.is_terminal())
            .await
            .map(|state| state.clone());
        match terminal {
            Ok(state) => self.info.snapshot(state),
            Err(_) => self.snapshot(),
        }
    }

    /// Stream of state changes, starting with the current one.
    #[must_use]
    pub fn updates(&self) -> WatchStream<OperationState> {
        WatchStream::new(self.state.clone())
    }

    /// Cancel the operation; see [`OperationQueue::cancel`].
    pub fn cancel(&self) -> bool {
        self.queue.cancel(self.info.id)
    }
}

impl OperationQueue {
    /// Queue wired to `parts`.
    #[must_use]
    pub fn new(parts: QueueParts) -> Self {
        let QueueParts {
            fsops,
            transfers,
            devices,
            listing,
            events,
            progress,
            transfer_concurrency,
        } = parts;
        Self {
            inner: Arc::new(Inner {
                fsops,
                transfers,
                devices,
                listing,
                events,
                progress,
                transfer_concurrency: transfer_concurrency.max(1),
                tasks: TaskTracker::new(),
                shutdown: CancellationToken::new(),
                state: Mutex::new(QueueState::default()),
            }),
        }
    }

    /// Event bus receiving this queue's lifecycle events.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Accept one operation.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::InvalidPath`] for malformed requests (including a
    /// move into the item itself), [`QueueError::NoDevice`] when no device can
    /// be targeted, and [`QueueError::Closed`] after shutdown.
    pub fn submit(&self, request: OperationRequest) -> QueueResult<OperationHandle> {
        request.validate()?;
        let device_id = request
            .device_id
            .clone()
            .or_else(|| self.inner.devices.current_device_id())
            .ok_or(QueueError::NoDevice)?;
        ensure_device(&request, &device_id)?;

        let info = Arc::new(OperationInfo {
            id: Uuid::new_v4(),
            kind: request.kind,
            device_id,
            source: request.source.path.clone(),
            destination: request.destination.clone(),
            submitted_at: Utc::now(),
        });
        let action = Action::plan(request)?;
        let (state_tx, state_rx) = watch::channel(OperationState::waiting());
        let cancel = self.inner.shutdown.child_token();

        let admin_job = {
            let mut state = self.inner.lock_state();
            if state.closed {
                return Err(QueueError::Closed);
            }
            state.order.push(info.id);
            state.records.insert(
                info.id,
                Record {
                    info: Arc::clone(&info),
                    action: action.clone(),
                    state: state_tx.clone(),
                    cancel: cancel.clone(),
                },
            );
            match info.kind.lane() {
                Lane::Administrative => {
                    // Reserved under the queue lock so gate order matches submission order.
                    let ticket = self.inner.fsops.reserve(&info.device_id);
                    Some(Job {
                        info: Arc::clone(&info),
                        action,
                        state: state_tx,
                        cancel,
                        ticket: Some(ticket),
                    })
                }
                Lane::Transfer => {
                    state.waiting.push_back(info.id);
                    None
                }
            }
        };

        self.inner.events.publish(Event::OperationQueued {
            operation_id: info.id,
            kind: info.kind,
            device_id: info.device_id.clone(),
        });
        debug!(id = %info.id, kind = info.kind.as_str(), device = %info.device_id, "operation queued");

        match admin_job {
            Some(job) => {
                let inner = Arc::clone(&self.inner);
                let span = tracing::info_span!("operation", id = %info.id, kind = info.kind.as_str());
                self.inner
                    .tasks
                    .spawn(async move { inner.run_admin(job).await }.instrument(span));
            }
            None => Inner::pump(&self.inner),
        }

        Ok(OperationHandle {
            info,
            state: state_rx,
            queue: self.clone(),
        })
    }

    /// Expand `batch` and submit every item independently.
    ///
    /// # Errors
    ///
    /// Fails before submitting anything when the batch cannot be expanded;
    /// otherwise the first item-level submission error is returned and items
    /// accepted before it keep running.
    pub fn submit_batch(&self, batch: BatchRequest) -> QueueResult<Vec<OperationHandle>> {
        batch
            .expand()?
            .into_iter()
            .map(|request| self.submit(request))
            .collect()
    }

    /// Cancel an operation.
    ///
    /// Waiting transfers leave the wait list and end `Canceled` at once;
    /// running work has its subprocess terminated. Returns `false` when the
    /// operation is unknown or already terminal.
    pub fn cancel(&self, id: OperationId) -> bool {
        let dequeued = {
            let mut state = self.inner.lock_state();
            let Some(record) = state.records.get(&id) else {
                return false;
            };
            if record.state.borrow().status.is_terminal() {
                return false;
            }
            record.cancel.cancel();
            let info = Arc::clone(&record.info);
            let sender = record.state.clone();
            let before = state.waiting.len();
            state.waiting.retain(|waiting| *waiting != id);
            (state.waiting.len() != before).then_some((info, sender))
        };
        if let Some((info, sender)) = dequeued
            && transition(&sender, OperationStatus::Canceled, None)
        {
            self.inner.publish_terminal(&info, &sender);
        }
        debug!(%id, "operation cancel requested");
        true
    }

    /// Cancel every operation still waiting to start; returns how many were
    /// canceled. Running work continues and the queue stays open.
    pub fn cancel_pending(&self) -> usize {
        self.cancel_where(|status| status == OperationStatus::Waiting)
    }

    /// Cancel every unfinished operation, waiting or running; returns how
    /// many were canceled. The queue stays open for new work.
    pub fn cancel_all(&self) -> usize {
        self.cancel_where(|status| !status.is_terminal())
    }

    fn cancel_where(&self, keep: impl Fn(OperationStatus) -> bool) -> usize {
        let ids: Vec<OperationId> = self
            .collect(keep)
            .into_iter()
            .map(|snapshot| snapshot.id)
            .collect();
        let canceled = ids.into_iter().filter(|id| self.cancel(*id)).count();
        if canceled > 0 {
            info!(canceled, "operations canceled in bulk");
        }
        canceled
    }

    /// Operations not yet picked up by a worker.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.collect(|status| status == OperationStatus::Waiting).len()
    }

    /// Operations currently running.
    #[must_use]
    pub fn active_operations(&self) -> Vec<OperationSnapshot> {
        self.collect(|status| status == OperationStatus::Running)
    }

    /// Operations in a terminal status, in submission order.
    #[must_use]
    pub fn completed_operations(&self) -> Vec<OperationSnapshot> {
        self.collect(OperationStatus::is_terminal)
    }

    /// Every known operation, in submission order.
    #[must_use]
    pub fn all(&self) -> Vec<OperationSnapshot> {
        self.collect(|_| true)
    }

    /// Snapshot of one operation.
    #[must_use]
    pub fn get(&self, id: OperationId) -> Option<OperationSnapshot> {
        let state = self.inner.lock_state();
        state
            .records
            .get(&id)
            .map(|record| record.info.snapshot(record.state.borrow().clone()))
    }

    /// Forget terminal operations; returns how many were dropped.
    pub fn clear_completed(&self) -> usize {
        let mut state = self.inner.lock_state();
        let before = state.records.len();
        state
            .records
            .retain(|_, record| !record.state.borrow().status.is_terminal());
        let QueueState { order, records, .. } = &mut *state;
        order.retain(|id| records.contains_key(id));
        before - state.records.len()
    }

    /// Stop accepting work, cancel everything, and wait for workers to drain.
    pub async fn shutdown(&self) {
        let waiting: Vec<(Arc<OperationInfo>, watch::Sender<OperationState>)> = {
            let mut state = self.inner.lock_state();
            state.closed = true;
            let ids: Vec<OperationId> = state.waiting.drain(..).collect();
            ids.iter()
                .filter_map(|id| state.records.get(id))
                .map(|record| (Arc::clone(&record.info), record.state.clone()))
                .collect()
        };
        self.inner.shutdown.cancel();
        for (info, sender) in waiting {
            if transition(&sender, OperationStatus::Canceled, None) {
                self.inner.publish_terminal(&info, &sender);
            }
        }
        self.inner.tasks.close();
        self.inner.tasks.wait().await;
        info!("operation queue drained");
    }

    fn collect(&self, keep: impl Fn(OperationStatus) -> bool) -> Vec<OperationSnapshot> {
        let state = self.inner.lock_state();
        state
            .order
            .iter()
            .filter_map(|id| state.records.get(id))
            .filter_map(|record| {
                let current = record.state.borrow().clone();
                keep(current.status).then(|| record.info.snapshot(current))
            })
            .collect()
    }
}

struct Job {
    info: Arc<OperationInfo>,
    action: Action,
    state: watch::Sender<OperationState>,
    cancel: CancellationToken,
    ticket: Option<DeviceTicket>,
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move waiting transfers into free slots.
    fn pump(self: &Arc<Self>) {
        let jobs: Vec<Job> = {
            let mut state = self.lock_state();
            let mut jobs = Vec::new();
            while state.running_transfers < self.transfer_concurrency {
                let Some(id) = state.waiting.pop_front() else {
                    break;
                };
                let Some(record) = state.records.get(&id) else {
                    continue;
                };
                let job = Job {
                    info: Arc::clone(&record.info),
                    action: record.action.clone(),
                    state: record.state.clone(),
                    cancel: record.cancel.clone(),
                    ticket: None,
                };
                state.running_transfers += 1;
                jobs.push(job);
            }
            jobs
        };
        for job in jobs {
            let inner = Arc::clone(self);
            let span =
                tracing::info_span!("operation", id = %job.info.id, kind = job.info.kind.as_str());
            self.tasks
                .spawn(async move { inner.run_transfer(job).await }.instrument(span));
        }
    }

    async fn run_admin(self: Arc<Self>, job: Job) {
        let Job {
            info,
            action,
            state,
            cancel,
            ticket,
        } = job;
        let Some(ticket) = ticket else {
            return;
        };
        // Stays Waiting until the device is actually ours.
        let permit = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                if transition(&state, OperationStatus::Canceled, None) {
                    self.publish_terminal(&info, &state);
                }
                return;
            }
            permit = ticket.acquire() => permit,
        };
        if !self.start(&info, &state) {
            return;
        }
        let ticket = DeviceTicket::from(permit);

        let fsops = &self.fsops;
        let result = match &action {
            Action::Delete(path) => fsops.delete(ticket, std::slice::from_ref(path), true, &cancel).await,
            Action::Move {
                source,
                destination,
            } => fsops.move_path(ticket, source, destination, &cancel).await,
            Action::MakeDir(path) => fsops.make_dir(ticket, path, &cancel).await,
            Action::Write {
                path,
                payload: WritePayload::Touch,
            } => fsops.make_file(ticket, path, &cancel).await,
            Action::Write {
                path,
                payload: WritePayload::AppendLine { text },
            } => fsops.append_line(ticket, path, text, &cancel).await,
            Action::Transfer { .. } => {
                drop(ticket);
                let error = Some("transfer routed to the administrative lane".to_string());
                self.finish(&info, &state, OperationStatus::Failed, error);
                return;
            }
        };

        let (status, error) = match result {
            Ok(()) => (OperationStatus::Completed, None),
            Err(_) if cancel.is_cancelled() => (OperationStatus::Canceled, None),
            Err(FsOpsError::Interrupted { .. }) => (OperationStatus::Canceled, None),
            Err(err) => (OperationStatus::Failed, Some(err.user_message())),
        };
        self.finish(&info, &state, status, error);
    }

    async fn run_transfer(self: Arc<Self>, job: Job) {
        let Job {
            info,
            action,
            state,
            cancel,
            ..
        } = job;
        if cancel.is_cancelled() && transition(&state, OperationStatus::Canceled, None) {
            self.publish_terminal(&info, &state);
        } else if let Action::Transfer {
            direction,
            source,
            destination,
            size,
        } = action
            && self.start(&info, &state)
        {
            let size = match (size, direction) {
                (Some(size), _) => Some(size),
                (None, TransferDirection::Push) => host_size(&source).await,
                (None, TransferDirection::Pull) => None,
            };
            let progress_file = self.progress.prepare(info.id).await;
            let sink = self.progress_sink(&info, &state);
            let poller = self.progress.spawn(progress_file.clone(), size, sink.clone());
            let started = Instant::now();

            let outcome = self
                .transfers
                .transfer(
                    TransferRequest {
                        operation_id: info.id,
                        direction,
                        device_id: info.device_id.clone(),
                        source,
                        destination,
                        progress_file: progress_file.clone(),
                    },
                    sink,
                    cancel.clone(),
                )
                .await;

            if let Some(poller) = poller {
                poller.abort();
            }
            ProgressTracker::finish(progress_file.as_deref()).await;

            let (status, error) = transfer_result(outcome, &cancel);
            if status == OperationStatus::Completed
                && let Some(size) = size
            {
                self.progress.record(size, started.elapsed());
            }
            self.finish(&info, &state, status, error);
        }

        {
            let mut queue = self.lock_state();
            queue.running_transfers = queue.running_transfers.saturating_sub(1);
        }
        self.pump();
    }

    fn progress_sink(
        self: &Arc<Self>,
        info: &Arc<OperationInfo>,
        state: &watch::Sender<OperationState>,
    ) -> ProgressSink {
        let events = self.events.clone();
        let state = state.clone();
        let id = info.id;
        ProgressSink::new(move |fraction| {
            let mut published = None;
            state.send_if_modified(|current| {
                if current.status != OperationStatus::Running || fraction <= current.progress {
                    return false;
                }
                // Whole percents only, so observers are not flooded.
                let crossed = (fraction * 100.0).floor() > (current.progress * 100.0).floor();
                current.progress = fraction;
                if crossed {
                    published = Some(fraction);
                }
                true
            });
            if let Some(progress) = published {
                events.publish(Event::OperationProgress {
                    operation_id: id,
                    progress,
                });
            }
        })
    }

    fn start(&self, info: &OperationInfo, state: &watch::Sender<OperationState>) -> bool {
        if !transition(state, OperationStatus::Running, None) {
            return false;
        }
        self.events.publish(Event::OperationStarted {
            operation_id: info.id,
            kind: info.kind,
        });
        debug!("operation started");
        true
    }

    fn finish(
        &self,
        info: &OperationInfo,
        state: &watch::Sender<OperationState>,
        status: OperationStatus,
        error: Option<String>,
    ) {
        if !transition(state, status, error) {
            return;
        }
        self.notify_affected(info);
        self.publish_terminal(info, state);
    }

    fn publish_terminal(&self, info: &OperationInfo, state: &watch::Sender<OperationState>) {
        let current = state.borrow().clone();
        let operation_id = info.id;
        let kind = info.kind;
        let event = match current.status {
            OperationStatus::Completed => {
                info!(id = %operation_id, kind = kind.as_str(), "operation completed");
                Event::OperationCompleted { operation_id, kind }
            }
            OperationStatus::Failed => {
                let message = current.error.unwrap_or_default();
                warn!(id = %operation_id, kind = kind.as_str(), %message, "operation failed");
                Event::OperationFailed {
                    operation_id,
                    kind,
                    message,
                }
            }
            OperationStatus::Canceled => {
                info!(id = %operation_id, kind = kind.as_str(), "operation canceled");
                Event::OperationCanceled { operation_id, kind }
            }
            OperationStatus::Waiting | OperationStatus::Running => return,
        };
        self.events.publish(event);
    }

    fn notify_affected(&self, info: &OperationInfo) {
        let Some(listing) = &self.listing else {
            return;
        };
        let Some(displayed) = listing.displayed_path() else {
            return;
        };
        for path in info.affected_paths() {
            let relation = displayed.relation_from(path);
            listing.notify_affected(path, relation);
            self.events.publish(Event::PathAffected {
                operation_id: info.id,
                path: path.full_path().to_string(),
                relation,
            });
        }
    }
}

/// Apply a status change if the current status allows it.
fn transition(
    state: &watch::Sender<OperationState>,
    next: OperationStatus,
    error: Option<String>,
) -> bool {
    state.send_if_modified(|current| {
        if !current.status.can_transition_to(next) {
            return false;
        }
        let now = Utc::now();
        current.status = next;
        match next {
            OperationStatus::Running => current.started_at = Some(now),
            OperationStatus::Completed => {
                current.progress = 1.0;
                current.finished_at = Some(now);
            }
            OperationStatus::Failed | OperationStatus::Canceled => current.finished_at = Some(now),
            OperationStatus::Waiting => {}
        }
        current.error = if next == OperationStatus::Failed {
            Some(error.clone().unwrap_or_else(|| TRANSFER_FAILED.to_string()))
        } else {
            None
        };
        true
    })
}

fn transfer_result(
    outcome: anyhow::Result<TransferOutcome>,
    cancel: &CancellationToken,
) -> (OperationStatus, Option<String>) {
    match outcome {
        Ok(outcome) if outcome.succeeded() => (OperationStatus::Completed, None),
        _ if cancel.is_cancelled() => (OperationStatus::Canceled, None),
        Ok(outcome) => {
            let message = if outcome.stderr.trim().is_empty() {
                TRANSFER_FAILED.to_string()
            } else {
                outcome.stderr
            };
            (OperationStatus::Failed, Some(message))
        }
        Err(err) => {
            let message = match err.downcast_ref::<FsOpsError>() {
                Some(FsOpsError::Interrupted { .. }) => TRANSFER_INTERRUPTED.to_string(),
                Some(fsops) => fsops.user_message(),
                None => err.to_string(),
            };
            (OperationStatus::Failed, Some(message))
        }
    }
}

async fn host_size(path: &FsPath) -> Option<u64> {
    if path.kind() != PathKind::Host {
        return None;
    }
    let metadata = tokio::fs::metadata(path.full_path()).await.ok()?;
    metadata.is_file().then(|| metadata.len())
}

fn ensure_device(request: &OperationRequest, device_id: &str) -> QueueResult<()> {
    let paths = std::iter::once(&request.source.path).chain(request.destination.as_ref());
    for path in paths {
        if path.kind() == PathKind::Remote && path.device_id() != Some(device_id) {
            return Err(QueueError::InvalidPath {
                source: CoreError::InvalidPath {
                    operation: request.kind.as_str(),
                    path: path.full_path().to_string(),
                    reason: "path belongs to a different device",
                },
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender(status: OperationStatus) -> watch::Sender<OperationState> {
        let (tx, _rx) = watch::channel(OperationState {
            status,
            ..OperationState::waiting()
        });
        tx
    }

    #[test]
    fn terminal_states_are_final() {
        let state = sender(OperationStatus::Running);
        assert!(transition(&state, OperationStatus::Completed, None));
        assert!(!transition(&state, OperationStatus::Failed, Some("late".into())));
        assert!(!transition(&state, OperationStatus::Canceled, None));
        let current = state.borrow().clone();
        assert_eq!(current.status, OperationStatus::Completed);
        assert!((current.progress - 1.0).abs() < f64::EPSILON);
        assert!(current.error.is_none());
        assert!(current.finished_at.is_some());
    }

    #[test]
    fn failure_always_carries_a_message() {
        let state = sender(OperationStatus::Running);
        assert!(transition(&state, OperationStatus::Failed, None));
        assert_eq!(state.borrow().error.as_deref(), Some(TRANSFER_FAILED));
    }

    #[test]
    fn waiting_can_be_canceled_but_not_completed() {
        let state = sender(OperationStatus::Waiting);
        assert!(!transition(&state, OperationStatus::Completed, None));
        assert!(transition(&state, OperationStatus::Canceled, None));
        assert!(state.borrow().error.is_none());
    }

    #[test]
    fn transfer_results_map_to_statuses() {
        let live = CancellationToken::new();
        let ok = transfer_result(
            Ok(TransferOutcome {
                exit_code: Some(0),
                stderr: String::new(),
            }),
            &live,
        );
        assert_eq!(ok, (OperationStatus::Completed, None));

        let silent = transfer_result(
            Ok(TransferOutcome {
                exit_code: Some(1),
                stderr: " \n".into(),
            }),
            &live,
        );
        assert_eq!(silent, (OperationStatus::Failed, Some(TRANSFER_FAILED.into())));

        let interrupted = transfer_result(
            Err(FsOpsError::Interrupted { operation: "pull" }.into()),
            &live,
        );
        assert_eq!(
            interrupted,
            (OperationStatus::Failed, Some(TRANSFER_INTERRUPTED.into()))
        );

        let canceled = CancellationToken::new();
        canceled.cancel();
        let result = transfer_result(Err(anyhow::anyhow!("killed")), &canceled);
        assert_eq!(result, (OperationStatus::Canceled, None));
    }
}
