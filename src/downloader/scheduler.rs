// Batch scheduler - one download slot, strictly sequential batches
//
// A submission is admitted only while the slot is idle; the check and the
// transition to busy happen under one lock. The driver task then runs the
// items in order and hands the slot back after publishing `BatchFinished`.

use serde::Serialize;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::runtime::Handle;
use tokio::sync::watch;

use super::bridge::{DownloadEvent, EventBridge};
use super::command::CommandComposer;
use super::diagnostics::stderr_tail;
use super::errors::DownloadError;
use super::models::{ConfigurationSnapshot, DownloadRequest, DownloadState, RequestId, Submission};
use super::progress::{parse_status, ProgressTracker};
use super::supervisor::{OutputEvent, ProcessHandle, StreamKind};
use super::traits::ProcessLauncher;

/// stderr lines kept for the failure message
const STDERR_TAIL_LINES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotPhase {
    Idle,
    Running,
}

#[derive(Debug)]
struct ActiveDownload {
    request: DownloadRequest,
    handle: Option<ProcessHandle>,
    progress: ProgressTracker,
    state: DownloadState,
}

impl ActiveDownload {
    fn new(request: DownloadRequest) -> Self {
        Self {
            request,
            handle: None,
            progress: ProgressTracker::new(),
            state: DownloadState::Running,
        }
    }
}

#[derive(Debug)]
struct RunningBatch {
    active: ActiveDownload,
    pending: VecDeque<DownloadRequest>,
    position: usize,
    total: usize,
    succeeded: usize,
    failed: usize,
    aborted: usize,
}

#[derive(Debug)]
enum Slot {
    Idle,
    Running(RunningBatch),
}

/// The item the driver works on next
#[derive(Debug, Clone)]
struct Job {
    request: DownloadRequest,
    position: usize,
    total: usize,
}

enum Step {
    Next(Job),
    Finished {
        succeeded: usize,
        failed: usize,
        aborted: usize,
    },
}

/// Returned to the caller when a submission takes the slot
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Admission {
    pub ids: Vec<RequestId>,
    pub batch_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveStatus {
    pub id: RequestId,
    pub url: String,
    pub position: usize,
    pub percent: f32,
    pub state: DownloadState,
}

/// Point-in-time view of the slot
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStatus {
    pub busy: bool,
    pub active: Option<ActiveStatus>,
    pub pending: usize,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl SchedulerStatus {
    fn idle() -> Self {
        Self {
            busy: false,
            active: None,
            pending: 0,
            total: 0,
            succeeded: 0,
            failed: 0,
        }
    }
}

struct Shared {
    slot: Mutex<Slot>,
    phase: watch::Sender<SlotPhase>,
    launcher: Arc<dyn ProcessLauncher>,
    bridge: Arc<EventBridge>,
    tool_path: PathBuf,
    composer: CommandComposer,
    /// Runtime the scheduler was built on, if any
    runtime: Option<Handle>,
}

#[derive(Clone)]
pub struct DownloadScheduler {
    shared: Arc<Shared>,
}

impl DownloadScheduler {
    pub fn new(
        tool_path: impl Into<PathBuf>,
        composer: CommandComposer,
        launcher: Arc<dyn ProcessLauncher>,
        bridge: Arc<EventBridge>,
    ) -> Self {
        let (phase, _) = watch::channel(SlotPhase::Idle);
        Self {
            shared: Arc::new(Shared {
                slot: Mutex::new(Slot::Idle),
                phase,
                launcher,
                bridge,
                tool_path: tool_path.into(),
                composer,
                runtime: Handle::try_current().ok(),
            }),
        }
    }

    /// Admit `submission` if the slot is idle and start driving it.
    ///
    /// Returns immediately; outcomes arrive as events. The batch runs on the
    /// runtime the scheduler was created on, or else on the caller's.
    pub fn submit(
        &self,
        submission: Submission,
        config: ConfigurationSnapshot,
    ) -> Result<Admission, DownloadError> {
        let mut requests: VecDeque<DownloadRequest> = submission.into_requests().into();
        let total = requests.len();
        let ids: Vec<RequestId> = requests.iter().map(|r| r.id()).collect();
        let first = requests.pop_front().ok_or(DownloadError::EmptyBatch)?;
        let runtime = self
            .shared
            .runtime
            .clone()
            .or_else(|| Handle::try_current().ok())
            .ok_or(DownloadError::RuntimeUnavailable)?;

        let job = {
            let mut slot = self.shared.lock_slot();
            if let Slot::Running(batch) = &*slot {
                log::warn!(
                    "[Scheduler] Rejected submission of {} item(s): {} is running",
                    total,
                    batch.active.request.id()
                );
                return Err(DownloadError::ConcurrentSubmissionRejected);
            }
            let job = Job {
                request: first.clone(),
                position: 1,
                total,
            };
            *slot = Slot::Running(RunningBatch {
                active: ActiveDownload::new(first),
                pending: requests,
                position: 1,
                total,
                succeeded: 0,
                failed: 0,
                aborted: 0,
            });
            self.shared.phase.send_replace(SlotPhase::Running);
            job
        };

        log::info!("[Scheduler] Accepted {} item(s)", total);
        // armed before spawning: a task dropped unpolled still frees the slot
        let guard = DriverGuard {
            shared: self.shared.clone(),
            armed: true,
        };
        runtime.spawn(drive(guard, job, config));

        Ok(Admission {
            ids,
            batch_size: total,
        })
    }

    pub fn is_busy(&self) -> bool {
        matches!(*self.shared.lock_slot(), Slot::Running(_))
    }

    pub fn status(&self) -> SchedulerStatus {
        match &*self.shared.lock_slot() {
            Slot::Idle => SchedulerStatus::idle(),
            Slot::Running(batch) => SchedulerStatus {
                busy: true,
                active: Some(ActiveStatus {
                    id: batch.active.request.id(),
                    url: batch.active.request.target_url().to_string(),
                    position: batch.position,
                    percent: batch.active.progress.current(),
                    state: batch.active.state,
                }),
                pending: batch.pending.len(),
                total: batch.total,
                succeeded: batch.succeeded,
                failed: batch.failed,
            },
        }
    }

    /// Resolves once the slot is idle (immediately if it already is)
    pub async fn wait_idle(&self) {
        let mut rx = self.shared.phase.subscribe();
        let _ = rx.wait_for(|phase| *phase == SlotPhase::Idle).await;
    }

    /// Drop the items that have not started yet. The active one keeps running.
    pub fn abort_batch(&self) -> usize {
        let mut slot = self.shared.lock_slot();
        match &mut *slot {
            Slot::Idle => 0,
            Slot::Running(batch) => {
                let dropped = batch.pending.len();
                batch.pending.clear();
                batch.aborted += dropped;
                if dropped > 0 {
                    log::info!("[Scheduler] Aborted {} pending item(s)", dropped);
                }
                dropped
            }
        }
    }

    /// Kill the running process, if any. Its item completes as failed.
    pub fn terminate_active(&self) -> bool {
        let mut slot = self.shared.lock_slot();
        match &mut *slot {
            Slot::Running(batch) => match batch.active.handle.as_mut() {
                Some(handle) => {
                    log::info!("[Scheduler] Terminating {}", batch.active.request.id());
                    handle.terminate()
                }
                None => false,
            },
            Slot::Idle => false,
        }
    }
}

impl Shared {
    fn lock_slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn with_active<R>(&self, id: RequestId, f: impl FnOnce(&mut ActiveDownload) -> R) -> Option<R> {
        match &mut *self.lock_slot() {
            Slot::Running(batch) if batch.active.request.id() == id => Some(f(&mut batch.active)),
            _ => None,
        }
    }

    async fn run_one(&self, job: &Job, config: &ConfigurationSnapshot) -> Result<(), DownloadError> {
        let request = &job.request;
        let id = request.id();
        let args = self.composer.compose(request, config);

        log::info!(
            "[Scheduler] [{}] {} {}/{}: {}",
            request.platform().as_str(),
            id,
            job.position,
            job.total,
            request.target_url()
        );
        log::debug!("[Scheduler] {} {}", self.tool_path.display(), args.join(" "));

        self.bridge.publish(DownloadEvent::Started {
            id,
            url: request.target_url().to_string(),
            platform: request.platform(),
            position: job.position,
            total: job.total,
        });

        let process = self.launcher.launch(&self.tool_path, &args).await?;
        let (handle, mut events) = process.into_parts();
        self.with_active(id, |active| active.handle = Some(handle));

        let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
        let mut exit_code = None;

        while let Some(event) = events.recv().await {
            match event {
                OutputEvent::Line {
                    stream: StreamKind::Stdout,
                    text,
                } => self.on_stdout(id, &text, config.verbose_logging),
                OutputEvent::Line {
                    stream: StreamKind::Stderr,
                    text,
                } => {
                    if config.verbose_logging {
                        log::info!("[yt-dlp] {}", text);
                    } else {
                        log::warn!("[yt-dlp] {}", text);
                    }
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(text);
                }
                OutputEvent::Exit { code } => {
                    exit_code = code;
                    break;
                }
            }
        }

        if exit_code == Some(0) {
            return Ok(());
        }
        let stderr = stderr_tail(tail.iter().map(String::as_str), STDERR_TAIL_LINES);
        Err(DownloadError::tool_failure("yt-dlp", exit_code, &stderr))
    }

    fn on_stdout(&self, id: RequestId, line: &str, verbose: bool) {
        if verbose {
            log::info!("[yt-dlp] {}", line);
        } else {
            log::trace!("[yt-dlp] {}", line);
        }
        let status = match parse_status(line) {
            Some(status) => status,
            None => return,
        };

        let percent = self
            .with_active(id, |active| match status.percent() {
                Some(p) => active.progress.observe(p),
                None => Some(active.progress.current()),
            })
            .flatten();

        if let Some(percent) = percent {
            self.bridge.publish(DownloadEvent::Progress {
                id,
                percent,
                status: Some(status.describe()),
            });
        }
    }

    /// Record the outcome of the active item and move to the next one
    fn advance(&self, success: bool) -> Step {
        let mut slot = self.lock_slot();
        let batch = match &mut *slot {
            Slot::Running(batch) => batch,
            Slot::Idle => {
                return Step::Finished {
                    succeeded: 0,
                    failed: 0,
                    aborted: 0,
                }
            }
        };

        batch.active.handle = None;
        if success {
            batch.active.state = DownloadState::Succeeded;
            batch.succeeded += 1;
        } else {
            batch.active.state = DownloadState::Failed;
            batch.failed += 1;
        }

        match batch.pending.pop_front() {
            Some(next) => {
                batch.position += 1;
                batch.active = ActiveDownload::new(next.clone());
                Step::Next(Job {
                    request: next,
                    position: batch.position,
                    total: batch.total,
                })
            }
            None => Step::Finished {
                succeeded: batch.succeeded,
                failed: batch.failed,
                aborted: batch.aborted,
            },
        }
    }

    fn release(&self) {
        let mut slot = self.lock_slot();
        *slot = Slot::Idle;
        self.phase.send_replace(SlotPhase::Idle);
    }
}

/// Frees the slot if the driver task dies before finishing the batch
struct DriverGuard {
    shared: Arc<Shared>,
    armed: bool,
}

impl Drop for DriverGuard {
    fn drop(&mut self) {
        if self.armed {
            log::error!("[Scheduler] Driver stopped unexpectedly, releasing the slot");
            self.shared.release();
        }
    }
}

async fn drive(mut guard: DriverGuard, first: Job, config: ConfigurationSnapshot) {
    let shared = guard.shared.clone();
    let mut job = first;

    loop {
        let id = job.request.id();
        let result = shared.run_one(&job, &config).await;

        let error = match &result {
            Ok(()) => {
                log::info!("[Scheduler] {} finished", id);
                None
            }
            Err(e) => {
                match e {
                    DownloadError::ToolExecution { reason, .. } if reason.is_permanent() => {
                        log::warn!("[Scheduler] {} cannot be downloaded: {}", id, e)
                    }
                    _ => log::error!("[Scheduler] {} failed: {}", id, e),
                }
                Some(e.to_string())
            }
        };
        shared.bridge.publish(DownloadEvent::Complete {
            id,
            success: error.is_none(),
            error,
        });

        match shared.advance(result.is_ok()) {
            Step::Next(next) => job = next,
            Step::Finished {
                succeeded,
                failed,
                aborted,
            } => {
                log::info!(
                    "[Scheduler] Batch done: {} succeeded, {} failed, {} aborted",
                    succeeded,
                    failed,
                    aborted
                );
                shared.bridge.publish(DownloadEvent::BatchFinished {
                    succeeded,
                    failed,
                    aborted,
                });
                break;
            }
        }
    }

    guard.armed = false;
    shared.release();
}
