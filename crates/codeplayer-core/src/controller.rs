//! Execution controller.
//!
//! Owns the run identity, the capture flag and the accumulated console log,
//! and exposes the run/clear contract to the editing session.
//!
//! Edits trigger silent runs (capture off) so the preview follows the editor.
//! An explicit [`ExecutionController::run`] increments the execution id and
//! renders with capture on. Relayed records are accepted only when they carry
//! the current execution id, which keeps output from superseded or cleared
//! runs out of the log.
//!
//! Every render goes through one queue drained by a single task, so documents
//! reach the host in the order they were submitted. Only the head of the queue
//! is retried. A silent document that keeps failing is dropped as soon as a
//! newer document is waiting behind it; anything else is retried a bounded
//! number of times and then dropped.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;

use crate::compose::{ComposeOptions, ComposedDocument, compose};
use crate::error::Result;
use crate::relay::{self, LogRecord, RelayMessage, RelayReceiver};
use crate::sandbox::{ExecutionHost, HostError, RenderedPreview, SandboxConfig, SandboxHost};
use crate::source::{ExecutionId, SourceBuffers, SourceKind};

/// Controller timings.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Delay before a silent run's render.
    pub render_delay: Duration,
    /// Delay between accepting an explicit run and rendering it.
    pub run_delay: Duration,
    /// Time after a capturing render before the re-entrancy guard re-arms.
    pub settle_delay: Duration,
    /// Retry delay while the sandbox is not attached yet.
    pub not_ready_retry_delay: Duration,
    /// Retry delay after any other render failure.
    pub error_retry_delay: Duration,
    /// Render attempts before a document is dropped.
    pub max_render_attempts: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            render_delay: Duration::ZERO,
            run_delay: Duration::from_millis(10),
            settle_delay: Duration::from_millis(100),
            not_ready_retry_delay: Duration::from_millis(50),
            error_retry_delay: Duration::from_millis(100),
            max_render_attempts: 20,
        }
    }
}

/// Where the controller is in its run cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Idle,
    SilentRunPending,
    CapturingRunPending,
}

/// Result of asking for an explicit run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// A capturing run was scheduled under this id.
    Started(ExecutionId),
    /// A capturing run was already in flight; nothing was scheduled.
    Ignored,
}

struct ControllerState {
    sources: SourceBuffers,
    execution_id: ExecutionId,
    capture: bool,
    phase: RunPhase,
    /// Silent renders submitted and not yet finished.
    silent_pending: usize,
    /// Buffers changed while a capturing run held the guard.
    edited_during_run: bool,
}

/// A document waiting in the render queue.
struct RenderJob {
    document: ComposedDocument,
    not_before: Instant,
    done: oneshot::Sender<()>,
}

struct Inner {
    config: ControllerConfig,
    state: Mutex<ControllerState>,
    /// The accumulated log. The channel value is the only copy.
    logs_tx: watch::Sender<Vec<LogRecord>>,
    renders: mpsc::UnboundedSender<RenderJob>,
    preview: Option<watch::Receiver<Option<RenderedPreview>>>,
}

/// Handle to an execution controller. Cheap to clone.
///
/// Must be created inside a tokio runtime: the relay subscription and all
/// scheduled renders run as tasks on it.
#[derive(Clone)]
pub struct ExecutionController {
    inner: Arc<Inner>,
}

impl ExecutionController {
    /// Create a controller rendering through `host` and listening on `relay`.
    ///
    /// The relay subscription lives as long as the controller.
    pub fn new(host: Arc<dyn ExecutionHost>, relay: RelayReceiver, config: ControllerConfig) -> Self {
        Self::build(host, relay, config, None)
    }

    /// Create a controller backed by a fresh [`SandboxHost`].
    pub fn with_sandbox(config: ControllerConfig, sandbox: SandboxConfig) -> Result<Self> {
        let (relay_tx, relay_rx) = relay::channel();
        let host = SandboxHost::spawn(relay_tx, sandbox)?;
        let preview = host.subscribe_preview();
        Ok(Self::build(Arc::new(host), relay_rx, config, Some(preview)))
    }

    fn build(
        host: Arc<dyn ExecutionHost>,
        relay: RelayReceiver,
        config: ControllerConfig,
        preview: Option<watch::Receiver<Option<RenderedPreview>>>,
    ) -> Self {
        let (logs_tx, _) = watch::channel(Vec::new());
        let (renders, jobs) = mpsc::unbounded_channel();
        tokio::spawn(render_queue(host, config.clone(), jobs));

        let inner = Arc::new(Inner {
            config,
            state: Mutex::new(ControllerState {
                sources: SourceBuffers::default(),
                execution_id: ExecutionId::default(),
                capture: false,
                phase: RunPhase::Idle,
                silent_pending: 0,
                edited_during_run: false,
            }),
            logs_tx,
            renders,
            preview,
        });

        tokio::spawn(listen(Arc::downgrade(&inner), relay));

        Self { inner }
    }

    /// Replace one buffer. Triggers a silent run if the content changed.
    pub fn set_source(&self, kind: SourceKind, text: impl Into<String>) {
        let changed = self.inner.lock().sources.set(kind, text);
        if changed {
            self.inner.sources_changed();
        }
    }

    /// Replace all three buffers. Triggers a silent run if anything changed.
    pub fn set_sources(&self, sources: SourceBuffers) {
        let changed = {
            let mut state = self.inner.lock();
            if state.sources == sources {
                false
            } else {
                state.sources = sources;
                true
            }
        };
        if changed {
            self.inner.sources_changed();
        }
    }

    /// Start a capturing run.
    ///
    /// Ignored while another capturing run is in flight. Existing log records
    /// are kept; new ones are appended.
    pub fn run(&self) -> RunOutcome {
        let execution_id = {
            let mut state = self.inner.lock();
            if state.phase == RunPhase::CapturingRunPending {
                tracing::debug!("Run ignored: capturing run {} in flight", state.execution_id);
                return RunOutcome::Ignored;
            }
            state.phase = RunPhase::CapturingRunPending;
            state.execution_id = state.execution_id.next();
            state.capture = true;
            state.execution_id
        };

        tracing::debug!("Starting capturing run {}", execution_id);
        tokio::spawn(capturing_run(self.inner.clone(), execution_id));
        RunOutcome::Started(execution_id)
    }

    /// Empty the log and retire the current execution id.
    ///
    /// Records still in flight from the cleared run carry the old id and are
    /// discarded on arrival.
    pub fn clear(&self) {
        let mut state = self.inner.lock();
        state.execution_id = state.execution_id.next();
        self.inner.logs_tx.send_modify(Vec::clear);
        tracing::debug!("Console cleared, execution id now {}", state.execution_id);
    }

    /// Snapshot of the accumulated log.
    pub fn logs(&self) -> Vec<LogRecord> {
        self.inner.logs_tx.borrow().clone()
    }

    /// Subscribe to log changes. The value is the whole accumulated sequence.
    pub fn subscribe_logs(&self) -> watch::Receiver<Vec<LogRecord>> {
        self.inner.logs_tx.subscribe()
    }

    /// Subscribe to rendered previews, when the host publishes them.
    pub fn subscribe_preview(&self) -> Option<watch::Receiver<Option<RenderedPreview>>> {
        self.inner.preview.clone()
    }

    pub fn execution_id(&self) -> ExecutionId {
        self.inner.lock().execution_id
    }

    pub fn phase(&self) -> RunPhase {
        self.inner.lock().phase
    }

    pub fn is_capturing(&self) -> bool {
        self.inner.lock().capture
    }

    pub fn sources(&self) -> SourceBuffers {
        self.inner.lock().sources.clone()
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sources_changed(self: &Arc<Self>) {
        let rendered = {
            let mut state = self.lock();
            if state.phase == RunPhase::CapturingRunPending {
                state.edited_during_run = true;
                return;
            }
            state.phase = RunPhase::SilentRunPending;
            state.capture = false;
            state.silent_pending += 1;
            let document = compose(&state.sources, ComposeOptions::silent(state.execution_id));
            // Submitted under the lock so queue order follows edit order.
            self.submit(document, self.config.render_delay)
        };

        let inner = self.clone();
        tokio::spawn(async move {
            rendered.await.ok();
            let mut state = inner.lock();
            state.silent_pending = state.silent_pending.saturating_sub(1);
            if state.silent_pending == 0 && state.phase == RunPhase::SilentRunPending {
                state.phase = RunPhase::Idle;
            }
        });
    }

    /// Queue a document for rendering. The receiver fires once the document
    /// has been rendered or dropped.
    fn submit(&self, document: ComposedDocument, delay: Duration) -> oneshot::Receiver<()> {
        let (done, rendered) = oneshot::channel();
        let job = RenderJob {
            document,
            not_before: Instant::now() + delay,
            done,
        };
        if self.renders.send(job).is_err() {
            tracing::warn!("Render queue closed");
        }
        rendered
    }

    /// Apply one relay payload.
    fn accept(&self, payload: &str) {
        let Some(RelayMessage::Console {
            log_type,
            execution_id,
            message,
        }) = RelayMessage::decode(payload)
        else {
            return;
        };

        let state = self.lock();
        if execution_id != state.execution_id {
            tracing::trace!(
                "Discarding {} record from execution {} (current {})",
                log_type,
                execution_id,
                state.execution_id
            );
            return;
        }
        self.logs_tx
            .send_modify(|logs| logs.push(LogRecord::new(log_type, message, execution_id)));
    }
}

async fn capturing_run(inner: Arc<Inner>, execution_id: ExecutionId) {
    tokio::time::sleep(inner.config.run_delay).await;

    let rendered = {
        let state = inner.lock();
        // A clear() during the delay retires this id; nothing would be kept.
        (state.execution_id == execution_id).then(|| {
            let document = compose(&state.sources, ComposeOptions::capturing(execution_id));
            inner.submit(document, Duration::ZERO)
        })
    };
    if let Some(rendered) = rendered {
        rendered.await.ok();
    }

    tokio::time::sleep(inner.config.settle_delay).await;

    let catch_up = {
        let mut state = inner.lock();
        state.phase = if state.silent_pending > 0 {
            RunPhase::SilentRunPending
        } else {
            RunPhase::Idle
        };
        std::mem::take(&mut state.edited_during_run)
    };
    if catch_up {
        inner.sources_changed();
    }
}

/// The controller's single render task. Ends when the controller is dropped.
async fn render_queue(
    host: Arc<dyn ExecutionHost>,
    config: ControllerConfig,
    mut jobs: mpsc::UnboundedReceiver<RenderJob>,
) {
    let mut queue = VecDeque::new();
    while let Some(job) = jobs.recv().await {
        queue.push_back(job);
        while let Some(RenderJob {
            document,
            not_before,
            done,
        }) = queue.pop_front()
        {
            tokio::time::sleep_until(not_before).await;
            render_head(host.as_ref(), &config, &document, &mut jobs, &mut queue).await;
            done.send(()).ok();
        }
    }
    tracing::debug!("Render queue closed");
}

/// Hand the head of the queue to the host, retrying transient failures.
async fn render_head(
    host: &dyn ExecutionHost,
    config: &ControllerConfig,
    document: &ComposedDocument,
    jobs: &mut mpsc::UnboundedReceiver<RenderJob>,
    queue: &mut VecDeque<RenderJob>,
) {
    for attempt in 1..=config.max_render_attempts {
        let delay = match host.render(document.clone()) {
            Ok(()) => return,
            Err(HostError::NotReady) => {
                tracing::trace!("Sandbox not ready (attempt {})", attempt);
                config.not_ready_retry_delay
            }
            Err(e) => {
                tracing::debug!("Render failed (attempt {}): {}", attempt, e);
                config.error_retry_delay
            }
        };

        while let Ok(job) = jobs.try_recv() {
            queue.push_back(job);
        }
        if !document.capture && !queue.is_empty() {
            tracing::debug!(
                "Dropping superseded silent render for execution {}",
                document.execution_id
            );
            return;
        }
        tokio::time::sleep(delay).await;
    }
    tracing::warn!(
        "Dropping render for execution {} after {} attempts",
        document.execution_id,
        config.max_render_attempts
    );
}

/// The controller's single relay subscription.
async fn listen(inner: Weak<Inner>, mut relay: RelayReceiver) {
    while let Some(payload) = relay.recv().await {
        let Some(controller) = inner.upgrade() else {
            break;
        };
        controller.accept(&payload);
    }
    tracing::debug!("Relay subscription closed");
}
