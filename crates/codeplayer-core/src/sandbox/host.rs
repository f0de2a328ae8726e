//! The sandbox thread and its handle.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;

use tokio::sync::watch;

use super::document::ParsedDocument;
use super::runtime;
use super::{ExecutionHost, HostError, RenderedPreview};
use crate::compose::ComposedDocument;
use crate::error::Result;
use crate::relay::RelaySender;

/// Sandbox limits.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Maximum `setTimeout` callbacks run per render.
    pub max_timer_callbacks: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            max_timer_callbacks: 1000,
        }
    }
}

enum HostCommand {
    Render(ComposedDocument),
    Shutdown,
}

/// Handle to a sandbox thread.
///
/// The thread owns the script engine; documents are rendered one at a time in
/// the order they were submitted, each in a fresh engine context.
pub struct SandboxHost {
    commands: mpsc::Sender<HostCommand>,
    ready: Arc<AtomicBool>,
    preview: watch::Receiver<Option<RenderedPreview>>,
}

impl SandboxHost {
    /// Start a sandbox thread relaying console traffic to `relay`.
    ///
    /// Returns immediately. Renders are refused with [`HostError::NotReady`]
    /// until the thread has booted its engine.
    pub fn spawn(relay: RelaySender, config: SandboxConfig) -> Result<Self> {
        let (commands, inbox) = mpsc::channel();
        let (preview_tx, preview) = watch::channel(None);
        let ready = Arc::new(AtomicBool::new(false));
        let ready_flag = ready.clone();

        thread::Builder::new()
            .name("codeplayer-sandbox".to_string())
            .spawn(move || run_sandbox(inbox, relay, config, preview_tx, ready_flag))?;

        Ok(Self {
            commands,
            ready,
            preview,
        })
    }

    /// Whether the sandbox accepts renders yet.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Subscribe to the most recent rendered preview.
    pub fn subscribe_preview(&self) -> watch::Receiver<Option<RenderedPreview>> {
        self.preview.clone()
    }
}

impl ExecutionHost for SandboxHost {
    fn render(&self, document: ComposedDocument) -> std::result::Result<(), HostError> {
        if !self.is_ready() {
            return Err(HostError::NotReady);
        }
        self.commands
            .send(HostCommand::Render(document))
            .map_err(|_| HostError::Disconnected)
    }
}

impl Drop for SandboxHost {
    fn drop(&mut self) {
        // A script stuck in a loop keeps the thread alive; it is detached.
        let _ = self.commands.send(HostCommand::Shutdown);
    }
}

fn run_sandbox(
    inbox: mpsc::Receiver<HostCommand>,
    relay: RelaySender,
    config: SandboxConfig,
    preview: watch::Sender<Option<RenderedPreview>>,
    ready: Arc<AtomicBool>,
) {
    // Boot once so engine start-up cost is paid before the first render.
    if let Err(e) = runtime::new_context() {
        tracing::warn!("Sandbox failed to boot: {}", e);
        return;
    }
    ready.store(true, Ordering::Release);
    tracing::debug!("Sandbox ready");

    while let Ok(command) = inbox.recv() {
        let document = match command {
            HostCommand::Render(document) => document,
            HostCommand::Shutdown => break,
        };

        let parsed = ParsedDocument::parse(document.as_str());
        tracing::debug!(
            execution_id = %document.execution_id,
            capture = document.capture,
            scripts = parsed.scripts.len(),
            "Rendering document"
        );
        let report = runtime::execute(&parsed, &relay, config.max_timer_callbacks);

        preview.send_replace(Some(RenderedPreview {
            execution_id: document.execution_id,
            capture: document.capture,
            document: document.html(),
            body: parsed.body,
            errors: report.errors,
        }));
    }

    ready.store(false, Ordering::Release);
    tracing::debug!("Sandbox stopped");
}
