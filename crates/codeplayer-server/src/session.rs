//! Editing session management.
//!
//! One session per WebSocket connection. A session owns one execution
//! controller (and through it one sandbox), and turns controller activity into
//! server messages on a broadcast channel.

use std::sync::Arc;

use codeplayer_core::{
    ControllerConfig, ExecutionController, LogRecord, RenderedPreview, RunOutcome, SandboxConfig,
};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::error::ServerResult;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::share::SnippetStore;

/// Capacity for the broadcast channel.
/// Console updates carry the whole log, so a lagging client only needs the
/// latest one.
const MESSAGE_CHANNEL_CAPACITY: usize = 256;

/// An editing session.
pub struct PlaygroundSession {
    /// Owns run identity, capture flag and the console log.
    controller: ExecutionController,

    /// Where `save`/`load` go.
    store: Arc<dyn SnippetStore>,

    /// Share id of the snippet last saved or loaded.
    share_id: Option<String>,

    /// Broadcast channel for server messages.
    tx: broadcast::Sender<ServerMessage>,

    /// Tasks forwarding controller watches onto `tx`.
    forwarders: Vec<JoinHandle<()>>,
}

impl PlaygroundSession {
    /// Create a session with its own sandbox.
    pub fn new(
        store: Arc<dyn SnippetStore>,
        controller: ControllerConfig,
        sandbox: SandboxConfig,
    ) -> ServerResult<Self> {
        let controller = ExecutionController::with_sandbox(controller, sandbox)?;
        Ok(Self::with_controller(controller, store))
    }

    /// Create a session around an existing controller.
    pub fn with_controller(controller: ExecutionController, store: Arc<dyn SnippetStore>) -> Self {
        let (tx, _) = broadcast::channel(MESSAGE_CHANNEL_CAPACITY);

        let mut forwarders = vec![tokio::spawn(forward_logs(controller.subscribe_logs(), tx.clone()))];
        if let Some(preview) = controller.subscribe_preview() {
            forwarders.push(tokio::spawn(forward_previews(preview, tx.clone())));
        }

        Self {
            controller,
            store,
            share_id: None,
            tx,
            forwarders,
        }
    }

    /// Subscribe to server messages.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.tx.subscribe()
    }

    /// Send a message to every subscriber.
    pub fn broadcast(&self, msg: ServerMessage) {
        // No subscribers is fine.
        let _ = self.tx.send(msg);
    }

    pub fn controller(&self) -> &ExecutionController {
        &self.controller
    }

    pub fn share_id(&self) -> Option<&str> {
        self.share_id.as_deref()
    }

    /// Full session state.
    pub fn get_state(&self) -> ServerMessage {
        ServerMessage::SessionState {
            sources: self.controller.sources(),
            logs: self.controller.logs(),
            execution_id: self.controller.execution_id(),
            phase: self.controller.phase(),
            share_id: self.share_id.clone(),
        }
    }

    /// Apply a client message. Replies go out on the broadcast channel.
    pub fn handle_message(&mut self, msg: ClientMessage) {
        match msg {
            ClientMessage::GetState => self.broadcast(self.get_state()),

            ClientMessage::EditSource { kind, source } => {
                self.controller.set_source(kind, source);
            }

            ClientMessage::SetSources { sources } => {
                self.controller.set_sources(sources);
            }

            ClientMessage::Run => match self.controller.run() {
                RunOutcome::Started(execution_id) => {
                    self.broadcast(ServerMessage::RunStarted { execution_id });
                }
                RunOutcome::Ignored => self.broadcast(ServerMessage::RunIgnored),
            },

            ClientMessage::Clear => self.controller.clear(),

            ClientMessage::Save => {
                match self.store.save(self.controller.sources(), self.share_id.as_deref()) {
                    Ok(snippet) => {
                        self.share_id = Some(snippet.share_id.clone());
                        self.broadcast(ServerMessage::Saved {
                            share_id: snippet.share_id,
                        });
                    }
                    Err(e) => {
                        tracing::warn!("Save failed: {}", e);
                        self.broadcast(ServerMessage::Error {
                            message: e.to_string(),
                        });
                    }
                }
            }

            ClientMessage::Load { share_id } => match self.store.load(&share_id) {
                Ok(snippet) => {
                    self.controller.set_sources(snippet.sources.clone());
                    self.share_id = Some(snippet.share_id.clone());
                    self.broadcast(ServerMessage::Loaded {
                        share_id: snippet.share_id,
                        sources: snippet.sources,
                    });
                }
                Err(e) => {
                    tracing::debug!("Load failed: {}", e);
                    self.broadcast(ServerMessage::Error {
                        message: e.to_string(),
                    });
                }
            },
        }
    }
}

impl Drop for PlaygroundSession {
    fn drop(&mut self) {
        for task in &self.forwarders {
            task.abort();
        }
    }
}

async fn forward_logs(mut logs: watch::Receiver<Vec<LogRecord>>, tx: broadcast::Sender<ServerMessage>) {
    while logs.changed().await.is_ok() {
        let logs = logs.borrow_and_update().clone();
        let _ = tx.send(ServerMessage::ConsoleUpdated { logs });
    }
}

async fn forward_previews(
    mut preview: watch::Receiver<Option<RenderedPreview>>,
    tx: broadcast::Sender<ServerMessage>,
) {
    while preview.changed().await.is_ok() {
        let Some(rendered) = preview.borrow_and_update().clone() else {
            continue;
        };
        let _ = tx.send(ServerMessage::PreviewUpdated {
            execution_id: rendered.execution_id,
            document: rendered.document.to_string(),
        });
    }
}
