//! Relay channel from the sandbox back to the host.
//!
//! One-way and best-effort. The sandbox posts JSON text (the serialized
//! `postMessage` data); the host decodes it and keeps only `console` messages.
//! Payloads arrive in the order the sandbox sent them.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::Result;
use crate::source::ExecutionId;

/// Console severity intercepted by the shim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Log,
    Warn,
    Error,
    Info,
}

impl LogKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LogKind::Log => "log",
            LogKind::Warn => "warn",
            LogKind::Error => "error",
            LogKind::Info => "info",
        }
    }
}

impl std::fmt::Display for LogKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A console record accepted by the execution controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub kind: LogKind,
    pub message: String,
    /// Local wall-clock time of receipt, `HH:MM:SS`.
    pub timestamp: String,
    pub execution_id: ExecutionId,
}

impl LogRecord {
    pub fn new(kind: LogKind, message: impl Into<String>, execution_id: ExecutionId) -> Self {
        Self {
            kind,
            message: message.into(),
            timestamp: chrono::Local::now().format("%H:%M:%S").to_string(),
            execution_id,
        }
    }
}

/// Structured message posted by the sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayMessage {
    Console {
        #[serde(rename = "logType")]
        log_type: LogKind,
        #[serde(rename = "executionId")]
        execution_id: ExecutionId,
        message: String,
    },
}

impl RelayMessage {
    /// Decode a relay payload.
    ///
    /// Returns `None` for malformed payloads and for anything that is not a
    /// console message; such traffic is dropped without further notice.
    pub fn decode(payload: &str) -> Option<Self> {
        match serde_json::from_str(payload) {
            Ok(message) => Some(message),
            Err(e) => {
                tracing::trace!("Dropping relay payload: {}", e);
                None
            }
        }
    }

    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Sending half, owned by the sandbox thread.
#[derive(Debug, Clone)]
pub struct RelaySender {
    tx: mpsc::UnboundedSender<String>,
}

impl RelaySender {
    /// Post a payload. Returns `false` once the host side is gone.
    pub fn post(&self, payload: String) -> bool {
        self.tx.send(payload).is_ok()
    }
}

/// Receiving half, owned by the execution controller.
#[derive(Debug)]
pub struct RelayReceiver {
    rx: mpsc::UnboundedReceiver<String>,
}

impl RelayReceiver {
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Take a payload that has already arrived, without waiting.
    pub fn try_recv(&mut self) -> Option<String> {
        self.rx.try_recv().ok()
    }
}

/// Create a relay channel.
pub fn channel() -> (RelaySender, RelayReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (RelaySender { tx }, RelayReceiver { rx })
}
