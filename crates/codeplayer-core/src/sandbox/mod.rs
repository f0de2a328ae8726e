//! Isolated execution host.
//!
//! # Architecture
//!
//! ```text
//! ExecutionController
//!     │
//!     └── SandboxHost::render(ComposedDocument)
//!             │
//!             └── sandbox thread (owns the script engine)
//!                     │
//!                     ├── document::ParsedDocument   (styles, body, inline scripts)
//!                     ├── runtime::execute           (fresh engine context per render)
//!                     │       └── window.parent.postMessage ──► RelaySender
//!                     └── RenderedPreview            (watch channel for the UI)
//! ```
//!
//! Every render starts from a new engine context, so no globals, timers or
//! other script state survive from one run to the next. A script that never
//! terminates blocks the sandbox thread; there is no watchdog.
//!
//! # Module Structure
//!
//! - `document` - Splits a composed document into styles, body and scripts
//! - `runtime` - Script engine context setup and execution
//! - `host` - `SandboxHost`, the thread that owns the engine

mod document;
mod host;
mod runtime;

use std::sync::Arc;

use crate::compose::ComposedDocument;
use crate::source::ExecutionId;

pub use document::ParsedDocument;
pub use host::{SandboxConfig, SandboxHost};

/// Why a render request was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    /// The sandbox has not attached yet. Transient.
    #[error("sandbox not ready")]
    NotReady,

    /// The sandbox thread is gone.
    #[error("sandbox disconnected")]
    Disconnected,
}

/// Something that can render a composed document in isolation.
///
/// `render` hands the document over and returns; it does not wait for the
/// scripts to finish. Console output comes back only through the relay.
pub trait ExecutionHost: Send + Sync + 'static {
    fn render(&self, document: ComposedDocument) -> Result<(), HostError>;
}

/// The most recent document a sandbox rendered.
#[derive(Debug, Clone)]
pub struct RenderedPreview {
    pub execution_id: ExecutionId,
    pub capture: bool,
    /// The full composed document.
    pub document: Arc<str>,
    /// Body markup as rendered, scripts included.
    pub body: String,
    /// Uncaught script errors, in the order they were raised.
    pub errors: Vec<String>,
}
