//! Core engine for the Code Player playground.
//!
//! This crate provides:
//! - Document composition from the three editor buffers (markup, styles, script)
//! - The console interception shim injected ahead of user script
//! - An isolated execution host that re-materializes a script sandbox per run
//! - The relay channel carrying console records out of the sandbox
//! - The execution controller owning run identity and the captured console log
//!
//! # Data flow
//!
//! ```text
//! edit ──► ExecutionController::set_source ──► compose(capture = false) ─┐
//! run  ──► ExecutionController::run ────────► compose(capture = true) ──┤
//!                                                                       ▼
//!                                                          SandboxHost::render
//!                                                                       │
//!                                              window.parent.postMessage│
//!                                                                       ▼
//!                      ExecutionController ◄── filter by executionId ◄── relay
//! ```

pub mod compose;
pub mod controller;
pub mod error;
pub mod relay;
pub mod sandbox;
pub mod shim;
pub mod source;

pub use compose::{ComposeOptions, ComposedDocument, compose, compose_static};
pub use controller::{ControllerConfig, ExecutionController, RunOutcome, RunPhase};
pub use error::{Error, Result};
pub use relay::{LogKind, LogRecord, RelayMessage, RelayReceiver, RelaySender};
pub use sandbox::{ExecutionHost, HostError, RenderedPreview, SandboxConfig, SandboxHost};
pub use source::{ExecutionId, SourceBuffers, SourceKind};
