//! Error types for codeplayer-core.

use thiserror::Error;

/// Result type for codeplayer-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in codeplayer-core.
///
/// None of these reach the playground user: render failures are retried and
/// swallowed by the controller, and script errors travel as console records.
#[derive(Debug, Error)]
pub enum Error {
    /// The sandbox thread could not be started.
    #[error("failed to start sandbox: {0}")]
    SandboxSpawn(#[from] std::io::Error),

    /// A relay payload could not be encoded.
    #[error("relay encoding error: {0}")]
    RelayEncoding(#[from] serde_json::Error),
}
