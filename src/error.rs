//! Error types for the payment simulator

use std::io;
use thiserror::Error;

/// Result type alias for server operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that stop the server from starting or running.
///
/// Anything that happens on a single connection stays on that connection and
/// is logged instead of surfacing here.
#[derive(Error, Debug)]
pub enum Error {
    /// The listening socket could not be created
    #[error("Failed to listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The tracing subscriber could not be installed
    #[error("Failed to initialise logging: {0}")]
    Telemetry(String),

    /// The interrupt/termination handler could not be installed
    #[error("Failed to install signal handler: {0}")]
    Signal(#[from] ctrlc::Error),
}
