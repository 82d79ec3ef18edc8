//! Error types for the room server.

use std::io;
use thiserror::Error;

/// Errors that stop the server from starting or serving.
///
/// Per-connection failures never surface here; they are logged and isolated
/// to the connection that produced them.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
