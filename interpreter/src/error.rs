//! Error types for the interpreter bridge.

use crate::lifecycle::SessionState;

/// Starting the interpreter failed. Fatal to the session.
#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    #[error("failed to start interpreter `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("interpreter {0} pipe unavailable")]
    MissingPipe(&'static str),
}

/// Writing an input frame to the interpreter failed.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("interpreter is not accepting input (state: {0})")]
    NotRunning(SessionState),

    #[error("interpreter stdin is closed")]
    StdinClosed,

    #[error("failed to encode input frame: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to write to interpreter stdin: {0}")]
    Write(#[from] std::io::Error),
}

/// A frame that could not be decoded. Logged and skipped, never propagated past the decode loop.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed frame ({discarded} bytes discarded): {source}")]
    Malformed {
        discarded: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("pending frame exceeded {limit} bytes ({discarded} bytes discarded)")]
    Oversized { limit: usize, discarded: usize },
}
