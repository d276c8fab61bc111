//! Runs a remote-Glk interpreter as a child process and turns its JSON output into reconciled
//! [`Output`](xyzzy_protocol::Output) frames.
//!
//! [`Interpreter::start`] spawns the process and returns a bounded receiver of frames. Each frame
//! carries the complete window layout, with the latest known content attached to every window.
//! Input is written back with [`Interpreter::send`], addressed to the most recent input request.

mod decoder;
mod error;
mod input_router;
mod lifecycle;
mod supervisor;
mod window_cache;

pub use decoder::FrameDecoder;
pub use decoder::MAX_PENDING_BYTES;
pub use error::DecodeError;
pub use error::SendError;
pub use error::SpawnError;
pub use input_router::InputRouter;
pub use input_router::InputTarget;
pub use input_router::MissingInputPolicy;
pub use lifecycle::SessionState;
pub use supervisor::DEFAULT_KILL_GRACE;
pub use supervisor::Interpreter;
pub use supervisor::InterpreterConfig;
pub use supervisor::OUTPUT_CHANNEL_CAPACITY;
pub use window_cache::WindowStateCache;
