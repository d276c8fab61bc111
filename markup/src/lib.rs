//! Renders reconciled interpreter frames as chat text.
//!
//! Span styles map onto four markup primitives (emphasis, strong, monospace, quote prefix) in the
//! chosen [`MarkupDialect`]. A frame renders to a body plus a separate status line taken from the
//! top-anchored grid window.

mod dialect;
mod format;
mod render;

pub use dialect::MarkupDialect;
pub use dialect::SPAN_JOINER;
pub use format::Formatter;
pub use render::RenderedOutput;
pub use render::STATUS_WINDOW_MAX_HEIGHT;
pub use render::is_status_window;
