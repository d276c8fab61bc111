use xyzzy_protocol::Output;
use xyzzy_protocol::Window;
use xyzzy_protocol::WindowType;

use crate::format::Formatter;

/// Grid windows anchored at the top and at most this tall are treated as status lines.
pub const STATUS_WINDOW_MAX_HEIGHT: i32 = 5;

const DEBUG_RULE_WIDTH: usize = 60;

/// A frame split into the main text and the status line text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedOutput {
    pub body: String,
    /// Empty when the frame has no status window with content.
    pub status: String,
}

impl RenderedOutput {
    pub fn is_empty(&self) -> bool {
        self.body.is_empty() && self.status.is_empty()
    }
}

pub fn is_status_window(window: &Window) -> bool {
    window.kind == WindowType::TextGrid
        && window.top == 0
        && window.height <= STATUS_WINDOW_MAX_HEIGHT
}

impl Formatter {
    /// Renders every window of a reconciled frame in layout order, splitting status windows out
    /// of the body. Error frames render as empty text.
    pub fn render(&self, output: &Output) -> RenderedOutput {
        if output.is_error() {
            return RenderedOutput::default();
        }

        let mut body = Vec::new();
        let mut status = Vec::new();
        for window in output.windows() {
            let Some(text) = self.format_window(window) else {
                continue;
            };
            if is_status_window(window) {
                status.push(text);
            } else {
                body.push(text);
            }
        }

        RenderedOutput {
            body: self.with_leading_sentinel(body.join("\n")),
            status: status.join("\n"),
        }
    }

    /// Every window between rules, for debug logging.
    pub fn debug_dump(&self, output: &Output) -> String {
        let heavy = "=".repeat(DEBUG_RULE_WIDTH);
        let light = "-".repeat(DEBUG_RULE_WIDTH);
        let mut lines = vec![
            heavy.clone(),
            format!("{} gen {}", output.kind, output.generation),
        ];
        if let Some(message) = output.message.as_deref() {
            lines.push(format!("message: {message}"));
        }
        lines.push(light.clone());
        for window in output.windows() {
            lines.push(window.to_string());
            lines.push(self.format_window(window).unwrap_or_default());
            lines.push(light.clone());
        }
        lines.push(heavy);
        lines.join("\n")
    }

    /// Some chat renderers strip leading whitespace, so a body starting with a newline or a space
    /// gets a visible leader.
    fn with_leading_sentinel(&self, body: String) -> String {
        if !self.dialect().needs_leading_sentinel() {
            return body;
        }
        if body.starts_with('\n') {
            format!(".{body}")
        } else if body.starts_with(' ') {
            format!(".\n{body}")
        } else {
            body
        }
    }
}
