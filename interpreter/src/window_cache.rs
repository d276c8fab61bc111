use std::sync::Arc;

use tracing::debug;
use tracing::warn;
use xyzzy_protocol::Output;
use xyzzy_protocol::Window;
use xyzzy_protocol::WindowId;

/// Remembers the last window layout so that every reconciled frame carries a complete window
/// list, even though the interpreter only sends one when the layout changes.
#[derive(Debug, Default)]
pub struct WindowStateCache {
    windows: Vec<Window>,
}

impl WindowStateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot in top-left reading order.
    pub fn windows(&self) -> &[Window] {
        &self.windows
    }

    /// Fills in the window list of `output` and attaches each content delta to its window.
    ///
    /// A window list on the frame replaces the snapshot wholesale; an absent one reuses the
    /// snapshot. Content stays attached to the snapshot's windows until a newer delta or a new
    /// layout arrives. Returns the ids of content entries that matched no window.
    pub fn reconcile(&mut self, output: &mut Output) -> Vec<WindowId> {
        match output.windows.take() {
            Some(mut windows) => {
                windows.sort_by_key(|window| (window.top, window.left));
                debug!(count = windows.len(), "replacing cached window layout");
                self.windows = windows;
            }
            None => debug!("using cached window layout"),
        }

        let mut unmapped = Vec::new();
        for content in &output.content {
            match self
                .windows
                .iter_mut()
                .find(|window| window.id == content.id)
            {
                Some(window) => window.content = Some(Arc::clone(content)),
                None => {
                    warn!(window = content.id, "could not map content to window");
                    unmapped.push(content.id);
                }
            }
        }

        output.windows = Some(self.windows.clone());
        unmapped
    }
}
