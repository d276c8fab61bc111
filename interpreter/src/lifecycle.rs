use std::sync::Arc;
use std::sync::atomic::AtomicU8;
use std::sync::atomic::Ordering;

use strum_macros::Display;

/// Lifecycle of one interpreter process:
/// `Created -> Started -> Running -> Killing -> Terminated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum SessionState {
    /// Configured but not spawned.
    Created,
    /// Process spawned and pipe tasks running; no frame decoded yet.
    Started,
    /// At least one frame decoded; input may be sent.
    Running,
    /// `kill()` in progress.
    Killing,
    /// Pipes drained and process reaped.
    Terminated,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Created,
            1 => Self::Started,
            2 => Self::Running,
            3 => Self::Killing,
            _ => Self::Terminated,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Created => 0,
            Self::Started => 1,
            Self::Running => 2,
            Self::Killing => 3,
            Self::Terminated => 4,
        }
    }
}

/// Shared view of the session state between the handle and its pipe tasks.
#[derive(Debug, Clone)]
pub(crate) struct Lifecycle {
    state: Arc<AtomicU8>,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(SessionState::Created.as_u8())),
        }
    }

    pub(crate) fn get(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, state: SessionState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    /// `Started -> Running`; any other state is left alone so a late frame cannot revive a
    /// session that is being killed.
    pub(crate) fn mark_running(&self) -> bool {
        self.state
            .compare_exchange(
                SessionState::Started.as_u8(),
                SessionState::Running.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}
