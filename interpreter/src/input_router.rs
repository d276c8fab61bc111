use std::sync::Arc;
use std::sync::Mutex;

use strum_macros::Display;
use xyzzy_protocol::Generation;
use xyzzy_protocol::Output;
use xyzzy_protocol::WindowId;

/// Window and generation the next input frame must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputTarget {
    pub window: WindowId,
    pub generation: Generation,
}

/// What to do with a frame that carries no input request. Save and restore commands are known
/// to answer without prompting again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum MissingInputPolicy {
    /// Keep the previous window and generation.
    #[default]
    RetainPrevious,
    /// Keep the previous window but adopt the frame's top-level generation.
    AdoptFrameGeneration,
}

impl MissingInputPolicy {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "retain" | "retain-previous" => Some(Self::RetainPrevious),
            "frame-gen" | "adopt-frame-generation" => Some(Self::AdoptFrameGeneration),
            _ => None,
        }
    }
}

/// Tracks which prompt outgoing input answers.
///
/// Written only by the decode task and read by the send path; both fields are always replaced
/// together.
#[derive(Debug, Clone, Default)]
pub struct InputRouter {
    target: Arc<Mutex<InputTarget>>,
    policy: MissingInputPolicy,
}

impl InputRouter {
    pub fn new(policy: MissingInputPolicy) -> Self {
        Self {
            target: Arc::default(),
            policy,
        }
    }

    pub fn current(&self) -> InputTarget {
        *self.lock()
    }

    /// Adopts the first input request of a reconciled frame.
    pub fn observe(&self, output: &Output) {
        let mut target = self.lock();
        match output.input_request() {
            Some(request) => {
                *target = InputTarget {
                    window: request.id,
                    generation: request.generation,
                };
            }
            None => match self.policy {
                MissingInputPolicy::RetainPrevious => {}
                MissingInputPolicy::AdoptFrameGeneration => {
                    *target = InputTarget {
                        window: target.window,
                        generation: output.generation,
                    };
                }
            },
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, InputTarget> {
        match self.target.lock() {
            Ok(guard) => guard,
            Err(err) => err.into_inner(),
        }
    }
}
