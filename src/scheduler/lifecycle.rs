//! Scheduler lifecycle state machine.

use std::fmt;

use serde::Serialize;

/// `Idle → Ready → Serving → Draining → Idle`. `Ready → Draining` is also
/// valid when no worker pool was ever started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Lifecycle {
    /// Not initialized, or fully shut down.
    Idle,
    /// Initialized with a client; ops may be admitted and dequeued manually.
    Ready,
    /// Worker pool running.
    Serving,
    /// Shutdown in progress: admission refused, in-flight ops draining.
    Draining,
}

impl Lifecycle {
    /// Whether new streams and ops are admitted.
    pub fn is_accepting(self) -> bool {
        matches!(self, Self::Ready | Self::Serving)
    }

    pub fn is_draining(self) -> bool {
        self == Self::Draining
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Ready => "ready",
            Self::Serving => "serving",
            Self::Draining => "draining",
        };
        f.write_str(name)
    }
}
