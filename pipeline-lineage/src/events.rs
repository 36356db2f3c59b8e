// Lineage Events
// Progress reporting for module-set applications

use crate::key::CompositeKey;

use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;

/// Sender for module-set progress events
pub type ProgressSender = mpsc::UnboundedSender<LineageEvent>;

/// Receiver for module-set progress events
pub type ProgressReceiver = mpsc::UnboundedReceiver<LineageEvent>;

/// Create a new progress channel
pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    mpsc::unbounded_channel()
}

/// The module-set operation an event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Apply,
    ApplyPaired,
    Fit,
    Predict,
    Transform,
    Evaluate,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Apply => "apply",
            Operation::ApplyPaired => "apply_paired",
            Operation::Fit => "fit",
            Operation::Predict => "predict",
            Operation::Transform => "transform",
            Operation::Evaluate => "evaluate",
        };
        f.write_str(name)
    }
}

/// Events emitted while a module set expands its inputs
#[derive(Debug, Clone)]
pub enum LineageEvent {
    /// Combinations have been resolved and modules are about to run
    StageStarted {
        set_name: String,
        operation: Operation,
        modules: usize,
        combinations: usize,
    },

    /// Two upstream keys went through different alternatives of the same set
    CombinationSkipped {
        set_name: String,
        left: CompositeKey,
        right: CompositeKey,
    },

    /// A new store was produced
    StageCompleted {
        set_name: String,
        operation: Operation,
        entries: usize,
        duration: Duration,
    },

    /// The application failed and no store was published
    StageFailed {
        set_name: String,
        operation: Operation,
        message: String,
    },
}

impl LineageEvent {
    pub fn stage_started(
        set_name: impl Into<String>,
        operation: Operation,
        modules: usize,
        combinations: usize,
    ) -> Self {
        Self::StageStarted {
            set_name: set_name.into(),
            operation,
            modules,
            combinations,
        }
    }

    pub fn combination_skipped(
        set_name: impl Into<String>,
        left: CompositeKey,
        right: CompositeKey,
    ) -> Self {
        Self::CombinationSkipped {
            set_name: set_name.into(),
            left,
            right,
        }
    }

    pub fn stage_completed(
        set_name: impl Into<String>,
        operation: Operation,
        entries: usize,
        duration: Duration,
    ) -> Self {
        Self::StageCompleted {
            set_name: set_name.into(),
            operation,
            entries,
            duration,
        }
    }

    pub fn stage_failed(
        set_name: impl Into<String>,
        operation: Operation,
        message: impl Into<String>,
    ) -> Self {
        Self::StageFailed {
            set_name: set_name.into(),
            operation,
            message: message.into(),
        }
    }

    /// Name of the module set that emitted this event
    pub fn set_name(&self) -> &str {
        match self {
            Self::StageStarted { set_name, .. }
            | Self::CombinationSkipped { set_name, .. }
            | Self::StageCompleted { set_name, .. }
            | Self::StageFailed { set_name, .. } => set_name,
        }
    }
}
