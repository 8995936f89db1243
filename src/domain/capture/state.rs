//! Capture state machine

use std::fmt;
use thiserror::Error;

/// Capture states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CaptureState {
    #[default]
    Idle,
    Acquiring,
    Recording,
    Finalizing,
    Failed,
}

impl CaptureState {
    /// Get the string representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Acquiring => "acquiring",
            Self::Recording => "recording",
            Self::Finalizing => "finalizing",
            Self::Failed => "failed",
        }
    }

    /// Whether a capture session currently exists
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Acquiring | Self::Recording | Self::Finalizing)
    }
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error when an invalid state transition is attempted
#[derive(Debug, Clone, Error)]
#[error("Invalid state transition: cannot {action} while {current_state}")]
pub struct InvalidStateTransition {
    pub current_state: CaptureState,
    pub action: String,
}

/// Capture lifecycle.
///
/// State machine:
///   IDLE | FAILED -> ACQUIRING (begin_acquire)
///   ACQUIRING -> RECORDING (acquired)
///   RECORDING -> FINALIZING (begin_finalize)
///   FINALIZING -> IDLE (finalized)
///   ACQUIRING | RECORDING | FINALIZING -> FAILED (fail)
#[derive(Debug, Default)]
pub struct CaptureLifecycle {
    state: CaptureState,
}

impl CaptureLifecycle {
    /// Create a lifecycle in idle state
    pub fn new() -> Self {
        Self {
            state: CaptureState::Idle,
        }
    }

    /// Get the current state
    pub fn state(&self) -> CaptureState {
        self.state
    }

    fn transition(
        &mut self,
        allowed: &[CaptureState],
        next: CaptureState,
        action: &str,
    ) -> Result<(), InvalidStateTransition> {
        if !allowed.contains(&self.state) {
            return Err(InvalidStateTransition {
                current_state: self.state,
                action: action.to_string(),
            });
        }
        self.state = next;
        Ok(())
    }

    /// Transition from IDLE or FAILED to ACQUIRING
    pub fn begin_acquire(&mut self) -> Result<(), InvalidStateTransition> {
        self.transition(
            &[CaptureState::Idle, CaptureState::Failed],
            CaptureState::Acquiring,
            "start capture",
        )
    }

    /// Transition from ACQUIRING to RECORDING
    pub fn acquired(&mut self) -> Result<(), InvalidStateTransition> {
        self.transition(
            &[CaptureState::Acquiring],
            CaptureState::Recording,
            "begin recording",
        )
    }

    /// Transition from RECORDING to FINALIZING
    pub fn begin_finalize(&mut self) -> Result<(), InvalidStateTransition> {
        self.transition(
            &[CaptureState::Recording],
            CaptureState::Finalizing,
            "stop capture",
        )
    }

    /// Transition from FINALIZING to IDLE
    pub fn finalized(&mut self) -> Result<(), InvalidStateTransition> {
        self.transition(
            &[CaptureState::Finalizing],
            CaptureState::Idle,
            "complete capture",
        )
    }

    /// Transition from any active state to FAILED
    pub fn fail(&mut self) -> Result<(), InvalidStateTransition> {
        self.transition(
            &[
                CaptureState::Acquiring,
                CaptureState::Recording,
                CaptureState::Finalizing,
            ],
            CaptureState::Failed,
            "fail capture",
        )
    }
}
