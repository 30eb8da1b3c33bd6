//! Run status.

use serde::{Deserialize, Serialize};

/// Status of a Run in the run store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// Run created but no launcher has picked it up.
    #[default]
    NotStarted,
    /// A launcher is bringing up the worker process.
    Starting,
    /// Worker reported that execution began.
    Started,
    /// Run completed successfully.
    Success,
    /// Run failed.
    Failure,
    /// Run was canceled.
    Canceled,
}

impl RunStatus {
    /// Returns true if the run is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failure | Self::Canceled)
    }
}
