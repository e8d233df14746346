//! Data model for a single readiness run.
//!
//! An [`OrchestrationRun`] is owned by exactly one polling loop. Everything
//! else only ever sees clones of it (inside a [`crate::RunOutcome`]).

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ReadinessError, Result, RunFailure};

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First eight hex digits, enough to tell runs apart in a log view.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ---------------------------------------------------------------------------
// RunState
// ---------------------------------------------------------------------------

/// Lifecycle state of a run.
///
/// Transitions: `Polling ⇄ Remediating`, `Polling → Succeeded`, and any
/// non-terminal state → `Cancelled | Failed`. Terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Polling,
    Remediating,
    Succeeded,
    Cancelled,
    Failed,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Polling => "polling",
            RunState::Remediating => "remediating",
            RunState::Succeeded => "succeeded",
            RunState::Cancelled => "cancelled",
            RunState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Succeeded | RunState::Cancelled | RunState::Failed
        )
    }

    pub fn can_transition_to(&self, next: RunState) -> bool {
        use RunState::*;
        match (self, next) {
            (Succeeded | Cancelled | Failed, _) => false,
            (Polling, Remediating) | (Remediating, Polling) | (Polling, Succeeded) => true,
            (_, Cancelled | Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// OrchestrationRun
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationRun {
    pub id: RunId,
    pub target_status: String,
    pub poll_interval: Duration,
    pub triggered: bool,
    pub state: RunState,
    pub last_observed_status: Option<String>,
    /// Number of status queries issued so far.
    pub polls: u32,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl OrchestrationRun {
    pub fn new(target_status: impl Into<String>, poll_interval: Duration) -> Self {
        Self {
            id: RunId::new(),
            target_status: target_status.into(),
            poll_interval,
            triggered: false,
            state: RunState::Polling,
            last_observed_status: None,
            polls: 0,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    pub fn transition(&mut self, next: RunState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(ReadinessError::InvalidTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        self.state = next;
        if next.is_terminal() {
            self.ended_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Flip `triggered` to true. Fails if it was already set.
    pub fn mark_triggered(&mut self) -> Result<()> {
        if self.triggered {
            return Err(ReadinessError::InvalidTransition {
                from: "triggered".into(),
                to: "triggered".into(),
            });
        }
        self.triggered = true;
        Ok(())
    }

    pub fn record_status(&mut self, status: impl Into<String>) {
        self.last_observed_status = Some(status.into());
    }

    pub fn is_target(&self, status: &str) -> bool {
        status == self.target_status
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.ended_at.unwrap_or_else(Utc::now) - self.started_at
    }
}

// ---------------------------------------------------------------------------
// RunOutcome
// ---------------------------------------------------------------------------

/// The terminal event of a run, handed to the sink and to every waiter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub state: RunState,
    /// Set only when `state` is `Failed`.
    pub failure: Option<RunFailure>,
    pub run: OrchestrationRun,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        self.state == RunState::Succeeded
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.failure {
            Some(failure) => write!(f, "{}: {failure}", self.state),
            None => write!(f, "{}", self.state),
        }
    }
}
