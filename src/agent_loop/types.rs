//! Core turn types for the agent loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique turn identifier.
pub type TurnId = Uuid;

/// Hard ceiling on model calls per turn.
pub const MAX_STEPS: usize = 20;

/// Turn lifecycle status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    Completed,
    Failed,
    Cancelled,
}

/// Result of a turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnOutcome {
    pub turn_id: TurnId,
    pub status: TurnStatus,
    /// Model calls made.
    pub steps: usize,
    #[serde(default)]
    pub truncated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub finished_at: DateTime<Utc>,
}

impl TurnOutcome {
    pub fn completed(turn_id: TurnId, steps: usize, truncated: bool) -> Self {
        Self {
            turn_id,
            status: TurnStatus::Completed,
            steps,
            truncated,
            error: None,
            finished_at: Utc::now(),
        }
    }

    pub fn cancelled(turn_id: TurnId, steps: usize) -> Self {
        Self {
            turn_id,
            status: TurnStatus::Cancelled,
            steps,
            truncated: false,
            error: None,
            finished_at: Utc::now(),
        }
    }

    pub fn failed(turn_id: TurnId, steps: usize, error: impl Into<String>) -> Self {
        Self {
            turn_id,
            status: TurnStatus::Failed,
            steps,
            truncated: false,
            error: Some(error.into()),
            finished_at: Utc::now(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == TurnStatus::Completed
    }
}
