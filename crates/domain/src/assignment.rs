use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AssignmentId, GameId, PlayerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentStatus {
    Active,
    Completed,
    Cancelled,
}

/// One directed edge of the elimination chain: `assigner_id` hunts
/// `target_id`. Rows are append-only; the current edge for a given assigner
/// is whichever row has `status == Active` (`spec.md` §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetAssignment {
    pub id: AssignmentId,
    pub game_id: GameId,
    pub assigner_id: PlayerId,
    pub target_id: PlayerId,
    pub status: AssignmentStatus,
    pub assignment_date: DateTime<Utc>,
    pub completed_date: Option<DateTime<Utc>>,
}
