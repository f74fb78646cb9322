use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::ids::{GameId, MapId, PlayerId};
use crate::settings::GameSettings;
use assassin_geometry::Coordinate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameStatus {
    Pending,
    Active,
    Completed,
    Cancelled,
}

impl GameStatus {
    /// Whether `self -> next` is an allowed lifecycle transition, ignoring
    /// the emergency-pause flag which never changes `status` (`spec.md` §3).
    pub fn can_transition_to(self, next: GameStatus) -> bool {
        use GameStatus::*;
        matches!(
            (self, next),
            (Pending, Active)
                | (Pending, Cancelled)
                | (Active, Completed)
                | (Active, Cancelled)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergencyPause {
    pub active: bool,
    pub reason: Option<String>,
    pub triggered_by: Option<PlayerId>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl Default for EmergencyPause {
    fn default() -> Self {
        Self {
            active: false,
            reason: None,
            triggered_by: None,
            timestamp: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    pub name: String,
    pub status: GameStatus,
    pub admin_player_id: PlayerId,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub boundary: Vec<Coordinate>,
    pub settings: GameSettings,
    pub emergency_pause: EmergencyPause,
    pub map_id: Option<MapId>,
    pub winner_player_id: Option<PlayerId>,
    /// Optimistic-concurrency version, bumped on every write through
    /// `Store::transact` (`spec.md` §5).
    pub version: u64,
    pub extra_settings: HashMap<String, String>,
}

impl Game {
    pub fn is_boundary_valid(&self) -> bool {
        self.boundary.len() >= 3
    }

    pub fn is_playable(&self) -> bool {
        self.status == GameStatus::Active && !self.emergency_pause.active
    }
}
