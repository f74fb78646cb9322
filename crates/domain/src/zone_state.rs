use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::GameId;
use assassin_geometry::Coordinate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ZonePhase {
    Waiting,
    Shrinking,
    Holding,
    Final,
}

/// Singleton per game, created on first `ZoneEngine::advance` call while the
/// game is `ACTIVE` (`spec.md` §3, §4.8).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameZoneState {
    pub game_id: GameId,
    pub current_stage_index: usize,
    pub current_phase: ZonePhase,
    pub current_center: Coordinate,
    pub current_radius_meters: f64,
    pub next_radius_meters: Option<f64>,
    /// Radius at the moment the current SHRINKING phase began; needed to
    /// interpolate `current_radius_meters` on repeated `advance` calls
    /// without drifting (`spec.md` §4.8).
    pub shrink_start_radius_meters: Option<f64>,
    pub phase_start_time: DateTime<Utc>,
    pub phase_end_time: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub version: u64,
}
