use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{GameId, PlayerId};
use assassin_geometry::Coordinate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayerStatus {
    Invited,
    Active,
    Dead,
    Spectator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocationVisibility {
    GameOnly,
    TeamOnly,
    FriendsOnly,
    Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocationPrecision {
    Exact,
    Approximate,
    Zone,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub email: String,
    pub status: PlayerStatus,
    pub game_id: Option<GameId>,
    pub target_id: Option<PlayerId>,
    pub target_name: Option<String>,
    pub kill_count: u32,
    pub location: Option<Coordinate>,
    pub accuracy_m: Option<f64>,
    pub location_timestamp: Option<DateTime<Utc>>,
    pub location_sharing_enabled: bool,
    pub location_visibility: LocationVisibility,
    pub location_precision: LocationPrecision,
    pub location_pause_cooldown_until: Option<DateTime<Utc>>,
    /// Remaining health against `GameSettings::player_health`, drained by the
    /// shrinking-zone damage loop (`spec.md` §4.8).
    pub health: f64,
    pub version: u64,
}

impl Player {
    pub fn has_recent_location(&self, now: DateTime<Utc>, staleness_sec: i64) -> bool {
        match self.location_timestamp {
            Some(ts) => (now - ts).num_seconds() <= staleness_sec,
            None => false,
        }
    }
}
