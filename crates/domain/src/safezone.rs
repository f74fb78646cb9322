use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{GameId, PlayerId, SafeZoneId};
use assassin_geometry::Coordinate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SafeZoneType {
    Public,
    Private,
    Timed,
    Relocatable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafeZone {
    pub id: SafeZoneId,
    pub game_id: GameId,
    pub zone_type: SafeZoneType,
    pub center: Coordinate,
    pub radius_meters: f64,
    pub name: String,
    pub description: String,
    pub created_by: PlayerId,
    /// Only consulted for `Private` zones.
    pub authorized_player_ids: Vec<PlayerId>,
    /// Only consulted for `Timed` zones.
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Only consulted for `Relocatable` zones.
    pub relocation_cooldown_until: Option<DateTime<Utc>>,
    pub version: u64,
}

impl SafeZone {
    /// True iff the zone's type/time constraints permit it at `t`, ignoring
    /// game status and membership (those are `SafeZone::isPointSafe`'s job
    /// per `spec.md` §4.4).
    pub fn is_active_at(&self, t: DateTime<Utc>) -> bool {
        match self.zone_type {
            SafeZoneType::Timed => match (self.start_time, self.end_time) {
                (Some(start), Some(end)) => start <= t && t < end,
                _ => false,
            },
            _ => true,
        }
    }

    /// True iff `player_id` is authorized to shelter in this zone, per the
    /// per-type rules in `spec.md` §4.4.
    pub fn authorizes(&self, player_id: &PlayerId) -> bool {
        match self.zone_type {
            SafeZoneType::Public => true,
            SafeZoneType::Timed => true,
            SafeZoneType::Private => self.authorized_player_ids.contains(player_id),
            SafeZoneType::Relocatable => &self.created_by == player_id,
        }
    }
}
