use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{GameId, PlayerId};
use assassin_geometry::Coordinate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationMethod {
    Button,
    Photo,
    Nfc,
    Gps,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    Pending,
    PendingReview,
    Verified,
    Rejected,
}

/// Method-specific evidence attached to a kill attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationData {
    Button,
    Photo { image_hash: Option<String>, url: Option<String> },
    Nfc { tag_id: String },
    Gps { killer_location: Coordinate, victim_location: Coordinate },
}

/// Composite key `(killer_id, kill_time)` per `spec.md` §3.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KillKey {
    pub killer_id: PlayerId,
    pub kill_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kill {
    pub key: KillKey,
    pub game_id: GameId,
    pub victim_id: PlayerId,
    pub latitude: f64,
    pub longitude: f64,
    pub verification_method: VerificationMethod,
    pub verification_status: VerificationStatus,
    pub verification_data: VerificationData,
    pub verified_by: Option<PlayerId>,
    pub verified_at: Option<DateTime<Utc>>,
}
