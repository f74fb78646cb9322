//! Request/response shapes for the HTTP adapter. Domain entities
//! (`Game`, `Player`, `Kill`, `SafeZone`, `GameZoneState`) already derive
//! `Serialize`/`Deserialize` in `assassin-domain` and are returned directly;
//! this module only covers the inputs the core doesn't otherwise need a
//! type for.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use assassin_domain::{
    GameSettings, LocationPrecision, LocationVisibility, PlayerId, SafeZoneType,
    VerificationData, VerificationMethod,
};
use assassin_geometry::Coordinate;

/// `spec.md` §6: "milliseconds since epoch (client input) or ISO-8601 ...
/// both are accepted on input".
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TimestampInput {
    Millis(i64),
    Iso(String),
}

impl TimestampInput {
    pub fn to_utc(&self) -> Result<DateTime<Utc>, String> {
        match self {
            TimestampInput::Millis(ms) => Utc
                .timestamp_millis_opt(*ms)
                .single()
                .ok_or_else(|| format!("timestamp {ms} out of range")),
            TimestampInput::Iso(s) => DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| e.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CoordinateInput {
    pub latitude: f64,
    pub longitude: f64,
}

impl CoordinateInput {
    pub fn into_coordinate(self) -> Result<Coordinate, assassin_geometry::GeometryError> {
        Coordinate::new(self.latitude, self.longitude)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateGameRequest {
    pub name: String,
    pub admin_player_id: String,
    #[serde(default)]
    pub settings: Option<GameSettings>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBoundaryRequest {
    pub boundary: Vec<CoordinateInput>,
}

#[derive(Debug, Deserialize)]
pub struct JoinGameRequest {
    pub player_id: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: GameStatusInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameStatusInput {
    Active,
    Completed,
    Cancelled,
}

#[derive(Debug, Deserialize)]
pub struct EmergencyPauseRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateSafeZoneRequestDto {
    pub zone_type: SafeZoneType,
    pub game_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub center: CoordinateInput,
    pub radius_meters: f64,
    pub created_by: String,
    #[serde(default)]
    pub authorized_player_ids: Vec<String>,
    pub start_time: Option<TimestampInput>,
    pub end_time: Option<TimestampInput>,
}

#[derive(Debug, Deserialize)]
pub struct LocationUpdateRequest {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_m: f64,
    pub timestamp: TimestampInput,
    pub device_fingerprint: Option<String>,
    #[serde(default)]
    pub location_sharing_enabled: Option<bool>,
    #[serde(default)]
    pub location_visibility: Option<LocationVisibility>,
    #[serde(default)]
    pub location_precision: Option<LocationPrecision>,
}

#[derive(Debug, Deserialize)]
pub struct ProposeKillRequestDto {
    pub killer_id: String,
    pub victim_id: String,
    pub method: VerificationMethod,
    #[serde(default = "default_verification_data")]
    pub data: VerificationData,
    pub timestamp: TimestampInput,
}

fn default_verification_data() -> VerificationData {
    VerificationData::Button
}

#[derive(Debug, Deserialize)]
pub struct SubmitPhotoRequest {
    pub kill_time: TimestampInput,
    pub image_hash: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdminVerifyRequest {
    pub kill_time: TimestampInput,
    pub is_valid: bool,
}

#[derive(Debug, Serialize)]
pub struct ProximitySnapshotDto {
    pub hunter_id: PlayerId,
    pub target_id: PlayerId,
    pub distance_m: f64,
    pub eligible_for_kill: bool,
}

impl From<assassin_proximity::ProximitySnapshot> for ProximitySnapshotDto {
    fn from(s: assassin_proximity::ProximitySnapshot) -> Self {
        Self {
            hunter_id: s.hunter_id,
            target_id: s.target_id,
            distance_m: s.distance_m,
            eligible_for_kill: s.eligible_for_kill,
        }
    }
}
