use serde::{Deserialize, Serialize};

/// New-center policy applied when a shrinking-zone stage ends (`spec.md` §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NewCenterPolicy {
    Keep,
    RandomWithinPrevious,
    Fixed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneStageConfig {
    pub wait_sec: u64,
    pub shrink_sec: u64,
    pub hold_sec: u64,
    pub target_radius_m: f64,
    pub new_center_policy: NewCenterPolicy,
    /// Only meaningful when `new_center_policy == Fixed`.
    pub fixed_center: Option<assassin_geometry::Coordinate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShrinkingZoneConfig {
    pub stages: Vec<ZoneStageConfig>,
    pub initial_radius_m: f64,
    pub initial_center: assassin_geometry::Coordinate,
}

/// Per-game tunables. Every field has a spec-documented default so a game
/// created without explicit overrides behaves exactly as `spec.md` describes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSettings {
    pub weapon_distance_m: f64,
    /// Alert bands beyond weapon distance; weapon distance itself is always
    /// the innermost band (`spec.md` §4.5).
    pub proximity_outer_bands_m: Vec<f64>,
    pub proximity_hysteresis_sec: u64,
    pub location_staleness_sec: u64,
    pub anti_cheat_speed_severity5_kmh: f64,
    pub anti_cheat_speed_severity7_kmh: f64,
    pub anti_cheat_speed_severity9_kmh: f64,
    pub anti_cheat_accuracy_threshold_m: f64,
    pub anti_cheat_clock_skew_sec: i64,
    pub anti_cheat_fingerprint_churn_limit: u32,
    pub anti_cheat_fingerprint_window_hours: i64,
    pub player_health: f64,
    pub damage_per_tick_per_meter_outside: f64,
    pub max_damage_per_tick: f64,
    pub zone_out_of_bounds_tolerance_m: f64,
    pub scheduler_tick_sec: u64,
    pub scheduler_lease_ttl_sec: u64,
    pub shrinking_zone: Option<ShrinkingZoneConfig>,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            weapon_distance_m: 10.0,
            proximity_outer_bands_m: vec![100.0, 50.0],
            proximity_hysteresis_sec: 60,
            location_staleness_sec: 300,
            anti_cheat_speed_severity5_kmh: 150.0,
            anti_cheat_speed_severity7_kmh: 300.0,
            anti_cheat_speed_severity9_kmh: 1000.0,
            anti_cheat_accuracy_threshold_m: 100.0,
            anti_cheat_clock_skew_sec: 5,
            anti_cheat_fingerprint_churn_limit: 3,
            anti_cheat_fingerprint_window_hours: 24,
            player_health: 100.0,
            damage_per_tick_per_meter_outside: 1.0,
            max_damage_per_tick: 20.0,
            zone_out_of_bounds_tolerance_m: 10.0,
            scheduler_tick_sec: 30,
            scheduler_lease_ttl_sec: 60,
            shrinking_zone: None,
        }
    }
}
