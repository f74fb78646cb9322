//! Per-player location plausibility checks (`spec.md` §4.3).
//!
//! State is append-only and scoped to one player's recent samples, so no
//! cross-player locking is needed: each player's ring buffer lives behind
//! its own entry in a [`DashMap`], giving fine-grained concurrency for free.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use assassin_domain::{GameSettings, PlayerId};
use assassin_geometry::{haversine_meters, Coordinate};

/// How many recent samples are kept per player for fingerprint-churn
/// detection. Velocity/clock-skew checks only need the single latest one.
const HISTORY_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationType {
    LowAccuracy,
    Velocity,
    ClockSkew,
    FingerprintChurn,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    pub violation_type: ViolationType,
    pub severity: u8,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationValidationResult {
    pub valid: bool,
    pub violations: Vec<Violation>,
}

impl LocationValidationResult {
    fn ok() -> Self {
        Self {
            valid: true,
            violations: Vec::new(),
        }
    }

    fn max_severity(&self) -> u8 {
        self.violations.iter().map(|v| v.severity).max().unwrap_or(0)
    }
}

#[derive(Debug, Clone)]
pub struct LocationSample {
    pub coordinate: Coordinate,
    pub accuracy_m: f64,
    pub timestamp: DateTime<Utc>,
    pub device_fingerprint: Option<String>,
}

#[derive(Default)]
struct PlayerHistory {
    samples: VecDeque<LocationSample>,
    last_severity: u8,
}

/// Validates incoming location samples against the last known good sample
/// for that player and a short rolling history, per `spec.md` §4.3.
pub struct AntiCheatValidator {
    histories: DashMap<PlayerId, PlayerHistory>,
}

impl Default for AntiCheatValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl AntiCheatValidator {
    pub fn new() -> Self {
        Self {
            histories: DashMap::new(),
        }
    }

    /// Validate `sample` for `player_id` against `settings` and the
    /// player's recent history, then record it if not rejected outright.
    /// Returns the violations found; severity >= 9 means the caller must
    /// reject the location update (400) without storing it.
    pub fn validate(
        &self,
        player_id: &PlayerId,
        sample: LocationSample,
        settings: &GameSettings,
    ) -> LocationValidationResult {
        let mut violations = Vec::new();

        if sample.accuracy_m > settings.anti_cheat_accuracy_threshold_m {
            violations.push(Violation {
                violation_type: ViolationType::LowAccuracy,
                severity: 2,
                detail: format!(
                    "accuracy {:.1}m exceeds threshold {:.1}m",
                    sample.accuracy_m, settings.anti_cheat_accuracy_threshold_m
                ),
            });
        }

        let mut entry = self.histories.entry(player_id.clone()).or_default();

        if let Some(last) = entry.samples.back() {
            let dt_sec = (sample.timestamp - last.timestamp).num_milliseconds() as f64 / 1000.0;

            if dt_sec < -(settings.anti_cheat_clock_skew_sec as f64) {
                violations.push(Violation {
                    violation_type: ViolationType::ClockSkew,
                    severity: 6,
                    detail: format!(
                        "sample timestamp is {:.1}s older than last stored sample",
                        -dt_sec
                    ),
                });
            }

            if dt_sec > 0.0 {
                let meters = haversine_meters(last.coordinate, sample.coordinate);
                let kmh = (meters / dt_sec) * 3.6;
                if kmh > settings.anti_cheat_speed_severity9_kmh {
                    violations.push(Violation {
                        violation_type: ViolationType::Velocity,
                        severity: 9,
                        detail: format!("{:.0} km/h implied speed (teleport)", kmh),
                    });
                } else if kmh > settings.anti_cheat_speed_severity7_kmh {
                    violations.push(Violation {
                        violation_type: ViolationType::Velocity,
                        severity: 7,
                        detail: format!("{:.0} km/h implied speed", kmh),
                    });
                } else if kmh > settings.anti_cheat_speed_severity5_kmh {
                    violations.push(Violation {
                        violation_type: ViolationType::Velocity,
                        severity: 5,
                        detail: format!("{:.0} km/h implied speed", kmh),
                    });
                }
            }
        }

        if let Some(fingerprint) = &sample.device_fingerprint {
            let window_start = sample.timestamp
                - chrono::Duration::hours(settings.anti_cheat_fingerprint_window_hours);
            let distinct: std::collections::HashSet<&str> = entry
                .samples
                .iter()
                .filter(|s| s.timestamp >= window_start)
                .filter_map(|s| s.device_fingerprint.as_deref())
                .chain(std::iter::once(fingerprint.as_str()))
                .collect();
            if distinct.len() as u32 > settings.anti_cheat_fingerprint_churn_limit {
                violations.push(Violation {
                    violation_type: ViolationType::FingerprintChurn,
                    severity: 6,
                    detail: format!(
                        "{} distinct device fingerprints within {}h",
                        distinct.len(),
                        settings.anti_cheat_fingerprint_window_hours
                    ),
                });
            }
        }

        let result = LocationValidationResult {
            valid: violations.iter().all(|v| v.severity < 9),
            violations,
        };

        // Severity >= 9 rejects the sample: it is never stored, so replay
        // or teleport attempts can't poison the rolling history.
        if result.max_severity() < 9 {
            entry.samples.push_back(sample);
            if entry.samples.len() > HISTORY_CAPACITY {
                entry.samples.pop_front();
            }
        } else {
            tracing::warn!(%player_id, severity = result.max_severity(), "location sample rejected");
        }
        entry.last_severity = result.max_severity();

        result
    }

    /// Last recorded (accepted) location for a player, if any.
    pub fn last_sample(&self, player_id: &PlayerId) -> Option<LocationSample> {
        self.histories
            .get(player_id)
            .and_then(|h| h.samples.back().cloned())
    }

    /// Max violation severity observed on the player's last validated
    /// sample; 0 if none has been recorded yet. Used by `KillPipeline` to
    /// gate kill attempts from flagged sessions (`spec.md` §4.6).
    pub fn last_severity(&self, player_id: &PlayerId) -> u8 {
        self.histories
            .get(player_id)
            .map(|h| h.last_severity)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> GameSettings {
        GameSettings::default()
    }

    fn sample(lat: f64, lng: f64, t: DateTime<Utc>) -> LocationSample {
        LocationSample {
            coordinate: Coordinate::new(lat, lng).unwrap(),
            accuracy_m: 5.0,
            timestamp: t,
            device_fingerprint: Some("device-a".into()),
        }
    }

    #[test]
    fn teleport_is_rejected_with_severity_nine() {
        let validator = AntiCheatValidator::new();
        let player = PlayerId::new("p1");
        let t0 = Utc::now();

        let first = validator.validate(&player, sample(40.44, -79.94, t0), &settings());
        assert!(first.valid);

        // ~111 km in 10 seconds.
        let second = validator.validate(
            &player,
            sample(41.44, -79.94, t0 + chrono::Duration::seconds(10)),
            &settings(),
        );
        assert!(!second.valid);
        assert!(second
            .violations
            .iter()
            .any(|v| v.violation_type == ViolationType::Velocity && v.severity == 9));

        // Rejected sample must not have overwritten the last known good one.
        let last = validator.last_sample(&player).unwrap();
        assert!((last.coordinate.latitude - 40.44).abs() < 1e-9);
    }

    #[test]
    fn normal_walking_speed_is_not_flagged() {
        let validator = AntiCheatValidator::new();
        let player = PlayerId::new("p2");
        let t0 = Utc::now();
        validator.validate(&player, sample(40.0, -79.0, t0), &settings());
        // ~14 m in 10s ~= 5 km/h.
        let result = validator.validate(
            &player,
            sample(40.000126, -79.0, t0 + chrono::Duration::seconds(10)),
            &settings(),
        );
        assert!(result.valid);
        assert!(result.violations.is_empty());
    }

    #[test]
    fn stale_replay_sample_is_flagged_but_not_rejected() {
        let validator = AntiCheatValidator::new();
        let player = PlayerId::new("p3");
        let t0 = Utc::now();
        validator.validate(&player, sample(40.0, -79.0, t0), &settings());
        let result = validator.validate(
            &player,
            sample(40.0, -79.0, t0 - chrono::Duration::seconds(10)),
            &settings(),
        );
        assert!(result.valid);
        assert!(result
            .violations
            .iter()
            .any(|v| v.violation_type == ViolationType::ClockSkew));
    }

    #[test]
    fn fingerprint_churn_beyond_limit_is_flagged() {
        let validator = AntiCheatValidator::new();
        let player = PlayerId::new("p4");
        let t0 = Utc::now();
        for i in 0..5u32 {
            let mut s = sample(40.0, -79.0, t0 + chrono::Duration::minutes(i as i64));
            s.device_fingerprint = Some(format!("device-{i}"));
            let result = validator.validate(&player, s, &settings());
            if i >= 3 {
                assert!(result
                    .violations
                    .iter()
                    .any(|v| v.violation_type == ViolationType::FingerprintChurn));
            }
        }
    }
}
