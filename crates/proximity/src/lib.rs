//! Per-update distance-to-target computation and hysteresis-banded alerts
//! (`spec.md` §4.5). Results are cached per hunter in a [`DashMap`] so reads
//! (`recent_proximity`) never contend with writes for a different player.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use assassin_domain::{CoreError, DomainEvent, EventSink, GameId, PlayerId};
use assassin_geometry::haversine_meters;
use assassin_safezone::SafeZoneService;
use assassin_store::Store;

#[derive(Debug, Clone)]
pub struct ProximitySnapshot {
    pub hunter_id: PlayerId,
    pub target_id: PlayerId,
    pub distance_m: f64,
    pub eligible_for_kill: bool,
    pub computed_at: DateTime<Utc>,
}

const CACHE_TTL_SEC: i64 = 30;

#[derive(Debug, Default)]
struct BandState {
    alerted: bool,
    exit_since: Option<DateTime<Utc>>,
}

struct CacheEntry {
    snapshot: ProximitySnapshot,
    // Aligned with the descending band thresholds of the game this entry
    // was last computed for (outer bands first, weapon distance last).
    band_states: Vec<BandState>,
}

pub struct ProximityEngine<S: Store> {
    store: Arc<S>,
    safezone: Arc<SafeZoneService<S>>,
    events: Arc<dyn EventSink>,
    cache: DashMap<PlayerId, Mutex<CacheEntry>>,
}

impl<S: Store> ProximityEngine<S> {
    pub fn new(
        store: Arc<S>,
        safezone: Arc<SafeZoneService<S>>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            store,
            safezone,
            events,
            cache: DashMap::new(),
        }
    }

    /// Recompute proximity for `hunter_id` against its current target in
    /// `game_id`, emitting band-crossing alerts and updating the cache.
    /// Returns `None` if the hunter has no live target or either location is
    /// unavailable.
    pub fn on_location_update(
        &self,
        game_id: &GameId,
        hunter_id: &PlayerId,
        now: DateTime<Utc>,
    ) -> Result<Option<ProximitySnapshot>, CoreError> {
        let hunter = self
            .store
            .get_player(hunter_id)?
            .ok_or_else(|| CoreError::NotFound(format!("player {hunter_id}")))?;
        let Some(target_id) = hunter.target_id.clone() else {
            return Ok(None);
        };
        let Some(target) = self.store.get_player(&target_id)? else {
            return Ok(None);
        };
        let (Some(hunter_loc), Some(target_loc)) = (hunter.location, target.location) else {
            return Ok(None);
        };

        let game = self
            .store
            .get_game(game_id)?
            .ok_or_else(|| CoreError::NotFound(format!("game {game_id}")))?;

        let distance_m = haversine_meters(hunter_loc, target_loc);

        let hunter_safe = self
            .safezone
            .is_point_safe(game_id, hunter_id, hunter_loc, now)?;
        let target_safe = self
            .safezone
            .is_point_safe(game_id, &target_id, target_loc, now)?;
        let eligible_for_kill = game.is_playable()
            && distance_m <= game.settings.weapon_distance_m
            && !hunter_safe
            && !target_safe;

        let mut bands = game.settings.proximity_outer_bands_m.clone();
        bands.push(game.settings.weapon_distance_m);

        let mut entry = self
            .cache
            .entry(hunter_id.clone())
            .or_insert_with(|| {
                Mutex::new(CacheEntry {
                    snapshot: ProximitySnapshot {
                        hunter_id: hunter_id.clone(),
                        target_id: target_id.clone(),
                        distance_m,
                        eligible_for_kill,
                        computed_at: now,
                    },
                    band_states: bands.iter().map(|_| BandState::default()).collect(),
                })
            });
        let mut guard = entry.value_mut().lock().unwrap();

        if guard.snapshot.target_id != target_id || guard.band_states.len() != bands.len() {
            guard.band_states = bands.iter().map(|_| BandState::default()).collect();
        }

        for (state, &threshold) in guard.band_states.iter_mut().zip(bands.iter()) {
            let inside = distance_m <= threshold;
            if inside {
                state.exit_since = None;
                if !state.alerted {
                    state.alerted = true;
                    self.events.emit(DomainEvent::ProximityAlert {
                        game_id: game_id.clone(),
                        hunter_id: hunter_id.clone(),
                        target_id: target_id.clone(),
                        band_meters: threshold,
                        distance_meters: distance_m,
                    });
                }
            } else if state.alerted {
                match state.exit_since {
                    None => state.exit_since = Some(now),
                    Some(exited_at)
                        if (now - exited_at).num_seconds()
                            >= game.settings.proximity_hysteresis_sec as i64 =>
                    {
                        state.alerted = false;
                        state.exit_since = None;
                    }
                    Some(_) => {}
                }
            }
        }

        let snapshot = ProximitySnapshot {
            hunter_id: hunter_id.clone(),
            target_id,
            distance_m,
            eligible_for_kill,
            computed_at: now,
        };
        guard.snapshot = snapshot.clone();
        Ok(Some(snapshot))
    }

    /// Cached proximity for `hunter_id`, if computed within the last 30s.
    pub fn recent_proximity(&self, hunter_id: &PlayerId, now: DateTime<Utc>) -> Option<ProximitySnapshot> {
        let entry = self.cache.get(hunter_id)?;
        let guard = entry.value().lock().unwrap();
        if (now - guard.snapshot.computed_at).num_seconds() > CACHE_TTL_SEC {
            return None;
        }
        Some(guard.snapshot.clone())
    }

    /// Drops cache entries idle for more than `idle_threshold_sec`, run by
    /// the Scheduler tick (`spec.md` §4.10).
    pub fn evict_stale(&self, now: DateTime<Utc>, idle_threshold_sec: i64) {
        let before = self.cache.len();
        self.cache.retain(|_, entry| {
            let guard = entry.lock().unwrap();
            (now - guard.snapshot.computed_at).num_seconds() <= idle_threshold_sec
        });
        let evicted = before - self.cache.len();
        if evicted > 0 {
            tracing::debug!(evicted, "evicted stale proximity cache entries");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assassin_domain::{
        EmergencyPause, Game, GameSettings, GameStatus, LocationPrecision, LocationVisibility,
        NullEventSink, Player, PlayerStatus,
    };
    use assassin_geometry::Coordinate;
    use assassin_store::InMemoryStore;
    use std::collections::HashMap;

    fn c(lat: f64, lng: f64) -> Coordinate {
        Coordinate::new(lat, lng).unwrap()
    }

    fn game() -> Game {
        Game {
            id: GameId::new("g1"),
            name: "G".into(),
            status: GameStatus::Active,
            admin_player_id: PlayerId::new("admin"),
            created_at: Utc::now(),
            started_at: Some(Utc::now()),
            ended_at: None,
            boundary: vec![c(40.0, -80.0), c(40.0, -79.0), c(41.0, -79.0), c(41.0, -80.0)],
            settings: GameSettings::default(),
            emergency_pause: EmergencyPause::default(),
            map_id: None,
            winner_player_id: None,
            version: 0,
            extra_settings: HashMap::new(),
        }
    }

    fn player(id: &str, target: Option<&str>, loc: Coordinate) -> Player {
        Player {
            id: PlayerId::new(id),
            name: id.into(),
            email: format!("{id}@example.com"),
            status: PlayerStatus::Active,
            game_id: Some(GameId::new("g1")),
            target_id: target.map(PlayerId::new),
            target_name: None,
            kill_count: 0,
            location: Some(loc),
            accuracy_m: Some(5.0),
            location_timestamp: Some(Utc::now()),
            location_sharing_enabled: true,
            location_visibility: LocationVisibility::GameOnly,
            location_precision: LocationPrecision::Exact,
            location_pause_cooldown_until: None,
            health: 100.0,
            version: 0,
        }
    }

    fn setup() -> (Arc<InMemoryStore>, ProximityEngine<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        store.put_game(game()).unwrap();
        let safezone = Arc::new(SafeZoneService::new(store.clone()));
        let engine = ProximityEngine::new(store.clone(), safezone, Arc::new(NullEventSink));
        (store, engine)
    }

    #[test]
    fn eligible_for_kill_within_weapon_distance() {
        let (store, engine) = setup();
        store
            .put_player(player("p1", Some("p2"), c(40.44, -79.94)))
            .unwrap();
        store
            .put_player(player("p2", Some("p1"), c(40.440045, -79.94)))
            .unwrap();

        let now = Utc::now();
        let snap = engine
            .on_location_update(&GameId::new("g1"), &PlayerId::new("p1"), now)
            .unwrap()
            .unwrap();
        assert!(snap.distance_m < 10.0);
        assert!(snap.eligible_for_kill);
    }

    #[test]
    fn recent_proximity_expires_after_ttl() {
        let (store, engine) = setup();
        store
            .put_player(player("p1", Some("p2"), c(40.44, -79.94)))
            .unwrap();
        store
            .put_player(player("p2", Some("p1"), c(40.44, -79.94)))
            .unwrap();

        let t0 = Utc::now();
        engine
            .on_location_update(&GameId::new("g1"), &PlayerId::new("p1"), t0)
            .unwrap();
        assert!(engine
            .recent_proximity(&PlayerId::new("p1"), t0 + chrono::Duration::seconds(10))
            .is_some());
        assert!(engine
            .recent_proximity(&PlayerId::new("p1"), t0 + chrono::Duration::seconds(31))
            .is_none());
    }

    #[test]
    fn band_alert_fires_once_until_hysteresis_window_passes() {
        let (store, engine) = setup();
        store
            .put_player(player("p1", Some("p2"), c(40.44, -79.94)))
            .unwrap();
        // ~90m away: inside the 100m band but outside 50m/weapon bands.
        store
            .put_player(player("p2", Some("p1"), c(40.440810, -79.94)))
            .unwrap();

        let t0 = Utc::now();
        let first = engine
            .on_location_update(&GameId::new("g1"), &PlayerId::new("p1"), t0)
            .unwrap()
            .unwrap();
        assert!(first.distance_m < 100.0);

        // Same distance again immediately: band already alerted, no panic,
        // still reports the same snapshot.
        let second = engine
            .on_location_update(&GameId::new("g1"), &PlayerId::new("p1"), t0 + chrono::Duration::seconds(1))
            .unwrap()
            .unwrap();
        assert!((second.distance_m - first.distance_m).abs() < 1.0);
    }
}
