//! Kill proposal, verification, and apply (`spec.md` §4.6). `KillPipeline`
//! is the only component that writes `Kill` rows and is the sole caller of
//! `AssignmentEngine::reassign`, since both must happen in the same
//! transaction as the victim/killer player updates.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;

use assassin_anticheat::AntiCheatValidator;
use assassin_assignment::ReassignOutcome;
use assassin_domain::{
    CoreError, DomainEvent, EventSink, Game, GameId, GameStatus, Kill, KillKey, KillRejectReason,
    Player, PlayerId, PlayerStatus, VerificationData, VerificationMethod, VerificationStatus,
};
use assassin_geometry::haversine_meters;
use assassin_safezone::SafeZoneService;
use assassin_store::{Store, Txn};

/// A kill attempt is only considered against a location fresher than this,
/// independent of the game's general location-staleness setting
/// (`spec.md` §4.6 lists it as a fixed precondition).
const KILL_LOCATION_FRESHNESS_SEC: i64 = 300;
const MAX_RETRIES: u32 = 3;

pub struct ProposeKillRequest {
    pub game_id: GameId,
    pub killer_id: PlayerId,
    pub victim_id: PlayerId,
    pub method: VerificationMethod,
    pub data: VerificationData,
    pub now: DateTime<Utc>,
}

pub struct KillPipeline<S: Store> {
    store: Arc<S>,
    anticheat: Arc<AntiCheatValidator>,
    safezone: Arc<SafeZoneService<S>>,
    events: Arc<dyn EventSink>,
}

impl<S: Store> KillPipeline<S> {
    pub fn new(
        store: Arc<S>,
        anticheat: Arc<AntiCheatValidator>,
        safezone: Arc<SafeZoneService<S>>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            store,
            anticheat,
            safezone,
            events,
        }
    }

    /// Propose a kill. BUTTON/NFC/GPS resolve immediately; PHOTO creates a
    /// `PENDING` row awaiting [`Self::submit_photo`] and admin review.
    pub fn propose(&self, req: ProposeKillRequest) -> Result<Kill, CoreError> {
        let ProposeKillRequest {
            game_id,
            killer_id,
            victim_id,
            method,
            data,
            now,
        } = req;

        self.check_preconditions(&game_id, &killer_id, &victim_id, now)?;

        let key = KillKey {
            killer_id: killer_id.clone(),
            kill_time: now,
        };
        let victim = self
            .store
            .get_player(&victim_id)?
            .ok_or_else(|| CoreError::NotFound(format!("player {victim_id}")))?;
        let (lat, lng) = victim
            .location
            .map(|c| (c.latitude, c.longitude))
            .unwrap_or((0.0, 0.0));

        match method {
            VerificationMethod::Button => {
                let kill = Kill {
                    key,
                    game_id: game_id.clone(),
                    victim_id,
                    latitude: lat,
                    longitude: lng,
                    verification_method: method,
                    verification_status: VerificationStatus::Pending,
                    verification_data: data,
                    verified_by: None,
                    verified_at: None,
                };
                self.apply_with_retry(&game_id, &killer_id, kill, now)
            }
            VerificationMethod::Nfc => {
                let tag_valid = matches!(&data, VerificationData::Nfc { tag_id } if !tag_id.is_empty());
                let status = if tag_valid {
                    VerificationStatus::Pending
                } else {
                    VerificationStatus::Rejected
                };
                let kill = Kill {
                    key,
                    game_id: game_id.clone(),
                    victim_id,
                    latitude: lat,
                    longitude: lng,
                    verification_method: method,
                    verification_status: status,
                    verification_data: data,
                    verified_by: None,
                    verified_at: None,
                };
                if tag_valid {
                    self.apply_with_retry(&game_id, &killer_id, kill, now)
                } else {
                    self.store.put_kill(kill.clone())?;
                    Ok(kill)
                }
            }
            VerificationMethod::Gps => {
                let kill = Kill {
                    key,
                    game_id: game_id.clone(),
                    victim_id,
                    latitude: lat,
                    longitude: lng,
                    verification_method: method,
                    verification_status: VerificationStatus::Pending,
                    verification_data: data,
                    verified_by: None,
                    verified_at: None,
                };
                self.apply_with_retry(&game_id, &killer_id, kill, now)
            }
            VerificationMethod::Photo => {
                let kill = Kill {
                    key,
                    game_id,
                    victim_id,
                    latitude: lat,
                    longitude: lng,
                    verification_method: method,
                    verification_status: VerificationStatus::Pending,
                    verification_data: data,
                    verified_by: None,
                    verified_at: None,
                };
                self.store.put_kill(kill.clone())?;
                Ok(kill)
            }
        }
    }

    /// Attach photo evidence and move a PHOTO kill into PENDING_REVIEW.
    pub fn submit_photo(
        &self,
        key: &KillKey,
        image_hash: Option<String>,
        url: Option<String>,
    ) -> Result<Kill, CoreError> {
        let mut kill = self
            .store
            .get_kill(key)?
            .ok_or_else(|| CoreError::NotFound("kill not found".into()))?;
        if kill.verification_method != VerificationMethod::Photo
            || kill.verification_status != VerificationStatus::Pending
        {
            return Err(CoreError::GameState(
                "kill is not awaiting a photo submission".into(),
            ));
        }
        kill.verification_data = VerificationData::Photo { image_hash, url };
        kill.verification_status = VerificationStatus::PendingReview;
        self.store.put_kill(kill.clone())?;
        Ok(kill)
    }

    /// Admin decision on a PENDING_REVIEW photo kill.
    pub fn admin_verify(
        &self,
        key: &KillKey,
        is_valid: bool,
        admin_id: &PlayerId,
        now: DateTime<Utc>,
    ) -> Result<Kill, CoreError> {
        let kill = self
            .store
            .get_kill(key)?
            .ok_or_else(|| CoreError::NotFound("kill not found".into()))?;
        if kill.verification_status != VerificationStatus::PendingReview {
            return Err(CoreError::GameState(
                "kill is not pending admin review".into(),
            ));
        }

        if !is_valid {
            let mut rejected = kill;
            rejected.verification_status = VerificationStatus::Rejected;
            rejected.verified_by = Some(admin_id.clone());
            rejected.verified_at = Some(now);
            self.store.put_kill(rejected.clone())?;
            return Ok(rejected);
        }

        let mut kill = kill;
        kill.verified_by = Some(admin_id.clone());
        kill.verified_at = Some(now);
        self.apply_with_retry(&kill.game_id.clone(), &key.killer_id.clone(), kill, now)
    }

    fn check_preconditions(
        &self,
        game_id: &GameId,
        killer_id: &PlayerId,
        victim_id: &PlayerId,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        let killer = self
            .store
            .get_player(killer_id)?
            .ok_or_else(|| CoreError::NotFound(format!("player {killer_id}")))?;
        let victim = self
            .store
            .get_player(victim_id)?
            .ok_or_else(|| CoreError::NotFound(format!("player {victim_id}")))?;

        if killer.status != PlayerStatus::Active {
            return Err(CoreError::GameState("killer is not ACTIVE".into()));
        }

        let current = self
            .store
            .get_current_assignment_for_player(game_id, killer_id)?;
        let targets_victim = current.map(|a| a.target_id == *victim_id).unwrap_or(false);
        if !targets_victim {
            return Err(CoreError::KillRejected {
                reason_code: KillRejectReason::TargetMismatch,
            });
        }

        if killer.game_id.as_ref() != Some(game_id) || victim.game_id.as_ref() != Some(game_id) {
            return Err(CoreError::GameState(
                "killer and victim must be in the same game".into(),
            ));
        }

        let game = self
            .store
            .get_game(game_id)?
            .ok_or_else(|| CoreError::NotFound(format!("game {game_id}")))?;
        if game.status != GameStatus::Active {
            return Err(CoreError::GameState("game is not ACTIVE".into()));
        }
        if game.emergency_pause.active {
            return Err(CoreError::KillRejected {
                reason_code: KillRejectReason::EmergencyPaused,
            });
        }

        if !killer.has_recent_location(now, KILL_LOCATION_FRESHNESS_SEC)
            || !victim.has_recent_location(now, KILL_LOCATION_FRESHNESS_SEC)
        {
            return Err(CoreError::KillRejected {
                reason_code: KillRejectReason::StaleLocation,
            });
        }

        let (killer_loc, victim_loc) = match (killer.location, victim.location) {
            (Some(k), Some(v)) => (k, v),
            _ => {
                return Err(CoreError::KillRejected {
                    reason_code: KillRejectReason::StaleLocation,
                })
            }
        };
        if haversine_meters(killer_loc, victim_loc) > game.settings.weapon_distance_m {
            return Err(CoreError::KillRejected {
                reason_code: KillRejectReason::OutOfRange,
            });
        }

        if self
            .safezone
            .is_point_safe(game_id, victim_id, victim_loc, now)?
        {
            return Err(CoreError::KillRejected {
                reason_code: KillRejectReason::SafeZone,
            });
        }

        let severity = self.anticheat.last_severity(killer_id);
        if severity >= 7 {
            self.events.emit(DomainEvent::AntiCheatFlag {
                game_id: game_id.clone(),
                player_id: killer_id.clone(),
                severity,
                violation: "kill attempt from a flagged location session".into(),
            });
            return Err(CoreError::AntiCheatReject {
                reason: "killer's last location sample was flagged".into(),
                severity,
            });
        }

        Ok(())
    }

    fn apply_with_retry(
        &self,
        game_id: &GameId,
        killer_id: &PlayerId,
        mut kill: Kill,
        now: DateTime<Utc>,
    ) -> Result<Kill, CoreError> {
        let mut attempt = 0;
        loop {
            let killer_id = killer_id.clone();
            let victim_id = kill.victim_id.clone();
            let game_id = game_id.clone();
            kill.verification_status = VerificationStatus::Verified;
            let to_apply = kill.clone();

            let result = self.store.transact(|txn| {
                apply_verified_kill_in_txn(txn, &game_id, &killer_id, &victim_id, to_apply.clone(), now)
            });

            match result {
                Ok((applied, winner)) => {
                    self.events.emit(DomainEvent::PlayerEliminated {
                        game_id: game_id.clone(),
                        victim_id,
                        killer_id,
                        at: now,
                    });
                    if let Some(winner_id) = winner {
                        self.events.emit(DomainEvent::GameCompleted {
                            game_id,
                            winner_id: Some(winner_id),
                            at: now,
                        });
                    }
                    return Ok(applied);
                }
                Err(e) if e.is_retriable() && attempt < MAX_RETRIES => {
                    attempt += 1;
                    tracing::warn!(%game_id, %killer_id, attempt, error = %e, "retrying kill apply");
                    let jitter_ms = rand::thread_rng().gen_range(10..50) * attempt;
                    thread::sleep(Duration::from_millis(jitter_ms as u64));
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn apply_verified_kill_in_txn(
    txn: &mut Txn,
    game_id: &GameId,
    killer_id: &PlayerId,
    victim_id: &PlayerId,
    kill: Kill,
    now: DateTime<Utc>,
) -> Result<(Kill, Option<PlayerId>), CoreError> {
    txn.put_kill(kill.clone());

    let mut victim: Player = txn
        .get_player(victim_id)
        .ok_or_else(|| CoreError::NotFound(format!("player {victim_id}")))?;
    victim.status = PlayerStatus::Dead;
    victim.target_id = None;
    victim.version += 1;
    txn.put_player(victim)?;

    let mut killer: Player = txn
        .get_player(killer_id)
        .ok_or_else(|| CoreError::NotFound(format!("player {killer_id}")))?;
    killer.kill_count += 1;
    killer.version += 1;
    txn.put_player(killer)?;

    let outcome = assassin_assignment::reassign(txn, game_id, killer_id, victim_id, now)?;

    let mut winner = None;
    if let ReassignOutcome::Winner { winner_id } = outcome {
        let mut game: Game = txn
            .get_game(game_id)
            .ok_or_else(|| CoreError::NotFound(format!("game {game_id}")))?;
        game.status = GameStatus::Completed;
        game.ended_at = Some(now);
        game.winner_player_id = Some(winner_id.clone());
        game.version += 1;
        txn.put_game(game)?;
        winner = Some(winner_id);
    }

    Ok((kill, winner))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assassin_domain::{
        EmergencyPause, GameSettings, LocationPrecision, LocationVisibility, NullEventSink,
        PlayerId as Pid,
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
            admin_player_id: Pid::new("admin"),
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

    fn player(id: &str, target: Option<&str>, loc: Coordinate, now: DateTime<Utc>) -> Player {
        Player {
            id: Pid::new(id),
            name: id.into(),
            email: format!("{id}@example.com"),
            status: PlayerStatus::Active,
            game_id: Some(GameId::new("g1")),
            target_id: target.map(Pid::new),
            target_name: None,
            kill_count: 0,
            location: Some(loc),
            accuracy_m: Some(5.0),
            location_timestamp: Some(now),
            location_sharing_enabled: true,
            location_visibility: LocationVisibility::GameOnly,
            location_precision: LocationPrecision::Exact,
            location_pause_cooldown_until: None,
            health: 100.0,
            version: 0,
        }
    }

    fn setup() -> (
        Arc<InMemoryStore>,
        KillPipeline<InMemoryStore>,
        assassin_assignment::AssignmentEngine<InMemoryStore>,
    ) {
        let store = Arc::new(InMemoryStore::new());
        store.put_game(game()).unwrap();
        let safezone = Arc::new(SafeZoneService::new(store.clone()));
        let anticheat = Arc::new(AntiCheatValidator::new());
        let pipeline = KillPipeline::new(store.clone(), anticheat, safezone, Arc::new(NullEventSink));
        let assignment = assassin_assignment::AssignmentEngine::new(store.clone());
        (store, pipeline, assignment)
    }

    #[test]
    fn button_kill_within_range_is_verified_and_reassigns() {
        let (store, pipeline, assignment) = setup();
        let now = Utc::now();
        for i in 1..=3 {
            store
                .put_player(player(&format!("p{i}"), None, c(40.44, -79.94), now))
                .unwrap();
        }
        assignment
            .build_initial_assignments(&GameId::new("g1"), assassin_assignment::AssignmentStrategy::Circular, 7, now)
            .unwrap();

        let killer_target = store
            .get_current_assignment_for_player(&GameId::new("g1"), &Pid::new("p1"))
            .unwrap()
            .unwrap()
            .target_id;

        let kill = pipeline
            .propose(ProposeKillRequest {
                game_id: GameId::new("g1"),
                killer_id: Pid::new("p1"),
                victim_id: killer_target.clone(),
                method: VerificationMethod::Button,
                data: VerificationData::Button,
                now,
            })
            .unwrap();
        assert_eq!(kill.verification_status, VerificationStatus::Verified);

        let victim = store.get_player(&killer_target).unwrap().unwrap();
        assert_eq!(victim.status, PlayerStatus::Dead);
        let killer = store.get_player(&Pid::new("p1")).unwrap().unwrap();
        assert_eq!(killer.kill_count, 1);
    }

    #[test]
    fn out_of_range_kill_is_rejected() {
        let (store, pipeline, assignment) = setup();
        let now = Utc::now();
        store.put_player(player("p1", None, c(40.44, -79.94), now)).unwrap();
        store
            .put_player(player("p2", None, c(40.50, -79.94), now))
            .unwrap();
        assignment
            .build_initial_assignments(&GameId::new("g1"), assassin_assignment::AssignmentStrategy::Circular, 1, now)
            .unwrap();

        let result = pipeline.propose(ProposeKillRequest {
            game_id: GameId::new("g1"),
            killer_id: Pid::new("p1"),
            victim_id: Pid::new("p2"),
            method: VerificationMethod::Button,
            data: VerificationData::Button,
            now,
        });
        assert!(matches!(
            result,
            Err(CoreError::KillRejected {
                reason_code: KillRejectReason::OutOfRange
            })
        ));
    }

    #[test]
    fn emergency_paused_game_rejects_kill() {
        let (store, pipeline, assignment) = setup();
        let now = Utc::now();
        store.put_player(player("p1", None, c(40.44, -79.94), now)).unwrap();
        store
            .put_player(player("p2", None, c(40.44, -79.94), now))
            .unwrap();
        assignment
            .build_initial_assignments(&GameId::new("g1"), assassin_assignment::AssignmentStrategy::Circular, 1, now)
            .unwrap();

        let mut g = store.get_game(&GameId::new("g1")).unwrap().unwrap();
        g.emergency_pause = EmergencyPause {
            active: true,
            reason: Some("weather".into()),
            triggered_by: Some(Pid::new("admin")),
            timestamp: Some(now),
        };
        g.version += 1;
        store.put_game(g).unwrap();

        let target = store
            .get_current_assignment_for_player(&GameId::new("g1"), &Pid::new("p1"))
            .unwrap()
            .unwrap()
            .target_id;
        let result = pipeline.propose(ProposeKillRequest {
            game_id: GameId::new("g1"),
            killer_id: Pid::new("p1"),
            victim_id: target,
            method: VerificationMethod::Button,
            data: VerificationData::Button,
            now,
        });
        assert!(matches!(
            result,
            Err(CoreError::KillRejected {
                reason_code: KillRejectReason::EmergencyPaused
            })
        ));
    }
}
