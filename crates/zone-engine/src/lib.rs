//! Shrinking-zone state machine (`spec.md` §4.8). `advance` is the only
//! entry point; it is idempotent in `now` and safe to call redundantly, so
//! the Scheduler can retry a missed tick without double-applying a stage
//! transition.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;

use assassin_domain::{
    CoreError, DomainEvent, EventSink, Game, GameId, GameZoneState, NewCenterPolicy, PlayerId,
    ShrinkingZoneConfig, ZonePhase, ZoneStageConfig,
};
use assassin_geometry::{destination, haversine_meters, Coordinate};
use assassin_store::{Store, Txn};

pub struct ZoneEngine<S: Store> {
    store: Arc<S>,
    events: Arc<dyn EventSink>,
}

impl<S: Store> ZoneEngine<S> {
    pub fn new(store: Arc<S>, events: Arc<dyn EventSink>) -> Self {
        Self { store, events }
    }

    /// Advance `game_id`'s zone state to the phase implied by `now`, writing
    /// a new `GameZoneState` only if it actually changed.
    pub fn advance(
        &self,
        game_id: &GameId,
        now: DateTime<Utc>,
    ) -> Result<Option<GameZoneState>, CoreError> {
        let result = self
            .store
            .transact(|txn| advance_in_txn(txn, game_id, now))?;
        let Some((state, changed)) = result else {
            return Ok(None);
        };
        if changed {
            tracing::info!(
                %game_id,
                stage_index = state.current_stage_index,
                phase = ?state.current_phase,
                radius_meters = state.current_radius_meters,
                "zone advanced"
            );
            self.events.emit(DomainEvent::ZoneAdvanced {
                game_id: game_id.clone(),
                stage_index: state.current_stage_index,
                radius_meters: state.current_radius_meters,
                at: now,
            });
        }
        Ok(Some(state))
    }

    /// Damage applied this tick to every ACTIVE player outside the current
    /// radius, applying zone death (and chain reassignment) where health
    /// runs out (`spec.md` §4.8, §4.10).
    pub fn run_damage_tick(
        &self,
        game_id: &GameId,
        now: DateTime<Utc>,
    ) -> Result<Vec<PlayerId>, CoreError> {
        let (deaths, winner) = self
            .store
            .transact(|txn| run_damage_tick_in_txn(txn, game_id, now))?;
        if let Some(winner_id) = winner {
            self.events.emit(DomainEvent::GameCompleted {
                game_id: game_id.clone(),
                winner_id: Some(winner_id),
                at: now,
            });
        }
        Ok(deaths)
    }
}

fn advance_in_txn(
    txn: &mut Txn,
    game_id: &GameId,
    now: DateTime<Utc>,
) -> Result<Option<(GameZoneState, bool)>, CoreError> {
    let game = txn
        .get_game(game_id)
        .ok_or_else(|| CoreError::NotFound(format!("game {game_id} not found")))?;
    if !game.is_playable() {
        return Ok(None);
    }
    let Some(config) = game.settings.shrinking_zone.as_ref() else {
        return Ok(None);
    };
    if config.stages.is_empty() {
        return Ok(None);
    }

    let existing = txn.get_zone_state(game_id);
    let state = match existing {
        None => {
            let stage0 = &config.stages[0];
            let initial = GameZoneState {
                game_id: game_id.clone(),
                current_stage_index: 0,
                current_phase: ZonePhase::Waiting,
                current_center: config.initial_center,
                current_radius_meters: config.initial_radius_m,
                next_radius_meters: None,
                shrink_start_radius_meters: None,
                phase_start_time: now,
                phase_end_time: now + chrono::Duration::seconds(stage0.wait_sec as i64),
                last_updated: now,
                version: 0,
            };
            txn.put_zone_state(initial.clone())?;
            return Ok(Some((initial, true)));
        }
        Some(s) => s,
    };

    let mut candidate = state.clone();
    while candidate.current_phase != ZonePhase::Final && now >= candidate.phase_end_time {
        advance_one_phase(&mut candidate, config, now);
    }
    if candidate.current_phase == ZonePhase::Shrinking {
        candidate.current_radius_meters = interpolated_radius(&candidate, config, now);
    }

    if phase_content_equal(&state, &candidate) {
        return Ok(Some((state, false)));
    }

    candidate.last_updated = now;
    candidate.version = state.version + 1;
    txn.put_zone_state(candidate.clone())?;
    Ok(Some((candidate, true)))
}

fn advance_one_phase(state: &mut GameZoneState, config: &ShrinkingZoneConfig, _now: DateTime<Utc>) {
    let stage: &ZoneStageConfig = &config.stages[state.current_stage_index];
    match state.current_phase {
        ZonePhase::Waiting => {
            state.current_phase = ZonePhase::Shrinking;
            state.shrink_start_radius_meters = Some(state.current_radius_meters);
            state.next_radius_meters = Some(stage.target_radius_m);
            state.phase_start_time = state.phase_end_time;
            state.phase_end_time =
                state.phase_start_time + chrono::Duration::seconds(stage.shrink_sec as i64);
        }
        ZonePhase::Shrinking => {
            state.current_radius_meters = stage.target_radius_m;
            state.next_radius_meters = None;
            state.shrink_start_radius_meters = None;
            state.current_phase = ZonePhase::Holding;
            state.phase_start_time = state.phase_end_time;
            state.phase_end_time =
                state.phase_start_time + chrono::Duration::seconds(stage.hold_sec as i64);
        }
        ZonePhase::Holding => {
            if state.current_stage_index + 1 < config.stages.len() {
                state.current_center =
                    next_stage_center(stage, state.current_center, state.current_radius_meters);
                state.current_stage_index += 1;
                let next_stage = &config.stages[state.current_stage_index];
                state.current_phase = ZonePhase::Waiting;
                state.phase_start_time = state.phase_end_time;
                state.phase_end_time = state.phase_start_time
                    + chrono::Duration::seconds(next_stage.wait_sec as i64);
            } else {
                state.current_phase = ZonePhase::Final;
            }
        }
        ZonePhase::Final => {}
    }
}

fn next_stage_center(stage: &ZoneStageConfig, current_center: Coordinate, current_radius_m: f64) -> Coordinate {
    match stage.new_center_policy {
        NewCenterPolicy::Keep => current_center,
        NewCenterPolicy::Fixed => stage.fixed_center.unwrap_or(current_center),
        NewCenterPolicy::RandomWithinPrevious => {
            let mut rng = rand::thread_rng();
            let bearing = rng.gen_range(0.0..360.0);
            let distance = rng.gen_range(0.0..=current_radius_m);
            destination(current_center, bearing, distance).unwrap_or(current_center)
        }
    }
}

fn interpolated_radius(state: &GameZoneState, config: &ShrinkingZoneConfig, now: DateTime<Utc>) -> f64 {
    let stage = &config.stages[state.current_stage_index];
    let start = state.shrink_start_radius_meters.unwrap_or(state.current_radius_meters);
    let target = stage.target_radius_m;
    if stage.shrink_sec == 0 {
        return target;
    }
    let elapsed = (now - state.phase_start_time).num_milliseconds().max(0) as f64 / 1000.0;
    let frac = (elapsed / stage.shrink_sec as f64).clamp(0.0, 1.0);
    start + (target - start) * frac
}

fn phase_content_equal(a: &GameZoneState, b: &GameZoneState) -> bool {
    a.current_stage_index == b.current_stage_index
        && a.current_phase == b.current_phase
        && a.current_center == b.current_center
        && (a.current_radius_meters - b.current_radius_meters).abs() < 1e-9
        && a.next_radius_meters == b.next_radius_meters
        && a.phase_start_time == b.phase_start_time
        && a.phase_end_time == b.phase_end_time
}

fn run_damage_tick_in_txn(
    txn: &mut Txn,
    game_id: &GameId,
    now: DateTime<Utc>,
) -> Result<(Vec<PlayerId>, Option<PlayerId>), CoreError> {
    let game = txn
        .get_game(game_id)
        .ok_or_else(|| CoreError::NotFound(format!("game {game_id} not found")))?;
    if !game.is_playable() {
        return Ok((Vec::new(), None));
    }
    let Some(state) = txn.get_zone_state(game_id) else {
        return Ok((Vec::new(), None));
    };
    let settings = &game.settings;
    let mut deaths = Vec::new();
    let mut winner = None;

    for player in txn.active_players_in_game(game_id) {
        if !player.has_recent_location(now, settings.location_staleness_sec as i64) {
            continue;
        }
        let Some(loc) = player.location else { continue };
        let distance = haversine_meters(loc, state.current_center);
        let excess = distance - state.current_radius_meters - settings.zone_out_of_bounds_tolerance_m;
        if excess <= 0.0 {
            continue;
        }
        let damage = (settings.damage_per_tick_per_meter_outside * excess)
            .min(settings.max_damage_per_tick);

        let mut updated = player.clone();
        updated.health = (updated.health - damage).max(0.0);

        if updated.health <= 0.0 {
            updated.status = assassin_domain::PlayerStatus::Dead;
            updated.target_id = None;
            updated.version += 1;
            txn.put_player(updated.clone())?;
            if let Some(winner_id) = apply_zone_death(txn, &game, game_id, &player.id, now)? {
                winner = Some(winner_id);
            }
            deaths.push(player.id.clone());
        } else {
            updated.version += 1;
            txn.put_player(updated)?;
        }
    }

    Ok((deaths, winner))
}

fn apply_zone_death(
    txn: &mut Txn,
    game: &Game,
    game_id: &GameId,
    victim_id: &PlayerId,
    now: DateTime<Utc>,
) -> Result<Option<PlayerId>, CoreError> {
    use assassin_assignment::RemovalOutcome;

    let outcome = assassin_assignment::remove_from_chain(txn, game_id, victim_id, now)?;
    if let RemovalOutcome::SoleSurvivor { winner_id } = outcome {
        let mut game = game.clone();
        game.status = assassin_domain::GameStatus::Completed;
        game.ended_at = Some(now);
        game.winner_player_id = Some(winner_id.clone());
        game.version += 1;
        txn.put_game(game)?;
        return Ok(Some(winner_id));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assassin_domain::{
        EmergencyPause, GameSettings, GameStatus, LocationPrecision, LocationVisibility,
        NullEventSink, Player, PlayerStatus,
    };
    use assassin_store::InMemoryStore;
    use std::collections::HashMap;

    fn game_with_zone(config: ShrinkingZoneConfig) -> Game {
        let mut settings = GameSettings::default();
        settings.shrinking_zone = Some(config);
        Game {
            id: GameId::new("g1"),
            name: "test".into(),
            status: GameStatus::Active,
            admin_player_id: PlayerId::new("admin"),
            created_at: Utc::now(),
            started_at: Some(Utc::now()),
            ended_at: None,
            boundary: vec![
                Coordinate::new(40.0, -80.0).unwrap(),
                Coordinate::new(41.0, -80.0).unwrap(),
                Coordinate::new(41.0, -79.0).unwrap(),
            ],
            settings,
            emergency_pause: EmergencyPause::default(),
            map_id: None,
            winner_player_id: None,
            version: 0,
            extra_settings: HashMap::new(),
        }
    }

    fn single_stage_config() -> ShrinkingZoneConfig {
        ShrinkingZoneConfig {
            stages: vec![ZoneStageConfig {
                wait_sec: 0,
                shrink_sec: 60,
                hold_sec: 30,
                target_radius_m: 500.0,
                new_center_policy: NewCenterPolicy::Keep,
                fixed_center: None,
            }],
            initial_radius_m: 2000.0,
            initial_center: Coordinate::new(40.5, -79.5).unwrap(),
        }
    }

    #[test]
    fn advance_is_idempotent_for_same_timestamp() {
        let store = Arc::new(InMemoryStore::new());
        store.put_game(game_with_zone(single_stage_config())).unwrap();
        let engine = ZoneEngine::new(store.clone(), Arc::new(NullEventSink));
        let t0 = Utc::now();

        let first = engine.advance(&GameId::new("g1"), t0).unwrap().unwrap();
        let second = engine.advance(&GameId::new("g1"), t0).unwrap().unwrap();
        assert_eq!(first.version, second.version);
        assert_eq!(first.current_phase, second.current_phase);
    }

    #[test]
    fn advance_transitions_through_stages_over_time() {
        let store = Arc::new(InMemoryStore::new());
        store.put_game(game_with_zone(single_stage_config())).unwrap();
        let engine = ZoneEngine::new(store.clone(), Arc::new(NullEventSink));
        let t0 = Utc::now();

        let s1 = engine.advance(&GameId::new("g1"), t0).unwrap().unwrap();
        assert_eq!(s1.current_phase, ZonePhase::Shrinking);

        let s2 = engine
            .advance(&GameId::new("g1"), t0 + chrono::Duration::seconds(30))
            .unwrap()
            .unwrap();
        assert_eq!(s2.current_phase, ZonePhase::Shrinking);
        assert!(s2.current_radius_meters < s1.current_radius_meters);
        assert!(s2.current_radius_meters > 500.0);

        let s3 = engine
            .advance(&GameId::new("g1"), t0 + chrono::Duration::seconds(90))
            .unwrap()
            .unwrap();
        assert_eq!(s3.current_phase, ZonePhase::Holding);
        assert!((s3.current_radius_meters - 500.0).abs() < 1e-9);

        let s4 = engine
            .advance(&GameId::new("g1"), t0 + chrono::Duration::seconds(121))
            .unwrap()
            .unwrap();
        assert_eq!(s4.current_phase, ZonePhase::Final);
    }

    #[test]
    fn damage_tick_kills_player_far_outside_radius() {
        let store = Arc::new(InMemoryStore::new());
        let game_id = GameId::new("g1");
        let mut settings_game = game_with_zone(single_stage_config());
        settings_game.settings.damage_per_tick_per_meter_outside = 1.0;
        settings_game.settings.max_damage_per_tick = 1000.0;
        settings_game.settings.player_health = 100.0;
        store.put_game(settings_game).unwrap();

        let engine = ZoneEngine::new(store.clone(), Arc::new(NullEventSink));
        let t0 = Utc::now();
        engine.advance(&game_id, t0).unwrap();
        // push well into HOLDING so current_radius_meters == 500m
        engine
            .advance(&game_id, t0 + chrono::Duration::seconds(90))
            .unwrap();

        let far_player = Player {
            id: PlayerId::new("p1"),
            name: "p1".into(),
            email: "p1@example.com".into(),
            status: PlayerStatus::Active,
            game_id: Some(game_id.clone()),
            target_id: Some(PlayerId::new("p2")),
            target_name: None,
            kill_count: 0,
            location: Some(Coordinate::new(40.510, -79.500).unwrap()),
            accuracy_m: Some(5.0),
            location_timestamp: Some(t0 + chrono::Duration::seconds(90)),
            location_sharing_enabled: true,
            location_visibility: LocationVisibility::GameOnly,
            location_precision: LocationPrecision::Exact,
            location_pause_cooldown_until: None,
            health: 100.0,
            version: 0,
        };
        store.put_player(far_player).unwrap();
        store
            .put_player(Player {
                id: PlayerId::new("p2"),
                name: "p2".into(),
                email: "p2@example.com".into(),
                status: PlayerStatus::Active,
                game_id: Some(game_id.clone()),
                target_id: Some(PlayerId::new("p1")),
                target_name: None,
                kill_count: 0,
                location: None,
                accuracy_m: None,
                location_timestamp: None,
                location_sharing_enabled: true,
                location_visibility: LocationVisibility::GameOnly,
                location_precision: LocationPrecision::Exact,
                location_pause_cooldown_until: None,
                health: 100.0,
                version: 0,
            })
            .unwrap();

        let mut at = t0 + chrono::Duration::seconds(91);
        let mut died = false;
        for _ in 0..6 {
            let deaths = engine.run_damage_tick(&game_id, at).unwrap();
            if !deaths.is_empty() {
                died = true;
                break;
            }
            at += chrono::Duration::seconds(30);
        }
        assert!(died, "player should eventually die to zone damage");
        let p1 = store.get_player(&PlayerId::new("p1")).unwrap().unwrap();
        assert_eq!(p1.status, PlayerStatus::Dead);
    }
}
