//! Lifecycle orchestration: create/join/leave, boundary changes, start,
//! forced end, emergency pause/resume (`spec.md` §4.9). Every mutation goes
//! through one `Store::transact` call so a concurrent request never observes
//! a half-applied transition.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use assassin_assignment::{self, AssignmentStrategy, RemovalOutcome};
use assassin_domain::{
    CoreError, DomainEvent, EmergencyPause, EventSink, Game, GameId, GameSettings, GameStatus,
    Player, PlayerId, PlayerStatus,
};
use assassin_geometry::{point_in_polygon, Coordinate};
use assassin_store::{Store, Txn};

pub struct NewPlayer {
    pub id: PlayerId,
    pub name: String,
    pub email: String,
}

pub struct GameCoordinator<S: Store> {
    store: Arc<S>,
    events: Arc<dyn EventSink>,
}

impl<S: Store> GameCoordinator<S> {
    pub fn new(store: Arc<S>, events: Arc<dyn EventSink>) -> Self {
        Self { store, events }
    }

    pub fn create_game(
        &self,
        id: GameId,
        name: String,
        admin_player_id: PlayerId,
        settings: GameSettings,
        now: DateTime<Utc>,
    ) -> Result<Game, CoreError> {
        let game = Game {
            id,
            name,
            status: GameStatus::Pending,
            admin_player_id,
            created_at: now,
            started_at: None,
            ended_at: None,
            boundary: Vec::new(),
            settings,
            emergency_pause: EmergencyPause::default(),
            map_id: None,
            winner_player_id: None,
            version: 0,
            extra_settings: Default::default(),
        };
        self.store.put_game(game.clone())?;
        tracing::info!(game_id = %game.id, "game created");
        Ok(game)
    }

    /// Admin-only: replace the game boundary. Once `ACTIVE`, every current
    /// player must already lie inside the new polygon.
    pub fn update_boundary(
        &self,
        game_id: &GameId,
        boundary: Vec<Coordinate>,
        requester: &PlayerId,
        _now: DateTime<Utc>,
    ) -> Result<Game, CoreError> {
        if boundary.len() < 3 {
            return Err(CoreError::Validation(
                "boundary must have at least 3 vertices".into(),
            ));
        }
        let mut game = self.require_admin(game_id, requester)?;

        if game.status == GameStatus::Active {
            for player in self.store.get_players_by_game_id(game_id)? {
                if player.status != PlayerStatus::Active {
                    continue;
                }
                if let Some(loc) = player.location {
                    if !point_in_polygon(loc, &boundary)? {
                        return Err(CoreError::Validation(format!(
                            "player {} falls outside the new boundary",
                            player.id
                        )));
                    }
                }
            }
        }

        game.boundary = boundary;
        game.version += 1;
        self.store.put_game(game.clone())?;
        Ok(game)
    }

    /// Join requires the game still `PENDING`; a player record is created
    /// or activated.
    pub fn join_game(
        &self,
        game_id: &GameId,
        new_player: NewPlayer,
        _now: DateTime<Utc>,
    ) -> Result<Player, CoreError> {
        let game = self
            .store
            .get_game(game_id)?
            .ok_or_else(|| CoreError::NotFound(format!("game {game_id}")))?;
        if game.status != GameStatus::Pending {
            return Err(CoreError::GameState(
                "players may only join a PENDING game".into(),
            ));
        }

        let player = Player {
            id: new_player.id,
            name: new_player.name,
            email: new_player.email,
            status: PlayerStatus::Active,
            game_id: Some(game_id.clone()),
            target_id: None,
            target_name: None,
            kill_count: 0,
            location: None,
            accuracy_m: None,
            location_timestamp: None,
            location_sharing_enabled: true,
            location_visibility: assassin_domain::LocationVisibility::GameOnly,
            location_precision: assassin_domain::LocationPrecision::Exact,
            location_pause_cooldown_until: None,
            health: game.settings.player_health,
            version: 0,
        };
        self.store.put_player(player.clone())?;
        Ok(player)
    }

    /// Leave the game. Before `startGame` this is a simple roster removal;
    /// once `ACTIVE` the elimination chain must be closed over the gap.
    pub fn leave_game(
        &self,
        game_id: &GameId,
        player_id: &PlayerId,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        let winner = self
            .store
            .transact(|txn| leave_game_in_txn(txn, game_id, player_id, now))?;
        if let Some(winner_id) = winner {
            self.events.emit(DomainEvent::GameCompleted {
                game_id: game_id.clone(),
                winner_id: Some(winner_id),
                at: now,
            });
        }
        Ok(())
    }

    /// PENDING -> ACTIVE. Validates player count and boundary, then builds
    /// the initial elimination chain.
    pub fn start_game(
        &self,
        game_id: &GameId,
        requester: &PlayerId,
        strategy: AssignmentStrategy,
        now: DateTime<Utc>,
    ) -> Result<Game, CoreError> {
        let mut game = self.require_admin(game_id, requester)?;
        if !game.status.can_transition_to(GameStatus::Active) {
            return Err(CoreError::GameState(format!(
                "cannot start a game in status {:?}",
                game.status
            )));
        }
        if !game.is_boundary_valid() {
            return Err(CoreError::Validation(
                "game boundary must have at least 3 vertices".into(),
            ));
        }
        let active_count = self
            .store
            .get_players_by_game_id(game_id)?
            .iter()
            .filter(|p| p.status == PlayerStatus::Active)
            .count();
        if active_count < 2 {
            return Err(CoreError::Validation(
                "starting a game requires at least two ACTIVE players".into(),
            ));
        }

        game.status = GameStatus::Active;
        game.started_at = Some(now);
        game.version += 1;
        self.store.put_game(game.clone())?;

        let seed = assassin_assignment::derive_seed(game_id, now);
        let engine = assassin_assignment::AssignmentEngine::new(self.store.clone());
        engine.build_initial_assignments(game_id, strategy, seed, now)?;

        tracing::info!(%game_id, "game started");
        Ok(game)
    }

    /// Admin-only: end the game outright. `PENDING` becomes `CANCELLED`;
    /// `ACTIVE` becomes `COMPLETED` with no winner recorded.
    pub fn force_end_game(
        &self,
        game_id: &GameId,
        requester: &PlayerId,
        now: DateTime<Utc>,
    ) -> Result<Game, CoreError> {
        let mut game = self.require_admin(game_id, requester)?;
        game.status = match game.status {
            GameStatus::Pending => GameStatus::Cancelled,
            GameStatus::Active => GameStatus::Completed,
            other => {
                return Err(CoreError::GameState(format!(
                    "cannot force-end a game in status {other:?}"
                )))
            }
        };
        game.ended_at = Some(now);
        game.version += 1;
        self.store.put_game(game.clone())?;
        tracing::info!(%game_id, status = ?game.status, "game force-ended");
        if game.status == GameStatus::Completed {
            self.events.emit(DomainEvent::GameCompleted {
                game_id: game_id.clone(),
                winner_id: None,
                at: now,
            });
        }
        Ok(game)
    }

    pub fn emergency_pause(
        &self,
        game_id: &GameId,
        reason: String,
        requester: &PlayerId,
        now: DateTime<Utc>,
    ) -> Result<Game, CoreError> {
        let mut game = self.require_admin(game_id, requester)?;
        if game.status != GameStatus::Active {
            return Err(CoreError::GameState(
                "emergency pause only applies to an ACTIVE game".into(),
            ));
        }
        let reason_clone = reason.clone();
        game.emergency_pause = EmergencyPause {
            active: true,
            reason: Some(reason),
            triggered_by: Some(requester.clone()),
            timestamp: Some(now),
        };
        game.version += 1;
        self.store.put_game(game.clone())?;
        tracing::warn!(%game_id, reason = %reason_clone, "emergency pause triggered");
        self.events.emit(DomainEvent::EmergencyPauseToggled {
            game_id: game_id.clone(),
            active: true,
            reason: Some(reason_clone),
        });
        Ok(game)
    }

    pub fn emergency_resume(
        &self,
        game_id: &GameId,
        requester: &PlayerId,
        now: DateTime<Utc>,
    ) -> Result<Game, CoreError> {
        let mut game = self.require_admin(game_id, requester)?;
        game.emergency_pause = EmergencyPause {
            active: false,
            reason: None,
            triggered_by: Some(requester.clone()),
            timestamp: Some(now),
        };
        game.version += 1;
        self.store.put_game(game.clone())?;
        tracing::info!(%game_id, "emergency pause resumed");
        self.events.emit(DomainEvent::EmergencyPauseToggled {
            game_id: game_id.clone(),
            active: false,
            reason: None,
        });
        Ok(game)
    }

    pub fn get_game(&self, game_id: &GameId) -> Result<Game, CoreError> {
        self.store
            .get_game(game_id)?
            .ok_or_else(|| CoreError::NotFound(format!("game {game_id}")))
    }

    pub fn list_players(&self, game_id: &GameId) -> Result<Vec<Player>, CoreError> {
        self.store.get_players_by_game_id(game_id)
    }

    pub fn leaderboard(&self, limit: usize) -> Result<Vec<Player>, CoreError> {
        self.store
            .get_leaderboard_by_kill_count(PlayerStatus::Active, limit)
    }

    fn require_admin(&self, game_id: &GameId, requester: &PlayerId) -> Result<Game, CoreError> {
        let game = self
            .store
            .get_game(game_id)?
            .ok_or_else(|| CoreError::NotFound(format!("game {game_id}")))?;
        if &game.admin_player_id != requester {
            return Err(CoreError::Unauthorized(
                "only the game admin may perform this action".into(),
            ));
        }
        Ok(game)
    }
}

fn leave_game_in_txn(
    txn: &mut Txn,
    game_id: &GameId,
    player_id: &PlayerId,
    now: DateTime<Utc>,
) -> Result<Option<PlayerId>, CoreError> {
    let mut player = txn
        .get_player(player_id)
        .ok_or_else(|| CoreError::NotFound(format!("player {player_id}")))?;
    if player.game_id.as_ref() != Some(game_id) {
        return Err(CoreError::Validation(
            "player does not belong to this game".into(),
        ));
    }

    let was_active = player.status == PlayerStatus::Active;
    player.status = PlayerStatus::Spectator;
    player.target_id = None;
    player.version += 1;
    txn.put_player(player)?;

    if !was_active {
        return Ok(None);
    }

    let game = txn
        .get_game(game_id)
        .ok_or_else(|| CoreError::NotFound(format!("game {game_id}")))?;
    if game.status != GameStatus::Active {
        return Ok(None);
    }

    let outcome = assassin_assignment::remove_from_chain(txn, game_id, player_id, now)?;
    if let RemovalOutcome::SoleSurvivor { winner_id } = outcome {
        let mut game = game;
        game.status = GameStatus::Completed;
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
    use assassin_domain::NullEventSink;
    use assassin_store::InMemoryStore;

    fn setup() -> (Arc<InMemoryStore>, GameCoordinator<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let coordinator = GameCoordinator::new(store.clone(), Arc::new(NullEventSink));
        (store, coordinator)
    }

    #[test]
    fn create_join_and_start_builds_assignment_chain() {
        let (store, coordinator) = setup();
        let admin = PlayerId::new("admin");
        let now = Utc::now();
        let game = coordinator
            .create_game(
                GameId::new("g1"),
                "Campus Assassin".into(),
                admin.clone(),
                GameSettings::default(),
                now,
            )
            .unwrap();

        coordinator
            .update_boundary(
                &game.id,
                vec![
                    Coordinate::new(40.0, -80.0).unwrap(),
                    Coordinate::new(40.0, -79.0).unwrap(),
                    Coordinate::new(41.0, -79.0).unwrap(),
                ],
                &admin,
                now,
            )
            .unwrap();

        for i in 1..=3 {
            coordinator
                .join_game(
                    &game.id,
                    NewPlayer {
                        id: PlayerId::new(format!("p{i}")),
                        name: format!("p{i}"),
                        email: format!("p{i}@example.com"),
                    },
                    now,
                )
                .unwrap();
        }

        let started = coordinator
            .start_game(&game.id, &admin, AssignmentStrategy::Circular, now)
            .unwrap();
        assert_eq!(started.status, GameStatus::Active);

        let active = store.get_active_assignments_for_game(&game.id).unwrap();
        assert_eq!(active.len(), 3);
    }

    #[test]
    fn non_admin_cannot_pause() {
        let (_store, coordinator) = setup();
        let admin = PlayerId::new("admin");
        let now = Utc::now();
        let game = coordinator
            .create_game(GameId::new("g1"), "G".into(), admin, GameSettings::default(), now)
            .unwrap();

        let result = coordinator.emergency_pause(
            &game.id,
            "weather".into(),
            &PlayerId::new("not-admin"),
            now,
        );
        assert!(matches!(result, Err(CoreError::Unauthorized(_))));
    }

    #[test]
    fn leave_game_while_active_closes_the_chain_gap() {
        let (store, coordinator) = setup();
        let admin = PlayerId::new("admin");
        let now = Utc::now();
        let game = coordinator
            .create_game(GameId::new("g1"), "G".into(), admin.clone(), GameSettings::default(), now)
            .unwrap();
        coordinator
            .update_boundary(
                &game.id,
                vec![
                    Coordinate::new(40.0, -80.0).unwrap(),
                    Coordinate::new(40.0, -79.0).unwrap(),
                    Coordinate::new(41.0, -79.0).unwrap(),
                ],
                &admin,
                now,
            )
            .unwrap();
        for i in 1..=3 {
            coordinator
                .join_game(
                    &game.id,
                    NewPlayer {
                        id: PlayerId::new(format!("p{i}")),
                        name: format!("p{i}"),
                        email: format!("p{i}@example.com"),
                    },
                    now,
                )
                .unwrap();
        }
        coordinator
            .start_game(&game.id, &admin, AssignmentStrategy::Circular, now)
            .unwrap();

        coordinator.leave_game(&game.id, &PlayerId::new("p2"), now).unwrap();

        let active = store.get_active_assignments_for_game(&game.id).unwrap();
        assert_eq!(active.len(), 2);
        let p1_edge = store
            .get_current_assignment_for_player(&game.id, &PlayerId::new("p1"))
            .unwrap();
        let p3_edge = store
            .get_current_assignment_for_player(&game.id, &PlayerId::new("p3"))
            .unwrap();
        assert!(p1_edge.is_some());
        assert!(p3_edge.is_some());
    }
}
