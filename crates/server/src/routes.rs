use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::Utc;

use assassin_anticheat::LocationSample;
use assassin_assignment::AssignmentStrategy;
use assassin_coordinator::NewPlayer;
use assassin_domain::{
    CoreError, DomainEvent, Game, GameId, GameZoneState, Kill, KillKey, Player, PlayerId, SafeZone,
};
use assassin_killpipeline::ProposeKillRequest;
use assassin_safezone::CreateSafeZoneRequest;

use crate::auth::RequesterId;
use crate::dto::*;
use crate::error::ApiError;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/games", post(create_game))
        .route("/games/:id", get(get_game).patch(change_status))
        .route("/games/:id/boundary", put(update_boundary))
        .route("/games/:id/join", post(join_game))
        .route("/games/:id/assign-targets", post(assign_targets))
        .route("/games/:id/players", get(list_players))
        .route("/games/:id/zone/state", get(zone_state))
        .route("/games/:id/emergency/pause", post(emergency_pause))
        .route("/games/:id/emergency/resume", post(emergency_resume))
        .route("/safezones", post(create_safe_zone))
        .route("/players/:id/location", put(update_location))
        .route("/kills/attempt", post(propose_kill))
        .route("/kills/:killer_id/photo", put(submit_photo))
        .route("/kills/:killer_id/verify", put(admin_verify))
        .route("/leaderboard", get(leaderboard))
        .with_state(state)
}

fn parse_timestamp(t: &TimestampInput) -> Result<chrono::DateTime<Utc>, ApiError> {
    t.to_utc()
        .map_err(|e| ApiError(CoreError::Validation(e)))
}

async fn create_game(
    State(state): State<AppState>,
    Json(req): Json<CreateGameRequest>,
) -> Result<(StatusCode, Json<Game>), ApiError> {
    let now = Utc::now();
    let id = GameId::new(format!("game-{}", now.format("%Y%m%dT%H%M%S%.9f")));
    let game = state.coordinator.create_game(
        id,
        req.name,
        PlayerId::new(req.admin_player_id),
        req.settings.unwrap_or_default(),
        now,
    )?;
    Ok((StatusCode::CREATED, Json(game)))
}

async fn get_game(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Game>, ApiError> {
    let game = state.coordinator.get_game(&GameId::new(id))?;
    Ok(Json(game))
}

async fn change_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    RequesterId(requester): RequesterId,
    Json(req): Json<ChangeStatusRequest>,
) -> Result<Json<Game>, ApiError> {
    let game_id = GameId::new(id);
    let now = Utc::now();
    let updated = match req.status {
        GameStatusInput::Active => {
            state
                .coordinator
                .start_game(&game_id, &requester, AssignmentStrategy::Circular, now)?
        }
        GameStatusInput::Completed | GameStatusInput::Cancelled => {
            state.coordinator.force_end_game(&game_id, &requester, now)?
        }
    };
    Ok(Json(updated))
}

async fn update_boundary(
    State(state): State<AppState>,
    Path(id): Path<String>,
    RequesterId(requester): RequesterId,
    Json(req): Json<UpdateBoundaryRequest>,
) -> Result<Json<Game>, ApiError> {
    let game_id = GameId::new(id);
    let now = Utc::now();
    let boundary = req
        .boundary
        .into_iter()
        .map(|c| c.into_coordinate())
        .collect::<Result<Vec<_>, _>>()
        .map_err(CoreError::from)?;
    let updated = state
        .coordinator
        .update_boundary(&game_id, boundary, &requester, now)?;
    Ok(Json(updated))
}

async fn join_game(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<JoinGameRequest>,
) -> Result<Json<Player>, ApiError> {
    let now = Utc::now();
    let player = state.coordinator.join_game(
        &GameId::new(id),
        NewPlayer {
            id: PlayerId::new(req.player_id),
            name: req.name,
            email: req.email,
        },
        now,
    )?;
    Ok(Json(player))
}

async fn assign_targets(
    State(state): State<AppState>,
    Path(id): Path<String>,
    RequesterId(requester): RequesterId,
) -> Result<Json<Game>, ApiError> {
    let game_id = GameId::new(id);
    let now = Utc::now();
    let started = state
        .coordinator
        .start_game(&game_id, &requester, AssignmentStrategy::Circular, now)?;
    Ok(Json(started))
}

async fn list_players(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Player>>, ApiError> {
    let players = state.coordinator.list_players(&GameId::new(id))?;
    Ok(Json(players))
}

async fn zone_state(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<GameZoneState>, ApiError> {
    let state_row = state
        .store
        .get_zone_state(&GameId::new(id.clone()))?
        .ok_or_else(|| CoreError::NotFound(format!("zone state for game {id}")))?;
    Ok(Json(state_row))
}

async fn emergency_pause(
    State(state): State<AppState>,
    Path(id): Path<String>,
    RequesterId(requester): RequesterId,
    Json(req): Json<EmergencyPauseRequest>,
) -> Result<Json<Game>, ApiError> {
    let game_id = GameId::new(id);
    let now = Utc::now();
    let updated = state
        .coordinator
        .emergency_pause(&game_id, req.reason, &requester, now)?;
    Ok(Json(updated))
}

async fn emergency_resume(
    State(state): State<AppState>,
    Path(id): Path<String>,
    RequesterId(requester): RequesterId,
) -> Result<Json<Game>, ApiError> {
    let game_id = GameId::new(id);
    let now = Utc::now();
    let updated = state
        .coordinator
        .emergency_resume(&game_id, &requester, now)?;
    Ok(Json(updated))
}

async fn create_safe_zone(
    State(state): State<AppState>,
    Json(req): Json<CreateSafeZoneRequestDto>,
) -> Result<(StatusCode, Json<SafeZone>), ApiError> {
    let center = req.center.into_coordinate().map_err(CoreError::from)?;
    let start_time = req
        .start_time
        .as_ref()
        .map(parse_timestamp)
        .transpose()?;
    let end_time = req.end_time.as_ref().map(parse_timestamp).transpose()?;

    let zone = state.safezone.create(CreateSafeZoneRequest {
        zone_type: req.zone_type,
        game_id: GameId::new(req.game_id),
        name: req.name,
        description: req.description,
        center,
        radius_meters: req.radius_meters,
        created_by: PlayerId::new(req.created_by),
        authorized_player_ids: req.authorized_player_ids.into_iter().map(PlayerId::new).collect(),
        start_time,
        end_time,
    })?;
    Ok((StatusCode::CREATED, Json(zone)))
}

async fn update_location(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<LocationUpdateRequest>,
) -> Result<StatusCode, ApiError> {
    let player_id = PlayerId::new(id);
    let timestamp = parse_timestamp(&req.timestamp)?;
    let coordinate = assassin_geometry::Coordinate::new(req.latitude, req.longitude)
        .map_err(CoreError::from)?;

    let mut player = state
        .store
        .get_player(&player_id)?
        .ok_or_else(|| CoreError::NotFound(format!("player {player_id}")))?;
    let game_id = player
        .game_id
        .clone()
        .ok_or_else(|| CoreError::GameState("player is not in a game".into()))?;
    let game = state
        .store
        .get_game(&game_id)?
        .ok_or_else(|| CoreError::NotFound(format!("game {game_id}")))?;

    let result = state.anticheat.validate(
        &player_id,
        LocationSample {
            coordinate,
            accuracy_m: req.accuracy_m,
            timestamp,
            device_fingerprint: req.device_fingerprint.clone(),
        },
        &game.settings,
    );
    if !result.valid {
        let severity = result.violations.iter().map(|v| v.severity).max().unwrap_or(0);
        let violation = result
            .violations
            .iter()
            .max_by_key(|v| v.severity)
            .map(|v| v.detail.clone())
            .unwrap_or_default();
        state.events.emit(DomainEvent::AntiCheatFlag {
            game_id: game_id.clone(),
            player_id: player_id.clone(),
            severity,
            violation,
        });
        return Err(ApiError(CoreError::AntiCheatReject {
            reason: "location sample rejected".into(),
            severity,
        }));
    }

    if player.location_timestamp.is_some_and(|last| timestamp <= last) {
        return Ok(StatusCode::NO_CONTENT);
    }

    player.location = Some(coordinate);
    player.accuracy_m = Some(req.accuracy_m);
    player.location_timestamp = Some(timestamp);
    if let Some(sharing) = req.location_sharing_enabled {
        player.location_sharing_enabled = sharing;
    }
    if let Some(visibility) = req.location_visibility {
        player.location_visibility = visibility;
    }
    if let Some(precision) = req.location_precision {
        player.location_precision = precision;
    }
    player.version += 1;
    state.store.put_player(player)?;

    state.proximity.on_location_update(&game_id, &player_id, timestamp)?;

    Ok(StatusCode::NO_CONTENT)
}

async fn propose_kill(
    State(state): State<AppState>,
    Json(req): Json<ProposeKillRequestDto>,
) -> Result<Json<Kill>, ApiError> {
    let now = parse_timestamp(&req.timestamp)?;
    let killer_id = PlayerId::new(req.killer_id);
    let victim_id = PlayerId::new(req.victim_id);
    let game_id = state
        .store
        .get_player(&killer_id)?
        .and_then(|p| p.game_id)
        .ok_or_else(|| CoreError::NotFound(format!("player {killer_id}")))?;

    let kill = state.killpipeline.propose(ProposeKillRequest {
        game_id,
        killer_id,
        victim_id,
        method: req.method,
        data: req.data,
        now,
    })?;
    Ok(Json(kill))
}

async fn submit_photo(
    State(state): State<AppState>,
    Path(killer_id): Path<String>,
    Json(req): Json<SubmitPhotoRequest>,
) -> Result<Json<Kill>, ApiError> {
    let kill_time = parse_timestamp(&req.kill_time)?;
    let key = KillKey {
        killer_id: PlayerId::new(killer_id),
        kill_time,
    };
    let kill = state
        .killpipeline
        .submit_photo(&key, req.image_hash, req.url)?;
    Ok(Json(kill))
}

async fn admin_verify(
    State(state): State<AppState>,
    Path(killer_id): Path<String>,
    RequesterId(requester): RequesterId,
    Json(req): Json<AdminVerifyRequest>,
) -> Result<Json<Kill>, ApiError> {
    let kill_time = parse_timestamp(&req.kill_time)?;
    let key = KillKey {
        killer_id: PlayerId::new(killer_id),
        kill_time,
    };
    let existing = state
        .store
        .get_kill(&key)?
        .ok_or_else(|| CoreError::NotFound("kill not found".into()))?;
    let game = state
        .store
        .get_game(&existing.game_id)?
        .ok_or_else(|| CoreError::NotFound(format!("game {}", existing.game_id)))?;
    if game.admin_player_id != requester {
        return Err(ApiError(CoreError::Unauthorized(
            "requester is not the game admin".into(),
        )));
    }
    let now = Utc::now();
    let kill = state
        .killpipeline
        .admin_verify(&key, req.is_valid, &requester, now)?;
    Ok(Json(kill))
}

async fn leaderboard(State(state): State<AppState>) -> Result<Json<Vec<Player>>, ApiError> {
    let players = state.coordinator.leaderboard(50)?;
    Ok(Json(players))
}
