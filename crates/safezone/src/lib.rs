//! Safe-zone CRUD and activity evaluation (`spec.md` §4.4).

use std::sync::Arc;

use chrono::{DateTime, Utc};

use assassin_domain::{CoreError, GameId, PlayerId, SafeZone, SafeZoneId, SafeZoneType};
use assassin_geometry::{point_in_polygon, within_radius, Coordinate};
use assassin_store::Store;

const MIN_RADIUS_M: f64 = 5.0;
const MAX_RADIUS_M: f64 = 10_000.0;

pub struct CreateSafeZoneRequest {
    pub zone_type: SafeZoneType,
    pub game_id: GameId,
    pub name: String,
    pub description: String,
    pub center: Coordinate,
    pub radius_meters: f64,
    pub created_by: PlayerId,
    pub authorized_player_ids: Vec<PlayerId>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Default)]
pub struct SafeZonePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub radius_meters: Option<f64>,
    pub authorized_player_ids: Option<Vec<PlayerId>>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Default)]
pub struct ListFilters {
    pub active_only: Option<DateTime<Utc>>,
    pub zone_type: Option<SafeZoneType>,
}

pub struct SafeZoneService<S: Store> {
    store: Arc<S>,
}

impl<S: Store> SafeZoneService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn create(&self, req: CreateSafeZoneRequest) -> Result<SafeZone, CoreError> {
        validate_radius(req.radius_meters)?;
        if req.zone_type == SafeZoneType::Timed {
            match (req.start_time, req.end_time) {
                (Some(start), Some(end)) if end > start => {}
                _ => {
                    return Err(CoreError::Validation(
                        "TIMED zones require end_time > start_time".into(),
                    ))
                }
            }
        }

        let game = self
            .store
            .get_game(&req.game_id)?
            .ok_or_else(|| CoreError::NotFound(format!("game {}", req.game_id)))?;
        if !point_in_polygon(req.center, &game.boundary)? {
            return Err(CoreError::Validation(
                "safe zone center must be inside the game boundary".into(),
            ));
        }

        let zone = SafeZone {
            id: SafeZoneId::new(uuid_like(&req.game_id, &req.created_by)),
            game_id: req.game_id,
            zone_type: req.zone_type,
            center: req.center,
            radius_meters: req.radius_meters,
            name: req.name,
            description: req.description,
            created_by: req.created_by,
            authorized_player_ids: req.authorized_player_ids,
            start_time: req.start_time,
            end_time: req.end_time,
            relocation_cooldown_until: None,
            version: 0,
        };
        self.store.put_safe_zone(zone.clone())?;
        tracing::debug!(zone_id = %zone.id, game_id = %zone.game_id, "safe zone created");
        Ok(zone)
    }

    pub fn update(
        &self,
        id: &SafeZoneId,
        patch: SafeZonePatch,
        requesting_player_id: &PlayerId,
    ) -> Result<SafeZone, CoreError> {
        let mut zone = self.require_owned(id, requesting_player_id)?;

        if let Some(radius) = patch.radius_meters {
            validate_radius(radius)?;
            zone.radius_meters = radius;
        }
        if let Some(name) = patch.name {
            zone.name = name;
        }
        if let Some(description) = patch.description {
            zone.description = description;
        }
        if let Some(authorized) = patch.authorized_player_ids {
            zone.authorized_player_ids = authorized;
        }
        if patch.start_time.is_some() || patch.end_time.is_some() {
            let start = patch.start_time.or(zone.start_time);
            let end = patch.end_time.or(zone.end_time);
            if zone.zone_type == SafeZoneType::Timed {
                match (start, end) {
                    (Some(s), Some(e)) if e > s => {}
                    _ => {
                        return Err(CoreError::Validation(
                            "TIMED zones require end_time > start_time".into(),
                        ))
                    }
                }
            }
            zone.start_time = start;
            zone.end_time = end;
        }

        zone.version += 1;
        self.store.put_safe_zone(zone.clone())?;
        Ok(zone)
    }

    /// Move a `RELOCATABLE` zone to a new center. Owner-only, subject to
    /// the zone's relocation cooldown (`spec.md` §4.4).
    pub fn relocate(
        &self,
        id: &SafeZoneId,
        requesting_player_id: &PlayerId,
        new_center: Coordinate,
        now: DateTime<Utc>,
        cooldown_sec: i64,
    ) -> Result<SafeZone, CoreError> {
        let mut zone = self.require_owned(id, requesting_player_id)?;
        if zone.zone_type != SafeZoneType::Relocatable {
            return Err(CoreError::Validation(
                "only RELOCATABLE zones can be relocated".into(),
            ));
        }
        if let Some(cooldown_until) = zone.relocation_cooldown_until {
            if now < cooldown_until {
                return Err(CoreError::GameState(format!(
                    "relocation cooldown active until {cooldown_until}"
                )));
            }
        }

        let game = self
            .store
            .get_game(&zone.game_id)?
            .ok_or_else(|| CoreError::NotFound(format!("game {}", zone.game_id)))?;
        if !point_in_polygon(new_center, &game.boundary)? {
            return Err(CoreError::Validation(
                "new center must be inside the game boundary".into(),
            ));
        }

        zone.center = new_center;
        zone.relocation_cooldown_until = Some(now + chrono::Duration::seconds(cooldown_sec));
        zone.version += 1;
        self.store.put_safe_zone(zone.clone())?;
        tracing::debug!(zone_id = %zone.id, "safe zone relocated");
        Ok(zone)
    }

    pub fn delete(&self, id: &SafeZoneId, requesting_player_id: &PlayerId) -> Result<(), CoreError> {
        self.require_owned(id, requesting_player_id)?;
        self.store.delete_safe_zone(id)
    }

    pub fn list(&self, game_id: &GameId, filters: ListFilters) -> Result<Vec<SafeZone>, CoreError> {
        let mut zones = self.store.list_safe_zones_by_game(game_id)?;
        if let Some(zone_type) = filters.zone_type {
            zones.retain(|z| z.zone_type == zone_type);
        }
        if let Some(t) = filters.active_only {
            zones.retain(|z| z.is_active_at(t));
        }
        Ok(zones)
    }

    pub fn active_zones_at(
        &self,
        game_id: &GameId,
        t: DateTime<Utc>,
    ) -> Result<Vec<SafeZone>, CoreError> {
        Ok(self
            .store
            .list_safe_zones_by_game(game_id)?
            .into_iter()
            .filter(|z| z.is_active_at(t))
            .collect())
    }

    /// True iff `coord` lies within any zone active at `t` that authorizes
    /// `player_id`, and the game is `ACTIVE` (`spec.md` §4.4).
    pub fn is_point_safe(
        &self,
        game_id: &GameId,
        player_id: &PlayerId,
        coord: Coordinate,
        t: DateTime<Utc>,
    ) -> Result<bool, CoreError> {
        let game = self
            .store
            .get_game(game_id)?
            .ok_or_else(|| CoreError::NotFound(format!("game {game_id}")))?;
        if game.status != assassin_domain::GameStatus::Active {
            return Ok(false);
        }

        for zone in self.active_zones_at(game_id, t)? {
            if zone.authorizes(player_id) && within_radius(coord, zone.center, zone.radius_meters)
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn require_owned(
        &self,
        id: &SafeZoneId,
        requesting_player_id: &PlayerId,
    ) -> Result<SafeZone, CoreError> {
        let zone = self
            .store
            .get_safe_zone(id)?
            .ok_or_else(|| CoreError::NotFound(format!("safe zone {id}")))?;
        if &zone.created_by != requesting_player_id {
            return Err(CoreError::Unauthorized(
                "only the zone owner may modify it".into(),
            ));
        }
        Ok(zone)
    }
}

fn validate_radius(radius_meters: f64) -> Result<(), CoreError> {
    if !(MIN_RADIUS_M..=MAX_RADIUS_M).contains(&radius_meters) {
        return Err(CoreError::Validation(format!(
            "radius must be within [{MIN_RADIUS_M}, {MAX_RADIUS_M}] meters, got {radius_meters}"
        )));
    }
    Ok(())
}

/// Deterministic id derivation used when a concrete ID source (UUID,
/// database sequence) is not yet wired up by the composition root.
fn uuid_like(game_id: &GameId, created_by: &PlayerId) -> String {
    format!("sz-{}-{}-{}", game_id, created_by, nanos())
}

fn nanos() -> u128 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assassin_domain::{EmergencyPause, Game, GameSettings, GameStatus};
    use assassin_store::InMemoryStore;
    use chrono::Utc;

    fn c(lat: f64, lng: f64) -> Coordinate {
        Coordinate::new(lat, lng).unwrap()
    }

    fn test_game(id: &str) -> Game {
        Game {
            id: GameId::new(id),
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
            extra_settings: Default::default(),
        }
    }

    fn setup() -> (Arc<InMemoryStore>, SafeZoneService<InMemoryStore>, GameId) {
        let store = Arc::new(InMemoryStore::new());
        let game = test_game("g1");
        let game_id = game.id.clone();
        store.put_game(game).unwrap();
        let service = SafeZoneService::new(store.clone());
        (store, service, game_id)
    }

    #[test]
    fn radius_outside_bounds_is_rejected() {
        let (_s, service, game_id) = setup();
        let req = CreateSafeZoneRequest {
            zone_type: SafeZoneType::Public,
            game_id,
            name: "tiny".into(),
            description: "".into(),
            center: c(40.44, -79.94),
            radius_meters: 1.0,
            created_by: PlayerId::new("owner"),
            authorized_player_ids: vec![],
            start_time: None,
            end_time: None,
        };
        assert!(service.create(req).is_err());
    }

    #[test]
    fn public_zone_protects_any_player_at_boundary_distance() {
        let (_s, service, game_id) = setup();
        let center = c(40.44, -79.94);
        let zone = service
            .create(CreateSafeZoneRequest {
                zone_type: SafeZoneType::Public,
                game_id: game_id.clone(),
                name: "park".into(),
                description: "".into(),
                center,
                radius_meters: 100.0,
                created_by: PlayerId::new("owner"),
                authorized_player_ids: vec![],
                start_time: None,
                end_time: None,
            })
            .unwrap();
        assert_eq!(zone.radius_meters, 100.0);

        let now = Utc::now();
        assert!(service
            .is_point_safe(&game_id, &PlayerId::new("anyone"), center, now)
            .unwrap());
    }

    #[test]
    fn private_zone_only_protects_authorized_players() {
        let (_s, service, game_id) = setup();
        let center = c(40.44, -79.94);
        service
            .create(CreateSafeZoneRequest {
                zone_type: SafeZoneType::Private,
                game_id: game_id.clone(),
                name: "base".into(),
                description: "".into(),
                center,
                radius_meters: 50.0,
                created_by: PlayerId::new("owner"),
                authorized_player_ids: vec![PlayerId::new("ally")],
                start_time: None,
                end_time: None,
            })
            .unwrap();

        let now = Utc::now();
        assert!(service
            .is_point_safe(&game_id, &PlayerId::new("ally"), center, now)
            .unwrap());
        assert!(!service
            .is_point_safe(&game_id, &PlayerId::new("enemy"), center, now)
            .unwrap());
    }

    #[test]
    fn timed_zone_requires_end_after_start() {
        let (_s, service, game_id) = setup();
        let now = Utc::now();
        let req = CreateSafeZoneRequest {
            zone_type: SafeZoneType::Timed,
            game_id,
            name: "event".into(),
            description: "".into(),
            center: c(40.44, -79.94),
            radius_meters: 50.0,
            created_by: PlayerId::new("owner"),
            authorized_player_ids: vec![],
            start_time: Some(now),
            end_time: Some(now - chrono::Duration::seconds(1)),
        };
        assert!(service.create(req).is_err());
    }
}
