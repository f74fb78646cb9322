//! Typed persistence over an in-process stand-in for the external K/V
//! backend described in `spec.md` §4.2. [`Store`] is the narrow capability
//! contract every other component depends on; [`InMemoryStore`] is the only
//! implementation shipped here, but nothing outside this crate constructs a
//! `StoreData` directly, so a different backend can be substituted later
//! without touching callers.

mod data;
mod lease;
mod memory;
mod txn;

pub use lease::Lease;
pub use memory::InMemoryStore;
pub use txn::Txn;

use chrono::{DateTime, Utc};

use assassin_domain::{
    CoreError, Game, GameId, GameStatus, GameZoneState, Kill, KillKey, Player, PlayerId,
    PlayerStatus, SafeZone, SafeZoneId, TargetAssignment,
};

/// Typed persistence contract (`spec.md` §4.2). Single-entity operations are
/// atomic on their own; anything that must touch more than one entity
/// consistently goes through [`Store::transact`], which holds the backend's
/// lock for the whole closure so reads inside it see one snapshot.
pub trait Store: Send + Sync + 'static {
    fn get_game(&self, id: &GameId) -> Result<Option<Game>, CoreError>;
    fn put_game(&self, game: Game) -> Result<(), CoreError>;
    fn delete_game(&self, id: &GameId) -> Result<(), CoreError>;
    fn list_games_by_status(&self, status: GameStatus) -> Result<Vec<Game>, CoreError>;

    fn get_player(&self, id: &PlayerId) -> Result<Option<Player>, CoreError>;
    fn put_player(&self, player: Player) -> Result<(), CoreError>;
    fn get_players_by_game_id(&self, game_id: &GameId) -> Result<Vec<Player>, CoreError>;
    fn get_leaderboard_by_kill_count(
        &self,
        status: PlayerStatus,
        limit: usize,
    ) -> Result<Vec<Player>, CoreError>;

    fn put_kill(&self, kill: Kill) -> Result<(), CoreError>;
    fn get_kill(&self, key: &KillKey) -> Result<Option<Kill>, CoreError>;
    fn find_kills_by_game_id(&self, game_id: &GameId) -> Result<Vec<Kill>, CoreError>;
    fn count_deaths_by_victim(&self, victim_id: &PlayerId) -> Result<u64, CoreError>;

    fn put_assignment(&self, assignment: TargetAssignment) -> Result<(), CoreError>;
    fn get_active_assignments_for_game(
        &self,
        game_id: &GameId,
    ) -> Result<Vec<TargetAssignment>, CoreError>;
    fn get_assignment_history_for_player(
        &self,
        game_id: &GameId,
        player_id: &PlayerId,
    ) -> Result<Vec<TargetAssignment>, CoreError>;
    fn get_current_assignment_for_player(
        &self,
        game_id: &GameId,
        player_id: &PlayerId,
    ) -> Result<Option<TargetAssignment>, CoreError>;

    fn put_safe_zone(&self, zone: SafeZone) -> Result<(), CoreError>;
    fn get_safe_zone(&self, id: &SafeZoneId) -> Result<Option<SafeZone>, CoreError>;
    fn delete_safe_zone(&self, id: &SafeZoneId) -> Result<(), CoreError>;
    fn list_safe_zones_by_game(&self, game_id: &GameId) -> Result<Vec<SafeZone>, CoreError>;
    fn get_safe_zones_by_owner(
        &self,
        game_id: &GameId,
        owner_id: &PlayerId,
    ) -> Result<Vec<SafeZone>, CoreError>;

    fn get_zone_state(&self, game_id: &GameId) -> Result<Option<GameZoneState>, CoreError>;
    fn put_zone_state(&self, state: GameZoneState) -> Result<(), CoreError>;

    /// Run `f` with exclusive access to the whole store. `f` sees a
    /// consistent snapshot and any writes it makes are visible atomically
    /// to the next caller once it returns `Ok`; returning `Err` makes this a
    /// no-op on state written so far within the closure, since callers are
    /// expected to validate (e.g. compare `version`) before calling `put_*`.
    fn transact<T>(
        &self,
        f: impl FnOnce(&mut Txn) -> Result<T, CoreError>,
    ) -> Result<T, CoreError>;

    /// Attempt to acquire the per-game scheduler lease. Returns `true` if
    /// acquired (or renewed by the same holder), `false` if held by someone
    /// else and not yet expired (`spec.md` §5).
    fn try_acquire_lease(
        &self,
        game_id: &GameId,
        holder: &str,
        ttl_sec: u64,
        now: DateTime<Utc>,
    ) -> Result<bool, CoreError>;

    fn release_lease(&self, game_id: &GameId, holder: &str) -> Result<(), CoreError>;
}
