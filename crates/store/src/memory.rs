use std::sync::Mutex;

use chrono::{DateTime, Utc};

use assassin_domain::{
    CoreError, Game, GameId, GameStatus, GameZoneState, Kill, KillKey, Player, PlayerId,
    PlayerStatus, SafeZone, SafeZoneId, TargetAssignment,
};

use crate::data::StoreData;
use crate::lease::Lease;
use crate::txn::Txn;
use crate::Store;

/// In-process stand-in for the external K/V backend. Guarded by a single
/// [`Mutex`] rather than a lock per table: the spec's consistency
/// requirements (linearizable lifecycle/kill transitions per game) are
/// easiest to reason about with one coarse lock, and every operation here
/// is CPU-bound and fast enough that contention is not a concern at the
/// scale this crate targets.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<StoreData>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, StoreData>, CoreError> {
        self.inner
            .lock()
            .map_err(|_| CoreError::Persistence("store mutex poisoned".into()))
    }
}

impl Store for InMemoryStore {
    fn get_game(&self, id: &GameId) -> Result<Option<Game>, CoreError> {
        Ok(self.lock()?.games.get(id).cloned())
    }

    fn put_game(&self, game: Game) -> Result<(), CoreError> {
        self.lock()?.cas_put_game(game)
    }

    fn delete_game(&self, id: &GameId) -> Result<(), CoreError> {
        self.lock()?.games.remove(id);
        Ok(())
    }

    fn list_games_by_status(&self, status: GameStatus) -> Result<Vec<Game>, CoreError> {
        Ok(self
            .lock()?
            .games
            .values()
            .filter(|g| g.status == status)
            .cloned()
            .collect())
    }

    fn get_player(&self, id: &PlayerId) -> Result<Option<Player>, CoreError> {
        Ok(self.lock()?.players.get(id).cloned())
    }

    fn put_player(&self, player: Player) -> Result<(), CoreError> {
        self.lock()?.cas_put_player(player)
    }

    fn get_players_by_game_id(&self, game_id: &GameId) -> Result<Vec<Player>, CoreError> {
        Ok(self
            .lock()?
            .players
            .values()
            .filter(|p| p.game_id.as_ref() == Some(game_id))
            .cloned()
            .collect())
    }

    fn get_leaderboard_by_kill_count(
        &self,
        status: PlayerStatus,
        limit: usize,
    ) -> Result<Vec<Player>, CoreError> {
        let data = self.lock()?;
        let mut players: Vec<Player> = data
            .players
            .values()
            .filter(|p| p.status == status)
            .cloned()
            .collect();
        players.sort_by(|a, b| b.kill_count.cmp(&a.kill_count));
        players.truncate(limit);
        Ok(players)
    }

    fn put_kill(&self, kill: Kill) -> Result<(), CoreError> {
        self.lock()?.kills.insert(kill.key.clone(), kill);
        Ok(())
    }

    fn get_kill(&self, key: &KillKey) -> Result<Option<Kill>, CoreError> {
        Ok(self.lock()?.kills.get(key).cloned())
    }

    fn find_kills_by_game_id(&self, game_id: &GameId) -> Result<Vec<Kill>, CoreError> {
        Ok(self
            .lock()?
            .kills
            .values()
            .filter(|k| &k.game_id == game_id)
            .cloned()
            .collect())
    }

    fn count_deaths_by_victim(&self, victim_id: &PlayerId) -> Result<u64, CoreError> {
        Ok(self
            .lock()?
            .kills
            .values()
            .filter(|k| &k.victim_id == victim_id)
            .filter(|k| k.verification_status == assassin_domain::VerificationStatus::Verified)
            .count() as u64)
    }

    fn put_assignment(&self, assignment: TargetAssignment) -> Result<(), CoreError> {
        self.lock()?
            .assignments
            .insert(assignment.id.clone(), assignment);
        Ok(())
    }

    fn get_active_assignments_for_game(
        &self,
        game_id: &GameId,
    ) -> Result<Vec<TargetAssignment>, CoreError> {
        Ok(self
            .lock()?
            .assignments
            .values()
            .filter(|a| {
                &a.game_id == game_id && a.status == assassin_domain::AssignmentStatus::Active
            })
            .cloned()
            .collect())
    }

    fn get_assignment_history_for_player(
        &self,
        game_id: &GameId,
        player_id: &PlayerId,
    ) -> Result<Vec<TargetAssignment>, CoreError> {
        let data = self.lock()?;
        let mut rows: Vec<TargetAssignment> = data
            .assignments
            .values()
            .filter(|a| {
                &a.game_id == game_id
                    && (&a.assigner_id == player_id || &a.target_id == player_id)
            })
            .cloned()
            .collect();
        rows.sort_by_key(|a| a.assignment_date);
        Ok(rows)
    }

    fn get_current_assignment_for_player(
        &self,
        game_id: &GameId,
        player_id: &PlayerId,
    ) -> Result<Option<TargetAssignment>, CoreError> {
        Ok(self
            .lock()?
            .assignments
            .values()
            .find(|a| {
                &a.game_id == game_id
                    && &a.assigner_id == player_id
                    && a.status == assassin_domain::AssignmentStatus::Active
            })
            .cloned())
    }

    fn put_safe_zone(&self, zone: SafeZone) -> Result<(), CoreError> {
        self.lock()?.cas_put_safe_zone(zone)
    }

    fn get_safe_zone(&self, id: &SafeZoneId) -> Result<Option<SafeZone>, CoreError> {
        Ok(self.lock()?.safe_zones.get(id).cloned())
    }

    fn delete_safe_zone(&self, id: &SafeZoneId) -> Result<(), CoreError> {
        self.lock()?.safe_zones.remove(id);
        Ok(())
    }

    fn list_safe_zones_by_game(&self, game_id: &GameId) -> Result<Vec<SafeZone>, CoreError> {
        Ok(self
            .lock()?
            .safe_zones
            .values()
            .filter(|z| &z.game_id == game_id)
            .cloned()
            .collect())
    }

    fn get_safe_zones_by_owner(
        &self,
        game_id: &GameId,
        owner_id: &PlayerId,
    ) -> Result<Vec<SafeZone>, CoreError> {
        Ok(self
            .lock()?
            .safe_zones
            .values()
            .filter(|z| &z.game_id == game_id && &z.created_by == owner_id)
            .cloned()
            .collect())
    }

    fn get_zone_state(&self, game_id: &GameId) -> Result<Option<GameZoneState>, CoreError> {
        Ok(self.lock()?.zone_states.get(game_id).cloned())
    }

    fn put_zone_state(&self, state: GameZoneState) -> Result<(), CoreError> {
        self.lock()?.cas_put_zone_state(state)
    }

    fn transact<T>(
        &self,
        f: impl FnOnce(&mut Txn) -> Result<T, CoreError>,
    ) -> Result<T, CoreError> {
        let mut data = self.lock()?;
        let mut txn = Txn { data: &mut data };
        f(&mut txn)
    }

    fn try_acquire_lease(
        &self,
        game_id: &GameId,
        holder: &str,
        ttl_sec: u64,
        now: DateTime<Utc>,
    ) -> Result<bool, CoreError> {
        let mut data = self.lock()?;
        let acquired = match data.leases.get(game_id) {
            Some(existing) if existing.expires_at > now && existing.holder != holder => false,
            _ => true,
        };
        if acquired {
            data.leases.insert(
                game_id.clone(),
                Lease {
                    holder: holder.to_string(),
                    expires_at: now + chrono::Duration::seconds(ttl_sec as i64),
                },
            );
        }
        Ok(acquired)
    }

    fn release_lease(&self, game_id: &GameId, holder: &str) -> Result<(), CoreError> {
        let mut data = self.lock()?;
        if let Some(existing) = data.leases.get(game_id) {
            if existing.holder == holder {
                data.leases.remove(game_id);
            }
        }
        Ok(())
    }
}
