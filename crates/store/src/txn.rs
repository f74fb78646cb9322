use assassin_domain::{
    AssignmentId, AssignmentStatus, CoreError, Game, GameId, GameStatus, GameZoneState, Kill,
    KillKey, Player, PlayerId, PlayerStatus, SafeZone, SafeZoneId, TargetAssignment,
};

use crate::data::StoreData;

/// A handle into the store held for the duration of one [`crate::Store::transact`]
/// call. All reads and writes through a `Txn` see a single consistent
/// snapshot because the store's lock is held for the whole closure.
pub struct Txn<'a> {
    pub(crate) data: &'a mut StoreData,
}

impl<'a> Txn<'a> {
    pub fn get_game(&self, id: &GameId) -> Option<Game> {
        self.data.games.get(id).cloned()
    }

    pub fn put_game(&mut self, game: Game) -> Result<(), CoreError> {
        self.data.cas_put_game(game)
    }

    pub fn get_player(&self, id: &PlayerId) -> Option<Player> {
        self.data.players.get(id).cloned()
    }

    pub fn put_player(&mut self, player: Player) -> Result<(), CoreError> {
        self.data.cas_put_player(player)
    }

    pub fn get_players_by_game_id(&self, game_id: &GameId) -> Vec<Player> {
        self.data
            .players
            .values()
            .filter(|p| p.game_id.as_ref() == Some(game_id))
            .cloned()
            .collect()
    }

    pub fn active_players_in_game(&self, game_id: &GameId) -> Vec<Player> {
        self.get_players_by_game_id(game_id)
            .into_iter()
            .filter(|p| p.status == PlayerStatus::Active)
            .collect()
    }

    pub fn put_assignment(&mut self, assignment: TargetAssignment) {
        self.data
            .assignments
            .insert(assignment.id.clone(), assignment);
    }

    pub fn next_assignment_id(&mut self) -> AssignmentId {
        self.data.next_assignment_id()
    }

    pub fn get_active_assignments_for_game(&self, game_id: &GameId) -> Vec<TargetAssignment> {
        self.data
            .assignments
            .values()
            .filter(|a| &a.game_id == game_id && a.status == AssignmentStatus::Active)
            .cloned()
            .collect()
    }

    pub fn get_current_assignment_for_player(
        &self,
        game_id: &GameId,
        player_id: &PlayerId,
    ) -> Option<TargetAssignment> {
        self.data
            .assignments
            .values()
            .find(|a| {
                &a.game_id == game_id
                    && &a.assigner_id == player_id
                    && a.status == AssignmentStatus::Active
            })
            .cloned()
    }

    /// The ACTIVE assignment row where `player_id` is the *target*, i.e. the
    /// row belonging to whoever is currently hunting `player_id`.
    pub fn get_incoming_assignment_for_player(
        &self,
        game_id: &GameId,
        player_id: &PlayerId,
    ) -> Option<TargetAssignment> {
        self.data
            .assignments
            .values()
            .find(|a| {
                &a.game_id == game_id
                    && &a.target_id == player_id
                    && a.status == AssignmentStatus::Active
            })
            .cloned()
    }

    pub fn get_assignment_history_for_player(
        &self,
        game_id: &GameId,
        player_id: &PlayerId,
    ) -> Vec<TargetAssignment> {
        let mut rows: Vec<TargetAssignment> = self
            .data
            .assignments
            .values()
            .filter(|a| {
                &a.game_id == game_id
                    && (&a.assigner_id == player_id || &a.target_id == player_id)
            })
            .cloned()
            .collect();
        rows.sort_by_key(|a| a.assignment_date);
        rows
    }

    pub fn put_kill(&mut self, kill: Kill) {
        self.data.kills.insert(kill.key.clone(), kill);
    }

    pub fn get_kill(&self, key: &KillKey) -> Option<Kill> {
        self.data.kills.get(key).cloned()
    }

    pub fn find_kills_by_game_id(&self, game_id: &GameId) -> Vec<Kill> {
        self.data
            .kills
            .values()
            .filter(|k| &k.game_id == game_id)
            .cloned()
            .collect()
    }

    pub fn count_deaths_by_victim(&self, victim_id: &PlayerId) -> u64 {
        self.data
            .kills
            .values()
            .filter(|k| &k.victim_id == victim_id)
            .filter(|k| k.verification_status == assassin_domain::VerificationStatus::Verified)
            .count() as u64
    }

    pub fn put_safe_zone(&mut self, zone: SafeZone) -> Result<(), CoreError> {
        self.data.cas_put_safe_zone(zone)
    }

    pub fn get_safe_zone(&self, id: &SafeZoneId) -> Option<SafeZone> {
        self.data.safe_zones.get(id).cloned()
    }

    pub fn delete_safe_zone(&mut self, id: &SafeZoneId) {
        self.data.safe_zones.remove(id);
    }

    pub fn list_safe_zones_by_game(&self, game_id: &GameId) -> Vec<SafeZone> {
        self.data
            .safe_zones
            .values()
            .filter(|z| &z.game_id == game_id)
            .cloned()
            .collect()
    }

    pub fn get_zone_state(&self, game_id: &GameId) -> Option<GameZoneState> {
        self.data.zone_states.get(game_id).cloned()
    }

    pub fn put_zone_state(&mut self, state: GameZoneState) -> Result<(), CoreError> {
        self.data.cas_put_zone_state(state)
    }

    pub fn count_active_players(&self, game_id: &GameId) -> usize {
        self.active_players_in_game(game_id).len()
    }

    pub fn list_games_by_status(&self, status: GameStatus) -> Vec<Game> {
        self.data
            .games
            .values()
            .filter(|g| g.status == status)
            .cloned()
            .collect()
    }
}
