use std::collections::HashMap;
use std::hash::Hash;

use assassin_domain::{
    AssignmentId, CoreError, GameId, GameZoneState, Kill, KillKey, PlayerId, SafeZone, SafeZoneId,
    TargetAssignment,
};
use assassin_domain::{Game, Player};

#[derive(Default)]
pub(crate) struct StoreData {
    pub games: HashMap<GameId, Game>,
    pub players: HashMap<PlayerId, Player>,
    pub assignments: HashMap<AssignmentId, TargetAssignment>,
    pub safe_zones: HashMap<SafeZoneId, SafeZone>,
    pub kills: HashMap<KillKey, Kill>,
    pub zone_states: HashMap<GameId, GameZoneState>,
    pub leases: HashMap<GameId, super::lease::Lease>,
    pub assignment_seq: u64,
}

impl StoreData {
    pub fn next_assignment_id(&mut self) -> AssignmentId {
        self.assignment_seq += 1;
        AssignmentId::new(format!("asn-{}", self.assignment_seq))
    }

    pub fn cas_put_game(&mut self, game: Game) -> Result<(), CoreError> {
        cas_insert(&mut self.games, game.id.clone(), game, |g| g.version)
    }

    pub fn cas_put_player(&mut self, player: Player) -> Result<(), CoreError> {
        cas_insert(&mut self.players, player.id.clone(), player, |p| p.version)
    }

    pub fn cas_put_safe_zone(&mut self, zone: SafeZone) -> Result<(), CoreError> {
        cas_insert(&mut self.safe_zones, zone.id.clone(), zone, |z| z.version)
    }

    pub fn cas_put_zone_state(&mut self, state: GameZoneState) -> Result<(), CoreError> {
        cas_insert(
            &mut self.zone_states,
            state.game_id.clone(),
            state,
            |s| s.version,
        )
    }
}

/// Optimistic concurrency control on `HashMap<K, V>`: a write against an
/// existing row is only accepted if its `version` is exactly one past the
/// currently stored version, matching a compare-and-set on that attribute
/// (`spec.md` §5). A write for a key with no existing row is always an
/// insert and never conflicts.
fn cas_insert<K: Eq + Hash + Clone, V>(
    map: &mut HashMap<K, V>,
    key: K,
    value: V,
    version_of: impl Fn(&V) -> u64,
) -> Result<(), CoreError> {
    if let Some(existing) = map.get(&key) {
        let expected = version_of(existing) + 1;
        let got = version_of(&value);
        if got != expected {
            return Err(CoreError::Conflict(format!(
                "version mismatch: expected {expected}, got {got}"
            )));
        }
    }
    map.insert(key, value);
    Ok(())
}
