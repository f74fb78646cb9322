//! Builds and maintains the elimination chain: a single directed cycle of
//! ACTIVE `TargetAssignment` rows covering every ACTIVE player in a game
//! (`spec.md` §4.7).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use assassin_domain::{
    AssignmentStatus, CoreError, GameId, Player, PlayerId, TargetAssignment,
};
use assassin_store::{Store, Txn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentStrategy {
    Circular,
    Random,
}

/// Outcome of reassigning after a verified kill.
#[derive(Debug, Clone)]
pub enum ReassignOutcome {
    /// The chain continues: `killer_id` now hunts `new_target_id`.
    Continued { new_target_id: PlayerId },
    /// `killer_id` was hunting the player it just eliminated's own target,
    /// i.e. only two players remained and the killer now has no one left
    /// to hunt: the game has a winner.
    Winner { winner_id: PlayerId },
}

/// Derives a deterministic shuffle seed from a game id and its start time,
/// so replays of the same game are reproducible in tests (`spec.md` §4.7).
pub fn derive_seed(game_id: &GameId, started_at: DateTime<Utc>) -> u64 {
    let id_hash = fnv1a(game_id.as_str().as_bytes());
    id_hash ^ (started_at.timestamp_millis() as u64)
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    let mut hash = OFFSET;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

pub struct AssignmentEngine<S: Store> {
    store: Arc<S>,
}

impl<S: Store> AssignmentEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Build the initial elimination chain for every ACTIVE player in
    /// `game_id`, writing one `ACTIVE` assignment row per player.
    pub fn build_initial_assignments(
        &self,
        game_id: &GameId,
        strategy: AssignmentStrategy,
        seed: u64,
        now: DateTime<Utc>,
    ) -> Result<Vec<TargetAssignment>, CoreError> {
        self.store.transact(|txn| {
            build_initial_assignments_in_txn(txn, game_id, strategy, seed, now)
        })
    }
}

/// Reassign after killer eliminates victim, inside the caller's own
/// transaction (`spec.md` §4.6 step "AssignmentEngine.reassign"). Free
/// function rather than a method on `AssignmentEngine<S>` since it only
/// needs a `Txn`, not a `Store` handle of its own — callers invoke it from
/// inside their own `transact()` (`KillPipeline`, the zone damage loop).
pub fn reassign(
    txn: &mut Txn,
    game_id: &GameId,
    killer_id: &PlayerId,
    victim_id: &PlayerId,
    now: DateTime<Utc>,
) -> Result<ReassignOutcome, CoreError> {
    reassign_in_txn(txn, game_id, killer_id, victim_id, now)
}

fn build_initial_assignments_in_txn(
    txn: &mut Txn,
    game_id: &GameId,
    strategy: AssignmentStrategy,
    seed: u64,
    now: DateTime<Utc>,
) -> Result<Vec<TargetAssignment>, CoreError> {
    let mut active: Vec<Player> = txn.active_players_in_game(game_id);
    if active.len() < 2 {
        return Err(CoreError::Validation(
            "at least two ACTIVE players are required to build an assignment chain".into(),
        ));
    }
    active.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    // CIRCULAR and RANDOM both reduce to "shuffle once, connect
    // consecutively" for a complete graph: a uniformly random permutation
    // arranged as a cycle *is* a uniformly random Hamiltonian cycle. RANDOM
    // draws a second, independent shuffle so the two strategies do not
    // silently coincide when seeded identically.
    active.shuffle(&mut rng);
    if strategy == AssignmentStrategy::Random {
        active.shuffle(&mut rng);
    }

    let n = active.len();
    let mut rows = Vec::with_capacity(n);
    for i in 0..n {
        let assigner = &active[i];
        let target = &active[(i + 1) % n];
        let assignment = TargetAssignment {
            id: txn.next_assignment_id(),
            game_id: game_id.clone(),
            assigner_id: assigner.id.clone(),
            target_id: target.id.clone(),
            status: AssignmentStatus::Active,
            assignment_date: now,
            completed_date: None,
        };
        txn.put_assignment(assignment.clone());
        rows.push(assignment);
    }
    Ok(rows)
}

fn reassign_in_txn(
    txn: &mut Txn,
    game_id: &GameId,
    killer_id: &PlayerId,
    victim_id: &PlayerId,
    now: DateTime<Utc>,
) -> Result<ReassignOutcome, CoreError> {
    let victim_edge = txn.get_current_assignment_for_player(game_id, victim_id);
    let killer_edge = txn
        .get_current_assignment_for_player(game_id, killer_id)
        .ok_or_else(|| {
            CoreError::GameState(format!("killer {killer_id} has no active assignment"))
        })?;

    let mut completed_killer_edge = killer_edge;
    completed_killer_edge.status = AssignmentStatus::Completed;
    completed_killer_edge.completed_date = Some(now);
    txn.put_assignment(completed_killer_edge);

    // X = victim's previous target. If the victim had no outgoing
    // assignment (should not happen given the single-cycle invariant, but
    // the source left this edge case ambiguous per spec.md §9's open
    // question) the chain cannot continue through this player: treat it as
    // a terminal state with no successor, the same as the K == X case.
    let next_target_id = match victim_edge {
        Some(mut edge) => {
            let x = edge.target_id.clone();
            edge.status = AssignmentStatus::Cancelled;
            edge.completed_date = Some(now);
            txn.put_assignment(edge);
            Some(x)
        }
        None => None,
    };

    match next_target_id {
        Some(x) if x == *killer_id => {
            tracing::info!(%game_id, winner_id = %killer_id, "game won by elimination");
            Ok(ReassignOutcome::Winner {
                winner_id: killer_id.clone(),
            })
        }
        Some(x) => {
            let new_assignment = TargetAssignment {
                id: txn.next_assignment_id(),
                game_id: game_id.clone(),
                assigner_id: killer_id.clone(),
                target_id: x.clone(),
                status: AssignmentStatus::Active,
                assignment_date: now,
                completed_date: None,
            };
            txn.put_assignment(new_assignment);
            Ok(ReassignOutcome::Continued { new_target_id: x })
        }
        None => Ok(ReassignOutcome::Winner {
            winner_id: killer_id.clone(),
        }),
    }
}

/// Outcome of removing a player from the chain without a kill (zone death,
/// leaving the game).
#[derive(Debug, Clone)]
pub enum RemovalOutcome {
    /// The chain closed over the gap: `hunter_id` now hunts `new_target_id`.
    Continued {
        hunter_id: PlayerId,
        new_target_id: PlayerId,
    },
    /// Only `hunter_id` and the removed player remained; `hunter_id` wins.
    SoleSurvivor { winner_id: PlayerId },
    /// `leaving_player_id` had no ACTIVE assignments either way (already
    /// removed, or the chain was never built for this game).
    NoOp,
}

/// Removes `leaving_player_id` from the elimination chain and closes the gap
/// so the single-cycle invariant holds, for any removal that isn't a kill
/// (zone death, voluntary leave). Unlike [`AssignmentEngine::reassign`] this
/// never completes an edge as a kill: both touched edges are CANCELLED.
pub fn remove_from_chain(
    txn: &mut Txn,
    game_id: &GameId,
    leaving_player_id: &PlayerId,
    now: DateTime<Utc>,
) -> Result<RemovalOutcome, CoreError> {
    let outgoing = txn.get_current_assignment_for_player(game_id, leaving_player_id);
    let incoming = txn.get_incoming_assignment_for_player(game_id, leaving_player_id);

    let (Some(mut outgoing), Some(mut incoming)) = (outgoing, incoming) else {
        return Ok(RemovalOutcome::NoOp);
    };

    let hunter_id = incoming.assigner_id.clone();
    let new_target_id = outgoing.target_id.clone();

    outgoing.status = AssignmentStatus::Cancelled;
    outgoing.completed_date = Some(now);
    txn.put_assignment(outgoing);

    incoming.status = AssignmentStatus::Cancelled;
    incoming.completed_date = Some(now);
    txn.put_assignment(incoming);

    if new_target_id == hunter_id {
        tracing::info!(%game_id, winner_id = %hunter_id, "game won by sole survivor");
        return Ok(RemovalOutcome::SoleSurvivor {
            winner_id: hunter_id,
        });
    }

    let new_assignment = TargetAssignment {
        id: txn.next_assignment_id(),
        game_id: game_id.clone(),
        assigner_id: hunter_id.clone(),
        target_id: new_target_id.clone(),
        status: AssignmentStatus::Active,
        assignment_date: now,
        completed_date: None,
    };
    txn.put_assignment(new_assignment);
    Ok(RemovalOutcome::Continued {
        hunter_id,
        new_target_id,
    })
}

/// True iff the ACTIVE assignments in `game_id` form exactly one cycle
/// covering every ACTIVE player — the invariant checked in tests and
/// debuggable via admin tooling (`spec.md` §8).
pub fn is_single_cycle(active_players: &[Player], assignments: &[TargetAssignment]) -> bool {
    use std::collections::HashMap;

    if active_players.is_empty() {
        return true;
    }
    let edges: HashMap<&PlayerId, &PlayerId> = assignments
        .iter()
        .filter(|a| a.status == AssignmentStatus::Active)
        .map(|a| (&a.assigner_id, &a.target_id))
        .collect();
    if edges.len() != active_players.len() {
        return false;
    }

    let start = &active_players[0].id;
    let mut visited = std::collections::HashSet::new();
    let mut current = start;
    loop {
        if !visited.insert(current) {
            break;
        }
        match edges.get(current) {
            Some(next) => current = next,
            None => return false,
        }
    }
    visited.len() == active_players.len() && current == start
}

#[cfg(test)]
mod tests {
    use super::*;
    use assassin_store::InMemoryStore;

    fn active_player(id: &str) -> Player {
        Player {
            id: PlayerId::new(id),
            name: id.into(),
            email: format!("{id}@example.com"),
            status: assassin_domain::PlayerStatus::Active,
            game_id: Some(GameId::new("g1")),
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
            health: 100.0,
            version: 0,
        }
    }

    #[test]
    fn five_player_circular_forms_one_cycle() {
        let store = Arc::new(InMemoryStore::new());
        let game_id = GameId::new("g1");
        for i in 1..=5 {
            store.put_player(active_player(&format!("p{i}"))).unwrap();
        }
        let engine = AssignmentEngine::new(store.clone());
        let now = Utc::now();
        let rows = engine
            .build_initial_assignments(&game_id, AssignmentStrategy::Circular, 42, now)
            .unwrap();
        assert_eq!(rows.len(), 5);

        let players: Vec<Player> = (1..=5)
            .map(|i| store.get_player(&PlayerId::new(format!("p{i}"))).unwrap().unwrap())
            .collect();
        assert!(is_single_cycle(&players, &rows));
    }

    #[test]
    fn reassign_after_kill_collapses_cycle() {
        let store = Arc::new(InMemoryStore::new());
        let game_id = GameId::new("g1");
        for i in 1..=3 {
            store.put_player(active_player(&format!("p{i}"))).unwrap();
        }
        let engine = AssignmentEngine::new(store.clone());
        let t0 = Utc::now();
        engine
            .build_initial_assignments(&game_id, AssignmentStrategy::Circular, 7, t0)
            .unwrap();

        // Find who p1 currently targets so we simulate p1 killing its real target.
        let p1_edge = store
            .get_current_assignment_for_player(&game_id, &PlayerId::new("p1"))
            .unwrap()
            .unwrap();
        let victim = p1_edge.target_id.clone();

        let outcome = store
            .transact(|txn| {
                reassign(
                    txn,
                    &game_id,
                    &PlayerId::new("p1"),
                    &victim,
                    t0 + chrono::Duration::seconds(1),
                )
            })
            .unwrap();

        match outcome {
            ReassignOutcome::Continued { new_target_id } => {
                let p1_new_edge = store
                    .get_current_assignment_for_player(&game_id, &PlayerId::new("p1"))
                    .unwrap()
                    .unwrap();
                assert_eq!(p1_new_edge.target_id, new_target_id);
                assert_ne!(new_target_id, PlayerId::new("p1"));
            }
            ReassignOutcome::Winner { winner_id } => {
                assert_eq!(winner_id, PlayerId::new("p1"));
            }
        }
    }

    #[test]
    fn two_player_kill_declares_winner() {
        let store = Arc::new(InMemoryStore::new());
        let game_id = GameId::new("g1");
        store.put_player(active_player("p1")).unwrap();
        store.put_player(active_player("p2")).unwrap();
        let engine = AssignmentEngine::new(store.clone());
        let t0 = Utc::now();
        engine
            .build_initial_assignments(&game_id, AssignmentStrategy::Circular, 1, t0)
            .unwrap();

        let outcome = store
            .transact(|txn| {
                reassign(
                    txn,
                    &game_id,
                    &PlayerId::new("p1"),
                    &PlayerId::new("p2"),
                    t0 + chrono::Duration::seconds(1),
                )
            })
            .unwrap();
        assert!(matches!(outcome, ReassignOutcome::Winner { winner_id } if winner_id == PlayerId::new("p1")));
    }

    #[test]
    fn remove_from_chain_closes_the_gap() {
        let store = Arc::new(InMemoryStore::new());
        let game_id = GameId::new("g1");
        for i in 1..=4 {
            store.put_player(active_player(&format!("p{i}"))).unwrap();
        }
        let engine = AssignmentEngine::new(store.clone());
        let t0 = Utc::now();
        engine
            .build_initial_assignments(&game_id, AssignmentStrategy::Circular, 99, t0)
            .unwrap();

        let leaving = PlayerId::new("p2");
        let outcome = store
            .transact(|txn| {
                remove_from_chain(txn, &game_id, &leaving, t0 + chrono::Duration::seconds(1))
            })
            .unwrap();

        match outcome {
            RemovalOutcome::Continued { hunter_id, new_target_id } => {
                let edge = store
                    .get_current_assignment_for_player(&game_id, &hunter_id)
                    .unwrap()
                    .unwrap();
                assert_eq!(edge.target_id, new_target_id);
                assert_ne!(new_target_id, leaving);
            }
            other => panic!("expected Continued, got {other:?}"),
        }

        let history = store
            .get_assignment_history_for_player(&game_id, &leaving)
            .unwrap();
        assert!(history
            .iter()
            .all(|a| a.status != AssignmentStatus::Active));
    }
}
