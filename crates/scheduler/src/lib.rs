//! Periodic driver for per-game background work: zone stage advancement,
//! the shrinking-zone damage tick, and proximity cache eviction
//! (`spec.md` §5). One process may run several `Scheduler` instances
//! against the same store; the per-game lease in [`assassin_store::Store`]
//! ensures only one of them actually ticks a given game on any given pass.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use assassin_domain::{CoreError, GameId, GameStatus};
use assassin_proximity::ProximityEngine;
use assassin_store::Store;
use assassin_zone_engine::ZoneEngine;

/// How long a hunter's cached proximity snapshot may sit unrefreshed before
/// `evict_stale` drops it.
const PROXIMITY_IDLE_THRESHOLD_SEC: i64 = 300;

pub struct Scheduler<S: Store> {
    store: Arc<S>,
    zone_engine: Arc<ZoneEngine<S>>,
    proximity: Arc<ProximityEngine<S>>,
    holder: String,
}

impl<S: Store> Scheduler<S> {
    pub fn new(
        store: Arc<S>,
        zone_engine: Arc<ZoneEngine<S>>,
        proximity: Arc<ProximityEngine<S>>,
        holder: impl Into<String>,
    ) -> Self {
        Self {
            store,
            zone_engine,
            proximity,
            holder: holder.into(),
        }
    }

    /// Tick every `ACTIVE` game this process can claim the lease for.
    /// Returns the ids actually ticked; a game whose lease is held by
    /// another worker is skipped, not an error.
    pub fn tick_all(&self, now: DateTime<Utc>) -> Result<Vec<GameId>, CoreError> {
        let mut ticked = Vec::new();
        for game in self.store.list_games_by_status(GameStatus::Active)? {
            let settings = &game.settings;
            let acquired = self.store.try_acquire_lease(
                &game.id,
                &self.holder,
                settings.scheduler_lease_ttl_sec,
                now,
            )?;
            if !acquired {
                continue;
            }

            let result = self.tick_one(&game.id, now);
            self.store.release_lease(&game.id, &self.holder)?;

            match result {
                Ok(()) => ticked.push(game.id),
                Err(e) => {
                    tracing::warn!(game_id = %game.id, error = %e, "scheduler tick failed");
                    if !e.is_retriable() {
                        return Err(e);
                    }
                }
            }
        }
        Ok(ticked)
    }

    /// Run the zone state machine, the damage tick, and proximity eviction
    /// for one game. All three happen even if a player dies mid-tick, since
    /// each call opens and closes its own transaction.
    fn tick_one(&self, game_id: &GameId, now: DateTime<Utc>) -> Result<(), CoreError> {
        self.zone_engine.advance(game_id, now)?;
        let dead = self.zone_engine.run_damage_tick(game_id, now)?;
        if !dead.is_empty() {
            tracing::info!(game_id = %game_id, count = dead.len(), "zone damage eliminated players");
        }
        self.proximity.evict_stale(now, PROXIMITY_IDLE_THRESHOLD_SEC);
        Ok(())
    }

    /// Block forever, ticking every `tick_interval` until the process is
    /// killed. The composition root spawns this on a dedicated thread.
    pub fn run_forever(&self, tick_interval: Duration) {
        loop {
            std::thread::sleep(tick_interval);
            if let Err(e) = self.tick_all(Utc::now()) {
                tracing::error!(error = %e, "scheduler pass aborted");
            }
        }
    }
}
