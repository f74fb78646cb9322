use std::sync::Arc;

use assassin_anticheat::AntiCheatValidator;
use assassin_coordinator::GameCoordinator;
use assassin_domain::EventSink;
use assassin_killpipeline::KillPipeline;
use assassin_proximity::ProximityEngine;
use assassin_safezone::SafeZoneService;
use assassin_scheduler::Scheduler;
use assassin_store::InMemoryStore;
use assassin_zone_engine::ZoneEngine;

/// Every handler reaches the core exclusively through this bundle; nothing
/// here holds transport-level state, so the set of engines is identical to
/// what a non-HTTP embedder (a test, a CLI) would construct.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<InMemoryStore>,
    pub coordinator: Arc<GameCoordinator<InMemoryStore>>,
    pub safezone: Arc<SafeZoneService<InMemoryStore>>,
    pub anticheat: Arc<AntiCheatValidator>,
    pub killpipeline: Arc<KillPipeline<InMemoryStore>>,
    pub proximity: Arc<ProximityEngine<InMemoryStore>>,
    pub zone_engine: Arc<ZoneEngine<InMemoryStore>>,
    pub events: Arc<dyn EventSink>,
}

impl AppState {
    pub fn new(events: Arc<dyn EventSink>) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let coordinator = Arc::new(GameCoordinator::new(store.clone(), events.clone()));
        let safezone = Arc::new(SafeZoneService::new(store.clone()));
        let anticheat = Arc::new(AntiCheatValidator::new());
        let killpipeline = Arc::new(KillPipeline::new(
            store.clone(),
            anticheat.clone(),
            safezone.clone(),
            events.clone(),
        ));
        let proximity = Arc::new(ProximityEngine::new(
            store.clone(),
            safezone.clone(),
            events.clone(),
        ));
        let zone_engine = Arc::new(ZoneEngine::new(store.clone(), events.clone()));

        Self {
            store,
            coordinator,
            safezone,
            anticheat,
            killpipeline,
            proximity,
            zone_engine,
            events,
        }
    }

    /// Build the per-game lease-driven background `Scheduler` against this
    /// state's engines. Kept separate from `new` since not every embedder
    /// (e.g. a handler-level test) wants a background thread running.
    pub fn scheduler(&self, holder: impl Into<String>) -> Scheduler<InMemoryStore> {
        Scheduler::new(
            self.store.clone(),
            self.zone_engine.clone(),
            self.proximity.clone(),
            holder,
        )
    }
}
