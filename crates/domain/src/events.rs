use chrono::{DateTime, Utc};

use crate::ids::{GameId, PlayerId};

/// Events emitted by core components when shared state changes. The core
/// does not deliver these anywhere; it only defines the shape that the
/// out-of-scope notification/export collaborators (`spec.md` §1) would
/// subscribe to via [`EventSink`].
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    PlayerEliminated {
        game_id: GameId,
        victim_id: PlayerId,
        killer_id: PlayerId,
        at: DateTime<Utc>,
    },
    GameCompleted {
        game_id: GameId,
        winner_id: Option<PlayerId>,
        at: DateTime<Utc>,
    },
    ZoneAdvanced {
        game_id: GameId,
        stage_index: usize,
        radius_meters: f64,
        at: DateTime<Utc>,
    },
    ProximityAlert {
        game_id: GameId,
        hunter_id: PlayerId,
        target_id: PlayerId,
        band_meters: f64,
        distance_meters: f64,
    },
    AntiCheatFlag {
        game_id: GameId,
        player_id: PlayerId,
        severity: u8,
        violation: String,
    },
    EmergencyPauseToggled {
        game_id: GameId,
        active: bool,
        reason: Option<String>,
    },
}

/// Sink for [`DomainEvent`]s. `assassin-server`'s composition root supplies
/// an implementation (or a no-op one in tests); components only depend on
/// this trait, never on a concrete transport.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: DomainEvent);
}

/// An `EventSink` that discards everything, for tests and minimal wiring.
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&self, _event: DomainEvent) {}
}
