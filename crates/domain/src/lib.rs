//! Shared entity, error, and event types for the assassin game server core.
//!
//! Every other crate in the workspace depends on this one for the data
//! model (`spec.md` §3) and the error taxonomy (`spec.md` §7) so that two
//! components never define two incompatible shapes for the same entity.

pub mod assignment;
pub mod error;
pub mod events;
pub mod game;
pub mod ids;
pub mod kill;
pub mod player;
pub mod safezone;
pub mod settings;
pub mod zone_state;

pub use assignment::{AssignmentStatus, TargetAssignment};
pub use error::{CoreError, KillRejectReason};
pub use events::{DomainEvent, EventSink, NullEventSink};
pub use game::{EmergencyPause, Game, GameStatus};
pub use ids::{AssignmentId, GameId, MapId, PlayerId, SafeZoneId};
pub use kill::{Kill, KillKey, VerificationData, VerificationMethod, VerificationStatus};
pub use player::{LocationPrecision, LocationVisibility, Player, PlayerStatus};
pub use safezone::{SafeZone, SafeZoneType};
pub use settings::{GameSettings, NewCenterPolicy, ShrinkingZoneConfig, ZoneStageConfig};
pub use zone_state::{GameZoneState, ZonePhase};
