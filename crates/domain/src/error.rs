use thiserror::Error;

/// The full taxonomy from `spec.md` §7. Every leaf component returns one of
/// these (or a narrower local error that converts into one); the HTTP
/// adapter in `assassin-server` is the only place that maps a variant to a
/// status code.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("game state conflict: {0}")]
    GameState(String),

    #[error("optimistic concurrency conflict: {0}")]
    Conflict(String),

    #[error("anti-cheat rejection: {reason}")]
    AntiCheatReject { reason: String, severity: u8 },

    #[error("kill rejected: {reason_code}")]
    KillRejected { reason_code: KillRejectReason },

    #[error("persistence error (retriable): {0}")]
    Persistence(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Machine-readable reasons a kill attempt is rejected, per `spec.md` §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillRejectReason {
    SafeZone,
    OutOfRange,
    TargetMismatch,
    StaleLocation,
    EmergencyPaused,
}

impl KillRejectReason {
    pub fn code(self) -> &'static str {
        match self {
            KillRejectReason::SafeZone => "SAFE_ZONE",
            KillRejectReason::OutOfRange => "OUT_OF_RANGE",
            KillRejectReason::TargetMismatch => "TARGET_MISMATCH",
            KillRejectReason::StaleLocation => "STALE_LOCATION",
            KillRejectReason::EmergencyPaused => "EMERGENCY_PAUSED",
        }
    }
}

impl std::fmt::Display for KillRejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl CoreError {
    /// Machine-readable error code, stable across the HTTP boundary.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Validation(_) => "VALIDATION_ERROR",
            CoreError::Unauthorized(_) => "UNAUTHORIZED",
            CoreError::NotFound(_) => "NOT_FOUND",
            CoreError::GameState(_) => "GAME_STATE_ERROR",
            CoreError::Conflict(_) => "CONFLICT",
            CoreError::AntiCheatReject { .. } => "ANTI_CHEAT_REJECT",
            CoreError::KillRejected { reason_code } => reason_code.code(),
            CoreError::Persistence(_) => "PERSISTENCE_ERROR",
            CoreError::Internal(_) => "INTERNAL",
        }
    }

    /// Whether a caller may retry the operation unchanged. `Conflict` is
    /// retriable because it signals a losing compare-and-set, not a
    /// permanent rejection: the caller is expected to re-read and retry.
    pub fn is_retriable(&self) -> bool {
        matches!(self, CoreError::Persistence(_) | CoreError::Conflict(_))
    }
}

impl From<assassin_geometry::GeometryError> for CoreError {
    fn from(e: assassin_geometry::GeometryError) -> Self {
        CoreError::Validation(e.to_string())
    }
}
