use chrono::{DateTime, Utc};

/// Per-game scheduler lease, enforced in the Store so only one worker runs a
/// tick for a given game at a time (`spec.md` §5).
#[derive(Debug, Clone)]
pub struct Lease {
    pub holder: String,
    pub expires_at: DateTime<Utc>,
}
