//! Request-context extraction (`SPEC_FULL.md` §6): each handler that needs
//! to know who is calling pulls a [`RequesterId`] out of the request rather
//! than trusting a client-supplied body field or the entity it's about to
//! act on. The header read here stands in for the upstream auth collaborator
//! (gateway/session service) `spec.md` §1 places outside this core's scope;
//! a real deployment replaces this extractor's body with one that verifies a
//! session token, without touching any handler that uses it.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;

use assassin_domain::PlayerId;

const REQUESTER_HEADER: &str = "x-player-id";

pub struct RequesterId(pub PlayerId);

impl<S> FromRequestParts<S> for RequesterId
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(REQUESTER_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(|v| RequesterId(PlayerId::new(v)))
            .ok_or((StatusCode::UNAUTHORIZED, "missing X-Player-Id header"))
    }
}
