use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use assassin_domain::{DomainEvent, EventSink};
use assassin_server::{routes, AppState};

/// Forwards domain events to structured logs. A real deployment would swap
/// this for a queue/webhook publisher; the core only depends on the
/// `EventSink` trait, never on this type.
struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: DomainEvent) {
        match event {
            DomainEvent::PlayerEliminated { game_id, victim_id, killer_id, .. } => {
                info!(%game_id, %victim_id, %killer_id, "player eliminated");
            }
            DomainEvent::GameCompleted { game_id, winner_id, .. } => {
                info!(%game_id, ?winner_id, "game completed");
            }
            DomainEvent::ZoneAdvanced { game_id, stage_index, radius_meters, .. } => {
                info!(%game_id, stage_index, radius_meters, "zone advanced");
            }
            DomainEvent::ProximityAlert { game_id, hunter_id, target_id, band_meters, distance_meters } => {
                info!(%game_id, %hunter_id, %target_id, band_meters, distance_meters, "proximity alert");
            }
            DomainEvent::AntiCheatFlag { game_id, player_id, severity, violation } => {
                info!(%game_id, %player_id, severity, %violation, "anti-cheat flag");
            }
            DomainEvent::EmergencyPauseToggled { game_id, active, reason } => {
                info!(%game_id, active, ?reason, "emergency pause toggled");
            }
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "assassin_server=info,tower_http=info".into()),
        )
        .init();

    let state = AppState::new(Arc::new(TracingEventSink));

    let scheduler = state.scheduler(hostname());
    let tick_interval = Duration::from_secs(assassin_domain::GameSettings::default().scheduler_tick_sec);
    std::thread::spawn(move || scheduler.run_forever(tick_interval));

    let app = routes::router(state).layer(
        tower::ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    let port: u16 = std::env::var("PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| {
            eprintln!("failed to bind {addr}: {e}");
            std::process::exit(1);
        });
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("shutdown");
        })
        .await
        .unwrap_or_else(|e| {
            eprintln!("server error: {e}");
            std::process::exit(1);
        });
}

fn hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "assassin-server".into())
}
