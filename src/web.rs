//! Axum-based HTTP surface for the kiosk browser UI
//!
//! The UI renders [`PumpSnapshot`]s streamed from `/api/events` and sends
//! taps and key presses back as commands. Event endpoints answer `202`
//! whether or not the state machine accepts the event.

use crate::error::{ForecourtError, Result};
use crate::kiosk::{Key, KioskCommand, KioskHandle};
use crate::machine::PumpSnapshot;
use axum::response::Redirect;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, get_service, post},
};
use serde::Deserialize;
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::WatchStream;
use tower_http::services::ServeDir;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

mod logs;

pub use logs::logs_stream;

#[derive(Clone)]
pub struct AppState {
    pub kiosk: KioskHandle,
}

#[derive(Debug, Deserialize)]
pub struct KeyBody {
    pub key: String,
}

pub(crate) async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub(crate) async fn status(State(state): State<AppState>) -> Json<PumpSnapshot> {
    Json((*state.kiosk.snapshot()).clone())
}

pub(crate) async fn events(State(state): State<AppState>) -> impl IntoResponse {
    let stream = WatchStream::new(state.kiosk.subscribe()).filter_map(|snapshot| {
        serde_json::to_string(&*snapshot).ok().map(|payload| {
            Ok::<Event, std::convert::Infallible>(Event::default().event("status").data(payload))
        })
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn dispatch(state: &AppState, cmd: KioskCommand) -> (StatusCode, Json<serde_json::Value>) {
    if state.kiosk.send(cmd) {
        (StatusCode::ACCEPTED, Json(serde_json::json!({"ok": true})))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"ok": false, "error": "kiosk stopped"})),
        )
    }
}

pub(crate) async fn pay(State(state): State<AppState>) -> impl IntoResponse {
    dispatch(&state, KioskCommand::Pay)
}

pub(crate) async fn cancel(State(state): State<AppState>) -> impl IntoResponse {
    dispatch(&state, KioskCommand::Cancel)
}

pub(crate) async fn reset(State(state): State<AppState>) -> impl IntoResponse {
    dispatch(&state, KioskCommand::Reset)
}

pub(crate) async fn exit(State(state): State<AppState>) -> impl IntoResponse {
    dispatch(&state, KioskCommand::Exit)
}

pub(crate) async fn key(
    State(state): State<AppState>,
    Json(body): Json<KeyBody>,
) -> impl IntoResponse {
    match body.key.parse::<Key>() {
        Ok(key) => dispatch(&state, KioskCommand::Key(key)),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"ok": false, "error": e})),
        ),
    }
}

pub(crate) async fn get_config(State(state): State<AppState>) -> impl IntoResponse {
    let json = serde_json::to_value(state.kiosk.config())
        .unwrap_or(serde_json::json!({"error":"serialization"}));
    Json(json)
}

pub fn build_router(state: AppState) -> Router {
    let static_dir = state.kiosk.config().web.static_dir.clone();

    Router::new()
        .route("/", get(|| async { Redirect::to("/ui/index.html") }))
        .route("/api/health", get(health))
        .route("/api/status", get(status))
        .route("/api/events", get(events))
        .route("/api/pay", post(pay))
        .route("/api/cancel", post(cancel))
        .route("/api/reset", post(reset))
        .route("/api/exit", post(exit))
        .route("/api/key", post(key))
        .route("/api/config", get(get_config))
        .merge(logs::routes())
        .nest_service(
            "/ui",
            get_service(ServeDir::new(static_dir).append_index_html_on_directories(true))
                .handle_error(|_| async { StatusCode::INTERNAL_SERVER_ERROR }),
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Serve the API until `shutdown` resolves
pub async fn serve<F>(kiosk: KioskHandle, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (host, port) = {
        let web = &kiosk.config().web;
        (web.host.clone(), web.port)
    };
    let router = build_router(AppState { kiosk });

    let logger = crate::logging::get_logger("web");
    logger.info(&format!(
        "Starting web server; requested host={}, port={}",
        host, port
    ));

    let addr = match host.parse::<IpAddr>() {
        Ok(ip) => SocketAddr::new(ip, port),
        Err(_) => {
            logger.warn(&format!("Invalid host '{}'; falling back to 127.0.0.1", host));
            ([127, 0, 0, 1], port).into()
        }
    };

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ForecourtError::web(format!("Failed to bind {}: {}", addr, e)))?;
    let local_addr = listener.local_addr()?;
    logger.info(&format!(
        "Web server listening at http://{}:{} (UI /ui, API /api)",
        local_addr.ip(),
        local_addr.port()
    ));

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ForecourtError::web(format!("Server stopped with error: {}", e)))
}
