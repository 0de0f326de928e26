use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    Json, Router,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct TailParams {
    pub lines: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct LevelBody {
    pub level: String,
}

/// Last `lines` lines of the newest log file
pub async fn logs_tail(
    State(state): State<AppState>,
    Query(params): Query<TailParams>,
) -> impl IntoResponse {
    let configured_path = state.kiosk.config().logging.file.clone();
    let max_lines = params.lines.unwrap_or(200).min(10_000);
    let Some(path) = resolve_log_file_path(&configured_path).await else {
        return (StatusCode::NOT_FOUND, "Log file not available").into_response();
    };
    match fs::read_to_string(&path).await {
        Ok(contents) => {
            let mut lines: Vec<&str> = contents.lines().collect();
            if lines.len() > max_lines {
                lines = lines.split_off(lines.len() - max_lines);
            }
            let mut resp = Response::new(lines.join("\n").into());
            resp.headers_mut().insert(
                header::CONTENT_TYPE,
                header::HeaderValue::from_static("text/plain; charset=utf-8"),
            );
            resp
        }
        Err(_) => (StatusCode::NOT_FOUND, "Log file not available").into_response(),
    }
}

/// Live log lines as SSE `log` events, filtered by the web stream level
pub async fn logs_stream() -> impl IntoResponse {
    let rx = crate::logging::subscribe_log_lines();
    let stream = BroadcastStream::new(rx).filter_map(|res| match res {
        Ok(line) if crate::logging::should_emit_to_web(&line) => {
            Some(Ok::<Event, std::convert::Infallible>(
                Event::default().event("log").data(line),
            ))
        }
        _ => None,
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn set_web_log_level(Json(body): Json<LevelBody>) -> impl IntoResponse {
    match crate::logging::set_web_log_level_str(&body.level) {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "ok": true,
                "level": crate::logging::level_name(crate::logging::get_web_log_level()),
            })),
        ),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"ok": false, "error": e.to_string()})),
        ),
    }
}

async fn get_web_log_level() -> impl IntoResponse {
    let lvl = crate::logging::get_web_log_level();
    Json(serde_json::json!({"level": crate::logging::level_name(lvl)}))
}

/// Rolled files are named `<prefix>.<date>.<suffix>`, see [`crate::logging::log_file_parts`]
fn name_matches(file_name: &str, prefix: &str, suffix: &str) -> bool {
    file_name == format!("{}.{}", prefix, suffix)
        || (file_name.starts_with(&format!("{}.", prefix))
            && file_name.ends_with(&format!(".{}", suffix)))
}

async fn find_latest_matching(dir: &Path, prefix: &str, suffix: &str) -> Option<PathBuf> {
    let mut best: Option<(SystemTime, PathBuf)> = None;
    let mut rd = fs::read_dir(dir).await.ok()?;
    while let Ok(Some(entry)) = rd.next_entry().await {
        if let Some(name) = entry.file_name().to_str()
            && name_matches(name, prefix, suffix)
            && let Ok(md) = entry.metadata().await
            && md.is_file()
            && let Ok(modified) = md.modified()
            && best.as_ref().is_none_or(|(t, _)| modified > *t)
        {
            best = Some((modified, entry.path()));
        }
    }
    best.map(|(_, p)| p)
}

/// The configured file if it exists, otherwise the newest rotated file
async fn resolve_log_file_path(configured_path: &str) -> Option<PathBuf> {
    let configured = Path::new(configured_path);
    if let Ok(md) = fs::metadata(configured).await
        && md.is_file()
    {
        return Some(configured.to_path_buf());
    }
    let (dir, prefix, suffix) = crate::logging::log_file_parts(configured);
    find_latest_matching(&dir, &prefix, &suffix).await
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/logs/tail", get(logs_tail))
        .route("/api/logs/stream", get(logs_stream))
        .route(
            "/api/logs/level",
            post(set_web_log_level).get(get_web_log_level),
        )
}
