#![cfg(test)]

use super::web::*;
use crate::card::NoReader;
use crate::config::Config;
use crate::input::TriggerSetup;
use crate::kiosk::Kiosk;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt as _;
use std::time::Duration;
use tower::ServiceExt;

fn test_kiosk() -> Kiosk {
    Kiosk::new(
        Config::default(),
        TriggerSetup::keyboard(Duration::from_millis(150)),
        Box::new(NoReader),
    )
}

fn router_for(kiosk: &Kiosk) -> axum::Router {
    build_router(AppState {
        kiosk: kiosk.handle(),
    })
}

fn get_req(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, json: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_ok() {
    let kiosk = test_kiosk();
    let response = router_for(&kiosk).oneshot(get_req("/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn status_returns_snapshot() {
    let kiosk = test_kiosk();
    let response = router_for(&kiosk).oneshot(get_req("/api/status")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["state"], "Idle");
    assert_eq!(json["input_mode"], "keyboard");
    assert_eq!(json["pay_enabled"], false);
    assert_eq!(json["litres_display"]["text"], "000.00");
}

#[tokio::test]
async fn event_endpoints_accept_commands() {
    let kiosk = test_kiosk();
    for uri in ["/api/pay", "/api/cancel", "/api/reset", "/api/exit"] {
        let response = router_for(&kiosk).oneshot(post_empty(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED, "{}", uri);
    }
}

#[tokio::test]
async fn key_endpoint_validates_key_names() {
    let kiosk = test_kiosk();
    let ok = router_for(&kiosk)
        .oneshot(post_json("/api/key", r#"{"key":"space"}"#))
        .await
        .unwrap();
    assert_eq!(ok.status(), StatusCode::ACCEPTED);

    let bad = router_for(&kiosk)
        .oneshot(post_json("/api/key", r#"{"key":"enter"}"#))
        .await
        .unwrap();
    assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
    let json = body_json(bad).await;
    assert_eq!(json["ok"], false);
}

#[tokio::test]
async fn commands_after_stop_are_unavailable() {
    let kiosk = test_kiosk();
    let router = router_for(&kiosk);
    drop(kiosk);
    let response = router.oneshot(post_empty("/api/pay")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn config_is_exposed() {
    let kiosk = test_kiosk();
    let response = router_for(&kiosk).oneshot(get_req("/api/config")).await.unwrap();
    let json = body_json(response).await;
    assert_eq!(json["gpio"]["button_pin"], 17);
    assert_eq!(json["pump"]["currency_symbol"], "£");
}

#[tokio::test]
async fn events_stream_starts_with_status() {
    let kiosk = test_kiosk();
    let response = router_for(&kiosk).oneshot(get_req("/api/events")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let ct = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");
    assert!(ct.contains("text/event-stream"));

    let mut body = response.into_body();
    let frame = tokio::time::timeout(Duration::from_secs(2), body.frame())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let data = String::from_utf8_lossy(frame.data_ref().unwrap()).to_string();
    assert!(data.contains("event: status"));
    assert!(data.contains("\"state\":\"Idle\""));
}

#[tokio::test]
async fn web_log_level_round_trip() {
    let kiosk = test_kiosk();
    let ok = router_for(&kiosk)
        .oneshot(post_json("/api/logs/level", r#"{"level":"warning"}"#))
        .await
        .unwrap();
    assert_eq!(ok.status(), StatusCode::OK);
    assert_eq!(body_json(ok).await["level"], "WARN");

    let bad = router_for(&kiosk)
        .oneshot(post_json("/api/logs/level", r#"{"level":"loud"}"#))
        .await
        .unwrap();
    assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

    crate::logging::set_web_log_level(tracing::Level::INFO);
}

#[tokio::test]
async fn serve_reports_bind_failure_as_web_error() {
    let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let mut config = Config::default();
    config.web.port = taken.local_addr().unwrap().port();
    let kiosk = Kiosk::new(
        config,
        TriggerSetup::keyboard(Duration::from_millis(150)),
        Box::new(NoReader),
    );

    let result = serve(kiosk.handle(), std::future::pending()).await;
    assert!(matches!(
        result,
        Err(crate::error::ForecourtError::Web { .. })
    ));
}
