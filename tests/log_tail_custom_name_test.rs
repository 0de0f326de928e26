use axum::body::Body;
use axum::http::{Request, StatusCode};
use forecourt::card::NoReader;
use forecourt::config::Config;
use forecourt::input::TriggerSetup;
use forecourt::kiosk::Kiosk;
use forecourt::web::{AppState, build_router};
use http_body_util::BodyExt as _;
use std::time::Duration;
use tower::ServiceExt;

#[tokio::test]
async fn tail_reads_rolled_file_with_custom_name() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.logging.file = tmp_dir.path().join("pump.log").to_string_lossy().to_string();
    config.logging.console_output = false;

    forecourt::logging::init_logging(&config.logging).unwrap();
    forecourt::logging::get_logger("tail_test").info("custom_name_line_42");

    let names: Vec<String> = std::fs::read_dir(tmp_dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    assert!(
        names.iter().all(|n| n.starts_with("pump.") && n.ends_with(".log")),
        "unexpected log files: {:?}",
        names
    );

    let kiosk = Kiosk::new(
        config,
        TriggerSetup::keyboard(Duration::from_millis(150)),
        Box::new(NoReader),
    );
    let router = build_router(AppState {
        kiosk: kiosk.handle(),
    });

    // The file writer flushes from its own thread
    let mut body = String::new();
    for _ in 0..50 {
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/logs/tail?lines=50")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        body = String::from_utf8_lossy(&bytes).to_string();
        if body.contains("custom_name_line_42") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(body.contains("custom_name_line_42"), "tail body: {}", body);
}
