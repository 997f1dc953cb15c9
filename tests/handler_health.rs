mod common;

use axum::http::StatusCode;
use axum_test::TestServer;
use url_shortener::api::routes::routes;

fn make_server(app: &common::TestApp) -> TestServer {
    TestServer::new(routes().with_state(app.state.clone())).unwrap()
}

#[tokio::test]
async fn test_health_endpoint_success() {
    let app = common::test_app();
    let server = make_server(&app);

    let response = server.get("/health").await;

    response.assert_status_ok();

    let json = response.json::<serde_json::Value>();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["checks"]["database"]["status"], "ok");
    assert_eq!(json["checks"]["cache"]["status"], "ok");
    assert_eq!(json["checks"]["event_channel"]["status"], "ok");
}

#[tokio::test]
async fn test_health_endpoint_structure() {
    let app = common::test_app();
    let server = make_server(&app);

    let json = server.get("/health").await.json::<serde_json::Value>();

    assert!(json.get("status").is_some());
    assert!(json.get("version").is_some());
    assert!(json["checks"].get("database").is_some());
    assert!(json["checks"].get("cache").is_some());
    assert!(json["checks"].get("event_channel").is_some());
}

#[tokio::test]
async fn test_health_degraded_when_database_is_down() {
    let app = common::test_app();
    app.repository.set_down(true);
    let server = make_server(&app);

    let response = server.get("/health").await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);

    let json = response.json::<serde_json::Value>();
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["checks"]["database"]["status"], "error");
}

#[tokio::test]
async fn test_health_degraded_when_channel_circuit_is_open() {
    let app = common::test_app();
    for _ in 0..3 {
        app.breaker.try_acquire().unwrap().failed();
    }
    let server = make_server(&app);

    let response = server.get("/health").await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);

    let json = response.json::<serde_json::Value>();
    assert_eq!(json["checks"]["event_channel"]["status"], "error");
    assert_eq!(json["checks"]["database"]["status"], "ok");
}

#[tokio::test(start_paused = true)]
async fn test_health_recovers_once_channel_cooldown_elapses() {
    let app = common::test_app();
    for _ in 0..3 {
        app.breaker.try_acquire().unwrap().failed();
    }
    tokio::time::advance(std::time::Duration::from_secs(30)).await;
    let server = make_server(&app);

    let response = server.get("/health").await;

    response.assert_status_ok();

    let json = response.json::<serde_json::Value>();
    assert_eq!(json["checks"]["event_channel"]["status"], "ok");
    assert_eq!(json["checks"]["event_channel"]["message"], "Circuit half_open");
}
