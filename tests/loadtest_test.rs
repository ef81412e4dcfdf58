//! Load-test setup against the in-process fake backend.
//!
//! Run with: `cargo test --test loadtest_test`
mod common;

use common::spawn_backend;
use portfolio_client::loadtest::{LoadTest, LoadTestConfig, LoadTestError, Scenario, ScenarioKind};

fn config_for(server: &common::TestServer) -> LoadTestConfig {
    LoadTestConfig {
        base_url: server.url(""),
        auth_url: server.url(""),
        email: "alice@example.com".to_string(),
        password: "secret".to_string(),
        ..LoadTestConfig::default()
    }
}

#[actix_web::test]
async fn healthy_backend_passes_setup_with_token() {
    let server = spawn_backend().await;
    let test = LoadTest::new(config_for(&server), Scenario::soak());

    assert!(test.health_check().await);
    let token = test.setup().await.unwrap();
    assert!(token.is_some_and(|t| !t.is_empty()));

    server.stop().await;
}

#[actix_web::test]
async fn soak_aborts_when_login_is_refused() {
    let server = spawn_backend().await;
    let config = LoadTestConfig {
        password: "wrong".to_string(),
        ..config_for(&server)
    };
    let test = LoadTest::new(config, Scenario::soak());

    let err = test.setup().await.unwrap_err();
    assert!(matches!(err, LoadTestError::AuthRequired(ScenarioKind::Soak)));
    assert_eq!(err.to_string(), "Authentication failed - aborting soak test");

    server.stop().await;
}

#[actix_web::test]
async fn load_runs_without_token_when_auth_is_skipped() {
    let server = spawn_backend().await;
    let config = LoadTestConfig {
        skip_auth: true,
        ..config_for(&server)
    };
    let test = LoadTest::new(config, Scenario::load());

    assert!(matches!(test.setup().await, Ok(None)));

    server.stop().await;
}
