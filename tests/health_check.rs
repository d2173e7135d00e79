use actix_web::{test, web, App};
use chat_relay::registry::handlers::channel_connections;
use chat_relay::{health_check, AppState, MemoryConnectionStore, Settings};
use chrono::DateTime;
use std::sync::Arc;

fn test_state() -> AppState {
    let config = Settings::new_for_test().expect("Failed to load test config");
    AppState::with_store(config, Arc::new(MemoryConnectionStore::new()))
}

#[actix_web::test]
async fn test_health_check() {
    let state = web::Data::new(test_state());

    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .route("/health", web::get().to(health_check))
    ).await;

    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body = test::read_body(resp).await;
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(json["status"], "healthy");
    assert_eq!(json["local_connections"], 0);
    assert!(DateTime::parse_from_rfc3339(
        json["timestamp"].as_str().unwrap()
    ).is_ok());
}

#[actix_web::test]
async fn test_channel_connections() {
    let state = test_state();
    state.relay.on_connect("c1", Some("general")).await.unwrap();
    state.relay.on_connect("c2", Some("general")).await.unwrap();
    state.relay.on_connect("c3", Some("random")).await.unwrap();

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state.clone()))
            .route("/channels/{channel}/connections", web::get().to(channel_connections))
    ).await;

    let req = test::TestRequest::get().uri("/channels/general/connections").to_request();
    let json: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(json["channel"], "general");
    let mut ids: Vec<String> = serde_json::from_value(json["connections"].clone()).unwrap();
    ids.sort();
    assert_eq!(ids, vec!["c1".to_string(), "c2".to_string()]);

    let req = test::TestRequest::get().uri("/channels/empty/connections").to_request();
    let json: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(json["connections"], serde_json::json!([]));
}
