//! `send_notification` reads the process environment once.
//!
//! Kept in its own test binary because the dispatcher is process-wide.

use herald_core::ChannelKind;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn send_notification_uses_environment() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/legacy-hook"))
        .and(body_json(json!({ "content": "Job on worker-7 done" })))
        .respond_with(ResponseTemplate::new(204))
        .expect(2)
        .mount(&server)
        .await;

    std::env::set_var("DISCORD_WEBHOOK_URL", format!("{}/legacy-hook", server.uri()));
    std::env::set_var("HERALD_TEST_WORKER", "worker-7");

    let results = herald_notify::send_notification("Job on {{HERALD_TEST_WORKER}} done").await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].channel, ChannelKind::Discord);
    assert!(results[0].success, "error: {:?}", results[0].error);

    // Later environment changes are not picked up.
    std::env::set_var("HERALD_TEST_WORKER", "worker-9");
    std::env::remove_var("DISCORD_WEBHOOK_URL");
    let results = herald_notify::send_notification("Job on {{HERALD_TEST_WORKER}} done").await;
    assert_eq!(results.len(), 1);
    assert!(results[0].success, "error: {:?}", results[0].error);
}
