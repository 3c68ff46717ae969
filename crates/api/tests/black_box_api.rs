use reqwest::StatusCode;
use serde_json::json;

use boxoffice_api::config::ApiConfig;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, in-memory stores, bound to an ephemeral port.
        let config = ApiConfig {
            bind_addr: "127.0.0.1:0".into(),
            hold_ttl: chrono::Duration::seconds(300),
            sweep_interval: std::time::Duration::from_millis(50),
            gateway_timeout: std::time::Duration::from_secs(5),
            use_persistent_stores: false,
        };
        let app = boxoffice_api::app::build_app(config).await;
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn create_event(client: &reqwest::Client, base_url: &str, capacity: u32) -> serde_json::Value {
    let res = client
        .post(format!("{base_url}/events"))
        .json(&json!({
            "name": "Midnight Carnival",
            "venue": "Pier 9",
            "organiser": uuid::Uuid::now_v7(),
            "tiers": [
                { "name": "ga", "price": 4500, "capacity": capacity },
                { "name": "vip", "price": 12000, "capacity": 10 },
            ],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    res.json().await.unwrap()
}

#[tokio::test]
async fn health_reports_ok_and_sweeper_stats() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/health", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert!(body["expiry_worker"]["sweeps"].is_number());
}

#[tokio::test]
async fn purchase_flow_issues_a_ticket_and_updates_inventory() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let event = create_event(&client, &srv.base_url, 100).await;
    let event_id = event["id"].as_str().unwrap();
    let user_id = uuid::Uuid::now_v7().to_string();

    let res = client
        .post(format!("{}/purchase", srv.base_url))
        .json(&json!({
            "user_id": user_id,
            "event_id": event_id,
            "tier": "ga",
            "quantity": 3,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let receipt: serde_json::Value = res.json().await.unwrap();
    assert_eq!(receipt["ticket"]["quantity"], 3);
    assert_eq!(receipt["payment"]["amount"], 13500);
    assert_eq!(receipt["payment"]["status"], "succeeded");

    // The reservation settles as confirmed.
    let reservation_id = receipt["reservation_id"].as_str().unwrap();
    let res = client
        .get(format!("{}/reservations/{}", srv.base_url, reservation_id))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let reservation: serde_json::Value = res.json().await.unwrap();
    assert_eq!(reservation["status"], "confirmed");

    // Counters reflect the sale.
    let res = client
        .get(format!(
            "{}/events/{}/inventory/ga",
            srv.base_url, event_id
        ))
        .send()
        .await
        .unwrap();
    let counters: serde_json::Value = res.json().await.unwrap();
    assert_eq!(counters["available"], 97);
    assert_eq!(counters["purchased"], 3);
    assert_eq!(counters["reserved"], 0);

    // The whole-event inventory view keys counters by tier name.
    let res = client
        .get(format!("{}/events/{}/inventory", srv.base_url, event_id))
        .send()
        .await
        .unwrap();
    let inventory: serde_json::Value = res.json().await.unwrap();
    assert_eq!(inventory["ga"]["purchased"], 3);
    assert_eq!(inventory["vip"]["available"], 10);

    // The ticket shows up under the buyer.
    let res = client
        .get(format!("{}/users/{}/tickets", srv.base_url, user_id))
        .send()
        .await
        .unwrap();
    let tickets: serde_json::Value = res.json().await.unwrap();
    assert_eq!(tickets.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn oversubscribed_purchase_is_rejected_with_conflict() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let event = create_event(&client, &srv.base_url, 2).await;

    let res = client
        .post(format!("{}/purchase", srv.base_url))
        .json(&json!({
            "user_id": uuid::Uuid::now_v7(),
            "event_id": event["id"],
            "tier": "ga",
            "quantity": 5,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "insufficient_inventory");
}

#[tokio::test]
async fn unknown_event_and_tier_return_not_found() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let event = create_event(&client, &srv.base_url, 10).await;

    let res = client
        .post(format!("{}/purchase", srv.base_url))
        .json(&json!({
            "user_id": uuid::Uuid::now_v7(),
            "event_id": uuid::Uuid::now_v7(),
            "tier": "ga",
            "quantity": 1,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .post(format!("{}/purchase", srv.base_url))
        .json(&json!({
            "user_id": uuid::Uuid::now_v7(),
            "event_id": event["id"],
            "tier": "balcony",
            "quantity": 1,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_ids_are_rejected() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/reservations/not-a-uuid", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_id");
}

#[tokio::test]
async fn refund_restores_inventory() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let event = create_event(&client, &srv.base_url, 10).await;
    let event_id = event["id"].as_str().unwrap();

    let res = client
        .post(format!("{}/purchase", srv.base_url))
        .json(&json!({
            "user_id": uuid::Uuid::now_v7(),
            "event_id": event_id,
            "tier": "vip",
            "quantity": 2,
        }))
        .send()
        .await
        .unwrap();
    let receipt: serde_json::Value = res.json().await.unwrap();
    let ticket_id = receipt["ticket"]["id"].as_str().unwrap();

    let res = client
        .post(format!("{}/tickets/{}/refund", srv.base_url, ticket_id))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let payment: serde_json::Value = res.json().await.unwrap();
    assert_eq!(payment["status"], "refunded");

    let res = client
        .get(format!(
            "{}/events/{}/inventory/vip",
            srv.base_url, event_id
        ))
        .send()
        .await
        .unwrap();
    let counters: serde_json::Value = res.json().await.unwrap();
    assert_eq!(counters["available"], 10);
    assert_eq!(counters["purchased"], 0);

    // Refunding twice is a conflict.
    let res = client
        .post(format!("{}/tickets/{}/refund", srv.base_url, ticket_id))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn reconcile_of_a_settled_purchase_reports_already_settled() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let event = create_event(&client, &srv.base_url, 10).await;

    let res = client
        .post(format!("{}/purchase", srv.base_url))
        .json(&json!({
            "user_id": uuid::Uuid::now_v7(),
            "event_id": event["id"],
            "tier": "ga",
            "quantity": 1,
        }))
        .send()
        .await
        .unwrap();
    let receipt: serde_json::Value = res.json().await.unwrap();
    let reservation_id = receipt["reservation_id"].as_str().unwrap();

    let res = client
        .post(format!(
            "{}/reservations/{}/reconcile",
            srv.base_url, reservation_id
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["outcome"], "already_settled");
}

#[tokio::test]
async fn cancelling_someone_elses_hold_is_forbidden() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    create_event(&client, &srv.base_url, 10).await;

    let res = client
        .post(format!(
            "{}/reservations/{}/cancel",
            srv.base_url,
            uuid::Uuid::now_v7()
        ))
        .json(&json!({ "user_id": uuid::Uuid::now_v7() }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}
