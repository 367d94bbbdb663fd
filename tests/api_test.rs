use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use karcis::adapters::{memory_stores, MemoryImageStore, MemoryStore};
use karcis::domain::{Event, Promotion, User};
use karcis::services::{EventService, PromotionService, TransactionService};
use karcis::{create_app, AppState};

fn test_app() -> (Router, Arc<MemoryStore>) {
    let (stores, store) = memory_stores();
    let transactions = Arc::new(TransactionService::new(
        stores.clone(),
        Arc::new(MemoryImageStore::new()),
        Duration::hours(2),
        Duration::days(3),
    ));
    let events = Arc::new(EventService::new(stores.clone()));
    let promotions = Arc::new(PromotionService::new(stores));

    let state = AppState {
        transactions,
        events,
        promotions,
        db: None,
        scheduler: None,
        log_request_body: false,
    };
    (create_app(state), store)
}

async fn seed_user(store: &MemoryStore, email: &str, points: i64) -> Uuid {
    let user = User::new("Putri Ayu", email, points);
    let id = user.id;
    store.insert_user(user).await;
    id
}

async fn seed_event(store: &MemoryStore, price: i64, seats: i32) -> Uuid {
    let now = Utc::now();
    let event = Event::new(
        "Bali Arts Festival",
        Uuid::new_v4(),
        price,
        seats,
        now + Duration::days(7),
        now + Duration::days(8),
    );
    let id = event.id;
    store.insert_event(event).await;
    id
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn create_transaction(app: &Router, user_id: Uuid, event_id: Uuid) -> Value {
    let response = app
        .clone()
        .oneshot(post(
            "/transactions",
            json!({ "user_id": user_id, "event_id": event_id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

#[tokio::test]
async fn test_health_reports_memory_backend() {
    let (app, _store) = test_app();

    let response = app.oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["backend"], "memory");
    assert_eq!(body["db"], "connected");
    assert!(body["jobs"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_create_transaction_returns_created() {
    let (app, store) = test_app();
    let user_id = seed_user(&store, "putri@example.com", 20_000).await;
    let event_id = seed_event(&store, 250_000, 100).await;

    let response = app
        .oneshot(post(
            "/transactions",
            json!({
                "user_id": user_id,
                "event_id": event_id,
                "quantity": 2,
                "points_used": 10_000,
                "payment_method": "bank_transfer"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["status"], "WAITING_PAYMENT");
    assert_eq!(body["total_amount"], 500_000);
    assert_eq!(body["points_used"], 10_000);
    assert_eq!(body["final_amount"], 490_000);
    assert_eq!(body["can_cancel"], true);
    assert_eq!(body["can_upload_payment"], true);
    assert_eq!(body["is_expired"], false);
    assert_eq!(store.event_seats(event_id).await, Some(98));
}

#[tokio::test]
async fn test_create_rejects_insufficient_seats() {
    let (app, store) = test_app();
    let user_id = seed_user(&store, "putri@example.com", 0).await;
    let event_id = seed_event(&store, 100_000, 1).await;

    let response = app
        .oneshot(post(
            "/transactions",
            json!({ "user_id": user_id, "event_id": event_id, "quantity": 3 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["code"], "INSUFFICIENT_SEATS");
}

#[tokio::test]
async fn test_duplicate_registration_conflict() {
    let (app, store) = test_app();
    let user_id = seed_user(&store, "putri@example.com", 0).await;
    let event_id = seed_event(&store, 100_000, 10).await;

    create_transaction(&app, user_id, event_id).await;
    let response = app
        .oneshot(post(
            "/transactions",
            json!({ "user_id": user_id, "event_id": event_id }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["code"], "ALREADY_REGISTERED");
}

#[tokio::test]
async fn test_get_unknown_transaction_not_found() {
    let (app, _store) = test_app();

    let response = app
        .oneshot(get(&format!("/transactions/{}", Uuid::new_v4())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_payment_flow_end_to_end() {
    let (app, store) = test_app();
    let user_id = seed_user(&store, "putri@example.com", 0).await;
    let event_id = seed_event(&store, 100_000, 10).await;

    let created = create_transaction(&app, user_id, event_id).await;
    let id = created["id"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(post(
            &format!("/transactions/{}/payment-proof", id),
            json!({
                "user_id": user_id,
                "payment_proof": "data:image/jpeg;base64,/9j/4AAQSkZJRg=="
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "WAITING_CONFIRMATION");
    assert!(body["payment_proof"].as_str().unwrap().contains("images.test"));
    assert_eq!(body["can_upload_payment"], false);

    let response = app
        .clone()
        .oneshot(post(&format!("/transactions/{}/accept", id), json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "DONE");
    assert_eq!(body["can_cancel"], false);

    assert_eq!(store.event_seats(event_id).await, Some(9));
}

#[tokio::test]
async fn test_late_proof_upload_rejected() {
    let (app, store) = test_app();
    let user_id = seed_user(&store, "putri@example.com", 0).await;
    let event_id = seed_event(&store, 100_000, 10).await;

    let created = create_transaction(&app, user_id, event_id).await;
    let id = Uuid::parse_str(created["id"].as_str().unwrap()).unwrap();
    store
        .set_payment_deadline(id, Utc::now() - Duration::minutes(5))
        .await;

    let response = app
        .oneshot(post(
            &format!("/transactions/{}/payment-proof", id),
            json!({
                "user_id": user_id,
                "payment_proof": "data:image/jpeg;base64,/9j/4AAQSkZJRg=="
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], "DEADLINE_PASSED");
    assert_eq!(store.event_seats(event_id).await, Some(10));
}

#[tokio::test]
async fn test_reject_route_returns_holds() {
    let (app, store) = test_app();
    let user_id = seed_user(&store, "putri@example.com", 0).await;
    let event_id = seed_event(&store, 100_000, 10).await;

    let created = create_transaction(&app, user_id, event_id).await;
    let id = created["id"].as_str().unwrap();
    let response = app
        .clone()
        .oneshot(post(
            &format!("/transactions/{}/payment-proof", id),
            json!({ "user_id": user_id, "payment_proof": "https://bank.example/receipt.jpg" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(post(&format!("/transactions/{}/reject", id), json!({})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "REJECTED");
    assert_eq!(store.event_seats(event_id).await, Some(10));
}

#[tokio::test]
async fn test_cancel_hidden_for_other_user() {
    let (app, store) = test_app();
    let user_id = seed_user(&store, "putri@example.com", 0).await;
    let stranger = seed_user(&store, "stranger@example.com", 0).await;
    let event_id = seed_event(&store, 100_000, 10).await;

    let created = create_transaction(&app, user_id, event_id).await;
    let id = created["id"].as_str().unwrap();

    let response = app
        .oneshot(post(
            &format!("/transactions/{}/cancel", id),
            json!({ "user_id": stranger }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cancel_without_body_succeeds() {
    let (app, store) = test_app();
    let user_id = seed_user(&store, "putri@example.com", 0).await;
    let event_id = seed_event(&store, 100_000, 10).await;

    let created = create_transaction(&app, user_id, event_id).await;
    let id = created["id"].as_str().unwrap();

    let request = Request::builder()
        .method("POST")
        .uri(format!("/transactions/{}/cancel", id))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "CANCELLED");
    assert_eq!(store.event_seats(event_id).await, Some(10));
}

#[tokio::test]
async fn test_list_paginates() {
    let (app, store) = test_app();
    let user_id = seed_user(&store, "putri@example.com", 0).await;
    for _ in 0..3 {
        let event_id = seed_event(&store, 100_000, 10).await;
        create_transaction(&app, user_id, event_id).await;
    }

    let response = app
        .clone()
        .oneshot(get(&format!(
            "/users/{}/transactions?page=1&limit=2",
            user_id
        )))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["items"].as_array().unwrap().len(), 2);
    assert_eq!(body["total"], 3);
    assert_eq!(body["pages"], 2);
    assert_eq!(body["has_next"], true);
    assert_eq!(body["has_prev"], false);

    let response = app
        .oneshot(get(&format!(
            "/users/{}/transactions?page=2&limit=2",
            user_id
        )))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["has_next"], false);
    assert_eq!(body["has_prev"], true);
}

#[tokio::test]
async fn test_list_filters_by_status() {
    let (app, store) = test_app();
    let user_id = seed_user(&store, "putri@example.com", 0).await;
    let first_event = seed_event(&store, 100_000, 10).await;
    let second_event = seed_event(&store, 100_000, 10).await;

    let created = create_transaction(&app, user_id, first_event).await;
    let id = created["id"].as_str().unwrap();
    let response = app
        .clone()
        .oneshot(post(&format!("/transactions/{}/cancel", id), json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    create_transaction(&app, user_id, second_event).await;

    let response = app
        .clone()
        .oneshot(get(&format!(
            "/users/{}/transactions?status=CANCELLED",
            user_id
        )))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["status"], "CANCELLED");

    let response = app
        .oneshot(get(&format!("/users/{}/transactions?status=ALL", user_id)))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["total"], 2);
}

#[tokio::test]
async fn test_invalid_status_filter_rejected() {
    let (app, _store) = test_app();

    let response = app
        .oneshot(get(&format!(
            "/users/{}/transactions?status=PAID",
            Uuid::new_v4()
        )))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_stats_counts_by_status() {
    let (app, store) = test_app();
    let event_id = seed_event(&store, 100_000, 10).await;
    let first = seed_user(&store, "putri@example.com", 0).await;
    let second = seed_user(&store, "agus@example.com", 0).await;

    create_transaction(&app, first, event_id).await;
    let created = create_transaction(&app, second, event_id).await;
    let id = created["id"].as_str().unwrap();
    let response = app
        .clone()
        .oneshot(post(&format!("/transactions/{}/cancel", id), json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/transactions/stats")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["total"], 2);
    assert_eq!(body["by_status"]["WAITING_PAYMENT"], 1);
    assert_eq!(body["by_status"]["CANCELLED"], 1);
}

#[tokio::test]
async fn test_validate_promotion_quote() {
    let (app, store) = test_app();
    let promotion = Promotion::new("EARLYBIRD", 20, Utc::now() + Duration::days(7));
    store.insert_promotion(promotion).await;

    let response = app
        .oneshot(post(
            "/promotions/validate",
            json!({ "code": "EARLYBIRD", "total_amount": 500_000 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["discount_percent"], 20);
    assert_eq!(body["discount_amount"], 100_000);
    assert_eq!(body["final_amount"], 400_000);
}

#[tokio::test]
async fn test_validate_unknown_promotion_rejected() {
    let (app, _store) = test_app();

    let response = app
        .oneshot(post(
            "/promotions/validate",
            json!({ "code": "NOPE", "total_amount": 100_000 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], "PROMOTION_INVALID");
}

#[tokio::test]
async fn test_apply_promotion_consumes_use() {
    let (app, store) = test_app();
    let promotion = Promotion::new("FLASH50", 50, Utc::now() + Duration::days(1)).with_max_uses(2);
    let promotion_id = promotion.id;
    store.insert_promotion(promotion).await;

    let response = app
        .oneshot(post("/promotions/apply", json!({ "code": "FLASH50" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["current_uses"], 1);
    assert_eq!(store.promotion_uses(promotion_id).await, Some(1));
}

#[tokio::test]
async fn test_seat_availability_route() {
    let (app, store) = test_app();
    let user_id = seed_user(&store, "putri@example.com", 0).await;
    let event_id = seed_event(&store, 100_000, 10).await;
    create_transaction(&app, user_id, event_id).await;

    let response = app
        .oneshot(get(&format!("/events/{}/seats", event_id)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["available_seats"], 9);
    assert_eq!(body["total_seats"], 10);
    assert_eq!(body["is_full"], false);
}

#[tokio::test]
async fn test_registration_status_route() {
    let (app, store) = test_app();
    let registered = seed_user(&store, "putri@example.com", 0).await;
    let unregistered = seed_user(&store, "agus@example.com", 0).await;
    let event_id = seed_event(&store, 100_000, 10).await;
    create_transaction(&app, registered, event_id).await;

    let response = app
        .clone()
        .oneshot(get(&format!(
            "/events/{}/registration-status?user_id={}",
            event_id, registered
        )))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["registered"], true);

    let response = app
        .oneshot(get(&format!(
            "/events/{}/registration-status?user_id={}",
            event_id, unregistered
        )))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["registered"], false);
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let (app, _store) = test_app();

    let response = app.oneshot(get("/health")).await.unwrap();

    assert!(response.headers().get("x-request-id").is_some());
}
