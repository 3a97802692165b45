use actix_web::{http::StatusCode, test::TestRequest};
use chrono::Utc;
use serde_json::{json, Value};
use sponsor_engine::db_types::{NewOrder, Order, OrderStatusType};

use super::{
    helpers::{order, send_request, work, ADMIN_TOKEN, ORDER_NO},
    mocks::MockStore,
};

fn stored(new: NewOrder) -> Order {
    Order {
        id: 7,
        order_no: new.order_no,
        work_id: new.work_id,
        version_id: new.version_id,
        upgrade_from_id: new.upgrade_from_id,
        buyer_email: new.buyer_email,
        buyer_name: new.buyer_name,
        amount: new.amount,
        status: new.status,
        payment_id: None,
        paid_at: new.paid_at,
        download_token: new.download_token,
        download_count: 0,
        created_at: new.created_at,
        updated_at: Utc::now(),
    }
}

#[actix_web::test]
async fn health_check() {
    let _ = env_logger::try_init().ok();
    let (status, body) = send_request(TestRequest::get().uri("/health"), MockStore::new(), ADMIN_TOKEN).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "👍️\n");
}

#[actix_web::test]
async fn create_pending_order() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_fetch_work().withf(|id| *id == 1).returning(|_| Ok(Some(work(1, 9900))));
    store.expect_fetch_latest_work_version().returning(|_| Ok(None));
    store.expect_fetch_existing_paid_order().times(1).returning(|_, _, _| Ok(None));
    store
        .expect_insert_order()
        .times(1)
        .withf(|o| o.buyer_email == "carol@example.com" && o.status == OrderStatusType::Pending)
        .returning(|o| Ok(stored(o)));
    let req = TestRequest::post()
        .uri("/api/orders")
        .set_json(json!({"workId": 1, "buyerEmail": " Carol@Example.com ", "buyerName": "Carol"}));
    let (status, body) = send_request(req, store, ADMIN_TOKEN).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["status"], "PENDING");
    assert_eq!(body["amount"], 99.0);
    assert!(body["orderNo"].as_str().unwrap().starts_with("ORD"));
    assert!(body.get("figmaUrl").is_none());
}

#[actix_web::test]
async fn free_work_is_delivered_immediately() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_fetch_work().returning(|_| Ok(Some(work(2, 0))));
    store.expect_fetch_latest_work_version().returning(|_| Ok(None));
    store.expect_fetch_existing_paid_order().returning(|_, _, _| Ok(None));
    store.expect_insert_order().times(1).returning(|o| Ok(stored(o)));
    let req =
        TestRequest::post().uri("/api/orders").set_json(json!({"workId": 2, "buyerEmail": "dave@example.com"}));
    let (status, body) = send_request(req, store, ADMIN_TOKEN).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["status"], "PAID");
    assert_eq!(body["amount"], 0.0);
    assert_eq!(body["figmaUrl"], "https://www.figma.com/file/icons");
}

#[actix_web::test]
async fn invalid_email_is_rejected_before_any_lookup() {
    let _ = env_logger::try_init().ok();
    let req = TestRequest::post().uri("/api/orders").set_json(json!({"workId": 1, "buyerEmail": "not-an-email"}));
    let (status, body) = send_request(req, MockStore::new(), ADMIN_TOKEN).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("buyerEmail"));
}

#[actix_web::test]
async fn malformed_body() {
    let _ = env_logger::try_init().ok();
    let req = TestRequest::post()
        .uri("/api/orders")
        .insert_header(("content-type", "application/json"))
        .set_payload("{\"workId\": \"one\"");
    let (status, body) = send_request(req, MockStore::new(), ADMIN_TOKEN).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert!(body["error"].as_str().unwrap().starts_with("Could not read request body"));
}

#[actix_web::test]
async fn unknown_work() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_fetch_work().returning(|_| Ok(None));
    let req = TestRequest::post().uri("/api/orders").set_json(json!({"workId": 404, "buyerEmail": "erin@example.com"}));
    let (status, _) = send_request(req, store, ADMIN_TOKEN).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn repeat_purchase_returns_links() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_fetch_work().returning(|_| Ok(Some(work(1, 9900))));
    store.expect_fetch_latest_work_version().returning(|_| Ok(None));
    store.expect_fetch_existing_paid_order().returning(|_, _, _| Ok(Some(order(3, OrderStatusType::Paid, 9900))));
    store.expect_insert_order().never();
    let req = TestRequest::post().uri("/api/orders").set_json(json!({"workId": 1, "buyerEmail": "bob@example.com"}));
    let (status, body) = send_request(req, store, ADMIN_TOKEN).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["figmaUrl"], "https://www.figma.com/file/icons");
    assert_eq!(body["error"], "You have already purchased this work");
}

#[actix_web::test]
async fn poll_pending_order() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store
        .expect_fetch_order_by_order_no()
        .times(1)
        .returning(|_| Ok(Some(order(3, OrderStatusType::Pending, 9900))));
    let req = TestRequest::get().uri(&format!("/api/orders/{ORDER_NO}"));
    let (status, body) = send_request(req, store, ADMIN_TOKEN).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["status"], "PENDING");
    assert!(body.get("figmaUrl").is_none());
}

#[actix_web::test]
async fn poll_unknown_order() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_fetch_order_by_order_no().returning(|_| Ok(None));
    let (status, _) = send_request(TestRequest::get().uri("/api/orders/ORD0"), store, ADMIN_TOKEN).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn download_links() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_fetch_order_by_download_token().returning(|_| Ok(Some(order(3, OrderStatusType::Paid, 9900))));
    store.expect_increment_download_count().times(1).returning(|_| {
        let mut o = order(3, OrderStatusType::Paid, 9900);
        o.download_count = 1;
        Ok(Some(o))
    });
    store.expect_fetch_work().returning(|_| Ok(Some(work(1, 9900))));
    let req = TestRequest::get().uri(&format!("/api/download/{}", "t".repeat(48)));
    let (status, body) = send_request(req, store, ADMIN_TOKEN).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"figmaUrl":"https://www.figma.com/file/icons"}"#);
}

#[actix_web::test]
async fn download_with_revoked_token() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_fetch_order_by_download_token().returning(|_| Ok(None));
    let (status, _) = send_request(TestRequest::get().uri("/api/download/abc"), store, ADMIN_TOKEN).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
