use actix_web::{http::StatusCode, test::TestRequest};
use serde_json::{json, Value};
use sponsor_engine::db_types::OrderStatusType;

use super::{
    helpers::{order, send_request, ADMIN_TOKEN},
    mocks::MockStore,
};

fn patch_status(id: i64, status: &str) -> TestRequest {
    TestRequest::patch().uri(&format!("/api/admin/orders/{id}/status")).set_json(json!({ "status": status }))
}

fn bearer(req: TestRequest, token: &str) -> TestRequest {
    req.insert_header(("Authorization", format!("Bearer {token}")))
}

#[actix_web::test]
async fn admin_routes_need_a_token() {
    let _ = env_logger::try_init().ok();
    let (status, body) = send_request(patch_status(3, "CANCELLED"), MockStore::new(), ADMIN_TOKEN).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("No admin bearer token"));
}

#[actix_web::test]
async fn wrong_token_is_refused() {
    let _ = env_logger::try_init().ok();
    let req = bearer(patch_status(3, "CANCELLED"), "guess");
    let (status, _) = send_request(req, MockStore::new(), ADMIN_TOKEN).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn admin_disabled_without_configured_token() {
    let _ = env_logger::try_init().ok();
    let req = bearer(TestRequest::delete().uri("/api/admin/orders/3"), "");
    let (status, body) = send_request(req, MockStore::new(), "").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.contains("not enabled"));
}

#[actix_web::test]
async fn cancel_pending_order() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_fetch_order_by_id().times(1).returning(|_| Ok(Some(order(3, OrderStatusType::Pending, 9900))));
    store
        .expect_update_order_status()
        .times(1)
        .withf(|id, expected, update| {
            *id == 3 && *expected == OrderStatusType::Pending && update.new_status == OrderStatusType::Cancelled
        })
        .returning(|_, _, _| Ok(Some(order(3, OrderStatusType::Cancelled, 9900))));
    let req = bearer(patch_status(3, "CANCELLED"), ADMIN_TOKEN);
    let (status, body) = send_request(req, store, ADMIN_TOKEN).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["status"], "CANCELLED");
    assert!(body.get("download_token").is_none());
}

#[actix_web::test]
async fn illegal_transition_is_a_conflict() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_fetch_order_by_id().returning(|_| Ok(Some(order(3, OrderStatusType::Cancelled, 9900))));
    store.expect_update_order_status().never();
    let req = bearer(patch_status(3, "PAID"), ADMIN_TOKEN);
    let (status, body) = send_request(req, store, ADMIN_TOKEN).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("CANCELLED to PAID"));
}

#[actix_web::test]
async fn refund_without_gateway_keeps_order_paid() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_fetch_order_by_id().returning(|_| Ok(Some(order(3, OrderStatusType::Paid, 9900))));
    store.expect_update_order_status().never();
    let req = bearer(patch_status(3, "REFUNDED"), ADMIN_TOKEN);
    let (status, body) = send_request(req, store, ADMIN_TOKEN).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body.contains("not configured"));
}

#[actix_web::test]
async fn unknown_status_value() {
    let _ = env_logger::try_init().ok();
    let req = bearer(patch_status(3, "SHIPPED"), ADMIN_TOKEN);
    let (status, _) = send_request(req, MockStore::new(), ADMIN_TOKEN).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn delete_order() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_delete_order().withf(|id| *id == 3).times(1).returning(|_| Ok(true));
    let req = bearer(TestRequest::delete().uri("/api/admin/orders/3"), ADMIN_TOKEN);
    let (status, body) = send_request(req, store, ADMIN_TOKEN).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"success":true,"message":"Order #3 deleted"}"#);
}

#[actix_web::test]
async fn delete_missing_order() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_delete_order().returning(|_| Ok(false));
    let req = bearer(TestRequest::delete().uri("/api/admin/orders/99"), ADMIN_TOKEN);
    let (status, _) = send_request(req, store, ADMIN_TOKEN).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn search_orders_by_status() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store
        .expect_search_orders()
        .withf(|q| q.status == Some(OrderStatusType::Paid) && q.buyer_email.as_deref() == Some("bob@example.com"))
        .times(1)
        .returning(|_| Ok(vec![order(3, OrderStatusType::Paid, 9900)]));
    let req = bearer(TestRequest::get().uri("/api/admin/orders?status=PAID&buyerEmail=bob@example.com"), ADMIN_TOKEN);
    let (status, body) = send_request(req, store, ADMIN_TOKEN).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["order_no"], "ORD20240301120000a1b2c3");
}
