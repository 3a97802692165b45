use actix_web::{http::StatusCode, test::TestRequest};
use serde_json::{json, Value};
use sponsor_engine::{db_types::OrderStatusType, traits::StoreError};
use wxpay_tools::helpers::HEADER_SIGNATURE;

use super::{
    helpers::{notification_body, notification_request, order, send_request, ADMIN_TOKEN, ORDER_NO},
    mocks::MockStore,
};

fn ack(body: &str) -> String {
    let body: Value = serde_json::from_str(body).unwrap();
    body["code"].as_str().unwrap().to_string()
}

#[actix_web::test]
async fn genuine_notification_marks_order_paid() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_fetch_order_by_order_no().times(1).returning(|_| Ok(Some(order(3, OrderStatusType::Pending, 9900))));
    store
        .expect_update_order_status()
        .times(1)
        .withf(|id, expected, update| {
            *id == 3 &&
                *expected == OrderStatusType::Pending &&
                update.new_status == OrderStatusType::Paid &&
                update.payment_id.as_deref() == Some("4200000099") &&
                update.download_token.as_ref().map(|t| t.len()) == Some(48)
        })
        .returning(|_, _, _| Ok(Some(order(3, OrderStatusType::Paid, 9900))));
    store.expect_fetch_work().returning(|_| Ok(Some(super::helpers::work(1, 9900))));
    let body = notification_body(ORDER_NO, "SUCCESS", 9900);
    let (status, res) = send_request(notification_request(&body, body.clone()), store, ADMIN_TOKEN).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack(&res), "SUCCESS");
}

#[actix_web::test]
async fn tampered_body_is_rejected_without_touching_orders() {
    let _ = env_logger::try_init().ok();
    let signed = notification_body(ORDER_NO, "NOTPAY", 9900);
    let tampered = notification_body(ORDER_NO, "SUCCESS", 9900);
    // No expectations: any store call fails the test
    let (status, res) = send_request(notification_request(&signed, tampered), MockStore::new(), ADMIN_TOKEN).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(res, r#"{"code":"FAIL","message":"FAIL"}"#);
}

#[actix_web::test]
async fn forged_signature_is_rejected() {
    let _ = env_logger::try_init().ok();
    let body = notification_body(ORDER_NO, "SUCCESS", 9900);
    let req = notification_request(&body, body.clone()).insert_header((HEADER_SIGNATURE, "Zm9yZ2Vk"));
    let (status, res) = send_request(req, MockStore::new(), ADMIN_TOKEN).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(ack(&res), "FAIL");
}

#[actix_web::test]
async fn missing_headers_are_a_bad_request() {
    let _ = env_logger::try_init().ok();
    let req = TestRequest::post()
        .uri("/api/payments/wxpay/notify")
        .insert_header(("content-type", "application/json"))
        .set_payload(notification_body(ORDER_NO, "SUCCESS", 9900));
    let (status, res) = send_request(req, MockStore::new(), ADMIN_TOKEN).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(ack(&res), "FAIL");
}

#[actix_web::test]
async fn signed_body_without_resource_is_a_bad_request() {
    let _ = env_logger::try_init().ok();
    let body = json!({"id": "EV-1", "event_type": "TRANSACTION.SUCCESS"}).to_string().into_bytes();
    let (status, res) = send_request(notification_request(&body, body.clone()), MockStore::new(), ADMIN_TOKEN).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(ack(&res), "FAIL");
}

#[actix_web::test]
async fn unknown_order_is_acknowledged() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_fetch_order_by_order_no().returning(|_| Ok(None));
    store.expect_update_order_status().never();
    let body = notification_body("ORD20240301120000ffffff", "SUCCESS", 9900);
    let (status, res) = send_request(notification_request(&body, body.clone()), store, ADMIN_TOKEN).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack(&res), "SUCCESS");
}

#[actix_web::test]
async fn non_final_trade_state_is_acknowledged() {
    let _ = env_logger::try_init().ok();
    let body = notification_body(ORDER_NO, "USERPAYING", 9900);
    let (status, res) = send_request(notification_request(&body, body.clone()), MockStore::new(), ADMIN_TOKEN).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack(&res), "SUCCESS");
}

#[actix_web::test]
async fn redelivery_is_a_no_op() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_fetch_order_by_order_no().returning(|_| Ok(Some(order(3, OrderStatusType::Paid, 9900))));
    store.expect_update_order_status().never();
    let body = notification_body(ORDER_NO, "SUCCESS", 9900);
    let (status, res) = send_request(notification_request(&body, body.clone()), store, ADMIN_TOKEN).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack(&res), "SUCCESS");
}

#[actix_web::test]
async fn amount_mismatch_leaves_order_alone() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_fetch_order_by_order_no().returning(|_| Ok(Some(order(3, OrderStatusType::Pending, 9900))));
    store.expect_update_order_status().never();
    let body = notification_body(ORDER_NO, "SUCCESS", 1);
    let (status, res) = send_request(notification_request(&body, body.clone()), store, ADMIN_TOKEN).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack(&res), "SUCCESS");
}

#[actix_web::test]
async fn storage_failure_asks_for_a_retry() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_fetch_order_by_order_no().returning(|_| Err(StoreError::DatabaseError("database is locked".into())));
    let body = notification_body(ORDER_NO, "SUCCESS", 9900);
    let (status, res) = send_request(notification_request(&body, body.clone()), store, ADMIN_TOKEN).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(ack(&res), "FAIL");
}
