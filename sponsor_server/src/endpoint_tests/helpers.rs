use actix_web::{http::StatusCode, test, test::TestRequest, web, App};
use chrono::{TimeZone, Utc};
use log::debug;
use serde_json::json;
use sponsor_common::{Price, Secret};
use sponsor_engine::{
    db_types::{Order, OrderStatusType, Work},
    events::EventProducers,
    OrderFlowApi,
};
use wxpay_tools::{
    encrypt_resource,
    helpers::{notification_message, sign_message, HEADER_NONCE, HEADER_SERIAL, HEADER_SIGNATURE, HEADER_TIMESTAMP},
    NotificationVerifier,
    WxPayConfig,
};

use super::mocks::MockStore;
use crate::{
    middleware::AdminCredentials,
    routes::health,
    server::{api_scope, json_config},
};

// Test credentials only. DO NOT re-use these keys anywhere.
pub const API_V3_KEY: &str = "0123456789abcdef0123456789abcdef";
pub const PLATFORM_KEY: &str = "platform-test-secret";
pub const SERIAL: &str = "5157F09EFDC096DE15EBE81A47057A72";
pub const ADMIN_TOKEN: &str = "admin-test-token";
pub const ORDER_NO: &str = "ORD20240301120000a1b2c3";

pub fn wxpay_config() -> WxPayConfig {
    WxPayConfig {
        mch_id: "1900000001".into(),
        api_v3_key: Secret::new(API_V3_KEY.into()),
        platform_keys: vec![(SERIAL.into(), Secret::new(PLATFORM_KEY.into()))],
        ..Default::default()
    }
}

/// Sends `req` to an app backed by `store`. The admin token is [`ADMIN_TOKEN`] unless `admin_token` says otherwise.
pub async fn send_request(req: TestRequest, store: MockStore, admin_token: &str) -> (StatusCode, String) {
    let api = OrderFlowApi::new(store, EventProducers::default());
    let app = App::new()
        .app_data(web::Data::new(api))
        .app_data(web::Data::new(NotificationVerifier::from_config(&wxpay_config())))
        .app_data(web::Data::new(AdminCredentials::new(Secret::new(admin_token.to_string()))))
        .app_data(json_config())
        .service(health)
        .service(api_scope::<MockStore>());
    let service = test::init_service(app).await;
    debug!("Making request");
    let res = test::call_service(&service, req.to_request()).await;
    let status = res.status();
    let body = String::from_utf8_lossy(&test::read_body(res).await).into_owned();
    (status, body)
}

/// An encrypted notification body for `order_no`, as the gateway would send it
pub fn notification_body(order_no: &str, trade_state: &str, total: i64) -> Vec<u8> {
    let plaintext = json!({
        "out_trade_no": order_no,
        "transaction_id": "4200000099",
        "trade_state": trade_state,
        "amount": { "total": total, "currency": "CNY" }
    });
    let resource = encrypt_resource(API_V3_KEY, "a1b2c3d4e5f6", "transaction", plaintext.to_string().as_bytes())
        .expect("encryption failed");
    json!({
        "id": "EV-2024",
        "event_type": "TRANSACTION.SUCCESS",
        "resource_type": "encrypt-resource",
        "resource": resource
    })
    .to_string()
    .into_bytes()
}

/// A notification request whose headers are signed over `signed_body`, but which carries `body`
pub fn notification_request(signed_body: &[u8], body: Vec<u8>) -> TestRequest {
    let ts = Utc::now().timestamp().to_string();
    let nonce = "n0nce42";
    let signature = sign_message(PLATFORM_KEY.as_bytes(), &notification_message(&ts, nonce, signed_body));
    TestRequest::post()
        .uri("/api/payments/wxpay/notify")
        .insert_header(("content-type", "application/json"))
        .insert_header((HEADER_TIMESTAMP, ts))
        .insert_header((HEADER_NONCE, nonce))
        .insert_header((HEADER_SIGNATURE, signature))
        .insert_header((HEADER_SERIAL, SERIAL))
        .set_payload(body)
}

pub fn work(id: i64, price: i64) -> Work {
    Work {
        id,
        title: "Icon set".into(),
        price: Some(Price::from_minor_units(price)),
        is_free: price == 0,
        figma_url: Some("https://www.figma.com/file/icons".into()),
        delivery_url: None,
        created_at: Utc.with_ymd_and_hms(2024, 2, 1, 9, 0, 0).unwrap(),
    }
}

pub fn order(id: i64, status: OrderStatusType, amount: i64) -> Order {
    let paid = matches!(status, OrderStatusType::Paid);
    Order {
        id,
        order_no: ORDER_NO.into(),
        work_id: 1,
        version_id: None,
        upgrade_from_id: None,
        buyer_email: "bob@example.com".into(),
        buyer_name: None,
        amount: Price::from_minor_units(amount),
        status,
        payment_id: paid.then(|| "4200000099".to_string()),
        paid_at: paid.then(|| Utc.with_ymd_and_hms(2024, 3, 1, 12, 5, 0).unwrap()),
        download_token: paid.then(|| "t".repeat(48)),
        download_count: 0,
        created_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        updated_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
    }
}
