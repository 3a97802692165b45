//! # WeChat Pay (APIv3) tools
//!
//! The pieces of the payment gateway that the order engine consumes:
//! * [`NotificationVerifier`] authenticates and decrypts inbound payment notifications (webhooks).
//! * [`WxPayApi`] calls the gateway's refund endpoint.
//! * [`WxPayConfig`] holds the merchant credentials and the platform verification keys, loaded from the environment.
mod api;
mod config;
mod error;
mod notification;

pub mod data_objects;
pub mod helpers;

pub use api::WxPayApi;
pub use config::WxPayConfig;
pub use error::{NotificationError, WxPayApiError};
pub use notification::{
    decrypt_resource,
    encrypt_resource,
    HmacSha256Verifier,
    NotificationHeaders,
    NotificationVerifier,
    SignatureVerifier,
};
