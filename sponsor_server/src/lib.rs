//! # Sponsorship order server
//! This crate hosts the HTTP front of the sponsorship order engine. It is responsible for:
//! * Accepting orders from buyers, and letting them poll an order or fetch their delivery links.
//! * Receiving payment notifications from the payment gateway, verifying them, and applying them to orders.
//! * Letting admins mark orders paid, cancel, refund, delete and search them.
//! * E-mailing buyers when their order is paid or refunded.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `POST /api/orders`, `GET /api/orders/{order_no}` and `GET /api/download/{token}` for buyers.
//! * `POST /api/payments/wxpay/notify` for the payment gateway.
//! * `/api/admin/orders/...` for admins, behind a bearer token.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod middleware;
pub mod notifications;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
