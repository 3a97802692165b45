//! # Sponsorship engine public API
//!
//! The `sps_api` module exposes the programmatic API of the order engine.
//!
//! * [`order_flow_api`] holds the order state machine. Every caller that changes an order (buyers creating orders,
//!   the payment gateway's notifications, admins) goes through it.
//! * [`order_objects`] are the request and result types of that API.
//!
//! # API usage
//!
//! An API instance is created by supplying a database backend that implements the backend traits the API needs, and
//! the event producers that the API should publish to.
//!
//! ```rust,ignore
//! use sponsor_engine::{events::EventProducers, OrderFlowApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! let api = OrderFlowApi::new(db, EventProducers::default());
//! let order = api.fetch_order("ORD20240101120000abcdef").await?;
//! ```
pub mod errors;
pub mod order_flow_api;
pub mod order_objects;
