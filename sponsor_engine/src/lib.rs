//! Sponsorship Order Engine
//!
//! The order and payment lifecycle behind sponsoring a creative work: buyers create orders (purchases, free claims
//! and version upgrades), the payment gateway reports settlements, and admins mark orders paid, cancel them, or
//! refund them. Once an order is PAID, the buyer receives the work's delivery links.
//!
//! The library is divided into these main sections:
//! 1. Storage ([`traits`] and the SQLite backend, [`SqliteDatabase`]). You should never need to access the database
//!    directly. Instead, use the public API provided by the engine. The exception is the data types used in the
//!    database. These are defined in the [`db_types`] module and are public.
//! 2. The engine's public API ([`OrderFlowApi`]). It is the only component that changes the status of an order, and
//!    it enforces the legal transitions.
//! 3. Supporting components: [`pricing`], the [`rate_limiter`] and the [`refunds`] coordinator.
//!
//! The engine also publishes events when orders are paid or refunded. A simple hook framework ([`events`]) lets you
//! react to them, e.g. by e-mailing the buyer, without slowing down the request that caused them.
#[cfg(feature = "sqlite")]
mod sqlite;

pub mod db_types;
pub mod events;
pub mod helpers;
pub mod pricing;
pub mod rate_limiter;
pub mod refunds;
mod sps_api;
pub mod traits;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use sps_api::{
    errors::OrderFlowError,
    order_flow_api::OrderFlowApi,
    order_objects,
};
