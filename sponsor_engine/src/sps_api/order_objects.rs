use serde::{Deserialize, Serialize};
use sponsor_common::Price;

use crate::db_types::{DeliveryLinks, Order};

/// A buyer's request to sponsor (buy, claim, or upgrade to) a work
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub work_id: i64,
    pub buyer_email: String,
    #[serde(default)]
    pub buyer_name: Option<String>,
    #[serde(default)]
    pub version_id: Option<i64>,
    /// The work version the buyer already owns, for upgrade purchases
    #[serde(default)]
    pub upgrade_from_id: Option<i64>,
    /// Accepted for compatibility with older clients. Never used for pricing.
    #[serde(default)]
    pub upgrade_amount: Option<Price>,
}

impl CreateOrderRequest {
    pub fn new<S: Into<String>>(work_id: i64, buyer_email: S) -> Self {
        Self { work_id, buyer_email: buyer_email.into(), ..Default::default() }
    }

    pub fn with_version(mut self, version_id: i64) -> Self {
        self.version_id = Some(version_id);
        self
    }

    pub fn with_buyer_name<S: Into<String>>(mut self, name: S) -> Self {
        self.buyer_name = Some(name.into());
        self
    }

    pub fn upgrading_from(mut self, version_id: i64) -> Self {
        self.upgrade_from_id = Some(version_id);
        self
    }
}

/// An order together with what the buyer may see of its delivery. `delivery` is only ever set for PAID orders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderReceipt {
    pub order: Order,
    pub delivery: Option<DeliveryLinks>,
}

/// The result of applying a verified payment notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// The order moved from PENDING to PAID
    Paid(Order),
    /// The order had already left PENDING (a duplicate delivery, or it lost a race). Nothing changed.
    AlreadyProcessed(Order),
    /// The notification did not report a successful payment. Nothing changed.
    Ignored,
}
