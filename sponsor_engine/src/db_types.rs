use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
pub use sponsor_common::Price;
use sqlx::{FromRow, Type};
use thiserror::Error;

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatusType {
    /// The order has been created and priced, but no payment has been received.
    Pending,
    /// Payment has been received (or was not required). Delivery links are available.
    Paid,
    /// The order was cancelled by an admin before it was paid. Terminal.
    Cancelled,
    /// The payment was returned to the buyer. Terminal.
    Refunded,
}

impl OrderStatusType {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Refunded)
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "PENDING"),
            OrderStatusType::Paid => write!(f, "PAID"),
            OrderStatusType::Cancelled => write!(f, "CANCELLED"),
            OrderStatusType::Refunded => write!(f, "REFUNDED"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid order status: {0}")]
pub struct StatusConversionError(String);

impl FromStr for OrderStatusType {
    type Err = StatusConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "PAID" => Ok(Self::Paid),
            "CANCELLED" => Ok(Self::Cancelled),
            "REFUNDED" => Ok(Self::Refunded),
            _ => Err(StatusConversionError(s.to_string())),
        }
    }
}

//--------------------------------------        Order        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_no: String,
    pub work_id: i64,
    pub version_id: Option<i64>,
    /// The work version the buyer already owned when this order was placed as an upgrade
    pub upgrade_from_id: Option<i64>,
    pub buyer_email: String,
    pub buyer_name: Option<String>,
    pub amount: Price,
    pub status: OrderStatusType,
    /// Gateway transaction id. Only set when the order was settled through the gateway.
    pub payment_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub download_token: Option<String>,
    pub download_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn is_paid(&self) -> bool {
        self.status == OrderStatusType::Paid
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub order_no: String,
    pub work_id: i64,
    pub version_id: Option<i64>,
    pub upgrade_from_id: Option<i64>,
    pub buyer_email: String,
    pub buyer_name: Option<String>,
    pub amount: Price,
    pub status: OrderStatusType,
    pub paid_at: Option<DateTime<Utc>>,
    pub download_token: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    pub fn new(order_no: String, work_id: i64, buyer_email: String, amount: Price) -> Self {
        Self {
            order_no,
            work_id,
            version_id: None,
            upgrade_from_id: None,
            buyer_email,
            buyer_name: None,
            amount,
            status: OrderStatusType::Pending,
            paid_at: None,
            download_token: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_version(mut self, version_id: Option<i64>) -> Self {
        self.version_id = version_id;
        self
    }

    pub fn with_upgrade_from(mut self, upgrade_from_id: Option<i64>) -> Self {
        self.upgrade_from_id = upgrade_from_id;
        self
    }

    pub fn with_buyer_name(mut self, name: Option<String>) -> Self {
        self.buyer_name = name;
        self
    }

    /// Marks the order as settled at creation time. Used for free and fully discounted orders.
    pub fn already_paid(mut self, download_token: String) -> Self {
        self.status = OrderStatusType::Paid;
        self.paid_at = Some(self.created_at);
        self.download_token = Some(download_token);
        self
    }
}

/// A compare-and-set status change. See [`crate::traits::OrderManagement::update_order_status`].
///
/// `paid_at` and `download_token` are only written when the stored value is NULL. When `revoke_delivery` is set, the
/// download token is cleared and the download count is reset instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub new_status: OrderStatusType,
    pub payment_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub download_token: Option<String>,
    pub revoke_delivery: bool,
}

impl StatusUpdate {
    pub fn new(new_status: OrderStatusType) -> Self {
        Self { new_status, payment_id: None, paid_at: None, download_token: None, revoke_delivery: false }
    }

    pub fn paid(paid_at: DateTime<Utc>, download_token: String) -> Self {
        Self {
            paid_at: Some(paid_at),
            download_token: Some(download_token),
            ..Self::new(OrderStatusType::Paid)
        }
    }

    pub fn with_payment_id(mut self, payment_id: String) -> Self {
        self.payment_id = Some(payment_id);
        self
    }

    pub fn refunded() -> Self {
        Self { revoke_delivery: true, ..Self::new(OrderStatusType::Refunded) }
    }
}

//--------------------------------------     Work catalog      --------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Work {
    pub id: i64,
    pub title: String,
    /// The flat price when no version applies. `None` means the work has no price set.
    pub price: Option<Price>,
    pub is_free: bool,
    pub figma_url: Option<String>,
    pub delivery_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewWork {
    pub title: String,
    pub price: Option<Price>,
    pub is_free: bool,
    pub figma_url: Option<String>,
    pub delivery_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct WorkVersion {
    pub id: i64,
    pub work_id: i64,
    pub version: String,
    pub price: Option<Price>,
    pub figma_url: Option<String>,
    pub delivery_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewWorkVersion {
    pub work_id: i64,
    pub version: String,
    pub price: Option<Price>,
    pub figma_url: Option<String>,
    pub delivery_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewWorkVersion {
    pub fn new(work_id: i64, version: &str) -> Self {
        Self {
            work_id,
            version: version.to_string(),
            price: None,
            figma_url: None,
            delivery_url: None,
            created_at: Utc::now(),
        }
    }
}

//--------------------------------------    DeliveryLinks      --------------------------------------------------------
/// What a buyer receives once an order is paid
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryLinks {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub figma_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_url: Option<String>,
}

impl DeliveryLinks {
    pub fn is_empty(&self) -> bool {
        self.figma_url.is_none() && self.delivery_url.is_none()
    }
}

impl Display for DeliveryLinks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let figma = self.figma_url.as_deref().unwrap_or("-");
        let delivery = self.delivery_url.as_deref().unwrap_or("-");
        write!(f, "figma: {figma}, delivery: {delivery}")
    }
}
