use std::fmt::Display;

use serde::{Deserialize, Serialize};
use sponsor_common::Price;
use sponsor_engine::{db_types::OrderStatusType, order_objects::OrderReceipt};

/// What a buyer sees of an order. Delivery links are only present once the order is PAID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: i64,
    pub order_no: String,
    pub status: OrderStatusType,
    pub amount: Price,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub figma_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_url: Option<String>,
}

impl From<OrderReceipt> for OrderResponse {
    fn from(receipt: OrderReceipt) -> Self {
        let OrderReceipt { order, delivery } = receipt;
        let delivery = delivery.filter(|_| order.is_paid()).unwrap_or_default();
        Self {
            id: order.id,
            order_no: order.order_no,
            status: order.status,
            amount: order.amount,
            figma_url: delivery.figma_url,
            delivery_url: delivery.delivery_url,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusParams {
    pub status: OrderStatusType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// The acknowledgement the payment gateway expects in reply to a notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAck {
    pub code: String,
    pub message: String,
}

impl NotificationAck {
    pub fn success<S: Display>(message: S) -> Self {
        Self { code: "SUCCESS".into(), message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { code: "FAIL".into(), message: message.to_string() }
    }
}
