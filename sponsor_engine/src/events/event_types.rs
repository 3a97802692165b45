use serde::{Deserialize, Serialize};

use crate::db_types::{DeliveryLinks, Order};

/// Published after an order has been committed as PAID, by any route: gateway notification, admin action, or a free
/// claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPaidEvent {
    pub order: Order,
    pub delivery: DeliveryLinks,
}

impl OrderPaidEvent {
    pub fn new(order: Order, delivery: DeliveryLinks) -> Self {
        Self { order, delivery }
    }
}

/// Published after a refund has been accepted by the gateway and the order committed as REFUNDED.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRefundedEvent {
    pub order: Order,
}

impl OrderRefundedEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}
