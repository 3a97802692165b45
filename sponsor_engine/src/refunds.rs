//! Refund coordination.
//!
//! The gateway is asked to return the money before anything is written locally. Only once it has accepted the refund
//! does the order engine move the order to REFUNDED. If the gateway call fails for any reason, the order is left
//! exactly as it was.
use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;
use log::*;
use sponsor_common::{Price, CURRENCY_CODE};
use thiserror::Error;
use wxpay_tools::{
    data_objects::{RefundAmount, RefundRequest},
    WxPayApi,
    WxPayApiError,
};

use crate::{db_types::Order, helpers::refund_reference};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("The payment gateway is not configured")]
    NotConfigured,
    #[error("Could not reach the payment gateway: {0}")]
    Transport(String),
    #[error("The payment gateway refused the request: {0}")]
    Rejected(String),
}

impl From<WxPayApiError> for GatewayError {
    fn from(e: WxPayApiError) -> Self {
        match e {
            WxPayApiError::NotConfigured => GatewayError::NotConfigured,
            WxPayApiError::QueryError { status, message } => GatewayError::Rejected(format!("{status}: {message}")),
            other => GatewayError::Transport(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefundError {
    #[error("Refund failed. {0}")]
    RefundFailed(#[from] GatewayError),
}

/// What the gateway reports back for an accepted refund
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundReceipt {
    pub refund_no: String,
    /// The gateway's id for the refund. `None` when no money needed to move.
    pub gateway_refund_id: Option<String>,
    pub amount: Price,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Returns `amount` of the payment for `order_no` to the buyer. `refund_no` is the merchant's reference for the
    /// refund and makes retries idempotent on the gateway side.
    async fn refund(&self, order_no: &str, refund_no: &str, amount: Price) -> Result<RefundReceipt, GatewayError>;
}

/// Stands in when no gateway credentials are configured. Every refund fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGateway;

#[async_trait]
impl PaymentGateway for NoGateway {
    async fn refund(&self, order_no: &str, _: &str, _: Price) -> Result<RefundReceipt, GatewayError> {
        warn!("💸️ Cannot refund {order_no}: no payment gateway is configured");
        Err(GatewayError::NotConfigured)
    }
}

#[async_trait]
impl PaymentGateway for WxPayApi {
    async fn refund(&self, order_no: &str, refund_no: &str, amount: Price) -> Result<RefundReceipt, GatewayError> {
        let request = RefundRequest {
            out_trade_no: order_no.to_string(),
            out_refund_no: refund_no.to_string(),
            reason: None,
            amount: RefundAmount {
                refund: amount.minor_units(),
                total: amount.minor_units(),
                currency: CURRENCY_CODE.to_string(),
            },
        };
        let response = WxPayApi::refund(self, &request).await?;
        if !response.status.is_accepted() {
            return Err(GatewayError::Rejected(format!("refund status is {:?}", response.status)));
        }
        Ok(RefundReceipt {
            refund_no: response.out_refund_no,
            gateway_refund_id: Some(response.refund_id),
            amount,
        })
    }
}

#[derive(Clone)]
pub struct RefundCoordinator {
    gateway: Arc<dyn PaymentGateway>,
}

impl Debug for RefundCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RefundCoordinator")
    }
}

impl Default for RefundCoordinator {
    fn default() -> Self {
        Self::new(NoGateway)
    }
}

impl RefundCoordinator {
    pub fn new<G: PaymentGateway + 'static>(gateway: G) -> Self {
        Self { gateway: Arc::new(gateway) }
    }

    /// Asks the gateway to return the full amount of `order`. Orders that cost nothing are refunded without a
    /// gateway call.
    pub async fn refund(&self, order: &Order) -> Result<RefundReceipt, RefundError> {
        let refund_no = refund_reference(&order.order_no);
        if order.amount.is_zero() {
            debug!("💸️ Order {} cost nothing. No money needs to move for refund {refund_no}", order.order_no);
            return Ok(RefundReceipt { refund_no, gateway_refund_id: None, amount: order.amount });
        }
        info!("💸️ Requesting refund {refund_no} of {} for order {}", order.amount, order.order_no);
        let receipt = self.gateway.refund(&order.order_no, &refund_no, order.amount).await.map_err(|e| {
            error!("💸️ Refund {refund_no} for order {} failed. {e}", order.order_no);
            RefundError::RefundFailed(e)
        })?;
        info!("💸️ Refund {refund_no} accepted by the gateway");
        Ok(receipt)
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Utc;

    use super::*;
    use crate::db_types::OrderStatusType;

    fn order(amount: i64) -> Order {
        Order {
            id: 1,
            order_no: "ORD20240101000000abcdef".into(),
            work_id: 1,
            version_id: None,
            upgrade_from_id: None,
            buyer_email: "alice@example.com".into(),
            buyer_name: None,
            amount: Price::from_minor_units(amount),
            status: OrderStatusType::Paid,
            payment_id: Some("4200".into()),
            paid_at: Some(Utc::now()),
            download_token: Some("token".into()),
            download_count: 2,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[derive(Default)]
    struct CountingGateway {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PaymentGateway for Arc<CountingGateway> {
        async fn refund(&self, _: &str, refund_no: &str, amount: Price) -> Result<RefundReceipt, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(RefundReceipt { refund_no: refund_no.into(), gateway_refund_id: Some("50000".into()), amount })
        }
    }

    #[tokio::test]
    async fn unconfigured_gateway_fails() {
        let err = RefundCoordinator::default().refund(&order(1990)).await.unwrap_err();
        assert_eq!(err, RefundError::RefundFailed(GatewayError::NotConfigured));
    }

    #[tokio::test]
    async fn refund_reference_and_amount_are_passed_through() {
        let gateway = Arc::new(CountingGateway::default());
        let coordinator = RefundCoordinator::new(gateway.clone());
        let receipt = coordinator.refund(&order(1990)).await.unwrap();
        assert_eq!(receipt.refund_no, "ORD20240101000000abcdef-R");
        assert_eq!(receipt.amount.minor_units(), 1990);
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn free_orders_skip_the_gateway() {
        let gateway = Arc::new(CountingGateway::default());
        let coordinator = RefundCoordinator::new(gateway.clone());
        let receipt = coordinator.refund(&order(0)).await.unwrap();
        assert_eq!(receipt.gateway_refund_id, None);
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn api_errors_map_to_gateway_errors() {
        let e = GatewayError::from(WxPayApiError::QueryError { status: 403, message: "NO_AUTH".into() });
        assert_eq!(e, GatewayError::Rejected("403: NO_AUTH".into()));
        let e = GatewayError::from(WxPayApiError::RestResponseError("timeout".into()));
        assert!(matches!(e, GatewayError::Transport(_)));
    }
}
