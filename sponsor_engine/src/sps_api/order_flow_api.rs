use std::{fmt::Debug, sync::Arc};

use chrono::Utc;
use log::*;
use wxpay_tools::data_objects::DecryptedTransaction;

use crate::{
    db_types::{DeliveryLinks, NewOrder, Order, OrderStatusType, StatusUpdate, WorkVersion},
    events::{EventProducers, OrderPaidEvent, OrderRefundedEvent},
    helpers::{is_plausible_email, new_download_token, new_order_no, normalize_email},
    pricing::{resolve_delivery, resolve_price, UpgradeBasis},
    rate_limiter::{FixedWindowRateLimiter, RateLimiter},
    refunds::RefundCoordinator,
    sps_api::{
        errors::OrderFlowError,
        order_objects::{CreateOrderRequest, OrderReceipt, PaymentOutcome},
    },
    traits::{CatalogManagement, OrderManagement, OrderQueryFilter, StoreError},
};

const ORDER_NO_ATTEMPTS: usize = 5;

/// `OrderFlowApi` is the order state machine. Buyer requests, gateway notifications and admin actions all change
/// orders through it, and through nothing else.
///
/// | From \ To | PENDING | PAID | CANCELLED | REFUNDED |
/// |-----------|---------|------|-----------|----------|
/// | PENDING   | Err     | 1    | 2         | Err      |
/// | PAID      | Err     | 3    | Err       | 4        |
/// | CANCELLED | Err     | Err  | Err       | Err      |
/// | REFUNDED  | Err     | Err  | Err       | Err      |
///
/// 1. Via the gateway notification or an admin. Sets `paid_at`, issues the download token and publishes
///    [`OrderPaidEvent`].
/// 2. Admin only.
/// 3. A repeated admin request is a no-op that returns the order unchanged.
/// 4. Admin only. The gateway refund must succeed first. Revokes the download token and publishes
///    [`OrderRefundedEvent`].
///
/// Every transition is a compare-and-set on the current status, so concurrent callers cannot both apply it.
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
    rate_limiter: Arc<dyn RateLimiter>,
    refunds: RefundCoordinator,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    /// Creates an API with an in-process rate limiter and no payment gateway. Use the `with_*` methods to replace
    /// them.
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self {
            db,
            producers,
            rate_limiter: Arc::new(FixedWindowRateLimiter::default()),
            refunds: RefundCoordinator::default(),
        }
    }

    pub fn with_rate_limiter<L: RateLimiter + 'static>(mut self, limiter: L) -> Self {
        self.rate_limiter = Arc::new(limiter);
        self
    }

    pub fn with_refund_coordinator(mut self, refunds: RefundCoordinator) -> Self {
        self.refunds = refunds;
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}

impl<B> OrderFlowApi<B>
where B: OrderManagement + CatalogManagement
{
    /// Creates an order for a buyer.
    ///
    /// The request is validated and rate limited on the buyer's normalized e-mail address. The target version is the
    /// one requested (which must belong to the work), else the work's latest version, else none. The charge is
    /// computed by [`resolve_price`]; orders that cost nothing are created directly as PAID.
    ///
    /// ## Failure modes
    /// * [`OrderFlowError::Validation`] for a bad work id, e-mail, version, or an upgrade without a prior purchase.
    /// * [`OrderFlowError::RateLimited`] when the buyer has made too many requests.
    /// * [`OrderFlowError::WorkNotFound`], and [`OrderFlowError::NothingToDeliver`] if no delivery link resolves.
    /// * [`OrderFlowError::AlreadyPurchased`], carrying the links, if the buyer already owns this work and version.
    pub async fn create_order(&self, request: CreateOrderRequest) -> Result<OrderReceipt, OrderFlowError> {
        if request.work_id <= 0 {
            return Err(OrderFlowError::Validation("workId must be a positive integer".into()));
        }
        let email = normalize_email(&request.buyer_email);
        if !is_plausible_email(&email) {
            return Err(OrderFlowError::Validation("a valid buyerEmail is required".into()));
        }
        if !self.rate_limiter.allow(&email).await {
            info!("🔄️📦️ Order request from {email} refused by the rate limiter");
            return Err(OrderFlowError::RateLimited);
        }
        let work = self.db.fetch_work(request.work_id).await?.ok_or(OrderFlowError::WorkNotFound(request.work_id))?;
        let version = self.resolve_version(work.id, request.version_id).await?;
        let links = resolve_delivery(&work, version.as_ref());
        if links.is_empty() {
            return Err(OrderFlowError::NothingToDeliver);
        }
        let version_id = version.as_ref().map(|v| v.id);
        if let Some(existing) = self.db.fetch_existing_paid_order(&email, work.id, version_id).await? {
            debug!("🔄️📦️ {email} already owns work #{} through order {}", work.id, existing.order_no);
            return Err(OrderFlowError::AlreadyPurchased(links));
        }
        if let Some(quoted) = request.upgrade_amount {
            debug!("🔄️📦️ Ignoring client-quoted upgrade amount of {quoted} from {email}");
        }
        let upgrade = match request.upgrade_from_id {
            Some(from_id) => {
                let prior = self.db.fetch_existing_paid_order(&email, work.id, Some(from_id)).await?.ok_or_else(|| {
                    OrderFlowError::Validation(format!("no paid order for version {from_id} of this work to upgrade from"))
                })?;
                let owned = self.resolve_version(work.id, Some(from_id)).await?.ok_or_else(|| {
                    OrderFlowError::Validation(format!("version {from_id} of this work no longer exists"))
                })?;
                debug!("🔄️📦️ {email} upgrades from version {} bought in order {}", owned.version, prior.order_no);
                Some(UpgradeBasis::owned_version(&work, &owned))
            },
            None => None,
        };
        let amount = resolve_price(&work, version.as_ref(), upgrade.as_ref());
        let buyer_name = request.buyer_name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());

        let order = self
            .insert_with_fresh_order_no(|order_no| {
                let order = NewOrder::new(order_no, work.id, email.clone(), amount)
                    .with_version(version_id)
                    .with_upgrade_from(request.upgrade_from_id)
                    .with_buyer_name(buyer_name.clone());
                if amount.is_zero() {
                    order.already_paid(new_download_token())
                } else {
                    order
                }
            })
            .await?;
        info!("🔄️📦️ Order {} created for {email}: {} ({})", order.order_no, order.amount, order.status);
        if order.is_paid() {
            self.producers.publish_order_paid(OrderPaidEvent::new(order.clone(), links.clone())).await;
            return Ok(OrderReceipt { order, delivery: Some(links) });
        }
        Ok(OrderReceipt { order, delivery: None })
    }

    async fn resolve_version(
        &self,
        work_id: i64,
        version_id: Option<i64>,
    ) -> Result<Option<WorkVersion>, OrderFlowError> {
        match version_id {
            Some(id) => match self.db.fetch_work_version(id).await? {
                Some(v) if v.work_id == work_id => Ok(Some(v)),
                _ => Err(OrderFlowError::Validation(format!("version {id} does not belong to work {work_id}"))),
            },
            None => Ok(self.db.fetch_latest_work_version(work_id).await?),
        }
    }

    async fn insert_with_fresh_order_no<F>(&self, build: F) -> Result<Order, OrderFlowError>
    where F: Fn(String) -> NewOrder {
        let mut last_error = None;
        for _ in 0..ORDER_NO_ATTEMPTS {
            match self.db.insert_order(build(new_order_no(Utc::now()))).await {
                Ok(order) => return Ok(order),
                Err(e @ StoreError::OrderNumberExists(_)) => {
                    warn!("🔄️📦️ {e}. Retrying with a new number.");
                    last_error = Some(e);
                },
                Err(e) => return Err(e.into()),
            }
        }
        let e = last_error.unwrap_or_else(|| StoreError::DatabaseError("could not allocate an order number".into()));
        Err(e.into())
    }

    /// Applies a verified, decrypted payment notification from the gateway.
    ///
    /// Non-successful trade states are ignored. An order that has already left PENDING is reported as
    /// [`PaymentOutcome::AlreadyProcessed`] and left alone, which makes redelivered notifications harmless. If the
    /// notification reports an amount that differs from the order's, the order is not touched.
    pub async fn process_payment_notification(
        &self,
        tx: DecryptedTransaction,
    ) -> Result<PaymentOutcome, OrderFlowError> {
        if !tx.is_success() {
            debug!("🔄️💰️ Notification for {} has trade state {}. Ignoring.", tx.out_trade_no, tx.trade_state);
            return Ok(PaymentOutcome::Ignored);
        }
        let order = self.db.fetch_order_by_order_no(&tx.out_trade_no).await?.ok_or_else(|| {
            warn!("🔄️💰️ Payment notification for unknown order {}", tx.out_trade_no);
            OrderFlowError::OrderNotFound
        })?;
        if order.status != OrderStatusType::Pending {
            debug!("🔄️💰️ Order {} is already {}. Notification is a no-op.", order.order_no, order.status);
            return Ok(PaymentOutcome::AlreadyProcessed(order));
        }
        if let Some(paid) = &tx.amount {
            let expected = order.amount.minor_units();
            if paid.total != expected {
                error!(
                    "🔄️💰️ Order {} expects {expected} but the gateway reports {} paid. Leaving the order as is.",
                    order.order_no, paid.total
                );
                return Err(OrderFlowError::AmountMismatch { expected, received: paid.total });
            }
        }
        let update = StatusUpdate::paid(Utc::now(), new_download_token()).with_payment_id(tx.transaction_id.clone());
        match self.db.update_order_status(order.id, OrderStatusType::Pending, update).await? {
            Some(paid) => {
                info!("🔄️💰️ Order {} is PAID (transaction {})", paid.order_no, tx.transaction_id);
                self.publish_paid(&paid).await;
                Ok(PaymentOutcome::Paid(paid))
            },
            None => {
                debug!("🔄️💰️ Order {} changed status concurrently. Notification is a no-op.", order.order_no);
                let current = self.db.fetch_order_by_id(order.id).await?.ok_or(OrderFlowError::OrderNotFound)?;
                Ok(PaymentOutcome::AlreadyProcessed(current))
            },
        }
    }

    /// Changes the status of an order on behalf of an admin. See the table on [`OrderFlowApi`] for the legal moves.
    ///
    /// A refund calls the payment gateway first; if that fails the order is left untouched and
    /// [`OrderFlowError::RefundFailed`] is returned.
    pub async fn modify_status_for_order(&self, id: i64, new_status: OrderStatusType) -> Result<Order, OrderFlowError> {
        let order = self.db.fetch_order_by_id(id).await?.ok_or(OrderFlowError::OrderNotFound)?;
        use OrderStatusType::*;
        match (order.status, new_status) {
            (Paid, Paid) => {
                debug!("🔄️ Order {} is already PAID. Nothing to do.", order.order_no);
                Ok(order)
            },
            (Pending, Paid) => self.pending_to_paid(order).await,
            (Pending, Cancelled) => self.transition(order, StatusUpdate::new(Cancelled)).await,
            (Paid, Refunded) => self.paid_to_refunded(order).await,
            (from, to) => {
                warn!("🔄️ Refusing to move order {} from {from} to {to}", order.order_no);
                Err(OrderFlowError::InvalidTransition { from, to })
            },
        }
    }

    async fn pending_to_paid(&self, order: Order) -> Result<Order, OrderFlowError> {
        let update = StatusUpdate::paid(Utc::now(), new_download_token());
        match self.db.update_order_status(order.id, OrderStatusType::Pending, update).await? {
            Some(paid) => {
                info!("🔄️ Order {} marked as PAID by an admin", paid.order_no);
                self.publish_paid(&paid).await;
                Ok(paid)
            },
            None => {
                let current = self.db.fetch_order_by_id(order.id).await?.ok_or(OrderFlowError::OrderNotFound)?;
                match current.status {
                    OrderStatusType::Paid => Ok(current),
                    from => Err(OrderFlowError::InvalidTransition { from, to: OrderStatusType::Paid }),
                }
            },
        }
    }

    async fn paid_to_refunded(&self, order: Order) -> Result<Order, OrderFlowError> {
        let receipt = self.refunds.refund(&order).await?;
        let refunded = self.transition(order, StatusUpdate::refunded()).await.map_err(|e| {
            error!(
                "🔄️ Refund {} was accepted by the gateway, but the order could not be marked REFUNDED. {e}",
                receipt.refund_no
            );
            e
        })?;
        info!("🔄️ Order {} is REFUNDED ({})", refunded.order_no, receipt.refund_no);
        self.producers.publish_order_refunded(OrderRefundedEvent::new(refunded.clone())).await;
        Ok(refunded)
    }

    /// A CAS from the order's current status. If another caller got there first, the move is re-evaluated against the
    /// status it left behind, which is never legal for the two transitions that use this.
    async fn transition(&self, order: Order, update: StatusUpdate) -> Result<Order, OrderFlowError> {
        let to = update.new_status;
        match self.db.update_order_status(order.id, order.status, update).await? {
            Some(updated) => {
                info!("🔄️ Order {} moved from {} to {to}", updated.order_no, order.status);
                Ok(updated)
            },
            None => {
                let current = self.db.fetch_order_by_id(order.id).await?.ok_or(OrderFlowError::OrderNotFound)?;
                Err(OrderFlowError::InvalidTransition { from: current.status, to })
            },
        }
    }

    async fn publish_paid(&self, order: &Order) {
        let delivery = match self.delivery_links(order).await {
            Ok(links) => links,
            Err(e) => {
                error!("🔄️ Could not resolve delivery links for order {}. {e}", order.order_no);
                DeliveryLinks::default()
            },
        };
        self.producers.publish_order_paid(OrderPaidEvent::new(order.clone(), delivery)).await;
    }

    /// The delivery links for the work and version an order was placed for
    pub async fn delivery_links(&self, order: &Order) -> Result<DeliveryLinks, OrderFlowError> {
        let work = self.db.fetch_work(order.work_id).await?.ok_or(OrderFlowError::WorkNotFound(order.work_id))?;
        let version = match order.version_id {
            Some(id) => self.db.fetch_work_version(id).await?,
            None => None,
        };
        Ok(resolve_delivery(&work, version.as_ref()))
    }

    /// Removes an order regardless of its status. Never contacts the payment gateway.
    pub async fn delete_order(&self, id: i64) -> Result<(), OrderFlowError> {
        if self.db.delete_order(id).await? {
            info!("🔄️ Order #{id} deleted by an admin");
            Ok(())
        } else {
            Err(OrderFlowError::OrderNotFound)
        }
    }

    /// Looks up an order by its public number for status polling. Links are included once the order is PAID.
    pub async fn fetch_order(&self, order_no: &str) -> Result<OrderReceipt, OrderFlowError> {
        let order = self.db.fetch_order_by_order_no(order_no).await?.ok_or(OrderFlowError::OrderNotFound)?;
        let delivery = if order.is_paid() { Some(self.delivery_links(&order).await?) } else { None };
        Ok(OrderReceipt { order, delivery })
    }

    /// Exchanges a download token for the delivery links of its PAID order and counts the download.
    pub async fn redeem_download(&self, token: &str) -> Result<DeliveryLinks, OrderFlowError> {
        if token.trim().is_empty() {
            return Err(OrderFlowError::OrderNotFound);
        }
        let order = self.db.fetch_order_by_download_token(token).await?.ok_or(OrderFlowError::OrderNotFound)?;
        let order = self.db.increment_download_count(order.id).await?.ok_or(OrderFlowError::OrderNotFound)?;
        debug!("🔄️ Order {} downloaded {} time(s)", order.order_no, order.download_count);
        self.delivery_links(&order).await
    }

    pub async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderFlowError> {
        trace!("🔄️ Searching orders. {query}");
        Ok(self.db.search_orders(query).await?)
    }
}
