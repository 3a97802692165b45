use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{NewOrder, Order, OrderStatusType, StatusUpdate},
    traits::StoreError,
};

#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    /// Returns the most recent PAID order for the buyer, work and version combination, if there is one.
    /// `version_id = None` matches orders that were placed without a version.
    async fn fetch_existing_paid_order(
        &self,
        buyer_email: &str,
        work_id: i64,
        version_id: Option<i64>,
    ) -> Result<Option<Order>, StoreError>;

    /// Stores a new order. Fails with [`StoreError::OrderNumberExists`] if the order number is taken.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError>;

    async fn fetch_order_by_order_no(&self, order_no: &str) -> Result<Option<Order>, StoreError>;

    async fn fetch_order_by_id(&self, id: i64) -> Result<Option<Order>, StoreError>;

    /// Applies `update` only if the order's stored status is still `expected`.
    ///
    /// Returns the updated order, or `None` if the order does not exist or its status had already moved on. In the
    /// latter case nothing is written.
    async fn update_order_status(
        &self,
        id: i64,
        expected: OrderStatusType,
        update: StatusUpdate,
    ) -> Result<Option<Order>, StoreError>;

    async fn fetch_order_by_download_token(&self, token: &str) -> Result<Option<Order>, StoreError>;

    /// Bumps the download counter of a PAID order. Returns the updated order, or `None` if the order is not PAID.
    async fn increment_download_count(&self, id: i64) -> Result<Option<Order>, StoreError>;

    /// Removes the order unconditionally. Returns `false` if there was nothing to delete.
    async fn delete_order(&self, id: i64) -> Result<bool, StoreError>;

    /// Orders matching the filter, newest first
    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, StoreError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderQueryFilter {
    pub order_no: Option<String>,
    pub buyer_email: Option<String>,
    pub work_id: Option<i64>,
    pub status: Option<OrderStatusType>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

impl OrderQueryFilter {
    pub fn with_order_no<S: Into<String>>(mut self, order_no: S) -> Self {
        self.order_no = Some(order_no.into());
        self
    }

    pub fn with_buyer_email<S: Into<String>>(mut self, email: S) -> Self {
        self.buyer_email = Some(email.into());
        self
    }

    pub fn with_work_id(mut self, work_id: i64) -> Self {
        self.work_id = Some(work_id);
        self
    }

    pub fn with_status(mut self, status: OrderStatusType) -> Self {
        self.status = Some(status);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.order_no.is_none() &&
            self.buyer_email.is_none() &&
            self.work_id.is_none() &&
            self.status.is_none() &&
            self.since.is_none() &&
            self.until.is_none()
    }
}

impl Display for OrderQueryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            write!(f, "No filters. ")?;
        }
        if let Some(order_no) = &self.order_no {
            write!(f, "order_no: {order_no}. ")?;
        }
        if let Some(email) = &self.buyer_email {
            write!(f, "buyer_email: {email}. ")?;
        }
        if let Some(work_id) = &self.work_id {
            write!(f, "work_id: {work_id}. ")?;
        }
        if let Some(status) = &self.status {
            write!(f, "status: {status}. ")?;
        }
        if let Some(since) = &self.since {
            write!(f, "since {since}. ")?;
        }
        if let Some(until) = &self.until {
            write!(f, "until {until}. ")?;
        }
        if let Some(limit) = &self.limit {
            write!(f, "limit {limit}. ")?;
        }
        Ok(())
    }
}
