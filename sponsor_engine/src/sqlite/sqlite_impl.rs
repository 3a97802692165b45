//! `SqliteDatabase` is the concrete SQLite backend of the order engine.
//!
//! It implements all the traits defined in the [`crate::traits`] module. Each trait method is a thin wrapper that
//! acquires a connection and calls through to the free functions in [`super::db`].
use std::fmt::Debug;

use chrono::{DateTime, Duration, Utc};
use log::*;
use sqlx::{migrate::MigrateError, SqlitePool};

use super::db::{db_url, new_pool, orders, rate_limits, works};
use crate::{
    db_types::{NewOrder, NewWork, NewWorkVersion, Order, OrderStatusType, StatusUpdate, Work, WorkVersion},
    traits::{CatalogManagement, OrderManagement, OrderQueryFilter, RateLimitManagement, StoreError},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl OrderManagement for SqliteDatabase {
    async fn fetch_existing_paid_order(
        &self,
        buyer_email: &str,
        work_id: i64,
        version_id: Option<i64>,
    ) -> Result<Option<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_paid_order_for_buyer(buyer_email, work_id, version_id, &mut conn).await?;
        Ok(order)
    }

    async fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::insert_order(order, &mut conn).await?;
        debug!("🗃️ Order [{}] has been saved in the DB with id {} as {}", order.order_no, order.id, order.status);
        Ok(order)
    }

    async fn fetch_order_by_order_no(&self, order_no: &str) -> Result<Option<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_order_no(order_no, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_by_id(&self, id: i64) -> Result<Option<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_id(id, &mut conn).await?;
        Ok(order)
    }

    async fn update_order_status(
        &self,
        id: i64,
        expected: OrderStatusType,
        update: StatusUpdate,
    ) -> Result<Option<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::update_order_status(id, expected, update, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_by_download_token(&self, token: &str) -> Result<Option<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_download_token(token, &mut conn).await?;
        Ok(order)
    }

    async fn increment_download_count(&self, id: i64) -> Result<Option<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::increment_download_count(id, &mut conn).await?;
        Ok(order)
    }

    async fn delete_order(&self, id: i64) -> Result<bool, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let deleted = orders::delete_order(id, &mut conn).await?;
        if deleted {
            info!("🗃️ Order #{id} has been deleted");
        }
        Ok(deleted)
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::search_orders(query, &mut conn).await?;
        Ok(orders)
    }
}

impl CatalogManagement for SqliteDatabase {
    async fn fetch_work(&self, id: i64) -> Result<Option<Work>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let work = works::fetch_work(id, &mut conn).await?;
        Ok(work)
    }

    async fn fetch_work_version(&self, id: i64) -> Result<Option<WorkVersion>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let version = works::fetch_work_version(id, &mut conn).await?;
        Ok(version)
    }

    async fn fetch_latest_work_version(&self, work_id: i64) -> Result<Option<WorkVersion>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let version = works::fetch_latest_work_version(work_id, &mut conn).await?;
        Ok(version)
    }

    async fn insert_work(&self, work: NewWork) -> Result<Work, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let work = works::insert_work(work, &mut conn).await?;
        Ok(work)
    }

    async fn insert_work_version(&self, version: NewWorkVersion) -> Result<WorkVersion, StoreError> {
        let mut tx = self.pool.begin().await?;
        let work_id = version.work_id;
        works::fetch_work(work_id, &mut tx).await?.ok_or(StoreError::WorkNotFound(work_id))?;
        let version = works::insert_work_version(version, &mut tx).await?;
        tx.commit().await?;
        Ok(version)
    }
}

impl RateLimitManagement for SqliteDatabase {
    async fn register_call(
        &self,
        key: &str,
        now: DateTime<Utc>,
        window: Duration,
        max_calls: u32,
    ) -> Result<bool, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let count = rate_limits::register_call(key, now, window, max_calls, &mut conn).await?;
        trace!("🚦️ {key} has made {count} call(s) in the current window");
        Ok(count <= i64::from(max_calls))
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL in `SPS_DATABASE_URL`
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date. Safe to call on every start-up.
    pub async fn run_migrations(&self) -> Result<(), MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations are up to date");
        Ok(())
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&mut self) {
        self.pool.close().await;
    }
}
