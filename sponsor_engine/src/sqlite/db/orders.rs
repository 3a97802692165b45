use chrono::Utc;
use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{NewOrder, Order, OrderStatusType, StatusUpdate},
    traits::{OrderQueryFilter, StoreError},
};

const DEFAULT_SEARCH_LIMIT: i64 = 100;

/// Inserts a new order. A clash on `order_no` is reported as [`StoreError::OrderNumberExists`] so that the caller can
/// retry with a fresh number.
///
/// Statements with a `RETURNING` clause are always drained with `fetch_all`. SQLite only completes the write once the
/// statement has been stepped to the end, and until then other pooled connections cannot see the row.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, StoreError> {
    let order_no = order.order_no.clone();
    let result: Result<Vec<Order>, sqlx::Error> = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_no,
                work_id,
                version_id,
                upgrade_from_id,
                buyer_email,
                buyer_name,
                amount,
                status,
                paid_at,
                download_token,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
            RETURNING *;
        "#,
    )
    .bind(order.order_no)
    .bind(order.work_id)
    .bind(order.version_id)
    .bind(order.upgrade_from_id)
    .bind(order.buyer_email)
    .bind(order.buyer_name)
    .bind(order.amount)
    .bind(order.status)
    .bind(order.paid_at)
    .bind(order.download_token)
    .bind(order.created_at)
    .fetch_all(conn)
    .await;
    match result {
        Ok(mut rows) => rows.pop().ok_or_else(|| StoreError::DatabaseError("The new order was not returned".into())),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() && e.message().contains("order_no") => {
            debug!("🗃️ Order number {order_no} is already taken");
            Err(StoreError::OrderNumberExists(order_no))
        },
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch_order_by_id(id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn fetch_order_by_order_no(
    order_no: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE order_no = $1").bind(order_no).fetch_optional(conn).await
}

pub async fn fetch_order_by_download_token(
    token: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE download_token = $1").bind(token).fetch_optional(conn).await
}

/// `version_id IS $3` also matches when both sides are NULL.
pub async fn fetch_paid_order_for_buyer(
    buyer_email: &str,
    work_id: i64,
    version_id: Option<i64>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT * FROM orders
        WHERE buyer_email = $1 AND work_id = $2 AND version_id IS $3 AND status = 'PAID'
        ORDER BY paid_at DESC, id DESC
        LIMIT 1
        "#,
    )
    .bind(buyer_email)
    .bind(work_id)
    .bind(version_id)
    .fetch_optional(conn)
    .await
}

/// The compare-and-set status transition. The `WHERE` clause carries the expected status, so when two callers race,
/// exactly one of them gets a row back.
pub async fn update_order_status(
    id: i64,
    expected: OrderStatusType,
    update: StatusUpdate,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let new_status = update.new_status;
    let order: Option<Order> = sqlx::query_as::<_, Order>(
        r#"
        UPDATE orders SET
            status = $1,
            payment_id = COALESCE($2, payment_id),
            paid_at = COALESCE(paid_at, $3),
            download_token = CASE WHEN $4 THEN NULL ELSE COALESCE(download_token, $5) END,
            download_count = CASE WHEN $4 THEN 0 ELSE download_count END,
            updated_at = $6
        WHERE id = $7 AND status = $8
        RETURNING *;
        "#,
    )
    .bind(new_status)
    .bind(update.payment_id)
    .bind(update.paid_at)
    .bind(update.revoke_delivery)
    .bind(update.download_token)
    .bind(Utc::now())
    .bind(id)
    .bind(expected)
    .fetch_all(conn)
    .await?
    .pop();
    match &order {
        Some(o) => trace!("🗃️ Order #{id} [{}] moved from {expected} to {new_status}", o.order_no),
        None => trace!("🗃️ Order #{id} was not in {expected} status. No change made."),
    }
    Ok(order)
}

pub async fn increment_download_count(id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let rows: Vec<Order> = sqlx::query_as(
        "UPDATE orders SET download_count = download_count + 1 WHERE id = $1 AND status = 'PAID' RETURNING *",
    )
    .bind(id)
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().next())
}

pub async fn delete_order(id: i64, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM orders WHERE id = $1").bind(id).execute(conn).await?;
    Ok(result.rows_affected() > 0)
}

/// Fetches orders according to criteria specified in the `OrderQueryFilter`
///
/// Resulting orders are ordered by `created_at` in descending order
pub async fn search_orders(query: OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM orders ");
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(order_no) = query.order_no {
        where_clause.push("order_no = ");
        where_clause.push_bind_unseparated(order_no);
    }
    if let Some(email) = query.buyer_email {
        where_clause.push("buyer_email = ");
        where_clause.push_bind_unseparated(email);
    }
    if let Some(work_id) = query.work_id {
        where_clause.push("work_id = ");
        where_clause.push_bind_unseparated(work_id);
    }
    if let Some(status) = query.status {
        where_clause.push("status = ");
        where_clause.push_bind_unseparated(status);
    }
    if let Some(since) = query.since {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(until) = query.until {
        where_clause.push("created_at <= ");
        where_clause.push_bind_unseparated(until);
    }
    builder.push(" ORDER BY created_at DESC, id DESC LIMIT ");
    builder.push_bind(query.limit.unwrap_or(DEFAULT_SEARCH_LIMIT).max(1));

    trace!("🗃️ Executing query: {}", builder.sql());
    let orders = builder.build_query_as::<Order>().fetch_all(conn).await?;
    trace!("🗃️ Result of search_orders: {}", orders.len());
    Ok(orders)
}
