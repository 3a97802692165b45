use chrono::{DateTime, Duration, Utc};
use sqlx::SqliteConnection;

/// Counts one call against `key` and returns the count in the active window, capped at `max_calls + 1`.
///
/// All the `CASE` arms read the row as it was before the update, so the reset and the increment are decided on the
/// same snapshot.
pub async fn register_call(
    key: &str,
    now: DateTime<Utc>,
    window: Duration,
    max_calls: u32,
    conn: &mut SqliteConnection,
) -> Result<i64, sqlx::Error> {
    let now_ms = now.timestamp_millis();
    let expired_before = now_ms - window.num_milliseconds();
    let cap = i64::from(max_calls) + 1;
    let count: i64 = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO rate_limits (key, window_start, count) VALUES ($1, $2, 1)
        ON CONFLICT (key) DO UPDATE SET
            window_start = CASE WHEN rate_limits.window_start <= $3 THEN excluded.window_start
                                ELSE rate_limits.window_start END,
            count = CASE WHEN rate_limits.window_start <= $3 THEN 1
                         ELSE MIN(rate_limits.count + 1, $4) END
        RETURNING count;
        "#,
    )
    .bind(key)
    .bind(now_ms)
    .bind(expired_before)
    .bind(cap)
    .fetch_all(conn)
    .await?
    .pop()
    .ok_or(sqlx::Error::RowNotFound)?;
    Ok(count)
}
