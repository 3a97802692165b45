use chrono::Utc;
use log::debug;
use sqlx::SqliteConnection;

use crate::db_types::{NewWork, NewWorkVersion, Work, WorkVersion};

pub async fn fetch_work(id: i64, conn: &mut SqliteConnection) -> Result<Option<Work>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM works WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn fetch_work_version(id: i64, conn: &mut SqliteConnection) -> Result<Option<WorkVersion>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM work_versions WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn fetch_latest_work_version(
    work_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<WorkVersion>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM work_versions WHERE work_id = $1 ORDER BY created_at DESC, id DESC LIMIT 1")
        .bind(work_id)
        .fetch_optional(conn)
        .await
}

pub async fn insert_work(work: NewWork, conn: &mut SqliteConnection) -> Result<Work, sqlx::Error> {
    let work: Work = sqlx::query_as::<_, Work>(
        r#"
        INSERT INTO works (title, price, is_free, figma_url, delivery_url, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *;
        "#,
    )
    .bind(work.title)
    .bind(work.price)
    .bind(work.is_free)
    .bind(work.figma_url)
    .bind(work.delivery_url)
    .bind(Utc::now())
    .fetch_all(conn)
    .await?
    .pop()
    .ok_or(sqlx::Error::RowNotFound)?;
    debug!("🗃️ Work #{} ({}) saved", work.id, work.title);
    Ok(work)
}

pub async fn insert_work_version(
    version: NewWorkVersion,
    conn: &mut SqliteConnection,
) -> Result<WorkVersion, sqlx::Error> {
    let version: WorkVersion = sqlx::query_as::<_, WorkVersion>(
        r#"
        INSERT INTO work_versions (work_id, version, price, figma_url, delivery_url, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *;
        "#,
    )
    .bind(version.work_id)
    .bind(version.version)
    .bind(version.price)
    .bind(version.figma_url)
    .bind(version.delivery_url)
    .bind(version.created_at)
    .fetch_all(conn)
    .await?
    .pop()
    .ok_or(sqlx::Error::RowNotFound)?;
    debug!("🗃️ Version {} of work #{} saved with id {}", version.version, version.work_id, version.id);
    Ok(version)
}
