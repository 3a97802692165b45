use crate::{
    db_types::{NewWork, NewWorkVersion, Work, WorkVersion},
    traits::StoreError,
};

/// Read access to the catalog of works. The insert methods exist for seeding and tests; the order engine never
/// writes to the catalog.
#[allow(async_fn_in_trait)]
pub trait CatalogManagement {
    async fn fetch_work(&self, id: i64) -> Result<Option<Work>, StoreError>;

    async fn fetch_work_version(&self, id: i64) -> Result<Option<WorkVersion>, StoreError>;

    /// The version of the work with the greatest `created_at`
    async fn fetch_latest_work_version(&self, work_id: i64) -> Result<Option<WorkVersion>, StoreError>;

    async fn insert_work(&self, work: NewWork) -> Result<Work, StoreError>;

    async fn insert_work_version(&self, version: NewWorkVersion) -> Result<WorkVersion, StoreError>;
}
