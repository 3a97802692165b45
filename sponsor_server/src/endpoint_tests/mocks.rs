use mockall::mock;
use sponsor_engine::{
    db_types::{NewOrder, NewWork, NewWorkVersion, Order, OrderStatusType, StatusUpdate, Work, WorkVersion},
    traits::{CatalogManagement, OrderManagement, OrderQueryFilter, StoreError},
};

mock! {
    pub Store {}
    impl OrderManagement for Store {
        async fn fetch_existing_paid_order(&self, buyer_email: &str, work_id: i64, version_id: Option<i64>) -> Result<Option<Order>, StoreError>;
        async fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError>;
        async fn fetch_order_by_order_no(&self, order_no: &str) -> Result<Option<Order>, StoreError>;
        async fn fetch_order_by_id(&self, id: i64) -> Result<Option<Order>, StoreError>;
        async fn update_order_status(&self, id: i64, expected: OrderStatusType, update: StatusUpdate) -> Result<Option<Order>, StoreError>;
        async fn fetch_order_by_download_token(&self, token: &str) -> Result<Option<Order>, StoreError>;
        async fn increment_download_count(&self, id: i64) -> Result<Option<Order>, StoreError>;
        async fn delete_order(&self, id: i64) -> Result<bool, StoreError>;
        async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, StoreError>;
    }
    impl CatalogManagement for Store {
        async fn fetch_work(&self, id: i64) -> Result<Option<Work>, StoreError>;
        async fn fetch_work_version(&self, id: i64) -> Result<Option<WorkVersion>, StoreError>;
        async fn fetch_latest_work_version(&self, work_id: i64) -> Result<Option<WorkVersion>, StoreError>;
        async fn insert_work(&self, work: NewWork) -> Result<Work, StoreError>;
        async fn insert_work_version(&self, version: NewWorkVersion) -> Result<WorkVersion, StoreError>;
    }
}
