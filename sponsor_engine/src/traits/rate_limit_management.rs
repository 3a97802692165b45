use chrono::{DateTime, Duration, Utc};

use crate::traits::StoreError;

#[allow(async_fn_in_trait)]
pub trait RateLimitManagement {
    /// Records one call for `key` in the fixed window that contains `now`, as a single atomic operation.
    ///
    /// A window that started more than `window` ago is replaced by a fresh one. Calls beyond `max_calls` in the active
    /// window are not counted. Returns `true` if this call was admitted.
    async fn register_call(
        &self,
        key: &str,
        now: DateTime<Utc>,
        window: Duration,
        max_calls: u32,
    ) -> Result<bool, StoreError>;
}
