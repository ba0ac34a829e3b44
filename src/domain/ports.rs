use crate::domain::model::{ProductFilter, ProductHistory, ReconcilePlan, Snapshot, StoredProduct};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Where the list of currently unrecognized products comes from.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch(&self) -> Result<Snapshot>;
}

#[async_trait]
pub trait ProductStore: Send + Sync {
    /// All products regardless of list membership.
    async fn load_products(&self) -> Result<Vec<StoredProduct>>;

    /// Applies the whole plan atomically, stamping every change with `now`.
    async fn apply(&self, plan: &ReconcilePlan, now: DateTime<Utc>) -> Result<()>;

    async fn list_histories(&self, filter: &ProductFilter) -> Result<Vec<ProductHistory>>;
}

/// Settings for the marketplace login/download sequence.
pub trait ConfigProvider: Send + Sync {
    fn login_url(&self) -> &str;
    fn continue_url(&self) -> &str;
    fn oauth_url(&self) -> &str;
    fn download_url(&self) -> &str;
    fn username(&self) -> &str;
    fn password(&self) -> &str;
    fn session_cookie(&self) -> &str;
    fn user_agent(&self) -> &str;
    /// Referer sent to the cabinet host during the OAuth hand-off and download.
    fn referer(&self) -> &str;
    fn request_timeout_seconds(&self) -> u64;
}
