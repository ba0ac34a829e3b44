pub mod activity;
pub mod engine;
pub mod reconcile;

pub use crate::domain::model::{
    ActivityPeriod, Product, ProductFilter, ProductHistory, ProductId, ProductSummary,
    ReconcilePlan, Snapshot, SnapshotEntry, StoredProduct, SyncReport,
};
pub use crate::domain::ports::{ConfigProvider, ProductStore, SnapshotSource};
pub use crate::utils::error::Result;
