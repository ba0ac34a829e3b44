use crate::core::reconcile;
use crate::core::{ProductStore, SnapshotSource, SyncReport};
use crate::utils::error::Result;
use chrono::{DateTime, Utc};

pub struct SyncEngine<S: SnapshotSource, P: ProductStore> {
    source: S,
    store: P,
}

impl<S: SnapshotSource, P: ProductStore> SyncEngine<S, P> {
    pub fn new(source: S, store: P) -> Self {
        Self { source, store }
    }

    pub fn store(&self) -> &P {
        &self.store
    }

    pub async fn run(&self) -> Result<SyncReport> {
        self.run_at(Utc::now()).await
    }

    /// 整次執行共用同一個時間戳
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<SyncReport> {
        tracing::info!("Starting reconcile run at {}", now.to_rfc3339());

        // Extract
        tracing::info!("Fetching unrecognized product list...");
        let snapshot = self.source.fetch().await?;
        tracing::info!("Snapshot contains {} SKU", snapshot.len());

        // Diff
        let stored = self.store.load_products().await?;
        tracing::debug!("Loaded {} stored products", stored.len());
        let plan = reconcile::plan(&snapshot, &stored);

        // Load
        self.store.apply(&plan, now).await?;

        let report = SyncReport::from_plan(snapshot.len(), &plan, now);
        tracing::info!("{}", report.summary());
        Ok(report)
    }
}
