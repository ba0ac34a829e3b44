use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type ProductId = i64;

/// A product that has been seen on the unrecognized list at least once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub sku: String,
    pub name: String,
    /// Currently on the unrecognized list.
    pub in_list: bool,
    /// First time the product was found on the list.
    pub created_at: DateTime<Utc>,
    /// Last run that changed or checked the product.
    pub updated_at: DateTime<Utc>,
}

/// One contiguous stay on the list. `ended_at == None` means still open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityPeriod {
    pub id: i64,
    pub product_id: ProductId,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl ActivityPeriod {
    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }

    pub fn duration(&self, now: DateTime<Utc>) -> Duration {
        let end = self.ended_at.unwrap_or(now);
        (end - self.started_at).max(Duration::zero())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub sku: String,
    pub name: String,
}

/// Parsed contents of one downloaded spreadsheet, keyed by SKU.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    entries: HashMap<String, SnapshotEntry>,
    order: Vec<String>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// 重複的 SKU 以最後一筆為準，但保留第一次出現的順序
    pub fn insert(&mut self, entry: SnapshotEntry) {
        if !self.entries.contains_key(&entry.sku) {
            self.order.push(entry.sku.clone());
        }
        self.entries.insert(entry.sku.clone(), entry);
    }

    pub fn get(&self, sku: &str) -> Option<&SnapshotEntry> {
        self.entries.get(sku)
    }

    pub fn contains(&self, sku: &str) -> bool {
        self.entries.contains_key(sku)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SnapshotEntry> {
        self.order.iter().filter_map(|sku| self.entries.get(sku))
    }
}

impl FromIterator<SnapshotEntry> for Snapshot {
    fn from_iter<I: IntoIterator<Item = SnapshotEntry>>(iter: I) -> Self {
        let mut snapshot = Snapshot::new();
        for entry in iter {
            snapshot.insert(entry);
        }
        snapshot
    }
}

/// Stored product as seen by the reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredProduct {
    pub product: Product,
    pub has_open_period: bool,
}

/// Mutations decided by one reconcile pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// New products; each gets an open period.
    pub create: Vec<SnapshotEntry>,
    /// Products flagged off the list that came back; flag set and a period opened.
    pub reactivate: Vec<ProductId>,
    /// Flagged off the list but an open period survived; only the flag is set.
    pub relist: Vec<ProductId>,
    /// Products flagged on the list without an open period; a period is opened.
    pub reopen: Vec<ProductId>,
    /// Still listed and open; only `updated_at` moves.
    pub touch: Vec<ProductId>,
    /// Absent from the snapshot while flagged on the list or holding an open period.
    pub close: Vec<ProductId>,
}

impl ReconcilePlan {
    pub fn is_noop(&self) -> bool {
        self.create.is_empty()
            && self.reactivate.is_empty()
            && self.relist.is_empty()
            && self.reopen.is_empty()
            && self.close.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub snapshot_size: usize,
    pub created: usize,
    pub reactivated: usize,
    pub relisted: usize,
    pub reopened: usize,
    pub touched: usize,
    pub closed: usize,
    pub ran_at: DateTime<Utc>,
}

impl SyncReport {
    pub fn from_plan(snapshot_size: usize, plan: &ReconcilePlan, ran_at: DateTime<Utc>) -> Self {
        Self {
            snapshot_size,
            created: plan.create.len(),
            reactivated: plan.reactivate.len(),
            relisted: plan.relist.len(),
            reopened: plan.reopen.len(),
            touched: plan.touch.len(),
            closed: plan.close.len(),
            ran_at,
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "Processed {} SKU from file. New products created: {}. Reactivated: {}. Closed (dropped from file): {}.",
            self.snapshot_size, self.created, self.reactivated, self.closed
        )
    }
}

/// Filter for listing products (admin list filter + search).
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub in_list: Option<bool>,
    /// Case-insensitive substring on name or SKU.
    pub search: Option<String>,
}

impl ProductFilter {
    pub fn matches(&self, product: &Product) -> bool {
        if let Some(in_list) = self.in_list {
            if product.in_list != in_list {
                return false;
            }
        }
        match self.search.as_deref().map(str::trim) {
            Some(needle) if !needle.is_empty() => {
                let needle = needle.to_lowercase();
                product.name.to_lowercase().contains(&needle)
                    || product.sku.to_lowercase().contains(&needle)
            }
            _ => true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProductHistory {
    pub product: Product,
    pub periods: Vec<ActivityPeriod>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductSummary {
    pub sku: String,
    pub name: String,
    pub in_list: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub period_count: usize,
    pub total_active_seconds: Option<i64>,
}
