use crate::core::{ReconcilePlan, Snapshot, StoredProduct};
use std::collections::HashMap;

/// Diffs a snapshot against stored state.
///
/// Snapshot entries are walked once: unknown SKUs are created, products
/// flagged off the list are reactivated (or only relisted when an open period
/// survived), listed products without an open period are reopened, and the
/// rest are only touched. Afterwards every product missing from the snapshot
/// that is still flagged on the list or still holds an open period is closed.
pub fn plan(snapshot: &Snapshot, stored: &[StoredProduct]) -> ReconcilePlan {
    let by_sku: HashMap<&str, &StoredProduct> = stored
        .iter()
        .map(|s| (s.product.sku.as_str(), s))
        .collect();

    let mut plan = ReconcilePlan::default();

    for entry in snapshot.iter() {
        match by_sku.get(entry.sku.as_str()) {
            None => plan.create.push(entry.clone()),
            Some(existing) if !existing.product.in_list && existing.has_open_period => {
                plan.relist.push(existing.product.id)
            }
            Some(existing) if !existing.product.in_list => {
                plan.reactivate.push(existing.product.id)
            }
            Some(existing) if !existing.has_open_period => plan.reopen.push(existing.product.id),
            Some(existing) => plan.touch.push(existing.product.id),
        }
    }

    // 旗標已為 false 但區間仍開著的也要一併結束
    plan.close = stored
        .iter()
        .filter(|s| (s.product.in_list || s.has_open_period) && !snapshot.contains(&s.product.sku))
        .map(|s| s.product.id)
        .collect();

    tracing::debug!(
        "Reconcile plan: create={}, reactivate={}, relist={}, reopen={}, touch={}, close={}",
        plan.create.len(),
        plan.reactivate.len(),
        plan.relist.len(),
        plan.reopen.len(),
        plan.touch.len(),
        plan.close.len()
    );

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Product, SnapshotEntry};
    use chrono::{TimeZone, Utc};

    fn stored(id: i64, sku: &str, in_list: bool, has_open_period: bool) -> StoredProduct {
        let ts = Utc.with_ymd_and_hms(2025, 2, 1, 9, 0, 0).unwrap();
        StoredProduct {
            product: Product {
                id,
                sku: sku.to_string(),
                name: format!("name-{}", sku),
                in_list,
                created_at: ts,
                updated_at: ts,
            },
            has_open_period,
        }
    }

    fn snapshot(skus: &[&str]) -> Snapshot {
        skus.iter()
            .map(|sku| SnapshotEntry {
                sku: sku.to_string(),
                name: format!("file-{}", sku),
            })
            .collect()
    }

    #[test]
    fn test_new_skus_are_created() {
        let plan = plan(&snapshot(&["A", "B"]), &[]);
        let skus: Vec<&str> = plan.create.iter().map(|e| e.sku.as_str()).collect();
        assert_eq!(skus, vec!["A", "B"]);
        assert!(plan.close.is_empty());
    }

    #[test]
    fn test_each_branch_is_classified() {
        let existing = vec![
            stored(1, "ACTIVE", true, true),
            stored(2, "RETURNED", false, false),
            stored(3, "BROKEN", true, false),
            stored(4, "GONE", true, true),
            stored(5, "LONG_GONE", false, false),
        ];
        let plan = plan(&snapshot(&["ACTIVE", "RETURNED", "BROKEN", "NEW"]), &existing);

        assert_eq!(plan.create.len(), 1);
        assert_eq!(plan.create[0].sku, "NEW");
        assert_eq!(plan.touch, vec![1]);
        assert_eq!(plan.reactivate, vec![2]);
        assert_eq!(plan.reopen, vec![3]);
        assert_eq!(plan.close, vec![4]);
        assert!(plan.relist.is_empty());
    }

    #[test]
    fn test_flagged_off_product_with_open_period_is_only_relisted() {
        let existing = vec![stored(1, "STALE", false, true)];
        let plan = plan(&snapshot(&["STALE"]), &existing);

        assert_eq!(plan.relist, vec![1]);
        assert!(plan.reactivate.is_empty());
        assert!(plan.reopen.is_empty());
        assert!(plan.close.is_empty());
        assert!(!plan.is_noop());
    }

    #[test]
    fn test_stale_open_period_is_closed_when_absent() {
        let existing = vec![
            stored(1, "STALE", false, true),
            stored(2, "DONE", false, false),
        ];
        let plan = plan(&snapshot(&["OTHER"]), &existing);

        assert_eq!(plan.close, vec![1]);
        assert!(plan.relist.is_empty());
    }

    #[test]
    fn test_empty_snapshot_closes_every_listed_product() {
        let existing = vec![
            stored(1, "A", true, true),
            stored(2, "B", false, false),
            stored(3, "C", true, false),
        ];
        let plan = plan(&Snapshot::new(), &existing);
        assert_eq!(plan.close, vec![1, 3]);
        assert!(plan.create.is_empty() && plan.reactivate.is_empty());
    }

    #[test]
    fn test_unchanged_state_is_noop() {
        let existing = vec![stored(1, "A", true, true), stored(2, "B", false, false)];
        let plan = plan(&snapshot(&["A"]), &existing);
        assert!(plan.is_noop());
        assert_eq!(plan.touch, vec![1]);
    }
}
