// SQLite persistence for products and their activity periods (sqlx)

use crate::core::{
    ActivityPeriod, Product, ProductFilter, ProductHistory, ProductId, ProductStore,
    ReconcilePlan, StoredProduct,
};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

// SQLite 綁定參數上限，批次寫入時分段
const BATCH_SIZE: usize = 500;

const CREATE_PRODUCTS_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS products (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        sku TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        in_list BOOLEAN NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
"#;

const CREATE_PERIODS_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS activity_periods (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        product_id INTEGER NOT NULL,
        started_at TEXT NOT NULL,
        ended_at TEXT,
        FOREIGN KEY (product_id) REFERENCES products (id) ON DELETE CASCADE
    )
"#;

const CREATE_PERIODS_INDEX_SQL: &str = r#"
    CREATE INDEX IF NOT EXISTS idx_activity_periods_product_open
    ON activity_periods (product_id, ended_at)
"#;

#[derive(Debug, Clone)]
pub struct SqliteProductStore {
    pool: SqlitePool,
}

impl SqliteProductStore {
    /// Opens (creating if needed) the database at `database_url` and ensures the schema.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let in_memory = database_url.contains(":memory:");

        if !in_memory {
            let db_path = database_url
                .trim_start_matches("sqlite://")
                .trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(db_path).parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // 記憶體資料庫每條連線各自獨立，只能用單一連線
        let mut pool_options = SqlitePoolOptions::new().max_connections(if in_memory { 1 } else { 5 });
        if in_memory {
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }
        let pool = pool_options.connect_with(options).await?;

        let store = Self { pool };
        store.migrate().await?;
        tracing::debug!("Database ready: {}", database_url);
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(CREATE_PRODUCTS_SQL).execute(&self.pool).await?;
        sqlx::query(CREATE_PERIODS_SQL).execute(&self.pool).await?;
        sqlx::query(CREATE_PERIODS_INDEX_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn fetch_products(&self) -> Result<Vec<Product>> {
        let rows = sqlx::query(
            "SELECT id, sku, name, in_list, created_at, updated_at FROM products ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(product_from_row).collect()
    }

    async fn fetch_periods(&self) -> Result<HashMap<ProductId, Vec<ActivityPeriod>>> {
        let rows = sqlx::query(
            "SELECT id, product_id, started_at, ended_at FROM activity_periods ORDER BY product_id, started_at, id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<ProductId, Vec<ActivityPeriod>> = HashMap::new();
        for row in &rows {
            let period = ActivityPeriod {
                id: row.try_get("id")?,
                product_id: row.try_get("product_id")?,
                started_at: row.try_get("started_at")?,
                ended_at: row.try_get("ended_at")?,
            };
            grouped.entry(period.product_id).or_default().push(period);
        }
        Ok(grouped)
    }
}

fn product_from_row(row: &SqliteRow) -> Result<Product> {
    Ok(Product {
        id: row.try_get("id")?,
        sku: row.try_get("sku")?,
        name: row.try_get("name")?,
        in_list: row.try_get("in_list")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl ProductStore for SqliteProductStore {
    async fn load_products(&self) -> Result<Vec<StoredProduct>> {
        let rows = sqlx::query(
            r#"
            SELECT p.id, p.sku, p.name, p.in_list, p.created_at, p.updated_at,
                   EXISTS (
                       SELECT 1 FROM activity_periods a
                       WHERE a.product_id = p.id AND a.ended_at IS NULL
                   ) AS has_open_period
            FROM products p
            ORDER BY p.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let has_open: i64 = row.try_get("has_open_period")?;
                Ok(StoredProduct {
                    product: product_from_row(row)?,
                    has_open_period: has_open != 0,
                })
            })
            .collect()
    }

    async fn apply(&self, plan: &ReconcilePlan, now: DateTime<Utc>) -> Result<()> {
        if plan.is_noop() && plan.touch.is_empty() {
            tracing::debug!("Nothing to apply");
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for chunk in plan.create.chunks(BATCH_SIZE) {
            let mut insert = QueryBuilder::<Sqlite>::new(
                "INSERT INTO products (sku, name, in_list, created_at, updated_at) ",
            );
            insert.push_values(chunk, |mut b, entry| {
                b.push_bind(entry.sku.clone())
                    .push_bind(entry.name.clone())
                    .push_bind(true)
                    .push_bind(now)
                    .push_bind(now);
            });
            insert.build().execute(&mut *tx).await?;

            let mut open = QueryBuilder::<Sqlite>::new(
                "INSERT INTO activity_periods (product_id, started_at) SELECT id, ",
            );
            open.push_bind(now);
            open.push(" FROM products WHERE sku IN (");
            {
                let mut skus = open.separated(", ");
                for entry in chunk {
                    skus.push_bind(entry.sku.clone());
                }
                skus.push_unseparated(")");
            }
            open.build().execute(&mut *tx).await?;
        }

        // 重新上榜：旗標設回 true 並開新區間
        set_in_list(&mut *tx, &plan.reactivate, true, now).await?;
        open_periods(&mut *tx, &plan.reactivate, now).await?;

        // 區間本來就開著，只補旗標
        set_in_list(&mut *tx, &plan.relist, true, now).await?;

        // 旗標為 true 卻沒有開啟中的區間
        open_periods(&mut *tx, &plan.reopen, now).await?;
        touch(&mut *tx, &plan.reopen, now).await?;

        touch(&mut *tx, &plan.touch, now).await?;

        close_periods(&mut *tx, &plan.close, now).await?;
        set_in_list(&mut *tx, &plan.close, false, now).await?;

        tx.commit().await?;
        tracing::debug!(
            "Applied plan: {} created, {} reactivated, {} relisted, {} reopened, {} closed",
            plan.create.len(),
            plan.reactivate.len(),
            plan.relist.len(),
            plan.reopen.len(),
            plan.close.len()
        );
        Ok(())
    }

    async fn list_histories(&self, filter: &ProductFilter) -> Result<Vec<ProductHistory>> {
        let products = self.fetch_products().await?;
        let mut periods = self.fetch_periods().await?;

        Ok(products
            .into_iter()
            .filter(|p| filter.matches(p))
            .map(|product| {
                let periods = periods.remove(&product.id).unwrap_or_default();
                ProductHistory { product, periods }
            })
            .collect())
    }
}

fn push_id_list(builder: &mut QueryBuilder<'_, Sqlite>, ids: &[ProductId]) {
    builder.push(" IN (");
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");
}

async fn set_in_list(
    conn: &mut SqliteConnection,
    ids: &[ProductId],
    in_list: bool,
    now: DateTime<Utc>,
) -> Result<()> {
    for chunk in ids.chunks(BATCH_SIZE) {
        let mut update = QueryBuilder::<Sqlite>::new("UPDATE products SET in_list = ");
        update.push_bind(in_list);
        update.push(", updated_at = ");
        update.push_bind(now);
        update.push(" WHERE id");
        push_id_list(&mut update, chunk);
        update.build().execute(&mut *conn).await?;
    }
    Ok(())
}

async fn touch(conn: &mut SqliteConnection, ids: &[ProductId], now: DateTime<Utc>) -> Result<()> {
    for chunk in ids.chunks(BATCH_SIZE) {
        let mut update = QueryBuilder::<Sqlite>::new("UPDATE products SET updated_at = ");
        update.push_bind(now);
        update.push(" WHERE id");
        push_id_list(&mut update, chunk);
        update.build().execute(&mut *conn).await?;
    }
    Ok(())
}

async fn open_periods(
    conn: &mut SqliteConnection,
    ids: &[ProductId],
    now: DateTime<Utc>,
) -> Result<()> {
    for chunk in ids.chunks(BATCH_SIZE) {
        let mut insert =
            QueryBuilder::<Sqlite>::new("INSERT INTO activity_periods (product_id, started_at) ");
        insert.push_values(chunk, |mut b, id| {
            b.push_bind(*id).push_bind(now);
        });
        insert.build().execute(&mut *conn).await?;
    }
    Ok(())
}

async fn close_periods(
    conn: &mut SqliteConnection,
    ids: &[ProductId],
    now: DateTime<Utc>,
) -> Result<()> {
    for chunk in ids.chunks(BATCH_SIZE) {
        let mut update = QueryBuilder::<Sqlite>::new("UPDATE activity_periods SET ended_at = ");
        update.push_bind(now);
        update.push(" WHERE ended_at IS NULL AND product_id");
        push_id_list(&mut update, chunk);
        update.build().execute(&mut *conn).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{reconcile, Snapshot, SnapshotEntry};
    use chrono::TimeZone;

    async fn memory_store() -> SqliteProductStore {
        SqliteProductStore::connect("sqlite::memory:").await.unwrap()
    }

    fn entry(sku: &str, name: &str) -> SnapshotEntry {
        SnapshotEntry {
            sku: sku.to_string(),
            name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_inserts_product_with_open_period() {
        let store = memory_store().await;
        let now = Utc.with_ymd_and_hms(2025, 4, 1, 10, 0, 0).unwrap();
        let plan = ReconcilePlan {
            create: vec![entry("X1", "Blender"), entry("X2", "Mixer")],
            ..Default::default()
        };

        store.apply(&plan, now).await.unwrap();

        let stored = store.load_products().await.unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().all(|s| s.product.in_list && s.has_open_period));
        assert_eq!(stored[0].product.created_at, now);

        let histories = store.list_histories(&ProductFilter::default()).await.unwrap();
        assert!(histories.iter().all(|h| h.periods.len() == 1));
        assert_eq!(histories[0].periods[0].started_at, now);
    }

    #[tokio::test]
    async fn test_close_then_reactivate_keeps_history() {
        let store = memory_store().await;
        let t0 = Utc.with_ymd_and_hms(2025, 4, 1, 10, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2025, 4, 2, 10, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2025, 4, 5, 10, 0, 0).unwrap();

        store
            .apply(&ReconcilePlan { create: vec![entry("X1", "Blender")], ..Default::default() }, t0)
            .await
            .unwrap();
        let id = store.load_products().await.unwrap()[0].product.id;

        store
            .apply(&ReconcilePlan { close: vec![id], ..Default::default() }, t1)
            .await
            .unwrap();
        let closed = &store.load_products().await.unwrap()[0];
        assert!(!closed.product.in_list);
        assert!(!closed.has_open_period);
        assert_eq!(closed.product.updated_at, t1);

        store
            .apply(&ReconcilePlan { reactivate: vec![id], ..Default::default() }, t2)
            .await
            .unwrap();
        let histories = store.list_histories(&ProductFilter::default()).await.unwrap();
        let periods = &histories[0].periods;
        assert_eq!(periods.len(), 2);
        assert_eq!(periods[0].ended_at, Some(t1));
        assert_eq!(periods[1].started_at, t2);
        assert!(periods[1].is_open());
        assert!(histories[0].product.in_list);
    }

    async fn flagged_off_with_open_period(store: &SqliteProductStore, at: DateTime<Utc>) -> ProductId {
        store
            .apply(&ReconcilePlan { create: vec![entry("A", "Kettle")], ..Default::default() }, at)
            .await
            .unwrap();
        sqlx::query("UPDATE products SET in_list = 0")
            .execute(store.pool())
            .await
            .unwrap();
        let stale = &store.load_products().await.unwrap()[0];
        assert!(!stale.product.in_list);
        assert!(stale.has_open_period);
        stale.product.id
    }

    #[tokio::test]
    async fn test_relist_keeps_single_open_period() {
        let store = memory_store().await;
        let t0 = Utc.with_ymd_and_hms(2025, 4, 1, 10, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2025, 4, 2, 10, 0, 0).unwrap();
        flagged_off_with_open_period(&store, t0).await;

        let snapshot: Snapshot = vec![entry("A", "Kettle")].into_iter().collect();
        let plan = reconcile::plan(&snapshot, &store.load_products().await.unwrap());
        store.apply(&plan, t1).await.unwrap();

        let histories = store.list_histories(&ProductFilter::default()).await.unwrap();
        let periods = &histories[0].periods;
        assert_eq!(periods.len(), 1);
        assert!(periods[0].is_open());
        assert_eq!(periods[0].started_at, t0);
        assert!(histories[0].product.in_list);
        assert_eq!(histories[0].product.updated_at, t1);
    }

    #[tokio::test]
    async fn test_stale_open_period_is_closed_when_absent() {
        let store = memory_store().await;
        let t0 = Utc.with_ymd_and_hms(2025, 4, 1, 10, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2025, 4, 2, 10, 0, 0).unwrap();
        flagged_off_with_open_period(&store, t0).await;

        let plan = reconcile::plan(&Snapshot::new(), &store.load_products().await.unwrap());
        store.apply(&plan, t1).await.unwrap();

        let histories = store.list_histories(&ProductFilter::default()).await.unwrap();
        let periods = &histories[0].periods;
        assert_eq!(periods.len(), 1);
        assert_eq!(periods[0].ended_at, Some(t1));
        assert!(!histories[0].product.in_list);
        assert!(!store.load_products().await.unwrap()[0].has_open_period);
    }

    #[tokio::test]
    async fn test_failed_apply_rolls_back() {
        let store = memory_store().await;
        let now = Utc.with_ymd_and_hms(2025, 4, 1, 10, 0, 0).unwrap();
        store
            .apply(&ReconcilePlan { create: vec![entry("DUP", "one")], ..Default::default() }, now)
            .await
            .unwrap();

        // 重複 SKU 違反 UNIQUE，整個交易應回滾
        let plan = ReconcilePlan {
            create: vec![entry("NEW", "fresh"), entry("DUP", "again")],
            ..Default::default()
        };
        assert!(store.apply(&plan, now).await.is_err());

        let stored = store.load_products().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].product.sku, "DUP");
    }
}
