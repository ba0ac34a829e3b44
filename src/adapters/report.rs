use crate::core::activity::{format_duration, summarize};
use crate::core::{ProductFilter, ProductHistory, ProductStore};
use crate::utils::error::{Result, TrackerError};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::{SimpleFileOptions, ZipWriter};

pub const REPORT_FILENAME: &str = "unrecognized_products.zip";

#[derive(Serialize)]
struct ProductRow<'a> {
    sku: &'a str,
    name: &'a str,
    in_list: bool,
    created_at: String,
    updated_at: String,
    periods: usize,
    total_active_time: String,
    total_active_seconds: Option<i64>,
}

#[derive(Serialize)]
struct PeriodRow<'a> {
    sku: &'a str,
    started_at: String,
    ended_at: Option<String>,
}

fn timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn products_csv(histories: &[ProductHistory], now: DateTime<Utc>) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for history in histories {
        let summary = summarize(history, now);
        writer.serialize(ProductRow {
            sku: &summary.sku,
            name: &summary.name,
            in_list: summary.in_list,
            created_at: timestamp(summary.created_at),
            updated_at: timestamp(summary.updated_at),
            periods: summary.period_count,
            total_active_time: format_duration(summary.total_active_seconds.map(Duration::seconds)),
            total_active_seconds: summary.total_active_seconds,
        })?;
    }
    into_bytes(writer)
}

pub fn periods_csv(histories: &[ProductHistory]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for history in histories {
        for period in &history.periods {
            writer.serialize(PeriodRow {
                sku: &history.product.sku,
                started_at: timestamp(period.started_at),
                ended_at: period.ended_at.map(timestamp),
            })?;
        }
    }
    into_bytes(writer)
}

fn into_bytes(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>> {
    writer
        .into_inner()
        .map_err(|e| TrackerError::IoError(e.into_error()))
}

/// Writes `unrecognized_products.zip` (products.csv + periods.csv) into `output_dir`.
pub async fn export_report<P: ProductStore>(
    store: &P,
    filter: &ProductFilter,
    output_dir: &Path,
    now: DateTime<Utc>,
) -> Result<PathBuf> {
    let histories = store.list_histories(filter).await?;
    tracing::info!("Exporting {} products", histories.len());

    let products = products_csv(&histories, now)?;
    let periods = periods_csv(&histories)?;

    let zip_data = {
        let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));

        zip.start_file("products.csv", SimpleFileOptions::default())?;
        zip.write_all(&products)?;

        zip.start_file("periods.csv", SimpleFileOptions::default())?;
        zip.write_all(&periods)?;

        zip.finish()?.into_inner()
    };

    tokio::fs::create_dir_all(output_dir).await?;
    let output_path = output_dir.join(REPORT_FILENAME);
    tracing::debug!("Writing ZIP file ({} bytes) to {}", zip_data.len(), output_path.display());
    tokio::fs::write(&output_path, &zip_data).await?;

    Ok(output_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ActivityPeriod, Product};
    use chrono::TimeZone;

    fn history() -> ProductHistory {
        let t0 = Utc.with_ymd_and_hms(2025, 5, 1, 0, 0, 0).unwrap();
        ProductHistory {
            product: Product {
                id: 7,
                sku: "K-7".to_string(),
                name: "Кофеварка, черная".to_string(),
                in_list: true,
                created_at: t0,
                updated_at: t0,
            },
            periods: vec![
                ActivityPeriod {
                    id: 1,
                    product_id: 7,
                    started_at: t0,
                    ended_at: Some(t0 + Duration::hours(2)),
                },
                ActivityPeriod {
                    id: 2,
                    product_id: 7,
                    started_at: t0 + Duration::days(1),
                    ended_at: None,
                },
            ],
        }
    }

    #[test]
    fn test_products_csv_has_total_time() {
        let now = Utc.with_ymd_and_hms(2025, 5, 3, 0, 30, 0).unwrap();
        let bytes = products_csv(&[history()], now).unwrap();
        let text = String::from_utf8(bytes).unwrap();

        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "sku,name,in_list,created_at,updated_at,periods,total_active_time,total_active_seconds"
        );
        let row = lines.next().unwrap();
        // 2h 已結束 + 1d 0h 30m 進行中
        assert!(row.starts_with("K-7,\"Кофеварка, черная\",true,2025-05-01T00:00:00Z"));
        assert!(row.contains(",2,1d 2h 30m,"));
    }

    #[test]
    fn test_periods_csv_leaves_open_end_blank() {
        let text = String::from_utf8(periods_csv(&[history()]).unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "sku,started_at,ended_at");
        assert_eq!(lines[1], "K-7,2025-05-01T00:00:00Z,2025-05-01T02:00:00Z");
        assert_eq!(lines[2], "K-7,2025-05-02T00:00:00Z,");
    }
}
