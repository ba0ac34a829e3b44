use crate::core::{ActivityPeriod, ProductHistory, ProductSummary};
use chrono::{DateTime, Duration, Utc};

/// Total time spent on the list; open periods count up to `now`.
/// Returns `None` when the product has no periods at all.
pub fn total_active_time(periods: &[ActivityPeriod], now: DateTime<Utc>) -> Option<Duration> {
    if periods.is_empty() {
        return None;
    }
    Some(
        periods
            .iter()
            .fold(Duration::zero(), |acc, period| acc + period.duration(now)),
    )
}

/// "{days}d {hours}h {minutes}m", or "-" when there is nothing to show.
pub fn format_duration(total: Option<Duration>) -> String {
    match total {
        Some(total) => {
            let seconds = total.num_seconds().max(0);
            let days = seconds / 86_400;
            let hours = (seconds % 86_400) / 3_600;
            let minutes = (seconds % 3_600) / 60;
            format!("{}d {}h {}m", days, hours, minutes)
        }
        None => "-".to_string(),
    }
}

pub fn summarize(history: &ProductHistory, now: DateTime<Utc>) -> ProductSummary {
    let product = &history.product;
    ProductSummary {
        sku: product.sku.clone(),
        name: product.name.clone(),
        in_list: product.in_list,
        created_at: product.created_at,
        updated_at: product.updated_at,
        period_count: history.periods.len(),
        total_active_seconds: total_active_time(&history.periods, now).map(|d| d.num_seconds()),
    }
}
