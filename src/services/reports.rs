//! Reporting service
//!
//! Read-only views over a user's own items: storage quota, per-type
//! usage aggregation, and calendar bucketing by creation date.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;

use crate::database::{ItemType, Repository, UsageBucket, User};
use crate::error::Result;

/// Calendar window granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CalendarPeriod {
    Day,
    Week,
    Month,
}

impl CalendarPeriod {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "day" => Some(CalendarPeriod::Day),
            "week" => Some(CalendarPeriod::Week),
            "month" => Some(CalendarPeriod::Month),
            _ => None,
        }
    }
}

/// One item in a calendar day bucket
#[derive(Debug, Clone, Serialize)]
pub struct CalendarEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub name: String,
}

/// Items bucketed by UTC calendar day, ordered by date
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarReport {
    pub period: CalendarPeriod,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub items_by_date: BTreeMap<String, Vec<CalendarEntry>>,
}

/// Per-type usage over a user's own items
#[derive(Debug, Serialize)]
pub struct UsageReport {
    pub note: UsageBucket,
    pub image: UsageBucket,
    pub pdf: UsageBucket,
}

/// Usage report plus the folder bucket the overview endpoint carries
#[derive(Debug, Serialize)]
pub struct OverviewReport {
    pub note: UsageBucket,
    pub image: UsageBucket,
    pub pdf: UsageBucket,
    pub folder: UsageBucket,
}

/// Storage quota report
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaReport {
    pub storage_quota_bytes: i64,
    pub used_storage_bytes: i64,
    pub available_storage_bytes: i64,
    pub used_storage_human: String,
    pub quota_human: String,
    pub available_human: String,
}

fn human_size(bytes: i64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];

    let mut value = bytes.max(0) as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    format!("{:.2} {}", value, UNITS[unit])
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    start_of_day(date) + Duration::days(1) - Duration::milliseconds(1)
}

/// Inclusive UTC window for a period anchored on a date.
/// Weeks start on Monday.
fn period_window(period: CalendarPeriod, anchor: NaiveDate) -> (NaiveDate, NaiveDate) {
    match period {
        CalendarPeriod::Day => (anchor, anchor),
        CalendarPeriod::Week => {
            let monday = anchor - Duration::days(anchor.weekday().num_days_from_monday() as i64);
            (monday, monday + Duration::days(6))
        }
        CalendarPeriod::Month => {
            let first = anchor.with_day(1).unwrap_or(anchor);
            let last = first
                .checked_add_months(Months::new(1))
                .and_then(|d| d.pred_opt())
                .unwrap_or(anchor);
            (first, last)
        }
    }
}

/// Service for storage and calendar reports
#[derive(Clone)]
pub struct ReportsService {
    repo: Repository,
}

impl ReportsService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    async fn usage_buckets(&self, user_id: &str) -> Result<BTreeMap<ItemType, UsageBucket>> {
        // Types absent from the data still report as zero.
        let mut buckets: BTreeMap<ItemType, UsageBucket> = ItemType::ALL
            .into_iter()
            .map(|t| (t, UsageBucket::default()))
            .collect();

        for (type_name, count, total, average) in self.repo.usage_by_type(user_id).await? {
            if let Some(item_type) = ItemType::parse(&type_name) {
                buckets.insert(
                    item_type,
                    UsageBucket {
                        count,
                        total_size_bytes: total,
                        average_size_bytes: average,
                    },
                );
            }
        }

        Ok(buckets)
    }

    /// Per-type counts and sizes over the user's own items
    pub async fn count_usage(&self, user_id: &str) -> Result<UsageReport> {
        let mut buckets = self.usage_buckets(user_id).await?;

        Ok(UsageReport {
            note: buckets.remove(&ItemType::Note).unwrap_or_default(),
            image: buckets.remove(&ItemType::Image).unwrap_or_default(),
            pdf: buckets.remove(&ItemType::Pdf).unwrap_or_default(),
        })
    }

    /// The storage overview adds a folder bucket; folders have no
    /// size, so it stays zeroed.
    pub async fn overview(&self, user_id: &str) -> Result<OverviewReport> {
        let usage = self.count_usage(user_id).await?;

        Ok(OverviewReport {
            note: usage.note,
            image: usage.image,
            pdf: usage.pdf,
            folder: UsageBucket::default(),
        })
    }

    /// Quota report for a user, with human-readable sizes
    pub fn quota_report(&self, user: &User) -> QuotaReport {
        let available = user.storage_quota_bytes - user.used_storage_bytes;

        QuotaReport {
            storage_quota_bytes: user.storage_quota_bytes,
            used_storage_bytes: user.used_storage_bytes,
            available_storage_bytes: available,
            used_storage_human: human_size(user.used_storage_bytes),
            quota_human: human_size(user.storage_quota_bytes),
            available_human: human_size(available),
        }
    }

    /// Bucket the user's items created within the period window by UTC
    /// calendar day.
    pub async fn calendar(
        &self,
        user_id: &str,
        period: CalendarPeriod,
        anchor: Option<NaiveDate>,
        item_type: Option<ItemType>,
    ) -> Result<CalendarReport> {
        let anchor = anchor.unwrap_or_else(|| Utc::now().date_naive());
        let (start_date, end_date) = period_window(period, anchor);

        let items = self
            .repo
            .items_created_between(
                user_id,
                start_of_day(start_date),
                end_of_day(end_date),
                item_type,
            )
            .await?;

        let mut items_by_date: BTreeMap<String, Vec<CalendarEntry>> = BTreeMap::new();
        for item in items {
            let day = item.created_at.date_naive().format("%Y-%m-%d").to_string();
            items_by_date.entry(day).or_default().push(CalendarEntry {
                id: item.id,
                item_type: item.kind.item_type(),
                name: item.name,
            });
        }

        Ok(CalendarReport {
            period,
            start_date,
            end_date,
            items_by_date,
        })
    }
}
