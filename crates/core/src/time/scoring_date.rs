use anyhow::Context;
use chrono::{DateTime, Days, Duration, NaiveDate, Timelike, Utc};

// US Eastern standard time. Override with SCORING_UTC_OFFSET_HOURS (e.g. -4 during DST).
const DEFAULT_UTC_OFFSET_HOURS: i32 = -5;

// Scores are recalculated after the day's market data lands (close ingest runs at 17:00 local).
// Before this hour the run scores the previous calendar day.
const SCORING_CUTOFF_HOUR: u32 = 18;

pub fn resolve_as_of_date(
    as_of_date_arg: Option<&str>,
    now_utc: DateTime<Utc>,
) -> anyhow::Result<NaiveDate> {
    if let Some(s) = as_of_date_arg {
        return NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("invalid as-of date {s:?} (expected YYYY-MM-DD)"));
    }

    let offset_hours = std::env::var("SCORING_UTC_OFFSET_HOURS")
        .ok()
        .and_then(|s| s.trim().parse::<i32>().ok())
        .filter(|h| (-12..=14).contains(h))
        .unwrap_or(DEFAULT_UTC_OFFSET_HOURS);

    resolve_with_offset(now_utc, offset_hours)
}

fn resolve_with_offset(now_utc: DateTime<Utc>, offset_hours: i32) -> anyhow::Result<NaiveDate> {
    let tz = chrono::FixedOffset::east_opt(offset_hours * 3600)
        .with_context(|| format!("invalid UTC offset {offset_hours}h"))?;
    let now_local = now_utc.with_timezone(&tz);

    let mut date = now_local.date_naive();
    if now_local.hour() < SCORING_CUTOFF_HOUR {
        date = date - Duration::days(1);
    }
    Ok(date)
}

/// `as_of` and the `days` calendar days before it, oldest first.
pub fn backfill_dates(as_of: NaiveDate, days: u32) -> Vec<NaiveDate> {
    (0..=u64::from(days))
        .rev()
        .filter_map(|back| as_of.checked_sub_days(Days::new(back)))
        .collect()
}
