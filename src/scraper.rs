//! The `agg` loop: one due feed per tick, oldest fetch first.

use std::io::Write;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::db::{Database, Feed};
use crate::error::{Error, Result};
use crate::fetcher::Fetcher;

/// What a single tick did.
#[derive(Debug, Clone)]
pub struct ScrapeReport {
    pub feed: Feed,
    pub fetched_at: DateTime<Utc>,
    pub item_count: usize,
}

/// Fetch the feed that is most overdue, mark it fetched and print its titles.
///
/// Returns `None` when there is nothing to fetch.
pub async fn scrape_next(
    db: &Database,
    fetcher: &Fetcher,
    out: &mut (dyn Write + Send),
) -> Result<Option<ScrapeReport>> {
    let Some(feed) = db.get_next_feed_to_fetch().await? else {
        warn!("No feeds registered, nothing to fetch");
        writeln!(out, "No feeds to fetch.")?;
        return Ok(None);
    };

    let rss = fetcher.fetch_feed(&feed.url).await?;

    // Stamp past every other feed so this one goes to the back of the queue,
    // even when stored times are ahead of the local clock.
    let mut fetched_at = next_fetch_time(Utc::now(), db.get_latest_fetched_at().await?);
    if !db.mark_feed_fetched(feed.id, fetched_at).await? {
        warn!("'{}' already carries a newer fetch time", feed.name);
        if let Some(stored) = db
            .get_feed_by_url(&feed.url)
            .await?
            .and_then(|f| f.last_fetched_at)
        {
            fetched_at = stored;
        }
    }
    info!(
        "Fetched {} items from '{}' ({})",
        rss.items.len(),
        feed.name,
        feed.url
    );

    writeln!(out, "Feed: {}", rss.title)?;
    if let Some(description) = &rss.description {
        writeln!(out, "  {}", description)?;
    }
    for item in &rss.items {
        match item.published {
            Some(published) => writeln!(
                out,
                " * {} ({})",
                item.title,
                published.format("%Y-%m-%d")
            )?,
            None => writeln!(out, " * {}", item.title)?,
        }
        if let Some(link) = &item.link {
            writeln!(out, "   {}", link)?;
        }
    }
    writeln!(out)?;

    Ok(Some(ScrapeReport {
        feed,
        fetched_at,
        item_count: rss.items.len(),
    }))
}

/// `now`, or just past `latest` when the clock lags behind stored times.
fn next_fetch_time(now: DateTime<Utc>, latest: Option<DateTime<Utc>>) -> DateTime<Utc> {
    match latest {
        Some(latest) if latest >= now => latest + chrono::Duration::microseconds(1),
        _ => now,
    }
}

/// Scrape one feed per `interval`. The first tick fires immediately.
///
/// Runs until an error occurs, or for `max_ticks` ticks when given.
pub async fn run(
    db: &Database,
    fetcher: &Fetcher,
    interval: Duration,
    out: &mut (dyn Write + Send),
    max_ticks: Option<u64>,
) -> Result<()> {
    writeln!(out, "Collecting feeds every {}", format_interval(interval))?;

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut ticks = 0;
    loop {
        ticker.tick().await;
        scrape_next(db, fetcher, out).await?;

        ticks += 1;
        if max_ticks.is_some_and(|max| ticks >= max) {
            return Ok(());
        }
    }
}

/// Parse intervals such as `500ms`, `30s`, `1m` or `1h30m`.
pub fn parse_interval(input: &str) -> Result<Duration> {
    let invalid = || Error::InvalidInterval(input.to_string());
    let mut rest = input.trim();
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total = Duration::ZERO;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(invalid)?;
        if number_len == 0 {
            return Err(invalid());
        }
        let value: f64 = rest[..number_len].parse().map_err(|_| invalid())?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let nanos_per_unit: f64 = match &rest[..unit_len] {
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            _ => return Err(invalid()),
        };
        rest = &rest[unit_len..];

        let nanos = (value * nanos_per_unit).round();
        if !nanos.is_finite() || nanos >= u64::MAX as f64 {
            return Err(invalid());
        }
        total = total
            .checked_add(Duration::from_nanos(nanos as u64))
            .ok_or_else(invalid)?;
    }

    if total.is_zero() {
        return Err(invalid());
    }
    Ok(total)
}

pub fn format_interval(interval: Duration) -> String {
    let secs = interval.as_secs();
    let millis = interval.subsec_millis();
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);

    let mut formatted = String::new();
    if hours > 0 {
        formatted.push_str(&format!("{}h", hours));
    }
    if minutes > 0 {
        formatted.push_str(&format!("{}m", minutes));
    }
    if seconds > 0 {
        formatted.push_str(&format!("{}s", seconds));
    }
    if millis > 0 {
        formatted.push_str(&format!("{}ms", millis));
    }
    if formatted.is_empty() {
        formatted.push_str("0s");
    }
    formatted
}
