use cachecheck_engine::{CacheEntry, CacheStats};
use chrono::{DateTime, Utc};
use tabled::{Table, Tabled, settings::Style};

use crate::error::Result;

#[derive(Tabled)]
struct StatsRow {
    #[tabled(rename = "Provider")]
    provider: String,
    #[tabled(rename = "Live")]
    live: u64,
    #[tabled(rename = "Expired")]
    expired: u64,
}

#[derive(Tabled)]
struct EntryRow {
    #[tabled(rename = "Identifier")]
    identifier: String,
    #[tabled(rename = "Provider")]
    provider: String,
    #[tabled(rename = "Cached")]
    cached: String,
    #[tabled(rename = "Expires")]
    expires: String,
}

pub fn format_stats(stats: &CacheStats, json: bool) -> Result<String> {
    if json {
        return Ok(serde_json::to_string_pretty(stats)?);
    }

    let rows: Vec<StatsRow> = stats
        .per_provider
        .iter()
        .map(|(provider, counts)| StatsRow {
            provider: provider.display_name().to_string(),
            live: counts.live,
            expired: counts.expired,
        })
        .collect();

    let mut output = Table::new(rows).with(Style::rounded()).to_string();
    output.push_str(&format!(
        "\nTotal: {} ({} live, {} expired)",
        stats.total, stats.live, stats.expired
    ));
    Ok(output)
}

pub fn format_entries(entries: &[CacheEntry], json: bool) -> Result<String> {
    if json {
        return Ok(serde_json::to_string_pretty(entries)?);
    }
    if entries.is_empty() {
        return Ok("No live entries".to_string());
    }

    let rows: Vec<EntryRow> = entries
        .iter()
        .map(|entry| EntryRow {
            identifier: entry.identifier.clone(),
            provider: entry.provider.display_name().to_string(),
            cached: if entry.cached { "yes" } else { "no" }.to_string(),
            expires: format_timestamp(entry.expires_at),
        })
        .collect();
    Ok(Table::new(rows).with(Style::rounded()).to_string())
}

fn format_timestamp(ts: i64) -> String {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| ts.to_string())
}
