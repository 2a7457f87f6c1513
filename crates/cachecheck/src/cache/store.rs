//! # TTL Cache Store
//!
//! SQLite-backed store of debrid verdicts keyed by (identifier, provider).
//!
//! Every operation checks a connection out of the pool for its own duration
//! only, so concurrent callers never serialize on a long-lived handle.
//! Expired rows are evicted lazily when a read encounters them.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite};
use tracing::{debug, warn};

use crate::cache::types::{CacheEntry, CacheResult, CacheRow, CacheStats, cached_text};
use crate::provider::Provider;
use crate::utils::unix_now;

/// SQLite's lowest default bound on `?` parameters per statement.
const MAX_BIND_PARAMS: usize = 999;

const BUSY_TIMEOUT: Duration = Duration::from_secs(40);

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS debrid_data (
    hash TEXT NOT NULL,
    debrid TEXT NOT NULL,
    cached TEXT,
    expires INTEGER,
    UNIQUE (hash, debrid)
)";

/// Persistent (identifier, provider) → cached-flag store with expiry.
#[derive(Debug, Clone)]
pub struct TtlCache {
    pool: SqlitePool,
}

impl TtlCache {
    /// Open (creating if needed) the cache database at `path`.
    pub async fn open(path: impl AsRef<Path>) -> CacheResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .busy_timeout(BUSY_TIMEOUT);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let cache = Self { pool };
        cache.ensure_schema().await?;
        debug!(path = %path.display(), "Opened debrid cache database");
        Ok(cache)
    }

    /// Open a private in-memory database, kept alive by a single connection.
    pub async fn open_in_memory() -> CacheResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect_with(options)
            .await?;

        let cache = Self { pool };
        cache.ensure_schema().await?;
        Ok(cache)
    }

    async fn ensure_schema(&self) -> CacheResult<()> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query(SCHEMA).execute(&mut *conn).await?;
        Ok(())
    }

    /// All unexpired entries for `identifiers`, across every provider.
    ///
    /// Expired rows found along the way are deleted and not returned. Rows
    /// naming an unknown provider are never returned but are evicted once
    /// expired. A failed eviction is logged and does not hide the live rows.
    pub async fn get_all(&self, identifiers: &[String]) -> CacheResult<Vec<CacheEntry>> {
        if identifiers.is_empty() {
            return Ok(Vec::new());
        }

        let now = unix_now();
        let mut conn = self.pool.acquire().await?;
        let mut live = Vec::new();
        let mut expired = Vec::new();

        for slice in identifiers.chunks(MAX_BIND_PARAMS) {
            let mut query = QueryBuilder::<Sqlite>::new(
                "SELECT hash, debrid, cached, expires FROM debrid_data WHERE hash IN (",
            );
            let mut ids = query.separated(", ");
            for id in slice {
                ids.push_bind(id);
            }
            ids.push_unseparated(")");

            let rows: Vec<CacheRow> = query.build_query_as().fetch_all(&mut *conn).await?;
            for row in rows {
                if row.is_expired_at(now) {
                    expired.push((row.hash, row.debrid));
                } else if let Some(entry) = row.into_entry() {
                    live.push(entry);
                }
            }
        }

        if !expired.is_empty() {
            debug!(count = expired.len(), "Evicting expired cache entries");
            if let Err(e) = evict_expired(&mut *conn, &expired, now).await {
                warn!(count = expired.len(), error = %e, "Failed to evict expired cache entries");
            }
        }

        Ok(live)
    }

    /// Upsert verdicts for `provider`, valid for `ttl` from now.
    pub async fn set_many(
        &self,
        entries: &[(String, bool)],
        provider: Provider,
        ttl: Duration,
    ) -> CacheResult<()> {
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let expires_at = unix_now().saturating_add(ttl_secs);
        self.set_many_until(entries, provider, expires_at).await
    }

    /// Upsert verdicts for `provider` with an explicit expiry timestamp.
    pub async fn set_many_until(
        &self,
        entries: &[(String, bool)],
        provider: Provider,
        expires_at: i64,
    ) -> CacheResult<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut conn = self.pool.acquire().await?;
        let mut tx = sqlx::Connection::begin(&mut *conn).await?;
        for slice in entries.chunks(MAX_BIND_PARAMS / 4) {
            let mut query = QueryBuilder::<Sqlite>::new(
                "INSERT OR REPLACE INTO debrid_data (hash, debrid, cached, expires) ",
            );
            query.push_values(slice, |mut row, entry| {
                row.push_bind(&entry.0)
                    .push_bind(provider.code())
                    .push_bind(cached_text(entry.1))
                    .push_bind(expires_at);
            });
            query.build().execute(&mut *tx).await?;
        }
        tx.commit().await?;

        debug!(
            provider = %provider,
            count = entries.len(),
            expires_at,
            "Stored debrid cache entries"
        );
        Ok(())
    }

    /// Delete every row for `identifiers`, whatever the provider.
    pub async fn remove_many(&self, identifiers: &[String]) -> CacheResult<u64> {
        if identifiers.is_empty() {
            return Ok(0);
        }

        let mut conn = self.pool.acquire().await?;
        let mut removed = 0;
        for slice in identifiers.chunks(MAX_BIND_PARAMS) {
            let mut query = QueryBuilder::<Sqlite>::new("DELETE FROM debrid_data WHERE hash IN (");
            let mut ids = query.separated(", ");
            for id in slice {
                ids.push_bind(id);
            }
            ids.push_unseparated(")");
            removed += query.build().execute(&mut *conn).await?.rows_affected();
        }
        Ok(removed)
    }

    /// Eagerly delete every expired row.
    pub async fn purge_expired(&self) -> CacheResult<u64> {
        let mut conn = self.pool.acquire().await?;
        let result = sqlx::query("DELETE FROM debrid_data WHERE expires IS NULL OR expires <= ?")
            .bind(unix_now())
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }

    /// Delete all rows and compact the database file.
    pub async fn clear(&self) -> CacheResult<u64> {
        let mut conn = self.pool.acquire().await?;
        let removed = sqlx::query("DELETE FROM debrid_data")
            .execute(&mut *conn)
            .await?
            .rows_affected();
        sqlx::query("VACUUM").execute(&mut *conn).await?;
        debug!(removed, "Cleared debrid cache");
        Ok(removed)
    }

    pub async fn stats(&self) -> CacheResult<CacheStats> {
        let mut conn = self.pool.acquire().await?;
        let rows: Vec<(String, i64, i64)> = sqlx::query_as(
            "SELECT debrid, COUNT(*), COALESCE(SUM(CASE WHEN expires > ? THEN 1 ELSE 0 END), 0)
             FROM debrid_data GROUP BY debrid",
        )
        .bind(unix_now())
        .fetch_all(&mut *conn)
        .await?;

        let mut stats = CacheStats::default();
        for (debrid, total, live) in rows {
            let total = u64::try_from(total).unwrap_or_default();
            let live = u64::try_from(live).unwrap_or_default();
            let expired = total.saturating_sub(live);

            stats.total += total;
            stats.live += live;
            stats.expired += expired;
            if let Ok(provider) = debrid.parse::<Provider>() {
                let entry = stats.per_provider.entry(provider).or_default();
                entry.live += live;
                entry.expired += expired;
            }
        }
        Ok(stats)
    }

    /// Close all pooled connections.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Delete `(hash, debrid)` rows that were seen expired at `now`.
///
/// The expiry is checked again so a verdict refreshed in the meantime stays.
async fn evict_expired(
    conn: &mut SqliteConnection,
    rows: &[(String, String)],
    now: i64,
) -> CacheResult<u64> {
    let mut tx = sqlx::Connection::begin(conn).await?;
    let mut removed = 0;
    for (hash, debrid) in rows {
        removed += sqlx::query(
            "DELETE FROM debrid_data
             WHERE hash = ? AND debrid = ? AND (expires IS NULL OR expires <= ?)",
        )
        .bind(hash)
        .bind(debrid)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    }
    tx.commit().await?;
    Ok(removed)
}
