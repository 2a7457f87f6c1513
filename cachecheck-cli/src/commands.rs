use crate::{
    config::AppConfig,
    error::Result,
    output::{format_entries, format_stats},
};
use cachecheck_engine::TtlCache;
use indicatif::{ProgressBar, ProgressStyle};
use std::{path::PathBuf, time::Duration};
use tracing::{debug, warn};

pub struct CommandExecutor {
    config: AppConfig,
    config_path: Option<PathBuf>,
}

impl CommandExecutor {
    pub fn new(config: AppConfig, config_path: Option<PathBuf>) -> Self {
        Self {
            config,
            config_path,
        }
    }

    async fn open_cache(&self) -> Result<TtlCache> {
        debug!(path = %self.config.database_path.display(), "Opening debrid cache");
        Ok(TtlCache::open(&self.config.database_path).await?)
    }

    pub async fn cache_stats(&self, json: bool) -> Result<String> {
        let cache = self.open_cache().await?;
        let stats = cache.stats().await;
        cache.close().await;
        format_stats(&stats?, json)
    }

    /// Live entries of enabled providers.
    pub async fn cache_show(&self, identifiers: &[String], json: bool) -> Result<String> {
        let cache = self.open_cache().await?;
        let entries = cache.get_all(identifiers).await;
        cache.close().await;

        let checker = self.config.checker_config();
        let mut entries: Vec<_> = entries?
            .into_iter()
            .filter(|entry| checker.is_enabled(entry.provider))
            .collect();
        entries.sort_by(|a, b| {
            (a.identifier.as_str(), a.provider).cmp(&(b.identifier.as_str(), b.provider))
        });
        format_entries(&entries, json)
    }

    pub async fn cache_purge(&self) -> Result<String> {
        let cache = self.open_cache().await?;
        let removed = cache.purge_expired().await;
        cache.close().await;
        Ok(format!("Removed {} expired entries", removed?))
    }

    /// Never fails; reports `success` or `failure`.
    pub async fn cache_clear(&self) -> String {
        let pb = create_spinner("Clearing debrid cache...");
        let result: Result<u64> = match self.open_cache().await {
            Ok(cache) => {
                let result = cache.clear().await.map_err(Into::into);
                cache.close().await;
                result
            }
            Err(e) => Err(e),
        };
        pb.finish_and_clear();

        match result {
            Ok(removed) => {
                debug!(removed, "Debrid cache cleared");
                "success".to_string()
            }
            Err(e) => {
                warn!(error = %e, "Failed to clear debrid cache");
                "failure".to_string()
            }
        }
    }

    pub async fn cache_forget(&self, identifiers: &[String]) -> Result<String> {
        let cache = self.open_cache().await?;
        let removed = cache.remove_many(identifiers).await;
        cache.close().await;
        Ok(format!("Removed {} entries", removed?))
    }

    pub fn config_show(&self) -> Result<String> {
        Ok(self.config.show()?)
    }

    pub fn config_reset(&self) -> Result<String> {
        let path = AppConfig::reset(self.config_path.as_deref())?;
        Ok(format!("Configuration reset to defaults at {}", path.display()))
    }

    pub fn config_path(&self) -> Result<String> {
        let path = AppConfig::resolve_path(self.config_path.as_deref())?;
        Ok(path.display().to_string())
    }
}

fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
