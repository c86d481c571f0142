//! Exchange metadata cache.
//!
//! `exchangeInfo` is large and changes rarely, so it is kept on disk with the
//! time it was saved. A copy younger than `max_age` is served without a
//! request; anything else (missing, stale, unreadable) triggers one live fetch
//! whose result is written back. Within a process the filter set is built once
//! and reused until [`MetadataCache::invalidate`].

use crate::error::CacheError;
use async_trait::async_trait;
use common::now_ms;
use delay_check::{DelayCheckError, ExchangeApi, FilterSource};
use order_filters::{ExchangeInfo, FilterSet};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Default freshness window of the disk copy.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CachedExchangeInfo {
    saved_at_ms: i64,
    exchange_info: ExchangeInfo,
}

pub struct MetadataCache {
    path: PathBuf,
    max_age: Duration,
    exchange: Arc<dyn ExchangeApi>,
    filters: Mutex<Option<FilterSet>>,
}

impl MetadataCache {
    pub fn new(path: impl Into<PathBuf>, max_age: Duration, exchange: Arc<dyn ExchangeApi>) -> Self {
        Self {
            path: path.into(),
            max_age,
            exchange,
            filters: Mutex::new(None),
        }
    }

    /// Drop the in-memory filter set; the next lookup goes to disk or the API.
    pub async fn invalidate(&self) {
        *self.filters.lock().await = None;
    }

    /// The disk copy if it exists, parses and is younger than `max_age` at `now_ms`.
    pub async fn load_fresh(&self, now_ms: i64) -> Option<ExchangeInfo> {
        let cached = match read_cache(&self.path).await {
            Ok(cached) => cached,
            Err(CacheError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No metadata cache yet");
                return None;
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring unreadable metadata cache");
                return None;
            }
        };

        let age_ms = now_ms.saturating_sub(cached.saved_at_ms);
        if age_ms < 0 || age_ms as u128 >= self.max_age.as_millis() {
            info!(path = %self.path.display(), age_ms, "Metadata cache is stale");
            return None;
        }
        debug!(path = %self.path.display(), age_ms, "Using cached exchange info");
        Some(cached.exchange_info)
    }

    /// Write `info` to disk stamped with `saved_at_ms`.
    pub async fn save(&self, info: &ExchangeInfo, saved_at_ms: i64) -> Result<(), CacheError> {
        let body = serde_json::to_vec(&CachedExchangeInfo {
            saved_at_ms,
            exchange_info: info.clone(),
        })?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, body).await?;
        Ok(())
    }

    async fn fetch_and_save(&self, now_ms: i64) -> Result<ExchangeInfo, DelayCheckError> {
        info!("Fetching exchange info");
        let info = self.exchange.exchange_info().await?;
        if let Err(e) = self.save(&info, now_ms).await {
            warn!(path = %self.path.display(), error = %e, "Failed to save metadata cache");
        }
        Ok(info)
    }

    async fn filter_set_at(&self, now_ms: i64) -> Result<FilterSet, DelayCheckError> {
        let mut filters = self.filters.lock().await;
        if let Some(set) = filters.as_ref() {
            return Ok(set.clone());
        }

        let info = match self.load_fresh(now_ms).await {
            Some(info) => info,
            None => self.fetch_and_save(now_ms).await?,
        };
        let set = FilterSet::from(&info);
        info!(symbols = set.len(), "Symbol filters loaded");
        *filters = Some(set.clone());
        Ok(set)
    }

    /// Filters that know `symbol` if the exchange does.
    ///
    /// A symbol missing from the cached copy triggers one live refetch, since
    /// the disk copy may predate a listing.
    async fn filter_set_for(&self, symbol: &str, now_ms: i64) -> Result<FilterSet, DelayCheckError> {
        let set = self.filter_set_at(now_ms).await?;
        if set.contains(symbol) {
            return Ok(set);
        }

        info!(symbol = %symbol, "Symbol missing from cached exchange info, refetching");
        self.invalidate().await;
        let mut filters = self.filters.lock().await;
        let info = self.fetch_and_save(now_ms).await?;
        let set = FilterSet::from(&info);
        if !set.contains(symbol) {
            debug!(symbol = %symbol, "Symbol unknown to the exchange");
        }
        *filters = Some(set.clone());
        Ok(set)
    }
}

async fn read_cache(path: &Path) -> Result<CachedExchangeInfo, CacheError> {
    let body = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&body)?)
}

#[async_trait]
impl FilterSource for MetadataCache {
    async fn filter_set(&self, symbol: &str) -> Result<FilterSet, DelayCheckError> {
        self.filter_set_for(symbol, now_ms()).await
    }
}
