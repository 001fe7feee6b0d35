//! Symbol scanning - drives the engine over every tradable symbol
//!
//! The scanner talks to two collaborators: a [`PriceFeed`] for recent candles
//! and a [`ResultStore`] for the symbol list, full history and emitted results.
//! Symbols are processed strictly one after another, each start at least
//! `min_delay` after the previous one, so the feed never sees overlapping
//! requests from a scan.
//!
//! A failing symbol is logged and skipped. Only a misconfigured scanner or
//! failing to load the symbol list stops the scan.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::{sync::Mutex, time::Instant};

use crate::{
    profile::IndexProfile, Candle, ForecastEngine, ForecastError, ForecastRecord,
};

/// Error type returned by collaborators
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("price feed failed for {symbol}: {source}")]
    Feed {
        symbol: String,
        #[source]
        source: BoxError,
    },

    #[error("scan misconfigured: {0}")]
    Config(String),

    #[error("store failed: {0}")]
    Store(#[source] BoxError),

    #[error(transparent)]
    Forecast(#[from] ForecastError),
}

/// Source of recent candles as flat numeric rows
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Column layout of the rows returned by [`PriceFeed::klines`]
    fn index_profile(&self) -> IndexProfile;

    /// Most recent `limit` candles for `symbol`, oldest first
    async fn klines(&self, symbol: &str, limit: usize) -> Result<Vec<Vec<f64>>, BoxError>;
}

/// Persistent side of a scan
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Tradable symbols to scan
    async fn symbols(&self) -> Result<Vec<String>, BoxError>;

    /// Full candle history for `symbol`, oldest first
    async fn history(&self, symbol: &str) -> Result<Vec<Candle>, BoxError>;

    /// Persist a forecast result
    async fn save(&self, record: ForecastRecord) -> Result<(), BoxError>;
}

/// Scan tuning
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Candles requested from the feed per symbol, including the open one
    pub recent_limit: usize,
    /// Minimum time between the starts of two symbols
    pub min_delay: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            recent_limit: 10,
            min_delay: Duration::from_secs(1),
        }
    }
}

/// Cooperative stop signal, checked between symbols
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A symbol that was skipped and why
#[derive(Debug)]
pub struct SkippedSymbol {
    pub symbol: String,
    pub error: ScanError,
}

/// Outcome of one scan
#[derive(Debug, Default)]
pub struct ScanSummary {
    /// Symbols processed, whatever the outcome
    pub scanned: usize,
    /// Records saved
    pub emitted: Vec<ForecastRecord>,
    /// Symbols with no historical match
    pub no_data: Vec<String>,
    pub skipped: Vec<SkippedSymbol>,
    pub cancelled: bool,
}

/// Drives the engine over every symbol the store knows about
pub struct Scanner<F, S> {
    engine: ForecastEngine,
    feed: F,
    store: S,
    config: ScanConfig,
}

impl<F: PriceFeed, S: ResultStore> Scanner<F, S> {
    pub fn new(engine: ForecastEngine, feed: F, store: S, config: ScanConfig) -> Self {
        Self {
            engine,
            feed,
            store,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Scan every symbol once.
    pub async fn run(&self, cancel: &CancelToken) -> Result<ScanSummary, ScanError> {
        self.check_config()?;
        let symbols = self.store.symbols().await.map_err(ScanError::Store)?;
        let mut summary = ScanSummary::default();
        let mut last_start: Option<Instant> = None;

        for symbol in symbols {
            if cancel.is_cancelled() {
                info!("scan cancelled after {} symbols", summary.scanned);
                summary.cancelled = true;
                return Ok(summary);
            }
            if let Some(prev) = last_start {
                tokio::time::sleep_until(prev + self.config.min_delay).await;
            }
            last_start = Some(Instant::now());

            match self.scan_symbol(&symbol).await {
                Ok(Some(record)) => {
                    info!(
                        "{:>10} | change: {:<16} | samples: {}",
                        record.symbol, record.total_change, record.samples
                    );
                    summary.emitted.push(record);
                }
                Ok(None) => {
                    debug!("{symbol}: no historical match");
                    summary.no_data.push(symbol);
                }
                Err(error) => {
                    warn!("{symbol}: skipped: {error}");
                    summary.skipped.push(SkippedSymbol { symbol, error });
                }
            }
            summary.scanned += 1;
        }

        info!(
            "scan finished: {} scanned, {} forecasts, {} skipped",
            summary.scanned,
            summary.emitted.len(),
            summary.skipped.len()
        );
        Ok(summary)
    }

    /// The feed must be asked for the trend window plus the still-open candle.
    fn check_config(&self) -> Result<(), ScanError> {
        let need = self.engine.config().lookback() + 1;
        if self.config.recent_limit < need {
            return Err(ScanError::Config(format!(
                "recent_limit {} is below lookback + 1 = {need}",
                self.config.recent_limit
            )));
        }
        Ok(())
    }

    /// Forecast one symbol. `Ok(None)` when history holds no match.
    pub async fn scan_symbol(&self, symbol: &str) -> Result<Option<ForecastRecord>, ScanError> {
        let rows = self
            .feed
            .klines(symbol, self.config.recent_limit)
            .await
            .map_err(|source| ScanError::Feed {
                symbol: symbol.to_string(),
                source,
            })?;
        let recent = self.feed.index_profile().rows(&rows)?;
        let window = self.engine.trend_window(&recent)?;

        let history = self.store.history(symbol).await.map_err(ScanError::Store)?;
        let forecast = match self.engine.forecast(window, &history) {
            Ok(forecast) => forecast,
            Err(ForecastError::NoMatches) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let record = ForecastRecord::new(symbol, window, &forecast)?;
        self.store.save(record.clone()).await.map_err(ScanError::Store)?;
        Ok(Some(record))
    }
}

// ============================================================
// IN-MEMORY STORE
// ============================================================

/// [`ResultStore`] kept in memory. Saving replaces any earlier record for the same symbol.
#[derive(Debug, Default)]
pub struct MemoryStore {
    symbols: Vec<String>,
    history: HashMap<String, Vec<Candle>>,
    saved: Mutex<Vec<ForecastRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a symbol with its history
    pub fn with_symbol(mut self, symbol: impl Into<String>, history: Vec<Candle>) -> Self {
        let symbol = symbol.into();
        self.symbols.push(symbol.clone());
        self.history.insert(symbol, history);
        self
    }

    /// Records saved so far
    pub async fn saved(&self) -> Vec<ForecastRecord> {
        self.saved.lock().await.clone()
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn symbols(&self) -> Result<Vec<String>, BoxError> {
        Ok(self.symbols.clone())
    }

    async fn history(&self, symbol: &str) -> Result<Vec<Candle>, BoxError> {
        self.history
            .get(symbol)
            .cloned()
            .ok_or_else(|| format!("no history for {symbol}").into())
    }

    async fn save(&self, record: ForecastRecord) -> Result<(), BoxError> {
        let mut saved = self.saved.lock().await;
        saved.retain(|r| r.symbol != record.symbol);
        saved.push(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[tokio::test]
    async fn test_memory_store_replaces_per_symbol() {
        let store = MemoryStore::new().with_symbol("AAA", Vec::new());
        let record = |samples| ForecastRecord {
            symbol: "AAA".to_string(),
            current: "[]".to_string(),
            result: "[]".to_string(),
            samples,
            total_change: "0.00000000".to_string(),
        };

        store.save(record(1)).await.unwrap();
        store.save(record(2)).await.unwrap();

        let saved = store.saved().await;
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].samples, 2);
        assert!(store.history("BBB").await.is_err());
    }
}
