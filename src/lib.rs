//! # trendcast - trend-analogy forecasting
//!
//! Finds past stretches of candles that moved like the current stretch and
//! projects the average of what followed them onto the present.
//!
//! ## Quick Start
//!
//! ```rust
//! use trendcast::prelude::*;
//!
//! let engine = EngineBuilder::new()
//!     .lookback(3)
//!     .lookahead(3)
//!     .threshold(0.1)
//!     .interval_hours(4)
//!     .build()
//!     .unwrap();
//!
//! // Recent candles from the feed; the last one is still open.
//! let recent: Vec<Candle> = (0..5)
//!     .map(|i| Candle::new(i * 14_400_000, 100.0, 101.0, 99.0, 100.5, 10.0, (i + 1) * 14_400_000 - 1))
//!     .collect();
//! let history: Vec<Candle> = recent.repeat(4);
//!
//! let window = engine.trend_window(&recent).unwrap();
//! match engine.forecast(window, &history) {
//!     Ok(forecast) => println!("{} samples, {:.2}%", forecast.samples, forecast.total_change_percent),
//!     Err(ForecastError::NoMatches) => println!("no forecast available"),
//!     Err(e) => panic!("{e}"),
//! }
//! ```

pub mod engine;
pub mod params;
pub mod profile;
pub mod scan;

pub mod prelude {
    pub use crate::{
        // Stages
        engine::{
            AveragedOutcome, ChangeExtractor, Forecast, ForecastProjector, Match,
            OutcomeAggregator, PatternMatcher, Signature,
        },
        // Parallel
        forecast_parallel,
        // Configuration
        params::{ForecastConfig, ParamMeta, ParamType},
        // Rows
        profile::{IndexProfile, ProfiledRow},
        // Scanning
        scan::{CancelToken, MemoryStore, PriceFeed, ResultStore, ScanConfig, ScanError, ScanSummary, Scanner},
        // Types
        Candle,
        EngineBuilder,
        // Errors
        ForecastError,
        ForecastEngine,
        ForecastRecord,
        Kline,
        KlineExt,
        Period,
        Result,
        SymbolFailure,
        SymbolForecast,
        Threshold,
    };
}

use serde::{Deserialize, Serialize};

use engine::{
    AveragedOutcome, ChangeExtractor, Forecast, ForecastProjector, Match, OutcomeAggregator,
    PatternMatcher, Signature,
};
use params::ForecastConfig;

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, ForecastError>;

/// Errors that can occur while forecasting
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ForecastError {
    #[error("Invalid window size: need {need}, got {got}")]
    InvalidWindowSize { need: usize, got: usize },

    #[error("No matches found in history, no forecast available")]
    NoMatches,

    #[error("Malformed row at index {index}: missing `{field}`")]
    MalformedRow { index: usize, field: &'static str },

    #[error("Match at {start} has {got} outcome candles, need {need}")]
    IncompleteOutcome { start: usize, need: usize, got: usize },

    #[error("Average change at offset {offset} is not finite")]
    NonFinite { offset: usize },

    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid candle at index {index}: {reason}")]
    InvalidCandle { index: usize, reason: &'static str },

    #[error("Serialization failed: {0}")]
    Serialization(String),
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Match tolerance as a non-negative fraction.
///
/// Change ratios divide by the close, so a sharp drop goes below `-1` and
/// tolerances above `1.0` are still meaningful.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Threshold(f64);

impl Threshold {
    /// Create a new Threshold, validating the value is finite and >= 0
    pub fn new(value: f64) -> Result<Self> {
        if value.is_nan() || value.is_infinite() {
            return Err(ForecastError::InvalidValue(
                "Threshold cannot be NaN or infinite",
            ));
        }
        if value < 0.0 {
            return Err(ForecastError::OutOfRange {
                field: "threshold",
                value,
                min: 0.0,
                max: f64::INFINITY,
            });
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl Serialize for Threshold {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> Deserialize<'de> for Threshold {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(d)?;
        Threshold::new(value).map_err(serde::de::Error::custom)
    }
}

/// Period (must be > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Period(usize);

impl Period {
    /// Create a new Period, validating value is > 0
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(ForecastError::InvalidValue("Period must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> Deserialize<'de> for Period {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        Period::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// KLINE TRAITS
// ============================================================

/// Read access to one candle, whatever its storage
pub trait Kline {
    /// Open time in milliseconds since the epoch
    fn open_time(&self) -> i64;
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
    fn volume(&self) -> f64;
    /// Close time in milliseconds since the epoch
    fn close_time(&self) -> i64;

    /// Copy into an owned [`Candle`]
    fn to_candle(&self) -> Candle {
        Candle {
            open_time: self.open_time(),
            open: self.open(),
            high: self.high(),
            low: self.low(),
            close: self.close(),
            volume: self.volume(),
            close_time: self.close_time(),
        }
    }
}

/// Extension trait with computed properties for candles
pub trait KlineExt: Kline {
    /// `(close - open) / close`
    #[inline]
    fn change(&self) -> f64 {
        engine::helpers::change_ratio(self.open(), self.close())
    }

    /// Check the candle can be measured: finite prices, `high >= low`, non-zero close
    fn validate(&self) -> Result<()> {
        let prices = [self.open(), self.high(), self.low(), self.close()];
        if prices.iter().any(|p| p.is_nan()) {
            return Err(ForecastError::InvalidCandle {
                index: 0,
                reason: "NaN in OHLC",
            });
        }
        if prices.iter().any(|p| p.is_infinite()) {
            return Err(ForecastError::InvalidCandle {
                index: 0,
                reason: "Infinite value in OHLC",
            });
        }
        if self.high() < self.low() {
            return Err(ForecastError::InvalidCandle {
                index: 0,
                reason: "high < low",
            });
        }
        if self.close() == 0.0 {
            return Err(ForecastError::InvalidCandle {
                index: 0,
                reason: "zero close",
            });
        }
        Ok(())
    }
}

impl<T: Kline> KlineExt for T {}

/// One period of market data: open/close timestamps, OHLC prices and volume
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candle {
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub close_time: i64,
}

impl Candle {
    pub fn new(
        open_time: i64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
        close_time: i64,
    ) -> Self {
        Self {
            open_time,
            open,
            high,
            low,
            close,
            volume,
            close_time,
        }
    }
}

impl Kline for Candle {
    fn open_time(&self) -> i64 {
        self.open_time
    }

    fn open(&self) -> f64 {
        self.open
    }

    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }

    fn volume(&self) -> f64 {
        self.volume
    }

    fn close_time(&self) -> i64 {
        self.close_time
    }
}

// ============================================================
// FORECAST ENGINE
// ============================================================

/// Runs the four forecasting stages over in-memory series.
///
/// Holds no state between calls; every method is a pure function of its inputs
/// and the configuration fixed at build time.
#[derive(Debug, Clone)]
pub struct ForecastEngine {
    config: ForecastConfig,
    validate_data: bool,
    extractor: ChangeExtractor,
    matcher: PatternMatcher,
    aggregator: OutcomeAggregator,
    projector: ForecastProjector,
}

impl ForecastEngine {
    pub fn new(config: ForecastConfig) -> Self {
        Self {
            config,
            validate_data: false,
            extractor: ChangeExtractor::new(&config),
            matcher: PatternMatcher::new(&config),
            aggregator: OutcomeAggregator::new(&config),
            projector: ForecastProjector::new(&config),
        }
    }

    #[inline]
    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    // ===========================================
    // LOW-LEVEL: Individual stages
    // ===========================================

    /// Signature of a trend window of exactly `lookback` candles
    pub fn changes_of<T: Kline>(&self, window: &[T]) -> Result<Signature> {
        self.extractor.changes_of(window)
    }

    /// Non-overlapping historical matches of a signature
    pub fn find_matches<'a, T: Kline>(
        &self,
        history: &'a [T],
        signature: &Signature,
    ) -> Result<Vec<Match<'a, T>>> {
        self.matcher.find_matches(history, signature)
    }

    /// Per-offset mean outcome change across matches
    pub fn aggregate<T: Kline>(&self, matches: &[Match<'_, T>]) -> Result<AveragedOutcome> {
        self.aggregator.aggregate(matches)
    }

    /// Projected candles chained from the latest candle
    pub fn project<T: Kline>(&self, averaged: &AveragedOutcome, latest: &T) -> Result<Forecast> {
        self.projector.project(averaged, latest)
    }

    // ===========================================
    // HIGH-LEVEL: Full pipeline
    // ===========================================

    /// The `lookback` closed candles at the end of a freshly fetched series.
    ///
    /// The final element of `recent` is the still-open candle and is left out,
    /// so at least `lookback + 1` candles are needed.
    pub fn trend_window<'a, T>(&self, recent: &'a [T]) -> Result<&'a [T]> {
        let lookback = self.config.lookback();
        if recent.len() <= lookback {
            return Err(ForecastError::InvalidWindowSize {
                need: lookback + 1,
                got: recent.len(),
            });
        }
        let end = recent.len() - 1;
        Ok(&recent[end - lookback..end])
    }

    /// Run all four stages. An empty match set is [`ForecastError::NoMatches`].
    pub fn forecast<T: Kline, H: Kline>(&self, window: &[T], history: &[H]) -> Result<Forecast> {
        if self.validate_data {
            validate_candles(window)?;
            validate_candles(history)?;
        }

        let signature = self.changes_of(window)?;
        let latest = window.last().ok_or(ForecastError::InvalidWindowSize {
            need: self.config.lookback(),
            got: 0,
        })?;
        let matches = self.find_matches(history, &signature)?;
        let averaged = self.aggregate(&matches)?;
        self.project(&averaged, latest)
    }
}

fn validate_candles<T: Kline>(candles: &[T]) -> Result<()> {
    for (i, candle) in candles.iter().enumerate() {
        candle.validate().map_err(|e| match e {
            ForecastError::InvalidCandle { reason, .. } => {
                ForecastError::InvalidCandle { index: i, reason }
            }
            other => other,
        })?;
    }
    Ok(())
}

// ============================================================
// BUILDER
// ============================================================

/// Builder for creating ForecastEngine instances
#[derive(Debug, Clone)]
pub struct EngineBuilder {
    lookback: usize,
    lookahead: usize,
    threshold: f64,
    interval_hours: usize,
    validate_data: bool,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::from_config(&ForecastConfig::default())
    }

    /// Start from an existing configuration
    pub fn from_config(config: &ForecastConfig) -> Self {
        Self {
            lookback: config.lookback(),
            lookahead: config.lookahead(),
            threshold: config.threshold(),
            interval_hours: config.interval_hours(),
            validate_data: false,
        }
    }

    /// Candles in the trend window
    pub fn lookback(mut self, lookback: usize) -> Self {
        self.lookback = lookback;
        self
    }

    /// Candles to project
    pub fn lookahead(mut self, lookahead: usize) -> Self {
        self.lookahead = lookahead;
        self
    }

    /// Match tolerance as a fraction, e.g. `0.1` for 10%
    pub fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Candle interval in hours
    pub fn interval_hours(mut self, hours: usize) -> Self {
        self.interval_hours = hours;
        self
    }

    /// Enable/disable data validation
    pub fn validate_data(mut self, enable: bool) -> Self {
        self.validate_data = enable;
        self
    }

    /// Build the engine
    pub fn build(self) -> Result<ForecastEngine> {
        let config = ForecastConfig::new(
            self.lookback,
            self.lookahead,
            self.threshold,
            self.interval_hours,
        )?;
        let mut engine = ForecastEngine::new(config);
        engine.validate_data = self.validate_data;
        Ok(engine)
    }
}

// ============================================================
// RESULT RECORD
// ============================================================

/// Forecast result in the shape handed to persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastRecord {
    pub symbol: String,
    /// JSON array of the trend window candles
    pub current: String,
    /// JSON array of the projected candles
    pub result: String,
    pub samples: usize,
    /// Total change percent fixed to 8 decimal places
    pub total_change: String,
}

impl ForecastRecord {
    /// Build a record. Only forecasts backed by at least one match qualify.
    pub fn new<T: Kline>(
        symbol: impl Into<String>,
        window: &[T],
        forecast: &Forecast,
    ) -> Result<Self> {
        if forecast.samples == 0 {
            return Err(ForecastError::NoMatches);
        }
        let current: Vec<Candle> = window.iter().map(Kline::to_candle).collect();

        Ok(Self {
            symbol: symbol.into(),
            current: to_json(&current)?,
            result: to_json(&forecast.candles)?,
            samples: forecast.samples,
            total_change: format!("{:.8}", forecast.total_change_percent),
        })
    }
}

fn to_json(candles: &[Candle]) -> Result<String> {
    serde_json::to_string(candles).map_err(|e| ForecastError::Serialization(e.to_string()))
}

// ============================================================
// PARALLEL FORECASTING
// ============================================================

use rayon::prelude::*;

/// Forecast for a single instrument
#[derive(Debug)]
pub struct SymbolForecast {
    pub symbol: String,
    pub forecast: Forecast,
}

/// Error from forecasting a single instrument
#[derive(Debug)]
pub struct SymbolFailure {
    pub symbol: String,
    pub error: ForecastError,
}

/// Forecast many in-memory instruments at once.
///
/// Each item is `(symbol, trend window, history)`. Every forecast runs on a
/// single thread; only independent instruments run side by side.
pub fn forecast_parallel<'a, T, H, I>(
    engine: &ForecastEngine,
    instruments: I,
) -> (Vec<SymbolForecast>, Vec<SymbolFailure>)
where
    T: Kline + Sync + 'a,
    H: Kline + Sync + 'a,
    I: IntoParallelIterator<Item = (&'a str, &'a [T], &'a [H])>,
{
    let results: Vec<_> = instruments
        .into_par_iter()
        .map(|(symbol, window, history)| {
            engine
                .forecast(window, history)
                .map(|forecast| SymbolForecast {
                    symbol: symbol.to_string(),
                    forecast,
                })
                .map_err(|error| SymbolFailure {
                    symbol: symbol.to_string(),
                    error,
                })
        })
        .collect();

    let mut successes = Vec::new();
    let mut failures = Vec::new();

    for result in results {
        match result {
            Ok(r) => successes.push(r),
            Err(e) => failures.push(e),
        }
    }

    (successes, failures)
}

// ============================================================
// TESTS
// ============================================================
