//! Forecast configuration and parameter metadata
//!
//! A [`ForecastConfig`] is fixed once built and handed to every stage. It can be
//! created directly, from a key/value map (e.g. parsed from a settings file or
//! environment), or deserialized with serde.
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use trendcast::params::ForecastConfig;
//!
//! let mut params = HashMap::new();
//! params.insert("threshold", 0.05);
//! params.insert("intervalHours", 6.0);
//!
//! let config = ForecastConfig::with_params(&params).unwrap();
//! assert_eq!(config.lookback(), 3);
//! assert_eq!(config.interval_hours(), 6);
//!
//! for param in ForecastConfig::param_meta() {
//!     println!("{}: {:?} (default: {})", param.name, param.param_type, param.default);
//! }
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{ForecastError, Period, Result, Threshold};

// ============================================================
// PARAMETER TYPES
// ============================================================

/// Type of parameter value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
  /// Fraction in 0.0..=1.0 (not a percentage)
  Fraction,
  /// Positive integer
  Period,
}

/// Metadata for a single configuration parameter
#[derive(Debug, Clone)]
pub struct ParamMeta {
  /// Key used in parameter maps and serialized configs
  pub name: &'static str,
  pub param_type: ParamType,
  pub default: f64,
  /// Inclusive valid range: (min, max)
  pub range: (f64, f64),
  pub description: &'static str,
}

impl ParamMeta {
  pub const fn fraction(
    name: &'static str,
    default: f64,
    range: (f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Fraction, default, range, description }
  }

  pub const fn period(
    name: &'static str,
    default: f64,
    range: (f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Period, default, range, description }
  }

  /// Validate a value for this parameter
  pub fn validate(&self, value: f64) -> Result<()> {
    if value.is_nan() || value.is_infinite() {
      return Err(ForecastError::InvalidValue("parameter cannot be NaN or infinite"));
    }
    let (min, max) = self.range;
    if value < min || value > max {
      return Err(ForecastError::OutOfRange { field: self.name, value, min, max });
    }
    if self.param_type == ParamType::Period && value.fract() != 0.0 {
      return Err(ForecastError::InvalidValue("Period must be a positive integer"));
    }
    Ok(())
  }
}

const LOOKBACK: ParamMeta = ParamMeta::period(
  "lookback",
  3.0,
  (1.0, 1000.0),
  "Candles in the trend window, ending at the most recent closed candle",
);

const LOOKAHEAD: ParamMeta =
  ParamMeta::period("lookahead", 3.0, (1.0, 1000.0), "Candles projected after the trend window");

const THRESHOLD: ParamMeta = ParamMeta::fraction(
  "threshold",
  0.1,
  (0.0, f64::INFINITY),
  "Largest change-ratio difference still counted as a match",
);

const INTERVAL_HOURS: ParamMeta =
  ParamMeta::period("intervalHours", 4.0, (1.0, 168.0), "Candle interval length in hours");

static PARAMS: [ParamMeta; 4] = [LOOKBACK, LOOKAHEAD, THRESHOLD, INTERVAL_HOURS];

// ============================================================
// FORECAST CONFIG
// ============================================================

/// Immutable tunables shared by all forecasting stages
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawConfig")]
pub struct ForecastConfig {
  lookback: Period,
  lookahead: Period,
  threshold: Threshold,
  interval_hours: Period,
}

impl Default for ForecastConfig {
  fn default() -> Self {
    Self {
      lookback: Period::new_const(3),
      lookahead: Period::new_const(3),
      threshold: Threshold::new_const(0.1),
      interval_hours: Period::new_const(4),
    }
  }
}

impl ForecastConfig {
  /// Create a validated config
  pub fn new(
    lookback: usize,
    lookahead: usize,
    threshold: f64,
    interval_hours: usize,
  ) -> Result<Self> {
    LOOKBACK.validate(lookback as f64)?;
    LOOKAHEAD.validate(lookahead as f64)?;
    THRESHOLD.validate(threshold)?;
    INTERVAL_HOURS.validate(interval_hours as f64)?;

    Ok(Self {
      lookback: Period::new(lookback)?,
      lookahead: Period::new(lookahead)?,
      threshold: Threshold::new(threshold)?,
      interval_hours: Period::new(interval_hours)?,
    })
  }

  /// Metadata for every configurable parameter
  pub fn param_meta() -> &'static [ParamMeta] {
    &PARAMS
  }

  /// Build from a parameter map. Missing keys take their defaults; unknown keys are rejected.
  pub fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
    if let Some(key) = params.keys().find(|k| !PARAMS.iter().any(|p| p.name == **k)) {
      return Err(ForecastError::InvalidConfig(format!("unknown parameter `{key}`")));
    }
    let get = |meta: &ParamMeta| -> Result<f64> {
      let value = params.get(meta.name).copied().unwrap_or(meta.default);
      meta.validate(value)?;
      Ok(value)
    };

    Self::new(
      get(&LOOKBACK)? as usize,
      get(&LOOKAHEAD)? as usize,
      get(&THRESHOLD)?,
      get(&INTERVAL_HOURS)? as usize,
    )
  }

  #[inline]
  pub fn lookback(&self) -> usize {
    self.lookback.get()
  }

  #[inline]
  pub fn lookahead(&self) -> usize {
    self.lookahead.get()
  }

  #[inline]
  pub fn threshold(&self) -> f64 {
    self.threshold.get()
  }

  #[inline]
  pub fn interval_hours(&self) -> usize {
    self.interval_hours.get()
  }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfig {
  lookback: usize,
  lookahead: usize,
  threshold: f64,
  interval_hours: usize,
}

impl TryFrom<RawConfig> for ForecastConfig {
  type Error = ForecastError;

  fn try_from(raw: RawConfig) -> Result<Self> {
    Self::new(raw.lookback, raw.lookahead, raw.threshold, raw.interval_hours)
  }
}

// ============================================================
// TESTS
// ============================================================
