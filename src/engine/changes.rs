//! Change extraction - turns a trend window into its signature

use serde::{Deserialize, Serialize};

use crate::{params::ForecastConfig, ForecastError, Kline, Result};

use super::helpers::candle_change;

/// Ordered change ratios describing a trend window, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(Vec<f64>);

impl Signature {
  /// Wrap precomputed change ratios. Length is checked where the signature is used.
  pub fn new(changes: Vec<f64>) -> Self {
    Self(changes)
  }

  #[inline]
  pub fn as_slice(&self) -> &[f64] {
    &self.0
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.0.len()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

/// Computes the signature of a trend window.
#[derive(Debug, Clone, Copy)]
pub struct ChangeExtractor {
  lookback: usize,
}

impl ChangeExtractor {
  pub fn new(config: &ForecastConfig) -> Self {
    Self { lookback: config.lookback() }
  }

  /// One `(close - open) / close` ratio per candle.
  ///
  /// Fails with [`ForecastError::InvalidWindowSize`] unless the window holds
  /// exactly `lookback` candles, and with [`ForecastError::InvalidCandle`] when
  /// a candle's ratio is not finite (zero close, NaN price).
  pub fn changes_of<T: Kline>(&self, window: &[T]) -> Result<Signature> {
    if window.len() != self.lookback {
      return Err(ForecastError::InvalidWindowSize { need: self.lookback, got: window.len() });
    }
    window
      .iter()
      .enumerate()
      .map(|(index, candle)| {
        let change = candle_change(candle);
        if change.is_finite() {
          Ok(change)
        } else {
          Err(ForecastError::InvalidCandle { index, reason: "change ratio is not finite" })
        }
      })
      .collect::<Result<Vec<_>>>()
      .map(Signature)
  }
}
