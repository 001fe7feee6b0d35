//! Outcome aggregation - averages what happened after each match

use serde::{Deserialize, Serialize};

use crate::{params::ForecastConfig, ForecastError, Kline, Result};

use super::{helpers::candle_change, matcher::Match};

/// Mean change ratio per forecast offset, plus the number of matches behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AveragedOutcome {
  changes: Vec<f64>,
  samples: usize,
}

impl AveragedOutcome {
  /// Build from precomputed averages.
  ///
  /// Zero samples is [`ForecastError::NoMatches`]; a non-finite average is
  /// [`ForecastError::NonFinite`].
  pub fn new(changes: Vec<f64>, samples: usize) -> Result<Self> {
    if samples == 0 {
      return Err(ForecastError::NoMatches);
    }
    if let Some(offset) = changes.iter().position(|c| !c.is_finite()) {
      return Err(ForecastError::NonFinite { offset });
    }
    Ok(Self { changes, samples })
  }

  #[inline]
  pub fn changes(&self) -> &[f64] {
    &self.changes
  }

  /// Number of matches averaged.
  #[inline]
  pub fn samples(&self) -> usize {
    self.samples
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.changes.len()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.changes.is_empty()
  }

  pub fn sum(&self) -> f64 {
    self.changes.iter().sum()
  }
}

/// Averages outcome candles across matches.
#[derive(Debug, Clone, Copy)]
pub struct OutcomeAggregator {
  lookahead: usize,
}

impl OutcomeAggregator {
  pub fn new(config: &ForecastConfig) -> Self {
    Self { lookahead: config.lookahead() }
  }

  /// Arithmetic mean of the `j`-th outcome change across all matches, for each `j`.
  ///
  /// Every match must carry exactly `lookahead` outcome candles so each offset
  /// averages the same number of samples.
  pub fn aggregate<T: Kline>(&self, matches: &[Match<'_, T>]) -> Result<AveragedOutcome> {
    if matches.is_empty() {
      return Err(ForecastError::NoMatches);
    }

    let mut sums = vec![0.0; self.lookahead];
    for m in matches {
      if m.outcome.len() != self.lookahead {
        return Err(ForecastError::IncompleteOutcome {
          start: m.start,
          need: self.lookahead,
          got: m.outcome.len(),
        });
      }
      for (sum, candle) in sums.iter_mut().zip(m.outcome) {
        *sum += candle_change(candle);
      }
    }

    let n = matches.len() as f64;
    AveragedOutcome::new(sums.into_iter().map(|s| s / n).collect(), matches.len())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::Candle;

  fn candle(open: f64, close: f64) -> Candle {
    Candle::new(0, open, open.max(close), open.min(close), close, 1.0, 0)
  }

  #[test]
  fn test_empty_matches() {
    let aggregator = OutcomeAggregator::new(&ForecastConfig::default());
    let matches: Vec<Match<'_, Candle>> = Vec::new();
    assert_eq!(aggregator.aggregate(&matches), Err(ForecastError::NoMatches));
  }

  #[test]
  fn test_mean_per_offset() {
    let aggregator = OutcomeAggregator::new(&ForecastConfig::default());
    let first = [candle(80.0, 100.0), candle(100.0, 100.0), candle(100.0, 50.0)];
    let second = [candle(90.0, 100.0), candle(50.0, 100.0), candle(100.0, 100.0)];
    let matches = [
      Match { start: 0, outcome: &first[..] },
      Match { start: 7, outcome: &second[..] },
    ];

    let averaged = aggregator.aggregate(&matches).unwrap();
    assert_eq!(averaged.samples(), 2);
    assert!((averaged.changes()[0] - 0.15).abs() < 1e-12);
    assert!((averaged.changes()[1] - 0.25).abs() < 1e-12);
    assert!((averaged.changes()[2] + 0.5).abs() < 1e-12);
  }

  #[test]
  fn test_short_outcome_rejected() {
    let aggregator = OutcomeAggregator::new(&ForecastConfig::default());
    let full = [candle(1.0, 1.0); 3];
    let short = [candle(1.0, 1.0); 2];
    let matches = [Match { start: 0, outcome: &full[..] }, Match { start: 4, outcome: &short[..] }];

    assert_eq!(
      aggregator.aggregate(&matches),
      Err(ForecastError::IncompleteOutcome { start: 4, need: 3, got: 2 })
    );
  }

  #[test]
  fn test_zero_close_is_not_averaged() {
    let aggregator = OutcomeAggregator::new(&ForecastConfig::default());
    let outcome = [candle(1.0, 1.0), candle(1.0, 0.0), candle(1.0, 1.0)];
    let matches = [Match { start: 0, outcome: &outcome[..] }];

    assert_eq!(aggregator.aggregate(&matches), Err(ForecastError::NonFinite { offset: 1 }));
  }
}
