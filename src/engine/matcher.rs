//! Pattern matching - finds historical look-alikes of a signature
//!
//! The scan walks history left to right. A candidate start `i` matches when the
//! candles `i..i + lookback` each sit within the threshold of the signature at
//! the same offset. A match also needs `lookahead` candles after the window; the
//! scan stops once fewer than `lookback + lookahead` candles remain.
//!
//! After a match the cursor jumps past the whole window, so matches never share
//! a candle of their windows. After a miss it advances by one.

use crate::{params::ForecastConfig, ForecastError, Kline, Result};

use super::{changes::Signature, helpers};

/// A matched historical window and the candles that followed it.
#[derive(Debug)]
pub struct Match<'a, T> {
  /// Index of the first candle of the matched window.
  pub start: usize,
  /// The `lookahead` candles starting right after the window.
  pub outcome: &'a [T],
}

impl<T> Clone for Match<'_, T> {
  fn clone(&self) -> Self {
    *self
  }
}

impl<T> Copy for Match<'_, T> {}

/// Searches history for windows resembling a signature.
#[derive(Debug, Clone, Copy)]
pub struct PatternMatcher {
  lookback: usize,
  lookahead: usize,
  threshold: f64,
}

impl PatternMatcher {
  pub fn new(config: &ForecastConfig) -> Self {
    Self {
      lookback: config.lookback(),
      lookahead: config.lookahead(),
      threshold: config.threshold(),
    }
  }

  /// All non-overlapping matches in discovery order.
  ///
  /// History too short for a single candidate yields an empty list. A
  /// signature whose length differs from `lookback` is rejected.
  pub fn find_matches<'a, T: Kline>(
    &self,
    history: &'a [T],
    signature: &Signature,
  ) -> Result<Vec<Match<'a, T>>> {
    if signature.len() != self.lookback {
      return Err(ForecastError::InvalidWindowSize { need: self.lookback, got: signature.len() });
    }

    let span = self.lookback + self.lookahead;
    let mut matches = Vec::new();
    let mut i = 0;

    while i + span <= history.len() {
      if self.matches_at(history, i, signature.as_slice()) {
        matches.push(Match {
          start: i,
          outcome: &history[i + self.lookback..i + span],
        });
        i += self.lookback;
      } else {
        i += 1;
      }
    }

    Ok(matches)
  }

  /// Compare the window starting at `start` against the signature, offset by offset.
  fn matches_at<T: Kline>(&self, history: &[T], start: usize, signature: &[f64]) -> bool {
    for (offset, expected) in signature.iter().enumerate() {
      let change = helpers::candle_change(&history[start + offset]);
      if !helpers::within_threshold(change, *expected, self.threshold) {
        return false;
      }
    }
    true
  }
}
