//! Forecast projection - chains averaged changes onto the latest close

use serde::{Deserialize, Serialize};

use crate::{params::ForecastConfig, Candle, ForecastError, Kline, Result};

use super::{
  aggregate::AveragedOutcome,
  helpers::{self, PRICE_PRECISION},
};

/// Projected candles and the summary metric used to rank symbols.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Forecast {
  /// One synthesized candle per forecast offset.
  pub candles: Vec<Candle>,
  /// The averaged change ratios the candles were built from.
  pub averages: Vec<f64>,
  /// Number of historical matches behind the averages.
  pub samples: usize,
  /// `sum(averages) * 100 * periods_per_day`. A ranking heuristic, not a calibrated forecast.
  pub total_change_percent: f64,
}

impl Forecast {
  /// Close of the last projected candle.
  pub fn final_close(&self) -> Option<f64> {
    self.candles.last().map(|c| c.close)
  }
}

/// Synthesizes future candles from an averaged outcome.
#[derive(Debug, Clone, Copy)]
pub struct ForecastProjector {
  lookahead: usize,
  interval_hours: usize,
}

impl ForecastProjector {
  pub fn new(config: &ForecastConfig) -> Self {
    Self { lookahead: config.lookahead(), interval_hours: config.interval_hours() }
  }

  /// Seed with `latest.close()`, then for each offset close at
  /// `round(open + open * change, 8)` and open the next candle at that close.
  ///
  /// Projected candles only model the close path: `high` is the open and `low`
  /// is the close. Each candle starts one interval after the previous one.
  pub fn project<T: Kline>(&self, averaged: &AveragedOutcome, latest: &T) -> Result<Forecast> {
    if averaged.len() != self.lookahead {
      return Err(ForecastError::InvalidWindowSize { need: self.lookahead, got: averaged.len() });
    }

    let step = helpers::interval_ms(self.interval_hours);
    let mut open = latest.close();
    let mut open_time = latest.open_time();
    let mut candles = Vec::with_capacity(self.lookahead);

    for &change in averaged.changes() {
      open_time += step;
      let close = helpers::round_to(helpers::apply_change(open, change), PRICE_PRECISION);
      candles.push(Candle {
        open_time,
        open,
        high: open,
        low: close,
        close,
        volume: 0.0,
        close_time: open_time + step - 1,
      });
      open = close;
    }

    Ok(Forecast {
      candles,
      averages: averaged.changes().to_vec(),
      samples: averaged.samples(),
      total_change_percent: averaged.sum() * 100.0 * helpers::periods_per_day(self.interval_hours),
    })
  }
}
