//! Shared numeric helpers for the forecasting stages
//!
//! Every stage measures a candle the same way: the open-to-close move divided by
//! the close. Keeping that in one place keeps threshold calibration consistent
//! between signature extraction and outcome averaging.

use crate::Kline;

/// Decimal places kept on projected prices.
pub const PRICE_PRECISION: i32 = 8;

/// Milliseconds in one hour.
pub const HOUR_MS: i64 = 3_600_000;

/// Change ratio of a candle: `(close - open) / close`.
///
/// The denominator is the close, not the open. A zero close yields a
/// non-finite value; callers that need finite output check for it.
#[inline]
pub fn change_ratio(open: f64, close: f64) -> f64 {
  (close - open) / close
}

/// [`change_ratio`] of a single candle.
#[inline]
pub fn candle_change<T: Kline>(candle: &T) -> f64 {
  change_ratio(candle.open(), candle.close())
}

/// Apply a change ratio to a price: `price + price * change`.
#[inline]
pub fn apply_change(price: f64, change: f64) -> f64 {
  price + price * change
}

/// Round to a fixed number of decimal places.
#[inline]
pub fn round_to(value: f64, precision: i32) -> f64 {
  let factor = 10f64.powi(precision);
  (value * factor).round() / factor
}

/// Whether two change ratios are within `threshold` of each other.
///
/// The bound is strict, except that identical values always match so a zero
/// threshold means exact equality.
#[inline]
pub fn within_threshold(a: f64, b: f64, threshold: f64) -> bool {
  let diff = (a - b).abs();
  diff < threshold || diff == 0.0
}

/// Number of candles of `interval_hours` that fit in a day.
#[inline]
pub fn periods_per_day(interval_hours: usize) -> f64 {
  24.0 / interval_hours as f64
}

/// Length of one candle interval in milliseconds.
#[inline]
pub fn interval_ms(interval_hours: usize) -> i64 {
  interval_hours as i64 * HOUR_MS
}
