//! Integration tests for the forecasting pipeline.
//!
//! These run the four stages end to end on both candle representations.

use std::collections::HashMap;

use trendcast::prelude::*;

const HOUR: i64 = 3_600_000;

/// Candle opening at 100 whose `(close - open) / close` equals `change`
fn with_change(i: usize, change: f64) -> Candle {
    let open = 100.0;
    let close = open / (1.0 - change);
    let open_time = i as i64 * 4 * HOUR;
    Candle::new(
        open_time,
        open,
        open.max(close),
        open.min(close),
        close,
        1_000.0,
        open_time + 4 * HOUR - 1,
    )
}

/// Candle closing at `close` whose change equals `change`
fn closing_at(i: usize, close: f64, change: f64) -> Candle {
    let open = close * (1.0 - change);
    let open_time = i as i64 * 4 * HOUR;
    Candle::new(
        open_time,
        open,
        open.max(close),
        open.min(close),
        close,
        1_000.0,
        open_time + 4 * HOUR - 1,
    )
}

/// 46 candles of large moves with one analog at 40 followed by known outcomes
fn history_with_analog() -> Vec<Candle> {
    let mut changes = vec![0.5; 46];
    changes[40..46].copy_from_slice(&[0.01, -0.02, 0.015, 0.02, 0.01, -0.005]);
    changes
        .iter()
        .enumerate()
        .map(|(i, c)| with_change(i, *c))
        .collect()
}

fn current_window() -> Vec<Candle> {
    vec![
        closing_at(100, 98.0, 0.01),
        closing_at(101, 99.0, -0.02),
        closing_at(102, 100.0, 0.015),
    ]
}

fn assert_close(actual: &[f64], expected: &[f64]) {
    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() < 1e-9, "{actual:?} != {expected:?}");
    }
}

// ============================================================
// STAGE BY STAGE
// ============================================================

#[test]
fn test_single_analog_scenario() {
    let engine = EngineBuilder::new().threshold(0.1).build().unwrap();
    let history = history_with_analog();
    let window = current_window();

    let signature = engine.changes_of(&window).unwrap();
    assert_close(signature.as_slice(), &[0.01, -0.02, 0.015]);

    let matches = engine.find_matches(&history, &signature).unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].start, 40);
    assert_eq!(matches[0].outcome, &history[43..46]);

    let averaged = engine.aggregate(&matches).unwrap();
    assert_eq!(averaged.samples(), 1);
    assert_close(averaged.changes(), &[0.02, 0.01, -0.005]);

    let forecast = engine.project(&averaged, &window[2]).unwrap();
    let closes: Vec<f64> = forecast.candles.iter().map(|c| c.close).collect();
    assert_eq!(closes, vec![102.0, 103.02, 102.5049]);

    let expected_total = (0.02 + 0.01 - 0.005) * 100.0 * 6.0;
    assert!((forecast.total_change_percent - expected_total).abs() < 1e-9);
}

#[test]
fn test_pipeline_matches_stages() {
    let engine = EngineBuilder::new().build().unwrap();
    let history = history_with_analog();
    let window = current_window();

    let forecast = engine.forecast(&window, &history).unwrap();
    assert_eq!(forecast.samples, 1);
    assert_eq!(forecast.candles[0].open, 100.0);
    assert_eq!(forecast.candles[0].open_time, window[2].open_time + 4 * HOUR);

    // Pure: same inputs, same output
    assert_eq!(engine.forecast(&window, &history).unwrap(), forecast);
}

#[test]
fn test_open_chains_previous_close() {
    let engine = EngineBuilder::new().lookahead(5).build().unwrap();
    let history: Vec<Candle> = [0.01, 0.01, 0.01, 0.03, -0.02, 0.04, -0.01, 0.02]
        .iter()
        .enumerate()
        .map(|(i, c)| with_change(i, *c))
        .collect();
    let window: Vec<Candle> = (0..3).map(|i| closing_at(i, 50.0, 0.01)).collect();

    let forecast = engine.forecast(&window, &history).unwrap();
    assert_eq!(forecast.candles.len(), 5);
    assert_eq!(forecast.candles[0].open, 50.0);
    for pair in forecast.candles.windows(2) {
        assert_eq!(pair[1].open, pair[0].close);
    }
}

// ============================================================
// EDGE CASES
// ============================================================

#[test]
fn test_no_match_is_no_forecast() {
    let engine = EngineBuilder::new().build().unwrap();
    let history: Vec<Candle> = (0..50).map(|i| with_change(i, 0.5)).collect();

    let result = engine.forecast(&current_window(), &history);
    assert_eq!(result, Err(ForecastError::NoMatches));
}

#[test]
fn test_short_history_is_empty_not_error() {
    let engine = EngineBuilder::new().build().unwrap();
    let history: Vec<Candle> = (0..5).map(|i| with_change(i, 0.01)).collect();
    let signature = Signature::new(vec![0.01, 0.01, 0.01]);

    assert!(engine.find_matches(&history, &signature).unwrap().is_empty());
}

#[test]
fn test_zero_threshold_on_noisy_data() {
    let engine = EngineBuilder::new().threshold(0.0).build().unwrap();

    // Distinct changes everywhere: nothing equals the signature exactly.
    let noisy: Vec<Candle> = (0..60)
        .map(|i| with_change(i, ((i * 37 % 101) as f64 - 50.0) / 1_000.0))
        .collect();
    let signature = Signature::new(vec![0.0101, -0.0203, 0.0305]);
    assert!(engine.find_matches(&noisy, &signature).unwrap().is_empty());

    // An exact copy of one stretch still matches.
    let signature = engine.changes_of(&noisy[10..13]).unwrap();
    let matches = engine.find_matches(&noisy, &signature).unwrap();
    assert!(!matches.is_empty());
    for m in &matches {
        let found = engine.changes_of(&noisy[m.start..m.start + 3]).unwrap();
        assert_eq!(found, signature);
    }
}

#[test]
fn test_zero_close_window_is_an_error_not_no_match() {
    let engine = EngineBuilder::new().build().unwrap();
    let mut window = current_window();
    window[1].close = 0.0;

    assert_eq!(
        engine.forecast(&window, &history_with_analog()),
        Err(ForecastError::InvalidCandle {
            index: 1,
            reason: "change ratio is not finite",
        })
    );
}

#[test]
fn test_wrong_window_size() {
    let engine = EngineBuilder::new().build().unwrap();
    let window = &current_window()[..2];

    assert_eq!(
        engine.forecast(window, &history_with_analog()),
        Err(ForecastError::InvalidWindowSize { need: 3, got: 2 })
    );
}

// ============================================================
// ROW REPRESENTATION
// ============================================================

/// Rows laid out as close, open, high, low, volume, closeTime, openTime
fn reordered_profile() -> IndexProfile {
    let mut fields = HashMap::new();
    for (pos, name) in ["close", "open", "high", "low", "volume", "closeTime", "openTime"]
        .into_iter()
        .enumerate()
    {
        fields.insert(name, pos);
    }
    IndexProfile::from_fields(&fields).unwrap()
}

fn to_rows(candles: &[Candle]) -> Vec<Vec<f64>> {
    candles
        .iter()
        .map(|c| {
            vec![
                c.close,
                c.open,
                c.high,
                c.low,
                c.volume,
                c.close_time as f64,
                c.open_time as f64,
            ]
        })
        .collect()
}

#[test]
fn test_rows_and_candles_agree() {
    let engine = EngineBuilder::new().build().unwrap();
    let profile = reordered_profile();

    let history = history_with_analog();
    let window = current_window();
    let history_rows = to_rows(&history);
    let window_rows = to_rows(&window);

    let from_candles = engine.forecast(&window, &history).unwrap();
    let from_rows = engine
        .forecast(&profile.rows(&window_rows).unwrap(), &profile.rows(&history_rows).unwrap())
        .unwrap();
    assert_eq!(from_rows, from_candles);

    // Mixed: profiled window against keyed history
    let mixed = engine
        .forecast(&profile.rows(&window_rows).unwrap(), &history)
        .unwrap();
    assert_eq!(mixed, from_candles);
}

#[test]
fn test_malformed_row_is_fatal() {
    let profile = IndexProfile::binance();
    let mut rows = to_rows(&history_with_analog());
    rows[12].truncate(6);

    assert_eq!(
        profile.rows(&rows).unwrap_err(),
        ForecastError::MalformedRow {
            index: 12,
            field: "closeTime",
        }
    );
}

#[test]
fn test_trend_window_from_feed_rows() {
    let engine = EngineBuilder::new().build().unwrap();
    let profile = IndexProfile::binance();
    let rows: Vec<Vec<f64>> = (0..10)
        .map(|i| {
            let t = (i * 4 * HOUR) as f64;
            vec![t, 1.0, 1.2, 0.9, 1.1, 5.0, t + (4 * HOUR - 1) as f64]
        })
        .collect();

    let recent = profile.rows(&rows).unwrap();
    let window = engine.trend_window(&recent).unwrap();
    let times: Vec<i64> = window.iter().map(|r| r.open_time()).collect();
    assert_eq!(times, vec![6 * 4 * HOUR, 7 * 4 * HOUR, 8 * 4 * HOUR]);
}

// ============================================================
// RECORDS
// ============================================================

#[test]
fn test_record_from_forecast() {
    let engine = EngineBuilder::new().build().unwrap();
    let window = current_window();
    let forecast = engine.forecast(&window, &history_with_analog()).unwrap();

    let record = ForecastRecord::new("VENBTC", &window, &forecast).unwrap();
    assert_eq!(record.samples, 1);
    assert_eq!(record.total_change, "15.00000000");

    let result: Vec<Candle> = serde_json::from_str(&record.result).unwrap();
    let closes: Vec<f64> = result.iter().map(|c| c.close).collect();
    assert_close(&closes, &[102.0, 103.02, 102.5049]);
}
