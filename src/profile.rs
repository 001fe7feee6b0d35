//! Flat numeric rows and the index profile that names their columns
//!
//! Exchange feeds deliver candles as fixed-width rows. An [`IndexProfile`] says
//! which position holds which field, so nothing assumes a column order. Rows are
//! checked against the profile once, up front; the resulting [`ProfiledRow`]
//! views then behave like any other [`Kline`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{Candle, ForecastError, Kline, Result};

/// Position of each candle field within a row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexProfile {
    pub open_time: usize,
    pub open: usize,
    pub high: usize,
    pub low: usize,
    pub close: usize,
    pub volume: usize,
    pub close_time: usize,
}

impl Default for IndexProfile {
    fn default() -> Self {
        Self::binance()
    }
}

impl IndexProfile {
    /// Field names as used in maps and serialized profiles
    pub const FIELDS: [&'static str; 7] =
        ["openTime", "open", "high", "low", "close", "volume", "closeTime"];

    /// Exchange kline layout: open time, OHLC, volume, close time
    pub const fn binance() -> Self {
        Self { open_time: 0, open: 1, high: 2, low: 3, close: 4, volume: 5, close_time: 6 }
    }

    /// Build from a name -> position map. Every field in [`Self::FIELDS`] is
    /// required and no two fields may share a position.
    pub fn from_fields(fields: &HashMap<&str, usize>) -> Result<Self> {
        let get = |name: &str| {
            fields
                .get(name)
                .copied()
                .ok_or_else(|| ForecastError::InvalidConfig(format!("index profile lacks `{name}`")))
        };

        let profile = Self {
            open_time: get("openTime")?,
            open: get("open")?,
            high: get("high")?,
            low: get("low")?,
            close: get("close")?,
            volume: get("volume")?,
            close_time: get("closeTime")?,
        };
        profile.validate()?;
        Ok(profile)
    }

    /// Check that every field has its own position
    pub fn validate(&self) -> Result<()> {
        let positions = self.positions();
        for (i, (field, pos)) in positions.iter().enumerate() {
            if let Some((other, _)) = positions[..i].iter().find(|(_, p)| p == pos) {
                return Err(ForecastError::InvalidConfig(format!(
                    "index profile maps `{other}` and `{field}` to position {pos}"
                )));
            }
        }
        Ok(())
    }

    /// Position of a named field
    pub fn position(&self, field: &str) -> Option<usize> {
        self.positions().into_iter().find(|(name, _)| *name == field).map(|(_, pos)| pos)
    }

    fn positions(&self) -> [(&'static str, usize); 7] {
        [
            ("openTime", self.open_time),
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
            ("volume", self.volume),
            ("closeTime", self.close_time),
        ]
    }

    /// Check that a row has a value at every profiled position.
    ///
    /// `index` is the row's position in its series and is carried into the error.
    pub fn check_row(&self, index: usize, row: &[f64]) -> Result<()> {
        match self.positions().into_iter().find(|(_, pos)| *pos >= row.len()) {
            Some((field, _)) => Err(ForecastError::MalformedRow { index, field }),
            None => Ok(()),
        }
    }

    /// Check every row and return [`Kline`] views over them
    pub fn rows<'a, R: AsRef<[f64]>>(&self, rows: &'a [R]) -> Result<Vec<ProfiledRow<'a>>> {
        rows.iter()
            .enumerate()
            .map(|(index, row)| {
                let values = row.as_ref();
                self.check_row(index, values)?;
                Ok(ProfiledRow { values, profile: *self })
            })
            .collect()
    }

    /// Decode a single row into an owned candle
    pub fn candle(&self, row: &[f64]) -> Result<Candle> {
        self.check_row(0, row)?;
        Ok(ProfiledRow { values: row, profile: *self }.to_candle())
    }

    /// Decode a series of rows into owned candles
    pub fn candles<R: AsRef<[f64]>>(&self, rows: &[R]) -> Result<Vec<Candle>> {
        Ok(self.rows(rows)?.iter().map(Kline::to_candle).collect())
    }
}

impl<'de> Deserialize<'de> for IndexProfile {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let raw = HashMap::<String, usize>::deserialize(d)?;
        let fields: HashMap<&str, usize> = raw.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        Self::from_fields(&fields).map_err(serde::de::Error::custom)
    }
}

/// A checked row read through its index profile
#[derive(Debug, Clone, Copy)]
pub struct ProfiledRow<'a> {
    values: &'a [f64],
    profile: IndexProfile,
}

impl Kline for ProfiledRow<'_> {
    fn open_time(&self) -> i64 {
        self.values[self.profile.open_time] as i64
    }

    fn open(&self) -> f64 {
        self.values[self.profile.open]
    }

    fn high(&self) -> f64 {
        self.values[self.profile.high]
    }

    fn low(&self) -> f64 {
        self.values[self.profile.low]
    }

    fn close(&self) -> f64 {
        self.values[self.profile.close]
    }

    fn volume(&self) -> f64 {
        self.values[self.profile.volume]
    }

    fn close_time(&self) -> i64 {
        self.values[self.profile.close_time] as i64
    }
}
