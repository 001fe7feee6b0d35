//! Forecasting stages
//!
//! The pipeline runs in four synchronous steps, each owned by one component
//! built from a [`ForecastConfig`](crate::params::ForecastConfig):
//!
//! - [`ChangeExtractor`]: trend window -> [`Signature`]
//! - [`PatternMatcher`]: history + signature -> [`Match`]es
//! - [`OutcomeAggregator`]: matches -> [`AveragedOutcome`]
//! - [`ForecastProjector`]: averages + latest candle -> [`Forecast`]

pub mod helpers;

pub mod aggregate;
pub mod changes;
pub mod matcher;
pub mod projector;

pub use aggregate::{AveragedOutcome, OutcomeAggregator};
pub use changes::{ChangeExtractor, Signature};
pub use matcher::{Match, PatternMatcher};
pub use projector::{Forecast, ForecastProjector};
