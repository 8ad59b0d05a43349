//! C5 Indicator Engine. Every computation returns a value series aligned
//! to bar indices; values before the required warm-up window are `None`
//! rather than filled with zeros or a repeated seed (spec.md §4.1,
//! invariant 1), unlike the teacher's `technical-analysis::indicators`
//! which front-pads with a repeated SMA seed.

pub mod divergence;
pub mod moving_averages;
pub mod oscillators;
pub mod volume;

pub use divergence::{detect_divergence, Divergence, DivergenceConfig, DivergenceKind};
pub use moving_averages::{ema, sma, wma};
pub use oscillators::{
    bollinger_bands, macd, rsi, stochastic_rsi, BollingerBands, BollingerConfig, MacdConfig, MacdResult, RsiConfig,
    StochRsiConfig,
};
pub use volume::obv;

use core_types::{require_sorted_ascending, Bar, CoreError};
use rust_decimal::prelude::ToPrimitive;

/// A value series aligned 1:1 to bar indices. `None` at index `i` means
/// "undefined at this index" (warm-up not yet complete, or no natural
/// value at the series start), never a filled placeholder.
pub type Series = Vec<Option<f64>>;

pub(crate) fn closes(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.close.to_f64().unwrap_or(0.0)).collect()
}

pub(crate) fn highs(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.high.to_f64().unwrap_or(0.0)).collect()
}

pub(crate) fn lows(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.low.to_f64().unwrap_or(0.0)).collect()
}

pub(crate) fn volumes(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.volume.to_f64().unwrap_or(0.0)).collect()
}

/// Validates that a bar series is ready for indicator computation:
/// non-empty and sorted ascending by date. Unsorted input is rejected
/// with `InvalidInput` (spec.md calls this `InvalidSeries` conceptually;
/// this workspace uses the shared `CoreError::InvalidInput` variant).
pub fn validate_series(bars: &[Bar]) -> Result<(), CoreError> {
    if bars.is_empty() {
        return Err(CoreError::InvalidInput("empty bar series".into()));
    }
    require_sorted_ascending(bars)
}
