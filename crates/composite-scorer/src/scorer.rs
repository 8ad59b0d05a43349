//! C12 Composite Scorer entry point (spec.md §4.8).

use crate::models::{CompositeConfig, CompositeScore, ExternalSignals, Rating, SubScores};
use crate::subscores::{momentum_subscore, pattern_subscore, trend_subscore, volatility_subscore, volume_subscore};
use core_types::{Bar, CoreError, CoreResult};

/// Scores a symbol's recent bar window (spec.md §4.8). `bars` must be
/// sorted ascending; only the trailing `cfg.window` bars are used. Returns
/// `InvalidInput` if fewer than `cfg.min_bars` bars are available — below
/// that, MA60/RSI/MACD/Bollinger warm-up windows can't all resolve and the
/// subscores would be meaningless placeholders rather than real signals.
pub fn score_symbol(bars: &[Bar], cfg: &CompositeConfig, external: ExternalSignals) -> CoreResult<CompositeScore> {
    if bars.len() < cfg.min_bars {
        return Err(CoreError::InvalidInput(format!(
            "composite score needs at least {} bars, got {}",
            cfg.min_bars,
            bars.len()
        )));
    }

    let window = bars.len().min(cfg.window);
    let windowed = &bars[bars.len() - window..];

    let mut signals = Vec::new();
    let subscores = SubScores {
        trend: trend_subscore(windowed, &mut signals),
        momentum: momentum_subscore(windowed, &mut signals),
        volatility: volatility_subscore(windowed, &mut signals),
        volume: volume_subscore(windowed, &mut signals),
        pattern: pattern_subscore(windowed, &mut signals),
    };

    let w = cfg.weights;
    let weight_total = w.trend + w.momentum + w.volatility + w.volume + w.pattern;
    let composite = (subscores.trend * w.trend
        + subscores.momentum * w.momentum
        + subscores.volatility * w.volatility
        + subscores.volume * w.volume
        + subscores.pattern * w.pattern)
        / weight_total;

    Ok(CompositeScore {
        subscores,
        composite,
        rating: Rating::from_composite(composite),
        fundamental_score: external.fundamental_score,
        news_score: external.news_score,
        signals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use core_types::Market;
    use rust_decimal::Decimal;

    fn bar(day: u32, close: f64, high: f64, low: f64, volume: f64) -> Bar {
        Bar {
            market: Market::Us,
            code: "AAPL".into(),
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open: Decimal::try_from(close).unwrap(),
            high: Decimal::try_from(high).unwrap(),
            low: Decimal::try_from(low).unwrap(),
            close: Decimal::try_from(close).unwrap(),
            volume: Decimal::try_from(volume).unwrap(),
            amount: None,
            turnover_rate: None,
            change_pct: None,
            precomputed: None,
        }
    }

    /// 90 bars rising steadily from 100 to ~145 with growing volume on up
    /// days — every subscore's inputs should lean bullish, and nothing
    /// here should panic despite the indicator warm-up windows overlapping
    /// near the series start.
    fn uptrend_bars(n: usize) -> Vec<Bar> {
        let mut day = 1u32;
        let mut out = Vec::with_capacity(n);
        let mut price = 100.0;
        for i in 0..n {
            price += 0.5 + (i % 3) as f64 * 0.1;
            let high = price + 1.0;
            let low = price - 1.0;
            let volume = 1_000.0 + i as f64 * 5.0;
            out.push(bar(day, price, high, low, volume));
            day += 1;
            if day > 28 {
                day = 1;
            }
        }
        out
    }

    #[test]
    fn rejects_too_few_bars() {
        let bars = uptrend_bars(30);
        let err = score_symbol(&bars, &CompositeConfig::default(), ExternalSignals::default()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
    }

    #[test]
    fn steady_uptrend_scores_bullish_with_a_consistent_rating() {
        let bars = uptrend_bars(150);
        let result = score_symbol(&bars, &CompositeConfig::default(), ExternalSignals::default()).unwrap();
        assert!(result.subscores.trend > 50.0, "trend subscore: {}", result.subscores.trend);
        assert!(result.composite > 0.0 && result.composite <= 100.0);
        assert_eq!(result.rating, Rating::from_composite(result.composite));
    }

    #[test]
    fn external_signals_pass_through_without_affecting_the_composite() {
        let bars = uptrend_bars(150);
        let plain = score_symbol(&bars, &CompositeConfig::default(), ExternalSignals::default()).unwrap();
        let with_external = score_symbol(
            &bars,
            &CompositeConfig::default(),
            ExternalSignals { fundamental_score: Some(80.0), news_score: Some(20.0) },
        )
        .unwrap();
        assert_eq!(plain.composite, with_external.composite);
        assert_eq!(with_external.fundamental_score, Some(80.0));
        assert_eq!(with_external.news_score, Some(20.0));
    }

    #[test]
    fn window_caps_at_config_window_not_full_history() {
        let bars = uptrend_bars(400);
        let mut cfg = CompositeConfig::default();
        cfg.window = 80;
        let result = score_symbol(&bars, &cfg, ExternalSignals::default());
        assert!(result.is_ok());
    }
}
