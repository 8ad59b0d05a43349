//! C7 Pattern Scanner: support/resistance clustering, trend-line fitting,
//! and multi-bar chart pattern detection (spec.md §4.3).

pub mod chart_patterns;
pub mod support_resistance;
pub mod trend_lines;

pub use chart_patterns::{
    detect_cup_and_handle, detect_double_bottom, detect_double_top, detect_head_and_shoulders,
    detect_inverse_head_and_shoulders, detect_triangle, ChartPattern, ChartPatternConfig, PatternResult,
};
pub use support_resistance::{support_resistance, Level, LevelConfig, SupportResistance};
pub use trend_lines::{fit_trend_lines, TrendKind, TrendLine, TrendLineConfig};

use core_types::Bar;

/// A full scan of all pattern families over a single bar series.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ScanResult {
    pub levels: SupportResistance,
    pub trend_lines: Vec<TrendLine>,
    pub chart_patterns: Vec<PatternResult>,
}

pub fn scan(bars: &[Bar]) -> ScanResult {
    let levels = support_resistance(bars, LevelConfig::default());
    let trend_lines = fit_trend_lines(bars, TrendLineConfig::default());
    let cfg = ChartPatternConfig::default();
    let chart_patterns = vec![
        detect_double_top(bars, cfg),
        detect_double_bottom(bars, cfg),
        detect_head_and_shoulders(bars, cfg),
        detect_inverse_head_and_shoulders(bars, cfg),
        detect_cup_and_handle(bars, cfg),
        detect_triangle(bars, cfg),
    ]
    .into_iter()
    .filter(|p| p.detected)
    .collect();

    ScanResult { levels, trend_lines, chart_patterns }
}
