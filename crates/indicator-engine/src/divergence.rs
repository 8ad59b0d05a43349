use crate::Series;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PivotKind {
    High,
    Low,
}

#[derive(Debug, Clone, Copy)]
pub struct Pivot {
    pub index: usize,
    pub kind: PivotKind,
}

/// Finds local extrema using a symmetric window test: index `i` is a high
/// (low) pivot iff it is the strict max (min) over `[i-window, i+window]`.
pub fn find_pivots(series: &[f64], window: usize) -> Vec<Pivot> {
    let n = series.len();
    let mut pivots = Vec::new();
    if window == 0 || n < 2 * window + 1 {
        return pivots;
    }
    for i in window..(n - window) {
        let slice = &series[(i - window)..=(i + window)];
        let v = series[i];
        if slice.iter().all(|&x| x <= v) && slice.iter().filter(|&&x| x == v).count() == 1 {
            pivots.push(Pivot { index: i, kind: PivotKind::High });
        } else if slice.iter().all(|&x| x >= v) && slice.iter().filter(|&&x| x == v).count() == 1 {
            pivots.push(Pivot { index: i, kind: PivotKind::Low });
        }
    }
    pivots
}

#[derive(Debug, Clone, Copy)]
pub struct DivergenceConfig {
    /// Half-width of the local-extremum pivot test.
    pub pivot_window: usize,
    /// How many bars back to look for a prior same-kind pivot to compare against.
    pub lookback: usize,
    /// Minimum fractional price change between pivots to consider, e.g. 0.01 = 1%.
    pub min_price_change_pct: f64,
    /// Minimum absolute indicator change between pivots to consider.
    pub min_indicator_change: f64,
}

impl Default for DivergenceConfig {
    fn default() -> Self {
        Self {
            pivot_window: 3,
            lookback: 60,
            min_price_change_pct: 0.01,
            min_indicator_change: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DivergenceKind {
    Bullish,
    Bearish,
}

#[derive(Debug, Clone, Copy)]
pub struct Divergence {
    pub kind: DivergenceKind,
    pub prior_index: usize,
    pub recent_index: usize,
}

/// Detects when the series of local price extrema disagrees with the
/// corresponding indicator extrema over a lookback window: price makes a
/// higher high while the indicator makes a lower high (bearish), or price
/// makes a lower low while the indicator makes a higher low (bullish).
pub fn detect_divergence(price: &[f64], indicator: &Series, cfg: DivergenceConfig) -> Vec<Divergence> {
    let pivots = find_pivots(price, cfg.pivot_window);
    let mut out = Vec::new();

    for kind in [PivotKind::High, PivotKind::Low] {
        let same_kind: Vec<&Pivot> = pivots.iter().filter(|p| p.kind == kind).collect();
        for pair in same_kind.windows(2) {
            let (prior, recent) = (pair[0], pair[1]);
            if recent.index - prior.index > cfg.lookback {
                continue;
            }
            let (Some(ind_prior), Some(ind_recent)) = (indicator[prior.index], indicator[recent.index]) else {
                continue;
            };

            let price_prior = price[prior.index];
            let price_recent = price[recent.index];
            if price_prior == 0.0 {
                continue;
            }
            let price_change_pct = (price_recent - price_prior) / price_prior;
            let indicator_change = ind_recent - ind_prior;

            if price_change_pct.abs() < cfg.min_price_change_pct
                || indicator_change.abs() < cfg.min_indicator_change
            {
                continue;
            }

            let divergent = match kind {
                PivotKind::High => price_change_pct > 0.0 && indicator_change < 0.0,
                PivotKind::Low => price_change_pct < 0.0 && indicator_change > 0.0,
            };
            if divergent {
                let div_kind = match kind {
                    PivotKind::High => DivergenceKind::Bearish,
                    PivotKind::Low => DivergenceKind::Bullish,
                };
                out.push(Divergence { kind: div_kind, prior_index: prior.index, recent_index: recent.index });
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_bearish_divergence_on_higher_high_weaker_indicator() {
        // price: rises to a pivot, dips, rises to a higher pivot
        let price = vec![1.0, 2.0, 3.0, 2.0, 1.0, 2.0, 3.5, 2.0, 1.0];
        let indicator: Series = vec![
            Some(10.0), Some(20.0), Some(30.0), Some(20.0), Some(10.0),
            Some(15.0), Some(25.0), Some(15.0), Some(10.0),
        ];
        let divs = detect_divergence(&price, &indicator, DivergenceConfig::default());
        assert!(divs.iter().any(|d| d.kind == DivergenceKind::Bearish));
    }

    #[test]
    fn no_divergence_on_constant_series() {
        let price = vec![10.0; 20];
        let indicator: Series = vec![Some(50.0); 20];
        let divs = detect_divergence(&price, &indicator, DivergenceConfig::default());
        assert!(divs.is_empty());
    }

    #[test]
    fn pivot_detection_finds_single_peak() {
        let series = vec![1.0, 2.0, 5.0, 2.0, 1.0];
        let pivots = find_pivots(&series, 1);
        assert_eq!(pivots.len(), 1);
        assert_eq!(pivots[0].index, 2);
        assert_eq!(pivots[0].kind, PivotKind::High);
    }
}
