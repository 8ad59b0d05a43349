use crate::moving_averages::ema;
use crate::Series;

#[derive(Debug, Clone, Copy)]
pub struct RsiConfig {
    pub period: usize,
}

impl Default for RsiConfig {
    fn default() -> Self {
        Self { period: 14 }
    }
}

/// Wilder-smoothed RSI. Gains/losses are averaged with smoothing factor
/// `1/p` after an initial simple average over the first `p` deltas.
/// `RSI = 100 - 100/(1+RS)`, `RS = avgGain/avgLoss`; `avgLoss = 0` maps to
/// `RSI = 100`.
pub fn rsi(data: &[f64], cfg: RsiConfig) -> Series {
    let period = cfg.period;
    let mut out: Series = vec![None; data.len()];
    if period == 0 || data.len() <= period {
        return out;
    }

    let deltas: Vec<f64> = data.windows(2).map(|w| w[1] - w[0]).collect();
    let gains: Vec<f64> = deltas.iter().map(|&d| d.max(0.0)).collect();
    let losses: Vec<f64> = deltas.iter().map(|&d| (-d).max(0.0)).collect();

    let mut avg_gain: f64 = gains[..period].iter().sum::<f64>() / period as f64;
    let mut avg_loss: f64 = losses[..period].iter().sum::<f64>() / period as f64;

    out[period] = Some(rsi_value(avg_gain, avg_loss));

    for i in period..deltas.len() {
        avg_gain = (avg_gain * (period - 1) as f64 + gains[i]) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + losses[i]) / period as f64;
        out[i + 1] = Some(rsi_value(avg_gain, avg_loss));
    }

    out
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_gain == 0.0 && avg_loss == 0.0 {
        return 50.0;
    }
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

#[derive(Debug, Clone, Copy)]
pub struct StochRsiConfig {
    pub rsi_period: usize,
    pub stoch_period: usize,
    pub smoothing: usize,
}

impl Default for StochRsiConfig {
    fn default() -> Self {
        Self { rsi_period: 14, stoch_period: 14, smoothing: 3 }
    }
}

/// `(RSI - min(RSI, k)) / (max(RSI, k) - min(RSI, k))` over a k-window,
/// smoothed by `smoothing` (an SMA pass over the raw stochastic).
pub fn stochastic_rsi(data: &[f64], cfg: StochRsiConfig) -> Series {
    let rsi_series = rsi(data, RsiConfig { period: cfg.rsi_period });
    let n = rsi_series.len();
    let mut raw: Series = vec![None; n];

    for i in 0..n {
        if i + 1 < cfg.stoch_period {
            continue;
        }
        let window = &rsi_series[(i + 1 - cfg.stoch_period)..=i];
        if window.iter().any(Option::is_none) {
            continue;
        }
        let values: Vec<f64> = window.iter().map(|v| v.unwrap()).collect();
        let lo = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let hi = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        raw[i] = if (hi - lo).abs() < 1e-12 {
            Some(0.0)
        } else {
            Some((rsi_series[i].unwrap() - lo) / (hi - lo))
        };
    }

    let first_defined = raw.iter().position(Option::is_some);
    match first_defined {
        Some(start) => {
            let dense: Vec<f64> = raw[start..].iter().map(|v| v.unwrap()).collect();
            let smoothed = crate::moving_averages::sma(&dense, cfg.smoothing);
            let mut full = vec![None; n];
            for (i, v) in smoothed.into_iter().enumerate() {
                full[start + i] = v;
            }
            full
        }
        None => vec![None; n],
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MacdConfig {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

impl Default for MacdConfig {
    fn default() -> Self {
        Self { fast: 12, slow: 26, signal: 9 }
    }
}

#[derive(Debug, Clone)]
pub struct MacdResult {
    pub macd: Series,
    pub signal: Series,
    pub histogram: Series,
    /// +1 when macd crosses above signal, -1 when it crosses below, 0 otherwise.
    pub cross: Vec<i8>,
}

/// `macd = EMA(fast) - EMA(slow)`, `signal = EMA(macd, signal period)`,
/// `hist = macd - signal`. Invariant 3 (spec.md §8): `hist == macd -
/// signal` wherever both are defined.
pub fn macd(data: &[f64], cfg: MacdConfig) -> MacdResult {
    let n = data.len();
    let fast = ema(data, cfg.fast);
    let slow = ema(data, cfg.slow);

    let macd_line: Series = (0..n)
        .map(|i| match (fast[i], slow[i]) {
            (Some(f), Some(s)) => Some(f - s),
            _ => None,
        })
        .collect();

    // EMA the defined suffix of macd_line, then re-align to the full index range.
    let first_defined = macd_line.iter().position(Option::is_some);
    let signal_line = match first_defined {
        Some(start) => {
            let dense: Vec<f64> = macd_line[start..].iter().map(|v| v.unwrap()).collect();
            let dense_signal = ema(&dense, cfg.signal);
            let mut full = vec![None; n];
            for (i, v) in dense_signal.into_iter().enumerate() {
                full[start + i] = v;
            }
            full
        }
        None => vec![None; n],
    };

    let histogram: Series = (0..n)
        .map(|i| match (macd_line[i], signal_line[i]) {
            (Some(m), Some(s)) => Some(m - s),
            _ => None,
        })
        .collect();

    let mut cross = vec![0i8; n];
    for i in 1..n {
        if let (Some(m0), Some(s0), Some(m1), Some(s1)) =
            (macd_line[i - 1], signal_line[i - 1], macd_line[i], signal_line[i])
        {
            if m0 <= s0 && m1 > s1 {
                cross[i] = 1;
            } else if m0 >= s0 && m1 < s1 {
                cross[i] = -1;
            }
        }
    }

    MacdResult { macd: macd_line, signal: signal_line, histogram, cross }
}

#[derive(Debug, Clone, Copy)]
pub struct BollingerConfig {
    pub period: usize,
    pub std_dev: f64,
    pub squeeze_threshold: f64,
}

impl Default for BollingerConfig {
    fn default() -> Self {
        Self { period: 20, std_dev: 2.0, squeeze_threshold: 0.1 }
    }
}

#[derive(Debug, Clone)]
pub struct BollingerBands {
    pub upper: Series,
    pub middle: Series,
    pub lower: Series,
    pub squeeze: Vec<bool>,
}

/// `middle = SMA(p)`; `upper/lower = middle +/- sigma*stdev(close, p)`.
/// Squeeze fires when `(upper-lower)/middle < tau`.
pub fn bollinger_bands(data: &[f64], cfg: BollingerConfig) -> BollingerBands {
    let n = data.len();
    let middle = crate::moving_averages::sma(data, cfg.period);
    let mut upper = vec![None; n];
    let mut lower = vec![None; n];
    let mut squeeze = vec![false; n];

    for i in 0..n {
        let Some(mid) = middle[i] else { continue };
        if i + 1 < cfg.period {
            continue;
        }
        let window = &data[(i + 1 - cfg.period)..=i];
        let variance = window.iter().map(|v| (v - mid).powi(2)).sum::<f64>() / cfg.period as f64;
        let std = variance.sqrt();
        let u = mid + cfg.std_dev * std;
        let l = mid - cfg.std_dev * std;
        upper[i] = Some(u);
        lower[i] = Some(l);
        if mid != 0.0 {
            squeeze[i] = (u - l) / mid < cfg.squeeze_threshold;
        }
    }

    BollingerBands { upper, middle, lower, squeeze }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_series_gives_rsi_50_after_warmup() {
        let data = vec![10.0; 30];
        let out = rsi(&data, RsiConfig { period: 14 });
        assert_eq!(out[14], Some(50.0));
        assert_eq!(out[29], Some(50.0));
    }

    #[test]
    fn rsi_undefined_before_warmup() {
        let data = vec![1.0, 2.0, 3.0];
        let out = rsi(&data, RsiConfig { period: 14 });
        assert!(out.iter().all(Option::is_none));
    }

    #[test]
    fn all_losses_give_rsi_zero_via_full_loss() {
        let data: Vec<f64> = (0..20).map(|i| 100.0 - i as f64).collect();
        let out = rsi(&data, RsiConfig { period: 14 });
        // avgGain == 0, avgLoss > 0 => RS = 0 => RSI = 0
        assert_eq!(out[14], Some(0.0));
    }

    #[test]
    fn macd_histogram_equals_macd_minus_signal() {
        let data: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.3).sin() * 10.0).collect();
        let m = macd(&data, MacdConfig::default());
        for i in 0..data.len() {
            if let (Some(macd_v), Some(sig_v), Some(hist_v)) = (m.macd[i], m.signal[i], m.histogram[i]) {
                assert!((hist_v - (macd_v - sig_v)).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn constant_series_gives_zero_macd_histogram() {
        let data = vec![50.0; 60];
        let m = macd(&data, MacdConfig::default());
        let last = m.histogram.last().unwrap().unwrap();
        assert!(last.abs() < 1e-9);
    }

    #[test]
    fn bollinger_bands_bracket_constant_series_tightly() {
        let data = vec![20.0; 25];
        let bands = bollinger_bands(&data, BollingerConfig::default());
        let last = 24;
        assert_eq!(bands.middle[last], Some(20.0));
        assert_eq!(bands.upper[last], Some(20.0));
        assert_eq!(bands.lower[last], Some(20.0));
    }
}
