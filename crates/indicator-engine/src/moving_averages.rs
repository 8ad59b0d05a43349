use crate::Series;

/// `SMA(p)[i] = mean(close[i-p+1..=i])` for `i >= p-1`; undefined before
/// that.
pub fn sma(data: &[f64], period: usize) -> Series {
    let mut out: Series = vec![None; data.len()];
    if period == 0 || period > data.len() {
        return out;
    }
    let mut window_sum: f64 = data[..period].iter().sum();
    out[period - 1] = Some(window_sum / period as f64);
    for i in period..data.len() {
        window_sum += data[i] - data[i - period];
        out[i] = Some(window_sum / period as f64);
    }
    out
}

/// `EMA(p)` seeded by `SMA(p)` at index `p-1`, then
/// `EMA[i] = alpha*close[i] + (1-alpha)*EMA[i-1]`, `alpha = 2/(p+1)`.
/// Undefined before the seed index, matching `SMA`'s warm-up.
pub fn ema(data: &[f64], period: usize) -> Series {
    let mut out: Series = vec![None; data.len()];
    if period == 0 || period > data.len() {
        return out;
    }
    let alpha = 2.0 / (period as f64 + 1.0);
    let seed: f64 = data[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = Some(seed);
    let mut prev = seed;
    for i in period..data.len() {
        let v = alpha * data[i] + (1.0 - alpha) * prev;
        out[i] = Some(v);
        prev = v;
    }
    out
}

/// `WMA(p)` weighted by `1..=p`, most recent bar heaviest.
pub fn wma(data: &[f64], period: usize) -> Series {
    let mut out: Series = vec![None; data.len()];
    if period == 0 || period > data.len() {
        return out;
    }
    let denom: f64 = (1..=period).sum::<usize>() as f64;
    for i in (period - 1)..data.len() {
        let mut acc = 0.0;
        for (w, j) in (1..=period).zip((i + 1 - period)..=i) {
            acc += data[j] * w as f64;
        }
        out[i] = Some(acc / denom);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    // S1 from spec.md §8: closes [1,2,3,4,5], SMA(3) = [., ., 2, 3, 4].
    #[test]
    fn s1_sma_sanity() {
        let closes = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let out = sma(&closes, 3);
        assert_eq!(out, vec![None, None, Some(2.0), Some(3.0), Some(4.0)]);
    }

    // S1: EMA(3) seeded at SMA(3), alpha=0.5: last two values = 3.0, 4.0.
    #[test]
    fn s1_ema_sanity() {
        let closes = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let out = ema(&closes, 3);
        assert_eq!(out[2], Some(2.0));
        assert_eq!(out[3], Some(3.0));
        assert_eq!(out[4], Some(4.0));
    }

    #[test]
    fn sma_of_period_one_equals_close() {
        let closes = vec![5.0, 6.0, 7.0];
        assert_eq!(sma(&closes, 1), vec![Some(5.0), Some(6.0), Some(7.0)]);
    }

    #[test]
    fn ema_converges_on_constant_series() {
        let closes = vec![10.0; 20];
        let out = ema(&closes, 5);
        assert!((out.last().unwrap().unwrap() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn wma_weights_recent_bars_more() {
        let closes = vec![1.0, 1.0, 2.0];
        let out = wma(&closes, 3);
        // weights 1,2,3 over [1,1,2]: (1*1 + 1*2 + 2*3)/6 = 9/6 = 1.5
        assert_eq!(out[2], Some(1.5));
    }

    #[test]
    fn undefined_before_warmup() {
        let closes = vec![1.0, 2.0];
        assert_eq!(sma(&closes, 5), vec![None, None]);
        assert_eq!(ema(&closes, 5), vec![None, None]);
        assert_eq!(wma(&closes, 5), vec![None, None]);
    }
}
