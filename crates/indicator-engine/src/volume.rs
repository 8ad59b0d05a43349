use crate::Series;

/// Cumulative sum of volume, adding on up-closes, subtracting on
/// down-closes, unchanged on flat closes. `OBV[0] = 0` — unlike the
/// teacher's `technical-analysis::indicators::obv`, which seeds
/// `obv[0] = bars[0].volume`; spec.md's S2 scenario requires the series
/// to start at 0.
pub fn obv(closes: &[f64], volumes: &[f64]) -> Series {
    let mut out: Series = Vec::with_capacity(closes.len());
    if closes.is_empty() {
        return out;
    }
    out.push(Some(0.0));
    let mut running = 0.0;
    for i in 1..closes.len() {
        running += match closes[i].partial_cmp(&closes[i - 1]) {
            Some(std::cmp::Ordering::Greater) => volumes[i],
            Some(std::cmp::Ordering::Less) => -volumes[i],
            _ => 0.0,
        };
        out.push(Some(running));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    // S2 from spec.md §8.
    #[test]
    fn s2_obv_directional() {
        let closes = vec![10.0, 11.0, 11.0, 10.0, 12.0];
        let volumes = vec![100.0, 200.0, 150.0, 300.0, 400.0];
        let out = obv(&closes, &volumes);
        let expected = vec![Some(0.0), Some(200.0), Some(200.0), Some(-100.0), Some(300.0)];
        assert_eq!(out, expected);
    }

    #[test]
    fn obv_step_matches_invariant_2() {
        let closes = vec![10.0, 11.0, 9.0, 9.0];
        let volumes = vec![50.0, 60.0, 70.0, 80.0];
        let out = obv(&closes, &volumes);
        for i in 1..closes.len() {
            let step = out[i].unwrap() - out[i - 1].unwrap();
            let sign = (closes[i] - closes[i - 1]).signum();
            if sign > 0.0 {
                assert_eq!(step, volumes[i]);
            } else if sign < 0.0 {
                assert_eq!(step, -volumes[i]);
            } else {
                assert_eq!(step, 0.0);
            }
        }
    }
}
