//! Per-channel time-domain statistics.
//!
//! All functions propagate NaN instead of failing: short or constant frames
//! yield NaN moments, which downstream consumers must tolerate.

use crate::dsp::simpson;
use ndarray::{Array2, ArrayView2};

pub fn mean(x: &[f64]) -> f64 {
    if x.is_empty() {
        return f64::NAN;
    }
    x.iter().sum::<f64>() / x.len() as f64
}

/// Unbiased variance (divisor n - 1)
pub fn variance(x: &[f64]) -> f64 {
    let n = x.len();
    if n < 2 {
        return f64::NAN;
    }
    let m = mean(x);
    x.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (n - 1) as f64
}

/// Central moments m2, m3, m4 of the finite samples, with their count
fn central_moments(x: &[f64]) -> (usize, f64, f64, f64) {
    let values: Vec<f64> = x.iter().copied().filter(|v| v.is_finite()).collect();
    let n = values.len();
    if n == 0 {
        return (0, f64::NAN, f64::NAN, f64::NAN);
    }
    let m = mean(&values);
    let (mut m2, mut m3, mut m4) = (0.0, 0.0, 0.0);
    for v in &values {
        let d = v - m;
        let d2 = d * d;
        m2 += d2;
        m3 += d2 * d;
        m4 += d2 * d2;
    }
    let nf = n as f64;
    (n, m2 / nf, m3 / nf, m4 / nf)
}

/// Bias-corrected sample skewness, non-finite samples omitted.
///
/// Zero spread gives NaN; fewer than three samples skip the correction.
pub fn skewness(x: &[f64]) -> f64 {
    let (n, m2, m3, _) = central_moments(x);
    if n == 0 || m2 == 0.0 {
        return f64::NAN;
    }
    let g1 = m3 / m2.powf(1.5);
    if n > 2 {
        let nf = n as f64;
        g1 * (nf * (nf - 1.0)).sqrt() / (nf - 2.0)
    } else {
        g1
    }
}

/// Bias-corrected excess (Fisher) kurtosis, non-finite samples omitted.
///
/// Zero spread gives NaN; fewer than four samples skip the correction.
pub fn kurtosis(x: &[f64]) -> f64 {
    let (n, m2, _, m4) = central_moments(x);
    if n == 0 || m2 == 0.0 {
        return f64::NAN;
    }
    let g2 = m4 / (m2 * m2);
    if n > 3 {
        let nf = n as f64;
        ((nf * nf - 1.0) * g2 - 3.0 * (nf - 1.0).powi(2)) / ((nf - 2.0) * (nf - 3.0))
    } else {
        g2 - 3.0
    }
}

fn sign(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else if v == 0.0 {
        0.0
    } else {
        f64::NAN
    }
}

/// Number of adjacent sample pairs whose sign differs.
///
/// Touching zero counts as a change, as does any NaN.
pub fn zero_crossings(x: &[f64]) -> f64 {
    x.windows(2)
        .filter(|w| sign(w[1]) - sign(w[0]) != 0.0)
        .count() as f64
}

/// Simpson integral of |x| with a fixed sample spacing
pub fn absolute_area(x: &[f64], dx: f64) -> f64 {
    let abs: Vec<f64> = x.iter().map(|v| v.abs()).collect();
    simpson(&abs, dx)
}

pub fn peak_to_peak(x: &[f64]) -> f64 {
    if x.is_empty() || x.iter().any(|v| v.is_nan()) {
        return f64::NAN;
    }
    let (lo, hi) = x
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    hi - lo
}

/// 1-based ranks with ties sharing their average rank
fn average_ranks(x: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..x.len()).collect();
    order.sort_by(|&a, &b| x[a].total_cmp(&x[b]));

    let mut ranks = vec![0.0; x.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && x[order[j + 1]] == x[order[i]] {
            j += 1;
        }
        let rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = rank;
        }
        i = j + 1;
    }
    ranks
}

fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let mx = mean(x);
    let my = mean(y);
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        let dx = a - mx;
        let dy = b - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    let denom = (sxx * syy).sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return f64::NAN;
    }
    (sxy / denom).clamp(-1.0, 1.0)
}

/// Spearman rank correlation between two series over their jointly finite samples
pub fn spearman(x: &[f64], y: &[f64]) -> f64 {
    let (xs, ys): (Vec<f64>, Vec<f64>) = x
        .iter()
        .zip(y)
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .map(|(&a, &b)| (a, b))
        .unzip();
    if xs.len() < 2 {
        return f64::NAN;
    }
    pearson(&average_ranks(&xs), &average_ranks(&ys))
}

/// Channels x channels Spearman matrix of a channels x time frame
pub fn spearman_matrix(frame: ArrayView2<'_, f64>) -> Array2<f64> {
    let rows: Vec<Vec<f64>> = frame.outer_iter().map(|row| row.to_vec()).collect();
    let n = rows.len();
    let mut corr = Array2::from_elem((n, n), f64::NAN);
    for i in 0..n {
        for j in i..n {
            let r = spearman(&rows[i], &rows[j]);
            corr[[i, j]] = r;
            corr[[j, i]] = r;
        }
    }
    corr
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    const EPS: f64 = 1e-10;

    #[test]
    fn test_variance_unbiased() {
        assert!((variance(&[1.0, 2.0, 3.0, 4.0]) - 5.0 / 3.0).abs() < EPS);
        assert!(variance(&[1.0]).is_nan());
    }

    #[test]
    fn test_skewness_bias_corrected() {
        // n = 5: correction factor sqrt(n(n-1))/(n-2) = sqrt(20)/3
        let x = [1.0, 2.0, 3.0, 10.0, 4.0];
        let (_, m2, m3, _) = central_moments(&x);
        let expected = m3 / m2.powf(1.5) * 20f64.sqrt() / 3.0;
        assert!((skewness(&x) - expected).abs() < EPS);

        let symmetric = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert!(skewness(&symmetric).abs() < EPS);
    }

    #[test]
    fn test_skewness_omits_nan() {
        let with_nan = [1.0, f64::NAN, 2.0, 3.0, 10.0, 4.0];
        let without = [1.0, 2.0, 3.0, 10.0, 4.0];
        assert!((skewness(&with_nan) - skewness(&without)).abs() < EPS);
    }

    #[test]
    fn test_moments_omit_infinite_samples() {
        let with_inf = [1.0, f64::INFINITY, 2.0, 3.0, f64::NEG_INFINITY, 10.0, 4.0];
        let without = [1.0, 2.0, 3.0, 10.0, 4.0];
        assert!(skewness(&with_inf).is_finite());
        assert!((skewness(&with_inf) - skewness(&without)).abs() < EPS);
        assert!((kurtosis(&with_inf) - kurtosis(&without)).abs() < EPS);
    }

    #[test]
    fn test_kurtosis_of_uniform_grid() {
        // 1..=5: biased g2 = 1.7 - 3, corrected = -1.2
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert!((kurtosis(&x) + 1.2).abs() < EPS);
    }

    #[test]
    fn test_constant_moments_are_nan() {
        let x = [2.0; 8];
        assert!(skewness(&x).is_nan());
        assert!(kurtosis(&x).is_nan());
        assert_eq!(variance(&x), 0.0);
        assert_eq!(peak_to_peak(&x), 0.0);
    }

    #[test]
    fn test_zero_crossings() {
        assert_eq!(zero_crossings(&[1.0, -1.0, 1.0, 2.0]), 2.0);
        // 1 -> 0 -> -1 changes sign twice
        assert_eq!(zero_crossings(&[1.0, 0.0, -1.0]), 2.0);
        assert_eq!(zero_crossings(&[3.0, 1.0, 2.0]), 0.0);
        assert_eq!(zero_crossings(&[1.0, f64::NAN, 1.0]), 2.0);
    }

    #[test]
    fn test_absolute_area() {
        let x = [1.0, -1.0, 1.0];
        assert!((absolute_area(&x, 1e-6) - 2e-6).abs() < 1e-18);
        assert_eq!(absolute_area(&[5.0], 1e-6), 0.0);
    }

    #[test]
    fn test_peak_to_peak_propagates_nan() {
        assert_eq!(peak_to_peak(&[-2.0, 1.0, 3.0]), 5.0);
        assert!(peak_to_peak(&[1.0, f64::NAN]).is_nan());
    }

    #[test]
    fn test_average_ranks_with_ties() {
        assert_eq!(average_ranks(&[10.0, 20.0, 20.0, 5.0]), vec![2.0, 3.5, 3.5, 1.0]);
    }

    #[test]
    fn test_spearman_monotonic() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [1.0, 8.0, 27.0, 64.0];
        let z = [4.0, 3.0, 2.0, 1.0];
        assert!((spearman(&x, &y) - 1.0).abs() < EPS);
        assert!((spearman(&x, &z) + 1.0).abs() < EPS);
    }

    #[test]
    fn test_spearman_matrix_symmetric_with_nan_for_constant() {
        let frame = array![[1.0, 2.0, 3.0, 4.0], [2.0, 1.0, 4.0, 3.0], [7.0, 7.0, 7.0, 7.0]];
        let corr = spearman_matrix(frame.view());

        assert_eq!(corr.shape(), &[3, 3]);
        assert!((corr[[0, 0]] - 1.0).abs() < EPS);
        assert!((corr[[0, 1]] - 0.6).abs() < EPS);
        assert_eq!(corr[[0, 1]], corr[[1, 0]]);
        assert!(corr[[2, 2]].is_nan());
        assert!(corr[[0, 2]].is_nan());
    }
}
