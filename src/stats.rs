//! Quantiles, histograms and line fits over plain `f64` slices

use std::cmp::Ordering;

/// Sort a copy of the values ascending
pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut out = values.to_vec();
    out.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    out
}

/// Quantile with linear interpolation between closest ranks
///
/// `sorted_values` must already be sorted ascending.
pub fn quantile(sorted_values: &[f64], q: f64) -> Option<f64> {
    if sorted_values.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted_values.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted_values[lo] + (sorted_values[hi] - sorted_values[lo]) * frac)
}

/// Ordinary least squares fit `y = intercept + slope * x`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub intercept: f64,
    pub slope: f64,
}

impl LinearFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// Fit a line through the points; `None` when x has no spread
pub fn ols(points: &[(f64, f64)]) -> Option<LinearFit> {
    if points.len() < 2 {
        return None;
    }
    let n = points.len() as f64;
    let mx = points.iter().map(|p| p.0).sum::<f64>() / n;
    let my = points.iter().map(|p| p.1).sum::<f64>() / n;

    let sxx: f64 = points.iter().map(|p| (p.0 - mx).powi(2)).sum();
    if sxx == 0.0 {
        return None;
    }
    let sxy: f64 = points.iter().map(|p| (p.0 - mx) * (p.1 - my)).sum();
    let slope = sxy / sxx;

    Some(LinearFit {
        intercept: my - slope * mx,
        slope,
    })
}

/// One histogram bin over `[start, end)`; the last bin is closed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

/// Equal-width histogram spanning the data range
pub fn histogram(values: &[f64], bins: usize) -> Vec<Bin> {
    let bins = bins.max(1);
    let (min, max) = match min_max(values) {
        Some(mm) => mm,
        None => return Vec::new(),
    };

    // Degenerate range: a unit-wide window around the single value
    let (lo, hi) = if max > min { (min, max) } else { (min - 0.5, max + 0.5) };
    let width = (hi - lo) / bins as f64;

    let mut out: Vec<Bin> = (0..bins)
        .map(|i| Bin {
            start: lo + i as f64 * width,
            end: lo + (i + 1) as f64 * width,
            count: 0,
        })
        .collect();

    for v in values {
        let idx = (((v - lo) / width).floor() as usize).min(bins - 1);
        out[idx].count += 1;
    }
    out
}

pub fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    let mut iter = values.iter().copied();
    let first = iter.next()?;
    Some(iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
}

/// Five-number summary with 1.5 IQR whiskers, as drawn by a box plot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxSummary {
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub lower_whisker: f64,
    pub upper_whisker: f64,
}

pub fn box_summary(values: &[f64]) -> Option<BoxSummary> {
    let s = sorted(values);
    let q1 = quantile(&s, 0.25)?;
    let median = quantile(&s, 0.5)?;
    let q3 = quantile(&s, 0.75)?;
    let iqr = q3 - q1;
    let lo_fence = q1 - 1.5 * iqr;
    let hi_fence = q3 + 1.5 * iqr;

    let lower_whisker = s.iter().copied().find(|v| *v >= lo_fence).unwrap_or(q1);
    let upper_whisker = s.iter().rev().copied().find(|v| *v <= hi_fence).unwrap_or(q3);

    Some(BoxSummary { q1, median, q3, lower_whisker, upper_whisker })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_quantile_linear() {
        let s = [1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(quantile(&s, 0.25).unwrap(), 1.75);
        assert_relative_eq!(quantile(&s, 0.5).unwrap(), 2.5);
        assert_relative_eq!(quantile(&s, 1.0).unwrap(), 4.0);
        assert_eq!(quantile(&[], 0.5), None);
    }

    #[test]
    fn test_ols() {
        let fit = ols(&[(0.0, 1.0), (1.0, 3.0), (2.0, 5.0)]).unwrap();
        assert_relative_eq!(fit.slope, 2.0, epsilon = 1e-12);
        assert_relative_eq!(fit.intercept, 1.0, epsilon = 1e-12);
        assert_relative_eq!(fit.predict(10.0), 21.0, epsilon = 1e-12);
        assert_eq!(ols(&[(1.0, 1.0), (1.0, 2.0)]), None);
    }

    #[test]
    fn test_histogram_counts_every_value() {
        let values: Vec<f64> = (0..100).map(|i| i as f64).collect();
        let bins = histogram(&values, 30);
        assert_eq!(bins.len(), 30);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 100);
        // Maximum lands in the closed last bin
        assert!(bins[29].count > 0);
    }

    #[test]
    fn test_histogram_single_value() {
        let bins = histogram(&[3.0, 3.0], 5);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 2);
        assert!(histogram(&[], 5).is_empty());
    }

    #[test]
    fn test_box_summary_whiskers() {
        let b = box_summary(&[1.0, 2.0, 3.0, 4.0, 100.0]).unwrap();
        assert_relative_eq!(b.median, 3.0);
        assert_relative_eq!(b.q1, 2.0);
        assert_relative_eq!(b.q3, 4.0);
        assert_relative_eq!(b.lower_whisker, 1.0);
        // 100 is an outlier beyond q3 + 1.5 * iqr = 7
        assert_relative_eq!(b.upper_whisker, 4.0);
    }
}
