//! Numerical helpers shared by the cross-section, fission and tally code.

use serde::{Deserialize, Serialize};

/// How tabulated values are interpolated between grid points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Interpolation {
    #[default]
    LinLin,
    LogLog,
}

impl Interpolation {
    pub fn from_str_option(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "lin-lin" | "linear" | "linlin" => Some(Interpolation::LinLin),
            "log-log" | "loglog" | "logarithmic" => Some(Interpolation::LogLog),
            _ => None,
        }
    }

    pub fn interpolate(&self, x: &[f64], y: &[f64], x_new: f64) -> f64 {
        match self {
            Interpolation::LinLin => interpolate_linear(x, y, x_new),
            Interpolation::LogLog => interpolate_log_log(x, y, x_new),
        }
    }

    /// Interpolate between two bracketing points already located by the caller.
    #[inline]
    pub fn between(&self, x1: f64, x2: f64, y1: f64, y2: f64, x_new: f64) -> f64 {
        if x2 == x1 {
            return y1;
        }
        match self {
            Interpolation::LogLog if x1 > 0.0 && y1 > 0.0 && y2 > 0.0 && x_new > 0.0 => {
                let slope = (y2 / y1).ln() / (x2 / x1).ln();
                y1 * (x_new / x1).powf(slope)
            }
            // zero or negative values have no logarithm; fall back to linear
            _ => y1 + (x_new - x1) * (y2 - y1) / (x2 - x1),
        }
    }
}

/// Largest index `i` with `x[i] <= x_new`, restricted to `0..x.len() - 1` so that
/// `i + 1` is always a valid upper neighbour. `x` must hold at least two points.
#[inline]
pub fn lower_index(x: &[f64], x_new: f64) -> usize {
    let mut low = 0usize;
    let mut high = x.len() - 1;
    while high - low > 1 {
        let mid = (low + high) >> 1;
        if x[mid] <= x_new {
            low = mid;
        } else {
            high = mid;
        }
    }
    low
}

/// Index of the first element of an ascending slice that is >= `value`,
/// clamped to the last index.
pub fn find_upper_index(x: &[f64], value: f64) -> usize {
    let idx = x.partition_point(|&v| v < value);
    idx.min(x.len().saturating_sub(1))
}

/// Linear interpolation; values outside the table take the end values.
pub fn interpolate_linear(x: &[f64], y: &[f64], x_new: f64) -> f64 {
    if x.is_empty() {
        return f64::NAN;
    }
    if x.len() == 1 || x_new <= x[0] {
        return y[0];
    }
    if x_new >= x[x.len() - 1] {
        return y[y.len() - 1];
    }
    let idx = lower_index(x, x_new);
    Interpolation::LinLin.between(x[idx], x[idx + 1], y[idx], y[idx + 1], x_new)
}

/// Log-log interpolation; values outside the table take the end values.
/// Intervals touching a non-positive value are interpolated linearly.
pub fn interpolate_log_log(x: &[f64], y: &[f64], x_new: f64) -> f64 {
    if x.is_empty() {
        return f64::NAN;
    }
    if x.len() == 1 || x_new <= x[0] {
        return y[0];
    }
    if x_new >= x[x.len() - 1] {
        return y[y.len() - 1];
    }
    let idx = lower_index(x, x_new);
    Interpolation::LogLog.between(x[idx], x[idx + 1], y[idx], y[idx + 1], x_new)
}

/// `num` evenly spaced points from `start` to `end` inclusive.
pub fn linspace(start: f64, end: f64, num: usize) -> Vec<f64> {
    match num {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let delta = (end - start) / (num - 1) as f64;
            let mut values: Vec<f64> = (0..num).map(|i| start + delta * i as f64).collect();
            values[num - 1] = end;
            values
        }
    }
}

/// `num` points from `start` to `end` inclusive, evenly spaced in log10.
pub fn logspace(start: f64, end: f64, num: usize) -> Vec<f64> {
    let mut values: Vec<f64> = linspace(start.log10(), end.log10(), num)
        .into_iter()
        .map(|v| 10f64.powf(v))
        .collect();
    if let Some(first) = values.first_mut() {
        *first = start;
    }
    if let Some(last) = values.last_mut() {
        *last = end;
    }
    values
}

/// Running trapezoid-rule integral of `y(x)`, starting from zero.
pub fn cumulative_trapezoid(x: &[f64], y: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(x.len());
    let mut acc = 0.0;
    for i in 0..x.len() {
        if i > 0 {
            acc += 0.5 * (y[i] + y[i - 1]) * (x[i] - x[i - 1]);
        }
        out.push(acc);
    }
    out
}

/// Error function, Abramowitz and Stegun 7.1.26 (|error| < 1.5e-7).
pub fn erf(x: f64) -> f64 {
    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + p * x);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-x * x).exp();

    sign * y
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_interpolate_linear() {
        let x = [1.0, 2.0, 4.0];
        let y = [10.0, 20.0, 0.0];
        assert_eq!(interpolate_linear(&x, &y, 0.5), 10.0);
        assert_eq!(interpolate_linear(&x, &y, 5.0), 0.0);
        assert_relative_eq!(interpolate_linear(&x, &y, 1.5), 15.0);
        assert_relative_eq!(interpolate_linear(&x, &y, 3.0), 10.0);
        assert_eq!(interpolate_linear(&x, &y, 2.0), 20.0);
    }

    #[test]
    fn test_interpolate_log_log_power_law() {
        // y = x^-0.5 is a straight line on log-log axes
        let x = [1.0, 100.0];
        let y = [1.0, 0.1];
        assert_relative_eq!(interpolate_log_log(&x, &y, 10.0), 10f64.powf(-0.5), epsilon = 1e-12);
    }

    #[test]
    fn test_interpolate_log_log_zero_falls_back() {
        let x = [1.0, 3.0];
        let y = [0.0, 2.0];
        assert_relative_eq!(interpolate_log_log(&x, &y, 2.0), 1.0);
    }

    #[test]
    fn test_interpolation_policy_parse() {
        assert_eq!(Interpolation::from_str_option("LOG-LOG"), Some(Interpolation::LogLog));
        assert_eq!(Interpolation::from_str_option("linear"), Some(Interpolation::LinLin));
        assert_eq!(Interpolation::from_str_option("cubic"), None);
    }

    #[test]
    fn test_spaces() {
        let lin = linspace(0.0, 1.0, 5);
        assert_eq!(lin, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        let log = logspace(1.0, 1000.0, 4);
        assert_relative_eq!(log[1], 10.0, epsilon = 1e-9);
        assert_relative_eq!(log[2], 100.0, epsilon = 1e-9);
        assert_eq!(log[3], 1000.0);
    }

    #[test]
    fn test_cumulative_trapezoid() {
        let x = linspace(0.0, 1.0, 101);
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v).collect();
        let cdf = cumulative_trapezoid(&x, &y);
        assert_eq!(cdf[0], 0.0);
        assert_relative_eq!(cdf[100], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_find_upper_index() {
        let x = [0.0, 0.5, 1.0];
        assert_eq!(find_upper_index(&x, 0.0), 0);
        assert_eq!(find_upper_index(&x, 0.2), 1);
        assert_eq!(find_upper_index(&x, 0.5), 1);
        assert_eq!(find_upper_index(&x, 2.0), 2);
    }

    #[test]
    fn test_erf() {
        assert!(erf(0.0).abs() < 1e-7);
        assert_relative_eq!(erf(1.0), 0.8427007929, epsilon = 1e-6);
        assert_relative_eq!(erf(-1.0), -0.8427007929, epsilon = 1e-6);
        assert_relative_eq!(erf(4.0), 1.0, epsilon = 1e-6);
    }
}
