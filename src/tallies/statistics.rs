use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    Variance,
    StdDev,
    RelativeError,
}

impl TriggerType {
    pub fn from_str_option(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "variance" => Some(TriggerType::Variance),
            "std_dev" | "stdev" | "std-dev" => Some(TriggerType::StdDev),
            "relative_error" | "rel_err" | "rel-err" => Some(TriggerType::RelativeError),
            _ => None,
        }
    }
}

/// Keep running batches until the worst bin of the chosen statistic drops below `precision`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub trigger_type: TriggerType,
    pub precision: f64,
}

impl Trigger {
    pub fn new(trigger_type: TriggerType, precision: f64) -> Self {
        Trigger {
            trigger_type,
            precision,
        }
    }

    /// True while any bin still exceeds the precision. Bins with a zero mean
    /// carry no relative error and never hold a relative-error trigger open.
    pub fn is_triggered(&self, stats: &Statistics) -> bool {
        let worst = match self.trigger_type {
            TriggerType::Variance => stats.variance.iter().copied().fold(0.0, f64::max),
            TriggerType::StdDev => stats.std_dev.iter().copied().fold(0.0, f64::max),
            TriggerType::RelativeError => stats
                .mu
                .iter()
                .zip(&stats.rel_err)
                .filter(|(mu, _)| **mu != 0.0)
                .map(|(_, r)| *r)
                .fold(0.0, f64::max),
        };
        worst >= self.precision
    }
}

/// Per-bin batch statistics: the mean of the batch totals and the variance of that mean.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub num_batches: usize,
    pub mu: Vec<f64>,
    pub variance: Vec<f64>,
    pub std_dev: Vec<f64>,
    pub rel_err: Vec<f64>,
}

impl Statistics {
    /// Build from means and variances, deriving the standard deviation and relative error.
    pub fn from_moments(num_batches: usize, mu: Vec<f64>, variance: Vec<f64>) -> Self {
        let std_dev: Vec<f64> = variance.iter().map(|v| v.max(0.0).sqrt()).collect();
        let rel_err = mu
            .iter()
            .zip(&std_dev)
            .map(|(m, s)| relative_error(*m, *s))
            .collect();
        Statistics {
            num_batches,
            mu,
            variance,
            std_dev,
            rel_err,
        }
    }

    pub fn num_bins(&self) -> usize {
        self.mu.len()
    }

    /// Multiply means by `c` and variances by `c^2`.
    pub fn scaled(&self, c: f64) -> Self {
        Statistics::from_moments(
            self.num_batches,
            self.mu.iter().map(|m| m * c).collect(),
            self.variance.iter().map(|v| v * c * c).collect(),
        )
    }
}

/// Zero when the mean is zero.
#[inline]
pub fn relative_error(mu: f64, std_dev: f64) -> f64 {
    if mu == 0.0 {
        0.0
    } else {
        std_dev / mu.abs()
    }
}

/// Welford accumulation of completed batch totals, O(bins) memory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchStatistics {
    num_batches: usize,
    mean: Vec<f64>,
    m2: Vec<f64>,
}

impl BatchStatistics {
    pub fn new(num_bins: usize) -> Self {
        BatchStatistics {
            num_batches: 0,
            mean: vec![0.0; num_bins],
            m2: vec![0.0; num_bins],
        }
    }

    pub fn num_batches(&self) -> usize {
        self.num_batches
    }

    /// Fold one completed batch of per-bin totals into the running moments.
    pub fn push(&mut self, batch: &[f64]) {
        self.num_batches += 1;
        let n = self.num_batches as f64;
        for ((mean, m2), &x) in self.mean.iter_mut().zip(self.m2.iter_mut()).zip(batch) {
            let delta = x - *mean;
            *mean += delta / n;
            *m2 += delta * (x - *mean);
        }
    }

    pub fn compute(&self) -> Statistics {
        let n = self.num_batches;
        let variance = self
            .m2
            .iter()
            .map(|m2| {
                if n == 0 {
                    0.0
                } else {
                    m2 / ((n - 1).max(1) as f64) / n as f64
                }
            })
            .collect();
        Statistics::from_moments(n, self.mean.clone(), variance)
    }

    pub fn reset(&mut self) {
        self.num_batches = 0;
        self.mean.iter_mut().for_each(|m| *m = 0.0);
        self.m2.iter_mut().for_each(|m| *m = 0.0);
    }
}
