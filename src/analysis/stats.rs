//! Descriptive statistics and the small amount of distribution math the
//! correlation and significance tests need.
//!
//! Conventions follow the usual dataframe defaults: sample standard deviation
//! (n - 1), linearly interpolated quantiles, bias-corrected skewness and
//! excess kurtosis. Empty or undersized inputs give NaN rather than an error.

use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, Result};

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation. NaN below two values.
pub fn sample_std(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (ss / (n - 1) as f64).sqrt()
}

/// Quantile of already sorted values with linear interpolation between ranks.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

pub fn quantile(values: &[f64], q: f64) -> f64 {
    quantile_sorted(&sorted_copy(values), q)
}

pub fn median(values: &[f64]) -> f64 {
    quantile(values, 0.5)
}

fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut v: Vec<f64> = values.iter().copied().filter(|x| !x.is_nan()).collect();
    v.sort_by(|a, b| a.total_cmp(b));
    v
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptiveStats {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub q25: f64,
    pub q75: f64,
    pub skewness: f64,
    pub kurtosis: f64,
}

impl DescriptiveStats {
    pub fn of(values: &[f64]) -> Self {
        let sorted = sorted_copy(values);
        let n = sorted.len();
        Self {
            count: n,
            mean: mean(&sorted),
            median: quantile_sorted(&sorted, 0.5),
            std: sample_std(&sorted),
            min: sorted.first().copied().unwrap_or(f64::NAN),
            max: sorted.last().copied().unwrap_or(f64::NAN),
            q25: quantile_sorted(&sorted, 0.25),
            q75: quantile_sorted(&sorted, 0.75),
            skewness: skewness(&sorted),
            kurtosis: excess_kurtosis(&sorted),
        }
    }
}

fn central_sums(values: &[f64]) -> (f64, f64, f64) {
    let m = mean(values);
    values.iter().fold((0.0, 0.0, 0.0), |(s2, s3, s4), v| {
        let d = v - m;
        let d2 = d * d;
        (s2 + d2, s3 + d2 * d, s4 + d2 * d2)
    })
}

/// Adjusted Fisher-Pearson skewness (G1).
pub fn skewness(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    if values.len() < 3 {
        return f64::NAN;
    }
    let (s2, s3, _) = central_sums(values);
    if s2 == 0.0 {
        return 0.0;
    }
    let m2 = s2 / n;
    let m3 = s3 / n;
    (n * (n - 1.0)).sqrt() / (n - 2.0) * m3 / m2.powf(1.5)
}

/// Bias-corrected excess kurtosis (G2).
pub fn excess_kurtosis(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    if values.len() < 4 {
        return f64::NAN;
    }
    let (s2, _, s4) = central_sums(values);
    if s2 == 0.0 {
        return 0.0;
    }
    let numer = n * (n + 1.0) * (n - 1.0) * s4;
    let denom = (n - 2.0) * (n - 3.0) * s2 * s2;
    let adj = 3.0 * (n - 1.0).powi(2) / ((n - 2.0) * (n - 3.0));
    numer / denom - adj
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub volatility: f64,
    pub var_95: f64,
    pub cvar_95: f64,
    pub max_loss: f64,
    pub positive_ratio: f64,
    pub avg_positive: f64,
    pub avg_negative: f64,
}

impl RiskMetrics {
    pub fn of(returns: &[f64]) -> Option<Self> {
        let sorted = sorted_copy(returns);
        if sorted.is_empty() {
            return None;
        }
        let n = sorted.len() as f64;
        let var_95 = quantile_sorted(&sorted, 0.05);
        let tail: Vec<f64> = sorted.iter().copied().filter(|r| *r <= var_95).collect();
        let positives: Vec<f64> = sorted.iter().copied().filter(|r| *r > 0.0).collect();
        let negatives: Vec<f64> = sorted.iter().copied().filter(|r| *r < 0.0).collect();

        Some(Self {
            volatility: sample_std(&sorted),
            var_95,
            cvar_95: mean(&tail),
            max_loss: sorted[0],
            positive_ratio: positives.len() as f64 / n,
            avg_positive: if positives.is_empty() { 0.0 } else { mean(&positives) },
            avg_negative: if negatives.is_empty() { 0.0 } else { mean(&negatives) },
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OutlierMethod {
    /// Outside `[q25 - k * IQR, q75 + k * IQR]`.
    Iqr(f64),
    /// `|z| > threshold`.
    ZScore(f64),
}

/// One flag per input value.
pub fn detect_outliers(values: &[f64], method: OutlierMethod) -> Vec<bool> {
    match method {
        OutlierMethod::Iqr(k) => {
            let sorted = sorted_copy(values);
            let q1 = quantile_sorted(&sorted, 0.25);
            let q3 = quantile_sorted(&sorted, 0.75);
            let iqr = q3 - q1;
            let (lo, hi) = (q1 - k * iqr, q3 + k * iqr);
            values.iter().map(|v| *v < lo || *v > hi).collect()
        }
        OutlierMethod::ZScore(threshold) => {
            let m = mean(values);
            let sd = sample_std(values);
            values
                .iter()
                .map(|v| sd > 0.0 && ((v - m) / sd).abs() > threshold)
                .collect()
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TTest {
    pub t_statistic: f64,
    pub p_value: f64,
    pub degrees_of_freedom: f64,
}

impl TTest {
    pub fn is_significant(&self, alpha: f64) -> bool {
        self.p_value < alpha
    }
}

/// Two-sample Student t-test with pooled variance, two-tailed.
pub fn two_sample_t_test(a: &[f64], b: &[f64]) -> Result<TTest> {
    let got = a.len().min(b.len());
    if got < 2 {
        return Err(AnalyticsError::InsufficientData { needed: 2, got });
    }
    let (n1, n2) = (a.len() as f64, b.len() as f64);
    let (v1, v2) = (sample_std(a).powi(2), sample_std(b).powi(2));
    let df = n1 + n2 - 2.0;
    let pooled = ((n1 - 1.0) * v1 + (n2 - 1.0) * v2) / df;
    let se = (pooled * (1.0 / n1 + 1.0 / n2)).sqrt();

    let t = if se > 0.0 {
        (mean(a) - mean(b)) / se
    } else {
        f64::NAN
    };

    Ok(TTest {
        t_statistic: t,
        p_value: student_t_two_tailed(t, df),
        degrees_of_freedom: df,
    })
}

/// P(|T| >= |t|) for Student's t with `df` degrees of freedom.
pub fn student_t_two_tailed(t: f64, df: f64) -> f64 {
    if t.is_nan() || df <= 0.0 {
        return f64::NAN;
    }
    if t.is_infinite() {
        return 0.0;
    }
    let x = df / (df + t * t);
    incomplete_beta(df / 2.0, 0.5, x).clamp(0.0, 1.0)
}

fn ln_gamma(x: f64) -> f64 {
    const COF: [f64; 6] = [
        76.180_091_729_471_46,
        -86.505_320_329_416_77,
        24.014_098_240_830_91,
        -1.231_739_572_450_155,
        0.120_865_097_386_617_9e-2,
        -0.539_523_938_495_3e-5,
    ];
    let mut y = x;
    let tmp = x + 5.5;
    let tmp = tmp - (x + 0.5) * tmp.ln();
    let mut ser = 1.000_000_000_190_015;
    for c in COF {
        y += 1.0;
        ser += c / y;
    }
    -tmp + (2.506_628_274_631_000_5 * ser / x).ln()
}

/// Regularized incomplete beta I_x(a, b).
pub fn incomplete_beta(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    let front = (ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln()).exp();
    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_continued_fraction(a, b, x) / a
    } else {
        1.0 - front * beta_continued_fraction(b, a, 1.0 - x) / b
    }
}

fn beta_continued_fraction(a: f64, b: f64, x: f64) -> f64 {
    const MAX_ITER: usize = 300;
    const EPS: f64 = 3e-14;
    const TINY: f64 = 1e-300;

    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;
    let mut c = 1.0;
    let mut d = 1.0 - qab * x / qap;
    if d.abs() < TINY {
        d = TINY;
    }
    d = 1.0 / d;
    let mut h = d;

    for m in 1..=MAX_ITER {
        let m = m as f64;
        let m2 = 2.0 * m;

        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 + aa * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + aa / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        h *= d * c;

        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 + aa * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + aa / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        let del = d * c;
        h *= del;
        if (del - 1.0).abs() < EPS {
            break;
        }
    }
    h
}
