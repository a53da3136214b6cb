//! Ordinary least squares.
//!
//! Fits `y = intercept + sum(coefficients[j] * x[j])` by solving the normal
//! equations with Gaussian elimination. A fit is only attempted when there are
//! strictly more samples than the configured minimum, and a singular design
//! (for example a constant feature) is reported as insufficient data rather
//! than fitted.

use franchise_core::CanonicalRecord;
use serde::Serialize;
use std::collections::HashMap;

const PIVOT_EPSILON: f64 = 1e-10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinearModel {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    pub r_squared: f64,
    pub samples: usize,
}

impl LinearModel {
    pub fn predict(&self, features: &[f64]) -> f64 {
        self.intercept + self.coefficients.iter().zip(features).map(|(c, x)| c * x).sum::<f64>()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RegressionOutcome {
    InsufficientData { samples: usize, required: usize },
    Fitted(LinearModel),
}

impl RegressionOutcome {
    pub fn model(&self) -> Option<&LinearModel> {
        match self {
            RegressionOutcome::Fitted(model) => Some(model),
            RegressionOutcome::InsufficientData { .. } => None,
        }
    }
}

/// Fit `targets` against `features` (one row per sample).
///
/// Needs more than `min_samples` rows, all of the same width.
pub fn fit_ols(features: &[Vec<f64>], targets: &[f64], min_samples: usize) -> RegressionOutcome {
    let samples = features.len().min(targets.len());
    let insufficient = RegressionOutcome::InsufficientData { samples, required: min_samples + 1 };

    if samples <= min_samples || features.len() != targets.len() {
        return insufficient;
    }
    let width = features[0].len();
    if features.iter().any(|row| row.len() != width) {
        return insufficient;
    }

    // Normal equations over the design [1, x_1 .. x_k]
    let dim = width + 1;
    let mut xtx = vec![vec![0.0; dim]; dim];
    let mut xty = vec![0.0; dim];
    for (row, &y) in features.iter().zip(targets) {
        let design: Vec<f64> = std::iter::once(1.0).chain(row.iter().copied()).collect();
        for i in 0..dim {
            xty[i] += design[i] * y;
            for j in 0..dim {
                xtx[i][j] += design[i] * design[j];
            }
        }
    }

    let Some(beta) = solve(xtx, xty) else {
        return insufficient;
    };

    let mut model = LinearModel { coefficients: beta[1..].to_vec(), intercept: beta[0], r_squared: 0.0, samples };
    model.r_squared = r_squared(&model, features, targets);
    RegressionOutcome::Fitted(model)
}

/// Solve `a * x = b` with partial pivoting; `None` when `a` is singular
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    let scale = a.iter().flatten().fold(0.0_f64, |m, v| m.max(v.abs())).max(1.0);

    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() <= PIVOT_EPSILON * scale {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in (col + 1)..n {
            let factor = a[row][col] / a[col][col];
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Some(x)
}

fn r_squared(model: &LinearModel, features: &[Vec<f64>], targets: &[f64]) -> f64 {
    let mean = targets.iter().sum::<f64>() / targets.len() as f64;
    let ss_tot: f64 = targets.iter().map(|y| (y - mean).powi(2)).sum();
    let ss_res: f64 = features.iter().zip(targets).map(|(x, y)| (y - model.predict(x)).powi(2)).sum();

    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

/// Rows of (hype, netflix hours) for the hype -> hours regression.
///
/// Records are grouped by (title, timestamp) taking the mean hype and the max
/// hours of each group; only groups where both are positive are kept.
pub fn regression_dataset(records: &[CanonicalRecord]) -> Vec<(f64, f64)> {
    let mut index: HashMap<(&str, i64), usize> = HashMap::new();
    let mut groups: Vec<(f64, usize, f64)> = Vec::new();

    for record in records {
        let i = *index.entry((record.title.as_str(), record.timestamp)).or_insert_with(|| {
            groups.push((0.0, 0, f64::MIN));
            groups.len() - 1
        });
        let group = &mut groups[i];
        group.0 += record.hype_score;
        group.1 += 1;
        group.2 = group.2.max(record.netflix_hours);
    }

    groups
        .into_iter()
        .map(|(hype_sum, n, hours)| (hype_sum / n as f64, hours))
        .filter(|(hype, hours)| *hype > 0.0 && *hours > 0.0)
        .collect()
}

/// Regress viewing hours on hype across the whole log
pub fn hype_vs_hours(records: &[CanonicalRecord], min_samples: usize) -> RegressionOutcome {
    let (features, targets): (Vec<Vec<f64>>, Vec<f64>) =
        regression_dataset(records).into_iter().map(|(x, y)| (vec![x], y)).unzip();
    fit_ols(&features, &targets, min_samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: &str, timestamp: i64, hype: f64, hours: f64) -> CanonicalRecord {
        CanonicalRecord {
            timestamp,
            title: title.to_string(),
            hype_score: hype,
            brand_equity: 0,
            imdb_rating: None,
            netflix_hours: hours,
            engagement_score: 0.0,
        }
    }

    #[test]
    fn test_gating_below_minimum() {
        let features: Vec<Vec<f64>> = (1..=30).map(|x| vec![x as f64]).collect();
        let targets: Vec<f64> = (1..=30).map(|x| 2.0 * x as f64).collect();

        let outcome = fit_ols(&features, &targets, 30);
        assert_eq!(outcome, RegressionOutcome::InsufficientData { samples: 30, required: 31 });
        assert!(outcome.model().is_none());
    }

    #[test]
    fn test_fits_minimum_plus_one_points() {
        let features: Vec<Vec<f64>> = (1..=31).map(|x| vec![x as f64]).collect();
        let targets: Vec<f64> = (1..=31).map(|x| 2.0 * x as f64).collect();

        let outcome = fit_ols(&features, &targets, 30);
        let model = outcome.model().unwrap();
        assert!((model.coefficients[0] - 2.0).abs() < 0.05);
        assert!(model.intercept.abs() < 1e-6);
        assert!(model.r_squared > 0.95);
        assert_eq!(model.samples, 31);
    }

    #[test]
    fn test_multi_feature_fit() {
        let mut features = Vec::new();
        let mut targets = Vec::new();
        for a in 0..5 {
            for b in 0..5 {
                features.push(vec![a as f64, (b * b) as f64]);
                targets.push(1.0 + 3.0 * a as f64 - 0.5 * (b * b) as f64);
            }
        }

        let outcome = fit_ols(&features, &targets, 5);
        let model = outcome.model().unwrap();
        assert!((model.intercept - 1.0).abs() < 1e-9);
        assert!((model.coefficients[0] - 3.0).abs() < 1e-9);
        assert!((model.coefficients[1] + 0.5).abs() < 1e-9);
        assert!((model.r_squared - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_constant_feature_is_insufficient() {
        let features: Vec<Vec<f64>> = (0..10).map(|_| vec![4.0]).collect();
        let targets: Vec<f64> = (0..10).map(|y| y as f64).collect();

        assert!(matches!(fit_ols(&features, &targets, 5), RegressionOutcome::InsufficientData { .. }));
    }

    #[test]
    fn test_regression_dataset_groups_and_filters() {
        let records = vec![
            record("A", 1, 10.0, 100.0),
            record("A", 1, 20.0, 300.0),
            record("B", 1, 0.0, 50.0),
            record("C", 1, 5.0, 0.0),
            record("A", 2, 8.0, 80.0),
        ];

        assert_eq!(regression_dataset(&records), vec![(15.0, 300.0), (8.0, 80.0)]);
    }

    #[test]
    fn test_hype_vs_hours_on_records() {
        let records: Vec<CanonicalRecord> =
            (1..=40).map(|i| record("A", i, i as f64, 10.0 * i as f64 + 5.0)).collect();

        let model = hype_vs_hours(&records, 30).model().cloned().unwrap();
        assert!((model.coefficients[0] - 10.0).abs() < 1e-6);
        assert!((model.intercept - 5.0).abs() < 1e-6);

        assert!(hype_vs_hours(&records[..30], 30).model().is_none());
    }
}
