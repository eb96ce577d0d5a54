//! Ridge regression solved by the normal equations.
//!
//! Columns and targets are mean-centered before solving, so the penalty
//! never touches the intercept. The centered Gram matrix plus `lambda` on
//! the diagonal is symmetric positive definite for any `lambda > 0`, which
//! makes an unpivoted Cholesky factorization safe.

use super::estimator::{Estimator, EstimatorError};

const DEFAULT_LAMBDA: f64 = 1.0;

#[derive(Debug, Clone)]
pub struct RidgeRegressor {
    lambda: f64,
    fitted: Option<FittedModel>,
}

#[derive(Debug, Clone)]
struct FittedModel {
    coefficients: Vec<f64>,
    intercept: f64,
}

impl RidgeRegressor {
    pub fn new() -> Self {
        Self::with_lambda(DEFAULT_LAMBDA)
    }

    pub fn with_lambda(lambda: f64) -> Self {
        Self {
            lambda,
            fitted: None,
        }
    }

    pub fn coefficients(&self) -> Option<&[f64]> {
        self.fitted.as_ref().map(|f| f.coefficients.as_slice())
    }
}

impl Default for RidgeRegressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Estimator for RidgeRegressor {
    fn fit(&mut self, features: &[Vec<f64>], targets: &[f64]) -> Result<(), EstimatorError> {
        if features.is_empty() || features.len() != targets.len() {
            return Err(EstimatorError::EmptyTrainingSet);
        }
        let k = features[0].len();
        for row in features {
            if row.len() != k {
                return Err(EstimatorError::DimensionMismatch {
                    expected: k,
                    got: row.len(),
                });
            }
        }

        let n = features.len() as f64;
        let mut feature_means = vec![0.0; k];
        for row in features {
            for (m, v) in feature_means.iter_mut().zip(row) {
                *m += v;
            }
        }
        for m in &mut feature_means {
            *m /= n;
        }
        let target_mean = targets.iter().sum::<f64>() / n;

        // Centered Gram matrix X'X + lambda*I and moment vector X'y.
        let mut gram = vec![0.0; k * k];
        let mut moment = vec![0.0; k];
        for (row, &y) in features.iter().zip(targets) {
            let centered: Vec<f64> = row
                .iter()
                .zip(&feature_means)
                .map(|(v, m)| v - m)
                .collect();
            let y = y - target_mean;
            for i in 0..k {
                moment[i] += centered[i] * y;
                for j in 0..=i {
                    gram[i * k + j] += centered[i] * centered[j];
                }
            }
        }
        for i in 0..k {
            gram[i * k + i] += self.lambda;
            for j in 0..i {
                gram[j * k + i] = gram[i * k + j];
            }
        }

        let coefficients = cholesky_solve(gram, moment, k)?;
        let intercept = target_mean
            - coefficients
                .iter()
                .zip(&feature_means)
                .map(|(c, m)| c * m)
                .sum::<f64>();

        self.fitted = Some(FittedModel {
            coefficients,
            intercept,
        });
        Ok(())
    }

    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>, EstimatorError> {
        let fitted = self.fitted.as_ref().ok_or(EstimatorError::NotFitted)?;
        let k = fitted.coefficients.len();

        let mut predictions = Vec::with_capacity(features.len());
        for row in features {
            if row.len() != k {
                return Err(EstimatorError::DimensionMismatch {
                    expected: k,
                    got: row.len(),
                });
            }
            let dot: f64 = fitted
                .coefficients
                .iter()
                .zip(row)
                .map(|(c, v)| c * v)
                .sum();
            predictions.push(fitted.intercept + dot);
        }
        Ok(predictions)
    }
}

/// Solve `A x = b` for symmetric positive definite `A` (row-major, k x k)
/// via an in-place Cholesky factorization with forward/back substitution.
fn cholesky_solve(mut a: Vec<f64>, mut b: Vec<f64>, k: usize) -> Result<Vec<f64>, EstimatorError> {
    for j in 0..k {
        let mut diag = a[j * k + j];
        for p in 0..j {
            diag -= a[j * k + p] * a[j * k + p];
        }
        if !diag.is_finite() || diag <= 0.0 {
            return Err(EstimatorError::Singular);
        }
        let diag = diag.sqrt();
        a[j * k + j] = diag;
        for i in (j + 1)..k {
            let mut v = a[i * k + j];
            for p in 0..j {
                v -= a[i * k + p] * a[j * k + p];
            }
            a[i * k + j] = v / diag;
        }
    }

    // L y = b
    for i in 0..k {
        for p in 0..i {
            b[i] -= a[i * k + p] * b[p];
        }
        b[i] /= a[i * k + i];
    }
    // L' x = y
    for i in (0..k).rev() {
        for p in (i + 1)..k {
            b[i] -= a[p * k + i] * b[p];
        }
        b[i] /= a[i * k + i];
    }
    Ok(b)
}
