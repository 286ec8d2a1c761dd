//! Kernel support vector classifier

use serde::{Deserialize, Serialize};

use super::{check_dimension, Predictor};
use crate::error::ModelError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Kernel {
    Linear,
    Rbf {
        gamma: f64,
    },
    Poly {
        gamma: f64,
        coef0: f64,
        degree: u32,
    },
    Sigmoid {
        gamma: f64,
        coef0: f64,
    },
}

impl Kernel {
    fn apply(&self, a: &[f64], b: &[f64]) -> f64 {
        match *self {
            Kernel::Linear => dot(a, b),
            Kernel::Rbf { gamma } => {
                let dist: f64 = a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum();
                (-gamma * dist).exp()
            }
            Kernel::Poly {
                gamma,
                coef0,
                degree,
            } => (gamma * dot(a, b) + coef0).powi(degree as i32),
            Kernel::Sigmoid { gamma, coef0 } => (gamma * dot(a, b) + coef0).tanh(),
        }
    }

    fn params_finite(&self) -> bool {
        match *self {
            Kernel::Linear => true,
            Kernel::Rbf { gamma } => gamma.is_finite() && gamma > 0.0,
            Kernel::Poly { gamma, coef0, .. } | Kernel::Sigmoid { gamma, coef0 } => {
                gamma.is_finite() && coef0.is_finite()
            }
        }
    }
}

/// Binary SVC exported from its support vectors.
///
/// `decision(x) = sum_i dual_coef[i] * K(sv_i, x) + intercept`, with class 1
/// when the decision is positive. When both Platt parameters are present the
/// positive-class probability is `1 / (1 + exp(prob_a * decision + prob_b))`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportVectorClassifier {
    pub support_vectors: Vec<Vec<f64>>,
    pub dual_coef: Vec<f64>,
    pub intercept: f64,
    pub kernel: Kernel,
    #[serde(default)]
    pub prob_a: Option<f64>,
    #[serde(default)]
    pub prob_b: Option<f64>,
}

impl SupportVectorClassifier {
    pub fn decision(&self, x: &[f64]) -> Result<f64, ModelError> {
        check_dimension(self.dim(), x)?;
        let sum: f64 = self
            .support_vectors
            .iter()
            .zip(&self.dual_coef)
            .map(|(sv, alpha)| alpha * self.kernel.apply(sv, x))
            .sum();
        let decision = sum + self.intercept;
        if !decision.is_finite() {
            return Err(ModelError::NonFinite {
                stage: "svc decision",
            });
        }
        Ok(decision)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.support_vectors.is_empty() {
            return Err("svc has no support vectors".to_string());
        }
        if self.support_vectors.len() != self.dual_coef.len() {
            return Err(format!(
                "svc has {} support vectors but {} dual coefficients",
                self.support_vectors.len(),
                self.dual_coef.len()
            ));
        }
        let dim = self.dim();
        if dim == 0 || self.support_vectors.iter().any(|sv| sv.len() != dim) {
            return Err("svc support vectors have inconsistent dimensions".to_string());
        }
        let finite = self
            .support_vectors
            .iter()
            .flatten()
            .chain(&self.dual_coef)
            .chain(std::iter::once(&self.intercept))
            .chain(self.prob_a.iter())
            .chain(self.prob_b.iter())
            .all(|v| v.is_finite());
        if !finite || !self.kernel.params_finite() {
            return Err("svc parameters contain non-finite values".to_string());
        }
        if self.prob_a.is_some() != self.prob_b.is_some() {
            return Err("svc has only one of prob_a and prob_b".to_string());
        }
        Ok(())
    }

    fn dim(&self) -> usize {
        self.support_vectors.first().map_or(0, Vec::len)
    }
}

impl Predictor for SupportVectorClassifier {
    fn predict_class(&self, x: &[f64]) -> Result<i64, ModelError> {
        Ok(if self.decision(x)? > 0.0 { 1 } else { 0 })
    }

    fn predict_proba(&self, x: &[f64]) -> Result<[f64; 2], ModelError> {
        let (Some(a), Some(b)) = (self.prob_a, self.prob_b) else {
            return Err(ModelError::ProbabilityUnsupported);
        };
        let p1 = 1.0 / (1.0 + (a * self.decision(x)? + b).exp());
        Ok([1.0 - p1, p1])
    }

    fn supports_proba(&self) -> bool {
        self.prob_a.is_some() && self.prob_b.is_some()
    }

    fn n_features(&self) -> Option<usize> {
        Some(self.dim())
    }

    fn kind(&self) -> &'static str {
        "svc"
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
