//! Pre-fitted feature scalers
//!
//! Scalers are fitted once at training time and exported with their learned
//! parameters. They are applied unchanged at inference time and never refit.

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Fitted numeric transform applied to an encoded vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scaler {
    /// `(x - mean) / scale`, matching sklearn's `StandardScaler`
    Standard {
        mean: Vec<f64>,
        scale: Vec<f64>,
        #[serde(default = "default_true")]
        with_mean: bool,
        #[serde(default = "default_true")]
        with_std: bool,
    },
    /// `x * scale + min`, matching sklearn's `MinMaxScaler` `scale_` and `min_`
    MinMax { min: Vec<f64>, scale: Vec<f64> },
    /// `(x - center) / scale`, matching sklearn's `RobustScaler`
    Robust { center: Vec<f64>, scale: Vec<f64> },
}

fn default_true() -> bool {
    true
}

impl Scaler {
    pub fn standard(mean: Vec<f64>, scale: Vec<f64>) -> Self {
        Self::Standard {
            mean,
            scale,
            with_mean: true,
            with_std: true,
        }
    }

    /// Number of features the scaler was fitted on
    pub fn n_features(&self) -> usize {
        match self {
            Self::Standard { mean, .. } => mean.len(),
            Self::MinMax { min, .. } => min.len(),
            Self::Robust { center, .. } => center.len(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Standard { .. } => "standard",
            Self::MinMax { .. } => "min_max",
            Self::Robust { .. } => "robust",
        }
    }

    /// Check internal consistency of the fitted parameters
    pub fn validate(&self) -> Result<(), String> {
        let (a, b) = match self {
            Self::Standard { mean, scale, .. } => (mean, scale),
            Self::MinMax { min, scale } => (min, scale),
            Self::Robust { center, scale } => (center, scale),
        };
        if a.is_empty() {
            return Err("scaler has no fitted features".to_string());
        }
        if a.len() != b.len() {
            return Err(format!(
                "scaler parameter lengths differ ({} vs {})",
                a.len(),
                b.len()
            ));
        }
        if a.iter().chain(b.iter()).any(|v| !v.is_finite()) {
            return Err("scaler parameters contain non-finite values".to_string());
        }
        Ok(())
    }

    /// Apply the fitted transform to a single sample
    pub fn transform(&self, x: &[f64]) -> Result<Vec<f64>, ModelError> {
        let expected = self.n_features();
        if x.len() != expected {
            return Err(ModelError::DimensionMismatch {
                expected,
                actual: x.len(),
            });
        }

        let out: Vec<f64> = match self {
            Self::Standard {
                mean,
                scale,
                with_mean,
                with_std,
            } => x
                .iter()
                .zip(mean.iter().zip(scale))
                .map(|(v, (m, s))| {
                    let centered = if *with_mean { v - m } else { *v };
                    if *with_std {
                        centered / non_zero(*s)
                    } else {
                        centered
                    }
                })
                .collect(),
            Self::MinMax { min, scale } => x
                .iter()
                .zip(min.iter().zip(scale))
                .map(|(v, (m, s))| v * s + m)
                .collect(),
            Self::Robust { center, scale } => x
                .iter()
                .zip(center.iter().zip(scale))
                .map(|(v, (c, s))| (v - c) / non_zero(*s))
                .collect(),
        };

        if out.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::NonFinite { stage: "scaler" });
        }
        Ok(out)
    }
}

/// Constant features are fitted with a zero scale; sklearn divides by 1 instead
fn non_zero(scale: f64) -> f64 {
    if scale == 0.0 {
        1.0
    } else {
        scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_transform() {
        let scaler = Scaler::standard(vec![1.0, 10.0], vec![2.0, 5.0]);
        let out = scaler.transform(&[3.0, 0.0]).unwrap();
        assert_eq!(out, vec![1.0, -2.0]);
    }

    #[test]
    fn test_zero_scale_treated_as_one() {
        let scaler = Scaler::standard(vec![4.0], vec![0.0]);
        assert_eq!(scaler.transform(&[6.0]).unwrap(), vec![2.0]);
    }

    #[test]
    fn test_standard_without_mean() {
        let scaler = Scaler::Standard {
            mean: vec![100.0],
            scale: vec![2.0],
            with_mean: false,
            with_std: true,
        };
        assert_eq!(scaler.transform(&[4.0]).unwrap(), vec![2.0]);
    }

    #[test]
    fn test_min_max_transform() {
        let scaler = Scaler::MinMax {
            min: vec![-0.5],
            scale: vec![0.25],
        };
        assert_eq!(scaler.transform(&[4.0]).unwrap(), vec![0.5]);
    }

    #[test]
    fn test_robust_transform() {
        let scaler = Scaler::Robust {
            center: vec![10.0],
            scale: vec![4.0],
        };
        assert_eq!(scaler.transform(&[18.0]).unwrap(), vec![2.0]);
    }

    #[test]
    fn test_dimension_mismatch() {
        let scaler = Scaler::standard(vec![0.0; 8], vec![1.0; 8]);
        let err = scaler.transform(&[1.0; 7]).unwrap_err();
        assert_eq!(
            err,
            ModelError::DimensionMismatch {
                expected: 8,
                actual: 7
            }
        );
    }

    #[test]
    fn test_non_finite_output_rejected() {
        let scaler = Scaler::standard(vec![0.0], vec![1e-320]);
        assert!(matches!(
            scaler.transform(&[1e10]),
            Err(ModelError::NonFinite { .. })
        ));
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let json = r#"{"kind":"standard","mean":[1.0,2.0],"scale":[1.0,1.0]}"#;
        let scaler: Scaler = serde_json::from_str(json).unwrap();
        assert_eq!(scaler, Scaler::standard(vec![1.0, 2.0], vec![1.0, 1.0]));
        assert_eq!(scaler.n_features(), 2);
    }

    #[test]
    fn test_validate_rejects_mismatched_lengths() {
        let scaler = Scaler::standard(vec![1.0, 2.0], vec![1.0]);
        assert!(scaler.validate().is_err());
        assert!(Scaler::standard(vec![], vec![]).validate().is_err());
        assert!(Scaler::standard(vec![0.0], vec![1.0]).validate().is_ok());
    }
}
