//! Closed set of JSON predictor shapes

use serde::{Deserialize, Serialize};

use super::{check_dimension, sigmoid, DecisionTree, Predictor, SupportVectorClassifier};
use crate::error::ModelError;

/// Weights and bias of a linear decision function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub coef: Vec<f64>,
    pub intercept: f64,
}

impl LinearModel {
    pub fn decision(&self, x: &[f64]) -> Result<f64, ModelError> {
        check_dimension(self.coef.len(), x)?;
        let z: f64 = self.coef.iter().zip(x).map(|(w, v)| w * v).sum::<f64>() + self.intercept;
        if !z.is_finite() {
            return Err(ModelError::NonFinite {
                stage: "linear decision",
            });
        }
        Ok(z)
    }

    fn validate(&self) -> Result<(), String> {
        if self.coef.is_empty() {
            return Err("linear model has no coefficients".to_string());
        }
        if self
            .coef
            .iter()
            .chain(std::iter::once(&self.intercept))
            .any(|v| !v.is_finite())
        {
            return Err("linear model has non-finite coefficients".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotingKind {
    #[default]
    Hard,
    Soft,
}

/// A trained predictor as exported to JSON.
///
/// Wrapper shapes (`random_forest`, `bagging`, `voting`, `meta`) hold other
/// predictors and aggregate them when called directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PredictorArtifact {
    LogisticRegression(LinearModel),
    LinearSvc(LinearModel),
    Svc(SupportVectorClassifier),
    DecisionTree(DecisionTree),
    RandomForest {
        estimators: Vec<PredictorArtifact>,
    },
    Bagging {
        #[serde(default)]
        base_estimator: Option<Box<PredictorArtifact>>,
        #[serde(default)]
        estimators: Vec<PredictorArtifact>,
    },
    Voting {
        estimators: Vec<PredictorArtifact>,
        #[serde(default)]
        voting: VotingKind,
    },
    Meta {
        base_estimator: Box<PredictorArtifact>,
    },
}

impl PredictorArtifact {
    /// Fitted sub-estimators, empty for leaf shapes
    pub fn sub_estimators(&self) -> &[PredictorArtifact] {
        match self {
            Self::RandomForest { estimators }
            | Self::Bagging { estimators, .. }
            | Self::Voting { estimators, .. } => estimators,
            _ => &[],
        }
    }

    pub fn base_estimator(&self) -> Option<&PredictorArtifact> {
        match self {
            Self::Bagging { base_estimator, .. } => base_estimator.as_deref(),
            Self::Meta { base_estimator } => Some(base_estimator),
            _ => None,
        }
    }

    /// Check structural consistency, and the input dimension when one is given
    pub fn validate(&self, n_features: Option<usize>) -> Result<(), String> {
        match self {
            Self::LogisticRegression(m) | Self::LinearSvc(m) => m.validate()?,
            Self::Svc(svc) => svc.validate()?,
            Self::DecisionTree(tree) => tree.validate()?,
            Self::RandomForest { estimators } | Self::Voting { estimators, .. } => {
                if estimators.is_empty() {
                    return Err(format!("{} has no estimators", self.kind()));
                }
            }
            Self::Bagging {
                base_estimator,
                estimators,
            } => {
                if estimators.is_empty() && base_estimator.is_none() {
                    return Err("bagging has neither estimators nor base_estimator".to_string());
                }
            }
            Self::Meta { .. } => {}
        }

        for child in self.sub_estimators().iter().chain(self.base_estimator()) {
            child.validate(n_features)?;
        }

        if let (Some(expected), Some(actual)) = (n_features, Predictor::n_features(self)) {
            if expected != actual {
                return Err(format!(
                    "{} expects {} features, condition has {}",
                    self.kind(),
                    actual,
                    expected
                ));
            }
        }
        Ok(())
    }

    /// Members aggregated when the shape is called directly
    fn members(&self) -> &[PredictorArtifact] {
        match self {
            Self::Bagging {
                base_estimator: Some(base),
                estimators,
            } if estimators.is_empty() => std::slice::from_ref(base.as_ref()),
            _ => self.sub_estimators(),
        }
    }

    fn mean_proba(&self, x: &[f64]) -> Result<[f64; 2], ModelError> {
        let members = self.members();
        if members.is_empty() {
            return Err(ModelError::Runtime(format!("{} has no estimators", self.kind())));
        }
        let mut sum = [0.0, 0.0];
        for member in members {
            let [p0, p1] = member.predict_proba(x)?;
            sum[0] += p0;
            sum[1] += p1;
        }
        let n = members.len() as f64;
        Ok([sum[0] / n, sum[1] / n])
    }

    fn majority_vote(&self, x: &[f64]) -> Result<i64, ModelError> {
        let members = self.members();
        if members.is_empty() {
            return Err(ModelError::Runtime(format!("{} has no estimators", self.kind())));
        }
        let mut positive = 0usize;
        for member in members {
            match member.predict_class(x)? {
                0 => {}
                1 => positive += 1,
                other => return Err(ModelError::UnexpectedClass(other)),
            }
        }
        Ok(if positive * 2 > members.len() { 1 } else { 0 })
    }

    fn aggregates_proba(&self) -> bool {
        let members = self.members();
        !members.is_empty() && members.iter().all(|m| m.supports_proba())
    }
}

impl Predictor for PredictorArtifact {
    fn predict_class(&self, x: &[f64]) -> Result<i64, ModelError> {
        match self {
            Self::LogisticRegression(m) | Self::LinearSvc(m) => {
                Ok(if m.decision(x)? > 0.0 { 1 } else { 0 })
            }
            Self::Svc(svc) => svc.predict_class(x),
            Self::DecisionTree(tree) => tree.predict_class(x),
            Self::Meta { base_estimator } => base_estimator.predict_class(x),
            Self::Voting {
                voting: VotingKind::Hard,
                ..
            } => self.majority_vote(x),
            _ if self.supports_proba() => {
                let [p0, p1] = self.mean_proba(x)?;
                Ok(if p1 > p0 { 1 } else { 0 })
            }
            _ => self.majority_vote(x),
        }
    }

    fn predict_proba(&self, x: &[f64]) -> Result<[f64; 2], ModelError> {
        if !self.supports_proba() {
            return Err(ModelError::ProbabilityUnsupported);
        }
        match self {
            Self::LogisticRegression(m) => {
                let p1 = sigmoid(m.decision(x)?);
                Ok([1.0 - p1, p1])
            }
            Self::Svc(svc) => svc.predict_proba(x),
            Self::DecisionTree(tree) => tree.predict_proba(x),
            Self::Meta { base_estimator } => base_estimator.predict_proba(x),
            _ => self.mean_proba(x),
        }
    }

    fn supports_proba(&self) -> bool {
        match self {
            Self::LogisticRegression(_) | Self::DecisionTree(_) => true,
            Self::LinearSvc(_) => false,
            Self::Svc(svc) => svc.supports_proba(),
            Self::Meta { base_estimator } => base_estimator.supports_proba(),
            Self::Voting { voting, .. } => {
                *voting == VotingKind::Soft && self.aggregates_proba()
            }
            Self::RandomForest { .. } | Self::Bagging { .. } => self.aggregates_proba(),
        }
    }

    fn n_features(&self) -> Option<usize> {
        match self {
            Self::LogisticRegression(m) | Self::LinearSvc(m) => Some(m.coef.len()),
            Self::Svc(svc) => svc.n_features(),
            Self::DecisionTree(tree) => tree.n_features(),
            Self::Meta { base_estimator } => base_estimator.n_features(),
            _ => self.members().first().and_then(|m| m.n_features()),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::LogisticRegression(_) => "logistic_regression",
            Self::LinearSvc(_) => "linear_svc",
            Self::Svc(_) => "svc",
            Self::DecisionTree(_) => "decision_tree",
            Self::RandomForest { .. } => "random_forest",
            Self::Bagging { .. } => "bagging",
            Self::Voting { .. } => "voting",
            Self::Meta { .. } => "meta",
        }
    }
}
