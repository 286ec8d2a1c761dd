//! Binary decision tree in sklearn's flat array layout

use serde::{Deserialize, Serialize};

use super::{check_dimension, Predictor};
use crate::error::ModelError;

/// Marker used by sklearn for "no child"
const LEAF: i64 = -1;

/// Fitted CART tree.
///
/// Node `i` is a leaf when `children_left[i] == -1`. Internal nodes send a
/// sample left when `x[feature[i]] <= threshold[i]`. `value[i]` holds the
/// per-class training counts (or fractions) at the node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub n_features: usize,
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    pub value: Vec<[f64; 2]>,
}

impl DecisionTree {
    pub fn node_count(&self) -> usize {
        self.children_left.len()
    }

    pub fn validate(&self) -> Result<(), String> {
        let n = self.node_count();
        if n == 0 {
            return Err("decision tree has no nodes".to_string());
        }
        if [
            self.children_right.len(),
            self.feature.len(),
            self.threshold.len(),
            self.value.len(),
        ]
        .iter()
        .any(|len| *len != n)
        {
            return Err("decision tree arrays have different lengths".to_string());
        }

        for i in 0..n {
            let (left, right) = (self.children_left[i], self.children_right[i]);
            if left == LEAF || right == LEAF {
                if left != right {
                    return Err(format!("node {i} has exactly one child"));
                }
                let [c0, c1] = self.value[i];
                if !(c0.is_finite() && c1.is_finite()) || c0 < 0.0 || c1 < 0.0 || c0 + c1 <= 0.0 {
                    return Err(format!("leaf {i} has invalid class weights"));
                }
                continue;
            }
            // Children always follow their parent, which also rules out cycles
            for child in [left, right] {
                if child <= i as i64 || child >= n as i64 {
                    return Err(format!("node {i} has out-of-range child {child}"));
                }
            }
            let feature = self.feature[i];
            if feature < 0 || feature as usize >= self.n_features {
                return Err(format!("node {i} splits on unknown feature {feature}"));
            }
            if !self.threshold[i].is_finite() {
                return Err(format!("node {i} has a non-finite threshold"));
            }
        }
        Ok(())
    }

    fn leaf_for(&self, x: &[f64]) -> Result<usize, ModelError> {
        check_dimension(self.n_features, x)?;
        let mut node = 0usize;
        // A valid tree reaches a leaf in fewer steps than it has nodes
        for _ in 0..=self.node_count() {
            let left = *self
                .children_left
                .get(node)
                .ok_or_else(|| ModelError::Runtime(format!("tree node {node} out of range")))?;
            if left == LEAF {
                return Ok(node);
            }
            let feature = self.feature[node] as usize;
            let value = *x
                .get(feature)
                .ok_or_else(|| ModelError::Runtime(format!("tree feature {feature} out of range")))?;
            node = if value <= self.threshold[node] {
                left as usize
            } else {
                self.children_right[node] as usize
            };
        }
        Err(ModelError::Runtime("tree traversal did not terminate".to_string()))
    }
}

impl Predictor for DecisionTree {
    fn predict_class(&self, x: &[f64]) -> Result<i64, ModelError> {
        let [c0, c1] = self.value[self.leaf_for(x)?];
        Ok(if c1 > c0 { 1 } else { 0 })
    }

    fn predict_proba(&self, x: &[f64]) -> Result<[f64; 2], ModelError> {
        let [c0, c1] = self.value[self.leaf_for(x)?];
        let total = c0 + c1;
        Ok([c0 / total, c1 / total])
    }

    fn supports_proba(&self) -> bool {
        true
    }

    fn n_features(&self) -> Option<usize> {
        Some(self.n_features)
    }

    fn kind(&self) -> &'static str {
        "decision_tree"
    }
}
