//! ONNX classifiers executed with tract
//!
//! Expects the skl2onnx classifier layout with `zipmap=False`: output 0 is the
//! predicted label, output 1 (when present) the `[1, 2]` probability matrix.

use anyhow::{Context, Result};
use tract_onnx::prelude::*;
use tracing::debug;

use super::{check_dimension, Predictor};
use crate::error::ModelError;

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

pub struct OnnxClassifier {
    model: TractModel,
    n_features: usize,
    has_proba: bool,
}

impl OnnxClassifier {
    pub fn from_bytes(model_bytes: &[u8], n_features: usize) -> Result<Self> {
        let model = tract_onnx::onnx()
            .model_for_read(&mut std::io::Cursor::new(model_bytes))
            .context("Failed to parse ONNX model")?
            .with_input_fact(0, f32::fact([1, n_features]).into())
            .context("Failed to set input shape")?
            .into_optimized()
            .context("Failed to optimize model")?
            .into_runnable()
            .context("Failed to create runnable model")?;

        let outputs = model.model().output_outlets()?.len();
        debug!(n_features, outputs, "ONNX classifier loaded");

        Ok(Self {
            model,
            n_features,
            has_proba: outputs >= 2,
        })
    }

    fn run(&self, x: &[f64]) -> Result<TVec<TValue>, ModelError> {
        check_dimension(self.n_features, x)?;
        let data: Vec<f32> = x.iter().map(|v| *v as f32).collect();
        let input: Tensor = tract_ndarray::Array2::from_shape_vec((1, self.n_features), data)
            .map_err(|e| ModelError::Runtime(e.to_string()))?
            .into();
        self.model
            .run(tvec!(input.into()))
            .map_err(|e| ModelError::Runtime(format!("{:#}", e)))
    }
}

impl Predictor for OnnxClassifier {
    fn predict_class(&self, x: &[f64]) -> Result<i64, ModelError> {
        let outputs = self.run(x)?;
        let label = outputs
            .first()
            .ok_or_else(|| ModelError::Runtime("model produced no outputs".to_string()))?;
        let label = label
            .cast_to::<i64>()
            .map_err(|e| ModelError::Runtime(format!("{:#}", e)))?;
        let values = label
            .as_slice::<i64>()
            .map_err(|e| ModelError::Runtime(format!("{:#}", e)))?;
        values
            .first()
            .copied()
            .ok_or_else(|| ModelError::Runtime("label output is empty".to_string()))
    }

    fn predict_proba(&self, x: &[f64]) -> Result<[f64; 2], ModelError> {
        if !self.has_proba {
            return Err(ModelError::ProbabilityUnsupported);
        }
        let outputs = self.run(x)?;
        let proba = outputs
            .get(1)
            .ok_or_else(|| ModelError::Runtime("model produced no probability output".to_string()))?;
        let proba = proba
            .cast_to::<f32>()
            .map_err(|e| ModelError::Runtime(format!("{:#}", e)))?;
        let values = proba
            .as_slice::<f32>()
            .map_err(|e| ModelError::Runtime(format!("{:#}", e)))?;
        match values {
            [p0, p1] => Ok([*p0 as f64, *p1 as f64]),
            other => Err(ModelError::Runtime(format!(
                "expected 2 class probabilities, got {}",
                other.len()
            ))),
        }
    }

    fn supports_proba(&self) -> bool {
        self.has_proba
    }

    fn n_features(&self) -> Option<usize> {
        Some(self.n_features)
    }

    fn kind(&self) -> &'static str {
        "onnx"
    }
}

impl std::fmt::Debug for OnnxClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxClassifier")
            .field("n_features", &self.n_features)
            .field("has_proba", &self.has_proba)
            .finish()
    }
}

/// Hand-encoded skl2onnx-style graph for tests.
///
/// `probabilities = softmax(x W + b)` with `W = [0 | coef]` and
/// `b = [0, intercept]`, so `p1` equals the logistic of `coef . x + intercept`;
/// `label = argmax(probabilities)`.
#[cfg(test)]
pub(crate) fn logistic_onnx(coef: &[f32], intercept: f32) -> Vec<u8> {
    const FLOAT: i64 = 1;
    const INT64: i64 = 7;
    const ATTR_INT: i64 = 2;

    fn varint(buf: &mut Vec<u8>, mut v: u64) {
        while v >= 0x80 {
            buf.push((v as u8) | 0x80);
            v >>= 7;
        }
        buf.push(v as u8);
    }
    fn int(buf: &mut Vec<u8>, field: u64, v: i64) {
        varint(buf, field << 3);
        varint(buf, v as u64);
    }
    fn bytes(buf: &mut Vec<u8>, field: u64, data: &[u8]) {
        varint(buf, (field << 3) | 2);
        varint(buf, data.len() as u64);
        buf.extend_from_slice(data);
    }
    fn tensor(name: &str, dims: &[i64], values: &[f32]) -> Vec<u8> {
        let mut t = Vec::new();
        for d in dims {
            int(&mut t, 1, *d);
        }
        int(&mut t, 2, FLOAT);
        bytes(&mut t, 8, name.as_bytes());
        let raw: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        bytes(&mut t, 9, &raw);
        t
    }
    fn value_info(name: &str, elem_type: i64, dims: &[i64]) -> Vec<u8> {
        let mut shape = Vec::new();
        for d in dims {
            let mut dim = Vec::new();
            int(&mut dim, 1, *d);
            bytes(&mut shape, 1, &dim);
        }
        let mut tensor_type = Vec::new();
        int(&mut tensor_type, 1, elem_type);
        bytes(&mut tensor_type, 2, &shape);
        let mut ty = Vec::new();
        bytes(&mut ty, 1, &tensor_type);
        let mut vi = Vec::new();
        bytes(&mut vi, 1, name.as_bytes());
        bytes(&mut vi, 2, &ty);
        vi
    }
    fn attr(name: &str, v: i64) -> Vec<u8> {
        let mut a = Vec::new();
        bytes(&mut a, 1, name.as_bytes());
        int(&mut a, 3, v);
        int(&mut a, 20, ATTR_INT);
        a
    }
    fn node(inputs: &[&str], outputs: &[&str], op: &str, attrs: &[Vec<u8>]) -> Vec<u8> {
        let mut n = Vec::new();
        for i in inputs {
            bytes(&mut n, 1, i.as_bytes());
        }
        for o in outputs {
            bytes(&mut n, 2, o.as_bytes());
        }
        bytes(&mut n, 4, op.as_bytes());
        for a in attrs {
            bytes(&mut n, 5, a);
        }
        n
    }

    let n = coef.len() as i64;
    let weights: Vec<f32> = coef.iter().flat_map(|c| [0.0, *c]).collect();

    let mut graph = Vec::new();
    bytes(&mut graph, 1, &node(&["input", "W"], &["logits"], "MatMul", &[]));
    bytes(&mut graph, 1, &node(&["logits", "B"], &["z"], "Add", &[]));
    bytes(&mut graph, 1, &node(&["z"], &["probabilities"], "Softmax", &[attr("axis", 1)]));
    bytes(
        &mut graph,
        1,
        &node(&["probabilities"], &["label"], "ArgMax", &[attr("axis", 1), attr("keepdims", 0)]),
    );
    bytes(&mut graph, 2, b"logistic");
    bytes(&mut graph, 5, &tensor("W", &[n, 2], &weights));
    bytes(&mut graph, 5, &tensor("B", &[2], &[0.0, intercept]));
    bytes(&mut graph, 11, &value_info("input", FLOAT, &[1, n]));
    bytes(&mut graph, 12, &value_info("label", INT64, &[1]));
    bytes(&mut graph, 12, &value_info("probabilities", FLOAT, &[1, 2]));

    let mut opset = Vec::new();
    int(&mut opset, 2, 13);

    let mut model = Vec::new();
    int(&mut model, 1, 7);
    bytes(&mut model, 7, &graph);
    bytes(&mut model, 8, &opset);
    model
}
