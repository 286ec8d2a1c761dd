//! Artifact store
//!
//! Loads the predictor and scaler for every condition once at startup and
//! holds them immutably for the lifetime of the process. Loading is
//! all-or-nothing: one failing artifact aborts the whole store.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{ArtifactKind, ArtifactLoadCause, ArtifactLoadError};
use crate::features::feature_spec;
use crate::models::Condition;
use crate::predictor::{
    normalize, DecisionPath, LoadedPredictor, OnnxClassifier, PredictorArtifact, PredictorHandle,
};
use crate::scaler::Scaler;

/// Where a condition's artifacts live on disk
#[derive(Debug, Clone)]
pub struct ArtifactLayout {
    pub model_dir: PathBuf,
}

impl ArtifactLayout {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
        }
    }

    pub fn predictor_stem(condition: Condition) -> &'static str {
        match condition {
            Condition::Diabetes => "diabetespred_model",
            Condition::Heart => "heartdisease_model",
            Condition::Parkinsons => "parkinsons_model",
        }
    }

    pub fn scaler_file(condition: Condition) -> &'static str {
        match condition {
            Condition::Diabetes => "diabetes_scaler.json",
            Condition::Heart => "heart_scaler.json",
            Condition::Parkinsons => "parkinsons_scaler.json",
        }
    }

    /// Predictor paths in lookup order: JSON first, then ONNX
    pub fn predictor_candidates(&self, condition: Condition) -> [PathBuf; 2] {
        let stem = Self::predictor_stem(condition);
        [
            self.model_dir.join(format!("{stem}.json")),
            self.model_dir.join(format!("{stem}.onnx")),
        ]
    }

    pub fn scaler_path(&self, condition: Condition) -> PathBuf {
        self.model_dir.join(Self::scaler_file(condition))
    }
}

/// Descriptive metadata about a loaded artifact pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactInfo {
    pub condition: Condition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predictor_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predictor_sha256: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scaler_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scaler_sha256: Option<String>,
    pub scaler_kind: String,
    pub predictor_kind: String,
    pub decision_path: DecisionPath,
    /// Shape the handle was derived from
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unwrapped_by: Option<String>,
    pub n_features: usize,
    pub loaded_at: i64,
}

/// The predictor and scaler serving one condition
#[derive(Debug, Clone)]
pub struct ModelArtifact {
    pub condition: Condition,
    /// Predictor as read from disk, before normalization; absent when the
    /// artifact was built around an injected handle
    pub predictor: Option<LoadedPredictor>,
    pub scaler: Scaler,
    pub handle: PredictorHandle,
    pub info: ArtifactInfo,
}

impl ModelArtifact {
    /// Build an artifact from an in-memory predictor, normalizing it
    pub fn new(condition: Condition, predictor: &LoadedPredictor, scaler: Scaler) -> Self {
        let mut artifact = Self::from_handle(condition, normalize(predictor), scaler);
        artifact.predictor = Some(predictor.clone());
        artifact
    }

    /// Build an artifact around an already normalized handle
    pub fn from_handle(condition: Condition, handle: PredictorHandle, scaler: Scaler) -> Self {
        let info = ArtifactInfo {
            condition,
            predictor_path: None,
            predictor_sha256: None,
            scaler_path: None,
            scaler_sha256: None,
            scaler_kind: scaler.kind().to_string(),
            predictor_kind: handle.kind().to_string(),
            decision_path: handle.decision_path(),
            source: handle.source().to_string(),
            unwrapped_by: handle.unwrapped_by().map(str::to_string),
            n_features: feature_spec(condition).len(),
            loaded_at: chrono::Utc::now().timestamp(),
        };
        Self {
            condition,
            predictor: None,
            scaler,
            handle,
            info,
        }
    }
}

/// Immutable set of artifacts, one per condition
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    artifacts: BTreeMap<Condition, Arc<ModelArtifact>>,
}

impl ArtifactStore {
    /// Build a store from already constructed artifacts.
    ///
    /// Every condition must be present.
    pub fn new(artifacts: Vec<ModelArtifact>) -> Result<Self, ArtifactLoadError> {
        let artifacts: BTreeMap<_, _> = artifacts
            .into_iter()
            .map(|a| (a.condition, Arc::new(a)))
            .collect();

        for condition in Condition::ALL {
            if !artifacts.contains_key(&condition) {
                return Err(ArtifactLoadError::new(
                    condition,
                    ArtifactKind::Predictor,
                    ArtifactLoadCause::Incomplete,
                ));
            }
        }
        Ok(Self { artifacts })
    }

    /// Load every condition's artifacts from `layout`, failing on the first error
    pub fn load_all(layout: &ArtifactLayout) -> Result<Self, ArtifactLoadError> {
        let mut artifacts = Vec::with_capacity(Condition::ALL.len());
        for condition in Condition::ALL {
            artifacts.push(Self::load(layout, condition)?);
        }
        let store = Self::new(artifacts)?;
        info!(
            model_dir = %layout.model_dir.display(),
            conditions = store.artifacts.len(),
            "Artifact store loaded"
        );
        Ok(store)
    }

    /// Load a single condition's predictor and scaler
    pub fn load(layout: &ArtifactLayout, condition: Condition) -> Result<ModelArtifact, ArtifactLoadError> {
        let n_features = feature_spec(condition).len();

        let scaler_path = layout.scaler_path(condition);
        let (scaler, scaler_sha256) = load_scaler(&scaler_path, n_features)
            .map_err(|cause| ArtifactLoadError::new(condition, ArtifactKind::Scaler, cause))?;

        let (predictor_path, predictor, predictor_sha256) = load_predictor(layout, condition, n_features)
            .map_err(|cause| ArtifactLoadError::new(condition, ArtifactKind::Predictor, cause))?;

        let mut artifact = ModelArtifact::new(condition, &predictor, scaler);
        artifact.info.predictor_path = Some(predictor_path.display().to_string());
        artifact.info.predictor_sha256 = Some(predictor_sha256);
        artifact.info.scaler_path = Some(scaler_path.display().to_string());
        artifact.info.scaler_sha256 = Some(scaler_sha256);

        debug!(
            condition = %condition,
            predictor = %artifact.info.source,
            decision_path = %artifact.info.decision_path,
            scaler = %artifact.info.scaler_kind,
            "Loaded model artifacts"
        );
        Ok(artifact)
    }

    pub fn get(&self, condition: Condition) -> Option<&ModelArtifact> {
        self.artifacts.get(&condition).map(Arc::as_ref)
    }

    pub fn infos(&self) -> Vec<ArtifactInfo> {
        self.artifacts.values().map(|a| a.info.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

fn load_scaler(path: &Path, n_features: usize) -> Result<(Scaler, String), ArtifactLoadCause> {
    let (bytes, digest) = read_verified(path)?;
    let scaler: Scaler = serde_json::from_slice(&bytes).map_err(|source| ArtifactLoadCause::Corrupt {
        path: path.to_path_buf(),
        source,
    })?;

    let invalid = |reason: String| ArtifactLoadCause::Invalid {
        path: path.to_path_buf(),
        reason,
    };
    scaler.validate().map_err(invalid)?;
    if scaler.n_features() != n_features {
        return Err(invalid(format!(
            "scaler fitted on {} features, condition has {}",
            scaler.n_features(),
            n_features
        )));
    }
    Ok((scaler, digest))
}

fn load_predictor(
    layout: &ArtifactLayout,
    condition: Condition,
    n_features: usize,
) -> Result<(PathBuf, LoadedPredictor, String), ArtifactLoadCause> {
    let [json_path, onnx_path] = layout.predictor_candidates(condition);

    if json_path.exists() {
        let (bytes, digest) = read_verified(&json_path)?;
        let artifact: PredictorArtifact =
            serde_json::from_slice(&bytes).map_err(|source| ArtifactLoadCause::Corrupt {
                path: json_path.clone(),
                source,
            })?;
        artifact
            .validate(Some(n_features))
            .map_err(|reason| ArtifactLoadCause::Invalid {
                path: json_path.clone(),
                reason,
            })?;
        return Ok((json_path, LoadedPredictor::Json(artifact), digest));
    }

    if onnx_path.exists() {
        let (bytes, digest) = read_verified(&onnx_path)?;
        let model = OnnxClassifier::from_bytes(&bytes, n_features).map_err(|e| ArtifactLoadCause::Onnx {
            path: onnx_path.clone(),
            message: format!("{:#}", e),
        })?;
        return Ok((onnx_path, LoadedPredictor::Onnx(Arc::new(model)), digest));
    }

    Err(ArtifactLoadCause::Missing(json_path))
}

/// Read a file and check it against an optional `<file>.sha256` sidecar
fn read_verified(path: &Path) -> Result<(Vec<u8>, String), ArtifactLoadCause> {
    if !path.exists() {
        return Err(ArtifactLoadCause::Missing(path.to_path_buf()));
    }
    let bytes = fs::read(path).map_err(|source| ArtifactLoadCause::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let digest = compute_checksum(&bytes);

    let sidecar = sidecar_path(path);
    if sidecar.exists() {
        let contents = fs::read_to_string(&sidecar).map_err(|source| ArtifactLoadCause::Io {
            path: sidecar.clone(),
            source,
        })?;
        // sha256sum format: "<hex>  <filename>"
        let expected = contents
            .split_whitespace()
            .next()
            .ok_or_else(|| ArtifactLoadCause::Invalid {
                path: sidecar.clone(),
                reason: "checksum file is empty".to_string(),
            })?
            .to_ascii_lowercase();
        if expected != digest {
            return Err(ArtifactLoadCause::ChecksumMismatch {
                path: path.to_path_buf(),
                expected,
                actual: digest,
            });
        }
        debug!(path = %path.display(), checksum = %digest, "Artifact checksum validated");
    }
    Ok((bytes, digest))
}

fn sidecar_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".sha256");
    PathBuf::from(name)
}

/// Compute SHA256 checksum of data
fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::{logistic_onnx, LinearModel};
    use tempfile::TempDir;

    fn logistic_json(n: usize) -> String {
        serde_json::json!({
            "kind": "logistic_regression",
            "coef": vec![0.1; n],
            "intercept": -0.2,
        })
        .to_string()
    }

    fn scaler_json(n: usize) -> String {
        serde_json::json!({
            "kind": "standard",
            "mean": vec![0.0; n],
            "scale": vec![1.0; n],
        })
        .to_string()
    }

    fn write_all(dir: &Path) {
        for condition in Condition::ALL {
            let n = feature_spec(condition).len();
            let stem = ArtifactLayout::predictor_stem(condition);
            fs::write(dir.join(format!("{stem}.json")), logistic_json(n)).unwrap();
            fs::write(dir.join(ArtifactLayout::scaler_file(condition)), scaler_json(n)).unwrap();
        }
    }

    #[test]
    fn test_load_all() {
        let dir = TempDir::new().unwrap();
        write_all(dir.path());

        let store = ArtifactStore::load_all(&ArtifactLayout::new(dir.path())).unwrap();
        assert_eq!(store.len(), 3);

        let heart = store.get(Condition::Heart).unwrap();
        assert_eq!(heart.info.n_features, 13);
        assert_eq!(heart.info.predictor_kind, "logistic_regression");
        assert_eq!(heart.info.decision_path, DecisionPath::Probability);
        assert_eq!(heart.info.predictor_sha256.as_ref().map(String::len), Some(64));
        assert!(heart
            .info
            .predictor_path
            .as_deref()
            .unwrap()
            .ends_with("heartdisease_model.json"));
    }

    #[test]
    fn test_missing_scaler_is_fatal() {
        let dir = TempDir::new().unwrap();
        write_all(dir.path());
        fs::remove_file(dir.path().join("parkinsons_scaler.json")).unwrap();

        let err = ArtifactStore::load_all(&ArtifactLayout::new(dir.path())).unwrap_err();
        assert_eq!(err.condition, Condition::Parkinsons);
        assert_eq!(err.artifact, ArtifactKind::Scaler);
        assert!(matches!(err.cause, ArtifactLoadCause::Missing(_)));
    }

    #[test]
    fn test_missing_predictor_reports_json_path() {
        let dir = TempDir::new().unwrap();
        write_all(dir.path());
        fs::remove_file(dir.path().join("diabetespred_model.json")).unwrap();

        let err = ArtifactStore::load_all(&ArtifactLayout::new(dir.path())).unwrap_err();
        assert_eq!(err.artifact, ArtifactKind::Predictor);
        match err.cause {
            ArtifactLoadCause::Missing(path) => assert!(path.ends_with("diabetespred_model.json")),
            other => panic!("unexpected cause: {other:?}"),
        }
    }

    #[test]
    fn test_corrupt_predictor() {
        let dir = TempDir::new().unwrap();
        write_all(dir.path());
        fs::write(dir.path().join("heartdisease_model.json"), "{not json").unwrap();

        let err = ArtifactStore::load(&ArtifactLayout::new(dir.path()), Condition::Heart).unwrap_err();
        assert!(matches!(err.cause, ArtifactLoadCause::Corrupt { .. }));
    }

    #[test]
    fn test_scaler_dimension_must_match_condition() {
        let dir = TempDir::new().unwrap();
        write_all(dir.path());
        fs::write(dir.path().join("diabetes_scaler.json"), scaler_json(7)).unwrap();

        let err = ArtifactStore::load(&ArtifactLayout::new(dir.path()), Condition::Diabetes).unwrap_err();
        assert!(matches!(err.cause, ArtifactLoadCause::Invalid { .. }));
    }

    #[test]
    fn test_predictor_dimension_must_match_condition() {
        let dir = TempDir::new().unwrap();
        write_all(dir.path());
        fs::write(dir.path().join("diabetespred_model.json"), logistic_json(13)).unwrap();

        let err = ArtifactStore::load(&ArtifactLayout::new(dir.path()), Condition::Diabetes).unwrap_err();
        assert_eq!(err.artifact, ArtifactKind::Predictor);
        assert!(matches!(err.cause, ArtifactLoadCause::Invalid { .. }));
    }

    #[test]
    fn test_checksum_sidecar() {
        let dir = TempDir::new().unwrap();
        write_all(dir.path());
        let layout = ArtifactLayout::new(dir.path());
        let scaler = layout.scaler_path(Condition::Heart);
        let digest = compute_checksum(&fs::read(&scaler).unwrap());

        fs::write(sidecar_path(&scaler), format!("{}  heart_scaler.json\n", digest)).unwrap();
        let artifact = ArtifactStore::load(&layout, Condition::Heart).unwrap();
        assert_eq!(artifact.info.scaler_sha256.as_deref(), Some(digest.as_str()));

        fs::write(sidecar_path(&scaler), "0".repeat(64)).unwrap();
        let err = ArtifactStore::load(&layout, Condition::Heart).unwrap_err();
        assert!(matches!(err.cause, ArtifactLoadCause::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_wrapped_predictor_is_normalized_on_load() {
        let dir = TempDir::new().unwrap();
        write_all(dir.path());
        let forest = serde_json::json!({
            "kind": "random_forest",
            "estimators": [
                {"kind": "linear_svc", "coef": vec![1.0; 8], "intercept": 0.0},
                {"kind": "logistic_regression", "coef": vec![1.0; 8], "intercept": 0.0}
            ]
        });
        fs::write(dir.path().join("diabetespred_model.json"), forest.to_string()).unwrap();

        let artifact = ArtifactStore::load(&ArtifactLayout::new(dir.path()), Condition::Diabetes).unwrap();
        assert_eq!(artifact.info.source, "random_forest -> linear_svc");
        assert_eq!(artifact.info.unwrapped_by.as_deref(), Some("first_sub_estimator"));
        assert_eq!(artifact.handle.decision_path(), DecisionPath::Class);
        // The raw predictor keeps the wrapper the handle was unwrapped from
        assert_eq!(artifact.predictor.as_ref().map(LoadedPredictor::kind), Some("random_forest"));
    }

    #[test]
    fn test_onnx_predictor_is_loaded() {
        let dir = TempDir::new().unwrap();
        write_all(dir.path());
        fs::remove_file(dir.path().join("diabetespred_model.json")).unwrap();
        fs::write(
            dir.path().join("diabetespred_model.onnx"),
            logistic_onnx(&[0.1; 8], -0.2),
        )
        .unwrap();

        let artifact = ArtifactStore::load(&ArtifactLayout::new(dir.path()), Condition::Diabetes).unwrap();
        assert_eq!(artifact.info.predictor_kind, "onnx");
        assert_eq!(artifact.info.decision_path, DecisionPath::Probability);
        assert!(artifact
            .info
            .predictor_path
            .as_deref()
            .unwrap()
            .ends_with("diabetespred_model.onnx"));
        assert!(matches!(artifact.predictor, Some(LoadedPredictor::Onnx(_))));

        let [_, p1] = artifact.handle.predict_probability(&[1.0; 8]).unwrap();
        assert!((p1 - crate::predictor::sigmoid(0.6)).abs() < 1e-5);
    }

    #[test]
    fn test_corrupt_onnx_predictor() {
        let dir = TempDir::new().unwrap();
        write_all(dir.path());
        fs::remove_file(dir.path().join("heartdisease_model.json")).unwrap();
        fs::write(dir.path().join("heartdisease_model.onnx"), [0xffu8; 32]).unwrap();

        let err = ArtifactStore::load(&ArtifactLayout::new(dir.path()), Condition::Heart).unwrap_err();
        assert_eq!(err.artifact, ArtifactKind::Predictor);
        match err.cause {
            ArtifactLoadCause::Onnx { path, .. } => assert!(path.ends_with("heartdisease_model.onnx")),
            other => panic!("unexpected cause: {other:?}"),
        }
    }

    #[test]
    fn test_json_predictor_wins_over_onnx() {
        let dir = TempDir::new().unwrap();
        write_all(dir.path());
        fs::write(dir.path().join("heartdisease_model.onnx"), [0xffu8; 32]).unwrap();

        let artifact = ArtifactStore::load(&ArtifactLayout::new(dir.path()), Condition::Heart).unwrap();
        assert_eq!(artifact.info.predictor_kind, "logistic_regression");
        assert!(artifact
            .info
            .predictor_path
            .as_deref()
            .unwrap()
            .ends_with("heartdisease_model.json"));
    }

    #[test]
    fn test_new_requires_every_condition() {
        let predictor = LoadedPredictor::Json(PredictorArtifact::LogisticRegression(LinearModel {
            coef: vec![0.0; 8],
            intercept: 0.0,
        }));
        let diabetes = ModelArtifact::new(
            Condition::Diabetes,
            &predictor,
            Scaler::standard(vec![0.0; 8], vec![1.0; 8]),
        );
        assert_eq!(diabetes.handle.kind(), predictor.kind());
        assert!(matches!(
            diabetes.predictor,
            Some(LoadedPredictor::Json(PredictorArtifact::LogisticRegression(_)))
        ));

        let err = ArtifactStore::new(vec![diabetes]).unwrap_err();
        assert_eq!(err.condition, Condition::Heart);
        assert!(matches!(err.cause, ArtifactLoadCause::Incomplete));
    }
}
