//! Raw field values to encoded feature vectors

use std::collections::BTreeMap;

use super::{feature_spec, FieldKind, FieldSpec};
use crate::error::{EncodingError, FieldIssue, FieldProblem};
use crate::models::{Condition, EncodedVector};

/// Encodes string field values into the numeric vector a model expects
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureEncoder;

impl FeatureEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Encode `fields` in the condition's fixed feature order.
    ///
    /// Every failing field is reported at once; nothing is returned for a
    /// partially valid record.
    pub fn encode(
        &self,
        condition: Condition,
        fields: &BTreeMap<String, String>,
    ) -> Result<EncodedVector, EncodingError> {
        let spec = feature_spec(condition);
        let mut values = Vec::with_capacity(spec.len());
        let mut issues = Vec::new();

        for field in spec.fields {
            match fields.get(field.name) {
                None => issues.push(issue(field.name, FieldProblem::Missing)),
                Some(raw) => match encode_field(field, raw) {
                    Ok(value) => values.push(value),
                    Err(problem) => issues.push(issue(field.name, problem)),
                },
            }
        }

        for name in fields.keys() {
            if spec.field(name).is_none() {
                issues.push(issue(name, FieldProblem::UnexpectedField));
            }
        }

        if issues.is_empty() {
            Ok(EncodedVector::new(values))
        } else {
            Err(EncodingError { condition, issues })
        }
    }
}

fn encode_field(field: &FieldSpec, raw: &str) -> Result<f64, FieldProblem> {
    let raw = raw.trim();
    match field.kind {
        FieldKind::Numeric => parse_finite(raw),
        FieldKind::Categorical(table) => table
            .lookup(raw)
            .map(|code| code as f64)
            .ok_or(FieldProblem::UnknownLabel),
    }
}

fn parse_finite(raw: &str) -> Result<f64, FieldProblem> {
    let value: f64 = raw.parse().map_err(|_| FieldProblem::NotANumber)?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(FieldProblem::NotFinite)
    }
}

fn issue(field: &str, problem: FieldProblem) -> FieldIssue {
    FieldIssue {
        field: field.to_string(),
        problem,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{DIABETES_FIELDS, HEART_FIELDS, PARKINSONS_FIELDS};

    fn fields(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn diabetes_fields() -> BTreeMap<String, String> {
        fields(&[
            ("Pregnancies", "6"),
            ("Glucose", "148"),
            ("BloodPressure", "72"),
            ("SkinThickness", "35"),
            ("Insulin", "0"),
            ("BMI", "33.6"),
            ("DiabetesPedigreeFunction", "0.627"),
            ("Age", "50"),
        ])
    }

    fn heart_fields() -> BTreeMap<String, String> {
        fields(&[
            ("age", "63"),
            ("sex", "Female"),
            ("cp", "Asymptomatic"),
            ("trestbps", "145"),
            ("chol", "233"),
            ("fbs", "Yes"),
            ("restecg", "Normal"),
            ("thalach", "150"),
            ("exang", "No"),
            ("oldpeak", "2.3"),
            ("slope", "Upsloping"),
            ("ca", "0"),
            ("thal", "Reversible Defect"),
        ])
    }

    fn parkinsons_fields() -> BTreeMap<String, String> {
        PARKINSONS_FIELDS
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.to_string(), format!("{}.5", i)))
            .collect()
    }

    #[test]
    fn test_diabetes_encodes_in_order() {
        let encoded = FeatureEncoder::new()
            .encode(Condition::Diabetes, &diabetes_fields())
            .unwrap();
        assert_eq!(encoded.len(), DIABETES_FIELDS.len());
        assert_eq!(
            encoded.as_slice(),
            &[6.0, 148.0, 72.0, 35.0, 0.0, 33.6, 0.627, 50.0]
        );
    }

    #[test]
    fn test_heart_categorical_mapping() {
        let encoded = FeatureEncoder::new()
            .encode(Condition::Heart, &heart_fields())
            .unwrap();
        let v = encoded.as_slice();
        assert_eq!(v.len(), HEART_FIELDS.len());
        assert_eq!(v[1], 0.0, "Female encodes to 0");
        assert_eq!(v[2], 3.0, "Asymptomatic encodes to 3");
        assert_eq!(v[5], 1.0, "fbs Yes encodes to 1");
        assert_eq!(v[12], 2.0, "Reversible Defect encodes to 2");
        assert_eq!(v, &[63.0, 0.0, 3.0, 145.0, 233.0, 1.0, 0.0, 150.0, 0.0, 2.3, 0.0, 0.0, 2.0]);
    }

    #[test]
    fn test_parkinsons_encodes_in_order() {
        let encoded = FeatureEncoder::new()
            .encode(Condition::Parkinsons, &parkinsons_fields())
            .unwrap();
        assert_eq!(encoded.len(), 22);
        for (i, value) in encoded.as_slice().iter().enumerate() {
            assert_eq!(*value, i as f64 + 0.5);
        }
    }

    #[test]
    fn test_every_categorical_label_round_trips() {
        let encoder = FeatureEncoder::new();
        for field in HEART_FIELDS.iter() {
            let FieldKind::Categorical(table) = field.kind else {
                continue;
            };
            let index = HEART_FIELDS.iter().position(|f| f.name == field.name).unwrap();
            for (label, code) in table.entries() {
                let mut input = heart_fields();
                input.insert(field.name.to_string(), label.to_string());
                let encoded = encoder.encode(Condition::Heart, &input).unwrap();
                assert_eq!(encoded.as_slice()[index], *code as f64, "{}={}", field.name, label);
            }
        }
    }

    #[test]
    fn test_unparseable_numeric_names_field() {
        let mut input = diabetes_fields();
        input.insert("Glucose".to_string(), "abc".to_string());
        let err = FeatureEncoder::new()
            .encode(Condition::Diabetes, &input)
            .unwrap_err();
        assert_eq!(err.field_names(), vec!["Glucose"]);
        assert_eq!(err.issues[0].problem, FieldProblem::NotANumber);
    }

    #[test]
    fn test_all_failing_fields_are_aggregated() {
        let mut input = diabetes_fields();
        input.insert("Glucose".to_string(), "".to_string());
        input.insert("BMI".to_string(), "inf".to_string());
        input.remove("Age");
        let err = FeatureEncoder::new()
            .encode(Condition::Diabetes, &input)
            .unwrap_err();
        assert_eq!(err.field_names(), vec!["Glucose", "BMI", "Age"]);
        assert_eq!(err.issues[1].problem, FieldProblem::NotFinite);
        assert_eq!(err.issues[2].problem, FieldProblem::Missing);
    }

    #[test]
    fn test_nan_is_rejected() {
        let mut input = diabetes_fields();
        input.insert("Insulin".to_string(), "NaN".to_string());
        let err = FeatureEncoder::new()
            .encode(Condition::Diabetes, &input)
            .unwrap_err();
        assert!(err.names_field("Insulin"));
    }

    #[test]
    fn test_unknown_label_is_rejected() {
        let mut input = heart_fields();
        input.insert("cp".to_string(), "Sharp".to_string());
        let err = FeatureEncoder::new()
            .encode(Condition::Heart, &input)
            .unwrap_err();
        assert_eq!(err.field_names(), vec!["cp"]);
        assert_eq!(err.issues[0].problem, FieldProblem::UnknownLabel);
    }

    #[test]
    fn test_numeric_code_is_not_a_label() {
        let mut input = heart_fields();
        input.insert("sex".to_string(), "1".to_string());
        assert!(FeatureEncoder::new().encode(Condition::Heart, &input).is_err());
    }

    #[test]
    fn test_unexpected_field_is_rejected() {
        let mut input = diabetes_fields();
        input.insert("Cholesterol".to_string(), "200".to_string());
        let err = FeatureEncoder::new()
            .encode(Condition::Diabetes, &input)
            .unwrap_err();
        assert_eq!(err.issues[0].problem, FieldProblem::UnexpectedField);
    }

    #[test]
    fn test_surrounding_whitespace_is_accepted() {
        let mut input = heart_fields();
        input.insert("age".to_string(), " 63 ".to_string());
        input.insert("thal".to_string(), "Normal ".to_string());
        let encoded = FeatureEncoder::new().encode(Condition::Heart, &input).unwrap();
        assert_eq!(encoded.as_slice()[0], 63.0);
        assert_eq!(encoded.as_slice()[12], 0.0);
    }
}
