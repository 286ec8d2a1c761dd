//! Field catalogs for the three supported conditions
//!
//! Field order mirrors the column order of the training datasets.

use super::{CategoricalTable, FeatureSpec, FieldSpec};
use crate::models::Condition;

const SEX: CategoricalTable = CategoricalTable::new(&[("Male", 1), ("Female", 0)]);

const CHEST_PAIN: CategoricalTable = CategoricalTable::new(&[
    ("Typical Angina", 0),
    ("Atypical Angina", 1),
    ("Non-anginal Pain", 2),
    ("Asymptomatic", 3),
]);

const YES_NO: CategoricalTable = CategoricalTable::new(&[("Yes", 1), ("No", 0)]);

const RESTING_ECG: CategoricalTable = CategoricalTable::new(&[
    ("Normal", 0),
    ("ST-T Wave Abnormality", 1),
    ("Left Ventricular Hypertrophy", 2),
]);

const ST_SLOPE: CategoricalTable =
    CategoricalTable::new(&[("Upsloping", 0), ("Flat", 1), ("Downsloping", 2)]);

const THALASSEMIA: CategoricalTable = CategoricalTable::new(&[
    ("Normal", 0),
    ("Fixed Defect", 1),
    ("Reversible Defect", 2),
]);

pub static DIABETES_FIELDS: [FieldSpec; 8] = [
    FieldSpec::numeric("Pregnancies", "Number of Pregnancies"),
    FieldSpec::numeric("Glucose", "Glucose Level"),
    FieldSpec::numeric("BloodPressure", "Blood Pressure value"),
    FieldSpec::numeric("SkinThickness", "Skin Thickness value"),
    FieldSpec::numeric("Insulin", "Insulin Level"),
    FieldSpec::numeric("BMI", "BMI value"),
    FieldSpec::numeric("DiabetesPedigreeFunction", "Diabetes Pedigree Function value"),
    FieldSpec::numeric("Age", "Age of the Person"),
];

pub static HEART_FIELDS: [FieldSpec; 13] = [
    FieldSpec::numeric("age", "Age"),
    FieldSpec::categorical("sex", "Sex", SEX),
    FieldSpec::categorical("cp", "Chest Pain types", CHEST_PAIN),
    FieldSpec::numeric("trestbps", "Resting Blood Pressure"),
    FieldSpec::numeric("chol", "Serum Cholestoral in mg/dl"),
    FieldSpec::categorical("fbs", "Fasting Blood Sugar > 120 mg/dl", YES_NO),
    FieldSpec::categorical("restecg", "Resting Electrocardiographic results", RESTING_ECG),
    FieldSpec::numeric("thalach", "Maximum Heart Rate achieved"),
    FieldSpec::categorical("exang", "Exercise Induced Angina", YES_NO),
    FieldSpec::numeric("oldpeak", "ST depression induced by exercise"),
    FieldSpec::categorical("slope", "Slope of the peak exercise ST segment", ST_SLOPE),
    FieldSpec::numeric("ca", "Major vessels colored by flourosopy"),
    FieldSpec::categorical("thal", "Thalassemia", THALASSEMIA),
];

pub static PARKINSONS_FIELDS: [FieldSpec; 22] = [
    FieldSpec::numeric("MDVP:Fo(Hz)", "MDVP:Fo(Hz)"),
    FieldSpec::numeric("MDVP:Fhi(Hz)", "MDVP:Fhi(Hz)"),
    FieldSpec::numeric("MDVP:Flo(Hz)", "MDVP:Flo(Hz)"),
    FieldSpec::numeric("MDVP:Jitter(%)", "MDVP:Jitter(%)"),
    FieldSpec::numeric("MDVP:Jitter(Abs)", "MDVP:Jitter(Abs)"),
    FieldSpec::numeric("MDVP:RAP", "MDVP:RAP"),
    FieldSpec::numeric("MDVP:PPQ", "MDVP:PPQ"),
    FieldSpec::numeric("Jitter:DDP", "Jitter:DDP"),
    FieldSpec::numeric("MDVP:Shimmer", "MDVP:Shimmer"),
    FieldSpec::numeric("MDVP:Shimmer(dB)", "MDVP:Shimmer(dB)"),
    FieldSpec::numeric("Shimmer:APQ3", "Shimmer:APQ3"),
    FieldSpec::numeric("Shimmer:APQ5", "Shimmer:APQ5"),
    FieldSpec::numeric("MDVP:APQ", "MDVP:APQ"),
    FieldSpec::numeric("Shimmer:DDA", "Shimmer:DDA"),
    FieldSpec::numeric("NHR", "NHR"),
    FieldSpec::numeric("HNR", "HNR"),
    FieldSpec::numeric("RPDE", "RPDE"),
    FieldSpec::numeric("DFA", "DFA"),
    FieldSpec::numeric("spread1", "spread1"),
    FieldSpec::numeric("spread2", "spread2"),
    FieldSpec::numeric("D2", "D2"),
    FieldSpec::numeric("PPE", "PPE"),
];

/// Ordered feature spec for a condition
pub fn feature_spec(condition: Condition) -> FeatureSpec {
    let fields: &'static [FieldSpec] = match condition {
        Condition::Diabetes => &DIABETES_FIELDS,
        Condition::Heart => &HEART_FIELDS,
        Condition::Parkinsons => &PARKINSONS_FIELDS,
    };
    FeatureSpec { condition, fields }
}
