//! Feature specifications and encoding
//!
//! Each condition has a fixed, ordered list of input fields. The order is the
//! order the scaler and predictor were fitted on, so reordering a spec silently
//! corrupts every prediction for that condition.

mod catalog;
mod encoder;

pub use catalog::{feature_spec, DIABETES_FIELDS, HEART_FIELDS, PARKINSONS_FIELDS};
pub use encoder::FeatureEncoder;

use serde::Serialize;

use crate::models::Condition;

/// Fixed label to integer mapping for a categorical field
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CategoricalTable(&'static [(&'static str, i64)]);

impl CategoricalTable {
    pub const fn new(entries: &'static [(&'static str, i64)]) -> Self {
        Self(entries)
    }

    pub fn lookup(&self, label: &str) -> Option<i64> {
        self.0.iter().find(|(l, _)| *l == label).map(|(_, v)| *v)
    }

    pub fn labels(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.iter().map(|(l, _)| *l)
    }

    pub fn entries(&self) -> &'static [(&'static str, i64)] {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", content = "options", rename_all = "lowercase")]
pub enum FieldKind {
    Numeric,
    Categorical(CategoricalTable),
}

/// One input field of a condition
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub const fn numeric(name: &'static str, label: &'static str) -> Self {
        Self {
            name,
            label,
            kind: FieldKind::Numeric,
        }
    }

    pub const fn categorical(
        name: &'static str,
        label: &'static str,
        table: CategoricalTable,
    ) -> Self {
        Self {
            name,
            label,
            kind: FieldKind::Categorical(table),
        }
    }
}

/// Ordered input schema of one condition
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureSpec {
    pub condition: Condition,
    pub fields: &'static [FieldSpec],
}

impl FeatureSpec {
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> {
        self.fields.iter().map(|f| f.name)
    }
}
