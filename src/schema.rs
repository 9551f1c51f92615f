//! Feature schema exported alongside a trained model.
//!
//! The schema lists the model's input columns in training order and says how
//! each one is turned into numbers: categorical columns are one-hot encoded
//! against the vocabulary seen in training, numeric columns are standardised
//! with `(value - center) / scale`.
//!
//! ```json
//! { "columns": [
//!     { "name": "Manufacturer", "kind": "categorical", "categories": ["BMW", "Ford"] },
//!     { "name": "Year", "kind": "numeric", "center": 2004.2, "scale": 9.6 }
//! ] }
//! ```

use std::{collections::HashSet, fs, path::Path};

use serde::Deserialize;
use thiserror::Error;

use crate::error::InferenceError;
use crate::features::{FeatureRecord, FeatureValue, FEATURE_COLUMNS};

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to read schema {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse schema: {0}")]
    Json(#[from] serde_json::Error),

    #[error("schema has {got} columns, model rows have {expected}")]
    ColumnCount { got: usize, expected: usize },

    #[error("schema column {index} is `{got}`, expected `{expected}`")]
    ColumnName {
        index: usize,
        got: String,
        expected: &'static str,
    },

    #[error("schema column `{column}` must be {expected}")]
    ColumnKind {
        column: String,
        expected: &'static str,
    },

    #[error("schema column `{column}` has invalid scale {scale}")]
    Scale { column: String, scale: f64 },

    #[error("schema column `{column}` has no categories")]
    EmptyCategories { column: String },

    #[error("schema column `{column}` lists category {value:?} twice")]
    DuplicateCategory { column: String, value: String },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnSpec {
    Categorical {
        name: String,
        categories: Vec<String>,
    },
    Numeric {
        name: String,
        #[serde(default)]
        center: f64,
        #[serde(default = "unit_scale")]
        scale: f64,
    },
}

fn unit_scale() -> f64 {
    1.0
}

impl ColumnSpec {
    pub fn name(&self) -> &str {
        match self {
            Self::Categorical { name, .. } | Self::Numeric { name, .. } => name,
        }
    }

    /// Number of encoded slots this column occupies.
    pub fn width(&self) -> usize {
        match self {
            Self::Categorical { categories, .. } => categories.len(),
            Self::Numeric { .. } => 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeatureSchema {
    columns: Vec<ColumnSpec>,
}

impl FeatureSchema {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        let txt = fs::read_to_string(path).map_err(|source| SchemaError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&txt)
    }

    pub fn from_json(txt: &str) -> Result<Self, SchemaError> {
        let schema: Self = serde_json::from_str(txt)?;
        schema.validate()?;
        Ok(schema)
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    /// Length of the encoded input vector.
    pub fn width(&self) -> usize {
        self.columns.iter().map(ColumnSpec::width).sum()
    }

    fn validate(&self) -> Result<(), SchemaError> {
        if self.columns.len() != FEATURE_COLUMNS.len() {
            return Err(SchemaError::ColumnCount {
                got: self.columns.len(),
                expected: FEATURE_COLUMNS.len(),
            });
        }

        // An empty row still carries each column's kind.
        let probe = FeatureRecord::default();

        for (index, (spec, (expected, cell))) in
            self.columns.iter().zip(probe.columns()).enumerate()
        {
            if spec.name() != expected {
                return Err(SchemaError::ColumnName {
                    index,
                    got: spec.name().to_string(),
                    expected,
                });
            }
            match (spec, cell) {
                (ColumnSpec::Categorical { name, categories }, FeatureValue::Text(_)) => {
                    if categories.is_empty() {
                        return Err(SchemaError::EmptyCategories {
                            column: name.clone(),
                        });
                    }
                    let mut seen = HashSet::new();
                    for c in categories {
                        if !seen.insert(c.as_str()) {
                            return Err(SchemaError::DuplicateCategory {
                                column: name.clone(),
                                value: c.clone(),
                            });
                        }
                    }
                }
                (ColumnSpec::Numeric { name, scale, center }, FeatureValue::Number(_)) => {
                    if !scale.is_finite() || *scale == 0.0 || !center.is_finite() {
                        return Err(SchemaError::Scale {
                            column: name.clone(),
                            scale: *scale,
                        });
                    }
                }
                (spec, FeatureValue::Text(_)) => {
                    return Err(SchemaError::ColumnKind {
                        column: spec.name().to_string(),
                        expected: "categorical",
                    })
                }
                (spec, FeatureValue::Number(_)) => {
                    return Err(SchemaError::ColumnKind {
                        column: spec.name().to_string(),
                        expected: "numeric",
                    })
                }
            }
        }
        Ok(())
    }

    /// Encodes one row into the model's input vector.
    pub fn encode(&self, record: &FeatureRecord) -> Result<Vec<f64>, InferenceError> {
        let mut out = Vec::with_capacity(self.width());
        for (spec, (_, cell)) in self.columns.iter().zip(record.columns()) {
            match (spec, cell) {
                (ColumnSpec::Categorical { name, categories }, FeatureValue::Text(value)) => {
                    let hot = categories.iter().position(|c| c == value).ok_or_else(|| {
                        InferenceError::UnknownCategory {
                            column: name.clone(),
                            value: value.to_string(),
                        }
                    })?;
                    out.extend((0..categories.len()).map(|i| if i == hot { 1.0 } else { 0.0 }));
                }
                (ColumnSpec::Numeric { center, scale, .. }, FeatureValue::Number(v)) => {
                    out.push((v - center) / scale);
                }
                (ColumnSpec::Categorical { name, .. }, FeatureValue::Number(_)) => {
                    return Err(InferenceError::ColumnType {
                        column: name.clone(),
                        expected: "text",
                    })
                }
                (ColumnSpec::Numeric { name, .. }, FeatureValue::Text(_)) => {
                    return Err(InferenceError::ColumnType {
                        column: name.clone(),
                        expected: "numeric",
                    })
                }
            }
        }
        Ok(out)
    }
}
