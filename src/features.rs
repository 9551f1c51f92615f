use serde::Serialize;

use crate::types::PredictionRequest;

/// Reference year the model was trained against.
///
/// Fixed rather than taken from the wall clock, so ages drift as real time
/// moves past it. Changing it changes every prediction; do so only together
/// with a retrained model.
pub const CURRENT_YEAR: i32 = 2025;

/// Vehicles strictly older than this are flagged as vintage.
pub const VINTAGE_AGE: i64 = 20;

/// Column names and order the model was trained on.
pub const FEATURE_COLUMNS: [&str; 9] = [
    "Manufacturer",
    "Model",
    "Year",
    "Mileage",
    "Fuel type",
    "Engine size",
    "age",
    "mileage_per_year",
    "vintage",
];

/// Single row handed to the predictor. Field order matches [`FEATURE_COLUMNS`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeatureRecord {
    #[serde(rename = "Manufacturer")]
    pub manufacturer: String,
    #[serde(rename = "Model")]
    pub model: String,
    #[serde(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Mileage")]
    pub mileage: f64,
    #[serde(rename = "Fuel type")]
    pub fuel_type: String,
    #[serde(rename = "Engine size")]
    pub engine_size: f64,
    pub age: i64,
    pub mileage_per_year: f64,
    pub vintage: u8,
}

/// A cell of the feature row, keyed by position in [`FEATURE_COLUMNS`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureValue<'a> {
    Text(&'a str),
    Number(f64),
}

impl FeatureRecord {
    /// Cells in column order.
    pub fn values(&self) -> [FeatureValue<'_>; 9] {
        [
            FeatureValue::Text(&self.manufacturer),
            FeatureValue::Text(&self.model),
            FeatureValue::Number(self.year as f64),
            FeatureValue::Number(self.mileage),
            FeatureValue::Text(&self.fuel_type),
            FeatureValue::Number(self.engine_size),
            FeatureValue::Number(self.age as f64),
            FeatureValue::Number(self.mileage_per_year),
            FeatureValue::Number(self.vintage as f64),
        ]
    }

    /// Pairs each column name with its cell.
    pub fn columns(&self) -> impl Iterator<Item = (&'static str, FeatureValue<'_>)> {
        FEATURE_COLUMNS.into_iter().zip(self.values())
    }
}

pub fn derive_features(req: &PredictionRequest) -> FeatureRecord {
    let age = (i64::from(CURRENT_YEAR) - i64::from(req.year)).max(0);
    // a current-year car's mileage counts as its annual rate
    let mileage_per_year = if age > 0 {
        req.mileage / age as f64
    } else {
        req.mileage
    };
    let vintage = u8::from(age > VINTAGE_AGE);

    FeatureRecord {
        manufacturer: req.manufacturer.clone(),
        model: req.model.clone(),
        year: req.year,
        mileage: req.mileage,
        fuel_type: req.fuel_type.clone(),
        engine_size: req.engine_size,
        age,
        mileage_per_year,
        vintage,
    }
}
