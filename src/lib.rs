//! Car price prediction service.
//!
//! Raw vehicle attributes are coerced into a [`types::PredictionRequest`],
//! expanded into a [`features::FeatureRecord`] and handed to a loaded
//! [`model::Predictor`].

pub mod api;
pub mod config;
pub mod error;
pub mod features;
pub mod handler;
pub mod model;
pub mod schema;
pub mod types;

pub use error::{InferenceError, PredictError};
pub use features::{derive_features, FeatureRecord, CURRENT_YEAR, FEATURE_COLUMNS};
pub use handler::PredictionService;
pub use model::Predictor;
pub use types::{PredictionRequest, PredictionResponse};
