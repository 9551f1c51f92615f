use std::{fs, path::Path, sync::Arc};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::error::InferenceError;
use crate::features::FeatureRecord;
use crate::schema::FeatureSchema;

/// Single-row inference over a loaded, read-only model.
pub trait Predictor: Send + Sync {
    fn predict(&self, row: &FeatureRecord) -> Result<f64, InferenceError>;
}

/// Loads the predictor matching the artifact's extension: `.pt`/`.ts` for
/// TorchScript, anything else is read as a linear model export.
pub fn load(model_path: &Path, meta_path: &Path) -> Result<Arc<dyn Predictor>> {
    let schema = FeatureSchema::load(meta_path)
        .with_context(|| format!("failed to load schema {}", meta_path.display()))?;
    tracing::info!(
        columns = schema.columns().len(),
        width = schema.width(),
        "loaded feature schema"
    );

    let ext = model_path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    match ext {
        "pt" | "ts" => load_torch(model_path, schema),
        _ => Ok(Arc::new(LinearModel::load(model_path, schema)?)),
    }
}

#[cfg(feature = "torch")]
fn load_torch(model_path: &Path, schema: FeatureSchema) -> Result<Arc<dyn Predictor>> {
    Ok(Arc::new(torch::TorchModel::load(model_path, schema)?))
}

#[cfg(not(feature = "torch"))]
fn load_torch(model_path: &Path, _schema: FeatureSchema) -> Result<Arc<dyn Predictor>> {
    bail!(
        "{} is a TorchScript model but this build lacks the `torch` feature",
        model_path.display()
    )
}

#[derive(Deserialize)]
struct LinearJson {
    intercept: f64,
    coefficients: Vec<f64>,
}

/// Linear regression over the encoded feature vector.
pub struct LinearModel {
    schema: FeatureSchema,
    intercept: f64,
    coefficients: Vec<f64>,
}

impl LinearModel {
    pub fn new(schema: FeatureSchema, intercept: f64, coefficients: Vec<f64>) -> Result<Self> {
        if coefficients.len() != schema.width() {
            bail!(
                "model has {} coefficients, schema encodes {} features",
                coefficients.len(),
                schema.width()
            );
        }
        if !intercept.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
            bail!("model weights must be finite");
        }
        Ok(Self {
            schema,
            intercept,
            coefficients,
        })
    }

    pub fn load(path: &Path, schema: FeatureSchema) -> Result<Self> {
        let txt = fs::read_to_string(path)
            .with_context(|| format!("failed to read model at {}", path.display()))?;
        let raw: LinearJson = serde_json::from_str(&txt)
            .with_context(|| format!("failed to parse model {}", path.display()))?;
        let model = Self::new(schema, raw.intercept, raw.coefficients)?;
        tracing::info!(path = %path.display(), "loaded linear model");
        Ok(model)
    }
}

impl Predictor for LinearModel {
    fn predict(&self, row: &FeatureRecord) -> Result<f64, InferenceError> {
        let x = self.schema.encode(row)?;
        if x.len() != self.coefficients.len() {
            return Err(InferenceError::FeatureLength {
                got: x.len(),
                expected: self.coefficients.len(),
            });
        }
        let y = self.intercept
            + x.iter()
                .zip(&self.coefficients)
                .map(|(xi, wi)| xi * wi)
                .sum::<f64>();
        Ok(y)
    }
}

#[cfg(feature = "torch")]
mod torch {
    use std::path::Path;

    use anyhow::{bail, Context, Result};
    use tch::{kind::Kind, CModule, Device, Tensor};

    use super::Predictor;
    use crate::error::InferenceError;
    use crate::features::FeatureRecord;
    use crate::schema::FeatureSchema;

    /// TorchScript regressor taking `[1, width]` and returning one value.
    pub struct TorchModel {
        model: CModule,
        device: Device,
        schema: FeatureSchema,
    }

    impl TorchModel {
        pub fn load(model_path: &Path, schema: FeatureSchema) -> Result<Self> {
            let device = Device::Cpu;
            let model = CModule::load_on_device(model_path, device)
                .with_context(|| format!("failed to load TorchScript {}", model_path.display()))?;

            // Probe with a zero row so a shape mismatch fails at startup.
            let width = schema.width() as i64;
            let dummy = Tensor::zeros([1, width], (Kind::Float, device));
            let out = tch::no_grad(|| model.forward_ts(&[dummy]))?;
            if out.numel() != 1 {
                bail!("unexpected model output size: {:?}", out.size());
            }
            tracing::info!(path = %model_path.display(), width, "warmup forward ok");

            Ok(Self {
                model,
                device,
                schema,
            })
        }
    }

    impl Predictor for TorchModel {
        fn predict(&self, row: &FeatureRecord) -> Result<f64, InferenceError> {
            let x: Vec<f32> = self
                .schema
                .encode(row)?
                .into_iter()
                .map(|v| v as f32)
                .collect();
            let width = self.schema.width();
            if x.len() != width {
                return Err(InferenceError::FeatureLength {
                    got: x.len(),
                    expected: width,
                });
            }

            let input = Tensor::from_slice(&x)
                .reshape([1, width as i64])
                .to_device(self.device);
            let out = tch::no_grad(|| self.model.forward_ts(&[input]))
                .map_err(|e| InferenceError::Backend(e.to_string()))?;
            if out.numel() != 1 {
                return Err(InferenceError::Backend(format!(
                    "unexpected model output size: {:?}",
                    out.size()
                )));
            }
            out.reshape([1])
                .to_kind(Kind::Double)
                .f_double_value(&[0])
                .map_err(|e| InferenceError::Backend(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::derive_features;
    use crate::schema::tests::schema_json;
    use crate::types::PredictionRequest;

    fn schema() -> FeatureSchema {
        FeatureSchema::from_json(&schema_json().to_string()).unwrap()
    }

    fn row(manufacturer: &str) -> FeatureRecord {
        derive_features(&PredictionRequest {
            manufacturer: manufacturer.into(),
            model: "Corolla".into(),
            year: 2015,
            mileage: 80000.0,
            fuel_type: "Petrol".into(),
            engine_size: 1.8,
        })
    }

    fn weights() -> Vec<f64> {
        // BMW Ford Toyota | 3er Corolla Focus | Year Mileage | Diesel Petrol | Engine age mpy vintage
        vec![
            5000.0, 1000.0, 2000.0, 4000.0, 500.0, 300.0, 1000.0, -50.0, 0.0, -200.0, 1500.0,
            -100.0, -20.0, 3000.0,
        ]
    }

    #[test]
    fn linear_prediction_is_dot_product() {
        let m = LinearModel::new(schema(), 10000.0, weights()).unwrap();
        // 10000 + 2000 + 500 + 1.5*1000 + 80*-50 - 200 + 1.8*1500 + 10*-100 + 8*-20
        let y = m.predict(&row("Toyota")).unwrap();
        assert!((y - 11340.0).abs() < 1e-9, "got {y}");
    }

    #[test]
    fn linear_prediction_is_deterministic() {
        let m = LinearModel::new(schema(), 10000.0, weights()).unwrap();
        let a = m.predict(&row("Ford")).unwrap();
        let b = m.predict(&row("Ford")).unwrap();
        assert_eq!(a.to_bits(), b.to_bits());
    }

    #[test]
    fn unseen_manufacturer_fails() {
        let m = LinearModel::new(schema(), 0.0, weights()).unwrap();
        assert!(matches!(
            m.predict(&row("Skoda")),
            Err(InferenceError::UnknownCategory { .. })
        ));
    }

    #[test]
    fn coefficient_count_must_match_schema() {
        let mut w = weights();
        w.pop();
        assert!(LinearModel::new(schema(), 0.0, w).is_err());
    }

    #[test]
    fn non_finite_weights_are_rejected() {
        assert!(LinearModel::new(schema(), f64::NAN, weights()).is_err());
    }

    #[test]
    fn load_reads_schema_and_weights() {
        let dir = tempfile::tempdir().unwrap();
        let meta = dir.path().join("meta.json");
        let model = dir.path().join("model.json");
        fs::write(&meta, schema_json().to_string()).unwrap();
        fs::write(
            &model,
            serde_json::json!({ "intercept": 10000.0, "coefficients": weights() }).to_string(),
        )
        .unwrap();

        let p = load(&model, &meta).unwrap();
        let y = p.predict(&row("Toyota")).unwrap();
        assert!((y - 11340.0).abs() < 1e-9);
    }

    #[cfg(not(feature = "torch"))]
    #[test]
    fn torchscript_needs_feature() {
        let dir = tempfile::tempdir().unwrap();
        let meta = dir.path().join("meta.json");
        fs::write(&meta, schema_json().to_string()).unwrap();
        let err = load(&dir.path().join("model.pt"), &meta).err().unwrap();
        assert!(err.to_string().contains("torch"));
    }
}
