use std::sync::Arc;

use serde_json::Value;

use crate::error::{InferenceError, PredictError};
use crate::features::derive_features;
use crate::model::Predictor;
use crate::types::{PredictionRequest, PredictionResponse};

/// Request-level workflow: coerce, derive, predict, round.
#[derive(Clone)]
pub struct PredictionService {
    predictor: Arc<dyn Predictor>,
}

impl PredictionService {
    pub fn new(predictor: Arc<dyn Predictor>) -> Self {
        Self { predictor }
    }

    pub fn handle(&self, payload: &Value) -> Result<PredictionResponse, PredictError> {
        let req = PredictionRequest::from_payload(payload)?;
        self.predict(&req)
    }

    pub fn predict(&self, req: &PredictionRequest) -> Result<PredictionResponse, PredictError> {
        let row = derive_features(req);
        tracing::debug!(?row, "derived feature row");

        let value = self.predictor.predict(&row)?;
        Ok(PredictionResponse {
            predicted_price: round_price(value)?,
        })
    }
}

/// Rounds half to even, the way the source model's callers did.
fn round_price(value: f64) -> Result<i64, InferenceError> {
    if !value.is_finite() {
        return Err(InferenceError::NonFinite(value));
    }
    let rounded = value.round_ties_even();
    // i64::MAX as f64 rounds up to 2^63, which does not fit
    if rounded < i64::MIN as f64 || rounded >= i64::MAX as f64 {
        return Err(InferenceError::OutOfRange(value));
    }
    Ok(rounded as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureRecord;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct Stub {
        out: Result<f64, &'static str>,
        calls: AtomicUsize,
        last: Mutex<Option<FeatureRecord>>,
    }

    impl Stub {
        fn returning(v: f64) -> Arc<Self> {
            Arc::new(Self {
                out: Ok(v),
                calls: AtomicUsize::new(0),
                last: Mutex::new(None),
            })
        }

        fn failing(msg: &'static str) -> Arc<Self> {
            Arc::new(Self {
                out: Err(msg),
                calls: AtomicUsize::new(0),
                last: Mutex::new(None),
            })
        }
    }

    impl Predictor for Stub {
        fn predict(&self, row: &FeatureRecord) -> Result<f64, InferenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some(row.clone());
            self.out.map_err(|m| InferenceError::Backend(m.to_string()))
        }
    }

    fn payload() -> Value {
        json!({
            "manufacturer": "Toyota",
            "model": "Corolla",
            "year": 2015,
            "mileage": 80000,
            "fuel_type": "Petrol",
            "engine_size": 1.8
        })
    }

    #[test]
    fn returns_rounded_price() {
        let stub = Stub::returning(12345.6);
        let svc = PredictionService::new(stub.clone());
        let out = svc.handle(&payload()).unwrap();
        assert_eq!(out.predicted_price, 12346);
        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn predictor_sees_derived_row() {
        let stub = Stub::returning(1.0);
        let svc = PredictionService::new(stub.clone());
        svc.handle(&payload()).unwrap();
        let row = stub.last.lock().unwrap().clone().unwrap();
        assert_eq!(row.age, 10);
        assert_eq!(row.mileage_per_year, 8000.0);
        assert_eq!(row.vintage, 0);
        assert_eq!(row.fuel_type, "Petrol");
    }

    #[test]
    fn invalid_year_never_reaches_predictor() {
        let stub = Stub::returning(1.0);
        let svc = PredictionService::new(stub.clone());
        let mut p = payload();
        p["year"] = json!("abc");
        let err = svc.handle(&p).unwrap_err();
        assert!(matches!(err, PredictError::InvalidInput { field: "year", .. }));
        assert_eq!(err.kind(), "invalid_input");
        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn missing_mileage_never_reaches_predictor() {
        let stub = Stub::returning(1.0);
        let svc = PredictionService::new(stub.clone());
        let mut p = payload();
        p.as_object_mut().unwrap().remove("mileage");
        let err = svc.handle(&p).unwrap_err();
        assert!(matches!(err, PredictError::InvalidInput { field: "mileage", .. }));
        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn predictor_failure_propagates() {
        let svc = PredictionService::new(Stub::failing("unknown category"));
        let err = svc.handle(&payload()).unwrap_err();
        assert!(matches!(err, PredictError::InferenceFailure(_)));
        assert_eq!(err.kind(), "inference_failure");
        assert!(err.to_string().contains("unknown category"));
    }

    #[test]
    fn non_finite_prediction_is_a_failure() {
        for v in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let svc = PredictionService::new(Stub::returning(v));
            assert!(matches!(
                svc.handle(&payload()),
                Err(PredictError::InferenceFailure(InferenceError::NonFinite(_)))
            ));
        }
    }

    #[test]
    fn rounding_is_half_to_even() {
        assert_eq!(round_price(2.5).unwrap(), 2);
        assert_eq!(round_price(3.5).unwrap(), 4);
        assert_eq!(round_price(-2.5).unwrap(), -2);
        assert_eq!(round_price(9999.49).unwrap(), 9999);
        assert_eq!(round_price(9999.51).unwrap(), 10000);
    }

    #[test]
    fn huge_prediction_is_out_of_range() {
        assert!(matches!(round_price(1e30), Err(InferenceError::OutOfRange(_))));
    }
}
