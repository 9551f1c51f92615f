use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::PredictError;

/// Coerced request attributes. Built fresh per call from an untyped payload.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PredictionRequest {
    pub manufacturer: String,
    pub model: String,
    pub year: i32,
    pub mileage: f64,
    pub fuel_type: String,
    pub engine_size: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct PredictionResponse {
    pub predicted_price: i64,
}

impl PredictionRequest {
    /// Extracts and coerces the six fields. Unknown keys are ignored; a missing
    /// or uncoercible field is an error, never a default.
    pub fn from_payload(payload: &Value) -> Result<Self, PredictError> {
        let obj = payload
            .as_object()
            .ok_or_else(|| PredictError::invalid("payload", "must be a JSON object"))?;

        Ok(Self {
            manufacturer: text(obj, "manufacturer")?,
            model: text(obj, "model")?,
            year: integer(obj, "year")?,
            mileage: decimal(obj, "mileage")?,
            fuel_type: text(obj, "fuel_type")?,
            engine_size: decimal(obj, "engine_size")?,
        })
    }
}

fn field<'a>(obj: &'a Map<String, Value>, name: &'static str) -> Result<&'a Value, PredictError> {
    match obj.get(name) {
        None => Err(PredictError::invalid(name, "is required")),
        Some(Value::Null) => Err(PredictError::invalid(name, "must not be null")),
        Some(v) => Ok(v),
    }
}

fn text(obj: &Map<String, Value>, name: &'static str) -> Result<String, PredictError> {
    match field(obj, name)? {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(PredictError::invalid(
            name,
            format!("must be text, got {}", type_name(other)),
        )),
    }
}

fn integer(obj: &Map<String, Value>, name: &'static str) -> Result<i32, PredictError> {
    let wide = match field(obj, name)? {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i
            } else {
                let f = n
                    .as_f64()
                    .ok_or_else(|| PredictError::invalid(name, format!("{n} is not an integer")))?;
                if f.fract() != 0.0 {
                    return Err(PredictError::invalid(name, format!("{n} is not an integer")));
                }
                if f.abs() > f64::from(i32::MAX) {
                    return Err(PredictError::invalid(name, format!("{n} is out of range")));
                }
                f as i64
            }
        }
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| PredictError::invalid(name, format!("{s:?} is not an integer")))?,
        other => {
            return Err(PredictError::invalid(
                name,
                format!("must be an integer, got {}", type_name(other)),
            ))
        }
    };
    i32::try_from(wide).map_err(|_| PredictError::invalid(name, format!("{wide} is out of range")))
}

fn decimal(obj: &Map<String, Value>, name: &'static str) -> Result<f64, PredictError> {
    let v = match field(obj, name)? {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| PredictError::invalid(name, format!("{n} is not a number")))?,
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| PredictError::invalid(name, format!("{s:?} is not a number")))?,
        other => {
            return Err(PredictError::invalid(
                name,
                format!("must be a number, got {}", type_name(other)),
            ))
        }
    };
    if !v.is_finite() {
        return Err(PredictError::invalid(name, "must be finite"));
    }
    Ok(v)
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
