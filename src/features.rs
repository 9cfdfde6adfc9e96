//! Flower measurements accepted by the prediction endpoints.
//!
//! Request bodies are validated field by field so that a client gets a
//! precise message (`missing field: petal_width`) instead of a generic
//! deserialization failure.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumIter, IntoEnumIterator, IntoStaticStr};

use crate::error::ValidationError;

/// Number of input features the service accepts.
pub const FEATURE_COUNT: usize = 4;

/// One of the four model inputs, in canonical model order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FeatureField {
    SepalLength,
    SepalWidth,
    PetalLength,
    PetalWidth,
}

impl FeatureField {
    /// JSON key / column name for this field.
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// All field names in model order.
    pub fn names() -> Vec<String> {
        Self::iter().map(|f| f.to_string()).collect()
    }
}

/// A complete set of measurements, in centimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurements {
    pub sepal_length: f64,
    pub sepal_width: f64,
    pub petal_length: f64,
    pub petal_width: f64,
}

impl Measurements {
    /// Values in model input order.
    pub fn as_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.sepal_length,
            self.sepal_width,
            self.petal_length,
            self.petal_width,
        ]
    }

    /// Read a single field.
    pub fn get(&self, field: FeatureField) -> f64 {
        match field {
            FeatureField::SepalLength => self.sepal_length,
            FeatureField::SepalWidth => self.sepal_width,
            FeatureField::PetalLength => self.petal_length,
            FeatureField::PetalWidth => self.petal_width,
        }
    }

    /// Overwrite a single field.
    pub fn set(&mut self, field: FeatureField, value: f64) {
        match field {
            FeatureField::SepalLength => self.sepal_length = value,
            FeatureField::SepalWidth => self.sepal_width = value,
            FeatureField::PetalLength => self.petal_length = value,
            FeatureField::PetalWidth => self.petal_width = value,
        }
    }

    /// Validate a JSON body that must carry all four fields.
    pub fn from_json(body: &Value) -> Result<Self, ValidationError> {
        let object = as_object(body)?;
        let mut values = [0.0; FEATURE_COUNT];
        for (slot, field) in values.iter_mut().zip(FeatureField::iter()) {
            *slot = match object.get(field.name()) {
                Some(value) => number(field, value)?,
                None => return Err(ValidationError::MissingField(field)),
            };
        }
        let [sepal_length, sepal_width, petal_length, petal_width] = values;
        Ok(Self {
            sepal_length,
            sepal_width,
            petal_length,
            petal_width,
        })
    }
}

/// A subset of measurements used by partial updates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MeasurementsPatch {
    pub sepal_length: Option<f64>,
    pub sepal_width: Option<f64>,
    pub petal_length: Option<f64>,
    pub petal_width: Option<f64>,
}

impl MeasurementsPatch {
    /// Validate a JSON body where every field is optional.
    ///
    /// An explicit `null` is rejected because the stored columns are non-null.
    pub fn from_json(body: &Value) -> Result<Self, ValidationError> {
        let object = as_object(body)?;
        let mut patch = Self::default();
        for field in FeatureField::iter() {
            if let Some(value) = object.get(field.name()) {
                let value = number(field, value)?;
                match field {
                    FeatureField::SepalLength => patch.sepal_length = Some(value),
                    FeatureField::SepalWidth => patch.sepal_width = Some(value),
                    FeatureField::PetalLength => patch.petal_length = Some(value),
                    FeatureField::PetalWidth => patch.petal_width = Some(value),
                }
            }
        }
        Ok(patch)
    }

    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        self.sepal_length.is_none()
            && self.sepal_width.is_none()
            && self.petal_length.is_none()
            && self.petal_width.is_none()
    }

    /// Copy the present fields over `target`.
    pub fn apply(&self, target: &mut Measurements) {
        let updates = [
            (FeatureField::SepalLength, self.sepal_length),
            (FeatureField::SepalWidth, self.sepal_width),
            (FeatureField::PetalLength, self.petal_length),
            (FeatureField::PetalWidth, self.petal_width),
        ];
        for (field, value) in updates {
            if let Some(value) = value {
                target.set(field, value);
            }
        }
    }
}

fn as_object(body: &Value) -> Result<&Map<String, Value>, ValidationError> {
    body.as_object().ok_or(ValidationError::NotAnObject)
}

fn number(field: FeatureField, value: &Value) -> Result<f64, ValidationError> {
    match value.as_f64() {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(ValidationError::WrongType {
            field,
            found: json_type(value),
        }),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn field_names_are_snake_case_in_model_order() {
        assert_eq!(
            FeatureField::names(),
            vec!["sepal_length", "sepal_width", "petal_length", "petal_width"]
        );
        assert_eq!(FeatureField::PetalWidth.to_string(), "petal_width");
    }

    #[test]
    fn full_body_parses() {
        let body = json!({
            "sepal_length": 5.1,
            "sepal_width": 3.5,
            "petal_length": 1.4,
            "petal_width": 0.2,
            "comment": "ignored"
        });
        let m = Measurements::from_json(&body).unwrap();
        assert_eq!(m.as_array(), [5.1, 3.5, 1.4, 0.2]);
    }

    #[test]
    fn integers_are_accepted_as_numbers() {
        let body = json!({"sepal_length": 5, "sepal_width": 3, "petal_length": 1, "petal_width": 0});
        let m = Measurements::from_json(&body).unwrap();
        assert_eq!(m.sepal_length, 5.0);
    }

    #[test]
    fn missing_field_is_reported_by_name() {
        let body = json!({"sepal_length": 5.1, "sepal_width": 3.5, "petal_length": 1.4});
        let err = Measurements::from_json(&body).unwrap_err();
        assert_eq!(err, ValidationError::MissingField(FeatureField::PetalWidth));
        assert_eq!(err.to_string(), "missing field: petal_width");
    }

    #[test]
    fn string_value_is_a_type_error() {
        let body = json!({
            "sepal_length": "5.1",
            "sepal_width": 3.5,
            "petal_length": 1.4,
            "petal_width": 0.2
        });
        let err = Measurements::from_json(&body).unwrap_err();
        assert_eq!(
            err,
            ValidationError::WrongType {
                field: FeatureField::SepalLength,
                found: "string"
            }
        );
    }

    #[test]
    fn non_object_body_is_rejected() {
        let err = Measurements::from_json(&json!([5.1, 3.5, 1.4, 0.2])).unwrap_err();
        assert_eq!(err, ValidationError::NotAnObject);
    }

    #[test]
    fn patch_accepts_subset_and_rejects_null() {
        let patch = MeasurementsPatch::from_json(&json!({"petal_width": 1.8})).unwrap();
        assert_eq!(patch.petal_width, Some(1.8));
        assert_eq!(patch.sepal_length, None);
        assert!(!patch.is_empty());

        let err = MeasurementsPatch::from_json(&json!({"petal_width": null})).unwrap_err();
        assert_eq!(
            err,
            ValidationError::WrongType {
                field: FeatureField::PetalWidth,
                found: "null"
            }
        );
    }

    #[test]
    fn empty_patch_changes_nothing() {
        let patch = MeasurementsPatch::from_json(&json!({})).unwrap();
        assert!(patch.is_empty());

        let mut m = Measurements {
            sepal_length: 1.0,
            sepal_width: 2.0,
            petal_length: 3.0,
            petal_width: 4.0,
        };
        let before = m;
        patch.apply(&mut m);
        assert_eq!(m, before);
    }

    #[test]
    fn patch_apply_overwrites_only_present_fields() {
        let mut m = Measurements {
            sepal_length: 1.0,
            sepal_width: 2.0,
            petal_length: 3.0,
            petal_width: 4.0,
        };
        let patch = MeasurementsPatch {
            sepal_width: Some(9.0),
            petal_width: Some(8.0),
            ..Default::default()
        };
        patch.apply(&mut m);
        assert_eq!(m.as_array(), [1.0, 9.0, 3.0, 8.0]);
        assert_eq!(m.get(FeatureField::SepalWidth), 9.0);
    }
}
