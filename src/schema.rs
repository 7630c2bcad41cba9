//! Declarative resource schemas and the generic payload reader built on them.
//!
//! Each resource lists its wire fields once in a [`ResourceSchema`]. Incoming
//! bodies go through [`ResourceSchema::payload`], which drops read-only and
//! unknown keys and reports missing required fields; the returned [`Payload`]
//! then hands out typed values while collecting per-field errors.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{ApiError, FieldErrors};
use crate::slug;

pub const REQUIRED: &str = "This field is required.";
pub const NOT_NULL: &str = "This field may not be null.";
pub const NOT_BLANK: &str = "This field may not be blank.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    /// Writable; must be present on create and full update.
    Required,
    /// Writable; may be omitted.
    Optional,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub access: Access,
}

impl FieldSpec {
    pub const fn read_only(name: &'static str) -> Self {
        Self {
            name,
            access: Access::ReadOnly,
        }
    }

    pub const fn required(name: &'static str) -> Self {
        Self {
            name,
            access: Access::Required,
        }
    }

    pub const fn optional(name: &'static str) -> Self {
        Self {
            name,
            access: Access::Optional,
        }
    }
}

#[derive(Debug)]
pub struct ResourceSchema {
    pub fields: &'static [FieldSpec],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Create,
    /// PUT: same presence rules as create.
    Replace,
    /// PATCH: nothing required.
    Partial,
}

impl WriteMode {
    pub fn is_partial(self) -> bool {
        self == WriteMode::Partial
    }
}

impl ResourceSchema {
    /// Field names in representation order.
    #[cfg(test)]
    pub fn field_names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.name).collect()
    }

    pub fn writable(&self, name: &str) -> bool {
        self.fields
            .iter()
            .any(|f| f.name == name && f.access != Access::ReadOnly)
    }

    pub fn payload(&self, body: Value, mode: WriteMode) -> Result<Payload, ApiError> {
        let object = match body {
            Value::Object(map) => map,
            other => {
                return Err(ApiError::Validation(FieldErrors::single(
                    "non_field_errors",
                    format!(
                        "Invalid data. Expected a dictionary, but got {}.",
                        json_type(&other)
                    ),
                )))
            }
        };

        let values: Map<String, Value> = object
            .into_iter()
            .filter(|(key, _)| self.writable(key))
            .collect();

        let mut errors = FieldErrors::new();
        if !mode.is_partial() {
            for field in self.fields.iter().filter(|f| f.access == Access::Required) {
                if !values.contains_key(field.name) {
                    errors.add(field.name, REQUIRED);
                }
            }
        }

        Ok(Payload { values, errors })
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

/// Cleaned request body. Readers return `None` when the field is absent or
/// invalid; invalid values are recorded and surface from [`Payload::finish`].
#[derive(Debug)]
pub struct Payload {
    values: Map<String, Value>,
    errors: FieldErrors,
}

impl Payload {
    #[cfg(test)]
    pub fn has(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn has_error(&self, name: &str) -> bool {
        self.errors.contains(name)
    }

    /// Slug derived from `source`; records an error on `name` when nothing
    /// usable remains (e.g. a name made only of punctuation).
    pub fn derive_slug(&mut self, name: &str, source: &str, max_len: usize) -> Option<String> {
        let derived = slug::derive(source, max_len);
        if derived.is_empty() {
            self.errors.add(
                name,
                "Could not derive a slug from the name; provide one explicitly.",
            );
            return None;
        }
        Some(derived)
    }

    /// Trimmed string. `allow_blank` mirrors optional text fields.
    pub fn string(
        &mut self,
        name: &str,
        max_len: Option<usize>,
        allow_blank: bool,
    ) -> Option<String> {
        let value = self.values.get(name)?;
        let text = match value {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            Value::Bool(_) | Value::Array(_) | Value::Object(_) => {
                self.errors.add(name, "Not a valid string.");
                return None;
            }
            Value::Null => {
                self.errors.add(name, NOT_NULL);
                return None;
            }
        };
        if text.is_empty() && !allow_blank {
            self.errors.add(name, NOT_BLANK);
            return None;
        }
        if let Some(max) = max_len {
            if text.chars().count() > max {
                self.errors
                    .add(name, format!("Ensure this field has no more than {max} characters."));
                return None;
            }
        }
        Some(text)
    }

    /// Slug field. `Some("")` means the caller asked for a derived slug.
    pub fn slug(&mut self, name: &str, max_len: usize) -> Option<String> {
        let text = self.string(name, Some(max_len), true)?;
        if !text.is_empty() && !slug::is_valid(&text) {
            self.errors.add(
                name,
                "Enter a valid \"slug\" consisting of letters, numbers, underscores or hyphens.",
            );
            return None;
        }
        Some(text)
    }

    pub fn boolean(&mut self, name: &str) -> Option<bool> {
        let value = self.values.get(name)?;
        let parsed = match value {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => match n.as_i64() {
                Some(1) => Some(true),
                Some(0) => Some(false),
                _ => None,
            },
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" | "t" | "y" => Some(true),
                "false" | "0" | "no" | "off" | "f" | "n" => Some(false),
                _ => None,
            },
            _ => None,
        };
        if parsed.is_none() {
            self.errors.add(name, "Must be a valid boolean.");
        }
        parsed
    }

    /// Integer within `[min, i32::MAX]`.
    pub fn integer(&mut self, name: &str, min: i32) -> Option<i32> {
        let value = self.values.get(name)?;
        let parsed = match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        };
        let Some(number) = parsed else {
            self.errors.add(name, "A valid integer is required.");
            return None;
        };
        if number < i64::from(min) {
            self.errors.add(
                name,
                format!("Ensure this value is greater than or equal to {min}."),
            );
            return None;
        }
        match i32::try_from(number) {
            Ok(n) => Some(n),
            Err(_) => {
                self.errors.add(
                    name,
                    format!("Ensure this value is less than or equal to {}.", i32::MAX),
                );
                None
            }
        }
    }

    /// Fixed-point decimal with at most `max_digits` digits, `places` of them
    /// fractional, and a lower bound. Returned rescaled to `places`.
    pub fn decimal(
        &mut self,
        name: &str,
        max_digits: u32,
        places: u32,
        min: Decimal,
    ) -> Option<Decimal> {
        let value = self.values.get(name)?;
        let parsed = match value {
            Value::String(s) => parse_decimal(s.trim()),
            Value::Number(n) => parse_decimal(&n.to_string()),
            _ => None,
        };
        let Some(mut number) = parsed else {
            self.errors.add(name, "A valid number is required.");
            return None;
        };

        number = number.normalize();
        let fractional = number.scale();
        let whole_digits = number.trunc().abs().to_string().trim_start_matches('0').len() as u32;

        let mut ok = true;
        if whole_digits + fractional > max_digits {
            self.errors.add(
                name,
                format!("Ensure that there are no more than {max_digits} digits in total."),
            );
            ok = false;
        } else if fractional > places {
            self.errors.add(
                name,
                format!("Ensure that there are no more than {places} decimal places."),
            );
            ok = false;
        } else if whole_digits > max_digits - places {
            self.errors.add(
                name,
                format!(
                    "Ensure that there are no more than {} digits before the decimal point.",
                    max_digits - places
                ),
            );
            ok = false;
        }
        if number < min {
            self.errors.add(
                name,
                format!("Ensure this value is greater than or equal to {min}."),
            );
            ok = false;
        }
        if !ok {
            return None;
        }
        number.rescale(places);
        Some(number)
    }

    /// Primary-key reference to another resource.
    pub fn reference(&mut self, name: &str) -> Option<Uuid> {
        let value = self.values.get(name)?;
        match value {
            Value::String(s) => match Uuid::parse_str(s.trim()) {
                Ok(id) => Some(id),
                Err(_) => {
                    self.errors
                        .add(name, format!("Invalid pk \"{s}\" - object does not exist."));
                    None
                }
            },
            Value::Null => {
                self.errors.add(name, NOT_NULL);
                None
            }
            other => {
                let kind = json_type(other);
                self.errors
                    .add(name, format!("Incorrect type. Expected pk value, received {kind}."));
                None
            }
        }
    }

    pub fn finish(self) -> Result<(), ApiError> {
        self.errors.into_result()
    }
}

/// Unwraps a value that a successful [`Payload::finish`] guarantees.
pub fn present<T>(value: Option<T>, name: &str) -> Result<T, ApiError> {
    value.ok_or_else(|| ApiError::Validation(FieldErrors::single(name, REQUIRED)))
}

fn parse_decimal(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    static SCHEMA: ResourceSchema = ResourceSchema {
        fields: &[
            FieldSpec::read_only("id"),
            FieldSpec::required("name"),
            FieldSpec::optional("note"),
            FieldSpec::read_only("created_at"),
        ],
    };

    fn validation(err: ApiError) -> FieldErrors {
        match err {
            ApiError::Validation(errors) => errors,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn read_only_and_unknown_keys_are_dropped() {
        let mut payload = SCHEMA
            .payload(
                json!({"id": "x", "name": "n", "created_at": "t", "bogus": 1}),
                WriteMode::Create,
            )
            .unwrap();
        assert!(!payload.has("id"));
        assert!(!payload.has("created_at"));
        assert!(!payload.has("bogus"));
        assert_eq!(payload.string("name", None, false).as_deref(), Some("n"));
        payload.finish().unwrap();
    }

    #[test]
    fn required_fields_only_on_full_writes() {
        let payload = SCHEMA.payload(json!({"note": "x"}), WriteMode::Create).unwrap();
        let errors = validation(payload.finish().unwrap_err());
        assert_eq!(errors.messages("name"), [REQUIRED.to_string()]);

        let payload = SCHEMA.payload(json!({"note": "x"}), WriteMode::Replace).unwrap();
        assert!(payload.finish().is_err());

        let payload = SCHEMA.payload(json!({"note": "x"}), WriteMode::Partial).unwrap();
        assert!(payload.finish().is_ok());
    }

    #[test]
    fn non_object_body_is_rejected() {
        let err = SCHEMA.payload(json!([1, 2]), WriteMode::Create).unwrap_err();
        let errors = validation(err);
        assert!(errors.messages("non_field_errors")[0].contains("got list"));
    }

    #[test]
    fn strings_are_trimmed_and_checked() {
        let mut payload = SCHEMA
            .payload(json!({"name": "   ", "note": "  hello "}), WriteMode::Create)
            .unwrap();
        assert_eq!(payload.string("name", None, false), None);
        assert_eq!(payload.string("note", Some(3), true), None);
        let errors = validation(payload.finish().unwrap_err());
        assert_eq!(errors.messages("name"), [NOT_BLANK.to_string()]);
        assert!(errors.messages("note")[0].contains("no more than 3 characters"));
    }

    fn decimal_of(value: Value) -> Result<Option<Decimal>, FieldErrors> {
        let mut payload = Payload {
            values: [("price".to_string(), value)].into_iter().collect(),
            errors: FieldErrors::new(),
        };
        let parsed = payload.decimal("price", 10, 2, Decimal::new(1, 2));
        payload.finish().map(|_| parsed).map_err(validation)
    }

    #[test]
    fn decimal_minimum() {
        let errors = decimal_of(json!("0.00")).unwrap_err();
        assert_eq!(
            errors.messages("price"),
            ["Ensure this value is greater than or equal to 0.01.".to_string()]
        );
        let ok = decimal_of(json!("0.01")).unwrap().unwrap();
        assert_eq!(ok.to_string(), "0.01");
    }

    #[test]
    fn decimal_accepts_numbers_and_rescales() {
        let from_number = decimal_of(json!(12.5)).unwrap().unwrap();
        assert_eq!(from_number.to_string(), "12.50");
        let from_int = decimal_of(json!(3)).unwrap().unwrap();
        assert_eq!(from_int.to_string(), "3.00");
        let trailing = decimal_of(json!("4.500")).unwrap().unwrap();
        assert_eq!(trailing.to_string(), "4.50");
    }

    #[test]
    fn decimal_rejects_precision_overflow() {
        let errors = decimal_of(json!("1.005")).unwrap_err();
        assert!(errors.messages("price")[0].contains("2 decimal places"));
        let errors = decimal_of(json!("123456789.00")).unwrap_err();
        assert!(errors.messages("price")[0].contains("8 digits before the decimal point"));
        let errors = decimal_of(json!("abc")).unwrap_err();
        assert_eq!(errors.messages("price"), ["A valid number is required.".to_string()]);
    }

    #[test]
    fn integer_and_boolean_readers() {
        let mut payload = Payload {
            values: json!({"stock": -1, "count": "7", "flag": "false", "bad": "maybe"})
                .as_object()
                .cloned()
                .unwrap(),
            errors: FieldErrors::new(),
        };
        assert_eq!(payload.integer("stock", 0), None);
        assert_eq!(payload.integer("count", 0), Some(7));
        assert_eq!(payload.boolean("flag"), Some(false));
        assert_eq!(payload.boolean("bad"), None);
        assert_eq!(payload.integer("missing", 0), None);
        let errors = validation(payload.finish().unwrap_err());
        assert!(errors.contains("stock"));
        assert!(errors.contains("bad"));
        assert!(!errors.contains("missing"));
    }

    #[test]
    fn reference_reader() {
        let id = Uuid::new_v4();
        let mut payload = Payload {
            values: json!({"good": id.to_string(), "bad": "nope", "num": 5})
                .as_object()
                .cloned()
                .unwrap(),
            errors: FieldErrors::new(),
        };
        assert_eq!(payload.reference("good"), Some(id));
        assert_eq!(payload.reference("bad"), None);
        assert_eq!(payload.reference("num"), None);
        let errors = validation(payload.finish().unwrap_err());
        assert_eq!(
            errors.messages("bad"),
            ["Invalid pk \"nope\" - object does not exist.".to_string()]
        );
        assert!(errors.messages("num")[0].contains("received number"));
    }

    #[test]
    fn slug_reader_validates_syntax() {
        let mut payload = Payload {
            values: json!({"a": "ok-slug", "b": "not ok", "c": ""})
                .as_object()
                .cloned()
                .unwrap(),
            errors: FieldErrors::new(),
        };
        assert_eq!(payload.slug("a", 10).as_deref(), Some("ok-slug"));
        assert_eq!(payload.slug("b", 10), None);
        assert_eq!(payload.slug("c", 10).as_deref(), Some(""));
        assert!(payload.has_error("b"));
    }

    #[test]
    fn derive_slug_rejects_empty_result() {
        let mut payload = SCHEMA.payload(json!({}), WriteMode::Partial).unwrap();
        assert_eq!(
            payload.derive_slug("slug", "Home Appliances", 100).as_deref(),
            Some("home-appliances")
        );
        assert_eq!(payload.derive_slug("slug", "???", 100), None);
        assert!(payload.has_error("slug"));
    }
}
