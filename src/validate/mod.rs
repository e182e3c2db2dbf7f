//! Declarative parameter validation.
//!
//! A [`Validation`] is an ordered list of [`ValidationRule`]s attached to a
//! route. Before the handler runs, each rule in turn:
//!
//! 1. reads its field from the parameters, or from a request header when the
//!    field is spelled `X-Header-Name`,
//! 2. substitutes its default when the value is missing or empty,
//! 3. converts the value to the declared [`ValueType`],
//! 4. evaluates its conditions.
//!
//! The first failing rule stops the pipeline with a [`ValidationError`] that
//! the dispatcher answers with `400 Bad Request`.
//!
//! ```rust
//! use httpdispatch::{Params, Validation};
//! use hyper::HeaderMap;
//!
//! let validation = Validation::from_triples(&[
//!     ("name", "string", "not null, max 32"),
//!     ("age", "integer", "range(0, 150)"),
//!     ("lang", "string", "default en"),
//! ])?;
//!
//! let mut params = Params::new();
//! params.insert("name", "alice");
//! params.insert("age", "31");
//!
//! let checked = validation.execute(&params, &HeaderMap::new()).unwrap();
//! assert_eq!(checked.get("age"), Some(&serde_json::json!(31)));
//! assert_eq!(checked.get_str("lang"), Some("en"));
//! # Ok::<(), httpdispatch::ConfigError>(())
//! ```

mod condition;
mod value;

pub use condition::Conditions;
pub use value::ValueType;

use crate::error::{ConfigError, ValidationError};
use crate::params::{self, Params};

use condition::render;
use hyper::HeaderMap;
use serde_json::Value;

const CONVERSION_MESSAGE: &str = "\"{0}\" is not a {1} format.";

/// One validated field.
#[derive(Debug, Clone)]
pub struct ValidationRule {
    field: String,
    header: Option<String>,
    ty: ValueType,
    conditions: Conditions,
    default: Option<Value>,
    message: Option<String>,
}

impl ValidationRule {
    /// Creates a rule for `field` of type `ty` checked by `conditions`.
    ///
    /// Fields named `X-...` are read from the request header of that name and
    /// stored under a camel-cased parameter name: `X-Test-Code` becomes
    /// `testCode`.
    pub fn new(
        field: impl Into<String>,
        ty: ValueType,
        conditions: &str,
    ) -> Result<Self, ConfigError> {
        let field = field.into();
        let (field, header) = match header_field(&field) {
            Some(name) => (name, Some(field)),
            None => (field, None),
        };
        let conditions = Conditions::parse(&field, ty, conditions)?;

        Ok(Self {
            field,
            header,
            ty,
            conditions,
            default: None,
            message: None,
        })
    }

    /// The value used when the field is missing or empty. Takes precedence
    /// over a `default` directive in the conditions.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// The failure message, with `{0}` standing for the field name. Takes
    /// precedence over a `message` directive in the conditions.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// The parameter name the validated value is stored under.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// The request header the value is read from, if any.
    pub fn header(&self) -> Option<&str> {
        self.header.as_deref()
    }

    pub fn value_type(&self) -> ValueType {
        self.ty
    }

    fn failure_message(&self) -> Option<&str> {
        self.message
            .as_deref()
            .or_else(|| self.conditions.message.as_deref())
    }

    fn default(&self) -> Option<Value> {
        self.default.clone().or_else(|| {
            self.conditions
                .default
                .as_ref()
                .map(|text| Value::String(text.clone()))
        })
    }

    fn check(&self, params: &Params, headers: &HeaderMap) -> Result<Value, ValidationError> {
        let mut value = match &self.header {
            Some(name) => headers
                .get(name.as_str())
                .and_then(|v| v.to_str().ok())
                .map_or(Value::Null, |v| Value::String(v.to_owned())),
            None => params.get(&self.field).cloned().unwrap_or(Value::Null),
        };

        if params::is_blank(Some(&value)) {
            if let Some(default) = self.default() {
                value = default;
            }
        }

        // An empty string only survives as a string; other types see it as missing.
        if self.ty != ValueType::String && params::is_blank(Some(&value)) {
            value = Value::Null;
        } else if !value.is_null() {
            value = self.ty.convert(&value).ok_or_else(|| ValidationError {
                field: self.field.clone(),
                message: render(
                    self.failure_message(),
                    CONVERSION_MESSAGE,
                    &[self.field.as_str(), self.ty.name()],
                ),
            })?;
        }

        self.conditions
            .evaluate(&self.field, self.ty, &value, self.failure_message())
            .map_err(|message| ValidationError {
                field: self.field.clone(),
                message,
            })?;

        Ok(value)
    }
}

/// An ordered list of validation rules.
#[derive(Debug, Clone, Default)]
pub struct Validation {
    rules: Vec<ValidationRule>,
}

impl Validation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a rule.
    pub fn rule(mut self, rule: ValidationRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Builds a validation from `(field, type name, conditions)` triples.
    pub fn from_triples(triples: &[(&str, &str, &str)]) -> Result<Self, ConfigError> {
        triples
            .iter()
            .try_fold(Validation::new(), |validation, (field, ty, conditions)| {
                let rule = ValidationRule::new(*field, ValueType::from_name(ty), conditions)?;
                Ok(validation.rule(rule))
            })
    }

    pub fn rules(&self) -> &[ValidationRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Runs every rule against `params` and `headers`.
    ///
    /// Returns a new map holding the input parameters with validated fields
    /// replaced by their converted values. `params` itself is left untouched.
    pub fn execute(&self, params: &Params, headers: &HeaderMap) -> Result<Params, ValidationError> {
        let mut checked = params.clone();
        for rule in &self.rules {
            let value = rule.check(params, headers)?;
            if !value.is_null() {
                checked.insert(rule.field.as_str(), value);
            }
        }
        Ok(checked)
    }
}

/// The parameter name for a header-sourced field, or `None` for ordinary fields.
fn header_field(field: &str) -> Option<String> {
    let rest = field.strip_prefix("X-")?;
    let joined: String = rest.split('-').collect();
    let mut chars = joined.chars();
    let first = chars.next()?;
    Some(first.to_lowercase().chain(chars).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;
    use serde_json::json;

    #[test]
    fn substitutes_defaults() {
        let validation = Validation::new().rule(
            ValidationRule::new("abc", ValueType::String, "")
                .unwrap()
                .default_value("moge"),
        );
        let checked = validation.execute(&Params::new(), &HeaderMap::new()).unwrap();
        assert_eq!(checked.get_str("abc"), Some("moge"));

        let mut params = Params::new();
        params.insert("abc", "");
        let checked = validation.execute(&params, &HeaderMap::new()).unwrap();
        assert_eq!(checked.get_str("abc"), Some("moge"));
    }

    #[test]
    fn default_directive_applies_before_conditions() {
        let validation = Validation::from_triples(&[("page", "int", "def 1, min 1")]).unwrap();
        let checked = validation.execute(&Params::new(), &HeaderMap::new()).unwrap();
        assert_eq!(checked.get("page"), Some(&json!(1)));
    }

    #[test]
    fn converts_and_leaves_input_untouched() {
        let validation = Validation::from_triples(&[("age", "integer", "ge 18")]).unwrap();
        let mut params = Params::new();
        params.insert("age", "21");
        params.insert("other", "kept");

        let checked = validation.execute(&params, &HeaderMap::new()).unwrap();
        assert_eq!(checked.get("age"), Some(&json!(21)));
        assert_eq!(checked.get_str("other"), Some("kept"));
        assert_eq!(params.get_str("age"), Some("21"));
    }

    #[test]
    fn conversion_failure_reports_field() {
        let validation = Validation::from_triples(&[("age", "integer", "")]).unwrap();
        let mut params = Params::new();
        params.insert("age", "old");

        let err = validation.execute(&params, &HeaderMap::new()).unwrap_err();
        assert_eq!(err.field, "age");
        assert_eq!(err.message, "\"age\" is not a integer format.");
    }

    #[test]
    fn first_failure_short_circuits() {
        let validation = Validation::from_triples(&[
            ("name", "string", "not null"),
            ("age", "integer", "not null"),
        ])
        .unwrap();
        let err = validation.execute(&Params::new(), &HeaderMap::new()).unwrap_err();
        assert_eq!(err.field, "name");
    }

    #[test]
    fn custom_messages_take_precedence() {
        let validation = Validation::new().rule(
            ValidationRule::new("name", ValueType::String, "not null msg 'ignored'")
                .unwrap()
                .message("{0} is required"),
        );
        let err = validation.execute(&Params::new(), &HeaderMap::new()).unwrap_err();
        assert_eq!(err.message, "name is required");

        let validation =
            Validation::from_triples(&[("name", "string", "not null message '{0} missing'")])
                .unwrap();
        let err = validation.execute(&Params::new(), &HeaderMap::new()).unwrap_err();
        assert_eq!(err.message, "name missing");
    }

    #[test]
    fn reads_header_fields() {
        let validation = Validation::from_triples(&[("X-Test-Code", "integer", "not null")]).unwrap();
        assert_eq!(validation.rules()[0].field(), "testCode");
        assert_eq!(validation.rules()[0].header(), Some("X-Test-Code"));

        let mut headers = HeaderMap::new();
        headers.insert("x-test-code", HeaderValue::from_static("7"));
        let checked = validation.execute(&Params::new(), &headers).unwrap();
        assert_eq!(checked.get("testCode"), Some(&json!(7)));

        assert!(validation.execute(&Params::new(), &HeaderMap::new()).is_err());
    }

    #[test]
    fn missing_optional_values_are_not_inserted() {
        let validation = Validation::from_triples(&[("limit", "integer", "max 100")]).unwrap();
        let checked = validation.execute(&Params::new(), &HeaderMap::new()).unwrap();
        assert!(!checked.contains_key("limit"));
    }

    #[test]
    fn invalid_conditions_fail_at_construction() {
        assert!(matches!(
            Validation::from_triples(&[("a", "string", "between 1 2")]),
            Err(ConfigError::InvalidCondition { .. })
        ));
    }
}
