//! The condition grammar attached to a validation rule.
//!
//! A condition string is a sequence of keywords and arguments separated by
//! whitespace, `,`, `|`, `(` or `)`. Arguments containing separators may be
//! quoted with `"` or `'`.
//! ```ignore
//!  Keyword             Arguments   Check
//!  none                            stop parsing, no further checks
//!  not, !                          negate the following check
//!  null                            value is null (or empty for strings)
//!  date time zip tel               reserved formats
//!  ipv4 url email
//!  exp                 regex       the regex finds a match
//!  lt <   le <=        bound       value (or length) below the bound
//!  gt >   ge >=        bound       value (or length) above the bound
//!  min    max          bound       inclusive lower / upper bound
//!  range               low high    inclusive range
//!  default def         value       default when the value is missing
//!  message msg         text        replaces the failure message
//! ```
//!
//! For example `not null, max 64` requires a value of at most 64 characters
//! and `range(1, 10)` accepts numbers between one and ten.

use super::value::{parse_date, stringify, ValueType};
use crate::error::ConfigError;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

const NULL_MESSAGE: &str = "The value of '{0}' is {1}.";
const FORMAT_MESSAGE: &str = "\"{0}\" is not a {1} format.";
const PATTERN_MESSAGE: &str = "The contents of \"{0}\" do not apply.";
const MIN_MESSAGE: &str = "Length of '{0}' is out of condition: min({1})";
const MAX_MESSAGE: &str = "Length of '{0}' is out of condition: max({1})";
const RANGE_MESSAGE: &str = "Length of '{0}' is out of condition: range({1}, {2})";

static DATE: Lazy<Regex> = Lazy::new(|| {
    compile(r"^\d{2,4}/([1][0-2]|[0][1-9]|[1-9])/([3][0-1]|[1-2][0-9]|[0][1-9]|[1-9])$")
});
static TIME: Lazy<Regex> = Lazy::new(|| compile(r"^([0-1][0-9]|[2][0-3]|[0-9]):([0-5][0-9]|[0-9])$"));
static ZIP: Lazy<Regex> = Lazy::new(|| compile(r"^\d{3}-\d{4}$"));
static TEL: Lazy<Regex> = Lazy::new(|| compile(r"^[0-9]+-[0-9]+-[0-9]+$"));
static IPV4: Lazy<Regex> = Lazy::new(|| compile(r"^\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}$"));
static URL: Lazy<Regex> = Lazy::new(|| compile(r"https?://[\w/:%#$&?()~.=+\-]+"));
static EMAIL: Lazy<Regex> = Lazy::new(|| compile(r"\w+@[\w\-]+(\.[\w\-]+){1,3}$"));

// Reserved patterns are literals known to compile.
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap()
}

/// A reserved format keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Date,
    Time,
    Zip,
    Tel,
    Ipv4,
    Url,
    Email,
}

impl Format {
    fn regex(self) -> &'static Regex {
        match self {
            Format::Date => &*DATE,
            Format::Time => &*TIME,
            Format::Zip => &*ZIP,
            Format::Tel => &*TEL,
            Format::Ipv4 => &*IPV4,
            Format::Url => &*URL,
            Format::Email => &*EMAIL,
        }
    }

    fn matches(self, text: &str) -> bool {
        match self {
            Format::Date => parse_date(text).is_some() || DATE.is_match(text),
            _ => self.regex().is_match(text),
        }
    }

    fn label(self) -> &'static str {
        match self {
            Format::Date => "date",
            Format::Time => "time",
            Format::Zip => "zip",
            Format::Tel => "telephone",
            Format::Ipv4 => "ipAddress(ipv4)",
            Format::Url => "url",
            Format::Email => "email",
        }
    }
}

/// A comparison operator. `min` parses as `Ge` and `max` as `Le`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Lt,
    Le,
    Gt,
    Ge,
}

impl Op {
    fn holds(self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            Op::Lt => ordering == Less,
            Op::Le => ordering != Greater,
            Op::Gt => ordering == Greater,
            Op::Ge => ordering != Less,
        }
    }

    fn message(self) -> &'static str {
        match self {
            Op::Lt | Op::Le => MAX_MESSAGE,
            Op::Gt | Op::Ge => MIN_MESSAGE,
        }
    }
}

/// A comparison bound: a number for numeric types, a length for strings and
/// containers, a calendar date for dates.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Bound {
    Number(f64),
    Date(NaiveDate),
}

impl Bound {
    fn parse(ty: ValueType, text: &str) -> Option<Bound> {
        match ty {
            ValueType::Boolean => None,
            ValueType::Date => parse_date(text).map(Bound::Date),
            _ => text.trim().parse::<f64>().ok().filter(|f| f.is_finite()).map(Bound::Number),
        }
    }

    fn compare(&self, measure: &Bound) -> Option<std::cmp::Ordering> {
        match (measure, self) {
            (Bound::Number(a), Bound::Number(b)) => a.partial_cmp(b),
            (Bound::Date(a), Bound::Date(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

/// One parsed check.
#[derive(Debug, Clone)]
pub(crate) enum Check {
    Null,
    Format(Format),
    Pattern(Regex),
    Compare(Op, Bound, String),
    Range(Bound, String, Bound, String),
}

#[derive(Debug, Clone)]
pub(crate) struct Condition {
    check: Check,
    negate: bool,
}

/// The parsed form of a condition string.
#[derive(Debug, Clone, Default)]
pub struct Conditions {
    checks: Vec<Condition>,
    pub(crate) default: Option<String>,
    pub(crate) message: Option<String>,
}

impl Conditions {
    /// Parses `source` for a field of type `ty`.
    pub fn parse(field: &str, ty: ValueType, source: &str) -> Result<Conditions, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidCondition {
            field: field.to_owned(),
            reason,
        };

        let tokens = tokenize(source).map_err(|reason| invalid(reason.to_owned()))?;
        let mut conditions = Conditions::default();
        let mut negate = false;
        let mut tokens = tokens.into_iter();

        while let Some(token) = tokens.next() {
            let keyword = token.to_ascii_lowercase();
            let mut argument = |name: &str| {
                tokens
                    .next()
                    .ok_or_else(|| invalid(format!("'{}' expects an argument", name)))
            };

            let check = match keyword.as_str() {
                "none" => break,
                "not" | "!" => {
                    negate = true;
                    continue;
                }
                "default" | "def" => {
                    conditions.default = Some(argument(&keyword)?);
                    continue;
                }
                "message" | "msg" => {
                    conditions.message = Some(argument(&keyword)?);
                    continue;
                }
                "null" => Check::Null,
                "date" => Check::Format(Format::Date),
                "time" => Check::Format(Format::Time),
                "zip" => Check::Format(Format::Zip),
                "tel" => Check::Format(Format::Tel),
                "ipv4" => Check::Format(Format::Ipv4),
                "url" => Check::Format(Format::Url),
                "email" => Check::Format(Format::Email),
                "exp" => {
                    let pattern = argument(&keyword)?;
                    let regex = Regex::new(&pattern)
                        .map_err(|err| invalid(format!("invalid expression: {}", err)))?;
                    Check::Pattern(regex)
                }
                "lt" | "<" | "le" | "<=" | "gt" | ">" | "ge" | ">=" | "min" | "max" => {
                    let op = match keyword.as_str() {
                        "lt" | "<" => Op::Lt,
                        "le" | "<=" | "max" => Op::Le,
                        "gt" | ">" => Op::Gt,
                        _ => Op::Ge,
                    };
                    let text = argument(&keyword)?;
                    let bound = bound(ty, &text).map_err(invalid)?;
                    Check::Compare(op, bound, text)
                }
                "range" => {
                    let low_text = argument(&keyword)?;
                    let high_text = argument(&keyword)?;
                    let low = bound(ty, &low_text).map_err(invalid)?;
                    let high = bound(ty, &high_text).map_err(invalid)?;
                    Check::Range(low, low_text, high, high_text)
                }
                _ => return Err(invalid(format!("unknown condition '{}'", token))),
            };

            conditions.checks.push(Condition { check, negate });
            negate = false;
        }

        Ok(conditions)
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Evaluates every check in order and returns the first failure message.
    ///
    /// `value` has already been converted to `ty`. Only `null` inspects
    /// missing values; every other check passes when the value is blank.
    pub(crate) fn evaluate(
        &self,
        field: &str,
        ty: ValueType,
        value: &Value,
        message: Option<&str>,
    ) -> Result<(), String> {
        let blank = match value {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            _ => false,
        };

        for condition in &self.checks {
            let negate = condition.negate;
            match &condition.check {
                Check::Null => {
                    if blank == negate {
                        let state = if negate { "null" } else { "not null" };
                        return Err(render(message, NULL_MESSAGE, &[field, state]));
                    }
                }
                _ if blank => {}
                Check::Format(format) => {
                    if format.matches(&stringify(value)) == negate {
                        return Err(render(message, FORMAT_MESSAGE, &[field, format.label()]));
                    }
                }
                Check::Pattern(regex) => {
                    if regex.is_match(&stringify(value)) == negate {
                        return Err(render(message, PATTERN_MESSAGE, &[field]));
                    }
                }
                Check::Compare(op, bound, text) => {
                    let holds = measure(ty, value)
                        .and_then(|m| bound.compare(&m))
                        .map_or(false, |ordering| op.holds(ordering));
                    if holds == negate {
                        return Err(render(message, op.message(), &[field, text.as_str()]));
                    }
                }
                Check::Range(low, low_text, high, high_text) => {
                    let holds = measure(ty, value).map_or(false, |m| {
                        let above = low.compare(&m).map_or(false, |o| Op::Ge.holds(o));
                        let below = high.compare(&m).map_or(false, |o| Op::Le.holds(o));
                        above && below
                    });
                    if holds == negate {
                        return Err(render(
                            message,
                            RANGE_MESSAGE,
                            &[field, low_text.as_str(), high_text.as_str()],
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

fn bound(ty: ValueType, text: &str) -> Result<Bound, String> {
    Bound::parse(ty, text)
        .ok_or_else(|| format!("'{}' is not a valid bound for a {} value", text, ty))
}

/// The quantity a value is compared by.
fn measure(ty: ValueType, value: &Value) -> Option<Bound> {
    if ty == ValueType::Date {
        return value.as_str().and_then(parse_date).map(Bound::Date);
    }
    let n = match value {
        Value::Number(n) if ty.is_numeric() => n.as_f64()?,
        Value::Number(n) => n.to_string().chars().count() as f64,
        Value::String(s) => s.chars().count() as f64,
        Value::Array(items) => items.len() as f64,
        Value::Object(map) => map.len() as f64,
        Value::Bool(_) | Value::Null => return None,
    };
    Some(Bound::Number(n))
}

/// Splits a condition string into tokens, honoring quotes.
fn tokenize(source: &str) -> Result<Vec<String>, &'static str> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote = None;

    for c in source.chars() {
        match quote {
            Some(q) if c == q => {
                tokens.push(std::mem::take(&mut current));
                quote = None;
            }
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                quote = Some(c);
            }
            None if c.is_whitespace() || matches!(c, ',' | '|' | '(' | ')') => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            None => current.push(c),
        }
    }

    if quote.is_some() {
        return Err("unterminated quote");
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    Ok(tokens)
}

/// Substitutes `{n}` placeholders with `args[n]`, preferring the custom
/// message over the default one. Placeholders without a matching argument are
/// kept verbatim.
pub(crate) fn render(custom: Option<&str>, default: &str, args: &[&str]) -> String {
    let template = custom.filter(|m| !m.is_empty()).unwrap_or(default);
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open..];
        let close = match after.find('}') {
            Some(close) => close,
            None => {
                out.push_str(after);
                return out;
            }
        };
        match after[1..close].trim().parse::<usize>().ok().and_then(|i| args.get(i)) {
            Some(arg) => out.push_str(arg),
            None => out.push_str(&after[..=close]),
        }
        rest = &after[close + 1..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn check(ty: ValueType, conditions: &str, value: Value) -> Result<(), String> {
        Conditions::parse("field", ty, conditions)
            .unwrap()
            .evaluate("field", ty, &value, None)
    }

    #[test]
    fn tokenizes_separators_and_quotes() {
        assert_eq!(
            tokenize("not null, range(1|5)").unwrap(),
            vec!["not", "null", "range", "1", "5"]
        );
        assert_eq!(
            tokenize(r#"exp "^a b$" msg 'bad, value'"#).unwrap(),
            vec!["exp", "^a b$", "msg", "bad, value"]
        );
        assert!(tokenize("exp \"open").is_err());
    }

    #[test]
    fn not_null_requires_a_value() {
        assert!(check(ValueType::String, "not null", json!("x")).is_ok());
        assert_eq!(
            check(ValueType::String, "not null", json!("")).unwrap_err(),
            "The value of 'field' is null."
        );
        assert!(check(ValueType::Integer, "not null", Value::Null).is_err());
        assert!(check(ValueType::String, "null", json!("x")).is_err());
        assert!(check(ValueType::String, "null", Value::Null).is_ok());
    }

    #[test]
    fn other_checks_skip_missing_values() {
        assert!(check(ValueType::String, "email max 3", Value::Null).is_ok());
    }

    #[test]
    fn comparisons_are_strict_or_inclusive() {
        assert!(check(ValueType::Integer, "lt 5", json!(4)).is_ok());
        assert!(check(ValueType::Integer, "lt 5", json!(5)).is_err());
        assert!(check(ValueType::Integer, "le 5", json!(5)).is_ok());
        assert!(check(ValueType::Integer, "> 5", json!(5)).is_err());
        assert!(check(ValueType::Integer, ">= 5", json!(5)).is_ok());
        assert!(check(ValueType::Integer, "min 5 max 10", json!(10)).is_ok());
        assert!(check(ValueType::Integer, "min 5 max 10", json!(11)).is_err());
    }

    #[test]
    fn strings_compare_by_length() {
        assert!(check(ValueType::String, "max 3", json!("abc")).is_ok());
        assert_eq!(
            check(ValueType::String, "max 3", json!("abcd")).unwrap_err(),
            "Length of 'field' is out of condition: max(3)"
        );
        assert!(check(ValueType::List, "min 1", json!([])).is_err());
    }

    #[test]
    fn ranges_are_inclusive() {
        assert!(check(ValueType::Float, "range(1.5, 2.5)", json!(2.5)).is_ok());
        assert_eq!(
            check(ValueType::Float, "range 1 2", json!(3.0)).unwrap_err(),
            "Length of 'field' is out of condition: range(1, 2)"
        );
        assert!(check(ValueType::Float, "not range 1 2", json!(3.0)).is_ok());
    }

    #[test]
    fn dates_compare_as_dates() {
        assert!(check(ValueType::Date, "ge 2020/01/01", json!("2021-06-01")).is_ok());
        assert!(check(ValueType::Date, "ge 2020/01/01", json!("2019-12-31")).is_err());
    }

    #[test]
    fn reserved_formats() {
        assert!(check(ValueType::String, "zip", json!("123-4567")).is_ok());
        assert!(check(ValueType::String, "email", json!("a@example.com")).is_ok());
        assert_eq!(
            check(ValueType::String, "tel", json!("12345")).unwrap_err(),
            "\"field\" is not a telephone format."
        );
        assert!(check(ValueType::String, "not ipv4", json!("10.0.0.1")).is_err());
        assert!(check(ValueType::String, "time", json!("23:59")).is_ok());
        assert!(check(ValueType::String, "url", json!("https://example.com/a?b=c")).is_ok());
    }

    #[test]
    fn expressions_search_the_value() {
        assert!(check(ValueType::String, "exp ^[a-z]+$", json!("abc")).is_ok());
        assert_eq!(
            check(ValueType::String, "exp ^[a-z]+$", json!("ABC")).unwrap_err(),
            "The contents of \"field\" do not apply."
        );
    }

    #[test]
    fn none_stops_parsing() {
        let conditions = Conditions::parse("f", ValueType::String, "none not null").unwrap();
        assert!(conditions.is_empty());
    }

    #[test]
    fn directives_are_collected() {
        let conditions =
            Conditions::parse("f", ValueType::String, "def moge message 'bad {0}'").unwrap();
        assert_eq!(conditions.default.as_deref(), Some("moge"));
        assert_eq!(conditions.message.as_deref(), Some("bad {0}"));
    }

    #[test]
    fn rejects_invalid_conditions() {
        let tests = vec![
            (ValueType::String, "between 1 2"),
            (ValueType::String, "max"),
            (ValueType::String, "range 1"),
            (ValueType::Integer, "min abc"),
            (ValueType::Boolean, "max 1"),
            (ValueType::String, "exp ("),
        ];
        for (ty, source) in tests {
            assert!(
                matches!(
                    Conditions::parse("f", ty, source),
                    Err(ConfigError::InvalidCondition { .. })
                ),
                "condition: {:?}",
                source
            );
        }
    }

    #[test]
    fn renders_placeholders() {
        assert_eq!(render(None, "{0} and {1}", &["a", "b"]), "a and b");
        assert_eq!(render(Some("custom {0}"), "{0}", &["a"]), "custom a");
        assert_eq!(render(None, "{2} {x} {", &["a"]), "{2} {x} {");
    }
}
