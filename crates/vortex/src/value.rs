//! Runtime values held in state and produced by expressions.

use crate::host::HostEvent;
use crate::store::TrackedObject;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

pub type ObjectRef = Rc<RefCell<IndexMap<String, Value>>>;
pub type ArrayRef = Rc<RefCell<Vec<Value>>>;

/// Native callback stored in state and invoked by `name()` event code.
pub type StateFunction = Rc<dyn Fn(&TrackedObject, &HostEvent)>;

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Text(Arc<str>),
    Object(ObjectRef),
    Array(ArrayRef),
    Function(StateFunction),
}

impl Value {
    pub fn text(text: impl Into<Arc<str>>) -> Self {
        Value::Text(text.into())
    }

    pub fn empty_text() -> Self {
        Value::Text(Arc::from(""))
    }

    pub fn object(fields: IndexMap<String, Value>) -> Self {
        Value::Object(Rc::new(RefCell::new(fields)))
    }

    pub fn object_from<K: Into<String>>(fields: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::object(
            fields
                .into_iter()
                .map(|(key, value)| (key.into(), value))
                .collect(),
        )
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn function(function: impl Fn(&TrackedObject, &HostEvent) + 'static) -> Self {
        Value::Function(Rc::new(function))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Text(_) => "string",
            Value::Object(_) => "object",
            Value::Array(_) => "array",
            Value::Function(_) => "function",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(number) => Some(*number),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Value::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Array(_))
    }

    /// `false`, `0`, `NaN`, `''`, `null` and `undefined` are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(value) => *value,
            Value::Number(number) => *number != 0.0 && !number.is_nan(),
            Value::Text(text) => !text.is_empty(),
            Value::Object(_) | Value::Array(_) | Value::Function(_) => true,
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(value) => f64::from(u8::from(*value)),
            Value::Number(number) => *number,
            Value::Text(text) => text_to_number(text),
            Value::Array(_) => text_to_number(&self.to_display_string()),
            Value::Object(_) | Value::Function(_) => f64::NAN,
        }
    }

    /// String form used by concatenation and comparisons.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(value) => value.to_string(),
            Value::Number(number) => number_to_string(*number),
            Value::Text(text) => text.to_string(),
            Value::Object(_) => "[object Object]".to_string(),
            Value::Array(array) => match array.try_borrow() {
                Ok(items) => items
                    .iter()
                    .map(Value::to_text_content)
                    .collect::<Vec<_>>()
                    .join(","),
                Err(_) => String::new(),
            },
            Value::Function(_) => "function".to_string(),
        }
    }

    /// Like [`Value::to_display_string`], but `null` and `undefined` render empty.
    pub fn to_text_content(&self) -> String {
        match self {
            Value::Undefined | Value::Null => String::new(),
            _ => self.to_display_string(),
        }
    }

    /// Type and value must both match; containers compare by identity.
    pub fn strict_equals(&self, other: &Value) -> bool {
        self == other
    }

    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
            (Value::Undefined | Value::Null, _) | (_, Value::Undefined | Value::Null) => false,
            (Value::Number(_), Value::Number(_))
            | (Value::Text(_), Value::Text(_))
            | (Value::Bool(_), Value::Bool(_)) => self == other,
            (Value::Number(number), Value::Text(text))
            | (Value::Text(text), Value::Number(number)) => *number == text_to_number(text),
            (Value::Bool(value), other) | (other, Value::Bool(value)) => {
                Value::Number(f64::from(u8::from(*value))).loose_equals(other)
            }
            (left, right) if left.is_primitive() != right.is_primitive() => {
                left.to_primitive().loose_equals(&right.to_primitive())
            }
            _ => self == other,
        }
    }

    /// Relational comparison: lexicographic for two strings, numeric otherwise.
    /// `None` when either side is `NaN`.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        let left = self.to_primitive();
        let right = other.to_primitive();
        match (&left, &right) {
            (Value::Text(left), Value::Text(right)) => Some(left.cmp(right)),
            _ => left.to_number().partial_cmp(&right.to_number()),
        }
    }

    /// `+` concatenates when either side is a string, otherwise adds.
    pub fn add(&self, other: &Value) -> Value {
        let left = self.to_primitive();
        let right = other.to_primitive();
        match (&left, &right) {
            (Value::Text(_), _) | (_, Value::Text(_)) => Value::text(format!(
                "{}{}",
                left.to_display_string(),
                right.to_display_string()
            )),
            _ => Value::Number(left.to_number() + right.to_number()),
        }
    }

    fn is_primitive(&self) -> bool {
        !matches!(self, Value::Object(_) | Value::Array(_) | Value::Function(_))
    }

    fn to_primitive(&self) -> Value {
        if self.is_primitive() {
            self.clone()
        } else {
            Value::text(self.to_display_string())
        }
    }

    /// Deep copy into JSON; functions and `undefined` become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Undefined | Value::Null | Value::Function(_) => serde_json::Value::Null,
            Value::Bool(value) => serde_json::Value::Bool(*value),
            Value::Number(number) => {
                if number.fract() == 0.0 && number.abs() < 9.0e15 {
                    serde_json::Value::from(*number as i64)
                } else {
                    serde_json::Number::from_f64(*number)
                        .map(serde_json::Value::Number)
                        .unwrap_or(serde_json::Value::Null)
                }
            }
            Value::Text(text) => serde_json::Value::String(text.to_string()),
            Value::Object(object) => match object.try_borrow() {
                Ok(fields) => serde_json::Value::Object(
                    fields
                        .iter()
                        .map(|(key, value)| (key.clone(), value.to_json()))
                        .collect(),
                ),
                Err(_) => serde_json::Value::Null,
            },
            Value::Array(array) => match array.try_borrow() {
                Ok(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
                Err(_) => serde_json::Value::Null,
            },
        }
    }
}

/// Number formatting as a browser would print it: `2`, `0.5`, `NaN`, `Infinity`.
pub fn number_to_string(number: f64) -> String {
    if number.is_nan() {
        "NaN".to_string()
    } else if number.is_infinite() {
        let sign = if number > 0.0 { "" } else { "-" };
        format!("{sign}Infinity")
    } else if number == 0.0 {
        "0".to_string()
    } else {
        number.to_string()
    }
}

fn text_to_number(text: &str) -> f64 {
    let trimmed = text.trim();
    match trimmed {
        "" => 0.0,
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ if trimmed
            .chars()
            .any(|character| character.is_ascii_alphabetic() && !matches!(character, 'e' | 'E')) =>
        {
            f64::NAN
        }
        _ => trimmed.parse().unwrap_or(f64::NAN),
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(left), Value::Bool(right)) => left == right,
            (Value::Number(left), Value::Number(right)) => left == right,
            (Value::Text(left), Value::Text(right)) => left == right,
            (Value::Object(left), Value::Object(right)) => Rc::ptr_eq(left, right),
            (Value::Array(left), Value::Array(right)) => Rc::ptr_eq(left, right),
            (Value::Function(left), Value::Function(right)) => Rc::ptr_eq(left, right),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(value) => write!(f, "{value}"),
            Value::Number(number) => write!(f, "{}", number_to_string(*number)),
            Value::Text(text) => write!(f, "{text:?}"),
            Value::Object(object) => match object.try_borrow() {
                Ok(fields) => f.debug_map().entries(fields.iter()).finish(),
                Err(_) => write!(f, "{{<borrowed>}}"),
            },
            Value::Array(array) => match array.try_borrow() {
                Ok(items) => f.debug_list().entries(items.iter()).finish(),
                Err(_) => write!(f, "[<borrowed>]"),
            },
            Value::Function(_) => write!(f, "<function>"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

impl From<f64> for Value {
    fn from(number: f64) -> Self {
        Value::Number(number)
    }
}

impl From<i64> for Value {
    fn from(number: i64) -> Self {
        Value::Number(number as f64)
    }
}

impl From<i32> for Value {
    fn from(number: i32) -> Self {
        Value::Number(f64::from(number))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::text(text)
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::text(text)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::array(items)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(fields: IndexMap<String, Value>) -> Self {
        Value::object(fields)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(value) => Value::Bool(value),
            serde_json::Value::Number(number) => Value::Number(number.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(text) => Value::text(text),
            serde_json::Value::Array(items) => {
                Value::array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(fields) => Value::object(
                fields
                    .into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_number_display() {
        assert_eq!(Value::from(2.0).to_display_string(), "2");
        assert_eq!(Value::from(0.5).to_display_string(), "0.5");
        assert_eq!(Value::from(-0.0).to_display_string(), "0");
        assert_eq!(Value::from(f64::NAN).to_display_string(), "NaN");
        assert_eq!(Value::from(1.0 / 0.0).to_display_string(), "Infinity");
    }

    #[test]
    fn test_container_display() {
        let value = Value::from(json!([1, "a", null, true]));
        assert_eq!(value.to_display_string(), "1,a,,true");
        assert_eq!(Value::from(json!({"a": 1})).to_display_string(), "[object Object]");
        assert_eq!(Value::Null.to_text_content(), "");
        assert_eq!(Value::Undefined.to_text_content(), "");
    }

    #[test]
    fn test_truthiness() {
        for falsy in [
            Value::Undefined,
            Value::Null,
            Value::Bool(false),
            Value::from(0.0),
            Value::from(f64::NAN),
            Value::from(""),
        ] {
            assert!(!falsy.is_truthy(), "{falsy:?} should be falsy");
        }
        for truthy in [
            Value::from("0"),
            Value::from(-1),
            Value::array(Vec::new()),
            Value::object(IndexMap::new()),
        ] {
            assert!(truthy.is_truthy(), "{truthy:?} should be truthy");
        }
    }

    #[test]
    fn test_loose_and_strict_equality() {
        assert!(Value::from(1).loose_equals(&Value::from("1")));
        assert!(!Value::from(1).strict_equals(&Value::from("1")));
        assert!(Value::Null.loose_equals(&Value::Undefined));
        assert!(!Value::Null.loose_equals(&Value::from(0)));
        assert!(Value::Bool(true).loose_equals(&Value::from(1)));
        assert!(Value::from("").loose_equals(&Value::from(0)));
        assert!(Value::from(json!([2])).loose_equals(&Value::from(2)));
        assert!(!Value::from(f64::NAN).strict_equals(&Value::from(f64::NAN)));

        let shared = Value::array(vec![Value::from(1)]);
        assert!(shared.strict_equals(&shared.clone()));
        assert!(!shared.strict_equals(&Value::array(vec![Value::from(1)])));
    }

    #[test]
    fn test_relational_comparison() {
        assert_eq!(Value::from("b").compare(&Value::from("a")), Some(Ordering::Greater));
        assert_eq!(Value::from("10").compare(&Value::from(9)), Some(Ordering::Greater));
        assert_eq!(Value::from("abc").compare(&Value::from(1)), None);
        assert_eq!(Value::Null.compare(&Value::from(0)), Some(Ordering::Equal));
    }

    #[test]
    fn test_add_and_number_conversion() {
        assert_eq!(Value::from(1).add(&Value::from(1)), Value::from(2));
        assert_eq!(Value::from("1").add(&Value::from(1)), Value::from("11"));
        assert_eq!(Value::from(" 12 ").to_number(), 12.0);
        assert!(Value::from("12px").to_number().is_nan());
        assert!(Value::from("inf").to_number().is_nan());
        assert_eq!(Value::from("1e3").to_number(), 1000.0);
        assert!(Value::Undefined.to_number().is_nan());
    }

    #[test]
    fn test_json_conversion() {
        let json = json!({"count": 2, "ratio": 0.5, "tags": ["a"], "owner": null});
        let value = Value::from(json.clone());
        assert_eq!(value.to_json(), json);
        assert_eq!(
            Value::object_from([("f", Value::function(|_, _| {}))]).to_json(),
            json!({"f": null})
        );
    }
}
