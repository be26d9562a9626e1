//! Dynamic values and their static types
//!
//! `Value` is the output slot of every evaluation and the storage type of
//! object properties. `ValueType` is the static result type an expression
//! declares and a property descriptor carries. Values are transported as-is:
//! a type check never converts one variant into another.

use crate::class::{Class, OBJECT_TYPE_NAME};
use crate::object::Object;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A dynamic value held by a property or produced by an expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    String(String),
    /// List of values
    List(Vec<Value>),
    /// Reference to an object, `None` being the null object
    ///
    /// Object references only exist at runtime and are never serialized.
    #[serde(skip)]
    Object(Option<Object>),
}

/// A map of property names to values
///
/// Uses IndexMap so properties keep their declaration order
pub type ValueMap = IndexMap<String, Value>;

impl Value {
    /// The null object
    pub fn null_object() -> Self {
        Value::Object(None)
    }

    /// Check if this value is the null object
    pub fn is_null_object(&self) -> bool {
        matches!(self, Value::Object(None))
    }

    /// Try to get this value as a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get this value as an integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get this value as a float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Try to get this value as a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get this value as a list
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(list) => Some(list),
            _ => None,
        }
    }

    /// Try to get this value as a non-null object
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(object) => object.as_ref(),
            _ => None,
        }
    }

    /// Get the name of this value's variant
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Object(_) => "object",
        }
    }

    /// Get the most specific type this value conforms to
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int,
            Value::Float(_) => ValueType::Float,
            Value::String(_) => ValueType::String,
            Value::List(_) => ValueType::List,
            Value::Object(Some(object)) => ValueType::object_of(object.class()),
            Value::Object(None) => ValueType::object(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(fl) => write!(f, "{}", fl),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::List(list) => {
                write!(f, "[")?;
                for (i, v) in list.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Value::Object(Some(object)) => write!(f, "{}({})", object.type_name(), object.id()),
            Value::Object(None) => write!(f, "null"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Value::Float(f as f64)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<Object> for Value {
    fn from(object: Object) -> Self {
        Value::Object(Some(object))
    }
}

impl From<&Object> for Value {
    fn from(object: &Object) -> Self {
        Value::Object(Some(object.clone()))
    }
}

impl From<Option<Object>> for Value {
    fn from(object: Option<Object>) -> Self {
        Value::Object(object)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(vec: Vec<T>) -> Self {
        Value::List(vec.into_iter().map(Into::into).collect())
    }
}

/// The static type of a value
///
/// Object types are named by class so a property may refer to its own class
/// (or one declared later) without holding it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Bool,
    Int,
    Float,
    String,
    List,
    /// Object of the named class or any class derived from it
    Object(String),
}

impl ValueType {
    /// The type every object conforms to
    pub fn object() -> Self {
        ValueType::Object(OBJECT_TYPE_NAME.to_string())
    }

    /// The type of instances of `class`
    pub fn object_of(class: &Class) -> Self {
        ValueType::Object(class.name().to_string())
    }

    /// Check if this is an object type
    pub fn is_object(&self) -> bool {
        matches!(self, ValueType::Object(_))
    }

    /// Check whether `value` conforms to this type
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (ValueType::Bool, Value::Bool(_))
            | (ValueType::Int, Value::Int(_))
            | (ValueType::Float, Value::Float(_))
            | (ValueType::String, Value::String(_))
            | (ValueType::List, Value::List(_)) => true,
            (ValueType::Object(_), Value::Object(None)) => true,
            (ValueType::Object(name), Value::Object(Some(object))) => object.is_a(name),
            _ => false,
        }
    }

    /// The value a property of this type starts out with
    pub fn default_value(&self) -> Value {
        match self {
            ValueType::Bool => Value::Bool(false),
            ValueType::Int => Value::Int(0),
            ValueType::Float => Value::Float(0.0),
            ValueType::String => Value::String(String::new()),
            ValueType::List => Value::List(Vec::new()),
            ValueType::Object(_) => Value::Object(None),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Bool => write!(f, "bool"),
            ValueType::Int => write!(f, "int"),
            ValueType::Float => write!(f, "float"),
            ValueType::String => write!(f, "string"),
            ValueType::List => write!(f, "list"),
            ValueType::Object(name) => write!(f, "{}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::ParamSpec;

    #[test]
    fn test_value_types() {
        assert!(Value::null_object().is_null_object());
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Int(42).as_int(), Some(42));
        assert_eq!(Value::Float(3.5).as_float(), Some(3.5));
        assert_eq!(Value::Int(42).as_float(), None);
        assert_eq!(Value::String("hello".into()).as_str(), Some("hello"));
        assert_eq!(Value::from(vec![1i64, 2]).as_list().map(<[Value]>::len), Some(2));
    }

    #[test]
    fn test_value_from() {
        let _: Value = true.into();
        let _: Value = 42i64.into();
        let _: Value = 3.5f64.into();
        let _: Value = "hello".into();
        let _: Value = vec![1i64, 2, 3].into();
        let _: Value = Option::<Object>::None.into();
    }

    #[test]
    fn test_accepts_without_coercion() {
        assert!(ValueType::Int.accepts(&Value::Int(1)));
        assert!(!ValueType::Float.accepts(&Value::Int(1)));
        assert!(!ValueType::String.accepts(&Value::Bool(true)));
        assert!(ValueType::object().accepts(&Value::null_object()));
    }

    #[test]
    fn test_object_types_follow_class_hierarchy() {
        let widget = Class::builder("Widget").build().unwrap();
        let label = Class::builder("Label")
            .parent(&widget)
            .property(ParamSpec::new("text", ValueType::String))
            .build()
            .unwrap();
        let object = Object::new(&label);
        let value = Value::from(&object);

        assert!(ValueType::object().accepts(&value));
        assert!(ValueType::object_of(&widget).accepts(&value));
        assert!(ValueType::object_of(&label).accepts(&value));
        assert!(!ValueType::Object("Window".into()).accepts(&value));
        assert_eq!(value.value_type(), ValueType::Object("Label".into()));
    }

    #[test]
    fn test_object_equality_is_identity() {
        let class = Class::builder("Thing").build().unwrap();
        let a = Object::new(&class);
        let b = Object::new(&class);
        assert_eq!(Value::from(&a), Value::from(a.clone()));
        assert_ne!(Value::from(&a), Value::from(&b));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::from(vec![1i64, 2]).to_string(), "[1, 2]");
        assert_eq!(Value::from("x").to_string(), "\"x\"");
        assert_eq!(Value::null_object().to_string(), "null");
        assert_eq!(ValueType::Object("Window".into()).to_string(), "Window");
    }

    #[test]
    fn test_objects_are_not_serialized() {
        let list = Value::from(vec![Value::Int(1), Value::from("a")]);
        let text = ron::to_string(&list).unwrap();
        let back: Value = ron::from_str(&text).unwrap();
        assert_eq!(back, list);

        let class = Class::builder("Thing").build().unwrap();
        let object = Object::new(&class);
        assert!(ron::to_string(&Value::from(&object)).is_err());
    }
}
