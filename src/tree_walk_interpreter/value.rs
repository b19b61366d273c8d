use std::{cell::RefCell, collections::BTreeMap, fmt::Display, rc::Rc};

use serde_json::Value as JsonValue;

use super::{callable::Callable, class::Instance};

pub type List = Rc<RefCell<Vec<Value>>>;
pub type Object = Rc<RefCell<BTreeMap<String, Value>>>;

#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    List(List),
    Object(Object),
    Instance(Rc<RefCell<Instance>>),
    Callable(Rc<Callable>),
}

impl Value {
    pub fn list(values: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(values)))
    }

    pub fn object(entries: BTreeMap<String, Value>) -> Self {
        Value::Object(Rc::new(RefCell::new(entries)))
    }

    /// The `{error: message}` shape returned by builtins that never raise.
    pub fn error_object(message: impl Into<String>) -> Self {
        Value::object(BTreeMap::from([(
            "error".to_string(),
            Value::String(message.into()),
        )]))
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "booléen",
            Value::Number(_) => "nombre",
            Value::String(_) => "chaîne",
            Value::List(_) => "liste",
            Value::Object(_) => "objet",
            Value::Instance(_) => "instance",
            Value::Callable(_) => "fonction",
        }
    }

    /// Strict equality: scalars by value, everything else by identity.
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            (Value::Callable(a), Value::Callable(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Key used when a value indexes an object or instance.
    pub fn to_key(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 => Some(*n as usize),
            _ => None,
        }
    }

    pub fn from_json(json: &JsonValue) -> Self {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Boolean(*b),
            JsonValue::Number(n) => n.as_f64().map_or(Value::Null, Value::Number),
            JsonValue::String(s) => Value::String(s.clone()),
            JsonValue::Array(items) => Value::list(items.iter().map(Value::from_json).collect()),
            JsonValue::Object(map) => Value::object(
                map.iter()
                    .map(|(key, value)| (key.clone(), Value::from_json(value)))
                    .collect(),
            ),
        }
    }

    /// `open` holds the containers being printed further up; meeting one of
    /// them again prints a marker instead of recursing.
    fn write_to(
        &self,
        f: &mut std::fmt::Formatter<'_>,
        nested: bool,
        open: &mut Vec<*const ()>,
    ) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::String(s) if nested => write!(f, "\"{}\"", s),
            Value::String(s) => write!(f, "{}", s),
            Value::List(items) => {
                let ptr = Rc::as_ptr(items) as *const ();
                if open.contains(&ptr) {
                    return write!(f, "[Circulaire]");
                }
                open.push(ptr);
                write!(f, "[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i != 0 {
                        write!(f, ", ")?;
                    }
                    item.write_to(f, true, open)?;
                }
                open.pop();
                write!(f, "]")
            }
            Value::Object(entries) => {
                let ptr = Rc::as_ptr(entries) as *const ();
                if open.contains(&ptr) {
                    return write!(f, "[Circulaire]");
                }
                open.push(ptr);
                write!(f, "{{")?;
                for (i, (key, value)) in entries.borrow().iter().enumerate() {
                    if i != 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: ", key)?;
                    value.write_to(f, true, open)?;
                }
                open.pop();
                write!(f, "}}")
            }
            Value::Instance(instance) => write!(f, "<instance de {}>", instance.borrow().class_name),
            Value::Callable(callable) => write!(f, "{}", callable),
        }
    }
}

pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n == f64::INFINITY {
        "Infinity".to_string()
    } else if n == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else {
        n.to_string()
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.write_to(f, false, &mut Vec::new())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_number_display() {
        assert_eq!(Value::Number(16.0).to_string(), "16");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
        assert_eq!(Value::Number(f64::INFINITY).to_string(), "Infinity");
        assert_eq!(Value::Number(f64::NAN).to_string(), "NaN");
    }

    #[test]
    fn test_container_display() {
        let list = Value::list(vec![
            Value::Number(1.0),
            Value::String("a".to_string()),
            Value::Null,
        ]);
        assert_eq!(list.to_string(), "[1, \"a\", null]");

        let object = Value::error_object("boom");
        assert_eq!(object.to_string(), "{error: \"boom\"}");
    }

    #[test]
    fn test_self_reference_display() {
        let object = Value::object(BTreeMap::new());
        let list = Value::list(vec![Value::Number(1.0)]);
        if let (Value::Object(entries), Value::List(items)) = (&object, &list) {
            entries.borrow_mut().insert("moi".to_string(), object.clone());
            entries.borrow_mut().insert("liste".to_string(), list.clone());
            items.borrow_mut().push(list.clone());
            items.borrow_mut().push(object.clone());
        }
        assert_eq!(list.to_string(), "[1, [Circulaire], {liste: [Circulaire], moi: [Circulaire]}]");
        assert_eq!(
            object.to_string(),
            "{liste: [1, [Circulaire], [Circulaire]], moi: [Circulaire]}"
        );
    }

    #[test]
    fn test_shared_value_is_not_circular() {
        let shared = Value::list(vec![Value::Number(2.0)]);
        let outer = Value::list(vec![shared.clone(), shared]);
        assert_eq!(outer.to_string(), "[[2], [2]]");
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(!Value::String(String::new()).is_truthy());
        assert!(Value::Number(-1.0).is_truthy());
        assert!(Value::list(vec![]).is_truthy());
    }

    #[test]
    fn test_strict_equality() {
        let list = Value::list(vec![]);
        assert!(list.strict_equals(&list.clone()));
        assert!(!list.strict_equals(&Value::list(vec![])));
        assert!(Value::String("a".into()).strict_equals(&Value::String("a".into())));
        assert!(!Value::Number(1.0).strict_equals(&Value::String("1".into())));
    }

    #[test]
    fn test_from_json() {
        let json: JsonValue = serde_json::from_str(r#"{"open": [22, 80], "host": "h"}"#).unwrap();
        let value = Value::from_json(&json);
        assert_eq!(value.to_string(), "{host: \"h\", open: [22, 80]}");
    }
}
