//! The runtime `Value` (spec §3 "Runtime Value", §4.6 "Value semantics").
//!
//! Lists and dicts are reference types (`Arc<Mutex<_>>`), not owned-by-value
//! collections: the compiler never emits a store-back after `IndexSet`
//! (`xs[0] = 1` compiles to load `xs`, load `0`, push `1`, `IndexSet` with no
//! following `Store`/`GStore`), so a mutation through one binding must be
//! visible through every other binding aliasing the same list — exactly the
//! reference semantics the teacher's own `Value` gives its `Variant`/closure
//! payloads via `Arc`. `Mutex` rather than `RefCell` because a deep-cloned
//! snapshot handed to a spawned task (spec §5 "copy-on-spawn isolation")
//! must cross into a `may` coroutine that can run on another OS thread, so
//! `Value` has to be `Send`.
//!
//! `spawn` still gets the isolation spec §4.6 requires: [`deep_clone`]
//! rebuilds fresh `Arc<Mutex<_>>` nodes with recursively cloned contents,
//! severing all aliasing, rather than just bumping a reference count.

use std::cmp::Ordering;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::scheduler::TaskHandle;

/// An insertion-ordered association list. Dicts in practice are small
/// (builtin catalogues, JSON objects, user config), so linear lookup is
/// simpler and just as fast as a hash map, and it sidesteps the question of
/// how to `Hash` a `Value` that may contain floats.
#[derive(Debug, Default)]
pub struct Dict(pub Vec<(Value, Value)>);

impl Dict {
    pub fn new() -> Self {
        Dict(Vec::new())
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.0.iter().find(|(k, _)| values_equal(k, key)).map(|(_, v)| v)
    }

    pub fn set(&mut self, key: Value, value: Value) {
        if let Some(slot) = self.0.iter_mut().find(|(k, _)| values_equal(k, &key)) {
            slot.1 = value;
        } else {
            self.0.push((key, value));
        }
    }

    pub fn contains_key(&self, key: &Value) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> Vec<Value> {
        self.0.iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub type ListRef = Arc<Mutex<Vec<Value>>>;
pub type DictRef = Arc<Mutex<Dict>>;

#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(ListRef),
    Dict(DictRef),
    Task(TaskHandle),
}

impl Value {
    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Arc::new(Mutex::new(items)))
    }

    pub fn dict(entries: Vec<(Value, Value)>) -> Value {
        Value::Dict(Arc::new(Mutex::new(Dict(entries))))
    }
}

/// Severs aliasing for `spawn`'s globals snapshot (spec §5).
pub fn deep_clone(v: &Value) -> Value {
    match v {
        Value::List(items) => {
            let items = items.lock().expect("list mutex poisoned");
            Value::list(items.iter().map(deep_clone).collect())
        }
        Value::Dict(d) => {
            let d = d.lock().expect("dict mutex poisoned");
            Value::dict(d.0.iter().map(|(k, v)| (deep_clone(k), deep_clone(v))).collect())
        }
        other => other.clone(),
    }
}

/// Numeric equality tolerance (spec §4.6: "numeric equality compares by
/// float value with machine-epsilon tolerance").
const EPSILON: f64 = 1e-9;

fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

/// Structural equality (spec §4.6 "Equality compares structurally for
/// collections"; §8 "Deep dict equality is order-independent on keys").
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::List(x), Value::List(y)) => {
            if Arc::ptr_eq(x, y) {
                return true;
            }
            let x = x.lock().expect("list mutex poisoned");
            let y = y.lock().expect("list mutex poisoned");
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(a, b)| values_equal(a, b))
        }
        (Value::Dict(x), Value::Dict(y)) => {
            if Arc::ptr_eq(x, y) {
                return true;
            }
            let x = x.lock().expect("dict mutex poisoned");
            let y = y.lock().expect("dict mutex poisoned");
            x.len() == y.len()
                && x.0.iter().all(|(k, v)| y.get(k).is_some_and(|v2| values_equal(v, v2)))
        }
        (Value::Task(x), Value::Task(y)) => x.id == y.id,
        _ => match (as_f64(a), as_f64(b)) {
            (Some(x), Some(y)) => (x - y).abs() < EPSILON,
            _ => false,
        },
    }
}

/// Ordering (spec §4.6: "numeric or lexicographic (byte-wise) on strings
/// only"). Returns `None` for any other pairing (lists, dicts, task
/// handles, null, bool, or mixed types) — callers turn that into a
/// `RuntimeError`.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => Some(x.as_bytes().cmp(y.as_bytes())),
        _ => match (as_f64(a), as_f64(b)) {
            (Some(x), Some(y)) => x.partial_cmp(&y),
            _ => None,
        },
    }
}

/// Truthiness (spec §4.6: "null/false/0/empty-string/empty-collection are
/// falsy; everything else truthy").
pub fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Int(i) => *i != 0,
        Value::Float(f) => *f != 0.0,
        Value::Str(s) => !s.is_empty(),
        Value::List(l) => !l.lock().expect("list mutex poisoned").is_empty(),
        Value::Dict(d) => !d.lock().expect("dict mutex poisoned").is_empty(),
        Value::Task(_) => true,
    }
}

pub fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Int(_) => "integer",
        Value::Float(_) => "floating",
        Value::Str(_) => "string",
        Value::List(_) => "list",
        Value::Dict(_) => "dict",
        Value::Task(_) => "task_handle",
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::List(items) => {
                let items = items.lock().expect("list mutex poisoned");
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Dict(d) => {
                let d = d.lock().expect("dict mutex poisoned");
                write!(f, "{{")?;
                for (i, (k, v)) in d.0.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Value::Task(t) => write!(f, "<task {}>", t.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_equality_has_epsilon_tolerance() {
        assert!(values_equal(&Value::Float(0.1 + 0.2), &Value::Float(0.3)));
        assert!(values_equal(&Value::Int(2), &Value::Int(2)));
        assert!(!values_equal(&Value::Int(2), &Value::Int(3)));
    }

    #[test]
    fn int_and_float_cross_compare_numerically() {
        assert!(values_equal(&Value::Int(2), &Value::Float(2.0)));
    }

    #[test]
    fn string_ordering_is_byte_wise() {
        assert_eq!(
            compare_values(&Value::Str("a".into()), &Value::Str("b".into())),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn lists_and_dicts_have_no_ordering() {
        assert_eq!(compare_values(&Value::list(vec![]), &Value::list(vec![])), None);
    }

    #[test]
    fn dict_equality_is_order_independent_on_keys() {
        let a = Value::dict(vec![
            (Value::Str("x".into()), Value::Int(1)),
            (Value::Str("y".into()), Value::Int(2)),
        ]);
        let b = Value::dict(vec![
            (Value::Str("y".into()), Value::Int(2)),
            (Value::Str("x".into()), Value::Int(1)),
        ]);
        assert!(values_equal(&a, &b));
    }

    #[test]
    fn truthiness_matches_spec() {
        assert!(!is_truthy(&Value::Null));
        assert!(!is_truthy(&Value::Bool(false)));
        assert!(!is_truthy(&Value::Int(0)));
        assert!(!is_truthy(&Value::Str(String::new())));
        assert!(!is_truthy(&Value::list(vec![])));
        assert!(is_truthy(&Value::Int(-1)));
        assert!(is_truthy(&Value::Str("0".into())));
    }

    #[test]
    fn list_is_a_reference_type() {
        let list = Value::list(vec![Value::Int(1)]);
        let alias = list.clone();
        if let Value::List(items) = &list {
            items.lock().unwrap().push(Value::Int(2));
        }
        assert!(values_equal(&list, &alias));
    }

    #[test]
    fn deep_clone_severs_aliasing() {
        let list = Value::list(vec![Value::Int(1)]);
        let cloned = deep_clone(&list);
        if let Value::List(items) = &list {
            items.lock().unwrap().push(Value::Int(2));
        }
        assert!(!values_equal(&list, &cloned));
    }
}
