//! JSON conversion for the `json_parse`/`json_stringify` builtins (spec
//! §4.6 "JSON builtins ... wrap `serde_json::Value` with a bidirectional
//! conversion to/from the runtime `Value`").

use serde_json::Value as Json;

use crate::error::RuntimeError;
use crate::value::Value;

pub fn parse(text: &str) -> Result<Value, RuntimeError> {
    let json: Json =
        serde_json::from_str(text).map_err(|e| RuntimeError::other(format!("json_parse: {e}")))?;
    Ok(from_json(json))
}

pub fn stringify(value: &Value) -> Result<String, RuntimeError> {
    let json = to_json(value)?;
    serde_json::to_string(&json).map_err(|e| RuntimeError::other(format!("json_stringify: {e}")))
}

fn from_json(json: Json) -> Value {
    match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(b),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else {
                Value::Float(n.as_f64().unwrap_or(0.0))
            }
        }
        Json::String(s) => Value::Str(s),
        Json::Array(items) => Value::list(items.into_iter().map(from_json).collect()),
        Json::Object(map) => {
            Value::dict(map.into_iter().map(|(k, v)| (Value::Str(k), from_json(v))).collect())
        }
    }
}

fn to_json(value: &Value) -> Result<Json, RuntimeError> {
    Ok(match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => Json::Number((*i).into()),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(Json::Number)
            .ok_or_else(|| RuntimeError::other("json_stringify: non-finite float"))?,
        Value::Str(s) => Json::String(s.clone()),
        Value::List(items) => {
            let items = items.lock().expect("list mutex poisoned");
            Json::Array(items.iter().map(to_json).collect::<Result<_, _>>()?)
        }
        Value::Dict(d) => {
            let d = d.lock().expect("dict mutex poisoned");
            let mut map = serde_json::Map::new();
            for (k, v) in &d.0 {
                let key = match k {
                    Value::Str(s) => s.clone(),
                    other => other.to_string(),
                };
                map.insert(key, to_json(v)?);
            }
            Json::Object(map)
        }
        Value::Task(_) => return Err(RuntimeError::other("json_stringify: cannot serialize a task handle")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_an_object() {
        let text = r#"{"a":1,"b":[true,null,"x"]}"#;
        let value = parse(text).unwrap();
        let back = stringify(&value).unwrap();
        let reparsed = parse(&back).unwrap();
        assert!(crate::value::values_equal(&value, &reparsed));
    }

    #[test]
    fn parse_rejects_malformed_json() {
        assert!(parse("{not json").is_err());
    }

    #[test]
    fn integral_numbers_parse_as_int() {
        let value = parse("42").unwrap();
        assert!(matches!(value, Value::Int(42)));
    }
}
