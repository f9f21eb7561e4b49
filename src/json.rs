use crate::GispError;
use crate::ast::{Key, Value};
use crate::env::Toolbox;
use std::collections::BTreeMap;
use std::str::FromStr;

impl Value {
    /// Convert a serde_json value; objects become maps with string keys
    pub fn from_json(json: serde_json::Value) -> Result<Value, GispError> {
        match json {
            serde_json::Value::Null => Ok(Value::Nil),
            serde_json::Value::Bool(b) => Ok(Value::Bool(b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::Int(i))
                } else if let Some(x) = n.as_f64() {
                    Ok(Value::Float(x))
                } else {
                    Err(GispError::EvalError(format!(
                        "Number not representable: {}",
                        n
                    )))
                }
            }
            serde_json::Value::String(s) => Ok(Value::Str(s)),
            serde_json::Value::Array(items) => {
                let converted = items
                    .into_iter()
                    .map(Value::from_json)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::list(converted))
            }
            serde_json::Value::Object(entries) => {
                let converted = entries
                    .into_iter()
                    .map(|(k, v)| Ok((Key::Str(k), Value::from_json(v)?)))
                    .collect::<Result<Vec<_>, GispError>>()?;
                Ok(Value::map(converted))
            }
        }
    }

    /// Convert back to JSON. Functions have no JSON form.
    pub fn to_json(&self) -> Result<serde_json::Value, GispError> {
        match self {
            Value::Nil => Ok(serde_json::Value::Null),
            Value::Int(n) => Ok(serde_json::Value::from(*n)),
            Value::Float(x) => serde_json::Number::from_f64(*x)
                .map(serde_json::Value::Number)
                .ok_or_else(|| GispError::EvalError(format!("{} has no JSON form", x))),
            Value::Bool(b) => Ok(serde_json::Value::Bool(*b)),
            Value::Str(s) => Ok(serde_json::Value::String(s.clone())),
            Value::Atom(atom) => Ok(serde_json::Value::String(atom.name.clone())),
            Value::List(items) => items
                .borrow()
                .iter()
                .map(Value::to_json)
                .collect::<Result<Vec<_>, _>>()
                .map(serde_json::Value::Array),
            Value::Map(entries) => {
                let mut object = serde_json::Map::new();
                for (key, value) in entries.borrow().iter() {
                    let name = match key {
                        Key::Str(s) | Key::Atom(s) => s.clone(),
                        other => other.to_string(),
                    };
                    object.insert(name, value.to_json()?);
                }
                Ok(serde_json::Value::Object(object))
            }
            Value::Function(func) => Err(GispError::EvalError(format!(
                "function {} has no JSON form",
                func.name()
            ))),
        }
    }
}

/// A toolbox populated from a JSON object document
#[derive(Debug, Clone, Default)]
pub struct JsonToolbox {
    entries: BTreeMap<String, Value>,
}

impl JsonToolbox {
    pub fn from_json(json: serde_json::Value) -> Result<Self, GispError> {
        let serde_json::Value::Object(object) = json else {
            return Err(GispError::EvalError(
                "toolbox document must be a JSON object".to_string(),
            ));
        };
        let mut entries = BTreeMap::new();
        for (name, value) in object {
            entries.insert(name, Value::from_json(value)?);
        }
        Ok(JsonToolbox { entries })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl FromStr for JsonToolbox {
    type Err = GispError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let json: serde_json::Value = serde_json::from_str(input)
            .map_err(|e| GispError::EvalError(format!("Invalid JSON: {}", e)))?;
        JsonToolbox::from_json(json)
    }
}

impl Toolbox for JsonToolbox {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.entries.get(name).map(Value::deep_clone)
    }
}
