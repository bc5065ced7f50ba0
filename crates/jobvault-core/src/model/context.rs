//! Blob de contexto de ejecución: datos clave→valor producidos por el job en
//! curso. El repositorio no interpreta su contenido.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionContext {
    entries: IndexMap<String, Value>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(Value::as_str)
    }

    pub fn get_long(&self, key: &str) -> Option<i64> {
        self.entries.get(key).and_then(Value::as_i64)
    }

    pub fn get_double(&self, key: &str) -> Option<f64> {
        self.entries.get(key).and_then(Value::as_f64)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    /// Representación anidada (objeto JSON) usada en el documento almacenado.
    pub fn to_value(&self) -> Value {
        Value::Object(self.entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }
}

impl FromIterator<(String, Value)> for ExecutionContext {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self { entries: iter.into_iter().collect() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn typed_getters() {
        let mut ctx = ExecutionContext::new();
        ctx.put("file", "input.csv");
        ctx.put("offset", 120);
        ctx.put("ratio", 0.75);
        ctx.put("nested", json!({"a": [1, 2]}));
        assert_eq!(ctx.get_string("file"), Some("input.csv"));
        assert_eq!(ctx.get_long("offset"), Some(120));
        assert_eq!(ctx.get_double("ratio"), Some(0.75));
        assert_eq!(ctx.get_long("file"), None);
        assert_eq!(ctx.remove("offset"), Some(json!(120)));
        assert_eq!(ctx.len(), 3);
        assert_eq!(ctx.to_value(), json!({"file": "input.csv", "ratio": 0.75, "nested": {"a": [1, 2]}}));
    }
}
