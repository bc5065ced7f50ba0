//! JSON canónico: claves de objeto ordenadas, sin espacios. Dos valores
//! semánticamente iguales producen el mismo texto, condición necesaria para
//! que el digest de parámetros sea estable entre procesos.

use std::collections::BTreeMap;

use serde_json::Value;

pub fn to_canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, String> = map.iter().map(|(k, v)| (k, to_canonical_json(v))).collect();
            let items: Vec<String> = sorted.into_iter()
                                           .map(|(k, v)| format!("{}:{}", Value::String(k.clone()), v))
                                           .collect();
            format!("{{{}}}", items.join(","))
        }
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(to_canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        // Escalares: la forma Display de serde_json ya es JSON compacto.
        scalar => scalar.to_string(),
    }
}

/// Digest blake3 (hex, 64 caracteres) de la forma canónica de `value`.
pub fn canonical_digest(value: &Value) -> String {
    blake3::hash(to_canonical_json(value).as_bytes()).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_matter() {
        let a = json!({"b": 1, "a": {"y": "x", "x": [1, 2]}});
        let b = json!({"a": {"x": [1, 2], "y": "x"}, "b": 1});
        assert_eq!(to_canonical_json(&a), to_canonical_json(&b));
        assert_eq!(to_canonical_json(&a), r#"{"a":{"x":[1,2],"y":"x"},"b":1}"#);
    }

    #[test]
    fn digest_is_stable_hex() {
        let d = canonical_digest(&json!({"b": 1, "a": 2}));
        assert_eq!(d.len(), 64);
        assert_eq!(d, canonical_digest(&json!({"a": 2, "b": 1})));
        assert_ne!(d, canonical_digest(&json!({"a": 2})));
    }

    #[test]
    fn strings_are_escaped() {
        assert_eq!(to_canonical_json(&json!("a\"b")), r#""a\"b""#);
    }
}
