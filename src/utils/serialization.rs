// Bincode helpers for storage plus the canonical JSON form used for hashing and signing
use crate::error::{BlockchainError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Serialize data using bincode 2.0 with standard configuration
pub fn serialize<T: Serialize + bincode::Encode>(data: &T) -> Result<Vec<u8>> {
    let config = bincode::config::standard();
    bincode::encode_to_vec(data, config)
        .map_err(|e| BlockchainError::Serialization(format!("Serialization failed: {e}")))
}

/// Deserialize data using bincode 2.0 with standard configuration
pub fn deserialize<T>(bytes: &[u8]) -> Result<T>
where
    T: for<'de> Deserialize<'de> + bincode::Decode<()>,
{
    let config = bincode::config::standard();
    let (data, _) = bincode::decode_from_slice(bytes, config)
        .map_err(|e| BlockchainError::Serialization(format!("Deserialization failed: {e}")))?;
    Ok(data)
}

/// Rebuilds `value` with every object's keys inserted in sorted order, so the
/// output does not depend on how the map was populated.
pub fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), sort_keys(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

/// Compact JSON with sorted keys
pub fn canonical_json(value: &Value) -> Vec<u8> {
    // Writing a Value into a Vec cannot fail: keys are strings and there is no I/O.
    serde_json::to_vec(&sort_keys(value)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
    struct TestData {
        id: u64,
        name: String,
        values: Vec<i32>,
    }

    #[test]
    fn test_serialize_deserialize() {
        let original = TestData {
            id: 42,
            name: "test".to_string(),
            values: vec![1, 2, 3, 4, 5],
        };

        let serialized = serialize(&original).expect("Serialization should work");
        let deserialized: TestData = deserialize(&serialized).expect("Deserialization should work");

        assert_eq!(original, deserialized);
    }

    #[test]
    fn test_deserialize_invalid_data() {
        let invalid_bytes = vec![0xFF, 0xFF, 0xFF, 0xFF];
        let result: Result<TestData> = deserialize(&invalid_bytes);
        assert!(result.is_err());
    }

    #[test]
    fn test_canonical_json_ignores_insertion_order() {
        let mut first = Map::new();
        first.insert("zeta".to_string(), json!(1));
        first.insert("alpha".to_string(), json!({"b": 2, "a": 1}));

        let mut second = Map::new();
        second.insert("alpha".to_string(), json!({"a": 1, "b": 2}));
        second.insert("zeta".to_string(), json!(1));

        let a = canonical_json(&Value::Object(first));
        let b = canonical_json(&Value::Object(second));
        assert_eq!(a, b);
        assert_eq!(
            String::from_utf8(a).unwrap(),
            r#"{"alpha":{"a":1,"b":2},"zeta":1}"#
        );
    }
}
