//! Canonical signatures for inline service definitions.
//!
//! Inline (custom) services carry no identifier, so they cannot be paired by
//! id the way references are. Each definition is flattened into one string of
//! key/value text and its characters are sorted, which makes the signature
//! independent of key order and of the order of list values.

use serde_json::{Map, Value};

/// Compute the order-independent signature of one inline service.
///
/// List values contribute one `key + item` fragment per item. Null values
/// contribute nothing, so an omitted field and an explicit null sign the same.
pub fn service_signature(service: &Map<String, Value>) -> String {
    let mut raw = String::new();
    for (key, value) in service {
        match value {
            Value::Null => {}
            Value::Array(items) => {
                for item in items {
                    raw.push_str(key);
                    raw.push_str(&value_text(item));
                }
            }
            other => {
                raw.push_str(key);
                raw.push_str(&value_text(other));
            }
        }
    }

    let mut chars: Vec<char> = raw.chars().collect();
    chars.sort_unstable();
    chars.into_iter().collect()
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::service_signature;

    fn sign(value: serde_json::Value) -> String {
        service_signature(value.as_object().expect("object"))
    }

    #[test]
    fn key_and_list_order_do_not_matter() {
        let a = sign(json!({
            "resource_type": "L4PortSetNSService",
            "l4_protocol": "TCP",
            "destination_ports": ["443", "80"]
        }));
        let b = sign(json!({
            "destination_ports": ["80", "443"],
            "l4_protocol": "TCP",
            "resource_type": "L4PortSetNSService"
        }));
        assert_eq!(a, b);
    }

    #[test]
    fn different_ports_sign_differently() {
        let a = sign(json!({"l4_protocol": "TCP", "destination_ports": ["443"]}));
        let b = sign(json!({"l4_protocol": "TCP", "destination_ports": ["22"]}));
        assert_ne!(a, b);
    }

    #[test]
    fn null_and_empty_list_contribute_nothing() {
        let a = sign(json!({"protocol_number": 6, "source_ports": [], "alg": null}));
        let b = sign(json!({"protocol_number": 6}));
        assert_eq!(a, b);
    }
}
