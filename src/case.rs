//! Request bodies arrive with camelCase keys; columns are snake_case.

use serde_json::{Map, Value};

/// `"phoneNumber"` -> `"phone_number"`. Already snake_case input is unchanged.
pub fn to_snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Rename the top-level keys of a request body to snake_case.
pub fn object_keys_to_snake_case(obj: Map<String, Value>) -> Map<String, Value> {
    obj.into_iter().map(|(k, v)| (to_snake_case(&k), v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_to_snake_case() {
        assert_eq!(to_snake_case("phoneNumber"), "phone_number");
        assert_eq!(to_snake_case("preferredDrink"), "preferred_drink");
        assert_eq!(to_snake_case("tenant_id"), "tenant_id");
        assert_eq!(to_snake_case("name"), "name");
    }

    #[test]
    fn test_body_keys_renamed() {
        let body = json!({"phoneNumber": "555", "tenantId": "other"});
        let out = object_keys_to_snake_case(body.as_object().cloned().unwrap());
        assert_eq!(out.get("phone_number"), Some(&json!("555")));
        assert_eq!(out.get("tenant_id"), Some(&json!("other")));
        assert!(out.get("phoneNumber").is_none());
    }
}
