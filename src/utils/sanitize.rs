use serde_json::Value;

/// Sanitizes sensitive fields in JSON payloads for logging
pub fn sanitize_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sanitized = serde_json::Map::new();
            for (key, val) in map {
                let sanitized_val = if is_sensitive_field(key) {
                    mask_value(val)
                } else {
                    sanitize_json(val)
                };
                sanitized.insert(key.clone(), sanitized_val);
            }
            Value::Object(sanitized)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sanitize_json).collect()),
        _ => value.clone(),
    }
}

// payment_proof carries base64 image data; the rest are credentials.
fn is_sensitive_field(key: &str) -> bool {
    matches!(
        key.to_lowercase().as_str(),
        "payment_proof" | "email" | "password" | "secret" | "token" | "api_key" | "authorization"
    )
}

fn mask_value(value: &Value) -> Value {
    match value {
        Value::String(s) if s.len() > 8 && s.is_ascii() => {
            let visible = &s[..4];
            let masked = "****";
            let end = &s[s.len() - 4..];
            Value::String(format!("{}{}{}", visible, masked, end))
        }
        _ => Value::String("****".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sanitize_payment_proof() {
        let input = json!({
            "payment_proof": "data:image/png;base64,iVBORw0KGgoAAAANSUhEUg",
            "quantity": 2
        });

        let sanitized = sanitize_json(&input);
        let proof = sanitized["payment_proof"].as_str().unwrap();

        assert!(proof.contains("****"));
        assert_eq!(sanitized["quantity"], 2);
    }

    #[test]
    fn test_sanitize_email() {
        let input = json!({
            "email": "attendee@example.com",
            "full_name": "Dina Larasati"
        });

        let sanitized = sanitize_json(&input);
        assert!(sanitized["email"].as_str().unwrap().contains("****"));
        assert_eq!(sanitized["full_name"], "Dina Larasati");
    }

    #[test]
    fn test_sanitize_nested() {
        let input = json!({
            "user": {
                "password": "hunter2hunter2",
                "points": 10000
            }
        });

        let sanitized = sanitize_json(&input);
        assert!(sanitized["user"]["password"]
            .as_str()
            .unwrap()
            .contains("****"));
        assert_eq!(sanitized["user"]["points"], 10000);
    }

    #[test]
    fn test_short_values_fully_masked() {
        let input = json!({ "token": "abc" });
        let sanitized = sanitize_json(&input);
        assert_eq!(sanitized["token"], "****");
    }
}
