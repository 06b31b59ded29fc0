use serde_json::Value;

/// Settings key under which the feature flag is persisted.
pub const FLAG_KEY: &str = "pdfOpenerEnabled";

/// Value assumed when nothing has been persisted yet.
pub const DEFAULT_ENABLED: bool = true;

/// Reads the flag out of a stored value. Non-boolean values count as absent.
pub fn flag_from_stored(value: Option<&Value>) -> Option<bool> {
    value.and_then(Value::as_bool)
}

pub fn enabled_or_default(flag: Option<bool>) -> bool {
    flag.unwrap_or(DEFAULT_ENABLED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absent_or_malformed_values_fall_back_to_enabled() {
        assert!(enabled_or_default(flag_from_stored(None)));
        assert!(enabled_or_default(flag_from_stored(Some(&json!("no")))));
        assert!(!enabled_or_default(flag_from_stored(Some(&json!(false)))));
    }
}
