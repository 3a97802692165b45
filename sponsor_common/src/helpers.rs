/// Parse a boolean flag from an (environment) string value, or return the given default value otherwise.
pub fn parse_boolean_flag(value: Option<String>, default: bool) -> bool {
    let Some(value) = value else {
        return default;
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

/// Buyers have no accounts. Their e-mail address is their identity, so every comparison must use this form.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
