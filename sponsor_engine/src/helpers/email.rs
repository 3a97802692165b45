use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

/// A shape check only: something, an `@`, and a domain with a dot. Delivery is the real test.
pub fn is_plausible_email(email: &str) -> bool {
    email.len() <= 254 && EMAIL.is_match(email)
}
