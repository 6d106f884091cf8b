//! Redaction helpers for secrets that flow through config and adapters.

use serde::Deserialize;

/// The redacted placeholder string.
pub const REDACTED: &str = "[REDACTED]";

/// Checks if an environment variable or config key likely names a secret.
///
/// # Examples
///
/// ```
/// use code_ingest_shared::is_secret_key;
///
/// assert!(is_secret_key("INGEST_EMBEDDING_API_KEY"));
/// assert!(!is_secret_key("INGEST_BATCH_SIZE"));
/// ```
#[must_use]
pub fn is_secret_key(key: &str) -> bool {
    let key = key.to_ascii_uppercase();
    key.contains("KEY")
        || key.contains("TOKEN")
        || key.contains("SECRET")
        || key.contains("PASSWORD")
        || key.contains("AUTH")
}

/// Returns [`REDACTED`] for secret keys, or the value unchanged.
#[must_use]
pub fn redact_if_secret(key: &str, value: &str) -> String {
    if is_secret_key(key) {
        REDACTED.to_string()
    } else {
        value.to_string()
    }
}

/// A secret string that never prints its value.
///
/// Deserializes from a plain string. It has no `Serialize` impl, so configs
/// that hold one must skip the field when written back out.
#[derive(Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "String")]
pub struct SecretString(Box<str>);

impl SecretString {
    /// Wrap a secret value.
    pub fn new(value: impl Into<Box<str>>) -> Self {
        Self(value.into())
    }

    /// Borrow the underlying secret.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(REDACTED)
    }
}

impl std::fmt::Display for SecretString {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(REDACTED)
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self(value.into_boxed_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_keys_are_detected() {
        assert!(is_secret_key("INGEST_QDRANT_API_KEY"));
        assert!(is_secret_key("access_token"));
        assert!(!is_secret_key("INGEST_QDRANT_URL"));
        assert_eq!(redact_if_secret("api_key", "sk-1"), REDACTED);
        assert_eq!(redact_if_secret("INGEST_MAX_WORKERS", "4"), "4");
    }

    #[test]
    fn secret_string_redacts_display_and_debug() -> Result<(), serde_json::Error> {
        let secret: SecretString = serde_json::from_str("\"sk-live\"")?;
        assert_eq!(secret.expose(), "sk-live");
        assert_eq!(secret.to_string(), REDACTED);
        assert_eq!(format!("{secret:?}"), REDACTED);
        Ok(())
    }
}
