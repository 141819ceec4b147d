//! API keys that never print.

use secrecy::{ExposeSecret, SecretBox};
use std::fmt;

/// A secret string that won't be logged or displayed.
pub struct SecretString(SecretBox<str>);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretBox::new(Box::from(value.into().trim())))
    }

    /// Only call this when actually sending the secret.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn is_blank(&self) -> bool {
        self.expose().is_empty()
    }

    /// `Authorization` header value; keys stored with their scheme are sent as-is.
    pub fn bearer(&self) -> String {
        let key = self.expose();
        if key.starts_with("Bearer ") {
            key.to_string()
        } else {
            format!("Bearer {}", key)
        }
    }
}

impl Clone for SecretString {
    fn clone(&self) -> Self {
        Self::new(self.expose())
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_never_formats() {
        let secret = SecretString::new("sk-super-secret-key");
        assert_eq!(format!("{:?}", secret), "[REDACTED]");
        assert_eq!(format!("{}", secret), "[REDACTED]");
        assert_eq!(secret.expose(), "sk-super-secret-key");
    }

    #[test]
    fn test_bearer_header() {
        assert_eq!(SecretString::new("jina_abc").bearer(), "Bearer jina_abc");
        assert_eq!(SecretString::new("Bearer jina_abc").bearer(), "Bearer jina_abc");
    }

    #[test]
    fn test_blank_after_trim() {
        assert!(SecretString::new("  \n").is_blank());
        assert!(!SecretString::new(" k ").is_blank());
    }
}
