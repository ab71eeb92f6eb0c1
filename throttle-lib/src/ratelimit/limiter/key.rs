use serde::{Deserialize, Serialize};
use std::fmt;

/// A normalized name identifying one external service, such as an AI
/// provider, for rate limiting purposes.
///
/// Names are trimmed and lowercased so that `Gemini` and `gemini ` share
/// a single limiter.
///
/// # Examples
///
/// ```
/// use throttle_lib::ratelimit::ServiceName;
///
/// let name = ServiceName::from(" Claude ");
/// assert_eq!(name.as_str(), "claude");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ServiceName(String);

impl ServiceName {
    /// Get the service name as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Get the service name as an owned String
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ServiceName {
    fn from(name: String) -> Self {
        ServiceName(name.trim().to_lowercase())
    }
}

impl From<&str> for ServiceName {
    fn from(name: &str) -> Self {
        ServiceName(name.trim().to_lowercase())
    }
}

impl From<ServiceName> for String {
    fn from(name: ServiceName) -> Self {
        name.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_service_name_normalization() {
        assert_eq!(ServiceName::from("GEMINI").as_str(), "gemini");
        assert_eq!(ServiceName::from("  claude\t").as_str(), "claude");
    }

    #[test]
    fn test_service_name_display() {
        let name = ServiceName::from("openai");
        assert_eq!(format!("{name}"), "openai");
    }

    #[test]
    fn test_service_name_hash_equality() {
        let mut map = HashMap::new();
        map.insert(ServiceName::from("Gemini"), "value");

        assert_eq!(map.get(&ServiceName::from("gemini")), Some(&"value"));
    }

    #[test]
    fn test_service_name_deserialization_normalizes() {
        let name: ServiceName = serde_json::from_str("\"Claude\"").unwrap();
        assert_eq!(name, ServiceName::from("claude"));
    }
}
