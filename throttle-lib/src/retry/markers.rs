use regex::{RegexBuilder, RegexSet, RegexSetBuilder};
use serde::{Deserialize, Serialize, Serializer};

use crate::{ConfigError, Result};

/// Phrases providers use when they are overloaded or rate limiting
pub const DEFAULT_TRANSIENT_MARKERS: [&str; 2] = ["overload", "rate[ _-]?limit"];

/// Case-insensitive patterns identifying transient failures by their
/// message, for providers that do not report a usable status code.
///
/// # Examples
///
/// ```
/// use throttle_lib::retry::MarkerSet;
///
/// let markers = MarkerSet::default();
/// assert!(markers.is_match("Model is OVERLOADED, try again later"));
/// assert!(markers.is_match("rate_limit_error"));
/// assert!(!markers.is_match("invalid api key"));
/// ```
#[derive(Debug, Clone)]
pub struct MarkerSet {
    set: RegexSet,
}

impl MarkerSet {
    /// Compile the given patterns
    ///
    /// # Errors
    ///
    /// Returns an error naming the first pattern that is not a valid regex
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns: Vec<String> = patterns
            .into_iter()
            .map(|p| p.as_ref().to_string())
            .collect();

        // Compile one by one first so the error names the culprit
        for pattern in &patterns {
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|source| ConfigError::InvalidMarker {
                    pattern: pattern.clone(),
                    source: Box::new(source),
                })?;
        }

        let set = RegexSetBuilder::new(&patterns)
            .case_insensitive(true)
            .build()
            .map_err(|source| ConfigError::InvalidMarker {
                pattern: patterns.join(", "),
                source: Box::new(source),
            })?;
        Ok(Self { set })
    }

    /// A set that matches nothing, leaving classification to status codes
    #[must_use]
    pub fn empty() -> Self {
        Self {
            set: RegexSet::empty(),
        }
    }

    /// Whether any marker occurs in `message`
    #[must_use]
    pub fn is_match(&self, message: &str) -> bool {
        self.set.is_match(message)
    }

    /// The source patterns
    #[must_use]
    pub fn patterns(&self) -> &[String] {
        self.set.patterns()
    }

    /// Whether the set has no patterns
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }
}

impl Default for MarkerSet {
    fn default() -> Self {
        RegexSetBuilder::new(DEFAULT_TRANSIENT_MARKERS)
            .case_insensitive(true)
            .build()
            .map_or_else(|_| Self::empty(), |set| Self { set })
    }
}

impl PartialEq for MarkerSet {
    fn eq(&self, other: &Self) -> bool {
        self.patterns() == other.patterns()
    }
}

impl Serialize for MarkerSet {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.patterns().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for MarkerSet {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let patterns = Vec::<String>::deserialize(deserializer)?;
        Self::new(patterns).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_default_markers_compile() {
        let markers = MarkerSet::default();
        assert_eq!(markers.patterns().len(), DEFAULT_TRANSIENT_MARKERS.len());
    }

    #[rstest]
    #[case("The model is overloaded", true)]
    #[case("Overloaded", true)]
    #[case("Rate limit exceeded", true)]
    #[case("RATE-LIMIT reached", true)]
    #[case("ratelimited", true)]
    #[case("model not found", false)]
    #[case("", false)]
    fn test_default_markers(#[case] message: &str, #[case] expected: bool) {
        assert_eq!(MarkerSet::default().is_match(message), expected);
    }

    #[test]
    fn test_custom_markers() {
        let markers = MarkerSet::new(["capacity", "try again"]).unwrap();
        assert!(markers.is_match("No capacity available"));
        assert!(markers.is_match("Please TRY AGAIN later"));
        assert!(!markers.is_match("overloaded"));
    }

    #[test]
    fn test_invalid_marker_is_named() {
        let err = MarkerSet::new(["fine", "(unclosed"]).unwrap_err();
        match err {
            ConfigError::InvalidMarker { pattern, .. } => assert_eq!(pattern, "(unclosed"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_set_matches_nothing() {
        let markers = MarkerSet::empty();
        assert!(markers.is_empty());
        assert!(!markers.is_match("overloaded"));
    }

    #[test]
    fn test_serde_round_trip_keeps_patterns() {
        let markers = MarkerSet::new(["overload"]).unwrap();
        let json = serde_json::to_string(&markers).unwrap();
        assert_eq!(json, r#"["overload"]"#);

        let back: MarkerSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, markers);
        assert!(serde_json::from_str::<MarkerSet>(r#"["("]"#).is_err());
    }
}
