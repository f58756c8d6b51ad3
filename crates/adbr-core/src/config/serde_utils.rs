//! Shared serialization/deserialization utilities for configuration

/// Duration fields written either as whole seconds or as a suffixed string.
///
/// Accepted forms: `3`, `"3"`, `"3s"`, `"500ms"`, `"2m"`. Whole-second
/// durations are written back as integers, anything finer as milliseconds.
pub mod duration {
    use serde::{self, de, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Secs(u64),
        Text(String),
    }

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() == 0 {
            serializer.serialize_u64(duration.as_secs())
        } else {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Raw::deserialize(deserializer)? {
            Raw::Secs(secs) => Ok(Duration::from_secs(secs)),
            Raw::Text(text) => parse(&text).map_err(de::Error::custom),
        }
    }

    /// Parse a suffixed duration string
    pub fn parse(text: &str) -> Result<Duration, String> {
        let text = text.trim();
        let (digits, millis_per_unit) = if let Some(n) = text.strip_suffix("ms") {
            (n, 1)
        } else if let Some(n) = text.strip_suffix('s') {
            (n, 1_000)
        } else if let Some(n) = text.strip_suffix('m') {
            (n, 60_000)
        } else {
            (text, 1_000)
        };

        digits
            .trim()
            .parse::<u64>()
            .ok()
            .and_then(|n| n.checked_mul(millis_per_unit))
            .map(Duration::from_millis)
            .ok_or_else(|| format!("invalid duration {:?}", text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct TestConfig {
        #[serde(with = "duration")]
        interval: Duration,
    }

    #[test]
    fn test_integer_seconds() {
        let config: TestConfig = serde_json::from_str(r#"{"interval":3}"#).unwrap();
        assert_eq!(config.interval, Duration::from_secs(3));
        assert_eq!(serde_json::to_string(&config).unwrap(), r#"{"interval":3}"#);
    }

    #[test]
    fn test_suffixed_strings() {
        assert_eq!(duration::parse("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(duration::parse("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(duration::parse("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(duration::parse(" 7 ").unwrap(), Duration::from_secs(7));
        assert!(duration::parse("soon").is_err());
    }

    #[test]
    fn test_sub_second_written_as_millis() {
        let config = TestConfig {
            interval: Duration::from_millis(1500),
        };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(json, r#"{"interval":"1500ms"}"#);
        let parsed: TestConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
