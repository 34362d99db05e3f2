//! Serde helpers for configuration values

/// `Duration` as whole seconds.
///
/// Written as an integer. Reads either an integer (`command_timeout = 120`)
/// or a string with an `s`, `m` or `h` suffix (`command_timeout = "2m"`).
pub mod duration_secs {
    use std::fmt;
    use std::time::Duration;

    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(SecondsVisitor)
    }

    struct SecondsVisitor;

    impl<'de> Visitor<'de> for SecondsVisitor {
        type Value = Duration;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("seconds as an integer, or a string like \"30s\", \"2m\" or \"1h\"")
        }

        fn visit_u64<E: de::Error>(self, secs: u64) -> Result<Duration, E> {
            Ok(Duration::from_secs(secs))
        }

        fn visit_i64<E: de::Error>(self, secs: i64) -> Result<Duration, E> {
            u64::try_from(secs)
                .map(Duration::from_secs)
                .map_err(|_| E::invalid_value(de::Unexpected::Signed(secs), &self))
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<Duration, E> {
            parse_duration(value).ok_or_else(|| E::invalid_value(de::Unexpected::Str(value), &self))
        }
    }

    fn parse_duration(value: &str) -> Option<Duration> {
        let value = value.trim();
        let split = value
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(value.len());
        let (digits, unit) = value.split_at(split);
        let amount: u64 = digits.parse().ok()?;
        let scale = match unit.trim() {
            "" | "s" => 1,
            "m" => 60,
            "h" => 3600,
            _ => return None,
        };
        amount.checked_mul(scale).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Deadline {
        #[serde(with = "duration_secs")]
        timeout: Duration,
    }

    fn from_toml(value: &str) -> Result<Deadline, toml::de::Error> {
        toml::from_str(&format!("timeout = {}", value))
    }

    #[test]
    fn test_writes_integer_seconds() {
        let json = serde_json::to_string(&Deadline {
            timeout: Duration::from_secs(120),
        })
        .unwrap();
        assert_eq!(json, r#"{"timeout":120}"#);
    }

    #[test]
    fn test_reads_integer_or_suffixed_string() {
        assert_eq!(from_toml("5").unwrap().timeout, Duration::from_secs(5));
        assert_eq!(from_toml("\"30s\"").unwrap().timeout, Duration::from_secs(30));
        assert_eq!(from_toml("\"2m\"").unwrap().timeout, Duration::from_secs(120));
        assert_eq!(from_toml("\"1h\"").unwrap().timeout, Duration::from_secs(3600));
        assert_eq!(from_toml("\"45\"").unwrap().timeout, Duration::from_secs(45));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(from_toml("-1").is_err());
        assert!(from_toml("\"soon\"").is_err());
        assert!(from_toml("\"5d\"").is_err());
        assert!(from_toml("\"m\"").is_err());
        assert!(from_toml("1.5").is_err());
    }
}
