use std::{cmp::Ordering, fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
#[error("Invalid version '{0}'")]
pub struct VersionParseError(String);

/// A dotted release number such as `2.13` or `3.0.0`.
///
/// Missing trailing components compare as zero, so `2.13 == 2.13.0`.
/// Development builds (`master`, `dev`) sort above every release.
#[derive(Debug, Clone)]
pub enum Version {
    Release(Vec<u64>),
    Development,
}

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if matches!(trimmed, "master" | "dev") {
            return Ok(Version::Development);
        }
        if trimmed.is_empty() {
            return Err(VersionParseError(s.to_string()));
        }
        trimmed
            .split('.')
            .map(|part| part.parse::<u64>())
            .collect::<Result<Vec<_>, _>>()
            .map(Version::Release)
            .map_err(|_| VersionParseError(s.to_string()))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Version::Development, Version::Development) => Ordering::Equal,
            (Version::Development, _) => Ordering::Greater,
            (_, Version::Development) => Ordering::Less,
            (Version::Release(a), Version::Release(b)) => {
                let len = a.len().max(b.len());
                (0..len)
                    .map(|i| {
                        let x = a.get(i).copied().unwrap_or(0);
                        let y = b.get(i).copied().unwrap_or(0);
                        x.cmp(&y)
                    })
                    .find(|ord| *ord != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            }
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Version::Development => write!(f, "master"),
            Version::Release(parts) => {
                let text: Vec<String> = parts.iter().map(u64::to_string).collect();
                write!(f, "{}", text.join("."))
            }
        }
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // An unquoted `2.10` is the float 2.1, so only whole numbers may be bare
        let value = serde_yaml::Value::deserialize(deserializer)?;
        let text = match value {
            serde_yaml::Value::String(s) => s,
            serde_yaml::Value::Number(n) if n.is_u64() => n.to_string(),
            serde_yaml::Value::Number(n) => {
                return Err(serde::de::Error::custom(format!(
                    "Version must be quoted, the bare number was read as {n}"
                )));
            }
            other => {
                return Err(serde::de::Error::custom(format!(
                    "Expected a version string, got {other:?}"
                )));
            }
        };
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!(v("2.13").to_string(), "2.13");
        assert_eq!(v(" 3.0.1 ").to_string(), "3.0.1");
        assert_eq!(v("master").to_string(), "master");
    }

    #[test]
    fn test_parse_invalid() {
        assert!("".parse::<Version>().is_err());
        assert!("2.x".parse::<Version>().is_err());
        assert!("2..1".parse::<Version>().is_err());
    }

    #[test]
    fn test_ordering_is_numeric() {
        assert!(v("2.10") > v("2.9"));
        assert!(v("3") > v("2.99.99"));
        assert!(v("2.13") < v("2.13.1"));
    }

    #[test]
    fn test_trailing_zeros_are_equal() {
        assert_eq!(v("2.13"), v("2.13.0"));
        assert_eq!(v("3"), v("3.0.0"));
    }

    #[test]
    fn test_development_is_newest() {
        assert!(v("dev") > v("99.0"));
        assert_eq!(v("dev"), v("master"));
    }

    #[test]
    fn test_deserialize_from_yaml_string_and_integer() {
        let from_string: Version = serde_yaml::from_str("\"2.10\"").unwrap();
        let from_integer: Version = serde_yaml::from_str("3").unwrap();
        assert!(from_string > v("2.9"));
        assert_eq!(from_integer, v("3.0"));
        assert!(serde_yaml::from_str::<Version>("[1, 2]").is_err());
    }

    #[test]
    fn test_deserialize_rejects_unquoted_float() {
        let err = serde_yaml::from_str::<Version>("2.10").unwrap_err();
        assert!(err.to_string().contains("must be quoted"));
        assert!(serde_yaml::from_str::<Version>("2.13").is_err());
    }
}
