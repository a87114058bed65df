use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

static GROUP_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,50}$").expect("static regex is valid"));

/// Name of a consumer group: the isolated message stream a producer pushes
/// into and a consumer pops from.
///
/// Constrained to `[A-Za-z0-9_-]{1,50}` so it can be used verbatim as a
/// durable-store collection name and as a cache keyspace segment.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConsumerGroup(String);

impl ConsumerGroup {
    /// Validates `name` against the consumer-group naming rule.
    pub fn parse(name: impl Into<String>) -> Result<Self, ConsumerGroupError> {
        let name = name.into();
        if GROUP_NAME_RE.is_match(&name) {
            Ok(Self(name))
        } else {
            Err(ConsumerGroupError::InvalidName(name))
        }
    }

    /// Borrowed view of the group name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the durable-store sub-collection holding this group's DLQ.
    pub fn dlq_collection(&self, suffix: &str) -> String {
        format!("{}{}", self.0, suffix)
    }

    /// Name of the cache keyspace entry for this group.
    pub fn cache_key(&self) -> String {
        format!("consumerGroupMessages:{}", self.0)
    }
}

impl fmt::Display for ConsumerGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ConsumerGroup {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// Serializes as a bare string; deserializing re-validates through `parse` so
// a malformed group name can never cross a wire boundary into a `Message`.
impl Serialize for ConsumerGroup {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ConsumerGroup {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        ConsumerGroup::parse(name).map_err(serde::de::Error::custom)
    }
}

/// Error returned when a consumer-group name fails validation.
#[derive(Debug, thiserror::Error)]
pub enum ConsumerGroupError {
    #[error("consumer group name {0:?} must match ^[A-Za-z0-9_-]{{1,50}}$")]
    InvalidName(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_names() {
        assert!(ConsumerGroup::parse("orders").is_ok());
        assert!(ConsumerGroup::parse("orders-v2_1").is_ok());
        assert!(ConsumerGroup::parse("a".repeat(50)).is_ok());
    }

    #[test]
    fn rejects_invalid_names() {
        assert!(ConsumerGroup::parse("").is_err());
        assert!(ConsumerGroup::parse("a".repeat(51)).is_err());
        assert!(ConsumerGroup::parse("has space").is_err());
        assert!(ConsumerGroup::parse("weird!").is_err());
    }

    #[test]
    fn derives_dlq_and_cache_names() {
        let g = ConsumerGroup::parse("orders").unwrap();
        assert_eq!(g.dlq_collection("-dlq"), "orders-dlq");
        assert_eq!(g.cache_key(), "consumerGroupMessages:orders");
    }
}
