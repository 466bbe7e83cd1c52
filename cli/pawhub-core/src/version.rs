use std::fmt;

use serde::de::Error;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A compile-time pinned schema version for state files.
///
/// `Version<V>` serializes as the integer `V` and fails to deserialize from
/// any other value, so a reader of an incompatible state file errors out
/// early instead of misinterpreting its contents.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Version<const V: u8>;

impl<const V: u8> fmt::Display for Version<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{V}")
    }
}

impl<const V: u8> Serialize for Version<V> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(V)
    }
}

impl<'de, const V: u8> Deserialize<'de> for Version<V> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let version = u8::deserialize(deserializer)?;
        if version != V {
            return Err(D::Error::custom(format!(
                "unsupported state file version {version}, expected {V}"
            )));
        }
        Ok(Version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, Serialize)]
    struct State {
        version: Version<1>,
    }

    #[test]
    fn serializes_as_integer() {
        let json = serde_json::to_string(&State { version: Version }).unwrap();
        assert_eq!(json, r#"{"version":1}"#);
    }

    #[test]
    fn rejects_other_versions() {
        let parsed = serde_json::from_str::<State>(r#"{"version":2}"#);
        assert!(parsed.is_err());
    }
}
