// Validator identities and shard identifiers
//
// SAFETY INVARIANTS:
// 1. Keys compare by their encoded string, so ordering is identical on every node
// 2. Keys decoded from the wire are non-empty base58

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CommitteeStateError, Result};

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Base58-encoded committee public key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidatorKey(String);

impl ValidatorKey {
    /// Wrap an already-trusted key string without validation.
    pub fn new(key: impl Into<String>) -> Self {
        ValidatorKey(key.into())
    }

    /// Decode a key coming from an instruction tuple.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(CommitteeStateError::malformed("empty committee public key"));
        }
        if let Some(bad) = raw.chars().find(|c| !BASE58_ALPHABET.contains(*c)) {
            return Err(CommitteeStateError::malformed(format!(
                "committee public key {} contains non-base58 character {:?}",
                raw, bad
            )));
        }
        Ok(ValidatorKey(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ValidatorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Shard identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShardId(pub u8);

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Penalty recorded against a committee member for the closing epoch.
///
/// Only presence in the penalty map decides slashing; the fields are carried
/// for reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Penalty {
    pub missed_signature_percent: u64,
    pub force_unstake: bool,
}

/// Parse a comma separated key list. An empty field is an empty list.
pub fn parse_key_list(csv: &str) -> Result<Vec<ValidatorKey>> {
    if csv.is_empty() {
        return Ok(Vec::new());
    }
    csv.split(',').map(ValidatorKey::parse).collect()
}

pub fn join_keys(keys: &[ValidatorKey]) -> String {
    keys.iter().map(ValidatorKey::as_str).collect::<Vec<_>>().join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rejects_non_base58() {
        assert!(ValidatorKey::parse("").is_err());
        assert!(ValidatorKey::parse("abc0").is_err());
        assert!(ValidatorKey::parse("OIl").is_err());
        assert!(ValidatorKey::parse("121VhftSAygpEJZ6i9jGk").is_ok());
    }

    #[test]
    fn test_key_list_round_trip() {
        let keys = parse_key_list("abc,def,ghi").unwrap();
        assert_eq!(keys.len(), 3);
        assert_eq!(join_keys(&keys), "abc,def,ghi");
        assert!(parse_key_list("").unwrap().is_empty());
        assert!(parse_key_list("abc,,def").is_err());
    }
}
