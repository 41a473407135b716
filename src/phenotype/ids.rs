//! Identifiers carried by a phenotype request

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix of every locally assigned phenotype id.
///
/// Marks the term as not (yet) part of the canonical vocabulary.
pub const LOCAL_ID_PREFIX: &str = "NONHPO_";

/// Local identifier, assigned by the store on first save
///
/// Serializes as a plain string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhenotypeId(String);

impl PhenotypeId {
    /// Generate a fresh local id
    pub fn generate() -> Self {
        Self(format!("{}{}", LOCAL_ID_PREFIX, Uuid::new_v4().simple()))
    }

    /// Wrap an existing id string
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PhenotypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PhenotypeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PhenotypeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Reference to the tracked issue for a phenotype (e.g. a GitHub issue number)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssueNumber(String);

impl IssueNumber {
    pub fn new(number: impl Into<String>) -> Self {
        Self(number.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IssueNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for IssueNumber {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

impl From<&str> for IssueNumber {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_carry_local_prefix() {
        let id = PhenotypeId::generate();
        assert!(id.as_str().starts_with(LOCAL_ID_PREFIX));
        assert_ne!(id, PhenotypeId::generate());
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = PhenotypeId::from_string("NONHPO_abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"NONHPO_abc\"");

        let number: IssueNumber = serde_json::from_str("\"42\"").unwrap();
        assert_eq!(number, IssueNumber::from(42));
    }
}
