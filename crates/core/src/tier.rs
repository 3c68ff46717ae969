//! Tier names: the named ticket classes an event sells (e.g. "vip", "standard").

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// A validated tier name.
///
/// Tier names key inventory together with the event id, so they are trimmed
/// and compared case-sensitively exactly as stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TierName(String);

impl TierName {
    pub const MAX_LEN: usize = 64;

    pub fn new(name: impl Into<String>) -> DomainResult<Self> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("tier name cannot be empty"));
        }
        if trimmed.len() > Self::MAX_LEN {
            return Err(DomainError::validation(format!(
                "tier name exceeds {} bytes",
                Self::MAX_LEN
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for TierName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl core::str::FromStr for TierName {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_and_keeps_case() {
        let t = TierName::new("  VIP ").unwrap();
        assert_eq!(t.as_str(), "VIP");
    }

    #[test]
    fn rejects_empty() {
        assert!(TierName::new("   ").is_err());
    }

    #[test]
    fn rejects_oversized() {
        assert!(TierName::new("x".repeat(65)).is_err());
    }
}
