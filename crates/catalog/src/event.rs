use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use boxoffice_core::{DomainError, DomainResult, Entity, EventId, TierName, UserId, ValueObject};

/// A named ticket class with its price and seeded capacity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierDef {
    pub name: TierName,
    /// Price in smallest currency unit (e.g., cents).
    pub price: u64,
    /// Total inventory this tier is seeded with in the ledger.
    pub capacity: u32,
}

impl ValueObject for TierDef {}

/// Aggregate root: a catalog event and everything it sells.
///
/// Dates and tiers are owned value objects. The inventory counters themselves
/// live in the ledger; `capacity` here is only the seed value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventListing {
    pub id: EventId,
    pub name: String,
    pub description: Option<String>,
    pub venue: Option<String>,
    pub organiser: UserId,
    pub dates: Vec<DateTime<Utc>>,
    pub tiers: Vec<TierDef>,
    pub created_at: DateTime<Utc>,
}

impl Entity for EventListing {
    type Id = EventId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl EventListing {
    pub fn new(
        name: impl Into<String>,
        description: Option<String>,
        venue: Option<String>,
        organiser: UserId,
        dates: Vec<DateTime<Utc>>,
        tiers: Vec<TierDef>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("event name cannot be empty"));
        }

        for (i, tier) in tiers.iter().enumerate() {
            if tiers[..i].iter().any(|t| t.name == tier.name) {
                return Err(DomainError::validation(format!(
                    "duplicate tier '{}'",
                    tier.name
                )));
            }
        }

        Ok(Self {
            id: EventId::new(),
            name,
            description,
            venue,
            organiser,
            dates,
            tiers,
            created_at: now,
        })
    }

    /// Look up a tier definition by name.
    pub fn tier(&self, name: &TierName) -> Option<&TierDef> {
        self.tiers.iter().find(|t| &t.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tier(name: &str, price: u64, capacity: u32) -> TierDef {
        TierDef {
            name: TierName::new(name).unwrap(),
            price,
            capacity,
        }
    }

    #[test]
    fn creates_listing_with_owned_tiers_and_dates() {
        let listing = EventListing::new(
            "Omnifest",
            Some("three stages".to_string()),
            Some("Riverside".to_string()),
            UserId::new(),
            vec![Utc::now()],
            vec![tier("vip", 12_000, 50), tier("standard", 4_500, 500)],
            Utc::now(),
        )
        .unwrap();

        assert_eq!(listing.tiers.len(), 2);
        let vip = listing.tier(&TierName::new("vip").unwrap()).unwrap();
        assert_eq!(vip.price, 12_000);
        assert_eq!(vip.capacity, 50);
        assert!(listing.tier(&TierName::new("balcony").unwrap()).is_none());
    }

    #[test]
    fn rejects_empty_name() {
        let err = EventListing::new(
            "  ",
            None,
            None,
            UserId::new(),
            vec![],
            vec![],
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn rejects_duplicate_tier_names() {
        let err = EventListing::new(
            "Omnifest",
            None,
            None,
            UserId::new(),
            vec![],
            vec![tier("vip", 100, 1), tier("vip", 200, 2)],
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
