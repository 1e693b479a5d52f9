//! Offers made by partners on a property.

use chrono::{NaiveDate, TimeDelta};
use serde::{Deserialize, Serialize};

use realty_core::{AggregateId, DomainError, DomainResult, Entity, PartnerId};

/// Validity applied when an offer is made without an explicit one.
pub const DEFAULT_VALIDITY_DAYS: i64 = 7;

/// Offer identifier (unique within its property).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OfferId(pub AggregateId);

impl OfferId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for OfferId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferStatus {
    Pending,
    Accepted,
    Refused,
}

/// Offer entity, owned by its `Property`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub id: OfferId,
    pub partner_id: PartnerId,
    /// Price in smallest currency unit.
    pub price: u64,
    pub validity_days: i64,
    pub created_on: NaiveDate,
    pub status: OfferStatus,
}

impl Offer {
    /// Absolute deadline derived from the validity.
    pub fn date_deadline(&self) -> NaiveDate {
        // validity is range-checked on every write
        deadline_from_validity(self.created_on, self.validity_days).unwrap_or(self.created_on)
    }

    pub fn is_pending(&self) -> bool {
        self.status == OfferStatus::Pending
    }
}

impl Entity for Offer {
    type Id = OfferId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// `created_on + validity_days`.
pub fn deadline_from_validity(created_on: NaiveDate, validity_days: i64) -> DomainResult<NaiveDate> {
    if validity_days < 0 {
        return Err(DomainError::validation("offer validity cannot be negative"));
    }
    TimeDelta::try_days(validity_days)
        .and_then(|delta| created_on.checked_add_signed(delta))
        .ok_or_else(|| DomainError::validation("offer deadline is out of range"))
}

/// Inverse of [`deadline_from_validity`]: whole days between creation and deadline.
pub fn validity_from_deadline(created_on: NaiveDate, deadline: NaiveDate) -> DomainResult<i64> {
    let days = deadline.signed_duration_since(created_on).num_days();
    if days < 0 {
        return Err(DomainError::validation(
            "offer deadline cannot precede the offer creation date",
        ));
    }
    Ok(days)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn validity_ten_gives_deadline_ten_days_later() {
        let created = day(2024, 1, 1);
        assert_eq!(deadline_from_validity(created, 10).unwrap(), day(2024, 1, 11));
    }

    #[test]
    fn deadline_five_days_later_gives_validity_five() {
        let created = day(2024, 1, 1);
        assert_eq!(validity_from_deadline(created, day(2024, 1, 6)).unwrap(), 5);
    }

    #[test]
    fn long_validity_counts_whole_days_across_months() {
        let created = day(2024, 1, 1);
        assert_eq!(validity_from_deadline(created, day(2024, 3, 1)).unwrap(), 60);
    }

    #[test]
    fn deadline_before_creation_is_rejected() {
        let err = validity_from_deadline(day(2024, 1, 10), day(2024, 1, 9)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert!(deadline_from_validity(day(2024, 1, 10), -1).is_err());
    }

    proptest! {
        /// Property: validity and deadline are two views of the same quantity.
        #[test]
        fn validity_and_deadline_round_trip(days in 0i64..20_000) {
            let created = day(2020, 2, 29);
            let deadline = deadline_from_validity(created, days).unwrap();
            prop_assert_eq!(validity_from_deadline(created, deadline).unwrap(), days);
        }
    }
}
