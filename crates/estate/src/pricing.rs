//! Price rules and derived property figures.

use crate::error::{EstateError, EstateResult};
use crate::offer::Offer;

/// Minimum selling price as a share of the expected price, in basis points.
pub const MIN_SELLING_RATIO_BP: u64 = 9_000;

/// Selling price, once set (non-zero), must be at least 90% of the expected price.
pub fn check_selling_price(expected_price: u64, selling_price: u64) -> EstateResult<()> {
    if selling_price == 0 {
        return Ok(());
    }
    let floor = (expected_price as u128) * (MIN_SELLING_RATIO_BP as u128);
    if (selling_price as u128) * 10_000 < floor {
        return Err(EstateError::PriceConstraintViolation {
            expected_price,
            selling_price,
        });
    }
    Ok(())
}

/// Highest offer price, `0` when no offers exist.
pub fn best_price(offers: &[Offer]) -> u64 {
    offers.iter().map(|o| o.price).max().unwrap_or(0)
}

pub fn total_area(living_area: u32, garden_area: u32) -> u32 {
    living_area.saturating_add(garden_area)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offer::{OfferId, OfferStatus};
    use chrono::NaiveDate;
    use realty_core::{AggregateId, PartnerId};

    fn offer(price: u64) -> Offer {
        Offer {
            id: OfferId::new(AggregateId::new()),
            partner_id: PartnerId::new(),
            price,
            validity_days: 7,
            created_on: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            status: OfferStatus::Pending,
        }
    }

    #[test]
    fn eighty_five_percent_is_rejected() {
        let err = check_selling_price(100_000, 85_000).unwrap_err();
        assert_eq!(
            err,
            EstateError::PriceConstraintViolation {
                expected_price: 100_000,
                selling_price: 85_000
            }
        );
    }

    #[test]
    fn exactly_ninety_percent_is_accepted() {
        assert!(check_selling_price(100_000, 90_000).is_ok());
        assert!(check_selling_price(100_000, 89_999).is_err());
    }

    #[test]
    fn unset_selling_price_is_not_checked() {
        assert!(check_selling_price(100_000, 0).is_ok());
    }

    #[test]
    fn best_price_is_max_or_zero() {
        assert_eq!(best_price(&[]), 0);
        assert_eq!(best_price(&[offer(10), offer(30), offer(20)]), 30);
    }

    #[test]
    fn total_area_sums_living_and_garden() {
        assert_eq!(total_area(120, 30), 150);
    }
}
