//! Estate rule violations.

use thiserror::Error;

use realty_core::DomainError;

use crate::state::PropertyState;

pub type EstateResult<T> = Result<T, EstateError>;

/// Failure of a property/offer action.
///
/// Every variant aborts the triggering action; the property is left exactly as
/// it was before the command.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EstateError {
    #[error("cannot {action} a property in state '{from}'")]
    InvalidTransition {
        from: PropertyState,
        action: &'static str,
    },

    #[error("this offer has already been refused")]
    OfferAlreadyRefused,

    #[error("an offer has already been accepted for this property")]
    OfferAlreadyAcceptedElsewhere,

    #[error("this property has already been sold")]
    PropertyAlreadySold,

    #[error("this property has been canceled")]
    PropertyCanceled,

    #[error("this offer has already been accepted")]
    OfferAlreadyAccepted,

    #[error(
        "selling price {selling_price} cannot be lower than 90% of the expected price {expected_price}"
    )]
    PriceConstraintViolation {
        expected_price: u64,
        selling_price: u64,
    },

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl EstateError {
    /// Stable machine-readable code (used by the HTTP layer).
    pub fn code(&self) -> &'static str {
        match self {
            EstateError::InvalidTransition { .. } => "invalid_transition",
            EstateError::OfferAlreadyRefused => "offer_already_refused",
            EstateError::OfferAlreadyAcceptedElsewhere => "offer_already_accepted_elsewhere",
            EstateError::PropertyAlreadySold => "property_already_sold",
            EstateError::PropertyCanceled => "property_canceled",
            EstateError::OfferAlreadyAccepted => "offer_already_accepted",
            EstateError::PriceConstraintViolation { .. } => "price_constraint_violation",
            EstateError::Domain(e) => e.code(),
        }
    }
}
