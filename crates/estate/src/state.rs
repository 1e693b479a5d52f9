//! Property sale state machine.
//!
//! ```text
//! new -> offer_received -> offer_accepted -> sold
//!   \__________\_________________\_______-> canceled
//! ```
//!
//! `sold` and `canceled` are terminal and mutually exclusive.

use serde::{Deserialize, Serialize};

use crate::error::{EstateError, EstateResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyState {
    New,
    OfferReceived,
    OfferAccepted,
    Sold,
    Canceled,
}

impl PropertyState {
    pub fn as_str(self) -> &'static str {
        match self {
            PropertyState::New => "new",
            PropertyState::OfferReceived => "offer_received",
            PropertyState::OfferAccepted => "offer_accepted",
            PropertyState::Sold => "sold",
            PropertyState::Canceled => "canceled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PropertyState::Sold | PropertyState::Canceled)
    }

    /// Target of a `mark_sold` action.
    ///
    /// Returns `None` when the property is already sold (no transition).
    pub fn sell(self) -> EstateResult<Option<PropertyState>> {
        match self {
            PropertyState::Canceled => Err(EstateError::InvalidTransition {
                from: self,
                action: "sell",
            }),
            PropertyState::Sold => Ok(None),
            _ => Ok(Some(PropertyState::Sold)),
        }
    }

    /// Target of a `mark_canceled` action.
    ///
    /// Returns `None` when the property is already canceled (no transition).
    pub fn cancel(self) -> EstateResult<Option<PropertyState>> {
        match self {
            PropertyState::Sold => Err(EstateError::InvalidTransition {
                from: self,
                action: "cancel",
            }),
            PropertyState::Canceled => Ok(None),
            _ => Ok(Some(PropertyState::Canceled)),
        }
    }

    /// State after an offer has been attached.
    pub fn after_offer_received(self) -> PropertyState {
        match self {
            PropertyState::New => PropertyState::OfferReceived,
            other => other,
        }
    }

    /// Whether an offer may be accepted for a property in this state.
    pub fn ensure_offer_acceptable(self) -> EstateResult<()> {
        match self {
            PropertyState::OfferAccepted => Err(EstateError::OfferAlreadyAcceptedElsewhere),
            PropertyState::Sold => Err(EstateError::PropertyAlreadySold),
            PropertyState::Canceled => Err(EstateError::PropertyCanceled),
            PropertyState::New | PropertyState::OfferReceived => Ok(()),
        }
    }
}

impl core::fmt::Display for PropertyState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
