use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use realty_core::{DomainError, DomainResult};
use realty_estate::{Property, PropertyState};
use realty_invoicing::tax::{BASIS_POINTS, round_half_away};
use realty_invoicing::{InvoiceId, InvoiceLine, IssueInvoice, TaxSet};

pub const SELLING_PRICE_LABEL: &str = "selling price";
pub const ADMIN_FEE_LABEL: &str = "administrative fees";

/// Amounts charged to the buyer of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingPolicy {
    /// Commission added on top of the selling price, in basis points.
    pub commission_bp: u32,
    /// Flat fee in smallest currency unit.
    pub administrative_fee: u64,
}

impl Default for BillingPolicy {
    fn default() -> Self {
        Self {
            commission_bp: 600,
            administrative_fee: 10_000,
        }
    }
}

impl BillingPolicy {
    /// `selling_price * (1 + commission)`, rounded half away from zero.
    pub fn selling_line_price(&self, selling_price: u64) -> DomainResult<u64> {
        let factor = BASIS_POINTS + self.commission_bp as i128;
        let price = round_half_away(selling_price as i128 * factor, BASIS_POINTS);
        u64::try_from(price)
            .map_err(|_| DomainError::invariant("selling price with commission overflows"))
    }
}

/// Invoice issued to the buyer of a sold property.
///
/// Fails when the property is not sold, has no buyer, or when the priced
/// lines do not fit in an amount.
pub fn sale_invoice(
    property: &Property,
    invoice_id: InvoiceId,
    policy: &BillingPolicy,
    occurred_at: DateTime<Utc>,
) -> DomainResult<IssueInvoice> {
    if property.state() != PropertyState::Sold {
        return Err(DomainError::invariant("only sold properties are billed"));
    }
    let tenant_id = property
        .tenant_id()
        .ok_or_else(|| DomainError::invariant("property has no tenant"))?;
    let partner_id = property
        .buyer_id()
        .ok_or_else(|| DomainError::validation("sold property has no buyer"))?;

    let selling_line_price = policy.selling_line_price(property.selling_price())?;

    Ok(IssueInvoice {
        tenant_id,
        invoice_id,
        partner_id,
        reference: property.name().to_string(),
        lines: vec![
            InvoiceLine {
                line_no: 1,
                product_id: None,
                label: SELLING_PRICE_LABEL.to_string(),
                quantity: 1,
                unit_price: selling_line_price,
                discount_bp: 0,
                taxes: TaxSet::empty(),
            },
            InvoiceLine {
                line_no: 2,
                product_id: None,
                label: ADMIN_FEE_LABEL.to_string(),
                quantity: 1,
                unit_price: policy.administrative_fee,
                discount_bp: 0,
                taxes: TaxSet::empty(),
            },
        ],
        occurred_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use realty_core::{Aggregate, AggregateId, PartnerId, TenantId, UserId};
    use realty_estate::{
        ConfirmOffer, CreateProperty, MarkSold, OfferId, PropertyCommand, PropertyDetails,
        PropertyId, ReceiveOffer,
    };

    fn sold_property(with_buyer: bool) -> Property {
        let tenant_id = TenantId::new();
        let property_id = PropertyId::new(AggregateId::new());
        let mut property = Property::empty(property_id);
        let now = Utc::now();

        property
            .execute(&PropertyCommand::CreateProperty(CreateProperty {
                tenant_id,
                property_id,
                details: PropertyDetails::new("Seaside House", 200_000_00),
                salesperson_id: None,
                actor: UserId::new(),
                occurred_at: now,
            }))
            .unwrap();

        if with_buyer {
            let offer_id = OfferId::new(AggregateId::new());
            property
                .execute(&PropertyCommand::ReceiveOffer(ReceiveOffer {
                    tenant_id,
                    property_id,
                    offer_id,
                    partner_id: PartnerId::new(),
                    price: 190_000_00,
                    validity_days: None,
                    occurred_at: now,
                }))
                .unwrap();
            property
                .execute(&PropertyCommand::ConfirmOffer(ConfirmOffer {
                    tenant_id,
                    property_id,
                    offer_id,
                    occurred_at: now,
                }))
                .unwrap();
        }

        property
            .execute(&PropertyCommand::MarkSold(MarkSold {
                tenant_id,
                property_id,
                occurred_at: now,
            }))
            .unwrap();
        property
    }

    #[test]
    fn invoice_carries_commission_and_fee() {
        let property = sold_property(true);
        let cmd = sale_invoice(
            &property,
            InvoiceId::new(AggregateId::new()),
            &BillingPolicy::default(),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(cmd.partner_id, property.buyer_id().unwrap());
        assert_eq!(cmd.reference, "Seaside House");
        assert_eq!(cmd.lines.len(), 2);
        assert_eq!(cmd.lines[0].label, SELLING_PRICE_LABEL);
        assert_eq!(cmd.lines[0].unit_price, 201_400_00);
        assert_eq!(cmd.lines[1].label, ADMIN_FEE_LABEL);
        assert_eq!(cmd.lines[1].unit_price, 100_00);
    }

    #[test]
    fn commission_is_rounded_to_the_minor_unit() {
        let policy = BillingPolicy::default();
        // 125 * 1.06 = 132.5
        assert_eq!(policy.selling_line_price(125).unwrap(), 133);
        assert_eq!(policy.selling_line_price(0).unwrap(), 0);
    }

    #[test]
    fn commission_past_the_amount_range_is_rejected() {
        let policy = BillingPolicy::default();
        assert!(matches!(
            policy.selling_line_price(u64::MAX),
            Err(DomainError::InvariantViolation(_))
        ));
        // 1.06 * p stays within u64 here
        assert!(policy.selling_line_price(u64::MAX / 10_600 * 10_000).is_ok());
    }

    #[test]
    fn property_without_buyer_is_not_billed() {
        let property = sold_property(false);
        let err = sale_invoice(
            &property,
            InvoiceId::new(AggregateId::new()),
            &BillingPolicy::default(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
