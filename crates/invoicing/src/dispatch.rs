//! Negative-line redistribution.
//!
//! Tax documents cannot carry negative lines. Each negative line of an
//! invoice is absorbed, as extra discount, by positive lines of the same
//! invoice sharing its tax set. Candidates are preferred in this order:
//!
//! 1. same product,
//! 2. remaining subtotal equal to the negative amount,
//! 3. largest remaining subtotal,
//! 4. input order.
//!
//! A negative line is left as an orphan when no candidate shares its tax set
//! or when the candidates together cannot absorb it. Orphans absorb nothing.
//! The sum of net amounts plus orphan amounts always equals the invoice total.

use std::cmp::Reverse;

use serde::{Deserialize, Serialize};

use realty_products::ProductId;

use crate::invoice::InvoiceLine;
use crate::tax::TaxSet;

/// A positive line after redistribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchedLine {
    pub line_no: u32,
    pub product_id: Option<ProductId>,
    pub label: String,
    pub quantity: i64,
    pub unit_price: u64,
    pub taxes: TaxSet,
    /// `quantity * unit_price`.
    pub gross: i64,
    /// Line discount plus every absorbed negative amount.
    pub discount: i64,
    pub net: i64,
}

/// A negative line that could not be absorbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrphanLine {
    pub line_no: u32,
    /// Negative subtotal of the line.
    pub amount: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dispatch {
    pub lines: Vec<DispatchedLine>,
    pub orphans: Vec<OrphanLine>,
}

impl Dispatch {
    pub fn is_clean(&self) -> bool {
        self.orphans.is_empty()
    }

    /// Net of dispatched lines (orphans excluded).
    pub fn net_total(&self) -> i64 {
        self.lines.iter().map(|l| l.net).sum()
    }

    pub fn orphan_total(&self) -> i64 {
        self.orphans.iter().map(|o| o.amount).sum()
    }
}

struct Slot<'a> {
    line: &'a InvoiceLine,
    subtotal: i64,
    remaining: i64,
}

fn same_product(a: &InvoiceLine, b: &InvoiceLine) -> bool {
    a.product_id.is_some() && a.product_id == b.product_id
}

/// Redistribute negative lines, in input order, onto positive lines.
pub fn dispatch_negative_lines(lines: &[InvoiceLine]) -> Dispatch {
    let mut slots: Vec<Slot<'_>> = lines
        .iter()
        .filter(|l| !l.is_negative())
        .map(|line| {
            let subtotal = line.subtotal();
            Slot {
                line,
                subtotal,
                remaining: subtotal,
            }
        })
        .collect();

    let mut orphans = Vec::new();

    for negative in lines.iter().filter(|l| l.is_negative()) {
        let amount = negative.subtotal();
        let magnitude = -amount;
        if magnitude == 0 {
            continue;
        }

        let mut candidates: Vec<usize> = slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.remaining > 0 && s.line.taxes == negative.taxes)
            .map(|(i, _)| i)
            .collect();

        let available: i128 = candidates.iter().map(|&i| slots[i].remaining as i128).sum();
        if candidates.is_empty() || available < magnitude as i128 {
            orphans.push(OrphanLine {
                line_no: negative.line_no,
                amount,
            });
            continue;
        }

        candidates.sort_by_key(|&i| {
            let slot = &slots[i];
            (
                !same_product(slot.line, negative),
                slot.remaining != magnitude,
                Reverse(slot.remaining),
                i,
            )
        });

        let mut left = magnitude;
        for i in candidates {
            if left == 0 {
                break;
            }
            let slot = &mut slots[i];
            let taken = left.min(slot.remaining);
            slot.remaining -= taken;
            left -= taken;
        }
    }

    let lines = slots
        .into_iter()
        .map(|slot| {
            let gross = slot.line.gross();
            DispatchedLine {
                line_no: slot.line.line_no,
                product_id: slot.line.product_id,
                label: slot.line.label.clone(),
                quantity: slot.line.quantity,
                unit_price: slot.line.unit_price,
                taxes: slot.line.taxes.clone(),
                gross,
                discount: (gross - slot.subtotal) + (slot.subtotal - slot.remaining),
                net: slot.remaining,
            }
        })
        .collect();

    Dispatch { lines, orphans }
}
