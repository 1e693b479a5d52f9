//! Taxes, tax sets and tax-total rounding.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use realty_core::{DomainError, DomainResult};

/// Basis points in 100%.
pub const BASIS_POINTS: i128 = 10_000;

/// A tax applied on a line's net amount.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tax {
    pub code: String,
    /// Rate in basis points (1600 = 16%).
    pub rate_bp: u32,
}

impl Tax {
    pub fn new(code: impl Into<String>, rate_bp: u32) -> Self {
        Self {
            code: code.into(),
            rate_bp,
        }
    }
}

/// Set of taxes on a line. Two lines share a tax set iff the sets are equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaxSet(BTreeSet<Tax>);

impl TaxSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tax> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl FromIterator<Tax> for TaxSet {
    fn from_iter<I: IntoIterator<Item = Tax>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// How tax amounts are rounded on a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingMethod {
    /// Round each line's tax, then sum.
    #[default]
    PerLine,
    /// Sum the bases per tax, round once.
    Globally,
}

impl FromStr for RoundingMethod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "per_line" | "round_per_line" => Ok(RoundingMethod::PerLine),
            "globally" | "round_globally" => Ok(RoundingMethod::Globally),
            other => Err(DomainError::validation(format!(
                "unknown tax rounding method '{other}'"
            ))),
        }
    }
}

/// Base and amount of one tax over a whole document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxTotal {
    pub tax: Tax,
    pub base: i64,
    pub amount: i64,
}

/// `numerator / denominator` rounded half away from zero.
pub fn round_half_away(numerator: i128, denominator: i128) -> i128 {
    debug_assert!(denominator > 0);
    let quotient = numerator / denominator;
    let remainder = numerator % denominator;
    if remainder.abs() * 2 >= denominator {
        quotient + numerator.signum()
    } else {
        quotient
    }
}

fn tax_on(base: i128, rate_bp: u32) -> i128 {
    round_half_away(base * rate_bp as i128, BASIS_POINTS)
}

/// Narrow a document amount back to `i64`.
pub fn to_amount(value: i128) -> DomainResult<i64> {
    i64::try_from(value).map_err(|_| DomainError::invariant("tax document amount overflow"))
}

/// Tax totals for `(net base, tax set)` pairs, ordered by tax.
///
/// Fails when a base or an amount does not fit in `i64`.
pub fn compute_tax_totals<'a, I>(bases: I, method: RoundingMethod) -> DomainResult<Vec<TaxTotal>>
where
    I: IntoIterator<Item = (i64, &'a TaxSet)>,
{
    // tax -> (base, rounded-per-line amount)
    let mut acc: BTreeMap<&'a Tax, (i128, i128)> = BTreeMap::new();
    for (base, taxes) in bases {
        for tax in taxes.iter() {
            let entry = acc.entry(tax).or_insert((0, 0));
            entry.0 += base as i128;
            entry.1 += tax_on(base as i128, tax.rate_bp);
        }
    }

    acc.into_iter()
        .map(|(tax, (base, per_line))| {
            let amount = match method {
                RoundingMethod::PerLine => per_line,
                RoundingMethod::Globally => tax_on(base, tax.rate_bp),
            };
            Ok(TaxTotal {
                tax: tax.clone(),
                base: to_amount(base)?,
                amount: to_amount(amount)?,
            })
        })
        .collect()
}
