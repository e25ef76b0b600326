//! Price interpretation rules shared by listings, product pages, and
//! the cart.
//!
//! Upstream encodes "no sale" as a zero or absent sale price, so every
//! consumer must go through [`effective_price`] instead of reading the
//! sale field directly.

use crate::money::Money;
use crate::product::{Product, Variant};
use serde::{Deserialize, Serialize};

/// The price a shopper actually pays: the sale price when one is
/// active (positive), otherwise the base price.
pub fn effective_price(base: Money, sale: Option<Money>) -> Money {
    match sale {
        Some(s) if s.is_positive() => s,
        _ => base,
    }
}

/// Whether a visible discount applies: an active sale price strictly
/// below the base price. Equal or higher sale prices display as no
/// discount.
pub fn has_discount(base: Money, sale: Option<Money>) -> bool {
    matches!(sale, Some(s) if s.is_positive() && s.amount_cents < base.amount_cents)
}

/// Cheapest and dearest effective price across a template's variants.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PriceRange {
    pub min: Money,
    pub max: Money,
}

impl PriceRange {
    /// True when all variants share one effective price; callers render
    /// a single figure instead of a range.
    pub fn is_single(&self) -> bool {
        self.min == self.max
    }

    /// Display string: "$10.00 - $25.00", collapsed when single.
    pub fn display(&self) -> String {
        if self.is_single() {
            self.min.display()
        } else {
            format!("{} - {}", self.min.display(), self.max.display())
        }
    }
}

impl Variant {
    /// The price a shopper pays for this variant.
    pub fn effective_price(&self) -> Money {
        effective_price(self.base_price, self.sale_price)
    }

    /// Whether this variant shows a discount.
    pub fn has_discount(&self) -> bool {
        has_discount(self.base_price, self.sale_price)
    }
}

impl Product {
    /// The price a shopper pays for a simple product. Advisory only on
    /// templates; use [`Product::price_range`] or a resolved variant.
    pub fn effective_price(&self) -> Money {
        effective_price(self.base_price, self.sale_price)
    }

    /// Whether this product shows a discount.
    pub fn has_discount(&self) -> bool {
        has_discount(self.base_price, self.sale_price)
    }

    /// Min/max effective price over ALL variants, shown while no
    /// variant is resolved.
    ///
    /// Returns None when the product has no variants or no variant has
    /// a nonzero effective price (unpriced upstream data renders as
    /// "price unavailable", not as a zero range). Zero-priced variants
    /// still widen the range when priced siblings exist, so the bound
    /// `min <= effective_price(v) <= max` holds for every variant.
    pub fn price_range(&self) -> Option<PriceRange> {
        if self.variants.is_empty() {
            return None;
        }
        if self.variants.iter().all(|v| v.effective_price().is_zero()) {
            return None;
        }
        let mut min = self.variants[0].effective_price();
        let mut max = min;
        for variant in &self.variants[1..] {
            let price = variant.effective_price();
            if price.amount_cents < min.amount_cents {
                min = price;
            }
            if price.amount_cents > max.amount_cents {
                max = price;
            }
        }
        Some(PriceRange { min, max })
    }
}
