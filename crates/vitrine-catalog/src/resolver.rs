//! Attribute selection and variant resolution.
//!
//! A template product is purchasable only through exactly one of its
//! variants. The shopper narrows the family by picking a value per
//! axis; resolution maps the current picks to one of four states and
//! the purchase gate decides what the buy panel may show.
//!
//! Two matching modes exist and stay separate on purpose. Resolution
//! demands a complete selection and a unique variant before anything
//! is purchasable. Filtering answers "which variants are still in
//! play" for a partial selection and powers price-list style browsing.

use crate::money::Money;
use crate::pricing::PriceRange;
use crate::product::{AttributeValue, Product, Variant};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// SKU shown while no variant is resolved.
pub const SKU_PLACEHOLDER: &str = "-";

/// The shopper's current attribute choices for one template product.
///
/// At most one value per axis; setting an axis again replaces the
/// earlier pick. Order of picking carries no meaning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    values: Vec<AttributeValue>,
}

impl Selection {
    /// Create an empty selection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick a value on an axis, replacing any earlier pick there.
    pub fn set(&mut self, attribute: impl Into<String>, value: impl Into<String>) {
        let attribute = attribute.into();
        let value = value.into();
        if let Some(existing) = self.values.iter_mut().find(|av| av.attribute == attribute) {
            existing.value = value;
        } else {
            self.values.push(AttributeValue::new(attribute, value));
        }
    }

    /// Drop the pick on one axis. Returns whether anything was picked.
    pub fn clear_axis(&mut self, attribute: &str) -> bool {
        let before = self.values.len();
        self.values.retain(|av| av.attribute != attribute);
        self.values.len() < before
    }

    /// Drop all picks (navigation away, product switch).
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// The picked value on an axis, if any.
    pub fn get(&self, attribute: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|av| av.attribute == attribute)
            .map(|av| av.value.as_str())
    }

    /// All picks, in pick order.
    pub fn values(&self) -> &[AttributeValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Where the shopper stands between "nothing picked" and "exactly one
/// variant".
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<'a> {
    /// Nothing picked yet.
    NoSelection,
    /// Some axes picked, not all.
    Partial { chosen: usize, axes: usize },
    /// Complete selection, exactly one variant matches.
    Resolved(&'a Variant),
    /// Complete selection, but zero or several variants match. The
    /// combination cannot be priced, so purchase stays locked.
    Ambiguous,
}

impl<'a> Resolution<'a> {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::NoSelection => "no_selection",
            Resolution::Partial { .. } => "partial",
            Resolution::Resolved(_) => "resolved",
            Resolution::Ambiguous => "ambiguous",
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }

    /// The resolved variant, when there is one.
    pub fn variant(&self) -> Option<&'a Variant> {
        match self {
            Resolution::Resolved(v) => Some(v),
            _ => None,
        }
    }
}

/// Whether a variant agrees with every picked value. Axes the shopper
/// has not picked don't constrain the match.
fn matches_selection(variant: &Variant, selection: &Selection) -> bool {
    selection
        .values()
        .iter()
        .all(|picked| variant.value_for(&picked.attribute) == Some(picked.value.as_str()))
}

/// Resolve the current selection against a template's variant family.
///
/// Synchronous and order-independent: only the current picks matter,
/// never the sequence they were made in. Simple products have nothing
/// to resolve and stay at [`Resolution::NoSelection`].
pub fn resolve<'a>(product: &'a Product, selection: &Selection) -> Resolution<'a> {
    if !product.is_template() || product.attributes.is_empty() {
        return Resolution::NoSelection;
    }
    if selection.is_empty() {
        return Resolution::NoSelection;
    }

    let axes = product.axis_count();
    let chosen = product
        .attributes
        .iter()
        .filter(|axis| selection.get(&axis.name).is_some())
        .count();
    if chosen < axes {
        return Resolution::Partial { chosen, axes };
    }

    // Complete coverage: count exact matches among well-formed variants.
    // Variants missing an axis value can never be the unique answer.
    let mut matched: Option<&Variant> = None;
    let mut match_count = 0usize;
    for variant in &product.variants {
        if !variant.is_total_assignment(&product.attributes) {
            continue;
        }
        if matches_selection(variant, selection) {
            match_count += 1;
            matched = Some(variant);
        }
    }

    match (match_count, matched) {
        (1, Some(variant)) => Resolution::Resolved(variant),
        (0, _) => {
            warn!(
                product = %product.sku,
                selection = ?selection.values(),
                "complete selection matches no variant"
            );
            Resolution::Ambiguous
        }
        (n, _) => {
            warn!(
                product = %product.sku,
                matches = n,
                "complete selection matches several variants"
            );
            Resolution::Ambiguous
        }
    }
}

/// All variants still compatible with a (possibly partial) selection.
///
/// Superset matching: a variant stays in play when it agrees on every
/// picked axis, regardless of unpicked ones. An empty selection keeps
/// the whole family. This is browsing semantics; it never decides
/// purchasability.
pub fn filter_variants<'a>(product: &'a Product, selection: &Selection) -> Vec<&'a Variant> {
    product
        .variants
        .iter()
        .filter(|v| matches_selection(v, selection))
        .collect()
}

/// What the buy panel may show right now.
#[derive(Debug, Clone, PartialEq)]
pub enum PurchaseGate {
    /// No purchasable target: show the family price range (when one
    /// exists) and the SKU placeholder; quantity and add-to-cart stay
    /// disabled.
    Locked { price_range: Option<PriceRange> },
    /// One concrete target: its SKU, effective price, and stock.
    Unlocked { sku: String, price: Money, stock: i64 },
}

impl PurchaseGate {
    pub fn is_unlocked(&self) -> bool {
        matches!(self, PurchaseGate::Unlocked { .. })
    }

    /// SKU to render: the real one when unlocked, the placeholder
    /// otherwise.
    pub fn display_sku(&self) -> &str {
        match self {
            PurchaseGate::Unlocked { sku, .. } => sku,
            PurchaseGate::Locked { .. } => SKU_PLACEHOLDER,
        }
    }
}

/// Decide the buy panel state for a product under a resolution.
///
/// Simple products are always unlocked on their own SKU. Templates
/// unlock only on [`Resolution::Resolved`]; a shopper never buys
/// against an ambiguous price.
pub fn purchase_gate(product: &Product, resolution: &Resolution<'_>) -> PurchaseGate {
    if !product.is_template() {
        return PurchaseGate::Unlocked {
            sku: product.sku.clone(),
            price: product.effective_price(),
            stock: product.aggregate_stock(),
        };
    }
    match resolution {
        Resolution::Resolved(variant) => PurchaseGate::Unlocked {
            sku: variant.sku.clone(),
            price: variant.effective_price(),
            stock: variant.aggregate_stock(),
        },
        _ => PurchaseGate::Locked {
            price_range: product.price_range(),
        },
    }
}

/// Selection state held by one product page: the product under view
/// plus the shopper's picks, re-resolved after every change.
///
/// Created on mount, cleared on navigation. Thin sugar over
/// [`resolve`] and [`purchase_gate`] so callers can't forget to
/// re-derive after a pick.
#[derive(Debug, Clone)]
pub struct VariantPicker<'a> {
    product: &'a Product,
    selection: Selection,
}

impl<'a> VariantPicker<'a> {
    pub fn new(product: &'a Product) -> Self {
        Self {
            product,
            selection: Selection::new(),
        }
    }

    /// Pick a value and return the resulting resolution.
    pub fn select(
        &mut self,
        attribute: impl Into<String>,
        value: impl Into<String>,
    ) -> Resolution<'a> {
        self.selection.set(attribute, value);
        self.resolution()
    }

    /// Drop one axis pick and return the resulting resolution.
    pub fn clear_axis(&mut self, attribute: &str) -> Resolution<'a> {
        self.selection.clear_axis(attribute);
        self.resolution()
    }

    /// Drop all picks (navigation away).
    pub fn clear(&mut self) {
        self.selection.clear();
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn resolution(&self) -> Resolution<'a> {
        resolve(self.product, &self.selection)
    }

    pub fn gate(&self) -> PurchaseGate {
        purchase_gate(self.product, &self.resolution())
    }

    /// Variants compatible with the current picks (browsing semantics).
    pub fn compatible_variants(&self) -> Vec<&'a Variant> {
        filter_variants(self.product, &self.selection)
    }
}
