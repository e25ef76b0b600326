//! Canonical cart line and the normalization boundary.
//!
//! Cart records written over the years exist in several shapes: lines
//! without a kind tag, images that are sometimes a URL and sometimes a
//! bare item code, prices as raw cent counts. Everything read from
//! storage passes through [`RawLine::normalize`] exactly once, so only
//! one canonical [`CartLine`] shape exists past this module.

use serde::{Deserialize, Serialize};
use tracing::warn;
use vitrine_catalog::pricing::effective_price;
use vitrine_catalog::product::{AttributeValue, Product, Variant};
use vitrine_catalog::{Currency, LineId, Money, ProductId};

/// What a cart line represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum LineKind {
    /// A single purchasable item (simple product or resolved variant).
    #[default]
    Item,
    /// A fixed composition of items, mutated only as a unit.
    Bundle,
}

impl LineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineKind::Item => "item",
            LineKind::Bundle => "bundle",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "item" => Some(LineKind::Item),
            "bundle" => Some(LineKind::Bundle),
            _ => None,
        }
    }
}

/// A display image reference, disambiguated at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ImageRef {
    /// Directly renderable URL.
    Url(String),
    /// Item code the image service resolves to a URL.
    ItemCode(String),
}

impl ImageRef {
    /// Classify a legacy image string: anything path- or scheme-shaped
    /// is a URL, the rest is an item code.
    pub fn classify(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.contains("://") || trimmed.starts_with("//") || trimmed.starts_with('/') {
            ImageRef::Url(trimmed.to_string())
        } else {
            ImageRef::ItemCode(trimmed.to_string())
        }
    }

    /// The renderable URL, when already resolved.
    pub fn url(&self) -> Option<&str> {
        match self {
            ImageRef::Url(url) => Some(url),
            ImageRef::ItemCode(_) => None,
        }
    }

    /// The item code still needing resolution.
    pub fn item_code(&self) -> Option<&str> {
        match self {
            ImageRef::ItemCode(code) => Some(code),
            ImageRef::Url(_) => None,
        }
    }
}

/// Merge key for add-to-cart: two candidates with the same identity
/// land on one line.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LineIdentity {
    /// SKU-based identity; the variant SKU distinguishes siblings of
    /// one template.
    Sku {
        sku: String,
        variant_sku: Option<String>,
    },
    /// Fallback for records without a SKU.
    Product(ProductId),
}

/// One line of the durable cart record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    /// Stable identifier, assigned when the line is created.
    pub line_id: LineId,
    /// What this line represents.
    pub kind: LineKind,
    /// Product the line came from.
    pub product_id: ProductId,
    /// Family or item SKU. May be empty on legacy records.
    pub sku: String,
    /// Resolved variant SKU, when the line came from a template.
    #[serde(default)]
    pub variant_sku: Option<String>,
    /// Display name, denormalized at add time.
    pub name: String,
    /// Display image reference.
    #[serde(default)]
    pub image: Option<ImageRef>,
    /// Currency of the prices below.
    #[serde(default)]
    pub currency: Currency,
    /// Regular unit price at add time.
    pub base_price: Money,
    /// Sale unit price at add time; active when positive.
    #[serde(default)]
    pub sale_price: Option<Money>,
    /// Units of this line. Never below 1; removal is explicit.
    pub quantity: i64,
    /// Stock figure captured at add time (refreshed on re-add); the
    /// increment ceiling.
    #[serde(default)]
    pub available_stock: i64,
    /// Whether this line may exist at zero stock for quotation.
    #[serde(default)]
    pub allow_quote: bool,
    /// Attribute picks the line was resolved from, for display.
    #[serde(default)]
    pub attribute_values: Vec<AttributeValue>,
    /// Components of a bundle: display-only, never mutated one by one.
    #[serde(default)]
    pub bundle_items: Vec<CartLine>,
    /// Unix timestamp the line was first added.
    #[serde(default)]
    pub added_at: i64,
}

impl CartLine {
    /// Create a new item line with quantity 1.
    pub fn new(
        product_id: ProductId,
        sku: impl Into<String>,
        name: impl Into<String>,
        base_price: Money,
    ) -> Self {
        Self {
            line_id: LineId::generate(),
            kind: LineKind::Item,
            product_id,
            sku: sku.into(),
            variant_sku: None,
            name: name.into(),
            image: None,
            currency: base_price.currency,
            base_price,
            sale_price: None,
            quantity: 1,
            available_stock: 0,
            allow_quote: false,
            attribute_values: Vec::new(),
            bundle_items: Vec::new(),
            added_at: current_timestamp(),
        }
    }

    /// Create a bundle line with its display components.
    pub fn bundle(
        product_id: ProductId,
        sku: impl Into<String>,
        name: impl Into<String>,
        base_price: Money,
        components: Vec<CartLine>,
    ) -> Self {
        let mut line = Self::new(product_id, sku, name, base_price);
        line.kind = LineKind::Bundle;
        line.bundle_items = components;
        line
    }

    pub fn with_variant_sku(mut self, variant_sku: impl Into<String>) -> Self {
        self.variant_sku = Some(variant_sku.into());
        self
    }

    pub fn with_sale_price(mut self, sale_price: Money) -> Self {
        self.sale_price = Some(sale_price);
        self
    }

    pub fn with_image(mut self, image: ImageRef) -> Self {
        self.image = Some(image);
        self
    }

    pub fn with_available_stock(mut self, available_stock: i64) -> Self {
        self.available_stock = available_stock.max(0);
        self
    }

    pub fn with_quantity(mut self, quantity: i64) -> Self {
        self.quantity = quantity.max(1);
        self
    }

    pub fn with_quote_allowed(mut self) -> Self {
        self.allow_quote = true;
        self
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>, value: impl Into<String>) -> Self {
        self.attribute_values
            .push(AttributeValue::new(attribute, value));
        self
    }

    /// The merge key for this line.
    pub fn identity(&self) -> LineIdentity {
        if self.sku.is_empty() {
            LineIdentity::Product(self.product_id.clone())
        } else {
            LineIdentity::Sku {
                sku: self.sku.clone(),
                variant_sku: self.variant_sku.clone(),
            }
        }
    }

    pub fn is_bundle(&self) -> bool {
        self.kind == LineKind::Bundle
    }

    /// Unit price the shopper pays.
    pub fn effective_price(&self) -> Money {
        effective_price(self.base_price, self.sale_price)
    }

    /// Extended price of the line (unit price times quantity). A
    /// bundle's price is its own, not the sum of its components.
    pub fn line_total(&self) -> Option<Money> {
        self.effective_price().try_multiply(self.quantity)
    }
}

/// Candidate for addition, carried from a purchase gate or listing row
/// to the store. The store owns line identity and timestamps; a
/// candidate has neither.
#[derive(Debug, Clone, PartialEq)]
pub struct AddToCart {
    pub kind: LineKind,
    pub product_id: ProductId,
    pub sku: String,
    pub variant_sku: Option<String>,
    pub name: String,
    pub image: Option<ImageRef>,
    pub currency: Currency,
    pub base_price: Money,
    pub sale_price: Option<Money>,
    /// Stock at the moment of the add, from the purchase gate.
    pub available_stock: i64,
    pub allow_quote: bool,
    pub attribute_values: Vec<AttributeValue>,
    pub bundle_items: Vec<CartLine>,
}

impl AddToCart {
    /// Candidate from a simple product.
    pub fn simple(product: &Product) -> Self {
        Self {
            kind: LineKind::Item,
            product_id: product.id.clone(),
            sku: product.sku.clone(),
            variant_sku: None,
            name: product.name.clone(),
            image: product.image.as_deref().map(ImageRef::classify),
            currency: product.currency,
            base_price: product.base_price,
            sale_price: product.sale_price,
            available_stock: product.aggregate_stock(),
            allow_quote: product.allow_quote,
            attribute_values: Vec::new(),
            bundle_items: Vec::new(),
        }
    }

    /// Candidate from a resolved variant of a template product.
    pub fn resolved(product: &Product, variant: &Variant) -> Self {
        Self {
            kind: LineKind::Item,
            product_id: product.id.clone(),
            sku: product.sku.clone(),
            variant_sku: Some(variant.sku.clone()),
            name: format!("{} ({})", product.name, variant.display_name()),
            image: product.image.as_deref().map(ImageRef::classify),
            currency: product.currency,
            base_price: variant.base_price,
            sale_price: variant.sale_price,
            available_stock: variant.aggregate_stock(),
            allow_quote: product.allow_quote,
            attribute_values: variant.attribute_values.clone(),
            bundle_items: Vec::new(),
        }
    }

    /// Candidate for a fixed bundle with display components.
    pub fn bundle(
        product: &Product,
        components: Vec<CartLine>,
    ) -> Self {
        let mut candidate = Self::simple(product);
        candidate.kind = LineKind::Bundle;
        candidate.bundle_items = components;
        candidate
    }

    /// The merge key this candidate would land on.
    pub fn identity(&self) -> LineIdentity {
        if self.sku.is_empty() {
            LineIdentity::Product(self.product_id.clone())
        } else {
            LineIdentity::Sku {
                sku: self.sku.clone(),
                variant_sku: self.variant_sku.clone(),
            }
        }
    }

    /// Materialize a fresh line from this candidate.
    pub(crate) fn into_line(self, quantity: i64) -> CartLine {
        CartLine {
            line_id: LineId::generate(),
            kind: self.kind,
            product_id: self.product_id,
            sku: self.sku,
            variant_sku: self.variant_sku,
            name: self.name,
            image: self.image,
            currency: self.currency,
            base_price: self.base_price,
            sale_price: self.sale_price,
            quantity: quantity.max(1),
            available_stock: self.available_stock.max(0),
            allow_quote: self.allow_quote,
            attribute_values: self.attribute_values,
            bundle_items: self.bundle_items,
            added_at: current_timestamp(),
        }
    }
}

/// Price as persisted: canonical money object, or a legacy raw cent
/// count denominated in the line's currency.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawMoney {
    Cents(i64),
    Full(Money),
}

impl RawMoney {
    fn resolve(self, currency: Currency) -> Money {
        match self {
            RawMoney::Cents(cents) => Money::new(cents, currency),
            RawMoney::Full(money) => money,
        }
    }
}

/// Image as persisted: canonical tagged reference, or a legacy bare
/// string classified at the boundary.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawImage {
    Text(String),
    Tagged(ImageRef),
}

impl RawImage {
    fn resolve(self) -> ImageRef {
        match self {
            RawImage::Text(raw) => ImageRef::classify(&raw),
            RawImage::Tagged(image) => image,
        }
    }
}

/// Permissive decode shape for one persisted line. Everything is
/// optional; [`RawLine::normalize`] decides defaults and drops lines
/// that carry no identity at all.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub(crate) struct RawLine {
    #[serde(alias = "id")]
    line_id: Option<String>,
    #[serde(alias = "type")]
    kind: Option<String>,
    #[serde(alias = "productId")]
    product_id: Option<String>,
    sku: Option<String>,
    #[serde(alias = "variationId", alias = "variation_id", alias = "variantId")]
    variant_sku: Option<String>,
    name: Option<String>,
    #[serde(alias = "imageUrl", alias = "image_url")]
    image: Option<RawImage>,
    currency: Option<String>,
    #[serde(alias = "price")]
    base_price: Option<RawMoney>,
    #[serde(alias = "salePrice")]
    sale_price: Option<RawMoney>,
    #[serde(alias = "qty")]
    quantity: Option<i64>,
    #[serde(alias = "availableStock", alias = "stock")]
    available_stock: Option<i64>,
    #[serde(alias = "allowQuote")]
    allow_quote: Option<bool>,
    #[serde(alias = "attributeValues")]
    attribute_values: Vec<AttributeValue>,
    #[serde(alias = "bundleItems", alias = "items")]
    bundle_items: Vec<RawLine>,
    #[serde(alias = "addedAt")]
    added_at: Option<i64>,
}

impl RawLine {
    /// Collapse this raw shape into the canonical line.
    ///
    /// Returns None when the record identifies nothing (no SKU and no
    /// product id); such lines cannot merge or re-order and are
    /// dropped.
    pub(crate) fn normalize(self) -> Option<CartLine> {
        let sku = self.sku.unwrap_or_default();
        let product_id = self.product_id.unwrap_or_default();
        if sku.is_empty() && product_id.is_empty() {
            return None;
        }

        let bundle_items: Vec<CartLine> = self
            .bundle_items
            .into_iter()
            .filter_map(|raw| {
                let kept = raw.normalize();
                if kept.is_none() {
                    warn!("dropping bundle component with no identity");
                }
                kept
            })
            .collect();

        // Untagged legacy bundles are recognized by their components.
        let kind = self
            .kind
            .as_deref()
            .and_then(LineKind::from_str)
            .unwrap_or(if bundle_items.is_empty() {
                LineKind::Item
            } else {
                LineKind::Bundle
            });

        let currency = self
            .currency
            .as_deref()
            .and_then(Currency::from_code)
            .unwrap_or_default();

        let name = match self.name {
            Some(name) if !name.is_empty() => name,
            _ if !sku.is_empty() => sku.clone(),
            _ => product_id.clone(),
        };

        Some(CartLine {
            line_id: self
                .line_id
                .filter(|id| !id.is_empty())
                .map(LineId::new)
                .unwrap_or_else(LineId::generate),
            kind,
            product_id: ProductId::new(product_id),
            sku,
            variant_sku: self.variant_sku.filter(|v| !v.is_empty()),
            name,
            image: self.image.map(RawImage::resolve),
            currency,
            base_price: self
                .base_price
                .map(|p| p.resolve(currency))
                .unwrap_or_else(|| Money::zero(currency)),
            sale_price: self.sale_price.map(|p| p.resolve(currency)),
            quantity: self.quantity.unwrap_or(1).max(1),
            available_stock: self.available_stock.unwrap_or(0).max(0),
            allow_quote: self.allow_quote.unwrap_or(false),
            attribute_values: self.attribute_values,
            bundle_items,
            added_at: self.added_at.unwrap_or_else(current_timestamp),
        })
    }
}

/// Decode a persisted cart document into canonical lines.
///
/// Identity-less lines are dropped with a warning; a document that is
/// not a JSON array at all is the caller's degrade case.
pub(crate) fn parse_lines(raw: &str) -> Result<Vec<CartLine>, serde_json::Error> {
    let raw_lines: Vec<RawLine> = serde_json::from_str(raw)?;
    let mut lines = Vec::with_capacity(raw_lines.len());
    for raw_line in raw_lines {
        match raw_line.normalize() {
            Some(line) => lines.push(line),
            None => warn!("dropping cart line with no identity"),
        }
    }
    Ok(lines)
}

/// Get current Unix timestamp.
fn current_timestamp() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usd(cents: i64) -> Money {
        Money::new(cents, Currency::USD)
    }

    #[test]
    fn test_image_classification() {
        assert_eq!(
            ImageRef::classify("https://cdn.example.com/a.jpg"),
            ImageRef::Url("https://cdn.example.com/a.jpg".to_string())
        );
        assert_eq!(
            ImageRef::classify("//cdn.example.com/a.jpg"),
            ImageRef::Url("//cdn.example.com/a.jpg".to_string())
        );
        assert_eq!(
            ImageRef::classify("/media/a.jpg"),
            ImageRef::Url("/media/a.jpg".to_string())
        );
        assert_eq!(
            ImageRef::classify("ITEM-00421"),
            ImageRef::ItemCode("ITEM-00421".to_string())
        );
    }

    #[test]
    fn test_identity_prefers_sku_and_variant() {
        let a = CartLine::new(ProductId::new("p1"), "TEE", "T-Shirt", usd(1900))
            .with_variant_sku("TEE-RED-M");
        let b = CartLine::new(ProductId::new("p2"), "TEE", "T-Shirt", usd(1900))
            .with_variant_sku("TEE-RED-M");
        let c = CartLine::new(ProductId::new("p1"), "TEE", "T-Shirt", usd(1900))
            .with_variant_sku("TEE-BLUE-M");

        // Same sku+variant merge even across product ids; a different
        // variant never merges.
        assert_eq!(a.identity(), b.identity());
        assert_ne!(a.identity(), c.identity());
    }

    #[test]
    fn test_identity_falls_back_to_product_id() {
        let line = CartLine::new(ProductId::new("p1"), "", "Mystery", usd(500));
        assert_eq!(line.identity(), LineIdentity::Product(ProductId::new("p1")));
    }

    #[test]
    fn test_line_total_uses_effective_price() {
        let line = CartLine::new(ProductId::new("p1"), "TEE", "T-Shirt", usd(2000))
            .with_sale_price(usd(1500))
            .with_quantity(3);
        assert_eq!(line.line_total(), Some(usd(4500)));
    }

    #[test]
    fn test_normalize_legacy_line() {
        let raw = r#"[{
            "productId": "p-77",
            "sku": "TEE",
            "variationId": "TEE-RED-M",
            "price": 1900,
            "qty": 0,
            "image": "ITEM-77",
            "availableStock": -4
        }]"#;

        let lines = parse_lines(raw).unwrap();
        assert_eq!(lines.len(), 1);
        let line = &lines[0];
        assert_eq!(line.kind, LineKind::Item);
        assert_eq!(line.sku, "TEE");
        assert_eq!(line.variant_sku.as_deref(), Some("TEE-RED-M"));
        assert_eq!(line.base_price, usd(1900));
        assert_eq!(line.quantity, 1, "quantity clamps up to 1");
        assert_eq!(line.available_stock, 0, "stock clamps up to 0");
        assert_eq!(line.name, "TEE", "name falls back to sku");
        assert_eq!(line.image, Some(ImageRef::ItemCode("ITEM-77".to_string())));
    }

    #[test]
    fn test_normalize_infers_bundle_from_components() {
        let raw = r#"[{
            "sku": "KIT-1",
            "name": "Starter Kit",
            "price": 9900,
            "items": [
                {"sku": "KIT-1-A", "price": 0},
                {"sku": "KIT-1-B", "price": 0}
            ]
        }]"#;

        let lines = parse_lines(raw).unwrap();
        assert_eq!(lines[0].kind, LineKind::Bundle);
        assert_eq!(lines[0].bundle_items.len(), 2);
    }

    #[test]
    fn test_normalize_drops_identityless_lines() {
        let raw = r#"[
            {"name": "ghost", "price": 100},
            {"sku": "REAL", "price": 100}
        ]"#;
        let lines = parse_lines(raw).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].sku, "REAL");
    }

    #[test]
    fn test_canonical_roundtrip_preserves_line() {
        let line = CartLine::new(ProductId::new("p1"), "TEE", "T-Shirt (Red / M)", usd(1900))
            .with_variant_sku("TEE-RED-M")
            .with_image(ImageRef::Url("https://cdn.example.com/tee.jpg".to_string()))
            .with_sale_price(usd(1500))
            .with_available_stock(5)
            .with_quantity(2)
            .with_attribute("Color", "Red");

        let encoded = serde_json::to_string(&vec![line.clone()]).unwrap();
        let decoded = parse_lines(&encoded).unwrap();
        assert_eq!(decoded, vec![line]);
    }

    #[test]
    fn test_undecodable_document_is_an_error() {
        assert!(parse_lines("{not json").is_err());
        assert!(parse_lines(r#"{"weird": "shape"}"#).is_err());
    }
}
