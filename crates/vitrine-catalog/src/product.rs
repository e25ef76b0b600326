//! Product, variant, and stock snapshot types.
//!
//! Everything here is an immutable snapshot of what the upstream catalog
//! returned for one page view. Nothing is cached across navigations, so
//! there is no staleness to manage at this layer.

use crate::ids::{CategoryId, ProductId};
use crate::money::{Currency, Money};
use serde::{Deserialize, Serialize};

/// How a product is purchased.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ProductKind {
    /// One SKU, one price, directly purchasable.
    #[default]
    Simple,
    /// A family of variants spanned by attribute axes; only a resolved
    /// variant is purchasable.
    Template,
}

impl ProductKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductKind::Simple => "simple",
            ProductKind::Template => "template",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "simple" => Some(ProductKind::Simple),
            "template" => Some(ProductKind::Template),
            _ => None,
        }
    }
}

/// One attribute axis a template product varies over (e.g. Color with
/// values Red and Blue).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttributeAxis {
    /// Axis name (e.g., "Color").
    pub name: String,
    /// Legal values along this axis, in display order.
    pub values: Vec<String>,
}

impl AttributeAxis {
    pub fn new(
        name: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Check whether a value is legal on this axis.
    pub fn allows(&self, value: &str) -> bool {
        self.values.iter().any(|v| v == value)
    }
}

/// One selected point on one axis (e.g., Color: Red).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct AttributeValue {
    /// Axis name (e.g., "Color").
    pub attribute: String,
    /// Chosen value (e.g., "Red").
    pub value: String,
}

impl AttributeValue {
    pub fn new(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            value: value.into(),
        }
    }
}

/// Per-warehouse stock bin.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StockBin {
    /// Warehouse or location code.
    pub warehouse: String,
    /// Units on hand at this location.
    pub actual_qty: i64,
}

impl StockBin {
    pub fn new(warehouse: impl Into<String>, actual_qty: i64) -> Self {
        Self {
            warehouse: warehouse.into(),
            actual_qty,
        }
    }
}

/// Stock snapshot attached to a product or variant.
///
/// Upstream sometimes sends a precomputed total, sometimes raw bins,
/// sometimes both. When both are present they are expected to agree but
/// this is not enforced upstream; aggregation prefers the total.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StockInfo {
    /// Precomputed total across all warehouses, when upstream sends one.
    #[serde(default)]
    pub total_stock: Option<i64>,
    /// Per-warehouse bins, when upstream sends them.
    #[serde(default)]
    pub bins: Vec<StockBin>,
}

impl StockInfo {
    /// Stock known only as a precomputed total.
    pub fn from_total(total: i64) -> Self {
        Self {
            total_stock: Some(total),
            bins: Vec::new(),
        }
    }

    /// Stock known only as per-warehouse bins.
    pub fn from_bins(bins: Vec<StockBin>) -> Self {
        Self {
            total_stock: None,
            bins,
        }
    }
}

/// A purchasable variant of a template product.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Variant {
    /// Stock keeping unit for this variant.
    pub sku: String,
    /// Regular price.
    pub base_price: Money,
    /// Sale price; active when positive.
    #[serde(default)]
    pub sale_price: Option<Money>,
    /// The point this variant occupies on each axis. A well-formed
    /// variant carries exactly one value per axis of its template.
    #[serde(default)]
    pub attribute_values: Vec<AttributeValue>,
    /// Stock snapshot, when upstream embedded one.
    #[serde(default)]
    pub stock: Option<StockInfo>,
}

impl Variant {
    pub fn new(sku: impl Into<String>, base_price: Money) -> Self {
        Self {
            sku: sku.into(),
            base_price,
            sale_price: None,
            attribute_values: Vec::new(),
            stock: None,
        }
    }

    pub fn with_sale_price(mut self, sale_price: Money) -> Self {
        self.sale_price = Some(sale_price);
        self
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>, value: impl Into<String>) -> Self {
        self.attribute_values.push(AttributeValue::new(attribute, value));
        self
    }

    pub fn with_stock(mut self, stock: StockInfo) -> Self {
        self.stock = Some(stock);
        self
    }

    /// The value this variant has on the given axis, if any.
    pub fn value_for(&self, attribute: &str) -> Option<&str> {
        self.attribute_values
            .iter()
            .find(|av| av.attribute == attribute)
            .map(|av| av.value.as_str())
    }

    /// Whether this variant carries a value for every axis of its
    /// template. Variants that don't are malformed upstream data.
    pub fn is_total_assignment(&self, axes: &[AttributeAxis]) -> bool {
        axes.iter().all(|axis| self.value_for(&axis.name).is_some())
    }

    /// Display name built from attribute values (e.g., "Red / M").
    pub fn display_name(&self) -> String {
        if self.attribute_values.is_empty() {
            self.sku.clone()
        } else {
            self.attribute_values
                .iter()
                .map(|av| av.value.as_str())
                .collect::<Vec<_>>()
                .join(" / ")
        }
    }
}

/// A product in the catalog: simple, or an attribute-templated family.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    /// Unique product identifier.
    pub id: ProductId,
    /// Stock keeping unit. For templates this is the family SKU, not a
    /// purchasable one.
    pub sku: String,
    /// Product name.
    pub name: String,
    /// Purchase shape.
    #[serde(default)]
    pub kind: ProductKind,
    /// Currency all prices on this product are denominated in.
    #[serde(default)]
    pub currency: Currency,
    /// Regular price. Advisory only on templates.
    pub base_price: Money,
    /// Sale price; active when positive. Advisory only on templates.
    #[serde(default)]
    pub sale_price: Option<Money>,
    /// Axes this template varies over. Empty for simple products.
    #[serde(default)]
    pub attributes: Vec<AttributeAxis>,
    /// The variant family. Empty for simple products.
    #[serde(default)]
    pub variants: Vec<Variant>,
    /// Stock snapshot for simple products. Templates aggregate their
    /// variants' stock instead.
    #[serde(default)]
    pub stock: Option<StockInfo>,
    /// Display image: a URL, or an item code the image service resolves.
    #[serde(default)]
    pub image: Option<String>,
    /// Whether the product may be added for quotation when out of stock.
    #[serde(default)]
    pub allow_quote: bool,
    /// Categories this product is listed under.
    #[serde(default)]
    pub category_ids: Vec<CategoryId>,
}

impl Product {
    /// Create a new simple product.
    pub fn new(sku: impl Into<String>, name: impl Into<String>, base_price: Money) -> Self {
        Self {
            id: ProductId::generate(),
            sku: sku.into(),
            name: name.into(),
            kind: ProductKind::Simple,
            currency: base_price.currency,
            base_price,
            sale_price: None,
            attributes: Vec::new(),
            variants: Vec::new(),
            stock: None,
            image: None,
            allow_quote: false,
            category_ids: Vec::new(),
        }
    }

    /// Create a new template product. Axes and variants are attached
    /// with [`Product::with_axis`] and [`Product::with_variant`].
    pub fn template(sku: impl Into<String>, name: impl Into<String>, currency: Currency) -> Self {
        let mut product = Self::new(sku, name, Money::zero(currency));
        product.kind = ProductKind::Template;
        product
    }

    pub fn with_axis(mut self, axis: AttributeAxis) -> Self {
        self.attributes.push(axis);
        self
    }

    pub fn with_variant(mut self, variant: Variant) -> Self {
        self.kind = ProductKind::Template;
        self.variants.push(variant);
        self
    }

    pub fn with_sale_price(mut self, sale_price: Money) -> Self {
        self.sale_price = Some(sale_price);
        self
    }

    pub fn with_stock(mut self, stock: StockInfo) -> Self {
        self.stock = Some(stock);
        self
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn with_quote_allowed(mut self) -> Self {
        self.allow_quote = true;
        self
    }

    pub fn in_category(mut self, category_id: CategoryId) -> Self {
        if !self.category_ids.contains(&category_id) {
            self.category_ids.push(category_id);
        }
        self
    }

    /// Check if this is a template product.
    pub fn is_template(&self) -> bool {
        self.kind == ProductKind::Template
    }

    /// Look up an axis by name.
    pub fn axis(&self, name: &str) -> Option<&AttributeAxis> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Number of axes a complete selection must cover.
    pub fn axis_count(&self) -> usize {
        self.attributes.len()
    }

    /// Find a variant by its SKU.
    pub fn variant_by_sku(&self, sku: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.sku == sku)
    }
}
