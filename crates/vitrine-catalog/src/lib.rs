//! Catalog domain model for the Vitrine storefront engine.
//!
//! This crate is the pure core: no IO, no async, no panics on malformed
//! upstream data.
//!
//! - **Products**: simple items and attribute-templated variant families
//! - **Pricing**: effective price, discount display, family price ranges
//! - **Stock**: aggregation over precomputed totals and warehouse bins
//! - **Resolution**: mapping attribute picks to exactly one purchasable
//!   variant, with separate browse-filtering semantics
//!
//! # Example
//!
//! ```rust,ignore
//! use vitrine_catalog::prelude::*;
//!
//! let tee = Product::template("TEE", "T-Shirt", Currency::USD)
//!     .with_axis(AttributeAxis::new("Color", ["Red", "Blue"]))
//!     .with_variant(
//!         Variant::new("TEE-RED", Money::new(1900, Currency::USD))
//!             .with_attribute("Color", "Red"),
//!     );
//!
//! let mut picker = VariantPicker::new(&tee);
//! let resolution = picker.select("Color", "Red");
//! assert!(resolution.is_resolved());
//! ```

pub mod category;
pub mod ids;
pub mod money;
pub mod pricing;
pub mod product;
pub mod resolver;
pub mod stock;

pub use ids::*;
pub use money::{Currency, Money};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::ids::*;
    pub use crate::money::{Currency, Money};

    pub use crate::category::Category;
    pub use crate::pricing::{effective_price, has_discount, PriceRange};
    pub use crate::product::{
        AttributeAxis, AttributeValue, Product, ProductKind, StockBin, StockInfo, Variant,
    };
    pub use crate::resolver::{
        filter_variants, purchase_gate, resolve, PurchaseGate, Resolution, Selection,
        VariantPicker, SKU_PLACEHOLDER,
    };
    pub use crate::stock::aggregate_stock;
}
