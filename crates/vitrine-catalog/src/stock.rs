//! Stock aggregation over precomputed totals and warehouse bins.
//!
//! Aggregates are display figures, not reservations. They decide
//! whether the buy button is live and what the quantity stepper may
//! climb to; actual availability is re-checked upstream at order time.

use crate::product::{Product, StockInfo, Variant};
use tracing::debug;

/// Collapse one stock snapshot to a single non-negative unit count.
///
/// A precomputed total wins over the bins even when they disagree;
/// upstream owns that aggregate and the storefront does not second-guess
/// it. Disagreement is logged for diagnosis. With no total, the bins
/// are summed. Negative counts clamp to zero.
pub fn aggregate_stock(info: Option<&StockInfo>) -> i64 {
    let Some(info) = info else {
        return 0;
    };
    let binned: i64 = info.bins.iter().map(|b| b.actual_qty.max(0)).sum();
    match info.total_stock {
        Some(total) => {
            let total = total.max(0);
            if !info.bins.is_empty() && binned != total {
                debug!(total, binned, "stock total disagrees with bins, trusting total");
            }
            total
        }
        None => binned,
    }
}

impl Variant {
    /// Units available for this variant.
    pub fn aggregate_stock(&self) -> i64 {
        aggregate_stock(self.stock.as_ref())
    }

    /// Whether this variant can be bought right now.
    pub fn in_stock(&self) -> bool {
        self.aggregate_stock() > 0
    }
}

impl Product {
    /// Units available for this product.
    ///
    /// A template's stock is always the sum of its variants' stock; any
    /// stock snapshot on the template record itself is ignored (logged,
    /// since upstream should not send one).
    pub fn aggregate_stock(&self) -> i64 {
        if self.is_template() {
            if self.stock.is_some() {
                debug!(sku = %self.sku, "template carries its own stock snapshot, ignoring");
            }
            self.variants.iter().map(Variant::aggregate_stock).sum()
        } else {
            aggregate_stock(self.stock.as_ref())
        }
    }

    /// Whether this product can be bought right now.
    pub fn in_stock(&self) -> bool {
        self.aggregate_stock() > 0
    }
}
