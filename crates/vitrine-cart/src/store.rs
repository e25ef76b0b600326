//! The cart store: durable state, mutations, and change fan-out.
//!
//! One store per mounted surface. Every operation reads the record
//! fresh from storage, applies its change, writes the whole collection
//! back, and then notifies subscribers. No long-lived in-memory cart
//! exists anywhere; the durable record is the single source of truth,
//! which is what keeps independently-mounted surfaces consistent.

use crate::bus::{CartEvent, ChangeBus, ChangeOrigin, Subscription};
use crate::error::CartError;
use crate::line::{parse_lines, AddToCart, CartLine};
use crate::storage::{CartStorage, StorageEvent};
use tracing::{debug, warn};
use vitrine_catalog::{LineId, Money};

/// Storage key the cart record lives under unless configured otherwise.
pub const DEFAULT_STORAGE_KEY: &str = "cart";

/// Hard ceiling on line quantity, stock permitting or not.
pub const MAX_QUANTITY_PER_LINE: i64 = 9999;

/// Cart store configuration, injected at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartConfig {
    /// Key of the durable record.
    pub storage_key: String,
    /// Hard quantity ceiling per line.
    pub max_quantity: i64,
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            max_quantity: MAX_QUANTITY_PER_LINE,
        }
    }
}

impl CartConfig {
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    pub fn with_max_quantity(mut self, max_quantity: i64) -> Self {
        self.max_quantity = max_quantity.max(1);
        self
    }
}

/// Why an add-to-cart was refused. The cart is untouched in every case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddRejection {
    /// Quantity must be at least 1.
    NonPositiveQuantity,
    /// Nothing in stock and the item is not quotable.
    OutOfStock,
}

/// Outcome of an add-to-cart. Business refusals are data, not errors;
/// `Err(CartError)` is reserved for storage and encoding faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// Line inserted or merged. `line_count` is the number of lines now
    /// in the cart, which drives the opened-drawer animation.
    Added { line_count: usize },
    /// Refused; see the rejection reason.
    Rejected(AddRejection),
}

impl AddOutcome {
    pub fn is_added(&self) -> bool {
        matches!(self, AddOutcome::Added { .. })
    }
}

/// The cart read model a renderer or checkout consumes. Always built
/// from a fresh read.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct CartSnapshot {
    /// Lines in insertion order.
    pub lines: Vec<CartLine>,
    /// Number of distinct lines (badge shows this).
    pub line_count: usize,
    /// Sum of line quantities.
    pub total_quantity: i64,
    /// Sum of line totals at effective prices. Bundle components are
    /// display-only and do not contribute.
    pub subtotal: Money,
}

impl CartSnapshot {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// A cart store bound to one storage context.
pub struct CartStore<S: CartStorage> {
    storage: S,
    config: CartConfig,
    bus: ChangeBus,
    external: Subscription<StorageEvent>,
}

impl<S: CartStorage> CartStore<S> {
    /// Create a store with default configuration.
    pub fn new(storage: S) -> Self {
        Self::with_config(storage, CartConfig::default())
    }

    pub fn with_config(storage: S, config: CartConfig) -> Self {
        let external = storage.watch_external();
        Self {
            storage,
            config,
            bus: ChangeBus::new(),
            external,
        }
    }

    /// Subscribe to change notifications from this store. Events carry
    /// no cart payload; call [`CartStore::snapshot`] on every event.
    pub fn subscribe(&self) -> Subscription<CartEvent> {
        self.bus.subscribe()
    }

    /// Add a candidate to the cart.
    ///
    /// A candidate with the identity of an existing line merges into it
    /// (quantities add, the cached stock figure refreshes); anything
    /// else becomes a new line.
    pub fn add(&self, candidate: AddToCart, quantity: i64) -> Result<AddOutcome, CartError> {
        if quantity <= 0 {
            debug!(quantity, "add refused, nonpositive quantity");
            return Ok(AddOutcome::Rejected(AddRejection::NonPositiveQuantity));
        }
        if candidate.available_stock <= 0 && !candidate.allow_quote {
            debug!(sku = %candidate.sku, "add refused, out of stock");
            return Ok(AddOutcome::Rejected(AddRejection::OutOfStock));
        }

        let mut lines = self.read_lines()?;
        let identity = candidate.identity();
        if let Some(existing) = lines.iter_mut().find(|l| l.identity() == identity) {
            existing.quantity = existing
                .quantity
                .saturating_add(quantity)
                .min(self.config.max_quantity);
            existing.available_stock = candidate.available_stock.max(0);
            debug!(line = %existing.line_id, quantity = existing.quantity, "merged into existing line");
        } else {
            let line = candidate.into_line(quantity.min(self.config.max_quantity));
            debug!(line = %line.line_id, sku = %line.sku, "added new line");
            lines.push(line);
        }

        self.commit(&lines)?;
        Ok(AddOutcome::Added {
            line_count: lines.len(),
        })
    }

    /// Raise a line's quantity by one, clamped to its stock ceiling.
    ///
    /// Returns whether the quantity actually moved; an unknown line or
    /// a clamped step is `Ok(false)`.
    pub fn increment(&self, line_id: &LineId) -> Result<bool, CartError> {
        let mut lines = self.read_lines()?;
        let Some(line) = lines.iter_mut().find(|l| &l.line_id == line_id) else {
            return Ok(false);
        };

        let ceiling = increment_ceiling(line, self.config.max_quantity);
        let next = line
            .quantity
            .saturating_add(1)
            .min(ceiling)
            .max(line.quantity)
            .max(1);
        if next == line.quantity {
            debug!(line = %line_id, ceiling, "increment clamped at stock ceiling");
            return Ok(false);
        }

        line.quantity = next;
        self.commit(&lines)?;
        Ok(true)
    }

    /// Lower a line's quantity by one, never below one. Lines leave the
    /// cart only through [`CartStore::remove`].
    pub fn decrement(&self, line_id: &LineId) -> Result<bool, CartError> {
        let mut lines = self.read_lines()?;
        let Some(line) = lines.iter_mut().find(|l| &l.line_id == line_id) else {
            return Ok(false);
        };

        let next = (line.quantity - 1).max(1);
        if next == line.quantity {
            debug!(line = %line_id, "decrement held at floor of one");
            return Ok(false);
        }

        line.quantity = next;
        self.commit(&lines)?;
        Ok(true)
    }

    /// Delete a line unconditionally. A bundle leaves with all its
    /// components.
    pub fn remove(&self, line_id: &LineId) -> Result<bool, CartError> {
        let mut lines = self.read_lines()?;
        let before = lines.len();
        lines.retain(|l| &l.line_id != line_id);
        let removed = lines.len() < before;
        if removed {
            debug!(line = %line_id, "removed line");
            self.commit(&lines)?;
        }
        Ok(removed)
    }

    /// Empty the cart.
    pub fn clear(&self) -> Result<(), CartError> {
        self.storage.remove(&self.config.storage_key)?;
        self.bus.publish(CartEvent {
            origin: ChangeOrigin::Local,
        })
    }

    /// Build the read model from a fresh read.
    pub fn snapshot(&self) -> Result<CartSnapshot, CartError> {
        let lines = self.read_lines()?;
        let currency = lines.first().map(|l| l.currency).unwrap_or_default();

        let mut subtotal = Money::zero(currency);
        for line in &lines {
            let line_total = line.line_total().ok_or(CartError::Overflow)?;
            subtotal = subtotal
                .try_add(&line_total)
                .ok_or_else(|| CartError::CurrencyMismatch {
                    expected: currency.code().to_string(),
                    got: line_total.currency.code().to_string(),
                })?;
        }

        Ok(CartSnapshot {
            line_count: lines.len(),
            total_quantity: lines.iter().map(|l| l.quantity).sum(),
            subtotal,
            lines,
        })
    }

    /// Forward storage writes observed from other contexts onto this
    /// store's bus as [`ChangeOrigin::External`] events.
    ///
    /// Single-threaded event model: the embedding surface calls this on
    /// its own tick (the storage-event handler in a browser). Returns
    /// the number of events forwarded.
    pub fn pump_external(&self) -> Result<usize, CartError> {
        let mut forwarded = 0;
        while let Ok(event) = self.external.try_recv() {
            if event.key != self.config.storage_key {
                continue;
            }
            debug!(key = %event.key, "external cart write observed");
            self.bus.publish(CartEvent {
                origin: ChangeOrigin::External,
            })?;
            forwarded += 1;
        }
        Ok(forwarded)
    }

    fn read_lines(&self) -> Result<Vec<CartLine>, CartError> {
        let Some(raw) = self.storage.get(&self.config.storage_key)? else {
            return Ok(Vec::new());
        };
        match parse_lines(&raw) {
            Ok(lines) => Ok(lines),
            Err(err) => {
                warn!(%err, "cart record is undecodable, starting empty");
                Ok(Vec::new())
            }
        }
    }

    fn commit(&self, lines: &[CartLine]) -> Result<(), CartError> {
        let raw = serde_json::to_string(lines)?;
        self.storage.put(&self.config.storage_key, &raw)?;
        self.bus.publish(CartEvent {
            origin: ChangeOrigin::Local,
        })
    }
}

/// How high increment may climb for a line: its cached stock figure,
/// except that quotable lines with no stock are bounded only by the
/// hard ceiling, and a line whose stock shrank below its quantity is
/// frozen rather than grown.
fn increment_ceiling(line: &CartLine, max_quantity: i64) -> i64 {
    if line.available_stock > 0 {
        line.available_stock.min(max_quantity)
    } else if line.allow_quote {
        max_quantity
    } else {
        line.quantity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line::{ImageRef, LineKind};
    use crate::storage::MemoryStorage;
    use vitrine_catalog::{Currency, ProductId};

    fn usd(cents: i64) -> Money {
        Money::new(cents, Currency::USD)
    }

    fn candidate(sku: &str, price: i64, stock: i64) -> AddToCart {
        AddToCart {
            kind: LineKind::Item,
            product_id: ProductId::new(format!("prod-{sku}")),
            sku: sku.to_string(),
            variant_sku: None,
            name: sku.to_string(),
            image: None,
            currency: Currency::USD,
            base_price: usd(price),
            sale_price: None,
            available_stock: stock,
            allow_quote: false,
            attribute_values: Vec::new(),
            bundle_items: Vec::new(),
        }
    }

    fn store() -> CartStore<crate::storage::StorageHandle> {
        CartStore::new(MemoryStorage::new().attach())
    }

    #[test]
    fn test_add_inserts_line() {
        let store = store();
        let outcome = store.add(candidate("TEE", 1900, 5), 2).unwrap();
        assert_eq!(outcome, AddOutcome::Added { line_count: 1 });

        let snapshot = store.snapshot().unwrap();
        assert_eq!(snapshot.total_quantity, 2);
        assert_eq!(snapshot.lines[0].sku, "TEE");
    }

    #[test]
    fn test_add_same_identity_merges_quantities() {
        let store = store();
        store.add(candidate("TEE", 1900, 9), 2).unwrap();
        let outcome = store.add(candidate("TEE", 1900, 9), 3).unwrap();

        assert_eq!(outcome, AddOutcome::Added { line_count: 1 });
        let snapshot = store.snapshot().unwrap();
        assert_eq!(snapshot.line_count, 1);
        assert_eq!(snapshot.total_quantity, 5);
    }

    #[test]
    fn test_add_variant_distinguishes_identity() {
        let store = store();
        let mut red = candidate("TEE", 1900, 9);
        red.variant_sku = Some("TEE-RED".to_string());
        let mut blue = candidate("TEE", 1900, 9);
        blue.variant_sku = Some("TEE-BLUE".to_string());

        store.add(red, 1).unwrap();
        let outcome = store.add(blue, 1).unwrap();
        assert_eq!(outcome, AddOutcome::Added { line_count: 2 });
    }

    #[test]
    fn test_add_refreshes_cached_stock() {
        let store = store();
        store.add(candidate("TEE", 1900, 2), 1).unwrap();
        store.add(candidate("TEE", 1900, 8), 1).unwrap();

        let snapshot = store.snapshot().unwrap();
        assert_eq!(snapshot.lines[0].available_stock, 8);
        assert_eq!(snapshot.lines[0].quantity, 2);
    }

    #[test]
    fn test_add_rejects_nonpositive_quantity() {
        let store = store();
        let outcome = store.add(candidate("TEE", 1900, 5), 0).unwrap();
        assert_eq!(
            outcome,
            AddOutcome::Rejected(AddRejection::NonPositiveQuantity)
        );
        assert!(store.snapshot().unwrap().is_empty());
    }

    #[test]
    fn test_add_rejects_out_of_stock() {
        let store = store();
        let outcome = store.add(candidate("TEE", 1900, 0), 1).unwrap();
        assert_eq!(outcome, AddOutcome::Rejected(AddRejection::OutOfStock));
        assert!(store.snapshot().unwrap().is_empty());
    }

    #[test]
    fn test_add_quote_only_allowed_at_zero_stock() {
        let store = store();
        let mut quote = candidate("CUSTOM", 0, 0);
        quote.allow_quote = true;

        let outcome = store.add(quote, 1).unwrap();
        assert!(outcome.is_added());
    }

    #[test]
    fn test_increment_clamps_to_stock() {
        let store = store();
        store.add(candidate("TEE", 1900, 2), 1).unwrap();
        let line_id = store.snapshot().unwrap().lines[0].line_id.clone();

        assert!(store.increment(&line_id).unwrap());
        // At the ceiling now; further increments hold.
        assert!(!store.increment(&line_id).unwrap());
        assert_eq!(store.snapshot().unwrap().total_quantity, 2);
    }

    #[test]
    fn test_increment_frozen_when_stock_shrank_below_quantity() {
        let store = store();
        store.add(candidate("TEE", 1900, 5), 4).unwrap();
        // Re-add refreshes the cached stock downward.
        store.add(candidate("TEE", 1900, 3), 1).unwrap();
        let line_id = store.snapshot().unwrap().lines[0].line_id.clone();

        // Quantity 5 with ceiling 3: increment must not shrink it.
        assert!(!store.increment(&line_id).unwrap());
        assert_eq!(store.snapshot().unwrap().total_quantity, 5);
    }

    #[test]
    fn test_decrement_floors_at_one() {
        let store = store();
        store.add(candidate("TEE", 1900, 5), 2).unwrap();
        let line_id = store.snapshot().unwrap().lines[0].line_id.clone();

        assert!(store.decrement(&line_id).unwrap());
        assert!(!store.decrement(&line_id).unwrap());
        let snapshot = store.snapshot().unwrap();
        assert_eq!(snapshot.total_quantity, 1);
        assert_eq!(snapshot.line_count, 1, "floor never removes the line");
    }

    #[test]
    fn test_unknown_line_is_a_noop() {
        let store = store();
        let ghost = LineId::new("ghost");
        assert!(!store.increment(&ghost).unwrap());
        assert!(!store.decrement(&ghost).unwrap());
        assert!(!store.remove(&ghost).unwrap());
    }

    #[test]
    fn test_remove_deletes_line() {
        let store = store();
        store.add(candidate("TEE", 1900, 5), 2).unwrap();
        let line_id = store.snapshot().unwrap().lines[0].line_id.clone();

        assert!(store.remove(&line_id).unwrap());
        assert!(store.snapshot().unwrap().is_empty());
    }

    #[test]
    fn test_bundle_mutates_as_a_unit() {
        let store = store();
        let components = vec![
            CartLine::new(ProductId::new("p-a"), "KIT-A", "Part A", usd(0)),
            CartLine::new(ProductId::new("p-b"), "KIT-B", "Part B", usd(0)),
        ];
        let product = vitrine_catalog::product::Product::new("KIT", "Starter Kit", usd(9900))
            .with_stock(vitrine_catalog::product::StockInfo::from_total(3));
        store
            .add(AddToCart::bundle(&product, components), 1)
            .unwrap();

        let snapshot = store.snapshot().unwrap();
        assert_eq!(snapshot.line_count, 1);
        let bundle_id = snapshot.lines[0].line_id.clone();
        assert!(snapshot.lines[0].is_bundle());
        assert_eq!(snapshot.lines[0].bundle_items.len(), 2);

        store.increment(&bundle_id).unwrap();
        let snapshot = store.snapshot().unwrap();
        assert_eq!(snapshot.lines[0].quantity, 2);
        for component in &snapshot.lines[0].bundle_items {
            assert_eq!(component.quantity, 1, "components are display-only");
        }

        store.remove(&bundle_id).unwrap();
        assert!(store.snapshot().unwrap().is_empty());
    }

    #[test]
    fn test_snapshot_subtotal_uses_effective_prices() {
        let store = store();
        let mut on_sale = candidate("TEE", 2000, 9);
        on_sale.sale_price = Some(usd(1500));
        store.add(on_sale, 2).unwrap();
        store.add(candidate("MUG", 900, 9), 1).unwrap();

        let snapshot = store.snapshot().unwrap();
        assert_eq!(snapshot.subtotal, usd(2 * 1500 + 900));
        // Bundle-free carts: subtotal is the sum of line totals.
        assert_eq!(snapshot.line_count, 2);
    }

    #[test]
    fn test_mutations_publish_local_events() {
        let store = store();
        let sub = store.subscribe();

        store.add(candidate("TEE", 1900, 5), 1).unwrap();
        let event = sub.try_recv().unwrap();
        assert_eq!(event.origin, ChangeOrigin::Local);

        // Rejected adds publish nothing.
        store.add(candidate("TEE", 1900, 5), 0).unwrap();
        assert!(sub.try_recv().is_err());
    }

    #[test]
    fn test_external_write_republished_as_external() {
        let backend = MemoryStorage::new();
        let page = CartStore::new(backend.attach());
        let badge = CartStore::new(backend.attach());
        let badge_sub = badge.subscribe();

        page.add(candidate("TEE", 1900, 5), 2).unwrap();

        assert_eq!(badge.pump_external().unwrap(), 1);
        let event = badge_sub.try_recv().unwrap();
        assert_eq!(event.origin, ChangeOrigin::External);

        // The notified surface re-reads and sees the fresh record.
        assert_eq!(badge.snapshot().unwrap().total_quantity, 2);
    }

    #[test]
    fn test_pump_ignores_foreign_keys() {
        let backend = MemoryStorage::new();
        let store = CartStore::new(backend.attach());
        let other = backend.attach();

        other.put("wishlist", "[]").unwrap();
        assert_eq!(store.pump_external().unwrap(), 0);
    }

    #[test]
    fn test_undecodable_record_degrades_to_empty() {
        let backend = MemoryStorage::new();
        let handle = backend.attach();
        handle.put(DEFAULT_STORAGE_KEY, "{definitely not json").unwrap();

        let store = CartStore::new(backend.attach());
        assert!(store.snapshot().unwrap().is_empty());

        // The next mutation writes a clean record over the corrupt one.
        store.add(candidate("TEE", 1900, 5), 1).unwrap();
        assert_eq!(store.snapshot().unwrap().total_quantity, 1);
    }

    #[test]
    fn test_clear_empties_cart() {
        let store = store();
        store.add(candidate("TEE", 1900, 5), 2).unwrap();
        store.clear().unwrap();
        assert!(store.snapshot().unwrap().is_empty());
    }

    #[test]
    fn test_legacy_record_is_readable() {
        let backend = MemoryStorage::new();
        let handle = backend.attach();
        handle
            .put(
                DEFAULT_STORAGE_KEY,
                r#"[{"productId":"p-1","sku":"TEE","variationId":"TEE-RED-M","price":1900,"qty":2,"image":"ITEM-9"}]"#,
            )
            .unwrap();

        let store = CartStore::new(backend.attach());
        let snapshot = store.snapshot().unwrap();
        assert_eq!(snapshot.total_quantity, 2);
        assert_eq!(snapshot.subtotal, usd(3800));
        assert_eq!(
            snapshot.lines[0].image,
            Some(ImageRef::ItemCode("ITEM-9".to_string()))
        );
    }
}
