//! Durable cart state shared across independently-mounted surfaces.
//!
//! A cart record lives in string-keyed storage; any number of surfaces
//! (a product page, a header badge, a drawer) each hold their own
//! [`store::CartStore`] over the same record. Stores never cache: every
//! read comes fresh from storage, and every write notifies subscribers
//! with a payload-free event so they re-read too. Writes from other
//! storage contexts surface through [`store::CartStore::pump_external`].
//!
//! # Example
//!
//! ```rust,ignore
//! use vitrine_cart::prelude::*;
//!
//! let backend = MemoryStorage::new();
//! let page = CartStore::new(backend.attach());
//! let badge = CartStore::new(backend.attach());
//!
//! // Add from the page; the badge observes the write on its tick.
//! page.add(AddToCart::resolved(&product, &variant), 2)?;
//! badge.pump_external()?;
//! assert_eq!(badge.snapshot()?.total_quantity, 2);
//! ```

pub mod bus;
pub mod error;
pub mod line;
pub mod storage;
pub mod store;

pub use error::CartError;
pub use store::CartStore;

/// Commonly used types.
pub mod prelude {
    pub use crate::bus::{CartEvent, ChangeOrigin, Subscription};
    pub use crate::error::CartError;
    pub use crate::line::{AddToCart, CartLine, ImageRef, LineIdentity, LineKind};
    pub use crate::storage::{CartStorage, MemoryStorage, StorageEvent, StorageHandle};
    pub use crate::store::{
        AddOutcome, AddRejection, CartConfig, CartSnapshot, CartStore, DEFAULT_STORAGE_KEY,
        MAX_QUANTITY_PER_LINE,
    };
}
