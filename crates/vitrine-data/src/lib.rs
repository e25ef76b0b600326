//! Upstream access for the Vitrine storefront.
//!
//! This crate provides:
//! - `CatalogApi` - the upstream catalog surface, with an in-memory
//!   backend and a policy-wrapping one
//! - `Upstream` / `FetchPolicy` - per-upstream deadlines, retries, and
//!   concurrency defaults
//! - `ImageBatcher` - bounded-concurrency image resolution with a
//!   session cache
//! - `SearchDebouncer` - search-as-you-type with stale-result discard

mod api;
mod error;
mod images;
mod policy;
mod search;

pub use api::*;
pub use error::*;
pub use images::*;
pub use policy::*;
pub use search::*;
