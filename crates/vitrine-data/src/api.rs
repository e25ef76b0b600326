//! Upstream catalog interface and backends.
//!
//! [`CatalogApi`] is the seam every upstream hides behind; page code
//! takes it by reference and never knows whether it is talking to a
//! remote service or the in-memory fixture. [`PolicyCatalog`] wraps
//! any backend with deadline and retry handling.

use crate::error::FetchError;
use crate::policy::{with_policy, FetchPolicy, Upstream};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use vitrine_catalog::category::Category;
use vitrine_catalog::product::{Product, StockBin, StockInfo};
use vitrine_catalog::{CategoryId, ProductId};

/// Paged catalog listing query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductQuery {
    /// Restrict to one category.
    pub category: Option<CategoryId>,
    /// 1-based page number.
    pub page: usize,
    /// Page size.
    pub per_page: usize,
}

impl Default for ProductQuery {
    fn default() -> Self {
        Self {
            category: None,
            page: 1,
            per_page: 24,
        }
    }
}

impl ProductQuery {
    pub fn in_category(category: CategoryId) -> Self {
        Self {
            category: Some(category),
            ..Self::default()
        }
    }

    pub fn with_page(mut self, page: usize) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn with_per_page(mut self, per_page: usize) -> Self {
        self.per_page = per_page.max(1);
        self
    }

    /// Offset of the first item on this page.
    pub fn offset(&self) -> usize {
        self.page.saturating_sub(1) * self.per_page
    }
}

/// Warehouse balance query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockQuery {
    /// SKUs to report on. Empty means all.
    pub skus: Vec<String>,
    /// Restrict to one warehouse.
    pub warehouse: Option<String>,
}

impl StockQuery {
    pub fn for_skus(skus: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            skus: skus.into_iter().map(Into::into).collect(),
            warehouse: None,
        }
    }

    pub fn with_warehouse(mut self, warehouse: impl Into<String>) -> Self {
        self.warehouse = Some(warehouse.into());
        self
    }
}

/// One warehouse balance row as upstream reports it.
///
/// Upstream systems disagree about which quantity field they fill:
/// some send a reservations-aware available figure, some only the raw
/// on-hand count. [`StockRecord::units`] picks for every consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRecord {
    /// SKU the balance is for.
    pub sku: String,
    /// Warehouse or location code.
    #[serde(default)]
    pub warehouse: String,
    /// Units available to promise, when upstream computes it.
    #[serde(default, alias = "availableQuantity")]
    pub available_quantity: Option<i64>,
    /// Raw units on hand.
    #[serde(default, alias = "actualQty")]
    pub actual_qty: Option<i64>,
}

impl StockRecord {
    pub fn new(sku: impl Into<String>, warehouse: impl Into<String>, available: i64) -> Self {
        Self {
            sku: sku.into(),
            warehouse: warehouse.into(),
            available_quantity: Some(available),
            actual_qty: None,
        }
    }

    /// Sellable units in this row. Prefers the reservations-aware
    /// figure over the raw count; never negative.
    pub fn units(&self) -> i64 {
        self.available_quantity
            .or(self.actual_qty)
            .unwrap_or(0)
            .max(0)
    }
}

/// Build a stock snapshot for one SKU from fetched balance rows.
pub fn collect_stock(sku: &str, records: &[StockRecord]) -> StockInfo {
    let bins = records
        .iter()
        .filter(|r| r.sku == sku)
        .map(|r| StockBin::new(r.warehouse.clone(), r.units()))
        .collect();
    StockInfo::from_bins(bins)
}

/// Attach fetched balances to a product: simple products get their own
/// snapshot, template products get one per variant.
pub fn hydrate_stock(product: &mut Product, records: &[StockRecord]) {
    if product.is_template() {
        for variant in &mut product.variants {
            variant.stock = Some(collect_stock(&variant.sku, records));
        }
    } else {
        product.stock = Some(collect_stock(&product.sku, records));
    }
}

/// The upstream catalog surface.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// List products, paged, optionally restricted to a category.
    async fn list_products(&self, query: &ProductQuery) -> Result<Vec<Product>, FetchError>;

    /// Fetch one product by id.
    async fn get_product(&self, id: &ProductId) -> Result<Product, FetchError>;

    /// Full-text search over names and SKUs.
    async fn search_products(&self, term: &str, limit: usize) -> Result<Vec<Product>, FetchError>;

    /// The category tree, flattened.
    async fn get_categories(&self) -> Result<Vec<Category>, FetchError>;

    /// Warehouse balances for the queried SKUs.
    async fn get_stock_balance(&self, query: &StockQuery) -> Result<Vec<StockRecord>, FetchError>;
}

/// In-memory catalog backend for demos and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    products: Vec<Product>,
    categories: Vec<Category>,
    stock: Vec<StockRecord>,
    latency: Option<Duration>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed products from a JSON array document.
    pub fn from_json(products_json: &str) -> Result<Self, FetchError> {
        let products: Vec<Product> = serde_json::from_str(products_json)?;
        let mut catalog = Self::new();
        catalog.products = products;
        Ok(catalog)
    }

    pub fn with_product(mut self, product: Product) -> Self {
        self.products.push(product);
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.categories.push(category);
        self
    }

    pub fn with_stock_record(mut self, record: StockRecord) -> Self {
        self.stock.push(record);
        self
    }

    /// Simulate upstream latency on every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl CatalogApi for MemoryCatalog {
    async fn list_products(&self, query: &ProductQuery) -> Result<Vec<Product>, FetchError> {
        self.simulate_latency().await;
        let matches = self
            .products
            .iter()
            .filter(|p| match &query.category {
                Some(category) => p.category_ids.contains(category),
                None => true,
            })
            .skip(query.offset())
            .take(query.per_page)
            .cloned()
            .collect();
        Ok(matches)
    }

    async fn get_product(&self, id: &ProductId) -> Result<Product, FetchError> {
        self.simulate_latency().await;
        self.products
            .iter()
            .find(|p| &p.id == id)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(id.to_string()))
    }

    async fn search_products(&self, term: &str, limit: usize) -> Result<Vec<Product>, FetchError> {
        self.simulate_latency().await;
        let needle = term.to_lowercase();
        let matches = self
            .products
            .iter()
            .filter(|p| {
                p.name.to_lowercase().contains(&needle) || p.sku.to_lowercase().contains(&needle)
            })
            .take(limit)
            .cloned()
            .collect();
        Ok(matches)
    }

    async fn get_categories(&self) -> Result<Vec<Category>, FetchError> {
        self.simulate_latency().await;
        Ok(self.categories.clone())
    }

    async fn get_stock_balance(&self, query: &StockQuery) -> Result<Vec<StockRecord>, FetchError> {
        self.simulate_latency().await;
        let matches = self
            .stock
            .iter()
            .filter(|r| query.skus.is_empty() || query.skus.iter().any(|sku| sku == &r.sku))
            .filter(|r| match &query.warehouse {
                Some(warehouse) => &r.warehouse == warehouse,
                None => true,
            })
            .cloned()
            .collect();
        Ok(matches)
    }
}

/// Wraps any backend with deadline and retry handling.
pub struct PolicyCatalog<A> {
    inner: A,
    policy: FetchPolicy,
}

impl<A: CatalogApi> PolicyCatalog<A> {
    /// Wrap a backend with the catalog upstream's default policy.
    pub fn new(inner: A) -> Self {
        Self {
            inner,
            policy: FetchPolicy::for_upstream(Upstream::Catalog),
        }
    }

    pub fn with_fetch_policy(mut self, policy: FetchPolicy) -> Self {
        self.policy = policy;
        self
    }
}

#[async_trait]
impl<A: CatalogApi> CatalogApi for PolicyCatalog<A> {
    async fn list_products(&self, query: &ProductQuery) -> Result<Vec<Product>, FetchError> {
        with_policy(&self.policy, || self.inner.list_products(query)).await
    }

    async fn get_product(&self, id: &ProductId) -> Result<Product, FetchError> {
        with_policy(&self.policy, || self.inner.get_product(id)).await
    }

    async fn search_products(&self, term: &str, limit: usize) -> Result<Vec<Product>, FetchError> {
        with_policy(&self.policy, || self.inner.search_products(term, limit)).await
    }

    async fn get_categories(&self) -> Result<Vec<Category>, FetchError> {
        with_policy(&self.policy, || self.inner.get_categories()).await
    }

    async fn get_stock_balance(&self, query: &StockQuery) -> Result<Vec<StockRecord>, FetchError> {
        with_policy(&self.policy, || self.inner.get_stock_balance(query)).await
    }
}
