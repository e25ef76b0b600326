//! Category types for catalog navigation.

use crate::ids::CategoryId;
use serde::{Deserialize, Serialize};

/// A navigable category. The storefront only lists and links; deep
/// tree queries stay upstream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    /// Unique category identifier.
    pub id: CategoryId,
    /// Parent category ID (None for root categories).
    #[serde(default)]
    pub parent_id: Option<CategoryId>,
    /// Category name.
    pub name: String,
    /// Route fragment the storefront links to (e.g., "/c/apparel").
    pub route: String,
    /// Number of products listed under this category.
    #[serde(default)]
    pub product_count: i64,
}

impl Category {
    /// Create a new root category.
    pub fn new_root(name: impl Into<String>, route: impl Into<String>) -> Self {
        Self {
            id: CategoryId::generate(),
            parent_id: None,
            name: name.into(),
            route: route.into(),
            product_count: 0,
        }
    }

    /// Create a new child category.
    pub fn new_child(parent: &Category, name: impl Into<String>, route: impl Into<String>) -> Self {
        Self {
            id: CategoryId::generate(),
            parent_id: Some(parent.id.clone()),
            name: name.into(),
            route: route.into(),
            product_count: 0,
        }
    }

    /// Check if this is a root category.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}
