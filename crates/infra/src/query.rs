//! Query/reporting facade: paginated, searchable product listing plus
//! derived statistics.
//!
//! Reporting reads never participate in mutation transactions; eventual
//! consistency is acceptable here (never on the mutation path).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use stocktide_core::{ColorVariantId, DomainError, DomainResult, ProductId, SizeVariantId};
use stocktide_stock::{ColorVariant, InventoryStats, ProductTree, SizeVariant};

use crate::stock_store::StockStoreError;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Validated pagination parameters (1-based page).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    page: u32,
    page_size: u32,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> DomainResult<Self> {
        if page == 0 {
            return Err(DomainError::validation("page", "pages are 1-based"));
        }
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(DomainError::validation(
                "page_size",
                format!("must be between 1 and {MAX_PAGE_SIZE}"),
            ));
        }
        Ok(Self { page, page_size })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// One page of results with the totals needed to render pagination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total_items: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeView {
    pub id: SizeVariantId,
    pub size: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorView {
    pub id: ColorVariantId,
    pub color: String,
    pub quantity: i64,
    pub sizes: Vec<SizeView>,
}

/// Product listing row with nested variant detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockItemView {
    pub id: ProductId,
    pub name: String,
    pub reference: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub colors: Vec<ColorView>,
}

impl From<&ProductTree> for StockItemView {
    fn from(tree: &ProductTree) -> Self {
        StockItemView {
            id: tree.id,
            name: tree.name.clone(),
            reference: tree.reference.clone(),
            unit_price_cents: tree.unit_price_cents,
            quantity: tree.quantity,
            colors: tree.colors.iter().map(ColorView::from).collect(),
        }
    }
}

impl From<&ColorVariant> for ColorView {
    fn from(c: &ColorVariant) -> Self {
        ColorView {
            id: c.id,
            color: c.color.clone(),
            quantity: c.quantity,
            sizes: c.sizes.iter().map(SizeView::from).collect(),
        }
    }
}

impl From<&SizeVariant> for SizeView {
    fn from(s: &SizeVariant) -> Self {
        SizeView {
            id: s.id,
            size: s.size.clone(),
            quantity: s.quantity,
        }
    }
}

/// Case-insensitive substring match on product name or reference.
pub(crate) fn matches_search(name: &str, reference: &str, term: &str) -> bool {
    let term = term.to_lowercase();
    term.is_empty()
        || name.to_lowercase().contains(&term)
        || reference.to_lowercase().contains(&term)
}

/// Reporting reads over the aggregate store.
#[async_trait]
pub trait StockQuery: Send + Sync {
    /// Product rows (nested variant detail) filtered by search term,
    /// ordered by name.
    async fn list(
        &self,
        page: PageRequest,
        search: Option<&str>,
    ) -> Result<Page<StockItemView>, StockStoreError>;

    /// Statistics over the *entire* filtered set, not the current page.
    async fn stats(&self, search: Option<&str>) -> Result<InventoryStats, StockStoreError>;
}

#[async_trait]
impl<Q> StockQuery for Arc<Q>
where
    Q: StockQuery + ?Sized,
{
    async fn list(
        &self,
        page: PageRequest,
        search: Option<&str>,
    ) -> Result<Page<StockItemView>, StockStoreError> {
        (**self).list(page, search).await
    }

    async fn stats(&self, search: Option<&str>) -> Result<InventoryStats, StockStoreError> {
        (**self).stats(search).await
    }
}
