//! Storefront cache invalidation port.
//!
//! When a mutation changes a product's total quantity, the storefront's
//! cached availability for that product is stale and gets invalidated.
//! Invalidation is fire-and-forget: a committed mutation is never rolled
//! back because the storefront could not be reached.

use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::info;

use stocktide_core::ProductId;

#[derive(Debug, Error)]
pub enum StorefrontCacheError {
    #[error("storefront unavailable: {0}")]
    Unavailable(String),
}

/// Outbound notification seam towards the storefront.
pub trait StorefrontCache: Send + Sync {
    fn invalidate_product(&self, product_id: ProductId) -> Result<(), StorefrontCacheError>;
}

impl<C: StorefrontCache + ?Sized> StorefrontCache for Arc<C> {
    fn invalidate_product(&self, product_id: ProductId) -> Result<(), StorefrontCacheError> {
        (**self).invalidate_product(product_id)
    }
}

/// Default implementation: logs the invalidation and succeeds.
///
/// Stands in until a real storefront endpoint is wired up; the log line
/// carries everything an HTTP notifier would send.
#[derive(Debug, Default, Clone)]
pub struct LoggingStorefrontCache;

impl StorefrontCache for LoggingStorefrontCache {
    fn invalidate_product(&self, product_id: ProductId) -> Result<(), StorefrontCacheError> {
        info!(product_id = %product_id, "storefront cache invalidated");
        Ok(())
    }
}

/// Records every invalidation. Test support.
#[derive(Debug, Default)]
pub struct RecordingStorefrontCache {
    invalidated: Mutex<Vec<ProductId>>,
}

impl RecordingStorefrontCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invalidated(&self) -> Vec<ProductId> {
        self.invalidated.lock().expect("storefront lock poisoned").clone()
    }
}

impl StorefrontCache for RecordingStorefrontCache {
    fn invalidate_product(&self, product_id: ProductId) -> Result<(), StorefrontCacheError> {
        self.invalidated
            .lock()
            .expect("storefront lock poisoned")
            .push(product_id);
        Ok(())
    }
}

/// Always fails. Test support for the fire-and-forget contract.
#[derive(Debug, Default)]
pub struct FailingStorefrontCache;

impl StorefrontCache for FailingStorefrontCache {
    fn invalidate_product(&self, _product_id: ProductId) -> Result<(), StorefrontCacheError> {
        Err(StorefrontCacheError::Unavailable(
            "simulated storefront outage".to_string(),
        ))
    }
}
