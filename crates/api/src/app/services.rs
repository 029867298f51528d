//! Infrastructure wiring behind the HTTP handlers.
//!
//! The store choice is an environment decision: in-memory for dev/test,
//! Postgres when `USE_PERSISTENT_STORES=true`. Handlers only see the
//! `AppServices` methods, never the concrete store.

use std::sync::Arc;

use sqlx::PgPool;

use stocktide_infra::audit::{AuditWorkflow, StocktakeConfirmation, StocktakeRequest};
use stocktide_infra::ledger::MovementLedger;
use stocktide_infra::query::{Page, PageRequest, StockItemView, StockQuery};
use stocktide_infra::reconciliation::{MutationReport, ReconcileError, ReconciliationEngine};
use stocktide_infra::stock_store::{InMemoryStockStore, PostgresStockStore, StockStoreError};
use stocktide_infra::storefront::LoggingStorefrontCache;
use stocktide_stock::{InventoryStats, MutationRequest, NodeRef, StocktakePreview};

type InMemoryEngine = ReconciliationEngine<Arc<InMemoryStockStore>, LoggingStorefrontCache>;
type InMemoryWorkflow = AuditWorkflow<Arc<InMemoryStockStore>, LoggingStorefrontCache>;

type PersistentEngine = ReconciliationEngine<PostgresStockStore, LoggingStorefrontCache>;
type PersistentWorkflow = AuditWorkflow<PostgresStockStore, LoggingStorefrontCache>;

pub enum AppServices {
    InMemory {
        store: Arc<InMemoryStockStore>,
        engine: InMemoryEngine,
        workflow: InMemoryWorkflow,
    },
    Persistent {
        store: PostgresStockStore,
        engine: PersistentEngine,
        workflow: PersistentWorkflow,
    },
}

/// In-memory wiring (dev/test). The store doubles as the catalog stand-in:
/// callers seed product trees through it directly.
pub fn build_in_memory_services() -> AppServices {
    let store = Arc::new(InMemoryStockStore::new());
    AppServices::in_memory(store)
}

async fn build_persistent_services() -> AppServices {
    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set when USE_PERSISTENT_STORES=true");

    let pool = PgPool::connect(&database_url)
        .await
        .expect("failed to connect to Postgres");

    let store = PostgresStockStore::new(pool);
    let engine = ReconciliationEngine::new(store.clone(), LoggingStorefrontCache);
    let workflow = AuditWorkflow::new(store.clone(), LoggingStorefrontCache);
    AppServices::Persistent {
        store,
        engine,
        workflow,
    }
}

/// Pick the store from the environment (mirrors the deployment toggle).
pub async fn build_services() -> AppServices {
    let use_persistent = std::env::var("USE_PERSISTENT_STORES")
        .unwrap_or_else(|_| "false".to_string())
        .parse::<bool>()
        .unwrap_or(false);

    if use_persistent {
        build_persistent_services().await
    } else {
        build_in_memory_services()
    }
}

impl AppServices {
    /// Wire services around an existing in-memory store. Used by the
    /// black-box tests to seed product trees before spawning the server.
    pub fn in_memory(store: Arc<InMemoryStockStore>) -> Self {
        let engine = ReconciliationEngine::new(Arc::clone(&store), LoggingStorefrontCache);
        let workflow = AuditWorkflow::new(Arc::clone(&store), LoggingStorefrontCache);
        AppServices::InMemory {
            store,
            engine,
            workflow,
        }
    }

    pub fn reconcile(&self, request: &MutationRequest) -> Result<MutationReport, ReconcileError> {
        match self {
            AppServices::InMemory { engine, .. } => engine.reconcile(request),
            AppServices::Persistent { engine, .. } => engine.reconcile(request),
        }
    }

    pub async fn preview(
        &self,
        request: &StocktakeRequest,
    ) -> Result<StocktakePreview, ReconcileError> {
        match self {
            AppServices::InMemory { workflow, .. } => workflow.preview(request).await,
            AppServices::Persistent { workflow, .. } => workflow.preview(request).await,
        }
    }

    pub fn confirm(
        &self,
        confirmation: &StocktakeConfirmation,
    ) -> Result<MutationReport, ReconcileError> {
        match self {
            AppServices::InMemory { workflow, .. } => workflow.confirm(confirmation),
            AppServices::Persistent { workflow, .. } => workflow.confirm(confirmation),
        }
    }

    pub async fn list_items(
        &self,
        page: PageRequest,
        search: Option<&str>,
    ) -> Result<Page<StockItemView>, StockStoreError> {
        match self {
            AppServices::InMemory { store, .. } => StockQuery::list(&**store, page, search).await,
            AppServices::Persistent { store, .. } => StockQuery::list(store, page, search).await,
        }
    }

    pub async fn stats(&self, search: Option<&str>) -> Result<InventoryStats, StockStoreError> {
        match self {
            AppServices::InMemory { store, .. } => store.stats(search).await,
            AppServices::Persistent { store, .. } => store.stats(search).await,
        }
    }

    pub async fn movements(
        &self,
        node: &NodeRef,
        limit: usize,
    ) -> Result<Vec<stocktide_stock::StockMovement>, StockStoreError> {
        match self {
            AppServices::InMemory { store, .. } => {
                MovementLedger::list(&**store, node, limit).await
            }
            AppServices::Persistent { store, .. } => MovementLedger::list(store, node, limit).await,
        }
    }
}
