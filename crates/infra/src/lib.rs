//! `stocktide-infra`: storage, orchestration, and reporting for the stock ledger.
//!
//! - `stock_store`: the transactional aggregate store trait plus in-memory
//!   (tests/dev) and Postgres (production) implementations
//! - `ledger`: read side of the write-once movement ledger
//! - `reconciliation`: the engine orchestrating plan → commit → notify
//! - `audit`: the stocktake workflow controller
//! - `query`: paginated listing and derived statistics (reporting path)
//! - `storefront`: outbound cache-invalidation collaborator

pub mod audit;
pub mod ledger;
pub mod query;
pub mod reconciliation;
pub mod stock_store;
pub mod storefront;
