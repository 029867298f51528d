pub mod in_memory;
pub mod postgres;
mod r#trait;

pub use in_memory::InMemoryStockStore;
pub use postgres::PostgresStockStore;
pub use r#trait::{CommittedMutation, StockStore, StockStoreError};
