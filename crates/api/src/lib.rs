//! HTTP API: server, routing, and request/response mapping.
//!
//! Authentication and catalog CRUD live upstream; this surface only moves
//! stock quantities and reads the ledger.

pub mod app;
