//! kv2couch - Redis to CouchDB document migration
//!
//! Moves documents stored as base64 strings in a Redis database into a
//! CouchDB `_bulk_docs` endpoint.
//!
//! # Features
//!
//! - **Batched Writes**: Keys are split into fixed-size jobs and every job
//!   becomes a single bulk request.
//!
//! - **Parallel Workers**: A fixed pool of worker threads fetches, decodes
//!   and submits jobs concurrently over shared Redis and HTTP clients.
//!
//! - **Failure Isolation**: A bad key is skipped and a failed request only
//!   affects its own job. Nothing is retried.
//!
//! - **Safe Flush**: The optional `FLUSHDB` runs once, after every job has
//!   reported a result.
//!
//! # Example
//!
//! ```bash
//! # Migrate db 0 of a local Redis in batches of 500
//! kv2couch http://localhost:5984/mydb/_bulk_docs -l 500
//!
//! # Show rejected documents, then clear Redis
//! kv2couch http://localhost:5984/mydb/_bulk_docs --print-results erroranddoc --flush
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod migrate;
pub mod progress;
pub mod report;
pub mod store;

pub use config::{CliArgs, MigrateConfig, PrintResults, StoreSettings};
pub use error::{MigrateError, Result};
pub use migrate::{MigrationCoordinator, MigrationResult};
