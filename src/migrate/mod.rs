//! Batch migration pipeline
//!
//! # Architecture
//!
//! ```text
//!                     ┌─────────────────────────┐
//!                     │  MigrationCoordinator   │
//!                     │  - KEYS / partition     │
//!                     │  - drain, then FLUSHDB  │
//!                     └───────────┬─────────────┘
//!                                 │ jobs (bounded, capacity = job count)
//!       ┌─────────────────────────┼─────────────────────────┐
//!       │                         │                         │
//! ┌─────▼─────┐             ┌─────▼─────┐             ┌─────▼─────┐
//! │  Worker 1 │             │  Worker 2 │             │  Worker N │
//! │ GET+decode│             │ GET+decode│             │ GET+decode│
//! │ _bulk_docs│             │ _bulk_docs│             │ _bulk_docs│
//! └─────┬─────┘             └─────┬─────┘             └─────┬─────┘
//!       └─────────────────────────┼─────────────────────────┘
//!                                 │ results (bounded, capacity = job count)
//!                                 ▼
//!                            Coordinator
//! ```

pub mod bulk;
pub mod coordinator;
pub mod fetch;
pub mod partition;
pub mod queue;
pub mod worker;

pub use bulk::{BulkSaveClient, BulkSaveResponse, DocResponse};
pub use coordinator::{MigrationCoordinator, MigrationResult, RunPhase};
pub use fetch::{DocumentFetcher, Document, FetchedBatch, RESERVED_PREFIX};
pub use partition::{job_count, jobs, partition, Job};
pub use queue::JobQueue;
pub use worker::{JobResult, Pipeline, PoolStats, WorkerOptions, WorkerPool};
