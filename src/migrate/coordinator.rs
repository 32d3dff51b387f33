//! Migration coordinator - drives one run from enumeration to flush
//!
//! The coordinator is responsible for:
//! - Enumerating keys and partitioning them into jobs
//! - Setting up the queues and the worker pool
//! - Dispatching every job, then closing the job queue
//! - Waiting for exactly one result per job
//! - Flushing the store, only after every result has arrived
//!
//! ```text
//! Enumerating -> Dispatching -> Draining -> (Flushing) -> Done
//! ```

use crate::config::MigrateConfig;
use crate::error::{MigrateError, Result, WorkerError};
use crate::http::HttpTransport;
use crate::migrate::bulk::BulkSaveClient;
use crate::migrate::fetch::DocumentFetcher;
use crate::migrate::partition::{job_count, partition, Job};
use crate::migrate::queue::JobQueue;
use crate::migrate::worker::{JobResult, Pipeline, WorkerOptions, WorkerPool};
use crate::progress::ProgressReporter;
use crate::report::Reporter;
use crate::store::KeyValueStore;
use chrono::{DateTime, Utc};
use std::fmt;
use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Stage of a migration run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Enumerating,
    Dispatching,
    Draining,
    Flushing,
    Done,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::Enumerating => "enumerating",
            RunPhase::Dispatching => "dispatching",
            RunPhase::Draining => "draining",
            RunPhase::Flushing => "flushing",
            RunPhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Result of a completed run
#[derive(Debug, Clone)]
pub struct MigrationResult {
    /// Keys returned by enumeration
    pub keys_enumerated: usize,

    /// Keys dropped by exclude patterns
    pub keys_excluded: usize,

    /// Jobs dispatched
    pub jobs: usize,

    /// Results received (always equals `jobs` on success)
    pub jobs_completed: usize,

    /// Jobs whose bulk request failed
    pub jobs_failed: usize,

    /// Documents included in requests
    pub docs_submitted: u64,

    /// Documents accepted by the destination
    pub docs_saved: u64,

    /// Documents rejected by the destination
    pub docs_rejected: u64,

    /// Keys skipped while fetching
    pub fetch_errors: u64,

    /// Decoded document bytes submitted
    pub bytes_submitted: u64,

    /// Whether the store was flushed
    pub flushed: bool,

    /// Wall-clock start
    pub started_at: DateTime<Utc>,

    /// Time taken for the run
    pub duration: Duration,
}

impl MigrationResult {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            keys_enumerated: 0,
            keys_excluded: 0,
            jobs: 0,
            jobs_completed: 0,
            jobs_failed: 0,
            docs_submitted: 0,
            docs_saved: 0,
            docs_rejected: 0,
            fetch_errors: 0,
            bytes_submitted: 0,
            flushed: false,
            started_at,
            duration: Duration::ZERO,
        }
    }

    fn record(&mut self, result: &JobResult) {
        self.jobs_completed += 1;
        if result.is_failed() {
            self.jobs_failed += 1;
        }
        self.docs_submitted += result.submitted as u64;
        self.docs_saved += result.saved_count() as u64;
        self.docs_rejected += result.rejected_count() as u64;
        self.fetch_errors += result.fetch_failures.len() as u64;
        self.bytes_submitted += result.bytes_submitted;
    }

    /// Total per-key and per-job errors
    pub fn errors(&self) -> u64 {
        self.fetch_errors + self.docs_rejected + self.jobs_failed as u64
    }
}

/// Coordinates one migration run
pub struct MigrationCoordinator<S: ?Sized, T: ?Sized> {
    /// Configuration
    config: Arc<MigrateConfig>,

    /// Source store shared with workers
    store: Arc<S>,

    /// HTTP transport shared with workers
    transport: Arc<T>,

    /// Optional progress display
    progress: Option<ProgressReporter>,
}

impl<S, T> MigrationCoordinator<S, T>
where
    S: KeyValueStore + ?Sized + 'static,
    T: HttpTransport + ?Sized + 'static,
{
    /// Create a new coordinator
    pub fn new(config: MigrateConfig, store: Arc<S>, transport: Arc<T>) -> Self {
        Self {
            config: Arc::new(config),
            store,
            transport,
            progress: None,
        }
    }

    /// Show a progress bar while draining
    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Run the migration
    pub fn run<W: Write>(self, reporter: &mut Reporter<W>) -> Result<MigrationResult> {
        let start_time = Instant::now();
        let mut summary = MigrationResult::new(Utc::now());
        let save_limit = self.config.save_limit;

        // Enumerating
        self.enter(RunPhase::Enumerating);
        let mut keys = self.store.keys(&self.config.pattern)?;
        summary.keys_enumerated = keys.len();

        if !self.config.exclude_patterns.is_empty() {
            keys.retain(|key| !self.config.is_excluded(key));
            summary.keys_excluded = summary.keys_enumerated - keys.len();
        }

        if keys.is_empty() {
            return Err(MigrateError::NoKeys {
                pattern: self.config.pattern.clone(),
            });
        }

        let jobs = job_count(keys.len(), save_limit);
        summary.jobs = jobs;
        info!(
            keys = keys.len(),
            excluded = summary.keys_excluded,
            jobs = jobs,
            workers = self.config.worker_count,
            "Starting migration"
        );

        // Dispatching
        self.enter(RunPhase::Dispatching);
        let mut queue = JobQueue::new(jobs);
        let pool = WorkerPool::spawn(self.config.worker_count, self.pipeline(), &queue)?;
        queue.release_result_sender();

        let mut dispatched = 0;
        partition(&keys, save_limit, |chunk| {
            let job = Job {
                id: dispatched,
                keys: chunk.to_vec(),
            };
            if queue.submit(job) {
                dispatched += 1;
            }
        });
        queue.close();
        drop(keys);

        if dispatched != jobs {
            // Workers exit once the closed queue is drained
            pool.join();
            return Err(WorkerError::QueueSendFailed.into());
        }
        debug!(dispatched = dispatched, "All jobs queued");

        // Draining
        self.enter(RunPhase::Draining);
        if let Some(progress) = &self.progress {
            progress.start_jobs(jobs as u64);
        }

        for received in 0..jobs {
            let Some(result) = queue.recv_result() else {
                pool.join();
                return Err(WorkerError::ResultChannelClosed {
                    received,
                    expected: jobs,
                }
                .into());
            };

            summary.record(&result);
            if let Err(e) = reporter.report(&result) {
                warn!(job = result.job_id, error = %e, "Failed to write report");
            }
            if let Some(progress) = &self.progress {
                progress.update(&summary);
            }
        }

        let queue_stats = queue.stats();
        debug!(
            workers = pool.worker_count(),
            submitted = queue_stats.submitted(),
            dequeued = queue_stats.throughput(),
            reported = queue_stats.reported(),
            stats = ?pool.stats(),
            "All results received"
        );
        for e in pool.join() {
            warn!(error = %e, "Worker failed to join cleanly");
        }

        // Flushing, only after every job has reported
        if self.config.flush {
            self.enter(RunPhase::Flushing);
            if let Some(progress) = &self.progress {
                progress.set_status("Flushing store...");
            }
            self.store.flush()?;
            summary.flushed = true;
        }

        self.enter(RunPhase::Done);
        summary.duration = start_time.elapsed();

        if let Some(progress) = &self.progress {
            progress.finish("Migration completed");
        }

        info!(
            jobs = summary.jobs_completed,
            failed_jobs = summary.jobs_failed,
            saved = summary.docs_saved,
            rejected = summary.docs_rejected,
            skipped = summary.fetch_errors,
            flushed = summary.flushed,
            duration_secs = summary.duration.as_secs(),
            "Migration completed"
        );

        Ok(summary)
    }

    fn pipeline(&self) -> Arc<Pipeline<S, T>> {
        let mode = self.config.print_results;
        let options = WorkerOptions {
            retain_documents: mode.needs_documents(),
            retain_raw_body: mode.needs_raw_body(),
            echo_request: self.config.print_request,
        };

        Arc::new(Pipeline::new(
            DocumentFetcher::new(Arc::clone(&self.store)),
            BulkSaveClient::new(Arc::clone(&self.transport), self.config.save_url.as_str()),
            options,
        ))
    }

    fn enter(&self, phase: RunPhase) {
        debug!(phase = %phase, "Run phase");
    }
}
