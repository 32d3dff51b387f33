//! Worker thread logic for the migration pool
//!
//! Each worker:
//! - Pulls a job (a run of keys) from the job queue
//! - Reads and decodes every key through the shared store
//! - Submits the decoded documents as one bulk request
//! - Reports the outcome on the result queue
//!
//! Failures are handled here: a bad key is skipped, a failed submission
//! becomes an empty result. Nothing is retried.

use crate::error::{FetchError, SaveError, WorkerError};
use crate::http::HttpTransport;
use crate::migrate::bulk::{build_body, BulkSaveClient, DocResponse};
use crate::migrate::fetch::{Document, DocumentFetcher};
use crate::migrate::partition::Job;
use crate::migrate::queue::{JobQueue, JobReceiver, ResultSender};
use crate::store::KeyValueStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, trace, warn};

/// Outcome of one job
#[derive(Debug, Clone)]
pub struct JobResult {
    /// Job this result belongs to
    pub job_id: usize,

    /// Worker that processed the job (diagnostics only)
    pub worker_id: usize,

    /// Keys in the job
    pub key_count: usize,

    /// Documents included in the request
    pub submitted: usize,

    /// Body bytes of the submitted documents
    pub bytes_submitted: u64,

    /// Submitted documents, kept only when a report needs them
    pub documents: Vec<Document>,

    /// Keys skipped while fetching
    pub fetch_failures: Vec<FetchError>,

    /// Request body, kept only when echoing requests
    pub request_body: Option<String>,

    /// HTTP status of the reply, if one arrived
    pub status: Option<u16>,

    /// Per-document results (empty when the submission failed)
    pub responses: Vec<DocResponse>,

    /// Raw reply body, kept only for raw reporting
    pub raw_body: Option<String>,

    /// Why the submission failed, if it did
    pub save_error: Option<SaveError>,

    /// Wall time spent on the job
    pub elapsed: Duration,
}

impl JobResult {
    /// A result with nothing fetched and nothing submitted
    pub fn empty(job_id: usize, worker_id: usize, key_count: usize) -> Self {
        Self {
            job_id,
            worker_id,
            key_count,
            submitted: 0,
            bytes_submitted: 0,
            documents: Vec::new(),
            fetch_failures: Vec::new(),
            request_body: None,
            status: None,
            responses: Vec::new(),
            raw_body: None,
            save_error: None,
            elapsed: Duration::ZERO,
        }
    }

    /// True when the bulk request failed as a whole
    pub fn is_failed(&self) -> bool {
        self.save_error.is_some()
    }

    /// Documents the destination accepted
    pub fn saved_count(&self) -> usize {
        self.responses.iter().filter(|r| !r.is_error()).count()
    }

    /// Documents the destination rejected
    pub fn rejected_count(&self) -> usize {
        self.responses.iter().filter(|r| r.is_error()).count()
    }
}

/// What a worker keeps in its results for reporting
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkerOptions {
    /// Keep submitted documents
    pub retain_documents: bool,

    /// Keep raw reply bodies
    pub retain_raw_body: bool,

    /// Keep request bodies
    pub echo_request: bool,
}

/// Fetch-then-save pipeline shared by every worker
pub struct Pipeline<S: ?Sized, T: ?Sized> {
    fetcher: DocumentFetcher<S>,
    client: BulkSaveClient<T>,
    options: WorkerOptions,
}

impl<S, T> Pipeline<S, T>
where
    S: KeyValueStore + ?Sized,
    T: HttpTransport + ?Sized,
{
    /// Create a pipeline from a fetcher and a bulk save client
    pub fn new(
        fetcher: DocumentFetcher<S>,
        client: BulkSaveClient<T>,
        options: WorkerOptions,
    ) -> Self {
        Self {
            fetcher,
            client,
            options,
        }
    }

    /// Run one job to completion
    pub fn process(&self, worker_id: usize, job: Job) -> JobResult {
        let start = Instant::now();
        let mut result = JobResult::empty(job.id, worker_id, job.keys.len());

        let batch = self.fetcher.fetch_documents(worker_id, &job.keys);
        result.submitted = batch.documents.len();
        result.bytes_submitted = batch.body_bytes();
        result.fetch_failures = batch.failures;

        let body = build_body(batch.documents.iter().map(|d| d.body.as_str()));
        if self.options.echo_request {
            result.request_body = Some(body.clone());
        }

        trace!(
            worker = worker_id,
            job = job.id,
            docs = result.submitted,
            "Submitting bulk request"
        );

        match self.client.save_body(body) {
            Ok(response) => {
                result.status = Some(response.status);
                result.responses = response.responses;
                if self.options.retain_raw_body {
                    result.raw_body = Some(response.raw);
                }
            }
            Err(e) => {
                if let Some((status, raw)) = e.reply() {
                    result.status = Some(status);
                    if self.options.retain_raw_body {
                        result.raw_body = Some(raw.to_string());
                    }
                }
                error!(
                    worker = worker_id,
                    job = job.id,
                    url = self.client.url(),
                    error = %e,
                    "Bulk save failed"
                );
                result.save_error = Some(e);
            }
        }

        if self.options.retain_documents {
            result.documents = batch.documents;
        }
        result.elapsed = start.elapsed();
        result
    }
}

/// Statistics collected by a worker
#[derive(Debug, Default)]
pub struct WorkerStats {
    /// Jobs processed
    pub jobs_processed: AtomicU64,

    /// Jobs whose submission failed
    pub jobs_failed: AtomicU64,

    /// Documents accepted by the destination
    pub docs_saved: AtomicU64,

    /// Documents rejected by the destination
    pub docs_rejected: AtomicU64,

    /// Keys skipped while fetching
    pub fetch_errors: AtomicU64,
}

impl WorkerStats {
    fn record(&self, result: &JobResult) {
        self.jobs_processed.fetch_add(1, Ordering::Relaxed);
        if result.is_failed() {
            self.jobs_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.docs_saved
            .fetch_add(result.saved_count() as u64, Ordering::Relaxed);
        self.docs_rejected
            .fetch_add(result.rejected_count() as u64, Ordering::Relaxed);
        self.fetch_errors
            .fetch_add(result.fetch_failures.len() as u64, Ordering::Relaxed);
    }
}

/// A worker thread that processes jobs
pub struct Worker {
    /// Worker ID
    id: usize,

    /// Thread handle
    handle: Option<JoinHandle<()>>,

    /// Worker statistics
    stats: Arc<WorkerStats>,
}

impl Worker {
    /// Spawn a new worker thread
    pub fn spawn<S, T>(
        id: usize,
        pipeline: Arc<Pipeline<S, T>>,
        jobs: JobReceiver,
        results: ResultSender,
    ) -> Result<Self, WorkerError>
    where
        S: KeyValueStore + ?Sized + 'static,
        T: HttpTransport + ?Sized + 'static,
    {
        let stats = Arc::new(WorkerStats::default());
        let stats_clone = Arc::clone(&stats);

        let handle = thread::Builder::new()
            .name(format!("migrate-{}", id))
            .spawn(move || worker_loop(id, &*pipeline, &jobs, &results, &stats_clone))
            .map_err(|e| WorkerError::InitFailed {
                id,
                reason: e.to_string(),
            })?;

        Ok(Self {
            id,
            handle: Some(handle),
            stats,
        })
    }

    /// Get worker statistics
    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    /// Wait for the worker to finish
    pub fn join(mut self) -> Result<(), WorkerError> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| WorkerError::Panicked {
                id: self.id,
                message: "Worker thread panicked".into(),
            }),
            None => Ok(()),
        }
    }
}

/// Main worker loop
fn worker_loop<S, T>(
    id: usize,
    pipeline: &Pipeline<S, T>,
    jobs: &JobReceiver,
    results: &ResultSender,
    stats: &WorkerStats,
) where
    S: KeyValueStore + ?Sized,
    T: HttpTransport + ?Sized,
{
    debug!(worker = id, "Worker starting");

    while let Some(job) = jobs.recv() {
        let job_id = job.id;
        let result = pipeline.process(id, job);
        stats.record(&result);

        if results.send(result).is_err() {
            warn!(worker = id, job = job_id, "Result queue closed, stopping");
            break;
        }
    }

    debug!(
        worker = id,
        jobs = stats.jobs_processed.load(Ordering::Relaxed),
        "Worker shutting down"
    );
}

/// Fixed-size pool of worker threads
pub struct WorkerPool {
    workers: Vec<Worker>,
}

impl WorkerPool {
    /// Spawn `count` workers reading from `queue`
    pub fn spawn<S, T>(
        count: usize,
        pipeline: Arc<Pipeline<S, T>>,
        queue: &JobQueue,
    ) -> Result<Self, WorkerError>
    where
        S: KeyValueStore + ?Sized + 'static,
        T: HttpTransport + ?Sized + 'static,
    {
        let mut workers = Vec::with_capacity(count);

        for id in 0..count {
            let results = queue.result_sender().ok_or(WorkerError::InitFailed {
                id,
                reason: "result queue already released".into(),
            })?;

            let worker = Worker::spawn(id, Arc::clone(&pipeline), queue.job_receiver(), results)?;
            workers.push(worker);
        }

        debug!(count = workers.len(), "Workers spawned");
        Ok(Self { workers })
    }

    /// Number of workers started
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Aggregate statistics across workers
    pub fn stats(&self) -> PoolStats {
        let mut totals = PoolStats::default();

        for worker in &self.workers {
            let stats = worker.stats();
            totals.jobs_processed += stats.jobs_processed.load(Ordering::Relaxed);
            totals.jobs_failed += stats.jobs_failed.load(Ordering::Relaxed);
            totals.docs_saved += stats.docs_saved.load(Ordering::Relaxed);
            totals.docs_rejected += stats.docs_rejected.load(Ordering::Relaxed);
            totals.fetch_errors += stats.fetch_errors.load(Ordering::Relaxed);
        }

        totals
    }

    /// Join every worker, returning the ones that failed
    pub fn join(self) -> Vec<WorkerError> {
        self.workers
            .into_iter()
            .filter_map(|worker| worker.join().err())
            .collect()
    }
}

/// Totals across all workers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub jobs_processed: u64,
    pub jobs_failed: u64,
    pub docs_saved: u64,
    pub docs_rejected: u64,
    pub fetch_errors: u64,
}
