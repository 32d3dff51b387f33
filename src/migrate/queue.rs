//! Bounded job and result queues
//!
//! Both channels are sized to the total job count, so dispatching every job
//! before any worker has made progress never blocks, and no worker ever
//! blocks reporting a result.

use crate::migrate::partition::Job;
use crate::migrate::worker::JobResult;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Statistics for the job queue
#[derive(Debug, Default)]
pub struct QueueStats {
    /// Jobs submitted
    pub submitted: AtomicU64,

    /// Jobs taken by workers
    pub dequeued: AtomicU64,

    /// Results reported by workers
    pub reported: AtomicU64,
}

impl QueueStats {
    /// Jobs handed to workers so far
    pub fn throughput(&self) -> u64 {
        self.dequeued.load(Ordering::Relaxed)
    }

    /// Jobs accepted by the queue
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Results handed back by workers
    pub fn reported(&self) -> u64 {
        self.reported.load(Ordering::Relaxed)
    }
}

/// Job queue plus result queue for one run
pub struct JobQueue {
    /// Job sender, dropped on close
    job_tx: Option<Sender<Job>>,

    /// Job receiver template for workers
    job_rx: Receiver<Job>,

    /// Result sender template, released once workers hold their clones
    result_tx: Option<Sender<JobResult>>,

    /// Result receiver (coordinator only)
    result_rx: Receiver<JobResult>,

    /// Queue capacity
    capacity: usize,

    /// Queue statistics
    stats: Arc<QueueStats>,
}

impl JobQueue {
    /// Create queues able to hold `capacity` jobs and results
    pub fn new(capacity: usize) -> Self {
        // A zero-capacity crossbeam channel is a rendezvous channel
        let capacity = capacity.max(1);
        let (job_tx, job_rx) = bounded(capacity);
        let (result_tx, result_rx) = bounded(capacity);

        Self {
            job_tx: Some(job_tx),
            job_rx,
            result_tx: Some(result_tx),
            result_rx,
            capacity,
            stats: Arc::new(QueueStats::default()),
        }
    }

    /// Get a receiver for jobs (clone for each worker)
    pub fn job_receiver(&self) -> JobReceiver {
        JobReceiver {
            receiver: self.job_rx.clone(),
            stats: Arc::clone(&self.stats),
        }
    }

    /// Get a sender for results (clone for each worker)
    ///
    /// Returns `None` once `release_result_sender` has been called.
    pub fn result_sender(&self) -> Option<ResultSender> {
        self.result_tx.as_ref().map(|sender| ResultSender {
            sender: sender.clone(),
            stats: Arc::clone(&self.stats),
        })
    }

    /// Drop the queue's own result sender
    ///
    /// After this, `recv_result` fails instead of blocking forever if every
    /// worker exits early.
    pub fn release_result_sender(&mut self) {
        self.result_tx = None;
    }

    /// Submit a job without blocking
    ///
    /// Returns `false` if the queue is full or already closed.
    pub fn submit(&self, job: Job) -> bool {
        let Some(sender) = self.job_tx.as_ref() else {
            return false;
        };

        match sender.try_send(job) {
            Ok(()) => {
                self.stats.submitted.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Signal that no more jobs will be submitted
    ///
    /// Workers drain what is queued and then exit.
    pub fn close(&mut self) {
        self.job_tx = None;
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.job_tx.is_none()
    }

    /// Block until the next result arrives
    ///
    /// Returns `None` when every result sender is gone.
    pub fn recv_result(&self) -> Option<JobResult> {
        self.result_rx.recv().ok()
    }

    /// Number of jobs waiting for a worker
    pub fn pending_jobs(&self) -> usize {
        self.job_rx.len()
    }

    /// Get queue capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get queue statistics
    pub fn stats(&self) -> Arc<QueueStats> {
        Arc::clone(&self.stats)
    }
}

/// Handle for receiving jobs
#[derive(Clone)]
pub struct JobReceiver {
    receiver: Receiver<Job>,
    stats: Arc<QueueStats>,
}

impl JobReceiver {
    /// Receive a job
    ///
    /// Blocks until a job is available. Returns `None` once the queue is
    /// closed and drained.
    pub fn recv(&self) -> Option<Job> {
        match self.receiver.recv() {
            Ok(job) => {
                self.stats.dequeued.fetch_add(1, Ordering::Relaxed);
                Some(job)
            }
            Err(_) => None,
        }
    }
}

/// Handle for reporting results
#[derive(Clone)]
pub struct ResultSender {
    sender: Sender<JobResult>,
    stats: Arc<QueueStats>,
}

impl ResultSender {
    /// Send a result, blocking only if the result queue is full
    pub fn send(&self, result: JobResult) -> Result<(), ()> {
        self.sender.send(result).map_err(|_| ())?;
        self.stats.reported.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(id: usize) -> Job {
        Job {
            id,
            keys: vec![format!("k{}", id)],
        }
    }

    #[test]
    fn test_submit_never_blocks_within_capacity() {
        let queue = JobQueue::new(3);
        assert!(queue.submit(job(0)));
        assert!(queue.submit(job(1)));
        assert!(queue.submit(job(2)));
        assert!(!queue.submit(job(3)));
        assert_eq!(queue.pending_jobs(), 3);
        assert_eq!(queue.stats().submitted(), 3);
    }

    #[test]
    fn test_close_drains_then_ends() {
        let mut queue = JobQueue::new(2);
        let receiver = queue.job_receiver();
        queue.submit(job(0));
        queue.submit(job(1));
        queue.close();

        assert!(queue.is_closed());
        assert!(!queue.submit(job(2)));
        assert_eq!(receiver.recv().map(|j| j.id), Some(0));
        assert_eq!(receiver.recv().map(|j| j.id), Some(1));
        assert!(receiver.recv().is_none());
        assert_eq!(queue.stats().throughput(), 2);
    }

    #[test]
    fn test_results_disconnect_after_release() {
        let mut queue = JobQueue::new(1);
        let sender = queue.result_sender().unwrap();
        queue.release_result_sender();
        assert!(queue.result_sender().is_none());

        sender.send(JobResult::empty(0, 0, 1)).unwrap();
        drop(sender);

        assert!(queue.recv_result().is_some());
        assert!(queue.recv_result().is_none());
        assert_eq!(queue.stats().reported(), 1);
    }

    #[test]
    fn test_zero_capacity_is_not_rendezvous() {
        let queue = JobQueue::new(0);
        assert_eq!(queue.capacity(), 1);
        assert!(queue.submit(job(0)));
    }
}
