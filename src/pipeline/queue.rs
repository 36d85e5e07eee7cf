//! Job queue interface and the in-process implementation
//!
//! The production queue is an external service with at-least-once delivery,
//! retries and argument-based deduplication. `InMemoryJobQueue` provides the
//! same contract inside one process for the CLI and the tests.

use crate::pipeline::jobs::{Job, QueueName};
use crate::HarvestError;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// Result type for enqueue operations that handles deduplication
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueResult {
    /// The job was queued under a new id
    Queued(Uuid),
    /// An equivalent job is already pending or running
    Duplicate(Uuid),
}

impl EnqueueResult {
    pub fn job_id(&self) -> Uuid {
        match self {
            Self::Queued(id) | Self::Duplicate(id) => *id,
        }
    }

    pub fn is_queued(&self) -> bool {
        matches!(self, Self::Queued(_))
    }
}

/// A job handed to a worker
#[derive(Debug, Clone)]
pub struct ClaimedJob {
    pub id: Uuid,
    pub job: Job,
    /// 1 on the first delivery
    pub attempt: u32,
}

/// What happened to a job that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureDisposition {
    /// The job goes back on the queue
    Retry { attempt: u32 },
    /// No attempts left, or the error cannot be retried
    Exhausted { attempts: u32 },
}

/// A job that will never run again
#[derive(Debug, Clone)]
pub struct DeadJob {
    pub id: Uuid,
    pub job: Job,
    pub attempts: u32,
    pub error: String,
}

/// Trait for job queue operations
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Queues a job unless an equivalent one is pending or running
    async fn enqueue(&self, job: Job) -> Result<EnqueueResult, HarvestError>;

    /// Takes the oldest pending job of a queue
    async fn claim(&self, queue: QueueName) -> Result<Option<ClaimedJob>, HarvestError>;

    async fn mark_succeeded(&self, job_id: Uuid) -> Result<(), HarvestError>;

    /// Records a failure and decides whether the job runs again
    async fn mark_failed(
        &self,
        job_id: Uuid,
        error: &str,
        retryable: bool,
    ) -> Result<FailureDisposition, HarvestError>;

    /// Number of pending plus running jobs in a queue
    async fn outstanding(&self, queue: QueueName) -> Result<usize, HarvestError>;
}

#[derive(Debug)]
struct Entry {
    job: Job,
    key: String,
    attempts: u32,
    running: bool,
}

#[derive(Debug, Default)]
struct QueueState {
    entries: HashMap<Uuid, Entry>,
    pending: HashMap<QueueName, VecDeque<Uuid>>,
    active_keys: HashMap<String, Uuid>,
    dead: Vec<DeadJob>,
}

/// In-process queue with deduplication and bounded attempts
#[derive(Debug)]
pub struct InMemoryJobQueue {
    max_attempts: u32,
    state: Mutex<QueueState>,
}

impl InMemoryJobQueue {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            state: Mutex::new(QueueState::default()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, QueueState>, HarvestError> {
        self.state
            .lock()
            .map_err(|_| HarvestError::Storage("job queue lock poisoned".to_string()))
    }

    /// Jobs waiting in a queue, oldest first
    pub fn pending_jobs(&self, queue: QueueName) -> Vec<Job> {
        let Ok(state) = self.lock() else {
            return Vec::new();
        };
        state
            .pending
            .get(&queue)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| state.entries.get(id))
                    .map(|e| e.job.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Jobs that failed permanently
    pub fn dead_jobs(&self) -> Vec<DeadJob> {
        self.lock().map(|s| s.dead.clone()).unwrap_or_default()
    }

    fn enqueue_sync(&self, job: Job) -> Result<EnqueueResult, HarvestError> {
        let mut state = self.lock()?;
        let key = job.dedup_key();

        if let Some(existing) = state.active_keys.get(&key) {
            tracing::debug!("Job {} already queued as {}", key, existing);
            return Ok(EnqueueResult::Duplicate(*existing));
        }

        let id = Uuid::new_v4();
        let queue = job.queue();
        tracing::debug!("Queued {} on {} as {}", key, queue, id);

        state.active_keys.insert(key.clone(), id);
        state.entries.insert(
            id,
            Entry {
                job,
                key,
                attempts: 0,
                running: false,
            },
        );
        state.pending.entry(queue).or_default().push_back(id);
        Ok(EnqueueResult::Queued(id))
    }

    fn claim_sync(&self, queue: QueueName) -> Result<Option<ClaimedJob>, HarvestError> {
        let mut state = self.lock()?;
        let Some(id) = state.pending.get_mut(&queue).and_then(VecDeque::pop_front) else {
            return Ok(None);
        };

        let Some(entry) = state.entries.get_mut(&id) else {
            return Ok(None);
        };
        entry.running = true;
        entry.attempts += 1;

        Ok(Some(ClaimedJob {
            id,
            job: entry.job.clone(),
            attempt: entry.attempts,
        }))
    }

    fn mark_succeeded_sync(&self, job_id: Uuid) -> Result<(), HarvestError> {
        let mut state = self.lock()?;
        if let Some(entry) = state.entries.remove(&job_id) {
            state.active_keys.remove(&entry.key);
        }
        Ok(())
    }

    fn mark_failed_sync(
        &self,
        job_id: Uuid,
        error: &str,
        retryable: bool,
    ) -> Result<FailureDisposition, HarvestError> {
        let mut state = self.lock()?;
        let Some(entry) = state.entries.get_mut(&job_id) else {
            return Err(HarvestError::Storage(format!("unknown job {}", job_id)));
        };

        if retryable && entry.attempts < self.max_attempts {
            entry.running = false;
            let attempt = entry.attempts;
            let queue = entry.job.queue();
            state.pending.entry(queue).or_default().push_back(job_id);
            return Ok(FailureDisposition::Retry { attempt });
        }

        let attempts = entry.attempts;
        if let Some(entry) = state.entries.remove(&job_id) {
            state.active_keys.remove(&entry.key);
            state.dead.push(DeadJob {
                id: job_id,
                job: entry.job,
                attempts,
                error: error.to_string(),
            });
        }
        Ok(FailureDisposition::Exhausted { attempts })
    }

    fn outstanding_sync(&self, queue: QueueName) -> Result<usize, HarvestError> {
        let state = self.lock()?;
        Ok(state
            .entries
            .values()
            .filter(|e| e.job.queue() == queue)
            .count())
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, job: Job) -> Result<EnqueueResult, HarvestError> {
        self.enqueue_sync(job)
    }

    async fn claim(&self, queue: QueueName) -> Result<Option<ClaimedJob>, HarvestError> {
        self.claim_sync(queue)
    }

    async fn mark_succeeded(&self, job_id: Uuid) -> Result<(), HarvestError> {
        self.mark_succeeded_sync(job_id)
    }

    async fn mark_failed(
        &self,
        job_id: Uuid,
        error: &str,
        retryable: bool,
    ) -> Result<FailureDisposition, HarvestError> {
        self.mark_failed_sync(job_id, error, retryable)
    }

    async fn outstanding(&self, queue: QueueName) -> Result<usize, HarvestError> {
        self.outstanding_sync(queue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn process(crawl_id: &str) -> Job {
        Job::ProcessCrawl {
            crawl_id: crawl_id.to_string(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_while_pending() {
        let queue = InMemoryJobQueue::new(3);
        let first = queue.enqueue(process("c1")).await.unwrap();
        let second = queue.enqueue(process("c1")).await.unwrap();

        assert!(first.is_queued());
        assert_eq!(second, EnqueueResult::Duplicate(first.job_id()));
        assert_eq!(queue.pending_jobs(QueueName::Scraper).len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_while_running_then_free_after_success() {
        let queue = InMemoryJobQueue::new(3);
        queue.enqueue(process("c1")).await.unwrap();
        let claimed = queue.claim(QueueName::Scraper).await.unwrap().unwrap();

        assert!(!queue.enqueue(process("c1")).await.unwrap().is_queued());

        queue.mark_succeeded(claimed.id).await.unwrap();
        assert!(queue.enqueue(process("c1")).await.unwrap().is_queued());
    }

    #[tokio::test]
    async fn test_claim_respects_queue_and_order() {
        let queue = InMemoryJobQueue::new(3);
        queue.enqueue(Job::Enrich { business_id: 1 }).await.unwrap();
        queue.enqueue(process("a")).await.unwrap();
        queue.enqueue(process("b")).await.unwrap();

        let first = queue.claim(QueueName::Scraper).await.unwrap().unwrap();
        assert_eq!(first.job, process("a"));
        assert_eq!(first.attempt, 1);
        assert_eq!(queue.outstanding(QueueName::Research).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_retry_until_exhausted() {
        let queue = InMemoryJobQueue::new(2);
        queue.enqueue(process("c1")).await.unwrap();

        let claimed = queue.claim(QueueName::Scraper).await.unwrap().unwrap();
        assert_eq!(
            queue.mark_failed(claimed.id, "timeout", true).await.unwrap(),
            FailureDisposition::Retry { attempt: 1 }
        );

        let claimed = queue.claim(QueueName::Scraper).await.unwrap().unwrap();
        assert_eq!(claimed.attempt, 2);
        assert_eq!(
            queue.mark_failed(claimed.id, "timeout", true).await.unwrap(),
            FailureDisposition::Exhausted { attempts: 2 }
        );

        assert!(queue.claim(QueueName::Scraper).await.unwrap().is_none());
        assert_eq!(queue.outstanding(QueueName::Scraper).await.unwrap(), 0);
        assert_eq!(queue.dead_jobs().len(), 1);
        assert_eq!(queue.dead_jobs()[0].error, "timeout");
    }

    #[tokio::test]
    async fn test_permanent_failure_not_retried() {
        let queue = InMemoryJobQueue::new(5);
        queue.enqueue(process("c1")).await.unwrap();
        let claimed = queue.claim(QueueName::Scraper).await.unwrap().unwrap();

        assert_eq!(
            queue.mark_failed(claimed.id, "invalid transition", false).await.unwrap(),
            FailureDisposition::Exhausted { attempts: 1 }
        );
    }
}
