//! Pipeline module: queued stage work for discovery crawls and businesses
//!
//! This module contains:
//! - Stage definitions and the chaining decision (`stage`)
//! - Job payloads and the queue interface (`jobs`, `queue`)
//! - Stage handlers: discovery, crawl processing, website crawl
//! - The orchestrator that advances business status and enqueues the next stage
//! - The resume supervisor run at process start
//! - The worker that drains the queues under per-queue concurrency limits

pub mod discovery;
mod jobs;
pub mod orchestrator;
pub mod processing;
mod queue;
mod research;
mod stage;
pub mod supervisor;
pub mod website;
mod worker;

pub use jobs::{Job, QueueName};
pub use queue::{ClaimedJob, DeadJob, EnqueueResult, FailureDisposition, InMemoryJobQueue, JobQueue};
pub use research::{NoPlaces, NoopResearch, PlaceSource, ResearchServices};
pub use stage::{next_action, NextAction, Stage, StageOutcome};
pub use supervisor::{ResumeAction, ResumeReport, StartupReport};
pub use worker::{Worker, WorkerReport};

use crate::artifacts::ArtifactStore;
use crate::config::{Config, PriorityTableCache};
use crate::crawler::{CrawlOptions, Fetcher, SiteCrawler};
use crate::storage::{SqliteStorage, StorageResult};
use crate::HarvestError;
use std::sync::{Arc, Mutex};

/// Everything a stage handler needs, shared by all workers
pub struct PipelineContext {
    config: Config,
    storage: Arc<Mutex<SqliteStorage>>,
    artifacts: ArtifactStore,
    queue: Arc<dyn JobQueue>,
    fetcher: Fetcher,
    priorities: PriorityTableCache,
    research: Arc<dyn ResearchServices>,
    places: Arc<dyn PlaceSource>,
}

impl PipelineContext {
    /// Builds a context with no external research or places services
    pub fn new(
        config: Config,
        storage: SqliteStorage,
        queue: Arc<dyn JobQueue>,
    ) -> Result<Self, HarvestError> {
        let fetcher = Fetcher::new(&config.fetcher, &config.user_agent)?;
        let artifacts = ArtifactStore::new(config.storage.artifacts_dir.clone());
        let priorities = PriorityTableCache::from_config(&config);

        Ok(Self {
            config,
            storage: Arc::new(Mutex::new(storage)),
            artifacts,
            queue,
            fetcher,
            priorities,
            research: Arc::new(NoopResearch),
            places: Arc::new(NoPlaces),
        })
    }

    pub fn with_research(mut self, research: Arc<dyn ResearchServices>) -> Self {
        self.research = research;
        self
    }

    pub fn with_places(mut self, places: Arc<dyn PlaceSource>) -> Self {
        self.places = places;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    pub fn queue(&self) -> &dyn JobQueue {
        self.queue.as_ref()
    }

    pub fn research(&self) -> &dyn ResearchServices {
        self.research.as_ref()
    }

    pub fn places(&self) -> &dyn PlaceSource {
        self.places.as_ref()
    }

    pub fn priorities(&self) -> &PriorityTableCache {
        &self.priorities
    }

    /// Runs `f` against the store while holding its lock
    ///
    /// The lock is released before this returns; never call it across an await.
    pub fn with_storage<T>(
        &self,
        f: impl FnOnce(&mut SqliteStorage) -> StorageResult<T>,
    ) -> Result<T, HarvestError> {
        let mut storage = self
            .storage
            .lock()
            .map_err(|_| HarvestError::Storage("storage lock poisoned".to_string()))?;
        Ok(f(&mut storage)?)
    }

    /// A site crawler with the current priority table and the given page budget
    pub fn site_crawler(&self, max_pages: u32) -> Result<SiteCrawler, HarvestError> {
        let priorities = self.priorities.get()?;
        let options = CrawlOptions::from_config(&self.config, max_pages);
        Ok(SiteCrawler::new(self.fetcher.clone(), priorities, options))
    }
}
