use crate::models::Job;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

/// Keyed storage for job records. The pipeline is the only writer;
/// `update` must apply its mutator atomically with respect to
/// concurrent readers so a snapshot never exposes a half-written job.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn put(&self, job: Job) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Option<Job>>;

    /// Atomic read-modify-write of a single record. Returns the job
    /// as it looks after the mutation. The mutator is higher-ranked
    /// over the borrow so implementations can hand it a reference of
    /// any lifetime.
    async fn update(
        &self,
        id: Uuid,
        mutator: Box<dyn for<'a> FnOnce(&'a mut Job) + Send>,
    ) -> Result<Option<Job>>;
}

/// In-memory job store backed by a concurrent map. Mutations run while
/// holding the entry's shard lock, which is what makes `update` atomic
/// for readers going through `get`.
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: DashMap<Uuid, Job>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn put(&self, job: Job) -> Result<()> {
        if self.jobs.contains_key(&job.id) {
            return Err(anyhow!("job id already exists: {}", job.id));
        }
        self.jobs.insert(job.id, job);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Job>> {
        Ok(self.jobs.get(&id).map(|entry| entry.value().clone()))
    }

    async fn update(
        &self,
        id: Uuid,
        mutator: Box<dyn for<'a> FnOnce(&'a mut Job) + Send>,
    ) -> Result<Option<Job>> {
        match self.jobs.get_mut(&id) {
            Some(mut entry) => {
                mutator(entry.value_mut());
                Ok(Some(entry.value().clone()))
            }
            None => Ok(None),
        }
    }
}
