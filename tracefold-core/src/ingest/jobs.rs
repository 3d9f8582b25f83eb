//! Background ingestion jobs
//!
//! A submitted upload gets an id immediately and is processed on its own
//! worker thread. Callers poll [`JobQueue::status`] until the job reaches
//! `completed` or `failed`. Jobs cannot be cancelled.
//!
//! ```text
//! pending ──► processing ──┬──► completed { result }
//!                          └──► failed { error }
//! ```

use super::{IngestCoordinator, IngestReport};
use crate::config::JobsConfig;
use crate::db::EventStore;
use crate::error::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Lifecycle state of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Whether the job will not change any more
    pub fn is_finished(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Snapshot of one ingestion job.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: String,
    /// Upload name
    pub name: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<IngestReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

/// Returned by [`JobQueue::submit`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobHandle {
    pub id: String,
    pub status: JobStatus,
}

/// Retention is capped at a century.
const MAX_RETENTION_SECS: u64 = 100 * 365 * 24 * 3600;

type JobTable = Arc<Mutex<HashMap<String, Job>>>;

fn lock(jobs: &JobTable) -> MutexGuard<'_, HashMap<String, Job>> {
    jobs.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-process job registry backed by worker threads.
pub struct JobQueue<S: EventStore + 'static> {
    coordinator: Arc<IngestCoordinator<S>>,
    jobs: JobTable,
    retention: Duration,
}

impl<S: EventStore + 'static> JobQueue<S> {
    pub fn new(coordinator: Arc<IngestCoordinator<S>>, config: &JobsConfig) -> Self {
        Self {
            coordinator,
            jobs: Arc::new(Mutex::new(HashMap::new())),
            retention: Duration::seconds(config.retention_secs.min(MAX_RETENTION_SECS) as i64),
        }
    }

    /// Queue an upload for ingestion.
    ///
    /// The size limit is enforced here, synchronously, so an oversize upload
    /// never becomes a job.
    pub fn submit(&self, bytes: Vec<u8>, name: &str) -> Result<JobHandle> {
        self.coordinator.check_size(bytes.len() as u64)?;

        let id = uuid::Uuid::new_v4().to_string();
        let job = Job {
            id: id.clone(),
            name: name.to_string(),
            status: JobStatus::Pending,
            result: None,
            error: None,
            created_at: Utc::now(),
            finished_at: None,
        };

        {
            let mut jobs = lock(&self.jobs);
            self.prune(&mut jobs);
            jobs.insert(id.clone(), job);
        }

        let coordinator = Arc::clone(&self.coordinator);
        let jobs = Arc::clone(&self.jobs);
        let job_id = id.clone();
        let name = name.to_string();

        let spawned = std::thread::Builder::new()
            .name(format!("ingest-{}", &id[..8]))
            .spawn(move || run_job(&coordinator, &jobs, &job_id, &bytes, &name));

        if let Err(e) = spawned {
            lock(&self.jobs).remove(&id);
            return Err(Error::Io(e));
        }

        tracing::info!(job_id = %id, "Queued ingestion job");
        Ok(JobHandle {
            id,
            status: JobStatus::Pending,
        })
    }

    /// Current snapshot of a job.
    pub fn status(&self, id: &str) -> Result<Job> {
        lock(&self.jobs)
            .get(id)
            .cloned()
            .ok_or_else(|| Error::JobNotFound(id.to_string()))
    }

    /// Poll until the job finishes or `timeout` elapses; returns the last
    /// snapshot either way.
    pub fn wait(&self, id: &str, timeout: std::time::Duration) -> Result<Job> {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            let job = self.status(id)?;
            if job.status.is_finished() || std::time::Instant::now() >= deadline {
                return Ok(job);
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
    }

    /// Number of tracked jobs
    pub fn len(&self) -> usize {
        lock(&self.jobs).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop finished jobs older than the retention window.
    fn prune(&self, jobs: &mut HashMap<String, Job>) {
        let cutoff = Utc::now() - self.retention;
        let before = jobs.len();
        jobs.retain(|_, job| match job.finished_at {
            Some(finished) => finished >= cutoff,
            None => true,
        });
        let pruned = before - jobs.len();
        if pruned > 0 {
            tracing::debug!(pruned, "Pruned finished jobs");
        }
    }
}

fn update(jobs: &JobTable, id: &str, apply: impl FnOnce(&mut Job)) {
    if let Some(job) = lock(jobs).get_mut(id) {
        apply(job);
    }
}

fn run_job<S: EventStore>(
    coordinator: &IngestCoordinator<S>,
    jobs: &JobTable,
    id: &str,
    bytes: &[u8],
    name: &str,
) {
    update(jobs, id, |job| job.status = JobStatus::Processing);

    let outcome = coordinator.ingest_bytes(bytes, name);

    update(jobs, id, |job| {
        job.finished_at = Some(Utc::now());
        match outcome {
            Ok(report) => {
                job.status = JobStatus::Completed;
                job.result = Some(report);
            }
            Err(e) => {
                tracing::warn!(job_id = %id, error = %e, "Ingestion job failed");
                job.status = JobStatus::Failed;
                job.error = Some(e.to_string());
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IngestConfig;
    use crate::db::MemoryStore;
    use crate::types::DetectedFormat;

    fn queue(retention_secs: u64) -> JobQueue<MemoryStore> {
        let coordinator = Arc::new(IngestCoordinator::new(
            MemoryStore::new(),
            IngestConfig::default(),
        ));
        JobQueue::new(coordinator, &JobsConfig { retention_secs })
    }

    const WAIT: std::time::Duration = std::time::Duration::from_secs(10);

    #[test]
    fn test_job_completes() {
        let queue = queue(3600);
        let handle = queue
            .submit(
                b"abc1234|Alice|2023-10-01T10:00:00Z|Fix bug".to_vec(),
                "log.txt",
            )
            .unwrap();
        assert_eq!(handle.status, JobStatus::Pending);

        let job = queue.wait(&handle.id, WAIT).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        let report = job.result.unwrap();
        assert_eq!(report.detected, DetectedFormat::Git);
        assert_eq!(report.inserted, 1);
        assert!(job.finished_at.is_some());

        // Polling again returns the same terminal snapshot
        assert_eq!(queue.status(&handle.id).unwrap().status, JobStatus::Completed);
    }

    #[test]
    fn test_job_fails_on_blank_document() {
        let queue = queue(3600);
        let handle = queue.submit(b"   ".to_vec(), "blank.txt").unwrap();

        let job = queue.wait(&handle.id, WAIT).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("document is empty"));
        assert!(job.result.is_none());
    }

    #[test]
    fn test_oversize_upload_is_not_queued() {
        let coordinator = Arc::new(IngestCoordinator::new(
            MemoryStore::new(),
            IngestConfig {
                max_upload_bytes: 4,
            },
        ));
        let queue = JobQueue::new(coordinator, &JobsConfig::default());

        let err = queue.submit(b"too large".to_vec(), "big.txt").unwrap_err();
        assert!(matches!(err, Error::UploadTooLarge { .. }));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_unknown_job() {
        let queue = queue(3600);
        assert!(matches!(
            queue.status("no-such-job"),
            Err(Error::JobNotFound(_))
        ));
    }

    #[test]
    fn test_finished_jobs_are_pruned() {
        let queue = queue(0);
        let first = queue.submit(b"some notes".to_vec(), "a.txt").unwrap();
        queue.wait(&first.id, WAIT).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));

        let second = queue.submit(b"more notes".to_vec(), "b.txt").unwrap();
        assert!(queue.status(&first.id).is_err());
        assert!(queue.status(&second.id).is_ok());
    }

    #[test]
    fn test_job_serializes_without_empty_fields() {
        let queue = queue(3600);
        let handle = queue.submit(b"some notes".to_vec(), "a.txt").unwrap();
        let job = queue.wait(&handle.id, WAIT).unwrap();

        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["result"]["detected"], "raw");
        assert!(json.get("error").is_none());
    }
}
