//! Job lifecycle and queue.
//!
//! A single process-wide registry of jobs keyed by identifier, with an
//! admission policy capped at a configured number of simultaneously
//! processing jobs. Excess submissions queue FIFO by queue-entry time; the
//! only mechanism that advances the queue is the completion of a running
//! job. The registry is memory-resident and lost on restart.

pub mod runner;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::export::ExportFormat;

pub type JobId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Complete,
    Error,
}

/// One archiving request. Transitions Queued -> Processing ->
/// {Complete | Error} and never backward.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    pub progress: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub queued_at: Option<DateTime<Utc>>,
    pub url: String,
    pub formats: Vec<ExportFormat>,
    pub max_posts: usize,
    pub download_ready: bool,
    /// Submission order, tie-break for identical queue-entry times.
    seq: u64,
}

/// Status snapshot returned to pollers.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatusSnapshot {
    pub status: JobStatus,
    pub progress: Option<String>,
    pub error: Option<String>,
    pub download_ready: bool,
    /// 1-based rank among currently queued jobs, oldest first.
    pub queue_position: Option<usize>,
    /// Total active (processing + queued) jobs.
    pub queue_total: usize,
}

/// Queue statistics for display.
#[derive(Debug, Clone, Serialize)]
pub struct QueueInfo {
    pub processing: usize,
    pub queued: usize,
    pub total: usize,
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("URL is required")]
    EmptyUrl,
    #[error("at least one format must be selected")]
    NoFormatsRequested,
    #[error("server is at capacity, try again later")]
    AtCapacity,
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("job not found")]
    NotFound,
    #[error("job not complete")]
    NotReady,
}

struct Registry {
    jobs: HashMap<JobId, Job>,
    next_seq: u64,
}

/// Process-wide job registry.
///
/// The registry is shared across OS-parallel server workers, so every
/// mutation is a single step under the mutex; nothing is held across an
/// await point.
#[derive(Clone)]
pub struct JobStore {
    config: Arc<Config>,
    inner: Arc<Mutex<Registry>>,
}

impl JobStore {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            inner: Arc::new(Mutex::new(Registry {
                jobs: HashMap::new(),
                next_seq: 0,
            })),
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Working directory owned exclusively by one job.
    #[must_use]
    pub fn job_dir(&self, id: JobId) -> PathBuf {
        self.config.work_dir.join(id.to_string())
    }

    /// Submit a new archiving request.
    ///
    /// Runs the expiry sweep, validates and normalizes the URL, clamps the
    /// post count to the server ceiling, and either admits the job
    /// immediately or queues it.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid input, or `AtCapacity` when the queue
    /// is full (a queue depth of zero degrades to reject-on-full).
    pub fn submit(
        &self,
        url: &str,
        formats: Vec<ExportFormat>,
        max_posts: usize,
    ) -> Result<JobId, SubmitError> {
        self.sweep_expired();

        let (id, admitted) = self.insert_job(url, formats, max_posts)?;
        if admitted {
            runner::spawn(self.clone(), id);
        }
        Ok(id)
    }

    /// Insert a job without spawning its pipeline. Returns the id and
    /// whether it was admitted to `Processing`.
    fn insert_job(
        &self,
        url: &str,
        formats: Vec<ExportFormat>,
        max_posts: usize,
    ) -> Result<(JobId, bool), SubmitError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(SubmitError::EmptyUrl);
        }
        if formats.is_empty() {
            return Err(SubmitError::NoFormatsRequested);
        }

        let url = normalize_blog_url(url);
        let max_posts = max_posts.clamp(1, self.config.max_posts);
        let now = Utc::now();

        let mut reg = self.inner.lock().expect("job registry poisoned");
        let processing = count_processing(&reg);
        let queued = reg
            .jobs
            .values()
            .filter(|j| j.status == JobStatus::Queued)
            .count();

        let admitted = processing < self.config.max_concurrent_jobs;
        if !admitted && queued >= self.config.queue_depth {
            return Err(SubmitError::AtCapacity);
        }

        let id = Uuid::new_v4();
        let seq = reg.next_seq;
        reg.next_seq += 1;

        let job = Job {
            id,
            status: if admitted {
                JobStatus::Processing
            } else {
                JobStatus::Queued
            },
            progress: admitted.then(|| "Starting...".to_string()),
            error: None,
            created_at: now,
            queued_at: (!admitted).then_some(now),
            url,
            formats,
            max_posts,
            download_ready: false,
            seq,
        };
        reg.jobs.insert(id, job);

        debug!(job_id = %id, admitted, "Job submitted");
        Ok((id, admitted))
    }

    /// Parameters the pipeline needs to run a job.
    #[must_use]
    pub fn params(&self, id: JobId) -> Option<(String, Vec<ExportFormat>, usize)> {
        let reg = self.inner.lock().expect("job registry poisoned");
        reg.jobs
            .get(&id)
            .map(|j| (j.url.clone(), j.formats.clone(), j.max_posts))
    }

    /// Update a processing job's progress message.
    pub fn set_progress(&self, id: JobId, message: &str) {
        let mut reg = self.inner.lock().expect("job registry poisoned");
        if let Some(job) = reg.jobs.get_mut(&id) {
            if job.status == JobStatus::Processing {
                job.progress = Some(message.to_string());
            }
        }
    }

    /// Record a job's terminal outcome and admit the next queued job if
    /// capacity permits.
    ///
    /// Check-capacity-then-admit happens as one atomic step under the
    /// registry lock, so concurrent completions cannot double-admit.
    /// Returns the admitted job, which the caller must spawn.
    #[must_use]
    pub fn finish(&self, id: JobId, outcome: Result<(), String>) -> Option<JobId> {
        let mut reg = self.inner.lock().expect("job registry poisoned");

        if let Some(job) = reg.jobs.get_mut(&id) {
            match outcome {
                Ok(()) => {
                    job.status = JobStatus::Complete;
                    job.download_ready = true;
                    job.progress = None;
                }
                Err(message) => {
                    job.status = JobStatus::Error;
                    job.error = Some(message);
                    job.progress = None;
                }
            }
        }

        admit_next(&mut reg, self.config.max_concurrent_jobs)
    }

    /// Status snapshot for one job.
    #[must_use]
    pub fn status(&self, id: JobId) -> Option<JobStatusSnapshot> {
        let reg = self.inner.lock().expect("job registry poisoned");
        let job = reg.jobs.get(&id)?;

        let processing = count_processing(&reg);
        let queued_ids = queued_in_order(&reg);
        let queue_position = (job.status == JobStatus::Queued)
            .then(|| queued_ids.iter().position(|qid| *qid == id).map(|p| p + 1))
            .flatten();

        Some(JobStatusSnapshot {
            status: job.status,
            progress: job.progress.clone(),
            error: job.error.clone(),
            download_ready: job.download_ready,
            queue_position,
            queue_total: processing + queued_ids.len(),
        })
    }

    /// Queue statistics for display.
    #[must_use]
    pub fn queue_info(&self) -> QueueInfo {
        let reg = self.inner.lock().expect("job registry poisoned");
        let processing = count_processing(&reg);
        let queued = queued_in_order(&reg).len();
        QueueInfo {
            processing,
            queued,
            total: processing + queued,
        }
    }

    /// Path of a completed job's bundle.
    ///
    /// # Errors
    ///
    /// Returns an error when the job is unknown or not complete.
    pub fn download_path(&self, id: JobId) -> Result<PathBuf, DownloadError> {
        let reg = self.inner.lock().expect("job registry poisoned");
        let job = reg.jobs.get(&id).ok_or(DownloadError::NotFound)?;
        if job.status != JobStatus::Complete {
            return Err(DownloadError::NotReady);
        }
        Ok(self.job_dir(id).join(crate::export::bundle::BUNDLE_NAME))
    }

    /// Remove a job's registry entry and schedule deletion of its
    /// directory. Serving a download is a one-shot, destructive read.
    pub fn remove(&self, id: JobId) {
        {
            let mut reg = self.inner.lock().expect("job registry poisoned");
            reg.jobs.remove(&id);
        }
        self.delete_dir(id);
    }

    /// Remove jobs older than the retention window, regardless of status,
    /// and release their on-disk artifacts.
    pub fn sweep_expired(&self) {
        let cutoff = Utc::now() - self.config.job_expiry;
        let expired: Vec<JobId> = {
            let mut reg = self.inner.lock().expect("job registry poisoned");
            let ids: Vec<JobId> = reg
                .jobs
                .values()
                .filter(|j| j.created_at < cutoff)
                .map(|j| j.id)
                .collect();
            for id in &ids {
                reg.jobs.remove(id);
            }
            ids
        };

        for id in expired {
            debug!(job_id = %id, "Expiring job");
            self.delete_dir(id);
        }
    }

    fn delete_dir(&self, id: JobId) {
        let dir = self.job_dir(id);
        tokio::spawn(async move {
            if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(dir = %dir.display(), "Failed to remove job directory: {e}");
                }
            }
        });
    }
}

fn count_processing(reg: &Registry) -> usize {
    reg.jobs
        .values()
        .filter(|j| j.status == JobStatus::Processing)
        .count()
}

/// Queued job ids, oldest queue-entry first, ties broken by submission
/// order.
fn queued_in_order(reg: &Registry) -> Vec<JobId> {
    let mut queued: Vec<&Job> = reg
        .jobs
        .values()
        .filter(|j| j.status == JobStatus::Queued)
        .collect();
    queued.sort_by_key(|j| (j.queued_at, j.seq));
    queued.iter().map(|j| j.id).collect()
}

/// Admit the oldest queued job when capacity permits.
fn admit_next(reg: &mut Registry, cap: usize) -> Option<JobId> {
    if count_processing(reg) >= cap {
        return None;
    }
    let next = queued_in_order(reg).into_iter().next()?;
    let job = reg.jobs.get_mut(&next)?;
    job.status = JobStatus::Processing;
    job.queued_at = None;
    job.progress = Some("Starting...".to_string());
    Some(next)
}

/// Normalize a submitted blog URL: default to https and ensure a trailing
/// slash.
#[must_use]
pub fn normalize_blog_url(url: &str) -> String {
    let mut url = url.trim().to_string();
    if !url.starts_with("http://") && !url.starts_with("https://") {
        url = format!("https://{url}");
    }
    if !url.ends_with('/') {
        url.push('/');
    }
    url
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::Config;

    fn store_with_capacity(cap: usize) -> JobStore {
        let mut config = Config::for_testing();
        config.max_concurrent_jobs = cap;
        JobStore::new(config)
    }

    fn insert(store: &JobStore, url: &str) -> (JobId, bool) {
        store
            .insert_job(url, vec![ExportFormat::Html], 10)
            .expect("insert")
    }

    #[tokio::test]
    async fn test_fifo_positions_and_admission() {
        let store = store_with_capacity(1);

        let (j1, admitted1) = insert(&store, "https://a.example.com");
        let (j2, admitted2) = insert(&store, "https://b.example.com");
        let (j3, admitted3) = insert(&store, "https://c.example.com");

        assert!(admitted1);
        assert!(!admitted2);
        assert!(!admitted3);

        assert_eq!(store.status(j1).unwrap().status, JobStatus::Processing);
        assert_eq!(store.status(j2).unwrap().queue_position, Some(1));
        assert_eq!(store.status(j3).unwrap().queue_position, Some(2));
        assert_eq!(store.status(j3).unwrap().queue_total, 3);

        // Completing j1 admits exactly the oldest queued job.
        let next = store.finish(j1, Ok(()));
        assert_eq!(next, Some(j2));
        assert_eq!(store.status(j1).unwrap().status, JobStatus::Complete);
        assert_eq!(store.status(j2).unwrap().status, JobStatus::Processing);
        assert_eq!(store.status(j3).unwrap().queue_position, Some(1));
    }

    #[tokio::test]
    async fn test_admission_is_idempotent_under_concurrent_completions() {
        let store = store_with_capacity(2);

        let (j1, _) = insert(&store, "https://a.example.com");
        let (j2, _) = insert(&store, "https://b.example.com");
        let (j3, admitted3) = insert(&store, "https://c.example.com");
        assert!(!admitted3);

        // Two completions race; only one may admit the single queued job.
        let first = store.finish(j1, Ok(()));
        let second = store.finish(j2, Err("boom".to_string()));
        assert_eq!(first, Some(j3));
        assert_eq!(second, None);
        assert_eq!(store.status(j2).unwrap().status, JobStatus::Error);
    }

    #[tokio::test]
    async fn test_error_outcome_records_message() {
        let store = store_with_capacity(1);
        let (j1, _) = insert(&store, "https://a.example.com");
        let next = store.finish(j1, Err("no articles could be downloaded".to_string()));
        assert_eq!(next, None);

        let snapshot = store.status(j1).unwrap();
        assert_eq!(snapshot.status, JobStatus::Error);
        assert_eq!(
            snapshot.error.as_deref(),
            Some("no articles could be downloaded")
        );
    }

    #[tokio::test]
    async fn test_max_posts_clamped_to_ceiling() {
        let store = store_with_capacity(1);
        let (id, _) = store
            .insert_job("https://a.example.com", vec![ExportFormat::Html], 500)
            .unwrap();
        let (_, _, max_posts) = store.params(id).unwrap();
        assert_eq!(max_posts, store.config().max_posts);

        let (id2, _) = store
            .insert_job("https://b.example.com", vec![ExportFormat::Html], 0)
            .unwrap();
        let (_, _, max_posts) = store.params(id2).unwrap();
        assert_eq!(max_posts, 1);
    }

    #[tokio::test]
    async fn test_zero_queue_depth_rejects_when_full() {
        let mut config = Config::for_testing();
        config.max_concurrent_jobs = 1;
        config.queue_depth = 0;
        let store = JobStore::new(config);

        let (_j1, admitted) = insert(&store, "https://a.example.com");
        assert!(admitted);

        let err = store
            .insert_job("https://b.example.com", vec![ExportFormat::Html], 10)
            .unwrap_err();
        assert!(matches!(err, SubmitError::AtCapacity));
    }

    #[tokio::test]
    async fn test_submission_validation() {
        let store = store_with_capacity(1);
        assert!(matches!(
            store.insert_job("  ", vec![ExportFormat::Html], 10),
            Err(SubmitError::EmptyUrl)
        ));
        assert!(matches!(
            store.insert_job("https://a.example.com", vec![], 10),
            Err(SubmitError::NoFormatsRequested)
        ));
    }

    #[tokio::test]
    async fn test_expiry_sweep_removes_old_jobs() {
        let mut config = Config::for_testing();
        config.job_expiry = Duration::from_secs(3600);
        let store = JobStore::new(config);

        let (old, _) = insert(&store, "https://a.example.com");
        {
            let mut reg = store.inner.lock().unwrap();
            reg.jobs.get_mut(&old).unwrap().created_at = Utc::now() - Duration::from_secs(7200);
        }
        let (fresh, _) = insert(&store, "https://b.example.com");

        store.sweep_expired();
        assert!(store.status(old).is_none());
        assert!(store.status(fresh).is_some());
    }

    #[tokio::test]
    async fn test_download_is_one_shot() {
        let store = store_with_capacity(1);
        let (id, _) = insert(&store, "https://a.example.com");

        assert!(matches!(
            store.download_path(id),
            Err(DownloadError::NotReady)
        ));

        let _ = store.finish(id, Ok(()));
        assert!(store.download_path(id).is_ok());

        store.remove(id);
        assert!(store.status(id).is_none());
        assert!(matches!(
            store.download_path(id),
            Err(DownloadError::NotFound)
        ));
    }

    #[test]
    fn test_normalize_blog_url() {
        assert_eq!(
            normalize_blog_url("example.com"),
            "https://example.com/".to_string()
        );
        assert_eq!(
            normalize_blog_url("http://example.com/blog"),
            "http://example.com/blog/".to_string()
        );
        assert_eq!(
            normalize_blog_url("  https://example.com/  "),
            "https://example.com/".to_string()
        );
    }
}
