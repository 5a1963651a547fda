//! Ingestion coordinator: submit, poll, and load the indexed repository.
//!
//! The coordinator owns at most one poll task. Every submission bumps a job
//! generation; a task only writes shared state while its generation is still
//! current, so a superseded or cancelled poll can never overwrite a newer
//! job even if its last status request is already in flight.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use codesense_types::config::ClientConfig;
use codesense_types::error::IngestionError;
use codesense_types::event::ClientEvent;
use codesense_types::ingestion::{
    IngestionJob, IngestionProgress, IngestionStatus, RepoUrl, Repository, TaskOutcome,
};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::CodeSenseApi;
use crate::event::EventBus;

#[derive(Debug, Default)]
struct Shared {
    generation: u64,
    job: IngestionJob,
    repository: Option<Repository>,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

struct PollHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

/// Tracks one repository ingestion at a time.
pub struct IngestionCoordinator<A: CodeSenseApi + 'static> {
    api: Arc<A>,
    poll_interval: Duration,
    shared: Arc<Mutex<Shared>>,
    poller: Option<PollHandle>,
    events: EventBus,
}

impl<A: CodeSenseApi + 'static> IngestionCoordinator<A> {
    pub fn new(api: Arc<A>, config: &ClientConfig, events: EventBus) -> Self {
        Self {
            api,
            poll_interval: config.poll_interval(),
            shared: Arc::new(Mutex::new(Shared::default())),
            poller: None,
            events,
        }
    }

    /// Snapshot of the current job.
    pub fn job(&self) -> IngestionJob {
        lock(&self.shared).job.clone()
    }

    pub fn status(&self) -> IngestionStatus {
        lock(&self.shared).job.status
    }

    /// The most recently loaded repository, if any.
    pub fn repository(&self) -> Option<Repository> {
        lock(&self.shared).repository.clone()
    }

    pub fn is_polling(&self) -> bool {
        self.poller.as_ref().is_some_and(|p| !p.join.is_finished())
    }

    /// Submit a repository URL for ingestion.
    ///
    /// Any poll loop from an earlier submission is cancelled first. Returns
    /// `Success` when the service already had the repository cached and
    /// `Loading` when a background job was started.
    pub async fn submit(&mut self, url: &str) -> Result<IngestionStatus, IngestionError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(IngestionError::EmptyUrl);
        }
        let repo_url =
            RepoUrl::parse(url).ok_or_else(|| IngestionError::InvalidUrl(url.to_string()))?;

        self.stop_polling();
        let generation = {
            let mut shared = lock(&self.shared);
            shared.generation += 1;
            shared.job = IngestionJob {
                url: url.to_string(),
                status: IngestionStatus::Loading,
                ..IngestionJob::default()
            };
            shared.generation
        };
        self.events.publish(ClientEvent::IngestionStatusChanged {
            status: IngestionStatus::Loading,
            cached: false,
        });
        info!(url = %url, generation, "submitting repository for ingestion");

        let ctx = JobContext {
            api: self.api.clone(),
            shared: self.shared.clone(),
            events: self.events.clone(),
            generation,
            repo_url,
            fallback_repo_id: None,
            db_id: None,
        };

        let response = match self.api.submit_ingest(url).await {
            Ok(response) => response,
            Err(err) => {
                ctx.fail(&err.to_string());
                return Err(err.into());
            }
        };
        let ctx = JobContext {
            fallback_repo_id: response.repo_id.clone(),
            db_id: response.db_id.clone(),
            ..ctx
        };

        if response.is_cached() {
            let Some(repo_id) = response.repo_id else {
                let message = "service reported a cached repository without an id";
                ctx.fail(message);
                return Err(IngestionError::JobFailure(message.to_string()));
            };
            info!(repo_id = %repo_id, "repository already indexed");
            ctx.succeed(true);
            ctx.load_repository(&repo_id).await;
            return Ok(IngestionStatus::Success);
        }

        let Some(task_id) = response.task_id else {
            let message = "service accepted the repository without a task id";
            ctx.fail(message);
            return Err(IngestionError::JobFailure(message.to_string()));
        };
        ctx.update(|job| job.task_id = Some(task_id.clone()));

        let cancel = CancellationToken::new();
        let join = tokio::spawn(poll_task(ctx, task_id, self.poll_interval, cancel.clone()));
        self.poller = Some(PollHandle { cancel, join });
        Ok(IngestionStatus::Loading)
    }

    /// Wait for the live poll loop, if any, and return the final status.
    pub async fn wait_for_completion(&mut self) -> IngestionStatus {
        if let Some(poller) = self.poller.take() {
            if let Err(err) = poller.join.await {
                warn!(error = %err, "ingestion poll task did not complete");
            }
        }
        self.status()
    }

    /// Stop a live poll loop and reset the job to idle.
    ///
    /// The loaded repository, if any, is kept.
    pub fn cancel(&mut self) {
        let was_polling = self.is_polling();
        self.stop_polling();
        {
            let mut shared = lock(&self.shared);
            shared.generation += 1;
            shared.job = IngestionJob::default();
        }
        if was_polling {
            info!("ingestion cancelled");
        }
        self.events.publish(ClientEvent::IngestionStatusChanged {
            status: IngestionStatus::Idle,
            cached: false,
        });
    }

    /// Fetch the content of an indexed file from the active repository.
    pub async fn file_content(&self, path: &str) -> Result<String, IngestionError> {
        let repo_id = {
            let shared = lock(&self.shared);
            let repository = shared
                .repository
                .as_ref()
                .ok_or(IngestionError::NoRepository)?;
            if !repository.contains_file(path) {
                return Err(IngestionError::FileNotIndexed(path.to_string()));
            }
            repository.id.clone()
        };
        let file = self.api.file_content(&repo_id, path).await?;
        Ok(file.content)
    }

    /// Pin an indexed file so it is sent as context with every question.
    ///
    /// Returns `false` if the file was already pinned.
    pub fn pin_file(&self, path: &str) -> Result<bool, IngestionError> {
        let mut shared = lock(&self.shared);
        let repository = shared
            .repository
            .as_mut()
            .ok_or(IngestionError::NoRepository)?;
        if !repository.contains_file(path) {
            return Err(IngestionError::FileNotIndexed(path.to_string()));
        }
        Ok(repository.pinned.insert(path.to_string()))
    }

    /// Returns `false` if the file was not pinned.
    pub fn unpin_file(&self, path: &str) -> bool {
        lock(&self.shared)
            .repository
            .as_mut()
            .is_some_and(|r| r.pinned.remove(path))
    }

    pub fn pinned_files(&self) -> Vec<String> {
        lock(&self.shared)
            .repository
            .as_ref()
            .map(Repository::pinned_files)
            .unwrap_or_default()
    }

    fn stop_polling(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.cancel.cancel();
            debug!("cancelled ingestion poll loop");
        }
    }
}

impl<A: CodeSenseApi + 'static> Drop for IngestionCoordinator<A> {
    fn drop(&mut self) {
        self.stop_polling();
    }
}

/// Everything a job needs to write its outcome, bound to one generation.
struct JobContext<A: CodeSenseApi> {
    api: Arc<A>,
    shared: Arc<Mutex<Shared>>,
    events: EventBus,
    generation: u64,
    repo_url: RepoUrl,
    fallback_repo_id: Option<String>,
    db_id: Option<String>,
}

impl<A: CodeSenseApi> JobContext<A> {
    /// Apply `f` to the job if this context is still current.
    fn update(&self, f: impl FnOnce(&mut IngestionJob)) -> bool {
        let mut shared = lock(&self.shared);
        if shared.generation != self.generation {
            return false;
        }
        f(&mut shared.job);
        true
    }

    /// Mark the job successful; returns `false` if this job was superseded.
    fn succeed(&self, cached: bool) -> bool {
        let applied = self.update(|job| {
            job.status = IngestionStatus::Success;
            job.cached = cached;
            job.error = None;
        });
        if applied {
            self.events.publish(ClientEvent::IngestionStatusChanged {
                status: IngestionStatus::Success,
                cached,
            });
        }
        applied
    }

    fn fail(&self, message: &str) {
        let applied = self.update(|job| {
            job.status = IngestionStatus::Error;
            job.error = Some(message.to_string());
        });
        if applied {
            warn!(error = %message, "ingestion failed");
            self.events.publish(ClientEvent::IngestionStatusChanged {
                status: IngestionStatus::Error,
                cached: false,
            });
            self.events
                .publish(ClientEvent::error(IngestionError::JobFailure(message.to_string()).to_string()));
        }
    }

    fn record_progress(&self, progress: IngestionProgress) {
        let mut changed = false;
        self.update(|job| {
            changed = job.progress != Some(progress);
            job.progress = Some(progress);
        });
        if changed {
            self.events.publish(ClientEvent::IngestionProgress(progress));
        }
    }

    /// Fetch the file list for a finished job and make it the active repository.
    ///
    /// A failed fetch is reported but leaves the job successful.
    async fn load_repository(&self, repo_id: &str) {
        let structure = match self.api.repo_structure(repo_id).await {
            Ok(structure) => structure,
            Err(err) => {
                warn!(repo_id = %repo_id, error = %err, "failed to load repository structure");
                if self.is_current() {
                    self.events
                        .publish(ClientEvent::error(format!("Failed to load repository structure: {err}")));
                }
                return;
            }
        };

        let file_count = structure.files.len();
        let repository = Repository {
            id: repo_id.to_string(),
            db_id: self.db_id.clone(),
            url: self.repo_url.clone(),
            files: structure.files,
            pinned: BTreeSet::new(),
        };
        {
            let mut shared = lock(&self.shared);
            if shared.generation != self.generation {
                return;
            }
            shared.repository = Some(repository);
        }
        info!(repo_id = %repo_id, file_count, "repository ready");
        self.events.publish(ClientEvent::RepositoryReady {
            repo_id: repo_id.to_string(),
            file_count,
        });
    }

    fn is_current(&self) -> bool {
        lock(&self.shared).generation == self.generation
    }
}

async fn poll_task<A: CodeSenseApi>(
    ctx: JobContext<A>,
    task_id: String,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; the first poll waits one interval.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(task_id = %task_id, "poll loop cancelled");
                return;
            }
            _ = ticker.tick() => {}
        }

        // A response that already arrived is still handed to the job
        // context, which drops it if the job was superseded.
        let response = tokio::select! {
            biased;
            response = ctx.api.task_status(&task_id) => response,
            _ = cancel.cancelled() => {
                debug!(task_id = %task_id, "poll loop cancelled");
                return;
            }
        };

        let status = match response {
            Ok(status) => status,
            Err(err) => {
                ctx.fail(&err.to_string());
                return;
            }
        };

        match status.outcome() {
            TaskOutcome::Pending => {
                debug!(task_id = %task_id, status = %status.status, "ingestion still running");
                if let Some(progress) = status.progress() {
                    ctx.record_progress(progress);
                }
            }
            TaskOutcome::Succeeded { repo_id } => {
                let Some(repo_id) = repo_id.or_else(|| ctx.fallback_repo_id.clone()) else {
                    ctx.fail("ingestion finished without a repository id");
                    return;
                };
                info!(task_id = %task_id, repo_id = %repo_id, "ingestion task succeeded");
                if ctx.succeed(false) {
                    ctx.load_repository(&repo_id).await;
                } else {
                    debug!(task_id = %task_id, "discarding result of superseded ingestion job");
                }
                return;
            }
            TaskOutcome::Failed { message } => {
                ctx.fail(&message);
                return;
            }
        }
    }
}
