//! Ingestion job, repository, and ingestion wire types.

use serde::{Deserialize, Serialize};

use std::collections::BTreeSet;
use std::fmt;

/// Status value the ingest endpoint uses for a cache hit.
pub const INGEST_STATUS_CACHED: &str = "cached";

/// Terminal task states reported by the status endpoint.
pub const TASK_STATUS_SUCCESS: &str = "SUCCESS";
pub const TASK_STATUS_FAILURE: &str = "FAILURE";

/// Client-side lifecycle of an ingestion job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestionStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

impl IngestionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, IngestionStatus::Success | IngestionStatus::Error)
    }
}

impl fmt::Display for IngestionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestionStatus::Idle => write!(f, "idle"),
            IngestionStatus::Loading => write!(f, "loading"),
            IngestionStatus::Success => write!(f, "success"),
            IngestionStatus::Error => write!(f, "error"),
        }
    }
}

/// Hosting provider inferred from a repository URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoProvider {
    Github,
    Gitlab,
}

/// A repository URL broken into provider, owner, and name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoUrl {
    /// The URL as submitted (trimmed).
    pub url: String,
    pub provider: RepoProvider,
    pub owner: String,
    pub name: String,
}

impl RepoUrl {
    /// Parse `https://github.com/owner/name[.git]` style URLs.
    ///
    /// The scheme is optional. At least `host/owner/name` must be present.
    /// Hosts containing "gitlab" are GitLab; everything else is GitHub.
    pub fn parse(url: &str) -> Option<Self> {
        let trimmed = url.trim();
        let mut rest = trimmed.strip_suffix(".git").unwrap_or(trimmed);
        if let Some((_, after_scheme)) = rest.split_once("://") {
            rest = after_scheme;
        }

        let mut parts = rest.split('/');
        let domain = parts.next()?.to_lowercase();
        let owner = parts.next()?;
        let name = parts.next()?;
        if domain.is_empty() || owner.is_empty() || name.is_empty() {
            return None;
        }

        let provider = if domain.contains("gitlab") {
            RepoProvider::Gitlab
        } else {
            RepoProvider::Github
        };

        Some(Self {
            url: trimmed.to_string(),
            provider,
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    /// `owner/name`, as shown in the UI.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// Processed/total file counters reported while a job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionProgress {
    pub processed_files: u32,
    pub total_files: u32,
}

/// The ingestion job currently tracked by a coordinator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionJob {
    pub url: String,
    pub task_id: Option<String>,
    pub status: IngestionStatus,
    pub cached: bool,
    pub progress: Option<IngestionProgress>,
    pub error: Option<String>,
}

/// An ingested repository and the client-side state attached to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    /// Identifier assigned by the ingestion service.
    pub id: String,
    /// Identifier of the persisted repository record, when the service provides one.
    pub db_id: Option<String>,
    pub url: RepoUrl,
    /// Indexed file paths, in the order the service listed them.
    pub files: Vec<String>,
    pub pinned: BTreeSet<String>,
}

impl Repository {
    pub fn contains_file(&self, path: &str) -> bool {
        self.files.iter().any(|f| f == path)
    }

    pub fn pinned_files(&self) -> Vec<String> {
        self.pinned.iter().cloned().collect()
    }

    /// The id sessions are filed under: the persisted id when known,
    /// otherwise the service id.
    pub fn session_key(&self) -> &str {
        self.db_id.as_deref().unwrap_or(&self.id)
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Response of `POST /ingest?url=`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestResponse {
    pub status: String,
    #[serde(default)]
    pub repo_id: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub db_id: Option<String>,
}

impl IngestResponse {
    pub fn is_cached(&self) -> bool {
        self.status.eq_ignore_ascii_case(INGEST_STATUS_CACHED)
    }
}

/// Response of `GET /status/{task_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatusResponse {
    pub status: String,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub processed_files: Option<u32>,
    #[serde(default)]
    pub total_files: Option<u32>,
}

/// Terminal or non-terminal reading of a task status response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Pending,
    Succeeded { repo_id: Option<String> },
    Failed { message: String },
}

impl TaskStatusResponse {
    pub fn outcome(&self) -> TaskOutcome {
        match self.status.as_str() {
            TASK_STATUS_SUCCESS => TaskOutcome::Succeeded {
                repo_id: self
                    .result
                    .as_ref()
                    .and_then(|r| r.get("repo_id"))
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
            },
            TASK_STATUS_FAILURE => TaskOutcome::Failed {
                message: self.failure_message(),
            },
            _ => TaskOutcome::Pending,
        }
    }

    pub fn progress(&self) -> Option<IngestionProgress> {
        match (self.processed_files, self.total_files) {
            (Some(processed_files), Some(total_files)) => Some(IngestionProgress {
                processed_files,
                total_files,
            }),
            _ => None,
        }
    }

    fn failure_message(&self) -> String {
        if let Some(error) = self.error.as_deref().filter(|e| !e.is_empty()) {
            return error.to_string();
        }
        match &self.result {
            Some(serde_json::Value::String(s)) if !s.is_empty() => s.clone(),
            Some(value) => value
                .get("error")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| "ingestion task failed".to_string()),
            None => "ingestion task failed".to_string(),
        }
    }
}

/// Response of `GET /repo/{id}/structure`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoStructure {
    #[serde(default)]
    pub files: Vec<String>,
}

/// Response of `GET /repo/{id}/file?path=`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContent {
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_github_url() {
        let url = RepoUrl::parse("https://github.com/a/b").unwrap();
        assert_eq!(url.provider, RepoProvider::Github);
        assert_eq!(url.owner, "a");
        assert_eq!(url.name, "b");
        assert_eq!(url.full_name(), "a/b");
    }

    #[test]
    fn test_parse_strips_git_suffix_and_scheme() {
        let url = RepoUrl::parse("  gitlab.com/group/project.git ").unwrap();
        assert_eq!(url.provider, RepoProvider::Gitlab);
        assert_eq!(url.name, "project");
        assert_eq!(url.url, "gitlab.com/group/project.git");
    }

    #[test]
    fn test_parse_rejects_short_urls() {
        assert!(RepoUrl::parse("https://github.com/only-owner").is_none());
        assert!(RepoUrl::parse("").is_none());
        assert!(RepoUrl::parse("https://github.com//b").is_none());
    }

    #[test]
    fn test_ingest_response_cached() {
        let resp: IngestResponse =
            serde_json::from_str(r#"{"status":"cached","repo_id":"R1"}"#).unwrap();
        assert!(resp.is_cached());
        assert_eq!(resp.task_id, None);

        let resp: IngestResponse =
            serde_json::from_str(r#"{"status":"queued","task_id":"T1"}"#).unwrap();
        assert!(!resp.is_cached());
    }

    #[test]
    fn test_task_outcome_success_with_result() {
        let resp: TaskStatusResponse =
            serde_json::from_str(r#"{"status":"SUCCESS","result":{"repo_id":"R1"}}"#).unwrap();
        assert_eq!(
            resp.outcome(),
            TaskOutcome::Succeeded {
                repo_id: Some("R1".to_string())
            }
        );
    }

    #[test]
    fn test_task_outcome_pending_for_unknown_status() {
        for status in ["PENDING", "STARTED", "running"] {
            let resp = TaskStatusResponse {
                status: status.to_string(),
                result: None,
                error: None,
                processed_files: None,
                total_files: None,
            };
            assert_eq!(resp.outcome(), TaskOutcome::Pending);
        }
    }

    #[test]
    fn test_task_outcome_failure_message() {
        let resp: TaskStatusResponse =
            serde_json::from_str(r#"{"status":"FAILURE","result":"clone failed"}"#).unwrap();
        assert_eq!(
            resp.outcome(),
            TaskOutcome::Failed {
                message: "clone failed".to_string()
            }
        );

        let resp: TaskStatusResponse =
            serde_json::from_str(r#"{"status":"FAILURE"}"#).unwrap();
        assert_eq!(
            resp.outcome(),
            TaskOutcome::Failed {
                message: "ingestion task failed".to_string()
            }
        );
    }

    #[test]
    fn test_progress_requires_both_counters() {
        let resp: TaskStatusResponse = serde_json::from_str(
            r#"{"status":"PENDING","processed_files":3,"total_files":10}"#,
        )
        .unwrap();
        assert_eq!(
            resp.progress(),
            Some(IngestionProgress {
                processed_files: 3,
                total_files: 10
            })
        );

        let resp: TaskStatusResponse =
            serde_json::from_str(r#"{"status":"PENDING","processed_files":3}"#).unwrap();
        assert_eq!(resp.progress(), None);
    }

    #[test]
    fn test_repository_session_key_prefers_db_id() {
        let mut repo = Repository {
            id: "R1".to_string(),
            db_id: None,
            url: RepoUrl::parse("https://github.com/a/b").unwrap(),
            files: vec!["src/lib.rs".to_string()],
            pinned: BTreeSet::new(),
        };
        assert_eq!(repo.session_key(), "R1");
        repo.db_id = Some("db-7".to_string());
        assert_eq!(repo.session_key(), "db-7");
        assert!(repo.contains_file("src/lib.rs"));
        assert!(!repo.contains_file("src/main.rs"));
    }
}
