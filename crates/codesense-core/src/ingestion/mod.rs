//! Repository ingestion tracking.
//!
//! The `IngestionCoordinator` submits a repository URL to the service, polls
//! the resulting background job, and loads the indexed file list once the job
//! completes.

pub mod coordinator;

pub use coordinator::IngestionCoordinator;
