//! Fetch error types.

use std::time::Duration;

use jenkins_client::JenkinsError;
use thiserror::Error;

/// A refresh cycle that produced no samples at all.
///
/// Per-job failures are not errors; they are reported in
/// [`FetchReport::failures`](crate::FetchReport).
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to list jobs: {0}")]
    JobList(#[from] JenkinsError),

    #[error("fetch did not finish within {0:?}")]
    Timeout(Duration),
}
