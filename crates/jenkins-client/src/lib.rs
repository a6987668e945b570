//! jenkins-client — read-only access to the Jenkins JSON API.
//!
//! Lists the jobs of a Jenkins controller and the most recent builds of
//! each job. Requests are authenticated with HTTP Basic auth using a user
//! name and API token.
//!
//! # Architecture
//!
//! ```text
//! BuildServer (trait)          ← what the metrics fetcher depends on
//!   └── JenkinsClient
//!         ├── list_jobs()      → GET {url}/api/json?tree=jobs[...]
//!         └── recent_builds()  → GET {job.url}/api/json?tree=builds[...]{0,N}
//! ```

pub mod client;
pub mod error;
pub mod types;

pub use client::{BuildServer, ClientConfig, JenkinsClient};
pub use error::{JenkinsError, JenkinsResult};
pub use types::{Build, BuildResult, Job};
