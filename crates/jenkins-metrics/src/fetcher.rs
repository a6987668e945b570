//! Fetcher — turns Jenkins build history into samples.
//!
//! For every job the N most recent builds are read; each completed build
//! yields one sample per exported metric, labeled with the job name and
//! build number.

use std::future::Future;

use jenkins_client::{Build, BuildServer, Job};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::sample::Sample;

/// Builds read per job unless configured otherwise.
pub const DEFAULT_BUILDS_PER_JOB: usize = 5;

const BUILD_DURATION: &str = "jenkins_build_duration_seconds";
const BUILD_DURATION_HELP: &str = "Duration of a completed Jenkins build in seconds.";
const BUILD_RESULT: &str = "jenkins_build_result_code";
const BUILD_RESULT_HELP: &str =
    "Result of a completed Jenkins build (0=success, 1=unstable, 2=failure, 3=not built, 4=aborted, -1=unknown).";
const BUILD_START: &str = "jenkins_build_start_timestamp_seconds";
const BUILD_START_HELP: &str = "Unix timestamp at which a Jenkins build started.";

/// Samples gathered by one fetch plus the jobs that had to be skipped.
#[derive(Debug, Default)]
pub struct FetchReport {
    pub samples: Vec<Sample>,
    pub failures: Vec<JobFailure>,
}

/// A job whose build history could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFailure {
    pub job: String,
    pub error: String,
}

/// Source of sample batches for the refresh loop.
pub trait Fetch: Send + Sync {
    /// Fetch a fresh batch. Must not touch shared state.
    fn fetch_all(&self) -> impl Future<Output = Result<FetchReport, FetchError>> + Send;
}

/// [`Fetch`] implementation backed by a Jenkins [`BuildServer`].
pub struct JenkinsFetcher<S> {
    server: S,
    builds_per_job: usize,
}

impl<S: BuildServer> JenkinsFetcher<S> {
    pub fn new(server: S) -> Self {
        Self {
            server,
            builds_per_job: DEFAULT_BUILDS_PER_JOB,
        }
    }

    /// Override how many recent builds are read per job.
    pub fn with_builds_per_job(mut self, builds_per_job: usize) -> Self {
        self.builds_per_job = builds_per_job;
        self
    }

    pub fn server(&self) -> &S {
        &self.server
    }
}

impl<S: BuildServer> Fetch for JenkinsFetcher<S> {
    async fn fetch_all(&self) -> Result<FetchReport, FetchError> {
        let observed_at = Instant::now();
        let jobs = self.server.list_jobs().await?;

        let mut report = FetchReport::default();
        for job in &jobs {
            match self.server.recent_builds(job, self.builds_per_job).await {
                Ok(builds) => {
                    for build in builds.iter().filter(|b| b.is_completed()) {
                        report.samples.extend(build_samples(job, build, observed_at));
                    }
                }
                Err(e) => {
                    warn!(job = %job.name, error = %e, "skipping job, build history unavailable");
                    report.failures.push(JobFailure {
                        job: job.name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        debug!(
            jobs = jobs.len(),
            samples = report.samples.len(),
            failed_jobs = report.failures.len(),
            "jenkins fetch complete"
        );
        Ok(report)
    }
}

/// Samples for one completed build.
fn build_samples(job: &Job, build: &Build, observed_at: Instant) -> Vec<Sample> {
    let number = build.number.to_string();
    let labels = [("job", job.name.as_str()), ("build", number.as_str())];

    let metrics = [
        (BUILD_DURATION, BUILD_DURATION_HELP, build.duration_secs()),
        (BUILD_RESULT, BUILD_RESULT_HELP, build.result().code()),
        (BUILD_START, BUILD_START_HELP, build.start_secs()),
    ];

    metrics
        .into_iter()
        .filter_map(|(name, help, value)| {
            match Sample::gauge(name, help, &labels, value, observed_at) {
                Ok(sample) => Some(sample),
                Err(e) => {
                    warn!(job = %job.name, build = build.number, metric = name, error = %e, "dropping sample");
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use jenkins_client::{JenkinsError, JenkinsResult};
    use std::collections::HashSet;

    /// In-memory build server. Jobs named in `broken` fail their build fetch.
    struct FakeServer {
        jobs: Vec<Job>,
        broken: HashSet<String>,
        list_fails: bool,
    }

    impl FakeServer {
        fn new(names: &[&str]) -> Self {
            Self {
                jobs: names
                    .iter()
                    .map(|n| Job {
                        name: n.to_string(),
                        url: format!("http://ci/job/{n}/"),
                        color: None,
                    })
                    .collect(),
                broken: HashSet::new(),
                list_fails: false,
            }
        }

        fn broken(mut self, name: &str) -> Self {
            self.broken.insert(name.to_string());
            self
        }
    }

    fn completed(number: u64, result: &str) -> Build {
        Build {
            number,
            url: None,
            result: Some(result.to_string()),
            duration: 2_000 * number,
            timestamp: 1_700_000_000_000 + number * 1_000,
            building: false,
        }
    }

    impl BuildServer for FakeServer {
        async fn list_jobs(&self) -> JenkinsResult<Vec<Job>> {
            if self.list_fails {
                return Err(JenkinsError::Status {
                    url: "http://ci/api/json".to_string(),
                    status: 503,
                });
            }
            Ok(self.jobs.clone())
        }

        async fn recent_builds(&self, job: &Job, limit: usize) -> JenkinsResult<Vec<Build>> {
            if self.broken.contains(&job.name) {
                return Err(JenkinsError::Status {
                    url: job.url.clone(),
                    status: 500,
                });
            }
            let mut builds = vec![Build {
                number: 3,
                url: None,
                result: None,
                duration: 0,
                timestamp: 1_700_000_003_000,
                building: true,
            }];
            builds.push(completed(2, "SUCCESS"));
            builds.push(completed(1, "FAILURE"));
            builds.truncate(limit);
            Ok(builds)
        }
    }

    fn jobs_in(report: &FetchReport) -> Vec<String> {
        let mut jobs: Vec<String> = Vec::new();
        for s in &report.samples {
            let job = s.label("job").unwrap().to_string();
            if jobs.last() != Some(&job) {
                jobs.push(job);
            }
        }
        jobs
    }

    #[tokio::test]
    async fn completed_builds_become_three_samples_each() {
        let fetcher = JenkinsFetcher::new(FakeServer::new(&["api"]));
        let report = fetcher.fetch_all().await.unwrap();

        // Build 3 is still running and is skipped.
        assert_eq!(report.samples.len(), 6);
        assert!(report.failures.is_empty());

        let duration = report
            .samples
            .iter()
            .find(|s| s.name() == BUILD_DURATION && s.label("build") == Some("2"))
            .unwrap();
        assert_eq!(duration.value(), Some(4.0));

        let result = report
            .samples
            .iter()
            .find(|s| s.name() == BUILD_RESULT && s.label("build") == Some("1"))
            .unwrap();
        assert_eq!(result.value(), Some(2.0));

        let start = report
            .samples
            .iter()
            .find(|s| s.name() == BUILD_START && s.label("build") == Some("2"))
            .unwrap();
        assert_eq!(start.value(), Some(1_700_000_002.0));
    }

    #[tokio::test]
    async fn one_broken_job_does_not_blank_the_fetch() {
        let server = FakeServer::new(&["job-1", "job-2", "job-3"]).broken("job-2");
        let report = JenkinsFetcher::new(server).fetch_all().await.unwrap();

        assert_eq!(jobs_in(&report), vec!["job-1", "job-3"]);
        assert_eq!(report.samples.len(), 12);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].job, "job-2");
        assert!(report.failures[0].error.contains("500"));
    }

    #[tokio::test]
    async fn job_list_failure_fails_the_fetch() {
        let mut server = FakeServer::new(&["api"]);
        server.list_fails = true;

        let err = JenkinsFetcher::new(server).fetch_all().await.unwrap_err();
        assert!(matches!(err, FetchError::JobList(_)));
    }

    #[tokio::test]
    async fn builds_per_job_limits_the_window() {
        let fetcher = JenkinsFetcher::new(FakeServer::new(&["api"])).with_builds_per_job(2);
        let report = fetcher.fetch_all().await.unwrap();

        // Window is builds 3 (running) and 2.
        assert_eq!(report.samples.len(), 3);
        assert!(report.samples.iter().all(|s| s.label("build") == Some("2")));
    }

    #[tokio::test]
    async fn batch_shares_one_timestamp() {
        let fetcher = JenkinsFetcher::new(FakeServer::new(&["a", "b"]));
        let report = fetcher.fetch_all().await.unwrap();

        let first = report.samples[0].observed_at();
        assert!(report.samples.iter().all(|s| s.observed_at() == first));
    }

    #[tokio::test]
    async fn repeated_fetches_are_equivalent() {
        let fetcher = JenkinsFetcher::new(FakeServer::new(&["a", "b"]));
        let first = fetcher.fetch_all().await.unwrap();
        let second = fetcher.fetch_all().await.unwrap();

        let flatten = |r: &FetchReport| {
            r.samples
                .iter()
                .map(|s| (s.name().to_string(), s.label("job").map(str::to_string), s.value()))
                .collect::<Vec<_>>()
        };
        assert_eq!(flatten(&first), flatten(&second));
    }

    #[tokio::test]
    async fn no_jobs_is_an_empty_success() {
        let report = JenkinsFetcher::new(FakeServer::new(&[])).fetch_all().await.unwrap();
        assert!(report.samples.is_empty());
        assert!(report.failures.is_empty());
    }
}
