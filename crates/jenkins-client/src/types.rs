//! Jenkins API response types.
//!
//! Only the fields requested through the `tree` query parameter are
//! modelled; everything else Jenkins sends (`_class` and friends) is ignored.

use serde::{Deserialize, Serialize};

/// A job as listed on the Jenkins root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub name: String,
    /// Absolute URL of the job, usually with a trailing slash.
    pub url: String,
    /// Ball color (`blue`, `red_anime`, ...). Folders have none.
    #[serde(default)]
    pub color: Option<String>,
}

/// A single build of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Build {
    pub number: u64,
    #[serde(default)]
    pub url: Option<String>,
    /// Raw result string; `null` while the build is running.
    #[serde(default)]
    pub result: Option<String>,
    /// Duration in milliseconds. Zero while the build is running.
    #[serde(default)]
    pub duration: u64,
    /// Start time in milliseconds since the Unix epoch.
    #[serde(default)]
    pub timestamp: u64,
    #[serde(default)]
    pub building: bool,
}

impl Build {
    /// Parsed build result.
    pub fn result(&self) -> BuildResult {
        self.result
            .as_deref()
            .map(BuildResult::parse)
            .unwrap_or(BuildResult::Unknown)
    }

    /// Whether the build has finished.
    pub fn is_completed(&self) -> bool {
        !self.building && self.result.is_some()
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration as f64 / 1000.0
    }

    pub fn start_secs(&self) -> f64 {
        self.timestamp as f64 / 1000.0
    }
}

/// Outcome of a completed build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildResult {
    Success,
    Unstable,
    Failure,
    NotBuilt,
    Aborted,
    Unknown,
}

impl BuildResult {
    fn parse(s: &str) -> Self {
        match s {
            "SUCCESS" => BuildResult::Success,
            "UNSTABLE" => BuildResult::Unstable,
            "FAILURE" => BuildResult::Failure,
            "NOT_BUILT" => BuildResult::NotBuilt,
            "ABORTED" => BuildResult::Aborted,
            _ => BuildResult::Unknown,
        }
    }

    /// Numeric code exported as the build result metric value.
    pub fn code(self) -> f64 {
        match self {
            BuildResult::Success => 0.0,
            BuildResult::Unstable => 1.0,
            BuildResult::Failure => 2.0,
            BuildResult::NotBuilt => 3.0,
            BuildResult::Aborted => 4.0,
            BuildResult::Unknown => -1.0,
        }
    }
}

/// Body of `GET {url}/api/json?tree=jobs[...]`.
#[derive(Debug, Deserialize)]
pub(crate) struct JobList {
    #[serde(default)]
    pub jobs: Vec<Job>,
}

/// Body of `GET {job.url}/api/json?tree=builds[...]`.
#[derive(Debug, Deserialize)]
pub(crate) struct BuildList {
    #[serde(default)]
    pub builds: Vec<Build>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_job_list_ignores_class_fields() {
        let body = r#"{
            "_class": "hudson.model.Hudson",
            "jobs": [
                {"_class": "hudson.model.FreeStyleProject", "name": "api", "url": "http://ci/job/api/", "color": "blue"},
                {"_class": "com.cloudbees.hudson.plugins.folder.Folder", "name": "team", "url": "http://ci/job/team/"}
            ]
        }"#;
        let list: JobList = serde_json::from_str(body).unwrap();
        assert_eq!(list.jobs.len(), 2);
        assert_eq!(list.jobs[0].color.as_deref(), Some("blue"));
        assert_eq!(list.jobs[1].color, None);
    }

    #[test]
    fn parse_build_list() {
        let body = r#"{
            "builds": [
                {"number": 12, "building": true, "result": null, "duration": 0, "timestamp": 1700000060000},
                {"number": 11, "building": false, "result": "FAILURE", "duration": 4500, "timestamp": 1700000000000}
            ]
        }"#;
        let list: BuildList = serde_json::from_str(body).unwrap();
        assert_eq!(list.builds.len(), 2);
        assert!(!list.builds[0].is_completed());
        assert!(list.builds[1].is_completed());
        assert_eq!(list.builds[1].result(), BuildResult::Failure);
        assert_eq!(list.builds[1].duration_secs(), 4.5);
        assert_eq!(list.builds[1].start_secs(), 1_700_000_000.0);
    }

    #[test]
    fn missing_builds_field_is_empty() {
        let list: BuildList = serde_json::from_str("{}").unwrap();
        assert!(list.builds.is_empty());
    }

    #[test]
    fn result_codes() {
        assert_eq!(BuildResult::parse("SUCCESS").code(), 0.0);
        assert_eq!(BuildResult::parse("UNSTABLE").code(), 1.0);
        assert_eq!(BuildResult::parse("FAILURE").code(), 2.0);
        assert_eq!(BuildResult::parse("NOT_BUILT").code(), 3.0);
        assert_eq!(BuildResult::parse("ABORTED").code(), 4.0);
        assert_eq!(BuildResult::parse("SOMETHING_NEW").code(), -1.0);
    }

    #[test]
    fn running_build_has_unknown_result() {
        let build = Build {
            number: 1,
            url: None,
            result: None,
            duration: 0,
            timestamp: 0,
            building: true,
        };
        assert_eq!(build.result(), BuildResult::Unknown);
    }
}
