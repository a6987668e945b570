//! HTTP client for the Jenkins JSON API.
//!
//! Uses hyper's pooled legacy client behind a rustls connector, so both
//! `http` and `https` controllers work. Server certificates are checked
//! against the Mozilla root store. Every request carries a Basic
//! `Authorization` header and is bounded by the configured request timeout,
//! covering connect, TLS handshake, response headers and body.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use http::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use http::{HeaderValue, Request, Uri};
use http_body_util::{BodyExt, Empty};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{JenkinsError, JenkinsResult};
use crate::types::{Build, BuildList, Job, JobList};

/// `tree` selector for the job list, pre-encoded (`jobs[name,url,color]`).
const JOBS_TREE: &str = "jobs%5Bname,url,color%5D";

/// `tree` selector for build history, without the range suffix.
const BUILDS_TREE: &str = "builds%5Bnumber,url,result,duration,timestamp,building%5D";

const USER_AGENT_VALUE: &str = concat!("jenkins-exporter/", env!("CARGO_PKG_VERSION"));

/// The upstream operations the metrics fetcher needs.
///
/// Implemented by [`JenkinsClient`]; tests substitute in-memory fakes.
pub trait BuildServer: Send + Sync {
    /// List all top-level jobs.
    fn list_jobs(&self) -> impl Future<Output = JenkinsResult<Vec<Job>>> + Send;

    /// Fetch at most `limit` of the most recent builds of `job`, newest first.
    fn recent_builds(
        &self,
        job: &Job,
        limit: usize,
    ) -> impl Future<Output = JenkinsResult<Vec<Build>>> + Send;
}

/// Connection settings for [`JenkinsClient`].
#[derive(Clone)]
pub struct ClientConfig {
    /// Base URL of the Jenkins controller, e.g. `http://jenkins:8080`.
    pub url: String,
    pub user: String,
    pub token: String,
    pub request_timeout: Duration,
}

/// Jenkins JSON API client.
pub struct JenkinsClient {
    base_url: String,
    auth: HeaderValue,
    http: Client<HttpsConnector<HttpConnector>, Empty<Bytes>>,
    request_timeout: Duration,
}

impl JenkinsClient {
    /// Create a client. Fails if the base URL is not an absolute `http` or
    /// `https` URL.
    pub fn new(config: ClientConfig) -> JenkinsResult<Self> {
        let base_url = config.url.trim_end_matches('/').to_string();
        validate_base_url(&base_url)?;

        let credentials = STANDARD.encode(format!("{}:{}", config.user, config.token));
        let mut auth = HeaderValue::from_str(&format!("Basic {credentials}")).map_err(|e| {
            JenkinsError::InvalidUrl {
                url: base_url.clone(),
                reason: format!("credentials do not form a valid header: {e}"),
            }
        })?;
        auth.set_sensitive(true);

        let connector = HttpsConnectorBuilder::new()
            .with_tls_config(tls_config()?)
            .https_or_http()
            .enable_http1()
            .build();
        let http = Client::builder(TokioExecutor::new()).build(connector);

        Ok(Self {
            base_url,
            auth,
            http,
            request_timeout: config.request_timeout,
        })
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn jobs_url(&self) -> String {
        format!("{}/api/json?tree={JOBS_TREE}", self.base_url)
    }

    fn builds_url(&self, job: &Job, limit: usize) -> String {
        let job_url = if job.url.is_empty() {
            format!("{}/job/{}", self.base_url, urlencoding::encode(&job.name))
        } else {
            job.url.trim_end_matches('/').to_string()
        };
        format!("{job_url}/api/json?tree={BUILDS_TREE}%7B0,{limit}%7D")
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> JenkinsResult<T> {
        let result = tokio::time::timeout(self.request_timeout, self.send(&url)).await;
        match result {
            Ok(result) => result,
            Err(_) => {
                debug!(%url, timeout_ms = self.request_timeout.as_millis() as u64, "jenkins request timed out");
                Err(JenkinsError::Timeout {
                    url,
                    timeout: self.request_timeout,
                })
            }
        }
    }

    async fn send<T: DeserializeOwned>(&self, url: &str) -> JenkinsResult<T> {
        let uri: Uri = url.parse().map_err(|e: http::uri::InvalidUri| JenkinsError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let req = Request::get(uri)
            .header(AUTHORIZATION, self.auth.clone())
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, USER_AGENT_VALUE)
            .body(Empty::<Bytes>::new())
            .map_err(|e| JenkinsError::InvalidUrl {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let resp = self
            .http
            .request(req)
            .await
            .map_err(|source| JenkinsError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            debug!(%url, %status, "jenkins returned non-2xx");
            return Err(JenkinsError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = resp
            .into_body()
            .collect()
            .await
            .map_err(|source| JenkinsError::Body {
                url: url.to_string(),
                source,
            })?
            .to_bytes();

        serde_json::from_slice(&body).map_err(|source| JenkinsError::Decode {
            url: url.to_string(),
            source,
        })
    }
}

impl BuildServer for JenkinsClient {
    async fn list_jobs(&self) -> JenkinsResult<Vec<Job>> {
        let list: JobList = self.get_json(self.jobs_url()).await?;
        debug!(jobs = list.jobs.len(), "listed jenkins jobs");
        Ok(list.jobs)
    }

    async fn recent_builds(&self, job: &Job, limit: usize) -> JenkinsResult<Vec<Build>> {
        let mut list: BuildList = self.get_json(self.builds_url(job, limit)).await?;
        list.builds.truncate(limit);
        Ok(list.builds)
    }
}

/// Client TLS settings: ring provider, safe protocol defaults, webpki roots.
fn tls_config() -> JenkinsResult<rustls::ClientConfig> {
    let mut roots = rustls::RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = rustls::ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(JenkinsError::Tls)?
    .with_root_certificates(roots)
    .with_no_client_auth();
    Ok(config)
}

fn validate_base_url(url: &str) -> JenkinsResult<()> {
    let invalid = |reason: &str| JenkinsError::InvalidUrl {
        url: url.to_string(),
        reason: reason.to_string(),
    };

    let uri: Uri = url.parse().map_err(|e: http::uri::InvalidUri| invalid(&e.to_string()))?;
    match uri.scheme_str() {
        Some("http" | "https") => {}
        Some(other) => {
            return Err(invalid(&format!(
                "unsupported scheme {other}, expected http or https"
            )));
        }
        None => return Err(invalid("missing scheme")),
    }
    if uri.host().is_none() {
        return Err(invalid("missing host"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client(url: &str) -> JenkinsClient {
        JenkinsClient::new(ClientConfig {
            url: url.to_string(),
            user: "admin".to_string(),
            token: "secret".to_string(),
            request_timeout: Duration::from_secs(1),
        })
        .unwrap()
    }

    fn job(name: &str, url: &str) -> Job {
        Job {
            name: name.to_string(),
            url: url.to_string(),
            color: None,
        }
    }

    #[tokio::test]
    async fn trailing_slash_is_trimmed() {
        let client = test_client("http://ci.local:8080/jenkins/");
        assert_eq!(client.base_url(), "http://ci.local:8080/jenkins");
        assert_eq!(
            client.jobs_url(),
            "http://ci.local:8080/jenkins/api/json?tree=jobs%5Bname,url,color%5D"
        );
    }

    #[tokio::test]
    async fn builds_url_uses_job_url_and_range() {
        let client = test_client("http://ci.local");
        let url = client.builds_url(&job("api", "http://ci.local/job/api/"), 5);
        assert_eq!(
            url,
            "http://ci.local/job/api/api/json?tree=builds%5Bnumber,url,result,duration,timestamp,building%5D%7B0,5%7D"
        );
    }

    #[tokio::test]
    async fn builds_url_falls_back_to_job_name() {
        let client = test_client("http://ci.local");
        let url = client.builds_url(&job("nightly build", ""), 3);
        assert!(url.starts_with("http://ci.local/job/nightly%20build/api/json?"));
        assert!(url.ends_with("%7B0,3%7D"));
    }

    #[tokio::test]
    async fn builds_url_escapes_reserved_characters_in_job_name() {
        let client = test_client("http://ci.local");
        let url = client.builds_url(&job("release #2 ?50%/a", ""), 1);
        assert!(
            url.starts_with("http://ci.local/job/release%20%232%20%3F50%25%2Fa/api/json?"),
            "{url}"
        );
        assert!(url.parse::<Uri>().is_ok());
    }

    #[tokio::test]
    async fn https_controller_is_accepted() {
        let client = test_client("https://ci.example.com/");
        assert_eq!(client.base_url(), "https://ci.example.com");
        assert!(client.jobs_url().starts_with("https://ci.example.com/api/json?"));
    }

    #[tokio::test]
    async fn auth_header_is_basic_and_sensitive() {
        let client = test_client("http://ci.local");
        // base64("admin:secret")
        assert_eq!(client.auth.to_str().unwrap(), "Basic YWRtaW46c2VjcmV0");
        assert!(client.auth.is_sensitive());
    }

    #[test]
    fn rejects_other_schemes_and_relative_urls() {
        assert!(validate_base_url("https://ci.local").is_ok());
        assert!(validate_base_url("ftp://ci.local").is_err());
        assert!(validate_base_url("ci.local:8080").is_err());
        assert!(validate_base_url("/jenkins").is_err());
        assert!(validate_base_url("http://ci.local:8080").is_ok());
    }
}
