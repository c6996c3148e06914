//! Backend reached over the HTTP API

use proctest_common::graph::single_node_graph;
use proctest_common::{Map, ProcessSpec, Value};
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::BackendAdapter;
use crate::error::{RunnerError, RunnerResult};
use crate::native::{NativeMap, NativeValue};

/// Interval between job status polls
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Configuration for the HTTP backend
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Backend root URL; `https://` is assumed when no scheme is given
    pub url: String,

    /// Pre-issued bearer token, sent verbatim
    pub auth_token: Option<String>,

    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8080".to_string(),
            auth_token: None,
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProcessList {
    processes: Vec<ProcessSpec>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct JobInfo {
    status: String,
}

pub struct HttpBackend {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpBackend {
    pub fn new(config: HttpConfig) -> RunnerResult<Self> {
        let base_url = normalize_backend_url(&config.url);
        if base_url.is_empty() {
            return Err(RunnerError::Config("No backend URL found".to_string()));
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .timeout(config.timeout)
            .build()?;

        info!("Using HTTP backend at {}", base_url);
        Ok(Self {
            client,
            base_url,
            auth_token: config.auth_token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn with_auth(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn send(&self, builder: RequestBuilder) -> RunnerResult<Response> {
        let response = self.with_auth(builder).send()?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(error_from_response(response))
        }
    }

    /// Current status of a batch job
    pub fn job_status(&self, job_id: &str) -> RunnerResult<String> {
        let response = self.send(self.client.get(self.url(&format!("jobs/{}", job_id))))?;
        Ok(response.json::<JobInfo>()?.status)
    }

    /// Poll until every job reaches one of `statuses`.
    ///
    /// Returns `false` once `timeout` has passed; callers decide whether that
    /// is fatal.
    pub fn wait_for_job_status(&self, job_ids: &[String], statuses: &[&str], timeout: Duration) -> bool {
        let start = Instant::now();
        loop {
            let reached = job_ids.iter().all(|job_id| match self.job_status(job_id) {
                Ok(status) => statuses.contains(&status.as_str()),
                Err(e) => {
                    debug!("Failed to get status of job {}: {}", job_id, e);
                    false
                }
            });
            if reached {
                return true;
            }
            if start.elapsed() >= timeout {
                break;
            }
            std::thread::sleep(POLL_INTERVAL);
        }
        warn!("Jobs failed to reach desired state, timeout has been reached.");
        false
    }
}

impl BackendAdapter for HttpBackend {
    fn name(&self) -> &'static str {
        "http"
    }

    fn list_processes(&self) -> RunnerResult<Vec<ProcessSpec>> {
        let response = self.send(self.client.get(self.url("processes")))?;
        Ok(response.json::<ProcessList>()?.processes)
    }

    fn execute(&self, process_id: &str, arguments: NativeMap) -> RunnerResult<NativeValue> {
        let arguments: Map = arguments
            .iter()
            .map(|(name, value)| (name.clone(), value.to_value()))
            .collect();

        let mut body = Map::new();
        body.insert("process".to_string(), single_node_graph(process_id, arguments));

        debug!("POST /result for process {}", process_id);
        let response = self.send(self.client.post(self.url("result")).json(&Value::Object(body)))?;
        Ok(NativeValue::from_value(response.json::<Value>()?))
    }

    fn encode_process_graph(
        &self,
        process: &Value,
        _parent_process_id: &str,
        _parent_parameter: &str,
    ) -> RunnerResult<NativeValue> {
        Ok(NativeValue::from_value(process.clone()))
    }

    fn is_json_only(&self) -> bool {
        true
    }
}

fn error_from_response(response: Response) -> RunnerError {
    let status = response.status().as_u16();
    let body = response.text().unwrap_or_default();
    match serde_json::from_str::<ApiError>(&body) {
        Ok(api_error) => RunnerError::process(api_error.code, api_error.message),
        Err(_) => RunnerError::HttpStatus { status, body },
    }
}

/// Prepend `https://` when the URL has no scheme and drop trailing slashes
pub fn normalize_backend_url(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    if url.is_empty() || url.contains("://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}
