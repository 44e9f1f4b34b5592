//! Backend REST client
//!
//! Owns the shared HTTP client and the base URLs every transport resolves
//! its endpoints against.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};
use url::Url;

use crate::config::ForgeConfig;
use crate::error::PipelineError;
use crate::pipeline::BuildLog;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartBuildBody<'a> {
    project_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct StartBuildResponse {
    build_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileBody<'a> {
    project_id: &'a str,
    file: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct FileContent {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Clone)]
pub struct BackendClient {
    http: Client,
    backend: Url,
    socket: Url,
    connect_timeout: Duration,
}

impl BackendClient {
    /// Create a client from configuration
    pub fn new(config: &ForgeConfig) -> anyhow::Result<Self> {
        let policy = config.timeout_policy();
        let http = Client::builder()
            .user_agent(concat!("Forge/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(policy.connect)
            .build()
            .unwrap_or_else(|e| {
                error!("Failed to build HTTP client: {}. Using default client.", e);
                Client::new()
            });
        Ok(Self {
            http,
            backend: with_trailing_slash(config.backend()?),
            socket: with_trailing_slash(config.socket()?),
            connect_timeout: policy.connect,
        })
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    /// Map a request failure, naming the configured connect timeout when one fired
    pub(crate) fn request_error(&self, err: reqwest::Error) -> PipelineError {
        if err.is_timeout() {
            PipelineError::Timeout(self.connect_timeout)
        } else {
            PipelineError::Transport(err.to_string())
        }
    }

    pub fn backend_url(&self) -> &Url {
        &self.backend
    }

    /// Resolve a backend endpoint path such as `api/chat/stream`
    pub fn endpoint(&self, path: &str) -> Result<Url, PipelineError> {
        self.backend
            .join(path)
            .map_err(|e| PipelineError::Transport(format!("invalid endpoint '{}': {}", path, e)))
    }

    /// Socket URL streaming the events of one build
    pub fn build_socket_url(&self, build_id: &str) -> Result<Url, PipelineError> {
        self.socket
            .join(&format!("ws/build/{}", build_id))
            .map_err(|e| PipelineError::Transport(format!("invalid build id '{}': {}", build_id, e)))
    }

    /// Download location of a build's artifact
    pub fn artifact_url(&self, build_id: &str) -> Result<Url, PipelineError> {
        self.endpoint(&format!("api/build/{}/download", build_id))
    }

    /// Download location, offered only once the build completed
    pub fn download_url(&self, log: &BuildLog) -> Option<Url> {
        if !log.can_download() {
            return None;
        }
        log.build_id().and_then(|id| self.artifact_url(id).ok())
    }

    /// Ask the backend to start a build; returns its id
    pub async fn start_build(&self, project_id: &str) -> Result<String, PipelineError> {
        let url = self.endpoint("api/build/start")?;
        info!(project = project_id, "Starting build");
        let response = self
            .http
            .post(url)
            .json(&StartBuildBody { project_id })
            .send()
            .await
            .map_err(|e| self.request_error(e))?;
        let response = check_status(response).await?;
        let body: StartBuildResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::Decode(e.to_string()))?;
        debug!(build = %body.build_id, "Build accepted");
        Ok(body.build_id)
    }

    pub async fn read_file(&self, project_id: &str, file: &str) -> Result<String, PipelineError> {
        let url = self.endpoint("api/files/read")?;
        let response = self
            .http
            .post(url)
            .json(&FileBody {
                project_id,
                file,
                content: None,
            })
            .send()
            .await
            .map_err(|e| self.request_error(e))?;
        let response = check_status(response).await?;
        let body: FileContent = response
            .json()
            .await
            .map_err(|e| PipelineError::Decode(e.to_string()))?;
        Ok(body.content)
    }

    pub async fn write_file(
        &self,
        project_id: &str,
        file: &str,
        content: &str,
    ) -> Result<(), PipelineError> {
        let url = self.endpoint("api/files/write")?;
        let response = self
            .http
            .post(url)
            .json(&FileBody {
                project_id,
                file,
                content: Some(content),
            })
            .send()
            .await
            .map_err(|e| self.request_error(e))?;
        check_status(response).await?;
        debug!(project = project_id, file, "File written");
        Ok(())
    }
}

/// Turn a non-success response into a transport error
pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, PipelineError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    error!("Backend error response: {} - {}", status, body);
    Err(PipelineError::from_status(status, body.trim()))
}

/// `Url::join` replaces the last path segment unless the base ends with '/'
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
