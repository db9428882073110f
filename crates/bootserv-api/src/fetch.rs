//! # CI Artifact Download
//!
//! [`HttpArtifactFetcher`] downloads the artifact of a selected build over
//! HTTP. The URL comes from a template with these placeholders:
//!
//! | Placeholder     | Value                         |
//! |-----------------|-------------------------------|
//! | `{project_url}` | `project.web_url` of the event, without a trailing `/` |
//! | `{project_id}`  | `project.id` of the event     |
//! | `{job_id}`      | id of the selected build      |
//! | `{artifact}`    | configured artifact name      |
//!
//! Downloads larger than the configured maximum are refused: up front when
//! CI announces a `Content-Length`, otherwise as soon as the received
//! chunks pass the limit.

use std::time::Duration;

use async_trait::async_trait;
use bootserv_core::{ArtifactFetcher, BuildRef, FetchError};

use crate::state::{AppConfig, DEFAULT_MAX_ARTIFACT_SIZE};

/// Header GitLab reads API tokens from.
pub const PRIVATE_TOKEN_HEADER: &str = "PRIVATE-TOKEN";

#[derive(Clone)]
pub struct HttpArtifactFetcher {
    http: reqwest::Client,
    template: String,
    artifact: String,
    api_token: Option<String>,
    max_size: u64,
}

impl std::fmt::Debug for HttpArtifactFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpArtifactFetcher")
            .field("template", &self.template)
            .field("artifact", &self.artifact)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("max_size", &self.max_size)
            .finish()
    }
}

impl HttpArtifactFetcher {
    pub fn new(
        template: impl Into<String>,
        artifact: impl Into<String>,
        api_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("bootserv/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Transport {
                url: "client_init".into(),
                message: e.to_string(),
            })?;
        Ok(Self {
            http,
            template: template.into(),
            artifact: artifact.into(),
            api_token: api_token.filter(|t| !t.is_empty()),
            max_size: DEFAULT_MAX_ARTIFACT_SIZE,
        })
    }

    /// Refuse artifacts larger than `max_size` bytes.
    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, FetchError> {
        Ok(Self::new(
            config.artifact_url_template.clone(),
            config.artifact_name.clone(),
            config.ci_api_token.clone(),
            config.fetch_timeout,
        )?
        .with_max_size(config.max_artifact_size))
    }

    /// Expand the template for `build`.
    pub fn url_for(&self, build: &BuildRef) -> Result<String, FetchError> {
        let mut url = self.template.clone();
        if url.contains("{project_url}") {
            let project_url = build
                .project_url
                .as_deref()
                .ok_or_else(|| FetchError::Url("event carries no project.web_url".into()))?;
            url = url.replace("{project_url}", project_url.trim_end_matches('/'));
        }
        if url.contains("{project_id}") {
            let project_id = build
                .project_id
                .ok_or_else(|| FetchError::Url("event carries no project.id".into()))?;
            url = url.replace("{project_id}", &project_id.to_string());
        }
        url = url
            .replace("{job_id}", &build.job_id.to_string())
            .replace("{artifact}", &self.artifact);

        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(FetchError::Url(format!("not an http(s) URL: {url}")));
        }
        Ok(url)
    }
}

#[async_trait]
impl ArtifactFetcher for HttpArtifactFetcher {
    async fn fetch(&self, build: &BuildRef) -> Result<Vec<u8>, FetchError> {
        let url = self.url_for(build)?;
        tracing::debug!(%url, build_id = build.job_id, "downloading artifact");

        let mut request = self.http.get(&url);
        if let Some(token) = &self.api_token {
            request = request.header(PRIVATE_TOKEN_HEADER, token);
        }
        let mut response = request.send().await.map_err(|e| FetchError::Transport {
            url: url.clone(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let too_large = |url: String| FetchError::TooLarge {
            url,
            limit: self.max_size,
        };
        if response.content_length().is_some_and(|len| len > self.max_size) {
            return Err(too_large(url));
        }

        let mut body = Vec::new();
        loop {
            let chunk = response.chunk().await.map_err(|e| FetchError::Transport {
                url: url.clone(),
                message: e.to_string(),
            })?;
            let Some(chunk) = chunk else { break };
            if (body.len() + chunk.len()) as u64 > self.max_size {
                return Err(too_large(url));
            }
            body.extend_from_slice(&chunk);
        }
        if body.is_empty() {
            return Err(FetchError::Empty { url });
        }
        Ok(body)
    }
}
