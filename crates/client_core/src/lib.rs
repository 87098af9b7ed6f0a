use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client, Response,
};
use serde::de::DeserializeOwned;
use shared::{
    domain::InputItem,
    error::ErrorBody,
    protocol::{
        ArtifactRef, ProcessRequest, ProcessUrlRequest, ProcessUrlResponse, StatusResponse,
        UploadResponse, HEALTH_PATH, PROCESS_PATH, PROCESS_URL_PATH, STATUS_PATH, UPLOAD_FIELD,
        UPLOAD_PATH,
    },
};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

pub mod controller;
pub mod input_set;

pub use controller::{
    ActionRejected, Operation, Phase, RemixResult, Resolution, SessionController,
    SessionSnapshot,
};
pub use input_set::{InputSet, InputSetError};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Outcome of one call against the processing service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The request never produced a usable response: connect failure,
    /// timeout, or a body that could not be decoded.
    #[error("transport failure: {0}")]
    Transport(String),
    /// The service answered with a non-success status.
    #[error("service returned status {status}: {}", .message.as_deref().unwrap_or("no error detail"))]
    Application { status: u16, message: Option<String> },
}

impl RemoteError {
    /// Error text supplied by the service, if it sent one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Application {
                message: Some(message),
                ..
            } => Some(message),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(value.to_string())
    }
}

pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

#[derive(Debug, Error)]
pub enum ServiceUrlError {
    #[error("backend url must not be empty")]
    Empty,
    #[error("invalid backend url '{url}': {source}")]
    Parse {
        url: String,
        source: url::ParseError,
    },
    #[error("backend url '{0}' must use http or https")]
    UnsupportedScheme(String),
    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Parses a service base URL and guarantees a trailing slash so endpoint
/// paths join underneath it instead of replacing its last segment.
pub fn normalize_base_url(raw: &str) -> Result<Url, ServiceUrlError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ServiceUrlError::Empty);
    }

    let mut url = Url::parse(raw).map_err(|source| ServiceUrlError::Parse {
        url: raw.to_string(),
        source,
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ServiceUrlError::UnsupportedScheme(raw.to_string()));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

/// The remote processing service as seen by a session.
#[async_trait]
pub trait RemoteService: Send + Sync {
    async fn probe_status(&self) -> RemoteResult<StatusResponse>;
    async fn probe_health(&self) -> RemoteResult<()>;
    async fn submit_url(&self, request: ProcessUrlRequest) -> RemoteResult<ProcessUrlResponse>;
    async fn upload_files(&self, items: Vec<InputItem>) -> RemoteResult<UploadResponse>;
    async fn generate_remix(&self, request: ProcessRequest) -> RemoteResult<serde_json::Value>;
    async fn download_artifact(&self, artifact: ArtifactRef) -> RemoteResult<Vec<u8>>;
}

pub struct HttpRemoteService {
    http: Client,
    base_url: Url,
}

impl HttpRemoteService {
    pub fn new(base_url: &str) -> Result<Self, ServiceUrlError> {
        Self::with_timeouts(base_url, DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeouts(
        base_url: &str,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, ServiceUrlError> {
        let base_url = normalize_base_url(base_url)?;
        let http = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> RemoteResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| RemoteError::Transport(format!("invalid endpoint path '{path}': {e}")))
    }
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> RemoteResult<T> {
    let response = check_status(response).await?;
    response
        .json::<T>()
        .await
        .map_err(|e| RemoteError::Transport(format!("malformed response body: {e}")))
}

async fn check_status(response: Response) -> RemoteResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(|body| body.error);
    warn!(status = status.as_u16(), error = ?message, "service rejected request");
    Err(RemoteError::Application {
        status: status.as_u16(),
        message,
    })
}

fn file_part(item: InputItem) -> RemoteResult<Part> {
    let mime = mime_guess::from_path(&item.name).first_or_octet_stream();
    let part = Part::bytes(item.payload.to_vec())
        .file_name(item.name)
        .mime_str(mime.essence_str())?;
    Ok(part)
}

#[async_trait]
impl RemoteService for HttpRemoteService {
    async fn probe_status(&self) -> RemoteResult<StatusResponse> {
        let response = self.http.get(self.endpoint(STATUS_PATH)?).send().await?;
        decode_json(response).await
    }

    async fn probe_health(&self) -> RemoteResult<()> {
        let response = self.http.get(self.endpoint(HEALTH_PATH)?).send().await?;
        check_status(response).await?;
        Ok(())
    }

    async fn submit_url(&self, request: ProcessUrlRequest) -> RemoteResult<ProcessUrlResponse> {
        let response = self
            .http
            .post(self.endpoint(PROCESS_URL_PATH)?)
            .json(&request)
            .send()
            .await?;
        decode_json(response).await
    }

    async fn upload_files(&self, items: Vec<InputItem>) -> RemoteResult<UploadResponse> {
        let count = items.len();
        let mut form = Form::new();
        for item in items {
            form = form.part(UPLOAD_FIELD, file_part(item)?);
        }
        debug!(parts = count, "uploading multipart form");

        let response = self
            .http
            .post(self.endpoint(UPLOAD_PATH)?)
            .multipart(form)
            .send()
            .await?;
        decode_json(response).await
    }

    async fn generate_remix(&self, request: ProcessRequest) -> RemoteResult<serde_json::Value> {
        let response = self
            .http
            .post(self.endpoint(PROCESS_PATH)?)
            .json(&request)
            .send()
            .await?;
        decode_json(response).await
    }

    async fn download_artifact(&self, artifact: ArtifactRef) -> RemoteResult<Vec<u8>> {
        let response = self
            .http
            .get(self.endpoint(&artifact.relative_path())?)
            .send()
            .await?;
        let bytes = check_status(response).await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
