//! GitHub contents API client
//!
//! The whole library lives in one JSON file of a fixed repository. Reads
//! return the decoded document plus its blob SHA (the revision token);
//! writes are conditioned on that SHA so a concurrent writer makes the PUT
//! fail instead of being overwritten.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::credentials::CredentialStore;
use crate::errors::{LibraryError, Result};
use crate::model::{timestamp, AppData};

pub const GITHUB_API_BASE: &str = "https://api.github.com";
pub const REPO_OWNER: &str = "CasualAIGames";
pub const REPO_NAME: &str = "promptlibrary";
pub const DATA_FILE_PATH: &str = "data/library.json";

const ACCEPT: &str = "application/vnd.github.v3+json";
/// Media type returning the file body itself, used for files over 1 MB
const ACCEPT_RAW: &str = "application/vnd.github.raw+json";
const USER_AGENT: &str = concat!("prompt-library/", env!("CARGO_PKG_VERSION"));

/// Remote copy of the library
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch the remote document. `Ok(None)` when it does not exist yet.
    async fn pull(&self) -> Result<Option<AppData>>;

    /// Replace the remote document with `data`
    async fn push(&self, data: &AppData) -> Result<()>;

    /// Whether `token` is accepted by the API
    async fn verify_credential(&self, token: &str) -> bool;
}

/// The remote document with the revision it was read at
#[derive(Debug, Clone)]
pub struct RemoteDocument {
    pub data:     AppData,
    pub revision: String,
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    sha:      String,
    #[serde(default)]
    content:  String,
    /// `"none"` with empty `content` when the file is too large to inline
    #[serde(default)]
    encoding: Option<String>,
}

impl ContentsResponse {
    fn is_inlined(&self) -> bool {
        self.encoding.as_deref() != Some("none") && !self.content.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct WriteResponse {
    content: WrittenContent,
}

#[derive(Debug, Deserialize)]
struct WrittenContent {
    sha: String,
}

#[derive(Debug, Serialize)]
struct WriteRequest<'a> {
    message: String,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha:     Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// Client for the library file in the GitHub repository
pub struct GitHubClient {
    http:        Client,
    base_url:    String,
    credentials: CredentialStore,
}

impl GitHubClient {
    pub fn new(credentials: CredentialStore) -> Result<Self> {
        Self::with_base_url(credentials, GITHUB_API_BASE)
    }

    /// Point the client at another API root (a mock server in tests)
    pub fn with_base_url(credentials: CredentialStore, base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn contents_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.base_url, REPO_OWNER, REPO_NAME, DATA_FILE_PATH
        )
    }

    fn request(&self, method: Method, url: &str, token: &str) -> RequestBuilder {
        self.request_as(method, url, token, ACCEPT)
    }

    fn request_as(&self, method: Method, url: &str, token: &str, accept: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("Authorization", format!("token {}", token))
            .header("Accept", accept)
    }

    fn token(&self) -> Result<String> {
        self.credentials.get().ok_or(LibraryError::NotConfigured)
    }

    /// Read the document and its revision
    pub async fn fetch_document(&self) -> Result<Option<RemoteDocument>> {
        let token = self.token()?;
        let Some(contents) = self.fetch_contents(&token).await? else {
            return Ok(None);
        };

        let data = if contents.is_inlined() {
            decode_content(&contents.content)?
        } else {
            debug!(revision = %contents.sha, "Library file not inlined, fetching raw body");
            self.fetch_raw(&token).await?
        };
        Ok(Some(RemoteDocument {
            data,
            revision: contents.sha,
        }))
    }

    /// Read only the current revision of the document
    pub async fn fetch_revision(&self) -> Result<Option<String>> {
        let token = self.token()?;
        Ok(self.fetch_contents(&token).await?.map(|c| c.sha))
    }

    /// Write `data`, conditioned on `revision`
    ///
    /// `None` creates the file. A revision that no longer matches is
    /// rejected by the API and surfaces as a remote error; it is not
    /// retried. Returns the new revision.
    pub async fn write_document(&self, data: &AppData, revision: Option<&str>) -> Result<String> {
        let token = self.token()?;
        let body = WriteRequest {
            message: format!(
                "Update prompt library - {}",
                timestamp::format(&timestamp::now())
            ),
            content: STANDARD.encode(data.to_pretty_json()?),
            sha:     revision,
        };

        let response = self
            .request(Method::PUT, &self.contents_url(), &token)
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_from(response).await);
        }

        let written: WriteResponse = response.json().await?;
        info!(
            revision = %written.content.sha,
            prompts = data.prompts.len(),
            projects = data.projects.len(),
            "Wrote library to GitHub"
        );
        Ok(written.content.sha)
    }

    /// Read the file body through the raw media type
    async fn fetch_raw(&self, token: &str) -> Result<AppData> {
        let response = self
            .request_as(Method::GET, &self.contents_url(), token, ACCEPT_RAW)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_from(response).await);
        }

        let raw = response.text().await?;
        AppData::parse(&raw)
    }

    async fn fetch_contents(&self, token: &str) -> Result<Option<ContentsResponse>> {
        let response = self
            .request(Method::GET, &self.contents_url(), token)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!("Library file does not exist on GitHub yet");
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(error_from(response).await);
        }

        Ok(Some(response.json().await?))
    }
}

#[async_trait]
impl RemoteStore for GitHubClient {
    async fn pull(&self) -> Result<Option<AppData>> {
        Ok(self.fetch_document().await?.map(|doc| doc.data))
    }

    async fn push(&self, data: &AppData) -> Result<()> {
        let revision = self.fetch_revision().await?;
        self.write_document(data, revision.as_deref()).await?;
        Ok(())
    }

    async fn verify_credential(&self, token: &str) -> bool {
        let url = format!("{}/user", self.base_url);
        match self.request(Method::GET, &url, token.trim()).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(error = %e, "Credential check failed to reach GitHub");
                false
            },
        }
    }
}

/// Decode the base64 `content` field (GitHub wraps it at 60 columns)
fn decode_content(content: &str) -> Result<AppData> {
    let compact: String = content.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact)
        .map_err(|e| LibraryError::Parse(format!("invalid base64 content: {}", e)))?;
    let raw = String::from_utf8(bytes)
        .map_err(|e| LibraryError::Parse(format!("content is not UTF-8: {}", e)))?;
    AppData::parse(&raw)
}

/// Map a non-success response to an error, using GitHub's message if any
async fn error_from(response: Response) -> LibraryError {
    let status = response.status();
    let message = response
        .json::<ApiError>()
        .await
        .map(|e| e.message)
        .unwrap_or_else(|_| status.canonical_reason().unwrap_or("request failed").to_string());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LibraryError::Auth(message),
        _ => LibraryError::remote(status.as_u16(), message),
    }
}
