use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use log::{debug, info, warn};
use rewind_backend::{BackendError, FileTransfer, NetworkStage};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::mirror::MirrorTable;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30 * 60);
const DEFAULT_RETRY_DELAYS_SECS: [u64; 3] = [0, 2, 5];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),
    #[error("failed to fetch {url}: {details}")]
    Request { url: String, details: String },
    #[error("{url} responded with HTTP {status}{body_snippet}")]
    HttpStatus {
        url: String,
        status: u16,
        body_snippet: String,
    },
    #[error("failed to parse {url}: {details}")]
    Deserialize { url: String, details: String },
}

/// Shared HTTP handle injected into every component that talks to the
/// network. Cloning is cheap; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a transport with the given per-request timeout.
    ///
    /// # Errors
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .user_agent(format!("rewind/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|error| FetchError::ClientBuild(error.to_string()))?;
        Ok(Self { client })
    }

    /// Build a transport with the default timeout.
    ///
    /// # Errors
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn with_defaults() -> Result<Self, FetchError> {
        Self::new(DEFAULT_TIMEOUT)
    }

    #[must_use]
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// GET `url` and return the body as text.
    ///
    /// # Errors
    /// Returns an error when the request fails, the server responds with a
    /// non-success status, or the body cannot be read.
    pub async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|error| FetchError::Request {
                url: url.to_string(),
                details: error.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body_snippet = response
                .text()
                .await
                .ok()
                .map(|body| response_snippet(&body, 160))
                .unwrap_or_default();
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status,
                body_snippet,
            });
        }

        response.text().await.map_err(|error| FetchError::Request {
            url: url.to_string(),
            details: error.to_string(),
        })
    }

    /// GET `url` and deserialize the JSON body.
    ///
    /// # Errors
    /// As [`fetch_text`](Self::fetch_text), plus [`FetchError::Deserialize`]
    /// when the document does not have the expected shape.
    pub async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let body = self.fetch_text(url).await?;
        serde_json::from_str(&body).map_err(|error| FetchError::Deserialize {
            url: url.to_string(),
            details: error.to_string(),
        })
    }
}

fn response_snippet(body: &str, max_chars: usize) -> String {
    let snippet: String = body.chars().take(max_chars).collect();
    if snippet.is_empty() {
        String::new()
    } else {
        format!(": {snippet}")
    }
}

/// [`FileTransfer`] over plain HTTPS with retries and optional mirror
/// rewriting.
pub struct HttpFileTransfer {
    transport: HttpTransport,
    retry_delays_secs: Vec<u64>,
    timeout: Duration,
    mirrors: Option<Arc<MirrorTable>>,
}

impl HttpFileTransfer {
    #[must_use]
    pub fn new(transport: HttpTransport) -> Self {
        Self {
            transport,
            retry_delays_secs: DEFAULT_RETRY_DELAYS_SECS.to_vec(),
            timeout: DEFAULT_DOWNLOAD_TIMEOUT,
            mirrors: None,
        }
    }

    #[must_use]
    pub fn with_retry_delays(mut self, retry_delays_secs: Vec<u64>) -> Self {
        self.retry_delays_secs = retry_delays_secs;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_mirrors(mut self, mirrors: Arc<MirrorTable>) -> Self {
        self.mirrors = Some(mirrors);
        self
    }

    async fn download_once(&self, url: &str, dest: &Path) -> Result<u64, BackendError> {
        let response = self
            .transport
            .client()
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|error| BackendError::network_request_from("download", error))?;

        if !response.status().is_success() {
            return Err(BackendError::network(
                "download",
                NetworkStage::Status,
                format!("HTTP {} for {url}", response.status()),
            ));
        }

        let part_path = part_path(dest);
        let written = match write_body(response, &part_path).await {
            Ok(bytes) => tokio::fs::rename(&part_path, dest)
                .await
                .map(|()| bytes)
                .map_err(BackendError::from),
            Err(error) => Err(error),
        };
        if written.is_err() {
            let _ = tokio::fs::remove_file(&part_path).await;
        }
        written
    }
}

async fn write_body(response: reqwest::Response, path: &Path) -> Result<u64, BackendError> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut downloaded: u64 = 0;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|error| {
            BackendError::network("download", NetworkStage::Body, error.to_string())
        })?;
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(downloaded)
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

#[async_trait]
impl FileTransfer for HttpFileTransfer {
    async fn download(&self, url: &str, dest: &Path) -> Result<(), BackendError> {
        let resolved = match &self.mirrors {
            Some(mirrors) => mirrors.mirror_url(url).await,
            None => url.to_string(),
        };

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut last_error = None;
        for (attempt, &delay_secs) in self.retry_delays_secs.iter().enumerate() {
            if delay_secs > 0 {
                tokio::time::sleep(Duration::from_secs(delay_secs)).await;
            }

            debug!("Downloading {resolved} (attempt {})", attempt + 1);
            match self.download_once(&resolved, dest).await {
                Ok(bytes) => {
                    info!("Downloaded {bytes} bytes to {}", dest.display());
                    return Ok(());
                }
                Err(error) => {
                    warn!("Download attempt {} of {resolved} failed: {error}", attempt + 1);
                    last_error = Some(error);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            BackendError::network(
                "download",
                NetworkStage::Request,
                "no download attempts configured",
            )
        }))
    }
}
