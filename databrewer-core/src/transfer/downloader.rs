//! Fetching remote files
//!
//! [`Downloader`] is the seam between the transfer orchestration and the
//! network. [`NetworkDownloader`] speaks HTTP(S) through reqwest and FTP
//! through a small passive-mode client.

use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use url::Url;

use super::ftp;
use super::progress::ProgressObserver;
use crate::error::{TransferError, TransportErrorKind};

/// Connect timeout for transfers; the transfer itself is unbounded
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Total timeout for existence probes
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

const USER_AGENT: &str = concat!("databrewer/", env!("CARGO_PKG_VERSION"));

/// URL schemes a [`Downloader`] must handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
    Ftp,
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheme::Http => write!(f, "http"),
            Scheme::Https => write!(f, "https"),
            Scheme::Ftp => write!(f, "ftp"),
        }
    }
}

/// Check that `url` is fully qualified with a supported scheme
pub fn check_scheme(url: &str) -> Result<Scheme, TransferError> {
    let Some((scheme, _)) = url.split_once("://") else {
        return Err(TransferError::InvalidUrl {
            url: url.to_string(),
        });
    };

    match scheme {
        "http" => Ok(Scheme::Http),
        "https" => Ok(Scheme::Https),
        "ftp" => Ok(Scheme::Ftp),
        other => Err(TransferError::UnsupportedScheme {
            scheme: other.to_string(),
            url: url.to_string(),
        }),
    }
}

/// Outcome of an existence probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeStatus {
    /// Reachable, announced size in bytes
    Size(u64),
    /// Reachable, or not probeable, with no announced size
    Unknown,
    /// The server answered with a success status other than 200
    Status(u16),
    /// The probe failed: connection, timeout or an error status
    Failed(String),
}

/// Fetches a remote file into a local path
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Write the content at `url` to `dest`, returning the number of bytes
    ///
    /// `dest` is created or truncated. On error it may hold partial content.
    async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        progress: &mut dyn ProgressObserver,
    ) -> Result<u64, TransferError>;

    /// Cheap existence check for `url`
    async fn probe(&self, url: &str) -> ProbeStatus;
}

/// HTTP(S) and FTP downloader
#[derive(Debug, Clone)]
pub struct NetworkDownloader {
    client: reqwest::Client,
}

impl NetworkDownloader {
    pub fn new() -> Result<Self, TransferError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| TransferError::Transport {
                url: String::new(),
                kind: TransportErrorKind::Protocol,
                message: format!("Failed to create HTTP client: {e}"),
            })?;

        Ok(Self { client })
    }

    async fn fetch_http(
        &self,
        url: &str,
        dest: &Path,
        progress: &mut dyn ProgressObserver,
    ) -> Result<u64, TransferError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransferError::Transport {
                url: url.to_string(),
                kind: TransportErrorKind::Status(status.as_u16()),
                message: format!("HTTP {status}"),
            });
        }

        let total = response.content_length();
        debug!(url, ?total, "Receiving response body");

        let io_err = |source| TransferError::Io {
            path: dest.to_path_buf(),
            source,
        };
        let mut file = tokio::fs::File::create(dest).await.map_err(io_err)?;

        let mut received = 0u64;
        progress.advanced(received, total);
        while let Some(chunk) = response.chunk().await.map_err(|e| transport_error(url, e))? {
            file.write_all(&chunk).await.map_err(io_err)?;
            received += chunk.len() as u64;
            progress.advanced(received, total);
        }
        file.flush().await.map_err(io_err)?;

        Ok(received)
    }

    async fn probe_http(&self, url: &str) -> ProbeStatus {
        let response = match self.client.head(url).timeout(PROBE_TIMEOUT).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!(url, error = %e, "Probe failed");
                return ProbeStatus::Failed(e.to_string());
            }
        };

        let status = response.status();
        if !status.is_success() {
            return ProbeStatus::Failed(format!("HTTP {status}"));
        }
        if status != reqwest::StatusCode::OK {
            return ProbeStatus::Status(status.as_u16());
        }

        // HEAD responses have no body, so read the announced length directly
        response
            .headers()
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse().ok())
            .map_or(ProbeStatus::Unknown, ProbeStatus::Size)
    }
}

#[async_trait]
impl Downloader for NetworkDownloader {
    async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        progress: &mut dyn ProgressObserver,
    ) -> Result<u64, TransferError> {
        match check_scheme(url)? {
            Scheme::Http | Scheme::Https => self.fetch_http(url, dest, progress).await,
            Scheme::Ftp => {
                let parsed = Url::parse(url).map_err(|_| TransferError::InvalidUrl {
                    url: url.to_string(),
                })?;
                ftp::fetch(&parsed, dest, progress).await
            }
        }
    }

    async fn probe(&self, url: &str) -> ProbeStatus {
        match check_scheme(url) {
            Ok(Scheme::Http | Scheme::Https) => self.probe_http(url).await,
            Ok(Scheme::Ftp) => ProbeStatus::Unknown,
            Err(e) => ProbeStatus::Failed(e.to_string()),
        }
    }
}

fn transport_error(url: &str, error: reqwest::Error) -> TransferError {
    let kind = match error.status() {
        Some(status) => TransportErrorKind::Status(status.as_u16()),
        None if error.is_connect() || error.is_timeout() || error.is_body() => {
            TransportErrorKind::Connection
        }
        None => TransportErrorKind::Protocol,
    };

    TransferError::Transport {
        url: url.to_string(),
        kind,
        message: error.to_string(),
    }
}
