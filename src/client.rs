use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode, Url};
use tracing::debug;

use crate::{
    error::{DavError, Result},
    propfind::{default_propfind, parse_multistatus},
    source::{DavSource, ListOptions},
    types::{paths_match, DavEntry},
};

/// Connection settings for a WebDAV endpoint
#[derive(Debug, Clone)]
pub struct DavConfig {
    /// Endpoint base URL, e.g. `https://cloud.example.com/remote.php/dav`
    pub base_url: String,
    pub username: String,
    pub password: String,
    /// Transport timeout; the listing operation itself enforces none
    pub timeout_seconds: u64,
}

impl DavConfig {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            username: username.into(),
            password: password.into(),
            timeout_seconds: 30,
        }
    }

    /// Check that the base URL and credentials are usable
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.base_url).map_err(|e| DavError::InvalidConfig {
            message: format!("invalid base URL: {e}"),
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(DavError::InvalidConfig {
                message: format!("unsupported URL scheme: {}", url.scheme()),
            });
        }
        if self.username.is_empty() {
            return Err(DavError::InvalidConfig {
                message: "username must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// WebDAV-backed listing source
///
/// Issues `PROPFIND` requests with `Depth: 1` against the endpoint and
/// parses the multistatus responses into raw records.
#[derive(Clone)]
pub struct WebdavClient {
    client: Client,
    config: DavConfig,
    /// Endpoint path prepended by the server to every href
    endpoint: String,
    propfind: Method,
}

impl WebdavClient {
    pub fn new(config: DavConfig) -> Result<Self> {
        config.validate()?;

        let url = Url::parse(&config.base_url).map_err(|e| DavError::InvalidConfig {
            message: format!("invalid base URL: {e}"),
        })?;
        let endpoint = url.path().trim_end_matches('/').to_string();

        let client = Client::builder()
            .user_agent("dav-files/0.1")
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .unwrap_or_else(|_| Client::new());

        let propfind =
            Method::from_bytes(b"PROPFIND").map_err(|_| DavError::InvalidConfig {
                message: "PROPFIND method rejected by HTTP client".to_string(),
            })?;

        Ok(Self {
            client,
            config,
            endpoint,
            propfind,
        })
    }

    /// Build the request URL for an endpoint-relative path
    fn request_url(&self, path: &str) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }
}

#[async_trait]
impl DavSource for WebdavClient {
    async fn get_directory_contents(
        &self,
        path: &str,
        options: &ListOptions,
    ) -> Result<Vec<DavEntry>> {
        let url = self.request_url(path);
        let payload = options
            .payload
            .clone()
            .unwrap_or_else(default_propfind);

        debug!(%url, "sending PROPFIND");

        let response = self
            .client
            .request(self.propfind.clone(), &url)
            .header("Depth", "1")
            .header("Content-Type", "application/xml")
            .basic_auth(&self.config.username, Some(&self.config.password))
            .body(payload)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(DavError::NotFound {
                path: path.to_string(),
            });
        }
        if status != StatusCode::MULTI_STATUS && !status.is_success() {
            return Err(DavError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let mut entries = parse_multistatus(&body, &self.endpoint)?;

        // Servers always return the collection's own entry; drop it
        // unless the caller asked for it
        if !options.include_self {
            entries.retain(|e| !paths_match(&e.path, path));
        }

        Ok(entries)
    }

    fn identifier(&self) -> String {
        format!("webdav://{}@{}", self.config.username, self.config.base_url)
    }
}
