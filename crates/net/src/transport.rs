//! Transport collaborators: turn a source locator into bytes

use crate::client::NetClient;
use async_trait::async_trait;
use bytes::Bytes;
use kiln_errors::{Error, FetchError};
use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

/// Retrieves the bytes behind a locator
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// # Errors
    ///
    /// Returns `FetchUnavailable` on transient transport failure and
    /// `InvalidSource` when the locator cannot be served at all.
    async fn fetch(&self, uri: &str) -> Result<Bytes, Error>;
}

/// `http://` and `https://` locators
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: NetClient,
}

impl HttpTransport {
    #[must_use]
    pub fn new(client: NetClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, uri: &str) -> Result<Bytes, Error> {
        crate::parse_url(uri)?;
        self.client.get_bytes(uri).await
    }
}

/// `file://` URLs and plain filesystem paths
#[derive(Debug, Clone, Default)]
pub struct FileTransport;

impl FileTransport {
    fn path_for(uri: &str) -> Result<PathBuf, Error> {
        if uri.starts_with("file:") {
            let url = Url::parse(uri).map_err(|e| invalid(uri, e.to_string()))?;
            url.to_file_path()
                .map_err(|()| invalid(uri, "not a local file URL".to_string()))
        } else {
            Ok(PathBuf::from(uri))
        }
    }
}

#[async_trait]
impl Transport for FileTransport {
    async fn fetch(&self, uri: &str) -> Result<Bytes, Error> {
        let path = Self::path_for(uri)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(invalid(
                uri,
                format!("{} does not exist", path.display()),
            )),
            Err(e) => Err(FetchError::FetchUnavailable {
                uri: uri.to_string(),
                message: e.to_string(),
            }
            .into()),
        }
    }
}

/// Dispatches on the locator's scheme
#[derive(Debug, Clone)]
pub struct SchemeTransport {
    http: HttpTransport,
    file: FileTransport,
}

impl SchemeTransport {
    #[must_use]
    pub fn new(client: NetClient) -> Self {
        Self {
            http: HttpTransport::new(client),
            file: FileTransport,
        }
    }
}

#[async_trait]
impl Transport for SchemeTransport {
    async fn fetch(&self, uri: &str) -> Result<Bytes, Error> {
        match scheme_of(uri) {
            Some("http" | "https") => self.http.fetch(uri).await,
            Some("file") | None => self.file.fetch(uri).await,
            Some(other) => Err(invalid(uri, format!("unsupported scheme `{other}`"))),
        }
    }
}

/// Scheme of an absolute URL; `None` for plain paths
fn scheme_of(uri: &str) -> Option<&str> {
    let (scheme, _) = uri.split_once("://")?;
    let valid = !scheme.is_empty()
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then_some(scheme)
}

/// Locator to fetch for a recipe source
///
/// Relative filesystem paths are resolved against the directory the recipe
/// was loaded from.
#[must_use]
pub fn resolve_locator(url: &str, base_dir: Option<&Path>) -> String {
    let url = url.trim();
    if scheme_of(url).is_some() {
        return url.to_string();
    }
    let path = Path::new(url);
    match base_dir {
        Some(base) if path.is_relative() => base.join(path).display().to_string(),
        _ => url.to_string(),
    }
}

fn invalid(uri: &str, message: String) -> Error {
    FetchError::InvalidSource {
        uri: uri.to_string(),
        message,
    }
    .into()
}
