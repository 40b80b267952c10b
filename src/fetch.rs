use std::borrow::Cow;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::LAST_MODIFIED;
use reqwest::Client;
use tracing::debug;

use crate::error::FetchError;

/// Raw body of a CSV resource plus what the transport knows about it.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched {
    pub body: String,
    pub last_modified: Option<DateTime<Utc>>,
    /// Recoverable oddities found while reading, such as undecodable bytes.
    pub warnings: Vec<String>,
}

impl Fetched {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            last_modified: None,
            warnings: Vec::new(),
        }
    }
}

#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, location: &str) -> Result<Fetched, FetchError>;
}

#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, location: &str) -> Result<Fetched, FetchError> {
        debug!(url = location, "GET");
        let response = self.client.get(location).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        let last_modified = response
            .headers()
            .get(LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| DateTime::parse_from_rfc2822(s).ok())
            .map(|d| d.with_timezone(&Utc));
        let body = response.text().await?;
        Ok(Fetched {
            body,
            last_modified,
            warnings: Vec::new(),
        })
    }
}

/// Reads survey files from disk. Rooted paths such as `/data/x.csv` are
/// looked up under `root` first, the way a static asset server would.
#[derive(Debug, Clone)]
pub struct FileFetcher {
    root: PathBuf,
}

impl FileFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn resolve(&self, location: &str) -> PathBuf {
        let under_root = self.root.join(location.trim_start_matches('/'));
        if Path::new(location).is_absolute() && tokio::fs::metadata(&under_root).await.is_err() {
            return PathBuf::from(location);
        }
        under_root
    }
}

#[async_trait]
impl Fetch for FileFetcher {
    async fn fetch(&self, location: &str) -> Result<Fetched, FetchError> {
        let path = self.resolve(location).await;
        debug!(path = %path.display(), "read");
        let bytes = tokio::fs::read(&path).await?;
        let mut warnings = Vec::new();
        let body = match String::from_utf8_lossy(&bytes) {
            Cow::Borrowed(text) => text.to_string(),
            Cow::Owned(text) => {
                warnings.push(format!(
                    "{location}: file is not valid UTF-8, undecodable bytes were replaced"
                ));
                text
            }
        };
        let last_modified = tokio::fs::metadata(&path)
            .await
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from);
        Ok(Fetched {
            body,
            last_modified,
            warnings,
        })
    }
}

/// Sends `http(s)://` locations over the network and everything else to disk.
#[derive(Debug, Clone)]
pub struct SourceFetcher {
    http: HttpFetcher,
    files: FileFetcher,
}

impl SourceFetcher {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            http: HttpFetcher::default(),
            files: FileFetcher::new(data_root),
        }
    }
}

#[async_trait]
impl Fetch for SourceFetcher {
    async fn fetch(&self, location: &str) -> Result<Fetched, FetchError> {
        if location.starts_with("http://") || location.starts_with("https://") {
            self.http.fetch(location).await
        } else {
            self.files.fetch(location).await
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rooted_paths_resolve_under_data_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("data")).unwrap();
        std::fs::write(dir.path().join("data").join("survey.csv"), "a,b\n1,2\n").unwrap();

        let fetcher = SourceFetcher::new(dir.path());
        let fetched = fetcher.fetch("/data/survey.csv").await.unwrap();
        assert_eq!(fetched.body, "a,b\n1,2\n");
        assert!(fetched.last_modified.is_some());
    }

    #[tokio::test]
    async fn absolute_paths_outside_root_are_read_directly() {
        let root = tempfile::tempdir().unwrap();
        let elsewhere = tempfile::tempdir().unwrap();
        let file = elsewhere.path().join("survey.csv");
        std::fs::write(&file, "x\n1\n").unwrap();

        let fetcher = FileFetcher::new(root.path());
        let fetched = fetcher.fetch(file.to_str().unwrap()).await.unwrap();
        assert_eq!(fetched.body, "x\n1\n");
    }

    #[tokio::test]
    async fn non_utf8_bytes_are_replaced_with_a_warning() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("survey.csv"), b"location\nVile Parle Caf\xe9\n").unwrap();

        let fetcher = FileFetcher::new(root.path());
        let fetched = fetcher.fetch("/survey.csv").await.unwrap();
        assert_eq!(fetched.body, "location\nVile Parle Caf\u{FFFD}\n");
        assert_eq!(fetched.warnings.len(), 1);
        assert!(fetched.warnings[0].contains("not valid UTF-8"));
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let root = tempfile::tempdir().unwrap();
        let fetcher = FileFetcher::new(root.path());
        let err = fetcher.fetch("/data/missing.csv").await.unwrap_err();
        assert!(matches!(err, FetchError::Io(_)));
    }
}
