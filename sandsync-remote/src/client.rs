//! HTTP client for the remote project store
//!
//! The REST surface is bearer-authenticated:
//! - `GET /file/{path}` -> `{content}`
//! - `PUT /file/{path}` body `{content}` -> write/overwrite
//! - `POST /file/{path}` body `{isFolder}` -> create
//! - `DELETE /file/{path}` -> delete
//! - `GET /files?recursive=1&withContent=1` -> bulk seed/pull

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::auth::TokenManager;
use crate::errors::{RemoteError, Result};

/// One entry from a bulk recursive pull
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteEntry {
    pub path: String,
    #[serde(rename = "isDir", default)]
    pub is_dir: bool,
    #[serde(default)]
    pub content: Option<String>,
}

/// Interface to the remote project store. Network and HTTP-level
/// failures propagate as errors, which the engine interprets as a
/// transition to offline.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch a file's content. `None` when the path does not exist.
    async fn get_file(&self, path: &str) -> Result<Option<String>>;

    /// Write or overwrite a file
    async fn put_file(&self, path: &str, content: &str) -> Result<()>;

    /// Delete a file or folder
    async fn delete_file(&self, path: &str) -> Result<()>;

    /// Create an empty file or a folder
    async fn create_path(&self, path: &str, is_folder: bool) -> Result<()>;

    /// Recursively pull every path with content
    async fn pull_all(&self) -> Result<Vec<RemoteEntry>>;
}

#[derive(Serialize, Deserialize)]
struct FileBody {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Serialize)]
struct CreateBody {
    #[serde(rename = "isFolder")]
    is_folder: bool,
}

/// reqwest-backed `RemoteStore`
pub struct HttpRemote {
    http: reqwest::Client,
    base_url: String,
    tokens: TokenManager,
}

impl HttpRemote {
    pub fn new(base_url: impl Into<String>, tokens: TokenManager) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
        }
    }

    fn file_url(&self, path: &str) -> String {
        format!(
            "{}/file/{}",
            self.base_url,
            urlencoding::encode(path.trim_start_matches('/'))
        )
    }

    async fn bearer(&self) -> Result<String> {
        self.tokens.bearer().await
    }
}

fn check_status(status: reqwest::StatusCode, path: &str) -> Result<()> {
    if status.is_success() {
        Ok(())
    } else {
        Err(RemoteError::Http {
            status: status.as_u16(),
            path: path.to_string(),
        })
    }
}

#[async_trait]
impl RemoteStore for HttpRemote {
    async fn get_file(&self, path: &str) -> Result<Option<String>> {
        let token = self.bearer().await?;
        let response = self
            .http
            .get(self.file_url(path))
            .bearer_auth(token)
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        check_status(response.status(), path)?;
        let body: FileBody = response.json().await?;
        Ok(Some(body.content.unwrap_or_default()))
    }

    async fn put_file(&self, path: &str, content: &str) -> Result<()> {
        let token = self.bearer().await?;
        let response = self
            .http
            .put(self.file_url(path))
            .bearer_auth(token)
            .json(&FileBody {
                content: Some(content.to_string()),
            })
            .send()
            .await?;
        check_status(response.status(), path)?;
        debug!("Pushed {} ({} bytes)", path, content.len());
        Ok(())
    }

    async fn delete_file(&self, path: &str) -> Result<()> {
        let token = self.bearer().await?;
        let response = self
            .http
            .delete(self.file_url(path))
            .bearer_auth(token)
            .send()
            .await?;
        check_status(response.status(), path)?;
        debug!("Deleted {}", path);
        Ok(())
    }

    async fn create_path(&self, path: &str, is_folder: bool) -> Result<()> {
        let token = self.bearer().await?;
        let response = self
            .http
            .post(self.file_url(path))
            .bearer_auth(token)
            .json(&CreateBody { is_folder })
            .send()
            .await?;
        check_status(response.status(), path)?;
        Ok(())
    }

    async fn pull_all(&self) -> Result<Vec<RemoteEntry>> {
        let token = self.bearer().await?;
        let url = format!("{}/files?recursive=1&withContent=1", self.base_url);
        let response = self.http.get(url).bearer_auth(token).send().await?;
        check_status(response.status(), "/files")?;
        let entries: Vec<RemoteEntry> = response.json().await?;
        debug!("Pulled {} remote entries", entries.len());
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticToken;
    use std::sync::Arc;

    fn remote(base: &str) -> HttpRemote {
        HttpRemote::new(
            base,
            TokenManager::new(Arc::new(StaticToken("t".to_string()))),
        )
    }

    #[test]
    fn test_file_url_encodes_path() {
        let r = remote("https://store.example/api/v2");
        assert_eq!(
            r.file_url("src/app routes/page.tsx"),
            "https://store.example/api/v2/file/src%2Fapp%20routes%2Fpage.tsx"
        );
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let r = remote("https://store.example/api/v2/");
        assert_eq!(r.file_url("a.txt"), "https://store.example/api/v2/file/a.txt");
    }

    #[test]
    fn test_remote_entry_wire_names() {
        let entry: RemoteEntry =
            serde_json::from_str(r#"{"path":"src","isDir":true}"#).unwrap();
        assert!(entry.is_dir);
        assert_eq!(entry.content, None);
    }
}
