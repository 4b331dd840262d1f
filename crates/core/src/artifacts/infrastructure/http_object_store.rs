use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use crate::artifacts::domain::object_store::ObjectStore;
use crate::shared::error::{PrivIdError, Result};

/// Progress callback: `(bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't provide Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send + Sync>;

/// Unsigned HTTPS reads from a bucket's public endpoint.
pub struct HttpObjectStore {
    client: reqwest::blocking::Client,
    endpoint: String,
    progress: Option<ProgressFn>,
}

impl HttpObjectStore {
    /// `endpoint` is a template with `{bucket}` and `{key}` placeholders.
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| PrivIdError::load_with("failed to build HTTP client", e))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            progress: None,
        })
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn url_for(&self, bucket: &str, key: &str) -> String {
        self.endpoint
            .replace("{bucket}", bucket)
            .replace("{key}", key.trim_start_matches('/'))
    }

    fn copy_body(
        &self,
        mut reader: impl Read,
        mut out: impl Write,
        url: &str,
        dest: &Path,
        total: u64,
    ) -> Result<()> {
        let read_err = |e: std::io::Error| {
            PrivIdError::load_with(format!("failed to read response body from {url}"), e)
        };
        let write_err = |e: std::io::Error| {
            PrivIdError::load_with(format!("failed to write {}", dest.display()), e)
        };

        let mut downloaded: u64 = 0;
        let mut buf = vec![0u8; 1024 * 1024];
        loop {
            let n = reader.read(&mut buf).map_err(read_err)?;
            if n == 0 {
                break;
            }
            out.write_all(&buf[..n]).map_err(write_err)?;
            downloaded += n as u64;
            if let Some(ref cb) = self.progress {
                cb(downloaded, total);
            }
        }
        out.flush().map_err(write_err)?;
        Ok(())
    }
}

impl ObjectStore for HttpObjectStore {
    fn fetch(&self, bucket: &str, key: &str, dest: &Path) -> Result<()> {
        let url = self.url_for(bucket, key);
        log::info!("Downloading s3://{bucket}/{key}");

        let response = self
            .client
            .get(&url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| PrivIdError::load_with(format!("download failed for {url}"), e))?;

        let total = response.content_length().unwrap_or(0);
        let file = fs::File::create(dest).map_err(|e| {
            PrivIdError::load_with(format!("failed to create {}", dest.display()), e)
        })?;
        self.copy_body(response, file, &url, dest, total)
    }
}
