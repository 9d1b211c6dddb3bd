//! Attachment uploads.
//!
//! An upload reports progress as percentages over an unbounded channel and
//! resolves exactly once with the public URL of the stored file. Dropping
//! the receivers stops listening but the write runs to completion.

use std::path::{Component, Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::error::UploadError;

const CHUNK_SIZE: usize = 64 * 1024;

/// Handles to an upload in flight.
pub struct UploadTask {
    /// Percent complete, 0 to 100. Closed when the upload ends.
    pub progress: mpsc::UnboundedReceiver<f64>,
    /// The public URL, or why the upload failed.
    pub result: oneshot::Receiver<Result<String, UploadError>>,
}

impl UploadTask {
    /// Wait for the outcome and ignore progress.
    pub async fn url(self) -> Result<String, UploadError> {
        resolve(self.result).await
    }
}

/// Wait for an upload's outcome. A sender dropped without an answer counts
/// as [`UploadError::Interrupted`].
pub async fn resolve(
    result: oneshot::Receiver<Result<String, UploadError>>,
) -> Result<String, UploadError> {
    result.await.unwrap_or(Err(UploadError::Interrupted))
}

pub trait FileStorage: Send + Sync {
    /// Start storing `bytes` at `destination`, a `/`-separated relative path.
    /// Must be called from within a tokio runtime.
    fn upload_file(&self, bytes: Vec<u8>, destination: &str) -> UploadTask;
}

/// Writes uploads below a root directory and hands out URLs under a public
/// base URL.
#[derive(Debug, Clone)]
pub struct LocalFileStorage {
    root: PathBuf,
    public_base_url: String,
    max_size: usize,
}

impl LocalFileStorage {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str, max_size: usize) -> Self {
        let root = root.into();
        info!(path = %root.display(), "file storage initialized");
        Self {
            root,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            max_size,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn store(
        &self,
        bytes: &[u8],
        destination: &str,
        progress: &mpsc::UnboundedSender<f64>,
    ) -> Result<String, UploadError> {
        if bytes.len() > self.max_size {
            return Err(UploadError::TooLarge {
                size: bytes.len(),
                max: self.max_size,
            });
        }

        let relative = relative_path(destination)?;
        let path = self.root.join(&relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&path).await?;
        let total = bytes.len();
        let mut written = 0;
        let _ = progress.send(0.0);
        for chunk in bytes.chunks(CHUNK_SIZE) {
            file.write_all(chunk).await?;
            written += chunk.len();
            let _ = progress.send(written as f64 / total as f64 * 100.0);
        }
        file.flush().await?;
        if total == 0 {
            let _ = progress.send(100.0);
        }

        let url_path: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        debug!(destination, size = total, "upload stored");
        Ok(format!("{}/{}", self.public_base_url, url_path.join("/")))
    }
}

impl FileStorage for LocalFileStorage {
    fn upload_file(&self, bytes: Vec<u8>, destination: &str) -> UploadTask {
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        let (result_tx, result_rx) = oneshot::channel();

        let storage = self.clone();
        let destination = destination.to_string();
        tokio::spawn(async move {
            let result = storage.store(&bytes, &destination, &progress_tx).await;
            if let Err(e) = &result {
                warn!(destination = %destination, error = %e, "upload failed");
            }
            let _ = result_tx.send(result);
        });

        UploadTask {
            progress: progress_rx,
            result: result_rx,
        }
    }
}

/// Turn `destination` into a relative path that cannot leave the storage root.
fn relative_path(destination: &str) -> Result<PathBuf, UploadError> {
    let mut relative = PathBuf::new();
    for component in Path::new(destination).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(UploadError::InvalidPath(destination.to_string()));
            }
        }
    }
    if relative.as_os_str().is_empty() {
        return Err(UploadError::InvalidPath(destination.to_string()));
    }
    Ok(relative)
}
