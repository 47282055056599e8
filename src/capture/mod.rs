//! Frame acquisition.
//!
//! A [`FrameSource`] hands out one encoded still image per tick. The core never
//! decodes it; frames are forwarded to the detection service as-is.

use std::future::Future;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod mock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
}

impl EncodedFrame {
    pub fn jpeg(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            mime_type: "image/jpeg",
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaptureError {
    #[error("capture source unavailable: {0}")]
    Unavailable(String),
    #[error("captured frame is empty")]
    EmptyFrame,
}

pub trait FrameSource: Send + Sync + 'static {
    /// Whether a source is attached at all. Detection refuses to start otherwise.
    fn is_ready(&self) -> bool;

    fn capture(&self) -> impl Future<Output = Result<EncodedFrame, CaptureError>> + Send;
}

/// Re-reads a still image from disk on each capture, e.g. a file kept current
/// by an external camera grabber.
#[derive(Debug, Clone)]
pub struct FileFrameSource {
    path: Option<PathBuf>,
}

impl FileFrameSource {
    pub fn new(path: Option<&Path>) -> Self {
        Self {
            path: path.map(Path::to_path_buf),
        }
    }
}

impl FrameSource for FileFrameSource {
    fn is_ready(&self) -> bool {
        self.path.is_some()
    }

    async fn capture(&self) -> Result<EncodedFrame, CaptureError> {
        let path = self
            .path
            .as_ref()
            .ok_or_else(|| CaptureError::Unavailable("no frame path configured".to_string()))?;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|err| CaptureError::Unavailable(format!("{}: {err}", path.display())))?;
        if bytes.is_empty() {
            return Err(CaptureError::EmptyFrame);
        }
        Ok(EncodedFrame::jpeg(bytes))
    }
}
