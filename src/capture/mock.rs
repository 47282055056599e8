use crate::capture::{CaptureError, EncodedFrame, FrameSource};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Frame source that fails on the scripted capture attempts and otherwise
/// returns a tiny placeholder JPEG header.
#[derive(Debug)]
pub struct MockFrameSource {
    ready: bool,
    failures: Mutex<VecDeque<bool>>,
}

impl MockFrameSource {
    pub fn ready() -> Self {
        Self {
            ready: true,
            failures: Mutex::new(VecDeque::new()),
        }
    }

    pub fn detached() -> Self {
        Self {
            ready: false,
            failures: Mutex::new(VecDeque::new()),
        }
    }

    /// `script[n]` decides whether capture attempt `n` fails.
    pub fn with_failures(script: Vec<bool>) -> Self {
        Self {
            ready: true,
            failures: Mutex::new(script.into()),
        }
    }
}

impl FrameSource for MockFrameSource {
    fn is_ready(&self) -> bool {
        self.ready
    }

    async fn capture(&self) -> Result<EncodedFrame, CaptureError> {
        if !self.ready {
            return Err(CaptureError::Unavailable("mock source detached".to_string()));
        }
        let fail = self
            .failures
            .lock()
            .ok()
            .and_then(|mut guard| guard.pop_front())
            .unwrap_or(false);
        if fail {
            return Err(CaptureError::Unavailable("mock capture failed".to_string()));
        }
        Ok(EncodedFrame::jpeg(vec![0xff, 0xd8, 0xff]))
    }
}
