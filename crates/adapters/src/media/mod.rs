//! Media enrichment adapters

mod openrouter;

pub use openrouter::{DEFAULT_BASE_URL, DEFAULT_MODEL, OpenRouterDescriber};

use async_trait::async_trait;
use askfeed_domain::{MediaDescriber, MediaError};
use std::sync::Mutex;

/// Per-post media limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaLimits {
    pub max_images_per_post: usize,
    pub max_video_duration_secs: u64,
    pub max_video_size_bytes: u64,
}

impl Default for MediaLimits {
    fn default() -> Self {
        Self {
            max_images_per_post: 4,
            max_video_duration_secs: 90,
            max_video_size_bytes: 25 * 1024 * 1024,
        }
    }
}

impl MediaLimits {
    /// Reject videos past the duration or size limit
    pub fn check_video(&self, duration_secs: u64, size_bytes: u64) -> Result<(), MediaError> {
        if duration_secs > self.max_video_duration_secs {
            return Err(MediaError::ExceedsLimit(format!(
                "video duration {}s (max {}s)",
                duration_secs, self.max_video_duration_secs
            )));
        }
        if size_bytes > self.max_video_size_bytes {
            return Err(MediaError::ExceedsLimit(format!(
                "video size {} MB (max {} MB)",
                size_bytes / (1024 * 1024),
                self.max_video_size_bytes / (1024 * 1024)
            )));
        }
        Ok(())
    }
}

/// Stub describer for testing: echoes the URL of each image
#[derive(Default)]
pub struct StubMediaDescriber {
    limits: MediaLimits,
    fail: bool,
    requested: Mutex<Vec<String>>,
}

impl StubMediaDescriber {
    pub fn new(limits: MediaLimits) -> Self {
        Self {
            limits,
            ..Self::default()
        }
    }

    /// A describer whose image calls always fail
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Every image URL sent for description
    pub fn requested(&self) -> Vec<String> {
        match self.requested.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl MediaDescriber for StubMediaDescriber {
    async fn describe_images(&self, urls: &[String]) -> Result<Vec<String>, MediaError> {
        let urls: Vec<String> = urls
            .iter()
            .take(self.limits.max_images_per_post)
            .cloned()
            .collect();

        if let Ok(mut requested) = self.requested.lock() {
            requested.extend(urls.iter().cloned());
        }

        if self.fail {
            return Err(MediaError::Api("stub failure".to_string()));
        }

        Ok(urls.iter().map(|u| format!("picture at {}", u)).collect())
    }

    async fn transcribe_video(
        &self,
        _url: &str,
        duration_secs: u64,
        size_bytes: u64,
    ) -> Result<String, MediaError> {
        self.limits.check_video(duration_secs, size_bytes)?;
        Err(MediaError::NotImplemented)
    }
}
