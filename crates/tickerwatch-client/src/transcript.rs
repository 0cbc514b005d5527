//! Earnings call summarizer view-model

use crate::api::Backend;
use std::sync::Arc;
use tracing::warn;

/// Shown when the backend fails or returns no summary
pub const SUMMARY_FALLBACK: &str = "Error generating summary.";

/// Form state for summarizing a pasted transcript
pub struct TranscriptForm {
    backend: Arc<dyn Backend>,
    summary: Option<String>,
    loading: bool,
}

impl TranscriptForm {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            summary: None,
            loading: false,
        }
    }

    /// Submit the transcript; always ends with something to show
    pub async fn submit(&mut self, ticker: &str, transcript: &str) -> &str {
        self.loading = true;
        self.summary = None;

        let summary = match self.backend.summarize_transcript(ticker, transcript).await {
            Ok(result) => result.summary.filter(|s| !s.is_empty()),
            Err(e) => {
                warn!("Summarizing transcript for {} failed: {}", ticker, e);
                None
            }
        };

        self.loading = false;
        self.summary
            .insert(summary.unwrap_or_else(|| SUMMARY_FALLBACK.to_string()))
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }
}
