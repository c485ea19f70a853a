//! Page observation boundary.
//!
//! Observations are produced by an external fetcher; the engine only caches
//! the annotated content for time-of-use validation. A fetch that comes back
//! without a requested part is a failure, never a partial success.

use std::sync::Arc;

use actor_page_content::AnnotatedPageContent;
use async_trait::async_trait;
use thiserror::Error;

use crate::tabs::TabInterface;

#[derive(Debug, Error)]
pub enum ObservationError {
    #[error("failed fetching page context: {0}")]
    Fetch(String),
    #[error("observation missing annotated page content")]
    MissingAnnotatedContent,
    #[error("observation missing screenshot")]
    MissingScreenshot,
    #[error("task has no observable tab")]
    NoObservableTab,
    #[error("task not found")]
    TaskNotFound,
}

#[derive(Clone, Copy, Debug)]
pub struct FetchPageContextOptions {
    pub include_annotated_page_content: bool,
    pub include_viewport_screenshot: bool,
}

impl Default for FetchPageContextOptions {
    fn default() -> Self {
        Self {
            include_annotated_page_content: true,
            include_viewport_screenshot: true,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct PageContext {
    pub annotated_page_content: Option<AnnotatedPageContent>,
    pub screenshot_jpeg: Option<Vec<u8>>,
}

#[async_trait]
pub trait PageContextFetcher: Send + Sync {
    async fn fetch_page_context(
        &self,
        tab: Arc<dyn TabInterface>,
        options: FetchPageContextOptions,
    ) -> Result<PageContext, ObservationError>;
}
