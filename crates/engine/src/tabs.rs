//! Browser-side boundary the engine acts through.
//!
//! Tabs and frames are live objects owned by the embedder; the engine only
//! ever holds handles and re-resolves them at each use. Everything here can
//! disappear between two awaits.

use std::sync::Arc;

use actor_core_types::{ActionResult, Point, TabHandle, WindowHandle};
use async_trait::async_trait;
use url::{Origin, Url};

use crate::tools::ToolInvocation;
use actor_tool_requests::HistoryDirection;

/// Resolves tab handles to live tabs. The sole way the engine reaches the
/// browser's tab set.
#[async_trait]
pub trait TabProvider: Send + Sync {
    fn resolve(&self, handle: TabHandle) -> Option<Arc<dyn TabInterface>>;

    /// Opens a tab in `window`. `None` when the window is gone.
    async fn create_tab(
        &self,
        window: WindowHandle,
        foreground: bool,
    ) -> Option<Arc<dyn TabInterface>>;
}

/// One live tab.
#[async_trait]
pub trait TabInterface: Send + Sync {
    fn handle(&self) -> TabHandle;

    fn committed_url(&self) -> Url;

    fn committed_origin(&self) -> Origin {
        self.committed_url().origin()
    }

    /// Local-root frame whose widget is rendered at `point`.
    fn frame_at_point(&self, point: Point) -> Option<Arc<dyn FrameInterface>>;

    /// Frame currently hosting the document with this identifier.
    fn frame_by_document_identifier(
        &self,
        document_identifier: &str,
    ) -> Option<Arc<dyn FrameInterface>>;

    /// Takes an actuation-mode hold on the tab. The hold keeps the tab
    /// visible and rendering; dropping the lease releases it.
    fn begin_actuation(&self) -> ActuationLease;

    async fn navigate(&self, url: &Url) -> ActionResult;

    async fn traverse_history(&self, direction: HistoryDirection) -> ActionResult;

    async fn activate(&self) -> ActionResult;

    async fn close(&self) -> ActionResult;
}

/// One live local-root frame inside a tab. The renderer boundary: invoking
/// a tool crosses into the page's process.
#[async_trait]
pub trait FrameInterface: Send + Sync {
    fn document_identifier(&self) -> String;

    fn last_committed_url(&self) -> Option<Url>;

    /// False once the document was swapped out or torn down.
    fn is_live(&self) -> bool;

    async fn invoke_tool(&self, invocation: ToolInvocation) -> ActionResult;
}

/// Scoped actuation-mode hold. Released exactly once, on drop.
pub struct ActuationLease {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl ActuationLease {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    pub fn noop() -> Self {
        Self { release: None }
    }
}

impl Drop for ActuationLease {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for ActuationLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActuationLease")
            .field("held", &self.release.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn lease_releases_once_on_drop() {
        let released = Arc::new(AtomicUsize::new(0));
        let lease = ActuationLease::new({
            let released = Arc::clone(&released);
            move || {
                released.fetch_add(1, Ordering::SeqCst);
            }
        });
        assert_eq!(released.load(Ordering::SeqCst), 0);
        drop(lease);
        assert_eq!(released.load(Ordering::SeqCst), 1);
        drop(ActuationLease::noop());
    }
}
