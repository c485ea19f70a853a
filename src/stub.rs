//! In-memory browser used by the demo binary and integration tests.
//!
//! Tabs are scripted objects: each holds one main frame, optional annotated
//! content for observations, and commits navigations by swapping the frame
//! out for a fresh document. A navigation gate can be installed to put the
//! site policy in front of committed navigations, the way the real
//! embedder's throttle does.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use actor_core_types::{ActionResult, ActionResultCode, Point, Rect, TabHandle, WindowHandle};
use actor_engine::{
    ActuationLease, ExecutionEngine, FetchPageContextOptions, FrameInterface, ObservationError,
    PageContext, PageContextFetcher, TabInterface, TabProvider, ToolInvocation,
};
use actor_page_content::AnnotatedPageContent;
use actor_site_policy::SitePolicy;
use actor_tool_requests::HistoryDirection;
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;
use url::Url;

const VIEWPORT: Rect = Rect {
    x: 0,
    y: 0,
    width: 1280,
    height: 800,
};

/// Policy check applied to navigations committed through stub tabs. A
/// blocked navigation is swallowed and the engine's in-flight tool is
/// marked failed instead, mirroring the embedder's navigation throttle.
pub struct NavigationGate {
    policy: Arc<dyn SitePolicy>,
    engine: Weak<ExecutionEngine>,
}

pub struct StubBrowser {
    tabs: DashMap<TabHandle, Arc<StubTab>>,
    next_handle: AtomicI32,
    next_document: AtomicUsize,
    navigation_gate: Mutex<Option<NavigationGate>>,
    weak_self: Weak<StubBrowser>,
}

impl StubBrowser {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            tabs: DashMap::new(),
            next_handle: AtomicI32::new(1),
            next_document: AtomicUsize::new(1),
            navigation_gate: Mutex::new(None),
            weak_self: weak.clone(),
        })
    }

    pub fn open_tab(self: &Arc<Self>, url: &str) -> Arc<StubTab> {
        let handle = TabHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
        let url = Url::parse(url).expect("invalid stub tab url");
        let frame = self.new_frame(&url);
        let tab = Arc::new(StubTab {
            handle,
            browser: Arc::downgrade(self),
            state: Mutex::new(TabState {
                url,
                frame,
                content: None,
                history: Vec::new(),
                closed: false,
            }),
            actuation: Arc::new(AtomicUsize::new(0)),
        });
        self.tabs.insert(handle, Arc::clone(&tab));
        tab
    }

    /// Routes committed navigations through `policy`, failing the engine's
    /// current tool when a navigation is denied.
    pub fn install_navigation_gate(
        &self,
        policy: Arc<dyn SitePolicy>,
        engine: &Arc<ExecutionEngine>,
    ) {
        *self.navigation_gate.lock() = Some(NavigationGate {
            policy,
            engine: Arc::downgrade(engine),
        });
    }

    pub fn tab(&self, handle: TabHandle) -> Option<Arc<StubTab>> {
        self.tabs.get(&handle).map(|entry| Arc::clone(&entry))
    }

    fn new_frame(&self, url: &Url) -> Arc<StubFrame> {
        let id = self.next_document.fetch_add(1, Ordering::SeqCst);
        Arc::new(StubFrame {
            document_identifier: format!("doc-{id}"),
            url: url.clone(),
            live: AtomicBool::new(true),
            invocations: Mutex::new(Vec::new()),
            invoke_delay: Mutex::new(None),
        })
    }

    async fn gate_allows(&self, url: &Url) -> bool {
        let (policy, engine) = {
            let gate = self.navigation_gate.lock();
            match &*gate {
                Some(gate) => (Arc::clone(&gate.policy), gate.engine.clone()),
                None => return true,
            }
        };
        if policy.may_act_on_url(url).await.is_allowed() {
            return true;
        }
        debug!(target: "stub_browser", %url, "navigation cancelled by policy");
        if let Some(engine) = engine.upgrade() {
            engine.fail_current_tool(ActionResultCode::TriggeredNavigationBlocked);
        }
        false
    }
}

struct TabState {
    url: Url,
    frame: Arc<StubFrame>,
    content: Option<AnnotatedPageContent>,
    history: Vec<Url>,
    closed: bool,
}

pub struct StubTab {
    handle: TabHandle,
    browser: Weak<StubBrowser>,
    state: Mutex<TabState>,
    actuation: Arc<AtomicUsize>,
}

impl StubTab {
    /// Scripts what the next observation of this tab reports.
    pub fn set_content(&self, content: AnnotatedPageContent) {
        self.state.lock().content = Some(content);
    }

    pub fn content(&self) -> Option<AnnotatedPageContent> {
        self.state.lock().content.clone()
    }

    pub fn main_frame(&self) -> Arc<StubFrame> {
        Arc::clone(&self.state.lock().frame)
    }

    pub fn actuation_depth(&self) -> usize {
        self.actuation.load(Ordering::SeqCst)
    }

    fn commit(&self, url: Url) {
        let browser = self.browser.upgrade();
        let mut state = self.state.lock();
        state.frame.live.store(false, Ordering::SeqCst);
        let previous = std::mem::replace(&mut state.url, url.clone());
        state.history.push(previous);
        if let Some(browser) = browser {
            state.frame = browser.new_frame(&url);
        }
    }
}

#[async_trait]
impl TabInterface for StubTab {
    fn handle(&self) -> TabHandle {
        self.handle
    }

    fn committed_url(&self) -> Url {
        self.state.lock().url.clone()
    }

    fn frame_at_point(&self, point: Point) -> Option<Arc<dyn FrameInterface>> {
        let state = self.state.lock();
        (state.frame.is_live() && VIEWPORT.contains(point))
            .then(|| Arc::clone(&state.frame) as Arc<dyn FrameInterface>)
    }

    fn frame_by_document_identifier(
        &self,
        document_identifier: &str,
    ) -> Option<Arc<dyn FrameInterface>> {
        let state = self.state.lock();
        (state.frame.is_live() && state.frame.document_identifier == document_identifier)
            .then(|| Arc::clone(&state.frame) as Arc<dyn FrameInterface>)
    }

    fn begin_actuation(&self) -> ActuationLease {
        self.actuation.fetch_add(1, Ordering::SeqCst);
        let counter = Arc::clone(&self.actuation);
        ActuationLease::new(move || {
            counter.fetch_sub(1, Ordering::SeqCst);
        })
    }

    async fn navigate(&self, url: &Url) -> ActionResult {
        if let Some(browser) = self.browser.upgrade() {
            if !browser.gate_allows(url).await {
                // The navigation never commits; the tool itself still
                // reports success and the recorded failure reason wins.
                return ActionResult::ok();
            }
        }
        self.commit(url.clone());
        ActionResult::ok()
    }

    async fn traverse_history(&self, direction: HistoryDirection) -> ActionResult {
        match direction {
            HistoryDirection::Back => {
                let previous = self.state.lock().history.pop();
                match previous {
                    Some(previous) => {
                        self.commit(previous);
                        // Going back leaves the forward entry behind; the
                        // stub keeps only the back stack.
                        self.state.lock().history.pop();
                        ActionResult::ok()
                    }
                    None => ActionResult::error_msg(
                        ActionResultCode::Error,
                        "no back history entry",
                    ),
                }
            }
            HistoryDirection::Forward => ActionResult::error_msg(
                ActionResultCode::Error,
                "no forward history entry",
            ),
        }
    }

    async fn activate(&self) -> ActionResult {
        ActionResult::ok()
    }

    async fn close(&self) -> ActionResult {
        self.state.lock().closed = true;
        if let Some(browser) = self.browser.upgrade() {
            browser.tabs.remove(&self.handle);
        }
        ActionResult::ok()
    }
}

#[async_trait]
impl TabProvider for StubBrowser {
    fn resolve(&self, handle: TabHandle) -> Option<Arc<dyn TabInterface>> {
        let tab = self.tabs.get(&handle)?;
        if tab.state.lock().closed {
            return None;
        }
        Some(Arc::clone(&*tab) as Arc<dyn TabInterface>)
    }

    async fn create_tab(
        &self,
        _window: WindowHandle,
        _foreground: bool,
    ) -> Option<Arc<dyn TabInterface>> {
        let handle = TabHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
        let url = Url::parse("about:blank").expect("static url");
        let frame = self.new_frame(&url);
        let tab = Arc::new(StubTab {
            handle,
            browser: self.weak_self.clone(),
            state: Mutex::new(TabState {
                url,
                frame,
                content: None,
                history: Vec::new(),
                closed: false,
            }),
            actuation: Arc::new(AtomicUsize::new(0)),
        });
        self.tabs.insert(handle, Arc::clone(&tab));
        Some(tab)
    }
}

pub struct StubFrame {
    document_identifier: String,
    url: Url,
    live: AtomicBool,
    invocations: Mutex<Vec<ToolInvocation>>,
    invoke_delay: Mutex<Option<Duration>>,
}

impl StubFrame {
    pub fn invocations(&self) -> Vec<ToolInvocation> {
        self.invocations.lock().clone()
    }

    pub fn invocation_count(&self) -> usize {
        self.invocations.lock().len()
    }

    /// Makes invocations take a while, for racing stops against them.
    pub fn set_invoke_delay(&self, delay: Duration) {
        *self.invoke_delay.lock() = Some(delay);
    }
}

#[async_trait]
impl FrameInterface for StubFrame {
    fn document_identifier(&self) -> String {
        self.document_identifier.clone()
    }

    fn last_committed_url(&self) -> Option<Url> {
        Some(self.url.clone())
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    async fn invoke_tool(&self, invocation: ToolInvocation) -> ActionResult {
        if !self.is_live() {
            return ActionResult::error_msg(
                ActionResultCode::FrameWentAway,
                "document was torn down",
            );
        }
        self.invocations.lock().push(invocation);
        let delay = *self.invoke_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        ActionResult::ok()
    }
}

/// Fetcher reading the scripted content off stub tabs.
pub struct StubContextFetcher {
    browser: Arc<StubBrowser>,
}

impl StubContextFetcher {
    pub fn new(browser: Arc<StubBrowser>) -> Arc<Self> {
        Arc::new(Self { browser })
    }
}

#[async_trait]
impl PageContextFetcher for StubContextFetcher {
    async fn fetch_page_context(
        &self,
        tab: Arc<dyn TabInterface>,
        options: FetchPageContextOptions,
    ) -> Result<PageContext, ObservationError> {
        let stub = self
            .browser
            .tab(tab.handle())
            .ok_or_else(|| ObservationError::Fetch("tab is not a stub tab".to_string()))?;
        let content = stub.content();
        if options.include_annotated_page_content && content.is_none() {
            return Err(ObservationError::Fetch(
                "tab has no scripted content".to_string(),
            ));
        }
        Ok(PageContext {
            annotated_page_content: content,
            // A JPEG header is enough of a screenshot for a stub.
            screenshot_jpeg: options
                .include_viewport_screenshot
                .then(|| vec![0xff, 0xd8, 0xff, 0xe0]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn navigation_commits_a_fresh_document() {
        let browser = StubBrowser::new();
        let tab = browser.open_tab("https://example.com/");
        let first_frame = tab.main_frame();
        assert!(first_frame.is_live());

        let next = Url::parse("https://example.com/next").unwrap();
        assert!(tab.navigate(&next).await.is_ok());

        assert!(!first_frame.is_live());
        let second_frame = tab.main_frame();
        assert!(second_frame.is_live());
        assert_ne!(
            first_frame.document_identifier(),
            second_frame.document_identifier()
        );
        assert_eq!(tab.committed_url(), next);
    }

    #[tokio::test]
    async fn history_walks_back_to_previous_commit() {
        let browser = StubBrowser::new();
        let tab = browser.open_tab("https://example.com/");
        let next = Url::parse("https://example.com/next").unwrap();
        assert!(tab.navigate(&next).await.is_ok());

        assert!(tab
            .traverse_history(HistoryDirection::Back)
            .await
            .is_ok());
        assert_eq!(tab.committed_url().as_str(), "https://example.com/");

        assert!(!tab
            .traverse_history(HistoryDirection::Back)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn closed_tabs_stop_resolving() {
        let browser = StubBrowser::new();
        let tab = browser.open_tab("https://example.com/");
        let handle = tab.handle();
        assert!(browser.resolve(handle).is_some());
        assert!(tab.close().await.is_ok());
        assert!(browser.resolve(handle).is_none());
    }
}
