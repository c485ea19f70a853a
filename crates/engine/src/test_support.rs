//! Hand-rolled fakes shared by the engine crate's tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use actor_core_types::{ActionResult, Point, TabHandle, WindowHandle};
use actor_site_policy::{PolicyDecision, SitePolicy};
use actor_tool_requests::{
    ClickCount, ClickRequest, ClickType, HistoryDirection, NavigateRequest, PageToolFields,
    ToolRequest, TypeMode, TypeRequest,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use url::Url;

use crate::observation::{
    FetchPageContextOptions, ObservationError, PageContext, PageContextFetcher,
};
use crate::tabs::{ActuationLease, FrameInterface, TabInterface, TabProvider};
use crate::tools::ToolInvocation;
use crate::ui::{
    ActorTaskAsyncChange, ActorTaskSyncChange, FirstActInfo, UiEventDispatcher,
};
use actor_core_types::PageTarget;

pub fn click_at(tab: TabHandle, x: i32, y: i32) -> ToolRequest {
    ToolRequest::Click(ClickRequest {
        page: PageToolFields {
            tab,
            target: PageTarget::Coordinate(Point::new(x, y)),
        },
        click_type: ClickType::Left,
        count: ClickCount::Single,
    })
}

pub fn type_text(tab: TabHandle, x: i32, y: i32, text: &str) -> ToolRequest {
    ToolRequest::Type(TypeRequest {
        page: PageToolFields {
            tab,
            target: PageTarget::Coordinate(Point::new(x, y)),
        },
        text: text.to_string(),
        follow_by_enter: false,
        mode: TypeMode::Replace,
    })
}

pub fn navigate_to(tab: TabHandle, url: &str) -> ToolRequest {
    ToolRequest::Navigate(NavigateRequest {
        tab,
        url: Url::parse(url).unwrap(),
    })
}

pub struct FakeFrame {
    document_identifier: String,
    viewport: actor_core_types::Rect,
    live: AtomicBool,
    url: Mutex<Url>,
    pub invocations: Mutex<Vec<ToolInvocation>>,
    pub invoke_result: Mutex<ActionResult>,
    hold: Mutex<Option<oneshot::Receiver<()>>>,
}

impl FakeFrame {
    pub fn new(document_identifier: &str, viewport: actor_core_types::Rect, url: &str) -> Arc<Self> {
        Arc::new(Self {
            document_identifier: document_identifier.to_string(),
            viewport,
            live: AtomicBool::new(true),
            url: Mutex::new(Url::parse(url).unwrap()),
            invocations: Mutex::new(Vec::new()),
            invoke_result: Mutex::new(ActionResult::ok()),
            hold: Mutex::new(None),
        })
    }

    /// Makes the next invocation park until the returned sender fires (or
    /// is dropped).
    pub fn hold_next_invocation(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.hold.lock() = Some(rx);
        tx
    }

    pub fn swap_out(&self) {
        self.live.store(false, Ordering::SeqCst);
    }

    pub fn invocation_count(&self) -> usize {
        self.invocations.lock().len()
    }
}

#[async_trait]
impl FrameInterface for FakeFrame {
    fn document_identifier(&self) -> String {
        self.document_identifier.clone()
    }

    fn last_committed_url(&self) -> Option<Url> {
        Some(self.url.lock().clone())
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    async fn invoke_tool(&self, invocation: ToolInvocation) -> ActionResult {
        self.invocations.lock().push(invocation);
        let hold = self.hold.lock().take();
        if let Some(hold) = hold {
            let _ = hold.await;
        }
        self.invoke_result.lock().clone()
    }
}

pub struct FakeTab {
    handle: TabHandle,
    url: Mutex<Url>,
    frames: Mutex<Vec<Arc<FakeFrame>>>,
    closed: AtomicBool,
    actuation: Arc<AtomicUsize>,
    pub navigations: Mutex<Vec<Url>>,
    pub history_traversals: Mutex<Vec<HistoryDirection>>,
    pub activations: AtomicUsize,
}

impl FakeTab {
    fn new(handle: TabHandle, url: Url) -> Arc<Self> {
        Arc::new(Self {
            handle,
            url: Mutex::new(url),
            frames: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            actuation: Arc::new(AtomicUsize::new(0)),
            navigations: Mutex::new(Vec::new()),
            history_traversals: Mutex::new(Vec::new()),
            activations: AtomicUsize::new(0),
        })
    }

    pub fn set_url(&self, url: &str) {
        *self.url.lock() = Url::parse(url).unwrap();
    }

    pub fn add_frame(&self, frame: Arc<FakeFrame>) {
        self.frames.lock().push(frame);
    }

    pub fn actuation_depth(&self) -> usize {
        self.actuation.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TabInterface for FakeTab {
    fn handle(&self) -> TabHandle {
        self.handle
    }

    fn committed_url(&self) -> Url {
        self.url.lock().clone()
    }

    fn frame_at_point(&self, point: Point) -> Option<Arc<dyn FrameInterface>> {
        self.frames
            .lock()
            .iter()
            .find(|frame| frame.is_live() && frame.viewport.contains(point))
            .map(|frame| Arc::clone(frame) as Arc<dyn FrameInterface>)
    }

    fn frame_by_document_identifier(
        &self,
        document_identifier: &str,
    ) -> Option<Arc<dyn FrameInterface>> {
        self.frames
            .lock()
            .iter()
            .find(|frame| frame.is_live() && frame.document_identifier == document_identifier)
            .map(|frame| Arc::clone(frame) as Arc<dyn FrameInterface>)
    }

    fn begin_actuation(&self) -> ActuationLease {
        self.actuation.fetch_add(1, Ordering::SeqCst);
        let counter = Arc::clone(&self.actuation);
        ActuationLease::new(move || {
            counter.fetch_sub(1, Ordering::SeqCst);
        })
    }

    async fn navigate(&self, url: &Url) -> ActionResult {
        self.navigations.lock().push(url.clone());
        *self.url.lock() = url.clone();
        ActionResult::ok()
    }

    async fn traverse_history(&self, direction: HistoryDirection) -> ActionResult {
        self.history_traversals.lock().push(direction);
        ActionResult::ok()
    }

    async fn activate(&self) -> ActionResult {
        self.activations.fetch_add(1, Ordering::SeqCst);
        ActionResult::ok()
    }

    async fn close(&self) -> ActionResult {
        self.closed.store(true, Ordering::SeqCst);
        ActionResult::ok()
    }
}

#[derive(Default)]
pub struct FakeTabProvider {
    tabs: Mutex<HashMap<TabHandle, Arc<FakeTab>>>,
    next_handle: AtomicI32,
}

impl FakeTabProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            tabs: Mutex::new(HashMap::new()),
            next_handle: AtomicI32::new(1),
        })
    }

    pub fn add_tab(self: &Arc<Self>, url: &str) -> (TabHandle, Arc<FakeTab>) {
        let handle = TabHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
        let tab = FakeTab::new(handle, Url::parse(url).unwrap());
        self.tabs.lock().insert(handle, Arc::clone(&tab));
        (handle, tab)
    }

    /// Tab with a single full-viewport frame, the common case.
    pub fn add_tab_with_frame(
        self: &Arc<Self>,
        url: &str,
        document_identifier: &str,
    ) -> (TabHandle, Arc<FakeTab>, Arc<FakeFrame>) {
        let (handle, tab) = self.add_tab(url);
        let frame = FakeFrame::new(
            document_identifier,
            actor_core_types::Rect::new(0, 0, 1280, 800),
            url,
        );
        tab.add_frame(Arc::clone(&frame));
        (handle, tab, frame)
    }

    pub fn close_tab(&self, handle: TabHandle) {
        self.tabs.lock().remove(&handle);
    }
}

#[async_trait]
impl TabProvider for FakeTabProvider {
    fn resolve(&self, handle: TabHandle) -> Option<Arc<dyn TabInterface>> {
        let tabs = self.tabs.lock();
        let tab = tabs.get(&handle)?;
        if tab.closed.load(Ordering::SeqCst) {
            return None;
        }
        Some(Arc::clone(tab) as Arc<dyn TabInterface>)
    }

    async fn create_tab(
        &self,
        _window: WindowHandle,
        _foreground: bool,
    ) -> Option<Arc<dyn TabInterface>> {
        let handle = TabHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
        let tab = FakeTab::new(handle, Url::parse("about:blank").unwrap());
        self.tabs.lock().insert(handle, Arc::clone(&tab));
        Some(tab)
    }
}

/// Policy with a fixed verdict.
pub struct StaticPolicy {
    decision: PolicyDecision,
}

impl StaticPolicy {
    pub fn allow() -> Arc<Self> {
        Arc::new(Self {
            decision: PolicyDecision::Allow,
        })
    }

    pub fn block() -> Arc<Self> {
        Arc::new(Self {
            decision: PolicyDecision::Block,
        })
    }
}

#[async_trait]
impl SitePolicy for StaticPolicy {
    async fn may_act_on_url(&self, _url: &Url) -> PolicyDecision {
        self.decision
    }
}

/// Policy that parks every query until released, for racing navigations
/// against an outstanding safety check.
pub struct GatedPolicy {
    decision: PolicyDecision,
    gate: tokio::sync::Semaphore,
}

impl GatedPolicy {
    pub fn allow() -> Arc<Self> {
        Arc::new(Self {
            decision: PolicyDecision::Allow,
            gate: tokio::sync::Semaphore::new(0),
        })
    }

    pub fn release_one(&self) {
        self.gate.add_permits(1);
    }
}

#[async_trait]
impl SitePolicy for GatedPolicy {
    async fn may_act_on_url(&self, _url: &Url) -> PolicyDecision {
        let permit = self.gate.acquire().await.expect("gate closed");
        permit.forget();
        self.decision
    }
}

/// Dispatcher recording every hook call; each hook can be primed to fail.
#[derive(Default)]
pub struct RecordingDispatcher {
    pub pre_first_act_calls: AtomicUsize,
    pub pre_tool_events: Mutex<Vec<&'static str>>,
    pub post_tool_events: Mutex<Vec<&'static str>>,
    pub async_changes: Mutex<Vec<ActorTaskAsyncChange>>,
    pub sync_changes: Mutex<Vec<ActorTaskSyncChange>>,
    pub fail_pre_first_act: Mutex<Option<ActionResult>>,
    pub fail_pre_tool: Mutex<Option<ActionResult>>,
    pub fail_post_tool: Mutex<Option<ActionResult>>,
}

impl RecordingDispatcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl UiEventDispatcher for RecordingDispatcher {
    async fn on_pre_first_act(&self, _info: FirstActInfo) -> ActionResult {
        self.pre_first_act_calls.fetch_add(1, Ordering::SeqCst);
        self.fail_pre_first_act
            .lock()
            .take()
            .unwrap_or_else(ActionResult::ok)
    }

    async fn on_pre_tool(&self, request: &ToolRequest) -> ActionResult {
        self.pre_tool_events.lock().push(request.journal_event());
        self.fail_pre_tool
            .lock()
            .take()
            .unwrap_or_else(ActionResult::ok)
    }

    async fn on_post_tool(&self, request: &ToolRequest) -> ActionResult {
        self.post_tool_events.lock().push(request.journal_event());
        self.fail_post_tool
            .lock()
            .take()
            .unwrap_or_else(ActionResult::ok)
    }

    async fn on_actor_task_async_change(&self, change: ActorTaskAsyncChange) -> ActionResult {
        self.async_changes.lock().push(change);
        ActionResult::ok()
    }

    fn on_actor_task_sync_change(&self, change: ActorTaskSyncChange) {
        self.sync_changes.lock().push(change);
    }
}

/// Fetcher returning a primed context, or an error.
pub struct FakeFetcher {
    pub context: Mutex<Result<PageContext, String>>,
}

impl FakeFetcher {
    pub fn with_context(context: PageContext) -> Arc<Self> {
        Arc::new(Self {
            context: Mutex::new(Ok(context)),
        })
    }
}

#[async_trait]
impl PageContextFetcher for FakeFetcher {
    async fn fetch_page_context(
        &self,
        _tab: Arc<dyn TabInterface>,
        _options: FetchPageContextOptions,
    ) -> Result<PageContext, ObservationError> {
        match &*self.context.lock() {
            Ok(context) => Ok(context.clone()),
            Err(message) => Err(ObservationError::Fetch(message.clone())),
        }
    }
}

/// Lets a test wait briefly for background work it cannot await directly.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}
