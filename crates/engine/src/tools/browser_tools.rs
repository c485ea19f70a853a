//! Tools handled entirely in the browser process.

use std::sync::Arc;
use std::time::Duration;

use actor_core_types::{ActionResult, ActionResultCode, TabHandle, WindowHandle};
use actor_page_content::AnnotatedPageContent;
use actor_tool_requests::HistoryDirection;
use async_trait::async_trait;
use url::Url;

use super::{Tool, ToolDelegate};
use crate::tabs::TabInterface;

fn resolve_or_went_away(
    delegate: &Arc<dyn ToolDelegate>,
    handle: TabHandle,
) -> Result<Arc<dyn TabInterface>, ActionResult> {
    delegate.tabs().resolve(handle).ok_or_else(|| {
        ActionResult::error_msg(ActionResultCode::TabWentAway, "The tab is no longer present.")
    })
}

pub struct NavigateTool {
    delegate: Arc<dyn ToolDelegate>,
    tab: TabHandle,
    url: Url,
}

impl NavigateTool {
    pub fn new(delegate: Arc<dyn ToolDelegate>, tab: TabHandle, url: Url) -> Self {
        Self { delegate, tab, url }
    }
}

#[async_trait]
impl Tool for NavigateTool {
    async fn validate(&self) -> ActionResult {
        if self.url.cannot_be_a_base() && self.url.scheme() != "about" {
            return ActionResult::error_msg(
                ActionResultCode::ArgumentsInvalid,
                "url cannot be navigated to",
            );
        }
        ActionResult::ok()
    }

    fn time_of_use_validation(
        &mut self,
        _last_observation: Option<&AnnotatedPageContent>,
    ) -> ActionResult {
        match resolve_or_went_away(&self.delegate, self.tab) {
            Ok(_) => ActionResult::ok(),
            Err(result) => result,
        }
    }

    async fn invoke(&mut self) -> ActionResult {
        let tab = match resolve_or_went_away(&self.delegate, self.tab) {
            Ok(tab) => tab,
            Err(result) => return result,
        };
        tab.navigate(&self.url).await
    }

    fn journal_url(&self) -> Option<Url> {
        Some(self.url.clone())
    }

    fn journal_event(&self) -> &'static str {
        "Navigate"
    }
}

pub struct HistoryTool {
    delegate: Arc<dyn ToolDelegate>,
    tab: TabHandle,
    direction: HistoryDirection,
}

impl HistoryTool {
    pub fn new(delegate: Arc<dyn ToolDelegate>, tab: TabHandle, direction: HistoryDirection) -> Self {
        Self {
            delegate,
            tab,
            direction,
        }
    }
}

#[async_trait]
impl Tool for HistoryTool {
    async fn validate(&self) -> ActionResult {
        ActionResult::ok()
    }

    fn time_of_use_validation(
        &mut self,
        _last_observation: Option<&AnnotatedPageContent>,
    ) -> ActionResult {
        match resolve_or_went_away(&self.delegate, self.tab) {
            Ok(_) => ActionResult::ok(),
            Err(result) => result,
        }
    }

    async fn invoke(&mut self) -> ActionResult {
        let tab = match resolve_or_went_away(&self.delegate, self.tab) {
            Ok(tab) => tab,
            Err(result) => return result,
        };
        tab.traverse_history(self.direction).await
    }

    fn journal_url(&self) -> Option<Url> {
        None
    }

    fn journal_event(&self) -> &'static str {
        "History"
    }
}

pub struct ActivateTabTool {
    delegate: Arc<dyn ToolDelegate>,
    tab: TabHandle,
}

impl ActivateTabTool {
    pub fn new(delegate: Arc<dyn ToolDelegate>, tab: TabHandle) -> Self {
        Self { delegate, tab }
    }
}

#[async_trait]
impl Tool for ActivateTabTool {
    async fn validate(&self) -> ActionResult {
        ActionResult::ok()
    }

    fn time_of_use_validation(
        &mut self,
        _last_observation: Option<&AnnotatedPageContent>,
    ) -> ActionResult {
        match resolve_or_went_away(&self.delegate, self.tab) {
            Ok(_) => ActionResult::ok(),
            Err(result) => result,
        }
    }

    async fn invoke(&mut self) -> ActionResult {
        let tab = match resolve_or_went_away(&self.delegate, self.tab) {
            Ok(tab) => tab,
            Err(result) => return result,
        };
        tab.activate().await
    }

    fn journal_url(&self) -> Option<Url> {
        None
    }

    fn journal_event(&self) -> &'static str {
        "ActivateTab"
    }
}

pub struct CloseTabTool {
    delegate: Arc<dyn ToolDelegate>,
    tab: TabHandle,
}

impl CloseTabTool {
    pub fn new(delegate: Arc<dyn ToolDelegate>, tab: TabHandle) -> Self {
        Self { delegate, tab }
    }
}

#[async_trait]
impl Tool for CloseTabTool {
    async fn validate(&self) -> ActionResult {
        ActionResult::ok()
    }

    fn time_of_use_validation(
        &mut self,
        _last_observation: Option<&AnnotatedPageContent>,
    ) -> ActionResult {
        match resolve_or_went_away(&self.delegate, self.tab) {
            Ok(_) => ActionResult::ok(),
            Err(result) => result,
        }
    }

    async fn invoke(&mut self) -> ActionResult {
        let tab = match resolve_or_went_away(&self.delegate, self.tab) {
            Ok(tab) => tab,
            Err(result) => return result,
        };
        tab.close().await
    }

    fn journal_url(&self) -> Option<Url> {
        None
    }

    fn journal_event(&self) -> &'static str {
        "CloseTab"
    }
}

pub struct CreateTabTool {
    delegate: Arc<dyn ToolDelegate>,
    window: WindowHandle,
    foreground: bool,
}

impl CreateTabTool {
    pub fn new(delegate: Arc<dyn ToolDelegate>, window: WindowHandle, foreground: bool) -> Self {
        Self {
            delegate,
            window,
            foreground,
        }
    }
}

#[async_trait]
impl Tool for CreateTabTool {
    async fn validate(&self) -> ActionResult {
        ActionResult::ok()
    }

    fn time_of_use_validation(
        &mut self,
        _last_observation: Option<&AnnotatedPageContent>,
    ) -> ActionResult {
        // Window-scoped; no tab to re-validate.
        ActionResult::ok()
    }

    async fn invoke(&mut self) -> ActionResult {
        match self
            .delegate
            .tabs()
            .create_tab(self.window, self.foreground)
            .await
        {
            Some(_) => ActionResult::ok(),
            None => ActionResult::error_msg(
                ActionResultCode::TabWentAway,
                "The window is no longer present.",
            ),
        }
    }

    fn journal_url(&self) -> Option<Url> {
        None
    }

    fn journal_event(&self) -> &'static str {
        "CreateTab"
    }
}

pub struct WaitTool {
    tab: TabHandle,
    duration_ms: u64,
}

impl WaitTool {
    pub fn new(tab: TabHandle, duration_ms: u64) -> Self {
        Self { tab, duration_ms }
    }
}

#[async_trait]
impl Tool for WaitTool {
    async fn validate(&self) -> ActionResult {
        ActionResult::ok()
    }

    fn time_of_use_validation(
        &mut self,
        _last_observation: Option<&AnnotatedPageContent>,
    ) -> ActionResult {
        // Waiting needs no live target; the tab is only advisory context.
        let _ = self.tab;
        ActionResult::ok()
    }

    async fn invoke(&mut self) -> ActionResult {
        tokio::time::sleep(Duration::from_millis(self.duration_ms)).await;
        ActionResult::ok()
    }

    fn journal_url(&self) -> Option<Url> {
        None
    }

    fn journal_event(&self) -> &'static str {
        "Wait"
    }
}
