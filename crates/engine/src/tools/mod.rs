//! Tool layer: one tool per action, built fresh for each action of a
//! sequence and dropped when the sequence ends.

mod browser_tools;
mod page_tool;

use std::sync::Arc;

use actor_core_types::{ActionResult, ActionResultCode, PageTarget, Rect, TaskId};
use actor_journal::AggregatedJournal;
use actor_page_content::AnnotatedPageContent;
use actor_tool_requests::{ToolAction, ToolRequest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::tabs::TabProvider;
pub use browser_tools::{
    ActivateTabTool, CloseTabTool, CreateTabTool, HistoryTool, NavigateTool, WaitTool,
};
pub use page_tool::PageTool;

/// Target description from the last observation, forwarded to the renderer
/// so it can cross-check what it is about to act on.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservedTarget {
    pub dom_node_id: Option<i32>,
    pub geometry: Option<Rect>,
}

/// Payload crossing the renderer boundary for one page-tool invocation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub task_id: TaskId,
    pub action: ToolAction,
    pub target: PageTarget,
    pub observed_target: Option<ObservedTarget>,
}

/// Capability surface a tool execution draws on beyond its own request.
pub trait ToolDelegate: Send + Sync {
    fn journal(&self) -> &Arc<AggregatedJournal>;
    fn tabs(&self) -> &Arc<dyn TabProvider>;
}

struct EngineToolDelegate {
    tabs: Arc<dyn TabProvider>,
    journal: Arc<AggregatedJournal>,
}

impl ToolDelegate for EngineToolDelegate {
    fn journal(&self) -> &Arc<AggregatedJournal> {
        &self.journal
    }

    fn tabs(&self) -> &Arc<dyn TabProvider> {
        &self.tabs
    }
}

/// Contract every tool satisfies: browser-side validation, time-of-use
/// validation against the last observation, then the effect itself.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Kind-specific parameter validation.
    async fn validate(&self) -> ActionResult;

    /// Re-resolves the tool's target immediately before acting. Failing here
    /// aborts the action without side effects.
    fn time_of_use_validation(
        &mut self,
        last_observation: Option<&AnnotatedPageContent>,
    ) -> ActionResult;

    async fn invoke(&mut self) -> ActionResult;

    /// URL to attach to journal entries about this tool.
    fn journal_url(&self) -> Option<Url>;

    fn journal_event(&self) -> &'static str;
}

/// Builds and validates the tool for each action. The engine owns one
/// controller per task; the tool itself lives on the pipeline's stack for
/// the duration of the action.
pub struct ToolController {
    delegate: Arc<dyn ToolDelegate>,
}

impl ToolController {
    pub fn new(tabs: Arc<dyn TabProvider>, journal: Arc<AggregatedJournal>) -> Self {
        Self {
            delegate: Arc::new(EngineToolDelegate { tabs, journal }),
        }
    }

    /// Exhaustive request-to-tool mapping. Malformed parameters surface as
    /// `ArgumentsInvalid` rather than panicking later.
    pub fn create_tool(
        &self,
        task_id: TaskId,
        request: &ToolRequest,
    ) -> Result<Box<dyn Tool>, ActionResult> {
        let delegate = Arc::clone(&self.delegate);
        match request {
            ToolRequest::Click(_)
            | ToolRequest::Type(_)
            | ToolRequest::MoveMouse(_)
            | ToolRequest::DragAndRelease(_)
            | ToolRequest::Select(_) => {
                Ok(Box::new(PageTool::new(task_id, delegate, request)?))
            }
            ToolRequest::Scroll(r) => {
                if !r.distance.is_finite() || r.distance <= 0.0 {
                    return Err(ActionResult::error_msg(
                        ActionResultCode::ArgumentsInvalid,
                        "scroll distance must be positive",
                    ));
                }
                Ok(Box::new(PageTool::new(task_id, delegate, request)?))
            }
            ToolRequest::Navigate(r) => {
                Ok(Box::new(NavigateTool::new(delegate, r.tab, r.url.clone())))
            }
            ToolRequest::History(r) => {
                Ok(Box::new(HistoryTool::new(delegate, r.tab, r.direction)))
            }
            ToolRequest::Wait(r) => Ok(Box::new(WaitTool::new(r.tab, r.duration_ms))),
            ToolRequest::ActivateTab(r) => Ok(Box::new(ActivateTabTool::new(delegate, r.tab))),
            ToolRequest::CloseTab(r) => Ok(Box::new(CloseTabTool::new(delegate, r.tab))),
            ToolRequest::CreateTab(r) => {
                if r.window.is_null() {
                    return Err(ActionResult::error_msg(
                        ActionResultCode::ArgumentsInvalid,
                        "create_tab requires a window",
                    ));
                }
                Ok(Box::new(CreateTabTool::new(delegate, r.window, r.foreground)))
            }
        }
    }

    /// Create-and-verify phase of the pipeline: build the tool, run its
    /// validation, then the time-of-use check against `last_observation`.
    pub async fn create_tool_and_validate(
        &self,
        task_id: TaskId,
        request: &ToolRequest,
        last_observation: Option<&AnnotatedPageContent>,
    ) -> Result<Box<dyn Tool>, ActionResult> {
        let mut tool = self.create_tool(task_id, request)?;

        let result = tool.validate().await;
        if !result.is_ok() {
            return Err(result);
        }

        let result = tool.time_of_use_validation(last_observation);
        if !result.is_ok() {
            self.delegate.journal().log(
                tool.journal_url().as_ref(),
                task_id,
                actor_core_types::JournalTrack::Actor,
                tool.journal_event(),
                format!("time-of-use validation failed: {}", result.to_debug_string()),
            );
            return Err(result);
        }

        Ok(tool)
    }
}
