//! Tool for actions executed inside a page by the renderer.

use std::sync::Arc;

use actor_core_types::{
    ActionResult, ActionResultCode, JournalTrack, PageTarget, TabHandle, TaskId,
};
use actor_page_content::{
    find_node_at_point, find_node_with_id, AnnotatedPageContent, TargetNodeInfo,
};
use actor_tool_requests::{ToolAction, ToolRequest};
use async_trait::async_trait;
use url::Url;

use super::{ObservedTarget, Tool, ToolDelegate, ToolInvocation};
use crate::tabs::{FrameInterface, TabInterface};

/// One page-scoped tool use. Carries everything cloned out of the request;
/// the live frame is pinned during time-of-use validation and re-checked at
/// invoke.
pub struct PageTool {
    task_id: TaskId,
    delegate: Arc<dyn ToolDelegate>,
    tab: TabHandle,
    target: PageTarget,
    action: ToolAction,
    journal_event: &'static str,
    observed_target_node: Option<TargetNodeInfo>,
    resolved_frame: Option<Arc<dyn FrameInterface>>,
}

impl PageTool {
    pub fn new(
        task_id: TaskId,
        delegate: Arc<dyn ToolDelegate>,
        request: &ToolRequest,
    ) -> Result<Self, ActionResult> {
        let Some(action) = request.to_tool_action() else {
            return Err(ActionResult::error_msg(
                ActionResultCode::ArgumentsInvalid,
                "request is not a page action",
            ));
        };
        let Some(target) = request.page_target() else {
            return Err(ActionResult::error_msg(
                ActionResultCode::ArgumentsInvalid,
                "page action has no target",
            ));
        };
        Ok(Self {
            task_id,
            delegate,
            tab: request.tab_handle(),
            target: target.clone(),
            action,
            journal_event: request.journal_event(),
            observed_target_node: None,
            resolved_frame: None,
        })
    }

    fn find_target_local_root_frame(
        &self,
        tab: &dyn TabInterface,
    ) -> Option<Arc<dyn FrameInterface>> {
        match &self.target {
            PageTarget::Coordinate(point) => tab.frame_at_point(*point),
            PageTarget::DomNode {
                document_identifier,
                ..
            } => tab.frame_by_document_identifier(document_identifier),
        }
    }

    fn find_last_observed_node(
        &self,
        last_observation: Option<&AnnotatedPageContent>,
    ) -> Option<TargetNodeInfo> {
        let content = last_observation?;
        match &self.target {
            PageTarget::Coordinate(point) => find_node_at_point(content, *point),
            PageTarget::DomNode {
                node_id,
                document_identifier,
            } => find_node_with_id(content, document_identifier, *node_id),
        }
    }
}

#[async_trait]
impl Tool for PageTool {
    async fn validate(&self) -> ActionResult {
        // Parameters were checked at request construction; nothing further
        // on the browser side yet.
        ActionResult::ok()
    }

    fn time_of_use_validation(
        &mut self,
        last_observation: Option<&AnnotatedPageContent>,
    ) -> ActionResult {
        let Some(tab) = self.delegate.tabs().resolve(self.tab) else {
            return ActionResult::error(ActionResultCode::TabWentAway);
        };

        self.delegate.journal().log(
            Some(&tab.committed_url()),
            self.task_id,
            JournalTrack::Actor,
            "TimeOfUseValidation",
            format!("TabHandle:{}", self.tab),
        );

        let Some(frame) = self.find_target_local_root_frame(tab.as_ref()) else {
            return ActionResult::error(ActionResultCode::FrameWentAway);
        };

        let observed = self.find_last_observed_node(last_observation);
        if observed.is_none() && last_observation.is_some() {
            self.delegate.journal().log(
                Some(&tab.committed_url()),
                self.task_id,
                JournalTrack::Actor,
                "TimeOfUseValidation",
                "No observed target found in last observation.",
            );
        }

        if last_observation.is_some() {
            match &self.target {
                PageTarget::Coordinate(_) => {
                    // The frame now under the point must be the one hosting
                    // the node that was observed there.
                    let matches_observation = observed.as_ref().is_some_and(|node| {
                        node.document_identifier == frame.document_identifier()
                    });
                    if !matches_observation {
                        return ActionResult::error(
                            ActionResultCode::FrameLocationChangedSinceObservation,
                        );
                    }
                }
                PageTarget::DomNode { .. } => {
                    if observed.is_none() {
                        return ActionResult::error(
                            ActionResultCode::ObservedTargetElementChanged,
                        );
                    }
                }
            }
        }

        self.observed_target_node = observed;
        self.resolved_frame = Some(frame);
        ActionResult::ok()
    }

    async fn invoke(&mut self) -> ActionResult {
        let frame = self
            .resolved_frame
            .as_ref()
            .expect("page tool invoked before time-of-use validation");

        // A frame swapped out by a navigation between validation and invoke
        // counts as success: the action's consequences will show up in the
        // next observation.
        if !frame.is_live() {
            return ActionResult::ok();
        }

        let invocation = ToolInvocation {
            task_id: self.task_id,
            action: self.action.clone(),
            target: self.target.clone(),
            observed_target: self.observed_target_node.as_ref().map(|node| ObservedTarget {
                dom_node_id: node.dom_node_id,
                geometry: node.geometry,
            }),
        };
        frame.invoke_tool(invocation).await
    }

    fn journal_url(&self) -> Option<Url> {
        match &self.resolved_frame {
            Some(frame) => frame.last_committed_url(),
            None => None,
        }
    }

    fn journal_event(&self) -> &'static str {
        self.journal_event
    }
}
