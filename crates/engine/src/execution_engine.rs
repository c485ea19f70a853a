//! Sequential action execution for one task.
//!
//! One engine runs at most one action sequence at a time. Every action walks
//! the same phase pipeline (safety check, tool create/verify, UI pre-hook,
//! tool invoke, UI post-hook) and the first failure ends the sequence. All
//! phase suspensions resume through a generation check, so anything still in
//! flight when a sequence ends (including a cancellation from outside)
//! lands as a no-op instead of corrupting the next sequence.

use std::future::Future;
use std::sync::Arc;

use actor_core_types::{ActionResult, ActionResultCode, JournalTrack, TaskId};
use actor_journal::AggregatedJournal;
use actor_page_content::AnnotatedPageContent;
use actor_site_policy::SitePolicy;
use actor_tool_requests::ToolRequest;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use url::Url;

use crate::tabs::{TabInterface, TabProvider};
use crate::tools::ToolController;
use crate::ui::{FirstActInfo, UiEventDispatcher};

/// Callback ending one `act` call. Runs exactly once, after the sequence
/// completed or failed.
pub type ActCallback = Box<dyn FnOnce(ActionResult, Option<usize>) + Send + 'static>;

/// Pipeline phase the engine is in. `Init` only ever holds before the first
/// `act`; `Complete` doubles as "ready for the next sequence".
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EngineState {
    Init,
    StartAction,
    ToolCreateAndVerify,
    UiPreInvoke,
    ToolInvoke,
    UiPostInvoke,
    Complete,
}

impl EngineState {
    pub fn as_str(self) -> &'static str {
        match self {
            EngineState::Init => "INIT",
            EngineState::StartAction => "START_ACTION",
            EngineState::ToolCreateAndVerify => "CREATE_AND_VERIFY",
            EngineState::UiPreInvoke => "UI_PRE_INVOKE",
            EngineState::ToolInvoke => "TOOL_INVOKE",
            EngineState::UiPostInvoke => "UI_POST_INVOKE",
            EngineState::Complete => "COMPLETE",
        }
    }
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(debug_assertions)]
fn check_transition(from: EngineState, to: EngineState) {
    use EngineState::*;
    let legal: &[EngineState] = match from {
        Init => &[StartAction, Complete],
        StartAction => &[ToolCreateAndVerify, Complete],
        ToolCreateAndVerify => &[UiPreInvoke, Complete],
        UiPreInvoke => &[ToolInvoke, Complete],
        ToolInvoke => &[UiPostInvoke, Complete],
        UiPostInvoke => &[Complete, StartAction],
        Complete => &[StartAction],
    };
    debug_assert!(
        legal.contains(&to),
        "illegal engine state transition {from} -> {to}"
    );
}

#[cfg(not(debug_assertions))]
fn check_transition(_from: EngineState, _to: EngineState) {}

struct EngineInner {
    state: EngineState,
    /// Non-empty exactly while a sequence is in progress.
    sequence: Vec<ToolRequest>,
    /// Cursor pointing one past the action currently executing once the
    /// create-and-verify phase has been entered.
    next_action_index: usize,
    callback: Option<ActCallback>,
    /// Bumped whenever a sequence completes; continuations capture the value
    /// current at suspension and drop themselves on mismatch.
    generation: u64,
    cancel: CancellationToken,
    /// Out-of-band failure recorded while a tool invocation is outstanding.
    external_tool_failure_reason: Option<ActionResultCode>,
}

pub struct ExecutionEngine {
    task_id: OnceCell<TaskId>,
    journal: Arc<AggregatedJournal>,
    tabs: Arc<dyn TabProvider>,
    policy: Arc<dyn SitePolicy>,
    ui: Arc<dyn UiEventDispatcher>,
    controller: ToolController,
    inner: Mutex<EngineInner>,
    last_observed_page_content: Mutex<Option<Arc<AnnotatedPageContent>>>,
}

impl ExecutionEngine {
    pub fn new(
        journal: Arc<AggregatedJournal>,
        tabs: Arc<dyn TabProvider>,
        policy: Arc<dyn SitePolicy>,
        ui: Arc<dyn UiEventDispatcher>,
    ) -> Self {
        let controller = ToolController::new(Arc::clone(&tabs), Arc::clone(&journal));
        Self {
            task_id: OnceCell::new(),
            journal,
            tabs,
            policy,
            ui,
            controller,
            inner: Mutex::new(EngineInner {
                state: EngineState::Init,
                sequence: Vec::new(),
                next_action_index: 0,
                callback: None,
                generation: 0,
                cancel: CancellationToken::new(),
                external_tool_failure_reason: None,
            }),
            last_observed_page_content: Mutex::new(None),
        }
    }

    /// Binds the owning task's id. Called once, when the task is registered.
    pub fn bind_task(&self, task_id: TaskId) {
        self.task_id
            .set(task_id)
            .expect("engine already bound to a task");
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id.get().copied().unwrap_or(TaskId::NULL)
    }

    pub fn state(&self) -> EngineState {
        self.inner.lock().state
    }

    pub fn has_sequence_in_progress(&self) -> bool {
        !self.inner.lock().sequence.is_empty()
    }

    /// Starts executing `actions`. Rejects without any state change if a
    /// sequence is already in progress. The callback fires exactly once.
    pub fn act(self: &Arc<Self>, actions: Vec<ToolRequest>, callback: ActCallback) {
        assert!(!actions.is_empty(), "act requires at least one action");

        let (generation, first_act, cancel, first_info) = {
            let mut inner = self.inner.lock();
            if !inner.sequence.is_empty() {
                self.journal.log(
                    actions[0].url_for_journal().as_ref(),
                    self.task_id(),
                    JournalTrack::Actor,
                    "Act Failed",
                    "Unable to perform action: task already has action in progress",
                );
                drop(inner);
                // Delivered on a fresh turn, never re-entrantly.
                tokio::spawn(async move {
                    callback(
                        ActionResult::error_msg(
                            ActionResultCode::Error,
                            "task already has action in progress",
                        ),
                        None,
                    );
                });
                return;
            }

            let first_tab = actions
                .iter()
                .find(|action| action.is_tab_scoped())
                .map(|action| action.tab_handle());
            let first_info = FirstActInfo {
                task_id: self.task_id(),
                tab: first_tab,
            };

            inner.callback = Some(callback);
            inner.next_action_index = 0;
            inner.sequence = actions;
            inner.external_tool_failure_reason = None;
            inner.cancel = CancellationToken::new();
            (
                inner.generation,
                inner.state == EngineState::Init,
                inner.cancel.clone(),
                first_info,
            )
        };

        let engine = Arc::clone(self);
        tokio::spawn(async move {
            engine
                .run_sequence(generation, first_act, cancel, first_info)
                .await;
        });
    }

    /// Ends any in-progress sequence with `reason`. Continuations still in
    /// flight become no-ops; the sequence callback fires with `reason`.
    pub fn cancel_ongoing_actions(&self, reason: ActionResultCode) {
        let generation = {
            let inner = self.inner.lock();
            if inner.sequence.is_empty() {
                return;
            }
            inner.generation
        };
        self.complete_actions(generation, ActionResult::error(reason), None);
    }

    /// Records an out-of-band failure for the tool currently being invoked.
    /// No-op outside the invoke phase. Checked when the invocation returns;
    /// the recorded reason wins even over a successful tool result, since a
    /// cancellation racing the tool's completion must not surface success.
    pub fn fail_current_tool(&self, reason: ActionResultCode) {
        assert_ne!(reason, ActionResultCode::Ok);
        let mut inner = self.inner.lock();
        if inner.state != EngineState::ToolInvoke {
            return;
        }
        inner.external_tool_failure_reason = Some(reason);
    }

    /// Replaces the cached observation used for time-of-use validation.
    /// Deliberately not cleared when a sequence completes: a snapshot taken
    /// for one sequence currently validates the next as well.
    pub fn did_observe_context(&self, content: AnnotatedPageContent) {
        *self.last_observed_page_content.lock() = Some(Arc::new(content));
    }

    pub fn last_observed_page_content(&self) -> Option<Arc<AnnotatedPageContent>> {
        self.last_observed_page_content.lock().clone()
    }

    async fn run_sequence(
        self: Arc<Self>,
        generation: u64,
        first_act: bool,
        cancel: CancellationToken,
        first_info: FirstActInfo,
    ) {
        if first_act {
            // First act ever on this engine: let the UI settle in before
            // anything runs.
            let ui = Arc::clone(&self.ui);
            let Some(result) = self
                .suspend(generation, &cancel, ui.on_pre_first_act(first_info))
                .await
            else {
                return;
            };
            if !result.is_ok() {
                self.complete_actions(generation, result, None);
                return;
            }
        }

        loop {
            let Some(request) = self.enter_start_action(generation) else {
                return;
            };

            if request.is_tab_scoped() {
                if !self
                    .safety_checks_for_next_action(generation, &cancel, &request)
                    .await
                {
                    return;
                }
            }

            let Some(index) = self.enter_tool_create_and_verify(generation) else {
                return;
            };

            let last_observation = self.last_observed_page_content();
            let Some(created) = self
                .suspend(
                    generation,
                    &cancel,
                    self.controller.create_tool_and_validate(
                        self.task_id(),
                        &request,
                        last_observation.as_deref(),
                    ),
                )
                .await
            else {
                return;
            };
            let mut tool = match created {
                Ok(tool) => tool,
                Err(result) => {
                    self.complete_actions(generation, result, Some(index));
                    return;
                }
            };

            if !self.advance_state(generation, EngineState::UiPreInvoke) {
                return;
            }
            let ui = Arc::clone(&self.ui);
            let Some(result) = self
                .suspend(generation, &cancel, ui.on_pre_tool(&request))
                .await
            else {
                return;
            };
            if !result.is_ok() {
                self.complete_actions(generation, result, Some(index));
                return;
            }

            if !self.advance_state(generation, EngineState::ToolInvoke) {
                return;
            }
            let Some(result) = self.suspend(generation, &cancel, tool.invoke()).await else {
                return;
            };
            if let Some(reason) = self.take_external_failure(generation) {
                self.complete_actions(generation, ActionResult::error(reason), Some(index));
                return;
            }
            if !result.is_ok() {
                self.complete_actions(generation, result, Some(index));
                return;
            }

            if !self.advance_state(generation, EngineState::UiPostInvoke) {
                return;
            }
            let ui = Arc::clone(&self.ui);
            let Some(result) = self
                .suspend(generation, &cancel, ui.on_post_tool(&request))
                .await
            else {
                return;
            };
            if !result.is_ok() {
                self.complete_actions(generation, result, Some(index));
                return;
            }

            let remaining = {
                let inner = self.inner.lock();
                if inner.generation != generation {
                    return;
                }
                inner.next_action_index < inner.sequence.len()
            };
            if !remaining {
                self.complete_actions(generation, ActionResult::ok(), None);
                return;
            }
        }
    }

    /// Tab safety checks for the action about to start. Returns false when
    /// the sequence ended (failure or staleness) and the caller must bail.
    async fn safety_checks_for_next_action(
        &self,
        generation: u64,
        cancel: &CancellationToken,
        request: &ToolRequest,
    ) -> bool {
        let failing_index = {
            let inner = self.inner.lock();
            if inner.generation != generation {
                return false;
            }
            inner.next_action_index
        };

        let Some(tab) = self.tabs.resolve(request.tab_handle()) else {
            self.journal.log(
                None,
                self.task_id(),
                JournalTrack::Actor,
                "Act Failed",
                "The tab is no longer present",
            );
            self.complete_actions(
                generation,
                ActionResult::error_msg(
                    ActionResultCode::TabWentAway,
                    "The tab is no longer present.",
                ),
                Some(failing_index),
            );
            return false;
        };

        let evaluated_origin = tab.committed_origin();
        let evaluated_url = tab.committed_url();
        drop(tab);

        let Some(decision) = self
            .suspend(generation, cancel, self.policy.may_act_on_url(&evaluated_url))
            .await
        else {
            return false;
        };

        // The answer may be stale: the tab can be gone, or a cross-origin
        // navigation may have landed while the oracle was thinking.
        let Some(tab) = self.tabs.resolve(request.tab_handle()) else {
            self.journal.log(
                None,
                self.task_id(),
                JournalTrack::Actor,
                "Act Failed",
                "The tab is no longer present",
            );
            self.complete_actions(
                generation,
                ActionResult::error_msg(
                    ActionResultCode::TabWentAway,
                    "The tab is no longer present.",
                ),
                Some(failing_index),
            );
            return false;
        };

        if tab.committed_origin() != evaluated_origin {
            self.journal.log(
                request.url_for_journal().as_ref(),
                self.task_id(),
                JournalTrack::Actor,
                "Act Failed",
                "Acting after cross-origin navigation occurred",
            );
            self.complete_actions(
                generation,
                ActionResult::error_msg(
                    ActionResultCode::CrossOriginNavigation,
                    "Acting after cross-origin navigation occurred",
                ),
                Some(failing_index),
            );
            return false;
        }

        if !decision.is_allowed() {
            self.journal.log(
                Some(&evaluated_url),
                self.task_id(),
                JournalTrack::Actor,
                "Act Failed",
                "URL blocked for actions",
            );
            self.complete_actions(
                generation,
                ActionResult::error_msg(ActionResultCode::UrlBlocked, "URL blocked for actions"),
                Some(failing_index),
            );
            return false;
        }

        true
    }

    /// Awaits `future`, resuming only if the sequence is still current.
    /// Returns `None` when the sequence was cancelled or completed while the
    /// future was outstanding; the continuation must then do nothing.
    async fn suspend<F>(
        &self,
        generation: u64,
        cancel: &CancellationToken,
        future: F,
    ) -> Option<F::Output>
    where
        F: Future,
    {
        tokio::select! {
            _ = cancel.cancelled() => None,
            output = future => {
                if self.inner.lock().generation != generation {
                    return None;
                }
                Some(output)
            }
        }
    }

    fn enter_start_action(&self, generation: u64) -> Option<ToolRequest> {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            return None;
        }
        self.set_state(&mut inner, EngineState::StartAction);
        let request = inner
            .sequence
            .get(inner.next_action_index)
            .expect("start action past end of sequence")
            .clone();
        Some(request)
    }

    fn enter_tool_create_and_verify(&self, generation: u64) -> Option<usize> {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            return None;
        }
        // The cursor always points one past the action being executed.
        inner.next_action_index += 1;
        self.set_state(&mut inner, EngineState::ToolCreateAndVerify);
        Some(inner.next_action_index - 1)
    }

    fn advance_state(&self, generation: u64, state: EngineState) -> bool {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            return false;
        }
        self.set_state(&mut inner, state);
        true
    }

    fn take_external_failure(&self, generation: u64) -> Option<ActionResultCode> {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            return None;
        }
        inner.external_tool_failure_reason.take()
    }

    /// The single funnel ending a sequence, success or failure. Idempotent
    /// per sequence: the generation bump makes any later call for the same
    /// sequence a no-op.
    fn complete_actions(&self, generation: u64, result: ActionResult, action_index: Option<usize>) {
        let callback = {
            let mut inner = self.inner.lock();
            if inner.generation != generation {
                return;
            }
            debug_assert!(
                !inner.sequence.is_empty(),
                "completing without a sequence in progress"
            );
            self.set_state(&mut inner, EngineState::Complete);

            if !result.is_ok() {
                let url: Option<Url> = action_index
                    .and_then(|index| inner.sequence.get(index))
                    .and_then(|action| action.url_for_journal());
                self.journal.log(
                    url.as_ref(),
                    self.task_id(),
                    JournalTrack::Actor,
                    "Act Failed",
                    result.to_debug_string(),
                );
            }

            inner.sequence.clear();
            inner.next_action_index = 0;
            inner.external_tool_failure_reason = None;
            inner.generation += 1;
            inner.cancel.cancel();
            inner.callback.take()
        };

        match callback {
            Some(callback) => callback(result, action_index),
            None => warn!(
                target: "actor_engine",
                task = self.task_id().value(),
                "sequence completed with no callback installed"
            ),
        }
    }

    fn set_state(&self, inner: &mut EngineInner, state: EngineState) {
        self.journal.log(
            None,
            self.task_id(),
            JournalTrack::Actor,
            "ExecutionEngine::StateChange",
            format!("State {} -> {}", inner.state, state),
        );
        check_transition(inner.state, state);
        inner.state = state;
    }
}

impl Drop for ExecutionEngine {
    fn drop(&mut self) {
        // Anything still suspended for this engine unparks and exits.
        self.inner.get_mut().cancel.cancel();
    }
}
