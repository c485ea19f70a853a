//! Task lifecycle.
//!
//! A task spans many action sequences. It gates when sequences may run
//! (paused and finished tasks reject them), tracks which tabs are being
//! acted on, and owns the engine that actually executes actions.

use std::collections::HashMap;
use std::sync::Arc;

use actor_core_types::{ActionResult, ActionResultCode, JournalTrack, TabHandle, TaskId};
use actor_journal::AggregatedJournal;
use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::execution_engine::{ActCallback, ExecutionEngine};
use crate::tabs::{ActuationLease, TabInterface, TabProvider};
use crate::ui::{ActorTaskAsyncChange, ActorTaskSyncChange, UiEventDispatcher};
use actor_tool_requests::ToolRequest;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TaskState {
    Created,
    Acting,
    Reflecting,
    PausedByClient,
    Finished,
}

impl TaskState {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Created => "Created",
            TaskState::Acting => "Acting",
            TaskState::Reflecting => "Reflecting",
            TaskState::PausedByClient => "PausedByClient",
            TaskState::Finished => "Finished",
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(debug_assertions)]
fn check_transition(from: TaskState, to: TaskState) {
    use TaskState::*;
    let legal: &[TaskState] = match from {
        Created => &[Acting, Reflecting, PausedByClient, Finished],
        Acting => &[Reflecting, PausedByClient, Finished],
        Reflecting => &[Acting, PausedByClient, Finished],
        PausedByClient => &[Reflecting, Finished],
        Finished => &[],
    };
    debug_assert!(
        legal.contains(&to),
        "illegal task state transition {from} -> {to}"
    );
}

#[cfg(not(debug_assertions))]
fn check_transition(_from: TaskState, _to: TaskState) {}

struct TaskInner {
    state: TaskState,
    end_time: Option<DateTime<Utc>>,
    acting_tabs: HashMap<TabHandle, ActuationLease>,
}

pub struct ActorTask {
    id: OnceCell<TaskId>,
    engine: Arc<ExecutionEngine>,
    ui: Arc<dyn UiEventDispatcher>,
    tabs: Arc<dyn TabProvider>,
    journal: Arc<AggregatedJournal>,
    inner: Mutex<TaskInner>,
}

impl ActorTask {
    pub fn new(
        engine: Arc<ExecutionEngine>,
        ui: Arc<dyn UiEventDispatcher>,
        tabs: Arc<dyn TabProvider>,
        journal: Arc<AggregatedJournal>,
    ) -> Self {
        Self {
            id: OnceCell::new(),
            engine,
            ui,
            tabs,
            journal,
            inner: Mutex::new(TaskInner {
                state: TaskState::Created,
                end_time: None,
                acting_tabs: HashMap::new(),
            }),
        }
    }

    /// Assigned once, by the keyed service, at registration.
    pub(crate) fn set_id(&self, id: TaskId) {
        self.id.set(id).expect("task id already assigned");
    }

    pub fn id(&self) -> TaskId {
        self.id.get().copied().unwrap_or(TaskId::NULL)
    }

    pub fn state(&self) -> TaskState {
        self.inner.lock().state
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().end_time
    }

    pub fn execution_engine(&self) -> &Arc<ExecutionEngine> {
        &self.engine
    }

    /// Runs an action sequence. Rejected outright when the task is paused or
    /// finished; otherwise the task enters `Acting` and hands the sequence
    /// to its engine. The engine's completion moves the task to `Reflecting`
    /// unless something else changed the state underneath; in that case the
    /// engine's result is withheld and a bare error reported instead, so a
    /// sequence racing a stop can never surface success.
    pub fn act(self: &Arc<Self>, actions: Vec<ToolRequest>, callback: ActCallback) {
        let rejection = {
            let mut inner = self.inner.lock();
            match inner.state {
                TaskState::PausedByClient => Some(ActionResult::error_msg(
                    ActionResultCode::TaskPaused,
                    "task is paused",
                )),
                TaskState::Finished => Some(ActionResult::error_msg(
                    ActionResultCode::TaskWentAway,
                    "task is finished",
                )),
                _ => {
                    self.set_state(&mut inner, TaskState::Acting);
                    None
                }
            }
        };

        if let Some(result) = rejection {
            self.journal.log(
                None,
                self.id(),
                JournalTrack::Actor,
                "Act Failed",
                result.to_debug_string(),
            );
            tokio::spawn(async move {
                callback(result, None);
            });
            return;
        }

        // A sequence is already running: let the engine reject this call
        // directly. Installing the completion transform here would let the
        // rejection move the task to Reflecting and clobber the in-flight
        // sequence's outcome when it lands.
        if self.engine.has_sequence_in_progress() {
            self.engine.act(actions, callback);
            return;
        }

        let task = Arc::downgrade(self);
        self.engine.act(
            actions,
            Box::new(move |result, index_of_failed_action| match task.upgrade() {
                Some(task) => task.on_act_finished(result, index_of_failed_action, callback),
                None => callback(
                    ActionResult::error_msg(ActionResultCode::TaskWentAway, "task destroyed"),
                    None,
                ),
            }),
        );
    }

    fn on_act_finished(
        &self,
        result: ActionResult,
        index_of_failed_action: Option<usize>,
        callback: ActCallback,
    ) {
        let forwarded = {
            let mut inner = self.inner.lock();
            if inner.state == TaskState::Acting {
                self.set_state(&mut inner, TaskState::Reflecting);
                (result, index_of_failed_action)
            } else {
                // State moved underneath the running sequence; its result no
                // longer speaks for the task.
                (
                    ActionResult::error_msg(
                        ActionResultCode::Error,
                        "task state changed during action execution",
                    ),
                    None,
                )
            }
        };
        callback(forwarded.0, forwarded.1);
    }

    /// Ends the task: cancels any running sequence, releases every acting
    /// tab, and moves to the terminal `Finished` state.
    pub fn stop(&self) {
        if self.state() == TaskState::Finished {
            return;
        }

        self.engine
            .cancel_ongoing_actions(ActionResultCode::TaskWentAway);

        let released: Vec<TabHandle> = {
            let mut inner = self.inner.lock();
            inner.end_time = Some(Utc::now());
            inner.acting_tabs.drain().map(|(handle, _)| handle).collect()
        };
        for handle in released {
            self.ui
                .on_actor_task_sync_change(ActorTaskSyncChange::RemoveTab {
                    task_id: self.id(),
                    tab: handle,
                });
        }

        let mut inner = self.inner.lock();
        if inner.state != TaskState::Finished {
            self.set_state(&mut inner, TaskState::Finished);
        }
    }

    /// Client-requested pause. A running sequence fails with `TaskPaused`.
    pub fn pause(&self) {
        if self.state() == TaskState::Finished {
            return;
        }
        self.engine
            .cancel_ongoing_actions(ActionResultCode::TaskPaused);
        let mut inner = self.inner.lock();
        if inner.state != TaskState::PausedByClient && inner.state != TaskState::Finished {
            self.set_state(&mut inner, TaskState::PausedByClient);
        }
    }

    /// Clears the paused gate. Only ever moves to `Reflecting`; actuation
    /// resumes with the next `act`. Trusted not to be misused from other
    /// states, which it deliberately tolerates.
    pub fn resume(&self) {
        let mut inner = self.inner.lock();
        if inner.state == TaskState::Finished || inner.state == TaskState::Reflecting {
            return;
        }
        self.set_state(&mut inner, TaskState::Reflecting);
    }

    /// Brings `handle` into the acting set, taking the actuation-mode hold.
    /// Idempotent; completes only after the UI acknowledged the new tab.
    pub async fn add_tab(&self, handle: TabHandle) -> ActionResult {
        {
            let inner = self.inner.lock();
            if inner.state == TaskState::Finished {
                return ActionResult::error_msg(
                    ActionResultCode::TaskWentAway,
                    "task is finished",
                );
            }
            if inner.acting_tabs.contains_key(&handle) {
                return ActionResult::ok();
            }
        }

        let Some(tab) = self.tabs.resolve(handle) else {
            return ActionResult::error_msg(
                ActionResultCode::TabWentAway,
                "The tab is no longer present.",
            );
        };
        let lease = tab.begin_actuation();
        {
            let mut inner = self.inner.lock();
            if inner.acting_tabs.contains_key(&handle) {
                // Raced another add of the same tab; keep the first hold.
                return ActionResult::ok();
            }
            inner.acting_tabs.insert(handle, lease);
        }

        self.ui
            .on_actor_task_async_change(ActorTaskAsyncChange::AddTab {
                task_id: self.id(),
                tab: handle,
            })
            .await
    }

    /// Releases the actuation hold on `handle`. No-op for unknown handles.
    pub fn remove_tab(&self, handle: TabHandle) {
        let removed = self.inner.lock().acting_tabs.remove(&handle);
        if removed.is_some() {
            self.ui
                .on_actor_task_sync_change(ActorTaskSyncChange::RemoveTab {
                    task_id: self.id(),
                    tab: handle,
                });
        }
    }

    pub fn tabs(&self) -> Vec<TabHandle> {
        let mut handles: Vec<TabHandle> = self.inner.lock().acting_tabs.keys().copied().collect();
        handles.sort();
        handles
    }

    pub fn is_acting_on_tab(&self, handle: TabHandle) -> bool {
        self.inner.lock().acting_tabs.contains_key(&handle)
    }

    /// The single live tab observations should be taken from. The acting
    /// set holds at most one tab today; more is a caller bug.
    pub fn tab_for_observation(&self) -> Option<Arc<dyn TabInterface>> {
        let handle = {
            let inner = self.inner.lock();
            debug_assert!(
                inner.acting_tabs.len() <= 1,
                "multiple acting tabs are not supported yet"
            );
            inner.acting_tabs.keys().next().copied()
        };
        handle.and_then(|handle| self.tabs.resolve(handle))
    }

    fn set_state(&self, inner: &mut TaskInner, state: TaskState) {
        if inner.state == state {
            return;
        }
        check_transition(inner.state, state);
        let old_state = inner.state;
        inner.state = state;
        self.journal.log(
            None,
            self.id(),
            JournalTrack::Actor,
            "ActorTask::StateChange",
            format!("State {old_state} -> {state}"),
        );
        self.ui
            .on_actor_task_sync_change(ActorTaskSyncChange::ChangeTaskState {
                task_id: self.id(),
                old_state,
                new_state: state,
            });
    }
}
