//! Profile-scoped task registry and entry point for issuing actions.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use actor_core_types::{ActionResultCode, JournalTrack, TabHandle, TaskId};
use actor_journal::AggregatedJournal;
use actor_site_policy::SitePolicy;
use actor_tool_requests::ToolRequest;
use parking_lot::Mutex;
use tokio::sync::{broadcast, oneshot};
use tracing::debug;

use crate::actor_task::{ActorTask, TaskState};
use crate::execution_engine::ExecutionEngine;
use crate::observation::{FetchPageContextOptions, ObservationError, PageContext, PageContextFetcher};
use crate::tabs::{TabInterface, TabProvider};
use crate::ui::{ActorUiStateSink, StateManagerUiEventDispatcher};

/// Completion of one `perform_actions` call.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ActOutcome {
    pub code: ActionResultCode,
    pub index_of_failed_action: Option<usize>,
}

impl ActOutcome {
    pub fn ok() -> Self {
        Self {
            code: ActionResultCode::Ok,
            index_of_failed_action: None,
        }
    }

    pub fn failed(code: ActionResultCode) -> Self {
        Self {
            code,
            index_of_failed_action: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == ActionResultCode::Ok
    }
}

/// Broadcast whenever a task is registered or changes state at the service
/// level.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TaskStateEvent {
    pub task_id: TaskId,
    pub state: TaskState,
}

/// Owns every task of one profile for the profile's lifetime. Tasks move
/// from the active to the inactive map exactly once, when stopped, and are
/// retained afterwards for inspection.
pub struct ActorKeyedService {
    journal: Arc<AggregatedJournal>,
    tabs: Arc<dyn TabProvider>,
    policy: Arc<dyn SitePolicy>,
    ui_sink: Arc<dyn ActorUiStateSink>,
    fetcher: Arc<dyn PageContextFetcher>,
    next_task_id: AtomicU64,
    last_created_task_id: Mutex<TaskId>,
    active_tasks: Mutex<BTreeMap<TaskId, Arc<ActorTask>>>,
    inactive_tasks: Mutex<BTreeMap<TaskId, Arc<ActorTask>>>,
    task_state_changed: broadcast::Sender<TaskStateEvent>,
}

impl ActorKeyedService {
    pub fn new(
        journal: Arc<AggregatedJournal>,
        tabs: Arc<dyn TabProvider>,
        policy: Arc<dyn SitePolicy>,
        ui_sink: Arc<dyn ActorUiStateSink>,
        fetcher: Arc<dyn PageContextFetcher>,
    ) -> Self {
        let (task_state_changed, _) = broadcast::channel(32);
        Self {
            journal,
            tabs,
            policy,
            ui_sink,
            fetcher,
            next_task_id: AtomicU64::new(1),
            last_created_task_id: Mutex::new(TaskId::NULL),
            active_tasks: Mutex::new(BTreeMap::new()),
            inactive_tasks: Mutex::new(BTreeMap::new()),
            task_state_changed,
        }
    }

    pub fn journal(&self) -> &Arc<AggregatedJournal> {
        &self.journal
    }

    /// Builds a task with its engine and registers it.
    pub fn create_task(&self) -> TaskId {
        // Engine and task get their own dispatcher instances over the shared
        // sink.
        let engine_ui = Arc::new(StateManagerUiEventDispatcher::new(Arc::clone(&self.ui_sink)));
        let task_ui = Arc::new(StateManagerUiEventDispatcher::new(Arc::clone(&self.ui_sink)));
        let engine = Arc::new(ExecutionEngine::new(
            Arc::clone(&self.journal),
            Arc::clone(&self.tabs),
            Arc::clone(&self.policy),
            engine_ui,
        ));
        let task = Arc::new(ActorTask::new(
            engine,
            task_ui,
            Arc::clone(&self.tabs),
            Arc::clone(&self.journal),
        ));
        self.add_active_task(task)
    }

    /// Registers an externally constructed task. Assigns the next id, wires
    /// the engine to it, and announces the new task.
    pub fn add_active_task(&self, task: Arc<ActorTask>) -> TaskId {
        let task_id = TaskId(self.next_task_id.fetch_add(1, Ordering::Relaxed));
        *self.last_created_task_id.lock() = task_id;
        task.set_id(task_id);
        task.execution_engine().bind_task(task_id);
        self.journal.log(
            None,
            task_id,
            JournalTrack::Actor,
            "TaskCreated",
            format!("state {}", task.state()),
        );
        let _ = self.task_state_changed.send(TaskStateEvent {
            task_id,
            state: task.state(),
        });
        self.active_tasks.lock().insert(task_id, task);
        task_id
    }

    pub fn subscribe_task_state_changes(&self) -> broadcast::Receiver<TaskStateEvent> {
        self.task_state_changed.subscribe()
    }

    pub fn get_task(&self, task_id: TaskId) -> Option<Arc<ActorTask>> {
        if let Some(task) = self.active_tasks.lock().get(&task_id) {
            return Some(Arc::clone(task));
        }
        self.inactive_tasks.lock().get(&task_id).map(Arc::clone)
    }

    pub fn get_most_recent_task(&self) -> Option<Arc<ActorTask>> {
        let task_id = *self.last_created_task_id.lock();
        self.get_task(task_id)
    }

    /// Snapshot of tasks still in play. No finished task may appear here.
    pub fn get_active_tasks(&self) -> Vec<(TaskId, Arc<ActorTask>)> {
        self.active_tasks
            .lock()
            .iter()
            .map(|(task_id, task)| {
                debug_assert!(
                    task.state() != TaskState::Finished,
                    "finished task {task_id} still registered as active"
                );
                (*task_id, Arc::clone(task))
            })
            .collect()
    }

    pub fn get_inactive_tasks(&self) -> Vec<(TaskId, Arc<ActorTask>)> {
        self.inactive_tasks
            .lock()
            .iter()
            .map(|(task_id, task)| (*task_id, Arc::clone(task)))
            .collect()
    }

    pub fn is_any_task_acting_on_tab(&self, handle: TabHandle) -> bool {
        self.get_active_tasks()
            .iter()
            .any(|(_, task)| task.is_acting_on_tab(handle))
    }

    /// Stops and retires a task. Safe to call twice; the second call finds
    /// nothing to extract.
    pub fn stop_task(&self, task_id: TaskId) {
        {
            let mut last_created = self.last_created_task_id.lock();
            if *last_created == task_id {
                *last_created = TaskId::NULL;
            }
        }
        let task = self.active_tasks.lock().remove(&task_id);
        if let Some(task) = task {
            self.inactive_tasks.lock().insert(task_id, Arc::clone(&task));
            task.stop();
        }
    }

    /// Entry point for issuing an action sequence against a task. The
    /// receiver resolves exactly once with the sequence outcome.
    pub fn perform_actions(
        &self,
        task_id: TaskId,
        actions: Vec<ToolRequest>,
    ) -> oneshot::Receiver<ActOutcome> {
        let (tx, rx) = oneshot::channel();

        let Some(task) = self.get_task(task_id) else {
            debug!(target: "actor_service", task = task_id.value(), "perform_actions: task not found");
            let _ = tx.send(ActOutcome::failed(ActionResultCode::TaskWentAway));
            return rx;
        };

        if actions.is_empty() {
            debug!(target: "actor_service", task = task_id.value(), "perform_actions: no actions provided");
            let _ = tx.send(ActOutcome::failed(ActionResultCode::EmptyActionSequence));
            return rx;
        }

        task.act(
            actions,
            Box::new(move |result, index_of_failed_action| {
                // An Ok outcome can never name a failed action.
                debug_assert!(!result.is_ok() || index_of_failed_action.is_none());
                let _ = tx.send(ActOutcome {
                    code: result.code,
                    index_of_failed_action,
                });
            }),
        );
        rx
    }

    /// Observes the task's acting tab. A result missing a requested part is
    /// a failure; on success the snapshot becomes the engine's time-of-use
    /// baseline for subsequent actions.
    pub async fn request_tab_observation(
        &self,
        task_id: TaskId,
    ) -> Result<PageContext, ObservationError> {
        let task = self.get_task(task_id).ok_or(ObservationError::TaskNotFound)?;
        let tab = task
            .tab_for_observation()
            .ok_or(ObservationError::NoObservableTab)?;
        let url = tab.committed_url();

        let options = FetchPageContextOptions::default();
        let context = self.fetcher.fetch_page_context(tab, options).await?;

        let Some(content) = context.annotated_page_content.clone() else {
            return Err(ObservationError::MissingAnnotatedContent);
        };
        if context.screenshot_jpeg.is_none() {
            return Err(ObservationError::MissingScreenshot);
        }

        self.journal.log(
            Some(&url),
            task_id,
            JournalTrack::Actor,
            "TabObservation",
            format!(
                "annotated content captured, screenshot {} bytes",
                context.screenshot_jpeg.as_ref().map(Vec::len).unwrap_or(0)
            ),
        );
        task.execution_engine().did_observe_context(content);
        Ok(context)
    }
}
