//! UI synchronization for actor activity.
//!
//! The engine never touches browser UI directly. It hands coarse hooks
//! ("about to run this tool", "task changed state") to a dispatcher, which
//! expands each hook into a sequence of fine-grained UI events and feeds
//! them to the embedder's state sink. Async hooks must complete before the
//! pipeline proceeds; sync hooks are fire-and-forget notifications.

use std::sync::Arc;

use actor_core_types::{ActionResult, PageTarget, TabHandle, TaskId};
use async_trait::async_trait;
use tracing::trace;

use crate::actor_task::TaskState;
use actor_tool_requests::{ClickCount, ClickType, ToolRequest};

/// Events whose handling the engine waits on.
#[derive(Clone, Debug, PartialEq)]
pub enum AsyncUiEvent {
    MouseMove {
        tab: TabHandle,
        target: PageTarget,
    },
    MouseClick {
        tab: TabHandle,
        click_type: ClickType,
        count: ClickCount,
    },
    StartingToActOnTab {
        tab: TabHandle,
        task_id: TaskId,
    },
}

/// Fire-and-forget notifications.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SyncUiEvent {
    StartTask {
        task_id: TaskId,
    },
    TaskStateChanged {
        task_id: TaskId,
        state: TaskState,
    },
    StoppedActingOnTab {
        tab: TabHandle,
    },
}

/// Context for the one-time "about to start acting" notification.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FirstActInfo {
    pub task_id: TaskId,
    pub tab: Option<TabHandle>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ActorTaskAsyncChange {
    AddTab { task_id: TaskId, tab: TabHandle },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ActorTaskSyncChange {
    ChangeTaskState {
        task_id: TaskId,
        old_state: TaskState,
        new_state: TaskState,
    },
    RemoveTab {
        task_id: TaskId,
        tab: TabHandle,
    },
}

/// Hook surface the engine and tasks call into.
#[async_trait]
pub trait UiEventDispatcher: Send + Sync {
    async fn on_pre_first_act(&self, info: FirstActInfo) -> ActionResult;
    async fn on_pre_tool(&self, request: &ToolRequest) -> ActionResult;
    async fn on_post_tool(&self, request: &ToolRequest) -> ActionResult;
    async fn on_actor_task_async_change(&self, change: ActorTaskAsyncChange) -> ActionResult;
    fn on_actor_task_sync_change(&self, change: ActorTaskSyncChange);
}

/// Receives the expanded event stream. Implemented by the embedder's UI
/// state manager; async events are acknowledged one at a time.
#[async_trait]
pub trait ActorUiStateSink: Send + Sync {
    async fn on_async_ui_event(&self, event: AsyncUiEvent) -> ActionResult;
    fn on_sync_ui_event(&self, event: SyncUiEvent);
}

/// Dispatcher mapping hooks to per-kind event sequences. Async sequences are
/// sent strictly in order; the first sink error aborts the rest and is
/// returned to the engine.
pub struct StateManagerUiEventDispatcher {
    sink: Arc<dyn ActorUiStateSink>,
}

impl StateManagerUiEventDispatcher {
    pub fn new(sink: Arc<dyn ActorUiStateSink>) -> Self {
        Self { sink }
    }

    fn pre_tool_events(request: &ToolRequest) -> Vec<AsyncUiEvent> {
        match request {
            ToolRequest::Click(r) => vec![
                AsyncUiEvent::MouseMove {
                    tab: r.page.tab,
                    target: r.page.target.clone(),
                },
                AsyncUiEvent::MouseClick {
                    tab: r.page.tab,
                    click_type: r.click_type,
                    count: r.count,
                },
            ],
            ToolRequest::Type(r) => vec![AsyncUiEvent::MouseMove {
                tab: r.page.tab,
                target: r.page.target.clone(),
            }],
            ToolRequest::MoveMouse(r) => vec![AsyncUiEvent::MouseMove {
                tab: r.page.tab,
                target: r.page.target.clone(),
            }],
            _ => Vec::new(),
        }
    }

    async fn send_all(&self, phase: &'static str, events: Vec<AsyncUiEvent>) -> ActionResult {
        for event in events {
            trace!(target: "actor_ui", phase, ?event, "sending async ui event");
            let result = self.sink.on_async_ui_event(event).await;
            if !result.is_ok() {
                trace!(target: "actor_ui", phase, result = %result.to_debug_string(), "ui actuation failed");
                return result;
            }
        }
        ActionResult::ok()
    }

    fn send_all_sync(&self, phase: &'static str, events: Vec<SyncUiEvent>) {
        for event in events {
            trace!(target: "actor_ui", phase, ?event, "sending sync ui event");
            self.sink.on_sync_ui_event(event);
        }
    }
}

#[async_trait]
impl UiEventDispatcher for StateManagerUiEventDispatcher {
    async fn on_pre_first_act(&self, _info: FirstActInfo) -> ActionResult {
        // No events yet; the hook still round-trips so ordering guarantees
        // hold once events are added.
        self.send_all("FirstAct", Vec::new()).await
    }

    async fn on_pre_tool(&self, request: &ToolRequest) -> ActionResult {
        self.send_all("PreTool", Self::pre_tool_events(request)).await
    }

    async fn on_post_tool(&self, _request: &ToolRequest) -> ActionResult {
        self.send_all("PostTool", Vec::new()).await
    }

    async fn on_actor_task_async_change(&self, change: ActorTaskAsyncChange) -> ActionResult {
        let events = match change {
            ActorTaskAsyncChange::AddTab { task_id, tab } => {
                vec![AsyncUiEvent::StartingToActOnTab { tab, task_id }]
            }
        };
        self.send_all("ActorTaskAsyncChange", events).await
    }

    fn on_actor_task_sync_change(&self, change: ActorTaskSyncChange) {
        let events = match change {
            ActorTaskSyncChange::ChangeTaskState {
                task_id,
                old_state,
                new_state,
            } => {
                let mut events = Vec::new();
                if old_state == TaskState::Created && new_state == TaskState::Acting {
                    events.push(SyncUiEvent::StartTask { task_id });
                }
                events.push(SyncUiEvent::TaskStateChanged {
                    task_id,
                    state: new_state,
                });
                events
            }
            ActorTaskSyncChange::RemoveTab { tab, .. } => {
                vec![SyncUiEvent::StoppedActingOnTab { tab }]
            }
        };
        self.send_all_sync("ActorTaskSyncChange", events);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actor_core_types::{ActionResultCode, Point};
    use actor_tool_requests::{ClickRequest, PageToolFields, WaitRequest};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        async_events: Mutex<Vec<AsyncUiEvent>>,
        sync_events: Mutex<Vec<SyncUiEvent>>,
        fail_after: Mutex<Option<usize>>,
    }

    #[async_trait]
    impl ActorUiStateSink for RecordingSink {
        async fn on_async_ui_event(&self, event: AsyncUiEvent) -> ActionResult {
            let mut events = self.async_events.lock();
            events.push(event);
            if let Some(limit) = *self.fail_after.lock() {
                if events.len() > limit {
                    return ActionResult::error(ActionResultCode::Error);
                }
            }
            ActionResult::ok()
        }

        fn on_sync_ui_event(&self, event: SyncUiEvent) {
            self.sync_events.lock().push(event);
        }
    }

    fn click_request() -> ToolRequest {
        ToolRequest::Click(ClickRequest {
            page: PageToolFields {
                tab: TabHandle(3),
                target: PageTarget::Coordinate(Point::new(5, 6)),
            },
            click_type: ClickType::Left,
            count: ClickCount::Single,
        })
    }

    #[tokio::test]
    async fn click_expands_to_move_then_click() {
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = StateManagerUiEventDispatcher::new(sink.clone());

        let result = dispatcher.on_pre_tool(&click_request()).await;
        assert!(result.is_ok());
        let events = sink.async_events.lock();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], AsyncUiEvent::MouseMove { .. }));
        assert!(matches!(events[1], AsyncUiEvent::MouseClick { .. }));
    }

    #[tokio::test]
    async fn wait_produces_no_events() {
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = StateManagerUiEventDispatcher::new(sink.clone());

        let request = ToolRequest::Wait(WaitRequest {
            tab: TabHandle(3),
            duration_ms: 100,
        });
        assert!(dispatcher.on_pre_tool(&request).await.is_ok());
        assert!(dispatcher.on_post_tool(&request).await.is_ok());
        assert!(sink.async_events.lock().is_empty());
    }

    #[tokio::test]
    async fn sink_error_short_circuits_sequence() {
        let sink = Arc::new(RecordingSink::default());
        *sink.fail_after.lock() = Some(0);
        let dispatcher = StateManagerUiEventDispatcher::new(sink.clone());

        let result = dispatcher.on_pre_tool(&click_request()).await;
        assert_eq!(result.code, ActionResultCode::Error);
        // The click event never went out.
        assert_eq!(sink.async_events.lock().len(), 1);
    }

    #[tokio::test]
    async fn task_start_emits_start_then_state_change() {
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = StateManagerUiEventDispatcher::new(sink.clone());

        dispatcher.on_actor_task_sync_change(ActorTaskSyncChange::ChangeTaskState {
            task_id: TaskId(1),
            old_state: TaskState::Created,
            new_state: TaskState::Acting,
        });
        dispatcher.on_actor_task_sync_change(ActorTaskSyncChange::ChangeTaskState {
            task_id: TaskId(1),
            old_state: TaskState::Acting,
            new_state: TaskState::Reflecting,
        });

        let events = sink.sync_events.lock();
        assert_eq!(
            *events,
            vec![
                SyncUiEvent::StartTask { task_id: TaskId(1) },
                SyncUiEvent::TaskStateChanged {
                    task_id: TaskId(1),
                    state: TaskState::Acting,
                },
                SyncUiEvent::TaskStateChanged {
                    task_id: TaskId(1),
                    state: TaskState::Reflecting,
                },
            ]
        );
    }

    #[tokio::test]
    async fn add_tab_change_announces_acting_tab() {
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = StateManagerUiEventDispatcher::new(sink.clone());

        let result = dispatcher
            .on_actor_task_async_change(ActorTaskAsyncChange::AddTab {
                task_id: TaskId(9),
                tab: TabHandle(4),
            })
            .await;
        assert!(result.is_ok());
        assert_eq!(
            *sink.async_events.lock(),
            vec![AsyncUiEvent::StartingToActOnTab {
                tab: TabHandle(4),
                task_id: TaskId(9),
            }]
        );
    }
}
