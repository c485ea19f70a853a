//! Actor kernel core: task lifecycle, sequential action execution, and the
//! profile-scoped task registry.

pub mod actor_task;
pub mod execution_engine;
pub mod observation;
pub mod service;
pub mod tabs;
pub mod tools;
pub mod ui;

pub use actor_task::{ActorTask, TaskState};
pub use execution_engine::{ActCallback, EngineState, ExecutionEngine};
pub use observation::{FetchPageContextOptions, ObservationError, PageContext, PageContextFetcher};
pub use service::{ActOutcome, ActorKeyedService, TaskStateEvent};
pub use tabs::{ActuationLease, FrameInterface, TabInterface, TabProvider};
pub use tools::{ObservedTarget, Tool, ToolController, ToolDelegate, ToolInvocation};
pub use ui::{
    ActorTaskAsyncChange, ActorTaskSyncChange, ActorUiStateSink, AsyncUiEvent, FirstActInfo,
    StateManagerUiEventDispatcher, SyncUiEvent, UiEventDispatcher,
};

#[cfg(test)]
pub(crate) mod test_support;
