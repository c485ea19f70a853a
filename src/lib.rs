//! Actor kernel facade.
//!
//! Re-exports the kernel crates and provides the explicit wiring
//! (`ActorRuntime`) plus an in-memory stub browser for demos and tests.

pub mod config;
pub mod runtime;
pub mod stub;

pub use actor_core_types::{
    ActionResult, ActionResultCode, JournalTrack, PageTarget, Point, Rect, TabHandle, TaskId,
    WindowHandle,
};
pub use actor_engine::{
    ActOutcome, ActorKeyedService, ActorTask, ActorUiStateSink, EngineState, ExecutionEngine,
    FrameInterface, ObservationError, PageContextFetcher, TabInterface, TabProvider, TaskState,
};
pub use actor_journal::{AggregatedJournal, JournalEntry};
pub use actor_page_content::{AnnotatedPageContent, ContentNode};
pub use actor_site_policy::{BlocklistSitePolicy, PolicyConfig, PolicyDecision, SitePolicy};
pub use actor_tool_requests::{ToolAction, ToolRequest};

pub use config::ActorConfig;
pub use runtime::{ActorRuntime, ActorRuntimeBuilder, RuntimeError, TracingUiSink};
pub use stub::{StubBrowser, StubContextFetcher, StubFrame, StubTab};
