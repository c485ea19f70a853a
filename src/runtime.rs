//! Explicit wiring of an actor service and its collaborators.

use std::sync::Arc;

use actor_core_types::ActionResult;
use actor_engine::{
    ActorKeyedService, ActorUiStateSink, AsyncUiEvent, FetchPageContextOptions, ObservationError,
    PageContext, PageContextFetcher, SyncUiEvent, TabInterface, TabProvider,
};
use actor_journal::AggregatedJournal;
use actor_site_policy::{BlocklistSitePolicy, PolicyError, SitePolicy};
use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::config::ActorConfig;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("a tab provider is required")]
    MissingTabProvider,
    #[error(transparent)]
    Policy(#[from] PolicyError),
}

/// One wired actor kernel. Everything the service depends on is passed in
/// explicitly; there is no hidden global lookup.
pub struct ActorRuntime {
    config: ActorConfig,
    journal: Arc<AggregatedJournal>,
    service: Arc<ActorKeyedService>,
}

impl ActorRuntime {
    pub fn builder() -> ActorRuntimeBuilder {
        ActorRuntimeBuilder::default()
    }

    pub fn config(&self) -> &ActorConfig {
        &self.config
    }

    pub fn journal(&self) -> &Arc<AggregatedJournal> {
        &self.journal
    }

    pub fn service(&self) -> &Arc<ActorKeyedService> {
        &self.service
    }
}

#[derive(Default)]
pub struct ActorRuntimeBuilder {
    config: ActorConfig,
    tabs: Option<Arc<dyn TabProvider>>,
    policy: Option<Arc<dyn SitePolicy>>,
    ui_sink: Option<Arc<dyn ActorUiStateSink>>,
    fetcher: Option<Arc<dyn PageContextFetcher>>,
}

impl ActorRuntimeBuilder {
    pub fn with_config(mut self, config: ActorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_tabs(mut self, tabs: Arc<dyn TabProvider>) -> Self {
        self.tabs = Some(tabs);
        self
    }

    pub fn with_policy(mut self, policy: Arc<dyn SitePolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn with_ui_sink(mut self, ui_sink: Arc<dyn ActorUiStateSink>) -> Self {
        self.ui_sink = Some(ui_sink);
        self
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn PageContextFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn build(self) -> Result<ActorRuntime, RuntimeError> {
        let tabs = self.tabs.ok_or(RuntimeError::MissingTabProvider)?;
        let policy = match self.policy {
            Some(policy) => policy,
            None => Arc::new(BlocklistSitePolicy::new(self.config.policy.clone())?),
        };
        let ui_sink = self
            .ui_sink
            .unwrap_or_else(|| Arc::new(TracingUiSink::default()));
        let fetcher = self
            .fetcher
            .unwrap_or_else(|| Arc::new(UnconfiguredFetcher));
        let journal = Arc::new(AggregatedJournal::new(self.config.journal_capacity));
        let service = Arc::new(ActorKeyedService::new(
            Arc::clone(&journal),
            tabs,
            policy,
            ui_sink,
            fetcher,
        ));
        Ok(ActorRuntime {
            config: self.config,
            journal,
            service,
        })
    }
}

/// Default sink: surfaces UI events as log lines.
#[derive(Default)]
pub struct TracingUiSink;

#[async_trait]
impl ActorUiStateSink for TracingUiSink {
    async fn on_async_ui_event(&self, event: AsyncUiEvent) -> ActionResult {
        info!(target: "actor_ui", ?event, "ui event");
        ActionResult::ok()
    }

    fn on_sync_ui_event(&self, event: SyncUiEvent) {
        info!(target: "actor_ui", ?event, "ui event");
    }
}

/// Default fetcher: observations fail until the embedder provides one.
struct UnconfiguredFetcher;

#[async_trait]
impl PageContextFetcher for UnconfiguredFetcher {
    async fn fetch_page_context(
        &self,
        _tab: Arc<dyn TabInterface>,
        _options: FetchPageContextOptions,
    ) -> Result<PageContext, ObservationError> {
        Err(ObservationError::Fetch(
            "no page context fetcher configured".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::StubBrowser;

    #[tokio::test]
    async fn builder_requires_tabs() {
        assert!(matches!(
            ActorRuntime::builder().build(),
            Err(RuntimeError::MissingTabProvider)
        ));
    }

    #[tokio::test]
    async fn builder_wires_defaults() {
        let browser = StubBrowser::new();
        let runtime = ActorRuntime::builder()
            .with_tabs(browser.clone())
            .build()
            .unwrap();
        let task_id = runtime.service().create_task();
        assert!(runtime.service().get_task(task_id).is_some());

        // Default fetcher refuses observations.
        let error = runtime
            .service()
            .request_tab_observation(task_id)
            .await
            .unwrap_err();
        assert!(matches!(error, ObservationError::NoObservableTab));
    }
}
