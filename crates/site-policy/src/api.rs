use async_trait::async_trait;
use tracing::debug;
use url::Url;

use crate::errors::PolicyError;
use crate::model::{PolicyConfig, PolicyDecision};

/// Oracle deciding whether the actor may act on a URL. Consulted before
/// every tab-scoped action and by the embedder's navigation gate. Answers
/// may arrive after further navigations, so callers are responsible for
/// re-checking the committed origin once the verdict returns.
#[async_trait]
pub trait SitePolicy: Send + Sync {
    async fn may_act_on_url(&self, url: &Url) -> PolicyDecision;
}

/// Host-blocklist policy over a fixed scheme set.
pub struct BlocklistSitePolicy {
    config: PolicyConfig,
}

impl BlocklistSitePolicy {
    pub fn new(config: PolicyConfig) -> Result<Self, PolicyError> {
        for host in &config.blocked_hosts {
            if host.is_empty() || host.contains('/') || host.contains(char::is_whitespace) {
                return Err(PolicyError::InvalidHostPattern(host.clone()));
            }
        }
        for scheme in &config.allowed_schemes {
            if scheme.is_empty() || !scheme.chars().all(|c| c.is_ascii_lowercase()) {
                return Err(PolicyError::InvalidScheme(scheme.clone()));
            }
        }
        Ok(Self { config })
    }

    fn host_blocked(&self, host: &str) -> bool {
        self.config.blocked_hosts.iter().any(|blocked| {
            host == blocked
                || host
                    .strip_suffix(blocked)
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }
}

impl Default for BlocklistSitePolicy {
    fn default() -> Self {
        Self {
            config: PolicyConfig::default(),
        }
    }
}

#[async_trait]
impl SitePolicy for BlocklistSitePolicy {
    async fn may_act_on_url(&self, url: &Url) -> PolicyDecision {
        // The blank page is always fair game; tasks often start there.
        if url.scheme() == "about" && url.path() == "blank" {
            return PolicyDecision::Allow;
        }
        if !self
            .config
            .allowed_schemes
            .iter()
            .any(|scheme| scheme == url.scheme())
        {
            debug!(target: "site_policy", %url, "blocked: scheme not actable");
            return PolicyDecision::Block;
        }
        if !self.config.allow_by_default {
            return PolicyDecision::Block;
        }
        match url.host_str() {
            Some(host) if self.host_blocked(host) => {
                debug!(target: "site_policy", %url, "blocked: host on blocklist");
                PolicyDecision::Block
            }
            Some(_) => PolicyDecision::Allow,
            None => PolicyDecision::Block,
        }
    }
}
