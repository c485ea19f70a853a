use serde::{Deserialize, Serialize};

/// Verdict of the policy oracle for a single URL.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PolicyDecision {
    Allow,
    Block,
}

impl PolicyDecision {
    pub fn is_allowed(self) -> bool {
        self == PolicyDecision::Allow
    }
}

/// Configuration of the blocklist policy.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Verdict for URLs no rule matches. When false the policy becomes an
    /// allowlist and `blocked_hosts` is ignored.
    pub allow_by_default: bool,
    /// Hosts denied for acting; an entry also covers its subdomains.
    pub blocked_hosts: Vec<String>,
    /// Schemes acting is permitted on at all.
    pub allowed_schemes: Vec<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            allow_by_default: true,
            blocked_hosts: Vec::new(),
            allowed_schemes: vec!["http".to_string(), "https".to_string()],
        }
    }
}
