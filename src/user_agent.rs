//! Shared User-Agent strings for upstream negotiation traffic.
//!
//! The share page and its internal APIs reject non-browser clients, so every
//! negotiation hop presents the same realistic desktop browser identity.

/// Browser User-Agent used for all negotiation hops unless configured otherwise.
pub(crate) const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Returns the default User-Agent for negotiation requests.
#[must_use]
pub(crate) fn default_browser_user_agent() -> String {
    BROWSER_USER_AGENT.to_string()
}

/// Returns the User-Agent for this tool's own identification (health output, logs).
#[must_use]
pub(crate) fn tool_identifier() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("sharelink/{version}")
}
