//! User-Agent presented by fetch sessions.
//!
//! The question endpoint turns away clients that do not look like a desktop
//! browser, so warm-up and query traffic share one browser string.
//! `HARVESTER_USER_AGENT` replaces it when set.

/// Environment variable overriding the session User-Agent.
pub(crate) const USER_AGENT_ENV: &str = "HARVESTER_USER_AGENT";

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
                                  (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// User-Agent for session requests, honoring [`USER_AGENT_ENV`].
#[must_use]
pub(crate) fn session_user_agent() -> String {
    resolve(std::env::var(USER_AGENT_ENV).ok().as_deref())
}

fn resolve(override_value: Option<&str>) -> String {
    match override_value.map(str::trim) {
        Some(value) if !value.is_empty() => value.to_string(),
        _ => BROWSER_USER_AGENT.to_string(),
    }
}
