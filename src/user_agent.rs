//! Shared User-Agent strings for API and download HTTP clients.
//!
//! The platforms reject obviously non-browser clients, so every process picks
//! one desktop browser User-Agent at startup and uses it for all traffic.

use std::sync::LazyLock;

use rand::seq::SliceRandom;

const BROWSER_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.1 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36 Edg/131.0.0.0",
];

static PROCESS_USER_AGENT: LazyLock<&'static str> = LazyLock::new(random_browser_user_agent);

/// Picks a random desktop browser User-Agent.
#[must_use]
pub(crate) fn random_browser_user_agent() -> &'static str {
    BROWSER_USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(BROWSER_USER_AGENTS[0])
}

/// User-Agent used by every client in this process.
#[must_use]
pub(crate) fn browser_user_agent() -> &'static str {
    *PROCESS_USER_AGENT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_user_agent_comes_from_browser_list() {
        for _ in 0..20 {
            assert!(BROWSER_USER_AGENTS.contains(&random_browser_user_agent()));
        }
    }

    #[test]
    fn test_process_user_agent_is_stable() {
        let first = browser_user_agent();
        assert_eq!(first, browser_user_agent());
        assert!(first.starts_with("Mozilla/5.0"));
    }
}
