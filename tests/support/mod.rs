//! Helpers shared by the integration test binaries.
#![allow(dead_code)]

pub mod mock_site;

/// Starts a [`mock_site::MockSite`], or ends the test early when localhost
/// sockets are unavailable.
macro_rules! mock_site_or_skip {
    () => {{
        let Some(site) = support::mock_site::MockSite::start().await else {
            return Ok(());
        };
        site
    }};
}
