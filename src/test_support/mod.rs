//! Shared helpers for unit tests that need a local HTTP server.

use std::net::TcpListener;

use wiremock::MockServer;

const REQUIRE_SOCKETS_ENV: &str = "MUSIC_GET_REQUIRE_SOCKET_TESTS";

fn requires_sockets(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

/// Starts a wiremock server, or `None` where localhost cannot be bound.
///
/// Setting `MUSIC_GET_REQUIRE_SOCKET_TESTS` to `1`, `true` or `yes` turns the
/// skip into a failure, the same switch the integration tests read.
#[track_caller]
pub fn mock_server() -> impl std::future::Future<Output = Option<MockServer>> {
    let caller = std::panic::Location::caller();
    let bindable = TcpListener::bind("127.0.0.1:0").is_ok();
    async move {
        if bindable {
            return Some(MockServer::start().await);
        }
        let required = std::env::var(REQUIRE_SOCKETS_ENV).is_ok_and(|value| requires_sockets(&value));
        assert!(!required, "cannot bind a localhost socket for {caller}");
        eprintln!("no localhost socket, skipping {caller}");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::requires_sockets;

    #[test]
    fn test_requires_sockets_accepts_common_truthy_values() {
        for value in ["1", "true", "TRUE", " yes "] {
            assert!(requires_sockets(value), "{value:?}");
        }
        for value in ["", "0", "false", "no", "on"] {
            assert!(!requires_sockets(value), "{value:?}");
        }
    }
}
