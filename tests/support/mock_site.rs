//! Local servers standing in for every provider host and media CDN.

use std::net::TcpListener;
use std::ops::Deref;
use std::panic::Location;

use music_get::{Bitrate, ProviderContext, ProviderSession};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use wiremock::MockServer;

/// Set to `1`, `true` or `yes` to turn a missing localhost socket into a test failure.
const REQUIRE_SOCKETS_ENV: &str = "MUSIC_GET_REQUIRE_SOCKET_TESTS";

fn sockets_required() -> bool {
    std::env::var(REQUIRE_SOCKETS_ENV)
        .is_ok_and(|value| {
            matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes"
            )
        })
}

/// False, after logging the skip, when localhost cannot be bound here.
fn localhost_bindable(caller: &Location<'_>) -> bool {
    if TcpListener::bind("127.0.0.1:0").is_ok() {
        return true;
    }
    assert!(
        !sockets_required(),
        "cannot bind a localhost socket for {caller} while {REQUIRE_SOCKETS_ENV} is set"
    );
    eprintln!("[mock-site] no localhost socket, skipping {caller}");
    false
}

/// Mock server plus helpers to point a [`ProviderContext`] at it.
pub struct MockSite {
    server: MockServer,
}

impl MockSite {
    /// Starts the server; `None` when localhost cannot be bound here.
    #[track_caller]
    pub fn start() -> impl std::future::Future<Output = Option<Self>> {
        let bindable = localhost_bindable(Location::caller());
        async move {
            if !bindable {
                return None;
            }
            Some(Self {
                server: MockServer::start().await,
            })
        }
    }

    /// Absolute URL of `path` on this site.
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.server.uri())
    }

    /// Provider context whose endpoints all resolve to this site.
    pub fn context(&self, session: ProviderSession, bitrate: Bitrate) -> ProviderContext {
        ProviderContext::new(session, bitrate)
            .unwrap()
            .with_api_base(&self.server.uri())
            .unwrap()
    }
}

impl Deref for MockSite {
    type Target = MockServer;

    fn deref(&self) -> &MockServer {
        &self.server
    }
}

/// Serves every connection a `200` that declares `declared_len` body bytes
/// but sends only `body` before closing.
///
/// Returns the server's base URL, or `None` when localhost cannot be bound.
#[track_caller]
pub fn short_body_server(
    declared_len: usize,
    body: &'static [u8],
) -> impl std::future::Future<Output = Option<String>> {
    let bindable = localhost_bindable(Location::caller());
    async move {
        if !bindable {
            return None;
        }
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.ok()?;
        let addr = listener.local_addr().ok()?;
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut request = [0u8; 4096];
                let _ = socket.read(&mut request).await;
                let head = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: audio/mpeg\r\nContent-Length: {declared_len}\r\nConnection: close\r\n\r\n"
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(body).await;
                let _ = socket.shutdown().await;
            }
        });
        Some(format!("http://{addr}"))
    }
}
