//! music-get core library
//!
//! Resolves a content URL from one of several music-streaming platforms into
//! a list of downloadable tracks, then downloads them to local storage under
//! a bounded concurrency limit and reports the outcome of every track.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`router`] - URL routing table selecting a provider request variant
//! - [`provider`] - Four-stage provider request protocol and the per-platform adapters
//! - [`track`] - Normalized track descriptors shared by every stage
//! - [`session`] - Provider cookies with expiry
//! - [`config`] - Persisted JSON configuration and download settings
//! - [`download`] - Bounded-concurrency download engine with streaming support
//! - [`report`] - Result aggregation and the structured failure log
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use music_get::{DownloadEngine, DownloadSettings, ProviderContext, aggregate, resolve_tracks, route};
//! use music_get::config::AppConfig;
//! use music_get::report::LOG_FILE_NAME;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! let ctx = ProviderContext::new(config.session(), config.bitrate())?;
//! let mut request = route("https://music.163.com/#/song?id=553310243")?;
//! let tracks = resolve_tracks(request.as_mut(), &ctx).await?;
//!
//! let engine = DownloadEngine::new(&DownloadSettings::default())?;
//! let tasks = engine.download(tracks).await;
//! let summary = aggregate(&tasks, Path::new(LOG_FILE_NAME));
//! println!("{}", summary.report);
//! # Ok(())
//! # }
//! ```

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod download;
pub mod provider;
pub mod report;
pub mod router;
pub mod session;
pub mod track;
mod user_agent;

#[cfg(test)]
pub mod test_support;

// Re-export commonly used types
pub use config::{AppConfig, ConfigError, DownloadSettings};
pub use download::{
    AdmissionGate, DownloadEngine, DownloadError, DownloadTask, EngineError, HttpClient,
    StatusCode,
};
pub use provider::{
    ApiError, AuthError, Bitrate, MusicRequest, ProviderContext, RequestError, RequestSigner,
    RequestStage, resolve_in_batches, resolve_tracks,
};
pub use report::{FailureRecord, Report, Summary, aggregate};
pub use router::{RouteError, route};
pub use session::{ProviderSession, StoredCookie};
pub use track::{Provider, ResourceKind, Tag, TrackDescriptor};
