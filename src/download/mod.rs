//! HTTP download engine for streaming tracks to disk.
//!
//! # Features
//!
//! - Bounded concurrency through a counting [`AdmissionGate`]
//! - Streaming downloads (memory-efficient for large files)
//! - Provider `Origin`/`Referer` headers and session cookies on every request
//! - Exactly one [`DownloadTask`] per input descriptor, whatever the outcome
//!
//! # Example
//!
//! ```no_run
//! use music_get::download::{DownloadEngine, StatusCode};
//! use music_get::DownloadSettings;
//!
//! # async fn example(tracks: Vec<music_get::TrackDescriptor>) -> Result<(), Box<dyn std::error::Error>> {
//! let engine = DownloadEngine::new(&DownloadSettings::default())?;
//! let tasks = engine.download(tracks).await;
//! let failed = tasks.iter().filter(|t| t.status.is_failure()).count();
//! println!("{failed} failed, peak {}", engine.gate().peak_in_flight());
//! # Ok(())
//! # }
//! ```

mod client;
mod engine;
mod error;
mod gate;
mod task;

pub use client::{CONNECT_TIMEOUT_SECS, HttpClient, REQUEST_TIMEOUT_SECS};
pub use engine::{DownloadEngine, EngineError};
pub use error::DownloadError;
pub use gate::{AdmissionGate, AdmissionPermit};
pub use task::{DownloadTask, StatusCode};
