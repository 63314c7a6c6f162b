//! Download engine for bounded-concurrency track downloads.
//!
//! Every descriptor becomes one spawned task. A task must hold an
//! [`AdmissionPermit`](super::AdmissionPermit) from the engine's
//! [`AdmissionGate`] before it touches the network or the file system, so at
//! most `concurrency` downloads are open at once; with a concurrency of 1
//! the tasks run strictly one after another.
//!
//! Results flow back over a channel. Each task owns a guard that publishes
//! its [`DownloadTask`] when dropped, which makes "one descriptor, one task"
//! hold on every path, panics included.
//!
//! # Example
//!
//! ```no_run
//! use music_get::{DownloadEngine, DownloadSettings, Provider, TrackDescriptor};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = DownloadEngine::new(&DownloadSettings::new("./downloads", false, 4))?;
//! let mut track = TrackDescriptor::new(Provider::Kuwo, "a - b.mp3", ".");
//! track.set_download_url("http://example.com/b.mp3");
//! let tasks = engine.download(vec![track]).await;
//! assert_eq!(tasks.len(), 1);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use indicatif::ProgressBar;
use tokio::fs::File;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use super::client::stream_to_file;
use super::gate::AdmissionGate;
use super::task::{DownloadTask, StatusCode};
use super::HttpClient;
use crate::config::{DownloadSettings, MAX_CONCURRENCY, MIN_CONCURRENCY};
use crate::session::{ProviderSession, unix_now};
use crate::track::TrackDescriptor;

/// Error type for download engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// Semaphore was closed unexpectedly.
    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,
}

/// Downloads track descriptors under a concurrency limit.
///
/// Failures are local to one track: they are recorded in that track's
/// [`DownloadTask`] and never abort sibling downloads.
pub struct DownloadEngine {
    client: HttpClient,
    gate: AdmissionGate,
    download_dir: PathBuf,
    overwrite: bool,
    session: Arc<ProviderSession>,
    progress: Option<ProgressBar>,
}

impl fmt::Debug for DownloadEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadEngine")
            .field("concurrency", &self.gate.capacity())
            .field("download_dir", &self.download_dir)
            .field("overwrite", &self.overwrite)
            .field("session_cookies", &self.session.cookies().len())
            .finish_non_exhaustive()
    }
}

impl DownloadEngine {
    /// Creates an engine from the download settings.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] if the concurrency is
    /// outside 1..=16.
    #[instrument(level = "debug", fields(download_dir = %settings.download_dir.display()))]
    pub fn new(settings: &DownloadSettings) -> Result<Self, EngineError> {
        let concurrency = settings.concurrency;
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(EngineError::InvalidConcurrency { value: concurrency });
        }

        debug!(
            concurrency,
            overwrite = settings.overwrite,
            "creating download engine"
        );

        Ok(Self {
            client: HttpClient::new(),
            gate: AdmissionGate::new(concurrency),
            download_dir: settings.download_dir.clone(),
            overwrite: settings.overwrite,
            session: Arc::default(),
            progress: None,
        })
    }

    /// Session whose cookies accompany media requests to hosts in their domain.
    #[must_use]
    pub fn with_session(mut self, session: ProviderSession) -> Self {
        self.session = Arc::new(session);
        self
    }

    /// Progress bar advanced once per finished track.
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.gate.capacity()
    }

    /// The admission gate; exposes in-flight and peak counters.
    #[must_use]
    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    /// Downloads every descriptor and returns exactly one task per input.
    ///
    /// Task order follows completion order, not input order.
    #[instrument(skip(self, tracks), fields(tracks = tracks.len(), concurrency = self.gate.capacity()))]
    pub async fn download(&self, tracks: Vec<TrackDescriptor>) -> Vec<DownloadTask> {
        let total = tracks.len();
        let worker = Arc::new(Worker {
            client: self.client.clone(),
            download_dir: self.download_dir.clone(),
            overwrite: self.overwrite,
            session: Arc::clone(&self.session),
        });
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut handles = Vec::with_capacity(total);

        info!("starting downloads");

        for track in tracks {
            let guard = TaskGuard::new(track, tx.clone(), self.progress.clone());

            // Blocks while `concurrency` tasks are running
            let permit = match self.gate.acquire().await {
                Ok(permit) => permit,
                Err(e) => {
                    error!(error = %e, "admission gate closed");
                    continue;
                }
            };

            let worker = Arc::clone(&worker);
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                let mut guard = guard;
                if let Some(track) = guard.descriptor.as_mut() {
                    guard.status = worker.download_one(track).await;
                }
            }));
        }
        drop(tx);

        debug!(task_count = handles.len(), "waiting for downloads to complete");

        for handle in handles {
            // A panicked task has already published through its guard
            if let Err(e) = handle.await {
                warn!(error = %e, "download task panicked");
            }
        }

        let mut tasks = Vec::with_capacity(total);
        while let Some(task) = rx.recv().await {
            tasks.push(task);
        }

        info!(
            total = tasks.len(),
            success = tasks.iter().filter(|t| t.status.is_success()).count(),
            "downloads finished"
        );
        tasks
    }
}

/// Per-run state shared by every task.
#[derive(Debug)]
struct Worker {
    client: HttpClient,
    download_dir: PathBuf,
    overwrite: bool,
    session: Arc<ProviderSession>,
}

impl Worker {
    #[instrument(skip_all, fields(file = %track.file_name, provider = %track.provider))]
    async fn download_one(&self, track: &mut TrackDescriptor) -> StatusCode {
        track.rebase(&self.download_dir);

        if !track.playable {
            return StatusCode::Unplayable;
        }

        if let Err(e) = tokio::fs::create_dir_all(&track.save_path).await {
            warn!(path = %track.save_path.display(), error = %e, "cannot create save path");
            return StatusCode::PathCreationFailed;
        }

        let file_path = track.file_path();
        if !self.overwrite && tokio::fs::try_exists(&file_path).await.unwrap_or(false) {
            return StatusCode::AlreadyDownloaded;
        }

        if track.download_url.is_empty() {
            warn!("playable track without a download URL");
            return StatusCode::ApiStatusError;
        }

        let url = track.download_url.as_str();
        let cookie_header = self.cookie_header(url);
        let response = match self
            .client
            .get(url, track.provider, cookie_header.as_deref())
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "media request failed");
                return e.request_status();
            }
        };

        let file = match File::create(&file_path).await {
            Ok(file) => file,
            Err(e) => {
                warn!(path = %file_path.display(), error = %e, "cannot create file");
                return StatusCode::FileCreationFailed;
            }
        };

        match stream_to_file(file, response, url, &file_path).await {
            Ok(bytes) => {
                debug!(bytes, path = %file_path.display(), "body written");
                StatusCode::Success
            }
            Err(e) => {
                warn!(error = %e, "transfer incomplete");
                StatusCode::TransferIncomplete
            }
        }
    }

    fn cookie_header(&self, url: &str) -> Option<String> {
        let parsed = Url::parse(url).ok()?;
        self.session.cookie_header(parsed.host_str()?, unix_now())
    }
}

/// Publishes exactly one [`DownloadTask`] when dropped.
///
/// The status starts as [`StatusCode::TransferIncomplete`] and is only
/// overwritten once the task finishes, so an abandoned or panicking task
/// still reports a failure.
struct TaskGuard {
    descriptor: Option<TrackDescriptor>,
    status: StatusCode,
    tx: mpsc::UnboundedSender<DownloadTask>,
    progress: Option<ProgressBar>,
}

impl TaskGuard {
    fn new(
        descriptor: TrackDescriptor,
        tx: mpsc::UnboundedSender<DownloadTask>,
        progress: Option<ProgressBar>,
    ) -> Self {
        Self {
            descriptor: Some(descriptor),
            status: StatusCode::TransferIncomplete,
            tx,
            progress,
        }
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        let Some(descriptor) = self.descriptor.take() else {
            return;
        };
        let status = self.status;
        let file = descriptor.file_name.as_str();
        if status.is_success() {
            info!(file, "download complete");
        } else if status.is_skip() {
            warn!(file, code = status.code(), reason = %status, "download skipped");
        } else {
            error!(file, code = status.code(), reason = %status, "download failed");
        }
        if let Some(progress) = &self.progress {
            progress.inc(1);
        }
        // The receiver outlives every guard within one run
        let _ = self.tx.send(DownloadTask::new(descriptor, status));
    }
}
