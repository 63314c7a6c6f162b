//! Result aggregation.
//!
//! Turns the engine's [`DownloadTask`]s into a [`Report`] of counts, removes
//! partial files left by failed transfers and writes one [`FailureRecord`]
//! per failed track to a JSON-lines log. Cleanup and logging are best
//! effort: neither can change the counts.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::download::DownloadTask;

/// Failure log file name, resolved against the working directory.
pub const LOG_FILE_NAME: &str = "music-get.log";

/// Counts of one run; `total == success + skipped + failed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Report {
    pub total: usize,
    pub success: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl Report {
    /// Counts tasks by outcome class. Pure; see [`aggregate`] for the side effects.
    #[must_use]
    pub fn from_tasks(tasks: &[DownloadTask]) -> Self {
        tasks.iter().fold(Self::default(), |mut report, task| {
            report.total += 1;
            if task.status.is_success() {
                report.success += 1;
            } else if task.status.is_skip() {
                report.skipped += 1;
            } else {
                report.failed += 1;
            }
            report
        })
    }

    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Download report --> total: {}, success: {}, failure: {}, ignore: {}",
            self.total, self.success, self.failed, self.skipped
        )
    }
}

/// One line of the failure log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub filename: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    pub code: i32,
    pub reason: String,
}

impl FailureRecord {
    #[must_use]
    pub fn from_task(task: &DownloadTask) -> Self {
        Self {
            filename: task.descriptor.file_name.clone(),
            url: task.descriptor.download_url.clone(),
            code: task.status.code(),
            reason: task.status.message().to_string(),
        }
    }
}

/// Report plus the path of the failure log, if one was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub report: Report,
    pub failure_log: Option<PathBuf>,
}

/// Counts the tasks, cleans up partial files and writes the failure log.
///
/// The log at `log_path` is only created when at least one task failed.
#[tracing::instrument(skip(tasks), fields(tasks = tasks.len(), log = %log_path.display()))]
pub fn aggregate(tasks: &[DownloadTask], log_path: &Path) -> Summary {
    let report = Report::from_tasks(tasks);

    let failures: Vec<&DownloadTask> = tasks.iter().filter(|t| t.status.is_failure()).collect();
    for task in &failures {
        remove_partial_file(task);
    }

    let failure_log = if failures.is_empty() {
        None
    } else {
        match write_failure_log(&failures, log_path) {
            Ok(()) => Some(log_path.to_path_buf()),
            Err(e) => {
                warn!(path = %log_path.display(), error = %e, "failed to write failure log");
                None
            }
        }
    };

    debug!(
        total = report.total,
        success = report.success,
        failed = report.failed,
        skipped = report.skipped,
        "aggregated"
    );
    Summary {
        report,
        failure_log,
    }
}

fn remove_partial_file(task: &DownloadTask) {
    if !task.status.may_leave_partial_file() {
        return;
    }
    let path = task.descriptor.file_path();
    match fs::remove_file(&path) {
        Ok(()) => debug!(path = %path.display(), "removed partial file"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "cannot remove partial file"),
    }
}

fn write_failure_log(failures: &[&DownloadTask], log_path: &Path) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(log_path)?);
    for task in failures {
        let line = serde_json::to_string(&FailureRecord::from_task(task))?;
        writeln!(writer, "{line}")?;
    }
    writer.flush()
}
