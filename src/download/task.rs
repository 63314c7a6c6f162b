//! Download outcomes.

use std::fmt;

use crate::track::TrackDescriptor;

/// Terminal outcome of one download.
///
/// Numeric codes are stable and appear in the failure log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// The file was written completely.
    Success,
    /// The file exists and overwrite was not requested.
    AlreadyDownloaded,
    /// The platform reported no playback rights.
    Unplayable,
    /// The destination directory could not be created.
    PathCreationFailed,
    /// Transport error, timeout or a non-2xx status other than 401 and 403
    /// on the media GET.
    RequestFailed,
    /// A playable track carried no media URL.
    ApiStatusError,
    /// The destination file could not be opened for writing.
    FileCreationFailed,
    /// The body copy failed or fell short of the declared length.
    TransferIncomplete,
    /// The media server answered 401 or 403.
    ///
    /// Split out of [`RequestFailed`](Self::RequestFailed) so the report can
    /// tell a missing or expired session apart from a broken link. It is
    /// still counted as a failure.
    LoginRequired,
}

impl StatusCode {
    /// Stable numeric code.
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::Success => -1,
            Self::AlreadyDownloaded => 102,
            Self::Unplayable => 103,
            Self::PathCreationFailed => 104,
            Self::RequestFailed => 105,
            Self::ApiStatusError => 106,
            Self::FileCreationFailed => 107,
            Self::TransferIncomplete => 108,
            Self::LoginRequired => 109,
        }
    }

    /// Short human-readable reason.
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::Success => "everything is ok",
            Self::AlreadyDownloaded => "already downloaded",
            Self::Unplayable => "no copyright",
            Self::PathCreationFailed => "build path exception",
            Self::RequestFailed => "http request exception",
            Self::ApiStatusError => "api response exception",
            Self::FileCreationFailed => "build file exception",
            Self::TransferIncomplete => "file transfer exception",
            Self::LoginRequired => "login required",
        }
    }

    #[must_use]
    pub fn is_success(self) -> bool {
        self == Self::Success
    }

    /// Expected non-errors: the track was deliberately not downloaded.
    #[must_use]
    pub fn is_skip(self) -> bool {
        matches!(self, Self::AlreadyDownloaded | Self::Unplayable)
    }

    #[must_use]
    pub fn is_failure(self) -> bool {
        !self.is_success() && !self.is_skip()
    }

    /// Failures that may leave a partially written file behind.
    #[must_use]
    pub fn may_leave_partial_file(self) -> bool {
        matches!(self, Self::FileCreationFailed | Self::TransferIncomplete)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// One finished unit of download work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    /// The descriptor, with its save path rebased onto the download root.
    pub descriptor: TrackDescriptor,
    pub status: StatusCode,
}

impl DownloadTask {
    #[must_use]
    pub fn new(descriptor: TrackDescriptor, status: StatusCode) -> Self {
        Self { descriptor, status }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [StatusCode; 9] = [
        StatusCode::Success,
        StatusCode::AlreadyDownloaded,
        StatusCode::Unplayable,
        StatusCode::PathCreationFailed,
        StatusCode::RequestFailed,
        StatusCode::ApiStatusError,
        StatusCode::FileCreationFailed,
        StatusCode::TransferIncomplete,
        StatusCode::LoginRequired,
    ];

    #[test]
    fn test_every_status_is_exactly_one_class() {
        for status in ALL {
            let classes = [status.is_success(), status.is_skip(), status.is_failure()];
            assert_eq!(
                classes.iter().filter(|c| **c).count(),
                1,
                "{status:?} must belong to exactly one class"
            );
        }
    }

    #[test]
    fn test_skips_are_already_downloaded_and_unplayable() {
        let skips: Vec<_> = ALL.into_iter().filter(|s| s.is_skip()).collect();
        assert_eq!(
            skips,
            vec![StatusCode::AlreadyDownloaded, StatusCode::Unplayable]
        );
    }

    #[test]
    fn test_codes_are_unique() {
        let mut codes: Vec<_> = ALL.iter().map(|s| s.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), ALL.len());
    }

    #[test]
    fn test_partial_file_statuses() {
        assert!(StatusCode::TransferIncomplete.may_leave_partial_file());
        assert!(StatusCode::FileCreationFailed.may_leave_partial_file());
        assert!(!StatusCode::RequestFailed.may_leave_partial_file());
        assert!(!StatusCode::AlreadyDownloaded.may_leave_partial_file());
    }

    #[test]
    fn test_login_required_is_a_failure_with_its_own_code() {
        assert!(StatusCode::LoginRequired.is_failure());
        assert!(!StatusCode::LoginRequired.may_leave_partial_file());
        assert_ne!(
            StatusCode::LoginRequired.code(),
            StatusCode::RequestFailed.code()
        );
    }

    #[test]
    fn test_display_uses_message() {
        assert_eq!(StatusCode::RequestFailed.to_string(), "http request exception");
        assert_eq!(StatusCode::LoginRequired.to_string(), "login required");
    }
}
