//! Normalized track descriptors.
//!
//! Every provider maps its native song record into a [`TrackDescriptor`].
//! The descriptor travels unchanged through the pipeline except for the save
//! path (rebased once onto the download root) and the playability fields
//! (filled by a per-song URL lookup on providers that serve metadata and
//! playback URLs from different endpoints).

use std::fmt;
use std::path::{Path, PathBuf};

/// Streaming platform a request or track belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    /// music.163.com
    NetEase,
    /// y.qq.com
    Qq,
    /// music.migu.cn
    Migu,
    /// www.kugou.com
    Kugou,
    /// www.kuwo.cn
    Kuwo,
}

impl Provider {
    /// Short lowercase name used in logs.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::NetEase => "netease",
            Self::Qq => "qq",
            Self::Migu => "migu",
            Self::Kugou => "kugou",
            Self::Kuwo => "kuwo",
        }
    }

    /// Value of the `Origin` header expected by the platform.
    #[must_use]
    pub fn origin(self) -> &'static str {
        match self {
            Self::NetEase => "https://music.163.com",
            Self::Qq => "https://y.qq.com",
            Self::Migu => "http://music.migu.cn",
            Self::Kugou => "https://www.kugou.com",
            Self::Kuwo => "http://www.kuwo.cn",
        }
    }

    /// Value of the `Referer` header expected by the platform.
    #[must_use]
    pub fn referer(self) -> &'static str {
        match self {
            Self::NetEase => "https://music.163.com/",
            Self::Qq => "https://y.qq.com/",
            Self::Migu => "http://music.migu.cn/v3/music/player/audio",
            Self::Kugou => "https://www.kugou.com/",
            Self::Kuwo => "http://www.kuwo.cn/",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Kind of resource a content URL points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// A single song.
    Song,
    /// An artist (singer); resolves to the artist's top songs.
    Artist,
    /// An album.
    Album,
    /// A user playlist.
    Playlist,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Song => "song",
            Self::Artist => "artist",
            Self::Album => "album",
            Self::Playlist => "playlist",
        })
    }
}

/// Media tag data carried for an external tagger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tag {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub year: Option<i32>,
    pub track_number: Option<u32>,
    pub cover_image_url: Option<String>,
}

/// A single downloadable track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackDescriptor {
    /// Sanitized file name, including the extension.
    pub file_name: String,
    /// Directory the file is saved into, relative until rebased by the engine.
    pub save_path: PathBuf,
    /// Best-effort playability hint; the download HTTP status is authoritative.
    pub playable: bool,
    /// Direct media URL, empty when the lookup produced none.
    pub download_url: String,
    pub provider: Provider,
    pub tag: Option<Tag>,
}

impl TrackDescriptor {
    /// Creates a descriptor with no download URL yet.
    ///
    /// `file_name` is sanitized; `save_path` is taken as-is.
    #[must_use]
    pub fn new(provider: Provider, file_name: &str, save_path: impl Into<PathBuf>) -> Self {
        Self {
            file_name: sanitize_file_name(file_name),
            save_path: save_path.into(),
            playable: false,
            download_url: String::new(),
            provider,
            tag: None,
        }
    }

    /// Attaches tag data.
    #[must_use]
    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tag = Some(tag);
        self
    }

    /// Records the result of a playback URL lookup.
    pub fn set_download_url(&mut self, url: impl Into<String>) {
        self.download_url = url.into();
        self.playable = true;
    }

    /// Full destination path of the file.
    #[must_use]
    pub fn file_path(&self) -> PathBuf {
        self.save_path.join(&self.file_name)
    }

    /// Rebases a relative save path onto the download root.
    pub(crate) fn rebase(&mut self, root: &Path) {
        if self.save_path.is_relative() {
            self.save_path = root.join(&self.save_path);
        }
    }
}

/// Removes characters that are not allowed in file names on common platforms.
///
/// Stripped characters: `\ / : * ? " < > |` and control characters.
/// Surrounding whitespace is trimmed.
#[must_use]
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Joins artist names with `separator`, skipping empty names.
pub(crate) fn join_artists<'a>(names: impl IntoIterator<Item = &'a str>, separator: &str) -> String {
    names
        .into_iter()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .collect::<Vec<_>>()
        .join(separator)
}

/// Sub-directory for a container resource; empty names collapse to the root.
pub(crate) fn container_dir(name: &str) -> PathBuf {
    let dir = sanitize_file_name(name);
    if dir.is_empty() || dir == "." || dir == ".." {
        PathBuf::from(".")
    } else {
        PathBuf::from(dir)
    }
}

/// Calendar year (UTC) of a Unix timestamp in milliseconds.
///
/// Non-positive timestamps mean "unknown" on every platform and yield `None`.
pub(crate) fn year_from_unix_millis(millis: i64) -> Option<i32> {
    if millis <= 0 {
        return None;
    }
    // days-to-civil conversion over 400-year eras
    let z = millis.div_euclid(86_400_000) + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let year = yoe + era * 400 + i64::from(mp >= 10);
    i32::try_from(year).ok()
}

/// Leading four-digit year of a `YYYY-MM-DD`-style date string.
pub(crate) fn year_from_date(date: &str) -> Option<i32> {
    date.get(..4).and_then(|y| y.parse().ok()).filter(|y| *y > 0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_file_name_strips_reserved_characters() {
        assert_eq!(sanitize_file_name("*h|:e/\\l\"l<>o?"), "hello");
    }

    #[test]
    fn test_sanitize_file_name_keeps_unicode_and_spaces() {
        assert_eq!(
            sanitize_file_name("  周杰伦 - 晴天.mp3 "),
            "周杰伦 - 晴天.mp3"
        );
    }

    #[test]
    fn test_sanitize_file_name_strips_control_characters() {
        assert_eq!(sanitize_file_name("a\u{0}b\tc"), "abc");
    }

    #[test]
    fn test_new_descriptor_is_not_playable_until_url_is_set() {
        let mut track = TrackDescriptor::new(Provider::NetEase, "A - B?.mp3", ".");
        assert!(!track.playable);
        assert_eq!(track.file_name, "A - B.mp3");

        track.set_download_url("http://example.com/a.mp3");
        assert!(track.playable);
        assert_eq!(track.download_url, "http://example.com/a.mp3");
    }

    #[test]
    fn test_rebase_prepends_root_once() {
        let mut track = TrackDescriptor::new(Provider::Kuwo, "x.mp3", "album");
        track.rebase(Path::new("/music"));
        assert_eq!(track.save_path, PathBuf::from("/music/album"));
        track.rebase(Path::new("/other"));
        assert_eq!(track.save_path, PathBuf::from("/music/album"));
        assert_eq!(track.file_path(), PathBuf::from("/music/album/x.mp3"));
    }

    #[test]
    fn test_join_artists_skips_empty_names() {
        assert_eq!(join_artists(["A", " ", "B"], "/"), "A/B");
        assert_eq!(join_artists(Vec::<&str>::new(), " "), "");
    }

    #[test]
    fn test_container_dir_falls_back_to_current_dir() {
        assert_eq!(container_dir("My: List"), PathBuf::from("My List"));
        assert_eq!(container_dir("??"), PathBuf::from("."));
        assert_eq!(container_dir(".."), PathBuf::from("."));
    }

    #[test]
    fn test_year_from_unix_millis() {
        assert_eq!(year_from_unix_millis(1_059_580_800_000), Some(2003));
        assert_eq!(year_from_unix_millis(946_684_800_000), Some(2000));
        assert_eq!(year_from_unix_millis(946_684_799_000), Some(1999));
        assert_eq!(year_from_unix_millis(951_782_400_000), Some(2000));
        assert_eq!(year_from_unix_millis(0), None);
        assert_eq!(year_from_unix_millis(-1), None);
    }

    #[test]
    fn test_year_from_date() {
        assert_eq!(year_from_date("2019-05-20"), Some(2019));
        assert_eq!(year_from_date("20"), None);
        assert_eq!(year_from_date("0000-00-00"), None);
    }

    #[test]
    fn test_provider_headers_are_site_specific() {
        assert_eq!(Provider::NetEase.origin(), "https://music.163.com");
        assert!(Provider::Qq.referer().starts_with("https://y.qq.com"));
        assert_eq!(Provider::Kugou.to_string(), "kugou");
    }
}
