//! Content URL routing.
//!
//! Maps a user-supplied URL to the provider request that resolves it. The
//! provider is picked by host, then a per-provider pattern extracts the
//! resource kind and id. Matching runs on the raw string so fragment routes
//! such as `https://music.163.com/#/song?id=1` work.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use thiserror::Error;
use tracing::debug;

use crate::provider::{MusicRequest, kugou, kuwo, migu, netease, qq};
use crate::track::Provider;

/// Compiles a regex from a compile-time constant pattern.
///
/// # Panics
///
/// Panics if the pattern is invalid, which is a programming error.
pub(crate) fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid static regex '{pattern}': {e}"))
}

static HOST_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r"music\.163\.com|y\.qq\.com|music\.migu\.cn|www\.kugou\.com|www\.kuwo\.cn")
});
static NETEASE_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"/(song|artist|album|playlist)\?id=(\d+)"));
static QQ_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r"/(song|singer|album|playsquare|playlist)/(\w+)\.html")
});
static MIGU_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"/v3/music/(song|artist|album|playlist)/(\d+)"));
static KUGOU_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(
        r"/(song|singer|yy/album/single|yy/special/single)/(#hash=(\w+)|(\d+)\.html)",
    )
});
static KUWO_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r"/(play_detail|singer_detail|album_detail|playlist_detail)/(\d+)")
});

/// Errors from [`route`].
#[derive(Debug, Clone, Error)]
pub enum RouteError {
    /// No supported provider host in the URL.
    #[error(
        "unsupported music address '{url}'\n  Suggestion: use a music.163.com, y.qq.com, music.migu.cn, www.kugou.com or www.kuwo.cn link"
    )]
    Unsupported { url: String },

    /// Known provider, but the path names no song, artist, album or playlist.
    #[error(
        "invalid {provider} music address '{url}'\n  Suggestion: copy the link of a song, artist, album or playlist page"
    )]
    InvalidAddress { provider: Provider, url: String },
}

impl RouteError {
    fn invalid(provider: Provider, url: &str) -> Self {
        Self::InvalidAddress {
            provider,
            url: url.to_string(),
        }
    }
}

/// Builds the provider request for a content URL.
///
/// # Errors
///
/// Returns [`RouteError::Unsupported`] when no supported host appears in the
/// URL and [`RouteError::InvalidAddress`] when the host is known but the path
/// does not match any resource pattern.
///
/// # Examples
///
/// ```
/// use music_get::router::route;
/// use music_get::track::{Provider, ResourceKind};
///
/// let request = route("https://music.163.com/#/playlist?id=2520739691").unwrap();
/// assert_eq!(request.provider(), Provider::NetEase);
/// assert_eq!(request.kind(), ResourceKind::Playlist);
/// ```
#[tracing::instrument(skip_all, fields(url = %url))]
pub fn route(url: &str) -> Result<Box<dyn MusicRequest>, RouteError> {
    let host = HOST_RE
        .find(url)
        .ok_or_else(|| RouteError::Unsupported {
            url: url.to_string(),
        })?
        .as_str();

    let request = match host {
        "music.163.com" => route_netease(url),
        "y.qq.com" => route_qq(url),
        "music.migu.cn" => route_migu(url),
        "www.kugou.com" => route_kugou(url),
        _ => route_kuwo(url),
    }?;
    debug!(provider = %request.provider(), kind = %request.kind(), "routed");
    Ok(request)
}

fn captures<'a>(re: &Regex, url: &'a str, provider: Provider) -> Result<Captures<'a>, RouteError> {
    re.captures(url)
        .ok_or_else(|| RouteError::invalid(provider, url))
}

fn group<'a>(caps: &Captures<'a>, index: usize) -> Option<&'a str> {
    caps.get(index).map(|m| m.as_str())
}

fn route_netease(url: &str) -> Result<Box<dyn MusicRequest>, RouteError> {
    let caps = captures(&NETEASE_RE, url, Provider::NetEase)?;
    let id: u64 = group(&caps, 2)
        .and_then(|id| id.parse().ok())
        .ok_or_else(|| RouteError::invalid(Provider::NetEase, url))?;
    let request: Box<dyn MusicRequest> = match group(&caps, 1) {
        Some("song") => Box::new(netease::SongRequest::new(id)),
        Some("artist") => Box::new(netease::ArtistRequest::new(id)),
        Some("album") => Box::new(netease::AlbumRequest::new(id)),
        _ => Box::new(netease::PlaylistRequest::new(id)),
    };
    Ok(request)
}

fn route_qq(url: &str) -> Result<Box<dyn MusicRequest>, RouteError> {
    let caps = captures(&QQ_RE, url, Provider::Qq)?;
    let id = group(&caps, 2).ok_or_else(|| RouteError::invalid(Provider::Qq, url))?;
    let request: Box<dyn MusicRequest> = match group(&caps, 1) {
        Some("song") => Box::new(qq::SongRequest::new(id)),
        Some("singer") => Box::new(qq::ArtistRequest::new(id)),
        Some("album") => Box::new(qq::AlbumRequest::new(id)),
        _ => Box::new(qq::PlaylistRequest::new(id)),
    };
    Ok(request)
}

fn route_migu(url: &str) -> Result<Box<dyn MusicRequest>, RouteError> {
    let caps = captures(&MIGU_RE, url, Provider::Migu)?;
    let id = group(&caps, 2).ok_or_else(|| RouteError::invalid(Provider::Migu, url))?;
    let request: Box<dyn MusicRequest> = match group(&caps, 1) {
        Some("song") => Box::new(migu::SongRequest::new(id)),
        Some("artist") => Box::new(migu::ArtistRequest::new(id)),
        Some("album") => Box::new(migu::AlbumRequest::new(id)),
        _ => Box::new(migu::PlaylistRequest::new(id)),
    };
    Ok(request)
}

fn route_kugou(url: &str) -> Result<Box<dyn MusicRequest>, RouteError> {
    let caps = captures(&KUGOU_RE, url, Provider::Kugou)?;
    let invalid = || RouteError::invalid(Provider::Kugou, url);
    // songs are addressed by `#hash=`, containers by numeric `.html` pages
    let request: Box<dyn MusicRequest> = match group(&caps, 1) {
        Some("song") => Box::new(kugou::SongRequest::new(group(&caps, 3).ok_or_else(invalid)?)),
        Some("singer") => Box::new(kugou::CollectionRequest::artist(
            group(&caps, 4).ok_or_else(invalid)?,
        )),
        Some("yy/album/single") => Box::new(kugou::CollectionRequest::album(
            group(&caps, 4).ok_or_else(invalid)?,
        )),
        _ => Box::new(kugou::CollectionRequest::playlist(
            group(&caps, 4).ok_or_else(invalid)?,
        )),
    };
    Ok(request)
}

fn route_kuwo(url: &str) -> Result<Box<dyn MusicRequest>, RouteError> {
    let caps = captures(&KUWO_RE, url, Provider::Kuwo)?;
    let id = group(&caps, 2).ok_or_else(|| RouteError::invalid(Provider::Kuwo, url))?;
    let request: Box<dyn MusicRequest> = match group(&caps, 1) {
        Some("play_detail") => Box::new(kuwo::SongRequest::new(id)),
        Some("singer_detail") => Box::new(kuwo::ArtistRequest::new(id)),
        Some("album_detail") => Box::new(kuwo::CollectionRequest::album(id)),
        _ => Box::new(kuwo::CollectionRequest::playlist(id)),
    };
    Ok(request)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::track::ResourceKind;

    fn routed(url: &str) -> (Provider, ResourceKind) {
        let request = route(url).unwrap();
        (request.provider(), request.kind())
    }

    #[test]
    fn test_route_netease_fragment_urls() {
        assert_eq!(
            routed("https://music.163.com/#/song?id=553310243"),
            (Provider::NetEase, ResourceKind::Song)
        );
        assert_eq!(
            routed("https://music.163.com/#/artist?id=6452"),
            (Provider::NetEase, ResourceKind::Artist)
        );
        assert_eq!(
            routed("https://music.163.com/album?id=18915"),
            (Provider::NetEase, ResourceKind::Album)
        );
        assert_eq!(
            routed("https://music.163.com/#/playlist?id=2520739691"),
            (Provider::NetEase, ResourceKind::Playlist)
        );
    }

    #[test]
    fn test_route_qq() {
        assert_eq!(
            routed("https://y.qq.com/n/yqq/song/002Zkt5S2z8JZx.html"),
            (Provider::Qq, ResourceKind::Song)
        );
        assert_eq!(
            routed("https://y.qq.com/n/yqq/singer/0025NhlN2yWrP4.html"),
            (Provider::Qq, ResourceKind::Artist)
        );
        assert_eq!(
            routed("https://y.qq.com/n/yqq/album/002fRO0N4FftzY.html"),
            (Provider::Qq, ResourceKind::Album)
        );
        assert_eq!(
            routed("https://y.qq.com/n/yqq/playsquare/5474239760.html"),
            (Provider::Qq, ResourceKind::Playlist)
        );
        assert_eq!(
            routed("https://y.qq.com/n/yqq/playlist/5474239760.html"),
            (Provider::Qq, ResourceKind::Playlist)
        );
    }

    #[test]
    fn test_route_migu() {
        assert_eq!(
            routed("http://music.migu.cn/v3/music/song/63273402938"),
            (Provider::Migu, ResourceKind::Song)
        );
        assert_eq!(
            routed("http://music.migu.cn/v3/music/playlist/159248239"),
            (Provider::Migu, ResourceKind::Playlist)
        );
    }

    #[test]
    fn test_route_kugou_hash_and_html_forms() {
        assert_eq!(
            routed("https://www.kugou.com/song/#hash=0A8BAC4E4EC4B4C6C8C8D48F6B1D3D1F&album_id=1"),
            (Provider::Kugou, ResourceKind::Song)
        );
        assert_eq!(
            routed("https://www.kugou.com/singer/3060.html"),
            (Provider::Kugou, ResourceKind::Artist)
        );
        assert_eq!(
            routed("https://www.kugou.com/yy/album/single/979856.html"),
            (Provider::Kugou, ResourceKind::Album)
        );
        assert_eq!(
            routed("https://www.kugou.com/yy/special/single/547134.html"),
            (Provider::Kugou, ResourceKind::Playlist)
        );
    }

    #[test]
    fn test_route_kugou_song_without_hash_is_invalid() {
        let err = route("https://www.kugou.com/song/123.html").err().unwrap();
        assert!(matches!(
            err,
            RouteError::InvalidAddress {
                provider: Provider::Kugou,
                ..
            }
        ));
    }

    #[test]
    fn test_route_kuwo() {
        assert_eq!(
            routed("http://www.kuwo.cn/play_detail/228908"),
            (Provider::Kuwo, ResourceKind::Song)
        );
        assert_eq!(
            routed("http://www.kuwo.cn/singer_detail/336"),
            (Provider::Kuwo, ResourceKind::Artist)
        );
        assert_eq!(
            routed("http://www.kuwo.cn/album_detail/1234"),
            (Provider::Kuwo, ResourceKind::Album)
        );
        assert_eq!(
            routed("http://www.kuwo.cn/playlist_detail/2891238463"),
            (Provider::Kuwo, ResourceKind::Playlist)
        );
    }

    #[test]
    fn test_unknown_host_is_unsupported() {
        let err = route("https://open.spotify.com/track/abc").err().unwrap();
        assert!(matches!(err, RouteError::Unsupported { .. }));
        assert!(err.to_string().contains("unsupported music address"));
    }

    #[test]
    fn test_known_host_without_resource_is_invalid() {
        let err = route("https://music.163.com/#/discover").err().unwrap();
        assert!(matches!(
            err,
            RouteError::InvalidAddress {
                provider: Provider::NetEase,
                ..
            }
        ));
        assert!(err.to_string().contains("invalid netease music address"));
    }

    #[test]
    fn test_netease_id_overflow_is_invalid() {
        let err = route("https://music.163.com/#/song?id=99999999999999999999999")
            .err()
            .unwrap();
        assert!(matches!(err, RouteError::InvalidAddress { .. }));
    }
}
