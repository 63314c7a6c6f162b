//! weapi request parameters and response envelopes.

use serde::{Deserialize, Serialize};

/// Status fields shared by every weapi response.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct Status {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl Status {
    pub fn message(&self) -> &str {
        self.msg
            .as_deref()
            .or(self.message.as_deref())
            .unwrap_or("")
    }
}

pub(crate) trait Envelope {
    fn status(&self) -> &Status;
}

macro_rules! impl_envelope {
    ($($ty:ty),*) => {
        $(impl Envelope for $ty {
            fn status(&self) -> &Status {
                &self.status
            }
        })*
    };
}

impl_envelope!(
    SongUrlResponse,
    SongDetailResponse,
    ArtistResponse,
    AlbumResponse,
    PlaylistResponse,
    LoginResponse
);

#[derive(Debug, Serialize)]
pub(crate) struct SongUrlParams {
    /// JSON-encoded id list, e.g. `"[1,2]"`.
    pub ids: String,
    pub br: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SongUrlResponse {
    #[serde(flatten)]
    pub status: Status,
    #[serde(default)]
    pub data: Vec<SongUrl>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SongUrl {
    pub id: u64,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub code: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct SongDetailParams {
    /// JSON-encoded `[{"id":n}, ...]`.
    pub c: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SongDetailResponse {
    #[serde(flatten)]
    pub status: Status,
    #[serde(default)]
    pub songs: Vec<Song>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Song {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub ar: Vec<Artist>,
    #[serde(default)]
    pub al: Album,
    #[serde(default)]
    pub no: u32,
    #[serde(default, rename = "publishTime")]
    pub publish_time: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct Artist {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct Album {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "picUrl", alias = "picURL")]
    pub pic_url: Option<String>,
    #[serde(default, rename = "publishTime")]
    pub publish_time: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct EmptyParams {}

#[derive(Debug, Deserialize)]
pub(crate) struct ArtistResponse {
    #[serde(flatten)]
    pub status: Status,
    #[serde(default)]
    pub artist: Artist,
    #[serde(default, rename = "hotSongs")]
    pub hot_songs: Vec<Song>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AlbumResponse {
    #[serde(flatten)]
    pub status: Status,
    #[serde(default)]
    pub songs: Vec<Song>,
    #[serde(default)]
    pub album: Album,
}

#[derive(Debug, Serialize)]
pub(crate) struct PlaylistParams {
    pub id: u64,
    pub n: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PlaylistResponse {
    #[serde(flatten)]
    pub status: Status,
    #[serde(default)]
    pub playlist: Playlist,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Playlist {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "trackIds")]
    pub track_ids: Vec<TrackId>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TrackId {
    pub id: u64,
}

#[derive(Serialize)]
pub(crate) struct LoginParams<'a> {
    pub phone: &'a str,
    /// Lowercase hex md5 of the password.
    pub password: String,
    #[serde(rename = "rememberLogin")]
    pub remember_login: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginResponse {
    #[serde(flatten)]
    pub status: Status,
}
