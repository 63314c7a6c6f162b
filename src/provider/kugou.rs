//! Kugou Music (`www.kugou.com`).
//!
//! Metadata endpoints answer with `status == 1`. Songs are addressed by
//! content hash; playback URLs come from `trackercdn`, keyed by
//! `md5(hash + "kgcloudv2")`.

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{ApiError, MusicRequest, ProviderContext};
use crate::track::{Provider, ResourceKind, Tag, TrackDescriptor, container_dir};

const GET_SONG_URL: &str = "http://trackercdn.kugou.com/i/v2/?pid=2&behavior=play&cmd=25";
const GET_SONG: &str = "http://m.kugou.com/api/v1/song/get_song_info?cmd=playInfo";
const GET_ARTIST_INFO: &str = "http://mobilecdn.kugou.com/api/v3/singer/info";
const GET_ARTIST_SONGS: &str = "http://mobilecdn.kugou.com/api/v3/singer/song?page=1&pagesize=50";
const GET_ALBUM_INFO: &str = "http://mobilecdn.kugou.com/api/v3/album/info";
const GET_ALBUM_SONGS: &str = "http://mobilecdn.kugou.com/api/v3/album/song?page=1&pagesize=-1";
const GET_PLAYLIST_INFO: &str = "http://mobilecdn.kugou.com/api/v3/special/info";
const GET_PLAYLIST_SONGS: &str =
    "http://mobilecdn.kugou.com/api/v3/special/song?page=1&pagesize=-1";

const URL_KEY_SALT: &str = "kgcloudv2";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct Song {
    filename: String,
    extname: String,
    hash: String,
}

#[derive(Debug, Deserialize)]
struct SongResponse {
    #[serde(default)]
    status: i64,
    #[serde(default)]
    error: String,
    #[serde(default, rename = "fileName")]
    file_name: String,
    #[serde(default, rename = "extName")]
    ext_name: String,
    #[serde(default)]
    hash: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct InfoData {
    #[serde(alias = "singername", alias = "albumname", alias = "specialname")]
    name: String,
}

#[derive(Debug, Deserialize)]
struct InfoResponse {
    #[serde(default)]
    status: i64,
    #[serde(default)]
    error: String,
    #[serde(default)]
    data: InfoData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SongList {
    info: Vec<Song>,
}

#[derive(Debug, Deserialize)]
struct SongListResponse {
    #[serde(default)]
    status: i64,
    #[serde(default)]
    error: String,
    #[serde(default)]
    data: SongList,
}

#[derive(Debug, Deserialize)]
struct SongUrlResponse {
    #[serde(default)]
    status: i64,
    #[serde(default)]
    url: Vec<String>,
}

fn check_status(endpoint: &str, status: i64, error: &str) -> Result<(), ApiError> {
    if status == 1 {
        Ok(())
    } else {
        Err(ApiError::status(endpoint, status, error))
    }
}

fn url_key(hash: &str) -> String {
    format!("{:x}", md5::compute(format!("{hash}{URL_KEY_SALT}")))
}

/// Looks up the playback URL; `Ok(None)` when the platform refuses the song.
async fn song_url(ctx: &ProviderContext, hash: &str) -> Result<Option<String>, ApiError> {
    let key = url_key(hash);
    let response: SongUrlResponse = ctx
        .get_json(
            Provider::Kugou,
            GET_SONG_URL,
            &[("hash", hash), ("key", key.as_str())],
        )
        .await?;
    if response.status != 1 {
        debug!(hash, status = response.status, "song url refused");
        return Ok(None);
    }
    Ok(response.url.into_iter().find(|url| !url.is_empty()))
}

fn song_to_descriptor(song: &Song, save_path: &Path) -> TrackDescriptor {
    let name = song.filename.trim();
    let file_name = format!("{name}.{}", song.extname);
    // Kugou file names are "<artist> - <title>"
    let (artist, title) = name.split_once(" - ").unwrap_or(("", name));
    TrackDescriptor::new(Provider::Kugou, &file_name, save_path).with_tag(Tag {
        title: title.trim().to_string(),
        artist: artist.trim().to_string(),
        ..Tag::default()
    })
}

async fn extract_tracks(
    ctx: &ProviderContext,
    songs: &[Song],
    save_path: &Path,
) -> Result<Vec<TrackDescriptor>, ApiError> {
    if songs.is_empty() {
        return Err(ApiError::empty(GET_SONG, "songs"));
    }
    let mut tracks = Vec::with_capacity(songs.len());
    for song in songs {
        let mut track = song_to_descriptor(song, save_path);
        match song_url(ctx, &song.hash).await {
            Ok(Some(url)) => track.set_download_url(url),
            Ok(None) => {}
            Err(e) => {
                warn!(hash = %song.hash, error = %e, "song url lookup failed");
                track.playable = true;
            }
        }
        tracks.push(track);
    }
    Ok(tracks)
}

/// A single song, addressed by hash.
#[derive(Debug)]
pub struct SongRequest {
    hash: String,
    song: Option<Song>,
}

impl SongRequest {
    #[must_use]
    pub fn new(hash: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            song: None,
        }
    }
}

#[async_trait]
impl MusicRequest for SongRequest {
    fn provider(&self) -> Provider {
        Provider::Kugou
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Song
    }

    async fn execute(&mut self, ctx: &ProviderContext) -> Result<(), ApiError> {
        let response: SongResponse = ctx
            .get_json(Provider::Kugou, GET_SONG, &[("hash", self.hash.as_str())])
            .await?;
        check_status(GET_SONG, response.status, &response.error)?;
        if response.hash.is_empty() {
            return Err(ApiError::empty(GET_SONG, "song"));
        }
        self.song = Some(Song {
            filename: response.file_name,
            extname: response.ext_name,
            hash: response.hash,
        });
        Ok(())
    }

    async fn prepare(&mut self, ctx: &ProviderContext) -> Result<Vec<TrackDescriptor>, ApiError> {
        let songs: Vec<Song> = self.song.iter().cloned().collect();
        extract_tracks(ctx, &songs, Path::new(".")).await
    }
}

/// Endpoints of one collection kind.
#[derive(Debug, Clone, Copy)]
struct CollectionApi {
    kind: ResourceKind,
    id_param: &'static str,
    info: &'static str,
    songs: &'static str,
}

const ARTIST_API: CollectionApi = CollectionApi {
    kind: ResourceKind::Artist,
    id_param: "singerid",
    info: GET_ARTIST_INFO,
    songs: GET_ARTIST_SONGS,
};

const ALBUM_API: CollectionApi = CollectionApi {
    kind: ResourceKind::Album,
    id_param: "albumid",
    info: GET_ALBUM_INFO,
    songs: GET_ALBUM_SONGS,
};

const PLAYLIST_API: CollectionApi = CollectionApi {
    kind: ResourceKind::Playlist,
    id_param: "specialid",
    info: GET_PLAYLIST_INFO,
    songs: GET_PLAYLIST_SONGS,
};

/// Singer, album or special (playlist): an info call for the name, then a song list.
#[derive(Debug)]
pub struct CollectionRequest {
    api: CollectionApi,
    id: String,
    name: String,
    songs: Vec<Song>,
}

impl CollectionRequest {
    fn new(api: CollectionApi, id: String) -> Self {
        Self {
            api,
            id,
            name: String::new(),
            songs: Vec::new(),
        }
    }

    /// A singer's first 50 songs.
    #[must_use]
    pub fn artist(singer_id: impl Into<String>) -> Self {
        Self::new(ARTIST_API, singer_id.into())
    }

    #[must_use]
    pub fn album(album_id: impl Into<String>) -> Self {
        Self::new(ALBUM_API, album_id.into())
    }

    #[must_use]
    pub fn playlist(special_id: impl Into<String>) -> Self {
        Self::new(PLAYLIST_API, special_id.into())
    }
}

#[async_trait]
impl MusicRequest for CollectionRequest {
    fn provider(&self) -> Provider {
        Provider::Kugou
    }

    fn kind(&self) -> ResourceKind {
        self.api.kind
    }

    async fn execute(&mut self, ctx: &ProviderContext) -> Result<(), ApiError> {
        let query = [(self.api.id_param, self.id.as_str())];

        let info: InfoResponse = ctx.get_json(Provider::Kugou, self.api.info, &query).await?;
        check_status(self.api.info, info.status, &info.error)?;
        self.name = info.data.name;

        let list: SongListResponse = ctx.get_json(Provider::Kugou, self.api.songs, &query).await?;
        check_status(self.api.songs, list.status, &list.error)?;
        if list.data.info.is_empty() {
            return Err(ApiError::empty(self.api.songs, "songs"));
        }
        self.songs = list.data.info;
        Ok(())
    }

    async fn prepare(&mut self, ctx: &ProviderContext) -> Result<Vec<TrackDescriptor>, ApiError> {
        extract_tracks(ctx, &self.songs, &container_dir(&self.name)).await
    }
}
