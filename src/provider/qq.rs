//! QQ Music (`y.qq.com`).
//!
//! Metadata comes from the legacy `c.y.qq.com` fcg endpoints (JSON
//! `code == 0`). Media URLs need a vkey from `musicu.fcg`, fetched for at
//! most [`VKEY_BATCH_SIZE`] song mids per call through the batch resolver.
//! A per-song vkey is preferred; the `testfile2g` vkey of the same batch is
//! the fallback.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::{ApiError, MusicRequest, ProviderContext, resolve_in_batches};
use crate::router::compile_static_regex;
use crate::track::{
    Provider, ResourceKind, Tag, TrackDescriptor, container_dir, join_artists, year_from_date,
};

const GET_SONG_URL: &str = "https://u.y.qq.com/cgi-bin/musicu.fcg";
const GET_SONG: &str = "https://c.y.qq.com/v8/fcg-bin/fcg_play_single_song.fcg";
const GET_ARTIST: &str = "https://c.y.qq.com/v8/fcg-bin/fcg_v8_singer_track_cp.fcg";
const GET_ALBUM: &str = "https://c.y.qq.com/v8/fcg-bin/fcg_v8_album_detail_cp.fcg";
const GET_PLAYLIST: &str = "https://c.y.qq.com/v8/fcg-bin/fcg_v8_playlist_cp.fcg";

const ALBUM_PIC_URL: &str = "https://y.gtimg.cn/music/photo_new/T002R300x300M000";
const DOWNLOAD_URL: &str = "http://aqqmusic.tc.qq.com/amobile.music.tc.qq.com/M500";
const GUID: &str = "7332953645";

/// Maximum number of song mids per vkey lookup.
pub const VKEY_BATCH_SIZE: usize = 10;

/// `action.switch` value the platform uses for tracks without rights.
const SWITCH_NO_RIGHTS: i64 = 65537;

static VKEY_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"vkey=(\w+)"));

#[derive(Debug, Clone, Default, Deserialize)]
struct Singer {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Album {
    #[serde(default)]
    mid: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Action {
    #[serde(default)]
    switch: i64,
}

#[derive(Debug, Clone, Deserialize)]
struct Song {
    #[serde(default)]
    mid: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    singer: Vec<Singer>,
    #[serde(default)]
    album: Album,
    #[serde(default)]
    index_album: u32,
    #[serde(default)]
    time_public: String,
    #[serde(default)]
    action: Action,
}

#[derive(Debug, Deserialize)]
struct SongResponse {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    data: Vec<Song>,
}

#[derive(Debug, Deserialize)]
struct SingerTrack {
    #[serde(rename = "musicData")]
    music_data: Song,
}

#[derive(Debug, Default, Deserialize)]
struct SingerData {
    #[serde(default)]
    list: Vec<SingerTrack>,
    #[serde(default)]
    singer_name: String,
}

#[derive(Debug, Deserialize)]
struct SingerResponse {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    data: SingerData,
}

#[derive(Debug, Default, Deserialize)]
struct AlbumInfo {
    #[serde(default, rename = "Falbum_name")]
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct AlbumData {
    #[serde(default, rename = "getAlbumInfo")]
    info: AlbumInfo,
    #[serde(default, rename = "getSongInfo")]
    songs: Vec<Song>,
}

#[derive(Debug, Deserialize)]
struct AlbumResponse {
    #[serde(default, alias = "Code")]
    code: i64,
    #[serde(default)]
    data: AlbumData,
}

#[derive(Debug, Deserialize)]
struct Cd {
    #[serde(default)]
    dissname: String,
    #[serde(default)]
    songlist: Vec<Song>,
}

#[derive(Debug, Default, Deserialize)]
struct PlaylistData {
    #[serde(default)]
    cdlist: Vec<Cd>,
}

#[derive(Debug, Deserialize)]
struct PlaylistResponse {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    data: PlaylistData,
}

#[derive(Debug, Deserialize)]
struct MidUrlInfo {
    #[serde(default)]
    songmid: String,
    #[serde(default)]
    vkey: String,
}

#[derive(Debug, Default, Deserialize)]
struct VkeyData {
    #[serde(default)]
    midurlinfo: Vec<MidUrlInfo>,
    #[serde(default)]
    testfile2g: String,
}

#[derive(Debug, Default, Deserialize)]
struct VkeyReq {
    #[serde(default)]
    data: VkeyData,
}

#[derive(Debug, Deserialize)]
struct VkeyResponse {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    req0: VkeyReq,
}

fn check_code(endpoint: &str, code: i64) -> Result<(), ApiError> {
    if code == 0 {
        Ok(())
    } else {
        Err(ApiError::status(endpoint, code, "non-zero status"))
    }
}

/// Resolves a vkey for every mid, batch by batch.
async fn fetch_vkeys(
    ctx: &ProviderContext,
    mids: &[String],
) -> Result<HashMap<String, String>, ApiError> {
    let pairs = resolve_in_batches(mids, VKEY_BATCH_SIZE, |chunk| async move {
        let data = json!({
            "req0": {
                "module": "vkey.GetVkeyServer",
                "method": "CgiGetVkey",
                "param": {
                    "guid": GUID,
                    "loginflag": 1,
                    "songmid": chunk,
                    "uin": "0",
                    "platform": "20",
                },
            },
        })
        .to_string();
        let response: VkeyResponse = ctx
            .get_json(Provider::Qq, GET_SONG_URL, &[("data", data.as_str())])
            .await?;
        check_code(GET_SONG_URL, response.code)?;

        let fallback = VKEY_RE
            .captures(&response.req0.data.testfile2g)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string());
        let per_song: HashMap<String, String> = response
            .req0
            .data
            .midurlinfo
            .into_iter()
            .filter(|info| !info.vkey.is_empty())
            .map(|info| (info.songmid, info.vkey))
            .collect();

        Ok(chunk
            .into_iter()
            .filter_map(|mid| {
                let vkey = per_song.get(&mid).cloned().or_else(|| fallback.clone())?;
                Some((mid, vkey))
            })
            .collect::<Vec<_>>())
    })
    .await?;
    Ok(pairs.into_iter().collect())
}

fn song_to_descriptor(song: &Song, save_path: PathBuf) -> TrackDescriptor {
    let title = song.title.trim();
    let names = || song.singer.iter().map(|s| s.name.as_str());
    let file_name = format!("{} - {title}.mp3", join_artists(names(), " "));
    TrackDescriptor::new(Provider::Qq, &file_name, save_path).with_tag(Tag {
        title: title.to_string(),
        artist: join_artists(names(), "/"),
        album: song.album.name.trim().to_string(),
        year: year_from_date(&song.time_public),
        track_number: (song.index_album > 0).then_some(song.index_album),
        cover_image_url: (!song.album.mid.is_empty())
            .then(|| format!("{ALBUM_PIC_URL}{}.jpg", song.album.mid)),
    })
}

fn download_url(mid: &str, vkey: &str) -> String {
    format!("{DOWNLOAD_URL}{mid}.mp3?guid={GUID}&vkey={vkey}&uin=0&fromtag=8")
}

async fn extract_tracks(
    ctx: &ProviderContext,
    songs: &[Song],
    save_path: &Path,
) -> Result<Vec<TrackDescriptor>, ApiError> {
    if songs.is_empty() {
        return Err(ApiError::empty(GET_SONG_URL, "songs"));
    }
    let mids: Vec<String> = songs.iter().map(|s| s.mid.clone()).collect();
    let vkeys = fetch_vkeys(ctx, &mids).await?;

    Ok(songs
        .iter()
        .map(|song| {
            if song.action.switch == SWITCH_NO_RIGHTS {
                // flag is unreliable; the download status decides
                debug!(mid = %song.mid, "song flagged without rights");
            }
            let mut track = song_to_descriptor(song, save_path.to_path_buf());
            match vkeys.get(&song.mid) {
                Some(vkey) => track.set_download_url(download_url(&song.mid, vkey)),
                None => debug!(mid = %song.mid, "no vkey, marking unplayable"),
            }
            track
        })
        .collect())
}

/// A single song, addressed by mid.
#[derive(Debug)]
pub struct SongRequest {
    mid: String,
    songs: Vec<Song>,
}

impl SongRequest {
    #[must_use]
    pub fn new(mid: impl Into<String>) -> Self {
        Self {
            mid: mid.into(),
            songs: Vec::new(),
        }
    }
}

#[async_trait]
impl MusicRequest for SongRequest {
    fn provider(&self) -> Provider {
        Provider::Qq
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Song
    }

    async fn execute(&mut self, ctx: &ProviderContext) -> Result<(), ApiError> {
        let response: SongResponse = ctx
            .get_json(
                Provider::Qq,
                GET_SONG,
                &[("songmid", self.mid.as_str()), ("platform", "yqq"), ("format", "json")],
            )
            .await?;
        check_code(GET_SONG, response.code)?;
        if response.data.is_empty() {
            return Err(ApiError::empty(GET_SONG, "songs"));
        }
        self.songs = response.data;
        Ok(())
    }

    async fn prepare(&mut self, ctx: &ProviderContext) -> Result<Vec<TrackDescriptor>, ApiError> {
        extract_tracks(ctx, &self.songs, Path::new(".")).await
    }
}

/// A singer's 50 most listened songs.
#[derive(Debug)]
pub struct ArtistRequest {
    mid: String,
    data: SingerData,
}

impl ArtistRequest {
    #[must_use]
    pub fn new(mid: impl Into<String>) -> Self {
        Self {
            mid: mid.into(),
            data: SingerData::default(),
        }
    }
}

#[async_trait]
impl MusicRequest for ArtistRequest {
    fn provider(&self) -> Provider {
        Provider::Qq
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Artist
    }

    async fn execute(&mut self, ctx: &ProviderContext) -> Result<(), ApiError> {
        let response: SingerResponse = ctx
            .get_json(
                Provider::Qq,
                GET_ARTIST,
                &[
                    ("singermid", self.mid.as_str()),
                    ("begin", "0"),
                    ("num", "50"),
                    ("order", "listen"),
                    ("newsong", "1"),
                    ("platform", "yqq"),
                ],
            )
            .await?;
        check_code(GET_ARTIST, response.code)?;
        if response.data.list.is_empty() {
            return Err(ApiError::empty(GET_ARTIST, "artist songs"));
        }
        self.data = response.data;
        Ok(())
    }

    async fn prepare(&mut self, ctx: &ProviderContext) -> Result<Vec<TrackDescriptor>, ApiError> {
        let songs: Vec<Song> = self.data.list.iter().map(|t| t.music_data.clone()).collect();
        extract_tracks(ctx, &songs, &container_dir(&self.data.singer_name)).await
    }
}

/// An album, addressed by mid.
#[derive(Debug)]
pub struct AlbumRequest {
    mid: String,
    data: AlbumData,
}

impl AlbumRequest {
    #[must_use]
    pub fn new(mid: impl Into<String>) -> Self {
        Self {
            mid: mid.into(),
            data: AlbumData::default(),
        }
    }
}

#[async_trait]
impl MusicRequest for AlbumRequest {
    fn provider(&self) -> Provider {
        Provider::Qq
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Album
    }

    async fn execute(&mut self, ctx: &ProviderContext) -> Result<(), ApiError> {
        let response: AlbumResponse = ctx
            .get_json(
                Provider::Qq,
                GET_ALBUM,
                &[
                    ("albummid", self.mid.as_str()),
                    ("newsong", "1"),
                    ("platform", "yqq"),
                    ("format", "json"),
                ],
            )
            .await?;
        check_code(GET_ALBUM, response.code)?;
        if response.data.songs.is_empty() {
            return Err(ApiError::empty(GET_ALBUM, "album songs"));
        }
        self.data = response.data;
        Ok(())
    }

    async fn prepare(&mut self, ctx: &ProviderContext) -> Result<Vec<TrackDescriptor>, ApiError> {
        extract_tracks(ctx, &self.data.songs, &container_dir(&self.data.info.name)).await
    }
}

/// A playlist (`playsquare` or `playlist` page); every CD contributes songs.
#[derive(Debug)]
pub struct PlaylistRequest {
    id: String,
    cds: Vec<Cd>,
}

impl PlaylistRequest {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            cds: Vec::new(),
        }
    }
}

#[async_trait]
impl MusicRequest for PlaylistRequest {
    fn provider(&self) -> Provider {
        Provider::Qq
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Playlist
    }

    async fn execute(&mut self, ctx: &ProviderContext) -> Result<(), ApiError> {
        let response: PlaylistResponse = ctx
            .get_json(
                Provider::Qq,
                GET_PLAYLIST,
                &[
                    ("id", self.id.as_str()),
                    ("newsong", "1"),
                    ("platform", "yqq"),
                    ("format", "json"),
                ],
            )
            .await?;
        check_code(GET_PLAYLIST, response.code)?;
        if response.data.cdlist.is_empty() {
            return Err(ApiError::empty(GET_PLAYLIST, "playlist"));
        }
        self.cds = response.data.cdlist;
        Ok(())
    }

    async fn prepare(&mut self, ctx: &ProviderContext) -> Result<Vec<TrackDescriptor>, ApiError> {
        let mut tracks = Vec::new();
        let mut last_error = None;
        for cd in &self.cds {
            match extract_tracks(ctx, &cd.songlist, &container_dir(&cd.dissname)).await {
                Ok(mut cd_tracks) => tracks.append(&mut cd_tracks),
                Err(e) => {
                    warn!(playlist = %cd.dissname, error = %e, "skipping playlist cd");
                    last_error = Some(e);
                }
            }
        }
        match last_error {
            Some(e) if tracks.is_empty() => Err(e),
            _ => Ok(tracks),
        }
    }
}
