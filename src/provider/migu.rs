//! Migu Music (`music.migu.cn`).
//!
//! Every endpoint answers with a string status `code` (or `returnCode`)
//! that must be `"000000"`. Playback URLs come from one `listen-url` call per
//! song, which only succeeds with the app channel header.

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::{ApiError, MusicRequest, ProviderContext};
use crate::track::{Provider, ResourceKind, Tag, TrackDescriptor, container_dir};

const GET_SONG_URL: &str =
    "https://app.c.nf.migu.cn/MIGUM2.0/v2.0/content/listen-url?netType=01&toneFlag=HQ";
const GET_SONG_ID: &str = "http://music.migu.cn/v3/api/music/audioPlayer/songs?type=1";
const GET_SONG: &str =
    "https://app.c.nf.migu.cn/MIGUM2.0/v2.0/content/querySongBySongId.do?contentId=0";
const GET_ARTIST_RESOURCE: &str =
    "https://app.c.nf.migu.cn/MIGUM2.0/v1.0/content/resourceinfo.do?needSimple=01&resourceType=2002";
const GET_ALBUM_RESOURCE: &str =
    "https://app.c.nf.migu.cn/MIGUM2.0/v1.0/content/resourceinfo.do?needSimple=01&resourceType=2003";
const GET_PLAYLIST_RESOURCE: &str =
    "https://app.c.nf.migu.cn/MIGUM2.0/v1.0/content/resourceinfo.do?needSimple=01&resourceType=2021";
const GET_ARTIST_SONGS: &str = "https://app.c.nf.migu.cn/MIGUM3.0/v1.0/template/singerSongs/release?pageNo=1&pageSize=50&templateVersion=2";

const SUCCESS_CODE: &str = "000000";
const CHANNEL: &str = "0146832";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Song {
    resource_type: String,
    content_id: String,
    copyright_id: String,
    song_name: String,
    singer: String,
    album: String,
    album_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Collection {
    title: String,
    song_items: Vec<Song>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ArtistResource {
    singer: String,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct ResourceResponse<T> {
    #[serde(default)]
    code: String,
    #[serde(default)]
    info: String,
    #[serde(default)]
    resource: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SongIdItem {
    #[serde(rename = "songId")]
    song_id: String,
}

#[derive(Debug, Deserialize)]
struct SongIdResponse {
    #[serde(default, rename = "returnCode")]
    return_code: String,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    items: Vec<SongIdItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ArtistSongItem {
    song: Option<Song>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ContentItem {
    #[serde(rename = "itemList")]
    item_list: Vec<ArtistSongItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ArtistSongsData {
    #[serde(rename = "contentItemList")]
    content_item_list: Vec<ContentItem>,
}

#[derive(Debug, Deserialize)]
struct ArtistSongsResponse {
    #[serde(default)]
    code: String,
    #[serde(default)]
    info: String,
    #[serde(default)]
    data: ArtistSongsData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SongUrlData {
    url: String,
}

#[derive(Debug, Deserialize)]
struct SongUrlResponse {
    #[serde(default)]
    code: String,
    #[serde(default)]
    info: String,
    #[serde(default)]
    data: SongUrlData,
}

fn check_code(endpoint: &str, code: &str, info: &str) -> Result<(), ApiError> {
    if code == SUCCESS_CODE {
        Ok(())
    } else {
        Err(ApiError::status(endpoint, code, info))
    }
}

async fn resource<T: DeserializeOwned>(
    ctx: &ProviderContext,
    endpoint: &str,
    id: &str,
    what: &str,
) -> Result<T, ApiError> {
    let response: ResourceResponse<T> = ctx
        .get_json(Provider::Migu, endpoint, &[("resourceId", id)])
        .await?;
    check_code(endpoint, &response.code, &response.info)?;
    response
        .resource
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::empty(endpoint, what))
}

async fn song_url(ctx: &ProviderContext, song: &Song) -> Result<String, ApiError> {
    let response: SongUrlResponse = ctx
        .get_json_with_headers(
            Provider::Migu,
            GET_SONG_URL,
            &[
                ("albumId", song.album_id.as_str()),
                ("contentId", song.content_id.as_str()),
                ("copyrightId", song.copyright_id.as_str()),
                ("lowerQualityContentId", song.content_id.as_str()),
                ("resourceType", song.resource_type.as_str()),
            ],
            &[("channel", CHANNEL)],
        )
        .await?;
    check_code(GET_SONG_URL, &response.code, &response.info)?;
    Ok(response.data.url)
}

fn song_to_descriptor(song: &Song, save_path: &Path) -> TrackDescriptor {
    let title = song.song_name.trim();
    let artist = song.singer.replace('|', " ");
    TrackDescriptor::new(Provider::Migu, &format!("{artist} - {title}.mp3"), save_path).with_tag(
        Tag {
            title: title.to_string(),
            artist: song.singer.replace('|', "/"),
            album: song.album.trim().to_string(),
            ..Tag::default()
        },
    )
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
        match song_url(ctx, song).await {
            Ok(url) => track.set_download_url(url),
            Err(e) => {
                warn!(copyright_id = %song.copyright_id, error = %e, "song url lookup failed");
                track.playable = true;
            }
        }
        tracks.push(track);
    }
    Ok(tracks)
}

/// A single song, addressed by copyright id.
#[derive(Debug)]
pub struct SongRequest {
    copyright_id: String,
    songs: Vec<Song>,
}

impl SongRequest {
    #[must_use]
    pub fn new(copyright_id: impl Into<String>) -> Self {
        Self {
            copyright_id: copyright_id.into(),
            songs: Vec::new(),
        }
    }
}

#[async_trait]
impl MusicRequest for SongRequest {
    fn provider(&self) -> Provider {
        Provider::Migu
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Song
    }

    async fn execute(&mut self, ctx: &ProviderContext) -> Result<(), ApiError> {
        let ids: SongIdResponse = ctx
            .get_json(
                Provider::Migu,
                GET_SONG_ID,
                &[("copyrightId", self.copyright_id.as_str())],
            )
            .await?;
        check_code(GET_SONG_ID, &ids.return_code, &ids.msg)?;
        let song_id = ids
            .items
            .into_iter()
            .map(|item| item.song_id)
            .find(|id| !id.is_empty())
            .ok_or_else(|| ApiError::empty(GET_SONG_ID, "song id"))?;
        debug!(%song_id, "resolved copyright id");

        let response: ResourceResponse<Song> = ctx
            .get_json(Provider::Migu, GET_SONG, &[("songId", song_id.as_str())])
            .await?;
        check_code(GET_SONG, &response.code, &response.info)?;
        if response.resource.is_empty() {
            return Err(ApiError::empty(GET_SONG, "songs"));
        }
        self.songs = response.resource;
        Ok(())
    }

    async fn prepare(&mut self, ctx: &ProviderContext) -> Result<Vec<TrackDescriptor>, ApiError> {
        extract_tracks(ctx, &self.songs, Path::new(".")).await
    }
}

/// An artist's 50 latest released songs.
#[derive(Debug)]
pub struct ArtistRequest {
    singer_id: String,
    singer: String,
    songs: Vec<Song>,
}

impl ArtistRequest {
    #[must_use]
    pub fn new(singer_id: impl Into<String>) -> Self {
        Self {
            singer_id: singer_id.into(),
            singer: String::new(),
            songs: Vec::new(),
        }
    }
}

#[async_trait]
impl MusicRequest for ArtistRequest {
    fn provider(&self) -> Provider {
        Provider::Migu
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Artist
    }

    async fn execute(&mut self, ctx: &ProviderContext) -> Result<(), ApiError> {
        let artist: ArtistResource =
            resource(ctx, GET_ARTIST_RESOURCE, &self.singer_id, "artist").await?;
        self.singer = artist.singer;

        let response: ArtistSongsResponse = ctx
            .get_json(
                Provider::Migu,
                GET_ARTIST_SONGS,
                &[("singerId", self.singer_id.as_str())],
            )
            .await?;
        check_code(GET_ARTIST_SONGS, &response.code, &response.info)?;

        // releases alternate song and non-song items
        let songs: Vec<Song> = response
            .data
            .content_item_list
            .into_iter()
            .next()
            .map(|list| {
                list.item_list
                    .into_iter()
                    .step_by(2)
                    .filter_map(|item| item.song)
                    .collect()
            })
            .unwrap_or_default();
        if songs.is_empty() {
            return Err(ApiError::empty(GET_ARTIST_SONGS, "artist songs"));
        }
        self.songs = songs;
        Ok(())
    }

    async fn prepare(&mut self, ctx: &ProviderContext) -> Result<Vec<TrackDescriptor>, ApiError> {
        extract_tracks(ctx, &self.songs, &container_dir(&self.singer)).await
    }
}

/// Album or playlist; both are resource-info collections.
#[derive(Debug)]
struct CollectionRequest {
    id: String,
    endpoint: &'static str,
    collection: Collection,
}

impl CollectionRequest {
    fn new(id: String, endpoint: &'static str) -> Self {
        Self {
            id,
            endpoint,
            collection: Collection::default(),
        }
    }

    async fn execute(&mut self, ctx: &ProviderContext, what: &str) -> Result<(), ApiError> {
        let collection: Collection = resource(ctx, self.endpoint, &self.id, what).await?;
        if collection.song_items.is_empty() {
            return Err(ApiError::empty(self.endpoint, "songs"));
        }
        self.collection = collection;
        Ok(())
    }

    async fn prepare(&self, ctx: &ProviderContext) -> Result<Vec<TrackDescriptor>, ApiError> {
        extract_tracks(
            ctx,
            &self.collection.song_items,
            &container_dir(&self.collection.title),
        )
        .await
    }
}

/// An album, addressed by album id.
#[derive(Debug)]
pub struct AlbumRequest(CollectionRequest);

impl AlbumRequest {
    #[must_use]
    pub fn new(album_id: impl Into<String>) -> Self {
        Self(CollectionRequest::new(album_id.into(), GET_ALBUM_RESOURCE))
    }
}

#[async_trait]
impl MusicRequest for AlbumRequest {
    fn provider(&self) -> Provider {
        Provider::Migu
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Album
    }

    async fn execute(&mut self, ctx: &ProviderContext) -> Result<(), ApiError> {
        self.0.execute(ctx, "album").await
    }

    async fn prepare(&mut self, ctx: &ProviderContext) -> Result<Vec<TrackDescriptor>, ApiError> {
        self.0.prepare(ctx).await
    }
}

/// A playlist, addressed by playlist id.
#[derive(Debug)]
pub struct PlaylistRequest(CollectionRequest);

impl PlaylistRequest {
    #[must_use]
    pub fn new(playlist_id: impl Into<String>) -> Self {
        Self(CollectionRequest::new(playlist_id.into(), GET_PLAYLIST_RESOURCE))
    }
}

#[async_trait]
impl MusicRequest for PlaylistRequest {
    fn provider(&self) -> Provider {
        Provider::Migu
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Playlist
    }

    async fn execute(&mut self, ctx: &ProviderContext) -> Result<(), ApiError> {
        self.0.execute(ctx, "playlist").await
    }

    async fn prepare(&mut self, ctx: &ProviderContext) -> Result<Vec<TrackDescriptor>, ApiError> {
        self.0.prepare(ctx).await
    }
}
