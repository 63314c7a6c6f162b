//! Kuwo Music (`www.kuwo.cn`).
//!
//! JSON `code` must be 200. Playback URLs come from one `convert_url3` call
//! per song, addressed by `rid`, at the preferred bitrate.

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{ApiError, Bitrate, MusicRequest, ProviderContext};
use crate::track::{
    Provider, ResourceKind, Tag, TrackDescriptor, container_dir, year_from_date,
};

const GET_SONG_URL: &str =
    "http://www.kuwo.cn/url?format=mp3&response=url&type=convert_url3";
const GET_SONG: &str = "http://www.kuwo.cn/api/www/music/musicInfo";
const GET_ARTIST_INFO: &str = "http://www.kuwo.cn/api/www/artist/artist";
const GET_ARTIST_SONGS: &str = "http://www.kuwo.cn/api/www/artist/artistMusic?pn=1&rn=50";
const GET_ALBUM: &str = "http://www.kuwo.cn/api/www/album/albumInfo?pn=1&rn=9999";
const GET_PLAYLIST: &str = "http://www.kuwo.cn/api/www/playlist/playListInfo?pn=1&rn=9999";

const SUCCESS_CODE: i64 = 200;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct Song {
    rid: u64,
    name: String,
    artist: String,
    album: String,
    #[serde(rename = "albumpic")]
    album_pic: String,
    #[serde(rename = "releaseDate")]
    release_date: String,
    track: u32,
}

#[derive(Debug, Deserialize)]
struct Response<T> {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    msg: String,
    data: Option<T>,
}

impl<T> Response<T> {
    fn into_data(self, endpoint: &str) -> Result<T, ApiError> {
        if self.code != SUCCESS_CODE {
            return Err(ApiError::status(endpoint, self.code, self.msg));
        }
        self.data.ok_or_else(|| ApiError::empty(endpoint, "data"))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ArtistInfo {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ArtistSongs {
    list: Vec<Song>,
}

/// Album and playlist payloads share this shape.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Collection {
    #[serde(alias = "album")]
    name: String,
    #[serde(rename = "musicList")]
    music_list: Vec<Song>,
}

#[derive(Debug, Deserialize)]
struct SongUrlResponse {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    url: String,
}

/// Value of the `br` query parameter.
fn bitrate_param(bitrate: Bitrate) -> String {
    format!("{}kmp3", bitrate.kbps().unwrap_or(320))
}

/// Looks up the playback URL; `Ok(None)` when the platform refuses the song.
async fn song_url(ctx: &ProviderContext, rid: u64) -> Result<Option<String>, ApiError> {
    let rid = rid.to_string();
    let br = bitrate_param(ctx.bitrate());
    let response: SongUrlResponse = ctx
        .get_json(
            Provider::Kuwo,
            GET_SONG_URL,
            &[("rid", rid.as_str()), ("br", br.as_str())],
        )
        .await?;
    if response.code != SUCCESS_CODE || response.url.is_empty() {
        debug!(%rid, code = response.code, "song url refused");
        return Ok(None);
    }
    Ok(Some(response.url))
}

fn song_to_descriptor(song: &Song, save_path: &Path) -> TrackDescriptor {
    let title = song.name.trim();
    let artist = song.artist.trim();
    TrackDescriptor::new(Provider::Kuwo, &format!("{artist} - {title}.mp3"), save_path).with_tag(
        Tag {
            title: title.to_string(),
            artist: artist.replace('&', "/"),
            album: song.album.trim().to_string(),
            year: year_from_date(&song.release_date),
            track_number: (song.track > 0).then_some(song.track),
            cover_image_url: (!song.album_pic.is_empty()).then(|| song.album_pic.clone()),
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
        match song_url(ctx, song.rid).await {
            Ok(Some(url)) => track.set_download_url(url),
            Ok(None) => {}
            Err(e) => {
                warn!(rid = song.rid, error = %e, "song url lookup failed");
                track.playable = true;
            }
        }
        tracks.push(track);
    }
    Ok(tracks)
}

/// A single song, addressed by its play-detail id.
#[derive(Debug)]
pub struct SongRequest {
    mid: String,
    song: Option<Song>,
}

impl SongRequest {
    #[must_use]
    pub fn new(mid: impl Into<String>) -> Self {
        Self {
            mid: mid.into(),
            song: None,
        }
    }
}

#[async_trait]
impl MusicRequest for SongRequest {
    fn provider(&self) -> Provider {
        Provider::Kuwo
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Song
    }

    async fn execute(&mut self, ctx: &ProviderContext) -> Result<(), ApiError> {
        let response: Response<Song> = ctx
            .get_json(Provider::Kuwo, GET_SONG, &[("mid", self.mid.as_str())])
            .await?;
        self.song = Some(response.into_data(GET_SONG)?);
        Ok(())
    }

    async fn prepare(&mut self, ctx: &ProviderContext) -> Result<Vec<TrackDescriptor>, ApiError> {
        let songs: Vec<Song> = self.song.iter().cloned().collect();
        extract_tracks(ctx, &songs, Path::new(".")).await
    }
}

/// An artist's first 50 songs.
#[derive(Debug)]
pub struct ArtistRequest {
    artist_id: String,
    name: String,
    songs: Vec<Song>,
}

impl ArtistRequest {
    #[must_use]
    pub fn new(artist_id: impl Into<String>) -> Self {
        Self {
            artist_id: artist_id.into(),
            name: String::new(),
            songs: Vec::new(),
        }
    }
}

#[async_trait]
impl MusicRequest for ArtistRequest {
    fn provider(&self) -> Provider {
        Provider::Kuwo
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Artist
    }

    async fn execute(&mut self, ctx: &ProviderContext) -> Result<(), ApiError> {
        let query = [("artistid", self.artist_id.as_str())];

        let info: Response<ArtistInfo> =
            ctx.get_json(Provider::Kuwo, GET_ARTIST_INFO, &query).await?;
        self.name = info.into_data(GET_ARTIST_INFO)?.name;

        let songs: Response<ArtistSongs> =
            ctx.get_json(Provider::Kuwo, GET_ARTIST_SONGS, &query).await?;
        let songs = songs.into_data(GET_ARTIST_SONGS)?.list;
        if songs.is_empty() {
            return Err(ApiError::empty(GET_ARTIST_SONGS, "artist songs"));
        }
        self.songs = songs;
        Ok(())
    }

    async fn prepare(&mut self, ctx: &ProviderContext) -> Result<Vec<TrackDescriptor>, ApiError> {
        extract_tracks(ctx, &self.songs, &container_dir(&self.name)).await
    }
}

/// Album (`albumId`) or playlist (`pid`).
#[derive(Debug)]
pub struct CollectionRequest {
    kind: ResourceKind,
    endpoint: &'static str,
    id_param: &'static str,
    id: String,
    collection: Collection,
}

impl CollectionRequest {
    #[must_use]
    pub fn album(album_id: impl Into<String>) -> Self {
        Self {
            kind: ResourceKind::Album,
            endpoint: GET_ALBUM,
            id_param: "albumId",
            id: album_id.into(),
            collection: Collection::default(),
        }
    }

    #[must_use]
    pub fn playlist(pid: impl Into<String>) -> Self {
        Self {
            kind: ResourceKind::Playlist,
            endpoint: GET_PLAYLIST,
            id_param: "pid",
            id: pid.into(),
            collection: Collection::default(),
        }
    }
}

#[async_trait]
impl MusicRequest for CollectionRequest {
    fn provider(&self) -> Provider {
        Provider::Kuwo
    }

    fn kind(&self) -> ResourceKind {
        self.kind
    }

    async fn execute(&mut self, ctx: &ProviderContext) -> Result<(), ApiError> {
        let response: Response<Collection> = ctx
            .get_json(Provider::Kuwo, self.endpoint, &[(self.id_param, self.id.as_str())])
            .await?;
        let collection = response.into_data(self.endpoint)?;
        if collection.music_list.is_empty() {
            return Err(ApiError::empty(self.endpoint, "songs"));
        }
        self.collection = collection;
        Ok(())
    }

    async fn prepare(&mut self, ctx: &ProviderContext) -> Result<Vec<TrackDescriptor>, ApiError> {
        extract_tracks(
            ctx,
            &self.collection.music_list,
            &container_dir(&self.collection.name),
        )
        .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_bitrate_param() {
        assert_eq!(bitrate_param(Bitrate::Kbps128), "128kmp3");
        assert_eq!(bitrate_param(Bitrate::Kbps320), "320kmp3");
        assert_eq!(bitrate_param(Bitrate::Highest), "320kmp3");
    }

    #[test]
    fn test_response_requires_code_200() {
        let ok: Response<ArtistInfo> =
            serde_json::from_str(r#"{"code":200,"data":{"name":"A"}}"#).unwrap();
        assert_eq!(ok.into_data("e").unwrap().name, "A");

        let err: Response<ArtistInfo> =
            serde_json::from_str(r#"{"code":-1,"msg":"fail"}"#).unwrap();
        assert!(err.into_data("e").unwrap_err().to_string().contains("fail"));

        let missing: Response<ArtistInfo> = serde_json::from_str(r#"{"code":200}"#).unwrap();
        assert!(missing.into_data("e").is_err());
    }

    #[test]
    fn test_album_name_alias() {
        let album: Collection =
            serde_json::from_str(r#"{"album":"范特西","musicList":[{"rid":1,"name":"x"}]}"#)
                .unwrap();
        assert_eq!(album.name, "范特西");
        assert_eq!(album.music_list[0].rid, 1);
    }

    #[test]
    fn test_descriptor_fields() {
        let song: Song = serde_json::from_str(
            r#"{"rid":228908,"name":"晴天","artist":"周杰伦","album":"叶惠美",
                "releaseDate":"2003-07-31","track":3,"albumpic":"http://img/x.jpg"}"#,
        )
        .unwrap();
        let track = song_to_descriptor(&song, Path::new("."));
        assert_eq!(track.file_name, "周杰伦 - 晴天.mp3");
        let tag = track.tag.unwrap();
        assert_eq!(tag.year, Some(2003));
        assert_eq!(tag.track_number, Some(3));
        assert_eq!(tag.cover_image_url.as_deref(), Some("http://img/x.jpg"));
    }
}
