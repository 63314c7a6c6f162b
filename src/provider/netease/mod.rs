//! NetEase Cloud Music (`music.163.com`).
//!
//! Every call goes to the weapi endpoints as a signed POST (see [`crypto`])
//! and must answer with JSON `code == 200`. All resources require a logged-in
//! session (an unexpired `MUSIC_U` cookie); login is by phone number and
//! md5-hashed password.
//!
//! Song details and playback URLs come from different endpoints. Playlists
//! list only track ids, which are resolved through the batch resolver in
//! chunks of [`BATCH_SONGS_COUNT`].

pub mod crypto;
mod model;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};

use self::model::{
    AlbumResponse, ArtistResponse, EmptyParams, Envelope, LoginParams, LoginResponse,
    PlaylistParams, PlaylistResponse, Song, SongDetailParams, SongDetailResponse, SongUrlParams,
    SongUrlResponse,
};
use super::http::ApiClient;
use super::{ApiError, AuthError, Bitrate, MusicRequest, ProviderContext, resolve_in_batches};
use crate::session::{StoredCookie, unix_now};
use crate::track::{
    Provider, ResourceKind, Tag, TrackDescriptor, container_dir, join_artists,
    year_from_unix_millis,
};

const WEAPI: &str = "https://music.163.com/weapi";

/// Host that session cookies without a `Domain` attribute are scoped to.
const SITE_HOST: &str = "music.163.com";

/// Maximum number of songs per detail or URL lookup call.
pub const BATCH_SONGS_COUNT: usize = 1000;

/// Cookie proving a logged-in session.
pub const SESSION_COOKIE: &str = "MUSIC_U";

const SUCCESS_CODE: i64 = 200;

fn api(path: &str) -> String {
    format!("{WEAPI}{path}")
}

/// Serializes, signs and posts `params`, then checks the JSON status.
async fn weapi_post<P, T>(ctx: &ProviderContext, path: &str, params: &P) -> Result<T, ApiError>
where
    P: Serialize + Sync,
    T: DeserializeOwned + Envelope,
{
    let url = api(path);
    let plaintext = serde_json::to_vec(params).map_err(|e| ApiError::invalid_request(&url, e))?;
    let signature = ctx.signer().sign(&plaintext);
    let response: T = ctx
        .post_form_json(Provider::NetEase, &url, &signature.form())
        .await?;
    check_status(&url, response)
}

fn check_status<T: Envelope>(url: &str, response: T) -> Result<T, ApiError> {
    let status = response.status();
    if status.code == SUCCESS_CODE {
        Ok(response)
    } else {
        Err(ApiError::status(url, status.code, status.message()))
    }
}

/// `br` parameter for the song URL endpoint.
fn bitrate_param(bitrate: Bitrate) -> u32 {
    bitrate.kbps().map_or(999_000, |kbps| kbps * 1000)
}

/// Fetches full song records for `ids`, in id order.
async fn song_details(ctx: &ProviderContext, ids: &[u64]) -> Result<Vec<Song>, ApiError> {
    resolve_in_batches(ids, BATCH_SONGS_COUNT, |chunk| async move {
        let c: Vec<HashMap<&str, u64>> = chunk.iter().map(|id| HashMap::from([("id", *id)])).collect();
        let params = SongDetailParams {
            c: serde_json::to_string(&c).map_err(|e| ApiError::invalid_request(api("/v3/song/detail"), e))?,
        };
        let response: SongDetailResponse = weapi_post(ctx, "/v3/song/detail", &params).await?;
        Ok(response.songs)
    })
    .await
}

/// Looks up playback URLs; ids the platform refuses map to `None`.
async fn song_urls(
    ctx: &ProviderContext,
    ids: &[u64],
) -> Result<HashMap<u64, Option<String>>, ApiError> {
    let br = bitrate_param(ctx.bitrate());
    let entries = resolve_in_batches(ids, BATCH_SONGS_COUNT, |chunk| async move {
        let params = SongUrlParams {
            ids: serde_json::to_string(&chunk)
                .map_err(|e| ApiError::invalid_request(api("/song/enhance/player/url"), e))?,
            br,
        };
        let response: SongUrlResponse =
            weapi_post(ctx, "/song/enhance/player/url", &params).await?;
        Ok(response.data)
    })
    .await?;

    Ok(entries
        .into_iter()
        .map(|entry| {
            let url = entry
                .url
                .filter(|url| entry.code == SUCCESS_CODE && !url.is_empty());
            (entry.id, url)
        })
        .collect())
}

fn song_to_descriptor(song: &Song, save_path: PathBuf) -> TrackDescriptor {
    let names = || song.ar.iter().map(|a| a.name.as_str());
    let file_name = format!("{} - {}.mp3", join_artists(names(), " "), song.name.trim());
    TrackDescriptor::new(Provider::NetEase, &file_name, save_path).with_tag(Tag {
        title: song.name.clone(),
        artist: join_artists(names(), "/"),
        album: song.al.name.clone(),
        year: year_from_unix_millis(song.publish_time),
        track_number: (song.no > 0).then_some(song.no),
        cover_image_url: song.al.pic_url.clone().filter(|url| !url.is_empty()),
    })
}

/// Builds descriptors and fills in playback URLs.
async fn extract_tracks(
    ctx: &ProviderContext,
    songs: &[Song],
    save_path: &Path,
) -> Result<Vec<TrackDescriptor>, ApiError> {
    let ids: Vec<u64> = songs.iter().map(|s| s.id).collect();
    let urls = song_urls(ctx, &ids).await?;

    let tracks: Vec<TrackDescriptor> = songs
        .iter()
        .map(|song| {
            let mut track = song_to_descriptor(song, save_path.to_path_buf());
            match urls.get(&song.id) {
                Some(Some(url)) => track.set_download_url(url.clone()),
                _ => debug!(id = song.id, "no playback url, marking unplayable"),
            }
            track
        })
        .collect();
    Ok(tracks)
}

fn require_session(ctx: &ProviderContext) -> bool {
    !ctx.is_authenticated(SESSION_COOKIE)
}

/// Logs in with prompted credentials and stores the returned cookies.
#[instrument(skip(ctx))]
async fn login(ctx: &ProviderContext) -> Result<(), AuthError> {
    let credentials = ctx.credentials(Provider::NetEase)?;
    let params = LoginParams {
        phone: &credentials.account,
        password: format!("{:x}", md5::compute(credentials.password())),
        remember_login: true,
    };

    let url = api("/login/cellphone");
    let plaintext = serde_json::to_vec(&params)
        .map_err(|e| AuthError::login_failed(Provider::NetEase, ApiError::invalid_request(&url, e)))?;
    let signature = ctx.signer().sign(&plaintext);
    let response = ctx
        .post_form(Provider::NetEase, &url, &signature.form())
        .await
        .map_err(|e| AuthError::login_failed(Provider::NetEase, e))?;

    let now = unix_now();
    let cookies: Vec<StoredCookie> = response
        .cookies()
        .map(|cookie| StoredCookie::from_response(&cookie, SITE_HOST, now))
        .collect();

    let endpoint = ctx.endpoint(&url);
    let body: LoginResponse = ApiClient::decode(&endpoint, response)
        .await
        .and_then(|body| check_status(&url, body))
        .map_err(|e| AuthError::login_failed(Provider::NetEase, e))?;
    debug!(code = body.status.code, "login accepted");

    if !cookies
        .iter()
        .any(|c| c.name.eq_ignore_ascii_case(SESSION_COOKIE))
    {
        return Err(AuthError::MissingSessionCookie {
            provider: Provider::NetEase,
            cookie: SESSION_COOKIE,
        });
    }

    info!(cookies = cookies.len(), "logged in");
    ctx.replace_cookies(cookies);
    Ok(())
}

/// A single song.
#[derive(Debug)]
pub struct SongRequest {
    id: u64,
    songs: Vec<Song>,
}

impl SongRequest {
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self {
            id,
            songs: Vec::new(),
        }
    }
}

#[async_trait]
impl MusicRequest for SongRequest {
    fn provider(&self) -> Provider {
        Provider::NetEase
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Song
    }

    fn require_login(&self, ctx: &ProviderContext) -> bool {
        require_session(ctx)
    }

    async fn login(&mut self, ctx: &ProviderContext) -> Result<(), AuthError> {
        login(ctx).await
    }

    async fn execute(&mut self, ctx: &ProviderContext) -> Result<(), ApiError> {
        let songs = song_details(ctx, &[self.id]).await?;
        if songs.is_empty() {
            return Err(ApiError::empty(api("/v3/song/detail"), "songs"));
        }
        self.songs = songs;
        Ok(())
    }

    async fn prepare(&mut self, ctx: &ProviderContext) -> Result<Vec<TrackDescriptor>, ApiError> {
        extract_tracks(ctx, &self.songs, Path::new(".")).await
    }
}

/// An artist's hot songs.
#[derive(Debug)]
pub struct ArtistRequest {
    id: u64,
    response: Option<ArtistResponse>,
}

impl ArtistRequest {
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self { id, response: None }
    }
}

#[async_trait]
impl MusicRequest for ArtistRequest {
    fn provider(&self) -> Provider {
        Provider::NetEase
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Artist
    }

    fn require_login(&self, ctx: &ProviderContext) -> bool {
        require_session(ctx)
    }

    async fn login(&mut self, ctx: &ProviderContext) -> Result<(), AuthError> {
        login(ctx).await
    }

    async fn execute(&mut self, ctx: &ProviderContext) -> Result<(), ApiError> {
        let path = format!("/v1/artist/{}", self.id);
        let response: ArtistResponse = weapi_post(ctx, &path, &EmptyParams {}).await?;
        if response.hot_songs.is_empty() {
            return Err(ApiError::empty(api(&path), "hot songs"));
        }
        self.response = Some(response);
        Ok(())
    }

    async fn prepare(&mut self, ctx: &ProviderContext) -> Result<Vec<TrackDescriptor>, ApiError> {
        let Some(response) = &self.response else {
            return Ok(Vec::new());
        };
        let ids: Vec<u64> = response.hot_songs.iter().map(|s| s.id).collect();
        let songs = song_details(ctx, &ids).await?;
        extract_tracks(ctx, &songs, &container_dir(&response.artist.name)).await
    }
}

/// An album.
#[derive(Debug)]
pub struct AlbumRequest {
    id: u64,
    response: Option<AlbumResponse>,
}

impl AlbumRequest {
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self { id, response: None }
    }
}

#[async_trait]
impl MusicRequest for AlbumRequest {
    fn provider(&self) -> Provider {
        Provider::NetEase
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Album
    }

    fn require_login(&self, ctx: &ProviderContext) -> bool {
        require_session(ctx)
    }

    async fn login(&mut self, ctx: &ProviderContext) -> Result<(), AuthError> {
        login(ctx).await
    }

    async fn execute(&mut self, ctx: &ProviderContext) -> Result<(), ApiError> {
        let path = format!("/v1/album/{}", self.id);
        let response: AlbumResponse = weapi_post(ctx, &path, &EmptyParams {}).await?;
        if response.songs.is_empty() {
            return Err(ApiError::empty(api(&path), "songs"));
        }
        self.response = Some(response);
        Ok(())
    }

    async fn prepare(&mut self, ctx: &ProviderContext) -> Result<Vec<TrackDescriptor>, ApiError> {
        let Some(response) = &mut self.response else {
            return Ok(Vec::new());
        };
        // album songs carry no publish time of their own
        let publish_time = response.album.publish_time;
        for song in &mut response.songs {
            song.publish_time = publish_time;
            if song.al.pic_url.is_none() {
                song.al.pic_url.clone_from(&response.album.pic_url);
            }
        }
        extract_tracks(ctx, &response.songs, &container_dir(&response.album.name)).await
    }
}

/// A user playlist.
#[derive(Debug)]
pub struct PlaylistRequest {
    id: u64,
    response: Option<PlaylistResponse>,
}

impl PlaylistRequest {
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self { id, response: None }
    }
}

#[async_trait]
impl MusicRequest for PlaylistRequest {
    fn provider(&self) -> Provider {
        Provider::NetEase
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Playlist
    }

    fn require_login(&self, ctx: &ProviderContext) -> bool {
        require_session(ctx)
    }

    async fn login(&mut self, ctx: &ProviderContext) -> Result<(), AuthError> {
        login(ctx).await
    }

    async fn execute(&mut self, ctx: &ProviderContext) -> Result<(), ApiError> {
        let params = PlaylistParams {
            id: self.id,
            n: 100_000,
        };
        let response: PlaylistResponse = weapi_post(ctx, "/v3/playlist/detail", &params).await?;
        if response.playlist.track_ids.is_empty() {
            return Err(ApiError::empty(api("/v3/playlist/detail"), "tracks"));
        }
        self.response = Some(response);
        Ok(())
    }

    async fn prepare(&mut self, ctx: &ProviderContext) -> Result<Vec<TrackDescriptor>, ApiError> {
        let Some(response) = &self.response else {
            return Ok(Vec::new());
        };
        let ids: Vec<u64> = response.playlist.track_ids.iter().map(|t| t.id).collect();
        let songs = song_details(ctx, &ids).await?;
        if songs.len() != ids.len() {
            warn!(
                requested = ids.len(),
                returned = songs.len(),
                "playlist detail returned fewer songs than track ids"
            );
        }
        extract_tracks(ctx, &songs, &container_dir(&response.playlist.name)).await
    }
}
