//! Integration tests for the NetEase provider against a mock weapi server.
//!
//! Requests are signed with [`PassthroughSigner`], so the `params` form field
//! carries the plaintext JSON and the mock can inspect it.

use std::sync::{Arc, Mutex};

use music_get::provider::netease::{PlaylistRequest, SongRequest};
use music_get::provider::{Credentials, NoCredentials, PassthroughSigner, StaticCredentials};
use music_get::session::unix_now;
use music_get::{
    AuthError, Bitrate, MusicRequest, ProviderContext, ProviderSession, RequestError,
    StoredCookie, resolve_tracks,
};
use serde_json::{Value, json};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, Request, Respond, ResponseTemplate};

#[macro_use]
mod support;
use support::mock_site::MockSite;

/// Decodes the plaintext parameters of a passthrough-signed weapi call.
fn weapi_params(request: &Request) -> Value {
    url::form_urlencoded::parse(&request.body)
        .find(|(key, _)| key == "params")
        .and_then(|(_, value)| serde_json::from_str(&value).ok())
        .unwrap_or(Value::Null)
}

/// Ids carried by a JSON-encoded list field such as `c` or `ids`.
fn encoded_ids(params: &Value, field: &str) -> Vec<u64> {
    let encoded = params[field].as_str().unwrap_or("[]");
    let list: Vec<Value> = serde_json::from_str(encoded).unwrap_or_default();
    list.iter()
        .filter_map(|item| item.get("id").and_then(Value::as_u64).or_else(|| item.as_u64()))
        .collect()
}

/// Answers song detail calls with one song per requested id.
struct SongDetailResponder {
    batches: Arc<Mutex<Vec<usize>>>,
}

impl Respond for SongDetailResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let ids = encoded_ids(&weapi_params(request), "c");
        self.batches.lock().unwrap().push(ids.len());
        let songs: Vec<Value> = ids
            .iter()
            .map(|id| {
                json!({
                    "id": id,
                    "name": format!("Song {id}"),
                    "ar": [{"name": "Artist"}],
                    "al": {"name": "Album", "picUrl": ""},
                    "no": 1,
                    "publishTime": 0
                })
            })
            .collect();
        ResponseTemplate::new(200).set_body_json(json!({"code": 200, "songs": songs}))
    }
}

/// Answers song URL calls; even ids get a URL, odd ids are refused.
struct SongUrlResponder {
    base: String,
    batches: Arc<Mutex<Vec<usize>>>,
}

impl Respond for SongUrlResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let ids = encoded_ids(&weapi_params(request), "ids");
        self.batches.lock().unwrap().push(ids.len());
        let data: Vec<Value> = ids
            .iter()
            .map(|id| {
                if id % 2 == 0 {
                    json!({"id": id, "code": 200, "url": format!("{}/media/{id}.mp3", self.base)})
                } else {
                    json!({"id": id, "code": 404, "url": null})
                }
            })
            .collect();
        ResponseTemplate::new(200).set_body_json(json!({"code": 200, "data": data}))
    }
}

fn logged_in_session() -> ProviderSession {
    ProviderSession::new(vec![StoredCookie::new(
        "MUSIC_U",
        "abc",
        ".music.163.com",
        unix_now() + 3600,
    )])
}

fn context(site: &MockSite, session: ProviderSession) -> ProviderContext {
    site.context(session, Bitrate::Kbps320)
        .with_signer(Arc::new(PassthroughSigner))
}

#[tokio::test]
async fn test_playlist_of_2500_tracks_resolves_in_three_ordered_batches()
-> Result<(), Box<dyn std::error::Error>> {
    let site = mock_site_or_skip!();
    let detail_batches = Arc::new(Mutex::new(Vec::new()));
    let url_batches = Arc::new(Mutex::new(Vec::new()));

    let track_ids: Vec<Value> = (1..=2500).map(|id| json!({"id": id})).collect();
    Mock::given(method("POST"))
        .and(path("/weapi/v3/playlist/detail"))
        .and(header("cookie", "MUSIC_U=abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 200,
            "playlist": {"name": "Road Trip", "trackIds": track_ids}
        })))
        .expect(1)
        .mount(&site)
        .await;
    Mock::given(method("POST"))
        .and(path("/weapi/v3/song/detail"))
        .respond_with(SongDetailResponder {
            batches: Arc::clone(&detail_batches),
        })
        .mount(&site)
        .await;
    Mock::given(method("POST"))
        .and(path("/weapi/song/enhance/player/url"))
        .respond_with(SongUrlResponder {
            base: site.uri(),
            batches: Arc::clone(&url_batches),
        })
        .mount(&site)
        .await;

    let ctx = context(&site, logged_in_session());
    let mut request = PlaylistRequest::new(42);
    assert!(!request.require_login(&ctx));

    let tracks = resolve_tracks(&mut request, &ctx).await?;

    assert_eq!(*detail_batches.lock().unwrap(), vec![1000, 1000, 500]);
    assert_eq!(*url_batches.lock().unwrap(), vec![1000, 1000, 500]);
    assert_eq!(tracks.len(), 2500);
    for (index, track) in tracks.iter().enumerate() {
        let id = index + 1;
        assert_eq!(track.file_name, format!("Artist - Song {id}.mp3"));
        assert_eq!(track.save_path, std::path::PathBuf::from("Road Trip"));
        assert_eq!(track.playable, id % 2 == 0, "track {id}");
    }
    assert_eq!(tracks[1].download_url, site.url("/media/2.mp3"));
    Ok(())
}

#[tokio::test]
async fn test_batch_failure_aborts_whole_playlist() -> Result<(), Box<dyn std::error::Error>> {
    let site = mock_site_or_skip!();
    let track_ids: Vec<Value> = (1..=1500).map(|id| json!({"id": id})).collect();
    Mock::given(path("/weapi/v3/playlist/detail"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 200,
            "playlist": {"name": "P", "trackIds": track_ids}
        })))
        .mount(&site)
        .await;
    Mock::given(path("/weapi/v3/song/detail"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": -460, "msg": "cheating"})))
        .expect(1)
        .mount(&site)
        .await;
    Mock::given(path("/weapi/song/enhance/player/url"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 200, "data": []})))
        .expect(0)
        .mount(&site)
        .await;

    let ctx = context(&site, logged_in_session());
    let err = resolve_tracks(&mut PlaylistRequest::new(7), &ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, RequestError::Api(_)), "got {err:?}");
    assert!(err.to_string().contains("cheating"));
    Ok(())
}

#[tokio::test]
async fn test_missing_session_requires_login_before_execute() -> Result<(), Box<dyn std::error::Error>>
{
    let site = mock_site_or_skip!();
    Mock::given(path("/weapi/v3/song/detail"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 200, "songs": []})))
        .expect(0)
        .mount(&site)
        .await;

    let ctx = context(&site, ProviderSession::default()).with_prompt(NoCredentials);
    let mut request = SongRequest::new(553_310_243);
    assert!(request.require_login(&ctx));

    let err = resolve_tracks(&mut request, &ctx).await.unwrap_err();
    assert!(
        matches!(
            err,
            RequestError::Auth(AuthError::CredentialsUnavailable { .. })
        ),
        "got {err:?}"
    );
    Ok(())
}

#[tokio::test]
async fn test_expired_cookie_requires_login() -> Result<(), Box<dyn std::error::Error>> {
    let site = mock_site_or_skip!();
    let expired = ProviderSession::new(vec![StoredCookie::new(
        "MUSIC_U",
        "old",
        ".music.163.com",
        unix_now() - 1,
    )]);
    let ctx = context(&site, expired);
    assert!(SongRequest::new(1).require_login(&ctx));
    Ok(())
}

#[tokio::test]
async fn test_login_stores_session_cookie_then_executes() -> Result<(), Box<dyn std::error::Error>> {
    let site = mock_site_or_skip!();
    Mock::given(method("POST"))
        .and(path("/weapi/login/cellphone"))
        .and(body_string_contains("13800000000"))
        // md5("secret")
        .and(body_string_contains("5ebe2294ecd0e0f08eab7690d2a6ee69"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "MUSIC_U=fresh; Max-Age=3600; Path=/")
                .set_body_json(json!({"code": 200})),
        )
        .expect(1)
        .mount(&site)
        .await;
    Mock::given(method("POST"))
        .and(path("/weapi/v3/song/detail"))
        .and(header("cookie", "MUSIC_U=fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 200,
            "songs": [{"id": 2, "name": "T", "ar": [{"name": "A"}], "al": {"name": "B"}}]
        })))
        .expect(1)
        .mount(&site)
        .await;
    Mock::given(method("POST"))
        .and(path("/weapi/song/enhance/player/url"))
        .respond_with(SongUrlResponder {
            base: site.uri(),
            batches: Arc::new(Mutex::new(Vec::new())),
        })
        .mount(&site)
        .await;

    let ctx = context(&site, ProviderSession::default())
        .with_prompt(StaticCredentials(Credentials::new("13800000000", "secret")));
    let mut request = SongRequest::new(2);

    let tracks = resolve_tracks(&mut request, &ctx).await?;
    assert_eq!(tracks.len(), 1);
    assert_eq!(tracks[0].file_name, "A - T.mp3");
    assert!(tracks[0].playable);
    assert!(ctx.is_authenticated("MUSIC_U"));
    assert_eq!(
        ctx.cookie_header("https://music.163.com/weapi/v3/song/detail")
            .as_deref(),
        Some("MUSIC_U=fresh")
    );
    assert_eq!(ctx.session().cookies()[0].domain, "music.163.com");
    Ok(())
}

#[tokio::test]
async fn test_rejected_login_is_auth_error() -> Result<(), Box<dyn std::error::Error>> {
    let site = mock_site_or_skip!();
    Mock::given(path("/weapi/login/cellphone"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"code": 502, "msg": "wrong password"})),
        )
        .mount(&site)
        .await;

    let ctx = context(&site, ProviderSession::default())
        .with_prompt(StaticCredentials(Credentials::new("13800000000", "bad")));
    let err = resolve_tracks(&mut SongRequest::new(2), &ctx)
        .await
        .unwrap_err();
    assert!(
        matches!(err, RequestError::Auth(AuthError::LoginFailed { .. })),
        "got {err:?}"
    );
    assert!(!ctx.is_authenticated("MUSIC_U"));
    Ok(())
}
