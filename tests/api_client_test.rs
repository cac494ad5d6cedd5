mod common;

use common::{config, logged_in, token_body};
use dashtune::{
    Error,
    playback::PlayTarget,
    spotify::{
        catalog::CatalogClient,
        client::ApiClient,
        player::{PlayerControl, RemotePlayer},
    },
    types::SearchKind,
};
use mockito::{Matcher, Server};
use serde_json::json;

const PROFILE: &str = r#"{"id":"user-1","display_name":"Dana"}"#;

const CURRENTLY_PLAYING: &str = r#"{
    "is_playing": true,
    "progress_ms": 42000,
    "item": {
        "id": "track-1",
        "name": "Song",
        "uri": "spotify:track:track-1",
        "duration_ms": 180000,
        "artists": [{"name": "Artist A"}, {"name": "Artist B"}],
        "album": {
            "name": "Album",
            "images": [
                {"url": "https://img/64", "width": 64, "height": 64},
                {"url": "https://img/640", "width": 640, "height": 640}
            ]
        }
    },
    "device": {"id": "dev-9", "name": "Phone", "is_active": true}
}"#;

async fn catalog(server: &Server) -> CatalogClient {
    let h = logged_in(config(&server.url()), "access-1").await;
    CatalogClient::new(ApiClient::new(h.auth))
}

async fn remote(server: &Server) -> RemotePlayer {
    let h = logged_in(config(&server.url()), "access-1").await;
    RemotePlayer::new(ApiClient::new(h.auth))
}

#[tokio::test]
async fn unauthorized_request_is_retried_once_after_refresh() {
    let mut server = Server::new_async().await;
    let client = catalog(&server).await;

    let rejected = server
        .mock("GET", "/v1/me")
        .match_header("authorization", "Bearer access-1")
        .with_status(401)
        .with_body(r#"{"error":{"status":401,"message":"The access token expired"}}"#)
        .expect(1)
        .create_async()
        .await;
    let refresh = server
        .mock("POST", "/api/token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(token_body("access-2", None, 3600))
        .expect(1)
        .create_async()
        .await;
    let accepted = server
        .mock("GET", "/v1/me")
        .match_header("authorization", "Bearer access-2")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(PROFILE)
        .expect(1)
        .create_async()
        .await;

    let user = client.current_user().await.unwrap();

    assert_eq!(user.display_name.as_deref(), Some("Dana"));
    rejected.assert_async().await;
    refresh.assert_async().await;
    accepted.assert_async().await;
}

#[tokio::test]
async fn second_unauthorized_is_surfaced() {
    let mut server = Server::new_async().await;
    let client = catalog(&server).await;

    let me = server
        .mock("GET", "/v1/me")
        .with_status(401)
        .with_body(r#"{"error":{"status":401,"message":"Invalid access token"}}"#)
        .expect(2)
        .create_async()
        .await;
    let _refresh = server
        .mock("POST", "/api/token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(token_body("access-2", None, 3600))
        .create_async()
        .await;

    let err = client.current_user().await.unwrap_err();

    me.assert_async().await;
    assert!(matches!(err, Error::Api { status: 401, .. }));
    assert_eq!(err.status(), Some(401));
}

#[tokio::test]
async fn failed_refresh_on_unauthorized_is_not_authenticated() {
    let mut server = Server::new_async().await;
    let client = catalog(&server).await;

    let _me = server
        .mock("GET", "/v1/me")
        .with_status(401)
        .create_async()
        .await;
    let _refresh = server
        .mock("POST", "/api/token")
        .with_status(400)
        .with_body(r#"{"error":"invalid_grant"}"#)
        .create_async()
        .await;

    let err = client.current_user().await.unwrap_err();
    assert!(matches!(err, Error::NotAuthenticated));
}

#[tokio::test]
async fn provider_errors_carry_status_and_message() {
    let mut server = Server::new_async().await;
    let client = catalog(&server).await;

    let _playlists = server
        .mock("GET", "/v1/me/playlists")
        .match_query(Matcher::Any)
        .with_status(503)
        .with_body(r#"{"error":{"status":503,"message":"Service unavailable"}}"#)
        .create_async()
        .await;

    match client.playlists(20, 0).await.unwrap_err() {
        Error::Api {
            status, message, ..
        } => {
            assert_eq!(status, 503);
            assert_eq!(message, "Service unavailable");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn no_session_fails_without_request() {
    let mut server = Server::new_async().await;
    let h = common::harness(config(&server.url()));
    let client = CatalogClient::new(ApiClient::new(h.auth));

    let me = server.mock("GET", "/v1/me").expect(0).create_async().await;

    assert!(matches!(
        client.current_user().await,
        Err(Error::NotAuthenticated)
    ));
    me.assert_async().await;
}

#[tokio::test]
async fn search_joins_kinds_and_clamps_limit() {
    let mut server = Server::new_async().await;
    let client = catalog(&server).await;

    let search = server
        .mock("GET", "/v1/search")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("q".into(), "daft punk".into()),
            Matcher::UrlEncoded("type".into(), "track,album".into()),
            Matcher::UrlEncoded("limit".into(), "50".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "tracks": {"items": [{"name": "One More Time", "uri": "spotify:track:1", "duration_ms": 320000}], "total": 1},
                "albums": {"items": [], "total": 0},
                "playlists": {"items": [null], "total": 1}
            })
            .to_string(),
        )
        .create_async()
        .await;

    let results = client
        .search("daft punk", &[SearchKind::Track, SearchKind::Album], 500)
        .await
        .unwrap();

    search.assert_async().await;
    let tracks = results.tracks.unwrap();
    assert_eq!(tracks.items[0].name, "One More Time");
    assert_eq!(results.playlists.unwrap().items.len(), 1);
}

#[tokio::test]
async fn playlist_tracks_tolerate_missing_tracks() {
    let mut server = Server::new_async().await;
    let client = catalog(&server).await;

    let _tracks = server
        .mock("GET", "/v1/playlists/pl-1/tracks")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("limit".into(), "1".into()),
            Matcher::UrlEncoded("offset".into(), "10".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "items": [
                    {"track": {"name": "A", "uri": "spotify:track:a", "duration_ms": 1000}},
                    {"track": null}
                ],
                "total": 2
            })
            .to_string(),
        )
        .create_async()
        .await;

    let page = client.playlist_tracks("pl-1", 0, 10).await.unwrap();
    assert_eq!(page.total, 2);
    assert!(page.items[1].track.is_none());
}

#[tokio::test]
async fn play_context_sends_context_uri() {
    let mut server = Server::new_async().await;
    let player = remote(&server).await;

    let play = server
        .mock("PUT", "/v1/me/player/play")
        .match_body(Matcher::Json(json!({"context_uri": "spotify:playlist:abc"})))
        .with_status(204)
        .expect(1)
        .create_async()
        .await;

    let target = PlayTarget::from_uri("spotify:playlist:abc");
    player.play(None, Some(&target)).await.unwrap();
    play.assert_async().await;
}

#[tokio::test]
async fn play_track_sends_uris_to_device() {
    let mut server = Server::new_async().await;
    let player = remote(&server).await;

    let play = server
        .mock("PUT", "/v1/me/player/play")
        .match_query(Matcher::UrlEncoded("device_id".into(), "dev-1".into()))
        .match_body(Matcher::Json(json!({"uris": ["spotify:track:xyz"]})))
        .with_status(204)
        .expect(1)
        .create_async()
        .await;

    let target = PlayTarget::from_uri("spotify:track:xyz");
    player.play(Some("dev-1"), Some(&target)).await.unwrap();
    play.assert_async().await;
}

#[tokio::test]
async fn no_active_device_is_reported() {
    let mut server = Server::new_async().await;
    let player = remote(&server).await;

    let _play = server
        .mock("PUT", "/v1/me/player/play")
        .with_status(404)
        .with_body(
            r#"{"error":{"status":404,"message":"Player command failed: No active device found","reason":"NO_ACTIVE_DEVICE"}}"#,
        )
        .create_async()
        .await;

    let err = player.play(None, None).await.unwrap_err();
    assert!(matches!(err, Error::NoActiveDevice));
}

#[tokio::test]
async fn other_command_failures_are_api_errors() {
    let mut server = Server::new_async().await;
    let player = remote(&server).await;

    let _pause = server
        .mock("PUT", "/v1/me/player/pause")
        .with_status(403)
        .with_body(
            r#"{"error":{"status":403,"message":"Player command failed: Premium required","reason":"PREMIUM_REQUIRED"}}"#,
        )
        .create_async()
        .await;

    match player.pause().await.unwrap_err() {
        Error::Api { status, reason, .. } => {
            assert_eq!(status, 403);
            assert_eq!(reason.as_deref(), Some("PREMIUM_REQUIRED"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn seek_and_volume_use_query_parameters() {
    let mut server = Server::new_async().await;
    let player = remote(&server).await;

    let seek = server
        .mock("PUT", "/v1/me/player/seek")
        .match_query(Matcher::UrlEncoded("position_ms".into(), "90000".into()))
        .with_status(204)
        .create_async()
        .await;
    let volume = server
        .mock("PUT", "/v1/me/player/volume")
        .match_query(Matcher::UrlEncoded("volume_percent".into(), "100".into()))
        .with_status(204)
        .create_async()
        .await;
    let next = server
        .mock("POST", "/v1/me/player/next")
        .with_status(204)
        .create_async()
        .await;

    player.seek(90_000).await.unwrap();
    player.set_volume(150).await.unwrap();
    player.next().await.unwrap();

    seek.assert_async().await;
    volume.assert_async().await;
    next.assert_async().await;
}

#[tokio::test]
async fn nothing_playing_is_none() {
    let mut server = Server::new_async().await;
    let player = remote(&server).await;

    let _state = server
        .mock("GET", "/v1/me/player")
        .with_status(204)
        .create_async()
        .await;

    assert_eq!(player.current_state().await.unwrap(), None);
}

#[tokio::test]
async fn current_state_is_mapped() {
    let mut server = Server::new_async().await;
    let player = remote(&server).await;

    let _state = server
        .mock("GET", "/v1/me/player")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(CURRENTLY_PLAYING)
        .create_async()
        .await;

    let state = player.current_state().await.unwrap().unwrap();
    assert!(state.is_playing);
    assert_eq!(state.track_id.as_deref(), Some("track-1"));
    assert_eq!(state.track_name, "Song");
    assert_eq!(state.artist_names, vec!["Artist A", "Artist B"]);
    assert_eq!(state.album_art_url.as_deref(), Some("https://img/640"));
    assert_eq!(state.position_ms, 42_000);
    assert_eq!(state.duration_ms, 180_000);
}
