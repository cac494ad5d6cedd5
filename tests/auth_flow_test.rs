mod common;

use std::{collections::HashMap, time::Duration};

use common::{CLIENT_ID, REDIRECT_URI, config, harness, logged_in, token_body};
use dashtune::{
    management::{ACCESS_TOKEN_KEY, EXPIRES_AT_KEY, KeyValueStore, REFRESH_TOKEN_KEY},
    spotify::auth::{AuthState, CODE_VERIFIER_KEY, CallbackParams},
    utils::generate_code_challenge,
};
use mockito::{Matcher, Server};

fn callback(code: &str) -> CallbackParams {
    CallbackParams {
        code: Some(code.to_string()),
        error: None,
    }
}

#[tokio::test]
async fn begin_login_navigates_with_challenge_of_stored_verifier() {
    let h = harness(config("http://provider.test"));

    let url = h.auth.begin_login().await.unwrap();

    assert_eq!(h.navigator.last(), Some(url.clone()));
    assert_eq!(h.auth.state().await, AuthState::AwaitingCallback);

    let query: HashMap<String, String> = url.query_pairs().into_owned().collect();
    let verifier = h.store.get(CODE_VERIFIER_KEY).await.unwrap().unwrap();
    assert_eq!(query["code_challenge"], generate_code_challenge(&verifier));
    assert_eq!(query["code_challenge_method"], "S256");
    assert_eq!(query["response_type"], "code");
    assert_eq!(query["client_id"], CLIENT_ID);
    assert_eq!(query["redirect_uri"], REDIRECT_URI);
    assert!(query["scope"].contains("streaming"));
    assert!(query["scope"].contains("user-modify-playback-state"));
}

#[tokio::test]
async fn second_login_replaces_verifier() {
    let h = harness(config("http://provider.test"));

    h.auth.begin_login().await.unwrap();
    let first = h.store.get(CODE_VERIFIER_KEY).await.unwrap();
    h.auth.begin_login().await.unwrap();
    let second = h.store.get(CODE_VERIFIER_KEY).await.unwrap();

    assert_ne!(first, second);
}

#[tokio::test]
async fn callback_exchanges_code_and_stores_session() {
    let mut server = Server::new_async().await;
    let h = harness(config(&server.url()));
    h.auth.begin_login().await.unwrap();
    let verifier = h.store.get(CODE_VERIFIER_KEY).await.unwrap().unwrap();

    let token = server
        .mock("POST", "/api/token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
            Matcher::UrlEncoded("code".into(), "auth-code".into()),
            Matcher::UrlEncoded("code_verifier".into(), verifier),
            Matcher::UrlEncoded("client_id".into(), CLIENT_ID.into()),
            Matcher::UrlEncoded("redirect_uri".into(), REDIRECT_URI.into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(token_body("access-1", Some("refresh-1"), 3600))
        .expect(1)
        .create_async()
        .await;

    assert!(h.auth.handle_callback(&callback("auth-code")).await);

    token.assert_async().await;
    assert!(!h.store.contains(CODE_VERIFIER_KEY));
    assert_eq!(h.auth.state().await, AuthState::Authenticated);
    assert_eq!(
        h.auth.get_valid_access_token().await.as_deref(),
        Some("access-1")
    );
}

#[tokio::test]
async fn failed_exchange_still_consumes_verifier() {
    let mut server = Server::new_async().await;
    let h = harness(config(&server.url()));
    h.auth.begin_login().await.unwrap();

    let _token = server
        .mock("POST", "/api/token")
        .with_status(400)
        .with_body(r#"{"error":"invalid_grant"}"#)
        .create_async()
        .await;

    assert!(!h.auth.handle_callback(&callback("bad-code")).await);

    assert!(!h.store.contains(CODE_VERIFIER_KEY));
    assert!(!h.store.contains(ACCESS_TOKEN_KEY));
    assert_eq!(h.auth.state().await, AuthState::Unauthenticated);
}

#[tokio::test]
async fn denied_authorization_makes_no_token_request() {
    let mut server = Server::new_async().await;
    let h = harness(config(&server.url()));
    h.auth.begin_login().await.unwrap();

    let token = server
        .mock("POST", "/api/token")
        .expect(0)
        .create_async()
        .await;

    let params = CallbackParams {
        code: None,
        error: Some("access_denied".to_string()),
    };
    assert!(!h.auth.handle_callback(&params).await);

    token.assert_async().await;
    assert!(!h.store.contains(CODE_VERIFIER_KEY));
}

#[tokio::test]
async fn callback_without_pending_login_fails() {
    let mut server = Server::new_async().await;
    let h = harness(config(&server.url()));

    let token = server
        .mock("POST", "/api/token")
        .expect(0)
        .create_async()
        .await;

    assert!(!h.auth.handle_callback(&callback("auth-code")).await);
    token.assert_async().await;
}

#[tokio::test]
async fn replayed_callback_fails_the_second_time() {
    let mut server = Server::new_async().await;
    let h = harness(config(&server.url()));
    h.auth.begin_login().await.unwrap();

    let token = server
        .mock("POST", "/api/token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(token_body("access-1", Some("refresh-1"), 3600))
        .expect(1)
        .create_async()
        .await;

    assert!(h.auth.handle_callback(&callback("auth-code")).await);
    assert!(!h.auth.handle_callback(&callback("auth-code")).await);
    token.assert_async().await;
}

#[tokio::test]
async fn expired_token_is_refreshed_and_old_refresh_token_kept() {
    let mut server = Server::new_async().await;
    let h = harness(config(&server.url()));
    h.auth.tokens().save("stale", "refresh-1", 0).await;

    let token = server
        .mock("POST", "/api/token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
            Matcher::UrlEncoded("refresh_token".into(), "refresh-1".into()),
            Matcher::UrlEncoded("client_id".into(), CLIENT_ID.into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(token_body("fresh", None, 3600))
        .expect(1)
        .create_async()
        .await;

    assert_eq!(
        h.auth.get_valid_access_token().await.as_deref(),
        Some("fresh")
    );

    token.assert_async().await;
    assert_eq!(
        h.auth.tokens().get_refresh_token().await.as_deref(),
        Some("refresh-1")
    );
    assert_eq!(
        h.auth.tokens().get_access_token_if_valid().await.as_deref(),
        Some("fresh")
    );
}

#[tokio::test]
async fn rotated_refresh_token_replaces_old_one() {
    let mut server = Server::new_async().await;
    let h = harness(config(&server.url()));
    h.auth.tokens().save("stale", "refresh-1", 0).await;

    let _token = server
        .mock("POST", "/api/token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(token_body("fresh", Some("refresh-2"), 3600))
        .create_async()
        .await;

    h.auth.get_valid_access_token().await;
    assert_eq!(
        h.auth.tokens().get_refresh_token().await.as_deref(),
        Some("refresh-2")
    );
}

#[tokio::test]
async fn refresh_failure_logs_out() {
    let mut server = Server::new_async().await;
    let h = harness(config(&server.url()));
    h.auth.tokens().save("stale", "refresh-1", 60).await;
    h.clock.advance(Duration::from_secs(61));

    let _token = server
        .mock("POST", "/api/token")
        .with_status(400)
        .with_body(r#"{"error":"invalid_grant"}"#)
        .create_async()
        .await;

    assert_eq!(h.auth.get_valid_access_token().await, None);

    assert!(!h.store.contains(ACCESS_TOKEN_KEY));
    assert!(!h.store.contains(REFRESH_TOKEN_KEY));
    assert!(!h.store.contains(EXPIRES_AT_KEY));
    assert_eq!(h.auth.state().await, AuthState::Unauthenticated);
}

#[tokio::test]
async fn valid_token_needs_no_network() {
    let mut server = Server::new_async().await;
    let h = logged_in(config(&server.url()), "access-1").await;

    let token = server
        .mock("POST", "/api/token")
        .expect(0)
        .create_async()
        .await;

    assert_eq!(
        h.auth.get_valid_access_token().await.as_deref(),
        Some("access-1")
    );
    token.assert_async().await;
}

#[tokio::test]
async fn no_session_means_no_token() {
    let h = harness(config("http://provider.test"));
    assert_eq!(h.auth.get_valid_access_token().await, None);
    assert_eq!(h.auth.refresh().await, None);
}

#[tokio::test]
async fn concurrent_callers_share_one_refresh() {
    let mut server = Server::new_async().await;
    let h = harness(config(&server.url()));
    h.auth.tokens().save("stale", "refresh-1", 0).await;

    let token = server
        .mock("POST", "/api/token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(token_body("fresh", None, 3600))
        .expect(1)
        .create_async()
        .await;

    let (a, b, c) = tokio::join!(
        h.auth.get_valid_access_token(),
        h.auth.get_valid_access_token(),
        h.auth.get_valid_access_token()
    );

    token.assert_async().await;
    assert_eq!(a.as_deref(), Some("fresh"));
    assert_eq!(b.as_deref(), Some("fresh"));
    assert_eq!(c.as_deref(), Some("fresh"));
}

#[tokio::test]
async fn logout_clears_session() {
    let h = logged_in(config("http://provider.test"), "access-1").await;

    h.auth.logout().await;

    assert_eq!(h.auth.state().await, AuthState::Unauthenticated);
    assert_eq!(h.auth.tokens().get_access_token_if_valid().await, None);
}
