//! Token manager flows against a mocked GitHub API

use std::fs;
use std::time::{Duration, Instant};

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use secrecy::{ExposeSecret, SecretString};
use url::Url;
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use github_token::core::cache::format_expiry;
use github_token::core::fingerprint::credential_fingerprint;
use github_token::core::{AppIdentity, CacheStore, TokenManager, TokenSource};
use github_token::github::jwt::AppClaims;
use github_token::github::TokenFetcher;
use github_token::TokenError;

const PRIVATE_KEY: &str = include_str!("fixtures/app-key.pem");
const PUBLIC_KEY: &str = include_str!("fixtures/app-key.pub.pem");
const ROTATED_KEY: &str = include_str!("fixtures/rotated-key.pem");

const TOKEN_PATH: &str = "/app/installations/67890/access_tokens";

fn identity(private_key: &str) -> AppIdentity {
    AppIdentity {
        app_id: 12345,
        installation_id: 67890,
        private_key: SecretString::from(private_key),
    }
}

fn manager(server: &MockServer, cache: &CacheStore, private_key: &str) -> TokenManager {
    manager_for(&server.uri(), cache, private_key, Duration::from_secs(5))
}

fn manager_for(
    base_url: &str,
    cache: &CacheStore,
    private_key: &str,
    timeout: Duration,
) -> TokenManager {
    let fetcher = TokenFetcher::new(Url::parse(base_url).unwrap(), timeout).unwrap();
    TokenManager::new(identity(private_key), cache.clone(), fetcher)
}

fn created(token: &str) -> ResponseTemplate {
    ResponseTemplate::new(201).set_body_json(serde_json::json!({
        "token": token,
        "expires_at": (Utc::now() + ChronoDuration::hours(1)).to_rfc3339(),
        "permissions": { "contents": "read" },
        "repository_selection": "all"
    }))
}

fn seed_cache(cache: &CacheStore, token: &str, expires_in: ChronoDuration, key: &str) {
    cache.ensure_dir().unwrap();
    cache.write_token(token).unwrap();
    cache.write_expiry(Utc::now() + expires_in).unwrap();
    cache
        .write_fingerprint(&credential_fingerprint(&SecretString::from(key)))
        .unwrap();
}

#[tokio::test]
async fn test_empty_cache_fetches_then_reuses() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(header("Accept", "application/vnd.github+json"))
        .and(header_exists("Authorization"))
        .respond_with(created("ghs_fresh"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let cache = CacheStore::new(dir.path().join("cache"));
    let manager = manager(&server, &cache, PRIVATE_KEY);

    let first = manager.get_token(false).await.unwrap();
    assert_eq!(first.token.expose_secret(), "ghs_fresh");
    assert_eq!(first.source, TokenSource::Fetched);

    let snapshot = cache.read().unwrap();
    assert_eq!(snapshot.token, "ghs_fresh");
    assert_eq!(snapshot.expires_at, format_expiry(first.expires_at));
    assert_eq!(
        snapshot.fingerprint,
        credential_fingerprint(&SecretString::from(PRIVATE_KEY))
    );

    // Second call is served from the cache; the mock expects exactly one request
    let second = manager.get_token(false).await.unwrap();
    assert_eq!(second.token.expose_secret(), "ghs_fresh");
    assert_eq!(second.source, TokenSource::Cache);
}

#[tokio::test]
async fn test_valid_cache_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(created("unexpected"))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let cache = CacheStore::new(dir.path());
    seed_cache(&cache, "abc", ChronoDuration::days(365 * 100), PRIVATE_KEY);

    let issued = manager(&server, &cache, PRIVATE_KEY)
        .get_token(false)
        .await
        .unwrap();
    assert_eq!(issued.token.expose_secret(), "abc");
    assert_eq!(issued.source, TokenSource::Cache);
}

#[tokio::test]
async fn test_force_refresh_ignores_valid_cache() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(created("ghs_forced"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let cache = CacheStore::new(dir.path());
    seed_cache(&cache, "abc", ChronoDuration::days(365 * 100), PRIVATE_KEY);

    let issued = manager(&server, &cache, PRIVATE_KEY)
        .get_token(true)
        .await
        .unwrap();
    assert_eq!(issued.token.expose_secret(), "ghs_forced");
    assert_eq!(cache.read().unwrap().token, "ghs_forced");
}

#[tokio::test]
async fn test_token_inside_margin_is_refreshed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(created("ghs_renewed"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let cache = CacheStore::new(dir.path());
    seed_cache(&cache, "abc", ChronoDuration::minutes(4), PRIVATE_KEY);

    let issued = manager(&server, &cache, PRIVATE_KEY)
        .get_token(false)
        .await
        .unwrap();
    assert_eq!(issued.token.expose_secret(), "ghs_renewed");
}

#[tokio::test]
async fn test_rotated_key_refreshes_and_updates_fingerprint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(created("ghs_rotated"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let cache = CacheStore::new(dir.path());
    seed_cache(&cache, "abc", ChronoDuration::hours(1), PRIVATE_KEY);

    let issued = manager(&server, &cache, ROTATED_KEY)
        .get_token(false)
        .await
        .unwrap();
    assert_eq!(issued.token.expose_secret(), "ghs_rotated");
    assert_eq!(
        cache.read().unwrap().fingerprint,
        credential_fingerprint(&SecretString::from(ROTATED_KEY))
    );
}

#[tokio::test]
async fn test_request_carries_verifiable_app_jwt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(created("ghs_jwt"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let cache = CacheStore::new(dir.path());
    manager(&server, &cache, PRIVATE_KEY)
        .get_token(false)
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);

    let authorization = requests[0]
        .headers
        .get("authorization")
        .unwrap()
        .to_str()
        .unwrap();
    let jwt = authorization.strip_prefix("Bearer ").unwrap();

    let key = DecodingKey::from_rsa_pem(PUBLIC_KEY.as_bytes()).unwrap();
    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_issuer(&["12345"]);
    let claims = decode::<AppClaims>(jwt, &key, &validation).unwrap().claims;
    assert_eq!(claims.exp - claims.iat, 9 * 60);
}

#[tokio::test]
async fn test_non_created_status_is_fetch_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(
            ResponseTemplate::new(401).set_body_string(r#"{"message":"Bad credentials"}"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let cache = CacheStore::new(dir.path());

    let err = manager(&server, &cache, PRIVATE_KEY)
        .get_token(false)
        .await
        .unwrap_err();
    assert!(matches!(err, TokenError::Fetch(ref msg) if msg.contains("401") && msg.contains("Bad credentials")));
    assert_eq!(err.exit_code(), 4);

    // Nothing was cached
    assert!(cache.read().unwrap().token.is_empty());
}

#[tokio::test]
async fn test_ok_instead_of_created_is_fetch_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "token": "ghs_x",
            "expires_at": (Utc::now() + ChronoDuration::hours(1)).to_rfc3339()
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let cache = CacheStore::new(dir.path());

    let err = manager(&server, &cache, PRIVATE_KEY)
        .get_token(false)
        .await
        .unwrap_err();
    assert!(matches!(err, TokenError::Fetch(_)));
}

#[tokio::test]
async fn test_already_expired_response_is_fetch_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "token": "ghs_stale",
            "expires_at": (Utc::now() - ChronoDuration::minutes(1)).to_rfc3339()
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let cache = CacheStore::new(dir.path());

    let err = manager(&server, &cache, PRIVATE_KEY)
        .get_token(false)
        .await
        .unwrap_err();
    assert!(matches!(err, TokenError::Fetch(_)));
    assert!(cache.read().unwrap().token.is_empty());
}

#[tokio::test]
async fn test_corrupted_expiry_is_fatal_without_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(created("unexpected"))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let cache = CacheStore::new(dir.path());
    seed_cache(&cache, "abc", ChronoDuration::hours(1), PRIVATE_KEY);
    fs::write(cache.expiry_path(), "2023-11-07 10:00:00 +0000 UTC").unwrap();

    let err = manager(&server, &cache, PRIVATE_KEY)
        .get_token(false)
        .await
        .unwrap_err();
    assert!(matches!(err, TokenError::CacheCorruption { .. }));
    assert_eq!(err.exit_code(), 6);
}

#[tokio::test]
async fn test_bad_private_key_is_signing_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(created("unexpected"))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let cache = CacheStore::new(dir.path());

    let err = manager(&server, &cache, "not a pem")
        .get_token(false)
        .await
        .unwrap_err();
    assert!(matches!(err, TokenError::Signing(_)));
}

#[tokio::test]
async fn test_status_does_not_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(created("unexpected"))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let cache = CacheStore::new(dir.path());
    seed_cache(&cache, "ghs_cached_token", ChronoDuration::hours(1), PRIVATE_KEY);

    let status = manager(&server, &cache, ROTATED_KEY).status().unwrap();
    assert!(!status.fingerprint_matches);
    assert!(status.freshness.needs_refresh());
    assert_eq!(status.snapshot.token, "ghs_cached_token");
}

#[tokio::test]
async fn test_slow_response_is_cut_off_by_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(created("ghs_too_late").set_delay(Duration::from_secs(10)))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let cache = CacheStore::new(dir.path());
    let manager = manager_for(&server.uri(), &cache, PRIVATE_KEY, Duration::from_secs(1));

    let started = Instant::now();
    let err = manager.get_token(false).await.unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(err, TokenError::Network(ref e) if e.is_timeout()));
    assert_eq!(err.exit_code(), 4);
    assert!(elapsed < Duration::from_secs(5), "took {elapsed:?}");
    assert!(cache.read().unwrap().token.is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn test_unchanged_fingerprint_is_not_rewritten() {
    use std::os::unix::fs::MetadataExt;

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(created("ghs_same_key"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let cache = CacheStore::new(dir.path());
    seed_cache(&cache, "abc", ChronoDuration::hours(1), PRIVATE_KEY);

    let inode = |name: &str| fs::metadata(dir.path().join(name)).unwrap().ino();
    let hash_before = inode("hash.txt");
    let token_before = inode("token.txt");

    let issued = manager(&server, &cache, PRIVATE_KEY)
        .get_token(true)
        .await
        .unwrap();
    assert_eq!(issued.source, TokenSource::Fetched);

    // Slot writes rename a fresh file into place, so a rewrite changes the inode
    assert_ne!(inode("token.txt"), token_before);
    assert_eq!(inode("hash.txt"), hash_before);
}

#[tokio::test]
async fn test_unreadable_error_body_is_reported() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    // Promises 100 bytes of body, sends 7, then hangs up
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 4096];
        let _ = socket.read(&mut buf).await;
        let _ = socket
            .write_all(b"HTTP/1.1 502 Bad Gateway\r\nContent-Length: 100\r\n\r\npartial")
            .await;
        let _ = socket.shutdown().await;
    });

    let dir = tempfile::tempdir().unwrap();
    let cache = CacheStore::new(dir.path());
    let manager = manager_for(
        &format!("http://{}", addr),
        &cache,
        PRIVATE_KEY,
        Duration::from_secs(5),
    );

    let err = manager.get_token(false).await.unwrap_err();
    assert!(
        matches!(err, TokenError::Fetch(ref msg) if msg.contains("502") && msg.contains("<body unreadable:")),
        "unexpected error: {err}"
    );
}
