use std::time::{Duration, Instant};

use anyhow::Context;
use commandapi_shared::AppError;
use jsonwebtoken::{
  DecodingKey, Validation, decode, decode_header,
  errors::ErrorKind,
  jwk::{Jwk, JwkSet},
};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Minimum time between two refetches of the key set.
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Claims we read from a validated access token. `aud`, `iss` and `exp`
/// are checked during decoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
  pub iss: String,
  pub exp: u64,
  #[serde(default)]
  pub sub: Option<String>,
  /// Space separated delegated scopes (Azure AD style)
  #[serde(default)]
  pub scp: Option<String>,
}

#[derive(Deserialize)]
struct OpenIdConfiguration {
  issuer: String,
  jwks_uri: String,
}

struct KeyCache {
  set: JwkSet,
  /// Last fetch attempt, successful or not
  fetched_at: Option<Instant>,
}

impl KeyCache {
  fn new(set: JwkSet, fetched_at: Option<Instant>) -> RwLock<Self> {
    RwLock::new(Self { set, fetched_at })
  }
}

pub struct TokenVerifier {
  issuer: String,
  audience: String,
  /// Where signing keys are refreshed from; `None` for a fixed key set
  jwks_uri: Option<String>,
  keys: RwLock<KeyCache>,
  refresh_interval: Duration,
  http: reqwest::Client,
}

impl TokenVerifier {
  /// Verifier over a fixed key set that is never refreshed.
  pub fn new(issuer: impl Into<String>, audience: impl Into<String>, keys: JwkSet) -> Self {
    Self {
      issuer: issuer.into(),
      audience: audience.into(),
      jwks_uri: None,
      keys: KeyCache::new(keys, None),
      refresh_interval: MIN_REFRESH_INTERVAL,
      http: reqwest::Client::new(),
    }
  }

  /// Load issuer and signing keys from `{authority}/.well-known/openid-configuration`.
  pub async fn discover(authority: &str, audience: &str) -> anyhow::Result<Self> {
    let http = reqwest::Client::new();
    let url = format!(
      "{}/.well-known/openid-configuration",
      authority.trim_end_matches('/')
    );

    let config: OpenIdConfiguration = http
      .get(&url)
      .send()
      .await
      .and_then(reqwest::Response::error_for_status)
      .with_context(|| format!("failed to fetch {url}"))?
      .json()
      .await
      .with_context(|| format!("invalid discovery document at {url}"))?;

    let keys = fetch_jwks(&http, &config.jwks_uri).await?;
    tracing::info!(
      issuer = %config.issuer,
      keys = keys.keys.len(),
      "loaded identity provider signing keys"
    );

    Ok(Self {
      issuer: config.issuer,
      audience: audience.to_owned(),
      jwks_uri: Some(config.jwks_uri),
      keys: KeyCache::new(keys, Some(Instant::now())),
      refresh_interval: MIN_REFRESH_INTERVAL,
      http,
    })
  }

  /// Override how often an unknown `kid` may trigger a refetch.
  #[must_use]
  pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
    self.refresh_interval = interval;
    self
  }

  pub fn issuer(&self) -> &str {
    &self.issuer
  }

  pub fn audience(&self) -> &str {
    &self.audience
  }

  pub async fn verify(&self, token: &str) -> Result<Claims, AppError> {
    let header = decode_header(token)
      .map_err(|e| AppError::unauthorized(format!("malformed token: {e}")))?;
    let kid = header.kid.as_deref();

    let mut key = self.decoding_key(kid).await?;
    // the provider may have rotated keys since we last looked
    if key.is_none()
      && let Some(kid) = kid
      && self.refresh_keys(kid).await
    {
      key = self.decoding_key(Some(kid)).await?;
    }
    let key = key.ok_or_else(|| AppError::unauthorized("unknown signing key"))?;

    let mut validation = Validation::new(header.alg);
    validation.set_audience(&[&self.audience]);
    validation.set_issuer(&[&self.issuer]);

    decode::<Claims>(token, &key, &validation)
      .map(|data| data.claims)
      .map_err(|e| {
        let reason = match e.kind() {
          ErrorKind::ExpiredSignature => "token expired",
          ErrorKind::InvalidSignature => "invalid signature",
          ErrorKind::InvalidAudience => "invalid audience",
          ErrorKind::InvalidIssuer => "invalid issuer",
          ErrorKind::InvalidAlgorithm => "algorithm does not match signing key",
          _ => "invalid token",
        };
        AppError::unauthorized(reason)
      })
  }

  async fn decoding_key(&self, kid: Option<&str>) -> Result<Option<DecodingKey>, AppError> {
    let cache = self.keys.read().await;
    let keys = &cache.set;
    let jwk: Option<&Jwk> = match kid {
      Some(kid) => keys.find(kid),
      // tokens without a kid are only accepted against a single-key set
      None if keys.keys.len() == 1 => keys.keys.first(),
      None => None,
    };

    jwk
      .map(DecodingKey::from_jwk)
      .transpose()
      .map_err(|e| AppError::unauthorized(format!("unusable signing key: {e}")))
  }

  /// Refetch the key set looking for `kid`. Returns true when `kid` is known
  /// afterwards. Fetches are rate limited and failures only logged, so a
  /// forged token can neither flood the provider nor turn into a 5xx.
  async fn refresh_keys(&self, kid: &str) -> bool {
    let Some(jwks_uri) = &self.jwks_uri else {
      return false;
    };

    // held across the fetch so concurrent misses share one request
    let mut cache = self.keys.write().await;
    if cache.set.find(kid).is_some() {
      return true;
    }
    if cache
      .fetched_at
      .is_some_and(|at| at.elapsed() < self.refresh_interval)
    {
      tracing::debug!(kid, "unknown signing key, refresh skipped");
      return false;
    }

    cache.fetched_at = Some(Instant::now());
    match fetch_jwks(&self.http, jwks_uri).await {
      Ok(set) => {
        tracing::info!(keys = set.keys.len(), "refreshed signing keys");
        cache.set = set;
        cache.set.find(kid).is_some()
      }
      Err(err) => {
        tracing::warn!(error = %format!("{err:#}"), "failed to refresh signing keys");
        false
      }
    }
  }
}

async fn fetch_jwks(http: &reqwest::Client, jwks_uri: &str) -> anyhow::Result<JwkSet> {
  http
    .get(jwks_uri)
    .send()
    .await
    .and_then(reqwest::Response::error_for_status)
    .with_context(|| format!("failed to fetch {jwks_uri}"))?
    .json()
    .await
    .with_context(|| format!("invalid key set at {jwks_uri}"))
}

#[cfg(test)]
mod tests {
  use std::{
    sync::{
      Arc,
      atomic::{AtomicUsize, Ordering},
    },
    time::{SystemTime, UNIX_EPOCH},
  };

  use axum::{Json, Router, routing::get};
  use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
  use serde_json::json;
  use tokio::net::TcpListener;

  use super::*;

  const SECRET: &[u8] = b"commandapi-integration-secret-for-tests";
  // base64 of SECRET
  const SECRET_B64: &str = "Y29tbWFuZGFwaS1pbnRlZ3JhdGlvbi1zZWNyZXQtZm9yLXRlc3Rz";
  const ISSUER: &str = "https://login.example.com/tenant/v2.0";
  const AUDIENCE: &str = "api://commands";

  fn key_set(kid: &str) -> JwkSet {
    serde_json::from_value(json!({
      "keys": [{ "kty": "oct", "kid": kid, "alg": "HS256", "k": SECRET_B64 }]
    }))
    .unwrap()
  }

  fn now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs()
  }

  fn token(kid: Option<&str>, claims: serde_json::Value) -> String {
    let header = Header {
      kid: kid.map(str::to_owned),
      ..Header::new(Algorithm::HS256)
    };
    encode(&header, &claims, &EncodingKey::from_secret(SECRET)).unwrap()
  }

  fn good_claims() -> serde_json::Value {
    json!({ "iss": ISSUER, "aud": AUDIENCE, "exp": now() + 600, "sub": "alice" })
  }

  #[tokio::test]
  async fn accepts_valid_token() {
    let verifier = TokenVerifier::new(ISSUER, AUDIENCE, key_set("k1"));

    let claims = verifier.verify(&token(Some("k1"), good_claims())).await.unwrap();

    assert_eq!(claims.iss, ISSUER);
    assert_eq!(claims.sub.as_deref(), Some("alice"));
  }

  #[tokio::test]
  async fn token_without_kid_uses_the_only_key() {
    let verifier = TokenVerifier::new(ISSUER, AUDIENCE, key_set("k1"));
    assert!(verifier.verify(&token(None, good_claims())).await.is_ok());
  }

  #[tokio::test]
  async fn rejects_unknown_kid() {
    let verifier = TokenVerifier::new(ISSUER, AUDIENCE, key_set("k1"));

    let err = verifier
      .verify(&token(Some("rotated"), good_claims()))
      .await
      .unwrap_err();

    assert_eq!(err.status_code(), 401);
    assert!(err.to_string().contains("unknown signing key"));
  }

  #[tokio::test]
  async fn rejects_wrong_audience() {
    let verifier = TokenVerifier::new(ISSUER, AUDIENCE, key_set("k1"));
    let claims = json!({ "iss": ISSUER, "aud": "api://other", "exp": now() + 600 });

    let err = verifier.verify(&token(Some("k1"), claims)).await.unwrap_err();

    assert!(err.to_string().contains("invalid audience"));
  }

  #[tokio::test]
  async fn rejects_wrong_issuer() {
    let verifier = TokenVerifier::new(ISSUER, AUDIENCE, key_set("k1"));
    let claims = json!({ "iss": "https://evil.example.com", "aud": AUDIENCE, "exp": now() + 600 });

    let err = verifier.verify(&token(Some("k1"), claims)).await.unwrap_err();

    assert!(err.to_string().contains("invalid issuer"));
  }

  #[tokio::test]
  async fn rejects_expired_token() {
    let verifier = TokenVerifier::new(ISSUER, AUDIENCE, key_set("k1"));
    let claims = json!({ "iss": ISSUER, "aud": AUDIENCE, "exp": now() - 3600 });

    let err = verifier.verify(&token(Some("k1"), claims)).await.unwrap_err();

    assert!(err.to_string().contains("token expired"));
  }

  #[tokio::test]
  async fn rejects_garbage() {
    let verifier = TokenVerifier::new(ISSUER, AUDIENCE, key_set("k1"));

    let err = verifier.verify("not-a-jwt").await.unwrap_err();

    assert_eq!(err.status_code(), 401);
  }

  /// Serve a discovery document and a key set on a local port. Returns the
  /// base url and a counter of key set fetches.
  async fn serve_provider(keys: serde_json::Value) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let discovery = json!({ "issuer": ISSUER, "jwks_uri": format!("{base}/keys") });
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    let app = Router::new()
      .route(
        "/.well-known/openid-configuration",
        get(move || {
          let discovery = discovery.clone();
          async move { Json(discovery) }
        }),
      )
      .route(
        "/keys",
        get(move || {
          counter.fetch_add(1, Ordering::SeqCst);
          let keys = keys.clone();
          async move { Json(keys) }
        }),
      );
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    (base, hits)
  }

  fn refreshing(jwks_uri: &str, keys: JwkSet) -> TokenVerifier {
    TokenVerifier {
      jwks_uri: Some(jwks_uri.to_owned()),
      ..TokenVerifier::new(ISSUER, AUDIENCE, keys)
    }
  }

  fn rotated_keys() -> serde_json::Value {
    json!({ "keys": [{ "kty": "oct", "kid": "k2", "alg": "HS256", "k": SECRET_B64 }] })
  }

  #[tokio::test]
  async fn discover_reads_issuer_and_keys_from_provider() {
    let (base, hits) = serve_provider(rotated_keys()).await;

    // trailing slash as in AUTH_INSTANCE + AUTH_TENANT
    let verifier = TokenVerifier::discover(&format!("{base}/"), AUDIENCE)
      .await
      .unwrap();

    assert_eq!(verifier.issuer(), ISSUER);
    assert_eq!(verifier.audience(), AUDIENCE);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert!(verifier.verify(&token(Some("k2"), good_claims())).await.is_ok());
  }

  #[tokio::test]
  async fn discover_fails_when_provider_is_unreachable() {
    assert!(TokenVerifier::discover("http://127.0.0.1:1/tenant", AUDIENCE).await.is_err());
  }

  #[tokio::test]
  async fn unknown_kid_refetches_keys_once() {
    let (base, hits) = serve_provider(rotated_keys()).await;
    let verifier = refreshing(&format!("{base}/keys"), key_set("k1"));

    let claims = verifier.verify(&token(Some("k2"), good_claims())).await.unwrap();
    assert_eq!(claims.sub.as_deref(), Some("alice"));
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    // k2 is cached now
    verifier.verify(&token(Some("k2"), good_claims())).await.unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn forged_kids_are_rate_limited() {
    let (base, hits) = serve_provider(json!({ "keys": [] })).await;
    let verifier = refreshing(&format!("{base}/keys"), key_set("k1"));

    for i in 0..20 {
      let kid = format!("random-{i}");
      let err = verifier
        .verify(&token(Some(&kid), good_claims()))
        .await
        .unwrap_err();
      assert_eq!(err.status_code(), 401);
    }

    assert_eq!(hits.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn concurrent_misses_share_one_fetch() {
    let (base, hits) = serve_provider(rotated_keys()).await;
    let verifier = Arc::new(refreshing(&format!("{base}/keys"), key_set("k1")));

    let tasks = (0..8)
      .map(|_| {
        let verifier = verifier.clone();
        tokio::spawn(async move { verifier.verify(&token(Some("k2"), good_claims())).await })
      })
      .collect::<Vec<_>>();
    for task in tasks {
      assert!(task.await.unwrap().is_ok());
    }

    assert_eq!(hits.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn refresh_is_allowed_again_after_interval() {
    let (base, hits) = serve_provider(json!({ "keys": [] })).await;
    let verifier =
      refreshing(&format!("{base}/keys"), key_set("k1")).with_refresh_interval(Duration::ZERO);

    for kid in ["a", "b", "c"] {
      let _ = verifier.verify(&token(Some(kid), good_claims())).await;
    }

    assert_eq!(hits.load(Ordering::SeqCst), 3);
  }

  #[tokio::test]
  async fn unreachable_provider_on_refresh_is_401() {
    let verifier = refreshing("http://127.0.0.1:1/keys", key_set("k1"));

    let err = verifier
      .verify(&token(Some("bogus"), good_claims()))
      .await
      .unwrap_err();

    assert_eq!(err.status_code(), 401);
    assert!(err.to_string().contains("unknown signing key"));
  }
}
