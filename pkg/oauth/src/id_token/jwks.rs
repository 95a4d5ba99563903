use jsonwebtoken::DecodingKey;
use reqwest::{Client, header::ACCEPT, redirect::Policy};
use std::{collections::HashMap, fmt, sync::Arc, time::Duration};
use tokio::{
    sync::{Mutex, RwLock},
    time::Instant,
};
use tonic::async_trait;
use tracing::debug;

use super::error::KeySetError;
use crate::{error::Error, models::Jwks};

/// One RSA public key of an issuer.
#[derive(Clone)]
pub struct KeyRecord {
    kid: Option<String>,
    key: DecodingKey,
}

impl KeyRecord {
    /// Reconstructs an RSA public key from base64url modulus and exponent.
    pub fn from_rsa_components(
        kid: Option<String>,
        modulus: &str,
        exponent: &str,
    ) -> Result<Self, jsonwebtoken::errors::Error> {
        Ok(Self {
            kid,
            key: DecodingKey::from_rsa_components(modulus, exponent)?,
        })
    }

    #[must_use]
    pub fn kid(&self) -> Option<&str> {
        self.kid.as_deref()
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.key
    }
}

impl fmt::Debug for KeyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRecord")
            .field("kid", &self.kid)
            .finish_non_exhaustive()
    }
}

/// The RSA signing keys an issuer currently publishes.
#[derive(Debug, Clone, Default)]
pub struct KeySet {
    keys: Vec<KeyRecord>,
}

impl KeySet {
    #[must_use]
    pub fn new(keys: Vec<KeyRecord>) -> Self {
        Self { keys }
    }

    /// Decodes a JWKS document.
    ///
    /// Keys that are not RSA signing keys for RS256, or whose components do
    /// not decode, are skipped.
    ///
    /// # Errors
    /// - the document is not a JWKS
    /// - no usable key remains
    pub fn from_json(document: &[u8]) -> Result<Self, KeySetError> {
        let jwks: Jwks = serde_json::from_slice(document)?;

        let keys: Vec<_> = jwks
            .keys
            .into_iter()
            .filter_map(|jwk| {
                let usable = jwk.kty == "RSA"
                    && jwk.usage.as_deref().is_none_or(|usage| usage == "sig")
                    && jwk.alg.as_deref().is_none_or(|alg| alg == "RS256");
                let (true, Some(n), Some(e)) = (usable, jwk.n.as_deref(), jwk.e.as_deref()) else {
                    debug!(kid = ?jwk.kid, kty = %jwk.kty, "skipping unusable jwk");
                    return None;
                };
                KeyRecord::from_rsa_components(jwk.kid.clone(), n, e)
                    .inspect_err(|err| debug!(kid = ?jwk.kid, %err, "skipping invalid rsa jwk"))
                    .ok()
            })
            .collect();

        if keys.is_empty() {
            return Err(KeySetError::NoUsableKeys);
        }
        Ok(Self { keys })
    }

    #[must_use]
    pub fn keys(&self) -> &[KeyRecord] {
        &self.keys
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Where an identity verifier gets issuer keys from.
#[cfg_attr(test, ::mock::client)]
#[async_trait]
pub trait KeySetSource: Send + Sync + 'static {
    /// Returns the key set published at `url`.
    async fn fetch_key_set(&self, url: &str) -> Result<Arc<KeySet>, KeySetError>;

    /// Returns a key set for `url` newer than `seen`, if one is available.
    ///
    /// Called after a signature did not verify against `seen`. `None` means
    /// retrying cannot help: the source does not cache, or it refreshed too
    /// recently to fetch again.
    async fn refresh_key_set(
        &self,
        _url: &str,
        _seen: &Arc<KeySet>,
    ) -> Result<Option<Arc<KeySet>>, KeySetError> {
        Ok(None)
    }
}

/// Fetches key sets over HTTP on every call.
#[derive(Debug, Clone)]
pub struct HttpKeySetSource {
    client: Client,
}

impl HttpKeySetSource {
    /// Creates a new [`HttpKeySetSource`] using the given client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Creates a new [`HttpKeySetSource`] whose requests fail after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(Policy::none())
            .build()
            .map_err(|_| Error::BuildHttpClient)?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl KeySetSource for HttpKeySetSource {
    async fn fetch_key_set(&self, url: &str) -> Result<Arc<KeySet>, KeySetError> {
        debug!(url, "fetching key set");
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(KeySetError::UnexpectedStatusCode(status));
        }

        let body = response.bytes().await?;
        Ok(Arc::new(KeySet::from_json(&body)?))
    }
}

/// Minimum time between two fetches of the same URL forced by
/// [`KeySetSource::refresh_key_set`].
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

struct CachedKeySet {
    keys: Arc<KeySet>,
    fetched_at: Instant,
}

enum Lookup {
    Fresh(Arc<KeySet>),
    Stale(Arc<KeySet>),
}

/// Caches key sets per URL for a fixed time to live.
///
/// Fresh entries are served under a shared read lock. Only one refresh runs
/// at a time; while it is in flight, callers that hold an expired entry get
/// that entry instead of waiting. Failed fetches are not cached.
///
/// Entries are replaced, never removed. A forced refresh after a signature
/// failure fetches at most once per `min_refresh_interval` and URL, so tokens
/// signed by unknown keys cannot drive upstream traffic.
pub struct CachedKeySetSource<S> {
    inner: S,
    ttl: Duration,
    min_refresh_interval: Duration,
    entries: RwLock<HashMap<String, CachedKeySet>>,
    refresh: Mutex<()>,
}

impl<S: KeySetSource> CachedKeySetSource<S> {
    /// Creates a new [`CachedKeySetSource`] in front of `inner`.
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
            entries: RwLock::new(HashMap::new()),
            refresh: Mutex::new(()),
        }
    }

    /// Sets the minimum time between two forced refreshes of one URL.
    #[must_use]
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    /// The source this cache reads through to.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn lookup(&self, url: &str) -> Option<Lookup> {
        let entries = self.entries.read().await;
        let entry = entries.get(url)?;
        let keys = Arc::clone(&entry.keys);
        if entry.fetched_at.elapsed() < self.ttl {
            Some(Lookup::Fresh(keys))
        } else {
            Some(Lookup::Stale(keys))
        }
    }

    /// Fetches from `inner` and replaces the entry. Callers hold `refresh`.
    async fn store(&self, url: &str) -> Result<Arc<KeySet>, KeySetError> {
        let keys = self.inner.fetch_key_set(url).await?;
        self.entries.write().await.insert(
            url.to_string(),
            CachedKeySet {
                keys: Arc::clone(&keys),
                fetched_at: Instant::now(),
            },
        );
        Ok(keys)
    }
}

#[async_trait]
impl<S: KeySetSource> KeySetSource for CachedKeySetSource<S> {
    async fn fetch_key_set(&self, url: &str) -> Result<Arc<KeySet>, KeySetError> {
        let stale = match self.lookup(url).await {
            Some(Lookup::Fresh(keys)) => return Ok(keys),
            Some(Lookup::Stale(keys)) => Some(keys),
            None => None,
        };

        let _refreshing = match self.refresh.try_lock() {
            Ok(guard) => guard,
            Err(_) => match stale {
                Some(keys) => {
                    debug!(url, "serving stale key set while refresh is in flight");
                    return Ok(keys);
                }
                None => self.refresh.lock().await,
            },
        };

        // Another task may have refreshed while we waited for the lock.
        if let Some(Lookup::Fresh(keys)) = self.lookup(url).await {
            return Ok(keys);
        }

        debug!(url, "refreshing cached key set");
        self.store(url).await
    }

    async fn refresh_key_set(
        &self,
        url: &str,
        seen: &Arc<KeySet>,
    ) -> Result<Option<Arc<KeySet>>, KeySetError> {
        let _refreshing = self.refresh.lock().await;

        if let Some(entry) = self.entries.read().await.get(url) {
            if !Arc::ptr_eq(&entry.keys, seen) {
                return Ok(Some(Arc::clone(&entry.keys)));
            }
            if entry.fetched_at.elapsed() < self.min_refresh_interval {
                debug!(url, "key set refreshed recently, not refetching");
                return Ok(None);
            }
        }

        debug!(url, "forcing key set refresh");
        self.store(url).await.map(Some)
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use std::{
        collections::VecDeque,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use super::*;

    /// Serves one fixed key set for every URL and counts fetches.
    #[derive(Debug)]
    pub struct StaticKeySetSource {
        keys: Arc<KeySet>,
        calls: AtomicUsize,
    }

    impl StaticKeySetSource {
        pub fn new(keys: KeySet) -> Self {
            Self {
                keys: Arc::new(keys),
                calls: AtomicUsize::new(0),
            }
        }

        /// Number of key set fetches so far.
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl KeySetSource for StaticKeySetSource {
        async fn fetch_key_set(&self, _url: &str) -> Result<Arc<KeySet>, KeySetError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::clone(&self.keys))
        }
    }

    /// Serves the given key sets in order, each after `delay`, then keeps
    /// serving the last one.
    #[derive(Debug)]
    pub struct DelayedKeySetSource {
        delay: Duration,
        keys: std::sync::Mutex<VecDeque<Arc<KeySet>>>,
        calls: AtomicUsize,
    }

    impl DelayedKeySetSource {
        pub fn new(delay: Duration, keys: impl IntoIterator<Item = Arc<KeySet>>) -> Self {
            Self {
                delay,
                keys: std::sync::Mutex::new(keys.into_iter().collect()),
                calls: AtomicUsize::new(0),
            }
        }

        /// Number of key set fetches so far.
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl KeySetSource for DelayedKeySetSource {
        async fn fetch_key_set(&self, _url: &str) -> Result<Arc<KeySet>, KeySetError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            let mut keys = self.keys.lock().unwrap_or_else(|err| err.into_inner());
            let next = if keys.len() > 1 {
                keys.pop_front()
            } else {
                keys.front().cloned()
            };
            next.ok_or(KeySetError::NoUsableKeys)
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::{Value, json};
    use std::collections::VecDeque;
    use testutils::TestKey;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    use super::*;

    const URL: &str = "https://appleid.apple.com/auth/keys";

    fn key_set(keys: &[TestKey]) -> Arc<KeySet> {
        let document = serde_json::to_vec(&testutils::jwks(keys)).unwrap();
        Arc::new(KeySet::from_json(&document).unwrap())
    }

    fn kids(keys: &KeySet) -> Vec<Option<&str>> {
        keys.keys().iter().map(KeyRecord::kid).collect()
    }

    #[test]
    fn test_key_set_from_json() {
        // given
        let document = testutils::jwks(&[TestKey::Primary, TestKey::Rotated]);

        // when
        let got = KeySet::from_json(&serde_json::to_vec(&document).unwrap()).unwrap();

        // then
        assert_eq!(
            kids(&got),
            vec![Some(TestKey::Primary.kid()), Some(TestKey::Rotated.kid())]
        );
    }

    #[rstest]
    #[case::ec_key(json!({"kty": "EC", "kid": "ec", "crv": "P-256", "x": "AQ", "y": "AQ"}))]
    #[case::encryption_key(json!({"kty": "RSA", "kid": "enc", "use": "enc", "n": "AQAB", "e": "AQAB"}))]
    #[case::other_algorithm(json!({"kty": "RSA", "kid": "rs512", "alg": "RS512", "n": "AQAB", "e": "AQAB"}))]
    #[case::missing_modulus(json!({"kty": "RSA", "kid": "no-n", "e": "AQAB"}))]
    #[case::invalid_modulus(json!({"kty": "RSA", "kid": "bad-n", "n": "***", "e": "AQAB"}))]
    fn test_key_set_from_json_skips_unusable_keys(#[case] unusable: Value) {
        // given
        let document = json!({"keys": [unusable.clone(), TestKey::Primary.jwk()]});
        let only_unusable = json!({"keys": [unusable]});

        // when
        let got = KeySet::from_json(&serde_json::to_vec(&document).unwrap()).unwrap();
        let got_only_unusable = KeySet::from_json(&serde_json::to_vec(&only_unusable).unwrap());

        // then
        assert_eq!(kids(&got), vec![Some(TestKey::Primary.kid())]);
        assert!(matches!(got_only_unusable, Err(KeySetError::NoUsableKeys)));
    }

    #[rstest]
    #[case::not_json(b"<html>".as_slice())]
    #[case::missing_keys(br#"{"kid": "x"}"#.as_slice())]
    #[case::keys_not_array(br#"{"keys": {}}"#.as_slice())]
    fn test_key_set_from_json_invalid_document(#[case] document: &[u8]) {
        assert!(matches!(
            KeySet::from_json(document),
            Err(KeySetError::Decode(_))
        ));
    }

    #[test]
    fn test_key_set_from_json_empty() {
        assert!(matches!(
            KeySet::from_json(br#"{"keys": []}"#),
            Err(KeySetError::NoUsableKeys)
        ));
    }

    #[tokio::test]
    async fn test_http_key_set_source() {
        // given
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/keys"))
            .respond_with(ResponseTemplate::new(200).set_body_json(testutils::jwks(&[TestKey::Primary])))
            .expect(1)
            .mount(&server)
            .await;
        let source = HttpKeySetSource::with_timeout(Duration::from_secs(5)).unwrap();

        // when
        let got = source
            .fetch_key_set(&format!("{}/auth/keys", server.uri()))
            .await
            .unwrap();

        // then
        assert_eq!(kids(&got), vec![Some(TestKey::Primary.kid())]);
    }

    #[rstest]
    #[case::server_error(ResponseTemplate::new(500), "unexpected HTTP status code")]
    #[case::not_found(ResponseTemplate::new(404), "unexpected HTTP status code")]
    #[case::garbage(ResponseTemplate::new(200).set_body_string("garbage"), "failed to decode")]
    #[case::no_keys(
        ResponseTemplate::new(200).set_body_json(json!({"keys": []})),
        "no usable RSA key"
    )]
    #[tokio::test]
    async fn test_http_key_set_source_failure(
        #[case] response: ResponseTemplate,
        #[case] want: &str,
    ) {
        // given
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/keys"))
            .respond_with(response)
            .mount(&server)
            .await;
        let source = HttpKeySetSource::with_timeout(Duration::from_secs(5)).unwrap();

        // when
        let got = source
            .fetch_key_set(&format!("{}/auth/keys", server.uri()))
            .await;

        // then
        let err = got.unwrap_err().to_string();
        assert!(err.contains(want), "{err}");
    }

    #[tokio::test]
    async fn test_http_key_set_source_timeout() {
        // given
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(testutils::jwks(&[TestKey::Primary]))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;
        let source = HttpKeySetSource::with_timeout(Duration::from_millis(100)).unwrap();

        // when
        let got = source.fetch_key_set(&server.uri()).await;

        // then
        assert!(matches!(got, Err(KeySetError::Request(err)) if err.is_timeout()));
    }

    fn mock_source(
        responses: impl IntoIterator<Item = Result<Arc<KeySet>, KeySetError>>,
    ) -> MockKeySetSource {
        MockKeySetSource {
            fetch_key_set: Mutex::new(responses.into_iter().collect::<VecDeque<_>>()),
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_key_set_source_serves_fresh_entry() {
        // given
        let source = CachedKeySetSource::new(
            mock_source([Ok(key_set(&[TestKey::Primary]))]),
            Duration::from_secs(60),
        );

        // when
        let first = source.fetch_key_set(URL).await.unwrap();
        tokio::time::advance(Duration::from_secs(59)).await;
        let second = source.fetch_key_set(URL).await.unwrap();

        // then
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.inner.fetch_key_set_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_key_set_source_refreshes_after_ttl() {
        // given
        let source = CachedKeySetSource::new(
            mock_source([
                Ok(key_set(&[TestKey::Primary])),
                Ok(key_set(&[TestKey::Rotated])),
            ]),
            Duration::from_secs(60),
        );

        // when
        source.fetch_key_set(URL).await.unwrap();
        tokio::time::advance(Duration::from_secs(60)).await;
        let got = source.fetch_key_set(URL).await.unwrap();

        // then
        assert_eq!(kids(&got), vec![Some(TestKey::Rotated.kid())]);
        assert_eq!(source.inner.fetch_key_set_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_key_set_source_keys_by_url() {
        // given
        let source = CachedKeySetSource::new(
            mock_source([
                Ok(key_set(&[TestKey::Primary])),
                Ok(key_set(&[TestKey::Rotated])),
            ]),
            Duration::from_secs(60),
        );

        // when
        let first = source.fetch_key_set(URL).await.unwrap();
        let other = source.fetch_key_set("https://other.example.com/keys").await.unwrap();

        // then
        assert_eq!(kids(&first), vec![Some(TestKey::Primary.kid())]);
        assert_eq!(kids(&other), vec![Some(TestKey::Rotated.kid())]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_key_set_source_refresh_key_set() {
        // given
        let source = CachedKeySetSource::new(
            mock_source([
                Ok(key_set(&[TestKey::Primary])),
                Ok(key_set(&[TestKey::Primary, TestKey::Rotated])),
            ]),
            Duration::from_secs(3600),
        );
        let seen = source.fetch_key_set(URL).await.unwrap();
        tokio::time::advance(DEFAULT_MIN_REFRESH_INTERVAL).await;

        // when
        let got = source.refresh_key_set(URL, &seen).await.unwrap().unwrap();
        let cached = source.fetch_key_set(URL).await.unwrap();

        // then
        assert_eq!(
            kids(&got),
            vec![Some(TestKey::Primary.kid()), Some(TestKey::Rotated.kid())]
        );
        assert!(Arc::ptr_eq(&got, &cached));
        assert_eq!(source.inner.fetch_key_set_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_key_set_source_refresh_key_set_rate_limited() {
        // given
        let source = CachedKeySetSource::new(
            mock_source([
                Ok(key_set(&[TestKey::Primary])),
                Ok(key_set(&[TestKey::Rotated])),
            ]),
            Duration::from_secs(3600),
        );
        let seen = source.fetch_key_set(URL).await.unwrap();
        tokio::time::advance(Duration::from_secs(59)).await;

        // when
        let mut refreshed = Vec::new();
        for _ in 0..10 {
            refreshed.push(source.refresh_key_set(URL, &seen).await.unwrap());
        }
        let cached = source.fetch_key_set(URL).await.unwrap();

        // then: the entry stays in place and upstream is not asked again
        assert!(refreshed.iter().all(Option::is_none));
        assert!(Arc::ptr_eq(&seen, &cached));
        assert_eq!(source.inner.fetch_key_set_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_key_set_source_refresh_key_set_returns_newer_entry() {
        // given: one caller already replaced the entry it saw
        let source = CachedKeySetSource::new(
            mock_source([
                Ok(key_set(&[TestKey::Primary])),
                Ok(key_set(&[TestKey::Rotated])),
            ]),
            Duration::from_secs(3600),
        )
        .with_min_refresh_interval(Duration::ZERO);
        let seen = source.fetch_key_set(URL).await.unwrap();
        let first = source.refresh_key_set(URL, &seen).await.unwrap().unwrap();

        // when: a second caller that saw the same old entry
        let second = source.refresh_key_set(URL, &seen).await.unwrap().unwrap();

        // then
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(kids(&second), vec![Some(TestKey::Rotated.kid())]);
        assert_eq!(source.inner.fetch_key_set_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_key_set_source_refresh_key_set_failure_keeps_entry() {
        // given
        let source = CachedKeySetSource::new(
            mock_source([
                Ok(key_set(&[TestKey::Primary])),
                Err(KeySetError::NoUsableKeys),
            ]),
            Duration::from_secs(3600),
        )
        .with_min_refresh_interval(Duration::ZERO);
        let seen = source.fetch_key_set(URL).await.unwrap();

        // when
        let got = source.refresh_key_set(URL, &seen).await;
        let cached = source.fetch_key_set(URL).await.unwrap();

        // then
        assert!(matches!(got, Err(KeySetError::NoUsableKeys)));
        assert!(Arc::ptr_eq(&seen, &cached));
        assert_eq!(source.inner.fetch_key_set_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_key_set_source_does_not_cache_failures() {
        // given
        let source = CachedKeySetSource::new(
            mock_source([
                Err(KeySetError::NoUsableKeys),
                Ok(key_set(&[TestKey::Primary])),
            ]),
            Duration::from_secs(60),
        );

        // when
        let first = source.fetch_key_set(URL).await;
        let second = source.fetch_key_set(URL).await;

        // then
        assert!(matches!(first, Err(KeySetError::NoUsableKeys)));
        assert!(second.is_ok());
        assert_eq!(source.inner.fetch_key_set_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_key_set_source_serves_stale_entry_during_refresh() {
        // given
        let source = CachedKeySetSource::new(
            mock_source([Ok(key_set(&[TestKey::Primary]))]),
            Duration::from_secs(60),
        );
        let cached = source.fetch_key_set(URL).await.unwrap();
        tokio::time::advance(Duration::from_secs(120)).await;

        // when: another task holds the refresh lock
        let refreshing = source.refresh.lock().await;
        let got = source.fetch_key_set(URL).await.unwrap();
        drop(refreshing);

        // then
        assert!(Arc::ptr_eq(&cached, &got));
        assert_eq!(source.inner.fetch_key_set_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_key_set_source_single_flight_on_empty_cache() {
        // given
        let source = CachedKeySetSource::new(
            mock::DelayedKeySetSource::new(
                Duration::from_secs(1),
                [key_set(&[TestKey::Primary])],
            ),
            Duration::from_secs(60),
        );

        // when
        let (a, b, c, d, e) = tokio::join!(
            source.fetch_key_set(URL),
            source.fetch_key_set(URL),
            source.fetch_key_set(URL),
            source.fetch_key_set(URL),
            source.fetch_key_set(URL),
        );

        // then
        let a = a.unwrap();
        for got in [b, c, d, e] {
            assert!(Arc::ptr_eq(&a, &got.unwrap()));
        }
        assert_eq!(source.inner.calls(), 1);
    }
}
