use base64::{Engine as _, prelude::BASE64_URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{Value, json};
use tonic::{Code, Status};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

/// RSA key pairs used to sign test tokens.
///
/// The private keys are test-only fixtures checked into `keys/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestKey {
    /// The key the issuer currently signs with.
    Primary,
    /// The key the issuer rotates to.
    Rotated,
}

impl TestKey {
    pub fn kid(self) -> &'static str {
        match self {
            Self::Primary => "primary-key",
            Self::Rotated => "rotated-key",
        }
    }

    pub fn private_pem(self) -> &'static [u8] {
        match self {
            Self::Primary => include_bytes!("../keys/primary.pem"),
            Self::Rotated => include_bytes!("../keys/rotated.pem"),
        }
    }

    fn modulus(self) -> &'static str {
        match self {
            Self::Primary => concat!(
                "okeKLG6ymN-MVTXgD3qfixGavnqhOA9iznbPKxJ75tXnF4Xd088yCi-oXGpd_enN3SYDHXgcCOG4JTNgFQgwD19VNXxDc",
                "dLsCsMGSloPRp7FHVEPkZ8KnDmEUH6esOBRSXIfsfDhRap7jUnV9SQZ7Xa3ws1SsdbH_ek7iACQdYL9iBMD6GzND4d4TJ",
                "ZuwHmDNkwebEyz9teXeQKs0V8e4qz_ekhEpFhagEf3ZjhyCoQPCPVAjNrfWGuzSvEAyHSHX6IJnR2WgbOMB4Y7N_Kh-T5",
                "pJ7bIVE5C7EHyXfPMwNTbQBCqlDbB8w8XG7OYZyRoTwXg6js2k4rkvw_1kjpVSQ",
            ),
            Self::Rotated => concat!(
                "uOPgQItmLReh9SRdT0Jq1MdH4gEMgozuj8z9EVgA1w0nhStuIeFL-wQjGR5UIGnKSE1M3Zu0HmwHXcruPEr6C3ZYV2WpM",
                "rougOwkam2yvNujP67ZlzTPBw-zwiE4ibaF_4Q5DheIlC7k09s_RMm9mgj-8MRQ4vtKeVcyUVm1m1ISJ8WUh_Y2GSh4Gk",
                "1BaSN-f9MNL3y0cTUQ0cNiWv4Zw1PQiWuN5MizfOCzn3QBRvxqov_BuURRVNXHaAlP6gIuLYmNCNCO06_eqTXFbEM03-a",
                "YbODgqa0qAvJ0Tuq5eEwsoXeSHQH2K8QUL5ot3_tjJAdURkIq-fAos0bk7o8KFQ",
            ),
        }
    }

    /// The public half as a JWK, shaped like the entries Apple publishes.
    pub fn jwk(self) -> Value {
        json!({
            "kty": "RSA",
            "kid": self.kid(),
            "use": "sig",
            "alg": "RS256",
            "n": self.modulus(),
            "e": "AQAB",
        })
    }
}

/// A JWKS document containing `keys`.
pub fn jwks(keys: &[TestKey]) -> Value {
    json!({ "keys": keys.iter().map(|key| key.jwk()).collect::<Vec<_>>() })
}

/// Signs `claims` with RS256 and the key's `kid` in the header.
pub fn sign(claims: &Value, key: TestKey) -> String {
    sign_with_kid(claims, key, Some(key.kid()))
}

/// Signs `claims` with RS256 and an arbitrary (or no) `kid` in the header.
pub fn sign_with_kid(claims: &Value, key: TestKey, kid: Option<&str>) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(str::to_string);
    let encoding_key =
        EncodingKey::from_rsa_pem(key.private_pem()).expect("test key is a valid RSA pem");
    jsonwebtoken::encode(&header, claims, &encoding_key).expect("failed to sign test token")
}

/// Claims of an identity token as Apple issues them.
pub fn apple_claims(issuer: &str, audience: &str, exp: i64) -> Value {
    json!({
        "iss": issuer,
        "aud": audience,
        "exp": exp,
        "iat": exp - 600,
        "sub": "001.abc",
        "email": "user@example.com",
        "email_verified": "true",
        "auth_time": exp - 660,
    })
}

/// Unpadded base64url, the encoding of compact token segments.
pub fn base64_url(bytes: &[u8]) -> String {
    BASE64_URL_SAFE_NO_PAD.encode(bytes)
}

/// Rewrites the payload of a signed token while keeping its header and signature.
pub fn tamper_payload<F>(token: &str, func: F) -> String
where
    F: FnOnce(&mut Value),
{
    let segments: Vec<_> = token.split('.').collect();
    let [header, payload, signature] = segments.as_slice() else {
        panic!("not a compact token: {token}");
    };
    let payload = BASE64_URL_SAFE_NO_PAD
        .decode(payload)
        .expect("payload is not base64url");
    let mut claims: Value = serde_json::from_slice(&payload).expect("payload is not json");
    func(&mut claims);
    let payload = base64_url(&serde_json::to_vec(&claims).expect("failed to encode claims"));
    format!("{header}.{payload}.{signature}")
}

/// A stub of Apple's key and token endpoints.
pub struct MockAppleServer {
    server: MockServer,
}

impl MockAppleServer {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Base URL to configure in place of `https://appleid.apple.com`.
    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Serves a JWKS document with `keys` at `/auth/keys`.
    pub async fn mount_keys(&self, keys: &[TestKey]) {
        Mock::given(method("GET"))
            .and(path("/auth/keys"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks(keys)))
            .mount(&self.server)
            .await;
    }

    /// Serves a JWKS document with `keys` for the next request only.
    ///
    /// Mount before [`Self::mount_keys`] to simulate a key rotation.
    pub async fn mount_keys_once(&self, keys: &[TestKey]) {
        Mock::given(method("GET"))
            .and(path("/auth/keys"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks(keys)))
            .up_to_n_times(1)
            .mount(&self.server)
            .await;
    }

    /// Answers `/auth/keys` with `status` and an empty body.
    pub async fn fail_keys(&self, status: u16) {
        Mock::given(method("GET"))
            .and(path("/auth/keys"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Answers `/auth/token` with `status` and `body`.
    pub async fn mount_token(&self, status: u16, body: Value) {
        Mock::given(method("POST"))
            .and(path("/auth/token"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Requests received so far whose path is `path`.
    pub async fn requests_to(&self, request_path: &str) -> Vec<wiremock::Request> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|request| request.url.path() == request_path)
            .collect()
    }
}

/// Asserts that a result matches the expected value or gRPC status code.
pub fn assert_status<T: PartialEq + std::fmt::Debug>(
    got: Result<T, Status>,
    want: Result<T, Code>,
) {
    match (got, want) {
        (Ok(got), Ok(want)) => assert_eq!(got, want),
        (Err(got), Err(want)) => assert_eq!(got.code(), want),
        (Ok(got), Err(want)) => panic!("left: {got:?}\nright: {want}"),
        (Err(got), Ok(want)) => panic!("left: {got}\nright: {want:?}"),
    }
}
