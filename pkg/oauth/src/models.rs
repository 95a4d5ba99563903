use serde::{Deserialize, Serialize};

/// Form body of an authorization code grant.
///
/// Client credentials are sent both as HTTP Basic auth and in the body when
/// the provider expects them there.
#[derive(Debug, Clone, Serialize)]
pub struct TokenRequest<'a> {
    pub grant_type: &'a str,
    pub code: &'a str,
    pub redirect_uri: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<&'a str>,
}

impl<'a> TokenRequest<'a> {
    /// Creates an `authorization_code` grant request.
    #[must_use]
    pub fn authorization_code(code: &'a str, redirect_uri: &'a str) -> Self {
        Self {
            grant_type: "authorization_code",
            code,
            redirect_uri,
            client_id: None,
            client_secret: None,
        }
    }

    /// Repeats the client credentials in the form body.
    #[must_use]
    pub fn with_client_credentials(mut self, client_id: &'a str, client_secret: &'a str) -> Self {
        self.client_id = Some(client_id);
        self.client_secret = Some(client_secret);
        self
    }
}

/// Token endpoint response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    pub token_type: Option<String>,
    pub expires_in: Option<u64>,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
    pub scope: Option<String>,
}

/// Represents a JSON Web Key Set (JWKS).
#[derive(Debug, Deserialize)]
pub(crate) struct Jwks {
    /// The list of JSON Web Keys.
    pub(crate) keys: Vec<Jwk>,
}

/// Represents a single JSON Web Key (JWK).
#[derive(Debug, Deserialize)]
pub(crate) struct Jwk {
    /// Key type (e.g., "RSA")
    pub(crate) kty: String,
    /// Key ID
    #[serde(default)]
    pub(crate) kid: Option<String>,
    /// Algorithm (e.g., "RS256")
    #[serde(default)]
    pub(crate) alg: Option<String>,
    /// Intended use ("sig" or "enc")
    #[serde(default, rename = "use")]
    pub(crate) usage: Option<String>,
    /// RSA modulus
    #[serde(default)]
    pub(crate) n: Option<String>,
    /// RSA exponent
    #[serde(default)]
    pub(crate) e: Option<String>,
}
