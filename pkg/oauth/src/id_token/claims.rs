use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Number, Value};
use std::ops::Deref;

use super::error::VerifyError;

/// Claims of an identity token.
///
/// The claims consumed by verification and user mapping are typed; anything
/// else the issuer sends is kept in [`ClaimSet::extra`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimSet {
    /// Issuer Identifier.
    pub iss: String,

    /// Audience(s) the token is intended for.
    pub aud: Audience,

    /// Expiration time (UNIX timestamp).
    #[serde(deserialize_with = "numeric_date")]
    pub exp: i64,

    /// Subject Identifier, unique and stable per user.
    pub sub: String,

    /// Issued-at time (UNIX timestamp).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// The user's email address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// The user's display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Value echoed from the authorization request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    /// Claims without a typed field.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The `aud` claim, a single string or an array of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Multiple(Vec<String>),
}

impl Audience {
    /// Iterates over every audience in the claim.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let audiences = match self {
            Self::Single(aud) => std::slice::from_ref(aud),
            Self::Multiple(auds) => auds.as_slice(),
        };
        audiences.iter().map(String::as_str)
    }
}

/// Client identifiers accepted as token audience.
///
/// One deployment may be configured with several comma separated client ids;
/// every entry is trimmed and empty entries are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudienceSet(Vec<String>);

impl AudienceSet {
    /// Creates an audience set from individual client identifiers.
    pub fn new<I, S>(audiences: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            audiences
                .into_iter()
                .map(|aud| aud.as_ref().trim().to_string())
                .filter(|aud| !aud.is_empty())
                .collect(),
        )
    }

    /// Parses a comma separated list such as `"com.example.app, com.example.web"`.
    #[must_use]
    pub fn from_comma_separated(audiences: &str) -> Self {
        Self::new(audiences.split(','))
    }

    /// The first configured client identifier.
    #[must_use]
    pub fn primary(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, aud: &str) -> bool {
        self.0.iter().any(|accepted| accepted == aud)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A claim set whose token passed every verification step.
///
/// Only the identity verifier creates values of this type, so anything built
/// from it is backed by a verified token.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedClaims(ClaimSet);

impl VerifiedClaims {
    pub(crate) fn new(claims: ClaimSet) -> Self {
        Self(claims)
    }

    #[must_use]
    pub fn into_inner(self) -> ClaimSet {
        self.0
    }
}

impl Deref for VerifiedClaims {
    type Target = ClaimSet;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Checks issuer, audience and expiry, in that order.
///
/// The first failing check determines the error.
pub fn validate_claims(
    claims: &ClaimSet,
    issuer: &str,
    audiences: &AudienceSet,
    now: DateTime<Utc>,
) -> Result<(), VerifyError> {
    if claims.iss != issuer {
        return Err(VerifyError::InvalidIssuer);
    }

    if !claims.aud.iter().any(|aud| audiences.contains(aud)) {
        return Err(VerifyError::InvalidAudience);
    }

    if claims.exp <= now.timestamp() {
        return Err(VerifyError::TokenExpired);
    }

    Ok(())
}

/// Checks that the token echoes the nonce sent with the authorization request.
pub fn validate_nonce(claims: &ClaimSet, expected: &str) -> Result<(), VerifyError> {
    match claims.nonce.as_deref() {
        Some(nonce) if nonce == expected => Ok(()),
        _ => Err(VerifyError::InvalidNonce),
    }
}

/// NumericDate per RFC 7519; fractional seconds are truncated.
fn numeric_date<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let number = Number::deserialize(deserializer)?;
    number
        .as_i64()
        .or_else(|| number.as_f64().map(|secs| secs.trunc() as i64))
        .ok_or_else(|| serde::de::Error::custom("exp is not a valid NumericDate"))
}
