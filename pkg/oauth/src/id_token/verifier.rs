use std::marker::PhantomData;
use tracing::debug;

use super::{
    claims::{AudienceSet, VerifiedClaims, validate_claims, validate_nonce},
    error::VerifyError,
    jwks::KeySetSource,
    signature::verify_signature,
    token::ParsedToken,
};
use crate::clock::{Now, SystemNow};

/// Verifies identity tokens issued by one OpenID provider.
///
/// Checks run in a fixed order and the first failure wins: parse, issuer,
/// audience, expiry, key set fetch, signature. Claims are validated before any
/// network or cryptographic work.
///
/// When the signature does not verify, the key source is asked once for a
/// newer key set, so rotated keys are picked up without waiting for the cache
/// to expire.
#[derive(Debug)]
pub struct IdentityVerifier<S, N = SystemNow> {
    keys: S,
    jwks_url: String,
    _now: PhantomData<N>,
}

impl<S, N> IdentityVerifier<S, N>
where
    S: KeySetSource,
    N: Now,
{
    /// Creates a new [`IdentityVerifier`] reading keys from `jwks_url`.
    pub fn new(keys: S, jwks_url: impl Into<String>) -> Self {
        Self {
            keys,
            jwks_url: jwks_url.into(),
            _now: PhantomData,
        }
    }

    /// Verifies `token` and returns its claims.
    ///
    /// # Errors
    /// Returns the [`VerifyError`] of the first failing check.
    pub async fn verify(
        &self,
        token: &str,
        issuer: &str,
        audiences: &AudienceSet,
    ) -> Result<VerifiedClaims, VerifyError> {
        let token = ParsedToken::parse(token)?;
        validate_claims(&token.claims, issuer, audiences, N::now())?;

        let kid = token.header.kid.as_deref();
        let keys = self.keys.fetch_key_set(&self.jwks_url).await?;
        if let Err(err) = verify_signature(token.signing_input(), token.signature(), kid, &keys) {
            if !matches!(err, VerifyError::SignatureInvalid) {
                return Err(err);
            }
            let Some(keys) = self.keys.refresh_key_set(&self.jwks_url, &keys).await? else {
                return Err(err);
            };
            debug!(kid = ?kid, "signature did not verify, retrying with newer keys");
            verify_signature(token.signing_input(), token.signature(), kid, &keys)?;
        }

        Ok(VerifiedClaims::new(token.claims))
    }

    /// Verifies `token` and checks that it echoes `nonce`.
    ///
    /// # Errors
    /// Returns [`VerifyError::InvalidNonce`] if the token verifies but its
    /// `nonce` claim is missing or different.
    pub async fn verify_with_nonce(
        &self,
        token: &str,
        issuer: &str,
        audiences: &AudienceSet,
        nonce: &str,
    ) -> Result<VerifiedClaims, VerifyError> {
        let claims = self.verify(token, issuer, audiences).await?;
        validate_nonce(&claims, nonce)?;
        Ok(claims)
    }
}
