//! OpenID Connect identity token verification.
//!
//! [`IdentityVerifier`] composes the pieces in this module: [`ParsedToken`]
//! decodes the compact token, [`validate_claims`] checks issuer, audience and
//! expiry, a [`KeySetSource`] provides the issuer's keys and
//! [`verify_signature`] checks the RS256 signature.
mod claims;
mod error;
mod jwks;
mod signature;
mod token;
mod verifier;

pub use claims::{
    Audience, AudienceSet, ClaimSet, VerifiedClaims, validate_claims, validate_nonce,
};
pub use error::{KeySetError, VerifyError};
pub use jwks::{
    CachedKeySetSource, DEFAULT_MIN_REFRESH_INTERVAL, HttpKeySetSource, KeyRecord, KeySet,
    KeySetSource,
};
pub use signature::verify_signature;
pub use token::{ParsedToken, TokenHeader};
pub use verifier::IdentityVerifier;

#[cfg(feature = "test-utils")]
pub use jwks::mock::{DelayedKeySetSource, StaticKeySetSource};
