use oauth::{
    TokenResponse,
    id_token::{ClaimSet, VerifiedClaims},
};
use serde::Serialize;

use crate::models::UserPayload;

/// A user who signed in with Apple.
///
/// Only built from [`VerifiedClaims`], so every field comes from a verified
/// identity token or from the token response that carried it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppleUser {
    /// Apple's stable subject identifier.
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    /// All claims of the identity token.
    pub claims: ClaimSet,
    /// The identity token as received.
    pub token: String,
    /// The token endpoint response that carried the identity token.
    pub token_response: Option<TokenResponse>,
}

impl AppleUser {
    /// Maps verified claims to a user.
    ///
    /// The name posted by Apple on first authorization takes precedence over
    /// a `name` claim. The email always comes from the token.
    #[must_use]
    pub fn from_verified(
        claims: VerifiedClaims,
        token: impl Into<String>,
        payload: Option<&UserPayload>,
    ) -> Self {
        let claims = claims.into_inner();
        let name = payload
            .and_then(UserPayload::full_name)
            .or_else(|| claims.name.clone());

        Self {
            id: claims.sub.clone(),
            name,
            email: claims.email.clone(),
            claims,
            token: token.into(),
            token_response: None,
        }
    }

    /// Attaches the token endpoint response.
    #[must_use]
    pub fn with_token_response(mut self, response: TokenResponse) -> Self {
        self.token_response = Some(response);
        self
    }
}
