use reqwest::{
    Client,
    header::{ACCEPT, CONTENT_TYPE},
};
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use tracing::debug;
use url::Url;

use crate::{error::Error, models::TokenRequest, random::RandomSource};

/// Generic OAuth 2.0 helper that abstracts state generation, authorization URL
/// creation and the authorization code exchange.
pub struct OAuth<R> {
    _phantom: PhantomData<R>,
}

impl<R: RandomSource> OAuth<R> {
    /// Generates the OAuth `state` (CSRF protection token).
    #[must_use]
    pub fn generate_state() -> String {
        R::base64_url(32)
    }

    /// Constructs the OAuth 2.0 authorization URL.
    ///
    /// `extra` parameters are applied after the standard ones; a parameter
    /// already present is overwritten in place, anything else is appended.
    pub fn generate_authorization_url(
        auth_endpoint: &str,
        client_id: &str,
        redirect_uri: &str,
        scopes: &[&str],
        extra: &[(&str, &str)],
    ) -> Result<String, Error> {
        let scopes = scopes.join(" ");
        let mut params = vec![("client_id", client_id), ("redirect_uri", redirect_uri)];
        if !scopes.is_empty() {
            params.push(("scope", scopes.as_str()));
        }
        params.push(("response_type", "code"));

        for &(key, value) in extra {
            match params.iter_mut().find(|(k, _)| *k == key) {
                Some(param) => param.1 = value,
                None => params.push((key, value)),
            }
        }

        let url = Url::parse_with_params(auth_endpoint, &params)?;
        Ok(url.into())
    }

    /// Exchanges an authorization code for a token response.
    ///
    /// The client authenticates with HTTP Basic auth. Redirects are not
    /// followed; configure the [`Client`] accordingly.
    pub async fn exchange_authorization_code<T: DeserializeOwned>(
        client: &Client,
        token_endpoint: &str,
        client_id: &str,
        client_secret: &str,
        request: &TokenRequest<'_>,
    ) -> Result<T, Error> {
        let body = serde_urlencoded::to_string(request)?;

        let response = client
            .post(token_endpoint)
            .basic_auth(client_id, Some(client_secret))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(ACCEPT, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        debug!(%status, token_endpoint, "token endpoint responded");
        if !status.is_success() {
            return Err(Error::UnexpectedStatusCode(status));
        }

        Ok(response.json::<T>().await?)
    }
}
