use chrono::{DateTime, NaiveTime, TimeDelta, Utc};
use oauth::{
    Now, OAuth, RandomSource, SecureRandom, SystemNow, TokenRequest, TokenResponse,
    id_token::{
        CachedKeySetSource, HttpKeySetSource, IdentityVerifier, KeySetSource, VerifiedClaims,
    },
};
use reqwest::{Client, redirect::Policy};
use std::marker::PhantomData;
use tracing::{debug, instrument};

use crate::{
    config::AppleConfig,
    error::Error,
    models::{AppleCallback, AuthorizationRequest, UserPayload},
    user::AppleUser,
    utils::{constant_time_equal, hash_secret},
};

const DEFAULT_SCOPES: [&str; 2] = ["name", "email"];

/// Key source of [`AppleOAuth::new`]: Apple's key endpoint behind a TTL cache.
pub type DefaultKeySource = CachedKeySetSource<HttpKeySetSource>;

/// OAuth 2.0 client for Sign in with Apple.
///
/// Handles authorization URL generation, the code exchange and identity token
/// verification, and maps the verified token to an [`AppleUser`].
///
/// Storing the pending [`AuthorizationRequest`] between the redirect and the
/// callback is up to the caller.
pub struct AppleOAuth<R = SecureRandom, N = SystemNow, S = DefaultKeySource> {
    config: AppleConfig,
    client: Client,
    verifier: IdentityVerifier<S, N>,
    scopes: Vec<String>,
    parameters: Vec<(String, String)>,
    _random: PhantomData<R>,
}

impl AppleOAuth {
    /// Creates a new [`AppleOAuth`] client talking to the configured endpoints.
    pub fn new(config: AppleConfig) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .redirect(Policy::none())
            .build()
            .map_err(|_| Error::OAuth(oauth::Error::BuildHttpClient))?;
        let keys = CachedKeySetSource::new(
            HttpKeySetSource::new(client.clone()),
            config.jwks_cache_ttl,
        )
        .with_min_refresh_interval(config.jwks_min_refresh_interval);
        Ok(Self::with_key_source(config, client, keys))
    }
}

impl<R, N, S> AppleOAuth<R, N, S>
where
    R: RandomSource,
    N: Now,
    S: KeySetSource,
{
    /// Creates a new [`AppleOAuth`] client that reads Apple's keys from `keys`.
    pub fn with_key_source(config: AppleConfig, client: Client, keys: S) -> Self {
        let verifier = IdentityVerifier::new(keys, config.jwks_url());
        Self {
            config,
            client,
            verifier,
            scopes: DEFAULT_SCOPES.map(str::to_string).to_vec(),
            parameters: Vec::new(),
            _random: PhantomData,
        }
    }

    /// Replaces the default `name email` scopes.
    #[must_use]
    pub fn with_scopes<I, T>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Adds query parameters to the authorization URL.
    ///
    /// They are applied last and overwrite parameters of the same name.
    #[must_use]
    pub fn with_parameters<I, K, V>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.parameters
            .extend(parameters.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    #[must_use]
    pub fn config(&self) -> &AppleConfig {
        &self.config
    }

    /// Builds the URL that sends the user to Apple's consent page.
    ///
    /// With a `state`, the URL also carries the matching nonce.
    pub fn authorization_url(&self, state: Option<&str>) -> Result<String, Error> {
        let nonce = state.map(|state| nonce_for(N::now(), state));
        self.build_authorization_url(state.zip(nonce.as_deref()))
    }

    /// Starts a login with a fresh random state.
    ///
    /// The returned request must be kept until the callback arrives.
    pub fn start_login(&self) -> Result<AuthorizationRequest, Error> {
        let state = OAuth::<R>::generate_state();
        let nonce = nonce_for(N::now(), &state);
        let url = self.build_authorization_url(Some((state.as_str(), nonce.as_str())))?;
        Ok(AuthorizationRequest { url, state, nonce })
    }

    fn build_authorization_url(&self, state_and_nonce: Option<(&str, &str)>) -> Result<String, Error> {
        let mut extra = vec![("response_mode", "form_post")];
        if let Some((state, nonce)) = state_and_nonce {
            extra.push(("state", state));
            extra.push(("nonce", nonce));
        }
        extra.extend(self.parameters.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        let scopes: Vec<&str> = self.scopes.iter().map(String::as_str).collect();
        let url = OAuth::<R>::generate_authorization_url(
            &self.config.auth_endpoint(),
            self.config.client_id(),
            &self.config.redirect_uri,
            &scopes,
            &extra,
        )?;
        Ok(url)
    }

    /// Exchanges an authorization code at Apple's token endpoint.
    #[instrument(skip_all, err)]
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, Error> {
        let client_id = self.config.client_id();
        let request = TokenRequest::authorization_code(code, &self.config.redirect_uri)
            .with_client_credentials(client_id, &self.config.client_secret);

        let response = OAuth::<R>::exchange_authorization_code::<TokenResponse>(
            &self.client,
            &self.config.token_endpoint(),
            client_id,
            &self.config.client_secret,
            &request,
        )
        .await?;
        Ok(response)
    }

    /// Verifies an identity token against the configured issuer and client ids.
    #[instrument(skip_all, err)]
    pub async fn verify_identity_token(&self, token: &str) -> Result<VerifiedClaims, Error> {
        let claims = self
            .verifier
            .verify(token, &self.config.issuer, &self.config.client_ids)
            .await?;
        Ok(claims)
    }

    /// Completes a login from the fields Apple posted to the redirect URI.
    ///
    /// With the pending `request`, the callback state and the token nonce
    /// must match it. Without one, neither is checked.
    #[instrument(skip_all, err)]
    pub async fn user(
        &self,
        callback: &AppleCallback,
        request: Option<&AuthorizationRequest>,
    ) -> Result<AppleUser, Error> {
        if let Some(request) = request {
            check_state(callback.state.as_deref(), &request.state)?;
        }
        let payload = callback
            .user
            .as_deref()
            .map(UserPayload::from_json)
            .transpose()
            .map_err(Error::InvalidUserPayload)?;

        let response = self.exchange_code(&callback.code).await?;
        let token = response.id_token.clone().ok_or(Error::MissingIdToken)?;

        let (issuer, audiences) = (&self.config.issuer, &self.config.client_ids);
        let claims = match request {
            Some(request) => {
                self.verifier
                    .verify_with_nonce(&token, issuer, audiences, &request.nonce)
                    .await?
            }
            None => self.verifier.verify(&token, issuer, audiences).await?,
        };
        debug!(sub = %claims.sub, "identity token verified");

        Ok(AppleUser::from_verified(claims, token, payload.as_ref()).with_token_response(response))
    }
}

/// `<UNIX seconds of 12:00:00 UTC on the day of now>-<state>`.
fn nonce_for(now: DateTime<Utc>, state: &str) -> String {
    let noon = now.date_naive().and_time(NaiveTime::MIN) + TimeDelta::hours(12);
    format!("{}-{state}", noon.and_utc().timestamp())
}

fn check_state(got: Option<&str>, want: &str) -> Result<(), Error> {
    let got = got.ok_or(Error::InvalidState)?;
    if !constant_time_equal(&hash_secret(got), &hash_secret(want)) {
        return Err(Error::InvalidState);
    }
    Ok(())
}
