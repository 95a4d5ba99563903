use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name of the user as Apple posts it to the redirect URI.
///
/// Apple sends it once, on the first authorization of the app.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppleName {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl AppleName {
    /// `"<first> <last>"`, trimmed. `None` when both parts are empty.
    #[must_use]
    pub fn full_name(&self) -> Option<String> {
        let full_name = format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or_default(),
            self.last_name.as_deref().unwrap_or_default()
        );
        let full_name = full_name.trim();
        (!full_name.is_empty()).then(|| full_name.to_string())
    }
}

/// The `user` field of Apple's form post.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UserPayload {
    #[serde(default)]
    pub name: Option<AppleName>,
    #[serde(default)]
    pub email: Option<String>,
}

impl UserPayload {
    /// Decodes `{"name": {...}, "email": ...}` or a bare
    /// `{"firstName": ..., "lastName": ...}` object.
    pub fn from_json(payload: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(payload)?;
        if value.get("firstName").is_some() || value.get("lastName").is_some() {
            return Ok(Self {
                name: Some(serde_json::from_value(value)?),
                email: None,
            });
        }
        serde_json::from_value(value)
    }

    #[must_use]
    pub fn full_name(&self) -> Option<String> {
        self.name.as_ref().and_then(AppleName::full_name)
    }
}

/// Fields Apple posts to the redirect URI with `response_mode=form_post`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AppleCallback {
    pub code: String,
    #[serde(default)]
    pub state: Option<String>,
    /// JSON encoded [`UserPayload`].
    #[serde(default)]
    pub user: Option<String>,
}

/// A login started with [`crate::AppleOAuth::start_login`].
///
/// The caller keeps it in its session store and passes it back with the
/// callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
    pub nonce: String,
}
