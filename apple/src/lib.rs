//! Sign in with Apple.
//!
//! [`AppleOAuth`] builds the authorization URL, exchanges the authorization
//! code Apple posts back, verifies the identity token against Apple's
//! published keys and maps it to an [`AppleUser`].
mod config;
mod error;
mod models;
mod provider;
mod user;
mod utils;

pub use config::{AppleConfig, DEFAULT_BASE_URL, DEFAULT_ISSUER};
pub use error::Error;
pub use models::{AppleCallback, AppleName, AuthorizationRequest, UserPayload};
pub use provider::{AppleOAuth, DefaultKeySource};
pub use user::AppleUser;
