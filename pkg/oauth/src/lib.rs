mod clock;
mod error;
pub mod id_token;
mod models;
mod oauth;
mod random;
pub use clock::Now;
pub use clock::SystemNow;
pub use error::Error;
pub use models::TokenRequest;
pub use models::TokenResponse;
pub use oauth::OAuth;
pub use random::RandomSource;
pub use random::SecureRandom;

#[cfg(feature = "test-utils")]
pub mod mock {
    pub use crate::clock::mock::{MOCK_NOW_TIMESTAMP, MockNow};
    pub use crate::id_token::{DelayedKeySetSource, StaticKeySetSource};
    pub use crate::random::mock::MockRandom;
}
