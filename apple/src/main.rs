use apple::{AppleConfig, AppleOAuth};
use dotenv::dotenv;
use std::error::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Verifies an Apple identity token and prints its claims as JSON.
///
/// Usage: `apple <identity-token>`
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    init_tracing();

    let token = std::env::args()
        .nth(1)
        .ok_or("usage: apple <identity-token>")?;

    let config = AppleConfig::from_env()?;
    info!(issuer = %config.issuer, client_id = config.client_id(), "verifying identity token");
    let apple = AppleOAuth::new(config)?;

    let claims = apple.verify_identity_token(token.trim()).await?;
    println!("{}", serde_json::to_string_pretty(&*claims)?);

    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    if std::env::var("LOG_FORMAT").unwrap_or_default() == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
