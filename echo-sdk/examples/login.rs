//! Log in, print the credential bundle, then log in again from it
//!
//! Reads `ECHO_EMAIL`, `ECHO_PASSWORD` and optionally `ECHO_OTP` and
//! `ECHO_SITE` from the environment. The printed JSON is what an application
//! would persist and hand back to `EchoClient::from_credentials` later.
//!
//! Run with: ECHO_LOG_MODE=development cargo run -p echo-sdk --example login

use echo_sdk::{logging, ClientConfig, EchoClient, SdkError};

fn env(name: &str) -> Result<String, SdkError> {
    std::env::var(name).map_err(|_| SdkError::Config(format!("{} is not set", name)))
}

#[tokio::main]
async fn main() -> Result<(), SdkError> {
    logging::init_logging_from_env().map_err(|e| SdkError::Config(e.to_string()))?;

    let email = env("ECHO_EMAIL")?;
    let password = env("ECHO_PASSWORD")?;
    let otp = std::env::var("ECHO_OTP").ok();

    let mut config = ClientConfig::default();
    if let Ok(site) = std::env::var("ECHO_SITE") {
        config = config.with_site(site);
    }

    let client = EchoClient::new(&email, password.as_str(), config.clone())?;
    let bundle = client.login_interactive(otp.as_deref()).await?;

    println!("Logged in on {}", client.site());
    println!("Language: {}", client.language());
    match client.account_customer_id() {
        Some(id) => println!("Account customer id: {}", id),
        None => println!("Account customer id not resolved"),
    }

    let json = bundle
        .to_json()
        .map_err(|e| SdkError::Config(format!("Cannot serialize login data: {}", e)))?;
    println!("{}", json);

    let restored = EchoClient::from_credentials(&email, password.as_str(), bundle, config)?;
    restored.login_stored().await?;
    println!(
        "Stored login ok, session authenticated: {}",
        restored.check_auth_status().await?
    );

    if restored.ensure_access_token().await? {
        println!("Access token refreshed");
    }

    Ok(())
}
