use ai_study_shorts::api::gemini::GeminiClient;
use ai_study_shorts::api::x::{Oauth1Credentials, XClient};
use ai_study_shorts::config::{Config, SlangSettings};
use ai_study_shorts::post::run_slang_post;
use anyhow::{Context, Result};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    eprintln!("[INFO] --- Slang post bot starting ({}) ---", chrono::Local::now());

    let cfg = Config::load("config.json").await?;
    cfg.require_post_keys()?;

    let client = reqwest::Client::builder()
        .build()
        .context("Failed to build HTTP client")?;
    let gemini = GeminiClient::new(
        client.clone(),
        cfg.gemini_api_key.clone(),
        cfg.gemini_model.clone(),
    );
    let x = XClient::new(
        client,
        Oauth1Credentials {
            api_key: cfg.x_api_key.clone(),
            api_key_secret: cfg.x_api_key_secret.clone(),
            access_token: cfg.x_access_token.clone(),
            access_token_secret: cfg.x_access_token_secret.clone(),
        },
    );
    x.verify_credentials().await?;

    let settings = SlangSettings::default();
    run_slang_post(&gemini, &x, &settings).await?;

    eprintln!("[INFO] --- Done ---");
    Ok(())
}
