use ai_study_shorts::config::{Config, VideoSettings};
use ai_study_shorts::generator::run_generation;
use ai_study_shorts::render;
use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cfg = Config::load("config.json").await?;
    let settings = VideoSettings::default();

    if !render::check_npx().await {
        eprintln!("[WARNING] npx not found in PATH. Please install Node.js.");
    }

    run_generation(&cfg, &settings).await?;
    Ok(())
}
