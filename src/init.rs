use crate::config::VideoSettings;
use anyhow::Result;
use tokio::fs;

pub async fn ensure_directories(settings: &VideoSettings) -> Result<()> {
    for dir in [&settings.audio_dir, &settings.video_dir] {
        if !dir.exists() {
            fs::create_dir_all(dir).await?;
            eprintln!("[INFO] Created directory: {}", dir.display());
        }
    }
    Ok(())
}
