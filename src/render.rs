use crate::api::VideoRenderer;
use crate::logw;
use anyhow::{Context, Result};
use async_trait::async_trait;
use lofty::file::AudioFile;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;

/// Why a render invocation produced no usable video. All variants are
/// recoverable per item; the batch keeps going.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("renderer executable '{0}' not found; is Node.js installed and on PATH?")]
    MissingExecutable(String),
    #[error("renderer exited with {code}\nstdout: {stdout}\nstderr: {stderr}")]
    Failed {
        code: i32,
        stdout: String,
        stderr: String,
    },
    #[error("renderer reported success but no video exists at {0}")]
    MissingOutput(String),
}

/// Audio length in seconds read from the container metadata.
pub fn audio_duration_seconds(path: &Path) -> Result<f64> {
    let tagged = lofty::read_from_path(path)
        .with_context(|| format!("Failed to read audio metadata from {}", path.display()))?;
    let duration = tagged.properties().duration().as_secs_f64();
    if duration <= 0.0 {
        anyhow::bail!("Audio file {} has zero duration", path.display());
    }
    Ok(duration)
}

/// Frames the composition must run for: audio length plus a fixed end margin
/// so captions do not truncate before the narration finishes, rounded up.
pub fn duration_in_frames(audio_seconds: f64, margin_seconds: f64, fps: u32) -> u64 {
    ((audio_seconds + margin_seconds) * fps as f64).ceil() as u64
}

pub struct RemotionRenderer {
    project_dir: PathBuf,
    composition_id: String,
}

impl RemotionRenderer {
    pub fn new(project_dir: impl Into<PathBuf>, composition_id: impl Into<String>) -> Self {
        Self {
            project_dir: project_dir.into(),
            composition_id: composition_id.into(),
        }
    }

    async fn invoke(&self, props: &serde_json::Value, out_path: &Path) -> Result<(), RenderError> {
        // Remotion resolves the output relative to its own project dir, so
        // hand it an absolute path.
        let out_abs = std::path::absolute(out_path).unwrap_or_else(|_| out_path.to_path_buf());

        let output = Command::new("npx")
            .arg("remotion")
            .arg("render")
            .arg(&self.composition_id)
            .arg(&out_abs)
            .arg("--props")
            .arg(props.to_string())
            .current_dir(&self.project_dir)
            .output()
            .await
            .map_err(|_| RenderError::MissingExecutable("npx".to_string()))?;

        if !output.status.success() {
            let truncate = |bytes: &[u8]| {
                String::from_utf8_lossy(bytes)
                    .chars()
                    .take(2000)
                    .collect::<String>()
            };
            return Err(RenderError::Failed {
                code: output.status.code().unwrap_or(-1),
                stdout: truncate(&output.stdout),
                stderr: truncate(&output.stderr),
            });
        }

        if !out_abs.exists() {
            return Err(RenderError::MissingOutput(out_abs.display().to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl VideoRenderer for RemotionRenderer {
    async fn render(&self, props: &serde_json::Value, out_path: &Path) -> Result<bool> {
        match self.invoke(props, out_path).await {
            Ok(()) => Ok(true),
            Err(err) => {
                logw(format!("Render failed: {}", err));
                if matches!(err, RenderError::MissingExecutable(_)) {
                    logw(format!(
                        "Check that '{}' exists and 'npm install' was run there.",
                        self.project_dir.display()
                    ));
                }
                Ok(false)
            }
        }
    }
}

pub async fn check_npx() -> bool {
    match Command::new("npx").arg("--version").output().await {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_count_rounds_up_with_margin() {
        // 9.3s narration + 1.0s margin at 60fps
        assert_eq!(duration_in_frames(9.3, 1.0, 60), 618);
    }

    #[test]
    fn exact_multiples_do_not_round_up() {
        assert_eq!(duration_in_frames(9.0, 1.0, 60), 600);
        assert_eq!(duration_in_frames(0.0, 1.0, 60), 60);
    }

    #[test]
    fn fractional_frame_rounds_to_next() {
        assert_eq!(duration_in_frames(10.001, 0.0, 60), 601);
    }

    #[test]
    fn missing_audio_file_is_an_error() {
        assert!(audio_duration_seconds(Path::new("no/such/file.mp3")).is_err());
    }
}
