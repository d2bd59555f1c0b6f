use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gemini_api_key: String,
    #[serde(default)]
    pub openai_api_key: String,
    #[serde(default)]
    pub x_api_key: String,
    #[serde(default)]
    pub x_api_key_secret: String,
    #[serde(default)]
    pub x_access_token: String,
    #[serde(default)]
    pub x_access_token_secret: String,
    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,
    #[serde(default = "default_tts_model")]
    pub tts_model: String,
    #[serde(default = "default_tts_voice")]
    pub tts_voice: String,
}

fn default_gemini_model() -> String {
    "gemini-2.5-pro".to_string()
}

fn default_tts_model() -> String {
    "gpt-4o-mini-tts".to_string()
}

fn default_tts_voice() -> String {
    "ash".to_string()
}

impl Config {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read config: {}", path.as_ref().display()))?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Video pipeline needs Gemini for scripts and OpenAI for TTS.
    pub fn require_video_keys(&self) -> Result<()> {
        if self.gemini_api_key.is_empty() {
            anyhow::bail!("config.json: gemini_api_key missing");
        }
        if self.openai_api_key.is_empty() {
            anyhow::bail!("config.json: openai_api_key missing");
        }
        Ok(())
    }

    /// Post pipelines need Gemini plus the four X OAuth 1.0a credentials.
    pub fn require_post_keys(&self) -> Result<()> {
        if self.gemini_api_key.is_empty() {
            anyhow::bail!("config.json: gemini_api_key missing");
        }
        let x_fields = [
            ("x_api_key", &self.x_api_key),
            ("x_api_key_secret", &self.x_api_key_secret),
            ("x_access_token", &self.x_access_token),
            ("x_access_token_secret", &self.x_access_token_secret),
        ];
        for (name, value) in x_fields {
            if value.is_empty() {
                anyhow::bail!("config.json: {} missing", name);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct VideoSettings {
    pub scripts_file: PathBuf,
    pub audio_dir: PathBuf,
    pub video_dir: PathBuf,
    pub remotion_dir: PathBuf,
    pub composition_id: String,
    pub server_port: u16,
    pub fps: u32,
    pub end_margin_seconds: f64,
    pub first_run_batch: usize,
    pub temperature: f64,
    pub video_title: String,
    pub video_subtitle: String,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            scripts_file: PathBuf::from("scripts.json"),
            audio_dir: PathBuf::from("audio"),
            video_dir: PathBuf::from("videos"),
            remotion_dir: PathBuf::from("shorts"),
            composition_id: "MainVideo".to_string(),
            server_port: 8000,
            fps: 60,
            end_margin_seconds: 1.0,
            first_run_batch: 10,
            temperature: 1.8,
            video_title: "TOEIC 600点 のシャドーイング".to_string(),
            video_subtitle: "最後まで遅れずに読めたらすごい".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SlangSettings {
    pub history_file: PathBuf,
    pub temperature: f64,
}

impl Default for SlangSettings {
    fn default() -> Self {
        Self {
            history_file: PathBuf::from("posted_slangs.json"),
            temperature: 1.2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PhraseSettings {
    pub history_file: PathBuf,
    pub temperature: f64,
    /// Marker the first line of the generated template must carry.
    pub marker: String,
}

impl Default for PhraseSettings {
    fn default() -> Self {
        Self {
            history_file: PathBuf::from("posted_phrases.json"),
            temperature: 1.2,
            marker: "今日の英語フレーズ".to_string(),
        }
    }
}
