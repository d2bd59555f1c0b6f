use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

pub mod gemini;
pub mod openai;
pub mod x;

#[derive(Debug, Clone, Copy)]
pub struct GenerationOptions {
    pub temperature: f64,
    /// Ask the model for a strict JSON response body.
    pub json_output: bool,
}

/// Language-model text generation. Returns Ok(None) on an upstream failure
/// (HTTP error, blocked or unparseable response) so callers can skip the
/// batch item instead of aborting the run.
#[async_trait]
pub trait TextGenerator {
    async fn generate(&self, prompt: &str, opts: GenerationOptions) -> Result<Option<String>>;
}

/// Text-to-speech synthesis into an audio file at `out_path`.
#[async_trait]
pub trait SpeechSynthesizer {
    async fn synthesize(&self, text: &str, out_path: &Path) -> Result<bool>;
}

/// External video rendering from a structured properties payload.
#[async_trait]
pub trait VideoRenderer {
    async fn render(&self, props: &serde_json::Value, out_path: &Path) -> Result<bool>;
}

/// Social platform posting. `Ok(false)` means the platform rejected the post;
/// callers must not record the item in history in that case.
#[async_trait]
pub trait SocialPoster {
    async fn post(&self, text: &str) -> Result<bool>;
}
