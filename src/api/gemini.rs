use crate::api::{GenerationOptions, TextGenerator};
use crate::logw;
use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde_json::json;

const GEMINI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(client: Client, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

fn gemini_extract_text(resp_json: &str) -> Option<String> {
    let root: serde_json::Value = serde_json::from_str(resp_json).ok()?;

    if let Some(err) = root.get("error") {
        if let Some(msg) = err.get("message").and_then(|v| v.as_str()) {
            logw(format!("Gemini error message: {}", msg));
        }
        if let Some(status) = err.get("status").and_then(|v| v.as_str()) {
            logw(format!("Gemini error status: {}", status));
        }
        return None;
    }

    let candidates = root.get("candidates")?.as_array()?;
    let first = candidates.first()?;

    // A candidate with no content is a blocked/filtered generation.
    if let Some(reason) = first.get("finishReason").and_then(|v| v.as_str()) {
        if reason != "STOP" && reason != "MAX_TOKENS" {
            logw(format!("Gemini finish reason: {}", reason));
        }
    }

    let parts = first.get("content")?.get("parts")?.as_array()?;
    let mut out = String::new();
    for part in parts {
        if let Some(text) = part.get("text").and_then(|v| v.as_str()) {
            out.push_str(text);
        }
    }

    if out.is_empty() { None } else { Some(out) }
}

/// Models occasionally wrap a JSON payload in a markdown fence even when asked
/// for application/json; strip it before handing the text to a parser.
pub fn strip_code_fences(text: &str) -> String {
    let fence = Regex::new(r"(?s)^\s*```(?:json)?\s*\n(.*?)\n?\s*```\s*$").unwrap();
    match fence.captures(text) {
        Some(caps) => caps[1].to_string(),
        None => text.trim().to_string(),
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str, opts: GenerationOptions) -> Result<Option<String>> {
        let url = format!("{}/{}:generateContent", GEMINI_BASE, self.model);

        let mut generation_config = json!({
            "temperature": opts.temperature,
        });
        if opts.json_output {
            generation_config["responseMimeType"] = json!("application/json");
        }

        let body = json!({
            "contents": [
                {"parts": [{"text": prompt}]},
            ],
            "generationConfig": generation_config,
        });

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .timeout(std::time::Duration::from_secs(600))
            .send()
            .await
            .context("Gemini request failed")?;

        let status = resp.status();
        let raw = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            logw(format!("Gemini HTTP {}", status.as_u16()));
            if !raw.is_empty() {
                let snippet = raw.chars().take(800).collect::<String>();
                logw(format!("Gemini raw body: {}", snippet));
            }
            return Ok(None);
        }

        let text = gemini_extract_text(&raw);
        if text.is_none() {
            logw("Gemini response parse failed.".to_string());
            if !raw.is_empty() {
                let snippet = raw.chars().take(800).collect::<String>();
                logw(format!("Gemini raw body: {}", snippet));
            }
            return Ok(None);
        }

        Ok(text.map(|t| strip_code_fences(&t)))
    }
}
