use crate::logw;
use serde::{Deserialize, Serialize};

/// One video script: the narrated English text and its Japanese translation.
/// Field names match the persisted scripts.json format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptPair {
    pub english_script: String,
    pub japanese_translation: String,
}

/// One slang introduction: the slang term itself (the de-duplication key) and
/// the full formatted post text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlangPost {
    pub slang: String,
    pub post_text: String,
}

/// One phrase introduction. `phrase` is None when key extraction from the
/// templated model output failed; the post may still have gone out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhrasePost {
    pub phrase: Option<String>,
    pub post_text: String,
}

/// Parse a model response expected to be a JSON array of script pairs.
/// Anything else (non-array, malformed JSON) is a generation failure: the raw
/// text is logged for diagnosis and an empty batch is returned.
pub fn parse_script_batch(text: &str) -> Vec<ScriptPair> {
    match serde_json::from_str::<Vec<ScriptPair>>(text) {
        Ok(scripts) => scripts,
        Err(err) => {
            let snippet = text.chars().take(800).collect::<String>();
            logw(format!("Script batch parse failed: {}", err));
            logw(format!("Raw response: {}", snippet));
            Vec::new()
        }
    }
}
