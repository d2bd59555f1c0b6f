use crate::api::gemini::GeminiClient;
use crate::api::openai::OpenAiTts;
use crate::api::{GenerationOptions, SpeechSynthesizer, TextGenerator, VideoRenderer};
use crate::config::{Config, VideoSettings};
use crate::content::{ScriptPair, parse_script_batch};
use crate::history::HistoryStore;
use crate::render::{RemotionRenderer, audio_duration_seconds, duration_in_frames};
use crate::server::FileServer;
use crate::{logi, logok, logw};
use anyhow::{Context, Result};
use serde_json::json;
use std::path::PathBuf;

fn build_script_prompt(history: &[ScriptPair], count: usize) -> Result<String> {
    let existing = serde_json::to_string_pretty(history)?;
    Ok(format!(
        r#"あなたはSNSでバズる短い英語の動画コンテンツのスクリプト作家です。
以下の要件に従って、新しいスクリプトを **{count}個** 作成してください。

# 最重要要件
- **生成する {count}個 のスクリプトは、互いに全く異なる、ユニークなトピックにしてください。**
- 以下の「過去に生成したスクリプト」とも内容が重複しないようにしてください。(過去に生成したスクリプトのスタイルは、手本ではないので、参考にする必要はありません。)

# その他の要件
- 各スクリプトは、90単語程度の英語の文章と、その自然な日本語訳で構成してください。
- 英語のレベルはCEFR B1レベル（初級～中級者向け）にしてください。
- 語り手は、男性を想定してください。
- スクリプトの最初の数語は、難しい単語を使わず、かつ、視聴者に「どういう話？」と疑問を持たせるフックとなるようなものにしてください。
- トピックは、人々がコメントしたくなるような、物議を醸しやすく、意見が分かれやすいものを選んでください。必ずしも英語圏の人ではなく日本人でも共感できるものや、世界共通の話題、恋愛の話題などが望ましいです。
- 各スクリプトの最後には、予想を裏切る、非常に面白いジョークのオチをつけてください。

# 過去に生成したスクリプト
{existing}

# 出力形式
- **必ず、{count}個のスクリプト全体を単一のJSON配列 `[]` として出力してください。**
- 配列の各要素は、"english_script" と "japanese_translation" のキーを持つJSONオブジェクトにしてください。
[
  {{
    "english_script": "1つ目の英語スクリプト",
    "japanese_translation": "1つ目の日本語訳"
  }},
  ...
]
"#
    ))
}

/// Ask the model for `count` fresh scripts, steering it away from everything
/// already in the history. The avoidance is advisory only; nothing checks the
/// result against the history afterwards.
pub async fn generate_scripts<G>(
    generator: &G,
    history: &[ScriptPair],
    count: usize,
    temperature: f64,
) -> Result<Vec<ScriptPair>>
where
    G: TextGenerator + ?Sized,
{
    let prompt = build_script_prompt(history, count)?;
    logi(format!("Requesting {} unique script(s) from the model...", count));

    let opts = GenerationOptions {
        temperature,
        json_output: true,
    };
    let raw = match generator.generate(&prompt, opts).await? {
        Some(raw) => raw,
        None => {
            logw("Script generation returned nothing.".to_string());
            return Ok(Vec::new());
        }
    };

    Ok(parse_script_batch(&raw))
}

struct RenderedAudio {
    script: ScriptPair,
    audio_path: PathBuf,
    stamp: String,
    index: usize,
}

/// Full video pipeline: generate scripts, synthesize narration, compute frame
/// counts, render each video via the external renderer. Every per-item
/// failure is logged and skipped; the run finishes with a summary.
pub async fn run_generation(cfg: &Config, settings: &VideoSettings) -> Result<usize> {
    cfg.require_video_keys()?;
    crate::init::ensure_directories(settings).await?;

    // Held for the whole run; drops (and stops the worker) on every exit path.
    let file_server = FileServer::start(settings.server_port, ".")?;

    let client = reqwest::Client::builder()
        .build()
        .context("Failed to build HTTP client")?;
    let gemini = GeminiClient::new(
        client.clone(),
        cfg.gemini_api_key.clone(),
        cfg.gemini_model.clone(),
    );
    let tts = OpenAiTts::new(
        client,
        cfg.openai_api_key.clone(),
        cfg.tts_model.clone(),
        cfg.tts_voice.clone(),
    );
    let renderer = RemotionRenderer::new(&settings.remotion_dir, settings.composition_id.clone());

    let store = HistoryStore::<ScriptPair>::new(&settings.scripts_file);
    let is_first_run = store.is_first_run().await;
    let count = if is_first_run { settings.first_run_batch } else { 1 };
    if is_first_run {
        logi(format!(
            "No script history found; generating an initial batch of {}.",
            count
        ));
    }

    let mut history = store.load().await?;
    let new_scripts = generate_scripts(&gemini, &history, count, settings.temperature).await?;
    if new_scripts.is_empty() {
        logw("No new scripts were generated; stopping.".to_string());
        return Ok(0);
    }
    logok(format!("Generated {} new script(s).", new_scripts.len()));

    // Scripts are recorded unconditionally so later runs avoid these topics
    // even when audio or rendering fails below.
    history.extend(new_scripts.iter().cloned());
    store.save(&history).await?;

    let base_stamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
    let mut narrated = Vec::new();
    for (index, script) in new_scripts.into_iter().enumerate() {
        if script.english_script.is_empty() {
            logw(format!("Script {} has no English text; skipping.", index + 1));
            continue;
        }

        // Timestamp plus index keeps filenames unique within one run.
        let audio_path = settings
            .audio_dir
            .join(format!("script_{}_{}.mp3", base_stamp, index));
        logi(format!("TTS {} -> {}", index + 1, audio_path.display()));
        if !tts.synthesize(&script.english_script, &audio_path).await? {
            logw(format!("TTS failed for script {}; skipping.", index + 1));
            continue;
        }
        logok(format!("Audio saved: {}", audio_path.display()));

        narrated.push(RenderedAudio {
            script,
            audio_path,
            stamp: base_stamp.clone(),
            index,
        });
    }

    if narrated.is_empty() {
        logw("No audio files were produced; stopping before rendering.".to_string());
        return Ok(0);
    }

    logi("\n--- Starting video rendering ---".to_string());
    let mut rendered = 0usize;
    for item in &narrated {
        let audio_seconds = match audio_duration_seconds(&item.audio_path) {
            Ok(v) => v,
            Err(err) => {
                logw(format!(
                    "Could not read duration of {}: {}",
                    item.audio_path.display(),
                    err
                ));
                continue;
            }
        };
        let frames = duration_in_frames(audio_seconds, settings.end_margin_seconds, settings.fps);

        let audio_url = match file_server.url_for(&item.audio_path) {
            Some(url) => url,
            None => {
                logw(format!(
                    "Audio {} is outside the served directory; skipping.",
                    item.audio_path.display()
                ));
                continue;
            }
        };

        let props = json!({
            "title": settings.video_title,
            "subtitle": settings.video_subtitle,
            "scriptText": item.script.english_script,
            "audioUrl": audio_url,
            "durationInFrames": frames,
        });

        let out_path = settings
            .video_dir
            .join(format!("toremock_short_{}_{}.mp4", item.stamp, item.index));
        logi(format!(
            "Rendering {} ({} frames, {:.2}s narration)...",
            out_path.display(),
            frames,
            audio_seconds
        ));
        if renderer.render(&props, &out_path).await? {
            logok(format!("Rendered {}", out_path.display()));
            rendered += 1;
        }
    }

    logi(format!(
        "\nAll done. {} of {} video(s) rendered into {}.",
        rendered,
        narrated.len(),
        settings.video_dir.display()
    ));
    Ok(rendered)
}
