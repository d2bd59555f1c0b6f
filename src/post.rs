use crate::api::{GenerationOptions, SocialPoster, TextGenerator};
use crate::config::{PhraseSettings, SlangSettings};
use crate::content::{PhrasePost, SlangPost};
use crate::history::HistoryStore;
use crate::{logi, logok, logw};
use anyhow::Result;
use tracing::warn;

fn build_slang_prompt(posted: &[&str]) -> Result<String> {
    let posted_json = serde_json::to_string(posted)?;
    Ok(format!(
        r#"あなたはSNSで人気の、フレンドリーな英語学習コンテンツクリエイターです。
面白くて記憶に残りやすい英語のスラングを1つ選び、その紹介文を作成してください。

# 要件
- **絶対に、以下の「過去に投稿したスラング」リストにある単語は使わないでください。**
- スラング、その日本語の意味、そして使い方がよくわかる簡単な英語の例文と日本語訳を必ず含めてください。
- 全体の文章は、X(Twitter)の文字数制限（280文字）に収まるように、簡潔にまとめてください。
- 日本の英語学習者が興味を持つような、比較的新しいスラングや、知っていると面白い表現を選んでください。
- 文章のトーンは、絵文字(😁🎉など)を少し使って、明るく親しみやすい雰囲気にしてください。
- 最後に、必ず以下のハッシュタグを付けてください。
  `#英語学習 #スラング #英会話 #今日の英語`

# 過去に投稿したスラング
{posted_json}

# 出力形式 (必ずこのJSON形式で出力してください)
{{
  "slang": "生成したスラング (例: 'spill the tea')",
  "post_text": "実際にXに投稿する全文 (スラング、意味、例文、ハッシュタグをすべて含んだもの)"
}}
"#
    ))
}

fn build_phrase_prompt(marker: &str, posted: &[&str]) -> Result<String> {
    let posted_json = serde_json::to_string(posted)?;
    Ok(format!(
        r#"あなたはSNSで人気の、フレンドリーな英語学習コンテンツクリエイターです。
日常会話でよく使う英語フレーズを1つ選び、その紹介文を作成してください。

# 要件
- **絶対に、以下の「過去に投稿したフレーズ」リストにあるフレーズは使わないでください。**
- フレーズ、その日本語の意味、簡単な英語の例文と日本語訳を必ず含めてください。
- 全体の文章は、X(Twitter)の文字数制限（280文字）に収まるように、簡潔にまとめてください。
- 最後に、必ず以下のハッシュタグを付けてください。
  `#英語学習 #今日の英語フレーズ`

# 過去に投稿したフレーズ
{posted_json}

# 出力形式 (JSONではなく、投稿する本文そのものを以下のテンプレート通りに出力してください)
📘 {marker}
<フレーズ>
📝 意味: <日本語の意味>
💬 例文: <英語の例文>
🇯🇵 訳: <例文の日本語訳>
#英語学習 #今日の英語フレーズ
"#
    ))
}

/// Best-effort key extraction from templated output: the first line must
/// carry the marker, the trimmed second line is the key. Anything else is an
/// extraction failure, not an error.
pub fn extract_phrase_key(text: &str, marker: &str) -> Option<String> {
    let mut lines = text.lines();
    let first = lines.next()?;
    if !first.contains(marker) {
        return None;
    }
    let second = lines.next()?.trim();
    if second.is_empty() {
        None
    } else {
        Some(second.to_string())
    }
}

/// Generate one slang introduction (strict JSON mode) and post it. The slang
/// history is extended only after the platform confirms the post.
pub async fn run_slang_post<G, P>(
    generator: &G,
    poster: &P,
    settings: &SlangSettings,
) -> Result<bool>
where
    G: TextGenerator + ?Sized,
    P: SocialPoster + ?Sized,
{
    let store = HistoryStore::<SlangPost>::new(&settings.history_file);
    let mut history = store.load().await?;
    let posted: Vec<&str> = history.iter().map(|item| item.slang.as_str()).collect();

    let prompt = build_slang_prompt(&posted)?;
    let opts = GenerationOptions {
        temperature: settings.temperature,
        json_output: true,
    };
    let raw = match generator.generate(&prompt, opts).await? {
        Some(raw) => raw,
        None => {
            logw("No post content was generated; skipping.".to_string());
            return Ok(false);
        }
    };

    let post: SlangPost = match serde_json::from_str(&raw) {
        Ok(post) => post,
        Err(err) => {
            let snippet = raw.chars().take(800).collect::<String>();
            logw(format!("Slang post parse failed: {}", err));
            logw(format!("Raw response: {}", snippet));
            return Ok(false);
        }
    };
    logi(format!("Generated slang: {}", post.slang));

    if !poster.post(&post.post_text).await? {
        logw("Post failed; history left unchanged.".to_string());
        return Ok(false);
    }

    history.push(post);
    store.save(&history).await?;
    logok("Slang recorded in history.");
    Ok(true)
}

/// Generate one phrase introduction as literal templated text and post it.
/// Key extraction failure is soft: the text is still posted, but the history
/// entry records the key as absent.
pub async fn run_phrase_post<G, P>(
    generator: &G,
    poster: &P,
    settings: &PhraseSettings,
) -> Result<bool>
where
    G: TextGenerator + ?Sized,
    P: SocialPoster + ?Sized,
{
    let store = HistoryStore::<PhrasePost>::new(&settings.history_file);
    let mut history = store.load().await?;
    let posted: Vec<&str> = history
        .iter()
        .filter_map(|item| item.phrase.as_deref())
        .collect();

    let prompt = build_phrase_prompt(&settings.marker, &posted)?;
    let opts = GenerationOptions {
        temperature: settings.temperature,
        json_output: false,
    };
    let raw = match generator.generate(&prompt, opts).await? {
        Some(raw) => raw,
        None => {
            logw("No post content was generated; skipping.".to_string());
            return Ok(false);
        }
    };
    let text = raw.trim().to_string();

    let phrase = extract_phrase_key(&text, &settings.marker);
    match &phrase {
        Some(key) => logi(format!("Generated phrase: {}", key)),
        None => warn!(
            "Could not extract a phrase key from the generated text; \
             posting anyway and recording the key as absent."
        ),
    }

    if !poster.post(&text).await? {
        logw("Post failed; history left unchanged.".to_string());
        return Ok(false);
    }

    history.push(PhrasePost {
        phrase,
        post_text: text,
    });
    store.save(&history).await?;
    logok("Phrase recorded in history.");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct CannedGenerator {
        response: Option<String>,
    }

    #[async_trait]
    impl TextGenerator for CannedGenerator {
        async fn generate(&self, _prompt: &str, _opts: GenerationOptions) -> Result<Option<String>> {
            Ok(self.response.clone())
        }
    }

    struct RecordingPoster {
        succeed: AtomicBool,
        posted: Mutex<Vec<String>>,
    }

    impl RecordingPoster {
        fn new(succeed: bool) -> Self {
            Self {
                succeed: AtomicBool::new(succeed),
                posted: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SocialPoster for RecordingPoster {
        async fn post(&self, text: &str) -> Result<bool> {
            self.posted.lock().unwrap().push(text.to_string());
            Ok(self.succeed.load(Ordering::SeqCst))
        }
    }

    fn slang_settings(dir: &std::path::Path) -> SlangSettings {
        SlangSettings {
            history_file: dir.join("posted_slangs.json"),
            ..SlangSettings::default()
        }
    }

    fn phrase_settings(dir: &std::path::Path) -> PhraseSettings {
        PhraseSettings {
            history_file: dir.join("posted_phrases.json"),
            ..PhraseSettings::default()
        }
    }

    #[test]
    fn extracts_key_from_second_line() {
        let text = "📘 今日の英語フレーズ\nYOLO\n📝 意味: 人生は一度きり";
        assert_eq!(
            extract_phrase_key(text, "今日の英語フレーズ").as_deref(),
            Some("YOLO")
        );
    }

    #[test]
    fn missing_marker_yields_no_key() {
        let text = "YOLO\n📝 意味: 人生は一度きり";
        assert!(extract_phrase_key(text, "今日の英語フレーズ").is_none());
        assert!(extract_phrase_key("📘 今日の英語フレーズ", "今日の英語フレーズ").is_none());
        assert!(extract_phrase_key("", "今日の英語フレーズ").is_none());
    }

    #[tokio::test]
    async fn successful_slang_post_appends_history() {
        let dir = tempfile::tempdir().unwrap();
        let settings = slang_settings(dir.path());
        let generator = CannedGenerator {
            response: Some(
                r#"{"slang": "no cap", "post_text": "no cap = マジで 😁 #英語学習"}"#.to_string(),
            ),
        };
        let poster = RecordingPoster::new(true);

        let posted = run_slang_post(&generator, &poster, &settings).await.unwrap();
        assert!(posted);
        assert_eq!(poster.posted.lock().unwrap().len(), 1);

        let store = HistoryStore::<SlangPost>::new(&settings.history_file);
        let history = store.load().await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].slang, "no cap");
    }

    #[tokio::test]
    async fn failed_post_leaves_history_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let settings = slang_settings(dir.path());

        let store = HistoryStore::<SlangPost>::new(&settings.history_file);
        store
            .save(&[SlangPost {
                slang: "spill the tea".to_string(),
                post_text: "spill the tea = 暴露する".to_string(),
            }])
            .await
            .unwrap();
        let before = std::fs::read_to_string(&settings.history_file).unwrap();

        let generator = CannedGenerator {
            response: Some(r#"{"slang": "ghosting", "post_text": "ghosting..."}"#.to_string()),
        };
        let poster = RecordingPoster::new(false);

        let posted = run_slang_post(&generator, &poster, &settings).await.unwrap();
        assert!(!posted);
        let after = std::fs::read_to_string(&settings.history_file).unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn unparseable_slang_response_posts_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let settings = slang_settings(dir.path());
        let generator = CannedGenerator {
            response: Some("sorry, I can't help with that".to_string()),
        };
        let poster = RecordingPoster::new(true);

        let posted = run_slang_post(&generator, &poster, &settings).await.unwrap();
        assert!(!posted);
        assert!(poster.posted.lock().unwrap().is_empty());
        assert!(!settings.history_file.exists());
    }

    #[tokio::test]
    async fn phrase_without_marker_still_posts_with_absent_key() {
        let dir = tempfile::tempdir().unwrap();
        let settings = phrase_settings(dir.path());
        let generator = CannedGenerator {
            response: Some("Break a leg!\n📝 意味: 頑張って\n#英語学習".to_string()),
        };
        let poster = RecordingPoster::new(true);

        let posted = run_phrase_post(&generator, &poster, &settings).await.unwrap();
        assert!(posted);
        assert_eq!(poster.posted.lock().unwrap().len(), 1);

        let store = HistoryStore::<PhrasePost>::new(&settings.history_file);
        let history = store.load().await.unwrap();
        assert_eq!(history.len(), 1);
        assert!(history[0].phrase.is_none());
    }

    #[tokio::test]
    async fn phrase_with_marker_records_key() {
        let dir = tempfile::tempdir().unwrap();
        let settings = phrase_settings(dir.path());
        let generator = CannedGenerator {
            response: Some(
                "📘 今日の英語フレーズ\nBreak a leg\n📝 意味: 頑張って\n#英語学習".to_string(),
            ),
        };
        let poster = RecordingPoster::new(true);

        run_phrase_post(&generator, &poster, &settings).await.unwrap();

        let store = HistoryStore::<PhrasePost>::new(&settings.history_file);
        let history = store.load().await.unwrap();
        assert_eq!(history[0].phrase.as_deref(), Some("Break a leg"));
    }

    #[tokio::test]
    async fn generation_failure_skips_posting() {
        let dir = tempfile::tempdir().unwrap();
        let settings = phrase_settings(dir.path());
        let generator = CannedGenerator { response: None };
        let poster = RecordingPoster::new(true);

        let posted = run_phrase_post(&generator, &poster, &settings).await.unwrap();
        assert!(!posted);
        assert!(poster.posted.lock().unwrap().is_empty());
    }
}
