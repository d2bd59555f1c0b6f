use crate::{logi, logw};
use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Append-only JSON array file recording previously generated items.
///
/// The whole history is read before each generation request so the model can
/// be told what to avoid; callers extend the loaded sequence and save it back.
pub struct HistoryStore<T> {
    path: PathBuf,
    _items: PhantomData<T>,
}

impl<T> HistoryStore<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            _items: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when the history file is absent or zero-length. A first run gets
    /// the larger generation batch.
    pub async fn is_first_run(&self) -> bool {
        match fs::metadata(&self.path).await {
            Ok(meta) => meta.len() == 0,
            Err(_) => true,
        }
    }

    /// Load the full history. An absent or blank file is an empty history; a
    /// present-but-unparseable file is renamed aside as a backup and treated
    /// as empty so generation can still proceed.
    pub async fn load(&self) -> Result<Vec<T>> {
        let text = match fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(_) => return Ok(Vec::new()),
        };
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        match serde_json::from_str::<Vec<T>>(&text) {
            Ok(items) => Ok(items),
            Err(err) => {
                let backup = backup_path(&self.path);
                logw(format!(
                    "History file {} is corrupt ({}); moving it to {} and starting fresh.",
                    self.path.display(),
                    err,
                    backup.display()
                ));
                fs::rename(&self.path, &backup).await.with_context(|| {
                    format!("Failed to back up corrupt history {}", self.path.display())
                })?;
                Ok(Vec::new())
            }
        }
    }

    /// Atomic overwrite: pretty-printed JSON, non-ASCII left unescaped, staged
    /// through a temp file in the same directory and renamed over the target.
    pub async fn save(&self, items: &[T]) -> Result<()> {
        let json = serde_json::to_string_pretty(items)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)
            .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
        tmp.write_all(json.as_bytes())?;
        tmp.write_all(b"\n")?;
        tmp.persist(&self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        logi(format!(
            "Saved {} history item(s) to {}",
            items.len(),
            self.path.display()
        ));
        Ok(())
    }
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".bak");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Entry {
        slang: String,
    }

    fn entry(slang: &str) -> Entry {
        Entry {
            slang: slang.to_string(),
        }
    }

    #[tokio::test]
    async fn load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::<Entry>::new(dir.path().join("history.json"));
        assert!(store.load().await.unwrap().is_empty());
        assert!(store.is_first_run().await);
    }

    #[tokio::test]
    async fn append_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::<Entry>::new(dir.path().join("history.json"));

        store.save(&[entry("spill the tea")]).await.unwrap();
        let mut items = store.load().await.unwrap();
        items.push(entry("no cap"));
        store.save(&items).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].slang, "spill the tea");
        assert_eq!(loaded.last().unwrap().slang, "no cap");
        assert!(!store.is_first_run().await);
    }

    #[tokio::test]
    async fn corrupt_file_is_backed_up_and_reset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(&path, "{not json at all").unwrap();

        let store = HistoryStore::<Entry>::new(&path);
        let items = store.load().await.unwrap();
        assert!(items.is_empty());

        let backup = dir.path().join("history.json.bak");
        assert!(backup.exists());
        assert_eq!(std::fs::read_to_string(backup).unwrap(), "{not json at all");
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn zero_byte_file_counts_as_first_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(&path, "").unwrap();

        let store = HistoryStore::<Entry>::new(&path);
        assert!(store.is_first_run().await);
        assert!(store.load().await.unwrap().is_empty());
        // A blank file is not corruption; it must not be renamed aside.
        assert!(path.exists());
    }

    #[tokio::test]
    async fn save_preserves_non_ascii_unescaped() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::<Entry>::new(dir.path().join("history.json"));
        store.save(&[entry("今日のスラング")]).await.unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("今日のスラング"));
        assert!(!raw.contains("\\u"));
    }
}
