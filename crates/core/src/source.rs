use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::{error::SourceError, types::Language};

/// Where transcripts come from. Implementations may hit the network or a cache.
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    /// Languages a transcript exists in; empty when none or on any lookup error.
    async fn languages(&self, video_id: &str) -> Vec<Language>;

    /// Plain transcript text in one language.
    async fn fetch(&self, video_id: &str, language_code: &str) -> Result<String, SourceError>;
}

/// Fetch a transcript, falling back to the first listed language.
///
/// If the requested language is not offered, the first one is used instead.
/// If fetching a non-first language fails, the first language is tried once
/// and the original error is kept when that fails too.
pub async fn resolve_transcript(
    source: &dyn TranscriptSource,
    video_id: &str,
    language_code: &str,
) -> Result<String, SourceError> {
    let languages = source.languages(video_id).await;
    let Some(first) = languages.first() else {
        return Err(SourceError::Unavailable);
    };

    let code = if languages.iter().any(|l| l.code == language_code) {
        language_code
    } else {
        debug!(video_id, requested = language_code, using = %first.code, "language not available");
        first.code.as_str()
    };

    match source.fetch(video_id, code).await {
        Ok(text) => Ok(text),
        Err(e) if code != first.code => {
            debug!(video_id, fallback = %first.code, error = %e, "retrying with first language");
            source.fetch(video_id, &first.code).await.map_err(|_| e)
        }
        Err(e) => Err(e),
    }
}

/// Transcripts cached on disk as `<root>/<video_id>/<code>.txt`.
///
/// Auto-generated transcripts use `<code>.auto.txt`.
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn video_dir(&self, video_id: &str) -> Option<PathBuf> {
        let plain = !video_id.is_empty()
            && video_id != "."
            && video_id != ".."
            && !video_id.contains(['/', '\\']);
        plain.then(|| self.root.join(video_id))
    }
}

fn parse_transcript_file(path: &Path) -> Option<Language> {
    let name = path.file_name()?.to_str()?;
    let stem = name.strip_suffix(".txt")?;
    let (code, is_generated) = match stem.strip_suffix(".auto") {
        Some(code) => (code, true),
        None => (stem, false),
    };
    if code.is_empty() || code.starts_with('.') {
        return None;
    }
    Some(Language {
        code: code.to_string(),
        name: code.to_string(),
        is_generated,
    })
}

#[async_trait]
impl TranscriptSource for DirectorySource {
    async fn languages(&self, video_id: &str) -> Vec<Language> {
        let Some(dir) = self.video_dir(video_id) else {
            return Vec::new();
        };
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) => {
                debug!(video_id, error = %e, "no cached transcripts");
                return Vec::new();
            }
        };

        let mut languages = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            if let Some(language) = parse_transcript_file(&entry.path()) {
                languages.push(language);
            }
        }
        // manual before generated, then by code, so "first" is stable
        languages.sort_by(|a, b| {
            a.is_generated
                .cmp(&b.is_generated)
                .then_with(|| a.code.cmp(&b.code))
        });
        languages.dedup_by(|a, b| a.code == b.code);
        languages
    }

    async fn fetch(&self, video_id: &str, language_code: &str) -> Result<String, SourceError> {
        let dir = self.video_dir(video_id).ok_or(SourceError::Unavailable)?;

        for name in [
            format!("{}.txt", language_code),
            format!("{}.auto.txt", language_code),
        ] {
            match fs::read_to_string(dir.join(&name)).await {
                Ok(text) => return Ok(text.trim_end().to_string()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(SourceError::Provider {
                        reason: format!("Failed to read {}: {}", name, e),
                    });
                }
            }
        }
        Err(SourceError::Unavailable)
    }
}

/// In-memory transcripts, handy for tests and demos.
#[derive(Default)]
pub struct MemorySource {
    transcripts: HashMap<String, Vec<(Language, String)>>,
    errors: HashMap<(String, String), String>,
    fetches: AtomicUsize,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transcript(
        self,
        video_id: impl Into<String>,
        language_code: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        self.with_language(video_id, language_code, text, false)
    }

    pub fn with_generated(
        self,
        video_id: impl Into<String>,
        language_code: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        self.with_language(video_id, language_code, text, true)
    }

    /// Make fetching this video/language fail with a provider error.
    pub fn with_error(
        mut self,
        video_id: impl Into<String>,
        language_code: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        self.errors
            .insert((video_id.into(), language_code.into()), reason.into());
        self
    }

    /// Number of `fetch` calls served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }

    fn with_language(
        mut self,
        video_id: impl Into<String>,
        language_code: impl Into<String>,
        text: impl Into<String>,
        is_generated: bool,
    ) -> Self {
        let code = language_code.into();
        self.transcripts.entry(video_id.into()).or_default().push((
            Language {
                name: code.clone(),
                code,
                is_generated,
            },
            text.into(),
        ));
        self
    }
}

#[async_trait]
impl TranscriptSource for MemorySource {
    async fn languages(&self, video_id: &str) -> Vec<Language> {
        self.transcripts
            .get(video_id)
            .map(|entries| entries.iter().map(|(l, _)| l.clone()).collect())
            .unwrap_or_default()
    }

    async fn fetch(&self, video_id: &str, language_code: &str) -> Result<String, SourceError> {
        self.fetches.fetch_add(1, Ordering::Relaxed);

        if let Some(reason) = self
            .errors
            .get(&(video_id.to_string(), language_code.to_string()))
        {
            return Err(SourceError::Provider {
                reason: reason.clone(),
            });
        }

        self.transcripts
            .get(video_id)
            .and_then(|entries| entries.iter().find(|(l, _)| l.code == language_code))
            .map(|(_, text)| text.clone())
            .ok_or(SourceError::Unavailable)
    }
}
