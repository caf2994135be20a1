use std::path::{Path, PathBuf};

use futures_util::{StreamExt, stream};
use tokio::fs;
use tracing::{debug, warn};

use crate::{
    cancel::CancellationSignal,
    error::{Result, TubepackError},
    packer::Group,
    types::{OutputArtifact, TranscriptRecord},
};

pub const ROLLUP_FILE_NAME: &str = "all_transcripts.txt";
pub const EXCESS_FILE_NAME: &str = "excess_content.txt";

const MAX_TITLE_CHARS: usize = 100;

/// Which kind of file a group is written to; decides the file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileName {
    Individual { title: String, video_id: String },
    Combined(usize),
    Rollup,
    Large(String),
    Excess,
}

impl FileName {
    pub fn individual(record: &TranscriptRecord) -> Self {
        Self::Individual {
            title: record.title.clone(),
            video_id: record.video_id.clone(),
        }
    }

    pub fn file_name(&self) -> String {
        match self {
            FileName::Individual { title, video_id } => {
                format!("{}_{}.txt", sanitize_title(title, MAX_TITLE_CHARS), video_id)
            }
            FileName::Combined(part) => format!("combined_part_{}.txt", part),
            FileName::Rollup => ROLLUP_FILE_NAME.to_string(),
            FileName::Large(video_id) => format!("large_video_{}.txt", video_id),
            FileName::Excess => EXCESS_FILE_NAME.to_string(),
        }
    }
}

/// Keep `[A-Za-z0-9 _-]`, replace everything else with `_`, trim, cap length.
pub fn sanitize_title(title: &str, max_chars: usize) -> String {
    let safe: String = title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    safe.trim().chars().take(max_chars).collect()
}

/// Format one transcript as a `### VIDEO:` section
pub fn format_section(record: &TranscriptRecord) -> String {
    format!(
        "### VIDEO: {} (ID: {})\n\n{}",
        record.title, record.video_id, record.text
    )
}

/// Format a group as its sections separated by blank lines
pub fn format_group(group: &Group<'_>) -> String {
    group
        .records()
        .iter()
        .map(|record| format_section(record))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Writes groups as text files under one output directory.
///
/// The directory is created on first write, so a run that writes nothing
/// leaves the filesystem untouched.
#[derive(Debug, Clone)]
pub struct Emitter {
    output_dir: PathBuf,
}

impl Emitter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn path_for(&self, name: &FileName) -> PathBuf {
        self.output_dir.join(name.file_name())
    }

    pub async fn emit(&self, name: &FileName, group: &Group<'_>) -> Result<OutputArtifact> {
        let path = self.path_for(name);
        write_file(&path, format_group(group).as_bytes()).await?;

        debug!(
            path = %path.display(),
            videos = group.len(),
            tokens = group.token_count(),
            "wrote transcript file"
        );

        Ok(OutputArtifact {
            file_path: path,
            videos: group.video_refs(),
            token_count: group.token_count(),
        })
    }

    pub async fn emit_individual(&self, record: &TranscriptRecord) -> Result<OutputArtifact> {
        self.emit(&FileName::individual(record), &Group::single(record))
            .await
    }

    /// Every transcript in one file. Nothing is written for an empty slice.
    pub async fn emit_rollup(&self, records: &[TranscriptRecord]) -> Result<Option<OutputArtifact>> {
        if records.is_empty() {
            return Ok(None);
        }
        let artifact = self
            .emit(&FileName::Rollup, &Group::from_records(records))
            .await?;
        Ok(Some(artifact))
    }

    /// One file per transcript, at most `width` writes in flight.
    ///
    /// Writes not yet started when `cancel` is set are skipped. The result
    /// keeps input order. Every started write is awaited before the first
    /// error is returned, so no temp file outlives the call.
    pub async fn emit_individual_files(
        &self,
        records: &[TranscriptRecord],
        width: usize,
        cancel: &CancellationSignal,
    ) -> Result<Vec<OutputArtifact>> {
        let writes: Vec<_> = records
            .iter()
            .map(|record| self.emit_individual_unless_cancelled(record, cancel))
            .collect();

        let written: Vec<Result<Option<OutputArtifact>>> = stream::iter(writes)
            .buffered(width.max(1))
            .collect()
            .await;

        let mut artifacts = Vec::with_capacity(written.len());
        for result in written {
            artifacts.extend(result?);
        }
        Ok(artifacts)
    }

    async fn emit_individual_unless_cancelled(
        &self,
        record: &TranscriptRecord,
        cancel: &CancellationSignal,
    ) -> Result<Option<OutputArtifact>> {
        if cancel.is_cancelled() {
            return Ok(None);
        }
        self.emit_individual(record).await.map(Some)
    }

    /// Concatenates already written files into the excess file.
    ///
    /// The originals are removed once the merged file is on disk. A failed
    /// removal is logged and does not undo the merge.
    pub async fn merge(&self, artifacts: Vec<OutputArtifact>) -> Result<Option<OutputArtifact>> {
        if artifacts.is_empty() {
            return Ok(None);
        }

        let path = self.path_for(&FileName::Excess);
        let mut contents = Vec::new();
        let mut videos = Vec::new();
        let mut token_count = 0;

        for (i, artifact) in artifacts.iter().enumerate() {
            let bytes = fs::read(&artifact.file_path)
                .await
                .map_err(|source| TubepackError::Read {
                    path: artifact.file_path.clone(),
                    source,
                })?;
            if i > 0 {
                contents.extend_from_slice(b"\n\n");
            }
            contents.extend_from_slice(&bytes);
            videos.extend(artifact.videos.iter().cloned());
            token_count += artifact.token_count;
        }

        write_file(&path, &contents).await?;

        for artifact in &artifacts {
            if artifact.file_path == path {
                continue;
            }
            if let Err(e) = fs::remove_file(&artifact.file_path).await {
                warn!(
                    path = %artifact.file_path.display(),
                    error = %e,
                    "failed to remove file merged into excess content"
                );
            }
        }

        Ok(Some(OutputArtifact {
            file_path: path,
            videos,
            token_count,
        }))
    }
}

/// Write through a sibling temp file so a file is either complete or absent.
async fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    let write_err = |source| TubepackError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp = temp_path(path);
    fs::write(&tmp, contents).await.map_err(write_err)?;
    if let Err(source) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(write_err(source));
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.part", name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, title: &str, text: &str) -> TranscriptRecord {
        TranscriptRecord::new(id, title, text)
    }

    #[test]
    fn sanitizes_titles() {
        assert_eq!(sanitize_title("Hello, World!", 100), "Hello_ World_");
        assert_eq!(sanitize_title("  spaced out  ", 100), "spaced out");
        assert_eq!(sanitize_title("Rust: 2024/edition", 100), "Rust_ 2024_edition");
        assert_eq!(sanitize_title("naïve café", 100), "na_ve caf_");
        assert_eq!(sanitize_title(&"a".repeat(150), 100).len(), 100);
    }

    #[test]
    fn file_names() {
        let r = record("abc123", "Intro: part 1", "text");
        assert_eq!(FileName::individual(&r).file_name(), "Intro_ part 1_abc123.txt");
        assert_eq!(FileName::Combined(3).file_name(), "combined_part_3.txt");
        assert_eq!(FileName::Rollup.file_name(), "all_transcripts.txt");
        assert_eq!(FileName::Large("xyz".into()).file_name(), "large_video_xyz.txt");
        assert_eq!(FileName::Excess.file_name(), "excess_content.txt");
    }

    #[test]
    fn formats_sections_separated_by_blank_lines() {
        let a = record("a1", "First", "hello there");
        let b = record("b2", "Second", "general kenobi");
        let group = Group::from_records([&a, &b]);

        assert_eq!(
            format_group(&group),
            "### VIDEO: First (ID: a1)\n\nhello there\n\n### VIDEO: Second (ID: b2)\n\ngeneral kenobi"
        );
    }

    #[tokio::test]
    async fn emit_is_repeatable() {
        let dir = tempfile::tempdir().unwrap();
        let emitter = Emitter::new(dir.path());
        let a = record("a1", "First", "hello there");
        let group = Group::single(&a);

        let first = emitter.emit(&FileName::Combined(1), &group).await.unwrap();
        let bytes = std::fs::read(&first.file_path).unwrap();
        let second = emitter.emit(&FileName::Combined(1), &group).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(std::fs::read(&second.file_path).unwrap(), bytes);
        assert!(!dir.path().join(".combined_part_1.txt.part").exists());
    }

    #[tokio::test]
    async fn merge_concatenates_and_removes_originals() {
        let dir = tempfile::tempdir().unwrap();
        let emitter = Emitter::new(dir.path());
        let a = record("a1", "First", "aaaa");
        let b = record("b2", "Second", "bbbbbbbb");

        let first = emitter
            .emit(&FileName::Combined(1), &Group::single(&a))
            .await
            .unwrap();
        let second = emitter
            .emit(&FileName::Combined(2), &Group::single(&b))
            .await
            .unwrap();

        let merged = emitter
            .merge(vec![first.clone(), second.clone()])
            .await
            .unwrap()
            .unwrap();

        assert_eq!(merged.file_path, dir.path().join(EXCESS_FILE_NAME));
        assert_eq!(merged.token_count, 3);
        assert_eq!(merged.videos.len(), 2);
        assert!(!first.file_path.exists());
        assert!(!second.file_path.exists());

        let text = std::fs::read_to_string(&merged.file_path).unwrap();
        assert_eq!(
            text,
            "### VIDEO: First (ID: a1)\n\naaaa\n\n### VIDEO: Second (ID: b2)\n\nbbbbbbbb"
        );
    }

    #[tokio::test]
    async fn merge_of_nothing_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let emitter = Emitter::new(dir.path().join("out"));
        assert!(emitter.merge(Vec::new()).await.unwrap().is_none());
        assert!(!dir.path().join("out").exists());
    }

    #[tokio::test]
    async fn individual_files_keep_order_and_respect_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let emitter = Emitter::new(dir.path());
        let records: Vec<TranscriptRecord> = (0..6)
            .map(|i| record(&format!("v{i}"), &format!("Video {i}"), "text"))
            .collect();

        let cancel = CancellationSignal::new();
        let written = emitter
            .emit_individual_files(&records, 3, &cancel)
            .await
            .unwrap();
        let ids: Vec<&str> = written.iter().map(|a| a.videos[0].id.as_str()).collect();
        assert_eq!(ids, vec!["v0", "v1", "v2", "v3", "v4", "v5"]);

        let other = tempfile::tempdir().unwrap();
        let emitter = Emitter::new(other.path());
        cancel.cancel();
        let written = emitter
            .emit_individual_files(&records, 3, &cancel)
            .await
            .unwrap();
        assert!(written.is_empty());
        assert_eq!(std::fs::read_dir(other.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn failed_individual_write_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let emitter = Emitter::new(dir.path());
        let records = vec![
            record("a", "A", "first"),
            record("b", "B", "second"),
            record("c", "C", "third"),
        ];
        // a directory where B's file should go makes the rename fail
        std::fs::create_dir(dir.path().join("B_b.txt")).unwrap();
        std::fs::write(dir.path().join("B_b.txt").join("keep"), "x").unwrap();

        let err = emitter
            .emit_individual_files(&records, 3, &CancellationSignal::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TubepackError::Write { .. }));

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert!(names.iter().all(|n| !n.ends_with(".part")), "{names:?}");
        assert!(dir.path().join("A_a.txt").exists());
        assert!(dir.path().join("C_c.txt").exists());
    }

    #[tokio::test]
    async fn write_failure_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, "file").unwrap();

        let emitter = Emitter::new(blocker.join("nested"));
        let a = record("a1", "First", "text");
        let err = emitter
            .emit(&FileName::Combined(1), &Group::single(&a))
            .await
            .unwrap_err();
        assert!(matches!(err, TubepackError::Write { .. }));
    }
}
