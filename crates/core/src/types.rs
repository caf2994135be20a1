use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Video metadata as resolved by the channel lookup, before any transcript work.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMeta {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub channel_title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
}

impl VideoMeta {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            channel_title: None,
            description: None,
            published_at: None,
        }
    }

    pub fn with_channel(mut self, channel_title: impl Into<String>) -> Self {
        self.channel_title = Some(channel_title.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    pub code: String,
    pub name: String,
    pub is_generated: bool,
}

/// One fetched transcript with its cost. Never mutated after the fetch stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptRecord {
    pub video_id: String,
    pub title: String,
    pub text: String,
    pub token_count: u64,
}

impl TranscriptRecord {
    /// Builds a record, costing the text with the crate's estimator.
    pub fn new(video_id: impl Into<String>, title: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let token_count = crate::tokens::estimate(&text);
        Self {
            video_id: video_id.into(),
            title: title.into(),
            text,
            token_count,
        }
    }

    pub fn video_ref(&self) -> VideoRef {
        VideoRef {
            id: self.video_id.clone(),
            title: self.title.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRef {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedVideo {
    pub id: String,
    pub title: String,
    pub reason: String,
}

/// A file that was written, with the videos it holds and their summed cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputArtifact {
    pub file_path: PathBuf,
    pub videos: Vec<VideoRef>,
    pub token_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingReport {
    pub successful: Vec<VideoRef>,
    pub failed: Vec<FailedVideo>,
    pub output_files: Vec<OutputArtifact>,
    pub warnings: Vec<String>,
    pub cancelled: bool,
}

impl ProcessingReport {
    pub fn total_tokens(&self) -> u64 {
        self.output_files.iter().map(|a| a.token_count).sum()
    }
}
