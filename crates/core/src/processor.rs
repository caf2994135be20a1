use std::{path::PathBuf, sync::Arc};

use futures_util::{StreamExt, stream};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    cancel::CancellationSignal,
    config::{ProcessorConfig, StrategyConfig},
    emitter::{Emitter, sanitize_title},
    error::Result,
    packer::Packer,
    progress::ProgressSink,
    source::{TranscriptSource, resolve_transcript},
    types::{FailedVideo, ProcessingReport, TranscriptRecord, VideoMeta},
};

const MAX_CHANNEL_DIR_CHARS: usize = 50;
const CANCELLED_STATUS: &str = "Operation cancelled";

/// What to do with one batch of videos.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRequest {
    pub language_code: String,
    #[serde(default)]
    pub strategy: StrategyConfig,
    /// Skip videos without a transcript in `language_code` before fetching.
    #[serde(default)]
    pub filter_has_transcript: bool,
    #[serde(default)]
    pub is_single_video: bool,
    /// Extra directory below the configured output directory.
    #[serde(default)]
    pub output_subdir: Option<String>,
}

impl Default for ProcessRequest {
    fn default() -> Self {
        Self {
            language_code: "en".to_string(),
            strategy: StrategyConfig::default(),
            filter_has_transcript: false,
            is_single_video: false,
            output_subdir: None,
        }
    }
}

enum FetchOutcome {
    Fetched(TranscriptRecord),
    Failed(String),
    Skipped,
}

/// Runs fetch, filter, pack and emit for a list of videos.
pub struct Processor {
    source: Arc<dyn TranscriptSource>,
    config: ProcessorConfig,
}

impl Processor {
    pub fn new(source: Arc<dyn TranscriptSource>, config: ProcessorConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    fn width(&self) -> usize {
        self.config.max_workers.max(1)
    }

    /// Output directory for a run: channel runs get a folder named after the channel.
    pub fn output_folder(&self, videos: &[VideoMeta], request: &ProcessRequest) -> PathBuf {
        let mut folder = self.config.output_dir.clone();
        if let Some(subdir) = &request.output_subdir {
            folder.push(subdir);
        }
        if !request.is_single_video {
            if let Some(first) = videos.first() {
                let channel = first.channel_title.as_deref().unwrap_or("channel");
                let safe = sanitize_title(channel, MAX_CHANNEL_DIR_CHARS);
                folder.push(if safe.is_empty() { "channel".to_string() } else { safe });
            }
        }
        folder
    }

    pub async fn process(
        &self,
        videos: &[VideoMeta],
        request: &ProcessRequest,
        progress: &dyn ProgressSink,
        cancel: &CancellationSignal,
    ) -> Result<ProcessingReport> {
        request.strategy.validate()?;

        let mut report = ProcessingReport::default();
        let emitter = Emitter::new(self.output_folder(videos, request));
        info!(
            videos = videos.len(),
            language = %request.language_code,
            output = %emitter.output_dir().display(),
            "processing transcripts"
        );

        progress.report(0, videos.len(), "Checking for transcripts...");

        let videos: Vec<&VideoMeta> = if request.filter_has_transcript {
            match self
                .filter_with_transcripts(videos, &request.language_code, progress, cancel)
                .await
            {
                Some(kept) => {
                    progress.report(0, kept.len(), "Starting transcript download...");
                    kept
                }
                None => return Ok(cancelled(report)),
            }
        } else {
            videos.iter().collect()
        };
        let total = videos.len();

        let records = self
            .fetch_transcripts(&videos, &request.language_code, &mut report, progress, cancel)
            .await;

        if cancel.is_cancelled() {
            progress.report(total, total, CANCELLED_STATUS);
            return Ok(cancelled(report));
        }

        progress.report(total, total, "Processing transcripts into files...");

        if request.is_single_video {
            progress.report(total, total, "Creating transcript file...");
            if let Some(record) = records.first() {
                report.output_files.push(emitter.emit_individual(record).await?);
            }
        } else {
            let style = request.strategy.output_style;

            if style.individual() {
                progress.report(total, total, "Creating individual files...");
                let files = emitter
                    .emit_individual_files(&records, self.width(), cancel)
                    .await?;
                report.output_files.extend(files);
            }

            if cancel.is_cancelled() {
                progress.report(total, total, CANCELLED_STATUS);
                return Ok(cancelled(report));
            }

            progress.report(total, total, "Creating combined file with all transcripts...");
            if let Some(rollup) = emitter.emit_rollup(&records).await? {
                report.output_files.push(rollup);
            }

            if style.combined() {
                if cancel.is_cancelled() {
                    progress.report(total, total, CANCELLED_STATUS);
                    return Ok(cancelled(report));
                }

                let outcome = Packer::new(&emitter, cancel, progress)
                    .at(total, total)
                    .pack(&records, &request.strategy)
                    .await?;
                report.output_files.extend(outcome.artifacts);
                report.warnings.extend(outcome.warnings);
                if outcome.cancelled {
                    progress.report(total, total, CANCELLED_STATUS);
                    return Ok(cancelled(report));
                }
            }
        }

        info!(
            successful = report.successful.len(),
            failed = report.failed.len(),
            files = report.output_files.len(),
            "processing complete"
        );
        progress.report(total, total, "Processing complete!");
        Ok(report)
    }

    /// Keeps videos that offer `language_code`. `None` when cancelled.
    async fn filter_with_transcripts<'v>(
        &self,
        videos: &'v [VideoMeta],
        language_code: &str,
        progress: &dyn ProgressSink,
        cancel: &CancellationSignal,
    ) -> Option<Vec<&'v VideoMeta>> {
        let total = videos.len();
        let probes: Vec<_> = videos
            .iter()
            .map(|video| self.offers_language(video, language_code, cancel))
            .collect();
        let mut probes = stream::iter(probes).buffered(self.width());

        let mut kept = Vec::new();
        let mut checked = 0;
        let mut interrupted = false;
        while let Some((video, offered)) = probes.next().await {
            match offered {
                Some(true) => kept.push(video),
                Some(false) => {}
                None => interrupted = true,
            }
            checked += 1;
            if !interrupted {
                progress.report(
                    checked,
                    total,
                    &format!("Checking transcripts ({}/{})...", checked, total),
                );
            }
        }

        if interrupted || cancel.is_cancelled() {
            progress.report(checked, total, CANCELLED_STATUS);
            return None;
        }
        debug!(kept = kept.len(), total, "filtered videos by language");
        Some(kept)
    }

    async fn offers_language<'v>(
        &self,
        video: &'v VideoMeta,
        language_code: &str,
        cancel: &CancellationSignal,
    ) -> (&'v VideoMeta, Option<bool>) {
        if cancel.is_cancelled() {
            return (video, None);
        }
        let languages = self.source.languages(&video.id).await;
        (video, Some(languages.iter().any(|l| l.code == language_code)))
    }

    /// Fetches every transcript on the worker pool.
    ///
    /// Only this task touches `report`; workers hand back their outcome and
    /// results are consumed in input order.
    async fn fetch_transcripts(
        &self,
        videos: &[&VideoMeta],
        language_code: &str,
        report: &mut ProcessingReport,
        progress: &dyn ProgressSink,
        cancel: &CancellationSignal,
    ) -> Vec<TranscriptRecord> {
        let total = videos.len();
        let fetches: Vec<_> = videos
            .iter()
            .map(|&video| self.fetch_one(video, language_code, cancel))
            .collect();
        let mut fetches = stream::iter(fetches).buffered(self.width());

        let mut records = Vec::new();
        let mut processed = 0;
        while let Some((video, outcome)) = fetches.next().await {
            match outcome {
                FetchOutcome::Fetched(record) => {
                    report.successful.push(record.video_ref());
                    records.push(record);
                }
                FetchOutcome::Failed(reason) => {
                    debug!(video_id = %video.id, %reason, "transcript fetch failed");
                    report.failed.push(FailedVideo {
                        id: video.id.clone(),
                        title: video.title.clone(),
                        reason,
                    });
                }
                FetchOutcome::Skipped => continue,
            }
            processed += 1;
            progress.report(
                processed,
                total,
                &format!("Processing video {} of {}: {}", processed, total, video.title),
            );
        }
        records
    }

    async fn fetch_one<'v>(
        &self,
        video: &'v VideoMeta,
        language_code: &str,
        cancel: &CancellationSignal,
    ) -> (&'v VideoMeta, FetchOutcome) {
        if cancel.is_cancelled() {
            return (video, FetchOutcome::Skipped);
        }
        let outcome = match resolve_transcript(self.source.as_ref(), &video.id, language_code).await {
            Ok(text) => FetchOutcome::Fetched(TranscriptRecord::new(&video.id, &video.title, text)),
            Err(e) => FetchOutcome::Failed(e.to_string()),
        };
        (video, outcome)
    }
}

fn cancelled(mut report: ProcessingReport) -> ProcessingReport {
    info!("processing cancelled");
    report.cancelled = true;
    report
}
