//! Grouping transcripts into output files.
//!
//! Planning is pure: the `plan_*` functions decide which records land in
//! which file. [`Packer`] walks a plan, checks for cancellation before every
//! write and hands each group to the [`Emitter`].

pub mod dual_limit;
pub mod file_limit;
pub mod group;
pub mod token_limit;

pub use dual_limit::{BatchPlan, batch_size, plan_with_both_limits};
pub use file_limit::{FileLimitPlan, plan_by_file_limit};
pub use group::Group;
pub use token_limit::plan_by_token_limit;

use tracing::{info, warn};

use crate::{
    cancel::CancellationSignal,
    config::{OutputType, StrategyConfig},
    emitter::{Emitter, FileName},
    error::Result,
    progress::ProgressSink,
    tokens::MAX_TOKENS_PER_FILE,
    types::{OutputArtifact, TranscriptRecord},
};

/// A group together with the file it is destined for.
#[derive(Debug)]
pub struct PlannedFile<'a> {
    pub name: FileName,
    pub group: Group<'a>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackOutcome {
    pub artifacts: Vec<OutputArtifact>,
    pub warnings: Vec<String>,
    pub cancelled: bool,
}

pub struct Packer<'p> {
    emitter: &'p Emitter,
    cancel: &'p CancellationSignal,
    progress: &'p dyn ProgressSink,
    current: usize,
    total: usize,
}

impl<'p> Packer<'p> {
    pub fn new(
        emitter: &'p Emitter,
        cancel: &'p CancellationSignal,
        progress: &'p dyn ProgressSink,
    ) -> Self {
        Self {
            emitter,
            cancel,
            progress,
            current: 0,
            total: 0,
        }
    }

    /// Position reported alongside packing messages.
    pub fn at(mut self, current: usize, total: usize) -> Self {
        self.current = current;
        self.total = total;
        self
    }

    fn report(&self, message: &str) {
        self.progress.report(self.current, self.total, message);
    }

    /// Runs the strategy selected by `strategy`.
    pub async fn pack(
        &self,
        records: &[TranscriptRecord],
        strategy: &StrategyConfig,
    ) -> Result<PackOutcome> {
        strategy.validate()?;

        match strategy.output_type {
            OutputType::TokenLimit => {
                self.report("Creating token-limited files...");
                self.pack_by_token_limit(records, strategy.limit_value).await
            }
            OutputType::FileLimit => {
                self.report("Creating file-limited output...");
                let files = usize::try_from(strategy.limit_value).unwrap_or(usize::MAX);
                self.pack_by_file_limit(records, files).await
            }
            OutputType::Both => match strategy.dual_limits() {
                Some((tokens, files)) => {
                    self.report("Processing with both token and file limits...");
                    self.pack_with_both_limits(records, tokens, files).await
                }
                None => {
                    self.report("Creating token-limited files (default)...");
                    self.pack_by_token_limit(records, strategy.limit_value).await
                }
            },
        }
    }

    pub async fn pack_by_token_limit(
        &self,
        records: &[TranscriptRecord],
        limit: u64,
    ) -> Result<PackOutcome> {
        let files = plan_by_token_limit(records, limit);
        info!(records = records.len(), files = files.len(), limit, "packing by token limit");

        let mut outcome = PackOutcome::default();
        self.write_files(files, &mut outcome).await?;
        Ok(outcome)
    }

    pub async fn pack_by_file_limit(
        &self,
        records: &[TranscriptRecord],
        file_limit: usize,
    ) -> Result<PackOutcome> {
        let plan = plan_by_file_limit(records, file_limit);
        info!(
            records = records.len(),
            files = plan.files.len(),
            file_limit,
            "packing by file limit"
        );

        let mut outcome = PackOutcome::default();
        if !plan.dropped.is_empty() {
            let ids = plan
                .dropped
                .iter()
                .map(|r| r.video_id.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            warn!(dropped = plan.dropped.len(), %ids, "file limit forced dropping transcripts");
            outcome.warnings.push(format!(
                "File limit of {} could not be met within {} tokens per file; left out {} video(s): {}",
                file_limit,
                MAX_TOKENS_PER_FILE,
                plan.dropped.len(),
                ids
            ));
        }

        self.write_files(plan.files, &mut outcome).await?;
        Ok(outcome)
    }

    pub async fn pack_with_both_limits(
        &self,
        records: &[TranscriptRecord],
        token_limit: u64,
        file_limit: usize,
    ) -> Result<PackOutcome> {
        let batches = plan_with_both_limits(records, token_limit, file_limit);
        let batch_count = batches.len();
        info!(
            records = records.len(),
            batches = batch_count,
            token_limit,
            file_limit,
            "packing by token and file limits"
        );

        let mut outcome = PackOutcome::default();
        for batch in batches {
            if self.cancel.is_cancelled() {
                outcome.cancelled = true;
                return Ok(outcome);
            }
            self.report(&format!(
                "Processing batch {} of {}...",
                batch.index, batch_count
            ));
            self.write_files(batch.files, &mut outcome).await?;
            if outcome.cancelled {
                return Ok(outcome);
            }
        }

        if outcome.artifacts.len() > file_limit {
            if self.cancel.is_cancelled() {
                outcome.cancelled = true;
                return Ok(outcome);
            }
            self.report("Processing excess content...");
            let excess = outcome.artifacts.split_off(file_limit);
            if let Some(merged) = self.emitter.merge(excess).await? {
                warn!(path = %merged.file_path.display(), "content exceeded both limits");
                outcome.warnings.push(format!(
                    "Content exceeded both token and file limits. Excess content saved to {}",
                    merged.file_path.display()
                ));
                outcome.artifacts.push(merged);
            }
        }

        Ok(outcome)
    }

    /// Writes files in plan order. Stops before the next write once cancelled.
    async fn write_files(
        &self,
        files: Vec<PlannedFile<'_>>,
        outcome: &mut PackOutcome,
    ) -> Result<()> {
        for file in files {
            if self.cancel.is_cancelled() {
                outcome.cancelled = true;
                return Ok(());
            }
            let artifact = self.emitter.emit(&file.name, &file.group).await?;
            outcome.artifacts.push(artifact);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoopProgress;

    fn records(costs: &[u64]) -> Vec<TranscriptRecord> {
        costs
            .iter()
            .enumerate()
            .map(|(i, &tokens)| TranscriptRecord {
                video_id: format!("v{i}"),
                title: format!("Video {i}"),
                text: format!("transcript {i}"),
                token_count: tokens,
            })
            .collect()
    }

    #[tokio::test]
    async fn dual_limit_overflow_goes_to_excess_file() {
        let dir = tempfile::tempdir().unwrap();
        let emitter = Emitter::new(dir.path());
        let cancel = CancellationSignal::new();
        let packer = Packer::new(&emitter, &cancel, &NoopProgress);

        // two batches of two, each splitting into two files -> 4 files for a limit of 2
        let input = records(&[600, 600, 700, 700]);
        let outcome = packer.pack_with_both_limits(&input, 1000, 2).await.unwrap();

        assert!(!outcome.cancelled);
        assert_eq!(outcome.artifacts.len(), 3);
        let excess = &outcome.artifacts[2];
        assert_eq!(excess.file_path, dir.path().join("excess_content.txt"));
        assert_eq!(excess.token_count, 1400);
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].contains("excess_content.txt"));

        assert!(dir.path().join("combined_part_1.txt").exists());
        assert!(dir.path().join("combined_part_2.txt").exists());
        assert!(!dir.path().join("combined_part_3.txt").exists());
        assert!(!dir.path().join("combined_part_4.txt").exists());

        let total: u64 = outcome.artifacts.iter().map(|a| a.token_count).sum();
        assert_eq!(total, 2600);
    }

    #[tokio::test]
    async fn cancelled_before_packing_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let emitter = Emitter::new(dir.path().join("out"));
        let cancel = CancellationSignal::new();
        cancel.cancel();
        let packer = Packer::new(&emitter, &cancel, &NoopProgress);
        let input = records(&[100, 200, 300]);

        for strategy in [
            StrategyConfig::token_limit(150),
            StrategyConfig::file_limit(2),
            StrategyConfig::both(150, 2),
        ] {
            let outcome = packer.pack(&input, &strategy).await.unwrap();
            assert!(outcome.cancelled);
            assert!(outcome.artifacts.is_empty());
        }
        assert!(!dir.path().join("out").exists());
    }

    #[tokio::test]
    async fn cancel_between_batches_keeps_earlier_files() {
        let dir = tempfile::tempdir().unwrap();
        let emitter = Emitter::new(dir.path());
        let cancel = CancellationSignal::new();
        let trigger = cancel.clone();
        let sink = move |_: usize, _: usize, message: &str| {
            if message.starts_with("Processing batch 2") {
                trigger.cancel();
            }
        };
        let packer = Packer::new(&emitter, &cancel, &sink);
        let input = records(&[100, 100, 100, 100, 100, 100]);

        let outcome = packer.pack_with_both_limits(&input, 1000, 3).await.unwrap();

        assert!(outcome.cancelled);
        assert_eq!(outcome.artifacts.len(), 1);
        assert!(dir.path().join("combined_part_1.txt").exists());
        assert!(!dir.path().join("combined_part_2.txt").exists());
    }

    #[tokio::test]
    async fn both_without_file_limit_falls_back_to_token_limit() {
        let dir = tempfile::tempdir().unwrap();
        let emitter = Emitter::new(dir.path());
        let cancel = CancellationSignal::new();
        let packer = Packer::new(&emitter, &cancel, &NoopProgress);
        let input = records(&[5000, 3000, 4000]);

        let strategy = StrategyConfig {
            output_type: OutputType::Both,
            limit_value: 8000,
            token_limit: Some(100),
            file_limit: None,
            ..StrategyConfig::default()
        };
        let outcome = packer.pack(&input, &strategy).await.unwrap();

        let sums: Vec<u64> = outcome.artifacts.iter().map(|a| a.token_count).collect();
        assert_eq!(sums, vec![8000, 4000]);
    }

    #[tokio::test]
    async fn dropped_videos_are_reported_as_a_warning() {
        let dir = tempfile::tempdir().unwrap();
        let emitter = Emitter::new(dir.path());
        let cancel = CancellationSignal::new();
        let packer = Packer::new(&emitter, &cancel, &NoopProgress);
        let input = records(&[140_000, 130_000]);

        let outcome = packer.pack_by_file_limit(&input, 1).await.unwrap();

        assert_eq!(outcome.artifacts.len(), 1);
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].contains("v1"));
    }

    #[tokio::test]
    async fn invalid_strategy_is_rejected_before_any_write() {
        let dir = tempfile::tempdir().unwrap();
        let emitter = Emitter::new(dir.path().join("out"));
        let cancel = CancellationSignal::new();
        let packer = Packer::new(&emitter, &cancel, &NoopProgress);

        let err = packer
            .pack(&records(&[1]), &StrategyConfig::file_limit(0))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::TubepackError::InvalidConfig { .. }));
        assert!(!dir.path().join("out").exists());
    }
}
