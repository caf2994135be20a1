//! Turn a channel's worth of transcripts into a handful of text files that
//! fit an LLM context window.
//!
//! A [`Processor`] fetches transcripts from a [`TranscriptSource`], writes
//! one file per video plus a rollup, and packs the rest with one of three
//! strategies (see [`packer`]). Long runs go through a [`TaskRegistry`] so
//! callers can poll progress and cancel.

pub mod cancel;
pub mod config;
pub mod emitter;
pub mod error;
pub mod packer;
pub mod processor;
pub mod progress;
pub mod source;
pub mod task;
pub mod tokens;
pub mod types;

pub use cancel::CancellationSignal;
pub use config::{OutputStyle, OutputType, ProcessorConfig, StrategyConfig, default_output_dir};
pub use emitter::{Emitter, FileName, sanitize_title};
pub use error::{Result, SourceError, TubepackError};
pub use packer::{PackOutcome, Packer};
pub use processor::{ProcessRequest, Processor};
pub use progress::{ChannelProgress, NoopProgress, ProgressEvent, ProgressSink};
pub use source::{DirectorySource, MemorySource, TranscriptSource, resolve_transcript};
pub use task::{DEFAULT_TASK_TTL, Task, TaskInfo, TaskRegistry};
pub use tokens::{MAX_TOKENS_PER_FILE, SOLO_THRESHOLD, estimate};
pub use types::{
    FailedVideo, Language, OutputArtifact, ProcessingReport, TranscriptRecord, VideoMeta, VideoRef,
};
