use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TubepackError};

pub const DEFAULT_LIMIT_VALUE: u64 = 4000;
pub const DEFAULT_MAX_WORKERS: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputType {
    #[default]
    TokenLimit,
    FileLimit,
    Both,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputStyle {
    Individual,
    Combined,
    #[default]
    Both,
}

impl OutputStyle {
    pub fn individual(self) -> bool {
        matches!(self, OutputStyle::Individual | OutputStyle::Both)
    }

    pub fn combined(self) -> bool {
        matches!(self, OutputStyle::Combined | OutputStyle::Both)
    }
}

/// How combined files are packed.
///
/// `limit_value` is a token limit for [`OutputType::TokenLimit`] and a file
/// count for [`OutputType::FileLimit`]. [`OutputType::Both`] reads
/// `token_limit` and `file_limit`, falling back to token-limit packing with
/// `limit_value` when either is missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyConfig {
    #[serde(default)]
    pub output_type: OutputType,
    #[serde(default = "default_limit_value")]
    pub limit_value: u64,
    #[serde(default)]
    pub token_limit: Option<u64>,
    #[serde(default)]
    pub file_limit: Option<usize>,
    #[serde(default)]
    pub output_style: OutputStyle,
}

fn default_limit_value() -> u64 {
    DEFAULT_LIMIT_VALUE
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            output_type: OutputType::default(),
            limit_value: DEFAULT_LIMIT_VALUE,
            token_limit: None,
            file_limit: None,
            output_style: OutputStyle::default(),
        }
    }
}

impl StrategyConfig {
    pub fn token_limit(limit: u64) -> Self {
        Self {
            output_type: OutputType::TokenLimit,
            limit_value: limit,
            ..Self::default()
        }
    }

    pub fn file_limit(files: usize) -> Self {
        Self {
            output_type: OutputType::FileLimit,
            limit_value: files as u64,
            ..Self::default()
        }
    }

    pub fn both(token_limit: u64, file_limit: usize) -> Self {
        Self {
            output_type: OutputType::Both,
            token_limit: Some(token_limit),
            file_limit: Some(file_limit),
            ..Self::default()
        }
    }

    pub fn with_style(mut self, style: OutputStyle) -> Self {
        self.output_style = style;
        self
    }

    /// Both limits, when dual-limit packing applies.
    pub fn dual_limits(&self) -> Option<(u64, usize)> {
        match (self.output_type, self.token_limit, self.file_limit) {
            (OutputType::Both, Some(tokens), Some(files)) => Some((tokens, files)),
            _ => None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let Some((tokens, files)) = self.dual_limits() {
            if tokens == 0 {
                return Err(TubepackError::invalid_config("token_limit must be > 0"));
            }
            if files == 0 {
                return Err(TubepackError::invalid_config("file_limit must be > 0"));
            }
            return Ok(());
        }
        if self.limit_value == 0 {
            return Err(TubepackError::invalid_config("limit_value must be > 0"));
        }
        if self.output_type == OutputType::FileLimit && usize::try_from(self.limit_value).is_err() {
            return Err(TubepackError::invalid_config("limit_value is too large for a file count"));
        }
        Ok(())
    }
}

/// Settings that outlive a single run.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub output_dir: PathBuf,
    pub max_workers: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }
}

impl ProcessorConfig {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }
}

/// The user's Downloads folder when there is one, `./output` otherwise.
pub fn default_output_dir() -> PathBuf {
    dirs::download_dir()
        .filter(|dir| dir.exists())
        .unwrap_or_else(|| PathBuf::from("output"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dual_limits_need_both_values() {
        assert_eq!(StrategyConfig::both(8000, 3).dual_limits(), Some((8000, 3)));

        let half = StrategyConfig {
            output_type: OutputType::Both,
            token_limit: Some(8000),
            ..StrategyConfig::default()
        };
        assert_eq!(half.dual_limits(), None);
        assert_eq!(StrategyConfig::token_limit(8000).dual_limits(), None);
    }

    #[test]
    fn rejects_zero_limits() {
        assert!(StrategyConfig::token_limit(0).validate().is_err());
        assert!(StrategyConfig::file_limit(0).validate().is_err());
        assert!(StrategyConfig::both(0, 3).validate().is_err());
        assert!(StrategyConfig::both(100, 0).validate().is_err());
        assert!(StrategyConfig::both(100, 3).validate().is_ok());
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: StrategyConfig = serde_json::from_str(r#"{"output_type": "file_limit"}"#).unwrap();
        assert_eq!(config.output_type, OutputType::FileLimit);
        assert_eq!(config.limit_value, DEFAULT_LIMIT_VALUE);
        assert_eq!(config.output_style, OutputStyle::Both);
    }

    #[test]
    fn style_flags() {
        assert!(OutputStyle::Both.individual() && OutputStyle::Both.combined());
        assert!(OutputStyle::Individual.individual() && !OutputStyle::Individual.combined());
        assert!(!OutputStyle::Combined.individual() && OutputStyle::Combined.combined());
    }

    #[test]
    fn worker_count_is_at_least_one() {
        assert_eq!(ProcessorConfig::new("out").with_max_workers(0).max_workers, 1);
    }
}
