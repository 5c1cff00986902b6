use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::codec::MetaKind;
use crate::rules::{GlobalRules, Rule, RuleSet};
use crate::scan::ScanFilter;
use crate::transform::NoteLength;

pub const DEFAULT_CONFIG_FILE: &str = "midiwatch.ron";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("unsupported max_note_length {0:?} in rule {1} (only \"1/8\" is supported)")]
    UnsupportedNoteLength(String, &'static str),
    #[error("unknown meta kind {0:?} in strip_keep_meta")]
    UnknownMetaKind(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalSection {
    pub strip_to_notes: bool,
    pub force_channel_zero: bool,
    pub ignore_filename_contains: Vec<String>,
    pub ignore_folders: Vec<String>,
    pub strip_keep_meta: Vec<String>,
}

impl Default for GlobalSection {
    fn default() -> Self {
        Self {
            strip_to_notes: true,
            force_channel_zero: true,
            ignore_filename_contains: Vec::new(),
            ignore_folders: Vec::new(),
            strip_keep_meta: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSection {
    pub filename_contains: Vec<String>,
    pub transpose_semitones: Option<i32>,
    pub track_name: Option<String>,
    pub max_note_length: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesSection {
    pub bass: RuleSection,
    pub drums: RuleSection,
    pub wildcard: Option<RuleSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchSection {
    pub debounce_ms: u64,
    /// Worker threads; defaults to the available parallelism.
    pub workers: Option<usize>,
    pub read_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            debounce_ms: 1000,
            workers: None,
            read_retries: 5,
            retry_delay_ms: 100,
        }
    }
}

/// The configuration file as written on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub global: GlobalSection,
    pub rules: RulesSection,
    pub watch: WatchSection,
}

/// Timing knobs for the controller and orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchSettings {
    pub debounce: Duration,
    pub workers: usize,
    pub read_retries: u32,
    pub retry_delay: Duration,
}

impl Default for WatchSettings {
    fn default() -> Self {
        WatchSection::default().settings()
    }
}

impl WatchSection {
    pub fn settings(&self) -> WatchSettings {
        let workers = self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism().map_or(2, std::num::NonZeroUsize::get)
        });
        WatchSettings {
            debounce: Duration::from_millis(self.debounce_ms),
            workers: workers.max(1),
            read_retries: self.read_retries.max(1),
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(text)?)
    }

    /// Validates the rule sections into an immutable [`RuleSet`].
    pub fn rule_set(&self) -> Result<RuleSet, ConfigError> {
        let strip_keep_meta = self
            .global
            .strip_keep_meta
            .iter()
            .map(|name| {
                MetaKind::from_name(name).ok_or_else(|| ConfigError::UnknownMetaKind(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RuleSet {
            global: GlobalRules {
                strip_to_notes: self.global.strip_to_notes,
                force_channel_zero: self.global.force_channel_zero,
                strip_keep_meta,
            },
            bass: self.rules.bass.to_rule("bass")?,
            drums: self.rules.drums.to_rule("drums")?,
            wildcard: self
                .rules
                .wildcard
                .as_ref()
                .map(|section| section.to_rule("wildcard"))
                .transpose()?,
        })
    }

    pub fn scan_filter(&self) -> ScanFilter {
        ScanFilter::new(
            &self.global.ignore_filename_contains,
            &self.global.ignore_folders,
        )
    }
}

impl RuleSection {
    fn to_rule(&self, rule_name: &'static str) -> Result<Rule, ConfigError> {
        let max_note_length = self
            .max_note_length
            .as_deref()
            .map(|value| {
                NoteLength::parse(value)
                    .ok_or_else(|| ConfigError::UnsupportedNoteLength(value.to_string(), rule_name))
            })
            .transpose()?;

        Ok(Rule {
            filename_contains: self
                .filename_contains
                .iter()
                .map(|keyword| keyword.trim().to_lowercase())
                .filter(|keyword| !keyword.is_empty())
                .collect(),
            transpose_semitones: self.transpose_semitones,
            track_name: self.track_name.clone(),
            max_note_length,
        })
    }
}
