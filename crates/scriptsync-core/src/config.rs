//! Session configuration.
//!
//! [`SyncConfig`] groups the segmentation, alignment and feed settings.
//! Every field has a serde default, so a partial (or empty) JSON object
//! deserializes to a usable configuration. Keys are accepted in
//! snake_case or camelCase.
//!
//! Discovery order used by [`SyncConfig::load`]:
//! 1. An explicitly supplied path.
//! 2. The `SCRIPTSYNC_CONFIG` environment variable.
//! 3. `~/.scriptsync/config.json`
//! 4. If none exists, [`SyncConfig::default`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SyncError};

/// Environment variable naming a config file.
pub const CONFIG_ENV_VAR: &str = "SCRIPTSYNC_CONFIG";

/// Top-level configuration for a tracking session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    /// How the reference script is cut into match units.
    #[serde(default)]
    pub segmentation: SegmentationConfig,

    /// Matching and silence detection settings.
    #[serde(default)]
    pub alignment: AlignmentConfig,

    /// Settings for the paced playback feed.
    #[serde(default)]
    pub feed: FeedConfig,
}

/// Segmenter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentationConfig {
    /// Maximum words per segment before a sentence is sub-split.
    #[serde(default = "default_max_words", alias = "maxWords")]
    pub max_words: usize,

    /// A trailing sub-chunk shorter than this is merged into its predecessor.
    #[serde(default = "default_min_words", alias = "minWords")]
    pub min_words: usize,

    /// How many tokens to look back for a clause boundary.
    #[serde(default = "default_lookback_window", alias = "lookbackWindow")]
    pub lookback_window: usize,

    /// Coordinating conjunctions that start a new clause.
    #[serde(default = "default_clause_conjunctions", alias = "clauseConjunctions")]
    pub clause_conjunctions: Vec<String>,
}

fn default_max_words() -> usize {
    10
}
fn default_min_words() -> usize {
    4
}
fn default_lookback_window() -> usize {
    3
}
fn default_clause_conjunctions() -> Vec<String> {
    ["ve", "ama", "fakat", "and", "but", "or"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            max_words: default_max_words(),
            min_words: default_min_words(),
            lookback_window: default_lookback_window(),
            clause_conjunctions: default_clause_conjunctions(),
        }
    }
}

/// Which similarity backend scores spoken spans.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScorerKind {
    /// Normalized Levenshtein ratio over lowercased words.
    #[default]
    Lexical,
    /// Cosine similarity of embeddings from an HTTP service.
    Embedding,
}

impl ScorerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lexical => "lexical",
            Self::Embedding => "embedding",
        }
    }
}

/// Alignment tracker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignmentConfig {
    /// Minimum score (0.0-1.0) for a candidate segment to count as spoken.
    #[serde(default = "default_similarity_threshold", alias = "similarityThreshold")]
    pub similarity_threshold: f32,

    /// Extra segments past the pointer considered in one match attempt.
    #[serde(default = "default_lookahead_segments", alias = "lookaheadSegments")]
    pub lookahead_segments: usize,

    /// Transcript inactivity in ms before the tracker pauses.
    #[serde(default = "default_idle_timeout_ms", alias = "idleTimeoutMs")]
    pub idle_timeout_ms: u64,

    /// Interval in ms between polls of the transcript source.
    #[serde(default = "default_poll_interval_ms", alias = "pollIntervalMs")]
    pub poll_interval_ms: u64,

    /// Treat a line break in the transcript as the end of a spoken span,
    /// for recognizers that emit unpunctuated fragments one per line.
    /// Off by default: spans end at terminal punctuation only.
    #[serde(default, alias = "lineBreaksCompleteSpan")]
    pub line_breaks_complete_span: bool,

    /// Similarity backend.
    #[serde(default)]
    pub scorer: ScorerKind,

    /// Embedding service settings, used when `scorer` is `embedding`.
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

fn default_similarity_threshold() -> f32 {
    0.70
}
fn default_lookahead_segments() -> usize {
    2
}
fn default_idle_timeout_ms() -> u64 {
    1500
}
fn default_poll_interval_ms() -> u64 {
    200
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            lookahead_segments: default_lookahead_segments(),
            idle_timeout_ms: default_idle_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            line_breaks_complete_span: false,
            scorer: ScorerKind::default(),
            embedding: EmbeddingConfig::default(),
        }
    }
}

impl AlignmentConfig {
    /// Inactivity window before a silence pause.
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    /// Poll loop period.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// OpenAI-compatible embedding endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Full URL of the embeddings endpoint.
    #[serde(default = "default_embedding_endpoint")]
    pub endpoint: String,

    /// Model name sent with each request.
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Environment variable holding the bearer token, if any.
    #[serde(default, alias = "apiKeyEnv")]
    pub api_key_env: Option<String>,
}

fn default_embedding_endpoint() -> String {
    "http://127.0.0.1:8080/v1/embeddings".into()
}
fn default_embedding_model() -> String {
    "paraphrase-multilingual-MiniLM-L12-v2".into()
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: default_embedding_endpoint(),
            model: default_embedding_model(),
            api_key_env: None,
        }
    }
}

/// Paced feed settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Maximum words per feed unit (independent of the tracker's segments).
    #[serde(default = "default_feed_max_words", alias = "maxWords")]
    pub max_words: usize,

    /// Delay per word after a unit is delivered, in ms.
    #[serde(default = "default_per_word_pacing_ms", alias = "perWordPacingMs")]
    pub per_word_pacing_ms: u64,

    /// How often a paused feed re-checks the pause flag, in ms.
    #[serde(default = "default_pause_poll_ms", alias = "pausePollMs")]
    pub pause_poll_ms: u64,

    /// A reported silence at least this long pauses the feed, in ms.
    #[serde(default = "default_silence_pause_ms", alias = "silencePauseMs")]
    pub silence_pause_ms: u64,
}

fn default_feed_max_words() -> usize {
    40
}
fn default_per_word_pacing_ms() -> u64 {
    200
}
fn default_pause_poll_ms() -> u64 {
    100
}
fn default_silence_pause_ms() -> u64 {
    1500
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            max_words: default_feed_max_words(),
            per_word_pacing_ms: default_per_word_pacing_ms(),
            pause_poll_ms: default_pause_poll_ms(),
            silence_pause_ms: default_silence_pause_ms(),
        }
    }
}

impl FeedConfig {
    /// Pacing delay for a unit of `words` words.
    pub fn pacing_for(&self, words: usize) -> Duration {
        Duration::from_millis(self.per_word_pacing_ms.saturating_mul(words as u64))
    }

    /// Pause flag re-check period.
    pub fn pause_poll(&self) -> Duration {
        Duration::from_millis(self.pause_poll_ms)
    }

    /// Silence length that pauses the feed.
    pub fn silence_pause(&self) -> Duration {
        Duration::from_millis(self.silence_pause_ms)
    }
}

impl SyncConfig {
    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let seg = &self.segmentation;
        if seg.max_words == 0 {
            return Err(SyncError::config("segmentation.max_words must be at least 1"));
        }
        if seg.min_words > seg.max_words {
            return Err(SyncError::config(format!(
                "segmentation.min_words ({}) exceeds max_words ({})",
                seg.min_words, seg.max_words
            )));
        }

        let align = &self.alignment;
        if !(0.0..=1.0).contains(&align.similarity_threshold) {
            return Err(SyncError::config(format!(
                "alignment.similarity_threshold must be within 0.0-1.0, got {}",
                align.similarity_threshold
            )));
        }
        if align.poll_interval_ms == 0 {
            return Err(SyncError::config("alignment.poll_interval_ms must be positive"));
        }
        if align.idle_timeout_ms == 0 {
            return Err(SyncError::config("alignment.idle_timeout_ms must be positive"));
        }

        let feed = &self.feed;
        if feed.max_words == 0 {
            return Err(SyncError::config("feed.max_words must be at least 1"));
        }
        if feed.pause_poll_ms == 0 {
            return Err(SyncError::config("feed.pause_poll_ms must be positive"));
        }
        Ok(())
    }

    /// Parse a configuration from JSON text and validate it.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve and load the configuration.
    ///
    /// An explicitly supplied path must exist. A path found through
    /// discovery that does not exist falls back to the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            let text = std::fs::read_to_string(path)?;
            return Self::from_json(&text);
        }

        let discovered = discover_config_path(
            None,
            std::env::var(CONFIG_ENV_VAR).ok(),
            dirs::home_dir(),
        );
        match discovered {
            Some(path) if path.exists() => {
                debug!(path = %path.display(), "loading config");
                let text = std::fs::read_to_string(&path)?;
                Self::from_json(&text)
            }
            Some(path) => {
                debug!(path = %path.display(), "config file not found, using defaults");
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }
}

/// Pick the config path using the fallback chain.
///
/// Pure over its inputs so callers (and tests) control the environment.
pub fn discover_config_path(
    explicit: Option<&Path>,
    env_value: Option<String>,
    home_dir: Option<PathBuf>,
) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(value) = env_value.filter(|v| !v.trim().is_empty()) {
        return Some(PathBuf::from(value));
    }
    home_dir.map(|home| home.join(".scriptsync").join("config.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let config = SyncConfig::from_json("{}").unwrap();
        assert_eq!(config.segmentation.max_words, 10);
        assert_eq!(config.segmentation.min_words, 4);
        assert_eq!(config.segmentation.lookback_window, 3);
        assert!((config.alignment.similarity_threshold - 0.70).abs() < f32::EPSILON);
        assert_eq!(config.alignment.lookahead_segments, 2);
        assert_eq!(config.alignment.idle_timeout(), Duration::from_millis(1500));
        assert_eq!(config.alignment.poll_interval(), Duration::from_millis(200));
        assert!(!config.alignment.line_breaks_complete_span);
        assert_eq!(config.alignment.scorer, ScorerKind::Lexical);
        assert_eq!(config.feed.per_word_pacing_ms, 200);
    }

    #[test]
    fn camel_case_aliases_accepted() {
        let json = r#"{
            "segmentation": { "maxWords": 12, "minWords": 3 },
            "alignment": { "similarityThreshold": 0.8, "lookaheadSegments": 0, "idleTimeoutMs": 3000 },
            "feed": { "perWordPacingMs": 250 }
        }"#;
        let config = SyncConfig::from_json(json).unwrap();
        assert_eq!(config.segmentation.max_words, 12);
        assert_eq!(config.segmentation.min_words, 3);
        assert!((config.alignment.similarity_threshold - 0.8).abs() < f32::EPSILON);
        assert_eq!(config.alignment.lookahead_segments, 0);
        assert_eq!(config.alignment.idle_timeout_ms, 3000);
        assert_eq!(config.feed.per_word_pacing_ms, 250);
    }

    #[test]
    fn scorer_kind_parses_snake_case() {
        let config =
            SyncConfig::from_json(r#"{"alignment": {"scorer": "embedding"}}"#).unwrap();
        assert_eq!(config.alignment.scorer, ScorerKind::Embedding);
    }

    #[test]
    fn threshold_out_of_range_rejected() {
        let err = SyncConfig::from_json(r#"{"alignment": {"similarity_threshold": 1.5}}"#)
            .unwrap_err();
        assert!(matches!(err, SyncError::ConfigInvalid { .. }));
    }

    #[test]
    fn min_words_above_max_rejected() {
        let err = SyncConfig::from_json(r#"{"segmentation": {"max_words": 3, "min_words": 5}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("min_words"));
    }

    #[test]
    fn zero_poll_interval_rejected() {
        let err = SyncConfig::from_json(r#"{"alignment": {"poll_interval_ms": 0}}"#)
            .unwrap_err();
        assert!(matches!(err, SyncError::ConfigInvalid { .. }));
    }

    #[test]
    fn pacing_scales_with_word_count() {
        let feed = FeedConfig::default();
        assert_eq!(feed.pacing_for(5), Duration::from_millis(1000));
        assert_eq!(feed.pacing_for(0), Duration::ZERO);
    }

    #[test]
    fn discovery_prefers_explicit_path() {
        let path = discover_config_path(
            Some(Path::new("/etc/sync.json")),
            Some("/env/sync.json".into()),
            Some(PathBuf::from("/home/u")),
        );
        assert_eq!(path, Some(PathBuf::from("/etc/sync.json")));
    }

    #[test]
    fn discovery_uses_env_before_home() {
        let path = discover_config_path(
            None,
            Some("/env/sync.json".into()),
            Some(PathBuf::from("/home/u")),
        );
        assert_eq!(path, Some(PathBuf::from("/env/sync.json")));
    }

    #[test]
    fn discovery_falls_back_to_home() {
        let path = discover_config_path(None, Some("  ".into()), Some(PathBuf::from("/home/u")));
        assert_eq!(
            path,
            Some(PathBuf::from("/home/u/.scriptsync/config.json"))
        );
        assert_eq!(discover_config_path(None, None, None), None);
    }

    #[test]
    fn load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"alignment": {"lookahead_segments": 4}}"#).unwrap();
        let config = SyncConfig::load(Some(&path)).unwrap();
        assert_eq!(config.alignment.lookahead_segments, 4);
    }

    #[test]
    fn load_missing_explicit_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let err = SyncConfig::load(Some(&dir.path().join("nope.json"))).unwrap_err();
        assert!(matches!(err, SyncError::Io(_)));
    }
}
