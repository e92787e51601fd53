//! Script segmentation.
//!
//! Turns a reference script into the ordered [`Segment`]s the tracker
//! matches spoken text against. Sentences are split on terminal
//! punctuation followed by whitespace (a period directly after a digit,
//! as in "20.", is not a sentence end). Sentences longer than `max_words`
//! are cut again, preferring a clause boundary within a small look-back
//! window over a hard word-count cut.

use std::ops::Range;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::SegmentationConfig;
use crate::error::{Result, SyncError};

/// Marks that end a sentence-like span.
pub const TERMINAL_MARKS: [char; 3] = ['.', '!', '?'];

/// Marks that end a clause inside a sentence.
const CLAUSE_MARKS: [char; 3] = [',', ';', ':'];

fn is_terminal(c: char) -> bool {
    TERMINAL_MARKS.contains(&c)
}

/// One matchable unit of the reference script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Position in the expected script.
    pub index: usize,
    /// Trimmed, whitespace-normalized text. Never empty.
    pub text: String,
    /// Ordinal of the sentence this segment was cut from.
    pub sentence: usize,
}

impl Segment {
    /// Number of whitespace-separated words.
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// The ordered, non-empty segment sequence of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedScript {
    segments: Vec<Segment>,
}

impl ExpectedScript {
    /// Wrap a segment list, rejecting an empty one.
    pub fn new(segments: Vec<Segment>) -> Result<Self> {
        if segments.is_empty() {
            return Err(SyncError::invalid_script("no segments could be produced"));
        }
        Ok(Self { segments })
    }

    /// Segment at `index`, if in range.
    pub fn get(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Index of the final segment.
    pub fn last_index(&self) -> usize {
        self.segments.len() - 1
    }

    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }
}

/// A sentence-like span located in some text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Span {
    /// Byte range, trimmed of surrounding whitespace.
    pub range: Range<usize>,
    /// Whether a boundary closed the span (as opposed to running out of text).
    pub complete: bool,
}

/// True when the char at `idx` ends a sentence: it is a terminal mark and
/// its run of marks is not a period directly after a digit ("20.").
fn ends_sentence(chars: &[(usize, char)], idx: usize) -> bool {
    if !is_terminal(chars[idx].1) {
        return false;
    }
    let mut run_start = idx;
    while run_start > 0 && is_terminal(chars[run_start - 1].1) {
        run_start -= 1;
    }
    if chars[run_start].1 != '.' {
        return true;
    }
    match run_start.checked_sub(1) {
        Some(prev) => !chars[prev].1.is_numeric(),
        None => true,
    }
}

/// Locate sentence-like spans in `text`.
///
/// A span closes at whitespace following a sentence end, at a newline when
/// `line_breaks` is set, or at end of text. The span running into end of
/// text is `complete` only if it ends with a sentence end.
pub(crate) fn locate_spans(text: &str, line_breaks: bool) -> Vec<Span> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut spans = Vec::new();
    let mut start: Option<usize> = None;
    let mut last_visible: Option<usize> = None;

    for (pos, &(offset, c)) in chars.iter().enumerate() {
        if !c.is_whitespace() {
            start.get_or_insert(offset);
            last_visible = Some(pos);
            continue;
        }
        let (Some(span_start), Some(prev)) = (start, last_visible) else {
            continue;
        };
        let sentence_end = prev + 1 == pos && ends_sentence(&chars, prev);
        if sentence_end || (line_breaks && c == '\n') {
            let end = chars[prev].0 + chars[prev].1.len_utf8();
            spans.push(Span {
                range: span_start..end,
                complete: true,
            });
            start = None;
            last_visible = None;
        }
    }

    if let (Some(span_start), Some(prev)) = (start, last_visible) {
        let end = chars[prev].0 + chars[prev].1.len_utf8();
        spans.push(Span {
            range: span_start..end,
            complete: ends_sentence(&chars, prev),
        });
    }
    spans
}

/// Split text into trimmed sentence-like spans.
pub fn split_sentences(text: &str) -> Vec<&str> {
    locate_spans(text, false)
        .into_iter()
        .map(|span| &text[span.range])
        .collect()
}

/// Splits reference scripts into segments.
#[derive(Debug, Clone)]
pub struct Segmenter {
    config: SegmentationConfig,
    conjunctions: Vec<String>,
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new(SegmentationConfig::default())
    }
}

impl Segmenter {
    pub fn new(config: SegmentationConfig) -> Self {
        let conjunctions = config
            .clause_conjunctions
            .iter()
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty())
            .collect();
        Self {
            config,
            conjunctions,
        }
    }

    /// Same settings with a different `max_words`.
    pub fn with_max_words(mut self, max_words: usize) -> Self {
        self.config.max_words = max_words.max(1);
        self
    }

    pub fn config(&self) -> &SegmentationConfig {
        &self.config
    }

    /// Segment `script`. Fails with [`SyncError::InvalidScript`] when no
    /// segment can be produced.
    pub fn segment(&self, script: &str) -> Result<ExpectedScript> {
        if script.trim().is_empty() {
            return Err(SyncError::invalid_script("script is empty"));
        }

        let sentences: Vec<&str> = split_sentences(script)
            .into_iter()
            .filter(|s| s.chars().any(char::is_alphanumeric))
            .collect();
        let sentence_count = sentences.len();

        let mut segments = Vec::new();
        for (sentence, text) in sentences.into_iter().enumerate() {
            let last_sentence = sentence + 1 == sentence_count;
            let chunks = self.chunk_sentence(text);
            let chunk_count = chunks.len();
            for (n, chunk) in chunks.into_iter().enumerate() {
                let last_chunk = n + 1 == chunk_count;
                let require_mark = !(last_sentence && last_chunk);
                let text = normalize_terminal(&chunk, require_mark);
                segments.push(Segment {
                    index: segments.len(),
                    text,
                    sentence,
                });
            }
        }

        debug!(
            segments = segments.len(),
            sentences = sentence_count,
            max_words = self.config.max_words,
            "script segmented"
        );
        ExpectedScript::new(segments)
    }

    /// Cut one sentence into chunks of at most `max_words` words, merging a
    /// too-short trailing chunk into its predecessor.
    fn chunk_sentence(&self, sentence: &str) -> Vec<String> {
        let words: Vec<&str> = sentence.split_whitespace().collect();
        let max_words = self.config.max_words.max(1);
        if words.len() <= max_words {
            return vec![words.join(" ")];
        }

        let mut chunks: Vec<Vec<&str>> = Vec::new();
        let mut i = 0;
        while i < words.len() {
            let mut j = (i + max_words).min(words.len());
            if j < words.len() {
                let floor = (i + 1).max(j.saturating_sub(self.config.lookback_window));
                if let Some(k) = (floor..=j).rev().find(|&k| self.is_clause_cut(&words, k)) {
                    j = k;
                }
            }
            chunks.push(words[i..j].to_vec());
            i = j;
        }

        if chunks.len() > 1
            && chunks.last().map_or(0, Vec::len) < self.config.min_words
            && let Some(tail) = chunks.pop()
            && let Some(prev) = chunks.last_mut()
        {
            if let Some(last) = prev.last_mut() {
                *last = last.trim_end_matches(is_terminal);
            }
            prev.retain(|w| !w.is_empty());
            prev.extend(tail);
        }

        chunks.into_iter().map(|c| c.join(" ")).collect()
    }

    /// Whether cutting before `words[k]` falls on a clause boundary.
    fn is_clause_cut(&self, words: &[&str], k: usize) -> bool {
        let after_clause_mark = k > 0
            && words[k - 1]
                .chars()
                .last()
                .is_some_and(|c| CLAUSE_MARKS.contains(&c));
        let before_conjunction = words.get(k).is_some_and(|w| {
            let bare = w
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase();
            self.conjunctions.iter().any(|conj| *conj == bare)
        });
        after_clause_mark || before_conjunction
    }
}

/// Collapse a trailing run of terminal marks to its first mark. When
/// `require_mark` is set and there is no terminal mark, trailing clause
/// marks are dropped and a period appended.
fn normalize_terminal(text: &str, require_mark: bool) -> String {
    let stripped = text.trim_end_matches(is_terminal);
    if stripped.len() < text.len() {
        let mark = text[stripped.len()..].chars().next().unwrap_or('.');
        let mut out = stripped.trim_end().to_string();
        out.push(mark);
        return out;
    }
    if require_mark {
        let mut out = text
            .trim_end_matches(|c: char| CLAUSE_MARKS.contains(&c))
            .trim_end()
            .to_string();
        out.push('.');
        return out;
    }
    text.to_string()
}

/// Segment `script` with default settings and the given `max_words`.
pub fn segment(script: &str, max_words: usize) -> Result<Vec<Segment>> {
    let script = Segmenter::default().with_max_words(max_words).segment(script)?;
    Ok(script.segments)
}

/// Group segment indices by the sentence they were cut from.
pub fn sentence_buckets(segments: &[Segment]) -> Vec<Vec<usize>> {
    let mut buckets: Vec<Vec<usize>> = Vec::new();
    let mut current_sentence = None;
    for segment in segments {
        if current_sentence != Some(segment.sentence) {
            buckets.push(Vec::new());
            current_sentence = Some(segment.sentence);
        }
        if let Some(bucket) = buckets.last_mut() {
            bucket.push(segment.index);
        }
    }
    buckets
}
