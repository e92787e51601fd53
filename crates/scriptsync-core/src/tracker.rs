//! The alignment tracker.
//!
//! Compares the most recently completed spoken span against a bounded
//! lookahead window of expected segments and moves a forward-only pointer.
//! Every state change is reported once through the [`EventSink`]:
//!
//! ```text
//! tracking --(no match | silence)--> paused --(match)--> tracking
//!     \                                  |
//!      `------(last segment matched)-----+--> completed (terminal)
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::AlignmentConfig;
use crate::error::Result;
use crate::events::EventSink;
use crate::segment::{ExpectedScript, locate_spans};
use crate::similarity::SimilarityScorer;

/// Mutable tracking state of one session.
#[derive(Debug, Clone)]
pub struct AlignmentState {
    /// Index of the segment expected next. Never decreases.
    pub current_expected_index: usize,
    pub paused: bool,
    /// Terminal; once set nothing else changes.
    pub completed: bool,
    /// Transcript content as of the last committed evaluation.
    pub last_seen_text: String,
    /// When the transcript last changed.
    pub last_activity_time: Instant,
    /// Byte offset up to which completed spans have been evaluated.
    pub consumed_offset: usize,
}

impl AlignmentState {
    fn new(now: Instant) -> Self {
        Self {
            current_expected_index: 0,
            paused: false,
            completed: false,
            last_seen_text: String::new(),
            last_activity_time: now,
            consumed_offset: 0,
        }
    }
}

/// Coarse tracker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerStatus {
    Tracking,
    Paused,
    Completed,
}

impl std::fmt::Display for TrackerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tracking => write!(f, "tracking"),
            Self::Paused => write!(f, "paused"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// What a call to [`AlignmentTracker::on_transcript_grown`] did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GrowthOutcome {
    /// The session already completed; input ignored.
    Frozen,
    /// Same text as last time.
    Unchanged,
    /// Text changed but no new span has been completed.
    NoCompletedSpan,
    /// The span matched segment `index`.
    Matched { index: usize, score: f32 },
    /// The span matched the last segment and the session completed.
    Completed { index: usize, score: f32 },
    /// No candidate in the window reached the threshold.
    NoMatch { best_score: f32 },
}

/// Drives the alignment state machine for one session.
pub struct AlignmentTracker {
    script: Arc<ExpectedScript>,
    scorer: Arc<dyn SimilarityScorer>,
    sink: Arc<dyn EventSink>,
    threshold: f32,
    lookahead: usize,
    idle_timeout: Duration,
    line_breaks: bool,
    state: AlignmentState,
    observed_len: usize,
}

impl AlignmentTracker {
    /// Create a tracker whose idle clock starts now.
    pub fn new(
        script: Arc<ExpectedScript>,
        scorer: Arc<dyn SimilarityScorer>,
        sink: Arc<dyn EventSink>,
        config: &AlignmentConfig,
    ) -> Self {
        Self {
            script,
            scorer,
            sink,
            threshold: config.similarity_threshold,
            lookahead: config.lookahead_segments,
            idle_timeout: config.idle_timeout(),
            line_breaks: config.line_breaks_complete_span,
            state: AlignmentState::new(Instant::now()),
            observed_len: 0,
        }
    }

    /// Restart the idle clock at `now`.
    pub fn with_start_time(mut self, now: Instant) -> Self {
        self.state.last_activity_time = now;
        self
    }

    pub fn state(&self) -> &AlignmentState {
        &self.state
    }

    pub fn script(&self) -> &ExpectedScript {
        &self.script
    }

    pub fn status(&self) -> TrackerStatus {
        if self.state.completed {
            TrackerStatus::Completed
        } else if self.state.paused {
            TrackerStatus::Paused
        } else {
            TrackerStatus::Tracking
        }
    }

    pub fn is_completed(&self) -> bool {
        self.state.completed
    }

    /// Handle new transcript content, timestamped now.
    pub async fn on_transcript_grown(&mut self, full_text: &str) -> Result<GrowthOutcome> {
        self.on_transcript_grown_at(full_text, Instant::now()).await
    }

    /// Handle new transcript content observed at `now`.
    ///
    /// On a scoring failure the error is returned and no state other than
    /// the activity clock changes, so the same text is retried on the next
    /// call.
    pub async fn on_transcript_grown_at(
        &mut self,
        full_text: &str,
        now: Instant,
    ) -> Result<GrowthOutcome> {
        if self.state.completed {
            return Ok(GrowthOutcome::Frozen);
        }
        if full_text.len() != self.observed_len {
            self.observed_len = full_text.len();
            self.state.last_activity_time = now;
        }
        if full_text == self.state.last_seen_text {
            return Ok(GrowthOutcome::Unchanged);
        }

        let consumed = if full_text.starts_with(self.state.last_seen_text.as_str()) {
            self.state.consumed_offset
        } else {
            warn!(
                previous_len = self.state.last_seen_text.len(),
                new_len = full_text.len(),
                "transcript was rewritten mid-session, re-reading from the start"
            );
            0
        };

        let span = locate_spans(full_text, self.line_breaks)
            .into_iter()
            .filter(|s| s.complete && s.range.start >= consumed)
            .filter(|s| full_text[s.range.clone()].chars().any(char::is_alphanumeric))
            .last();
        let Some(span) = span else {
            self.state.last_seen_text = full_text.to_owned();
            self.state.consumed_offset = consumed;
            return Ok(GrowthOutcome::NoCompletedSpan);
        };
        let spoken = &full_text[span.range.clone()];

        let current = self.state.current_expected_index;
        let last = self.script.last_index();
        let window_end = current.saturating_add(self.lookahead).min(last);

        let mut best: Option<(usize, f32)> = None;
        let mut top_score = 0.0f32;
        for index in current..=window_end {
            let Some(expected) = self.script.get(index) else {
                break;
            };
            let score = self.scorer.score(&expected.text, spoken).await?;
            debug!(
                index,
                expected = %expected.text,
                heard = %spoken,
                score,
                threshold = self.threshold,
                scorer = self.scorer.name(),
                "similarity"
            );
            top_score = top_score.max(score);
            if score >= self.threshold && best.is_none_or(|(_, b)| score > b) {
                best = Some((index, score));
            }
        }

        self.state.last_seen_text = full_text.to_owned();
        self.state.consumed_offset = span.range.end;

        let Some((matched, score)) = best else {
            if !self.state.paused {
                self.state.paused = true;
                info!(
                    expected_index = current,
                    best_score = top_score,
                    "sync lost, pausing"
                );
                self.sink.pause();
            }
            return Ok(GrowthOutcome::NoMatch {
                best_score: top_score,
            });
        };

        if matched == last {
            self.state.current_expected_index = last;
            self.state.paused = false;
            self.state.completed = true;
            info!(index = matched, score, "last segment spoken, script completed");
            self.sink.completed();
            return Ok(GrowthOutcome::Completed {
                index: matched,
                score,
            });
        }

        if matched + 1 > self.state.current_expected_index {
            self.state.current_expected_index = matched + 1;
            if matched > current {
                debug!(skipped = matched - current, "skipped ahead in lookahead window");
            }
            info!(
                index = self.state.current_expected_index,
                matched, score, "advancing highlight"
            );
            self.sink.highlight(self.state.current_expected_index);
        }

        if self.state.paused {
            self.state.paused = false;
            info!("sync regained, resuming");
            self.sink.resume();
        }

        Ok(GrowthOutcome::Matched {
            index: matched,
            score,
        })
    }

    /// Periodic silence check. Returns true when this tick paused the tracker.
    pub fn on_idle_tick(&mut self, now: Instant) -> bool {
        if self.state.completed || self.state.paused {
            return false;
        }
        let idle = now.saturating_duration_since(self.state.last_activity_time);
        if idle <= self.idle_timeout {
            return false;
        }
        self.state.paused = true;
        info!(idle_ms = idle.as_millis() as u64, "transcript silent, pausing");
        self.sink.pause();
        true
    }
}
