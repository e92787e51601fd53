//! Feed pacing: gates a sequential playback feed on alignment events.
//!
//! [`FeedPacingController`] owns the shared pause flag. It is cheap to
//! clone; every clone observes the same flag, so the tracker side (through
//! its [`EventSink`] impl) and the [`FeedLoop`] task can each hold one.
//! The loop may observe a change up to one poll interval late.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::FeedConfig;
use crate::error::Result;
use crate::events::EventSink;
use crate::segment::Segmenter;

/// Edge-triggered pause/resume control for a feed.
#[derive(Debug, Clone)]
pub struct FeedPacingController {
    paused: Arc<AtomicBool>,
    silence_pause: Duration,
}

impl FeedPacingController {
    pub fn new(config: &FeedConfig) -> Self {
        Self {
            paused: Arc::new(AtomicBool::new(false)),
            silence_pause: config.silence_pause(),
        }
    }

    /// Pause the feed. Returns true only on a genuine transition.
    pub fn pause(&self) -> bool {
        let changed = !self.paused.swap(true, Ordering::SeqCst);
        if changed {
            info!("feed paused");
        }
        changed
    }

    /// Resume the feed. Returns true only on a genuine transition.
    pub fn resume(&self) -> bool {
        let changed = self.paused.swap(false, Ordering::SeqCst);
        if changed {
            info!("feed resumed");
        }
        changed
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Report a silence measured by a voice-activity detector.
    pub fn on_silence(&self, silence: Duration) -> bool {
        if silence < self.silence_pause {
            return false;
        }
        debug!(silence_ms = silence.as_millis() as u64, "long silence reported");
        self.pause()
    }
}

impl Default for FeedPacingController {
    fn default() -> Self {
        Self::new(&FeedConfig::default())
    }
}

impl EventSink for FeedPacingController {
    fn highlight(&self, _index: usize) {}

    fn pause(&self) {
        Self::pause(self);
    }

    fn resume(&self) {
        Self::resume(self);
    }

    /// Release the feed so it can play out to its end.
    fn completed(&self) {
        Self::resume(self);
    }
}

/// One unit of the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedUnit {
    pub index: usize,
    pub text: String,
}

impl FeedUnit {
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// Sequential pull of feed units.
pub trait FeedSource: Send {
    /// Next unit, or `None` at the natural end of the feed.
    fn next_unit(&mut self) -> Option<FeedUnit>;
}

/// A feed over the script, cut with the feed's own granularity.
#[derive(Debug, Clone)]
pub struct ScriptFeed {
    units: Vec<FeedUnit>,
    cursor: usize,
}

impl ScriptFeed {
    pub fn new(units: Vec<FeedUnit>) -> Self {
        Self { units, cursor: 0 }
    }

    /// Segment `script` into units of at most `config.max_words` words.
    pub fn from_script(script: &str, config: &FeedConfig) -> Result<Self> {
        let segmented = Segmenter::default()
            .with_max_words(config.max_words)
            .segment(script)?;
        let units = segmented
            .iter()
            .map(|s| FeedUnit {
                index: s.index,
                text: s.text.clone(),
            })
            .collect();
        Ok(Self::new(units))
    }

    /// Begin playback at unit `index` (clamped to the end).
    pub fn start_at(mut self, index: usize) -> Self {
        self.cursor = index.min(self.units.len());
        self
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.units.len() - self.cursor
    }
}

impl FeedSource for ScriptFeed {
    fn next_unit(&mut self) -> Option<FeedUnit> {
        let unit = self.units.get(self.cursor)?.clone();
        self.cursor += 1;
        Some(unit)
    }
}

/// Plays one unit (synthesis and audio output live behind this).
#[async_trait]
pub trait FeedPlayer: Send + Sync {
    async fn deliver(&self, unit: &FeedUnit) -> Result<()>;
}

/// Summary of a feed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeedReport {
    pub delivered: usize,
    /// Index of the last unit delivered.
    pub last_index: Option<usize>,
    /// True when the source ran out, false when cancelled.
    pub finished: bool,
}

/// Drives a [`FeedSource`] into a [`FeedPlayer`], honouring the pause flag.
pub struct FeedLoop {
    controller: FeedPacingController,
    config: FeedConfig,
}

impl FeedLoop {
    pub fn new(controller: FeedPacingController, config: &FeedConfig) -> Self {
        Self {
            controller,
            config: config.clone(),
        }
    }

    /// Run until the source is exhausted or `cancel` fires.
    ///
    /// A unit in flight completes before cancellation is observed. A
    /// playback error stops the loop and is returned.
    pub async fn run<S>(
        &self,
        source: &mut S,
        player: &dyn FeedPlayer,
        cancel: &CancellationToken,
    ) -> Result<FeedReport>
    where
        S: FeedSource + ?Sized,
    {
        let mut report = FeedReport {
            delivered: 0,
            last_index: None,
            finished: false,
        };

        while !cancel.is_cancelled() {
            if self.controller.is_paused() {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.config.pause_poll()) => continue,
                }
            }

            let Some(unit) = source.next_unit() else {
                report.finished = true;
                break;
            };
            player.deliver(&unit).await?;
            report.delivered += 1;
            report.last_index = Some(unit.index);
            debug!(index = unit.index, words = unit.word_count(), "feed unit delivered");

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.pacing_for(unit.word_count())) => {}
            }
        }

        info!(
            delivered = report.delivered,
            finished = report.finished,
            "feed loop stopped"
        );
        Ok(report)
    }
}
