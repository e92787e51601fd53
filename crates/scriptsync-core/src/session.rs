//! Per-session context: the expected script plus its tracker, driven by a
//! fixed-interval poll loop.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::error::Result;
use crate::events::EventSink;
use crate::segment::{ExpectedScript, Segmenter};
use crate::similarity::SimilarityScorer;
use crate::source::{ScriptProvider, TranscriptSource};
use crate::tracker::{AlignmentTracker, TrackerStatus};

/// How a session's poll loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionOutcome {
    pub session_id: Uuid,
    pub status: TrackerStatus,
    pub final_index: usize,
    pub ticks: u64,
    /// Ticks that hit a recoverable error and were retried.
    pub recovered_errors: u64,
    pub cancelled: bool,
}

/// One tracking session.
pub struct SyncSession {
    id: Uuid,
    script: Arc<ExpectedScript>,
    tracker: AlignmentTracker,
    poll_interval: Duration,
}

impl SyncSession {
    /// Validate the config, load and segment the script, then set up a
    /// tracker. Config and script errors are fatal to the session.
    pub async fn start(
        provider: &dyn ScriptProvider,
        scorer: Arc<dyn SimilarityScorer>,
        sink: Arc<dyn EventSink>,
        config: &SyncConfig,
    ) -> Result<Self> {
        Self::start_with_id(Uuid::new_v4(), provider, scorer, sink, config).await
    }

    /// Like [`SyncSession::start`] with a caller-chosen id, so sinks can be
    /// created for the session beforehand.
    pub async fn start_with_id(
        id: Uuid,
        provider: &dyn ScriptProvider,
        scorer: Arc<dyn SimilarityScorer>,
        sink: Arc<dyn EventSink>,
        config: &SyncConfig,
    ) -> Result<Self> {
        config.validate()?;
        let text = provider.load_script().await?;
        let script = Arc::new(Segmenter::new(config.segmentation.clone()).segment(&text)?);
        let tracker = AlignmentTracker::new(script.clone(), scorer, sink, &config.alignment);
        info!(
            session = %id,
            segments = script.len(),
            scorer = config.alignment.scorer.as_str(),
            "session started"
        );
        Ok(Self {
            id,
            script,
            tracker,
            poll_interval: config.alignment.poll_interval(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn script(&self) -> &ExpectedScript {
        &self.script
    }

    pub fn tracker(&self) -> &AlignmentTracker {
        &self.tracker
    }

    pub fn status(&self) -> TrackerStatus {
        self.tracker.status()
    }

    /// Poll `source` until the script completes or `cancel` fires.
    ///
    /// Recoverable errors are logged and the tick is retried on the next
    /// interval. Any other error ends the session.
    pub async fn run(
        &mut self,
        source: &dyn TranscriptSource,
        cancel: &CancellationToken,
    ) -> Result<SessionOutcome> {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks = 0u64;
        let mut recovered_errors = 0u64;
        let mut cancelled = false;

        while !self.tracker.is_completed() {
            tokio::select! {
                _ = cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                _ = interval.tick() => {}
            }
            ticks += 1;

            match self.tick(source, Instant::now()).await {
                Ok(()) => {}
                Err(e) if e.is_recoverable() => {
                    recovered_errors += 1;
                    warn!(session = %self.id, source = source.name(), error = %e, "tick failed, retrying");
                }
                Err(e) => return Err(e),
            }
        }

        let outcome = SessionOutcome {
            session_id: self.id,
            status: self.tracker.status(),
            final_index: self.tracker.state().current_expected_index,
            ticks,
            recovered_errors,
            cancelled,
        };
        info!(
            session = %self.id,
            status = %outcome.status,
            final_index = outcome.final_index,
            ticks,
            "session ended"
        );
        Ok(outcome)
    }

    /// One poll: read, match, then check for silence. A failed read counts
    /// as no new data; the silence check still runs.
    async fn tick(&mut self, source: &dyn TranscriptSource, now: Instant) -> Result<()> {
        let grown = match source.read_full().await {
            Ok(text) => self.tracker.on_transcript_grown_at(&text, now).await.map(|_| ()),
            Err(e) => Err(e),
        };
        self.tracker.on_idle_tick(now);
        grown
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::error::SyncError;
    use crate::events::{AlignmentEvent, RecordingSink};
    use crate::similarity::LexicalScorer;
    use crate::source::{FileTranscriptSource, SharedTranscript, StaticScript};

    const SCRIPT: &str = "Merhaba dünya. Bugün hava güzel. Görüşmek üzere.";

    /// Fails the first `failures` calls, then scores lexically.
    struct WarmingScorer {
        failures: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SimilarityScorer for WarmingScorer {
        fn name(&self) -> &str {
            "warming"
        }

        async fn score(&self, expected: &str, spoken: &str) -> Result<f32> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
                return Err(SyncError::scoring("warming", "model still loading"));
            }
            Ok(LexicalScorer::ratio(expected, spoken))
        }
    }

    async fn session_with(
        scorer: Arc<dyn SimilarityScorer>,
    ) -> (SyncSession, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        let session = SyncSession::start(
            &StaticScript::new(SCRIPT),
            scorer,
            sink.clone(),
            &SyncConfig::default(),
        )
        .await
        .unwrap();
        (session, sink)
    }

    #[tokio::test]
    async fn start_rejects_empty_script() {
        let result = SyncSession::start(
            &StaticScript::new("   "),
            Arc::new(LexicalScorer),
            Arc::new(RecordingSink::new()),
            &SyncConfig::default(),
        )
        .await;
        assert!(matches!(result, Err(SyncError::InvalidScript { .. })));
    }

    #[tokio::test]
    async fn start_rejects_invalid_config() {
        let mut config = SyncConfig::default();
        config.alignment.poll_interval_ms = 0;
        let result = SyncSession::start(
            &StaticScript::new(SCRIPT),
            Arc::new(LexicalScorer),
            Arc::new(RecordingSink::new()),
            &config,
        )
        .await;
        assert!(matches!(result, Err(SyncError::ConfigInvalid { .. })));
    }

    #[tokio::test]
    async fn start_segments_the_script() {
        let (session, _sink) = session_with(Arc::new(LexicalScorer)).await;
        assert_eq!(session.script().len(), 3);
        assert_eq!(session.status(), TrackerStatus::Tracking);
    }

    #[tokio::test(start_paused = true)]
    async fn run_follows_reading_to_completion() {
        let (mut session, sink) = session_with(Arc::new(LexicalScorer)).await;
        let transcript = SharedTranscript::new();
        let cancel = CancellationToken::new();

        let handle = tokio::spawn({
            let transcript = transcript.clone();
            let cancel = cancel.clone();
            async move { session.run(&transcript, &cancel).await }
        });

        for fragment in ["merhaba dünya.", "bugün hava güzel.", "görüşmek üzere."] {
            tokio::time::sleep(Duration::from_millis(300)).await;
            transcript.append_fragment(fragment).await;
        }

        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome.status, TrackerStatus::Completed);
        assert_eq!(outcome.final_index, 2);
        assert!(!outcome.cancelled);
        assert_eq!(
            sink.events(),
            vec![
                AlignmentEvent::Highlight { index: 1 },
                AlignmentEvent::Highlight { index: 2 },
                AlignmentEvent::Completed,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn silence_pauses_once_and_cancel_ends_the_loop() {
        let (mut session, sink) = session_with(Arc::new(LexicalScorer)).await;
        let transcript = SharedTranscript::new();
        let cancel = CancellationToken::new();

        let handle = tokio::spawn({
            let transcript = transcript.clone();
            let cancel = cancel.clone();
            async move { session.run(&transcript, &cancel).await }
        });

        tokio::time::sleep(Duration::from_secs(5)).await;
        cancel.cancel();

        let outcome = handle.await.unwrap().unwrap();
        assert!(outcome.cancelled);
        assert_eq!(outcome.status, TrackerStatus::Paused);
        assert_eq!(outcome.final_index, 0);
        assert_eq!(sink.events(), vec![AlignmentEvent::Pause]);
    }

    #[tokio::test(start_paused = true)]
    async fn scoring_failures_are_retried() {
        let scorer = Arc::new(WarmingScorer {
            failures: 2,
            calls: AtomicUsize::new(0),
        });
        let (mut session, sink) = session_with(scorer).await;
        let transcript = SharedTranscript::new();
        transcript.append_fragment("merhaba dünya bugün hava güzel görüşmek üzere.").await;
        transcript.append_fragment("görüşmek üzere.").await;

        let outcome = session
            .run(&transcript, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.status, TrackerStatus::Completed);
        assert_eq!(outcome.recovered_errors, 2);
        assert_eq!(sink.events(), vec![AlignmentEvent::Completed]);
    }

    #[tokio::test(start_paused = true)]
    async fn unreadable_source_still_detects_silence() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileTranscriptSource::new(dir.path().join("missing.txt"));
        let (mut session, sink) = session_with(Arc::new(LexicalScorer)).await;
        let cancel = CancellationToken::new();

        let handle = tokio::spawn({
            let cancel = cancel.clone();
            async move { session.run(&source, &cancel).await }
        });
        tokio::time::sleep(Duration::from_secs(2)).await;
        cancel.cancel();

        let outcome = handle.await.unwrap().unwrap();
        assert!(outcome.recovered_errors >= 5);
        assert_eq!(sink.events(), vec![AlignmentEvent::Pause]);
    }
}
