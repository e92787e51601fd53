//! `scriptsync track` -- follow a transcript file against a script.
//!
//! Alignment events are printed to stdout as one JSON object per line.
//! With `--feed`, a paced feed of the script runs alongside, pausing and
//! resuming with the tracker; delivered units are printed to stderr.
//! Ctrl+C stops both loops.
//!
//! # Examples
//!
//! ```text
//! scriptsync track talk.md live-transcript.txt
//! scriptsync track talk.md live-transcript.txt --feed --config sync.json
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use clap::Args;
use scriptsync_core::events::{ChannelSink, FanoutSink};
use scriptsync_core::pacing::{FeedPlayer, FeedReport, FeedUnit, ScriptFeed};
use scriptsync_core::similarity::scorer_from_config;
use scriptsync_core::source::{FileScript, FileTranscriptSource, ScriptProvider, StaticScript};
use scriptsync_core::{EventSink, FeedLoop, FeedPacingController, SyncSession};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Args)]
pub struct TrackArgs {
    /// Script file (.txt/.md/.docx/.pdf) or a directory holding one.
    pub script: PathBuf,

    /// Transcript file the recognizer appends to.
    pub transcript: PathBuf,

    /// Also run the paced feed, gated on alignment.
    #[arg(long)]
    pub feed: bool,

    /// Config file path (overrides auto-discovery).
    #[arg(short, long)]
    pub config: Option<String>,
}

/// Stand-in for synthesis and audio output: writes each unit to stderr.
struct StderrPlayer;

#[async_trait]
impl FeedPlayer for StderrPlayer {
    async fn deliver(&self, unit: &FeedUnit) -> scriptsync_core::Result<()> {
        eprintln!("[feed {}] {}", unit.index, unit.text);
        Ok(())
    }
}

pub async fn run(args: TrackArgs) -> anyhow::Result<()> {
    let config = super::load_config(args.config.as_deref())?;
    let script_text = FileScript::new(&args.script).load_script().await?;

    let session_id = Uuid::new_v4();
    let (channel_sink, mut events) = ChannelSink::new(session_id);
    let controller = FeedPacingController::new(&config.feed);
    let mut sink = FanoutSink::new().with(Arc::new(channel_sink));
    if args.feed {
        sink = sink.with(Arc::new(controller.clone()));
    }
    let sink: Arc<dyn EventSink> = Arc::new(sink);

    let mut session = SyncSession::start_with_id(
        session_id,
        &StaticScript::new(script_text.clone()),
        scorer_from_config(&config.alignment),
        sink,
        &config,
    )
    .await?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("received Ctrl+C, stopping");
                cancel.cancel();
            }
        }
    });

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(e) => warn!(error = %e, "failed to serialize event"),
            }
        }
    });

    let feed = if args.feed {
        let mut units = ScriptFeed::from_script(&script_text, &config.feed)?;
        let feed_loop = FeedLoop::new(controller, &config.feed);
        let cancel = cancel.clone();
        Some(tokio::spawn(async move {
            feed_loop.run(&mut units, &StderrPlayer, &cancel).await
        }))
    } else {
        None
    };

    let source = FileTranscriptSource::new(&args.transcript);
    let outcome = session.run(&source, &cancel).await;
    if !matches!(&outcome, Ok(o) if !o.cancelled) {
        cancel.cancel();
    }

    if let Some(report) = finish_tasks(feed, session, printer).await? {
        info!(
            delivered = report.delivered,
            last_index = ?report.last_index,
            finished = report.finished,
            "feed done"
        );
    }

    let outcome = outcome?;
    info!(
        status = %outcome.status,
        final_index = outcome.final_index,
        "tracking done"
    );
    Ok(())
}

/// Join the feed task, then drop `events_owner` to close the event channel
/// and wait for the printer to drain. A feed failure is returned only after
/// every queued event has been printed.
async fn finish_tasks<T>(
    feed: Option<JoinHandle<scriptsync_core::Result<FeedReport>>>,
    events_owner: T,
    printer: JoinHandle<()>,
) -> anyhow::Result<Option<FeedReport>> {
    let feed = match feed {
        Some(handle) => Some(handle.await),
        None => None,
    };
    drop(events_owner);
    printer.await?;
    match feed {
        Some(joined) => Ok(Some(joined??)),
        None => Ok(None),
    }
}
