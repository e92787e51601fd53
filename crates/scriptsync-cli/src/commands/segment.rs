//! `scriptsync segment` -- preview how a script is cut into match units.
//!
//! # Examples
//!
//! ```text
//! scriptsync segment talk.md
//! scriptsync segment talk.md --max-words 6 --json
//! ```

use std::path::PathBuf;

use clap::Args;
use comfy_table::{Table, presets::UTF8_FULL};
use scriptsync_core::segment::sentence_buckets;
use scriptsync_core::source::{FileScript, ScriptProvider};
use scriptsync_core::{ExpectedScript, Segmenter};

#[derive(Debug, Args)]
pub struct SegmentArgs {
    /// Script file (.txt/.md/.docx/.pdf) or a directory holding one.
    pub script: PathBuf,

    /// Maximum words per segment (overrides config).
    #[arg(long)]
    pub max_words: Option<usize>,

    /// Print segments as JSON instead of a table.
    #[arg(long)]
    pub json: bool,

    /// Config file path (overrides auto-discovery).
    #[arg(short, long)]
    pub config: Option<String>,
}

pub async fn run(args: SegmentArgs) -> anyhow::Result<()> {
    let config = super::load_config(args.config.as_deref())?;
    let text = FileScript::new(&args.script).load_script().await?;

    let mut segmenter = Segmenter::new(config.segmentation);
    if let Some(max_words) = args.max_words {
        segmenter = segmenter.with_max_words(max_words);
    }
    let script = segmenter.segment(&text)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(script.segments())?);
    } else {
        println!("{}", render_table(&script));
        println!(
            "  {} segment(s), {} sentence(s)",
            script.len(),
            sentence_buckets(script.segments()).len()
        );
    }
    Ok(())
}

fn render_table(script: &ExpectedScript) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(["#", "SENTENCE", "WORDS", "TEXT"]);
    for segment in script.iter() {
        table.add_row([
            segment.index.to_string(),
            segment.sentence.to_string(),
            segment.word_count().to_string(),
            segment.text.clone(),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_has_a_row_per_segment() {
        let script = Segmenter::default()
            .segment("Merhaba dünya. Bugün hava güzel.")
            .unwrap();
        let rendered = render_table(&script).to_string();
        assert!(rendered.contains("Merhaba dünya."));
        assert!(rendered.contains("Bugün hava güzel."));
        assert!(rendered.contains("SENTENCE"));
    }
}
