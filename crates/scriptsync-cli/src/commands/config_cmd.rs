//! `scriptsync config` -- display resolved configuration.
//!
//! Prints the full resolved configuration as formatted JSON, or a single
//! section (`segmentation`, `alignment`, `feed`).

use clap::Args;
use scriptsync_core::SyncConfig;

#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Only print this section.
    #[arg(long)]
    pub section: Option<String>,

    /// Config file path (overrides auto-discovery).
    #[arg(short, long)]
    pub config: Option<String>,
}

pub fn run(args: ConfigArgs) -> anyhow::Result<()> {
    let config = super::load_config(args.config.as_deref())?;
    println!("{}", render(&config, args.section.as_deref())?);
    Ok(())
}

fn render(config: &SyncConfig, section: Option<&str>) -> anyhow::Result<String> {
    let value = serde_json::to_value(config)?;
    let Some(section) = section else {
        return Ok(serde_json::to_string_pretty(&value)?);
    };
    match value.get(section) {
        Some(v) => Ok(serde_json::to_string_pretty(v)?),
        None => {
            let available: Vec<&str> = value
                .as_object()
                .map(|m| m.keys().map(|k| k.as_str()).collect())
                .unwrap_or_default();
            anyhow::bail!(
                "unknown section '{section}' (available: {})",
                available.join(", ")
            )
        }
    }
}
