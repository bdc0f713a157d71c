//! TreeFinder — multi-drive file browser shell.
//!
//! Thin binary entry point. All logic lives in the `treefinder-core`
//! and `treefinder-shell` crates.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use treefinder_core::backend::{ContentBackend, LocalBackend};
use treefinder_core::drives::DriveSpec;
use treefinder_core::model::DriveId;
use treefinder_shell::{ShellConfig, ShellState};

#[derive(Debug, Parser)]
#[command(name = "treefinder", version, about = "Browse, copy, move and download across drives")]
struct Args {
    /// Directory served as the default drive.
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Extra drive as NAME=URL (mem://label, osfs:///dir or file:///dir).
    #[arg(long = "drive", value_name = "NAME=URL", value_parser = DriveSpec::parse)]
    drives: Vec<DriveSpec>,

    /// Column settings file.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Where `download` saves files.
    #[arg(long, default_value = "downloads")]
    download_dir: PathBuf,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, default_value = "warn")]
    log_level: tracing::Level,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr so they never interleave with command output.
    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("TreeFinder starting at {}", args.root.display());

    let root: Arc<dyn ContentBackend> = Arc::new(LocalBackend::new(args.root, DriveId::root()));
    let mut shell = ShellState::open(
        root,
        ShellConfig {
            drives: args.drives,
            settings_path: args.settings,
            download_dir: args.download_dir,
        },
    )
    .await?;

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        stdout.write_all(b"treefinder> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        if matches!(line.trim(), "quit" | "exit") {
            break;
        }
        let output = match shell.execute(&line).await {
            Ok(output) => output,
            Err(err) => format!("error: {err:#}"),
        };
        if !output.is_empty() {
            stdout.write_all(output.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
        }
    }
    Ok(())
}
