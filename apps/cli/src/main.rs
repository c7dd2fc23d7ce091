use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use scenesearch_core::{
    EngineConfig, Interval, ProcessRequest, Services, format_results_readable,
    format_segments_readable,
};
use tracing_subscriber::EnvFilter;

mod server;

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.0}m {:.0}s", (secs / 60.0).floor(), secs % 60.0)
    }
}

/// Parse a `START:END` window given in seconds.
fn parse_window(raw: &str) -> Result<Interval, String> {
    let (start, end) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected START:END, got {raw:?}"))?;
    let start: f64 = start
        .trim()
        .parse()
        .map_err(|_| format!("invalid start {start:?}"))?;
    let end: f64 = end
        .trim()
        .parse()
        .map_err(|_| format!("invalid end {end:?}"))?;
    Interval::new(start, end).map_err(|e| e.to_string())
}

#[derive(Parser)]
#[command(name = "scenesearch")]
#[command(about = "Search captioned video segments and caption new videos scene by scene")]
struct Cli {
    /// Config file (defaults to <config dir>/scenesearch/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API
    Serve {
        /// Listen address, overrides server.bind
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Search indexed segments by free text
    Search {
        text: String,

        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },

    /// Detect scenes in a video and caption them
    Process {
        /// Clip id, resolved inside clips_dir
        #[arg(long, required_unless_present = "video_path")]
        video_id: Option<String>,

        /// Path of the video as the caption services see it
        #[arg(long)]
        video_path: Option<String>,

        /// Restrict to a time window in seconds, e.g. 30:75. Repeatable.
        #[arg(short, long = "window", value_parser = parse_window)]
        windows: Vec<Interval>,

        /// Translate visual and speech captions
        #[arg(short, long)]
        translate: bool,

        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn create_spinner(msg: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} {msg}")?,
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    Ok(pb)
}

fn print_header(subtitle: &str) {
    println!(
        "\n{}  {}\n",
        style("scenesearch").cyan().bold(),
        style(subtitle).dim()
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = EngineConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let services = Services::from_config(&config)?;

    match cli.command {
        Command::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.server.bind.clone());
            server::serve(services, &bind).await
        }
        Command::Search { text, json } => run_search(&services, &text, json).await,
        Command::Process {
            video_id,
            video_path,
            windows,
            translate,
            json,
        } => {
            let request = ProcessRequest {
                video_id,
                video_path,
                timestamps: windows,
                translate,
            };
            run_process(&services, &request, json).await
        }
    }
}

async fn run_search(services: &Services, text: &str, json: bool) -> Result<()> {
    if json {
        let results = services.search.search(text).await?;
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    print_header("Search");
    let started = Instant::now();
    let spinner = create_spinner("Searching...")?;
    let results = match services.search.search(text).await {
        Ok(results) => results,
        Err(e) => {
            spinner.finish_and_clear();
            return Err(e.into());
        }
    };
    spinner.finish_with_message(format!(
        "{} {} results {}",
        style("✓").green().bold(),
        results.len(),
        style(format!("[{}]", format_duration(started.elapsed()))).dim()
    ));

    println!("{}", style("─".repeat(60)).dim());
    if results.is_empty() {
        println!("{}", style("No matches").yellow());
    } else {
        println!("{}", format_results_readable(&results));
    }
    Ok(())
}

async fn run_process(services: &Services, request: &ProcessRequest, json: bool) -> Result<()> {
    if json {
        let video = services.process.process(request).await?;
        println!("{}", serde_json::to_string_pretty(&video)?);
        return Ok(());
    }

    print_header("Process");
    let started = Instant::now();
    let spinner = create_spinner("Detecting scenes and captioning...")?;
    let video = match services.process.process(request).await {
        Ok(video) => video,
        Err(e) => {
            spinner.finish_and_clear();
            return Err(e.into());
        }
    };
    spinner.finish_with_message(format!(
        "{} Captioned {} segments of {} {}",
        style("✓").green().bold(),
        video.segments.len(),
        style(&video.video_id).yellow(),
        style(format!("[{}]", format_duration(started.elapsed()))).dim()
    ));

    println!(
        "\n{} {}\n",
        style("Video:").dim(),
        style(&video.video_path).cyan()
    );
    println!("{}", style("─".repeat(60)).dim());
    println!("{}", format_segments_readable(&video.segments));
    Ok(())
}
