// crates/fmm-cli/src/main.rs
//
// Headless smoke-test harness for the core/media host API: no GUI, just
// enough `clap` plumbing to load or create a project, run one worker, or
// drive an export from the command line while developing against the
// library crates.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use fmm_core::config::Config;
use fmm_core::model::project::ProjectState;
use fmm_core::persistence;
use fmm_media::export::filter_graph::OutputSpec;
use fmm_media::export::renderer::{self, ExportJob};
use fmm_media::process::ProcessRunner;
use fmm_media::workers::{audio_extract, waveform, WaveformCache};

#[derive(Parser)]
#[command(name = "fmm", about = "FastMovieMaker core/media smoke-test harness")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an empty project and save it to `path`.
    NewProject { path: PathBuf, name: String, fps: f64, width: u32, height: u32 },
    /// Load a project and print a one-line summary.
    Inspect { path: PathBuf },
    /// Extract a project's primary clip's audio to a temp WAV file.
    ExtractAudio { video_path: PathBuf },
    /// Compute and print the first few waveform peaks for a WAV file.
    Waveform { wav_path: PathBuf },
    /// Render a project to `output_path` using the default filter graph.
    Export { project_path: PathBuf, output_path: PathBuf },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    match cli.command {
        Command::NewProject { path, name, fps, width, height } => {
            let project = ProjectState::new(name, fps, width, height);
            persistence::save_project(&project, &path).context("saving new project")?;
            println!("wrote {}", path.display());
        }
        Command::Inspect { path } => {
            let result = persistence::load_project(&path).context("loading project")?;
            println!(
                "{} — {} clip(s), {} subtitle track(s), {}ms total, {} warning(s)",
                result.project.name,
                result.project.clips.clips.len(),
                result.project.subtitle_tracks.len(),
                result.project.total_duration_ms(),
                result.warnings.len(),
            );
        }
        Command::ExtractAudio { video_path } => {
            let config = Config::default();
            let runner = Arc::new(ProcessRunner::from_config(&config.process));
            std::fs::create_dir_all(&config.temp_dir)?;
            let handle = audio_extract::start(runner, video_path, config.temp_dir);
            let result = handle.await_result().map_err(|e| anyhow::anyhow!(e))?;
            println!("{result:?}");
        }
        Command::Waveform { wav_path } => {
            let cache = Arc::new(WaveformCache::new(64 * 1024 * 1024));
            let handle = waveform::start(wav_path, cache);
            let result = handle.await_result().map_err(|e| anyhow::anyhow!(e))?;
            if let fmm_media::WorkerResult::Waveform { peaks, .. } = result {
                for (pos, neg) in peaks.iter().take(10) {
                    println!("{pos:.3} {neg:.3}");
                }
                println!("... {} ms total", peaks.len());
            }
        }
        Command::Export { project_path, output_path } => {
            let config = Config::default();
            let runner = Arc::new(ProcessRunner::from_config(&config.process));
            let result = persistence::load_project(&project_path).context("loading project")?;
            std::fs::create_dir_all(&config.temp_dir)?;
            let job = ExportJob {
                output_path,
                container: "mp4".to_string(),
                spec: OutputSpec {
                    width: result.project.width,
                    height: result.project.height,
                    video_gain: 1.0,
                    tts_gain: 1.0,
                },
                video_codec: None,
            };
            let handle = renderer::run(runner, result.project, job, config.temp_dir);
            let outcome = handle.await_result().map_err(|e| anyhow::anyhow!(e))?;
            println!("{outcome:?}");
        }
    }

    Ok(())
}
