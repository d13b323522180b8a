use clap::Parser;
use log::{LevelFilter, error, info};
use orbitview::app::{run_gui, run_headless};
use orbitview::io::config::Config;
use std::path::PathBuf;
use std::process::ExitCode;

/// Interactive orbit-camera scene viewer.
#[derive(Parser, Debug)]
#[command(name = "orbitview", version)]
#[command(about = "Orbit-camera 3D scene viewer driven by a TOML scene file")]
struct Cli {
    /// Scene file (TOML). Without it the built-in demo scene is shown.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Render without opening a window.
    #[arg(long)]
    headless: bool,

    /// Frames to render in headless mode.
    #[arg(long, default_value_t = 1)]
    frames: usize,

    /// PNG written in headless mode.
    #[arg(short, long, value_name = "PNG", default_value = "output.png")]
    output: PathBuf,
}

fn main() -> ExitCode {
    env_logger::Builder::from_default_env()
        .filter_level(LevelFilter::Info)
        .filter_module("minifb", LevelFilter::Warn)
        .parse_default_env()
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            match Config::load(path) {
                Ok(config) => config,
                Err(e) => {
                    error!("{}", e);
                    return ExitCode::FAILURE;
                }
            }
        }
        None => {
            info!("No config given, using the demo scene.");
            Config::default()
        }
    };

    let result = if cli.headless {
        run_headless(&config, cli.frames, &cli.output)
    } else {
        run_gui(&config)
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Viewer failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
