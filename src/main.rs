use anyhow::Result;
use clap::Parser;
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wakegate::app::{load_config, run_file, run_monitor, run_profile};
use wakegate::cli::{Cli, Commands, ConfigAction, EngineArgs};
use wakegate::config::Config;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::File {
            input,
            chunk_samples,
        } => {
            let config = load_config(cli.config.as_deref(), &cli.engine)?;
            run_file(&config, &input, chunk_samples, cli.format)?;
        }
        #[cfg(feature = "cpal-audio")]
        Commands::Mic {
            device,
            cpu_report,
            output,
        } => {
            let config = load_config(cli.config.as_deref(), &cli.engine)?;
            wakegate::app::run_mic(&config, device, cpu_report, output.as_deref(), cli.format)?;
        }
        #[cfg(feature = "cpal-audio")]
        Commands::Devices => {
            list_audio_devices()?;
        }
        Commands::Profile { input, repetitions } => {
            let config = load_config(cli.config.as_deref(), &cli.engine)?;
            run_profile(&config, &input, repetitions, cli.format)?;
        }
        Commands::Monitor { input } => {
            let config = load_config(cli.config.as_deref(), &cli.engine)?;
            run_monitor(&config, input, cli.format)?;
        }
        Commands::Config { action } => {
            handle_config_command(action, cli.config.as_deref(), &cli.engine)?;
        }
    }

    Ok(())
}

/// Log to stderr; `RUST_LOG` wins over `-v`.
fn init_tracing(verbose: u8) {
    let default_filter = match verbose {
        0 => "wakegate=info,warn",
        1 => "wakegate=debug,info",
        _ => "wakegate=trace,debug",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// List available audio input devices.
#[cfg(feature = "cpal-audio")]
fn list_audio_devices() -> Result<()> {
    let devices = wakegate::audio::capture::list_devices()?;

    if devices.is_empty() {
        eprintln!("No audio input devices found");
        std::process::exit(1);
    }

    println!("Available audio input devices:");
    for (idx, device) in devices.iter().enumerate() {
        println!("  [{}] {}", idx, device);
    }

    Ok(())
}

/// Handle configuration commands.
fn handle_config_command(
    action: ConfigAction,
    custom_path: Option<&Path>,
    engine: &EngineArgs,
) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(custom_path, engine)?;
            print!("{}", config.to_toml()?);
        }
        ConfigAction::Path => {
            let path = custom_path
                .map(Path::to_path_buf)
                .unwrap_or_else(Config::default_path);
            println!("{}", path.display());
        }
    }
    Ok(())
}
