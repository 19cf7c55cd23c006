mod cli;
mod run;

use clap::Parser;
use cli::{Cli, Commands};
use eyre::WrapErr;
use std::path::Path;

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let args = Cli::parse();
    let cfg = load_config(&args.config);
    init_logging(&args, &cfg);
    cfg.validate().wrap_err("invalid configuration")?;
    let _ = cli::JSON_MODE.set(args.json);

    match &args.cmd {
        Commands::Preview { wave } => run::preview(&cfg, wave),
        Commands::Run { wave, device } => run::run_waveform(&cfg, wave, *device, args.simulate),
        Commands::Steady { volts, device } => {
            run::steady(&cfg, volts.as_deref(), *device, args.simulate)
        }
        Commands::Pulse { wave, device } => run::pulse(&cfg, wave, *device, args.simulate),
        Commands::Sequence { wave, order } => run::sequence(&cfg, wave, *order, args.simulate),
    }
}

/// Missing or unparsable config degrades to defaults; a typo in the TOML
/// should not strand the instruments.
fn load_config(path: &Path) -> smu_config::Config {
    match std::fs::read_to_string(path) {
        Ok(text) => match smu_config::load_toml(&text) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("warning: failed to parse {}: {e}; using defaults", path.display());
                smu_config::Config::default()
            }
        },
        Err(_) => smu_config::Config::default(),
    }
}

fn init_logging(args: &Cli, cfg: &smu_config::Config) {
    use tracing_subscriber::EnvFilter;

    let level = cfg.logging.level.as_deref().unwrap_or(&args.log_level);
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if let Some(file) = &cfg.logging.file {
        let appender = match cfg.logging.rotation.as_deref() {
            Some("daily") => tracing_appender::rolling::daily(".", file),
            Some("hourly") => tracing_appender::rolling::hourly(".", file),
            _ => tracing_appender::rolling::never(".", file),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = cli::FILE_GUARD.set(guard);
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}
