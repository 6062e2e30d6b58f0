//! mlp-check - validate a multi-LiDAR settings file
//!
//! Loads the settings file exactly as the estimator would, logs what was
//! derived from it and exits non-zero if the file is unusable.
//!
//! # Usage
//!
//! ```bash
//! # Validate and log a summary
//! cargo run --bin mlp-check -- configs/two_lidar.yaml
//!
//! # Also print the derived configuration as YAML
//! cargo run --bin mlp-check -- configs/two_lidar.yaml --dump
//! ```

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use multi_lidar_params::ConfigLoader;

/// Validate a multi-LiDAR estimator settings file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Settings file path
    config: PathBuf,

    /// Print the derived configuration as YAML
    #[arg(short, long)]
    dump: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {} - {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();

    let args = Args::parse();

    let config = match ConfigLoader::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Failed to load {}: {}", args.config.display(), e);
            return ExitCode::FAILURE;
        }
    };

    log::info!(
        "{} OK: {} LiDAR(s), extrinsics {}",
        args.config.display(),
        config.sensor_count(),
        config.extrinsic_mode()
    );

    if args.dump {
        match config.to_yaml() {
            Ok(yaml) => print!("{}", yaml),
            Err(e) => {
                log::error!("{}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}
