//! Process startup: arguments, configuration, logging, command dispatch

use super::cli::args::{Args, Command};
use super::cli::config::AppConfig;
use super::cli::display::print_profiles;
use super::scan::{run_scan, EXIT_FAILURE, EXIT_SUCCESS};
use crate::catalog::ScanTypeCatalog;
use crate::core::logging::{init_logging, level_from_verbosity};
use crate::core::shutdown::ShutdownCoordinator;
use crate::core::styles::palette_to_clap;
use crate::core::version::{build_time, git_hash, version};
use clap::{CommandFactory, FromArgMatches};
use std::io::IsTerminal;

/// Run the application and return the process exit code
pub async fn startup() -> i32 {
    let help_color =
        std::io::stdout().is_terminal() && !std::env::args().any(|arg| arg == "--no-color");
    let matches = Args::command()
        .styles(palette_to_clap(help_color))
        .get_matches();
    let args = match Args::from_arg_matches(&matches) {
        Ok(args) => args,
        Err(e) => e.exit(),
    };

    let mut config = match AppConfig::load(args.config_file.as_deref()).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return EXIT_FAILURE;
        }
    };
    if let Err(e) = config.apply_args(&args) {
        eprintln!("Error: {}", e);
        return EXIT_FAILURE;
    }
    if let Command::Scan(scan) = &args.command {
        config.apply_scan_args(scan);
    }

    let use_color = config
        .color
        .unwrap_or_else(|| std::io::stdout().is_terminal());
    colored::control::set_override(use_color);

    // --log-level beats -v/-q, which beat the configuration file
    let verbosity = args.verbosity();
    let log_level = args
        .log_level
        .clone()
        .or_else(|| (verbosity != 0).then(|| level_from_verbosity(verbosity).to_string()))
        .or_else(|| config.log_level.clone())
        .unwrap_or_else(|| "info".to_string());
    let log_file = config.log_file_path();
    if let Err(e) = init_logging(
        Some(&log_level),
        config.log_format.as_deref(),
        log_file.as_deref(),
        use_color,
    ) {
        eprintln!("Error: Failed to initialise logging: {}", e);
        return EXIT_FAILURE;
    }

    if let Some(source) = &config.source {
        log::debug!("Loaded configuration from {}", source.display());
    }
    for key in &config.unknown_keys {
        log::warn!("Ignoring unknown configuration key '{}'", key);
    }

    match &args.command {
        Command::Version => {
            println!(
                "websecscan {} (built {}, git {})",
                version(),
                build_time(),
                git_hash()
            );
            EXIT_SUCCESS
        }
        Command::Profiles => match ScanTypeCatalog::with_overrides(&config.profile_durations) {
            Ok(catalog) => {
                print_profiles(catalog.all(), use_color);
                EXIT_SUCCESS
            }
            Err(e) => {
                log::error!("FATAL: Invalid profile configuration: {}", e);
                EXIT_FAILURE
            }
        },
        Command::Scan(scan) => {
            let shutdown = ShutdownCoordinator::new();
            shutdown.install_signal_handlers();
            run_scan(&config, scan, &shutdown, use_color).await
        }
    }
}
