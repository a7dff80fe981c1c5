use clap::Parser;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use termcine::cli::{handle_config_action, Args, Command};
use termcine::config::{Config, PlayerConfig};
use termcine::session::{setup_ctrlc_handler, Session};
use termcine::{logging, SessionError};

fn run(args: Args) -> Result<(), SessionError> {
    // If --config is specified, a broken file is an error;
    // same for the default file, which the user created on purpose
    let config = Config::load(args.config.as_deref())?;
    let player = PlayerConfig::resolve(&args, &config)?;

    match logging::init(&player.cache_root) {
        Ok(path) => log::info!("Logging to {}", path.display()),
        Err(e) => eprintln!("Warning: could not open log file: {}", e),
    }

    let stop = Arc::new(AtomicBool::new(false));
    setup_ctrlc_handler(stop.clone())?;

    let summary = Session::new(player, stop).run()?;

    // Terminal is restored by now
    for line in summary.report_lines() {
        eprintln!("{}", line);
    }
    if summary.stopped_by_user {
        log::info!("Stopped by user");
    }
    Ok(())
}

fn main() {
    let mut args = Args::parse();

    if let Some(Command::Config { action }) = args.command.take() {
        if let Err(e) = handle_config_action(action, args.config.as_deref()) {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
        return;
    }

    if let Err(e) = run(args) {
        log::error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}
