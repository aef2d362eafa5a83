//! capsswitch -- CapsLock to Shift+Alt layout switcher.
//!
//! Entry point, single-instance check, engine lifecycle and exit handling.
//! Every exit path (normal return, Ctrl+C / console close, error, panic
//! unwinding through `run_engine`) drops or uninstalls the engine, which
//! releases the global keyboard hook.

mod autostart;
mod cli;
mod config;
mod engine;
mod error;
mod platform;

use std::process::ExitCode;
use std::sync::mpsc;

use cli::{AutostartCommand, Command, Options};
use config::Config;
use engine::synth::{KeySynthesizer, TapDispatcher};
use engine::InterceptionEngine;
use error::AppError;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            e.exit_code()
        }
    }
}

fn run() -> Result<(), AppError> {
    let options = cli::parse(std::env::args().skip(1))?;

    match options.command {
        Command::Help => {
            println!("{}", cli::USAGE);
            Ok(())
        }
        Command::Version => {
            println!("capsswitch v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Command::Autostart(cmd) => run_autostart(cmd),
        Command::Run => run_engine(&options),
    }
}

fn run_autostart(cmd: AutostartCommand) -> Result<(), AppError> {
    match cmd {
        AutostartCommand::On => {
            log::warn!(
                "autostart: do not move or rename this executable while autostart is enabled"
            );
            autostart::enable()?;
        }
        AutostartCommand::Off => autostart::disable()?,
        AutostartCommand::Status => match autostart::read_record()? {
            Some(line) => println!("autostart: enabled ({line})"),
            None => println!("autostart: disabled"),
        },
    }
    Ok(())
}

fn run_engine(options: &Options) -> Result<(), AppError> {
    if platform::other_instance_running()? {
        return Err(AppError::AlreadyRunning);
    }

    let config = Config::load(options.config.as_deref())?;
    log::debug!("config: {config:?}");

    let injector = platform::create_input_injector()?;
    let capture = platform::create_input_capture()?;
    let taps = TapDispatcher::new(KeySynthesizer::new(injector, &config), config.dispatch)?;
    let mut engine = InterceptionEngine::new(capture, Box::new(taps.handle()), &config);

    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    let handler_tx = stop_tx.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = handler_tx.send(());
    }) {
        log::warn!("failed to set Ctrl+C handler: {e}");
    }

    // Without the hook the process would run doing nothing; fail loudly.
    engine.install()?;

    if options.startup {
        log::debug!("started from autostart record");
    } else {
        log::info!(
            "capsswitch v{} running: CapsLock -> Shift+Alt, Shift+CapsLock -> CapsLock. Ctrl+C to exit.",
            env!("CARGO_PKG_VERSION")
        );
        log::info!(
            "autostart: {}",
            if autostart::is_enabled() { "enabled" } else { "disabled" }
        );
    }

    // `stop_tx` stays alive, so this only returns on Ctrl+C / console close.
    let _ = stop_rx.recv();
    drop(stop_tx);

    log::info!("shutting down");
    engine.uninstall();
    taps.shutdown();
    Ok(())
}
