//! Command-line parsing.
//!
//! ```text
//! capsswitch [--startup] [--config <path>]
//! capsswitch --autostart on|off|status
//! capsswitch --help | --version
//! ```

use std::path::PathBuf;

use crate::error::AppError;

/// Flag appended to the autostart command line.
pub const STARTUP_FLAG: &str = "--startup";

pub const USAGE: &str = "\
Usage: capsswitch [--startup] [--config <path>]
       capsswitch --autostart on|off|status

CapsLock        -> Shift+Alt (switch keyboard layout)
Shift+CapsLock  -> CapsLock

Options:
  --startup            launched at login; skip the start-up banner
  --config <path>      TOML config file (default: <config dir>/capsswitch/config.toml)
  --autostart <mode>   on: run at login, off: stop running at login, status: show
  -h, --help           print this help
  -V, --version        print version

Logging: set RUST_LOG (e.g. RUST_LOG=debug) for more detail.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutostartCommand {
    On,
    Off,
    Status,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run,
    Autostart(AutostartCommand),
    Help,
    Version,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub command: Command,
    /// Launched from the autostart record.
    pub startup: bool,
    pub config: Option<PathBuf>,
}

/// Parses arguments, program name excluded.
pub fn parse<I>(args: I) -> Result<Options, AppError>
where
    I: IntoIterator<Item = String>,
{
    let mut options = Options {
        command: Command::Run,
        startup: false,
        config: None,
    };
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            STARTUP_FLAG => options.startup = true,
            "--config" => {
                let path = args
                    .next()
                    .ok_or_else(|| AppError::Usage("--config needs a path".into()))?;
                options.config = Some(PathBuf::from(path));
            }
            "--autostart" => {
                let mode = args.next().unwrap_or_default();
                let cmd = match mode.as_str() {
                    "on" => AutostartCommand::On,
                    "off" => AutostartCommand::Off,
                    "status" => AutostartCommand::Status,
                    _ => {
                        return Err(AppError::Usage(
                            "--autostart expects on, off or status".into(),
                        ))
                    }
                };
                options.command = Command::Autostart(cmd);
            }
            "-h" | "--help" => return Ok(Options { command: Command::Help, ..options }),
            "-V" | "--version" => return Ok(Options { command: Command::Version, ..options }),
            other => return Err(AppError::Usage(format!("unknown argument '{other}'"))),
        }
    }

    Ok(options)
}
