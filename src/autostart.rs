//! Run-at-login registration.
//!
//! The record is a per-user `Run` value holding the quoted absolute path of
//! the running executable followed by `--startup`. The engine never reads
//! it; only the `--autostart` command does.

use std::path::Path;

use crate::cli::STARTUP_FLAG;
use crate::platform::PlatformError;

/// Name of the `Run` value.
pub const RUN_VALUE_NAME: &str = "QuickSwitch";

/// Command line stored in the autostart record for `exe`.
pub fn command_line(exe: &Path) -> String {
    format!("\"{}\" {STARTUP_FLAG}", exe.display())
}

/// Whether the autostart record exists. Read failures count as disabled.
pub fn is_enabled() -> bool {
    match read_record() {
        Ok(record) => record.is_some(),
        Err(e) => {
            log::warn!("autostart: cannot read record: {e}");
            false
        }
    }
}

/// Current autostart command line, if registered.
pub fn read_record() -> Result<Option<String>, PlatformError> {
    backend::read(RUN_VALUE_NAME)
}

/// Registers the running executable to start at login.
pub fn enable() -> Result<(), PlatformError> {
    let exe = std::env::current_exe()
        .map_err(|e| PlatformError::Other(format!("cannot resolve own executable: {e}")))?;
    let line = command_line(&exe);
    backend::write(RUN_VALUE_NAME, &line)?;
    log::info!("autostart: enabled ({line})");
    Ok(())
}

/// Removes the autostart record. Succeeds when it does not exist.
pub fn disable() -> Result<(), PlatformError> {
    backend::delete(RUN_VALUE_NAME)?;
    log::info!("autostart: disabled");
    Ok(())
}

#[cfg(target_os = "windows")]
mod backend {
    use crate::platform::windows::registry;
    use crate::platform::PlatformError;

    pub fn read(name: &str) -> Result<Option<String>, PlatformError> {
        registry::read_run_value(name)
    }

    pub fn write(name: &str, data: &str) -> Result<(), PlatformError> {
        registry::write_run_value(name, data)
    }

    pub fn delete(name: &str) -> Result<(), PlatformError> {
        registry::delete_run_value(name)
    }
}

#[cfg(not(target_os = "windows"))]
mod backend {
    use crate::platform::PlatformError;

    fn unavailable() -> PlatformError {
        PlatformError::Unavailable("autostart registration is only supported on Windows".into())
    }

    pub fn read(_name: &str) -> Result<Option<String>, PlatformError> {
        Err(unavailable())
    }

    pub fn write(_name: &str, _data: &str) -> Result<(), PlatformError> {
        Err(unavailable())
    }

    pub fn delete(_name: &str) -> Result<(), PlatformError> {
        Err(unavailable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_quotes_path_and_adds_startup_flag() {
        let exe = Path::new(r"C:\Tools\Caps Switch\capsswitch.exe");
        assert_eq!(
            command_line(exe),
            r#""C:\Tools\Caps Switch\capsswitch.exe" --startup"#
        );
    }

    #[cfg(not(target_os = "windows"))]
    #[test]
    fn unsupported_platform_reads_as_disabled() {
        assert!(!is_enabled());
        assert!(matches!(enable(), Err(PlatformError::Unavailable(_))));
    }
}
