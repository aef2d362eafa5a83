//! Single-instance check by executable name.
//!
//! Walks a ToolHelp process snapshot and counts processes whose image name
//! matches ours. The count includes this process, so more than one means
//! another copy is already running.

use std::ffi::OsString;
use std::os::windows::ffi::OsStringExt;

use windows_sys::Win32::Foundation::{CloseHandle, GetLastError, INVALID_HANDLE_VALUE};
use windows_sys::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, Process32FirstW, Process32NextW, PROCESSENTRY32W,
    TH32CS_SNAPPROCESS,
};

use crate::platform::PlatformError;

/// Image names of all running processes.
fn process_names() -> Result<Vec<String>, PlatformError> {
    let snapshot = unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0) };
    if snapshot == INVALID_HANDLE_VALUE {
        let code = unsafe { GetLastError() };
        return Err(PlatformError::Other(format!(
            "CreateToolhelp32Snapshot failed (error {code})"
        )));
    }

    let mut names = Vec::new();
    let mut entry: PROCESSENTRY32W = unsafe { std::mem::zeroed() };
    entry.dwSize = std::mem::size_of::<PROCESSENTRY32W>() as u32;

    let mut more = unsafe { Process32FirstW(snapshot, &mut entry) } != 0;
    while more {
        let len = entry
            .szExeFile
            .iter()
            .position(|&c| c == 0)
            .unwrap_or(entry.szExeFile.len());
        names.push(
            OsString::from_wide(&entry.szExeFile[..len])
                .to_string_lossy()
                .into_owned(),
        );
        more = unsafe { Process32NextW(snapshot, &mut entry) } != 0;
    }

    unsafe { CloseHandle(snapshot) };
    Ok(names)
}

/// Number of entries in `names` equal to `own`, ignoring ASCII case.
fn count_matching(names: &[String], own: &str) -> usize {
    names.iter().filter(|n| n.eq_ignore_ascii_case(own)).count()
}

/// True when another process runs the same executable name as this one.
pub fn other_instance_running() -> Result<bool, PlatformError> {
    let exe = std::env::current_exe()
        .map_err(|e| PlatformError::Other(format!("cannot resolve own executable: {e}")))?;
    let own = exe
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| PlatformError::Other("executable path has no file name".into()))?;

    let running = count_matching(&process_names()?, &own);
    log::debug!("instance: {running} process(es) named {own}");
    Ok(running > 1)
}
