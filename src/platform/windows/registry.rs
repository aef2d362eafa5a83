//! Per-user `Run` key access for the autostart record.
//!
//! Values live under `HKCU\SOFTWARE\Microsoft\Windows\CurrentVersion\Run`,
//! one `REG_SZ` per program holding the command line to launch at login.

use std::ptr;

use windows_sys::Win32::Foundation::{ERROR_FILE_NOT_FOUND, ERROR_SUCCESS, WIN32_ERROR};
use windows_sys::Win32::System::Registry::{
    RegCloseKey, RegDeleteValueW, RegOpenKeyExW, RegQueryValueExW, RegSetValueExW, HKEY,
    HKEY_CURRENT_USER, KEY_QUERY_VALUE, KEY_SET_VALUE, REG_SAM_FLAGS, REG_SZ,
};

use crate::platform::PlatformError;

const RUN_KEY: &str = r"SOFTWARE\Microsoft\Windows\CurrentVersion\Run";

fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

fn check(status: WIN32_ERROR, what: &str) -> Result<(), PlatformError> {
    if status == ERROR_SUCCESS {
        Ok(())
    } else {
        Err(PlatformError::Registry(format!("{what} failed (error {status})")))
    }
}

/// Open `Run` key, closed on drop.
struct RunKey(HKEY);

impl RunKey {
    fn open(access: REG_SAM_FLAGS) -> Result<Self, PlatformError> {
        let path = wide(RUN_KEY);
        let mut hkey: HKEY = ptr::null_mut();
        let status = unsafe { RegOpenKeyExW(HKEY_CURRENT_USER, path.as_ptr(), 0, access, &mut hkey) };
        check(status, "RegOpenKeyExW")?;
        Ok(Self(hkey))
    }
}

impl Drop for RunKey {
    fn drop(&mut self) {
        unsafe { RegCloseKey(self.0) };
    }
}

/// Reads the `REG_SZ` value `name`; `None` when it does not exist.
pub fn read_run_value(name: &str) -> Result<Option<String>, PlatformError> {
    let key = RunKey::open(KEY_QUERY_VALUE)?;
    let name = wide(name);

    let mut size: u32 = 0;
    let status = unsafe {
        RegQueryValueExW(key.0, name.as_ptr(), ptr::null(), ptr::null_mut(), ptr::null_mut(), &mut size)
    };
    if status == ERROR_FILE_NOT_FOUND {
        return Ok(None);
    }
    check(status, "RegQueryValueExW")?;

    let mut buf = vec![0u16; (size as usize).div_ceil(2)];
    let status = unsafe {
        RegQueryValueExW(
            key.0,
            name.as_ptr(),
            ptr::null(),
            ptr::null_mut(),
            buf.as_mut_ptr().cast(),
            &mut size,
        )
    };
    check(status, "RegQueryValueExW")?;

    let len = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    Ok(Some(String::from_utf16_lossy(&buf[..len])))
}

/// Creates or replaces the `REG_SZ` value `name`.
pub fn write_run_value(name: &str, data: &str) -> Result<(), PlatformError> {
    let key = RunKey::open(KEY_SET_VALUE)?;
    let name = wide(name);
    let data = wide(data);
    let bytes = (data.len() * std::mem::size_of::<u16>()) as u32;
    let status = unsafe {
        RegSetValueExW(key.0, name.as_ptr(), 0, REG_SZ, data.as_ptr().cast(), bytes)
    };
    check(status, "RegSetValueExW")
}

/// Deletes the value `name`. A missing value is not an error.
pub fn delete_run_value(name: &str) -> Result<(), PlatformError> {
    let key = RunKey::open(KEY_SET_VALUE)?;
    let name = wide(name);
    let status = unsafe { RegDeleteValueW(key.0, name.as_ptr()) };
    if status == ERROR_FILE_NOT_FOUND {
        return Ok(());
    }
    check(status, "RegDeleteValueW")
}
