//! Windows registry backend for [`ConfigStore`], plus the value writer used
//! for persisting environment variables.

use std::ffi::OsStr;
use std::iter::once;
use std::os::windows::ffi::OsStrExt;
use std::ptr;

use windows_sys::Win32::Foundation::{ERROR_NO_MORE_ITEMS, ERROR_SUCCESS};
use windows_sys::Win32::System::Registry::{
    RegCloseKey, RegEnumKeyExW, RegOpenKeyExW, RegQueryValueExW, RegSetValueExW, HKEY,
    HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, HKEY_USERS, KEY_READ, REG_EXPAND_SZ, REG_SZ,
    REG_VALUE_TYPE,
};
use windows_sys::Win32::UI::WindowsAndMessaging::{
    SendMessageTimeoutW, HWND_BROADCAST, SMTO_ABORTIFHUNG, WM_SETTINGCHANGE,
};

use super::store::{ConfigKey, ConfigStore, RootScope};

/// Longest registry key name plus terminator.
const MAX_KEY_NAME: usize = 256;

fn to_wide(s: &str) -> Vec<u16> {
    OsStr::new(s).encode_wide().chain(once(0)).collect()
}

/// Owned registry handle; predefined roots are never closed.
pub(crate) struct RegKey {
    hkey: HKEY,
    owned: bool,
}

impl RegKey {
    pub(crate) fn root(scope: RootScope) -> Self {
        let hkey = match scope {
            RootScope::CurrentUser => HKEY_CURRENT_USER,
            RootScope::LocalMachine => HKEY_LOCAL_MACHINE,
            RootScope::Users => HKEY_USERS,
        };
        Self { hkey, owned: false }
    }

    pub(crate) fn open(&self, path: &str, access: u32) -> std::io::Result<RegKey> {
        let wide = to_wide(path);
        let mut out: HKEY = ptr::null_mut();
        let rc = unsafe { RegOpenKeyExW(self.hkey, wide.as_ptr(), 0, access, &mut out) };
        if rc == ERROR_SUCCESS {
            Ok(RegKey {
                hkey: out,
                owned: true,
            })
        } else {
            Err(std::io::Error::from_raw_os_error(rc as i32))
        }
    }

    fn enum_subkeys(&self) -> Vec<String> {
        let mut names = Vec::new();
        let mut index = 0u32;
        loop {
            let mut buf = [0u16; MAX_KEY_NAME];
            let mut len = buf.len() as u32;
            let rc = unsafe {
                RegEnumKeyExW(
                    self.hkey,
                    index,
                    buf.as_mut_ptr(),
                    &mut len,
                    ptr::null(),
                    ptr::null_mut(),
                    ptr::null_mut(),
                    ptr::null_mut(),
                )
            };
            if rc == ERROR_NO_MORE_ITEMS {
                break;
            }
            if rc != ERROR_SUCCESS {
                tracing::debug!(code = rc, index, "RegEnumKeyExW failed, stopping enumeration");
                break;
            }
            names.push(String::from_utf16_lossy(&buf[..len as usize]));
            index += 1;
        }
        names
    }

    /// Read a REG_SZ / REG_EXPAND_SZ value and its type.
    pub(crate) fn string_value(&self, name: Option<&str>) -> Option<(String, REG_VALUE_TYPE)> {
        let wide_name = name.map(to_wide);
        let name_ptr = wide_name.as_ref().map_or(ptr::null(), |w| w.as_ptr());

        let mut kind: REG_VALUE_TYPE = 0;
        let mut size: u32 = 0;
        let rc = unsafe {
            RegQueryValueExW(
                self.hkey,
                name_ptr,
                ptr::null(),
                &mut kind,
                ptr::null_mut(),
                &mut size,
            )
        };
        if rc != ERROR_SUCCESS || (kind != REG_SZ && kind != REG_EXPAND_SZ) {
            return None;
        }

        let mut buf = vec![0u16; size as usize / 2 + 1];
        let mut size_bytes = (buf.len() * 2) as u32;
        let rc = unsafe {
            RegQueryValueExW(
                self.hkey,
                name_ptr,
                ptr::null(),
                &mut kind,
                buf.as_mut_ptr() as *mut u8,
                &mut size_bytes,
            )
        };
        if rc != ERROR_SUCCESS {
            return None;
        }
        let mut len = (size_bytes as usize / 2).min(buf.len());
        while len > 0 && buf[len - 1] == 0 {
            len -= 1;
        }
        Some((String::from_utf16_lossy(&buf[..len]), kind))
    }

    pub(crate) fn set_string_value(
        &self,
        name: &str,
        value: &str,
        kind: REG_VALUE_TYPE,
    ) -> std::io::Result<()> {
        let wide_name = to_wide(name);
        let data = to_wide(value);
        let rc = unsafe {
            RegSetValueExW(
                self.hkey,
                wide_name.as_ptr(),
                0,
                kind,
                data.as_ptr() as *const u8,
                (data.len() * 2) as u32,
            )
        };
        if rc == ERROR_SUCCESS {
            Ok(())
        } else {
            Err(std::io::Error::from_raw_os_error(rc as i32))
        }
    }
}

impl Drop for RegKey {
    fn drop(&mut self) {
        if self.owned {
            unsafe {
                RegCloseKey(self.hkey);
            }
        }
    }
}

impl ConfigKey for RegKey {
    fn subkey_names(&self) -> Vec<String> {
        self.enum_subkeys()
    }

    fn open_subkey(&self, path: &str) -> Option<Box<dyn ConfigKey>> {
        self.open(path, KEY_READ)
            .ok()
            .map(|k| Box::new(k) as Box<dyn ConfigKey>)
    }

    fn value(&self, name: Option<&str>) -> Option<String> {
        self.string_value(name).map(|(v, _)| v)
    }
}

/// The live Windows registry.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegistryStore;

impl ConfigStore for RegistryStore {
    fn open_root(&self, scope: RootScope) -> Option<Box<dyn ConfigKey>> {
        Some(Box::new(RegKey::root(scope)))
    }
}

/// Tell running applications that persisted environment variables changed.
pub(crate) fn broadcast_environment_change() {
    let param = to_wide("Environment");
    let mut result: usize = 0;
    unsafe {
        SendMessageTimeoutW(
            HWND_BROADCAST,
            WM_SETTINGCHANGE,
            0,
            param.as_ptr() as isize,
            SMTO_ABORTIFHUNG,
            5000,
            &mut result,
        );
    }
}
