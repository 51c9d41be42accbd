// Blocking user notification for fatal presentation errors

#[cfg(windows)]
use winapi::um::winuser::{MessageBoxA, MB_ICONERROR, MB_OK};

/// Log `message` and, on Windows, block on a message box until dismissed.
pub fn show_error(title: &str, message: &str) {
    log::error!("{}: {}", title, message);

    #[cfg(windows)]
    {
        use std::ffi::CString;

        let (Ok(title), Ok(message)) = (CString::new(title), CString::new(message)) else {
            log::warn!("Notification text contains a NUL byte, message box skipped");
            return;
        };

        unsafe {
            MessageBoxA(
                std::ptr::null_mut(),
                message.as_ptr(),
                title.as_ptr(),
                MB_OK | MB_ICONERROR,
            );
        }
    }
}
