//! Host memory discovery for the default cache ceiling

use std::sync::OnceLock;

/// Ceiling used when the host cannot be queried
pub const FALLBACK_MEMORY_CEILING: u64 = 512 * 1024 * 1024;

/// Share of physical memory a viewer may treat as its ceiling (1 / N)
const PHYSICAL_SHARE_DIVISOR: u64 = 4;

#[cfg(target_os = "macos")]
pub fn physical_ram_bytes() -> Option<u64> {
    use std::ffi::CString;
    use std::mem::size_of;
    use std::ptr;

    let key = CString::new("hw.memsize").ok()?;
    let mut value: u64 = 0;
    let mut len = size_of::<u64>();
    let rc = unsafe {
        libc::sysctlbyname(
            key.as_ptr(),
            &mut value as *mut u64 as *mut libc::c_void,
            &mut len,
            ptr::null_mut(),
            0,
        )
    };
    if rc == 0 && len == size_of::<u64>() {
        Some(value)
    } else {
        None
    }
}

#[cfg(target_os = "linux")]
pub fn physical_ram_bytes() -> Option<u64> {
    let mut info = std::mem::MaybeUninit::<libc::sysinfo>::uninit();
    let rc = unsafe { libc::sysinfo(info.as_mut_ptr()) };
    if rc != 0 {
        return None;
    }
    let info = unsafe { info.assume_init() };
    Some((info.totalram as u64).saturating_mul(info.mem_unit as u64))
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
pub fn physical_ram_bytes() -> Option<u64> {
    None
}

/// Ceiling derived from a physical memory reading
///
/// A quarter of physical memory, or `None` for an unusable reading.
pub fn ceiling_from_physical(physical: Option<u64>) -> Option<u64> {
    physical
        .map(|bytes| bytes / PHYSICAL_SHARE_DIVISOR)
        .filter(|&bytes| bytes > 0)
}

/// Memory ceiling for cache budgets on this host
///
/// Queried once per process.
pub fn memory_ceiling() -> u64 {
    static CEILING: OnceLock<u64> = OnceLock::new();
    *CEILING.get_or_init(|| match ceiling_from_physical(physical_ram_bytes()) {
        Some(bytes) => {
            tracing::debug!(bytes, "discovered memory ceiling");
            bytes
        }
        None => {
            tracing::debug!(
                bytes = FALLBACK_MEMORY_CEILING,
                "memory ceiling unknown, using fallback"
            );
            FALLBACK_MEMORY_CEILING
        }
    })
}
