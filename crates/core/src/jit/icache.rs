//! Host instruction-cache coherence.
//!
//! After the JIT writes fresh code bytes, the host's fetch units can still
//! see stale instructions until the corresponding cache lines are
//! explicitly synchronized. `flush_icache` hides the per-architecture
//! recipe behind one call so `cache.rs` never has to branch on `target_arch`
//! itself.

/// Makes freshly written code at `[addr, addr+len)` visible to instruction fetch.
///
/// # Safety
///
/// `addr` must point to `len` bytes of memory the caller has just finished
/// writing and intends to execute as code. This function only restores
/// cache coherence; it does not validate the bytes at `addr`.
pub unsafe fn flush_icache(addr: *const u8, len: usize) {
    if len == 0 {
        return;
    }

    // SAFETY: forwarded to the platform-specific implementation under the
    // same contract as this function.
    unsafe {
        platform::flush(addr, len);
    }
}

#[cfg(target_arch = "x86_64")]
mod platform {
    /// x86's instruction cache is kept coherent with the data cache by
    /// hardware; there is nothing to flush.
    pub unsafe fn flush(_addr: *const u8, _len: usize) {}
}

#[cfg(all(target_arch = "aarch64", target_os = "macos"))]
mod platform {
    pub unsafe fn flush(addr: *const u8, len: usize) {
        // SAFETY: `sys_icache_invalidate` only reads the cache-line
        // metadata for this range; the caller already guarantees `addr` is
        // valid for `len` bytes.
        unsafe {
            libc::sys_icache_invalidate(addr as *mut core::ffi::c_void, len);
        }
    }
}

#[cfg(all(target_arch = "aarch64", not(target_os = "macos")))]
mod platform {
    const CACHE_LINE: usize = 64;

    pub unsafe fn flush(addr: *const u8, len: usize) {
        let start = addr as usize;
        let end = start + len;

        let mut line = start & !(CACHE_LINE - 1);
        while line < end {
            // SAFETY: `dc civac` on a line within the caller-validated range
            // is a clean-and-invalidate on data it already owns.
            unsafe {
                core::arch::asm!("dc civac, {0}", in(reg) line, options(nostack, preserves_flags));
            }
            line += CACHE_LINE;
        }
        // SAFETY: no side effects beyond the architectural barrier.
        unsafe {
            core::arch::asm!("dsb ish", options(nostack, preserves_flags));
        }

        let mut line = start & !(CACHE_LINE - 1);
        while line < end {
            // SAFETY: `ic ivau` invalidates the instruction cache line at
            // an address the data cache flush above already made coherent.
            unsafe {
                core::arch::asm!("ic ivau, {0}", in(reg) line, options(nostack, preserves_flags));
            }
            line += CACHE_LINE;
        }
        // SAFETY: architectural barriers only.
        unsafe {
            core::arch::asm!("dsb ish", options(nostack, preserves_flags));
            core::arch::asm!("isb", options(nostack, preserves_flags));
        }
    }
}

#[cfg(all(target_arch = "riscv64", target_os = "linux"))]
mod platform {
    pub unsafe fn flush(addr: *const u8, len: usize) {
        // SAFETY: the `riscv_flush_icache` syscall only requires `start`
        // and `end` to describe a range the caller has written; it performs
        // no dereference on the host's behalf.
        unsafe {
            libc::syscall(
                libc::SYS_riscv_flush_icache,
                addr,
                addr.add(len),
                0usize,
            );
        }
    }
}

#[cfg(not(any(
    target_arch = "x86_64",
    all(target_arch = "aarch64", target_os = "macos"),
    all(target_arch = "aarch64", not(target_os = "macos")),
    all(target_arch = "riscv64", target_os = "linux"),
)))]
mod platform {
    /// No toolchain-provided cache-clear primitive is available for this
    /// target; fall back to a full fence. Best-effort only.
    pub unsafe fn flush(_addr: *const u8, _len: usize) {
        std::sync::atomic::fence(std::sync::atomic::Ordering::SeqCst);
    }
}
