//! The JIT code heap: a bump-allocated region of memory that holds
//! JIT-compiled blocks, obtained either as a single RWX mapping or as two
//! aliased W^X mappings over the same physical pages.

use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;

use super::icache;

/// Failure to obtain executable memory for the JIT heap.
#[derive(Debug, Error)]
pub enum JitHeapError {
    /// Neither a single RWX mapping nor a dual W^X aliased mapping could be
    /// established.
    #[error("failed to allocate {size} bytes for the JIT code heap: {reason}")]
    AllocationFailed {
        /// Requested heap size in bytes.
        size: usize,
        /// Platform error or reason the allocation was refused.
        reason: String,
    },
}

/// A bump-allocated heap for JIT-compiled code.
///
/// `data_base` is the writable view used to emit code; `code_base` is the
/// executable view `block_lookup` hands out addresses into. On hosts that
/// grant RWX mappings the two are the same pointer; on hardened hosts that
/// refuse RWX, they are two aliased mappings over one shared file-backed
/// region (`dual_mapped = true`).
pub struct CodeHeap {
    data_base: *mut u8,
    code_base: *mut u8,
    size: usize,
    curr: AtomicUsize,
    dual_mapped: bool,
}

// SAFETY: `CodeHeap` only exposes `curr` via atomic ops and raw pointer
// arithmetic guarded by the caller's own synchronization (the JIT spinlock
// for mutation, atomic bit matrices for lookup); the pointers themselves
// are never invalidated except by `Drop`.
unsafe impl Send for CodeHeap {}
// SAFETY: see `Send` — no interior mutability beyond the atomic cursor.
unsafe impl Sync for CodeHeap {}

impl CodeHeap {
    /// Reserves a heap of `size` bytes, preferring a single RWX mapping and
    /// falling back to dual-aliased W^X mappings.
    pub fn new(size: usize) -> Result<Self, JitHeapError> {
        match platform::alloc_rwx(size) {
            Ok(ptr) => {
                tracing::debug!(size, "jit: allocated single RWX code heap");
                Ok(Self {
                    data_base: ptr,
                    code_base: ptr,
                    size,
                    curr: AtomicUsize::new(0),
                    dual_mapped: false,
                })
            }
            Err(rwx_err) => match platform::multi_mmap(size) {
                Ok((data_base, code_base)) => {
                    tracing::debug!(size, %rwx_err, "jit: RWX refused, using dual W^X mapping");
                    Ok(Self {
                        data_base,
                        code_base,
                        size,
                        curr: AtomicUsize::new(0),
                        dual_mapped: true,
                    })
                }
                Err(dual_err) => {
                    tracing::warn!(size, %rwx_err, %dual_err, "jit: code heap allocation failed");
                    Err(JitHeapError::AllocationFailed {
                        size,
                        reason: format!("rwx: {rwx_err}; dual-mapped: {dual_err}"),
                    })
                }
            },
        }
    }

    /// Total heap capacity in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Bytes currently in use.
    pub fn curr(&self) -> usize {
        self.curr.load(Ordering::Relaxed)
    }

    /// Bump-allocates `len` bytes, returning `(write_ptr, exec_addr, offset)`
    /// where `write_ptr` is writable (use to emit code) and `exec_addr` is
    /// the address the block will execute at. Returns `None` if the heap
    /// would overflow; the caller must `flush_cache` and retry.
    pub fn reserve(&self, len: usize) -> Option<(*mut u8, u64, usize)> {
        let mut old = self.curr.load(Ordering::Relaxed);
        loop {
            let new = old.checked_add(len)?;
            if new > self.size {
                return None;
            }
            match self
                .curr
                .compare_exchange_weak(old, new, Ordering::Relaxed, Ordering::Relaxed)
            {
                // SAFETY: `old + len <= self.size`, so both pointers stay
                // within the mapped region.
                Ok(_) => unsafe {
                    let write_ptr = self.data_base.add(old);
                    let exec_addr = self.code_base.add(old) as u64;
                    return Some((write_ptr, exec_addr, old));
                },
                Err(actual) => old = actual,
            }
        }
    }

    /// Resets the bump cursor to zero without unmapping the heap.
    pub fn reset(&self) {
        self.curr.store(0, Ordering::Relaxed);
    }

    /// Releases the heap's physical backing (the mapping itself stays
    /// valid) — used when `flush_cache` decides the heap has grown past its
    /// threshold.
    pub fn release_physical_backing(&self) {
        // SAFETY: `data_base` is valid for `size` bytes for the lifetime of
        // `self`; `MADV_DONTNEED` only discards physical pages, the mapping
        // remains addressable and will fault in fresh zeroed pages on next
        // write.
        unsafe {
            platform::discard_pages(self.data_base, self.size);
        }
    }

    /// Flushes the host instruction cache for a just-written code region.
    pub fn flush_icache(&self, code_addr: u64, len: usize) {
        // SAFETY: `code_addr` was handed out by `reserve` and `len` bytes
        // were just written at the corresponding `data_base` offset.
        unsafe {
            icache::flush_icache(code_addr as *const u8, len);
        }
    }

    /// `true` if this heap uses two aliased mappings rather than one RWX one.
    pub fn is_dual_mapped(&self) -> bool {
        self.dual_mapped
    }
}

impl Drop for CodeHeap {
    fn drop(&mut self) {
        // SAFETY: both pointers were obtained from the platform allocator
        // in `new` and are unmapped exactly once here.
        unsafe {
            if self.dual_mapped {
                platform::unmap(self.data_base, self.size);
                platform::unmap(self.code_base, self.size);
            } else {
                platform::unmap(self.data_base, self.size);
            }
        }
    }
}

#[cfg(unix)]
mod platform {
    use std::ffi::c_void;
    use std::io;

    pub fn alloc_rwx(size: usize) -> Result<*mut u8, io::Error> {
        // SAFETY: standard anonymous mmap; the result is checked against
        // `MAP_FAILED` before use.
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE | libc::PROT_EXEC,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            Err(io::Error::last_os_error())
        } else {
            Ok(ptr as *mut u8)
        }
    }

    pub fn multi_mmap(size: usize) -> Result<(*mut u8, *mut u8), io::Error> {
        let fd = create_backing_fd(size)?;

        // SAFETY: `fd` refers to a file truncated to at least `size` bytes.
        let data = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };
        if data == libc::MAP_FAILED {
            let err = io::Error::last_os_error();
            // SAFETY: `fd` is still open and owned by this function.
            unsafe {
                libc::close(fd);
            }
            return Err(err);
        }

        // SAFETY: same file, second shared mapping aliasing the same pages.
        let code = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_EXEC,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };
        // SAFETY: the fd is no longer needed once both mappings exist.
        unsafe {
            libc::close(fd);
        }
        if code == libc::MAP_FAILED {
            let err = io::Error::last_os_error();
            // SAFETY: `data` was just mapped above by this function.
            unsafe {
                libc::munmap(data, size);
            }
            return Err(err);
        }

        Ok((data as *mut u8, code as *mut u8))
    }

    #[cfg(target_os = "linux")]
    fn create_backing_fd(size: usize) -> Result<libc::c_int, io::Error> {
        use std::ffi::CString;

        let name = CString::new("riscv_jit_heap").expect("static name has no NUL bytes");
        // SAFETY: `memfd_create` with a valid C string name and no flags.
        let fd = unsafe { libc::syscall(libc::SYS_memfd_create, name.as_ptr(), 0) } as libc::c_int;
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: `fd` was just created above and is valid.
        let rc = unsafe { libc::ftruncate(fd, size as libc::off_t) };
        if rc != 0 {
            let err = io::Error::last_os_error();
            // SAFETY: `fd` is owned by this function.
            unsafe {
                libc::close(fd);
            }
            return Err(err);
        }
        Ok(fd)
    }

    #[cfg(not(target_os = "linux"))]
    fn create_backing_fd(size: usize) -> Result<libc::c_int, io::Error> {
        let mut path = b"/tmp/riscv_jit_heap_XXXXXX\0".to_vec();
        // SAFETY: `path` is a NUL-terminated, mutable, uniquely-owned buffer.
        let fd = unsafe { libc::mkstemp(path.as_mut_ptr() as *mut libc::c_char) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: `fd` is valid and owned by this function; unlinking keeps
        // the mapping alive while removing the directory entry.
        unsafe {
            libc::unlink(path.as_ptr() as *const libc::c_char);
            let rc = libc::ftruncate(fd, size as libc::off_t);
            if rc != 0 {
                let err = io::Error::last_os_error();
                libc::close(fd);
                return Err(err);
            }
        }
        Ok(fd)
    }

    pub unsafe fn discard_pages(addr: *mut u8, size: usize) {
        // SAFETY: forwarded from `CodeHeap::release_physical_backing`, which
        // upholds the same validity contract.
        unsafe {
            libc::madvise(addr as *mut c_void, size, libc::MADV_DONTNEED);
        }
    }

    pub unsafe fn unmap(addr: *mut u8, size: usize) {
        if addr.is_null() {
            return;
        }
        // SAFETY: forwarded from `CodeHeap::drop`, which only calls this
        // once per mapping it created in `new`.
        unsafe {
            libc::munmap(addr as *mut c_void, size);
        }
    }
}

#[cfg(not(unix))]
mod platform {
    use std::io;

    pub fn alloc_rwx(_size: usize) -> Result<*mut u8, io::Error> {
        Err(io::Error::other("RWX allocation not supported on this platform"))
    }

    pub fn multi_mmap(_size: usize) -> Result<(*mut u8, *mut u8), io::Error> {
        Err(io::Error::other(
            "dual W^X mapping not supported on this platform",
        ))
    }

    pub unsafe fn discard_pages(_addr: *mut u8, _size: usize) {}

    pub unsafe fn unmap(_addr: *mut u8, _size: usize) {}
}
