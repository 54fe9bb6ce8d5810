//! Reference shared-memory bootstrap adapter.
//!
//! This is the external collaborator described by the core's contract: a
//! named region, created by one "master" role and opened by any number of
//! "client" roles polling until it appears, mapped at a fixed process-virtual
//! address so that raw pointers embedded in channels and sinks are valid
//! identically in every process that maps the region. The wire format here
//! (a POSIX `shm_open` + `mmap(MAP_FIXED)` region) is not part of the core's
//! correctness contract — a caller may swap in any adapter that hands back an
//! equivalent `&'static mut [u8]` at the same address in every process.
//!
//! File-backed mmap via `libc` mirrors the teacher's `SharedRingBuffer`
//! bootstrap (`shm_open`/`mmap(MAP_SHARED)`); the master/client polling
//! protocol and fixed mapping address come from the original's
//! `sharedMemory_open`.

use std::ffi::CString;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::error::{Result, SimError};

/// Default virtual address every process maps the region at, matching the
/// original bootstrap's fixed placement so pointers stored inside the region
/// are valid without translation across processes.
pub const DEFAULT_FIXED_ADDRESS: usize = 0x1_0000;

/// How long a client polls for the master to create the region before giving up.
pub const BOOTSTRAP_TIMEOUT: Duration = Duration::from_secs(10);

/// How often a client re-checks for the region's existence while polling.
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Role a process plays when bootstrapping a shared region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Creates and sizes the region; other processes wait for it to appear.
    Master,
    /// Waits for the master to create the region, then maps it.
    Client,
}

/// A shared-memory region mapped at a fixed virtual address in this process.
pub struct SharedRegion {
    ptr: *mut u8,
    len: usize,
    name: String,
}

unsafe impl Send for SharedRegion {}

impl SharedRegion {
    /// Open (client) or create (master) a named POSIX shared-memory region of
    /// `size_bytes`, mapped at `DEFAULT_FIXED_ADDRESS`.
    pub fn open(name: &str, size_bytes: usize, role: Role) -> Result<Self> {
        let cname = CString::new(name).map_err(|_| SimError::config("shared memory name contains a NUL byte"))?;

        let fd = match role {
            Role::Master => Self::create_backing(&cname, size_bytes),
            Role::Client => Self::wait_for_backing(&cname, name),
        };
        let fd = fd.map_err(|err| {
            if err.is_recoverable() {
                warn!(name, role = ?role, error = %err, "shared memory bootstrap failed, retrying may succeed");
            }
            err
        })?;

        let ptr = unsafe {
            libc::mmap(
                DEFAULT_FIXED_ADDRESS as *mut libc::c_void,
                size_bytes,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED | libc::MAP_FIXED,
                fd,
                0,
            )
        };

        unsafe {
            libc::close(fd);
        }

        if ptr == libc::MAP_FAILED {
            return Err(SimError::Io(std::io::Error::last_os_error()));
        }

        Ok(Self { ptr: ptr as *mut u8, len: size_bytes, name: name.to_string() })
    }

    fn create_backing(name: &CString, size_bytes: usize) -> Result<libc::c_int> {
        let fd = unsafe {
            libc::shm_open(name.as_ptr(), libc::O_CREAT | libc::O_RDWR, 0o600)
        };
        if fd < 0 {
            return Err(SimError::Io(std::io::Error::last_os_error()));
        }
        if unsafe { libc::ftruncate(fd, size_bytes as libc::off_t) } != 0 {
            let err = std::io::Error::last_os_error();
            unsafe {
                libc::close(fd);
            }
            return Err(SimError::Io(err));
        }
        Ok(fd)
    }

    fn wait_for_backing(name: &CString, display_name: &str) -> Result<libc::c_int> {
        Self::wait_for_backing_with_timeout(name, display_name, BOOTSTRAP_TIMEOUT)
    }

    fn wait_for_backing_with_timeout(name: &CString, display_name: &str, timeout: Duration) -> Result<libc::c_int> {
        let start = Instant::now();
        loop {
            let fd = unsafe { libc::shm_open(name.as_ptr(), libc::O_RDWR, 0o600) };
            if fd >= 0 {
                return Ok(fd);
            }
            if start.elapsed() >= timeout {
                return Err(SimError::bootstrap_timeout(display_name, start.elapsed().as_millis() as u64));
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    /// Raw byte view of the mapped region.
    ///
    /// # Safety
    /// The caller must not alias this slice with another mutable view of the
    /// same region, and must ensure no other thread/process writes to bytes
    /// this slice is being read from without the synchronization the core's
    /// ring buffers already provide.
    pub unsafe fn as_slice(&self) -> &[u8] {
        std::slice::from_raw_parts(self.ptr, self.len)
    }

    /// Mutable raw byte view of the mapped region; see [`as_slice`](Self::as_slice).
    ///
    /// # Safety
    /// Same requirements as [`as_slice`](Self::as_slice).
    pub unsafe fn as_mut_slice(&mut self) -> &mut [u8] {
        std::slice::from_raw_parts_mut(self.ptr, self.len)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for SharedRegion {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe {
                libc::munmap(self.ptr as *mut libc::c_void, self.len);
            }
        }
    }
}
