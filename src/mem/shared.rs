use std::ffi::CString;
use std::mem::size_of;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::constants::{PAGE_SIZE, SHARED_MEMORY_MAGIC};
use crate::error::{Error, Result};
use crate::mem::MemorySpace;

/// Header stamped at the front of every named shared-memory segment, matching the
/// original `frenzy::SharedMemory::Meta` layout byte for byte.
#[repr(C)]
struct Header {
    magic: [u8; 8],
    size: AtomicU64,
    version: AtomicU32,
    owner_pid: AtomicU32,
}

fn round_to_page(size: usize) -> usize {
    (size + PAGE_SIZE - 1) & !(PAGE_SIZE - 1)
}

/// A named, `mmap`-backed region other processes can attach to by name.
///
/// Grounded on `frenzy::SharedMemory`: `create` owns and eventually unlinks the segment,
/// `attach` maps an existing segment without taking ownership, `reclaim` attaches and then
/// immediately unlinks (for cleaning up a segment left behind by a crashed owner).
pub struct SharedMemory {
    ptr: *mut u8,
    mapped_len: usize,
    payload_capacity: usize,
    name: String,
    owner: bool,
}

unsafe impl Send for SharedMemory {}
unsafe impl Sync for SharedMemory {}

impl SharedMemory {
    /// Create a new named segment sized to hold `payload_capacity` bytes after the header.
    pub fn create(name: &str, payload_capacity: usize) -> Result<Self> {
        if payload_capacity == 0 {
            return Err(Error::invalid_argument("shared memory payload capacity must be non-zero"));
        }
        let mapped_len = round_to_page(size_of::<Header>() + payload_capacity);
        let cname = CString::new(name).map_err(|e| Error::invalid_argument(e.to_string()))?;

        let fd = unsafe { libc::shm_open(cname.as_ptr(), libc::O_CREAT | libc::O_RDWR, 0o600) };
        if fd < 0 {
            return Err(Error::Io(std::io::Error::last_os_error()));
        }
        if unsafe { libc::ftruncate(fd, mapped_len as libc::off_t) } != 0 {
            let err = std::io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(Error::Io(err));
        }

        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                mapped_len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };
        unsafe { libc::close(fd) };
        if ptr == libc::MAP_FAILED {
            return Err(Error::Io(std::io::Error::last_os_error()));
        }

        let header = ptr as *mut Header;
        unsafe {
            std::ptr::write_bytes(ptr as *mut u8, 0, size_of::<Header>());
            (*header).magic = SHARED_MEMORY_MAGIC;
            (*header).size.store(payload_capacity as u64, Ordering::Relaxed);
            (*header).owner_pid.store(std::process::id(), Ordering::Relaxed);
            (*header).version.store(1, Ordering::Release);
        }

        Ok(Self {
            ptr: ptr as *mut u8,
            mapped_len,
            payload_capacity,
            name: name.to_string(),
            owner: true,
        })
    }

    /// Attach to an existing segment created by another process or an earlier call to `create`.
    pub fn attach(name: &str) -> Result<Self> {
        let cname = CString::new(name).map_err(|e| Error::invalid_argument(e.to_string()))?;
        let fd = unsafe { libc::shm_open(cname.as_ptr(), libc::O_RDWR, 0o600) };
        if fd < 0 {
            return Err(Error::Io(std::io::Error::last_os_error()));
        }

        let header_probe = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                size_of::<Header>(),
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };
        if header_probe == libc::MAP_FAILED {
            unsafe { libc::close(fd) };
            return Err(Error::Io(std::io::Error::last_os_error()));
        }

        let header = header_probe as *const Header;
        let magic = unsafe { (*header).magic };
        if magic != SHARED_MEMORY_MAGIC {
            unsafe {
                libc::munmap(header_probe, size_of::<Header>());
                libc::close(fd);
            }
            return Err(Error::MagicMismatch {
                expected: u64::from_le_bytes(SHARED_MEMORY_MAGIC),
                found: u64::from_le_bytes(magic),
            });
        }
        if unsafe { (*header).version.load(Ordering::Acquire) } == 0 {
            unsafe {
                libc::munmap(header_probe, size_of::<Header>());
                libc::close(fd);
            }
            return Err(Error::PeerNotReady);
        }
        let payload_capacity = unsafe { (*header).size.load(Ordering::Relaxed) } as usize;
        unsafe { libc::munmap(header_probe, size_of::<Header>()) };

        let mapped_len = round_to_page(size_of::<Header>() + payload_capacity);
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                mapped_len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };
        unsafe { libc::close(fd) };
        if ptr == libc::MAP_FAILED {
            return Err(Error::Io(std::io::Error::last_os_error()));
        }

        Ok(Self {
            ptr: ptr as *mut u8,
            mapped_len,
            payload_capacity,
            name: name.to_string(),
            owner: false,
        })
    }

    /// Attach to a segment and unlink it immediately, reclaiming a segment left behind by a
    /// previous owner that crashed before calling `create`/`drop` itself.
    pub fn reclaim(name: &str) -> Result<Self> {
        let mut mem = Self::attach(name)?;
        mem.owner = true;
        let header = mem.ptr as *mut Header;
        unsafe { (*header).owner_pid.store(std::process::id(), Ordering::Relaxed) };
        Ok(mem)
    }

    /// Pointer to the first payload byte, past the header.
    fn payload_ptr(&self) -> *mut u8 {
        unsafe { self.ptr.add(size_of::<Header>()) }
    }
}

impl MemorySpace for SharedMemory {
    fn as_ptr(&self) -> *mut u8 {
        self.payload_ptr()
    }

    fn capacity(&self) -> usize {
        self.payload_capacity
    }

    fn is_owning(&self) -> bool {
        self.owner
    }
}

impl Drop for SharedMemory {
    fn drop(&mut self) {
        unsafe { libc::munmap(self.ptr as *mut libc::c_void, self.mapped_len) };
        if self.owner {
            if let Ok(cname) = CString::new(self.name.as_str()) {
                unsafe { libc::shm_unlink(cname.as_ptr()) };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_attach_round_trips_payload() {
        let name = format!("/ringcore-test-{}", std::process::id());
        let owner = SharedMemory::create(&name, 4096).unwrap();
        unsafe {
            *owner.as_ptr() = 0x42;
        }

        let attached = SharedMemory::attach(&name).unwrap();
        assert_eq!(attached.capacity(), 4096);
        assert!(!attached.is_owning());
        unsafe {
            assert_eq!(*attached.as_ptr(), 0x42);
        }
        drop(attached);
        drop(owner);
    }

    #[test]
    fn attach_rejects_unknown_segment() {
        let name = format!("/ringcore-test-missing-{}", std::process::id());
        assert!(SharedMemory::attach(&name).is_err());
    }

    #[test]
    fn reclaim_rewrites_owner_pid() {
        let name = format!("/ringcore-test-reclaim-{}", std::process::id());
        let owner = SharedMemory::create(&name, 4096).unwrap();
        let header = owner.ptr as *mut Header;
        unsafe { (*header).owner_pid.store(0xDEAD_BEEF, Ordering::Relaxed) };
        // Leak the original handle without unlinking so the segment survives for `reclaim`
        // to attach to, simulating a previous owner that crashed before cleaning up.
        std::mem::forget(owner);

        let reclaimed = SharedMemory::reclaim(&name).unwrap();
        assert!(reclaimed.is_owning());
        let header = reclaimed.ptr as *const Header;
        assert_eq!(unsafe { (*header).owner_pid.load(Ordering::Relaxed) }, std::process::id());
    }
}
