use std::io;
use std::ptr::{self, NonNull};

use super::{ExecutableMemory, Region};

/// `mmap` / `mprotect` / `munmap` backed regions.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnixMemory;

impl ExecutableMemory for UnixMemory {
    fn allocate(&self, size: usize) -> io::Result<Region> {
        if size == 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "size can't be zero"));
        }

        // Anonymous mappings are zero filled
        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };

        if ptr == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }

        let ptr = NonNull::new(ptr as *mut u8)
            .ok_or_else(|| io::Error::other("mmap returned NULL"))?;

        Ok(Region::new(ptr, size))
    }

    fn protect_execute_read(&self, region: &Region) -> io::Result<()> {
        let result = unsafe {
            libc::mprotect(
                region.as_ptr() as *mut libc::c_void,
                region.len(),
                libc::PROT_READ | libc::PROT_EXEC,
            )
        };

        if result != 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(())
    }

    unsafe fn free(&self, region: &Region) -> io::Result<()> {
        let result = unsafe { libc::munmap(region.as_ptr() as *mut libc::c_void, region.len()) };

        if result != 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(())
    }
}
