use std::ffi::c_void;
use std::io;
use std::ptr::NonNull;

use windows::Win32::System::Diagnostics::Debug::FlushInstructionCache;
use windows::Win32::System::Memory::{
    MEM_COMMIT, MEM_RELEASE, MEM_RESERVE, PAGE_EXECUTE_READ, PAGE_PROTECTION_FLAGS,
    PAGE_READWRITE, VirtualAlloc, VirtualFree, VirtualProtect,
};
use windows::Win32::System::Threading::GetCurrentProcess;

use super::{ExecutableMemory, Region};

/// `VirtualAlloc` / `VirtualProtect` / `VirtualFree` backed regions.
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsMemory;

impl ExecutableMemory for WindowsMemory {
    fn allocate(&self, size: usize) -> io::Result<Region> {
        if size == 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "size can't be zero"));
        }

        // Committed pages are zero filled
        let ptr = unsafe { VirtualAlloc(None, size, MEM_COMMIT | MEM_RESERVE, PAGE_READWRITE) };

        let ptr = NonNull::new(ptr as *mut u8).ok_or_else(io::Error::last_os_error)?;

        Ok(Region::new(ptr, size))
    }

    fn protect_execute_read(&self, region: &Region) -> io::Result<()> {
        let address = region.as_ptr() as *const c_void;
        let mut old_protect = PAGE_PROTECTION_FLAGS(0);

        unsafe { VirtualProtect(address, region.len(), PAGE_EXECUTE_READ, &mut old_protect) }
            .map_err(|_| io::Error::last_os_error())?;

        // Code was written through the data side; make sure the CPU sees it
        unsafe { FlushInstructionCache(GetCurrentProcess(), Some(address), region.len()) }
            .map_err(|_| io::Error::last_os_error())?;

        Ok(())
    }

    unsafe fn free(&self, region: &Region) -> io::Result<()> {
        // Per WinAPI docs, 'dwSize' must be 0 if 'dwFreeType' is MEM_RELEASE.
        unsafe { VirtualFree(region.as_ptr() as *mut c_void, 0, MEM_RELEASE) }
            .map_err(|_| io::Error::last_os_error())
    }
}
