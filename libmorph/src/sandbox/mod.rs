//! Short-lived executable copies of a code image.
//!
//! `Sandbox::execute` walks `Idle -> Allocated -> Protected -> Running ->
//! Released`. The region is owned by a guard from the moment it is
//! allocated, so every exit path frees it.
//!
//! This is not isolation. The image runs in-process with the caller's
//! privileges. Only unwinding failures are contained; a hardware fault
//! (SIGSEGV, access violation) raised by the image takes the process down.

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::ptr::NonNull;

pub mod errors;

#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod win32;

#[cfg(unix)]
pub use unix::UnixMemory;
#[cfg(windows)]
pub use win32::WindowsMemory;

/// Region provider for the compile target.
#[cfg(unix)]
pub type NativeMemory = UnixMemory;
#[cfg(windows)]
pub type NativeMemory = WindowsMemory;

use errors::SandboxError;

pub type SandboxResult<T> = std::result::Result<T, SandboxError>;

/// Entry point signature of an executed image.
pub type EntryPoint = unsafe extern "C-unwind" fn();

/// Page-granular memory obtained from the platform.
#[derive(Debug)]
pub struct Region {
    ptr: NonNull<u8>,
    len: usize,
}

impl Region {
    pub fn new(ptr: NonNull<u8>, len: usize) -> Self {
        Self { ptr, len }
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn address(&self) -> usize {
        self.ptr.as_ptr() as usize
    }
}

/// Platform access needed to run code from a fresh region.
pub trait ExecutableMemory {
    /// Zero-initialised read/write region of at least `size` bytes.
    fn allocate(&self, size: usize) -> io::Result<Region>;

    /// Switches the region to execute + read, no write.
    fn protect_execute_read(&self, region: &Region) -> io::Result<()>;

    /// Returns the region to the platform.
    ///
    /// # Safety
    /// `region` must come from `allocate` on the same provider and must not
    /// be used afterwards.
    unsafe fn free(&self, region: &Region) -> io::Result<()>;
}

/// Frees the region when dropped.
struct RegionGuard<'a, M: ExecutableMemory + ?Sized> {
    memory: &'a M,
    region: Region,
}

impl<'a, M: ExecutableMemory + ?Sized> RegionGuard<'a, M> {
    fn new(memory: &'a M, region: Region) -> Self {
        Self { memory, region }
    }

    fn region(&self) -> &Region {
        &self.region
    }
}

impl<M: ExecutableMemory + ?Sized> Drop for RegionGuard<'_, M> {
    fn drop(&mut self) {
        log::debug!("RegionGuard freeing memory at {:p}", self.region.as_ptr());

        if let Err(err) = unsafe { self.memory.free(&self.region) } {
            log::error!("Failed to free executable region: {}", err);
        }
    }
}

/// How a run of the image ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Completed,
    /// The image unwound with this message. The region was still released.
    Faulted(String),
}

impl ExecutionOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Runs code images from freshly allocated executable memory.
#[derive(Debug, Default)]
pub struct Sandbox<M: ExecutableMemory = NativeMemory> {
    memory: M,
}

impl Sandbox<NativeMemory> {
    pub fn native() -> Self {
        Self {
            memory: NativeMemory::default(),
        }
    }
}

impl<M: ExecutableMemory> Sandbox<M> {
    pub fn with_memory(memory: M) -> Self {
        Self { memory }
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    /// Copies `code` into a new region and calls its first byte as
    /// `extern "C" fn()`.
    ///
    /// Allocation and protection failures are returned after any acquired
    /// region has been released. A failure raised while the image runs is
    /// reported as `ExecutionOutcome::Faulted`.
    ///
    /// # Safety
    /// `code` is executed as machine code for the current architecture and
    /// calling convention. It must return normally with the stack and
    /// callee-saved registers intact; anything else is undefined behaviour.
    pub unsafe fn execute(&self, code: &[u8]) -> SandboxResult<ExecutionOutcome> {
        self.execute_with(code, |region| {
            let entry: EntryPoint = unsafe { std::mem::transmute(region.as_ptr()) };

            unsafe { entry() }
        })
    }

    /// Stages `code` in a protected region and hands the region to `run`.
    fn execute_with<F: FnOnce(&Region)>(
        &self,
        code: &[u8],
        run: F,
    ) -> SandboxResult<ExecutionOutcome> {
        let size = code.len();

        if size == 0 {
            return Err(SandboxError::Allocation {
                size,
                source: io::Error::new(io::ErrorKind::InvalidInput, "code image is empty"),
            });
        }

        // Allocated
        let region = self
            .memory
            .allocate(size)
            .map_err(|source| SandboxError::Allocation { size, source })?;

        let guard = RegionGuard::new(&self.memory, region);

        log::trace!("Allocated {} bytes at {:p}", size, guard.region().as_ptr());

        // Still writable here; the copy has to land before protection drops write access
        unsafe {
            std::ptr::copy_nonoverlapping(code.as_ptr(), guard.region().as_ptr(), size);
        }

        // Protected
        self.memory
            .protect_execute_read(guard.region())
            .map_err(|source| {
                log::error!(
                    "Failed to protect region at {:p}: {}",
                    guard.region().as_ptr(),
                    source
                );
                SandboxError::Protection {
                    address: guard.region().address(),
                    source,
                }
            })?;

        // Running
        log::debug!("Running {} byte image at {:p}", size, guard.region().as_ptr());

        let outcome = run_contained(|| run(guard.region()));

        match &outcome {
            ExecutionOutcome::Completed => log::info!("Image returned normally"),
            ExecutionOutcome::Faulted(message) => {
                log::error!("Image faulted during execution: {}", message)
            }
        }

        // Released
        drop(guard);

        Ok(outcome)
    }
}

/// Calls `run`, turning an unwind into `ExecutionOutcome::Faulted`.
fn run_contained<F: FnOnce()>(run: F) -> ExecutionOutcome {
    match panic::catch_unwind(AssertUnwindSafe(run)) {
        Ok(()) => ExecutionOutcome::Completed,
        Err(payload) => ExecutionOutcome::Faulted(panic_message(payload.as_ref())),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown fault".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    /// Heap-backed provider that records calls and can be told to fail.
    #[derive(Default)]
    struct MockMemory {
        fail_allocate: bool,
        fail_protect: bool,
        fail_free: bool,
        allocated: Cell<usize>,
        protected: Cell<usize>,
        freed: Cell<usize>,
        last_contents: RefCell<Vec<u8>>,
    }

    impl MockMemory {
        fn live_regions(&self) -> usize {
            self.allocated.get() - self.freed.get()
        }
    }

    impl ExecutableMemory for MockMemory {
        fn allocate(&self, size: usize) -> io::Result<Region> {
            if self.fail_allocate {
                return Err(io::Error::new(io::ErrorKind::OutOfMemory, "denied"));
            }

            let boxed = vec![0u8; size].into_boxed_slice();
            let ptr = NonNull::new(Box::into_raw(boxed) as *mut u8).unwrap();
            self.allocated.set(self.allocated.get() + 1);
            Ok(Region::new(ptr, size))
        }

        fn protect_execute_read(&self, region: &Region) -> io::Result<()> {
            let contents = unsafe { std::slice::from_raw_parts(region.as_ptr(), region.len()) };
            *self.last_contents.borrow_mut() = contents.to_vec();

            if self.fail_protect {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
            }

            self.protected.set(self.protected.get() + 1);
            Ok(())
        }

        unsafe fn free(&self, region: &Region) -> io::Result<()> {
            let slice = std::ptr::slice_from_raw_parts_mut(region.as_ptr(), region.len());
            drop(unsafe { Box::from_raw(slice) });
            self.freed.set(self.freed.get() + 1);

            if self.fail_free {
                return Err(io::Error::other("free failed"));
            }

            Ok(())
        }
    }

    #[test]
    fn test_allocation_failure_leaves_nothing_behind() {
        let sandbox = Sandbox::with_memory(MockMemory {
            fail_allocate: true,
            ..Default::default()
        });

        let result = unsafe { sandbox.execute(&[0xC3]) };
        assert!(matches!(result, Err(SandboxError::Allocation { size: 1, .. })));
        assert_eq!(sandbox.memory().allocated.get(), 0);
        assert_eq!(sandbox.memory().freed.get(), 0);
    }

    #[test]
    fn test_empty_image_is_an_allocation_error() {
        let sandbox = Sandbox::with_memory(MockMemory::default());

        let result = unsafe { sandbox.execute(&[]) };
        assert!(matches!(result, Err(SandboxError::Allocation { size: 0, .. })));
        assert_eq!(sandbox.memory().allocated.get(), 0);
    }

    #[test]
    fn test_protection_failure_releases_region() {
        let sandbox = Sandbox::with_memory(MockMemory {
            fail_protect: true,
            ..Default::default()
        });

        let image = [0x90, 0x90, 0xC3];
        let result = unsafe { sandbox.execute(&image) };

        assert!(matches!(result, Err(SandboxError::Protection { .. })));
        assert_eq!(sandbox.memory().allocated.get(), 1);
        assert_eq!(sandbox.memory().live_regions(), 0);
        // the copy happened before protection was requested
        assert_eq!(*sandbox.memory().last_contents.borrow(), image.to_vec());
    }

    #[test]
    fn test_fault_still_releases_region() {
        let sandbox = Sandbox::with_memory(MockMemory::default());
        let image = [0x0F, 0x0B];

        let outcome = sandbox
            .execute_with(&image, |region| {
                let staged = unsafe { std::slice::from_raw_parts(region.as_ptr(), region.len()) };
                assert_eq!(staged, image);
                panic!("illegal instruction");
            })
            .unwrap();

        assert_eq!(
            outcome,
            ExecutionOutcome::Faulted("illegal instruction".to_string())
        );
        assert_eq!(sandbox.memory().protected.get(), 1);
        assert_eq!(sandbox.memory().freed.get(), 1);
        assert_eq!(sandbox.memory().live_regions(), 0);
    }

    #[test]
    fn test_completed_run_releases_region() {
        let sandbox = Sandbox::with_memory(MockMemory::default());
        let ran = Cell::new(false);

        let outcome = sandbox.execute_with(&[0xC3], |_| ran.set(true)).unwrap();

        assert!(outcome.is_completed());
        assert!(ran.get());
        assert_eq!(sandbox.memory().live_regions(), 0);
    }

    #[test]
    fn test_free_failure_is_not_fatal() {
        let memory = MockMemory {
            fail_free: true,
            ..Default::default()
        };

        {
            let guard = RegionGuard::new(&memory, memory.allocate(8).unwrap());
            assert_eq!(guard.region().len(), 8);
        }

        assert_eq!(memory.freed.get(), 1);
    }

    #[test]
    fn test_run_contained_completes() {
        let ran = Cell::new(false);
        assert_eq!(run_contained(|| ran.set(true)), ExecutionOutcome::Completed);
        assert!(ran.get());
    }

    #[test]
    fn test_run_contained_catches_unwind() {
        let outcome = run_contained(|| panic!("bad opcode"));
        assert_eq!(outcome, ExecutionOutcome::Faulted("bad opcode".to_string()));

        let outcome = run_contained(|| std::panic::panic_any(17u32));
        assert_eq!(outcome, ExecutionOutcome::Faulted("unknown fault".to_string()));
    }

    #[cfg(all(target_arch = "x86_64", any(unix, windows)))]
    #[test]
    fn test_native_ret_stub() {
        let sandbox = Sandbox::native();

        // nop; nop; ret
        let outcome = unsafe { sandbox.execute(&[0x90, 0x90, 0xC3]) }.unwrap();
        assert!(outcome.is_completed());
    }
}
