//! Function geometry collaborators.
//!
//! The mutation pipeline never trusts the caller's length hint for surgery;
//! it asks a `FunctionMetrics` implementation for the real function length
//! and for how many dead bytes follow it.

mod fixed;
mod x86;

pub use fixed::FixedMetrics;
pub use x86::X86Metrics;

/// Byte geometry of a function inside a code image.
pub trait FunctionMetrics {
    /// Length in bytes of the function whose first byte is `code[0]`.
    ///
    /// `code` runs to the end of the image.
    fn function_size(&self, code: &[u8]) -> usize;

    /// Trailing dead bytes usable as a mutation slot for a function of
    /// `function_len` bytes. 0 or 1 means the function is left as is.
    fn insertion_space(&self, function_len: usize) -> u8;
}

impl<T: FunctionMetrics + ?Sized> FunctionMetrics for &T {
    fn function_size(&self, code: &[u8]) -> usize {
        (**self).function_size(code)
    }

    fn insertion_space(&self, function_len: usize) -> u8 {
        (**self).insertion_space(function_len)
    }
}

impl<T: FunctionMetrics + ?Sized> FunctionMetrics for Box<T> {
    fn function_size(&self, code: &[u8]) -> usize {
        (**self).function_size(code)
    }

    fn insertion_space(&self, function_len: usize) -> u8 {
        (**self).insertion_space(function_len)
    }
}
