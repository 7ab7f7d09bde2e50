use super::FunctionMetrics;

/// Metrics for images whose layout is already known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedMetrics {
    pub function_len: usize,
    pub insertion_space: u8,
}

impl FixedMetrics {
    pub fn new(function_len: usize, insertion_space: u8) -> Self {
        Self {
            function_len,
            insertion_space,
        }
    }
}

impl FunctionMetrics for FixedMetrics {
    fn function_size(&self, code: &[u8]) -> usize {
        self.function_len.min(code.len())
    }

    fn insertion_space(&self, _function_len: usize) -> u8 {
        self.insertion_space
    }
}
