use thiserror::Error;

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("Failed to allocate {size} bytes of executable memory: {source}")]
    Allocation {
        size: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to make region at 0x{address:X} executable: {source}")]
    Protection {
        address: usize,
        #[source]
        source: std::io::Error,
    },
}
