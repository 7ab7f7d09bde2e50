use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MutationError {
    #[error("Mutation range 0x{start:X}+{len} exceeds buffer of {buffer_len} bytes")]
    OutOfBounds {
        start: usize,
        len: usize,
        buffer_len: usize,
    },

    #[error("Insertion space of {0} bytes cannot hold a mutation header")]
    InsufficientSpace(u8),

    #[error("No inert instruction set for {0}-bit code")]
    UnsupportedBitness(u32),
}
