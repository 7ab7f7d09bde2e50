pub mod equivalence;
pub mod errors;
pub mod inject;
pub mod substitute;

pub use equivalence::*;
pub use inject::inject;
pub use substitute::substitute;

/// `mov ah, imm8` opcode, reused as the slot marker. The immediate holds the body length.
pub const MUTATION_MARKER: u8 = 0xB4;

/// Single byte `nop`, written into a freshly reserved body.
pub const FILLER_BYTE: u8 = 0x90;

/// Marker plus length byte.
pub const HEADER_LEN: usize = 2;

/// Body lengths at or above this value are never treated as a header.
pub const BODY_LEN_LIMIT: u8 = 16;

/// Largest slot that is still recognised as one on a later pass.
pub const MAX_SLOT_LEN: u8 = HEADER_LEN as u8 + BODY_LEN_LIMIT - 1;

pub type MutationResult<T> = std::result::Result<T, errors::MutationError>;

/// Decoded 2-byte slot header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationHeader {
    pub body_len: u8,
}

impl MutationHeader {
    /// Recognizes a header at `offset`.
    ///
    /// Only `0xB4 <len>` with `len < 16` counts. A bare `mov ah, imm8` with a
    /// larger immediate is left alone.
    pub fn parse(code: &[u8], offset: usize) -> Option<Self> {
        match code.get(offset..offset.checked_add(HEADER_LEN)?)? {
            [MUTATION_MARKER, body_len] if *body_len < BODY_LEN_LIMIT => Some(Self {
                body_len: *body_len,
            }),
            _ => None,
        }
    }

    pub fn to_bytes(self) -> [u8; HEADER_LEN] {
        [MUTATION_MARKER, self.body_len]
    }

    /// Header plus body.
    pub fn slot_len(self) -> usize {
        HEADER_LEN + self.body_len as usize
    }
}

/// What a single `mutate` pass did to the image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// Signature not present; image untouched.
    NotFound,
    Mutated {
        /// Function start after relocation onto an existing header.
        offset: usize,
        function_len: usize,
        insertion_space: u8,
        /// A new header was written in this pass.
        injected: bool,
        /// Body spans rewritten by the substitutor (0 when no header is present).
        spans: usize,
    },
}

impl MutationOutcome {
    pub fn is_found(&self) -> bool {
        !matches!(self, Self::NotFound)
    }
}
