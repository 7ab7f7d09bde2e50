//! Function lookup by leading bytes.
//!
//! A previously mutated function has its slot header sitting in front of the
//! signature bytes, so after a signature hit the locator looks a few bytes
//! back and prefers the header as the function start. Repeated passes then
//! keep operating on the same slot instead of growing a new one.

use thiserror::Error;

use crate::mutation::MutationHeader;

/// Bytes compared before committing to a full signature comparison.
const QUICK_CHECK_LEN: usize = 4;

/// Width of the backward header scan, the hit itself included.
pub const MARKER_SCAN_WINDOW: usize = 14;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Signature is empty")]
    Empty,
}

/// Leading bytes of a target function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionSignature<'a> {
    bytes: &'a [u8],
}

impl<'a> FunctionSignature<'a> {
    pub fn new(bytes: &'a [u8]) -> Result<Self, SignatureError> {
        if bytes.is_empty() {
            return Err(SignatureError::Empty);
        }

        Ok(Self { bytes })
    }

    /// Signature limited to the first `len` bytes, when `len` is shorter.
    pub fn truncated(self, len: usize) -> Result<Self, SignatureError> {
        Self::new(&self.bytes[..len.min(self.bytes.len())])
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn matches_at(&self, code: &[u8], offset: usize) -> bool {
        let Some(candidate) = code.get(offset..offset + self.bytes.len()) else {
            return false;
        };

        let quick = QUICK_CHECK_LEN.min(self.bytes.len());

        candidate[..quick] == self.bytes[..quick] && candidate == self.bytes
    }
}

/// Returns the start of the function identified by `signature`.
///
/// The first signature hit wins. If a slot header (`0xB4 <len < 16>`) sits
/// within the 14 bytes ending at the hit, the lowest such header becomes the
/// start instead.
pub fn locate(code: &[u8], signature: FunctionSignature<'_>) -> Option<usize> {
    let last_candidate = code.len().checked_sub(signature.len())?;

    let hit = (0..=last_candidate).find(|offset| signature.matches_at(code, *offset))?;

    log::trace!("Signature matched at 0x{:X}", hit);

    let start = find_header_before(code, hit).unwrap_or(hit);

    if start != hit {
        log::debug!(
            "Found mutation header at 0x{:X}, {} byte(s) before signature hit",
            start,
            hit - start
        );
    }

    Some(start)
}

/// Lowest recognised header in `[hit - 13, hit]`, clamped at offset 0.
fn find_header_before(code: &[u8], hit: usize) -> Option<usize> {
    let window_start = hit.saturating_sub(MARKER_SCAN_WINDOW - 1);

    (window_start..=hit).find(|offset| MutationHeader::parse(code, *offset).is_some())
}
