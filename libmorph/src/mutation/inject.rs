use std::iter;

use super::errors::MutationError;
use super::{FILLER_BYTE, HEADER_LEN, MutationHeader, MutationResult};
use crate::buffer::ByteBuffer;

/// Carves a mutation slot in front of the function at `start`.
///
/// The `insertion_space` dead bytes that trail the function are erased and
/// the same number of bytes is inserted at `start`: the 2-byte header
/// followed by `insertion_space - 2` filler bytes. The buffer keeps its
/// length and the function body moves forward by `insertion_space`.
///
/// Nothing is modified when an error is returned.
pub fn inject(
    buffer: &mut ByteBuffer,
    start: usize,
    function_len: usize,
    insertion_space: u8,
) -> MutationResult<MutationHeader> {
    let buffer_len = buffer.len();
    let space = insertion_space as usize;

    let out_of_bounds = || MutationError::OutOfBounds {
        start,
        len: function_len.saturating_add(space),
        buffer_len,
    };

    let dead_start = start.checked_add(function_len).ok_or_else(out_of_bounds)?;
    let dead_end = dead_start.checked_add(space).ok_or_else(out_of_bounds)?;

    if dead_end > buffer_len {
        log::error!(
            "Slot injection at 0x{:X} needs {} bytes but buffer ends at 0x{:X}",
            start,
            function_len + space,
            buffer_len
        );
        return Err(out_of_bounds());
    }

    if space < HEADER_LEN {
        return Err(MutationError::InsufficientSpace(insertion_space));
    }

    let header = MutationHeader {
        body_len: insertion_space - HEADER_LEN as u8,
    };

    let bytes = buffer.as_mut_vec();

    // Dead bytes go first so `start` stays valid for the insert.
    bytes.drain(dead_start..dead_end);

    let slot = header
        .to_bytes()
        .into_iter()
        .chain(iter::repeat_n(FILLER_BYTE, header.body_len as usize));
    bytes.splice(start..start, slot);

    debug_assert_eq!(bytes.len(), buffer_len);

    log::debug!(
        "Injected slot at 0x{:X}: header + {} filler bytes, {} dead bytes reclaimed from 0x{:X}",
        start,
        header.body_len,
        space,
        dead_start
    );

    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::MUTATION_MARKER;

    fn sample() -> (ByteBuffer, Vec<u8>) {
        // 2 prefix bytes, 6 function bytes, 5 dead bytes, 3 trailing bytes
        let function = vec![0x55, 0x48, 0x89, 0xE5, 0x5D, 0xC3];
        let mut bytes = vec![0xAA, 0xBB];
        bytes.extend(&function);
        bytes.extend([0xCC; 5]);
        bytes.extend([0x11, 0x22, 0x33]);
        (ByteBuffer::new(bytes), function)
    }

    #[test]
    fn test_inject_preserves_length() {
        for space in 2..=5u8 {
            let (mut buffer, _) = sample();
            let before = buffer.len();
            inject(&mut buffer, 2, 6, space).unwrap();
            assert_eq!(buffer.len(), before, "space {}", space);
        }
    }

    #[test]
    fn test_inject_layout() {
        let (mut buffer, function) = sample();
        let header = inject(&mut buffer, 2, 6, 5).unwrap();
        assert_eq!(header.body_len, 3);

        let bytes = buffer.as_slice();
        assert_eq!(&bytes[..2], &[0xAA, 0xBB]);
        assert_eq!(bytes[2], MUTATION_MARKER);
        assert_eq!(bytes[3], 3);
        assert_eq!(&bytes[4..7], &[FILLER_BYTE; 3]);
        assert_eq!(&bytes[7..13], function.as_slice());
        assert_eq!(&bytes[13..], &[0x11, 0x22, 0x33]);
    }

    #[test]
    fn test_inject_partial_dead_space() {
        let (mut buffer, function) = sample();
        inject(&mut buffer, 2, 6, 2).unwrap();

        let bytes = buffer.as_slice();
        assert_eq!(&bytes[2..4], &[MUTATION_MARKER, 0]);
        assert_eq!(&bytes[4..10], function.as_slice());
        // three of the five dead bytes survive behind the function
        assert_eq!(&bytes[10..13], &[0xCC; 3]);
    }

    #[test]
    fn test_inject_out_of_bounds_leaves_buffer() {
        let (mut buffer, _) = sample();
        let snapshot = buffer.clone();

        let err = inject(&mut buffer, 2, 6, 20).unwrap_err();
        assert!(matches!(err, MutationError::OutOfBounds { start: 2, .. }));
        assert_eq!(buffer, snapshot);
    }

    #[test]
    fn test_inject_overflowing_offsets() {
        let (mut buffer, _) = sample();
        let err = inject(&mut buffer, usize::MAX, 6, 4).unwrap_err();
        assert!(matches!(err, MutationError::OutOfBounds { .. }));
    }

    #[test]
    fn test_inject_rejects_tiny_space() {
        let (mut buffer, _) = sample();
        let snapshot = buffer.clone();

        assert_eq!(
            inject(&mut buffer, 2, 6, 1),
            Err(MutationError::InsufficientSpace(1))
        );
        assert_eq!(buffer, snapshot);
    }
}
