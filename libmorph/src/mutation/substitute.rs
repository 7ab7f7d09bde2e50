use super::errors::MutationError;
use super::{EquivalenceSet, HEADER_LEN, MutationResult};
use crate::buffer::ByteBuffer;
use crate::random::RandomSource;

/// Rewrites the body of the slot whose header starts at `header_offset`.
///
/// The body length is read from the byte after the marker. The body is
/// walked front to back, each step overwriting as many bytes as the widest
/// class of `set` that still fits. A trailing single byte is left as it is.
///
/// Returns the number of spans written. Nothing is modified when an error
/// is returned.
pub fn substitute<R: RandomSource + ?Sized>(
    buffer: &mut ByteBuffer,
    header_offset: usize,
    set: &EquivalenceSet,
    rng: &mut R,
) -> MutationResult<usize> {
    let buffer_len = buffer.len();

    let body_len = header_offset
        .checked_add(1)
        .and_then(|len_offset| buffer.as_slice().get(len_offset))
        .copied()
        .ok_or(MutationError::OutOfBounds {
            start: header_offset,
            len: HEADER_LEN,
            buffer_len,
        })? as usize;

    let body_start = header_offset + HEADER_LEN;
    let body_end = body_start
        .checked_add(body_len)
        .filter(|end| *end <= buffer_len)
        .ok_or(MutationError::OutOfBounds {
            start: header_offset,
            len: HEADER_LEN + body_len,
            buffer_len,
        })?;

    let body = &mut buffer.as_mut_vec()[body_start..body_end];

    let mut cursor = 0;
    let mut spans = 0;

    while cursor < body.len() {
        let remaining = body.len() - cursor;

        let Some(class) = set
            .classes()
            .iter()
            .copied()
            .find(|class| class.width() <= remaining && !class.is_empty())
        else {
            // single byte left, it is still filler
            cursor += 1;
            continue;
        };

        let index = rng.random_in_range(0, class.len() - 1);
        let Some(sequence) = class.get(index) else {
            log::error!(
                "Random source returned {} for a class of {} entries",
                index,
                class.len()
            );
            cursor += class.width();
            continue;
        };

        body[cursor..cursor + class.width()].copy_from_slice(sequence);

        log::trace!(
            "Slot 0x{:X}: body[{}..{}] <- {:02X?}",
            header_offset,
            cursor,
            cursor + class.width(),
            sequence
        );

        cursor += class.width();
        spans += 1;
    }

    log::debug!(
        "Rewrote {} span(s) in {}-byte body at 0x{:X} ({}-bit set)",
        spans,
        body_len,
        body_start,
        set.bitness()
    );

    Ok(spans)
}
