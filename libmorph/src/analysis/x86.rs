use iced_x86::{Decoder, DecoderOptions, FlowControl, Instruction, Mnemonic};

use super::FunctionMetrics;

#[cfg(target_arch = "x86_64")]
pub const NATIVE_BITNESS: u32 = 64;
#[cfg(target_arch = "x86")]
pub const NATIVE_BITNESS: u32 = 32;

/// Usual function alignment emitted by MSVC, GCC and Clang.
pub const DEFAULT_ALIGNMENT: usize = 16;

/// Linear-sweep metrics for x86 code.
///
/// The function is taken to end at its first return instruction, and the
/// dead space is the padding up to the next `alignment` boundary. This is a
/// heuristic: functions with several exits or tail jumps are cut short.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct X86Metrics {
    bitness: u32,
    alignment: usize,
}

impl X86Metrics {
    /// `bitness` is 16, 32 or 64. `alignment` of 0 is treated as 1.
    pub fn new(bitness: u32, alignment: usize) -> Self {
        Self {
            bitness,
            alignment: alignment.max(1),
        }
    }

    pub fn bitness(&self) -> u32 {
        self.bitness
    }

    pub fn alignment(&self) -> usize {
        self.alignment
    }
}

impl Default for X86Metrics {
    fn default() -> Self {
        Self::new(NATIVE_BITNESS, DEFAULT_ALIGNMENT)
    }
}

impl FunctionMetrics for X86Metrics {
    fn function_size(&self, code: &[u8]) -> usize {
        let mut decoder = Decoder::with_ip(self.bitness, code, 0, DecoderOptions::NONE);
        let mut instruction = Instruction::default();
        let mut size = 0;
        // Furthest offset a jump inside the code lands on
        let mut furthest_target: Option<usize> = None;

        while decoder.can_decode() {
            decoder.decode_out(&mut instruction);

            if instruction.is_invalid() {
                log::debug!("Invalid instruction at +0x{:X}, function ends here", size);
                break;
            }

            // int3 padding after a tail jump, unless a jump lands beyond it
            if instruction.mnemonic() == Mnemonic::Int3
                && !furthest_target.is_some_and(|target| target >= size)
            {
                break;
            }

            size += instruction.len();

            if let Some(target) = local_jump_target(&instruction, code.len()) {
                furthest_target = Some(furthest_target.map_or(target, |t| t.max(target)));
            }

            // An early return only ends the function when nothing jumps past it
            if instruction.flow_control() == FlowControl::Return
                && !furthest_target.is_some_and(|target| target >= size)
            {
                break;
            }
        }

        log::trace!(
            "Function size by linear sweep: {} bytes (furthest jump target {:?})",
            size,
            furthest_target
        );

        size
    }

    fn insertion_space(&self, function_len: usize) -> u8 {
        let padding = (self.alignment - function_len % self.alignment) % self.alignment;

        u8::try_from(padding).unwrap_or(u8::MAX)
    }
}

/// Target of a near jump that lands inside `code`, as an offset.
fn local_jump_target(instruction: &Instruction, code_len: usize) -> Option<usize> {
    match instruction.flow_control() {
        FlowControl::ConditionalBranch | FlowControl::UnconditionalBranch => {}
        _ => return None,
    }

    usize::try_from(instruction.near_branch_target())
        .ok()
        .filter(|target| *target < code_len)
}
