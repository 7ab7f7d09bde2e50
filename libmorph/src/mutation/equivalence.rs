//! Inert instruction classes.
//!
//! Every entry leaves all registers and flags as they were, so any entry can
//! stand in for any other entry of the same length. 8-bit self moves decode
//! the same in 32- and 64-bit mode. The 3-byte class depends on the mode:
//! REX.W moves are `dec r32` plus a move outside 64-bit mode, and
//! `lea r32, [r32]` zero-extends on x64.
//!
//! 32-bit self moves (`mov ebx, ebx`) are excluded: on x64 they
//! zero the upper half of the destination.

/// 2-byte class: `mov r8, r8` (opcode 88 /r).
pub const INERT_2: &[&[u8]] = &[
    &[0x88, 0xC0], // mov al, al
    &[0x88, 0xC9], // mov cl, cl
    &[0x88, 0xD2], // mov dl, dl
    &[0x88, 0xDB], // mov bl, bl
    &[0x88, 0xE4], // mov ah, ah
    &[0x88, 0xED], // mov ch, ch
    &[0x88, 0xF6], // mov dh, dh
    &[0x88, 0xFF], // mov bh, bh
];

/// 3-byte class for 64-bit code: `mov r64, r64` (REX.W 89 /r).
pub const INERT_3: &[&[u8]] = &[
    &[0x48, 0x89, 0xC0], // mov rax, rax
    &[0x48, 0x89, 0xC9], // mov rcx, rcx
    &[0x48, 0x89, 0xD2], // mov rdx, rdx
    &[0x48, 0x89, 0xDB], // mov rbx, rbx
    &[0x48, 0x89, 0xE4], // mov rsp, rsp
    &[0x48, 0x89, 0xED], // mov rbp, rbp
    &[0x4D, 0x89, 0xC0], // mov r8, r8
    &[0x4D, 0x89, 0xED], // mov r13, r13
    &[0x4D, 0x89, 0xF6], // mov r14, r14
    &[0x4D, 0x89, 0xFF], // mov r15, r15
];

/// 3-byte class for 32-bit code: `lea r32, [r32 + 0]` (8D /r, disp8).
pub const INERT_3_X86: &[&[u8]] = &[
    &[0x8D, 0x40, 0x00], // lea eax, [eax]
    &[0x8D, 0x49, 0x00], // lea ecx, [ecx]
    &[0x8D, 0x52, 0x00], // lea edx, [edx]
    &[0x8D, 0x5B, 0x00], // lea ebx, [ebx]
    &[0x8D, 0x6D, 0x00], // lea ebp, [ebp]
    &[0x8D, 0x76, 0x00], // lea esi, [esi]
    &[0x8D, 0x7F, 0x00], // lea edi, [edi]
];

/// Borrowed view over one class, so the substitutor can pick by length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EquivalenceClass {
    width: usize,
    entries: &'static [&'static [u8]],
}

impl EquivalenceClass {
    pub const TWO: Self = Self {
        width: 2,
        entries: INERT_2,
    };

    pub const THREE: Self = Self {
        width: 3,
        entries: INERT_3,
    };

    pub const THREE_X86: Self = Self {
        width: 3,
        entries: INERT_3_X86,
    };

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&'static [u8]> {
        self.entries.get(index).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static [u8]> {
        self.entries.iter().copied()
    }

    pub fn contains(&self, sequence: &[u8]) -> bool {
        self.iter().any(|entry| entry == sequence)
    }
}

/// The classes that are inert for one decoder mode, widest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EquivalenceSet {
    bitness: u32,
    classes: [EquivalenceClass; 2],
}

impl EquivalenceSet {
    pub const X64: Self = Self {
        bitness: 64,
        classes: [EquivalenceClass::THREE, EquivalenceClass::TWO],
    };

    pub const X86: Self = Self {
        bitness: 32,
        classes: [EquivalenceClass::THREE_X86, EquivalenceClass::TWO],
    };

    /// Set for 32- or 64-bit code. 16-bit code has no set.
    pub fn for_bitness(bitness: u32) -> Option<Self> {
        match bitness {
            64 => Some(Self::X64),
            32 => Some(Self::X86),
            _ => None,
        }
    }

    /// Set matching the compile target.
    pub fn native() -> Self {
        if cfg!(target_arch = "x86_64") {
            Self::X64
        } else {
            Self::X86
        }
    }

    pub fn bitness(&self) -> u32 {
        self.bitness
    }

    /// Largest class first; the substitutor walks this greedily.
    pub fn classes(&self) -> &[EquivalenceClass] {
        &self.classes
    }

    pub fn class_of_width(&self, width: usize) -> Option<EquivalenceClass> {
        self.classes.iter().copied().find(|class| class.width() == width)
    }
}
