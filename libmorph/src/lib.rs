//! libmorph
//! Signature-driven function mutation for raw x86 code images.
//!
//! A target function is located by its leading bytes, a mutation slot is
//! carved out of the dead bytes that trail it, and the slot is filled with
//! register moves that leave every observable register and flag untouched.
//! The mutated image can be persisted or run inside a short-lived
//! executable region.

// Instruction equivalence lists are x86 encodings
#[cfg(not(any(target_arch = "x86_64", target_arch = "x86")))]
compile_error!("Unsupported architecture - only x86/x64 supported");

pub mod analysis;
pub mod buffer;
pub mod errors;
pub mod locator;
pub mod mutant;
pub mod mutation;
pub mod random;
pub mod sandbox;

pub use analysis::{FixedMetrics, FunctionMetrics, X86Metrics};
pub use buffer::ByteBuffer;
pub use errors::{MorphError, MorphResult};
pub use locator::FunctionSignature;
pub use mutant::{Mutant, MutatorConfig};
pub use mutation::{EquivalenceSet, MutationHeader, MutationOutcome};
pub use random::RandomSource;
pub use sandbox::{ExecutionOutcome, Sandbox};
