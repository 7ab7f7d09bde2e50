//! Mutation driver.
//!
//! `Mutant` owns one code image together with the collaborators a pass
//! needs: function metrics for the surgery math and a random source for
//! the substitutor.

use std::path::Path;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::analysis::{FunctionMetrics, X86Metrics};
use crate::buffer::{BufferResult, ByteBuffer};
use crate::errors::MorphResult;
use crate::locator::{self, FunctionSignature};
use crate::mutation::errors::MutationError;
use crate::mutation::{
    self, EquivalenceSet, HEADER_LEN, MAX_SLOT_LEN, MutationHeader, MutationOutcome,
};
use crate::random::RandomSource;
use crate::sandbox::{ExecutableMemory, ExecutionOutcome, Sandbox, SandboxResult};

/// Settings for a `Mutant` built with the default collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutatorConfig {
    /// Seed for the substitutor. Drawn from the OS when unset.
    pub seed: Option<u64>,
    /// Decoder mode used to measure functions.
    pub bitness: u32,
    /// Function alignment assumed when measuring dead space.
    pub alignment: usize,
}

impl Default for MutatorConfig {
    fn default() -> Self {
        let metrics = X86Metrics::default();

        Self {
            seed: None,
            bitness: metrics.bitness(),
            alignment: metrics.alignment(),
        }
    }
}

impl MutatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_bitness(mut self, bitness: u32) -> Self {
        self.bitness = bitness;
        self
    }

    pub fn with_alignment(mut self, alignment: usize) -> Self {
        self.alignment = alignment;
        self
    }
}

/// A code image under mutation.
pub struct Mutant<F: FunctionMetrics = X86Metrics, R: RandomSource = ChaCha8Rng> {
    buffer: ByteBuffer,
    metrics: F,
    rng: R,
    set: EquivalenceSet,
    seed: Option<u64>,
}

impl Mutant<X86Metrics, ChaCha8Rng> {
    /// Builds a mutant with linear-sweep metrics and a seeded ChaCha stream.
    ///
    /// Fails when `config.bitness` has no inert instruction set.
    pub fn from_config(buffer: ByteBuffer, config: &MutatorConfig) -> MorphResult<Self> {
        let set = EquivalenceSet::for_bitness(config.bitness)
            .ok_or(MutationError::UnsupportedBitness(config.bitness))?;

        let seed = config.seed.unwrap_or_else(rand::random);

        log::debug!(
            "Mutant config: seed={}, bitness={}, alignment={}",
            seed,
            config.bitness,
            config.alignment
        );

        Ok(Self {
            buffer,
            metrics: X86Metrics::new(config.bitness, config.alignment),
            rng: ChaCha8Rng::seed_from_u64(seed),
            set,
            seed: Some(seed),
        })
    }

    /// Loads `path` and builds a mutant over it.
    pub fn load(path: impl AsRef<Path>, config: &MutatorConfig) -> MorphResult<Self> {
        Self::from_config(ByteBuffer::load(path)?, config)
    }
}

impl<F: FunctionMetrics, R: RandomSource> Mutant<F, R> {
    /// Substitutes with the instruction set of the compile target.
    pub fn new(buffer: ByteBuffer, metrics: F, rng: R) -> Self {
        Self {
            buffer,
            metrics,
            rng,
            set: EquivalenceSet::native(),
            seed: None,
        }
    }

    pub fn with_equivalence_set(mut self, set: EquivalenceSet) -> Self {
        self.set = set;
        self
    }

    /// Loads `path` when no image is held yet.
    ///
    /// Returns `Ok(false)` and leaves the current image alone otherwise.
    pub fn open(&mut self, path: impl AsRef<Path>) -> BufferResult<bool> {
        if !self.buffer.is_empty() {
            log::warn!("Image already loaded, ignoring {:?}", path.as_ref());
            return Ok(false);
        }

        self.buffer = ByteBuffer::load(path)?;
        Ok(true)
    }

    /// Writes the current image to `path`.
    pub fn finalize(&self, path: impl AsRef<Path>) -> BufferResult<()> {
        self.buffer.save(path)
    }

    pub fn buffer(&self) -> &ByteBuffer {
        &self.buffer
    }

    pub fn into_buffer(self) -> ByteBuffer {
        self.buffer
    }

    /// Seed of the random stream, when it was built from a config.
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Runs one mutation pass over the function starting with `signature`.
    ///
    /// Only the first `approximate_length` signature bytes are matched; the
    /// surgery itself uses the lengths reported by the metrics. A function
    /// that already carries a slot header gets its body re-rolled, whether
    /// or not a new slot was injected in this pass.
    pub fn mutate(
        &mut self,
        signature: &[u8],
        approximate_length: usize,
    ) -> MorphResult<MutationOutcome> {
        let signature = FunctionSignature::new(signature)?.truncated(approximate_length)?;

        let Some(offset) = locator::locate(self.buffer.as_slice(), signature) else {
            log::info!("Signature {:02X?} not found", signature.as_bytes());
            return Ok(MutationOutcome::NotFound);
        };

        let function_len = self.metrics.function_size(&self.buffer.as_slice()[offset..]);
        let mut insertion_space = self.metrics.insertion_space(function_len);

        log::debug!(
            "Function at 0x{:X}: {} bytes, {} byte(s) of insertion space",
            offset,
            function_len,
            insertion_space
        );

        if insertion_space > MAX_SLOT_LEN {
            log::debug!(
                "Capping insertion space {} to {} so the slot stays recognisable",
                insertion_space,
                MAX_SLOT_LEN
            );
            insertion_space = MAX_SLOT_LEN;
        }

        let injected = if insertion_space as usize >= HEADER_LEN {
            mutation::inject(&mut self.buffer, offset, function_len, insertion_space)?;
            true
        } else {
            log::debug!("No room for a slot at 0x{:X}, skipping injection", offset);
            false
        };

        let spans = match MutationHeader::parse(self.buffer.as_slice(), offset) {
            Some(_) => mutation::substitute(&mut self.buffer, offset, &self.set, &mut self.rng)?,
            None => 0,
        };

        log::info!(
            "Mutated function at 0x{:X} (injected: {}, spans rewritten: {})",
            offset,
            injected,
            spans
        );

        Ok(MutationOutcome::Mutated {
            offset,
            function_len,
            insertion_space,
            injected,
            spans,
        })
    }

    /// Runs the current image from native executable memory.
    ///
    /// # Safety
    /// See [`Sandbox::execute`].
    pub unsafe fn execute(&self) -> SandboxResult<ExecutionOutcome> {
        unsafe { self.execute_in(&Sandbox::native()) }
    }

    /// Runs the current image through `sandbox`.
    ///
    /// # Safety
    /// See [`Sandbox::execute`].
    pub unsafe fn execute_in<M: ExecutableMemory>(
        &self,
        sandbox: &Sandbox<M>,
    ) -> SandboxResult<ExecutionOutcome> {
        unsafe { sandbox.execute(self.buffer.as_slice()) }
    }
}
