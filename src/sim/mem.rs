//! Memory handling for the simulator.
//!
//! This module consists of:
//! - [`MemArray`]: the data memory.
//! - [`RegFile`]: the register file.
//! - [`MachineInitStrategy`]: the strategy used to fill both on creation.
//!
//! Every cell is a plain 16-bit signed integer. By default all cells start
//! at 0; the other [`MachineInitStrategy`] variants fill them with garbage
//! instead, which is useful for flushing out programs that read cells they
//! never stored to.

use rand::rngs::StdRng;
use rand::Rng;

use crate::ast::Reg;

/// Trait that describes types that can produce the starting data for machine cells.
///
/// This is used by [`MemArray::new`] and [`RegFile::new`].
pub trait CellFiller {
    /// Generate the data for one cell.
    fn generate(&mut self) -> i16;
}
impl CellFiller for () {
    /// This creates unseeded, non-deterministic values.
    fn generate(&mut self) -> i16 {
        rand::random()
    }
}
impl CellFiller for i16 {
    /// Sets each cell to the given value.
    fn generate(&mut self) -> i16 {
        *self
    }
}
impl CellFiller for StdRng {
    /// This creates values from the standard random number generator.
    ///
    /// This can be used to create deterministic, seeded values.
    fn generate(&mut self) -> i16 {
        self.gen()
    }
}

/// Strategy used to initialize the `reg_file` and `mem` of the [`Simulator`].
///
/// The default, [`MachineInitStrategy::Zeroed`], sets every register and
/// memory cell to 0, which is the behavior programs may rely on. The random
/// strategies exist to check that a program does *not* rely on it.
///
/// [`Simulator`]: super::Simulator
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub enum MachineInitStrategy {
    /// Initializes each cell to 0.
    #[default]
    Zeroed,

    /// Initializes each cell to a known value.
    Known {
        /// The value to initialize each cell to.
        value: i16,
    },

    /// Initializes each cell randomly and deterministically.
    Seeded {
        /// The seed the RNG is initialized with.
        seed: u64,
    },

    /// Initializes each cell randomly and non-deterministically.
    Unseeded,
}

impl MachineInitStrategy {
    pub(super) fn generator(&self) -> impl CellFiller {
        use rand::SeedableRng;

        match self {
            MachineInitStrategy::Zeroed          => McGenerator::Known(0),
            MachineInitStrategy::Known { value } => McGenerator::Known(*value),
            MachineInitStrategy::Seeded { seed } => McGenerator::Seeded(Box::new(StdRng::seed_from_u64(*seed))),
            MachineInitStrategy::Unseeded        => McGenerator::Unseeded,
        }
    }
}

enum McGenerator {
    Known(i16),
    Seeded(Box<StdRng>),
    Unseeded,
}
impl CellFiller for McGenerator {
    fn generate(&mut self) -> i16 {
        match self {
            McGenerator::Known(k)  => k.generate(),
            McGenerator::Seeded(r) => r.generate(),
            McGenerator::Unseeded  => ().generate(),
        }
    }
}

const N: usize = 1 << 16;

/// The data memory: 65536 cells of 16-bit signed integers.
///
/// This can be addressed with any `u16` (16-bit address).
/// Note that this is held in the heap, as it is too large for the stack.
///
/// ## Example
///
/// ```
/// use lc3_mini::sim::mem::MemArray;
///
/// let mut mem = MemArray::new(&mut ()); // never should have to initialize mem
/// mem[0x3100] = 0x424F;
/// assert_eq!(mem[0x3100], 0x424F);
/// ```
#[derive(Debug, Clone)]
pub struct MemArray(Box<[i16; N]>);

impl MemArray {
    /// Creates a new memory, filling every cell with the provided filler.
    pub fn new(filler: &mut impl CellFiller) -> Self {
        let data = std::iter::repeat_with(|| filler.generate())
            .take(N)
            .collect::<Box<_>>()
            .try_into()
            .unwrap_or_else(|_| unreachable!("iterator should have had {N} elements"));

        Self(data)
    }

    /// Exposes the memory as a slice of cells.
    pub fn as_slice(&self) -> &[i16] {
        &*self.0
    }

    /// Exposes the memory as a mutable slice of cells.
    pub fn as_slice_mut(&mut self) -> &mut [i16] {
        &mut *self.0
    }
}
impl std::ops::Index<u16> for MemArray {
    type Output = i16;

    fn index(&self, addr: u16) -> &Self::Output {
        &self.0[usize::from(addr)]
    }
}
impl std::ops::IndexMut<u16> for MemArray {
    fn index_mut(&mut self, addr: u16) -> &mut Self::Output {
        &mut self.0[usize::from(addr)]
    }
}

/// The register file.
///
/// This struct can be indexed with a [`Reg`]
/// (which can be constructed using the [`crate::ast::reg_consts`] module or via [`Reg::try_from`]).
///
/// # Example
///
/// ```
/// use lc3_mini::sim::mem::RegFile;
/// use lc3_mini::ast::reg_consts::R0;
///
/// let mut reg = RegFile::new(&mut ()); // never should have to initialize a reg file
/// reg[R0] = 11;
/// assert_eq!(reg[R0], 11);
/// ```
#[derive(Debug, Clone)]
pub struct RegFile([i16; 8]);

impl RegFile {
    /// Creates a register file, filling every register with the provided filler.
    pub fn new(filler: &mut impl CellFiller) -> Self {
        Self(std::array::from_fn(|_| filler.generate()))
    }
}
impl std::ops::Index<Reg> for RegFile {
    type Output = i16;

    fn index(&self, index: Reg) -> &Self::Output {
        &self.0[usize::from(index)]
    }
}
impl std::ops::IndexMut<Reg> for RegFile {
    fn index_mut(&mut self, index: Reg) -> &mut Self::Output {
        &mut self.0[usize::from(index)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::reg_consts::{R0, R7};

    #[test]
    fn zeroed_is_default() {
        let mut filler = MachineInitStrategy::default().generator();
        let mem = MemArray::new(&mut filler);
        let reg = RegFile::new(&mut filler);

        assert!(mem.as_slice().iter().all(|&c| c == 0));
        assert_eq!(reg[R0], 0);
        assert_eq!(reg[R7], 0);
    }

    #[test]
    fn known_fill() {
        let mut filler = MachineInitStrategy::Known { value: -77 }.generator();
        let mem = MemArray::new(&mut filler);

        assert_eq!(mem[0x0000], -77);
        assert_eq!(mem[0xFFFF], -77);
    }

    #[test]
    fn seeded_fill_is_deterministic() {
        let strat = MachineInitStrategy::Seeded { seed: 0x2110 };
        let a = MemArray::new(&mut strat.generator());
        let b = MemArray::new(&mut strat.generator());

        assert_eq!(a.as_slice(), b.as_slice());
    }
}
