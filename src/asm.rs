//! Building typed instruction sequences into runnable programs.
//!
//! This module is used to assemble instructions ([`Instr`]) and label
//! bindings into a [`Program`] that can be executed by the simulator.
//!
//! The assembler module notably consists of:
//! - [`ProgramBuilder`]: the builder which appends instructions and records labels
//! - [`SymbolTable`]: a struct holding the label-to-value mapping
//! - [`Program`]: a struct holding the finished program, which can be loaded into the simulator and executed
//!
//! # Usage
//!
//! ```
//! use lc3_mini::asm::ProgramBuilder;
//! use lc3_mini::ast::reg_consts::R0;
//!
//! let mut builder = ProgramBuilder::new();
//! builder.and_imm(R0, R0, 0).unwrap();
//! builder.add_imm(R0, R0, 7).unwrap();
//! builder.halt().unwrap();
//! let program = builder.finish();
//!
//! assert_eq!(program.len(), 3);
//! ```

use std::collections::HashMap;

use crate::ast::{Condition, Imm5, ImmOrReg, ImmRangeErr, Instr, Reg, HALT_VECT};

/// Errors that can occur while building a program.
///
/// These are configuration errors: they indicate a malformed instruction and
/// are reported immediately, before the instruction enters the program store.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum AsmErr {
    /// An `ADD`/`AND` immediate operand does not fit in 5 bits.
    ImmOutOfRange(ImmRangeErr),
    /// A trap vector other than the halt vector was used.
    UnsupportedTrap(u8),
    /// The program store is full (positions are 16-bit values).
    StoreFull,
}
impl std::fmt::Display for AsmErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AsmErr::ImmOutOfRange(e)   => e.fmt(f),
            AsmErr::UnsupportedTrap(v) => write!(f, "trap vector x{v:02X} is not supported"),
            AsmErr::StoreFull          => f.write_str("program store is full"),
        }
    }
}
impl std::error::Error for AsmErr {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AsmErr::ImmOutOfRange(e) => Some(e),
            _ => None,
        }
    }
}
impl crate::err::Error for AsmErr {
    fn help(&self) -> Option<std::borrow::Cow<'_, str>> {
        match self {
            AsmErr::ImmOutOfRange(e)   => crate::err::Error::help(e),
            AsmErr::UnsupportedTrap(_) => Some(format!("the only supported trap vector is x{HALT_VECT:02X} (halt)").into()),
            AsmErr::StoreFull          => Some("a program can hold at most 65536 instructions".into()),
        }
    }
}
impl From<ImmRangeErr> for AsmErr {
    fn from(value: ImmRangeErr) -> Self {
        AsmErr::ImmOutOfRange(value)
    }
}

/// The symbol table: a mapping from label name to a 16-bit signed value.
///
/// Two producers write into the same table:
/// - [`SymbolTable::bind_position`] records an instruction index
///   (used for branch targets),
/// - [`SymbolTable::bind_constant`] records an explicit literal
///   (used for memory addresses and data).
///
/// Both forms populate the same mapping with no kind discriminant, so a label
/// used as a branch target and a label used as a data constant are
/// interchangeable in storage. The instruction that resolves a label decides
/// whether the value acts as a direct value, a memory address, or an
/// instruction index. Rebinding a name silently overwrites it.
///
/// ## Example
/// ```
/// use lc3_mini::asm::SymbolTable;
///
/// let mut sym = SymbolTable::new();
/// sym.bind_position("LOOP", 4);
/// sym.bind_constant("INPUT", 0x3100);
///
/// assert_eq!(sym.resolve("LOOP"), Some(4));
/// assert_eq!(sym.resolve("INPUT"), Some(0x3100));
/// assert_eq!(sym.resolve("ELSEWHERE"), None);
/// ```
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct SymbolTable {
    label_map: HashMap<String, i16>,
}

impl SymbolTable {
    /// Creates an empty symbol table.
    pub fn new() -> Self {
        Default::default()
    }

    /// Binds `name` to an instruction index (a position marker).
    pub fn bind_position(&mut self, name: impl Into<String>, index: u16) {
        self.label_map.insert(name.into(), index as i16);
    }

    /// Binds `name` to an explicit literal value.
    pub fn bind_constant(&mut self, name: impl Into<String>, value: i16) {
        self.label_map.insert(name.into(), value);
    }

    /// Gets the value bound to a given label (if it exists).
    pub fn resolve(&self, name: &str) -> Option<i16> {
        self.label_map.get(name).copied()
    }

    /// Checks whether a given label is bound.
    pub fn contains(&self, name: &str) -> bool {
        self.label_map.contains_key(name)
    }
}

/// The program store: an ordered mapping from instruction index to [`Instr`].
///
/// Indices are assigned sequentially starting at 0 as instructions are
/// appended; lookup by index is O(1). An index with no instruction yields
/// `None` from [`ProgramStore::get`] (the simulator turns that into its
/// out-of-range error).
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct ProgramStore(Vec<Instr>);

// Positions are 16-bit values, so the store is capped at 0x10000 entries.
const STORE_CAP: usize = 1 << 16;

impl ProgramStore {
    /// Creates an empty program store.
    pub fn new() -> Self {
        Default::default()
    }

    /// Appends an instruction at the next sequential index, returning that index.
    pub fn push(&mut self, instr: Instr) -> Result<u16, AsmErr> {
        if self.0.len() >= STORE_CAP {
            return Err(AsmErr::StoreFull);
        }

        let index = self.0.len() as u16;
        self.0.push(instr);
        Ok(index)
    }

    /// Gets the instruction at the provided index, if one exists.
    pub fn get(&self, index: u16) -> Option<&Instr> {
        self.0.get(usize::from(index))
    }

    /// The number of instructions in the store.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the store holds no instructions.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Builds a [`Program`] out of instructions and label bindings.
///
/// The builder owns the program store and symbol table it is constructing,
/// along with the monotonic instruction counter used for position labels.
/// Instructions are appended in increasing index order; labels can be bound
/// before or after the instructions that reference them (forward references
/// are legal, since the table is complete before execution starts).
///
/// The typed append methods validate their operands, so a malformed
/// instruction is rejected before it enters the store.
///
/// # Usage
///
/// The program below clears R1, then counts it up to 3:
///
/// ```
/// use lc3_mini::asm::ProgramBuilder;
/// use lc3_mini::ast::Condition;
/// use lc3_mini::ast::reg_consts::{R1, R2};
///
/// let mut builder = ProgramBuilder::new();
/// builder.and_imm(R1, R1, 0).unwrap();
/// builder.constant("NEG_LIMIT", -3);
/// builder.label("LOOP");
/// builder.add_imm(R1, R1, 1).unwrap();
/// builder.ld(R2, "NEG_LIMIT").unwrap();
/// builder.add_reg(R2, R2, R1).unwrap();
/// builder.br(Condition::N, "LOOP").unwrap();
/// builder.halt().unwrap();
///
/// let program = builder.finish();
/// assert_eq!(program.symbol_table().resolve("LOOP"), Some(1));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ProgramBuilder {
    store: ProgramStore,
    symbols: SymbolTable,
}

impl ProgramBuilder {
    /// Creates a new, empty builder.
    pub fn new() -> Self {
        Default::default()
    }

    /// Appends an instruction at the next sequential index, returning that index.
    ///
    /// The instruction is validated first: a [`Instr::Trap`] with any vector
    /// other than [`HALT_VECT`] is a configuration error. (Operand-carrying
    /// forms are already validated by their operand types.)
    pub fn append(&mut self, instr: Instr) -> Result<u16, AsmErr> {
        if let Instr::Trap(vect) = instr {
            if vect != HALT_VECT {
                return Err(AsmErr::UnsupportedTrap(vect));
            }
        }

        self.store.push(instr)
    }

    /// Binds `name` to the current instruction count, so that a branch to it
    /// lands on the next instruction appended.
    pub fn label(&mut self, name: impl Into<String>) {
        self.symbols.bind_position(name, self.store.len() as u16);
    }

    /// Binds `name` to an explicit literal value.
    pub fn constant(&mut self, name: impl Into<String>, value: i16) {
        self.symbols.bind_constant(name, value);
    }

    /// Appends `ADD DR, SR1, SR2`.
    pub fn add_reg(&mut self, dr: Reg, sr1: Reg, sr2: Reg) -> Result<u16, AsmErr> {
        self.append(Instr::Add(dr, sr1, ImmOrReg::Reg(sr2)))
    }
    /// Appends `ADD DR, SR1, imm5`, verifying the immediate fits.
    pub fn add_imm(&mut self, dr: Reg, sr1: Reg, imm: i16) -> Result<u16, AsmErr> {
        self.append(Instr::Add(dr, sr1, ImmOrReg::Imm(Imm5::new(imm)?)))
    }
    /// Appends `AND DR, SR1, SR2`.
    pub fn and_reg(&mut self, dr: Reg, sr1: Reg, sr2: Reg) -> Result<u16, AsmErr> {
        self.append(Instr::And(dr, sr1, ImmOrReg::Reg(sr2)))
    }
    /// Appends `AND DR, SR1, imm5`, verifying the immediate fits.
    pub fn and_imm(&mut self, dr: Reg, sr1: Reg, imm: i16) -> Result<u16, AsmErr> {
        self.append(Instr::And(dr, sr1, ImmOrReg::Imm(Imm5::new(imm)?)))
    }
    /// Appends `NOT DR, SR`.
    pub fn not(&mut self, dr: Reg, sr: Reg) -> Result<u16, AsmErr> {
        self.append(Instr::Not(dr, sr))
    }
    /// Appends a `BR*` with the given condition set.
    pub fn br(&mut self, cond: Condition, label: impl Into<String>) -> Result<u16, AsmErr> {
        self.append(Instr::Br(cond, label.into()))
    }
    /// Appends `LD DR, LABEL`.
    pub fn ld(&mut self, dr: Reg, label: impl Into<String>) -> Result<u16, AsmErr> {
        self.append(Instr::Ld(dr, label.into()))
    }
    /// Appends `LDI DR, LABEL`.
    pub fn ldi(&mut self, dr: Reg, label: impl Into<String>) -> Result<u16, AsmErr> {
        self.append(Instr::Ldi(dr, label.into()))
    }
    /// Appends `ST SR, LABEL`.
    pub fn st(&mut self, sr: Reg, label: impl Into<String>) -> Result<u16, AsmErr> {
        self.append(Instr::St(sr, label.into()))
    }
    /// Appends `STI SR, LABEL`.
    pub fn sti(&mut self, sr: Reg, label: impl Into<String>) -> Result<u16, AsmErr> {
        self.append(Instr::Sti(sr, label.into()))
    }
    /// Appends `TRAP x25`, the halt instruction.
    pub fn halt(&mut self) -> Result<u16, AsmErr> {
        self.append(Instr::Trap(HALT_VECT))
    }

    /// Finishes assembly, freezing the program store and symbol table.
    ///
    /// Since this consumes the builder, no instruction or label can be added
    /// once a [`Program`] exists to execute.
    pub fn finish(self) -> Program {
        let Self { store, symbols } = self;
        Program { store, symbols }
    }
}

/// A finished program: the frozen program store and symbol table.
///
/// This is produced by [`ProgramBuilder::finish`] and consumed (by reference)
/// by [`Simulator::load_program`]. The simulator clones both parts, so `ST`
/// instructions mutating the symbol table during a run never affect the
/// `Program` itself.
///
/// [`Simulator::load_program`]: crate::sim::Simulator::load_program
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Program {
    pub(crate) store: ProgramStore,
    pub(crate) symbols: SymbolTable,
}

impl Program {
    /// Gets the instruction at the provided index, if one exists.
    pub fn get(&self, index: u16) -> Option<&Instr> {
        self.store.get(index)
    }

    /// The number of instructions in the program.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Whether the program holds no instructions.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Gets the program's symbol table.
    pub fn symbol_table(&self) -> &SymbolTable {
        &self.symbols
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::reg_consts::{R0, R1};

    #[test]
    fn positions_and_constants_share_the_table() {
        let mut sym = SymbolTable::new();
        sym.bind_position("HERE", 3);
        sym.bind_constant("THERE", 3);

        // Indistinguishable once stored.
        assert_eq!(sym.resolve("HERE"), sym.resolve("THERE"));
    }

    #[test]
    fn rebinding_overwrites() {
        let mut sym = SymbolTable::new();
        sym.bind_constant("X", 10);
        sym.bind_position("X", 2);
        assert_eq!(sym.resolve("X"), Some(2));
    }

    #[test]
    fn builder_assigns_sequential_indices() {
        let mut builder = ProgramBuilder::new();
        assert_eq!(builder.and_imm(R0, R0, 0), Ok(0));
        assert_eq!(builder.add_imm(R0, R0, 1), Ok(1));
        assert_eq!(builder.halt(), Ok(2));

        let program = builder.finish();
        assert_eq!(program.len(), 3);
        assert!(program.get(2).is_some());
        assert!(program.get(3).is_none());
    }

    #[test]
    fn label_binds_current_length() {
        let mut builder = ProgramBuilder::new();
        builder.label("START");
        builder.and_imm(R1, R1, 0).unwrap();
        builder.label("AFTER");

        let program = builder.finish();
        assert_eq!(program.symbol_table().resolve("START"), Some(0));
        assert_eq!(program.symbol_table().resolve("AFTER"), Some(1));
    }

    #[test]
    fn rejects_out_of_range_immediates() {
        let mut builder = ProgramBuilder::new();
        assert!(matches!(builder.add_imm(R0, R0, 16), Err(AsmErr::ImmOutOfRange(_))));
        assert!(matches!(builder.and_imm(R0, R0, -17), Err(AsmErr::ImmOutOfRange(_))));

        // Nothing entered the store.
        assert_eq!(builder.finish().len(), 0);
    }

    #[test]
    fn rejects_unsupported_trap_vectors() {
        let mut builder = ProgramBuilder::new();
        assert_eq!(builder.append(Instr::Trap(0x21)), Err(AsmErr::UnsupportedTrap(0x21)));
        assert_eq!(builder.append(Instr::Trap(0x25)), Ok(0));
    }

    #[test]
    fn store_caps_at_u16_positions() {
        let mut store = ProgramStore::new();
        for _ in 0..(1 << 16) {
            store.push(Instr::Trap(crate::ast::HALT_VECT)).unwrap();
        }
        assert_eq!(store.push(Instr::Trap(crate::ast::HALT_VECT)), Err(AsmErr::StoreFull));
    }
}
