//! Components representing instructions and their operands.
//!
//! The main type here is [`Instr`], the closed set of instruction forms the
//! interpreter understands. Its operands are built out of:
//! - [`Reg`]: a register index (0-7),
//! - [`Imm5`]: a 5-bit signed immediate value,
//! - [`ImmOrReg`]: the second source operand of `ADD`/`AND`,
//! - [`Condition`]: the condition set of a `BR` instruction.
//!
//! Operands are validated when they are constructed, so every [`Instr`]
//! value holds well-formed operands. Label operands are plain strings;
//! they are resolved against the program's symbol table at execution time,
//! not when the instruction is created.

use std::fmt::Write as _;

/// A register. Must be between 0 and 7.
///
/// This `Reg` struct can either be constructed by selecting a register from
/// [`reg_consts`], or by using [`Reg::try_from`].
///
/// ## Examples
///
/// ```text
/// AND R0, R0, #0
///     ~~  ~~
/// ADD R1, R1, R0
///     ~~  ~~  ~~
/// LD R2, VALUE
///    ~~
/// NOT R1, R2
///     ~~  ~~
/// ```
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct Reg(pub(crate) u8);

/// Register constants!
pub mod reg_consts {
    use super::Reg;

    /// The 0th register in the register file.
    pub const R0: Reg = Reg(0);
    /// The 1st register in the register file.
    pub const R1: Reg = Reg(1);
    /// The 2nd register in the register file.
    pub const R2: Reg = Reg(2);
    /// The 3rd register in the register file.
    pub const R3: Reg = Reg(3);
    /// The 4th register in the register file.
    pub const R4: Reg = Reg(4);
    /// The 5th register in the register file.
    pub const R5: Reg = Reg(5);
    /// The 6th register in the register file.
    pub const R6: Reg = Reg(6);
    /// The 7th register in the register file.
    pub const R7: Reg = Reg(7);
}

impl Reg {
    /// Gets the register number of this [`Reg`]. This is always between 0 and 7.
    pub fn reg_no(self) -> u8 {
        self.0
    }
}
impl std::fmt::Display for Reg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "R{}", self.0)
    }
}
impl From<Reg> for usize {
    // Used for indexing the reg file in [`sim::mem::RegFile`].
    fn from(value: Reg) -> Self {
        usize::from(value.0)
    }
}
impl TryFrom<u8> for Reg {
    type Error = InvalidReg;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0..=7 => Ok(Reg(value)),
            _     => Err(InvalidReg(value)),
        }
    }
}

/// The error from trying to convert an out-of-range value into a [`Reg`].
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct InvalidReg(
    /// The rejected value.
    pub u8
);

impl std::fmt::Display for InvalidReg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} is not a register number", self.0)
    }
}
impl std::error::Error for InvalidReg {}
impl crate::err::Error for InvalidReg {
    fn help(&self) -> Option<std::borrow::Cow<'_, str>> {
        Some("register numbers range over [0, 7]".into())
    }
}

/// A 5-bit signed immediate value (the `imm5` operand of `ADD` and `AND`).
///
/// This must fall within [-16, 15] and is verified at construction,
/// so a held `Imm5` is always in range.
///
/// ## Examples
///
/// ```text
/// AND R0, R0, #0
///             ~~
/// ADD R1, R1, #-5
///             ~~~
/// ```
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct Imm5(i16);

impl Imm5 {
    /// The smallest representable immediate value.
    pub const MIN: i16 = -16;
    /// The largest representable immediate value.
    pub const MAX: i16 = 15;

    /// Creates a new immediate value.
    /// This must fit within 5 bits of the representation, otherwise an error is raised.
    ///
    /// # Examples
    ///
    /// ```
    /// # use lc3_mini::ast::Imm5;
    /// #
    /// assert!(Imm5::new(-16).is_ok());
    /// assert!(Imm5::new(15).is_ok());
    /// assert!(Imm5::new(16).is_err());
    /// assert!(Imm5::new(-17).is_err());
    /// ```
    pub fn new(n: i16) -> Result<Self, ImmRangeErr> {
        match (Self::MIN..=Self::MAX).contains(&n) {
            true  => Ok(Imm5(n)),
            false => Err(ImmRangeErr(n)),
        }
    }

    /// Gets the value of the immediate.
    pub fn get(self) -> i16 {
        self.0
    }
}
impl std::fmt::Display for Imm5 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_char('#')?;
        self.0.fmt(f)
    }
}
impl TryFrom<i16> for Imm5 {
    type Error = ImmRangeErr;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        Imm5::new(value)
    }
}

/// The error from trying to construct an [`Imm5`] out of its range.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct ImmRangeErr(
    /// The rejected value.
    pub i16
);

impl std::fmt::Display for ImmRangeErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "value #{} is too big for a signed 5-bit immediate", self.0)
    }
}
impl std::error::Error for ImmRangeErr {}
impl crate::err::Error for ImmRangeErr {
    fn help(&self) -> Option<std::borrow::Cow<'_, str>> {
        Some(format!("the range for a signed 5-bit immediate is [{}, {}]", Imm5::MIN, Imm5::MAX).into())
    }
}

/// A value representing either an immediate value or a register.
///
/// This is used to handle cases where an operand can be either
/// an immediate value or a register (e.g., in `AND` or `ADD`).
///
/// ## Examples
/// ```text
/// AND R0, R0, #0
/// AND R1, R1, R1
/// ADD R2, R2, #2
/// ADD R3, R3, R3
///             ^^
/// ```
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum ImmOrReg {
    #[allow(missing_docs)]
    Imm(Imm5),
    #[allow(missing_docs)]
    Reg(Reg),
}
impl std::fmt::Display for ImmOrReg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImmOrReg::Imm(imm) => imm.fmt(f),
            ImmOrReg::Reg(reg) => reg.fmt(f),
        }
    }
}

/// A condition set (used for `BR`).
///
/// A branch fires if the sign of the condition flag is a member of the
/// instruction's condition set, queried with [`Condition::satisfied_by`].
/// The eight forms and their sets are listed below:
///
/// | instruction   | set            |
/// |---------------|----------------|
/// | `BR`          | always taken   |
/// | `BRn`         | `{n}`          |
/// | `BRz`         | `{z}`          |
/// | `BRp`         | `{p}`          |
/// | `BRnz`        | `{n, z}`       |
/// | `BRzp`        | `{z, p}`       |
/// | `BRnp`        | `{n, p}`       |
/// | `BRnzp`       | `{n, z, p}`    |
///
/// `BR` and `BRnzp` are distinct forms with identical behavior: the flag's
/// sign is always exactly one of `n`, `z`, `p`, so the full set always matches.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum Condition {
    /// Unconditional branch (`BR`).
    Always,
    /// Branch if the flag is negative (`BRn`).
    N,
    /// Branch if the flag is zero (`BRz`).
    Z,
    /// Branch if the flag is positive (`BRp`).
    P,
    /// Branch if the flag is negative or zero (`BRnz`).
    Nz,
    /// Branch if the flag is zero or positive (`BRzp`).
    Zp,
    /// Branch if the flag is negative or positive (`BRnp`).
    Np,
    /// Branch if the flag is negative, zero, or positive (`BRnzp`).
    Nzp,
}

impl Condition {
    /// The condition set as an `nzp` bit mask (`n` = bit 2, `z` = bit 1, `p` = bit 0).
    pub fn mask(self) -> u8 {
        match self {
            Condition::Always => 0b111,
            Condition::N      => 0b100,
            Condition::Z      => 0b010,
            Condition::P      => 0b001,
            Condition::Nz     => 0b110,
            Condition::Zp     => 0b011,
            Condition::Np     => 0b101,
            Condition::Nzp    => 0b111,
        }
    }

    /// Tests whether a branch with this condition set fires for the given flag value.
    ///
    /// # Examples
    ///
    /// ```
    /// # use lc3_mini::ast::Condition;
    /// #
    /// assert!(Condition::N.satisfied_by(-19));
    /// assert!(!Condition::N.satisfied_by(0));
    /// assert!(Condition::Zp.satisfied_by(0));
    /// assert!(Condition::Always.satisfied_by(77));
    /// ```
    pub fn satisfied_by(self, flag: i16) -> bool {
        let sign = match flag.cmp(&0) {
            std::cmp::Ordering::Less    => 0b100,
            std::cmp::Ordering::Equal   => 0b010,
            std::cmp::Ordering::Greater => 0b001,
        };

        self.mask() & sign != 0
    }

    fn suffix(self) -> &'static str {
        match self {
            Condition::Always => "",
            Condition::N      => "n",
            Condition::Z      => "z",
            Condition::P      => "p",
            Condition::Nz     => "nz",
            Condition::Zp     => "zp",
            Condition::Np     => "np",
            Condition::Nzp    => "nzp",
        }
    }
}

/// The trap vector that halts the machine (`TRAP x25`).
pub const HALT_VECT: u8 = 0x25;

/// An instruction.
///
/// This is the closed set of instruction forms the interpreter understands;
/// an instruction is immutable once created. Label operands stay symbolic
/// here and are resolved through the program's symbol table when the
/// instruction executes.
///
/// Note two deliberate departures from the full LC-3 ISA:
/// - [`Instr::Ld`] loads the label's table value itself, and [`Instr::St`]
///   writes back into the table entry. Only the indirect forms touch memory.
/// - There is no base+offset (`LDR`/`STR`) addressing form.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub enum Instr {
    /// `ADD DR, SR1, SR2` or `ADD DR, SR1, imm5`.
    ///
    /// Adds the two sources (wrapping on overflow), stores into `DR`,
    /// and sets the condition flag to the result.
    Add(Reg, Reg, ImmOrReg),

    /// `AND DR, SR1, SR2` or `AND DR, SR1, imm5`.
    ///
    /// Bitwise ANDs the two sources, stores into `DR`,
    /// and sets the condition flag to the result.
    And(Reg, Reg, ImmOrReg),

    /// `NOT DR, SR`.
    ///
    /// Stores the bitwise complement of `SR` into `DR`
    /// and sets the condition flag to the result.
    Not(Reg, Reg),

    /// `BR*` (e.g. `BRnz LABEL`).
    ///
    /// If the condition set matches the flag's sign, execution jumps to the
    /// instruction index the label resolves to; otherwise it falls through.
    Br(Condition, String),

    /// `LD DR, LABEL`.
    ///
    /// Loads the label's resolved table value directly into `DR` (no memory
    /// access) and sets the condition flag to it.
    Ld(Reg, String),

    /// `LDI DR, LABEL`.
    ///
    /// Loads `mem[resolve(LABEL)]` into `DR` and sets the condition flag to it.
    Ldi(Reg, String),

    /// `ST SR, LABEL`.
    ///
    /// Writes `SR` into the symbol table entry for the label.
    /// The flag is unchanged.
    St(Reg, String),

    /// `STI SR, LABEL`.
    ///
    /// Writes `SR` into `mem[resolve(LABEL)]`. The flag is unchanged.
    Sti(Reg, String),

    /// `TRAP vect8`.
    ///
    /// Only [`HALT_VECT`] is meaningful; it stops the machine.
    /// The builder rejects every other vector.
    Trap(u8),
}

impl std::fmt::Display for Instr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Instr::Add(dr, sr1, sr2)  => write!(f, "ADD {dr}, {sr1}, {sr2}"),
            Instr::And(dr, sr1, sr2)  => write!(f, "AND {dr}, {sr1}, {sr2}"),
            Instr::Not(dr, sr)        => write!(f, "NOT {dr}, {sr}"),
            Instr::Br(cond, label)    => write!(f, "BR{} {label}", cond.suffix()),
            Instr::Ld(dr, label)      => write!(f, "LD {dr}, {label}"),
            Instr::Ldi(dr, label)     => write!(f, "LDI {dr}, {label}"),
            Instr::St(sr, label)      => write!(f, "ST {sr}, {label}"),
            Instr::Sti(sr, label)     => write!(f, "STI {sr}, {label}"),
            Instr::Trap(vect)         => write!(f, "TRAP x{vect:02X}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::reg_consts::{R3, R5};

    #[test]
    fn imm5_bounds() {
        assert_eq!(Imm5::new(0).unwrap().get(), 0);
        assert_eq!(Imm5::new(-16).unwrap().get(), -16);
        assert_eq!(Imm5::new(15).unwrap().get(), 15);
        assert_eq!(Imm5::new(16), Err(ImmRangeErr(16)));
        assert_eq!(Imm5::new(-17), Err(ImmRangeErr(-17)));
    }

    #[test]
    fn reg_try_from() {
        assert_eq!(Reg::try_from(5), Ok(R5));
        assert_eq!(Reg::try_from(8), Err(InvalidReg(8)));
    }

    #[test]
    fn condition_masks_are_nzp() {
        assert_eq!(Condition::N.mask(),   0b100);
        assert_eq!(Condition::Z.mask(),   0b010);
        assert_eq!(Condition::P.mask(),   0b001);
        assert_eq!(Condition::Nz.mask(),  0b110);
        assert_eq!(Condition::Zp.mask(),  0b011);
        assert_eq!(Condition::Np.mask(),  0b101);
        assert_eq!(Condition::Nzp.mask(), 0b111);
        assert_eq!(Condition::Always.mask(), 0b111);
    }

    #[test]
    fn instr_display() {
        let instr = Instr::Add(R3, R3, ImmOrReg::Imm(Imm5::new(-5).unwrap()));
        assert_eq!(instr.to_string(), "ADD R3, R3, #-5");

        let instr = Instr::Br(Condition::Nz, String::from("LOOP"));
        assert_eq!(instr.to_string(), "BRnz LOOP");

        let instr = Instr::Trap(HALT_VECT);
        assert_eq!(instr.to_string(), "TRAP x25");
    }
}
