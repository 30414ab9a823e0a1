//! Simulating and execution for assembled programs.
//!
//! This module is focused on executing fully built programs (i.e., [`Program`]).
//!
//! This module consists of:
//! - [`Simulator`]: The struct that executes built programs.
//! - [`mem`]: The module handling the data memory and the register file.
//!
//! # Usage
//!
//! To execute a program, you need to instantiate a Simulator and load a program into it:
//!
//! ```
//! use lc3_mini::asm::ProgramBuilder;
//! use lc3_mini::sim::Simulator;
//! use lc3_mini::ast::reg_consts::R0;
//!
//! let mut builder = ProgramBuilder::new();
//! builder.and_imm(R0, R0, 0).unwrap();
//! builder.add_imm(R0, R0, 7).unwrap();
//! builder.halt().unwrap();
//! let program = builder.finish();
//!
//! let mut sim = Simulator::new(Default::default());
//! sim.load_program(&program);
//! sim.run().unwrap(); // <-- Result can be handled accordingly
//!
//! assert_eq!(sim.reg_file[R0], 7);
//! ```
//!
//! ## Execution
//!
//! Beyond the basic [`Simulator::run`] (which runs until halting), there are also:
//! - [`Simulator::step_in`]: manual step-by-step simulation
//! - [`Simulator::run_while`], [`Simulator::run_with_limit`]: more advanced programmatic execution
//!
//! ```
//! use lc3_mini::asm::ProgramBuilder;
//! use lc3_mini::sim::Simulator;
//! use lc3_mini::ast::reg_consts::R0;
//!
//! let mut builder = ProgramBuilder::new();
//! builder.and_imm(R0, R0, 0).unwrap();
//! builder.add_imm(R0, R0, 1).unwrap();
//! builder.add_imm(R0, R0, 1).unwrap();
//! builder.add_imm(R0, R0, 1).unwrap();
//! builder.halt().unwrap();
//! let program = builder.finish();
//!
//! let mut sim = Simulator::new(Default::default());
//! sim.load_program(&program);
//!
//! // Running step by step:
//! sim.step_in().unwrap();
//! assert_eq!(sim.reg_file[R0], 0);
//! sim.step_in().unwrap();
//! assert_eq!(sim.reg_file[R0], 1);
//! sim.step_in().unwrap();
//! assert_eq!(sim.reg_file[R0], 2);
//! sim.step_in().unwrap();
//! assert_eq!(sim.reg_file[R0], 3);
//! ```
//!
//! ## Querying State
//!
//! You can query (or set) a variety of different state values from the simulator.
//!
//! - The current instruction index is the `sim.pc` field.
//! - The register file is the `sim.reg_file` field, indexable by [`Reg`].
//! - The condition flag is queried with [`Simulator::flag`]. Its sign is the
//!   condition a `BR` consults; there is no separate N/Z/P bit vector.
//! - The memory is the `sim.mem` field, indexable by `u16`. Callers seed
//!   input cells there before a run and read output cells after the halt:
//!
//! ```
//! use lc3_mini::asm::ProgramBuilder;
//! use lc3_mini::sim::Simulator;
//! use lc3_mini::ast::reg_consts::R0;
//!
//! let mut builder = ProgramBuilder::new();
//! builder.constant("INPUT", 0x3100);
//! builder.constant("OUTPUT", 0x3101);
//! builder.ldi(R0, "INPUT").unwrap();
//! builder.add_reg(R0, R0, R0).unwrap();
//! builder.sti(R0, "OUTPUT").unwrap();
//! builder.halt().unwrap();
//! let program = builder.finish();
//!
//! let mut sim = Simulator::new(Default::default());
//! sim.mem[0x3100] = 21;
//! sim.load_program(&program);
//! sim.run().unwrap();
//! assert_eq!(sim.mem[0x3101], 42);
//! ```
//!
//! [`Reg`]: crate::ast::Reg

pub mod mem;

use crate::asm::{Program, ProgramStore, SymbolTable};
use crate::ast::{ImmOrReg, Instr, HALT_VECT};

use self::mem::{MachineInitStrategy, MemArray, RegFile};

/// Errors that can occur during simulation.
///
/// All of these are fatal to the run: they indicate a malformed program
/// rather than a recoverable data condition, and each one identifies the
/// index of the offending instruction.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum SimErr {
    /// An instruction referenced a label absent from the symbol table.
    UnboundLabel {
        /// Index of the offending instruction.
        index: u16,
        /// The label that could not be resolved.
        label: String,
    },
    /// Execution requested an index with no instruction.
    OutOfRange {
        /// The index with no instruction.
        index: u16,
    },
    /// A trap with a vector other than the halt vector was executed.
    ///
    /// The builder rejects such instructions, so this only arises from a
    /// program store assembled by other means.
    UnsupportedTrap {
        /// Index of the offending instruction.
        index: u16,
        /// The unsupported vector.
        vect: u8,
    },
}
impl std::fmt::Display for SimErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimErr::UnboundLabel { index, label }   => write!(f, "instruction {index} references unbound label {label:?}"),
            SimErr::OutOfRange { index }            => write!(f, "no instruction at index {index}"),
            SimErr::UnsupportedTrap { index, vect } => write!(f, "instruction {index} executed unsupported trap vector x{vect:02X}"),
        }
    }
}
impl std::error::Error for SimErr {}
impl crate::err::Error for SimErr {
    fn help(&self) -> Option<std::borrow::Cow<'_, str>> {
        match self {
            SimErr::UnboundLabel { label, .. } => Some(format!("bind {label:?} with a position or constant binding before the program runs").into()),
            SimErr::OutOfRange { .. }          => Some("a well-formed program reaches a halt (TRAP x25) instead of running off the end of the store".into()),
            SimErr::UnsupportedTrap { .. }     => Some(format!("the only supported trap vector is x{HALT_VECT:02X} (halt)").into()),
        }
    }
}

/// Anything that can cause a step to abruptly finish.
enum StepBreak {
    /// A halt was executed.
    Halt,
    /// A simulation error occurred.
    Err(SimErr),
}
impl From<SimErr> for StepBreak {
    fn from(value: SimErr) -> Self {
        Self::Err(value)
    }
}

/// Reason for why execution paused if it wasn't due to an error.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
enum PauseCondition {
    /// Program reached a halt.
    Halt,
    /// Program hit a tripwire condition.
    Tripwire,
    /// Program hit an error and did not pause successfully.
    #[default]
    Unsuccessful,
}

/// Configuration flags for [`Simulator`].
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub struct SimFlags {
    /// The creation strategy for the machine's cells.
    ///
    /// This is used to initialize the `mem` and `reg_file` fields.
    ///
    /// By default, this flag is [`MachineInitStrategy::default`]
    /// (every cell starts at 0).
    pub machine_init: MachineInitStrategy,
}

/// Executes built programs.
///
/// The simulator is a step machine over the states `Running(index)` and
/// `Halted`: each step fetches the instruction at `pc`, applies its
/// semantics to the machine state, and computes the next index. The step
/// loop is iterative, so arbitrarily long-running programs cannot exhaust
/// the call stack.
#[derive(Debug)]
pub struct Simulator {
    // ------------------ SIMULATION STATE ------------------
    // Calling [`Simulator::reset`] resets these values.

    /// The simulator's memory.
    ///
    /// Note that this is held in the heap, as it is too large for the stack.
    pub mem: MemArray,

    /// The simulator's register file.
    pub reg_file: RegFile,

    /// The program counter: the index of the next instruction to execute.
    pub pc: u16,

    /// The condition flag.
    ///
    /// This holds the most recent result produced by an arithmetic or load
    /// instruction; its sign is what branch conditions consult.
    flag: i16,

    /// The loaded program store.
    store: ProgramStore,

    /// The run's symbol table.
    ///
    /// This is a copy of the loaded program's table; `ST` instructions
    /// overwrite entries here without affecting the original [`Program`].
    symbols: SymbolTable,

    /// The number of instructions successfully run since this `Simulator` was initialized.
    ///
    /// This can be set to 0 to reset the counter.
    pub instructions_run: u64,

    /// Indicates the reason why the last execution (via [`Simulator::run_while`] and adjacent)
    /// had paused.
    pause_condition: PauseCondition,

    // ------------------ CONFIG STATE ------------------
    // Calling [`Simulator::reset`] does not reset these values.

    /// Configuration settings for the simulator.
    ///
    /// These are preserved between resets.
    pub flags: SimFlags,
}

impl Simulator {
    /// Creates a new simulator with the provided flags, without a loaded program.
    pub fn new(flags: SimFlags) -> Self {
        let mut filler = flags.machine_init.generator();

        Self {
            mem: MemArray::new(&mut filler),
            reg_file: RegFile::new(&mut filler),
            pc: 0,
            flag: 0,
            store: ProgramStore::new(),
            symbols: SymbolTable::new(),
            instructions_run: 0,
            pause_condition: Default::default(),
            flags,
        }
    }

    /// Resets the simulator.
    ///
    /// This resets the state of the `Simulator` back to before any execution calls,
    /// while preserving configuration state.
    ///
    /// This also unloads the program. Any program has to be reloaded into the simulator.
    pub fn reset(&mut self) {
        *self = Simulator::new(self.flags);
    }

    /// Loads a program into this simulator and rewinds the program counter to index 0.
    ///
    /// The program's store and symbol table are cloned in: the engine's `ST`
    /// instructions overwrite entries in the simulator's copy of the table,
    /// never in the `Program` itself.
    ///
    /// Note that this does not touch the register file, memory, or flag, so
    /// memory cells seeded before this call stay seeded. Use
    /// [`Simulator::reset`] to discard state from a previous run.
    pub fn load_program(&mut self, program: &Program) {
        self.store = program.store.clone();
        self.symbols = program.symbols.clone();
        self.pc = 0;
    }

    /// Loads a program and runs it to a halt (or to a fatal error).
    ///
    /// This is the one-call form of [`Simulator::load_program`] followed by
    /// [`Simulator::run`].
    pub fn execute(&mut self, program: &Program) -> Result<(), SimErr> {
        self.load_program(program);
        self.run()
    }

    /// Reads the condition flag.
    ///
    /// This is the most recent result produced by an arithmetic or load
    /// instruction. Its sign (negative, zero, positive) is the condition
    /// that `BR` instructions test; the flag is both the value and the
    /// condition.
    pub fn flag(&self) -> i16 {
        self.flag
    }

    /// Indicates whether the last execution of the simulator resulted in a halt successfully occurring.
    pub fn hit_halt(&self) -> bool {
        matches!(self.pause_condition, PauseCondition::Halt)
    }

    /// Resolves a label against the run's symbol table,
    /// attributing a failure to the instruction at `index`.
    fn resolve_label(&self, index: u16, label: &str) -> Result<i16, SimErr> {
        self.symbols.resolve(label)
            .ok_or_else(|| SimErr::UnboundLabel { index, label: label.to_string() })
    }

    /// Simulate one step, executing one instruction.
    fn step(&mut self) -> Result<(), StepBreak> {
        let index = self.pc;
        let Some(instr) = self.store.get(index) else {
            return Err(SimErr::OutOfRange { index }.into());
        };

        // Sequential next index; branch and trap arms override this.
        self.pc = index.wrapping_add(1);

        match instr {
            Instr::Add(dr, sr1, sr2) => {
                let val1 = self.reg_file[*sr1];
                let val2 = match sr2 {
                    ImmOrReg::Imm(imm) => imm.get(),
                    ImmOrReg::Reg(r2)  => self.reg_file[*r2],
                };

                let result = val1.wrapping_add(val2);
                self.reg_file[*dr] = result;
                self.flag = result;
            },
            Instr::And(dr, sr1, sr2) => {
                let val1 = self.reg_file[*sr1];
                let val2 = match sr2 {
                    ImmOrReg::Imm(imm) => imm.get(),
                    ImmOrReg::Reg(r2)  => self.reg_file[*r2],
                };

                let result = val1 & val2;
                self.reg_file[*dr] = result;
                self.flag = result;
            },
            Instr::Not(dr, sr) => {
                let result = !self.reg_file[*sr];
                self.reg_file[*dr] = result;
                self.flag = result;
            },
            Instr::Br(cond, label) => {
                let target = self.resolve_label(index, label)? as u16;
                if cond.satisfied_by(self.flag) {
                    self.pc = target;
                }
            },
            Instr::Ld(dr, label) => {
                // LD reads the table value itself; only LDI dereferences memory.
                let val = self.resolve_label(index, label)?;
                self.reg_file[*dr] = val;
                self.flag = val;
            },
            Instr::Ldi(dr, label) => {
                let addr = self.resolve_label(index, label)? as u16;
                let val = self.mem[addr];
                self.reg_file[*dr] = val;
                self.flag = val;
            },
            Instr::St(sr, label) => {
                // Overwrites the entry through the same mapping both binding
                // forms share. The label must already be bound.
                self.resolve_label(index, label)?;
                self.symbols.bind_constant(label.clone(), self.reg_file[*sr]);
            },
            Instr::Sti(sr, label) => {
                let addr = self.resolve_label(index, label)? as u16;
                self.mem[addr] = self.reg_file[*sr];
            },
            Instr::Trap(vect) => {
                // Leave the pc on the trap itself, so running again halts again.
                self.pc = index;
                return match *vect {
                    HALT_VECT => Err(StepBreak::Halt),
                    v => Err(SimErr::UnsupportedTrap { index, vect: v }.into()),
                };
            },
        }

        self.instructions_run = self.instructions_run.wrapping_add(1);
        Ok(())
    }

    /// Runs until the tripwire condition returns false (or any of the typical breaks occur).
    ///
    /// The typical break conditions are:
    /// - a halt is executed
    /// - a fatal error occurs
    pub fn run_while(&mut self, mut tripwire: impl FnMut(&Simulator) -> bool) -> Result<(), SimErr> {
        std::mem::take(&mut self.pause_condition);

        // event loop
        // run until:
        // 1. the tripwire condition returns false
        // 2. a halt is executed
        let result = loop {
            if !tripwire(self) {
                break Ok(PauseCondition::Tripwire);
            }

            match self.step() {
                Ok(()) => {},
                Err(StepBreak::Halt)   => break Ok(PauseCondition::Halt),
                Err(StepBreak::Err(e)) => break Err(e),
            }
        };

        self.pause_condition = result?;
        Ok(())
    }

    /// Execute the program.
    ///
    /// This blocks until the program halts.
    /// If you would like to limit the maximum number of steps to execute, consider [`Simulator::run_with_limit`].
    pub fn run(&mut self) -> Result<(), SimErr> {
        self.run_while(|_| true)
    }

    /// Execute the program with a limit on how many steps to execute.
    ///
    /// This blocks until the program halts or until the number of steps to execute has been hit.
    pub fn run_with_limit(&mut self, max_steps: u64) -> Result<(), SimErr> {
        let i = self.instructions_run;
        self.run_while(|sim| sim.instructions_run.wrapping_sub(i) < max_steps)
    }

    /// Simulate one step, executing one instruction.
    ///
    /// Unlike the `run` family, a halt here is not an error condition;
    /// it simply leaves the machine on the halt instruction.
    pub fn step_in(&mut self) -> Result<(), SimErr> {
        match self.step() {
            Ok(()) => Ok(()),
            Err(StepBreak::Halt)   => Ok(()),
            Err(StepBreak::Err(e)) => Err(e),
        }
    }
}
impl Default for Simulator {
    fn default() -> Self {
        Self::new(Default::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::ProgramBuilder;
    use crate::ast::reg_consts::{R0, R1, R2};
    use crate::ast::Condition;

    fn run(program: &Program) -> Simulator {
        let mut sim = Simulator::new(Default::default());
        sim.execute(program).unwrap();
        assert!(sim.hit_halt());
        sim
    }

    #[test]
    fn add_wraps_to_signed_16_bit() {
        let mut builder = ProgramBuilder::new();
        builder.constant("BIG", i16::MAX);
        builder.ld(R1, "BIG").unwrap();
        builder.add_imm(R1, R1, 1).unwrap();
        builder.halt().unwrap();

        let sim = run(&builder.finish());
        assert_eq!(sim.reg_file[R1], i16::MIN);
        assert!(sim.flag() < 0);
    }

    #[test]
    fn add_sets_flag_to_result() {
        for value in [-7i16, 0, 12] {
            let mut builder = ProgramBuilder::new();
            builder.constant("V", value);
            builder.ld(R0, "V").unwrap();
            builder.and_imm(R1, R1, 0).unwrap();
            builder.add_reg(R1, R1, R0).unwrap();
            builder.halt().unwrap();

            let sim = run(&builder.finish());
            assert_eq!(sim.reg_file[R1], value);
            assert_eq!(sim.flag(), value);
        }
    }

    #[test]
    fn and_is_bitwise() {
        let mut builder = ProgramBuilder::new();
        builder.constant("A", 0x5AF0u16 as i16);
        builder.constant("B", 0x0FF5);
        builder.ld(R0, "A").unwrap();
        builder.ld(R1, "B").unwrap();
        builder.and_reg(R2, R0, R1).unwrap();
        builder.halt().unwrap();

        let sim = run(&builder.finish());
        assert_eq!(sim.reg_file[R2], (0x5AF0u16 & 0x0FF5) as i16);
    }

    #[test]
    fn not_is_bitwise_complement() {
        let mut builder = ProgramBuilder::new();
        builder.constant("V", 0x424F);
        builder.ld(R0, "V").unwrap();
        builder.not(R1, R0).unwrap();
        builder.halt().unwrap();

        let sim = run(&builder.finish());
        assert_eq!(sim.reg_file[R1] as u16, !0x424Fu16);
        assert_eq!(sim.flag(), sim.reg_file[R1]);
    }

    #[test]
    fn branch_condition_matrix() {
        use Condition::*;

        // (condition, taken for flag = -1, 0, +1)
        let table = [
            (Always, [true,  true,  true ]),
            (N,      [true,  false, false]),
            (Z,      [false, true,  false]),
            (P,      [false, false, true ]),
            (Nz,     [true,  true,  false]),
            (Zp,     [false, true,  true ]),
            (Np,     [true,  false, true ]),
            (Nzp,    [true,  true,  true ]),
        ];

        for (cond, expected) in table {
            for (flag, &taken) in [-1i16, 0, 1].iter().zip(&expected) {
                let mut builder = ProgramBuilder::new();
                builder.add_imm(R1, R1, *flag).unwrap();
                builder.br(cond, "TAKEN").unwrap();
                builder.halt().unwrap();
                builder.label("TAKEN");
                builder.add_imm(R2, R2, 1).unwrap();
                builder.halt().unwrap();

                let sim = run(&builder.finish());
                assert_eq!(
                    sim.reg_file[R2] == 1, taken,
                    "BR{cond:?} with flag {flag} should have {}",
                    if taken { "jumped" } else { "fallen through" },
                );
            }
        }
    }

    #[test]
    fn branches_leave_the_flag_alone() {
        let mut builder = ProgramBuilder::new();
        builder.add_imm(R0, R0, -3).unwrap();
        builder.br(Condition::N, "END").unwrap();
        builder.label("END");
        builder.halt().unwrap();

        let sim = run(&builder.finish());
        assert_eq!(sim.flag(), -3);
    }

    #[test]
    fn forward_reference_resolves() {
        let mut builder = ProgramBuilder::new();
        builder.br(Condition::Always, "SKIP").unwrap();
        builder.add_imm(R0, R0, 1).unwrap();
        builder.label("SKIP");
        builder.halt().unwrap();

        let sim = run(&builder.finish());
        assert_eq!(sim.reg_file[R0], 0);
    }

    #[test]
    fn ld_reads_the_table_not_memory() {
        let mut builder = ProgramBuilder::new();
        builder.constant("CELL", 0x3100);
        builder.ld(R0, "CELL").unwrap();
        builder.halt().unwrap();

        let mut sim = Simulator::new(Default::default());
        sim.mem[0x3100] = 999;
        sim.execute(&builder.finish()).unwrap();

        // LD produced the table value, not mem[0x3100].
        assert_eq!(sim.reg_file[R0], 0x3100);
        assert_eq!(sim.flag(), 0x3100);
    }

    #[test]
    fn st_overwrites_the_table_entry() {
        let mut builder = ProgramBuilder::new();
        builder.constant("CELL", 1234);
        builder.ld(R0, "CELL").unwrap();
        builder.add_imm(R0, R0, 1).unwrap();
        builder.st(R0, "CELL").unwrap();
        builder.ld(R1, "CELL").unwrap();
        builder.halt().unwrap();
        let program = builder.finish();

        let sim = run(&program);
        assert_eq!(sim.reg_file[R1], 1235);
        // The frozen program is untouched; only the run's copy changed.
        assert_eq!(program.symbol_table().resolve("CELL"), Some(1234));
    }

    #[test]
    fn sti_then_ldi_round_trips() {
        let mut builder = ProgramBuilder::new();
        builder.constant("SLOT", 0x4000);
        builder.add_imm(R0, R0, 9).unwrap();
        builder.sti(R0, "SLOT").unwrap();
        builder.ldi(R1, "SLOT").unwrap();
        builder.halt().unwrap();

        let sim = run(&builder.finish());
        assert_eq!(sim.reg_file[R1], sim.reg_file[R0]);
        assert_eq!(sim.mem[0x4000], 9);
    }

    #[test]
    fn unbound_label_is_fatal() {
        let mut builder = ProgramBuilder::new();
        builder.and_imm(R0, R0, 0).unwrap();
        builder.br(Condition::Always, "NOWHERE").unwrap();
        builder.halt().unwrap();

        let mut sim = Simulator::new(Default::default());
        let err = sim.execute(&builder.finish()).unwrap_err();
        assert_eq!(err, SimErr::UnboundLabel { index: 1, label: String::from("NOWHERE") });
        assert!(!sim.hit_halt());
    }

    #[test]
    fn running_off_the_end_is_out_of_range() {
        let mut builder = ProgramBuilder::new();
        builder.add_imm(R0, R0, 1).unwrap();

        let mut sim = Simulator::new(Default::default());
        let err = sim.execute(&builder.finish()).unwrap_err();
        assert_eq!(err, SimErr::OutOfRange { index: 1 });
        assert!(!sim.hit_halt());
    }

    #[test]
    fn halt_parks_the_pc_on_the_trap() {
        let mut builder = ProgramBuilder::new();
        builder.add_imm(R0, R0, 1).unwrap();
        builder.halt().unwrap();
        let program = builder.finish();

        let mut sim = Simulator::new(Default::default());
        sim.execute(&program).unwrap();
        assert_eq!(sim.pc, 1);

        // Resuming halts again without touching the machine.
        sim.run().unwrap();
        assert!(sim.hit_halt());
        assert_eq!(sim.reg_file[R0], 1);
    }

    #[test]
    fn countdown_loop_runs_iteratively() {
        let mut builder = ProgramBuilder::new();
        builder.constant("START", 30000);
        builder.ld(R1, "START").unwrap();
        builder.label("LOOP");
        builder.add_imm(R1, R1, -1).unwrap();
        builder.br(Condition::P, "LOOP").unwrap();
        builder.halt().unwrap();

        let sim = run(&builder.finish());
        assert_eq!(sim.reg_file[R1], 0);
        assert_eq!(sim.flag(), 0);
    }

    #[test]
    fn run_with_limit_stops_unhalted_loops() {
        let mut builder = ProgramBuilder::new();
        builder.label("SPIN");
        builder.br(Condition::Always, "SPIN").unwrap();

        let mut sim = Simulator::new(Default::default());
        sim.load_program(&builder.finish());
        sim.run_with_limit(100).unwrap();

        assert!(!sim.hit_halt());
        assert_eq!(sim.instructions_run, 100);
    }

    #[test]
    fn unsupported_trap_on_a_hand_built_store() {
        // The builder rejects this vector, so assemble the store directly.
        let mut store = ProgramStore::new();
        store.push(Instr::Trap(0x21)).unwrap();
        let program = Program { store, symbols: SymbolTable::new() };

        let mut sim = Simulator::new(Default::default());
        let err = sim.execute(&program).unwrap_err();
        assert_eq!(err, SimErr::UnsupportedTrap { index: 0, vect: 0x21 });
    }

    #[test]
    fn reset_preserves_flags() {
        let flags = SimFlags { machine_init: MachineInitStrategy::Known { value: 3 } };
        let mut sim = Simulator::new(flags);
        sim.pc = 40;
        sim.reset();

        assert_eq!(sim.pc, 0);
        assert_eq!(sim.flags, flags);
        assert_eq!(sim.mem[0x1234], 3);
    }
}
