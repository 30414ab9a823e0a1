//! A miniature interpreter for a subset of the LC-3 educational assembly language.
//!
//! This crate pairs a typed program builder with a small fetch-execute
//! engine. Programs are sequences of [`ast::Instr`] values indexed from 0,
//! alongside a symbol table mapping label names to 16-bit values. A label is
//! deliberately kind-blind: the same table entry can serve as a branch
//! target, a memory address, or a plain constant, and the instruction that
//! resolves it decides which.
//!
//! # Usage
//!
//! To run a program, it must first be built:
//! ```
//! use lc3_mini::asm::{Program, ProgramBuilder};
//! use lc3_mini::ast::reg_consts::R0;
//!
//! let mut builder = ProgramBuilder::new();
//! builder.and_imm(R0, R0, 0).unwrap();
//! builder.add_imm(R0, R0, 7).unwrap();
//! builder.halt().unwrap();
//!
//! let program: Program = builder.finish();
//! ```
//!
//! Once a program has been built, it can be executed with the simulator:
//! ```
//! # use lc3_mini::asm::ProgramBuilder;
//! # use lc3_mini::ast::reg_consts::R0;
//! #
//! # let mut builder = ProgramBuilder::new();
//! # builder.and_imm(R0, R0, 0).unwrap();
//! # builder.add_imm(R0, R0, 7).unwrap();
//! # builder.halt().unwrap();
//! # let program = builder.finish();
//! #
//! use lc3_mini::sim::Simulator;
//!
//! let mut simulator = Simulator::new(Default::default());
//! simulator.load_program(&program);
//! simulator.run().unwrap(); // <-- Result can be handled accordingly
//!
//! assert_eq!(simulator.reg_file[R0], 7);
//! ```
//!
//! There is no other I/O: a program receives its inputs through memory cells
//! seeded before the run (via the simulator's `mem` field) and delivers its
//! outputs through memory cells or registers inspected after the halt.
//!
//! If more granularity is needed for simulation, there are also step-in and
//! run-with-limit functions. See the [`sim`] module for more details.
#![warn(missing_docs)]

pub mod ast;
pub mod asm;
pub mod sim;
pub mod err;
