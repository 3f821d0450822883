#![doc = include_str!("../README.md")]

//! Solver-agnostic formulas and the incremental oracle contract used by the
//! PDKIND engine, with Z3 (in-process) and cvc5 (SMT-LIB2 pipe) backends.

pub mod backends;
pub mod model;
pub mod solver;
pub mod sorts;
pub mod terms;
