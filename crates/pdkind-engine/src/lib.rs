#![doc = include_str!("../README.md")]

pub mod backend;
pub mod config;
pub mod error;
pub mod generalize;
pub mod learn;
pub mod obligation;
pub mod pool;
pub mod query;
pub mod quickxplain;
pub mod scope;
pub mod system;
pub mod trace;

pub use backend::{BackendFactory, BackendSolver, SolverFactory};
pub use config::{PdkindOptions, SolverChoice};
pub use error::EngineError;
pub use obligation::{InductionObligation, ObligationOrigin};
pub use pool::{FormulaSet, InductionAssertion, SolverPool};
pub use query::QueryResult;
pub use system::TransitionSystem;
