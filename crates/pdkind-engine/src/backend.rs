//! Solver construction for the pool.

use pdkind_smt::backends::cvc5_backend::{Cvc5Error, Cvc5Solver};
use pdkind_smt::backends::z3_backend::{Z3Error, Z3Solver};
use pdkind_smt::model::Model;
use pdkind_smt::solver::{FormulaClass, GeneralizeDirection, SatResult, SmtSolver, SolverFeature};
use pdkind_smt::sorts::SmtSort;
use pdkind_smt::terms::SmtTerm;
use thiserror::Error;

use crate::config::SolverChoice;
use crate::error::EngineError;

/// Creates fresh, empty solver instances.
///
/// Any `Fn() -> Result<S, E>` closure is a factory.
pub trait SolverFactory {
    type Solver: SmtSolver;

    fn create(&self) -> Result<Self::Solver, EngineError>;
}

impl<S, E, F> SolverFactory for F
where
    S: SmtSolver,
    E: std::fmt::Display,
    F: Fn() -> Result<S, E>,
{
    type Solver = S;

    fn create(&self) -> Result<S, EngineError> {
        self().map_err(EngineError::solver)
    }
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error(transparent)]
    Z3(#[from] Z3Error),
    #[error(transparent)]
    Cvc5(#[from] Cvc5Error),
}

/// A solver of the backend picked at run time.
pub enum BackendSolver {
    Z3(Box<Z3Solver>),
    Cvc5(Box<Cvc5Solver>),
}

macro_rules! dispatch {
    ($self:ident, $solver:ident => $call:expr) => {
        match $self {
            BackendSolver::Z3($solver) => $call.map_err(BackendError::from),
            BackendSolver::Cvc5($solver) => $call.map_err(BackendError::from),
        }
    };
}

impl SmtSolver for BackendSolver {
    type Error = BackendError;

    fn declare_var(
        &mut self,
        name: &str,
        sort: &SmtSort,
        class: FormulaClass,
    ) -> Result<(), BackendError> {
        dispatch!(self, s => s.declare_var(name, sort, class))
    }

    fn assert(&mut self, term: &SmtTerm, class: FormulaClass) -> Result<(), BackendError> {
        dispatch!(self, s => s.assert(term, class))
    }

    fn push(&mut self) -> Result<(), BackendError> {
        dispatch!(self, s => s.push())
    }

    fn pop(&mut self) -> Result<(), BackendError> {
        dispatch!(self, s => s.pop())
    }

    fn check_sat(&mut self) -> Result<SatResult, BackendError> {
        dispatch!(self, s => s.check_sat())
    }

    fn get_model(&mut self) -> Result<Model, BackendError> {
        dispatch!(self, s => s.get_model())
    }

    fn generalize(
        &mut self,
        direction: GeneralizeDirection,
        model: Option<&Model>,
    ) -> Result<Vec<SmtTerm>, BackendError> {
        dispatch!(self, s => s.generalize(direction, model))
    }

    fn interpolate(&mut self) -> Result<SmtTerm, BackendError> {
        dispatch!(self, s => s.interpolate())
    }

    fn supports(&self, feature: SolverFeature) -> bool {
        match self {
            BackendSolver::Z3(s) => s.supports(feature),
            BackendSolver::Cvc5(s) => s.supports(feature),
        }
    }

    fn gc(&mut self) -> Result<(), BackendError> {
        dispatch!(self, s => s.gc())
    }

    fn reset(&mut self) -> Result<(), BackendError> {
        dispatch!(self, s => s.reset())
    }
}

/// Factory for the backend named by a [`SolverChoice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendFactory {
    pub choice: SolverChoice,
    pub timeout_secs: u64,
}

impl BackendFactory {
    pub fn new(choice: SolverChoice) -> Self {
        Self {
            choice,
            timeout_secs: 0,
        }
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

impl SolverFactory for BackendFactory {
    type Solver = BackendSolver;

    fn create(&self) -> Result<BackendSolver, EngineError> {
        match self.choice {
            SolverChoice::Z3 => Ok(BackendSolver::Z3(Box::new(Z3Solver::with_timeout_secs(
                self.timeout_secs,
            )))),
            SolverChoice::Cvc5 => Cvc5Solver::with_timeout_secs(self.timeout_secs)
                .map(|s| BackendSolver::Cvc5(Box::new(s)))
                .map_err(EngineError::solver),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn closures_are_factories() -> TestResult {
        let factory = || Ok::<_, Z3Error>(Z3Solver::new());
        let mut solver = factory.create()?;
        solver.declare_var("x", &SmtSort::Int, FormulaClass::A)?;
        assert_eq!(solver.check_sat()?, SatResult::Sat);
        Ok(())
    }

    #[test]
    fn backend_factory_builds_z3() -> TestResult {
        let mut solver = BackendFactory::new(SolverChoice::Z3).create()?;
        assert!(matches!(solver, BackendSolver::Z3(_)));
        solver.declare_var("x", &SmtSort::Int, FormulaClass::A)?;
        solver.assert(&SmtTerm::var("x").lt(SmtTerm::int(0)), FormulaClass::A)?;
        solver.assert(&SmtTerm::var("x").gt(SmtTerm::int(0)), FormulaClass::A)?;
        assert_eq!(solver.check_sat()?, SatResult::Unsat);
        assert!(solver.supports(SolverFeature::Interpolation));
        Ok(())
    }
}
