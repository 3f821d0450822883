#![allow(dead_code)]

use std::sync::{Arc, Once};

use pdkind_engine::{EngineError, PdkindOptions, SolverPool, TransitionSystem};
use pdkind_smt::backends::z3_backend::{Z3Error, Z3Solver};
use pdkind_smt::model::Model;
use pdkind_smt::solver::{FormulaClass, GeneralizeDirection, SatResult, SmtSolver, SolverFeature};
use pdkind_smt::sorts::SmtSort;
use pdkind_smt::terms::SmtTerm;
use tracing_subscriber::EnvFilter;

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

pub type Z3Factory = fn() -> Result<Z3Solver, Z3Error>;

pub fn z3() -> Result<Z3Solver, Z3Error> {
    Ok(Z3Solver::new())
}

pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

pub fn x() -> SmtTerm {
    SmtTerm::var("x")
}

pub fn x_next() -> SmtTerm {
    SmtTerm::var("x'")
}

/// `x := 0; x' = x + 1` over the integers.
pub fn counter() -> Result<Arc<TransitionSystem>, EngineError> {
    Ok(Arc::new(TransitionSystem::new(
        vec![("x".into(), SmtSort::Int)],
        vec![],
        x().eq(SmtTerm::int(0)),
        x_next().eq(x().add(SmtTerm::int(1))),
    )?))
}

/// `x, y := 0, 0; x' = x + 1; y' = y`.
pub fn counter_with_frozen() -> Result<Arc<TransitionSystem>, EngineError> {
    let y = SmtTerm::var("y");
    Ok(Arc::new(TransitionSystem::new(
        vec![("x".into(), SmtSort::Int), ("y".into(), SmtSort::Int)],
        vec![],
        SmtTerm::and(vec![x().eq(SmtTerm::int(0)), y.clone().eq(SmtTerm::int(0))]),
        SmtTerm::and(vec![
            x_next().eq(x().add(SmtTerm::int(1))),
            SmtTerm::var("y'").eq(y),
        ]),
    )?))
}

pub fn pool(options: PdkindOptions) -> Result<SolverPool<Z3Factory>, EngineError> {
    init_tracing();
    Ok(SolverPool::new(counter()?, z3 as Z3Factory, options))
}

pub fn frozen_pool(options: PdkindOptions) -> Result<SolverPool<Z3Factory>, EngineError> {
    init_tracing();
    Ok(SolverPool::new(counter_with_frozen()?, z3 as Z3Factory, options))
}

/// Satisfiability of the conjunction of `terms` over integer `vars`.
pub fn z3_check(vars: &[&str], terms: &[SmtTerm]) -> Result<SatResult, Z3Error> {
    let mut solver = Z3Solver::new();
    for var in vars {
        solver.declare_var(var, &SmtSort::Int, FormulaClass::A)?;
    }
    for term in terms {
        solver.assert(term, FormulaClass::A)?;
    }
    solver.check_sat()
}

/// A Z3 solver that claims not to interpolate.
pub struct NoInterpolation(pub Z3Solver);

impl SmtSolver for NoInterpolation {
    type Error = Z3Error;

    fn declare_var(&mut self, name: &str, sort: &SmtSort, class: FormulaClass) -> Result<(), Z3Error> {
        self.0.declare_var(name, sort, class)
    }

    fn assert(&mut self, term: &SmtTerm, class: FormulaClass) -> Result<(), Z3Error> {
        self.0.assert(term, class)
    }

    fn push(&mut self) -> Result<(), Z3Error> {
        self.0.push()
    }

    fn pop(&mut self) -> Result<(), Z3Error> {
        self.0.pop()
    }

    fn check_sat(&mut self) -> Result<SatResult, Z3Error> {
        self.0.check_sat()
    }

    fn get_model(&mut self) -> Result<Model, Z3Error> {
        self.0.get_model()
    }

    fn generalize(
        &mut self,
        direction: GeneralizeDirection,
        model: Option<&Model>,
    ) -> Result<Vec<SmtTerm>, Z3Error> {
        self.0.generalize(direction, model)
    }

    fn interpolate(&mut self) -> Result<SmtTerm, Z3Error> {
        self.0.interpolate()
    }

    fn supports(&self, feature: SolverFeature) -> bool {
        feature != SolverFeature::Interpolation && self.0.supports(feature)
    }

    fn reset(&mut self) -> Result<(), Z3Error> {
        self.0.reset()
    }
}
