//! Induction obligations and frame minimization.

use std::cmp::Ordering;

use pdkind_smt::solver::{FormulaClass, SmtSolver};
use pdkind_smt::terms::SmtTerm;
use tracing::debug;

use crate::backend::SolverFactory;
use crate::error::EngineError;
use crate::pool::SolverPool;
use crate::quickxplain::{check, quickxplain, ExplainTarget};
use crate::scope::with_scope;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObligationOrigin {
    /// A conjunct of the property being proved. Never dropped.
    Property,
    /// A learned lemma.
    Derived,
}

/// A candidate lemma of an induction frame.
#[derive(Debug, Clone, PartialEq)]
pub struct InductionObligation {
    /// The lemma in its next-state strengthening form.
    pub forward: SmtTerm,
    pub origin: ObligationOrigin,
    /// Higher is better.
    pub quality: f64,
}

impl InductionObligation {
    pub fn property(forward: SmtTerm) -> Self {
        Self {
            forward,
            origin: ObligationOrigin::Property,
            quality: 0.0,
        }
    }

    pub fn derived(forward: SmtTerm, quality: f64) -> Self {
        Self {
            forward,
            origin: ObligationOrigin::Derived,
            quality,
        }
    }

    pub fn is_protected(&self) -> bool {
        self.origin == ObligationOrigin::Property
    }
}

/// Obligations against the minimization solver: a derived obligation is
/// kept unless the obligations asserted so far already imply it.
struct FrameTarget<'a, S> {
    solver: &'a mut S,
}

impl<S: SmtSolver> ExplainTarget<InductionObligation> for FrameTarget<'_, S> {
    type Saved = ();

    fn enter(&mut self) -> Result<((), bool), EngineError> {
        Ok(((), false))
    }

    fn leave(&mut self, _saved: ()) {}

    fn push(&mut self) -> Result<(), EngineError> {
        self.solver.push().map_err(EngineError::solver)
    }

    fn pop(&mut self) -> Result<(), EngineError> {
        self.solver.pop().map_err(EngineError::solver)
    }

    fn assume(&mut self, element: &InductionObligation) -> Result<(), EngineError> {
        self.solver
            .assert(&element.forward, FormulaClass::A)
            .map_err(EngineError::solver)
    }

    fn keep_last(&mut self, element: &InductionObligation) -> Result<bool, EngineError> {
        if element.is_protected() {
            return Ok(true);
        }
        let negated = element.forward.mk_not();
        with_scope(self.solver, |solver| {
            solver
                .assert(&negated, FormulaClass::A)
                .map_err(EngineError::solver)?;
            Ok(!check(solver, "frame minimization")?.is_unsat())
        })
    }
}

fn minimize_obligations<S: SmtSolver>(
    solver: &mut S,
    frame: &[InductionObligation],
) -> Result<Vec<InductionObligation>, EngineError> {
    with_scope(solver, |solver| quickxplain(&mut FrameTarget { solver }, frame))
}

impl<F: SolverFactory> SolverPool<F> {
    /// Drop derived obligations implied by the rest of `frame`.
    ///
    /// Obligations are ordered by ascending quality first (stable), so the
    /// best ones are considered last and are the most likely to survive.
    pub fn minimize_frame(&mut self, frame: &mut Vec<InductionObligation>) -> Result<(), EngineError> {
        self.minimize_frame_by(frame, |a, b| a.quality.total_cmp(&b.quality))
    }

    /// [`Self::minimize_frame`] with a caller-supplied ordering.
    pub fn minimize_frame_by<C>(
        &mut self,
        frame: &mut Vec<InductionObligation>,
        compare: C,
    ) -> Result<(), EngineError>
    where
        C: FnMut(&InductionObligation, &InductionObligation) -> Ordering,
    {
        frame.sort_by(compare);
        let solver = self.minimization_solver()?;
        let kept = minimize_obligations(solver, frame)?;
        debug!(old_size = frame.len(), new_size = kept.len(), "minimized frame");
        *frame = kept;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdkind_smt::backends::z3_backend::Z3Solver;
    use pdkind_smt::sorts::SmtSort;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn solver() -> Result<Z3Solver, Box<dyn std::error::Error>> {
        let mut solver = Z3Solver::new();
        solver.declare_var("x", &SmtSort::Int, FormulaClass::A)?;
        Ok(solver)
    }

    fn x_ge(n: i64) -> SmtTerm {
        SmtTerm::var("x").ge(SmtTerm::int(n))
    }

    #[test]
    fn implied_derived_obligation_is_dropped() -> TestResult {
        let mut solver = solver()?;
        let frame = vec![
            InductionObligation::derived(x_ge(0), 0.1),
            InductionObligation::derived(x_ge(1), 0.9),
        ];
        let kept = minimize_obligations(&mut solver, &frame)?;
        assert_eq!(kept, vec![InductionObligation::derived(x_ge(1), 0.9)]);
        Ok(())
    }

    #[test]
    fn property_obligations_survive_even_when_implied() -> TestResult {
        let mut solver = solver()?;
        let frame = vec![
            InductionObligation::property(x_ge(0)),
            InductionObligation::derived(x_ge(1), 0.9),
        ];
        let kept = minimize_obligations(&mut solver, &frame)?;
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().any(InductionObligation::is_protected));
        Ok(())
    }

    #[test]
    fn independent_obligations_are_all_kept() -> TestResult {
        let mut solver = solver()?;
        solver.declare_var("y", &SmtSort::Int, FormulaClass::A)?;
        let frame = vec![
            InductionObligation::derived(x_ge(0), 0.5),
            InductionObligation::derived(SmtTerm::var("y").ge(SmtTerm::int(0)), 0.5),
        ];
        let kept = minimize_obligations(&mut solver, &frame)?;
        assert_eq!(kept.len(), 2);
        assert_eq!(solver.check_sat()?, pdkind_smt::solver::SatResult::Sat);
        Ok(())
    }

    #[test]
    fn empty_frame_stays_empty() -> TestResult {
        let mut solver = solver()?;
        assert!(minimize_obligations(&mut solver, &[])?.is_empty());
        Ok(())
    }
}
