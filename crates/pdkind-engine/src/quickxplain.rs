//! Divide-and-conquer minimization of element sequences (quickxplain).
//!
//! [`quickxplain`] shrinks a sequence to a locally minimal subsequence that
//! preserves a target property. What "asserting an element" and "the
//! property already holds" mean is supplied by an [`ExplainTarget`]. The
//! result depends on the input order, so callers sort their input first.

use pdkind_smt::solver::{FormulaClass, SatResult, SmtSolver};
use pdkind_smt::terms::SmtTerm;
use tracing::trace;

use crate::error::EngineError;
use crate::scope::with_scope;
use crate::system::TransitionSystem;

pub trait ExplainTarget<E> {
    /// Snapshot of the target's narrowable state, restored on [`leave`].
    ///
    /// [`leave`]: ExplainTarget::leave
    type Saved;

    /// Called on entry to every recursive step. Returns the state to restore
    /// on exit and whether the target is already met, in which case the
    /// remaining elements are not needed.
    fn enter(&mut self) -> Result<(Self::Saved, bool), EngineError>;

    fn leave(&mut self, saved: Self::Saved);

    fn push(&mut self) -> Result<(), EngineError>;

    fn pop(&mut self) -> Result<(), EngineError>;

    /// Add an element to the current scope.
    fn assume(&mut self, element: &E) -> Result<(), EngineError>;

    /// Whether a single remaining element is kept.
    fn keep_last(&mut self, element: &E) -> Result<bool, EngineError>;
}

/// Minimize `elements` against `target`.
pub fn quickxplain<E, T>(target: &mut T, elements: &[E]) -> Result<Vec<E>, EngineError>
where
    E: Clone,
    T: ExplainTarget<E>,
{
    let mut out = Vec::new();
    minimize(target, elements, &mut out)?;
    Ok(out)
}

fn minimize<E, T>(target: &mut T, elements: &[E], out: &mut Vec<E>) -> Result<(), EngineError>
where
    E: Clone,
    T: ExplainTarget<E>,
{
    trace!(size = elements.len(), kept = out.len(), "quickxplain step");
    let (saved, done) = target.enter()?;
    let result = if done || elements.is_empty() {
        Ok(())
    } else {
        split(target, elements, out)
    };
    target.leave(saved);
    result
}

fn split<E, T>(target: &mut T, elements: &[E], out: &mut Vec<E>) -> Result<(), EngineError>
where
    E: Clone,
    T: ExplainTarget<E>,
{
    if let [last] = elements {
        if target.keep_last(last)? {
            out.push(last.clone());
        }
        return Ok(());
    }

    let (first, second) = elements.split_at(elements.len() / 2);

    // Assert the first half and minimize the second.
    let kept_from = out.len();
    scoped::<E, T, _>(target, |target| {
        for element in first {
            target.assume(element)?;
        }
        minimize(target, second, out)
    })?;

    // Assert the minimized second half and minimize the first.
    let kept: Vec<E> = out[kept_from..].to_vec();
    scoped::<E, T, _>(target, |target| {
        for element in &kept {
            target.assume(element)?;
        }
        minimize(target, first, out)
    })
}

fn scoped<E, T, R>(
    target: &mut T,
    f: impl FnOnce(&mut T) -> Result<R, EngineError>,
) -> Result<R, EngineError>
where
    T: ExplainTarget<E>,
{
    target.push()?;
    let result = f(target);
    let pop_result = target.pop();
    match (result, pop_result) {
        (Ok(value), Ok(())) => Ok(value),
        (Err(err), _) => Err(err),
        (Ok(_), Err(pop_err)) => Err(pop_err),
    }
}

pub(crate) fn check<S: SmtSolver>(solver: &mut S, context: &str) -> Result<SatResult, EngineError> {
    match solver.check_sat().map_err(EngineError::solver)? {
        SatResult::Unknown(reason) => Err(EngineError::Incomplete {
            context: context.to_string(),
            reason,
        }),
        result => Ok(result),
    }
}

/// Generalization conjuncts against one solver holding the negated
/// generalization: an element is needed while the solver is still
/// satisfiable.
pub struct GeneralizationTarget<'a, S> {
    solver: &'a mut S,
}

impl<'a, S: SmtSolver> GeneralizationTarget<'a, S> {
    pub fn new(solver: &'a mut S) -> Self {
        Self { solver }
    }
}

impl<S: SmtSolver> ExplainTarget<SmtTerm> for GeneralizationTarget<'_, S> {
    type Saved = ();

    fn enter(&mut self) -> Result<((), bool), EngineError> {
        Ok(((), check(self.solver, "generalization minimization")?.is_unsat()))
    }

    fn leave(&mut self, _saved: ()) {}

    fn push(&mut self) -> Result<(), EngineError> {
        self.solver.push().map_err(EngineError::solver)
    }

    fn pop(&mut self) -> Result<(), EngineError> {
        self.solver.pop().map_err(EngineError::solver)
    }

    fn assume(&mut self, element: &SmtTerm) -> Result<(), EngineError> {
        self.solver
            .assert(element, FormulaClass::A)
            .map_err(EngineError::solver)
    }

    fn keep_last(&mut self, _element: &SmtTerm) -> Result<bool, EngineError> {
        Ok(true)
    }
}

/// Interpolation inputs against the initial-state solver and, optionally, a
/// transition solver. Elements are renamed to NEXT before they reach the
/// transition solver and are negated first in `negate` mode. A solver that is
/// unsatisfiable on entry is dropped for the rest of that step.
pub struct PairedTarget<'a, S> {
    negate: bool,
    initial: Option<&'a mut S>,
    transition: Option<&'a mut S>,
    system: &'a TransitionSystem,
    initial_active: bool,
    transition_active: bool,
}

impl<'a, S: SmtSolver> PairedTarget<'a, S> {
    pub fn new(
        negate: bool,
        initial: Option<&'a mut S>,
        transition: Option<&'a mut S>,
        system: &'a TransitionSystem,
    ) -> Self {
        let initial_active = initial.is_some();
        let transition_active = transition.is_some();
        Self {
            negate,
            initial,
            transition,
            system,
            initial_active,
            transition_active,
        }
    }

    fn active(&mut self) -> impl Iterator<Item = &mut S> + '_ {
        let (initial_active, transition_active) = (self.initial_active, self.transition_active);
        let initial = self.initial.as_deref_mut().filter(|_| initial_active);
        let transition = self.transition.as_deref_mut().filter(|_| transition_active);
        initial.into_iter().chain(transition)
    }
}

impl<S: SmtSolver> ExplainTarget<SmtTerm> for PairedTarget<'_, S> {
    type Saved = (bool, bool);

    fn enter(&mut self) -> Result<((bool, bool), bool), EngineError> {
        let saved = (self.initial_active, self.transition_active);
        if self.initial_active {
            if let Some(solver) = self.initial.as_deref_mut() {
                self.initial_active = !check(solver, "interpolant minimization")?.is_unsat();
            }
        }
        if self.transition_active {
            if let Some(solver) = self.transition.as_deref_mut() {
                self.transition_active = !check(solver, "interpolant minimization")?.is_unsat();
            }
        }
        Ok((saved, !self.initial_active && !self.transition_active))
    }

    fn leave(&mut self, saved: (bool, bool)) {
        (self.initial_active, self.transition_active) = saved;
    }

    fn push(&mut self) -> Result<(), EngineError> {
        for solver in self.active() {
            solver.push().map_err(EngineError::solver)?;
        }
        Ok(())
    }

    fn pop(&mut self) -> Result<(), EngineError> {
        for solver in self.active() {
            solver.pop().map_err(EngineError::solver)?;
        }
        Ok(())
    }

    fn assume(&mut self, element: &SmtTerm) -> Result<(), EngineError> {
        let f = if self.negate {
            element.mk_not()
        } else {
            element.clone()
        };
        if self.initial_active {
            if let Some(solver) = self.initial.as_deref_mut() {
                solver.assert(&f, FormulaClass::A).map_err(EngineError::solver)?;
            }
        }
        if self.transition_active {
            if let Some(solver) = self.transition.as_deref_mut() {
                solver
                    .assert(&self.system.to_next(&f), FormulaClass::A)
                    .map_err(EngineError::solver)?;
            }
        }
        Ok(())
    }

    fn keep_last(&mut self, _element: &SmtTerm) -> Result<bool, EngineError> {
        Ok(true)
    }
}

/// Minimize generalization conjuncts in `solver`, which must already hold
/// the negated generalization.
pub fn quickxplain_generalization<S: SmtSolver>(
    solver: &mut S,
    conjuncts: &[SmtTerm],
) -> Result<Vec<SmtTerm>, EngineError> {
    with_scope(solver, |solver| {
        quickxplain(&mut GeneralizationTarget::new(solver), conjuncts)
    })
}
