//! Interpolation-based forward learning.

use std::collections::BTreeSet;

use pdkind_smt::solver::{FormulaClass, SmtSolver, SolverFeature};
use pdkind_smt::terms::SmtTerm;
use tracing::debug;

use crate::backend::SolverFactory;
use crate::error::EngineError;
use crate::pool::{build_initial, frame_solver, get_or_build, SolverPool};
use crate::quickxplain::{check, quickxplain, PairedTarget};
use crate::scope::with_scope;
use crate::system::TransitionSystem;

/// Assert `goal` as `B`, require unsatisfiability and return the interpolant.
fn interpolate_against<S: SmtSolver>(
    solver: &mut S,
    goal: &SmtTerm,
    name: &str,
) -> Result<SmtTerm, EngineError> {
    with_scope(solver, |solver| {
        solver.assert(goal, FormulaClass::B).map_err(EngineError::solver)?;
        let result = check(solver, &format!("interpolation on the {name} solver"))?;
        if !result.is_unsat() {
            return Err(EngineError::InterpolationInvariant {
                solver: name.to_string(),
            });
        }
        solver.interpolate().map_err(EngineError::solver)
    })
}

fn sorted(terms: impl IntoIterator<Item = SmtTerm>) -> Vec<SmtTerm> {
    terms.into_iter().collect::<BTreeSet<_>>().into_iter().collect()
}

impl<F: SolverFactory> SolverPool<F> {
    /// A lemma for frame `k` that excludes `g`, a formula over the current
    /// state that is unreachable in one step from frame `k - 1` and is not an
    /// initial state.
    ///
    /// Without interpolation support the lemma is just `¬g`.
    pub fn learn_forward(&mut self, k: usize, g: &SmtTerm) -> Result<SmtTerm, EngineError> {
        debug!(frame = k, goal = %g, "learning forward");
        let minimize = self.options.minimize_interpolants;
        let Self {
            factory,
            system,
            size,
            initial,
            reachability,
            ..
        } = self;
        let system: &TransitionSystem = system;

        let initial_solver = get_or_build(initial, || build_initial(factory, system))?;
        if !initial_solver.supports(SolverFeature::Interpolation) {
            return Ok(g.mk_not());
        }
        let mut transition_solver = match k.checked_sub(1) {
            Some(previous) => Some(frame_solver(reachability, factory, system, previous, *size)?),
            None => None,
        };

        let g = if minimize {
            let conjuncts = sorted(g.conjuncts());
            let kept = quickxplain(
                &mut PairedTarget::new(
                    false,
                    Some(&mut *initial_solver),
                    transition_solver.as_deref_mut(),
                    system,
                ),
                &conjuncts,
            )?;
            debug!(old_size = conjuncts.len(), new_size = kept.len(), "minimized goal");
            SmtTerm::mk_and(kept)
        } else {
            g.clone()
        };

        let initial_itp = interpolate_against(&mut *initial_solver, &g, "initial-state")?;
        debug!(interpolant = %initial_itp, "initial-state interpolant");

        let transition_itp = match transition_solver.as_deref_mut() {
            Some(solver) => {
                let itp = interpolate_against(solver, &system.to_next(&g), "transition")?;
                let itp = system.to_current(&itp);
                debug!(interpolant = %itp, "transition interpolant");
                Some(itp)
            }
            None => None,
        };

        let learned = if minimize {
            let disjuncts = sorted(
                initial_itp
                    .disjuncts()
                    .into_iter()
                    .chain(transition_itp.iter().flat_map(SmtTerm::disjuncts)),
            );
            let kept = quickxplain(
                &mut PairedTarget::new(
                    true,
                    Some(initial_solver),
                    transition_solver,
                    system,
                ),
                &disjuncts,
            )?;
            debug!(old_size = disjuncts.len(), new_size = kept.len(), "minimized lemma");
            SmtTerm::mk_or(kept)
        } else {
            match transition_itp {
                Some(itp) => SmtTerm::mk_or(vec![itp, initial_itp]),
                None => initial_itp,
            }
        };
        debug!(frame = k, lemma = %learned, "learned forward lemma");
        Ok(learned)
    }
}
