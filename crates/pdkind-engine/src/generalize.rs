//! Backward generalization of satisfiable queries.
//!
//! Every pool solver declares the base state variables in class `A`, so a
//! backward generalization is already expressed over the base names and can
//! be handed back to the caller as is.

use std::collections::BTreeSet;

use pdkind_smt::model::Model;
use pdkind_smt::solver::{FormulaClass, GeneralizeDirection, SmtSolver};
use pdkind_smt::sorts::SmtSort;
use pdkind_smt::terms::{SmtTerm, SortEnv};
use tracing::debug;

use crate::backend::SolverFactory;
use crate::error::EngineError;
use crate::pool::SolverPool;
use crate::quickxplain::quickxplain_generalization;
use crate::scope::with_scope;

/// Generalize the last satisfying assignment of `solver`.
///
/// With a `minimizer`, the result is shrunk to a locally minimal set of
/// conjuncts that still implies the full generalization.
pub fn generalize_sat<S: SmtSolver>(
    solver: &mut S,
    minimizer: Option<&mut S>,
) -> Result<SmtTerm, EngineError> {
    let facts = solver
        .generalize(GeneralizeDirection::Backward, None)
        .map_err(EngineError::solver)?;
    finish(facts, minimizer)
}

/// Like [`generalize_sat`], but from a model the caller already holds.
pub fn generalize_sat_model<S: SmtSolver>(
    solver: &mut S,
    model: &Model,
    minimizer: Option<&mut S>,
) -> Result<SmtTerm, EngineError> {
    let facts = solver
        .generalize(GeneralizeDirection::Backward, Some(model))
        .map_err(EngineError::solver)?;
    finish(facts, minimizer)
}

fn finish<S: SmtSolver>(
    facts: Vec<SmtTerm>,
    minimizer: Option<&mut S>,
) -> Result<SmtTerm, EngineError> {
    let Some(minimizer) = minimizer else {
        return Ok(SmtTerm::mk_and(facts));
    };
    let negated = SmtTerm::mk_and(facts.clone()).mk_not();
    let conjuncts: Vec<SmtTerm> = facts
        .iter()
        .flat_map(SmtTerm::conjuncts)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let minimized = with_scope(minimizer, |solver| {
        solver
            .assert(&negated, FormulaClass::A)
            .map_err(EngineError::solver)?;
        quickxplain_generalization(solver, &conjuncts)
    })?;
    debug!(
        old_size = conjuncts.len(),
        new_size = minimized.len(),
        "minimized generalization"
    );
    Ok(SmtTerm::mk_and(minimized))
}

/// Split real-sorted equalities into a pair of non-strict inequalities.
///
/// Applies to `g` itself and to the immediate children of a top-level
/// conjunction. Everything else is returned unchanged.
pub fn eq_to_ineq(g: &SmtTerm, env: &SortEnv) -> SmtTerm {
    match g {
        SmtTerm::And(children) => SmtTerm::And(
            children
                .iter()
                .map(|child| split_real_eq(child, env).unwrap_or_else(|| child.clone()))
                .collect(),
        ),
        _ => split_real_eq(g, env).unwrap_or_else(|| g.clone()),
    }
}

fn split_real_eq(g: &SmtTerm, env: &SortEnv) -> Option<SmtTerm> {
    match g {
        SmtTerm::Eq(lhs, rhs)
            if lhs.sort_in(env) == Some(SmtSort::Real) || rhs.sort_in(env) == Some(SmtSort::Real) =>
        {
            Some(SmtTerm::And(vec![
                SmtTerm::Le(lhs.clone(), rhs.clone()),
                SmtTerm::Ge(lhs.clone(), rhs.clone()),
            ]))
        }
        _ => None,
    }
}

impl<F: SolverFactory> SolverPool<F> {
    /// [`eq_to_ineq`] against the sorts of this pool's system.
    pub fn eq_to_ineq(&self, g: &SmtTerm) -> SmtTerm {
        eq_to_ineq(g, &self.system.sort_env())
    }
}
