//! Transactional queries against the pool solvers.
//!
//! Every query runs inside a scope of the solver it uses, so no assertion
//! made here outlives the call.

use pdkind_smt::model::Model;
use pdkind_smt::solver::{FormulaClass, SatResult, SmtSolver};
use pdkind_smt::terms::SmtTerm;
use tracing::debug;

use crate::backend::SolverFactory;
use crate::error::EngineError;
use crate::generalize::{generalize_sat, generalize_sat_model};
use crate::pool::{build_minimization, frame_solver, get_or_build, SolverPool};
use crate::quickxplain::check;
use crate::scope::with_scope;

/// Outcome of a pool query. `model` and `generalization` are only present
/// on `Sat`.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub result: SatResult,
    pub model: Option<Model>,
    pub generalization: Option<SmtTerm>,
}

impl QueryResult {
    fn unsat() -> Self {
        Self {
            result: SatResult::Unsat,
            model: None,
            generalization: None,
        }
    }

    pub fn is_sat(&self) -> bool {
        self.result.is_sat()
    }

    pub fn is_unsat(&self) -> bool {
        self.result.is_unsat()
    }
}

impl<F: SolverFactory> SolverPool<F> {
    /// Is `f` consistent with the initial states?
    pub fn query_at_init(&mut self, f: &SmtTerm) -> Result<SatResult, EngineError> {
        let solver = self.initial_solver()?;
        let result = with_scope(solver, |solver| {
            solver.assert(f, FormulaClass::A).map_err(EngineError::solver)?;
            check(solver, "initial-state query")
        })?;
        debug!(result = %result, "initial-state query");
        Ok(result)
    }

    /// Check `f` against frame `k` and one transition step.
    ///
    /// On `Sat` the result carries a generalization over the current state,
    /// and a model when models are enabled.
    ///
    /// In single-solver mode the query runs against the shared solver for
    /// every `k`, so it sees neither the initial states at frame 0 nor a
    /// per-frame view of the lemmas (see [`SolverPool::reachability_solver`]).
    pub fn query_with_transition_at(
        &mut self,
        k: usize,
        f: &SmtTerm,
        class: FormulaClass,
    ) -> Result<QueryResult, EngineError> {
        let generate_models = self.options.generate_models;
        let minimize = self.options.minimize_generalizations;
        let Self {
            factory,
            system,
            size,
            reachability,
            minimization,
            ..
        } = self;
        let solver = frame_solver(reachability, factory, system, k, *size)?;
        let minimizer = if minimize {
            Some(get_or_build(minimization, || build_minimization(factory, system))?)
        } else {
            None
        };

        with_scope(solver, |solver| {
            solver.assert(f, class).map_err(EngineError::solver)?;
            let result = check(solver, &format!("reachability query at frame {k}"))?;
            debug!(frame = k, result = %result, "reachability query");
            if !result.is_sat() {
                return Ok(QueryResult::unsat());
            }
            let model = if generate_models {
                Some(solver.get_model().map_err(EngineError::solver)?)
            } else {
                None
            };
            let generalization = generalize_sat(solver, minimizer)?;
            Ok(QueryResult {
                result,
                model,
                generalization: Some(generalization),
            })
        })
    }

    /// Can `f` be violated after `depth` steps from a state satisfying the
    /// induction hypotheses?
    pub fn check_inductive(&mut self, f: &SmtTerm) -> Result<QueryResult, EngineError> {
        let minimize = self.options.minimize_generalizations;
        let Self {
            factory,
            system,
            trace,
            induction,
            minimization,
            ..
        } = self;
        let pair = induction.as_mut().ok_or(EngineError::InductionNotBuilt)?;
        let depth = pair.depth;
        let violated = trace.state_formula(&f.mk_not(), depth);

        let model = with_scope(&mut pair.solver, |solver| {
            solver
                .assert(&violated, FormulaClass::B)
                .map_err(EngineError::solver)?;
            let result = check(solver, &format!("induction check at depth {depth}"))?;
            debug!(depth, result = %result, "induction check");
            if result.is_sat() {
                solver.get_model().map(Some).map_err(EngineError::solver)
            } else {
                Ok(None)
            }
        })?;
        let Some(model) = model else {
            return Ok(QueryResult::unsat());
        };

        let minimizer = if minimize {
            Some(get_or_build(minimization, || build_minimization(factory, system))?)
        } else {
            None
        };
        let generalization = with_scope(&mut pair.generalizer, |generalizer| {
            generalizer
                .assert(&violated, FormulaClass::B)
                .map_err(EngineError::solver)?;
            generalize_sat_model(generalizer, &model, minimizer)
        })?;
        Ok(QueryResult {
            result: SatResult::Sat,
            model: Some(model),
            generalization: Some(generalization),
        })
    }

    /// Evaluate `f` at the induction depth under `model`, without an oracle
    /// check. When it holds, the result is `Sat` and carries `model` and a
    /// generalization computed in the induction generalizer.
    pub fn check_inductive_model(
        &mut self,
        model: &Model,
        f: &SmtTerm,
    ) -> Result<QueryResult, EngineError> {
        let minimize = self.options.minimize_generalizations;
        let Self {
            factory,
            system,
            trace,
            induction,
            minimization,
            ..
        } = self;
        let pair = induction.as_mut().ok_or(EngineError::InductionNotBuilt)?;
        let at_depth = trace.state_formula(f, pair.depth);
        if !model.is_true(&at_depth) {
            return Ok(QueryResult::unsat());
        }

        let minimizer = if minimize {
            Some(get_or_build(minimization, || build_minimization(factory, system))?)
        } else {
            None
        };
        let generalization = with_scope(&mut pair.generalizer, |generalizer| {
            generalizer
                .assert(&at_depth, FormulaClass::B)
                .map_err(EngineError::solver)?;
            generalize_sat_model(generalizer, model, minimizer)
        })?;
        Ok(QueryResult {
            result: SatResult::Sat,
            model: Some(model.clone()),
            generalization: Some(generalization),
        })
    }
}
