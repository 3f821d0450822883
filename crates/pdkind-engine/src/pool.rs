//! Ownership and lifecycle of every solver instance used by PDKIND.
//!
//! Solvers are built lazily on first use and bind variables to interpolation
//! classes as follows:
//!
//! | solver          | CURRENT | NEXT | INPUT | preloaded                  |
//! |-----------------|---------|------|-------|----------------------------|
//! | initial         | A       |      |       | init (A)                   |
//! | reachability k  | A       | B    | T     | trans (T), init (A) if k=0 |
//! | shared          | A       | B    | T     | trans (T)                  |
//! | minimization    | A       |      |       |                            |
//!
//! The induction pair is built explicitly by
//! [`SolverPool::reset_induction_solver`].

use std::collections::BTreeSet;
use std::sync::Arc;

use pdkind_smt::solver::{FormulaClass, SmtSolver};
use pdkind_smt::terms::SmtTerm;
use tracing::{debug, info};

use crate::backend::SolverFactory;
use crate::config::PdkindOptions;
use crate::error::EngineError;
use crate::system::TransitionSystem;
use crate::trace::TraceHelper;

/// Content of one reachability frame, as tracked by the caller.
pub type FormulaSet = BTreeSet<SmtTerm>;

/// Where an induction fact goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InductionAssertion {
    /// Copy 0 of the unrolling (class `A`).
    First,
    /// Every copy strictly between 0 and the depth (class `T`).
    Intermediate,
}

/// The reachability solvers. The variant is fixed at construction.
pub(crate) enum Reachability<S> {
    Shared(Option<S>),
    PerFrame(Vec<S>),
}

/// Induction solver and its generalizer, sharing one unrolling.
pub(crate) struct InductionPair<S> {
    pub(crate) solver: S,
    pub(crate) generalizer: S,
    pub(crate) depth: usize,
}

pub struct SolverPool<F: SolverFactory> {
    pub(crate) factory: F,
    pub(crate) system: Arc<TransitionSystem>,
    pub(crate) trace: TraceHelper,
    pub(crate) options: PdkindOptions,
    pub(crate) size: usize,
    pub(crate) initial: Option<F::Solver>,
    pub(crate) reachability: Reachability<F::Solver>,
    pub(crate) induction: Option<InductionPair<F::Solver>>,
    pub(crate) minimization: Option<F::Solver>,
}

/// Take the solver in `slot`, building it first if needed.
pub(crate) fn get_or_build<S>(
    slot: &mut Option<S>,
    build: impl FnOnce() -> Result<S, EngineError>,
) -> Result<&mut S, EngineError> {
    let solver = match slot.take() {
        Some(solver) => solver,
        None => build()?,
    };
    Ok(slot.insert(solver))
}

pub(crate) fn build_initial<F: SolverFactory>(
    factory: &F,
    system: &TransitionSystem,
) -> Result<F::Solver, EngineError> {
    let mut solver = factory.create()?;
    solver
        .declare_vars(system.state_vars(), FormulaClass::A)
        .map_err(EngineError::solver)?;
    solver
        .assert(system.initial_states(), FormulaClass::A)
        .map_err(EngineError::solver)?;
    Ok(solver)
}

pub(crate) fn build_transition<F: SolverFactory>(
    factory: &F,
    system: &TransitionSystem,
    with_initial_states: bool,
) -> Result<F::Solver, EngineError> {
    let mut solver = factory.create()?;
    solver
        .declare_vars(system.state_vars(), FormulaClass::A)
        .map_err(EngineError::solver)?;
    solver
        .declare_vars(system.next_vars(), FormulaClass::B)
        .map_err(EngineError::solver)?;
    solver
        .declare_vars(system.input_vars(), FormulaClass::T)
        .map_err(EngineError::solver)?;
    solver
        .assert(system.transition_relation(), FormulaClass::T)
        .map_err(EngineError::solver)?;
    if with_initial_states {
        solver
            .assert(system.initial_states(), FormulaClass::A)
            .map_err(EngineError::solver)?;
    }
    Ok(solver)
}

pub(crate) fn build_minimization<F: SolverFactory>(
    factory: &F,
    system: &TransitionSystem,
) -> Result<F::Solver, EngineError> {
    let mut solver = factory.create()?;
    solver
        .declare_vars(system.state_vars(), FormulaClass::A)
        .map_err(EngineError::solver)?;
    Ok(solver)
}

/// The solver answering transition queries out of frame `k`.
pub(crate) fn frame_solver<'a, F: SolverFactory>(
    reachability: &'a mut Reachability<F::Solver>,
    factory: &F,
    system: &TransitionSystem,
    k: usize,
    size: usize,
) -> Result<&'a mut F::Solver, EngineError> {
    if k >= size {
        return Err(EngineError::FrameOutOfRange { frame: k, size });
    }
    match reachability {
        Reachability::Shared(slot) => get_or_build(slot, || build_transition(factory, system, false)),
        Reachability::PerFrame(solvers) => {
            while solvers.len() <= k {
                let with_init = solvers.is_empty();
                solvers.push(build_transition(factory, system, with_init)?);
            }
            solvers
                .get_mut(k)
                .ok_or(EngineError::FrameOutOfRange { frame: k, size })
        }
    }
}

fn build_induction_pair<F: SolverFactory>(
    factory: &F,
    trace: &TraceHelper,
    system: &TransitionSystem,
    depth: usize,
) -> Result<InductionPair<F::Solver>, EngineError> {
    let mut pair = InductionPair {
        solver: factory.create()?,
        generalizer: factory.create()?,
        depth,
    };
    for solver in [&mut pair.solver, &mut pair.generalizer] {
        for k in 0..=depth {
            let (vars, class) = if k == 0 {
                (system.state_vars().to_vec(), FormulaClass::A)
            } else if k < depth {
                (trace.state_variables(k), FormulaClass::T)
            } else {
                (trace.state_variables(k), FormulaClass::B)
            };
            solver.declare_vars(&vars, class).map_err(EngineError::solver)?;
            if k > 0 {
                solver
                    .declare_vars(&trace.input_variables(k - 1), FormulaClass::T)
                    .map_err(EngineError::solver)?;
                solver
                    .assert(&trace.transition_formula(k - 1), FormulaClass::T)
                    .map_err(EngineError::solver)?;
            }
        }
    }
    Ok(pair)
}

fn check_deadlock<S: SmtSolver>(
    solver: &mut S,
    deadlock: impl FnOnce() -> EngineError,
) -> Result<(), EngineError> {
    let result = solver.check_sat().map_err(EngineError::solver)?;
    if result.is_sat() {
        Ok(())
    } else {
        Err(deadlock())
    }
}

impl<F: SolverFactory> SolverPool<F> {
    pub fn new(system: Arc<TransitionSystem>, factory: F, options: PdkindOptions) -> Self {
        let reachability = if options.single_solver {
            Reachability::Shared(None)
        } else {
            Reachability::PerFrame(Vec::new())
        };
        Self {
            factory,
            trace: TraceHelper::new(Arc::clone(&system)),
            system,
            options,
            size: 0,
            initial: None,
            reachability,
            induction: None,
            minimization: None,
        }
    }

    pub fn options(&self) -> &PdkindOptions {
        &self.options
    }

    pub fn system(&self) -> &TransitionSystem {
        &self.system
    }

    pub fn trace(&self) -> &TraceHelper {
        &self.trace
    }

    /// Number of reachability frames.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn new_reachability_frame(&mut self) {
        self.size += 1;
    }

    /// Depth of the current induction unrolling, if one has been built.
    pub fn induction_depth(&self) -> Option<usize> {
        self.induction.as_ref().map(|pair| pair.depth)
    }

    pub fn initial_solver(&mut self) -> Result<&mut F::Solver, EngineError> {
        let Self {
            factory,
            system,
            initial,
            ..
        } = self;
        get_or_build(initial, || build_initial(factory, system))
    }

    /// The solver holding frame `k`, or the shared solver in single-solver
    /// mode.
    ///
    /// Per-frame, the frame-0 solver also holds the initial states and every
    /// other frame holds only its own lemmas. The shared solver never holds
    /// the initial states and holds the lemmas of all frames at once, so its
    /// answers for frame 0 and for the lower frames can be weaker or
    /// stronger than the per-frame ones.
    pub fn reachability_solver(&mut self, k: usize) -> Result<&mut F::Solver, EngineError> {
        let Self {
            factory,
            system,
            reachability,
            size,
            ..
        } = self;
        frame_solver(reachability, factory, system, k, *size)
    }

    pub fn minimization_solver(&mut self) -> Result<&mut F::Solver, EngineError> {
        let Self {
            factory,
            system,
            minimization,
            ..
        } = self;
        get_or_build(minimization, || build_minimization(factory, system))
    }

    /// Add a lemma to frame `k >= 1`.
    pub fn add_to_reachability_solver(&mut self, k: usize, f: &SmtTerm) -> Result<(), EngineError> {
        if k == 0 {
            return Err(EngineError::InitialFrameLocked);
        }
        let check = self.options.check_deadlock;
        let solver = self.reachability_solver(k)?;
        solver.assert(f, FormulaClass::A).map_err(EngineError::solver)?;
        debug!(frame = k, lemma = %f, "added reachability lemma");
        if check {
            check_deadlock(solver, || EngineError::ReachabilityDeadlock { frame: k })?;
        }
        Ok(())
    }

    /// Tear down every solver and replay `frames` through
    /// [`Self::add_to_reachability_solver`], in ascending frame order.
    pub fn reset(&mut self, frames: &[FormulaSet]) -> Result<(), EngineError> {
        info!(frames = frames.len(), "pdkind: restarting solvers");
        if frames.len() != self.size {
            return Err(EngineError::FrameCountMismatch {
                frames: frames.len(),
                size: self.size,
            });
        }
        if frames.first().is_some_and(|frame| !frame.is_empty()) {
            return Err(EngineError::InitialFrameLocked);
        }

        self.reachability = match self.reachability {
            Reachability::Shared(_) => Reachability::Shared(None),
            Reachability::PerFrame(_) => Reachability::PerFrame(Vec::new()),
        };
        self.initial = None;
        self.induction = None;
        self.minimization = None;

        for (k, frame) in frames.iter().enumerate().skip(1) {
            for f in frame {
                self.add_to_reachability_solver(k, f)?;
            }
        }
        Ok(())
    }

    /// Forward a garbage-collection pass to every solver that exists.
    pub fn gc(&mut self) -> Result<(), EngineError> {
        let reachability: Vec<&mut F::Solver> = match &mut self.reachability {
            Reachability::Shared(slot) => slot.iter_mut().collect(),
            Reachability::PerFrame(solvers) => solvers.iter_mut().collect(),
        };
        let induction = self
            .induction
            .iter_mut()
            .flat_map(|pair| [&mut pair.solver, &mut pair.generalizer]);
        for solver in reachability
            .into_iter()
            .chain(self.initial.iter_mut())
            .chain(induction)
            .chain(self.minimization.iter_mut())
        {
            solver.gc().map_err(EngineError::solver)?;
        }
        Ok(())
    }

    /// Discard the induction pair and rebuild it for `depth`.
    pub fn reset_induction_solver(&mut self, depth: usize) -> Result<(), EngineError> {
        info!(depth, "pdkind: building induction solver");
        self.induction = None;
        self.induction = Some(build_induction_pair(
            &self.factory,
            &self.trace,
            &self.system,
            depth,
        )?);
        Ok(())
    }

    /// Add a fact to the induction solver. The generalizer does not see it.
    pub fn add_to_induction_solver(
        &mut self,
        f: &SmtTerm,
        kind: InductionAssertion,
    ) -> Result<(), EngineError> {
        let check = self.options.check_deadlock;
        let Self {
            induction, trace, ..
        } = self;
        let pair = induction.as_mut().ok_or(EngineError::InductionNotBuilt)?;
        match kind {
            InductionAssertion::First => pair
                .solver
                .assert(f, FormulaClass::A)
                .map_err(EngineError::solver)?,
            InductionAssertion::Intermediate => {
                for k in 1..pair.depth {
                    pair.solver
                        .assert(&trace.state_formula(f, k), FormulaClass::T)
                        .map_err(EngineError::solver)?;
                }
            }
        }
        if check {
            let depth = pair.depth;
            check_deadlock(&mut pair.solver, || EngineError::InductionDeadlock { depth })?;
        }
        Ok(())
    }
}
