//! Frame bookkeeping, reset, deadlock checks and scoped transactions.

mod common;

use std::collections::BTreeSet;

use common::*;
use pdkind_engine::scope::with_scope;
use pdkind_engine::{EngineError, FormulaSet, InductionAssertion, PdkindOptions};
use pdkind_smt::solver::{FormulaClass, SatResult, SmtSolver};
use pdkind_smt::terms::SmtTerm;

fn frames(content: &[&[SmtTerm]]) -> Vec<FormulaSet> {
    content
        .iter()
        .map(|frame| frame.iter().cloned().collect::<BTreeSet<_>>())
        .collect()
}

fn ge(n: i64) -> SmtTerm {
    x().ge(SmtTerm::int(n))
}

#[test]
fn frames_grow_one_at_a_time() -> TestResult {
    let mut pool = pool(PdkindOptions::default())?;
    assert_eq!(pool.size(), 0);
    assert!(matches!(
        pool.reachability_solver(0),
        Err(EngineError::FrameOutOfRange { frame: 0, size: 0 })
    ));
    pool.new_reachability_frame();
    pool.new_reachability_frame();
    assert_eq!(pool.size(), 2);
    pool.reachability_solver(1)?;
    Ok(())
}

#[test]
fn frame_zero_only_holds_initial_states() -> TestResult {
    let mut pool = pool(PdkindOptions::default())?;
    pool.new_reachability_frame();
    pool.new_reachability_frame();
    let err = pool.add_to_reachability_solver(0, &ge(0)).err();
    assert!(matches!(err, Some(EngineError::InitialFrameLocked)));

    let err = pool.reset(&frames(&[&[ge(0)], &[]])).err();
    assert!(matches!(err, Some(EngineError::InitialFrameLocked)));
    Ok(())
}

#[test]
fn reset_rejects_wrong_frame_count() -> TestResult {
    let mut pool = pool(PdkindOptions::default())?;
    pool.new_reachability_frame();
    let err = pool.reset(&frames(&[&[], &[]])).err();
    match err {
        Some(err @ EngineError::FrameCountMismatch { frames: 2, size: 1 }) => {
            assert!(err.is_precondition());
        }
        other => panic!("expected a frame count mismatch, got {other:?}"),
    }
    Ok(())
}

#[test]
fn reset_replays_frame_content() -> TestResult {
    let content = frames(&[&[], &[ge(0)], &[ge(1)]]);
    let queries = [
        (1, x_next().lt(SmtTerm::int(1))),
        (1, x_next().eq(SmtTerm::int(4))),
        (2, x_next().lt(SmtTerm::int(2))),
        (2, x_next().eq(SmtTerm::int(2))),
    ];

    let mut pool = pool(PdkindOptions::default())?;
    for _ in 0..content.len() {
        pool.new_reachability_frame();
    }
    for (k, frame) in content.iter().enumerate().skip(1) {
        for f in frame {
            pool.add_to_reachability_solver(k, f)?;
        }
    }

    let mut before = Vec::new();
    for (k, q) in &queries {
        before.push(pool.query_with_transition_at(*k, q, FormulaClass::B)?.result);
    }
    assert_eq!(
        before,
        vec![SatResult::Unsat, SatResult::Sat, SatResult::Unsat, SatResult::Sat]
    );

    pool.reset(&content)?;
    let mut after = Vec::new();
    for (k, q) in &queries {
        after.push(pool.query_with_transition_at(*k, q, FormulaClass::B)?.result);
    }
    assert_eq!(before, after);

    for (k, frame) in content.iter().enumerate() {
        let conjunction = SmtTerm::mk_and(frame.iter().cloned().collect());
        let result = pool.query_with_transition_at(k, &conjunction, FormulaClass::A)?;
        assert!(result.is_sat(), "frame {k} content is satisfiable");
    }
    Ok(())
}

#[test]
fn shared_and_per_frame_solvers_agree() -> TestResult {
    let content = frames(&[&[], &[ge(0)]]);
    let queries = [
        x_next().eq(SmtTerm::int(0)),
        x_next().eq(SmtTerm::int(3)),
        x_next().lt(SmtTerm::int(0)),
        x_next().ge(SmtTerm::int(1)),
    ];

    let mut answers = Vec::new();
    for single_solver in [false, true] {
        let mut pool = pool(PdkindOptions {
            single_solver,
            ..PdkindOptions::default()
        })?;
        pool.new_reachability_frame();
        pool.new_reachability_frame();
        pool.reset(&content)?;
        let mut results = Vec::new();
        for q in &queries {
            results.push(pool.query_with_transition_at(1, q, FormulaClass::B)?.result);
        }
        answers.push(results);
    }
    assert_eq!(answers[0], answers[1]);
    assert_eq!(
        answers[0],
        vec![SatResult::Unsat, SatResult::Sat, SatResult::Unsat, SatResult::Sat]
    );
    Ok(())
}

/// Answers of the per-frame pool, then of the single-solver pool.
fn answers_by_mode(
    content: &[FormulaSet],
    queries: &[(usize, SmtTerm)],
) -> Result<Vec<Vec<SatResult>>, EngineError> {
    let mut answers = Vec::new();
    for single_solver in [false, true] {
        let mut pool = pool(PdkindOptions {
            single_solver,
            ..PdkindOptions::default()
        })?;
        for _ in content {
            pool.new_reachability_frame();
        }
        pool.reset(content)?;
        let mut results = Vec::new();
        for (k, q) in queries {
            results.push(pool.query_with_transition_at(*k, q, FormulaClass::B)?.result);
        }
        answers.push(results);
    }
    Ok(answers)
}

#[test]
fn only_the_per_frame_solver_sees_the_initial_states() -> TestResult {
    let content = frames(&[&[]]);
    let queries = [
        (0, x_next().eq(SmtTerm::int(5))),
        (0, x_next().eq(SmtTerm::int(1))),
    ];
    let answers = answers_by_mode(&content, &queries)?;
    assert_eq!(answers[0], vec![SatResult::Unsat, SatResult::Sat]);
    assert_eq!(answers[1], vec![SatResult::Sat, SatResult::Sat]);
    Ok(())
}

#[test]
fn the_shared_solver_sees_lemmas_of_every_frame() -> TestResult {
    let content = frames(&[&[], &[ge(0)], &[ge(1)]]);
    let queries = [
        (0, x_next().eq(SmtTerm::int(5))),
        (1, x_next().eq(SmtTerm::int(1))),
        (2, x_next().eq(SmtTerm::int(2))),
        (2, x_next().eq(SmtTerm::int(1))),
    ];
    let answers = answers_by_mode(&content, &queries)?;
    assert_eq!(
        answers[0],
        vec![SatResult::Unsat, SatResult::Sat, SatResult::Sat, SatResult::Unsat]
    );
    assert_eq!(
        answers[1],
        vec![SatResult::Sat, SatResult::Unsat, SatResult::Sat, SatResult::Unsat]
    );
    Ok(())
}

#[test]
fn deadlock_check_reports_the_frame() -> TestResult {
    let mut pool = pool(PdkindOptions {
        check_deadlock: true,
        ..PdkindOptions::default()
    })?;
    pool.new_reachability_frame();
    pool.new_reachability_frame();
    pool.add_to_reachability_solver(1, &x().lt(SmtTerm::int(0)))?;
    let err = pool.add_to_reachability_solver(1, &x().gt(SmtTerm::int(0))).err();
    assert!(matches!(err, Some(EngineError::ReachabilityDeadlock { frame: 1 })));
    Ok(())
}

#[test]
fn deadlocks_go_unnoticed_without_the_check() -> TestResult {
    let mut pool = pool(PdkindOptions::default())?;
    pool.new_reachability_frame();
    pool.new_reachability_frame();
    pool.add_to_reachability_solver(1, &x().lt(SmtTerm::int(0)))?;
    pool.add_to_reachability_solver(1, &x().gt(SmtTerm::int(0)))?;
    let result = pool.query_with_transition_at(1, &SmtTerm::bool(true), FormulaClass::A)?;
    assert!(result.is_unsat());
    Ok(())
}

#[test]
fn induction_deadlock_reports_the_depth() -> TestResult {
    let mut pool = pool(PdkindOptions {
        check_deadlock: true,
        ..PdkindOptions::default()
    })?;
    pool.reset_induction_solver(2)?;
    assert_eq!(pool.induction_depth(), Some(2));
    pool.add_to_induction_solver(&ge(0), InductionAssertion::Intermediate)?;
    let err = pool
        .add_to_induction_solver(&x().lt(SmtTerm::int(-5)), InductionAssertion::First)
        .err();
    assert!(matches!(err, Some(EngineError::InductionDeadlock { depth: 2 })));
    Ok(())
}

#[test]
fn induction_facts_require_a_built_solver() -> TestResult {
    let mut pool = pool(PdkindOptions::default())?;
    assert_eq!(pool.induction_depth(), None);
    let err = pool.add_to_induction_solver(&ge(0), InductionAssertion::First).err();
    assert!(matches!(err, Some(EngineError::InductionNotBuilt)));
    let err = pool.check_inductive(&ge(0)).err();
    assert!(matches!(err, Some(EngineError::InductionNotBuilt)));
    Ok(())
}

#[test]
fn gc_skips_solvers_that_were_never_built() -> TestResult {
    let mut pool = pool(PdkindOptions::default())?;
    pool.gc()?;
    pool.new_reachability_frame();
    pool.reachability_solver(0)?;
    pool.reset_induction_solver(1)?;
    pool.gc()?;
    Ok(())
}

#[test]
fn nested_scopes_pop_in_order() -> TestResult {
    let mut pool = pool(PdkindOptions::default())?;
    let solver = pool.initial_solver()?;
    assert_eq!(solver.check_sat()?, SatResult::Sat);
    let inner = with_scope(&mut *solver, |outer| {
        outer
            .assert(&x().ge(SmtTerm::int(0)), FormulaClass::A)
            .map_err(EngineError::solver)?;
        let inner = with_scope(outer, |inner| {
            inner
                .assert(&x().eq(SmtTerm::int(5)), FormulaClass::A)
                .map_err(EngineError::solver)?;
            inner.check_sat().map_err(EngineError::solver)
        })?;
        assert_eq!(outer.check_sat().map_err(EngineError::solver)?, SatResult::Sat);
        Ok(inner)
    })?;
    assert_eq!(inner, SatResult::Unsat);
    assert_eq!(solver.check_sat()?, SatResult::Sat);
    Ok(())
}

#[test]
fn with_scope_pops_on_error() -> TestResult {
    let mut pool = pool(PdkindOptions::default())?;
    let solver = pool.initial_solver()?;
    let result: Result<(), EngineError> = with_scope(&mut *solver, |solver| {
        solver
            .assert(&x().eq(SmtTerm::int(5)), FormulaClass::A)
            .map_err(EngineError::solver)?;
        Err(EngineError::InductionNotBuilt)
    });
    assert!(matches!(result, Err(EngineError::InductionNotBuilt)));
    assert_eq!(solver.check_sat()?, SatResult::Sat);
    Ok(())
}
