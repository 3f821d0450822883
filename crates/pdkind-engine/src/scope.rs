//! Scoped solver transactions.

use pdkind_smt::solver::SmtSolver;
use tracing::warn;

use crate::error::EngineError;

/// Run `f` inside a fresh scope of `solver`, popping on every exit path.
/// A pop failure is reported only when `f` itself succeeded.
pub fn with_scope<S, T, F>(solver: &mut S, f: F) -> Result<T, EngineError>
where
    S: SmtSolver,
    F: FnOnce(&mut S) -> Result<T, EngineError>,
{
    solver.push().map_err(EngineError::solver)?;
    let result = f(solver);
    let pop_result = solver.pop().map_err(EngineError::solver);
    match (result, pop_result) {
        (Ok(value), Ok(())) => Ok(value),
        (Err(err), Ok(())) => Err(err),
        (Ok(_), Err(pop_err)) => Err(pop_err),
        (Err(err), Err(pop_err)) => {
            warn!(error = %pop_err, "failed to pop solver scope");
            Err(err)
        }
    }
}
