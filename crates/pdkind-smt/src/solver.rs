use crate::model::Model;
use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

/// Result of a satisfiability check.
#[derive(Debug, Clone, PartialEq)]
pub enum SatResult {
    Sat,
    Unsat,
    Unknown(String),
}

impl SatResult {
    pub fn is_sat(&self) -> bool {
        matches!(self, SatResult::Sat)
    }

    pub fn is_unsat(&self) -> bool {
        matches!(self, SatResult::Unsat)
    }
}

impl std::fmt::Display for SatResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SatResult::Sat => write!(f, "sat"),
            SatResult::Unsat => write!(f, "unsat"),
            SatResult::Unknown(reason) => write!(f, "unknown ({reason})"),
        }
    }
}

/// Interpolation partition of an asserted formula or declared variable.
///
/// `A` formulas form the left side of an interpolation query, `B` formulas
/// the right side, and `T` formulas are visible to both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FormulaClass {
    A,
    B,
    T,
}

/// Optional oracle capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolverFeature {
    Interpolation,
    Generalization,
}

/// Which variables a generalization is expressed over: `Backward` keeps the
/// class `A` variables (a pre-image), `Forward` the class `B` variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeneralizeDirection {
    Backward,
    Forward,
}

/// Incremental SMT oracle consumed by the PDKIND solver layer.
pub trait SmtSolver {
    type Error: std::error::Error;

    /// Declare a new variable in the given interpolation class.
    fn declare_var(&mut self, name: &str, sort: &SmtSort, class: FormulaClass)
        -> Result<(), Self::Error>;

    /// Declare a batch of variables in one class.
    fn declare_vars(
        &mut self,
        vars: &[(String, SmtSort)],
        class: FormulaClass,
    ) -> Result<(), Self::Error> {
        for (name, sort) in vars {
            self.declare_var(name, sort, class)?;
        }
        Ok(())
    }

    /// Assert a constraint in the given interpolation class.
    fn assert(&mut self, term: &SmtTerm, class: FormulaClass) -> Result<(), Self::Error>;

    /// Push a new scope.
    fn push(&mut self) -> Result<(), Self::Error>;

    /// Pop a scope.
    fn pop(&mut self) -> Result<(), Self::Error>;

    /// Check satisfiability.
    fn check_sat(&mut self) -> Result<SatResult, Self::Error>;

    /// Model of the last check. Only valid right after a `Sat` result.
    fn get_model(&mut self) -> Result<Model, Self::Error>;

    /// Generalize the last satisfying assignment (or `model`, when given) into
    /// a list of literals whose conjunction implies satisfiability.
    fn generalize(
        &mut self,
        direction: GeneralizeDirection,
        model: Option<&Model>,
    ) -> Result<Vec<SmtTerm>, Self::Error>;

    /// Craig interpolant of the current `A`/`B` partition. Only valid right
    /// after an `Unsat` result.
    fn interpolate(&mut self) -> Result<SmtTerm, Self::Error>;

    fn supports(&self, feature: SolverFeature) -> bool;

    /// Drop internal references to terms that the caller is about to reclaim.
    fn gc(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Reset the solver state.
    fn reset(&mut self) -> Result<(), Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    struct MockSolver {
        sat_result: SatResult,
        declared: Vec<(String, FormulaClass)>,
        check_sat_calls: usize,
    }

    impl MockSolver {
        fn new(sat_result: SatResult) -> Self {
            Self {
                sat_result,
                declared: Vec::new(),
                check_sat_calls: 0,
            }
        }
    }

    impl SmtSolver for MockSolver {
        type Error = io::Error;

        fn declare_var(
            &mut self,
            name: &str,
            _sort: &SmtSort,
            class: FormulaClass,
        ) -> Result<(), Self::Error> {
            self.declared.push((name.to_string(), class));
            Ok(())
        }

        fn assert(&mut self, _term: &SmtTerm, _class: FormulaClass) -> Result<(), Self::Error> {
            Ok(())
        }

        fn push(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }

        fn pop(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }

        fn check_sat(&mut self) -> Result<SatResult, Self::Error> {
            self.check_sat_calls += 1;
            Ok(self.sat_result.clone())
        }

        fn get_model(&mut self) -> Result<Model, Self::Error> {
            Ok(Model::default())
        }

        fn generalize(
            &mut self,
            _direction: GeneralizeDirection,
            _model: Option<&Model>,
        ) -> Result<Vec<SmtTerm>, Self::Error> {
            Ok(Vec::new())
        }

        fn interpolate(&mut self) -> Result<SmtTerm, Self::Error> {
            Err(io::Error::other("interpolation not supported"))
        }

        fn supports(&self, _feature: SolverFeature) -> bool {
            false
        }

        fn reset(&mut self) -> Result<(), Self::Error> {
            self.declared.clear();
            Ok(())
        }
    }

    #[test]
    fn declare_vars_defaults_to_per_variable_declaration() {
        let mut solver = MockSolver::new(SatResult::Sat);
        let vars = vec![
            ("x".to_string(), SmtSort::Int),
            ("y".to_string(), SmtSort::Real),
        ];
        solver
            .declare_vars(&vars, FormulaClass::B)
            .expect("declaration should succeed");
        assert_eq!(
            solver.declared,
            vec![("x".to_string(), FormulaClass::B), ("y".to_string(), FormulaClass::B)]
        );
    }

    #[test]
    fn default_gc_is_a_no_op() {
        let mut solver = MockSolver::new(SatResult::Unknown("timeout".to_string()));
        solver.gc().expect("default gc should succeed");
        assert_eq!(solver.check_sat().expect("check"), SatResult::Unknown("timeout".into()));
        assert_eq!(solver.check_sat_calls, 1);
    }

    #[test]
    fn sat_result_display() {
        assert_eq!(SatResult::Sat.to_string(), "sat");
        assert_eq!(SatResult::Unknown("incomplete".into()).to_string(), "unknown (incomplete)");
    }
}
