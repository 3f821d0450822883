use std::collections::HashMap;

use num::ToPrimitive;
use thiserror::Error;
use z3::SatResult as Z3SatResult;

use crate::backends::partition::Partition;
use crate::backends::smtlib_parser::{parse_sexp, value_from_sexp};
use crate::model::{parse_decimal, Model, ModelValue};
use crate::solver::{FormulaClass, GeneralizeDirection, SatResult, SmtSolver, SolverFeature};
use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

#[derive(Debug, Error)]
pub enum Z3Error {
    #[error("Z3 error: {0}")]
    Internal(String),
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),
    #[error("Sort mismatch: {0}")]
    SortMismatch(String),
    #[error("literal {0} does not fit a machine integer")]
    LiteralOverflow(String),
    #[error("{operation} requires the last check to be {expected}")]
    WrongState {
        operation: &'static str,
        expected: &'static str,
    },
    #[error("pop without a matching push")]
    ScopeUnderflow,
}

/// In-process Z3 oracle.
///
/// Z3 does not compute Craig interpolants itself, so [`SmtSolver::interpolate`]
/// returns the trivial interpolant derived from the recorded A/B partition.
pub struct Z3Solver {
    solver: z3::Solver,
    int_vars: HashMap<String, z3::ast::Int>,
    real_vars: HashMap<String, z3::ast::Real>,
    bool_vars: HashMap<String, z3::ast::Bool>,
    partition: Partition,
    last_result: Option<SatResult>,
    _params: Option<z3::Params>,
}

impl Z3Solver {
    pub fn new() -> Self {
        Self {
            solver: z3::Solver::new(),
            int_vars: HashMap::new(),
            real_vars: HashMap::new(),
            bool_vars: HashMap::new(),
            partition: Partition::new(),
            last_result: None,
            _params: None,
        }
    }

    pub fn with_timeout_secs(timeout_secs: u64) -> Self {
        if timeout_secs == 0 {
            return Self::new();
        }
        let mut solver = Self::new();
        let mut params = z3::Params::new();
        let timeout_ms = u32::try_from(timeout_secs.saturating_mul(1000)).unwrap_or(u32::MAX);
        params.set_u32("timeout", timeout_ms);
        solver.solver.set_params(&params);
        solver._params = Some(params);
        solver
    }

    /// The class bookkeeping of the live assertion stack.
    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    fn translate_term(&self, term: &SmtTerm) -> Result<Z3Term, Z3Error> {
        match term {
            SmtTerm::Var(name) => {
                if let Some(v) = self.int_vars.get(name) {
                    Ok(Z3Term::Int(v.clone()))
                } else if let Some(v) = self.real_vars.get(name) {
                    Ok(Z3Term::Real(v.clone()))
                } else if let Some(v) = self.bool_vars.get(name) {
                    Ok(Z3Term::Bool(v.clone()))
                } else {
                    Err(Z3Error::UnknownVariable(name.clone()))
                }
            }
            SmtTerm::IntLit(n) => Ok(Z3Term::Int(z3::ast::Int::from_i64(*n))),
            SmtTerm::RealLit(q) => {
                let numer = q
                    .numer()
                    .to_i64()
                    .ok_or_else(|| Z3Error::LiteralOverflow(q.to_string()))?;
                let denom = q
                    .denom()
                    .to_i64()
                    .ok_or_else(|| Z3Error::LiteralOverflow(q.to_string()))?;
                let numer = z3::ast::Real::from_int(&z3::ast::Int::from_i64(numer));
                let denom = z3::ast::Real::from_int(&z3::ast::Int::from_i64(denom));
                Ok(Z3Term::Real(&numer / &denom))
            }
            SmtTerm::BoolLit(b) => Ok(Z3Term::Bool(z3::ast::Bool::from_bool(*b))),
            SmtTerm::Add(lhs, rhs) => match self.numeric_pair(lhs, rhs)? {
                NumPair::Ints(l, r) => Ok(Z3Term::Int(&l + &r)),
                NumPair::Reals(l, r) => Ok(Z3Term::Real(&l + &r)),
            },
            SmtTerm::Sub(lhs, rhs) => match self.numeric_pair(lhs, rhs)? {
                NumPair::Ints(l, r) => Ok(Z3Term::Int(&l - &r)),
                NumPair::Reals(l, r) => Ok(Z3Term::Real(&l - &r)),
            },
            SmtTerm::Mul(lhs, rhs) => match self.numeric_pair(lhs, rhs)? {
                NumPair::Ints(l, r) => Ok(Z3Term::Int(&l * &r)),
                NumPair::Reals(l, r) => Ok(Z3Term::Real(&l * &r)),
            },
            SmtTerm::Eq(lhs, rhs) => {
                let l = self.translate_term(lhs)?;
                let r = self.translate_term(rhs)?;
                match (l, r) {
                    (Z3Term::Bool(lb), Z3Term::Bool(rb)) => Ok(Z3Term::Bool(lb.eq(&rb))),
                    (l, r) => match NumPair::promote(l, r)? {
                        NumPair::Ints(l, r) => Ok(Z3Term::Bool(l.eq(&r))),
                        NumPair::Reals(l, r) => Ok(Z3Term::Bool(l.eq(&r))),
                    },
                }
            }
            SmtTerm::Lt(lhs, rhs) => match self.numeric_pair(lhs, rhs)? {
                NumPair::Ints(l, r) => Ok(Z3Term::Bool(l.lt(&r))),
                NumPair::Reals(l, r) => Ok(Z3Term::Bool(l.lt(&r))),
            },
            SmtTerm::Le(lhs, rhs) => match self.numeric_pair(lhs, rhs)? {
                NumPair::Ints(l, r) => Ok(Z3Term::Bool(l.le(&r))),
                NumPair::Reals(l, r) => Ok(Z3Term::Bool(l.le(&r))),
            },
            SmtTerm::Gt(lhs, rhs) => match self.numeric_pair(lhs, rhs)? {
                NumPair::Ints(l, r) => Ok(Z3Term::Bool(l.gt(&r))),
                NumPair::Reals(l, r) => Ok(Z3Term::Bool(l.gt(&r))),
            },
            SmtTerm::Ge(lhs, rhs) => match self.numeric_pair(lhs, rhs)? {
                NumPair::Ints(l, r) => Ok(Z3Term::Bool(l.ge(&r))),
                NumPair::Reals(l, r) => Ok(Z3Term::Bool(l.ge(&r))),
            },
            SmtTerm::And(terms) => {
                let bools = self.translate_bools(terms)?;
                let refs: Vec<&z3::ast::Bool> = bools.iter().collect();
                Ok(Z3Term::Bool(z3::ast::Bool::and(&refs)))
            }
            SmtTerm::Or(terms) => {
                let bools = self.translate_bools(terms)?;
                let refs: Vec<&z3::ast::Bool> = bools.iter().collect();
                Ok(Z3Term::Bool(z3::ast::Bool::or(&refs)))
            }
            SmtTerm::Not(inner) => {
                let b = self.translate_term(inner)?.into_bool()?;
                Ok(Z3Term::Bool(b.not()))
            }
            SmtTerm::Implies(lhs, rhs) => {
                let l = self.translate_term(lhs)?.into_bool()?;
                let r = self.translate_term(rhs)?.into_bool()?;
                Ok(Z3Term::Bool(l.implies(&r)))
            }
            SmtTerm::Ite(cond, then, els) => {
                let c = self.translate_term(cond)?.into_bool()?;
                let t = self.translate_term(then)?;
                let e = self.translate_term(els)?;
                match (t, e) {
                    (Z3Term::Bool(tb), Z3Term::Bool(eb)) => Ok(Z3Term::Bool(c.ite(&tb, &eb))),
                    (t, e) => match NumPair::promote(t, e)? {
                        NumPair::Ints(ti, ei) => Ok(Z3Term::Int(c.ite(&ti, &ei))),
                        NumPair::Reals(tr, er) => Ok(Z3Term::Real(c.ite(&tr, &er))),
                    },
                }
            }
        }
    }

    fn translate_bools(&self, terms: &[SmtTerm]) -> Result<Vec<z3::ast::Bool>, Z3Error> {
        terms
            .iter()
            .map(|t| self.translate_term(t).and_then(Z3Term::into_bool))
            .collect()
    }

    fn numeric_pair(&self, lhs: &SmtTerm, rhs: &SmtTerm) -> Result<NumPair, Z3Error> {
        NumPair::promote(self.translate_term(lhs)?, self.translate_term(rhs)?)
    }

    fn extract_model(&self) -> Result<Model, Z3Error> {
        let z3_model = self
            .solver
            .get_model()
            .ok_or_else(|| Z3Error::Internal("SAT but no model available".into()))?;
        let mut model = Model::new();
        for (name, sort) in self.partition.declared() {
            let value = match sort {
                SmtSort::Int => match self
                    .int_vars
                    .get(name)
                    .and_then(|v| z3_model.eval::<z3::ast::Int>(v, true))
                {
                    Some(val) => Some(ModelValue::Int(
                        val.as_i64()
                            .ok_or_else(|| Z3Error::LiteralOverflow(format!("{name} = {val}")))?,
                    )),
                    None => None,
                },
                SmtSort::Real => self
                    .real_vars
                    .get(name)
                    .and_then(|v| z3_model.eval::<z3::ast::Real>(v, true))
                    .and_then(|val| parse_real_numeral(&val.to_string()))
                    .map(ModelValue::Real),
                SmtSort::Bool => self
                    .bool_vars
                    .get(name)
                    .and_then(|v| z3_model.eval::<z3::ast::Bool>(v, true))
                    .and_then(|val| val.as_bool())
                    .map(ModelValue::Bool),
            };
            if let Some(value) = value {
                model.insert(name, value);
            }
        }
        Ok(model)
    }
}

/// Z3 prints real numerals either as SMT-LIB (`(/ 1.0 2.0)`) or as `1/2`.
fn parse_real_numeral(text: &str) -> Option<num::BigRational> {
    if let Some(value) = parse_sexp(text)
        .ok()
        .and_then(|sexp| value_from_sexp(&sexp, &SmtSort::Real).ok())
    {
        return match value {
            ModelValue::Real(q) => Some(q),
            _ => None,
        };
    }
    let (numer, denom) = text.split_once('/')?;
    let denom = parse_decimal(denom.trim())?;
    if num::Zero::is_zero(&denom) {
        return None;
    }
    Some(parse_decimal(numer.trim())? / denom)
}

enum Z3Term {
    Int(z3::ast::Int),
    Real(z3::ast::Real),
    Bool(z3::ast::Bool),
}

impl Z3Term {
    fn into_bool(self) -> Result<z3::ast::Bool, Z3Error> {
        match self {
            Z3Term::Bool(b) => Ok(b),
            Z3Term::Int(_) | Z3Term::Real(_) => {
                Err(Z3Error::SortMismatch("expected Bool, got an arithmetic term".into()))
            }
        }
    }
}

enum NumPair {
    Ints(z3::ast::Int, z3::ast::Int),
    Reals(z3::ast::Real, z3::ast::Real),
}

impl NumPair {
    /// Mixed Int/Real operands are compared over the reals.
    fn promote(lhs: Z3Term, rhs: Z3Term) -> Result<Self, Z3Error> {
        match (lhs, rhs) {
            (Z3Term::Int(l), Z3Term::Int(r)) => Ok(NumPair::Ints(l, r)),
            (Z3Term::Real(l), Z3Term::Real(r)) => Ok(NumPair::Reals(l, r)),
            (Z3Term::Int(l), Z3Term::Real(r)) => Ok(NumPair::Reals(z3::ast::Real::from_int(&l), r)),
            (Z3Term::Real(l), Z3Term::Int(r)) => Ok(NumPair::Reals(l, z3::ast::Real::from_int(&r))),
            _ => Err(Z3Error::SortMismatch(
                "expected arithmetic operands, got Bool".into(),
            )),
        }
    }
}

impl Default for Z3Solver {
    fn default() -> Self {
        Self::new()
    }
}

impl SmtSolver for Z3Solver {
    type Error = Z3Error;

    fn declare_var(
        &mut self,
        name: &str,
        sort: &SmtSort,
        class: FormulaClass,
    ) -> Result<(), Z3Error> {
        match sort {
            SmtSort::Int => {
                self.int_vars
                    .insert(name.to_string(), z3::ast::Int::new_const(name));
            }
            SmtSort::Real => {
                self.real_vars
                    .insert(name.to_string(), z3::ast::Real::new_const(name));
            }
            SmtSort::Bool => {
                self.bool_vars
                    .insert(name.to_string(), z3::ast::Bool::new_const(name));
            }
        }
        self.partition.declare(name, *sort, class);
        Ok(())
    }

    fn assert(&mut self, term: &SmtTerm, class: FormulaClass) -> Result<(), Z3Error> {
        let z3_term = self.translate_term(term)?.into_bool()?;
        self.solver.assert(&z3_term);
        self.partition.record(term, class);
        self.last_result = None;
        Ok(())
    }

    fn push(&mut self) -> Result<(), Z3Error> {
        self.solver.push();
        self.partition.push();
        self.last_result = None;
        Ok(())
    }

    fn pop(&mut self) -> Result<(), Z3Error> {
        if !self.partition.pop() {
            return Err(Z3Error::ScopeUnderflow);
        }
        self.solver.pop(1);
        self.last_result = None;
        Ok(())
    }

    fn check_sat(&mut self) -> Result<SatResult, Z3Error> {
        let result = match self.solver.check() {
            Z3SatResult::Sat => SatResult::Sat,
            Z3SatResult::Unsat => SatResult::Unsat,
            Z3SatResult::Unknown => SatResult::Unknown(
                self.solver
                    .get_reason_unknown()
                    .unwrap_or_else(|| "Z3 returned unknown".into()),
            ),
        };
        self.last_result = Some(result.clone());
        Ok(result)
    }

    fn get_model(&mut self) -> Result<Model, Z3Error> {
        if self.last_result != Some(SatResult::Sat) {
            return Err(Z3Error::WrongState {
                operation: "get_model",
                expected: "sat",
            });
        }
        self.extract_model()
    }

    fn generalize(
        &mut self,
        direction: GeneralizeDirection,
        model: Option<&Model>,
    ) -> Result<Vec<SmtTerm>, Z3Error> {
        match model {
            Some(model) => Ok(self.partition.model_cube(direction, model)),
            None => {
                let model = self.get_model()?;
                Ok(self.partition.model_cube(direction, &model))
            }
        }
    }

    fn interpolate(&mut self) -> Result<SmtTerm, Z3Error> {
        if self.last_result != Some(SatResult::Unsat) {
            return Err(Z3Error::WrongState {
                operation: "interpolate",
                expected: "unsat",
            });
        }
        Ok(self.partition.trivial_interpolant())
    }

    fn supports(&self, feature: SolverFeature) -> bool {
        match feature {
            SolverFeature::Interpolation | SolverFeature::Generalization => true,
        }
    }

    fn gc(&mut self) -> Result<(), Z3Error> {
        self.last_result = None;
        Ok(())
    }

    fn reset(&mut self) -> Result<(), Z3Error> {
        self.solver.reset();
        // Z3 may drop per-solver parameters on reset; reapply timeout if configured.
        if let Some(params) = &self._params {
            self.solver.set_params(params);
        }
        self.int_vars.clear();
        self.real_vars.clear();
        self.bool_vars.clear();
        self.partition.clear();
        self.last_result = None;
        Ok(())
    }
}
