use std::collections::{BTreeSet, HashMap};
use std::fmt;

use num::{BigInt, BigRational};

use crate::backends::smtlib_printer::to_smtlib;
use crate::sorts::SmtSort;

/// Sort assignment for free variables, used for sort inference.
pub type SortEnv = HashMap<String, SmtSort>;

/// Abstract SMT term representation, solver-agnostic.
///
/// Terms are totally ordered and hashable so that sets of conjuncts and
/// disjuncts have a deterministic iteration order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SmtTerm {
    /// Variable reference by name.
    Var(String),
    /// Integer literal.
    IntLit(i64),
    /// Rational literal.
    RealLit(BigRational),
    /// Boolean literal.
    BoolLit(bool),

    // Arithmetic
    Add(Box<SmtTerm>, Box<SmtTerm>),
    Sub(Box<SmtTerm>, Box<SmtTerm>),
    Mul(Box<SmtTerm>, Box<SmtTerm>),

    // Comparison
    Eq(Box<SmtTerm>, Box<SmtTerm>),
    Lt(Box<SmtTerm>, Box<SmtTerm>),
    Le(Box<SmtTerm>, Box<SmtTerm>),
    Gt(Box<SmtTerm>, Box<SmtTerm>),
    Ge(Box<SmtTerm>, Box<SmtTerm>),

    // Boolean logic
    And(Vec<SmtTerm>),
    Or(Vec<SmtTerm>),
    Not(Box<SmtTerm>),
    Implies(Box<SmtTerm>, Box<SmtTerm>),

    // If-then-else
    Ite(Box<SmtTerm>, Box<SmtTerm>, Box<SmtTerm>),
}

#[allow(clippy::should_implement_trait)]
impl SmtTerm {
    pub fn var(name: impl Into<String>) -> Self {
        SmtTerm::Var(name.into())
    }

    pub fn int(n: i64) -> Self {
        SmtTerm::IntLit(n)
    }

    /// Rational literal `num / den`. Panics if `den` is zero.
    pub fn real(num: i64, den: i64) -> Self {
        SmtTerm::RealLit(BigRational::new(BigInt::from(num), BigInt::from(den)))
    }

    pub fn bool(b: bool) -> Self {
        SmtTerm::BoolLit(b)
    }

    pub fn add(self, other: SmtTerm) -> Self {
        SmtTerm::Add(Box::new(self), Box::new(other))
    }

    pub fn sub(self, other: SmtTerm) -> Self {
        SmtTerm::Sub(Box::new(self), Box::new(other))
    }

    pub fn mul(self, other: SmtTerm) -> Self {
        SmtTerm::Mul(Box::new(self), Box::new(other))
    }

    pub fn eq(self, other: SmtTerm) -> Self {
        SmtTerm::Eq(Box::new(self), Box::new(other))
    }

    pub fn lt(self, other: SmtTerm) -> Self {
        SmtTerm::Lt(Box::new(self), Box::new(other))
    }

    pub fn le(self, other: SmtTerm) -> Self {
        SmtTerm::Le(Box::new(self), Box::new(other))
    }

    pub fn gt(self, other: SmtTerm) -> Self {
        SmtTerm::Gt(Box::new(self), Box::new(other))
    }

    pub fn ge(self, other: SmtTerm) -> Self {
        SmtTerm::Ge(Box::new(self), Box::new(other))
    }

    pub fn and(terms: Vec<SmtTerm>) -> Self {
        SmtTerm::And(terms)
    }

    pub fn or(terms: Vec<SmtTerm>) -> Self {
        SmtTerm::Or(terms)
    }

    pub fn not(self) -> Self {
        SmtTerm::Not(Box::new(self))
    }

    pub fn implies(self, other: SmtTerm) -> Self {
        SmtTerm::Implies(Box::new(self), Box::new(other))
    }

    /// Conjunction that collapses the empty and singleton cases.
    pub fn mk_and(mut terms: Vec<SmtTerm>) -> Self {
        match terms.len() {
            0 => SmtTerm::BoolLit(true),
            1 => terms.pop().unwrap_or(SmtTerm::BoolLit(true)),
            _ => SmtTerm::And(terms),
        }
    }

    /// Disjunction that collapses the empty and singleton cases.
    pub fn mk_or(mut terms: Vec<SmtTerm>) -> Self {
        match terms.len() {
            0 => SmtTerm::BoolLit(false),
            1 => terms.pop().unwrap_or(SmtTerm::BoolLit(false)),
            _ => SmtTerm::Or(terms),
        }
    }

    /// Negation that folds literals and double negations.
    pub fn mk_not(&self) -> Self {
        match self {
            SmtTerm::BoolLit(b) => SmtTerm::BoolLit(!b),
            SmtTerm::Not(inner) => (**inner).clone(),
            other => other.clone().not(),
        }
    }

    pub fn is_true(&self) -> bool {
        matches!(self, SmtTerm::BoolLit(true))
    }

    pub fn is_false(&self) -> bool {
        matches!(self, SmtTerm::BoolLit(false))
    }

    /// Flattened conjuncts, in left-to-right order. `true` has no conjuncts.
    pub fn conjuncts(&self) -> Vec<SmtTerm> {
        let mut out = Vec::new();
        self.collect_conjuncts(&mut out);
        out
    }

    fn collect_conjuncts(&self, out: &mut Vec<SmtTerm>) {
        match self {
            SmtTerm::And(terms) => terms.iter().for_each(|t| t.collect_conjuncts(out)),
            SmtTerm::BoolLit(true) => {}
            other => out.push(other.clone()),
        }
    }

    /// Flattened disjuncts, in left-to-right order. `false` has no disjuncts.
    pub fn disjuncts(&self) -> Vec<SmtTerm> {
        let mut out = Vec::new();
        self.collect_disjuncts(&mut out);
        out
    }

    fn collect_disjuncts(&self, out: &mut Vec<SmtTerm>) {
        match self {
            SmtTerm::Or(terms) => terms.iter().for_each(|t| t.collect_disjuncts(out)),
            SmtTerm::BoolLit(false) => {}
            other => out.push(other.clone()),
        }
    }

    /// Free variables of the term.
    pub fn vars(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_vars(&mut out);
        out
    }

    pub fn collect_vars(&self, out: &mut BTreeSet<String>) {
        match self {
            SmtTerm::Var(name) => {
                out.insert(name.clone());
            }
            SmtTerm::IntLit(_) | SmtTerm::RealLit(_) | SmtTerm::BoolLit(_) => {}
            SmtTerm::Add(l, r)
            | SmtTerm::Sub(l, r)
            | SmtTerm::Mul(l, r)
            | SmtTerm::Eq(l, r)
            | SmtTerm::Lt(l, r)
            | SmtTerm::Le(l, r)
            | SmtTerm::Gt(l, r)
            | SmtTerm::Ge(l, r)
            | SmtTerm::Implies(l, r) => {
                l.collect_vars(out);
                r.collect_vars(out);
            }
            SmtTerm::And(terms) | SmtTerm::Or(terms) => {
                terms.iter().for_each(|t| t.collect_vars(out));
            }
            SmtTerm::Not(inner) => inner.collect_vars(out),
            SmtTerm::Ite(c, t, e) => {
                c.collect_vars(out);
                t.collect_vars(out);
                e.collect_vars(out);
            }
        }
    }

    /// Rename variables. Variables for which `rename` returns `None` are kept.
    pub fn rename_vars<F>(&self, rename: &F) -> SmtTerm
    where
        F: Fn(&str) -> Option<String>,
    {
        let bin = |l: &SmtTerm, r: &SmtTerm| {
            (
                Box::new(l.rename_vars(rename)),
                Box::new(r.rename_vars(rename)),
            )
        };
        match self {
            SmtTerm::Var(name) => SmtTerm::Var(rename(name).unwrap_or_else(|| name.clone())),
            SmtTerm::IntLit(_) | SmtTerm::RealLit(_) | SmtTerm::BoolLit(_) => self.clone(),
            SmtTerm::Add(l, r) => {
                let (l, r) = bin(l, r);
                SmtTerm::Add(l, r)
            }
            SmtTerm::Sub(l, r) => {
                let (l, r) = bin(l, r);
                SmtTerm::Sub(l, r)
            }
            SmtTerm::Mul(l, r) => {
                let (l, r) = bin(l, r);
                SmtTerm::Mul(l, r)
            }
            SmtTerm::Eq(l, r) => {
                let (l, r) = bin(l, r);
                SmtTerm::Eq(l, r)
            }
            SmtTerm::Lt(l, r) => {
                let (l, r) = bin(l, r);
                SmtTerm::Lt(l, r)
            }
            SmtTerm::Le(l, r) => {
                let (l, r) = bin(l, r);
                SmtTerm::Le(l, r)
            }
            SmtTerm::Gt(l, r) => {
                let (l, r) = bin(l, r);
                SmtTerm::Gt(l, r)
            }
            SmtTerm::Ge(l, r) => {
                let (l, r) = bin(l, r);
                SmtTerm::Ge(l, r)
            }
            SmtTerm::Implies(l, r) => {
                let (l, r) = bin(l, r);
                SmtTerm::Implies(l, r)
            }
            SmtTerm::And(terms) => SmtTerm::And(terms.iter().map(|t| t.rename_vars(rename)).collect()),
            SmtTerm::Or(terms) => SmtTerm::Or(terms.iter().map(|t| t.rename_vars(rename)).collect()),
            SmtTerm::Not(inner) => SmtTerm::Not(Box::new(inner.rename_vars(rename))),
            SmtTerm::Ite(c, t, e) => SmtTerm::Ite(
                Box::new(c.rename_vars(rename)),
                Box::new(t.rename_vars(rename)),
                Box::new(e.rename_vars(rename)),
            ),
        }
    }

    /// Infer the sort of the term. Unknown variables yield `None`.
    pub fn sort_in(&self, env: &SortEnv) -> Option<SmtSort> {
        match self {
            SmtTerm::Var(name) => env.get(name).copied(),
            SmtTerm::IntLit(_) => Some(SmtSort::Int),
            SmtTerm::RealLit(_) => Some(SmtSort::Real),
            SmtTerm::BoolLit(_) => Some(SmtSort::Bool),
            SmtTerm::Add(l, r) | SmtTerm::Sub(l, r) | SmtTerm::Mul(l, r) => {
                match (l.sort_in(env)?, r.sort_in(env)?) {
                    (SmtSort::Int, SmtSort::Int) => Some(SmtSort::Int),
                    (SmtSort::Bool, _) | (_, SmtSort::Bool) => None,
                    _ => Some(SmtSort::Real),
                }
            }
            SmtTerm::Eq(..)
            | SmtTerm::Lt(..)
            | SmtTerm::Le(..)
            | SmtTerm::Gt(..)
            | SmtTerm::Ge(..)
            | SmtTerm::And(_)
            | SmtTerm::Or(_)
            | SmtTerm::Not(_)
            | SmtTerm::Implies(..) => Some(SmtSort::Bool),
            SmtTerm::Ite(_, t, e) => t.sort_in(env).or_else(|| e.sort_in(env)),
        }
    }
}

impl fmt::Display for SmtTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&to_smtlib(self))
    }
}
