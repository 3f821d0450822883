//! Satisfying assignments and formula evaluation under them.

use std::collections::HashMap;

use num::{BigInt, BigRational, Zero};

use crate::terms::SmtTerm;

/// A model (variable assignments) extracted from a SAT result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Model {
    pub values: HashMap<String, ModelValue>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelValue {
    Int(i64),
    Real(BigRational),
    Bool(bool),
}

impl ModelValue {
    /// The value as a literal term.
    pub fn to_term(&self) -> SmtTerm {
        match self {
            ModelValue::Int(n) => SmtTerm::IntLit(*n),
            ModelValue::Real(q) => SmtTerm::RealLit(q.clone()),
            ModelValue::Bool(b) => SmtTerm::BoolLit(*b),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Num(BigRational),
    Bool(bool),
}

impl Value {
    fn num(self) -> Option<BigRational> {
        match self {
            Value::Num(q) => Some(q),
            Value::Bool(_) => None,
        }
    }

    fn bool(self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(b),
            Value::Num(_) => None,
        }
    }
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ModelValue) {
        self.values.insert(name.into(), value);
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(ModelValue::Int(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn get_real(&self, name: &str) -> Option<BigRational> {
        match self.values.get(name) {
            Some(ModelValue::Real(q)) => Some(q.clone()),
            Some(ModelValue::Int(n)) => Some(BigRational::from_integer(BigInt::from(*n))),
            _ => None,
        }
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.values.get(name) {
            Some(ModelValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// Truth value of `term` under the model, or `None` when the term mentions
    /// unassigned variables or is ill-sorted.
    pub fn eval_bool(&self, term: &SmtTerm) -> Option<bool> {
        self.eval(term)?.bool()
    }

    pub fn is_true(&self, term: &SmtTerm) -> bool {
        self.eval_bool(term) == Some(true)
    }

    fn eval(&self, term: &SmtTerm) -> Option<Value> {
        let num = |t: &SmtTerm| self.eval(t).and_then(Value::num);
        let boolean = |t: &SmtTerm| self.eval(t).and_then(Value::bool);
        Some(match term {
            SmtTerm::Var(name) => match self.values.get(name)? {
                ModelValue::Bool(b) => Value::Bool(*b),
                ModelValue::Int(n) => Value::Num(BigRational::from_integer(BigInt::from(*n))),
                ModelValue::Real(q) => Value::Num(q.clone()),
            },
            SmtTerm::IntLit(n) => Value::Num(BigRational::from_integer(BigInt::from(*n))),
            SmtTerm::RealLit(q) => Value::Num(q.clone()),
            SmtTerm::BoolLit(b) => Value::Bool(*b),
            SmtTerm::Add(l, r) => Value::Num(num(l)? + num(r)?),
            SmtTerm::Sub(l, r) => Value::Num(num(l)? - num(r)?),
            SmtTerm::Mul(l, r) => Value::Num(num(l)? * num(r)?),
            SmtTerm::Eq(l, r) => Value::Bool(self.eval(l)? == self.eval(r)?),
            SmtTerm::Lt(l, r) => Value::Bool(num(l)? < num(r)?),
            SmtTerm::Le(l, r) => Value::Bool(num(l)? <= num(r)?),
            SmtTerm::Gt(l, r) => Value::Bool(num(l)? > num(r)?),
            SmtTerm::Ge(l, r) => Value::Bool(num(l)? >= num(r)?),
            SmtTerm::And(terms) => {
                let mut acc = true;
                for t in terms {
                    acc &= boolean(t)?;
                }
                Value::Bool(acc)
            }
            SmtTerm::Or(terms) => {
                let mut acc = false;
                for t in terms {
                    acc |= boolean(t)?;
                }
                Value::Bool(acc)
            }
            SmtTerm::Not(inner) => Value::Bool(!boolean(inner)?),
            SmtTerm::Implies(l, r) => Value::Bool(!boolean(l)? || boolean(r)?),
            SmtTerm::Ite(c, t, e) => {
                if boolean(c)? {
                    self.eval(t)?
                } else {
                    self.eval(e)?
                }
            }
        })
    }
}

/// Parse a rational from a decimal or integer token such as `-3`, `2.50`.
pub fn parse_decimal(token: &str) -> Option<BigRational> {
    let (negative, digits) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token),
    };
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, f),
        None => (digits, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part.chars().chain(frac_part.chars()).all(|c| c.is_ascii_digit()) {
        return None;
    }
    let mantissa: BigInt = format!("{int_part}{frac_part}").parse().ok()?;
    let scale = num::pow(BigInt::from(10), frac_part.len());
    let value = BigRational::new(mantissa, scale);
    Some(if negative && !value.is_zero() { -value } else { value })
}
