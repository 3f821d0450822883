//! Reader for the SMT-LIB2 fragments that solvers send back: numerals in
//! models, `get-value` responses and `define-fun` interpolants.

use std::collections::HashMap;

use num::{BigRational, Zero};
use thiserror::Error;

use crate::model::{parse_decimal, ModelValue};
use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

#[derive(Debug, Error, PartialEq)]
pub enum SmtLibParseError {
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("unexpected `)` at offset {0}")]
    UnbalancedParen(usize),
    #[error("trailing input after expression at offset {0}")]
    TrailingInput(usize),
    #[error("unsupported operator `{0}`")]
    UnknownOperator(String),
    #[error("operator `{op}` applied to {got} arguments")]
    Arity { op: String, got: usize },
    #[error("malformed expression: {0}")]
    Malformed(String),
    #[error("integer value {0} does not fit a machine integer")]
    IntOverflow(String),
}

/// An s-expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sexp {
    Atom(String),
    List(Vec<Sexp>),
}

impl Sexp {
    pub fn as_atom(&self) -> Option<&str> {
        match self {
            Sexp::Atom(a) => Some(a),
            Sexp::List(_) => None,
        }
    }
}

/// Parse every s-expression in `input`.
pub fn parse_sexps(input: &str) -> Result<Vec<Sexp>, SmtLibParseError> {
    let chars: Vec<char> = input.chars().collect();
    let mut pos = 0;
    let mut out = Vec::new();
    loop {
        skip_ws(&chars, &mut pos);
        if pos >= chars.len() {
            return Ok(out);
        }
        out.push(read_sexp(&chars, &mut pos)?);
    }
}

/// Parse exactly one s-expression.
pub fn parse_sexp(input: &str) -> Result<Sexp, SmtLibParseError> {
    let chars: Vec<char> = input.chars().collect();
    let mut pos = 0;
    skip_ws(&chars, &mut pos);
    let sexp = read_sexp(&chars, &mut pos)?;
    skip_ws(&chars, &mut pos);
    if pos < chars.len() {
        return Err(SmtLibParseError::TrailingInput(pos));
    }
    Ok(sexp)
}

fn skip_ws(chars: &[char], pos: &mut usize) {
    while *pos < chars.len() {
        if chars[*pos].is_whitespace() {
            *pos += 1;
        } else if chars[*pos] == ';' {
            while *pos < chars.len() && chars[*pos] != '\n' {
                *pos += 1;
            }
        } else {
            break;
        }
    }
}

fn read_sexp(chars: &[char], pos: &mut usize) -> Result<Sexp, SmtLibParseError> {
    skip_ws(chars, pos);
    match chars.get(*pos) {
        None => Err(SmtLibParseError::UnexpectedEof),
        Some(')') => Err(SmtLibParseError::UnbalancedParen(*pos)),
        Some('(') => {
            *pos += 1;
            let mut items = Vec::new();
            loop {
                skip_ws(chars, pos);
                match chars.get(*pos) {
                    None => return Err(SmtLibParseError::UnexpectedEof),
                    Some(')') => {
                        *pos += 1;
                        return Ok(Sexp::List(items));
                    }
                    Some(_) => items.push(read_sexp(chars, pos)?),
                }
            }
        }
        Some('|') => {
            *pos += 1;
            let start = *pos;
            while *pos < chars.len() && chars[*pos] != '|' {
                *pos += 1;
            }
            if *pos >= chars.len() {
                return Err(SmtLibParseError::UnexpectedEof);
            }
            let name: String = chars[start..*pos].iter().collect();
            *pos += 1;
            Ok(Sexp::Atom(name))
        }
        Some(_) => {
            let start = *pos;
            while *pos < chars.len()
                && !chars[*pos].is_whitespace()
                && !matches!(chars[*pos], '(' | ')' | ';')
            {
                *pos += 1;
            }
            Ok(Sexp::Atom(chars[start..*pos].iter().collect()))
        }
    }
}

/// Parse a single SMT-LIB term.
pub fn parse_term(input: &str) -> Result<SmtTerm, SmtLibParseError> {
    sexp_to_term(&parse_sexp(input)?)
}

/// Extract the body of `(define-fun name () Bool body)`, as returned by
/// `get-interpolant`.
pub fn parse_define_fun_body(input: &str) -> Result<SmtTerm, SmtLibParseError> {
    match parse_sexp(input)? {
        Sexp::List(items) if items.len() == 5 && items[0].as_atom() == Some("define-fun") => {
            sexp_to_term(&items[4])
        }
        other => Err(SmtLibParseError::Malformed(format!(
            "expected define-fun, got {other:?}"
        ))),
    }
}

/// Parse a `get-value` response `((name value) ...)` into name/value pairs.
pub fn parse_get_value(response: &str) -> Result<Vec<(String, Sexp)>, SmtLibParseError> {
    match parse_sexp(response)? {
        Sexp::List(pairs) => pairs
            .into_iter()
            .map(|pair| match pair {
                Sexp::List(mut kv) if kv.len() == 2 => {
                    let value = kv.pop().ok_or(SmtLibParseError::UnexpectedEof)?;
                    match kv.pop() {
                        Some(Sexp::Atom(name)) => Ok((name, value)),
                        other => Err(SmtLibParseError::Malformed(format!(
                            "expected symbol in get-value pair, got {other:?}"
                        ))),
                    }
                }
                other => Err(SmtLibParseError::Malformed(format!(
                    "expected (name value) pair, got {other:?}"
                ))),
            })
            .collect(),
        other => Err(SmtLibParseError::Malformed(format!(
            "expected get-value list, got {other:?}"
        ))),
    }
}

/// Interpret a model value printed by a solver, e.g. `(- 7)` or `(/ 1.0 2.0)`.
///
/// Integers outside the `i64` range are an error rather than a missing value.
pub fn value_from_sexp(sexp: &Sexp, sort: &SmtSort) -> Result<ModelValue, SmtLibParseError> {
    let malformed = || SmtLibParseError::Malformed(format!("{sexp:?} is not a {sort:?} value"));
    match sort {
        SmtSort::Bool => match sexp.as_atom() {
            Some("true") => Ok(ModelValue::Bool(true)),
            Some("false") => Ok(ModelValue::Bool(false)),
            _ => Err(malformed()),
        },
        SmtSort::Int => {
            let q = numeral(sexp).filter(BigRational::is_integer).ok_or_else(malformed)?;
            num::ToPrimitive::to_i64(q.numer())
                .map(ModelValue::Int)
                .ok_or_else(|| SmtLibParseError::IntOverflow(q.to_string()))
        }
        SmtSort::Real => numeral(sexp).map(ModelValue::Real).ok_or_else(malformed),
    }
}

fn numeral(sexp: &Sexp) -> Option<BigRational> {
    match sexp {
        Sexp::Atom(a) => parse_decimal(a),
        Sexp::List(items) => match (items.first()?.as_atom()?, items.len()) {
            ("-", 2) => numeral(&items[1]).map(|q| -q),
            ("/", 3) => {
                let den = numeral(&items[2])?;
                if den.is_zero() {
                    return None;
                }
                Some(numeral(&items[1])? / den)
            }
            _ => None,
        },
    }
}

/// Convert an s-expression into a term.
pub fn sexp_to_term(sexp: &Sexp) -> Result<SmtTerm, SmtLibParseError> {
    Converter::default().convert(sexp)
}

#[derive(Default)]
struct Converter {
    lets: Vec<HashMap<String, SmtTerm>>,
}

impl Converter {
    fn lookup(&self, name: &str) -> Option<&SmtTerm> {
        self.lets.iter().rev().find_map(|scope| scope.get(name))
    }

    fn convert(&mut self, sexp: &Sexp) -> Result<SmtTerm, SmtLibParseError> {
        match sexp {
            Sexp::Atom(atom) => Ok(self.atom(atom)),
            Sexp::List(items) => {
                let Some(head) = items.first() else {
                    return Err(SmtLibParseError::Malformed("empty application".into()));
                };
                let Some(op) = head.as_atom() else {
                    return Err(SmtLibParseError::Malformed(format!(
                        "operator must be a symbol, got {head:?}"
                    )));
                };
                if op == "let" {
                    return self.convert_let(items);
                }
                if let Some(q) = numeral(sexp) {
                    return Ok(literal(q));
                }
                let args = items[1..]
                    .iter()
                    .map(|a| self.convert(a))
                    .collect::<Result<Vec<_>, _>>()?;
                apply(op, args)
            }
        }
    }

    fn atom(&self, atom: &str) -> SmtTerm {
        match atom {
            "true" => SmtTerm::BoolLit(true),
            "false" => SmtTerm::BoolLit(false),
            _ => {
                if let Some(bound) = self.lookup(atom) {
                    return bound.clone();
                }
                if atom.starts_with(|c: char| c.is_ascii_digit()) {
                    if let Ok(n) = atom.parse::<i64>() {
                        return SmtTerm::IntLit(n);
                    }
                    if let Some(q) = parse_decimal(atom) {
                        return SmtTerm::RealLit(q);
                    }
                }
                SmtTerm::Var(atom.to_string())
            }
        }
    }

    fn convert_let(&mut self, items: &[Sexp]) -> Result<SmtTerm, SmtLibParseError> {
        let (Some(Sexp::List(bindings)), Some(body), 3) = (items.get(1), items.get(2), items.len())
        else {
            return Err(SmtLibParseError::Malformed("malformed let".into()));
        };
        let mut scope = HashMap::new();
        for binding in bindings {
            match binding {
                Sexp::List(kv) if kv.len() == 2 => {
                    let Some(name) = kv[0].as_atom() else {
                        return Err(SmtLibParseError::Malformed("let binder must be a symbol".into()));
                    };
                    scope.insert(name.to_string(), self.convert(&kv[1])?);
                }
                other => {
                    return Err(SmtLibParseError::Malformed(format!(
                        "malformed let binding {other:?}"
                    )))
                }
            }
        }
        self.lets.push(scope);
        let result = self.convert(body);
        self.lets.pop();
        result
    }
}

fn literal(q: BigRational) -> SmtTerm {
    if q.is_integer() {
        if let Some(n) = num::ToPrimitive::to_i64(q.numer()) {
            return SmtTerm::IntLit(n);
        }
    }
    SmtTerm::RealLit(q)
}

fn apply(op: &str, mut args: Vec<SmtTerm>) -> Result<SmtTerm, SmtLibParseError> {
    let arity = |expected: usize, args: &Vec<SmtTerm>| {
        if args.len() == expected {
            Ok(())
        } else {
            Err(SmtLibParseError::Arity {
                op: op.to_string(),
                got: args.len(),
            })
        }
    };
    let fold = |args: Vec<SmtTerm>, f: fn(SmtTerm, SmtTerm) -> SmtTerm| {
        let mut iter = args.into_iter();
        let first = iter.next().ok_or_else(|| SmtLibParseError::Arity {
            op: op.to_string(),
            got: 0,
        })?;
        Ok(iter.fold(first, f))
    };
    let chain = |args: Vec<SmtTerm>, f: fn(SmtTerm, SmtTerm) -> SmtTerm| {
        if args.len() < 2 {
            return Err(SmtLibParseError::Arity {
                op: op.to_string(),
                got: args.len(),
            });
        }
        let links: Vec<SmtTerm> = args
            .windows(2)
            .map(|w| f(w[0].clone(), w[1].clone()))
            .collect();
        Ok(SmtTerm::mk_and(links))
    };
    match op {
        "and" => Ok(SmtTerm::And(args)),
        "or" => Ok(SmtTerm::Or(args)),
        "not" => {
            arity(1, &args)?;
            Ok(args.remove(0).not())
        }
        "=>" => {
            if args.len() < 2 {
                return Err(SmtLibParseError::Arity {
                    op: op.to_string(),
                    got: args.len(),
                });
            }
            let mut iter = args.into_iter().rev();
            let last = iter.next().ok_or(SmtLibParseError::UnexpectedEof)?;
            Ok(iter.fold(last, |acc, premise| premise.implies(acc)))
        }
        "ite" => {
            arity(3, &args)?;
            let els = args.pop().ok_or(SmtLibParseError::UnexpectedEof)?;
            let then = args.pop().ok_or(SmtLibParseError::UnexpectedEof)?;
            let cond = args.pop().ok_or(SmtLibParseError::UnexpectedEof)?;
            Ok(SmtTerm::Ite(Box::new(cond), Box::new(then), Box::new(els)))
        }
        "=" => chain(args, SmtTerm::eq),
        "distinct" => {
            arity(2, &args)?;
            let rhs = args.pop().ok_or(SmtLibParseError::UnexpectedEof)?;
            let lhs = args.pop().ok_or(SmtLibParseError::UnexpectedEof)?;
            Ok(lhs.eq(rhs).not())
        }
        "<" => chain(args, SmtTerm::lt),
        "<=" => chain(args, SmtTerm::le),
        ">" => chain(args, SmtTerm::gt),
        ">=" => chain(args, SmtTerm::ge),
        "+" => fold(args, SmtTerm::add),
        "*" => fold(args, SmtTerm::mul),
        "-" if args.len() == 1 => Ok(SmtTerm::IntLit(0).sub(args.remove(0))),
        "-" => fold(args, SmtTerm::sub),
        "to_real" | "to_int" => {
            arity(1, &args)?;
            Ok(args.remove(0))
        }
        other => Err(SmtLibParseError::UnknownOperator(other.to_string())),
    }
}
