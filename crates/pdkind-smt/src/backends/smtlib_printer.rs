use std::fmt::Write;

use num::{BigInt, BigRational, Signed};

use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

/// Render a term as an SMT-LIB2 expression.
pub fn to_smtlib(term: &SmtTerm) -> String {
    let mut out = String::new();
    write_term(&mut out, term);
    out
}

fn write_app<'a>(out: &mut String, op: &str, args: impl IntoIterator<Item = &'a SmtTerm>) {
    out.push('(');
    out.push_str(op);
    for arg in args {
        out.push(' ');
        write_term(out, arg);
    }
    out.push(')');
}

fn write_term(out: &mut String, term: &SmtTerm) {
    match term {
        SmtTerm::Var(name) => out.push_str(&symbol_to_smtlib(name)),
        SmtTerm::IntLit(n) if *n < 0 => {
            let _ = write!(out, "(- {})", n.unsigned_abs());
        }
        SmtTerm::IntLit(n) => {
            let _ = write!(out, "{n}");
        }
        SmtTerm::RealLit(q) => out.push_str(&rational_to_smtlib(q)),
        SmtTerm::BoolLit(b) => out.push_str(if *b { "true" } else { "false" }),
        SmtTerm::Add(l, r) => write_app(out, "+", [&**l, &**r]),
        SmtTerm::Sub(l, r) => write_app(out, "-", [&**l, &**r]),
        SmtTerm::Mul(l, r) => write_app(out, "*", [&**l, &**r]),
        SmtTerm::Eq(l, r) => write_app(out, "=", [&**l, &**r]),
        SmtTerm::Lt(l, r) => write_app(out, "<", [&**l, &**r]),
        SmtTerm::Le(l, r) => write_app(out, "<=", [&**l, &**r]),
        SmtTerm::Gt(l, r) => write_app(out, ">", [&**l, &**r]),
        SmtTerm::Ge(l, r) => write_app(out, ">=", [&**l, &**r]),
        SmtTerm::Implies(l, r) => write_app(out, "=>", [&**l, &**r]),
        SmtTerm::And(terms) | SmtTerm::Or(terms) => {
            let (op, unit) = match term {
                SmtTerm::And(_) => ("and", "true"),
                _ => ("or", "false"),
            };
            match terms.as_slice() {
                [] => out.push_str(unit),
                [single] => write_term(out, single),
                _ => write_app(out, op, terms),
            }
        }
        SmtTerm::Not(inner) => write_app(out, "not", [&**inner]),
        SmtTerm::Ite(c, t, e) => write_app(out, "ite", [&**c, &**t, &**e]),
    }
}

/// Print a sort as SMT-LIB2 format.
pub fn sort_to_smtlib(sort: &SmtSort) -> &'static str {
    match sort {
        SmtSort::Bool => "Bool",
        SmtSort::Int => "Int",
        SmtSort::Real => "Real",
    }
}

/// Print a symbol, quoting it with `|...|` unless it is a simple symbol.
pub fn symbol_to_smtlib(name: &str) -> String {
    if is_simple_symbol(name) {
        name.to_string()
    } else {
        format!("|{name}|")
    }
}

fn is_simple_symbol(name: &str) -> bool {
    const EXTRA: &str = "~!@$%^&*_-+=<>.?/";
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || EXTRA.contains(first) => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || EXTRA.contains(c))
}

fn decimal(n: &BigInt) -> String {
    format!("{n}.0")
}

fn rational_to_smtlib(q: &BigRational) -> String {
    let magnitude = q.abs();
    let body = if magnitude.is_integer() {
        decimal(magnitude.numer())
    } else {
        format!(
            "(/ {} {})",
            decimal(magnitude.numer()),
            decimal(magnitude.denom())
        )
    };
    if q.is_negative() {
        format!("(- {body})")
    } else {
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print_simple_term() {
        let term = SmtTerm::var("x").add(SmtTerm::int(1)).ge(SmtTerm::int(0));
        assert_eq!(to_smtlib(&term), "(>= (+ x 1) 0)");
    }

    #[test]
    fn print_and_term() {
        let term = SmtTerm::and(vec![
            SmtTerm::var("a").gt(SmtTerm::int(0)),
            SmtTerm::var("b").lt(SmtTerm::int(10)),
        ]);
        assert_eq!(to_smtlib(&term), "(and (> a 0) (< b 10))");
    }

    #[test]
    fn print_quotes_primed_symbols() {
        assert_eq!(to_smtlib(&SmtTerm::var("x'")), "|x'|");
        assert_eq!(to_smtlib(&SmtTerm::var("x@2")), "x@2");
    }

    #[test]
    fn print_real_literals() {
        assert_eq!(to_smtlib(&SmtTerm::real(3, 1)), "3.0");
        assert_eq!(to_smtlib(&SmtTerm::real(-1, 2)), "(- (/ 1.0 2.0))");
        assert_eq!(to_smtlib(&SmtTerm::int(-7)), "(- 7)");
    }
}
