//! Book-keeping of interpolation classes shared by the backends.
//!
//! Backends record every declaration and assertion here together with its
//! [`FormulaClass`], mirroring `push`/`pop` so that the A/B split of the live
//! assertion stack is always known.

use std::collections::{BTreeSet, HashMap};

use crate::model::Model;
use crate::solver::{FormulaClass, GeneralizeDirection};
use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

#[derive(Debug, Clone)]
pub struct Partition {
    vars: HashMap<String, (SmtSort, FormulaClass)>,
    order: Vec<String>,
    scopes: Vec<Vec<(SmtTerm, FormulaClass)>>,
}

impl Default for Partition {
    fn default() -> Self {
        Self {
            vars: HashMap::new(),
            order: Vec::new(),
            scopes: vec![Vec::new()],
        }
    }
}

impl Partition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a declaration. Redeclaring a name keeps its original position
    /// and replaces its sort and class.
    pub fn declare(&mut self, name: &str, sort: SmtSort, class: FormulaClass) {
        if self.vars.insert(name.to_string(), (sort, class)).is_none() {
            self.order.push(name.to_string());
        }
    }

    pub fn sort_of(&self, name: &str) -> Option<SmtSort> {
        self.vars.get(name).map(|(sort, _)| *sort)
    }

    pub fn class_of(&self, name: &str) -> Option<FormulaClass> {
        self.vars.get(name).map(|(_, class)| *class)
    }

    /// Declared variables in declaration order.
    pub fn declared(&self) -> impl Iterator<Item = (&str, SmtSort)> + '_ {
        self.order
            .iter()
            .filter_map(|name| self.vars.get(name).map(|(sort, _)| (name.as_str(), *sort)))
    }

    /// Declared variables of one class, in declaration order.
    pub fn declared_in(&self, class: FormulaClass) -> impl Iterator<Item = (&str, SmtSort)> + '_ {
        self.order.iter().filter_map(move |name| match self.vars.get(name) {
            Some((sort, c)) if *c == class => Some((name.as_str(), *sort)),
            _ => None,
        })
    }

    pub fn record(&mut self, term: &SmtTerm, class: FormulaClass) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.push((term.clone(), class));
        }
    }

    pub fn push(&mut self) {
        self.scopes.push(Vec::new());
    }

    /// Drop the innermost scope. Returns `false` when only the base scope is
    /// left.
    pub fn pop(&mut self) -> bool {
        if self.scopes.len() <= 1 {
            return false;
        }
        self.scopes.pop();
        true
    }

    /// Number of open scopes above the base level.
    pub fn depth(&self) -> usize {
        self.scopes.len() - 1
    }

    /// Live assertions whose class satisfies `keep`, oldest first.
    pub fn assertions(&self, keep: impl Fn(FormulaClass) -> bool) -> Vec<SmtTerm> {
        self.scopes
            .iter()
            .flatten()
            .filter(|(_, class)| keep(*class))
            .map(|(term, _)| term.clone())
            .collect()
    }

    /// An interpolant of the live assertions, assuming they are jointly
    /// unsatisfiable.
    ///
    /// `T` assertions count towards the A side. The A-side conjunction is
    /// returned when it only speaks about B-side symbols; otherwise the
    /// negated B side, the weakest formula implied by A that still refutes B.
    pub fn trivial_interpolant(&self) -> SmtTerm {
        let a_side = self.assertions(|c| c != FormulaClass::B);
        let b_side = self.assertions(|c| c == FormulaClass::B);
        let b_vars: BTreeSet<String> = b_side.iter().flat_map(SmtTerm::vars).collect();
        let a_vars: BTreeSet<String> = a_side.iter().flat_map(SmtTerm::vars).collect();
        if !b_side.is_empty() && a_vars.is_subset(&b_vars) {
            SmtTerm::mk_and(a_side)
        } else {
            SmtTerm::mk_and(b_side).mk_not()
        }
    }

    /// The cube of `model` restricted to the variables selected by `direction`.
    pub fn model_cube(&self, direction: GeneralizeDirection, model: &Model) -> Vec<SmtTerm> {
        let class = match direction {
            GeneralizeDirection::Backward => FormulaClass::A,
            GeneralizeDirection::Forward => FormulaClass::B,
        };
        self.declared_in(class)
            .filter_map(|(name, _)| {
                let value = model.values.get(name)?;
                let var = SmtTerm::var(name);
                Some(match value.to_term() {
                    SmtTerm::BoolLit(true) => var,
                    SmtTerm::BoolLit(false) => var.not(),
                    literal => var.eq(literal),
                })
            })
            .collect()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
