//! Transition systems over CURRENT, NEXT and INPUT variables.
//!
//! A state variable `x` has the next-state copy `x'`. Inputs have no next
//! copy. Both predicates are plain [`SmtTerm`]s over these names.

use std::collections::{BTreeSet, HashMap};

use pdkind_smt::sorts::SmtSort;
use pdkind_smt::terms::{SmtTerm, SortEnv};

use crate::error::EngineError;

/// Name of the next-state copy of `name`.
pub fn next_name(name: &str) -> String {
    format!("{name}'")
}

#[derive(Debug, Clone)]
pub struct TransitionSystem {
    state_vars: Vec<(String, SmtSort)>,
    next_vars: Vec<(String, SmtSort)>,
    input_vars: Vec<(String, SmtSort)>,
    initial_states: SmtTerm,
    transition_relation: SmtTerm,
    to_next: HashMap<String, String>,
    to_current: HashMap<String, String>,
}

impl TransitionSystem {
    /// Build a system, checking that the predicates only mention declared
    /// variables: CURRENT for `init`, CURRENT/INPUT/NEXT for `trans`.
    pub fn new(
        state_vars: Vec<(String, SmtSort)>,
        input_vars: Vec<(String, SmtSort)>,
        initial_states: SmtTerm,
        transition_relation: SmtTerm,
    ) -> Result<Self, EngineError> {
        let next_vars: Vec<(String, SmtSort)> = state_vars
            .iter()
            .map(|(name, sort)| (next_name(name), *sort))
            .collect();

        let mut seen = BTreeSet::new();
        for (name, _) in state_vars.iter().chain(&next_vars).chain(&input_vars) {
            // `@` is reserved for the depth-indexed trace copies.
            if name.contains('@') {
                return Err(EngineError::InvalidSystem(format!(
                    "variable `{name}` contains the reserved character `@`"
                )));
            }
            if !seen.insert(name.as_str()) {
                return Err(EngineError::InvalidSystem(format!(
                    "variable `{name}` is declared twice"
                )));
            }
        }

        let current: BTreeSet<String> = state_vars.iter().map(|(n, _)| n.clone()).collect();
        if let Some(stray) = initial_states.vars().difference(&current).next() {
            return Err(EngineError::InvalidSystem(format!(
                "initial states mention non-state variable `{stray}`"
            )));
        }
        let all: BTreeSet<String> = seen.iter().map(|n| n.to_string()).collect();
        if let Some(stray) = transition_relation.vars().difference(&all).next() {
            return Err(EngineError::InvalidSystem(format!(
                "transition relation mentions undeclared variable `{stray}`"
            )));
        }

        let to_next = state_vars
            .iter()
            .map(|(name, _)| (name.clone(), next_name(name)))
            .collect();
        let to_current = state_vars
            .iter()
            .map(|(name, _)| (next_name(name), name.clone()))
            .collect();

        Ok(Self {
            state_vars,
            next_vars,
            input_vars,
            initial_states,
            transition_relation,
            to_next,
            to_current,
        })
    }

    pub fn state_vars(&self) -> &[(String, SmtSort)] {
        &self.state_vars
    }

    pub fn next_vars(&self) -> &[(String, SmtSort)] {
        &self.next_vars
    }

    pub fn input_vars(&self) -> &[(String, SmtSort)] {
        &self.input_vars
    }

    pub fn initial_states(&self) -> &SmtTerm {
        &self.initial_states
    }

    pub fn transition_relation(&self) -> &SmtTerm {
        &self.transition_relation
    }

    /// Rename CURRENT variables to their NEXT copies.
    pub fn to_next(&self, f: &SmtTerm) -> SmtTerm {
        f.rename_vars(&|name| self.to_next.get(name).cloned())
    }

    /// Rename NEXT variables back to CURRENT.
    pub fn to_current(&self, f: &SmtTerm) -> SmtTerm {
        f.rename_vars(&|name| self.to_current.get(name).cloned())
    }

    /// Sorts of every CURRENT, NEXT and INPUT variable.
    pub fn sort_env(&self) -> SortEnv {
        self.state_vars
            .iter()
            .chain(&self.next_vars)
            .chain(&self.input_vars)
            .cloned()
            .collect()
    }
}
