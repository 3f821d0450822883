//! Depth-indexed copies of the state and input variables.
//!
//! Depth 0 uses the base names of the system; depth `k > 0` uses `x@k`.

use std::collections::HashMap;
use std::sync::Arc;

use pdkind_smt::sorts::SmtSort;
use pdkind_smt::terms::SmtTerm;

use crate::system::{next_name, TransitionSystem};

fn indexed(name: &str, depth: usize) -> String {
    if depth == 0 {
        name.to_string()
    } else {
        format!("{name}@{depth}")
    }
}

#[derive(Debug, Clone)]
pub struct TraceHelper {
    system: Arc<TransitionSystem>,
}

impl TraceHelper {
    pub fn new(system: Arc<TransitionSystem>) -> Self {
        Self { system }
    }

    pub fn state_variables(&self, depth: usize) -> Vec<(String, SmtSort)> {
        self.system
            .state_vars()
            .iter()
            .map(|(name, sort)| (indexed(name, depth), *sort))
            .collect()
    }

    pub fn input_variables(&self, depth: usize) -> Vec<(String, SmtSort)> {
        self.system
            .input_vars()
            .iter()
            .map(|(name, sort)| (indexed(name, depth), *sort))
            .collect()
    }

    /// The transition relation from depth `depth` to `depth + 1`, with the
    /// inputs of step `depth`.
    pub fn transition_formula(&self, depth: usize) -> SmtTerm {
        let mut rename = HashMap::new();
        for (name, _) in self.system.state_vars() {
            rename.insert(name.clone(), indexed(name, depth));
            rename.insert(next_name(name), indexed(name, depth + 1));
        }
        for (name, _) in self.system.input_vars() {
            rename.insert(name.clone(), indexed(name, depth));
        }
        self.system
            .transition_relation()
            .rename_vars(&|name| rename.get(name).cloned())
    }

    /// Move a formula over base state variables to depth `depth`.
    pub fn state_formula(&self, f: &SmtTerm, depth: usize) -> SmtTerm {
        if depth == 0 {
            return f.clone();
        }
        let rename: HashMap<&str, String> = self
            .system
            .state_vars()
            .iter()
            .map(|(name, _)| (name.as_str(), indexed(name, depth)))
            .collect();
        f.rename_vars(&|name| rename.get(name).cloned())
    }

    /// Move a formula over the depth-`depth` copies back to base names.
    #[cfg(test)]
    fn base_formula(&self, f: &SmtTerm, depth: usize) -> SmtTerm {
        if depth == 0 {
            return f.clone();
        }
        let rename: HashMap<String, String> = self
            .system
            .state_vars()
            .iter()
            .map(|(name, _)| (indexed(name, depth), name.clone()))
            .collect();
        f.rename_vars(&|name| rename.get(name).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;

    fn helper() -> Result<TraceHelper, EngineError> {
        let system = TransitionSystem::new(
            vec![("x".into(), SmtSort::Int)],
            vec![("i".into(), SmtSort::Bool)],
            SmtTerm::var("x").eq(SmtTerm::int(0)),
            SmtTerm::var("x'").eq(SmtTerm::Ite(
                Box::new(SmtTerm::var("i")),
                Box::new(SmtTerm::var("x").add(SmtTerm::int(1))),
                Box::new(SmtTerm::var("x")),
            )),
        )?;
        Ok(TraceHelper::new(Arc::new(system)))
    }

    #[test]
    fn depth_zero_uses_base_names() -> Result<(), EngineError> {
        let trace = helper()?;
        assert_eq!(trace.state_variables(0), vec![("x".to_string(), SmtSort::Int)]);
        assert_eq!(trace.state_variables(2), vec![("x@2".to_string(), SmtSort::Int)]);
        assert_eq!(trace.input_variables(1), vec![("i@1".to_string(), SmtSort::Bool)]);
        Ok(())
    }

    #[test]
    fn transition_formula_links_consecutive_depths() -> Result<(), EngineError> {
        let trace = helper()?;
        let t1 = trace.transition_formula(1);
        let vars: Vec<String> = t1.vars().into_iter().collect();
        assert_eq!(vars, vec!["i@1", "x@1", "x@2"]);
        let t0 = trace.transition_formula(0);
        let vars: Vec<String> = t0.vars().into_iter().collect();
        assert_eq!(vars, vec!["i", "x", "x@1"]);
        Ok(())
    }

    #[test]
    fn state_and_base_formula_are_inverse() -> Result<(), EngineError> {
        let trace = helper()?;
        let f = SmtTerm::var("x").ge(SmtTerm::int(0));
        let at3 = trace.state_formula(&f, 3);
        assert_eq!(at3, SmtTerm::var("x@3").ge(SmtTerm::int(0)));
        assert_eq!(trace.base_formula(&at3, 3), f);
        Ok(())
    }
}
