use serde::{Deserialize, Serialize};

/// Behaviour switches of the solver layer, fixed when the pool is built.
///
/// Field names serialize in kebab-case (`single-solver`, `check-deadlock`,
/// ...) and missing fields fall back to `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PdkindOptions {
    /// Use one shared reachability solver for all frames.
    pub single_solver: bool,
    /// Shrink generalizations with quickxplain.
    pub minimize_generalizations: bool,
    /// Shrink interpolation inputs and learned disjunctions with quickxplain.
    pub minimize_interpolants: bool,
    /// Re-check satisfiability after each lemma addition.
    pub check_deadlock: bool,
    /// Extract models for reachability queries.
    pub generate_models: bool,
}

impl PdkindOptions {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Which solver backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverChoice {
    #[default]
    Z3,
    Cvc5,
}
