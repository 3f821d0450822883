use serde::{Deserialize, Serialize};

/// SMT sorts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SmtSort {
    Bool,
    Int,
    Real,
}

impl SmtSort {
    pub fn is_arithmetic(&self) -> bool {
        matches!(self, SmtSort::Int | SmtSort::Real)
    }
}

impl std::fmt::Display for SmtSort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SmtSort::Bool => write!(f, "Bool"),
            SmtSort::Int => write!(f, "Int"),
            SmtSort::Real => write!(f, "Real"),
        }
    }
}
