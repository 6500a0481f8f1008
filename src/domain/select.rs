use std::fmt;
use std::str::FromStr;

use rand::seq::IndexedRandom;

use crate::domain::matcher::MatchResult;

/// Strategy for picking one cluster out of several that can run a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionAlgorithm {
    #[default]
    Random,
}

impl FromStr for SelectionAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "random" => Ok(SelectionAlgorithm::Random),
            other => Err(format!("Unknown selection algorithm '{}'. Supported: random", other)),
        }
    }
}

impl fmt::Display for SelectionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionAlgorithm::Random => write!(f, "random"),
        }
    }
}

/// Picks one of the satisfied results. Returns `None` when nothing matched.
pub fn select<'a>(algorithm: SelectionAlgorithm, matches: &[&'a MatchResult]) -> Option<&'a MatchResult> {
    let candidates: Vec<&'a MatchResult> = matches.iter().copied().filter(|result| result.satisfied).collect();

    match algorithm {
        SelectionAlgorithm::Random => candidates.choose(&mut rand::rng()).copied(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::utils::id::ClusterName;

    fn result(name: &str, satisfied: bool) -> MatchResult {
        MatchResult { cluster: ClusterName::new(name), satisfied, trace: Vec::new(), reason: None }
    }

    #[test]
    fn test_random_only_returns_satisfied() {
        let a = result("a", false);
        let b = result("b", true);
        for _ in 0..20 {
            assert_eq!(select(SelectionAlgorithm::Random, &[&a, &b]).map(|r| r.cluster.to_string()), Some("b".to_string()));
        }
        assert!(select(SelectionAlgorithm::Random, &[&a]).is_none());
    }

    #[test]
    fn test_parse_algorithm() {
        assert_eq!("Random".parse::<SelectionAlgorithm>(), Ok(SelectionAlgorithm::Random));
        assert!("round-robin".parse::<SelectionAlgorithm>().is_err());
    }
}
