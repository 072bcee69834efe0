//! Ontology edges: typed relations between capabilities

use crate::CapabilityId;
use serde::{Deserialize, Serialize};

/// The kind of relation an ontology edge expresses
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Hard dependency: the target must appear earlier in the workflow
    Requires,
    /// Advisory dependency
    SoftRequires,
    /// Ordering only: the source must come before the target
    Precedes,
    /// Ordering only: the source must come after the target
    Follows,
    /// The two capabilities must not co-occur in a workflow
    ConflictsWith,
    /// The two capabilities are substitutable
    AlternativeTo,
}

impl EdgeKind {
    pub const ALL: [EdgeKind; 6] = [
        EdgeKind::Requires,
        EdgeKind::SoftRequires,
        EdgeKind::Precedes,
        EdgeKind::Follows,
        EdgeKind::ConflictsWith,
        EdgeKind::AlternativeTo,
    ];

    /// Symmetric kinds must be declared in both directions
    pub fn is_symmetric(&self) -> bool {
        matches!(self, Self::ConflictsWith | Self::AlternativeTo)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requires => "requires",
            Self::SoftRequires => "soft_requires",
            Self::Precedes => "precedes",
            Self::Follows => "follows",
            Self::ConflictsWith => "conflicts_with",
            Self::AlternativeTo => "alternative_to",
        }
    }
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directed edge between two capabilities
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub from: CapabilityId,
    pub to: CapabilityId,
    #[serde(rename = "type", alias = "kind")]
    pub kind: EdgeKind,
}

impl Edge {
    pub fn new(from: impl Into<String>, to: impl Into<String>, kind: EdgeKind) -> Self {
        Self {
            from: CapabilityId::new(from),
            to: CapabilityId::new(to),
            kind,
        }
    }

    /// The same relation declared in the opposite direction
    pub fn reversed(&self) -> Self {
        Self {
            from: self.to.clone(),
            to: self.from.clone(),
            kind: self.kind,
        }
    }

    /// The ordering this edge imposes as `(earlier, later)`, if any
    pub fn ordering(&self) -> Option<(&CapabilityId, &CapabilityId)> {
        match self.kind {
            EdgeKind::Precedes => Some((&self.from, &self.to)),
            EdgeKind::Follows => Some((&self.to, &self.from)),
            _ => None,
        }
    }
}

impl std::fmt::Display for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -[{}]-> {}", self.from, self.kind, self.to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symmetric_kinds() {
        assert!(EdgeKind::AlternativeTo.is_symmetric());
        assert!(EdgeKind::ConflictsWith.is_symmetric());
        assert!(!EdgeKind::Requires.is_symmetric());
        assert!(!EdgeKind::Precedes.is_symmetric());
    }

    #[test]
    fn test_ordering_normalizes_follows() {
        let precedes = Edge::new("checkpoint", "mutate", EdgeKind::Precedes);
        let follows = Edge::new("mutate", "checkpoint", EdgeKind::Follows);
        assert_eq!(precedes.ordering(), follows.ordering());
        assert!(Edge::new("a", "b", EdgeKind::Requires).ordering().is_none());
    }

    #[test]
    fn test_edge_deserialize() {
        let edge: Edge =
            serde_json::from_str(r#"{"from": "detect", "to": "search", "type": "requires"}"#)
                .unwrap();
        assert_eq!(edge.kind, EdgeKind::Requires);
        assert_eq!(edge.reversed().from.as_str(), "search");
        assert_eq!(edge.to_string(), "detect -[requires]-> search");
    }
}
