//! Ontology store: the indexed, validated capability graph
//!
//! The store is built once per run and never mutated afterwards. It is
//! shared read-only (typically behind an `Arc`) by every checking task.

use crate::{
    CapabilityDocument, OntologyDocument, OntologyError, OntologyResult, SchemaResolver,
    SchemaSide, DEFAULT_MAX_REF_DEPTH,
};
use capability_types::{Capability, CapabilityId, Edge, EdgeKind, Layer};
use semver::Version;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;

// ── Loader ───────────────────────────────────────────────────────────

/// Builds an Ontology from a document, resolving every capability schema
#[derive(Clone, Debug)]
pub struct OntologyLoader {
    max_ref_depth: usize,
    documents: Vec<(String, Value)>,
}

impl OntologyLoader {
    pub fn new() -> Self {
        Self {
            max_ref_depth: DEFAULT_MAX_REF_DEPTH,
            documents: Vec::new(),
        }
    }

    pub fn with_max_ref_depth(mut self, depth: usize) -> Self {
        self.max_ref_depth = depth;
        self
    }

    /// Make an external schema document addressable as `name#/pointer`
    pub fn with_schema_document(mut self, name: impl Into<String>, document: Value) -> Self {
        self.documents.push((name.into(), document));
        self
    }

    /// Load an ontology from a YAML or JSON file
    pub fn load_path(&self, path: impl AsRef<Path>) -> OntologyResult<Ontology> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| OntologyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.load_str(&text)
    }

    /// Load an ontology from YAML or JSON text
    pub fn load_str(&self, text: &str) -> OntologyResult<Ontology> {
        let root: Value = serde_yaml::from_str(text)?;
        self.load_value(root)
    }

    /// Load an ontology from an already parsed document value
    pub fn load_value(&self, root: Value) -> OntologyResult<Ontology> {
        let document: OntologyDocument = serde_json::from_value(root.clone())?;

        let mut resolver = SchemaResolver::new(root).with_max_depth(self.max_ref_depth);
        for (name, value) in &self.documents {
            resolver.add_document(name.clone(), value.clone());
        }

        let version = Version::parse(&document.version).map_err(|source| {
            OntologyError::InvalidVersion {
                version: document.version.clone(),
                source,
            }
        })?;

        let mut capabilities = Vec::with_capacity(document.nodes.len());
        for node in document.nodes {
            capabilities.push(resolve_capability(&mut resolver, node)?);
        }

        let ontology = Ontology::new(version, capabilities, document.edges)?;
        tracing::info!(
            version = %ontology.version,
            capabilities = ontology.len(),
            edges = ontology.edges.len(),
            cached_refs = resolver.cached(),
            "Ontology loaded"
        );
        Ok(ontology)
    }
}

impl Default for OntologyLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn resolve_capability(
    resolver: &mut SchemaResolver,
    node: CapabilityDocument,
) -> OntologyResult<Capability> {
    let input = resolver
        .resolve(&node.input_schema)
        .map_err(|source| OntologyError::Schema {
            capability: node.id.clone(),
            side: SchemaSide::Input,
            source,
        })?;
    let output = resolver
        .resolve(&node.output_schema)
        .map_err(|source| OntologyError::Schema {
            capability: node.id.clone(),
            side: SchemaSide::Output,
            source,
        })?;

    Ok(Capability {
        id: CapabilityId::new(node.id),
        layer: node.layer,
        risk: node.risk,
        mutation: node.mutation,
        requires_approval: node.requires_approval,
        description: node.description,
        input_schema_ref: node.input_schema,
        output_schema_ref: node.output_schema,
        input,
        output,
    })
}

// ── Ontology ─────────────────────────────────────────────────────────

/// The validated capability ontology
#[derive(Clone, Debug)]
pub struct Ontology {
    version: Version,
    capabilities: HashMap<CapabilityId, Capability>,
    edges: Vec<Edge>,
    neighbors: HashMap<(CapabilityId, EdgeKind), Vec<CapabilityId>>,
}

impl Ontology {
    /// Index and validate a set of capabilities and edges
    pub fn new(
        version: Version,
        capabilities: Vec<Capability>,
        edges: Vec<Edge>,
    ) -> OntologyResult<Self> {
        let mut index = HashMap::with_capacity(capabilities.len());
        for capability in capabilities {
            if !CapabilityId::is_well_formed(capability.id.as_str()) {
                return Err(OntologyError::MalformedCapabilityId(capability.id.0));
            }
            if index.contains_key(&capability.id) {
                return Err(OntologyError::DuplicateCapability(capability.id.0));
            }
            index.insert(capability.id.clone(), capability);
        }

        let mut neighbors: HashMap<(CapabilityId, EdgeKind), Vec<CapabilityId>> = HashMap::new();
        for edge in &edges {
            neighbors
                .entry((edge.from.clone(), edge.kind))
                .or_default()
                .push(edge.to.clone());
        }

        let ontology = Self {
            version,
            capabilities: index,
            edges,
            neighbors,
        };
        ontology.validate()?;
        Ok(ontology)
    }

    /// Check the edge graph: endpoints exist, symmetric kinds are declared
    /// both ways and `requires` is acyclic.
    pub fn validate(&self) -> OntologyResult<()> {
        let declared: HashSet<&Edge> = self.edges.iter().collect();

        for edge in &self.edges {
            for endpoint in [&edge.from, &edge.to] {
                if !self.capabilities.contains_key(endpoint) {
                    return Err(OntologyError::UnknownEdgeEndpoint {
                        from: edge.from.0.clone(),
                        to: edge.to.0.clone(),
                        kind: edge.kind,
                        missing: endpoint.0.clone(),
                    });
                }
            }
            if edge.kind.is_symmetric() && !declared.contains(&edge.reversed()) {
                return Err(OntologyError::AsymmetricEdge {
                    from: edge.from.0.clone(),
                    to: edge.to.0.clone(),
                    kind: edge.kind,
                });
            }
        }

        if let Some(cycle) = self.find_requires_cycle() {
            return Err(OntologyError::RequiresCycle(cycle.join(" -> ")));
        }
        Ok(())
    }

    fn find_requires_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        fn visit<'a>(
            ontology: &'a Ontology,
            id: &'a CapabilityId,
            marks: &mut HashMap<&'a CapabilityId, Mark>,
            path: &mut Vec<&'a CapabilityId>,
        ) -> Option<Vec<String>> {
            match marks.get(id) {
                Some(Mark::Done) => return None,
                Some(Mark::Visiting) => {
                    let start = path.iter().position(|p| *p == id).unwrap_or(0);
                    let mut cycle: Vec<String> =
                        path[start..].iter().map(|p| p.0.clone()).collect();
                    cycle.push(id.0.clone());
                    return Some(cycle);
                }
                None => {}
            }
            marks.insert(id, Mark::Visiting);
            path.push(id);
            let mut targets: Vec<&CapabilityId> =
                ontology.neighbors(id.as_str(), EdgeKind::Requires).iter().collect();
            targets.sort();
            for target in targets {
                if let Some(cycle) = visit(ontology, target, marks, path) {
                    return Some(cycle);
                }
            }
            path.pop();
            marks.insert(id, Mark::Done);
            None
        }

        let mut marks = HashMap::new();
        let mut path = Vec::new();
        for id in self.ids() {
            if let Some(cycle) = visit(self, id, &mut marks, &mut path) {
                return Some(cycle);
            }
        }
        None
    }

    /// Ontology version
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Whether a workflow authored against `declared` can be checked
    /// against this ontology (same major version). Partial versions such
    /// as `1` or `1.2` are accepted.
    pub fn is_compatible_with(&self, declared: &str) -> Result<bool, semver::Error> {
        let declared = declared.trim().trim_start_matches('v');
        let padded = match declared.matches('.').count() {
            0 => format!("{}.0.0", declared),
            1 => format!("{}.0", declared),
            _ => declared.to_string(),
        };
        let declared = Version::parse(&padded)?;
        Ok(declared.major == self.version.major)
    }

    /// Look up a capability by id
    pub fn get(&self, id: &str) -> Option<&Capability> {
        self.capabilities.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.capabilities.contains_key(id)
    }

    /// Number of capabilities
    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// Capability ids in sorted order
    pub fn ids(&self) -> Vec<&CapabilityId> {
        let mut ids: Vec<&CapabilityId> = self.capabilities.keys().collect();
        ids.sort();
        ids
    }

    /// All edges in declaration order
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Targets of the outgoing edges of `id` with the given kind
    pub fn neighbors(&self, id: &str, kind: EdgeKind) -> &[CapabilityId] {
        self.neighbors
            .get(&(CapabilityId::new(id), kind))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Capabilities declared substitutable for `id`
    pub fn alternatives(&self, id: &str) -> &[CapabilityId] {
        self.neighbors(id, EdgeKind::AlternativeTo)
    }

    /// Whether two capabilities are declared as conflicting
    pub fn conflicts(&self, a: &str, b: &str) -> bool {
        self.neighbors(a, EdgeKind::ConflictsWith)
            .iter()
            .any(|c| c.as_str() == b)
    }

    /// Distinct ordering constraints as `(earlier, later)` pairs, with
    /// `follows` normalized to `precedes`
    pub fn ordering_constraints(&self) -> Vec<(&CapabilityId, &CapabilityId)> {
        let pairs: BTreeSet<_> = self.edges.iter().filter_map(Edge::ordering).collect();
        pairs.into_iter().collect()
    }

    /// Number of capabilities per layer
    pub fn layer_counts(&self) -> BTreeMap<Layer, usize> {
        let mut counts = BTreeMap::new();
        for capability in self.capabilities.values() {
            *counts.entry(capability.layer).or_insert(0) += 1;
        }
        counts
    }

    /// Number of edges per kind
    pub fn edge_counts(&self) -> BTreeMap<EdgeKind, usize> {
        let mut counts = BTreeMap::new();
        for edge in &self.edges {
            *counts.entry(edge.kind).or_insert(0) += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capability_types::{PathSegment, Risk, SchemaNode};

    const ONTOLOGY: &str = r##"
version: "1.2.0"
definitions:
  FileList:
    type: array
    items: {type: string}
nodes:
  - id: search
    layer: PERCEIVE
    input_schema:
      type: object
      properties:
        query: {type: string}
      required: [query]
    output_schema:
      type: object
      properties:
        files: {$ref: "#/definitions/FileList"}
  - id: retrieve
    layer: perceive
  - id: detect
    layer: understand
    risk: medium
  - id: mutate
    layer: execute
    risk: high
    mutation: true
    requires_approval: true
  - id: checkpoint
    layer: execute
edges:
  - {from: detect, to: search, type: requires}
  - {from: search, to: retrieve, type: alternative_to}
  - {from: retrieve, to: search, type: alternative_to}
  - {from: checkpoint, to: mutate, type: precedes}
"##;

    fn load(text: &str) -> OntologyResult<Ontology> {
        OntologyLoader::new().load_str(text)
    }

    #[test]
    fn test_load_and_lookup() {
        let ontology = load(ONTOLOGY).unwrap();
        assert_eq!(ontology.len(), 5);
        assert_eq!(ontology.version(), &Version::new(1, 2, 0));

        let search = ontology.get("search").unwrap();
        assert_eq!(search.layer, Layer::Perceive);
        assert_eq!(
            search
                .output
                .walk(&[PathSegment::Field("files".into())])
                .unwrap(),
            SchemaNode::array_of(SchemaNode::string())
        );
        assert_eq!(search.required_inputs(), vec!["query"]);

        let mutate = ontology.get("mutate").unwrap();
        assert!(mutate.mutation);
        assert!(mutate.requires_approval);
        assert_eq!(mutate.risk, Risk::High);
        assert!(ontology.get("missing").is_none());
    }

    #[test]
    fn test_neighbors() {
        let ontology = load(ONTOLOGY).unwrap();
        assert_eq!(
            ontology.neighbors("detect", EdgeKind::Requires),
            &[CapabilityId::new("search")]
        );
        assert_eq!(ontology.alternatives("search"), &[CapabilityId::new("retrieve")]);
        assert!(ontology.neighbors("search", EdgeKind::Requires).is_empty());
        assert_eq!(ontology.ordering_constraints().len(), 1);
    }

    #[test]
    fn test_ordering_declared_both_ways() {
        let text = ONTOLOGY.replace(
            "  - {from: checkpoint, to: mutate, type: precedes}\n",
            "  - {from: checkpoint, to: mutate, type: precedes}\n  - {from: mutate, to: checkpoint, type: follows}\n",
        );
        let ontology = load(&text).unwrap();
        assert_eq!(
            ontology.ordering_constraints(),
            vec![(&CapabilityId::new("checkpoint"), &CapabilityId::new("mutate"))]
        );
    }

    #[test]
    fn test_counts() {
        let ontology = load(ONTOLOGY).unwrap();
        let layers = ontology.layer_counts();
        assert_eq!(layers[&Layer::Perceive], 2);
        assert_eq!(layers[&Layer::Execute], 2);
        let edges = ontology.edge_counts();
        assert_eq!(edges[&EdgeKind::AlternativeTo], 2);
    }

    #[test]
    fn test_asymmetric_alternative_rejected() {
        let text = ONTOLOGY.replace(
            "  - {from: retrieve, to: search, type: alternative_to}\n",
            "",
        );
        assert!(matches!(
            load(&text),
            Err(OntologyError::AsymmetricEdge {
                kind: EdgeKind::AlternativeTo,
                ..
            })
        ));
    }

    #[test]
    fn test_requires_cycle_rejected() {
        let text = format!("{}  - {{from: search, to: detect, type: requires}}\n", ONTOLOGY);
        match load(&text) {
            Err(OntologyError::RequiresCycle(cycle)) => {
                assert!(cycle.contains("detect"));
                assert!(cycle.contains("search"));
            }
            other => panic!("expected requires cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_endpoint_rejected() {
        let text = format!("{}  - {{from: search, to: ghost, type: precedes}}\n", ONTOLOGY);
        assert!(matches!(
            load(&text),
            Err(OntologyError::UnknownEdgeEndpoint { ref missing, .. }) if missing == "ghost"
        ));
    }

    #[test]
    fn test_duplicate_capability_rejected() {
        let text = ONTOLOGY.replace("  - id: retrieve", "  - id: search");
        assert!(matches!(load(&text), Err(OntologyError::DuplicateCapability(_))));
    }

    #[test]
    fn test_unresolved_schema_is_fatal() {
        let text = ONTOLOGY.replace("#/definitions/FileList", "#/definitions/Nope");
        assert!(matches!(
            load(&text),
            Err(OntologyError::Schema {
                side: SchemaSide::Output,
                ..
            })
        ));
    }

    #[test]
    fn test_version_compatibility() {
        let ontology = load(ONTOLOGY).unwrap();
        assert!(ontology.is_compatible_with("1.0.0").unwrap());
        assert!(ontology.is_compatible_with("v1.9.3").unwrap());
        assert!(ontology.is_compatible_with("1.4").unwrap());
        assert!(!ontology.is_compatible_with("2.0.0").unwrap());
        assert!(ontology.is_compatible_with("one").is_err());
    }

    #[test]
    fn test_load_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ontology.yaml");
        std::fs::write(&path, ONTOLOGY).unwrap();
        let ontology = OntologyLoader::new().load_path(&path).unwrap();
        assert!(ontology.contains("checkpoint"));

        let missing = OntologyLoader::new().load_path(dir.path().join("missing.yaml"));
        assert!(matches!(missing, Err(OntologyError::Io { .. })));
    }
}
