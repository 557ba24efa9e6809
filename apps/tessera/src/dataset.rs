//! # JSON Datasets
//!
//! The file format the CLI reads: quads, rules and queries as JSON.
//!
//! Nodes are externally tagged:
//!
//! ```json
//! {"iri": "http://example.org/alice"}
//! {"blank": "b0"}
//! {"literal": {"value": "42", "datatype": "http://www.w3.org/2001/XMLSchema#integer"}}
//! {"var": "x"}
//! ```
//!
//! A quad without `graph` lands in the default graph. Blank labels are scoped
//! to one load: the same label twice names the same blank node.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tessera_core::{
    Changeset, Node, NodeFactory, Quad, Query, Rule, Session, TesseraError, vocab,
};
use tracing::{debug, info};

/// Maximum dataset file size (100 MB).
pub const MAX_DATASET_FILE_SIZE: u64 = 100 * 1024 * 1024;

// =============================================================================
// JSON TYPES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeJson {
    Iri(String),
    Blank(String),
    Literal(LiteralJson),
    Var(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LiteralJson {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datatype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuadJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph: Option<NodeJson>,
    pub subject: NodeJson,
    pub property: NodeJson,
    pub object: NodeJson,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuleJson {
    pub iri: String,
    pub antecedent_source_positive: Vec<QuadJson>,
    pub antecedent_source_negative: Vec<Vec<QuadJson>>,
    pub antecedent_meta_positive: Vec<QuadJson>,
    pub antecedent_meta_negative: Vec<Vec<QuadJson>>,
    pub consequent_target_positive: Vec<QuadJson>,
    pub consequent_target_negative: Vec<QuadJson>,
    pub consequent_meta_positive: Vec<QuadJson>,
    pub consequent_meta_negative: Vec<QuadJson>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueryJson {
    pub positive: Vec<QuadJson>,
    pub negative: Vec<Vec<QuadJson>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatasetJson {
    pub quads: Vec<QuadJson>,
    pub rules: Vec<RuleJson>,
}

/// What loading a dataset did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    /// Quads that became present.
    pub quads_added: usize,
    pub rules_added: usize,
}

// =============================================================================
// FILE ACCESS
// =============================================================================

/// Read and parse a JSON document of type `T`, with a size limit.
pub fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, TesseraError> {
    let metadata = std::fs::metadata(path).map_err(|e| {
        TesseraError::Io(format!("Cannot read file metadata '{}': {}", path.display(), e))
    })?;
    if !metadata.is_file() {
        return Err(TesseraError::Io(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }
    if metadata.len() > MAX_DATASET_FILE_SIZE {
        return Err(TesseraError::Dataset(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            MAX_DATASET_FILE_SIZE
        )));
    }
    let text = std::fs::read_to_string(path)
        .map_err(|e| TesseraError::Io(format!("Cannot read '{}': {}", path.display(), e)))?;
    parse_json(&text)
}

/// Parse a JSON document of type `T`.
pub fn parse_json<T: for<'de> Deserialize<'de>>(text: &str) -> Result<T, TesseraError> {
    serde_json::from_str(text).map_err(|e| TesseraError::Dataset(e.to_string()))
}

// =============================================================================
// CONVERSION
// =============================================================================

/// Turns JSON nodes into interned nodes of one factory.
#[derive(Debug, Default)]
pub struct Resolver {
    blanks: BTreeMap<String, Node>,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&mut self, json: &NodeJson, nodes: &mut NodeFactory) -> Node {
        match json {
            NodeJson::Iri(iri) => nodes.iri(iri),
            NodeJson::Blank(label) => self
                .blanks
                .entry(label.clone())
                .or_insert_with(|| Node::from(nodes.blank_node()))
                .clone(),
            NodeJson::Literal(literal) => Node::from(nodes.literal_node(
                &literal.value,
                literal.datatype.as_deref(),
                literal.lang.as_deref(),
            )),
            NodeJson::Var(name) => Node::variable(name),
        }
    }

    pub fn quad(&mut self, json: &QuadJson, nodes: &mut NodeFactory) -> Quad {
        let graph = match &json.graph {
            Some(graph) => self.node(graph, nodes),
            None => nodes.iri(vocab::GRAPH_DEFAULT),
        };
        Quad::new(
            graph,
            self.node(&json.subject, nodes),
            self.node(&json.property, nodes),
            self.node(&json.object, nodes),
        )
    }

    fn quads(&mut self, json: &[QuadJson], nodes: &mut NodeFactory) -> Vec<Quad> {
        json.iter().map(|quad| self.quad(quad, nodes)).collect()
    }

    /// Build a rule. Validation happens when the rule is registered.
    pub fn rule(&mut self, json: &RuleJson, nodes: &mut NodeFactory) -> Rule {
        let mut builder = Rule::builder(&json.iri);
        for quad in self.quads(&json.antecedent_source_positive, nodes) {
            builder = builder.antecedent_source_positive(quad);
        }
        for conjunction in &json.antecedent_source_negative {
            builder = builder.antecedent_source_negative(self.quads(conjunction, nodes));
        }
        for quad in self.quads(&json.antecedent_meta_positive, nodes) {
            builder = builder.antecedent_meta_positive(quad);
        }
        for conjunction in &json.antecedent_meta_negative {
            builder = builder.antecedent_meta_negative(self.quads(conjunction, nodes));
        }
        for quad in self.quads(&json.consequent_target_positive, nodes) {
            builder = builder.consequent_target_positive(quad);
        }
        for quad in self.quads(&json.consequent_target_negative, nodes) {
            builder = builder.consequent_target_negative(quad);
        }
        for quad in self.quads(&json.consequent_meta_positive, nodes) {
            builder = builder.consequent_meta_positive(quad);
        }
        for quad in self.quads(&json.consequent_meta_negative, nodes) {
            builder = builder.consequent_meta_negative(quad);
        }
        builder.build()
    }

    pub fn query(&mut self, json: &QueryJson, nodes: &mut NodeFactory) -> Query {
        let mut query = Query::new();
        for quad in self.quads(&json.positive, nodes) {
            query = query.positive(quad);
        }
        for conjunction in &json.negative {
            query = query.negative(self.quads(conjunction, nodes));
        }
        query
    }
}

impl DatasetJson {
    /// Load the rules, then every quad as one batch.
    ///
    /// Rules go first so the engine reaches fixpoint in a single flush.
    pub fn load_into(&self, session: &mut Session) -> Result<LoadSummary, TesseraError> {
        let mut resolver = Resolver::new();

        for json in &self.rules {
            let rule = resolver.rule(json, session.nodes_mut());
            debug!(rule = %json.iri, "loading rule");
            session.add_rule(rule)?;
        }

        let quads = resolver.quads(&self.quads, session.nodes_mut());
        for quad in &quads {
            if !quad.is_ground() {
                return Err(TesseraError::Dataset(format!(
                    "Data quad contains a variable: {}",
                    quad
                )));
            }
        }
        let applied = session.insert(&Changeset::new(quads, Vec::new()))?;

        let summary = LoadSummary {
            quads_added: applied.added().len(),
            rules_added: self.rules.len(),
        };
        info!(
            quads = summary.quads_added,
            rules = summary.rules_added,
            "dataset loaded"
        );
        Ok(summary)
    }
}
