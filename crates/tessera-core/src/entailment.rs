//! # Entailment
//!
//! Built-in rule sets. Entailment rules read every graph and write into
//! `vocab::GRAPH_INFERENCE`, so derived facts stay apart from asserted ones.

use crate::nodes::NodeFactory;
use crate::rule::Rule;
use crate::types::{Node, Quad};
use crate::vocab;
use serde::{Deserialize, Serialize};

/// Which built-in rules a session installs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntailmentRegime {
    #[default]
    None,
    Rdfs,
}

impl EntailmentRegime {
    /// The rules of this regime.
    pub fn rules(self, nodes: &mut NodeFactory) -> Vec<Rule> {
        match self {
            Self::None => Vec::new(),
            Self::Rdfs => rdfs_rules(nodes),
        }
    }
}

fn var(name: &str) -> Node {
    Node::variable(name)
}

/// The RDFS rules rdfs2, rdfs3, rdfs5, rdfs7, rdfs9 and rdfs11.
///
/// rdfs3 types the object of a ranged property; for a literal object the
/// firing is abandoned, since a literal cannot be a subject.
pub fn rdfs_rules(nodes: &mut NodeFactory) -> Vec<Rule> {
    let inferred = nodes.iri(vocab::GRAPH_INFERENCE);
    let rdf_type = nodes.iri(vocab::RDF_TYPE);
    let domain = nodes.iri(vocab::RDFS_DOMAIN);
    let range = nodes.iri(vocab::RDFS_RANGE);
    let sub_property = nodes.iri(vocab::RDFS_SUB_PROPERTY_OF);
    let sub_class = nodes.iri(vocab::RDFS_SUB_CLASS_OF);

    let schema = |subject: &str, property: &Node, object: &str| {
        Quad::new(var("gs"), var(subject), property.clone(), var(object))
    };
    let fact = |subject: &str, property: Node, object: Node| {
        Quad::new(var("gf"), var(subject), property, object)
    };
    let derived = |subject: &str, property: &Node, object: &str| {
        Quad::new(inferred.clone(), var(subject), property.clone(), var(object))
    };

    vec![
        Rule::builder("urn:tessera:rules:rdfs2")
            .antecedent_source_positive(schema("p", &domain, "c"))
            .antecedent_source_positive(fact("x", var("p"), var("y")))
            .consequent_target_positive(derived("x", &rdf_type, "c"))
            .build(),
        Rule::builder("urn:tessera:rules:rdfs3")
            .antecedent_source_positive(schema("p", &range, "c"))
            .antecedent_source_positive(fact("x", var("p"), var("y")))
            .consequent_target_positive(derived("y", &rdf_type, "c"))
            .build(),
        Rule::builder("urn:tessera:rules:rdfs5")
            .antecedent_source_positive(schema("p", &sub_property, "q"))
            .antecedent_source_positive(fact("q", sub_property.clone(), var("r")))
            .consequent_target_positive(derived("p", &sub_property, "r"))
            .build(),
        Rule::builder("urn:tessera:rules:rdfs7")
            .antecedent_source_positive(schema("p", &sub_property, "q"))
            .antecedent_source_positive(fact("x", var("p"), var("y")))
            .consequent_target_positive(Quad::new(inferred.clone(), var("x"), var("q"), var("y")))
            .build(),
        Rule::builder("urn:tessera:rules:rdfs9")
            .antecedent_source_positive(schema("c", &sub_class, "d"))
            .antecedent_source_positive(fact("x", rdf_type.clone(), var("c")))
            .consequent_target_positive(derived("x", &rdf_type, "d"))
            .build(),
        Rule::builder("urn:tessera:rules:rdfs11")
            .antecedent_source_positive(schema("c", &sub_class, "d"))
            .antecedent_source_positive(fact("d", sub_class.clone(), var("e")))
            .consequent_target_positive(derived("c", &sub_class, "e"))
            .build(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_has_no_rules() {
        let mut nodes = NodeFactory::new();
        assert!(EntailmentRegime::None.rules(&mut nodes).is_empty());
    }

    #[test]
    fn rdfs_rules_are_valid_and_distinct() {
        let mut nodes = NodeFactory::new();
        let rules = EntailmentRegime::Rdfs.rules(&mut nodes);

        assert_eq!(rules.len(), 6);
        for rule in &rules {
            assert!(rule.validate().is_ok(), "{} is invalid", rule.iri());
        }
        let mut iris: Vec<&str> = rules.iter().map(Rule::iri).collect();
        iris.dedup();
        assert_eq!(iris.len(), 6);
    }
}
