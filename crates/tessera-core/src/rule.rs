//! # Rules
//!
//! A rule is plain data: an IRI and eight pattern lists.
//!
//! | Side | Partition | Positive | Negative |
//! |---|---|---|---|
//! | antecedent | source | must match | conjunctions that must not all match |
//! | antecedent | meta | must match | conjunctions that must not all match |
//! | consequent | target | quads to add | quads to remove |
//! | consequent | meta | quads to add | quads to remove |
//!
//! Source and meta patterns differ only in the graphs they name; the
//! matcher sees one combined pattern set.

use crate::matcher::PatternSet;
use crate::types::{Quad, TesseraError};

/// A production rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    iri: String,
    antecedent_source_positives: Vec<Quad>,
    antecedent_source_negatives: Vec<Vec<Quad>>,
    antecedent_meta_positives: Vec<Quad>,
    antecedent_meta_negatives: Vec<Vec<Quad>>,
    consequent_target_positives: Vec<Quad>,
    consequent_target_negatives: Vec<Quad>,
    consequent_meta_positives: Vec<Quad>,
    consequent_meta_negatives: Vec<Quad>,
}

impl Rule {
    /// Start building a rule identified by `iri`.
    #[must_use]
    pub fn builder(iri: &str) -> RuleBuilder {
        RuleBuilder {
            rule: Self {
                iri: iri.to_string(),
                antecedent_source_positives: Vec::new(),
                antecedent_source_negatives: Vec::new(),
                antecedent_meta_positives: Vec::new(),
                antecedent_meta_negatives: Vec::new(),
                consequent_target_positives: Vec::new(),
                consequent_target_negatives: Vec::new(),
                consequent_meta_positives: Vec::new(),
                consequent_meta_negatives: Vec::new(),
            },
        }
    }

    #[must_use]
    pub fn iri(&self) -> &str {
        &self.iri
    }

    #[must_use]
    pub fn antecedent_source_positives(&self) -> &[Quad] {
        &self.antecedent_source_positives
    }

    #[must_use]
    pub fn antecedent_source_negatives(&self) -> &[Vec<Quad>] {
        &self.antecedent_source_negatives
    }

    #[must_use]
    pub fn antecedent_meta_positives(&self) -> &[Quad] {
        &self.antecedent_meta_positives
    }

    #[must_use]
    pub fn antecedent_meta_negatives(&self) -> &[Vec<Quad>] {
        &self.antecedent_meta_negatives
    }

    #[must_use]
    pub fn consequent_target_positives(&self) -> &[Quad] {
        &self.consequent_target_positives
    }

    #[must_use]
    pub fn consequent_target_negatives(&self) -> &[Quad] {
        &self.consequent_target_negatives
    }

    #[must_use]
    pub fn consequent_meta_positives(&self) -> &[Quad] {
        &self.consequent_meta_positives
    }

    #[must_use]
    pub fn consequent_meta_negatives(&self) -> &[Quad] {
        &self.consequent_meta_negatives
    }

    /// Patterns whose instances a firing adds.
    pub fn productions(&self) -> impl Iterator<Item = &Quad> {
        self.consequent_target_positives
            .iter()
            .chain(&self.consequent_meta_positives)
    }

    /// Patterns whose instances a firing removes.
    pub fn retractions(&self) -> impl Iterator<Item = &Quad> {
        self.consequent_target_negatives
            .iter()
            .chain(&self.consequent_meta_negatives)
    }

    /// The combined antecedent handed to the matcher.
    #[must_use]
    pub fn pattern_set(&self) -> PatternSet {
        let positives = self
            .antecedent_source_positives
            .iter()
            .chain(&self.antecedent_meta_positives)
            .cloned()
            .collect();
        let negatives = self
            .antecedent_source_negatives
            .iter()
            .chain(&self.antecedent_meta_negatives)
            .cloned()
            .collect();
        PatternSet::new(positives, negatives)
    }

    /// Check that the rule can be registered.
    pub fn validate(&self) -> Result<(), TesseraError> {
        if self.iri.is_empty() {
            return Err(TesseraError::InvalidRule("rule IRI is empty".to_string()));
        }
        if self.antecedent_source_positives.is_empty() && self.antecedent_meta_positives.is_empty() {
            return Err(TesseraError::InvalidRule(format!(
                "{} has no positive antecedent pattern",
                self.iri
            )));
        }
        let empty_conjunction = self
            .antecedent_source_negatives
            .iter()
            .chain(&self.antecedent_meta_negatives)
            .any(Vec::is_empty);
        if empty_conjunction {
            return Err(TesseraError::InvalidRule(format!(
                "{} has an empty negative conjunction",
                self.iri
            )));
        }
        Ok(())
    }
}

/// Builder for `Rule`.
#[derive(Debug, Clone)]
pub struct RuleBuilder {
    rule: Rule,
}

impl RuleBuilder {
    #[must_use]
    pub fn antecedent_source_positive(mut self, pattern: Quad) -> Self {
        self.rule.antecedent_source_positives.push(pattern);
        self
    }

    #[must_use]
    pub fn antecedent_source_negative(mut self, conjunction: Vec<Quad>) -> Self {
        self.rule.antecedent_source_negatives.push(conjunction);
        self
    }

    #[must_use]
    pub fn antecedent_meta_positive(mut self, pattern: Quad) -> Self {
        self.rule.antecedent_meta_positives.push(pattern);
        self
    }

    #[must_use]
    pub fn antecedent_meta_negative(mut self, conjunction: Vec<Quad>) -> Self {
        self.rule.antecedent_meta_negatives.push(conjunction);
        self
    }

    #[must_use]
    pub fn consequent_target_positive(mut self, pattern: Quad) -> Self {
        self.rule.consequent_target_positives.push(pattern);
        self
    }

    #[must_use]
    pub fn consequent_target_negative(mut self, pattern: Quad) -> Self {
        self.rule.consequent_target_negatives.push(pattern);
        self
    }

    #[must_use]
    pub fn consequent_meta_positive(mut self, pattern: Quad) -> Self {
        self.rule.consequent_meta_positives.push(pattern);
        self
    }

    #[must_use]
    pub fn consequent_meta_negative(mut self, pattern: Quad) -> Self {
        self.rule.consequent_meta_negatives.push(pattern);
        self
    }

    #[must_use]
    pub fn build(self) -> Rule {
        self.rule
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::NodeFactory;
    use crate::types::Node;

    #[test]
    fn pattern_set_combines_partitions() {
        let mut nodes = NodeFactory::new();
        let g = nodes.iri("http://example.org/g");
        let meta = nodes.iri("http://example.org/meta");
        let p = nodes.iri("http://example.org/p");
        let source = Quad::new(g.clone(), Node::variable("x"), p.clone(), Node::variable("y"));
        let tag = Quad::new(meta, Node::variable("x"), p.clone(), Node::variable("t"));
        let blocked = Quad::new(g, Node::variable("y"), p, Node::variable("z"));

        let rule = Rule::builder("http://example.org/rule")
            .antecedent_source_positive(source.clone())
            .antecedent_meta_positive(tag.clone())
            .antecedent_source_negative(vec![blocked.clone()])
            .build();

        let patterns = rule.pattern_set();
        assert_eq!(patterns.positives(), &[source, tag]);
        assert_eq!(patterns.negatives(), &[vec![blocked]]);
        assert!(rule.validate().is_ok());
    }

    #[test]
    fn rule_without_positive_is_invalid() {
        let rule = Rule::builder("http://example.org/empty").build();
        assert!(matches!(rule.validate(), Err(TesseraError::InvalidRule(_))));
    }

    #[test]
    fn empty_negative_conjunction_is_invalid() {
        let mut nodes = NodeFactory::new();
        let g = nodes.iri("http://example.org/g");
        let p = nodes.iri("http://example.org/p");
        let rule = Rule::builder("http://example.org/rule")
            .antecedent_source_positive(Quad::new(g, Node::variable("x"), p, Node::variable("y")))
            .antecedent_source_negative(Vec::new())
            .build();

        assert!(matches!(rule.validate(), Err(TesseraError::InvalidRule(_))));
    }
}
