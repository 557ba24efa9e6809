//! # Vocabulary
//!
//! Well-known IRIs used by the store, the entailment rules and the CLI.

// =============================================================================
// GRAPHS
// =============================================================================

/// Graph that dataset quads land in when none is given.
pub const GRAPH_DEFAULT: &str = "urn:tessera:graph:default";

/// Graph that entailment rules write into.
pub const GRAPH_INFERENCE: &str = "urn:tessera:graph:inference";

/// Graph reserved for rule metadata patterns.
pub const GRAPH_META: &str = "urn:tessera:graph:meta";

// =============================================================================
// RDF
// =============================================================================

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
pub const RDF_LANG_STRING: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#langString";

// =============================================================================
// RDFS
// =============================================================================

pub const RDFS_SUB_CLASS_OF: &str = "http://www.w3.org/2000/01/rdf-schema#subClassOf";
pub const RDFS_SUB_PROPERTY_OF: &str = "http://www.w3.org/2000/01/rdf-schema#subPropertyOf";
pub const RDFS_DOMAIN: &str = "http://www.w3.org/2000/01/rdf-schema#domain";
pub const RDFS_RANGE: &str = "http://www.w3.org/2000/01/rdf-schema#range";

// =============================================================================
// XSD
// =============================================================================

pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
pub const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
