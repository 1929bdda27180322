//! Well-known vocabulary URIs

/// RDF vocabulary
pub mod rdf {
    /// Namespace URI
    pub const NAMESPACE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
    /// rdf:type
    pub const TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
    /// rdf:Property
    pub const PROPERTY: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#Property";
}

/// RDF Schema vocabulary
pub mod rdfs {
    /// Namespace URI
    pub const NAMESPACE: &str = "http://www.w3.org/2000/01/rdf-schema#";
    /// rdfs:subClassOf
    pub const SUB_CLASS_OF: &str = "http://www.w3.org/2000/01/rdf-schema#subClassOf";
    /// rdfs:subPropertyOf
    pub const SUB_PROPERTY_OF: &str = "http://www.w3.org/2000/01/rdf-schema#subPropertyOf";
    /// rdfs:domain
    pub const DOMAIN: &str = "http://www.w3.org/2000/01/rdf-schema#domain";
    /// rdfs:range
    pub const RANGE: &str = "http://www.w3.org/2000/01/rdf-schema#range";
    /// rdfs:label
    pub const LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";
}

/// XML Schema datatypes
pub mod xsd {
    /// Namespace URI
    pub const NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema#";
    /// xsd:string
    pub const STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
    /// xsd:integer
    pub const INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
    /// xsd:boolean
    pub const BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
}

/// Prefix bindings every rule program starts with
pub const DEFAULT_PREFIXES: &[(&str, &str)] = &[
    ("rdf", rdf::NAMESPACE),
    ("rdfs", rdfs::NAMESPACE),
    ("xsd", xsd::NAMESPACE),
];
