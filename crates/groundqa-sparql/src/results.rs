//! SPARQL 1.1 JSON result sets (`application/sparql-results+json`).
//!
//! The endpoint is untrusted: its body is decoded into a raw shape first and
//! then checked against the [`FactSet`] invariants before anything downstream
//! sees it.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::error::GraphServiceError;

/// RDF term kind as tagged by the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TermKind {
    Uri,
    Literal,
    /// Pre-1.1 Virtuoso spelling of a literal with a datatype.
    TypedLiteral,
    Bnode,
}

/// One bound value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    #[serde(rename = "type")]
    pub kind: TermKind,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datatype: Option<String>,
    #[serde(rename = "xml:lang", default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
}

impl Term {
    pub fn uri(value: impl Into<String>) -> Self {
        Self {
            kind: TermKind::Uri,
            value: value.into(),
            datatype: None,
            lang: None,
        }
    }

    pub fn literal(value: impl Into<String>) -> Self {
        Self {
            kind: TermKind::Literal,
            value: value.into(),
            datatype: None,
            lang: None,
        }
    }

    /// Short human form: local name for IRIs, lexical form otherwise.
    pub fn display_value(&self) -> &str {
        match self.kind {
            TermKind::Uri => self
                .value
                .rsplit(['#', '/'])
                .find(|s| !s.is_empty())
                .unwrap_or(&self.value),
            _ => &self.value,
        }
    }
}

/// One result row: variable name → term. Unbound variables are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Binding(BTreeMap<String, Term>);

impl Binding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, var: impl Into<String>, term: Term) -> Self {
        self.0.insert(var.into(), term);
        self
    }

    pub fn get(&self, var: &str) -> Option<&Term> {
        self.0.get(var)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Term)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The facts returned by executing one structured query.
///
/// Invariants: `vars` has no duplicates, every binding key is a declared
/// variable, `bindings` keeps endpoint order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FactSet {
    vars: Vec<String>,
    bindings: Vec<Binding>,
}

impl FactSet {
    pub fn new(vars: Vec<String>, bindings: Vec<Binding>) -> Result<Self, GraphServiceError> {
        let mut seen = HashSet::new();
        for var in &vars {
            if !seen.insert(var.as_str()) {
                return Err(GraphServiceError::InvalidResultSet(format!(
                    "variable {var:?} declared twice in head.vars"
                )));
            }
        }
        for (row, binding) in bindings.iter().enumerate() {
            if let Some((var, _)) = binding.iter().find(|(v, _)| !seen.contains(v.as_str())) {
                return Err(GraphServiceError::InvalidResultSet(format!(
                    "binding {row} uses undeclared variable {var:?}"
                )));
            }
        }
        Ok(Self { vars, bindings })
    }

    /// Decode and validate a `application/sparql-results+json` body.
    pub fn from_json_slice(body: &[u8]) -> Result<Self, GraphServiceError> {
        let raw: RawResultSet = serde_json::from_slice(body)
            .map_err(|e| GraphServiceError::InvalidResultSet(e.to_string()))?;
        Self::new(raw.head.vars, raw.results.bindings)
    }

    pub fn vars(&self) -> &[String] {
        &self.vars
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Zero bindings: a valid "no facts found" result, not an error.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// JSON array of the first `limit` bindings, in the endpoint's own shape.
    pub fn bindings_json(&self, limit: usize) -> String {
        let shown = &self.bindings[..self.bindings.len().min(limit)];
        serde_json::to_string(shown).unwrap_or_else(|_| "[]".to_string())
    }

    /// Re-encode in the full SPARQL JSON results shape.
    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::json!({
            "head": { "vars": self.vars },
            "results": { "bindings": self.bindings },
        })
    }
}

impl Serialize for FactSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        RawResultSet {
            head: RawHead {
                vars: self.vars.clone(),
            },
            results: RawBindings {
                bindings: self.bindings.clone(),
            },
        }
        .serialize(serializer)
    }
}

#[derive(Serialize, Deserialize)]
struct RawResultSet {
    head: RawHead,
    results: RawBindings,
}

#[derive(Serialize, Deserialize)]
struct RawHead {
    vars: Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct RawBindings {
    bindings: Vec<Binding>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIRECTOR: &str = r#"{
        "head": { "link": [], "vars": ["film", "director"] },
        "results": { "distinct": false, "ordered": true, "bindings": [
            { "film": { "type": "uri", "value": "http://dbpedia.org/resource/Inception" },
              "director": { "type": "uri", "value": "http://dbpedia.org/resource/Christopher_Nolan" } }
        ] }
    }"#;

    #[test]
    fn parses_dbpedia_shape() {
        let facts = FactSet::from_json_slice(DIRECTOR.as_bytes()).unwrap();
        assert_eq!(facts.vars(), &["film".to_string(), "director".to_string()]);
        assert_eq!(facts.len(), 1);
        let director = facts.bindings()[0].get("director").unwrap();
        assert_eq!(director.kind, TermKind::Uri);
        assert_eq!(director.display_value(), "Christopher_Nolan");
    }

    #[test]
    fn typed_literal_and_lang_tags() {
        let body = r#"{
            "head": { "vars": ["runtime", "label"] },
            "results": { "bindings": [
                { "runtime": { "type": "typed-literal", "datatype": "http://www.w3.org/2001/XMLSchema#double", "value": "8880.0" },
                  "label": { "type": "literal", "xml:lang": "en", "value": "Inception" } }
            ] }
        }"#;
        let facts = FactSet::from_json_slice(body.as_bytes()).unwrap();
        let row = &facts.bindings()[0];
        assert_eq!(row.get("runtime").unwrap().kind, TermKind::TypedLiteral);
        assert_eq!(row.get("label").unwrap().lang.as_deref(), Some("en"));
    }

    #[test]
    fn empty_bindings_are_valid() {
        let body = r#"{ "head": { "vars": ["x"] }, "results": { "bindings": [] } }"#;
        let facts = FactSet::from_json_slice(body.as_bytes()).unwrap();
        assert!(facts.is_empty());
        assert_eq!(facts.bindings_json(10), "[]");
    }

    #[test]
    fn rejects_shape_mismatches() {
        let cases = [
            r#"{ "results": { "bindings": [] } }"#,
            r#"{ "head": { "vars": ["x"] } }"#,
            r#"{ "head": { "vars": ["x", "x"] }, "results": { "bindings": [] } }"#,
            r#"{ "head": { "vars": ["x"] }, "results": { "bindings": [ { "y": { "type": "uri", "value": "u" } } ] } }"#,
            r#"{ "head": { "vars": ["x"] }, "results": { "bindings": [ { "x": { "type": "triple", "value": "u" } } ] } }"#,
            r#"{ "head": {}, "boolean": true }"#,
            "<html>Virtuoso 37000 Error</html>",
        ];
        for body in cases {
            let err = FactSet::from_json_slice(body.as_bytes()).unwrap_err();
            assert!(
                matches!(err, GraphServiceError::InvalidResultSet(_)),
                "expected shape error for {body}"
            );
        }
    }

    #[test]
    fn bindings_json_respects_limit_and_order() {
        let bindings = (0..5)
            .map(|i| Binding::new().with("n", Term::literal(i.to_string())))
            .collect();
        let facts = FactSet::new(vec!["n".to_string()], bindings).unwrap();
        let json: serde_json::Value = serde_json::from_str(&facts.bindings_json(2)).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                { "n": { "type": "literal", "value": "0" } },
                { "n": { "type": "literal", "value": "1" } }
            ])
        );
    }
}
