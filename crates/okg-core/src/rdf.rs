//! RDF term model
//!
//! Canonical, validated terms shared by the extractor and the graph store.
//! Conversions to and from `oxrdf` types are provided for the serializers.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use oxrdf::vocab::xsd;
use oxrdf::NamedNode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// IRI
// ============================================================================

/// Value object ensuring that supplied text is an absolute IRI.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Iri {
    value: String,
}

impl Iri {
    /// Validates and constructs a new [`Iri`].
    pub fn new(value: impl Into<String>) -> Result<Self, IriError> {
        let value = value.into();
        NamedNode::new(value.as_str()).map_err(|e| IriError::Invalid {
            value: value.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self { value })
    }

    /// Returns the underlying textual representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Fragment after the last `#`, or the whole IRI when there is none.
    pub fn local_name(&self) -> &str {
        self.value.rsplit('#').next().unwrap_or(&self.value)
    }

    /// Returns the local part if this IRI lives under `namespace`.
    pub fn strip_namespace(&self, namespace: &str) -> Option<&str> {
        self.value
            .strip_prefix(namespace)
            .filter(|local| !local.is_empty())
    }
}

impl Display for Iri {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl FromStr for Iri {
    type Err = IriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_owned())
    }
}

impl TryFrom<String> for Iri {
    type Error = IriError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Iri> for String {
    fn from(iri: Iri) -> Self {
        iri.value
    }
}

impl From<&Iri> for NamedNode {
    fn from(iri: &Iri) -> Self {
        NamedNode::new_unchecked(iri.as_str())
    }
}

impl From<NamedNode> for Iri {
    fn from(node: NamedNode) -> Self {
        Self {
            value: node.into_string(),
        }
    }
}

/// Errors produced when validating an [`Iri`].
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum IriError {
    /// The provided text could not be parsed as an absolute IRI.
    #[error("invalid IRI <{value}>: {reason}")]
    Invalid { value: String, reason: String },
}

// ============================================================================
// Literal
// ============================================================================

/// An RDF literal: lexical form plus optional language tag or datatype.
///
/// A language-tagged literal never carries a datatype and vice versa.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Literal {
    lexical: String,
    language: Option<String>,
    datatype: Option<Iri>,
}

impl Literal {
    /// Plain string literal
    pub fn simple(lexical: impl Into<String>) -> Self {
        Self {
            lexical: lexical.into(),
            language: None,
            datatype: None,
        }
    }

    /// Language-tagged literal; the tag is validated and normalized to lowercase
    pub fn language_tagged(
        lexical: impl Into<String>,
        language: impl Into<String>,
    ) -> Result<Self, TermError> {
        let lexical = lexical.into();
        let language = language.into();
        let checked = oxrdf::Literal::new_language_tagged_literal(lexical.as_str(), language.as_str())
            .map_err(|e| TermError::InvalidLanguageTag {
                tag: language.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            lexical,
            language: checked.language().map(str::to_owned),
            datatype: None,
        })
    }

    /// Typed literal; `xsd:string` collapses to a simple literal
    pub fn typed(lexical: impl Into<String>, datatype: Iri) -> Self {
        if datatype.as_str() == xsd::STRING.as_str() {
            return Self::simple(lexical);
        }
        Self {
            lexical: lexical.into(),
            language: None,
            datatype: Some(datatype),
        }
    }

    pub fn lexical(&self) -> &str {
        &self.lexical
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn datatype(&self) -> Option<&Iri> {
        self.datatype.as_ref()
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("\"")?;
        for c in self.lexical.chars() {
            match c {
                '"' => f.write_str("\\\"")?,
                '\\' => f.write_str("\\\\")?,
                '\n' => f.write_str("\\n")?,
                '\r' => f.write_str("\\r")?,
                other => write!(f, "{other}")?,
            }
        }
        f.write_str("\"")?;
        if let Some(language) = &self.language {
            write!(f, "@{language}")?;
        } else if let Some(datatype) = &self.datatype {
            write!(f, "^^<{datatype}>")?;
        }
        Ok(())
    }
}

impl From<&Literal> for oxrdf::Literal {
    fn from(literal: &Literal) -> Self {
        match (&literal.language, &literal.datatype) {
            (Some(language), _) => oxrdf::Literal::new_language_tagged_literal_unchecked(
                literal.lexical.as_str(),
                language.as_str(),
            ),
            (None, Some(datatype)) => {
                oxrdf::Literal::new_typed_literal(literal.lexical.as_str(), NamedNode::from(datatype))
            }
            (None, None) => oxrdf::Literal::new_simple_literal(literal.lexical.as_str()),
        }
    }
}

impl From<&oxrdf::Literal> for Literal {
    fn from(literal: &oxrdf::Literal) -> Self {
        if let Some(language) = literal.language() {
            return Self {
                lexical: literal.value().to_owned(),
                language: Some(language.to_owned()),
                datatype: None,
            };
        }
        Self::typed(
            literal.value(),
            Iri::from(literal.datatype().into_owned()),
        )
    }
}

// ============================================================================
// Term and Triple
// ============================================================================

/// Object position term
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Term {
    Iri(Iri),
    Literal(Literal),
}

impl Term {
    pub fn as_iri(&self) -> Option<&Iri> {
        match self {
            Self::Iri(iri) => Some(iri),
            Self::Literal(_) => None,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Self::Literal(_))
    }
}

impl Display for Term {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Iri(iri) => write!(f, "<{iri}>"),
            Self::Literal(literal) => write!(f, "{literal}"),
        }
    }
}

impl From<Iri> for Term {
    fn from(iri: Iri) -> Self {
        Self::Iri(iri)
    }
}

impl From<Literal> for Term {
    fn from(literal: Literal) -> Self {
        Self::Literal(literal)
    }
}

impl From<&Term> for oxrdf::Term {
    fn from(term: &Term) -> Self {
        match term {
            Term::Iri(iri) => NamedNode::from(iri).into(),
            Term::Literal(literal) => oxrdf::Literal::from(literal).into(),
        }
    }
}

/// A canonical RDF statement
///
/// Subject and predicate are always absolute IRIs. `Display` renders one
/// N-Triples line.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Triple {
    pub subject: Iri,
    pub predicate: Iri,
    pub object: Term,
}

impl Triple {
    pub fn new(subject: Iri, predicate: Iri, object: impl Into<Term>) -> Self {
        Self {
            subject,
            predicate,
            object: object.into(),
        }
    }
}

impl Display for Triple {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<{}> <{}> {} .", self.subject, self.predicate, self.object)
    }
}

impl From<&Triple> for oxrdf::Triple {
    fn from(triple: &Triple) -> Self {
        oxrdf::Triple::new(
            NamedNode::from(&triple.subject),
            NamedNode::from(&triple.predicate),
            oxrdf::Term::from(&triple.object),
        )
    }
}

impl TryFrom<oxrdf::Triple> for Triple {
    type Error = TermError;

    fn try_from(triple: oxrdf::Triple) -> Result<Self, Self::Error> {
        let subject = match oxrdf::Term::from(triple.subject) {
            oxrdf::Term::NamedNode(node) => Iri::from(node),
            other => return Err(TermError::Unsupported(other.to_string())),
        };
        let object = match triple.object {
            oxrdf::Term::NamedNode(node) => Term::Iri(Iri::from(node)),
            oxrdf::Term::Literal(literal) => Term::Literal(Literal::from(&literal)),
            other => return Err(TermError::Unsupported(other.to_string())),
        };
        Ok(Self {
            subject,
            predicate: Iri::from(triple.predicate),
            object,
        })
    }
}

/// Errors produced when building terms
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TermError {
    #[error("invalid language tag '{tag}': {reason}")]
    InvalidLanguageTag { tag: String, reason: String },

    /// Blank nodes and quoted triples have no place in the extracted graph
    #[error("unsupported term: {0}")]
    Unsupported(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_iri() {
        let iri = Iri::new("http://www.enit.fr/2022/03/baeo#Avion").expect("valid IRI");
        assert_eq!(iri.local_name(), "Avion");
        assert_eq!(
            iri.strip_namespace("http://www.enit.fr/2022/03/baeo#"),
            Some("Avion")
        );
    }

    #[test]
    fn rejects_relative_and_spaced_iris() {
        assert!(Iri::new("Avion").is_err());
        assert!(Iri::new("http://ex.org/a b").is_err());
    }

    #[test]
    fn local_name_without_fragment_is_whole_iri() {
        let iri = Iri::new("http://ex.org/onto/Avion").unwrap();
        assert_eq!(iri.local_name(), "http://ex.org/onto/Avion");
    }

    #[test]
    fn literal_display_escapes() {
        let lit = Literal::simple("il a dit \"oui\"\n");
        assert_eq!(lit.to_string(), r#""il a dit \"oui\"\n""#);

        let tagged = Literal::language_tagged("avion", "FR").unwrap();
        assert_eq!(tagged.language(), Some("fr"));
        assert_eq!(tagged.to_string(), "\"avion\"@fr");
    }

    #[test]
    fn typed_xsd_string_is_simple() {
        let lit = Literal::typed("x", Iri::new(xsd::STRING.as_str()).unwrap());
        assert_eq!(lit, Literal::simple("x"));
    }

    #[test]
    fn triple_display_is_ntriples() {
        let triple = Triple::new(
            Iri::new("http://ex.org/#A").unwrap(),
            Iri::new("http://ex.org/#p").unwrap(),
            Literal::typed("3", Iri::new("http://www.w3.org/2001/XMLSchema#integer").unwrap()),
        );
        assert_eq!(
            triple.to_string(),
            "<http://ex.org/#A> <http://ex.org/#p> \"3\"^^<http://www.w3.org/2001/XMLSchema#integer> ."
        );
    }

    #[test]
    fn oxrdf_conversion_preserves_terms() {
        let triple = Triple::new(
            Iri::new("http://ex.org/#A").unwrap(),
            Iri::new("http://ex.org/#label").unwrap(),
            Literal::language_tagged("avion", "fr").unwrap(),
        );
        let ox = oxrdf::Triple::from(&triple);
        let back = Triple::try_from(ox).unwrap();
        assert_eq!(back, triple);
    }
}
