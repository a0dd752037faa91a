//! Output formats and the Turtle / RDF-XML codecs
//!
//! Turtle and RDF/XML go through `oxttl` and `oxrdfxml`; JSON-LD lives in
//! [`crate::jsonld`].

use std::fmt;
use std::str::FromStr;

use okg_core::Triple;
use oxrdfxml::{RdfXmlParser, RdfXmlSerializer};
use oxttl::{TurtleParser, TurtleSerializer};

use crate::GraphError;

/// Serialization formats of the knowledge graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RdfFormat {
    Turtle,
    JsonLd,
    RdfXml,
}

impl RdfFormat {
    /// Every format written at the end of a run, in write order
    pub const ALL: [RdfFormat; 3] = [Self::Turtle, Self::JsonLd, Self::RdfXml];

    /// File extension, without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Turtle => "ttl",
            Self::JsonLd => "jsonld",
            Self::RdfXml => "owl",
        }
    }

    pub fn media_type(&self) -> &'static str {
        match self {
            Self::Turtle => "text/turtle",
            Self::JsonLd => "application/ld+json",
            Self::RdfXml => "application/rdf+xml",
        }
    }
}

impl fmt::Display for RdfFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Turtle => write!(f, "turtle"),
            Self::JsonLd => write!(f, "json-ld"),
            Self::RdfXml => write!(f, "xml"),
        }
    }
}

impl FromStr for RdfFormat {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "turtle" | "ttl" => Ok(Self::Turtle),
            "json-ld" | "jsonld" => Ok(Self::JsonLd),
            "xml" | "rdf-xml" | "rdfxml" | "owl" => Ok(Self::RdfXml),
            other => Err(GraphError::UnknownFormat(other.to_string())),
        }
    }
}

fn serialize_error(format: RdfFormat, err: impl fmt::Display) -> GraphError {
    GraphError::Serialize {
        format,
        message: err.to_string(),
    }
}

fn parse_error(format: RdfFormat, err: impl fmt::Display) -> GraphError {
    GraphError::Parse {
        format,
        message: err.to_string(),
    }
}

pub(crate) fn write_turtle<'a>(
    triples: impl Iterator<Item = &'a Triple>,
    prefix: &str,
    namespace: &str,
) -> Result<Vec<u8>, GraphError> {
    let mut writer = TurtleSerializer::new()
        .with_prefix(prefix, namespace)
        .map_err(|e| serialize_error(RdfFormat::Turtle, e))?
        .for_writer(Vec::new());

    for triple in triples {
        writer
            .serialize_triple(&oxrdf::Triple::from(triple))
            .map_err(|e| serialize_error(RdfFormat::Turtle, e))?;
    }

    writer
        .finish()
        .map_err(|e| serialize_error(RdfFormat::Turtle, e))
}

pub(crate) fn write_rdf_xml<'a>(
    triples: impl Iterator<Item = &'a Triple>,
) -> Result<Vec<u8>, GraphError> {
    let mut writer = RdfXmlSerializer::new().for_writer(Vec::new());

    for triple in triples {
        writer
            .serialize_triple(&oxrdf::Triple::from(triple))
            .map_err(|e| serialize_error(RdfFormat::RdfXml, e))?;
    }

    writer
        .finish()
        .map_err(|e| serialize_error(RdfFormat::RdfXml, e))
}

pub(crate) fn read_turtle(bytes: &[u8]) -> Result<Vec<Triple>, GraphError> {
    let mut triples = Vec::new();
    for result in TurtleParser::new().for_reader(bytes) {
        let triple = result.map_err(|e| parse_error(RdfFormat::Turtle, e))?;
        triples.push(Triple::try_from(triple).map_err(|e| parse_error(RdfFormat::Turtle, e))?);
    }
    Ok(triples)
}

pub(crate) fn read_rdf_xml(bytes: &[u8]) -> Result<Vec<Triple>, GraphError> {
    let mut triples = Vec::new();
    for result in RdfXmlParser::new().for_reader(bytes) {
        let triple = result.map_err(|e| parse_error(RdfFormat::RdfXml, e))?;
        triples.push(Triple::try_from(triple).map_err(|e| parse_error(RdfFormat::RdfXml, e))?);
    }
    Ok(triples)
}
