//! Compact JSON-LD rendering
//!
//! Nodes are grouped by subject under `@graph`, and `@context` binds the
//! graph prefix. IRIs under the namespace are written as `prefix:local`.
//! Every property value is an array of `{"@id"}` or `{"@value"}` objects.

use std::collections::BTreeMap;

use okg_core::{Iri, Literal, Term, Triple};
use oxrdf::vocab::rdf;
use serde_json::{json, Map, Value};

use crate::{GraphError, RdfFormat};

struct Context {
    prefixes: BTreeMap<String, String>,
}

impl Context {
    fn single(prefix: &str, namespace: &str) -> Self {
        Self {
            prefixes: BTreeMap::from([(prefix.to_string(), namespace.to_string())]),
        }
    }

    /// `prefix:local`, or the full IRI when the compact form would read back
    /// as something else (an absolute IRI, a blank node or a keyword)
    fn compact(&self, iri: &Iri) -> String {
        for (prefix, namespace) in &self.prefixes {
            if prefix == "_" || prefix.starts_with('@') {
                continue;
            }
            match iri.strip_namespace(namespace) {
                Some(local) if !local.starts_with("//") => return format!("{prefix}:{local}"),
                _ => {}
            }
        }
        iri.as_str().to_string()
    }

    fn expand(&self, value: &str) -> Result<Iri, GraphError> {
        let expanded = match value.split_once(':') {
            Some((prefix, local)) if !local.starts_with("//") => match self.prefixes.get(prefix) {
                Some(namespace) => format!("{namespace}{local}"),
                None => value.to_string(),
            },
            _ => value.to_string(),
        };
        Iri::new(expanded).map_err(|e| parse_error(e.to_string()))
    }
}

fn parse_error(message: impl Into<String>) -> GraphError {
    GraphError::Parse {
        format: RdfFormat::JsonLd,
        message: message.into(),
    }
}

fn object_value(context: &Context, object: &Term) -> Value {
    match object {
        Term::Iri(iri) => json!({ "@id": context.compact(iri) }),
        Term::Literal(literal) => {
            let mut value = Map::new();
            value.insert("@value".into(), Value::String(literal.lexical().to_string()));
            if let Some(language) = literal.language() {
                value.insert("@language".into(), Value::String(language.to_string()));
            } else if let Some(datatype) = literal.datatype() {
                value.insert("@type".into(), Value::String(context.compact(datatype)));
            }
            Value::Object(value)
        }
    }
}

pub(crate) fn write_json_ld<'a>(
    triples: impl Iterator<Item = &'a Triple>,
    prefix: &str,
    namespace: &str,
) -> Result<Vec<u8>, GraphError> {
    let context = Context::single(prefix, namespace);
    let mut nodes: BTreeMap<&Iri, Map<String, Value>> = BTreeMap::new();

    for triple in triples {
        let node = nodes.entry(&triple.subject).or_insert_with(|| {
            let mut node = Map::new();
            node.insert("@id".into(), Value::String(context.compact(&triple.subject)));
            node
        });

        let values = node
            .entry(context.compact(&triple.predicate))
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(values) = values {
            values.push(object_value(&context, &triple.object));
        }
    }

    let document = json!({
        "@context": context.prefixes,
        "@graph": nodes.into_values().map(Value::Object).collect::<Vec<_>>(),
    });

    serde_json::to_vec_pretty(&document).map_err(|e| GraphError::Serialize {
        format: RdfFormat::JsonLd,
        message: e.to_string(),
    })
}

pub(crate) fn read_json_ld(bytes: &[u8]) -> Result<Vec<Triple>, GraphError> {
    let document: Value = serde_json::from_slice(bytes).map_err(|e| parse_error(e.to_string()))?;

    let prefixes = document
        .get("@context")
        .and_then(Value::as_object)
        .map(|ctx| {
            ctx.iter()
                .filter_map(|(k, v)| v.as_str().map(|ns| (k.clone(), ns.to_string())))
                .collect()
        })
        .unwrap_or_default();
    let context = Context { prefixes };

    let nodes = match document.get("@graph") {
        Some(Value::Array(nodes)) => nodes.iter().collect::<Vec<_>>(),
        Some(_) => return Err(parse_error("@graph must be an array")),
        None => vec![&document],
    };

    let mut triples = Vec::new();
    for node in nodes {
        let node = node
            .as_object()
            .ok_or_else(|| parse_error("graph node must be an object"))?;
        let subject = node
            .get("@id")
            .and_then(Value::as_str)
            .ok_or_else(|| parse_error("graph node without @id"))?;
        let subject = context.expand(subject)?;

        for (key, values) in node {
            let predicate = match key.as_str() {
                "@id" | "@context" => continue,
                "@type" => Iri::from(rdf::TYPE.into_owned()),
                other if other.starts_with('@') => continue,
                other => context.expand(other)?,
            };

            let items = match values {
                Value::Array(items) => items.iter().collect::<Vec<_>>(),
                single => vec![single],
            };
            for item in items {
                let object = if key == "@type" {
                    let name = item
                        .as_str()
                        .ok_or_else(|| parse_error("@type values must be strings"))?;
                    Term::Iri(context.expand(name)?)
                } else {
                    read_object(&context, item)?
                };
                triples.push(Triple::new(subject.clone(), predicate.clone(), object));
            }
        }
    }

    Ok(triples)
}

fn read_object(context: &Context, item: &Value) -> Result<Term, GraphError> {
    match item {
        Value::String(s) => Ok(Term::Literal(Literal::simple(s.as_str()))),
        Value::Object(object) => {
            if let Some(id) = object.get("@id").and_then(Value::as_str) {
                return Ok(Term::Iri(context.expand(id)?));
            }
            let lexical = object
                .get("@value")
                .and_then(Value::as_str)
                .ok_or_else(|| parse_error("value object without string @value"))?;

            if let Some(language) = object.get("@language").and_then(Value::as_str) {
                let literal = Literal::language_tagged(lexical, language)
                    .map_err(|e| parse_error(e.to_string()))?;
                return Ok(Term::Literal(literal));
            }
            if let Some(datatype) = object.get("@type").and_then(Value::as_str) {
                return Ok(Term::Literal(Literal::typed(lexical, context.expand(datatype)?)));
            }
            Ok(Term::Literal(Literal::simple(lexical)))
        }
        other => Err(parse_error(format!("unsupported property value: {other}"))),
    }
}
