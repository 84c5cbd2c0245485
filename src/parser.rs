//! DQL, N-Quad and schema parsing utilities for naming what a call touched.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::api::{Mutation, NQuad, Operation};

// Regex patterns (compiled once)

// `query name($a: string) {` header of a named query
static QUERY_NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*query\s+(\w+)").unwrap());

// First block inside the outer braces: `{ me(func: ...)` or `{ q as var(...)`
static QUERY_BLOCK_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^{]*\{\s*(?:\w+\s+as\s+)?(\w+)\s*\(").unwrap()
});

// Predicate of an N-Quad line: `<_:a> <name> "x" .` or `_:a <name> "x" .`
static NQUAD_PREDICATE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:<[^>]*>|_:\S+|\*)\s+<([^>]+)>").unwrap()
});

// First schema declaration: `name: string @index(exact) .` or `type Person {`
static SCHEMA_ENTRY_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:type\s+(\w+)\s*\{|<?([\w.~@-]+)>?\s*:)").unwrap()
});

/// Name of the query: the declared operation name if present, else the first block.
pub fn query_collection(query: &str) -> Option<String> {
    let query = strip_comments(query);

    if let Some(caps) = QUERY_NAME_REGEX.captures(&query) {
        return caps.get(1).map(|m| m.as_str().to_string());
    }

    QUERY_BLOCK_REGEX
        .captures(&query)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// First predicate a mutation writes or deletes.
pub fn mutation_collection(mutation: &Mutation) -> Option<String> {
    first_triple_predicate(&mutation.set)
        .or_else(|| first_triple_predicate(&mutation.del))
        .or_else(|| nquads_predicate(&mutation.set_nquads))
        .or_else(|| nquads_predicate(&mutation.del_nquads))
}

/// The predicate or type an alter targets. `None` for drop-all.
pub fn alter_collection(operation: &Operation) -> Option<String> {
    if operation.drop_all {
        return None;
    }
    if !operation.drop_attr.is_empty() {
        return Some(operation.drop_attr.clone());
    }

    let schema = strip_comments(&operation.schema);
    SCHEMA_ENTRY_REGEX
        .captures(&schema)
        .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().to_string())
}

fn first_triple_predicate(triples: &[NQuad]) -> Option<String> {
    triples
        .iter()
        .map(|nquad| nquad.predicate.as_str())
        .find(|predicate| !predicate.is_empty())
        .map(str::to_string)
}

fn nquads_predicate(nquads: &[u8]) -> Option<String> {
    if nquads.is_empty() {
        return None;
    }
    let text = String::from_utf8_lossy(nquads);
    NQUAD_PREDICATE_REGEX
        .captures(&text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Drop `#` line comments so they can't be mistaken for blocks.
fn strip_comments(text: &str) -> String {
    text.lines()
        .map(|line| match line.find('#') {
            Some(idx) => &line[..idx],
            None => line,
        })
        .collect::<Vec<_>>()
        .join("\n")
}
