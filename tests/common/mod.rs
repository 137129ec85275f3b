//! Common test utilities
//!
//! Shared helpers used across the integration test suites.
//!
//! # Build Helpers
//! - [`build_compact`] - Build a query in compact format, panicking on errors
//! - [`build_pretty`] - Build a query in pretty format, panicking on errors
//!
//! # Assertion Helpers
//! - [`placeholder_names`] - Extract `$name` placeholders from query text
//! - [`assert_parameters_round_trip`] - Assert placeholders and the
//!   parameter map cover each other exactly

#![allow(dead_code)]

use cypher_composer::{CypherQuery, Format, QueryBuilder, QueryGraph};

/// Build a query in compact format, panicking with the diagnostic on
/// failure.
pub fn build_compact(graph: &QueryGraph, builder: &QueryBuilder) -> CypherQuery {
    builder
        .build(graph, Format::Compact)
        .unwrap_or_else(|err| panic!("unexpected build failure: {err}"))
}

/// Build a query in pretty format, panicking with the diagnostic on
/// failure.
pub fn build_pretty(graph: &QueryGraph, builder: &QueryBuilder) -> CypherQuery {
    builder
        .build(graph, Format::Pretty)
        .unwrap_or_else(|err| panic!("unexpected build failure: {err}"))
}

/// Every `$name` placeholder occurring in `text`, in order of appearance.
pub fn placeholder_names(text: &str) -> Vec<String> {
    let bytes = text.as_bytes();
    let mut names = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' {
            let start = i + 1;
            let mut end = start;
            while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_') {
                end += 1;
            }
            names.push(text[start..end].to_string());
            i = end;
        } else {
            i += 1;
        }
    }
    names
}

/// Assert that the query's placeholders and its parameter map cover each
/// other exactly: every placeholder has a binding and every binding is
/// referenced.
pub fn assert_parameters_round_trip(query: &CypherQuery) {
    let names = placeholder_names(query.text());
    for name in &names {
        assert!(
            query.parameters().contains_key(name.as_str()),
            "placeholder `${name}` has no binding in {:?} for `{}`",
            query.parameters(),
            query.text()
        );
    }
    for key in query.parameters().keys() {
        assert!(
            names.iter().any(|name| name == key.as_str()),
            "binding `{key}` is never referenced in `{}`",
            query.text()
        );
    }
}
