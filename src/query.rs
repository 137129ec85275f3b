//! Query assembly: queued phrases, the RETURN tail, and UNION composition.
//!
//! A [`QueryBuilder`] holds an ordered queue of phrase fragments plus the
//! trailing RETURN / ORDER BY / SKIP / LIMIT configuration. Building is a
//! single recursive pass over the queue against one [`RenderContext`],
//! producing a [`CypherQuery`]: final text plus the name-to-value
//! parameter map, ready to hand to a driver.

use crate::context::{Format, RenderContext};
use crate::error::{Error, Result};
use crate::fragment::{FragmentId, QueryGraph, Scope};
use crate::value::Value;
use smol_str::SmolStr;
use std::collections::HashMap;
use std::fmt;

/// A fully rendered query: text with `$name` placeholders and the values
/// to bind to them.
#[derive(Debug, Clone, PartialEq)]
pub struct CypherQuery {
    text: String,
    parameters: HashMap<SmolStr, Value>,
}

impl CypherQuery {
    /// The query text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The name-to-value parameter bindings.
    pub fn parameters(&self) -> &HashMap<SmolStr, Value> {
        &self.parameters
    }
}

impl fmt::Display for CypherQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Sort direction of one ORDER BY target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Ascending,
    Descending,
}

impl OrderDirection {
    fn keyword(self) -> &'static str {
        match self {
            OrderDirection::Ascending => "ASC",
            OrderDirection::Descending => "DESC",
        }
    }
}

/// Assembles phrases into a complete query.
///
/// Phrases render in queue order, separated by the format's separator; the
/// RETURN tail renders last. The builder borrows nothing from the graph,
/// so several builders can queue fragments from the same arena (UNION
/// branches do exactly that).
#[derive(Debug, Default)]
pub struct QueryBuilder {
    phrases: Vec<FragmentId>,
    returns: Vec<FragmentId>,
    distinct: bool,
    order_by: Vec<(FragmentId, OrderDirection)>,
    skip: Option<u64>,
    limit: Option<u64>,
}

impl QueryBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a phrase fragment.
    pub fn phrase(&mut self, phrase: impl Into<FragmentId>) -> &mut Self {
        self.phrases.push(phrase.into());
        self
    }

    /// Adds a RETURN target.
    pub fn returning(&mut self, target: impl Into<FragmentId>) -> &mut Self {
        self.returns.push(target.into());
        self
    }

    /// Marks the RETURN clause as DISTINCT. Requesting DISTINCT without
    /// any target fails at build time with [`Error::EmptyReturn`].
    pub fn distinct(&mut self) -> &mut Self {
        self.distinct = true;
        self
    }

    /// Adds an ORDER BY target.
    pub fn order_by(&mut self, target: impl Into<FragmentId>, direction: OrderDirection) -> &mut Self {
        self.order_by.push((target.into(), direction));
        self
    }

    /// Skips the first `count` result rows.
    pub fn skip(&mut self, count: u64) -> &mut Self {
        self.skip = Some(count);
        self
    }

    /// Caps the result at `count` rows.
    pub fn limit(&mut self, count: u64) -> &mut Self {
        self.limit = Some(count);
        self
    }

    /// Builds the query with a fresh context in the given format.
    pub fn build(&self, graph: &QueryGraph, format: Format) -> Result<CypherQuery> {
        let mut ctx = RenderContext::new(format);
        self.build_with(graph, &mut ctx)
    }

    /// Builds the query against a caller-supplied context. Used by
    /// [`union`] to thread the parameter-name counter across branches.
    pub fn build_with(&self, graph: &QueryGraph, ctx: &mut RenderContext) -> Result<CypherQuery> {
        let separator = ctx.separator();
        let mut text = String::new();

        for &phrase in &self.phrases {
            graph.render(phrase, Scope::TopLevel, ctx, &mut text)?;
            push_separator(&mut text, separator);
        }

        if !self.returns.is_empty() || self.distinct {
            if self.returns.is_empty() {
                return Err(Error::EmptyReturn);
            }
            text.push_str("RETURN ");
            if self.distinct {
                text.push_str("DISTINCT ");
            }
            graph.render_joined(&self.returns, ", ", ctx, &mut text)?;
            push_separator(&mut text, separator);
        }

        if !self.order_by.is_empty() {
            text.push_str("ORDER BY ");
            for (index, &(target, direction)) in self.order_by.iter().enumerate() {
                if index > 0 {
                    text.push_str(", ");
                }
                graph.render(target, Scope::Expression, ctx, &mut text)?;
                text.push(' ');
                text.push_str(direction.keyword());
            }
            push_separator(&mut text, separator);
        }

        if let Some(count) = self.skip {
            text.push_str("SKIP ");
            text.push_str(&count.to_string());
            push_separator(&mut text, separator);
        }
        if let Some(count) = self.limit {
            text.push_str("LIMIT ");
            text.push_str(&count.to_string());
            push_separator(&mut text, separator);
        }

        while text.ends_with(separator) {
            text.pop();
        }

        // Rendering succeeded, so the collection pass cannot fail: it walks
        // the same fragments and reads the names and per-fragment property
        // records cached during rendering.
        let mut pairs = Vec::new();
        for &phrase in &self.phrases {
            graph.parameters(phrase, ctx, &mut pairs);
        }
        for &target in &self.returns {
            graph.parameters(target, ctx, &mut pairs);
        }
        for &(target, _) in &self.order_by {
            graph.parameters(target, ctx, &mut pairs);
        }

        let mut parameters = HashMap::with_capacity(pairs.len());
        for (name, value) in pairs {
            parameters.insert(name, value);
        }

        Ok(CypherQuery { text, parameters })
    }
}

/// Composes branch queries with UNION, each built against the same arena.
///
/// Every branch gets its own context, so build-once tracking resets per
/// branch, but the parameter-name counter is threaded from one branch into
/// the next: names stay unique across the whole composite and the merged
/// parameter map loses nothing.
pub fn union(graph: &QueryGraph, format: Format, branches: &[QueryBuilder]) -> Result<CypherQuery> {
    if branches.is_empty() {
        return Err(Error::EmptyReturn);
    }

    let separator = format.separator();
    let mut text = String::new();
    let mut parameters = HashMap::new();
    let mut counter = 0;

    for (index, branch) in branches.iter().enumerate() {
        if index > 0 {
            text.push(separator);
            text.push_str("UNION");
            text.push(separator);
        }
        let mut ctx = RenderContext::with_counter(format, counter);
        let query = branch.build_with(graph, &mut ctx)?;
        counter = ctx.counter();
        text.push_str(&query.text);
        parameters.extend(query.parameters);
    }

    Ok(CypherQuery { text, parameters })
}

fn push_separator(text: &mut String, separator: char) {
    if !text.is_empty() && !text.ends_with(separator) {
        text.push(separator);
    }
}
