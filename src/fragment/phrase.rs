//! Clause-level fragments: MATCH, WHERE, SET, REMOVE, DELETE, UNWIND,
//! WITH, MERGE, and the merge-then-set upsert composite.
//!
//! Phrases are queued on a [`QueryBuilder`](crate::query::QueryBuilder)
//! and rendered at top level in queue order. They reuse the same fragment
//! machinery as expressions; the only phrase with sub-clause structure of
//! its own is the upsert, which renders its MERGE under the
//! identifying-only flag and its SET without it.

use super::{CaseBuilder, Fragment, FragmentId, NodeId, PathId, PropertyId, QueryGraph, Scope};
use crate::context::RenderContext;
use crate::error::{Error, Result};
use crate::ident::validate_identifier;
use crate::value::Value;
use smol_str::SmolStr;

/// Typed handle to a MATCH phrase, whose conditions and optionality stay
/// amendable until the first build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchId(pub(crate) FragmentId);

impl From<MatchId> for FragmentId {
    fn from(id: MatchId) -> Self {
        id.0
    }
}

#[derive(Debug, Clone)]
pub(crate) struct MatchData {
    pub(crate) pattern: FragmentId,
    pub(crate) optional: bool,
    pub(crate) conditions: Vec<FragmentId>,
}

/// One `property = value` assignment of a SET phrase. The property name is
/// duplicated here so entries can be ordered without chasing the fragment.
#[derive(Debug, Clone)]
pub(crate) struct SetEntry {
    pub(crate) name: SmolStr,
    pub(crate) property: FragmentId,
    pub(crate) value: FragmentId,
}

impl QueryGraph {
    fn match_pattern(&mut self, pattern: FragmentId, optional: bool) -> MatchId {
        MatchId(self.alloc(Fragment::Match(MatchData {
            pattern,
            optional,
            conditions: Vec::new(),
        })))
    }

    /// `MATCH (node)`
    pub fn match_node(&mut self, node: NodeId) -> MatchId {
        self.match_pattern(node.into(), false)
    }

    /// `MATCH (a)-[r]->(b)…`
    pub fn match_path(&mut self, path: PathId) -> MatchId {
        self.match_pattern(path.into(), false)
    }

    /// `OPTIONAL MATCH (node)`
    pub fn optional_match_node(&mut self, node: NodeId) -> MatchId {
        self.match_pattern(node.into(), true)
    }

    /// `OPTIONAL MATCH (a)-[r]->(b)…`
    pub fn optional_match_path(&mut self, path: PathId) -> MatchId {
        self.match_pattern(path.into(), true)
    }

    fn match_data_mut(&mut self, id: MatchId) -> &mut MatchData {
        match self.fragment_mut(id.into()) {
            Fragment::Match(data) => data,
            _ => unreachable!("MatchId always points at a match fragment"),
        }
    }

    /// Appends an inline WHERE condition to an existing MATCH. Multiple
    /// conditions are joined with AND.
    pub fn add_match_condition(&mut self, id: MatchId, condition: FragmentId) {
        self.match_data_mut(id).conditions.push(condition);
    }

    /// Turns an existing MATCH into an OPTIONAL MATCH.
    pub fn set_match_optional(&mut self, id: MatchId) {
        self.match_data_mut(id).optional = true;
    }

    /// A standalone WHERE phrase joining all conditions with AND.
    /// Rendering fails with [`Error::EmptyWhere`] if no condition was
    /// supplied.
    pub fn where_all(&mut self, conditions: Vec<FragmentId>) -> FragmentId {
        self.alloc(Fragment::Where(conditions))
    }

    /// A SET phrase over explicit assignments. Assignments render sorted
    /// by property name so equal inputs produce byte-identical text.
    pub fn set(&mut self, assignments: Vec<(PropertyId, FragmentId)>) -> Result<FragmentId> {
        if assignments.is_empty() {
            return Err(Error::EmptyProperties);
        }
        let entries = assignments
            .into_iter()
            .map(|(property, value)| {
                let name = match self.fragment(property.into()) {
                    Fragment::Property(data) => data.name.clone(),
                    _ => unreachable!("PropertyId always points at a property fragment"),
                };
                SetEntry {
                    name,
                    property: property.into(),
                    value,
                }
            })
            .collect();
        Ok(self.alloc(Fragment::Set(entries)))
    }

    /// A REMOVE phrase over properties.
    pub fn remove(&mut self, properties: Vec<PropertyId>) -> Result<FragmentId> {
        if properties.is_empty() {
            return Err(Error::EmptyProperties);
        }
        Ok(self.alloc(Fragment::Remove(
            properties.into_iter().map(Into::into).collect(),
        )))
    }

    /// A DELETE phrase over identifiable fragments.
    pub fn delete(&mut self, targets: Vec<FragmentId>) -> Result<FragmentId> {
        self.delete_phrase(targets, false)
    }

    /// A DETACH DELETE phrase, removing relationships along with nodes.
    pub fn detach_delete(&mut self, targets: Vec<FragmentId>) -> Result<FragmentId> {
        self.delete_phrase(targets, true)
    }

    fn delete_phrase(&mut self, targets: Vec<FragmentId>, detach: bool) -> Result<FragmentId> {
        if targets.is_empty() {
            return Err(Error::EmptyConditions);
        }
        Ok(self.alloc(Fragment::Delete { targets, detach }))
    }

    /// `UNWIND a + b + … AS alias`: concatenates the list expressions and
    /// binds each element to `alias`.
    pub fn unwind(&mut self, values: Vec<FragmentId>, alias: &str) -> Result<FragmentId> {
        if values.is_empty() {
            return Err(Error::EmptyConditions);
        }
        validate_identifier(alias)?;
        Ok(self.alloc(Fragment::Unwind {
            values,
            alias: SmolStr::new(alias),
        }))
    }

    /// An UNWIND that survives empty collections: the collection is
    /// guarded with `CASE WHEN SIZE(c) > 0 THEN c ELSE [null] END`, so
    /// downstream clauses see a single null element instead of losing the
    /// row.
    pub fn unwind_optional(&mut self, collection: FragmentId, alias: &str) -> Result<FragmentId> {
        validate_identifier(alias)?;
        let size = self.size(collection);
        let zero = self.literal("0");
        let non_empty = self.gt(size, zero);
        let null_list = self.literal("[null]");
        let guarded = CaseBuilder::new()
            .when(non_empty)
            .then(collection)
            .otherwise(null_list)
            .insert(self)?;
        Ok(self.alloc(Fragment::Unwind {
            values: vec![guarded],
            alias: SmolStr::new(alias),
        }))
    }

    /// A WITH projection phrase.
    pub fn with(&mut self, items: Vec<FragmentId>) -> Result<FragmentId> {
        if items.is_empty() {
            return Err(Error::EmptyReturn);
        }
        Ok(self.alloc(Fragment::With(items)))
    }

    /// `MERGE (node)`
    pub fn merge_node(&mut self, node: NodeId) -> FragmentId {
        self.alloc(Fragment::Merge {
            pattern: node.into(),
        })
    }

    /// `MERGE (a)-[r]->(b)…`
    pub fn merge_path(&mut self, path: PathId) -> FragmentId {
        self.alloc(Fragment::Merge {
            pattern: path.into(),
        })
    }

    /// Merge-by-key: `MERGE` on the node's identifying property alone,
    /// then `SET` every remaining property.
    ///
    /// The node must carry an identifying property with a non-null value.
    /// Null-valued remaining properties are set to the `NULL` literal,
    /// clearing them on the matched node; non-null ones are parameterized.
    /// Equal inputs produce byte-identical text: the SET assignments are
    /// ordered by property name.
    pub fn upsert(&mut self, node: NodeId) -> Result<FragmentId> {
        let set = self.upsert_set_for(node)?;
        let merge = self.merge_node(node);
        Ok(self.alloc(Fragment::Upsert { merge, set }))
    }

    /// Like [`upsert`](Self::upsert), merging a whole path pattern while
    /// setting the remaining properties of `node` (one of the path's
    /// nodes).
    pub fn upsert_path(&mut self, path: PathId, node: NodeId) -> Result<FragmentId> {
        let set = self.upsert_set_for(node)?;
        let merge = self.merge_path(path);
        Ok(self.alloc(Fragment::Upsert { merge, set }))
    }

    fn upsert_set_for(&mut self, node: NodeId) -> Result<Option<FragmentId>> {
        let data = match self.fragment(node.into()) {
            Fragment::Node(data) => data.clone(),
            _ => unreachable!("NodeId always points at a node fragment"),
        };

        let missing_key = || Error::MissingIdentifyingProperty {
            node: self.describe(node.into()),
        };
        let identifying = data.identifying.clone().ok_or_else(missing_key)?;
        let key_present = data
            .properties
            .iter()
            .any(|(name, value)| *name == identifying && !value.is_null());
        if !key_present {
            return Err(missing_key());
        }

        let mut entries = Vec::new();
        for (name, value) in &data.properties {
            if *name == identifying {
                continue;
            }
            let property = self.property(node, name)?;
            let value = if value.is_null() {
                self.literal("NULL")
            } else {
                self.parameter(value.clone())
            };
            entries.push(SetEntry {
                name: name.clone(),
                property: property.into(),
                value,
            });
        }

        if entries.is_empty() {
            Ok(None)
        } else {
            Ok(Some(self.alloc(Fragment::Set(entries))))
        }
    }

    pub(crate) fn render_match(
        &self,
        data: &MatchData,
        ctx: &mut RenderContext,
        out: &mut String,
    ) -> Result<()> {
        if data.optional {
            out.push_str("OPTIONAL ");
        }
        out.push_str("MATCH ");
        self.render(data.pattern, Scope::TopLevel, ctx, out)?;
        if !data.conditions.is_empty() {
            out.push_str(" WHERE ");
            self.render_joined(&data.conditions, " AND ", ctx, out)?;
        }
        Ok(())
    }

    pub(crate) fn render_where(
        &self,
        conditions: &[FragmentId],
        ctx: &mut RenderContext,
        out: &mut String,
    ) -> Result<()> {
        if conditions.is_empty() {
            return Err(Error::EmptyWhere);
        }
        out.push_str("WHERE ");
        self.render_joined(conditions, " AND ", ctx, out)
    }

    pub(crate) fn render_set(
        &self,
        entries: &[SetEntry],
        ctx: &mut RenderContext,
        out: &mut String,
    ) -> Result<()> {
        if entries.is_empty() {
            return Err(Error::EmptyProperties);
        }
        let mut ordered: Vec<&SetEntry> = entries.iter().collect();
        ordered.sort_by(|a, b| a.name.cmp(&b.name));

        out.push_str("SET ");
        for (index, entry) in ordered.iter().enumerate() {
            if index > 0 {
                out.push_str(", ");
            }
            self.render(entry.property, Scope::Expression, ctx, out)?;
            out.push_str(" = ");
            self.render(entry.value, Scope::Expression, ctx, out)?;
        }
        Ok(())
    }

    pub(crate) fn render_remove(
        &self,
        properties: &[FragmentId],
        ctx: &mut RenderContext,
        out: &mut String,
    ) -> Result<()> {
        out.push_str("REMOVE ");
        self.render_joined(properties, ", ", ctx, out)
    }

    pub(crate) fn render_delete(
        &self,
        targets: &[FragmentId],
        detach: bool,
        out: &mut String,
    ) -> Result<()> {
        if detach {
            out.push_str("DETACH ");
        }
        out.push_str("DELETE ");
        for (index, &target) in targets.iter().enumerate() {
            if index > 0 {
                out.push_str(", ");
            }
            out.push_str(self.required_identifier(target)?);
        }
        Ok(())
    }

    pub(crate) fn render_unwind(
        &self,
        values: &[FragmentId],
        alias: &str,
        ctx: &mut RenderContext,
        out: &mut String,
    ) -> Result<()> {
        if values.is_empty() {
            return Err(Error::EmptyConditions);
        }
        out.push_str("UNWIND ");
        self.render_joined(values, " + ", ctx, out)?;
        out.push_str(" AS ");
        out.push_str(alias);
        Ok(())
    }

    pub(crate) fn render_with(
        &self,
        items: &[FragmentId],
        ctx: &mut RenderContext,
        out: &mut String,
    ) -> Result<()> {
        if items.is_empty() {
            return Err(Error::EmptyReturn);
        }
        out.push_str("WITH ");
        self.render_joined(items, ", ", ctx, out)
    }

    pub(crate) fn render_merge(
        &self,
        pattern: FragmentId,
        ctx: &mut RenderContext,
        out: &mut String,
    ) -> Result<()> {
        out.push_str("MERGE ");
        self.render(pattern, Scope::Merge, ctx, out)
    }

    pub(crate) fn render_upsert(
        &self,
        merge: FragmentId,
        set: Option<FragmentId>,
        ctx: &mut RenderContext,
        out: &mut String,
    ) -> Result<()> {
        let saved = ctx.flags;
        ctx.flags.identifying_only = true;
        let merged = self.render(merge, Scope::TopLevel, ctx, out);
        ctx.flags = saved;
        merged?;

        if let Some(set) = set {
            out.push(ctx.separator());
            self.render(set, Scope::TopLevel, ctx, out)?;
        }
        Ok(())
    }

    /// Parameter collection twin of [`render_upsert`](Self::render_upsert).
    /// The MERGE sub-tree contributes only what it rendered; the context's
    /// per-fragment record of rendered properties already carries the
    /// identifying-only restriction applied during rendering.
    pub(crate) fn upsert_parameters(
        &self,
        merge: FragmentId,
        set: Option<FragmentId>,
        ctx: &mut RenderContext,
        out: &mut Vec<(SmolStr, Value)>,
    ) {
        self.parameters(merge, ctx, out);
        if let Some(set) = set {
            self.parameters(set, ctx, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Format;
    use crate::fragment::{NodeBuilder, PathBuilder, RelationshipBuilder};

    fn person(graph: &mut QueryGraph, name: &str) -> NodeId {
        NodeBuilder::labeled("Person")
            .unwrap()
            .named(name)
            .unwrap()
            .insert(graph)
    }

    #[test]
    fn match_renders_pattern_and_inline_conditions() {
        let mut graph = QueryGraph::new();
        let node = person(&mut graph, "p");
        let matched = graph.match_node(node);
        assert_eq!(graph.render_fragment(matched).unwrap(), "MATCH (p:Person)");

        let age = graph.property(node, "age").unwrap();
        let bound = graph.parameter(18i64);
        let adult = graph.gte(age, bound);
        graph.add_match_condition(matched, adult);
        let name = graph.property(node, "name").unwrap();
        let known = graph.is_not_null(name);
        graph.add_match_condition(matched, known);

        assert_eq!(
            graph.render_fragment(matched).unwrap(),
            "MATCH (p:Person) WHERE p.age >= $_v0 AND p.name IS NOT NULL"
        );
    }

    #[test]
    fn match_can_become_optional_after_the_fact() {
        let mut graph = QueryGraph::new();
        let node = person(&mut graph, "p");
        let matched = graph.match_node(node);
        graph.set_match_optional(matched);
        assert_eq!(
            graph.render_fragment(matched).unwrap(),
            "OPTIONAL MATCH (p:Person)"
        );
    }

    #[test]
    fn where_joins_with_and_and_rejects_empty() {
        let mut graph = QueryGraph::new();
        let node = person(&mut graph, "p");
        let name = graph.property(node, "name").unwrap();
        let a = graph.is_null(name);
        let b = graph.is_not_null(name);
        let clause = graph.where_all(vec![a, b]);
        assert_eq!(
            graph.render_fragment(clause).unwrap(),
            "WHERE p.name IS NULL AND p.name IS NOT NULL"
        );

        let empty = graph.where_all(vec![]);
        assert_eq!(graph.render_fragment(empty).unwrap_err(), Error::EmptyWhere);
    }

    #[test]
    fn set_orders_assignments_by_property_name() {
        let mut graph = QueryGraph::new();
        let node = person(&mut graph, "p");
        let zeta = graph.property(node, "zeta").unwrap();
        let alpha = graph.property(node, "alpha").unwrap();
        let one = graph.parameter(1i64);
        let two = graph.parameter(2i64);
        let clause = graph.set(vec![(zeta, one), (alpha, two)]).unwrap();

        assert_eq!(
            graph.render_fragment(clause).unwrap(),
            "SET p.alpha = $_v0, p.zeta = $_v1"
        );
    }

    #[test]
    fn empty_set_and_remove_are_rejected() {
        let mut graph = QueryGraph::new();
        assert_eq!(graph.set(vec![]).unwrap_err(), Error::EmptyProperties);
        assert_eq!(graph.remove(vec![]).unwrap_err(), Error::EmptyProperties);
    }

    #[test]
    fn remove_lists_properties() {
        let mut graph = QueryGraph::new();
        let node = person(&mut graph, "p");
        let nick = graph.property(node, "nick").unwrap();
        let age = graph.property(node, "age").unwrap();
        let clause = graph.remove(vec![nick, age]).unwrap();
        assert_eq!(
            graph.render_fragment(clause).unwrap(),
            "REMOVE p.nick, p.age"
        );
    }

    #[test]
    fn delete_uses_identifiers() {
        let mut graph = QueryGraph::new();
        let a = person(&mut graph, "a");
        let b = person(&mut graph, "b");
        let clause = graph.delete(vec![a.into(), b.into()]).unwrap();
        assert_eq!(graph.render_fragment(clause).unwrap(), "DELETE a, b");

        let detach = graph.detach_delete(vec![a.into()]).unwrap();
        assert_eq!(graph.render_fragment(detach).unwrap(), "DETACH DELETE a");
    }

    #[test]
    fn delete_requires_an_identifier() {
        let mut graph = QueryGraph::new();
        let node = NodeBuilder::labeled("Person").unwrap().insert(&mut graph);
        let clause = graph.delete(vec![node.into()]).unwrap();
        assert!(matches!(
            graph.render_fragment(clause).unwrap_err(),
            Error::MissingIdentifier { .. }
        ));
    }

    #[test]
    fn unwind_concatenates_lists() {
        let mut graph = QueryGraph::new();
        let first = graph.array_of_values([1i64, 2]);
        let second = graph.array_of_values([3i64]);
        let clause = graph.unwind(vec![first, second], "x").unwrap();
        assert_eq!(
            graph.render_fragment(clause).unwrap(),
            "UNWIND [$_v0, $_v1] + [$_v2] AS x"
        );
    }

    #[test]
    fn unwind_optional_guards_empty_collections() {
        let mut graph = QueryGraph::new();
        let node = person(&mut graph, "p");
        let tags = graph.property(node, "tags").unwrap();
        let clause = graph.unwind_optional(tags.into(), "tag").unwrap();
        assert_eq!(
            graph.render_fragment(clause).unwrap(),
            "UNWIND CASE WHEN SIZE(p.tags) > 0 THEN p.tags ELSE [null] END AS tag"
        );
    }

    #[test]
    fn unwind_validates_the_alias() {
        let mut graph = QueryGraph::new();
        let list = graph.array_of_values([1i64]);
        assert!(matches!(
            graph.unwind(vec![list], "bad alias").unwrap_err(),
            Error::InvalidIdentifier { .. }
        ));
        assert_eq!(graph.unwind(vec![], "x").unwrap_err(), Error::EmptyConditions);
    }

    #[test]
    fn with_projects_items() {
        let mut graph = QueryGraph::new();
        let node = person(&mut graph, "p");
        let name = graph.property(node, "name").unwrap();
        let counted = graph.count(name);
        let total = graph.aliased(counted, "total").unwrap();
        let clause = graph.with(vec![name.into(), total]).unwrap();
        assert_eq!(
            graph.render_fragment(clause).unwrap(),
            "WITH p.name, COUNT(p.name) AS total"
        );
        assert_eq!(graph.with(vec![]).unwrap_err(), Error::EmptyReturn);
    }

    #[test]
    fn merge_defines_its_pattern() {
        let mut graph = QueryGraph::new();
        let node = person(&mut graph, "p");
        let clause = graph.merge_node(node);
        assert_eq!(graph.render_fragment(clause).unwrap(), "MERGE (p:Person)");
    }

    #[test]
    fn upsert_merges_by_key_and_sets_the_rest() {
        let mut graph = QueryGraph::new();
        let node = NodeBuilder::labeled("Person")
            .unwrap()
            .named("p")
            .unwrap()
            .identifying_property("id", 7i64)
            .unwrap()
            .property("name", "Alice")
            .unwrap()
            .property("nick", Value::Null)
            .unwrap()
            .insert(&mut graph);
        let clause = graph.upsert(node).unwrap();

        let mut ctx = RenderContext::new(Format::Compact);
        let mut out = String::new();
        graph
            .render(clause, Scope::TopLevel, &mut ctx, &mut out)
            .unwrap();
        assert_eq!(
            out,
            "MERGE (p:Person {id: $_v0_id}) SET p.name = $_v1, p.nick = NULL"
        );

        let mut params = Vec::new();
        graph.parameters(clause, &mut ctx, &mut params);
        assert_eq!(
            params,
            vec![
                (SmolStr::new("_v0_id"), Value::Int(7)),
                (SmolStr::new("_v1"), Value::from("Alice")),
            ]
        );
    }

    #[test]
    fn upsert_without_extra_properties_is_a_bare_merge() {
        let mut graph = QueryGraph::new();
        let node = NodeBuilder::labeled("Person")
            .unwrap()
            .named("p")
            .unwrap()
            .identifying_property("id", 7i64)
            .unwrap()
            .insert(&mut graph);
        let clause = graph.upsert(node).unwrap();
        assert_eq!(
            graph.render_fragment(clause).unwrap(),
            "MERGE (p:Person {id: $_v0_id})"
        );
    }

    #[test]
    fn upsert_requires_a_non_null_identifying_value() {
        let mut graph = QueryGraph::new();
        let unkeyed = person(&mut graph, "p");
        assert!(matches!(
            graph.upsert(unkeyed).unwrap_err(),
            Error::MissingIdentifyingProperty { .. }
        ));

        let null_keyed = NodeBuilder::labeled("Person")
            .unwrap()
            .named("q")
            .unwrap()
            .identifying_property("id", Value::Null)
            .unwrap()
            .insert(&mut graph);
        assert!(matches!(
            graph.upsert(null_keyed).unwrap_err(),
            Error::MissingIdentifyingProperty { .. }
        ));
    }

    #[test]
    fn upsert_path_merges_the_whole_pattern() {
        let mut graph = QueryGraph::new();
        let account = NodeBuilder::labeled("Account")
            .unwrap()
            .named("a")
            .unwrap()
            .identifying_property("id", 1i64)
            .unwrap()
            .property("status", "active")
            .unwrap()
            .insert(&mut graph);
        let owner = person(&mut graph, "p");
        let owns = RelationshipBuilder::typed("OWNS").unwrap().insert(&mut graph);
        let path = PathBuilder::start(owner)
            .outgoing(owns)
            .to(account)
            .insert(&mut graph);

        let clause = graph.upsert_path(path, account).unwrap();
        assert_eq!(
            graph.render_fragment(clause).unwrap(),
            "MERGE (p:Person)-[:OWNS]->(a:Account {id: $_v0_id}) SET a.status = $_v1"
        );
    }
}
