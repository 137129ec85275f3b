//! The fragment AST: an arena of composable, serializable query units.
//!
//! Every renderable unit of a query — literals, parameters, nodes,
//! relationships, paths, conditions, functions, phrases — is a [`Fragment`]
//! stored in a [`QueryGraph`] arena and addressed by an opaque
//! [`FragmentId`]. The handle doubles as the fragment's identity for the
//! build-once invariant and the parameter-name cache, sidestepping
//! reference-equality semantics entirely.
//!
//! Construction is lazy: builders assemble the tree without producing any
//! text. A single top-level build performs one recursive-descent pass in
//! which each fragment renders its own substring and contributes zero or
//! more `(name, value)` parameter pairs against the same context.

mod condition;
mod function;
mod pattern;
mod phrase;

pub use condition::DateRange;
pub use function::{CaseBuilder, DurationUnit};
pub use pattern::{
    Direction, NodeBuilder, NodeId, PathBuilder, PathId, RelationshipBuilder, RelationshipId,
};
pub use phrase::MatchId;

pub(crate) use function::CaseData;
pub(crate) use pattern::{NodeData, PartialPattern, PathData, PropertyData, RelationshipData};
pub(crate) use phrase::{MatchData, SetEntry};

use crate::context::{Format, RenderContext};
use crate::error::{Error, Result};
use crate::ident::{IdentifierGenerator, validate_identifier, validate_property_name};
use crate::value::Value;
use smol_str::SmolStr;

/// The prefix character introducing a named parameter placeholder in query
/// text.
pub const PARAMETER_PREFIX: char = '$';

/// Opaque handle to a fragment in a [`QueryGraph`].
///
/// Handles are the identity of a fragment: the build-once set and the
/// generated-name cache are keyed by handle, so two structurally equal
/// fragments allocated separately are tracked independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FragmentId(u32);

impl FragmentId {
    pub(crate) fn new(raw: u32) -> Self {
        Self(raw)
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

/// The rendering scope a fragment finds itself in, threaded explicitly
/// through the recursive render call.
///
/// Pattern fragments use it to decide between rendering a full definition
/// and a bare reference: a scope names the fragment kind that directly
/// contains the one being rendered. Container kinds that never influence
/// renderability collapse into [`Scope::Expression`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// No containing fragment: the fragment is rendered standalone or as a
    /// queued phrase.
    TopLevel,
    /// Directly inside a path (the path's start position).
    Path,
    /// Directly inside a partial pattern (a relationship or a leg's end
    /// node).
    PartialPattern,
    /// Directly inside a MERGE phrase.
    Merge,
    /// Any other containing fragment: a reference-only position.
    Expression,
}

impl Scope {
    /// Whether a node may render its full definition in this scope.
    pub(crate) fn node_definable(self) -> bool {
        matches!(
            self,
            Scope::TopLevel | Scope::Path | Scope::PartialPattern | Scope::Merge
        )
    }

    /// Whether a relationship may render its full definition in this scope.
    pub(crate) fn relationship_definable(self) -> bool {
        matches!(self, Scope::TopLevel | Scope::PartialPattern)
    }
}

/// One renderable unit of the query AST.
#[derive(Debug, Clone)]
pub(crate) enum Fragment {
    /// Raw inline text. Reserved for structural literals the caller has no
    /// control over (`0`, `false`, `[null]`, raw return columns).
    Literal(SmolStr),
    /// A caller-supplied scalar, rendered as `$name` with a
    /// context-assigned name.
    Parameter(Value),
    /// A graph node pattern.
    Node(NodeData),
    /// A relationship pattern.
    Relationship(RelationshipData),
    /// A start node plus ordered partial patterns.
    Path(PathData),
    /// A property access `owner.name[.sub…]`.
    Property(PropertyData),
    /// `inner AS alias`, collapsing to the bare alias once built.
    Aliased { inner: FragmentId, alias: SmolStr },
    /// A bracketed list `[a, b, …]`.
    Array(Vec<FragmentId>),
    /// A binary operator condition `lhs OP rhs`.
    Comparison {
        lhs: FragmentId,
        op: &'static str,
        rhs: FragmentId,
    },
    /// `value IS NULL` / `value IS NOT NULL`.
    NullCheck { value: FragmentId, negated: bool },
    /// An AND (`conjunctive`) or OR junction over two or more operands.
    Junction {
        conjunctive: bool,
        operands: Vec<FragmentId>,
    },
    /// `ANY(_element IN lhs WHERE _element IN rhs)`.
    AnyIn { lhs: FragmentId, rhs: FragmentId },
    /// `property >= datetime() - duration($p)` with an ISO-8601 period
    /// parameter.
    SincePeriod {
        property: FragmentId,
        period: SmolStr,
    },
    /// A CASE expression.
    Case(CaseData),
    /// `COALESCE(value, fallback)`.
    Coalesce {
        value: FragmentId,
        fallback: FragmentId,
    },
    /// `COLLECT([DISTINCT ]value)`.
    Collect { value: FragmentId, distinct: bool },
    /// `COUNT([DISTINCT ]value)`.
    Count { value: FragmentId, distinct: bool },
    /// `tolower(value)`.
    ToLower(FragmentId),
    /// `SIZE(value)`.
    Size(FragmentId),
    /// `date()` or `date($p)`.
    DateFn(Option<Value>),
    /// `datetime()` or `datetime($p)`.
    DateTimeFn(Option<Value>),
    /// `DURATION({unit: expr, …})`.
    DurationFn(Vec<(DurationUnit, FragmentId)>),
    /// A MATCH phrase with optional inline WHERE conditions.
    Match(MatchData),
    /// A standalone WHERE phrase.
    Where(Vec<FragmentId>),
    /// A SET phrase; entries are sorted by property name at render time.
    Set(Vec<SetEntry>),
    /// A REMOVE phrase over properties.
    Remove(Vec<FragmentId>),
    /// A DELETE or DETACH DELETE phrase over identifiable fragments.
    Delete {
        targets: Vec<FragmentId>,
        detach: bool,
    },
    /// `UNWIND a + b + … AS alias`.
    Unwind {
        values: Vec<FragmentId>,
        alias: SmolStr,
    },
    /// A WITH projection phrase.
    With(Vec<FragmentId>),
    /// A MERGE phrase around a node or path pattern.
    Merge { pattern: FragmentId },
    /// A MERGE-by-key plus SET-the-rest composition.
    Upsert {
        merge: FragmentId,
        set: Option<FragmentId>,
    },
}

/// Arena of fragments for one query-building session.
///
/// All construction goes through methods on this type (or the fluent
/// builders that insert into it); all rendering reads from it. Pattern
/// fragments stay amendable after insertion — identifiers and properties
/// may accumulate until the first build renders them.
#[derive(Debug, Default)]
pub struct QueryGraph {
    fragments: Vec<Fragment>,
}

impl QueryGraph {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn alloc(&mut self, fragment: Fragment) -> FragmentId {
        let id = FragmentId::new(self.fragments.len() as u32);
        self.fragments.push(fragment);
        id
    }

    pub(crate) fn fragment(&self, id: FragmentId) -> &Fragment {
        &self.fragments[id.index()]
    }

    pub(crate) fn fragment_mut(&mut self, id: FragmentId) -> &mut Fragment {
        &mut self.fragments[id.index()]
    }

    /// Inserts a raw text fragment. No parameters, no validation; reserved
    /// for structural text the caller controls (return columns, `[null]`).
    pub fn literal(&mut self, text: impl Into<SmolStr>) -> FragmentId {
        self.alloc(Fragment::Literal(text.into()))
    }

    /// Inserts a parameter fragment for a caller-supplied value.
    ///
    /// Renders as `$name` with a context-assigned collision-free name and
    /// contributes the `(name, value)` pair to the parameter map.
    pub fn parameter(&mut self, value: impl Into<Value>) -> FragmentId {
        self.alloc(Fragment::Parameter(value.into()))
    }

    /// Wraps a fragment with a validated alias: renders `inner AS alias`
    /// once, then the bare alias on every subsequent use in the same build.
    pub fn aliased(&mut self, inner: impl Into<FragmentId>, alias: &str) -> Result<FragmentId> {
        validate_identifier(alias)?;
        Ok(self.alloc(Fragment::Aliased {
            inner: inner.into(),
            alias: SmolStr::new(alias),
        }))
    }

    /// Like [`aliased`](Self::aliased) with a generator-assigned alias.
    pub fn auto_aliased(
        &mut self,
        inner: impl Into<FragmentId>,
        generator: &mut IdentifierGenerator,
    ) -> FragmentId {
        let alias = generator.next();
        self.alloc(Fragment::Aliased {
            inner: inner.into(),
            alias,
        })
    }

    /// Inserts a bracketed array over existing fragments.
    pub fn array(&mut self, values: Vec<FragmentId>) -> FragmentId {
        self.alloc(Fragment::Array(values))
    }

    /// Inserts an array of parameterized values.
    pub fn array_of_values<V: Into<Value>>(
        &mut self,
        values: impl IntoIterator<Item = V>,
    ) -> FragmentId {
        let params = values
            .into_iter()
            .map(|value| self.parameter(value))
            .collect();
        self.alloc(Fragment::Array(params))
    }

    /// Inserts a property access on an identifiable fragment (node,
    /// relationship, or aliased expression). The name is validated against
    /// the property grammar at construction.
    pub fn property(&mut self, owner: impl Into<FragmentId>, name: &str) -> Result<PropertyId> {
        validate_property_name(name)?;
        let id = self.alloc(Fragment::Property(PropertyData {
            owner: owner.into(),
            name: SmolStr::new(name),
            trail: Vec::new(),
        }));
        Ok(PropertyId(id))
    }

    /// Derives a nested property access (`owner.name.sub`) from an existing
    /// property.
    pub fn sub_property(&mut self, property: PropertyId, name: &str) -> Result<PropertyId> {
        validate_property_name(name)?;
        let Fragment::Property(data) = self.fragment(property.into()) else {
            unreachable!("PropertyId always points at a property fragment");
        };
        let mut data = data.clone();
        data.trail.push(SmolStr::new(name));
        Ok(PropertyId(self.alloc(Fragment::Property(data))))
    }

    /// Renders a single fragment standalone with a fresh compact context.
    ///
    /// Intended for diagnostics and tests; full queries go through
    /// [`QueryBuilder`](crate::query::QueryBuilder).
    pub fn render_fragment(&self, id: impl Into<FragmentId>) -> Result<String> {
        let mut ctx = RenderContext::new(Format::Compact);
        let mut out = String::new();
        self.render(id.into(), Scope::TopLevel, &mut ctx, &mut out)?;
        Ok(out)
    }

    /// Renders one fragment into `out`, threading the containing scope.
    pub(crate) fn render(
        &self,
        id: FragmentId,
        scope: Scope,
        ctx: &mut RenderContext,
        out: &mut String,
    ) -> Result<()> {
        match self.fragment(id) {
            Fragment::Literal(text) => {
                out.push_str(text);
                Ok(())
            }
            Fragment::Parameter(_) => {
                out.push(PARAMETER_PREFIX);
                let name = ctx.variable_name(id);
                out.push_str(&name);
                Ok(())
            }
            Fragment::Node(data) => self.render_node(id, data, scope, ctx, out),
            Fragment::Relationship(data) => self.render_relationship(id, data, scope, ctx, out),
            Fragment::Path(data) => self.render_path(data, ctx, out),
            Fragment::Property(data) => self.render_property(data, out),
            Fragment::Aliased { inner, alias } => {
                if ctx.is_built(id) {
                    out.push_str(alias);
                } else {
                    self.render(*inner, Scope::Expression, ctx, out)?;
                    out.push_str(" AS ");
                    out.push_str(alias);
                    ctx.mark_built(id);
                }
                Ok(())
            }
            Fragment::Array(values) => {
                out.push('[');
                self.render_joined(values, ", ", ctx, out)?;
                out.push(']');
                Ok(())
            }
            Fragment::Comparison { lhs, op, rhs } => self.render_comparison(*lhs, op, *rhs, ctx, out),
            Fragment::NullCheck { value, negated } => self.render_null_check(*value, *negated, ctx, out),
            Fragment::Junction {
                conjunctive,
                operands,
            } => self.render_junction(*conjunctive, operands, ctx, out),
            Fragment::AnyIn { lhs, rhs } => self.render_any_in(*lhs, *rhs, ctx, out),
            Fragment::SincePeriod { property, .. } => {
                self.render_since_period(id, *property, ctx, out)
            }
            Fragment::Case(data) => self.render_case(data, ctx, out),
            Fragment::Coalesce { value, fallback } => self.render_coalesce(*value, *fallback, ctx, out),
            Fragment::Collect { value, distinct } => {
                self.render_aggregate("COLLECT", *value, *distinct, ctx, out)
            }
            Fragment::Count { value, distinct } => {
                self.render_aggregate("COUNT", *value, *distinct, ctx, out)
            }
            Fragment::ToLower(value) => self.render_wrapped("tolower", *value, ctx, out),
            Fragment::Size(value) => self.render_wrapped("SIZE", *value, ctx, out),
            Fragment::DateFn(value) => self.render_temporal("date", id, value.as_ref(), ctx, out),
            Fragment::DateTimeFn(value) => {
                self.render_temporal("datetime", id, value.as_ref(), ctx, out)
            }
            Fragment::DurationFn(entries) => self.render_duration(entries, ctx, out),
            Fragment::Match(data) => self.render_match(data, ctx, out),
            Fragment::Where(conditions) => self.render_where(conditions, ctx, out),
            Fragment::Set(entries) => self.render_set(entries, ctx, out),
            Fragment::Remove(properties) => self.render_remove(properties, ctx, out),
            Fragment::Delete { targets, detach } => self.render_delete(targets, *detach, out),
            Fragment::Unwind { values, alias } => self.render_unwind(values, alias, ctx, out),
            Fragment::With(items) => self.render_with(items, ctx, out),
            Fragment::Merge { pattern } => self.render_merge(*pattern, ctx, out),
            Fragment::Upsert { merge, set } => self.render_upsert(*merge, *set, ctx, out),
        }
    }

    /// Renders a sequence of fragments joined by `separator`, each in
    /// expression scope.
    pub(crate) fn render_joined(
        &self,
        values: &[FragmentId],
        separator: &str,
        ctx: &mut RenderContext,
        out: &mut String,
    ) -> Result<()> {
        for (index, &value) in values.iter().enumerate() {
            if index > 0 {
                out.push_str(separator);
            }
            self.render(value, Scope::Expression, ctx, out)?;
        }
        Ok(())
    }

    /// Collects the `(name, value)` parameter pairs of one fragment's
    /// sub-tree, left to right. Duplicates are allowed; the assembler
    /// de-duplicates by name when merging into the final map.
    pub(crate) fn parameters(
        &self,
        id: FragmentId,
        ctx: &mut RenderContext,
        out: &mut Vec<(SmolStr, Value)>,
    ) {
        match self.fragment(id) {
            Fragment::Literal(_) | Fragment::Property(_) => {}
            Fragment::Parameter(value) => {
                let name = ctx.variable_name(id);
                out.push((name, value.clone()));
            }
            Fragment::Node(data) => self.node_parameters(id, data, ctx, out),
            Fragment::Relationship(data) => self.relationship_parameters(id, data, ctx, out),
            Fragment::Path(data) => {
                self.parameters(data.start, ctx, out);
                for segment in &data.segments {
                    self.parameters(segment.relationship, ctx, out);
                    self.parameters(segment.end, ctx, out);
                }
            }
            Fragment::Aliased { inner, .. } => self.parameters(*inner, ctx, out),
            Fragment::Array(values) | Fragment::Where(values) | Fragment::With(values) => {
                self.sequence_parameters(values, ctx, out);
            }
            Fragment::Comparison { lhs, rhs, .. } => {
                self.parameters(*lhs, ctx, out);
                self.parameters(*rhs, ctx, out);
            }
            Fragment::NullCheck { value, .. } => self.parameters(*value, ctx, out),
            Fragment::Junction { operands, .. } => self.sequence_parameters(operands, ctx, out),
            Fragment::AnyIn { lhs, rhs } => {
                self.parameters(*lhs, ctx, out);
                self.parameters(*rhs, ctx, out);
            }
            Fragment::SincePeriod { property, period } => {
                self.parameters(*property, ctx, out);
                let name = ctx.variable_name(id);
                out.push((name, Value::Str(period.clone())));
            }
            Fragment::Case(data) => {
                if let Some(subject) = data.subject {
                    self.parameters(subject, ctx, out);
                }
                for (when, then) in &data.arms {
                    self.parameters(*when, ctx, out);
                    self.parameters(*then, ctx, out);
                }
                if let Some(else_value) = data.else_value {
                    self.parameters(else_value, ctx, out);
                }
            }
            Fragment::Coalesce { value, fallback } => {
                self.parameters(*value, ctx, out);
                self.parameters(*fallback, ctx, out);
            }
            Fragment::Collect { value, .. }
            | Fragment::Count { value, .. }
            | Fragment::ToLower(value)
            | Fragment::Size(value) => self.parameters(*value, ctx, out),
            Fragment::DateFn(value) | Fragment::DateTimeFn(value) => {
                if let Some(value) = value {
                    let name = ctx.variable_name(id);
                    out.push((name, value.clone()));
                }
            }
            Fragment::DurationFn(entries) => {
                for (_, value) in entries {
                    self.parameters(*value, ctx, out);
                }
            }
            Fragment::Match(data) => {
                self.parameters(data.pattern, ctx, out);
                self.sequence_parameters(&data.conditions, ctx, out);
            }
            Fragment::Set(entries) => {
                for entry in entries {
                    self.parameters(entry.value, ctx, out);
                }
            }
            Fragment::Remove(_) | Fragment::Delete { .. } => {}
            Fragment::Unwind { values, .. } => self.sequence_parameters(values, ctx, out),
            Fragment::Merge { pattern } => self.parameters(*pattern, ctx, out),
            Fragment::Upsert { merge, set } => self.upsert_parameters(*merge, *set, ctx, out),
        }
    }

    fn sequence_parameters(
        &self,
        values: &[FragmentId],
        ctx: &mut RenderContext,
        out: &mut Vec<(SmolStr, Value)>,
    ) {
        for &value in values {
            self.parameters(value, ctx, out);
        }
    }

    /// The identifier of a node, relationship, or aliased fragment, if one
    /// was assigned.
    pub(crate) fn identifier_of(&self, id: FragmentId) -> Option<&SmolStr> {
        match self.fragment(id) {
            Fragment::Node(data) => data.identifier.as_ref(),
            Fragment::Relationship(data) => data.identifier.as_ref(),
            Fragment::Aliased { alias, .. } => Some(alias),
            _ => None,
        }
    }

    /// Like [`identifier_of`](Self::identifier_of) but failing with
    /// [`Error::MissingIdentifier`] when none exists.
    pub(crate) fn required_identifier(&self, id: FragmentId) -> Result<&SmolStr> {
        self.identifier_of(id).ok_or_else(|| Error::MissingIdentifier {
            fragment: self.describe(id),
        })
    }

    /// A short human description of a fragment for error messages.
    pub(crate) fn describe(&self, id: FragmentId) -> String {
        match self.fragment(id) {
            Fragment::Node(data) => match (&data.identifier, &data.label) {
                (Some(identifier), Some(label)) => format!("node `{identifier}` (:{label})"),
                (Some(identifier), None) => format!("node `{identifier}`"),
                (None, Some(label)) => format!("anonymous node (:{label})"),
                (None, None) => "anonymous node".to_string(),
            },
            Fragment::Relationship(data) => match (&data.identifier, &data.rel_type) {
                (Some(identifier), Some(rel_type)) => {
                    format!("relationship `{identifier}` (:{rel_type})")
                }
                (Some(identifier), None) => format!("relationship `{identifier}`"),
                (None, Some(rel_type)) => format!("anonymous relationship (:{rel_type})"),
                (None, None) => "anonymous relationship".to_string(),
            },
            Fragment::Aliased { alias, .. } => format!("aliased expression `{alias}`"),
            Fragment::Property(data) => format!("property `{}`", data.name),
            _ => "fragment".to_string(),
        }
    }
}

/// Typed handle to a property fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyId(pub(crate) FragmentId);

impl From<PropertyId> for FragmentId {
    fn from(id: PropertyId) -> Self {
        id.0
    }
}
