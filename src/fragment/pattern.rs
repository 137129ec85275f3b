//! Graph pattern fragments: nodes, relationships, paths, and property
//! access.
//!
//! Patterns carry the build-once semantics of the engine. A node renders
//! its full definition the first time it appears in a definable position
//! and a parenthesized reference everywhere after; a relationship renders
//! its full definition exactly once and treats a second definition as a
//! hard error, since Cypher gives a re-mentioned relationship variable
//! different semantics than a re-mentioned node variable.

use super::{Fragment, FragmentId, QueryGraph, Scope};
use crate::context::RenderContext;
use crate::error::{Error, Result};
use crate::ident::{IdentifierGenerator, validate_identifier, validate_property_name};
use crate::value::Value;
use smol_str::SmolStr;

// ============================================================================
// Handles
// ============================================================================

/// Typed handle to a node fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeId(pub(crate) FragmentId);

/// Typed handle to a relationship fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationshipId(pub(crate) FragmentId);

/// Typed handle to a path fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathId(pub(crate) FragmentId);

impl From<NodeId> for FragmentId {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

impl From<RelationshipId> for FragmentId {
    fn from(id: RelationshipId) -> Self {
        id.0
    }
}

impl From<PathId> for FragmentId {
    fn from(id: PathId) -> Self {
        id.0
    }
}

/// Traversal direction of one path leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// `-[r]->`
    Outgoing,
    /// `<-[r]-`
    Incoming,
}

// ============================================================================
// Fragment payloads
// ============================================================================

#[derive(Debug, Clone)]
pub(crate) struct NodeData {
    pub(crate) identifier: Option<SmolStr>,
    pub(crate) label: Option<SmolStr>,
    pub(crate) properties: Vec<(SmolStr, Value)>,
    /// Name of the property that identifies this node for merge-by-key.
    pub(crate) identifying: Option<SmolStr>,
    /// Yielded nodes arrive already bound from an outer clause and render
    /// as references without the used-before-defined check.
    pub(crate) yielded: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct RelationshipData {
    pub(crate) identifier: Option<SmolStr>,
    /// `None` is the wildcard: any relationship type.
    pub(crate) rel_type: Option<SmolStr>,
    /// Variable-length traversal (`:TYPE*`).
    pub(crate) recursive: bool,
    pub(crate) properties: Vec<(SmolStr, Value)>,
}

#[derive(Debug, Clone)]
pub(crate) struct PathData {
    pub(crate) start: FragmentId,
    pub(crate) segments: Vec<PartialPattern>,
}

/// One path leg: a relationship with a direction, ending at a node.
#[derive(Debug, Clone)]
pub(crate) struct PartialPattern {
    pub(crate) relationship: FragmentId,
    pub(crate) direction: Direction,
    pub(crate) end: FragmentId,
}

#[derive(Debug, Clone)]
pub(crate) struct PropertyData {
    pub(crate) owner: FragmentId,
    pub(crate) name: SmolStr,
    /// Further nested accesses after `name`.
    pub(crate) trail: Vec<SmolStr>,
}

// ============================================================================
// Builders
// ============================================================================

/// Fluent constructor for node fragments.
///
/// The builder owns its data until [`insert`](Self::insert) moves it into
/// a [`QueryGraph`]; identifiers and properties can still be amended on the
/// inserted fragment through [`QueryGraph::name_node`] and
/// [`QueryGraph::add_node_property`].
#[derive(Debug)]
pub struct NodeBuilder {
    data: NodeData,
}

impl NodeBuilder {
    /// A node constrained to `label`.
    pub fn labeled(label: &str) -> Result<Self> {
        validate_identifier(label)?;
        Ok(Self {
            data: NodeData {
                identifier: None,
                label: Some(SmolStr::new(label)),
                properties: Vec::new(),
                identifying: None,
                yielded: false,
            },
        })
    }

    /// A node with no label constraint.
    pub fn anonymous() -> Self {
        Self {
            data: NodeData {
                identifier: None,
                label: None,
                properties: Vec::new(),
                identifying: None,
                yielded: false,
            },
        }
    }

    /// A node bound by an outer clause (a procedure YIELD or a WITH
    /// projection). Always renders as a reference to `name`.
    pub fn yielded(name: &str) -> Result<Self> {
        validate_identifier(name)?;
        Ok(Self {
            data: NodeData {
                identifier: Some(SmolStr::new(name)),
                label: None,
                properties: Vec::new(),
                identifying: None,
                yielded: true,
            },
        })
    }

    /// Assigns a validated identifier.
    pub fn named(mut self, name: &str) -> Result<Self> {
        validate_identifier(name)?;
        self.data.identifier = Some(SmolStr::new(name));
        Ok(self)
    }

    /// Assigns a generator-allocated identifier.
    pub fn auto_named(mut self, generator: &mut IdentifierGenerator) -> Self {
        self.data.identifier = Some(generator.next());
        self
    }

    /// Adds an inline property. Null values are accepted here and skipped
    /// at render time.
    pub fn property(mut self, name: &str, value: impl Into<Value>) -> Result<Self> {
        validate_property_name(name)?;
        self.data.properties.push((SmolStr::new(name), value.into()));
        Ok(self)
    }

    /// Adds an inline property and marks it as the identifying key for
    /// merge-by-key operations.
    pub fn identifying_property(mut self, name: &str, value: impl Into<Value>) -> Result<Self> {
        validate_property_name(name)?;
        let name = SmolStr::new(name);
        self.data.identifying = Some(name.clone());
        self.data.properties.push((name, value.into()));
        Ok(self)
    }

    /// Moves the node into the arena.
    pub fn insert(self, graph: &mut QueryGraph) -> NodeId {
        NodeId(graph.alloc(Fragment::Node(self.data)))
    }
}

/// Fluent constructor for relationship fragments.
#[derive(Debug)]
pub struct RelationshipBuilder {
    data: RelationshipData,
}

impl RelationshipBuilder {
    /// A relationship constrained to `rel_type`.
    pub fn typed(rel_type: &str) -> Result<Self> {
        validate_identifier(rel_type)?;
        Ok(Self {
            data: RelationshipData {
                identifier: None,
                rel_type: Some(SmolStr::new(rel_type)),
                recursive: false,
                properties: Vec::new(),
            },
        })
    }

    /// The wildcard relationship, matching any type.
    pub fn any() -> Self {
        Self {
            data: RelationshipData {
                identifier: None,
                rel_type: None,
                recursive: false,
                properties: Vec::new(),
            },
        }
    }

    /// Assigns a validated identifier.
    pub fn named(mut self, name: &str) -> Result<Self> {
        validate_identifier(name)?;
        self.data.identifier = Some(SmolStr::new(name));
        Ok(self)
    }

    /// Assigns a short identifier derived from the relationship type (or
    /// `rel` for the wildcard), deduplicated by the generator.
    pub fn auto_named(mut self, generator: &mut IdentifierGenerator) -> Self {
        let seed = self.data.rel_type.as_deref().unwrap_or("rel");
        self.data.identifier = Some(generator.unique(seed));
        self
    }

    /// Marks the relationship as variable-length (`:TYPE*`).
    pub fn recursive(mut self) -> Self {
        self.data.recursive = true;
        self
    }

    /// Adds an inline property. Relationship properties must be non-null.
    pub fn property(mut self, name: &str, value: impl Into<Value>) -> Result<Self> {
        validate_property_name(name)?;
        let value = value.into();
        if value.is_null() {
            return Err(Error::NullPropertyValue {
                property: name.to_string(),
            });
        }
        self.data.properties.push((SmolStr::new(name), value));
        Ok(self)
    }

    /// Moves the relationship into the arena.
    pub fn insert(self, graph: &mut QueryGraph) -> RelationshipId {
        RelationshipId(graph.alloc(Fragment::Relationship(self.data)))
    }
}

/// Fluent constructor for path fragments.
///
/// A path alternates nodes and directed relationships:
/// `start().outgoing(r).to(n).incoming(s).to(m)…`. The direction method
/// returns a [`PathLink`] whose only continuation is
/// [`to`](PathLink::to), so an unterminated leg cannot be inserted.
#[derive(Debug)]
pub struct PathBuilder {
    start: NodeId,
    segments: Vec<PartialPattern>,
}

impl PathBuilder {
    /// Starts a path at `node`.
    pub fn start(node: NodeId) -> Self {
        Self {
            start: node,
            segments: Vec::new(),
        }
    }

    /// Begins a leg traversing `relationship` left to right.
    pub fn outgoing(self, relationship: RelationshipId) -> PathLink {
        PathLink {
            builder: self,
            relationship,
            direction: Direction::Outgoing,
        }
    }

    /// Begins a leg traversing `relationship` right to left.
    pub fn incoming(self, relationship: RelationshipId) -> PathLink {
        PathLink {
            builder: self,
            relationship,
            direction: Direction::Incoming,
        }
    }

    /// Moves the path into the arena. Cycle detection happens at render
    /// time, when the node set is final.
    pub fn insert(self, graph: &mut QueryGraph) -> PathId {
        PathId(graph.alloc(Fragment::Path(PathData {
            start: self.start.into(),
            segments: self.segments,
        })))
    }
}

/// An open path leg awaiting its end node.
#[derive(Debug)]
pub struct PathLink {
    builder: PathBuilder,
    relationship: RelationshipId,
    direction: Direction,
}

impl PathLink {
    /// Closes the leg at `node` and returns the extendable path.
    pub fn to(mut self, node: NodeId) -> PathBuilder {
        self.builder.segments.push(PartialPattern {
            relationship: self.relationship.into(),
            direction: self.direction,
            end: node.into(),
        });
        self.builder
    }
}

// ============================================================================
// Arena access and rendering
// ============================================================================

impl QueryGraph {
    fn node_data_mut(&mut self, node: NodeId) -> &mut NodeData {
        match self.fragment_mut(node.into()) {
            Fragment::Node(data) => data,
            _ => unreachable!("NodeId always points at a node fragment"),
        }
    }

    /// Assigns or replaces the identifier of an already-inserted node.
    pub fn name_node(&mut self, node: NodeId, name: &str) -> Result<()> {
        validate_identifier(name)?;
        self.node_data_mut(node).identifier = Some(SmolStr::new(name));
        Ok(())
    }

    /// Adds an inline property to an already-inserted node.
    pub fn add_node_property(
        &mut self,
        node: NodeId,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<()> {
        validate_property_name(name)?;
        self.node_data_mut(node)
            .properties
            .push((SmolStr::new(name), value.into()));
        Ok(())
    }

    pub(crate) fn render_node(
        &self,
        id: FragmentId,
        data: &NodeData,
        scope: Scope,
        ctx: &mut RenderContext,
        out: &mut String,
    ) -> Result<()> {
        if data.yielded || ctx.is_built(id) {
            let identifier = self.required_identifier(id)?;
            // Pattern positions need the parentheses; expression positions
            // take the bare identifier.
            if scope.node_definable() {
                out.push('(');
                out.push_str(identifier);
                out.push(')');
            } else {
                out.push_str(identifier);
            }
            return Ok(());
        }

        if !scope.node_definable() {
            return Err(Error::UsedBeforeDefined {
                fragment: self.describe(id),
            });
        }

        out.push('(');
        if let Some(identifier) = &data.identifier {
            out.push_str(identifier);
        }
        if let Some(label) = &data.label {
            out.push(':');
            out.push_str(label);
        }
        let visible = self.visible_node_properties(data, ctx);
        if !visible.is_empty() {
            if data.identifier.is_some() || data.label.is_some() {
                out.push(' ');
            }
            self.render_property_map(id, &visible, ctx, out);
        }
        out.push(')');
        ctx.mark_built(id);
        Ok(())
    }

    pub(crate) fn render_relationship(
        &self,
        id: FragmentId,
        data: &RelationshipData,
        scope: Scope,
        ctx: &mut RenderContext,
        out: &mut String,
    ) -> Result<()> {
        if !scope.relationship_definable() {
            if ctx.is_built(id) {
                let identifier = self.required_identifier(id)?;
                out.push_str(identifier);
                return Ok(());
            }
            return Err(Error::UsedBeforeDefined {
                fragment: self.describe(id),
            });
        }

        if ctx.is_built(id) {
            return Err(Error::BuiltTwice {
                fragment: self.describe(id),
            });
        }

        out.push('[');
        if let Some(identifier) = &data.identifier {
            out.push_str(identifier);
        }
        match &data.rel_type {
            Some(rel_type) => {
                out.push(':');
                out.push_str(rel_type);
                if data.recursive {
                    out.push('*');
                }
            }
            None => out.push('*'),
        }
        // Relationships designate no identifying property, so the
        // identifying-only flag suppresses their whole property map.
        if !data.properties.is_empty() && !ctx.flags.identifying_only {
            out.push(' ');
            self.render_property_map(id, &data.properties, ctx, out);
        }
        out.push(']');
        ctx.mark_built(id);
        Ok(())
    }

    pub(crate) fn render_path(
        &self,
        data: &PathData,
        ctx: &mut RenderContext,
        out: &mut String,
    ) -> Result<()> {
        let mut visited = vec![data.start];
        self.render(data.start, Scope::Path, ctx, out)?;

        for segment in &data.segments {
            if visited.contains(&segment.end) {
                return Err(Error::CyclicalReference);
            }
            visited.push(segment.end);

            match segment.direction {
                Direction::Outgoing => out.push('-'),
                Direction::Incoming => out.push_str("<-"),
            }
            self.render(segment.relationship, Scope::PartialPattern, ctx, out)?;
            match segment.direction {
                Direction::Outgoing => out.push_str("->"),
                Direction::Incoming => out.push('-'),
            }
            self.render(segment.end, Scope::PartialPattern, ctx, out)?;
        }
        Ok(())
    }

    pub(crate) fn render_property(&self, data: &PropertyData, out: &mut String) -> Result<()> {
        let identifier = self.required_identifier(data.owner)?;
        out.push_str(identifier);
        out.push('.');
        out.push_str(&data.name);
        for sub in &data.trail {
            out.push('.');
            out.push_str(sub);
        }
        Ok(())
    }

    /// Inline property map `{name: $base_name, …}`. Parameter names are
    /// derived from the owning fragment's context-assigned base name so
    /// they never collide across patterns, whatever identifiers the caller
    /// picked. The rendered names are recorded on the context for the
    /// parameter-collection pass.
    fn render_property_map(
        &self,
        id: FragmentId,
        properties: &[(SmolStr, Value)],
        ctx: &mut RenderContext,
        out: &mut String,
    ) {
        let base = ctx.variable_name(id);
        out.push('{');
        for (index, (name, _)) in properties.iter().enumerate() {
            if index > 0 {
                out.push_str(", ");
            }
            out.push_str(name);
            out.push_str(": ");
            out.push(super::PARAMETER_PREFIX);
            out.push_str(&base);
            out.push('_');
            out.push_str(name);
        }
        out.push('}');
        let names = properties.iter().map(|(name, _)| name.clone()).collect();
        ctx.record_rendered_properties(id, names);
    }

    fn visible_node_properties(
        &self,
        data: &NodeData,
        ctx: &RenderContext,
    ) -> Vec<(SmolStr, Value)> {
        data.properties
            .iter()
            .filter(|(name, value)| {
                if value.is_null() {
                    return false;
                }
                if ctx.flags.identifying_only {
                    data.identifying.as_ref() == Some(name)
                } else {
                    true
                }
            })
            .cloned()
            .collect()
    }

    pub(crate) fn node_parameters(
        &self,
        id: FragmentId,
        data: &NodeData,
        ctx: &mut RenderContext,
        out: &mut Vec<(SmolStr, Value)>,
    ) {
        self.rendered_property_parameters(id, &data.properties, ctx, out);
    }

    pub(crate) fn relationship_parameters(
        &self,
        id: FragmentId,
        data: &RelationshipData,
        ctx: &mut RenderContext,
        out: &mut Vec<(SmolStr, Value)>,
    ) {
        self.rendered_property_parameters(id, &data.properties, ctx, out);
    }

    /// Contributes bindings only for the properties the render pass put
    /// into the text. The context recorded that set when the pattern's
    /// definition rendered; a pattern that only ever rendered as a
    /// reference, or whose map was suppressed by a flag at definition
    /// time, contributes nothing here.
    fn rendered_property_parameters(
        &self,
        id: FragmentId,
        properties: &[(SmolStr, Value)],
        ctx: &mut RenderContext,
        out: &mut Vec<(SmolStr, Value)>,
    ) {
        let rendered = ctx.rendered_properties(id).to_vec();
        if rendered.is_empty() {
            return;
        }
        let base = ctx.variable_name(id);
        for (name, value) in properties {
            if rendered.contains(name) {
                out.push((SmolStr::new(format!("{base}_{name}")), value.clone()));
            }
        }
    }
}
