//! Per-build mutable rendering state.
//!
//! A [`RenderContext`] lives for exactly one top-level build invocation. It
//! tracks which fragments have already been rendered as full definitions
//! (the build-once invariant), caches generated parameter names, carries the
//! active rendering flags, and holds the formatting mode. Contexts are
//! sequential, single-use accumulators: never share one across concurrently
//! executing builds.

use crate::fragment::FragmentId;
use smol_str::SmolStr;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

/// Output formatting mode.
///
/// Presentation only: the mode changes whitespace between phrases, never the
/// parameter map or the set of placeholders. There is deliberately no
/// process-wide default switch; callers pass the format explicitly and
/// [`Format::default`] is [`Format::Compact`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// Phrases separated by single spaces.
    #[default]
    Compact,
    /// Phrases separated by newlines, nested clauses indented with tabs.
    Pretty,
}

impl Format {
    /// The character inserted between rendered phrases.
    pub fn separator(self) -> char {
        match self {
            Format::Compact => ' ',
            Format::Pretty => '\n',
        }
    }

    /// The indent prefix for nested clauses (CASE arms).
    pub fn indent(self) -> &'static str {
        match self {
            Format::Compact => "",
            Format::Pretty => "\t",
        }
    }
}

/// Flags that temporarily alter rendering behavior for one sub-tree.
///
/// A fragment that activates a flag for a child render must restore the
/// prior flag state afterwards, even when the child render fails; the
/// copyable struct makes save/restore a plain assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderFlags {
    /// Render only the designated identifying property of a pattern,
    /// suppressing the rest (used inside a MERGE whose remaining properties
    /// are supplied by a following SET).
    pub identifying_only: bool,
}

/// Mutable state for a single build pass.
pub struct RenderContext {
    built: HashSet<FragmentId>,
    names: HashMap<FragmentId, SmolStr>,
    /// Property names each fragment actually put into the text, recorded
    /// when its inline map renders. The parameter-collection pass reads
    /// this instead of re-deriving visibility, so a pattern that rendered
    /// as a bare reference (or under a suppressing flag) contributes
    /// exactly the placeholders the text carries.
    rendered: HashMap<FragmentId, Vec<SmolStr>>,
    pub(crate) flags: RenderFlags,
    counter: u32,
    format: Format,
}

impl RenderContext {
    /// Creates a fresh context with the given format and a zeroed name
    /// counter.
    pub fn new(format: Format) -> Self {
        Self::with_counter(format, 0)
    }

    /// Creates a fresh context whose name counter starts at `counter`.
    ///
    /// Used by UNION composition: each branch builds against its own
    /// context, but the counter is threaded from one branch to the next so
    /// generated parameter names never collide across branches.
    pub fn with_counter(format: Format, counter: u32) -> Self {
        Self {
            built: HashSet::new(),
            names: HashMap::new(),
            rendered: HashMap::new(),
            flags: RenderFlags::default(),
            counter,
            format,
        }
    }

    /// The current value of the name counter.
    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// The formatting mode of this context.
    pub fn format(&self) -> Format {
        self.format
    }

    /// The statement separator for this context's format.
    pub fn separator(&self) -> char {
        self.format.separator()
    }

    /// The indent prefix for this context's format.
    pub fn indent(&self) -> &'static str {
        self.format.indent()
    }

    /// Marks a fragment as fully rendered within this build.
    pub(crate) fn mark_built(&mut self, id: FragmentId) {
        self.built.insert(id);
    }

    /// Whether a fragment has been fully rendered within this build.
    ///
    /// Identity-keyed: two structurally equal fragments with distinct
    /// handles are tracked independently.
    pub(crate) fn is_built(&self, id: FragmentId) -> bool {
        self.built.contains(&id)
    }

    /// Records the property names a fragment's inline map rendered with.
    pub(crate) fn record_rendered_properties(&mut self, id: FragmentId, names: Vec<SmolStr>) {
        self.rendered.insert(id, names);
    }

    /// The property names a fragment rendered within this build; empty for
    /// fragments that never rendered an inline map.
    pub(crate) fn rendered_properties(&self, id: FragmentId) -> &[SmolStr] {
        self.rendered.get(&id).map_or(&[], Vec::as_slice)
    }

    /// Returns the generated parameter/variable name for a fragment,
    /// allocating one on first use.
    ///
    /// The same handle always maps to the same name within one context's
    /// lifetime.
    pub(crate) fn variable_name(&mut self, id: FragmentId) -> SmolStr {
        match self.names.entry(id) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                let name = SmolStr::new(format!("_v{}", self.counter));
                self.counter += 1;
                entry.insert(name.clone());
                name
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_controls_whitespace_only() {
        assert_eq!(Format::Compact.separator(), ' ');
        assert_eq!(Format::Pretty.separator(), '\n');
        assert_eq!(Format::Compact.indent(), "");
        assert_eq!(Format::Pretty.indent(), "\t");
        assert_eq!(Format::default(), Format::Compact);
    }

    #[test]
    fn variable_names_are_stable_per_fragment() {
        let mut ctx = RenderContext::new(Format::Compact);
        let a = FragmentId::new(0);
        let b = FragmentId::new(1);

        assert_eq!(ctx.variable_name(a), "_v0");
        assert_eq!(ctx.variable_name(b), "_v1");
        assert_eq!(ctx.variable_name(a), "_v0");
        assert_eq!(ctx.counter(), 2);
    }

    #[test]
    fn counter_can_be_threaded_across_contexts() {
        let mut first = RenderContext::new(Format::Compact);
        let id = FragmentId::new(7);
        assert_eq!(first.variable_name(id), "_v0");

        let mut second = RenderContext::with_counter(Format::Compact, first.counter());
        // The same handle gets a fresh name in the second context, but one
        // that cannot collide with names from the first.
        assert_eq!(second.variable_name(id), "_v1");
    }

    #[test]
    fn rendered_properties_default_to_empty() {
        let mut ctx = RenderContext::new(Format::Compact);
        let id = FragmentId::new(2);

        assert!(ctx.rendered_properties(id).is_empty());
        ctx.record_rendered_properties(id, vec![SmolStr::new("name")]);
        assert_eq!(ctx.rendered_properties(id), [SmolStr::new("name")]);
    }

    #[test]
    fn built_tracking_is_identity_keyed() {
        let mut ctx = RenderContext::new(Format::Compact);
        let a = FragmentId::new(3);
        let b = FragmentId::new(4);

        assert!(!ctx.is_built(a));
        ctx.mark_built(a);
        assert!(ctx.is_built(a));
        assert!(!ctx.is_built(b));
    }
}
