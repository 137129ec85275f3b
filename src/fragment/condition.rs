//! Boolean condition fragments for WHERE clauses and CASE arms.
//!
//! Conditions are ordinary fragments: comparisons, null checks, junctions,
//! list membership, and a few composites (fuzzy match, date ranges,
//! recency windows) that expand to the same primitives at render time.

use super::{Fragment, FragmentId, PropertyId, QueryGraph, Scope};
use crate::context::RenderContext;
use crate::error::{Error, Result};
use crate::value::Value;

/// Inclusive temporal bounds for [`QueryGraph::date_range`].
///
/// Bound values are rendered as `datetime($p)` calls over parameterized
/// timestamps. At least one bound must be present.
#[derive(Debug, Clone, Default)]
pub struct DateRange {
    /// Lower bound, matched with `>=`.
    pub after: Option<Value>,
    /// Upper bound, matched with `<=`.
    pub before: Option<Value>,
}

impl QueryGraph {
    fn comparison(
        &mut self,
        lhs: impl Into<FragmentId>,
        op: &'static str,
        rhs: impl Into<FragmentId>,
    ) -> FragmentId {
        self.alloc(Fragment::Comparison {
            lhs: lhs.into(),
            op,
            rhs: rhs.into(),
        })
    }

    /// `lhs = rhs`
    pub fn eq(&mut self, lhs: impl Into<FragmentId>, rhs: impl Into<FragmentId>) -> FragmentId {
        self.comparison(lhs, "=", rhs)
    }

    /// `lhs <> rhs`
    pub fn ne(&mut self, lhs: impl Into<FragmentId>, rhs: impl Into<FragmentId>) -> FragmentId {
        self.comparison(lhs, "<>", rhs)
    }

    /// `lhs > rhs`
    pub fn gt(&mut self, lhs: impl Into<FragmentId>, rhs: impl Into<FragmentId>) -> FragmentId {
        self.comparison(lhs, ">", rhs)
    }

    /// `lhs >= rhs`
    pub fn gte(&mut self, lhs: impl Into<FragmentId>, rhs: impl Into<FragmentId>) -> FragmentId {
        self.comparison(lhs, ">=", rhs)
    }

    /// `lhs < rhs`
    pub fn lt(&mut self, lhs: impl Into<FragmentId>, rhs: impl Into<FragmentId>) -> FragmentId {
        self.comparison(lhs, "<", rhs)
    }

    /// `lhs <= rhs`
    pub fn lte(&mut self, lhs: impl Into<FragmentId>, rhs: impl Into<FragmentId>) -> FragmentId {
        self.comparison(lhs, "<=", rhs)
    }

    /// `lhs IN rhs`
    pub fn in_list(
        &mut self,
        lhs: impl Into<FragmentId>,
        rhs: impl Into<FragmentId>,
    ) -> FragmentId {
        self.comparison(lhs, "IN", rhs)
    }

    /// `value IS NULL`
    pub fn is_null(&mut self, value: impl Into<FragmentId>) -> FragmentId {
        self.alloc(Fragment::NullCheck {
            value: value.into(),
            negated: false,
        })
    }

    /// `value IS NOT NULL`
    pub fn is_not_null(&mut self, value: impl Into<FragmentId>) -> FragmentId {
        self.alloc(Fragment::NullCheck {
            value: value.into(),
            negated: true,
        })
    }

    /// Conjunction of all operands. A single operand renders without
    /// parentheses; multiple operands render as `(a AND b AND …)`.
    pub fn and_all(&mut self, operands: Vec<FragmentId>) -> Result<FragmentId> {
        if operands.is_empty() {
            return Err(Error::EmptyConditions);
        }
        Ok(self.alloc(Fragment::Junction {
            conjunctive: true,
            operands,
        }))
    }

    /// Disjunction of all operands, parenthesized like [`and_all`](Self::and_all).
    pub fn or_any(&mut self, operands: Vec<FragmentId>) -> Result<FragmentId> {
        if operands.is_empty() {
            return Err(Error::EmptyConditions);
        }
        Ok(self.alloc(Fragment::Junction {
            conjunctive: false,
            operands,
        }))
    }

    /// `ANY(_element IN lhs WHERE _element IN rhs)`: true when the two
    /// list expressions intersect.
    pub fn any_in(
        &mut self,
        lhs: impl Into<FragmentId>,
        rhs: impl Into<FragmentId>,
    ) -> FragmentId {
        self.alloc(Fragment::AnyIn {
            lhs: lhs.into(),
            rhs: rhs.into(),
        })
    }

    /// Case-insensitive substring match: `value =~ $p` with the pattern
    /// parameterized as `(?i).*term.*`.
    pub fn fuzzy_match(&mut self, value: impl Into<FragmentId>, term: &str) -> FragmentId {
        let pattern = self.parameter(format!("(?i).*{term}.*"));
        self.comparison(value, "=~", pattern)
    }

    /// `value = false OR value IS NULL`: matches flags that are unset
    /// either explicitly or by absence.
    pub fn false_or_null(&mut self, value: impl Into<FragmentId>) -> FragmentId {
        let value = value.into();
        let false_literal = self.literal("false");
        let is_false = self.comparison(value, "=", false_literal);
        let is_null = self.is_null(value);
        self.alloc(Fragment::Junction {
            conjunctive: false,
            operands: vec![is_false, is_null],
        })
    }

    /// Bounds a temporal property to an inclusive range. Fails with
    /// [`Error::EmptyDateRange`] when neither bound is given.
    pub fn date_range(&mut self, property: PropertyId, range: DateRange) -> Result<FragmentId> {
        let mut conditions = Vec::new();
        if let Some(after) = range.after {
            let bound = self.alloc(Fragment::DateTimeFn(Some(after)));
            conditions.push(self.comparison(property, ">=", bound));
        }
        if let Some(before) = range.before {
            let bound = self.alloc(Fragment::DateTimeFn(Some(before)));
            conditions.push(self.comparison(property, "<=", bound));
        }
        match conditions.len() {
            0 => Err(Error::EmptyDateRange),
            1 => Ok(conditions[0]),
            _ => self.and_all(conditions),
        }
    }

    /// `property >= datetime() - duration($p)` with a period of `days`
    /// days.
    pub fn within_last_days(&mut self, property: PropertyId, days: u32) -> FragmentId {
        self.alloc(Fragment::SincePeriod {
            property: property.into(),
            period: smol_str::format_smolstr!("P{days}D"),
        })
    }

    /// `property >= datetime() - duration($p)` with a period of `months`
    /// months.
    pub fn within_last_months(&mut self, property: PropertyId, months: u32) -> FragmentId {
        self.alloc(Fragment::SincePeriod {
            property: property.into(),
            period: smol_str::format_smolstr!("P{months}M"),
        })
    }

    pub(crate) fn render_comparison(
        &self,
        lhs: FragmentId,
        op: &str,
        rhs: FragmentId,
        ctx: &mut RenderContext,
        out: &mut String,
    ) -> Result<()> {
        self.render(lhs, Scope::Expression, ctx, out)?;
        out.push(' ');
        out.push_str(op);
        out.push(' ');
        self.render(rhs, Scope::Expression, ctx, out)
    }

    pub(crate) fn render_null_check(
        &self,
        value: FragmentId,
        negated: bool,
        ctx: &mut RenderContext,
        out: &mut String,
    ) -> Result<()> {
        self.render(value, Scope::Expression, ctx, out)?;
        out.push_str(if negated { " IS NOT NULL" } else { " IS NULL" });
        Ok(())
    }

    pub(crate) fn render_junction(
        &self,
        conjunctive: bool,
        operands: &[FragmentId],
        ctx: &mut RenderContext,
        out: &mut String,
    ) -> Result<()> {
        match operands {
            [] => Err(Error::EmptyConditions),
            [single] => self.render(*single, Scope::Expression, ctx, out),
            _ => {
                out.push('(');
                let joiner = if conjunctive { " AND " } else { " OR " };
                self.render_joined(operands, joiner, ctx, out)?;
                out.push(')');
                Ok(())
            }
        }
    }

    pub(crate) fn render_any_in(
        &self,
        lhs: FragmentId,
        rhs: FragmentId,
        ctx: &mut RenderContext,
        out: &mut String,
    ) -> Result<()> {
        out.push_str("ANY(_element IN ");
        self.render(lhs, Scope::Expression, ctx, out)?;
        out.push_str(" WHERE _element IN ");
        self.render(rhs, Scope::Expression, ctx, out)?;
        out.push(')');
        Ok(())
    }

    pub(crate) fn render_since_period(
        &self,
        id: FragmentId,
        property: FragmentId,
        ctx: &mut RenderContext,
        out: &mut String,
    ) -> Result<()> {
        self.render(property, Scope::Expression, ctx, out)?;
        out.push_str(" >= datetime() - duration(");
        out.push(super::PARAMETER_PREFIX);
        let name = ctx.variable_name(id);
        out.push_str(&name);
        out.push(')');
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Format;
    use crate::fragment::NodeBuilder;
    use smol_str::SmolStr;

    fn person_name(graph: &mut QueryGraph) -> PropertyId {
        let node = NodeBuilder::labeled("Person")
            .unwrap()
            .named("p")
            .unwrap()
            .insert(graph);
        graph.property(node, "name").unwrap()
    }

    #[test]
    fn comparisons_render_infix_operators() {
        let mut graph = QueryGraph::new();
        let name = person_name(&mut graph);
        let value = graph.parameter("Alice");
        let cond = graph.eq(name, value);
        assert_eq!(graph.render_fragment(cond).unwrap(), "p.name = $_v0");

        let other = graph.parameter(18i64);
        let cond = graph.gte(name, other);
        assert_eq!(graph.render_fragment(cond).unwrap(), "p.name >= $_v0");
    }

    #[test]
    fn null_checks() {
        let mut graph = QueryGraph::new();
        let name = person_name(&mut graph);
        let cond = graph.is_null(name);
        assert_eq!(graph.render_fragment(cond).unwrap(), "p.name IS NULL");
        let cond = graph.is_not_null(name);
        assert_eq!(graph.render_fragment(cond).unwrap(), "p.name IS NOT NULL");
    }

    #[test]
    fn junctions_parenthesize_only_multiple_operands() {
        let mut graph = QueryGraph::new();
        let name = person_name(&mut graph);
        let a = graph.is_null(name);
        let b = graph.is_not_null(name);

        let single = graph.and_all(vec![a]).unwrap();
        assert_eq!(graph.render_fragment(single).unwrap(), "p.name IS NULL");

        let both = graph.or_any(vec![a, b]).unwrap();
        assert_eq!(
            graph.render_fragment(both).unwrap(),
            "(p.name IS NULL OR p.name IS NOT NULL)"
        );
    }

    #[test]
    fn empty_junctions_are_rejected() {
        let mut graph = QueryGraph::new();
        assert_eq!(graph.and_all(vec![]).unwrap_err(), Error::EmptyConditions);
        assert_eq!(graph.or_any(vec![]).unwrap_err(), Error::EmptyConditions);
    }

    #[test]
    fn in_list_over_a_parameterized_array() {
        let mut graph = QueryGraph::new();
        let name = person_name(&mut graph);
        let list = graph.array_of_values(["Alice", "Bob"]);
        let cond = graph.in_list(name, list);
        assert_eq!(
            graph.render_fragment(cond).unwrap(),
            "p.name IN [$_v0, $_v1]"
        );
    }

    #[test]
    fn any_in_renders_the_intersection_idiom() {
        let mut graph = QueryGraph::new();
        let name = person_name(&mut graph);
        let list = graph.array_of_values(["a"]);
        let cond = graph.any_in(name, list);
        assert_eq!(
            graph.render_fragment(cond).unwrap(),
            "ANY(_element IN p.name WHERE _element IN [$_v0])"
        );
    }

    #[test]
    fn fuzzy_match_parameterizes_the_pattern() {
        let mut graph = QueryGraph::new();
        let name = person_name(&mut graph);
        let cond = graph.fuzzy_match(name, "ali");

        let mut ctx = RenderContext::new(Format::Compact);
        let mut out = String::new();
        graph
            .render(cond, Scope::Expression, &mut ctx, &mut out)
            .unwrap();
        assert_eq!(out, "p.name =~ $_v0");

        let mut params = Vec::new();
        graph.parameters(cond, &mut ctx, &mut params);
        assert_eq!(
            params,
            vec![(SmolStr::new("_v0"), Value::from("(?i).*ali.*"))]
        );
    }

    #[test]
    fn false_or_null_inlines_the_false_literal() {
        let mut graph = QueryGraph::new();
        let node = NodeBuilder::labeled("Task")
            .unwrap()
            .named("t")
            .unwrap()
            .insert(&mut graph);
        let done = graph.property(node, "done").unwrap();
        let cond = graph.false_or_null(done);
        assert_eq!(
            graph.render_fragment(cond).unwrap(),
            "(t.done = false OR t.done IS NULL)"
        );
    }

    #[test]
    fn date_range_requires_a_bound() {
        let mut graph = QueryGraph::new();
        let name = person_name(&mut graph);
        assert_eq!(
            graph.date_range(name, DateRange::default()).unwrap_err(),
            Error::EmptyDateRange
        );
    }

    #[test]
    fn date_range_renders_each_bound() {
        let mut graph = QueryGraph::new();
        let node = NodeBuilder::labeled("Event")
            .unwrap()
            .named("e")
            .unwrap()
            .insert(&mut graph);
        let at = graph.property(node, "at").unwrap();

        let lower_only = graph
            .date_range(
                at,
                DateRange {
                    after: Some(Value::from("2024-01-01T00:00:00Z")),
                    before: None,
                },
            )
            .unwrap();
        assert_eq!(
            graph.render_fragment(lower_only).unwrap(),
            "e.at >= datetime($_v0)"
        );

        let both = graph
            .date_range(
                at,
                DateRange {
                    after: Some(Value::from("2024-01-01T00:00:00Z")),
                    before: Some(Value::from("2024-12-31T23:59:59Z")),
                },
            )
            .unwrap();
        assert_eq!(
            graph.render_fragment(both).unwrap(),
            "(e.at >= datetime($_v0) AND e.at <= datetime($_v1))"
        );
    }

    #[test]
    fn recency_windows_parameterize_iso_periods() {
        let mut graph = QueryGraph::new();
        let node = NodeBuilder::labeled("Event")
            .unwrap()
            .named("e")
            .unwrap()
            .insert(&mut graph);
        let at = graph.property(node, "at").unwrap();
        let cond = graph.within_last_days(at, 7);

        let mut ctx = RenderContext::new(Format::Compact);
        let mut out = String::new();
        graph
            .render(cond, Scope::Expression, &mut ctx, &mut out)
            .unwrap();
        assert_eq!(out, "e.at >= datetime() - duration($_v0)");

        let mut params = Vec::new();
        graph.parameters(cond, &mut ctx, &mut params);
        assert_eq!(params, vec![(SmolStr::new("_v0"), Value::from("P7D"))]);

        let months = graph.within_last_months(at, 3);
        let mut params = Vec::new();
        let mut ctx = RenderContext::new(Format::Compact);
        graph.parameters(months, &mut ctx, &mut params);
        assert_eq!(params, vec![(SmolStr::new("_v0"), Value::from("P3M"))]);
    }
}
