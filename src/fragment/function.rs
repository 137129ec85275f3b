//! Scalar and aggregate function fragments.
//!
//! Thin wrappers over existing fragments: aggregates (`COLLECT`, `COUNT`),
//! scalar helpers (`COALESCE`, `SIZE`, `tolower`), temporal constructors
//! (`date`, `datetime`, `DURATION`), and CASE expressions.

use super::{Fragment, FragmentId, QueryGraph, Scope};
use crate::context::RenderContext;
use crate::error::{Error, Result};
use crate::value::Value;

/// A component unit of a `DURATION({…})` constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationUnit {
    Years,
    Months,
    Days,
    Hours,
    Minutes,
    Seconds,
}

impl DurationUnit {
    fn keyword(self) -> &'static str {
        match self {
            DurationUnit::Years => "years",
            DurationUnit::Months => "months",
            DurationUnit::Days => "days",
            DurationUnit::Hours => "hours",
            DurationUnit::Minutes => "minutes",
            DurationUnit::Seconds => "seconds",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct CaseData {
    pub(crate) subject: Option<FragmentId>,
    pub(crate) arms: Vec<(FragmentId, FragmentId)>,
    pub(crate) else_value: Option<FragmentId>,
}

/// Fluent constructor for CASE expressions.
///
/// `when` hands out a [`CaseWhen`] whose only continuation is
/// [`then`](CaseWhen::then), so a WHEN can never be inserted without its
/// THEN. At least one arm is required at [`insert`](Self::insert).
#[derive(Debug, Default)]
pub struct CaseBuilder {
    subject: Option<FragmentId>,
    arms: Vec<(FragmentId, FragmentId)>,
    else_value: Option<FragmentId>,
}

impl CaseBuilder {
    /// A searched CASE: each WHEN carries its own condition.
    pub fn new() -> Self {
        Self::default()
    }

    /// A simple CASE comparing `subject` against each WHEN value.
    pub fn matching(subject: impl Into<FragmentId>) -> Self {
        Self {
            subject: Some(subject.into()),
            arms: Vec::new(),
            else_value: None,
        }
    }

    /// Opens a WHEN arm.
    pub fn when(self, condition: impl Into<FragmentId>) -> CaseWhen {
        CaseWhen {
            builder: self,
            when: condition.into(),
        }
    }

    /// Sets the ELSE value.
    pub fn otherwise(mut self, value: impl Into<FragmentId>) -> Self {
        self.else_value = Some(value.into());
        self
    }

    /// Moves the expression into the arena. Fails with
    /// [`Error::EmptyCase`] when no arm was added.
    pub fn insert(self, graph: &mut QueryGraph) -> Result<FragmentId> {
        if self.arms.is_empty() {
            return Err(Error::EmptyCase);
        }
        Ok(graph.alloc(Fragment::Case(CaseData {
            subject: self.subject,
            arms: self.arms,
            else_value: self.else_value,
        })))
    }
}

/// An open WHEN arm awaiting its THEN value.
#[derive(Debug)]
pub struct CaseWhen {
    builder: CaseBuilder,
    when: FragmentId,
}

impl CaseWhen {
    /// Closes the arm with its result value.
    pub fn then(mut self, value: impl Into<FragmentId>) -> CaseBuilder {
        self.builder.arms.push((self.when, value.into()));
        self.builder
    }
}

impl QueryGraph {
    /// `COALESCE(value, fallback)`
    pub fn coalesce(
        &mut self,
        value: impl Into<FragmentId>,
        fallback: impl Into<FragmentId>,
    ) -> FragmentId {
        self.alloc(Fragment::Coalesce {
            value: value.into(),
            fallback: fallback.into(),
        })
    }

    /// `COLLECT(value)`
    pub fn collect(&mut self, value: impl Into<FragmentId>) -> FragmentId {
        self.alloc(Fragment::Collect {
            value: value.into(),
            distinct: false,
        })
    }

    /// `COLLECT(DISTINCT value)`
    pub fn collect_distinct(&mut self, value: impl Into<FragmentId>) -> FragmentId {
        self.alloc(Fragment::Collect {
            value: value.into(),
            distinct: true,
        })
    }

    /// `COUNT(value)`
    pub fn count(&mut self, value: impl Into<FragmentId>) -> FragmentId {
        self.alloc(Fragment::Count {
            value: value.into(),
            distinct: false,
        })
    }

    /// `COUNT(DISTINCT value)`
    pub fn count_distinct(&mut self, value: impl Into<FragmentId>) -> FragmentId {
        self.alloc(Fragment::Count {
            value: value.into(),
            distinct: true,
        })
    }

    /// `tolower(value)`
    pub fn to_lower(&mut self, value: impl Into<FragmentId>) -> FragmentId {
        self.alloc(Fragment::ToLower(value.into()))
    }

    /// `SIZE(value)`
    pub fn size(&mut self, value: impl Into<FragmentId>) -> FragmentId {
        self.alloc(Fragment::Size(value.into()))
    }

    /// `date()`: the current date at evaluation time.
    pub fn date_now(&mut self) -> FragmentId {
        self.alloc(Fragment::DateFn(None))
    }

    /// `date($p)` over a parameterized date value.
    pub fn date_of(&mut self, value: impl Into<Value>) -> FragmentId {
        self.alloc(Fragment::DateFn(Some(value.into())))
    }

    /// `datetime()`: the current instant at evaluation time.
    pub fn datetime_now(&mut self) -> FragmentId {
        self.alloc(Fragment::DateTimeFn(None))
    }

    /// `datetime($p)` over a parameterized timestamp.
    pub fn datetime_of(&mut self, value: impl Into<Value>) -> FragmentId {
        self.alloc(Fragment::DateTimeFn(Some(value.into())))
    }

    /// `DURATION({unit: expr, …})` from component units.
    pub fn duration(&mut self, components: Vec<(DurationUnit, FragmentId)>) -> FragmentId {
        self.alloc(Fragment::DurationFn(components))
    }

    pub(crate) fn render_case(
        &self,
        data: &CaseData,
        ctx: &mut RenderContext,
        out: &mut String,
    ) -> Result<()> {
        if data.arms.is_empty() {
            return Err(Error::EmptyCase);
        }
        let separator = ctx.separator();
        let indent = ctx.indent();

        out.push_str("CASE");
        if let Some(subject) = data.subject {
            out.push(' ');
            self.render(subject, Scope::Expression, ctx, out)?;
        }
        for &(when, then) in &data.arms {
            out.push(separator);
            out.push_str(indent);
            out.push_str("WHEN ");
            self.render(when, Scope::Expression, ctx, out)?;
            out.push_str(" THEN ");
            self.render(then, Scope::Expression, ctx, out)?;
        }
        if let Some(else_value) = data.else_value {
            out.push(separator);
            out.push_str(indent);
            out.push_str("ELSE ");
            self.render(else_value, Scope::Expression, ctx, out)?;
        }
        out.push(separator);
        out.push_str("END");
        Ok(())
    }

    pub(crate) fn render_coalesce(
        &self,
        value: FragmentId,
        fallback: FragmentId,
        ctx: &mut RenderContext,
        out: &mut String,
    ) -> Result<()> {
        out.push_str("COALESCE(");
        self.render(value, Scope::Expression, ctx, out)?;
        out.push_str(", ");
        self.render(fallback, Scope::Expression, ctx, out)?;
        out.push(')');
        Ok(())
    }

    pub(crate) fn render_aggregate(
        &self,
        name: &str,
        value: FragmentId,
        distinct: bool,
        ctx: &mut RenderContext,
        out: &mut String,
    ) -> Result<()> {
        out.push_str(name);
        out.push('(');
        if distinct {
            out.push_str("DISTINCT ");
        }
        self.render(value, Scope::Expression, ctx, out)?;
        out.push(')');
        Ok(())
    }

    pub(crate) fn render_wrapped(
        &self,
        name: &str,
        value: FragmentId,
        ctx: &mut RenderContext,
        out: &mut String,
    ) -> Result<()> {
        out.push_str(name);
        out.push('(');
        self.render(value, Scope::Expression, ctx, out)?;
        out.push(')');
        Ok(())
    }

    pub(crate) fn render_temporal(
        &self,
        name: &str,
        id: FragmentId,
        value: Option<&Value>,
        ctx: &mut RenderContext,
        out: &mut String,
    ) -> Result<()> {
        out.push_str(name);
        out.push('(');
        if value.is_some() {
            out.push(super::PARAMETER_PREFIX);
            let parameter = ctx.variable_name(id);
            out.push_str(&parameter);
        }
        out.push(')');
        Ok(())
    }

    pub(crate) fn render_duration(
        &self,
        components: &[(DurationUnit, FragmentId)],
        ctx: &mut RenderContext,
        out: &mut String,
    ) -> Result<()> {
        out.push_str("DURATION({");
        for (index, &(unit, value)) in components.iter().enumerate() {
            if index > 0 {
                out.push_str(", ");
            }
            out.push_str(unit.keyword());
            out.push_str(": ");
            self.render(value, Scope::Expression, ctx, out)?;
        }
        out.push_str("})");
        Ok(())
    }
}
