//! Template nodes.
//!
//! An [`Elem`] tree describes how a statement is assembled. Trees are built
//! once (usually at startup), are immutable afterwards and can be evaluated
//! concurrently against any number of [`Context`]s.
//!
//! # Example
//!
//! ```ignore
//! use dynsql::{Condition, composite, frag, if_, where_, Context, params};
//!
//! let select = composite([
//!     frag("SELECT * FROM blog"),
//!     where_([
//!         if_(Condition::test(".state")?, [frag("state = #{state}")]),
//!         if_(Condition::test(".title")?, [frag("AND title like #{title}")]),
//!     ]),
//! ]);
//!
//! let stmt = Context::new()
//!     .with_params(params! { "title" => "%rust%" })
//!     .evaluate(&select)?;
//! assert_eq!(stmt.sql(), "SELECT * FROM blog WHERE title like ?");
//! ```

use crate::condition::Condition;
use crate::context::Context;
use crate::error::{DynSqlError, DynSqlResult};
use crate::params::{MapParameters, Parameters, stringify};
use crate::placeholder::{Segment, Translated, translate};
use crate::statement::Statement;
use serde_json::Value;
use std::borrow::Cow;

/// Marks an include prop value as a lookup into the caller's parameters.
pub const PROP_SIGIL: char = '$';

/// A template node.
#[derive(Debug, Clone, PartialEq)]
pub enum Elem {
    /// Literal text without placeholders.
    Pure(String),
    /// Text with `${}` properties and/or `#{}` parameters.
    Fragment(Fragment),
    /// Reference to a fragment registered in the collection.
    Include(Include),
    /// Conditional inclusion (`if` / `when` / `otherwise`).
    If(Conditional),
    /// First satisfied branch wins.
    Choose(Vec<Conditional>),
    /// All satisfied children, with prefix/suffix rewriting.
    Trim(Trim),
    /// Unconditional concatenation.
    Composite(Vec<Elem>),
}

impl Elem {
    /// Render this node against `ctx`.
    pub fn evaluate(&self, ctx: &Context) -> DynSqlResult<Statement> {
        match self {
            Elem::Pure(text) => Ok(Statement::new(text, Vec::new())),
            Elem::Fragment(fragment) => fragment.evaluate(ctx),
            Elem::Include(include) => include.evaluate(ctx),
            Elem::If(cond) => cond.evaluate(ctx),
            Elem::Choose(branches) => {
                for branch in branches {
                    if branch.satisfy(ctx)? {
                        return branch.evaluate_children(ctx);
                    }
                }
                Ok(Statement::empty())
            }
            Elem::Trim(trim) => trim.evaluate(ctx),
            Elem::Composite(children) => evaluate_all(children, ctx, None),
        }
    }

    /// The condition guarding this node, if it has one.
    pub fn condition(&self) -> Option<&Condition> {
        match self {
            Elem::If(cond) => Some(&cond.condition),
            _ => None,
        }
    }

    /// Test this node's condition; unconditional nodes are always satisfied.
    pub fn satisfy(&self, ctx: &Context) -> DynSqlResult<bool> {
        match self.condition() {
            Some(cond) => cond.satisfy(ctx),
            None => Ok(true),
        }
    }

    /// Visit every include reachable in this tree without going through the
    /// collection.
    pub fn visit_includes<'a>(&'a self, visit: &mut impl FnMut(&'a Include)) {
        match self {
            Elem::Pure(_) | Elem::Fragment(_) => {}
            Elem::Include(include) => visit(include),
            Elem::If(cond) => cond.children.iter().for_each(|c| c.visit_includes(visit)),
            Elem::Choose(branches) => branches
                .iter()
                .flat_map(|b| &b.children)
                .for_each(|c| c.visit_includes(visit)),
            Elem::Trim(trim) => trim
                .children
                .iter()
                .flat_map(|b| &b.children)
                .for_each(|c| c.visit_includes(visit)),
            Elem::Composite(children) => children.iter().for_each(|c| c.visit_includes(visit)),
        }
    }
}

fn evaluate_all(children: &[Elem], ctx: &Context, prefix: Option<&str>) -> DynSqlResult<Statement> {
    let statements = children
        .iter()
        .map(|child| child.evaluate(ctx))
        .collect::<DynSqlResult<Vec<_>>>()?;
    Ok(Statement::merge(statements, prefix))
}

impl From<&str> for Elem {
    fn from(text: &str) -> Self {
        frag(text)
    }
}

impl From<String> for Elem {
    fn from(text: String) -> Self {
        frag(&text)
    }
}

/// Template text whose placeholders were translated at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    translated: Translated,
}

impl Fragment {
    /// Distinct property names, first-seen order.
    pub fn properties(&self) -> &[String] {
        &self.translated.properties
    }

    /// Parameter names, one per occurrence.
    pub fn parameters(&self) -> &[String] {
        &self.translated.parameters
    }

    /// Normalized text with `${n}` / `#{n}` index markers.
    pub fn normalized(&self) -> String {
        self.translated.to_string()
    }

    fn evaluate(&self, ctx: &Context) -> DynSqlResult<Statement> {
        let params = ctx.params();

        let props = self
            .translated
            .properties
            .iter()
            .map(|name| {
                params
                    .get(name)
                    .map(stringify)
                    .ok_or_else(|| DynSqlError::missing(name.as_str()))
            })
            .collect::<DynSqlResult<Vec<_>>>()?;

        // named binding is resolved by the executor against a record
        if !ctx.is_named() {
            if let Some(name) = self.parameters().iter().find(|p| !params.exist(p.as_str())) {
                return Err(DynSqlError::missing(name.as_str()));
            }
        }

        let mut sql = String::new();
        for segment in &self.translated.segments {
            match segment {
                Segment::Text(text) => sql.push_str(text),
                Segment::Property(idx) => sql.push_str(&props[*idx]),
                Segment::Parameter(idx) if ctx.is_named() => {
                    sql.push(':');
                    sql.push_str(&self.translated.parameters[*idx]);
                }
                Segment::Parameter(_) => sql.push('?'),
            }
        }

        Ok(Statement::new(sql, self.translated.parameters.clone()))
    }
}

/// Reference to another registered fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct Include {
    id: String,
    dynamic: bool,
    props: MapParameters,
}

impl Include {
    /// Pass a prop to the included fragment.
    ///
    /// A string value starting with `$` is resolved against the caller's
    /// parameters at evaluation time (`"$md5"` passes the caller's `md5`);
    /// anything else is passed through as-is.
    pub fn prop(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.insert(key, value);
        self
    }

    /// Replace all props at once.
    pub fn props(mut self, props: MapParameters) -> Self {
        self.props = props;
        self
    }

    /// The literal id, or the parameter key holding it when dynamic.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether the id is read from the parameters at evaluation time.
    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    fn resolve_id<'a>(&'a self, ctx: &Context) -> DynSqlResult<Cow<'a, str>> {
        if !self.dynamic {
            return Ok(Cow::Borrowed(self.id.as_str()));
        }
        ctx.params()
            .get(&self.id)
            .map(|v| Cow::Owned(stringify(v)))
            .ok_or_else(|| DynSqlError::missing(self.id.as_str()))
    }

    fn resolve_props(&self, ctx: &Context) -> DynSqlResult<MapParameters> {
        let mut props = MapParameters::new();
        for key in self.props.keys() {
            let Some(value) = self.props.get(key) else {
                continue;
            };
            let value = match value.as_str().and_then(|s| s.strip_prefix(PROP_SIGIL)) {
                Some(lookup) => ctx
                    .params()
                    .get(lookup)
                    .cloned()
                    .ok_or_else(|| DynSqlError::missing(lookup))?,
                None => value.clone(),
            };
            props.insert(key, value);
        }
        Ok(props)
    }

    fn evaluate(&self, ctx: &Context) -> DynSqlResult<Statement> {
        let id = self.resolve_id(ctx)?;
        let props = self.resolve_props(ctx)?;
        ctx.enter(&id)?;
        let target = ctx.get_sql(&id)?;

        #[cfg(feature = "tracing")]
        tracing::trace!(
            target: "dynsql",
            id = %id,
            depth = ctx.depth() + 1,
            props = ?props.keys(),
            "resolved include"
        );

        target.evaluate(&ctx.next(&props))
    }
}

impl From<Include> for Elem {
    fn from(include: Include) -> Self {
        Elem::Include(include)
    }
}

/// A condition with the children it guards.
#[derive(Debug, Clone, PartialEq)]
pub struct Conditional {
    condition: Condition,
    children: Vec<Elem>,
}

impl Conditional {
    pub fn new<I, E>(condition: Condition, children: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<Elem>,
    {
        Self {
            condition,
            children: children.into_iter().map(Into::into).collect(),
        }
    }

    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    pub fn children(&self) -> &[Elem] {
        &self.children
    }

    pub fn satisfy(&self, ctx: &Context) -> DynSqlResult<bool> {
        self.condition.satisfy(ctx)
    }

    /// Test the condition, then render the children if it holds.
    ///
    /// An unsatisfied branch renders nothing and never fails, even if its
    /// children reference parameters that are missing.
    pub fn evaluate(&self, ctx: &Context) -> DynSqlResult<Statement> {
        if !self.satisfy(ctx)? {
            return Ok(Statement::empty());
        }
        self.evaluate_children(ctx)
    }

    fn evaluate_children(&self, ctx: &Context) -> DynSqlResult<Statement> {
        evaluate_all(&self.children, ctx, None)
    }
}

impl From<Conditional> for Elem {
    fn from(cond: Conditional) -> Self {
        Elem::If(cond)
    }
}

/// Conditional nodes stay as they are; anything else is always included.
impl From<Elem> for Conditional {
    fn from(elem: Elem) -> Self {
        match elem {
            Elem::If(cond) => cond,
            other => Conditional::new(Condition::always(), [other]),
        }
    }
}

impl From<&str> for Conditional {
    fn from(text: &str) -> Self {
        Conditional::from(frag(text))
    }
}

impl From<Include> for Conditional {
    fn from(include: Include) -> Self {
        Conditional::from(Elem::from(include))
    }
}

/// Prefix word plus connector stripping over all satisfied children.
#[derive(Debug, Clone, PartialEq)]
pub struct Trim {
    prefix: String,
    prefix_overrides: Vec<String>,
    suffix_overrides: Vec<String>,
    children: Vec<Conditional>,
}

impl Trim {
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn prefix_overrides(&self) -> &[String] {
        &self.prefix_overrides
    }

    pub fn suffix_overrides(&self) -> &[String] {
        &self.suffix_overrides
    }

    pub fn children(&self) -> &[Conditional] {
        &self.children
    }

    fn evaluate(&self, ctx: &Context) -> DynSqlResult<Statement> {
        let mut matched = Vec::new();
        for child in &self.children {
            if child.satisfy(ctx)? {
                let stmt = child.evaluate_children(ctx)?;
                if !stmt.is_empty() {
                    matched.push(stmt);
                }
            }
        }

        if matched.is_empty() {
            return Ok(Statement::empty());
        }

        if let Some(first) = matched.first_mut() {
            if let Some(rest) = strip_prefix_token(first.sql(), &self.prefix_overrides) {
                let rest = rest.to_string();
                *first = std::mem::take(first).with_sql(&rest);
            }
        }
        if let Some(last) = matched.last_mut() {
            if let Some(rest) = strip_suffix_token(last.sql(), &self.suffix_overrides) {
                let rest = rest.to_string();
                *last = std::mem::take(last).with_sql(&rest);
            }
        }

        Ok(Statement::merge(matched, Some(&self.prefix)))
    }
}

impl From<Trim> for Elem {
    fn from(trim: Trim) -> Self {
        Elem::Trim(trim)
    }
}

/// Strip the first override `text` starts with.
fn strip_prefix_token<'a>(text: &'a str, overrides: &[String]) -> Option<&'a str> {
    overrides.iter().find_map(|o| text.strip_prefix(o.as_str()))
}

fn strip_suffix_token<'a>(text: &'a str, overrides: &[String]) -> Option<&'a str> {
    overrides.iter().find_map(|o| text.strip_suffix(o.as_str()))
}

// ── Builders ──

/// Template text. Text without placeholders becomes [`Elem::Pure`].
pub fn frag(text: &str) -> Elem {
    let translated = translate(text);
    if translated.is_pure() {
        return Elem::Pure(text.to_string());
    }
    Elem::Fragment(Fragment { translated })
}

/// Include the fragment registered under `id`.
pub fn include(id: impl Into<String>) -> Include {
    Include {
        id: id.into(),
        dynamic: false,
        props: MapParameters::new(),
    }
}

/// Include the fragment whose id is the value of parameter `key`.
pub fn include_dynamic(key: impl Into<String>) -> Include {
    Include {
        dynamic: true,
        ..include(key)
    }
}

/// Render `children` only when `condition` holds.
pub fn if_<I, E>(condition: Condition, children: I) -> Conditional
where
    I: IntoIterator<Item = E>,
    E: Into<Elem>,
{
    Conditional::new(condition, children)
}

/// Alias of [`if_`], used for `choose` branches.
pub fn when<I, E>(condition: Condition, children: I) -> Conditional
where
    I: IntoIterator<Item = E>,
    E: Into<Elem>,
{
    Conditional::new(condition, children)
}

/// Always-satisfied branch, conventionally last in a [`choose`].
pub fn otherwise<I, E>(children: I) -> Conditional
where
    I: IntoIterator<Item = E>,
    E: Into<Elem>,
{
    Conditional::new(Condition::always(), children)
}

/// Render the first satisfied branch; branch order is priority order.
pub fn choose(branches: impl IntoIterator<Item = Conditional>) -> Elem {
    Elem::Choose(branches.into_iter().collect())
}

/// General trim: prepend `prefix` and strip the first matching connector
/// from the first (prefix overrides) and last (suffix overrides) rendered
/// child.
pub fn trim<I, C>(
    prefix: impl Into<String>,
    prefix_overrides: &[&str],
    suffix_overrides: &[&str],
    children: I,
) -> Elem
where
    I: IntoIterator<Item = C>,
    C: Into<Conditional>,
{
    Elem::Trim(Trim {
        prefix: prefix.into(),
        prefix_overrides: prefix_overrides.iter().map(|s| s.to_string()).collect(),
        suffix_overrides: suffix_overrides.iter().map(|s| s.to_string()).collect(),
        children: children.into_iter().map(Into::into).collect(),
    })
}

/// `WHERE` clause; a leading `AND` / `OR` is dropped.
pub fn where_<I, C>(children: I) -> Elem
where
    I: IntoIterator<Item = C>,
    C: Into<Conditional>,
{
    trim("WHERE", &["AND", "OR"], &[], children)
}

/// `SET` clause; a trailing `,` is dropped.
pub fn set<I, C>(children: I) -> Elem
where
    I: IntoIterator<Item = C>,
    C: Into<Conditional>,
{
    trim("SET", &[], &[","], children)
}

/// Concatenate children unconditionally.
pub fn composite<I, E>(children: I) -> Elem
where
    I: IntoIterator<Item = E>,
    E: Into<Elem>,
{
    Elem::Composite(children.into_iter().map(Into::into).collect())
}
