//! Evaluation context: parameters, binding mode and fragment registry.

use crate::collection::Collection;
use crate::elem::Elem;
use crate::error::{DynSqlError, DynSqlResult};
use crate::params::{MapParameters, Parameters, merge_parameters};
use crate::statement::Statement;
use std::fmt;
use std::sync::Arc;

/// Default limit on nested include resolution.
pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 64;

/// Per-evaluation carrier of parameters, binding mode and collection.
///
/// Built with chainable calls before evaluation; [`Context::next`] derives a
/// child context without touching the parent.
///
/// # Example
/// ```ignore
/// use dynsql::{Context, params};
///
/// let ctx = Context::new()
///     .with_params(params! { "id" => 1 })
///     .with_collection(collection)
///     .named();
/// let stmt = ctx.evaluate(&root)?;
/// ```
#[derive(Clone)]
pub struct Context {
    params: Arc<dyn Parameters>,
    named: bool,
    collection: Arc<Collection>,
    depth: usize,
    max_include_depth: usize,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            params: Arc::new(MapParameters::new()),
            named: false,
            collection: Arc::new(Collection::default()),
            depth: 0,
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("params", &self.params.keys())
            .field("named", &self.named)
            .field("collection", &self.collection.len())
            .field("depth", &self.depth)
            .field("max_include_depth", &self.max_include_depth)
            .finish()
    }
}

impl Context {
    /// Positional mode, no parameters, empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the parameter bag.
    pub fn with_params(mut self, params: impl Parameters + 'static) -> Self {
        self.params = Arc::new(params);
        self
    }

    /// Set an already shared parameter bag.
    pub fn with_shared_params(mut self, params: Arc<dyn Parameters>) -> Self {
        self.params = params;
        self
    }

    /// Render `#{x}` as `:x` and defer binding to the executor.
    pub fn named(mut self) -> Self {
        self.named = true;
        self
    }

    /// Render `#{x}` as `?` (the default).
    pub fn positional(mut self) -> Self {
        self.named = false;
        self
    }

    /// Set the fragment registry.
    pub fn with_collection(mut self, collection: impl Into<Arc<Collection>>) -> Self {
        self.collection = collection.into();
        self
    }

    /// Limit nested include resolution.
    pub fn max_include_depth(mut self, depth: usize) -> Self {
        self.max_include_depth = depth;
        self
    }

    pub fn params(&self) -> &dyn Parameters {
        self.params.as_ref()
    }

    pub fn is_named(&self) -> bool {
        self.named
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    /// How many includes deep this context is.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Derive a child context whose parameters are `props` merged over this
    /// context's parameters. Mode and collection are shared.
    pub fn next(&self, props: &dyn Parameters) -> Context {
        Context {
            params: Arc::new(merge_parameters(self.params.as_ref(), props)),
            named: self.named,
            collection: Arc::clone(&self.collection),
            depth: self.depth + 1,
            max_include_depth: self.max_include_depth,
        }
    }

    pub(crate) fn enter(&self, id: &str) -> DynSqlResult<()> {
        if self.depth >= self.max_include_depth {
            return Err(DynSqlError::IncludeDepthExceeded {
                id: id.to_string(),
                depth: self.max_include_depth,
            });
        }
        Ok(())
    }

    /// Look up a registered fragment.
    pub fn get_sql(&self, id: &str) -> DynSqlResult<&Elem> {
        self.collection.get_or_err(id)
    }

    /// Evaluate a template against this context.
    pub fn evaluate(&self, root: &Elem) -> DynSqlResult<Statement> {
        let stmt = root.evaluate(self)?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            target: "dynsql",
            sql = %stmt.sql(),
            args = stmt.arg_names().len(),
            named = self.named,
            "evaluated statement"
        );

        Ok(stmt)
    }

    /// Evaluate the fragment registered under `id`.
    pub fn evaluate_id(&self, id: &str) -> DynSqlResult<Statement> {
        self.evaluate(self.get_sql(id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn next_merges_child_over_parent() {
        let parent = Context::new()
            .with_params(MapParameters::new().with("a", 1).with("b", 2))
            .named();
        let child = parent.next(&MapParameters::new().with("b", 20).with("c", 30));

        assert_eq!(child.params().get("a"), Some(&json!(1)));
        assert_eq!(child.params().get("b"), Some(&json!(20)));
        assert_eq!(child.params().get("c"), Some(&json!(30)));
        assert!(child.is_named());
        assert_eq!(child.depth(), 1);

        assert_eq!(parent.params().get("b"), Some(&json!(2)));
        assert!(!parent.params().exist("c"));
        assert_eq!(parent.depth(), 0);
    }

    #[test]
    fn positional_by_default() {
        assert!(!Context::new().is_named());
        assert!(!Context::new().named().positional().is_named());
    }

    #[test]
    fn enter_respects_depth_limit() {
        let ctx = Context::new().max_include_depth(1);
        assert!(ctx.enter("a").is_ok());
        let child = ctx.next(&MapParameters::new());
        assert_eq!(
            child.enter("a").unwrap_err(),
            DynSqlError::IncludeDepthExceeded {
                id: "a".into(),
                depth: 1
            }
        );
    }

    #[test]
    fn get_sql_reports_missing_id() {
        let err = Context::new().get_sql("Nope.nothing").unwrap_err();
        assert_eq!(err, DynSqlError::FragmentNotFound("Nope.nothing".into()));
    }
}
