//! Conditions deciding whether a template branch contributes.

use crate::context::Context;
use crate::error::DynSqlResult;
use crate::expr::Expression;
use std::sync::Arc;

/// A boolean predicate evaluated against a [`Context`].
///
/// # Example
/// ```ignore
/// use dynsql::Condition;
///
/// let always = Condition::always();
/// let has_title = Condition::test(".title")?;
/// let is_active = Condition::test("eq .state 1")?;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Constant result.
    Const(bool),
    /// Compiled test expression, evaluated against the context parameters.
    Test(Arc<Expression>),
}

impl Condition {
    /// Always satisfied; the condition behind `otherwise`.
    pub fn always() -> Self {
        Self::Const(true)
    }

    /// Never satisfied.
    pub fn never() -> Self {
        Self::Const(false)
    }

    /// Compile a test expression once.
    pub fn test(expr: &str) -> DynSqlResult<Self> {
        Ok(Self::Test(Arc::new(Expression::compile(expr)?)))
    }

    /// Evaluate against `ctx`.
    pub fn satisfy(&self, ctx: &Context) -> DynSqlResult<bool> {
        match self {
            Self::Const(b) => Ok(*b),
            Self::Test(expr) => expr.evaluate(ctx.params()),
        }
    }
}

impl From<bool> for Condition {
    fn from(b: bool) -> Self {
        Self::Const(b)
    }
}

impl From<Expression> for Condition {
    fn from(expr: Expression) -> Self {
        Self::Test(Arc::new(expr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DynSqlError;
    use crate::params::MapParameters;

    #[test]
    fn constants_ignore_context() {
        let ctx = Context::new();
        assert!(Condition::always().satisfy(&ctx).unwrap());
        assert!(!Condition::never().satisfy(&ctx).unwrap());
        assert!(Condition::from(true).satisfy(&ctx).unwrap());
    }

    #[test]
    fn test_reads_context_params() {
        let cond = Condition::test("eq .test 1").unwrap();
        let yes = Context::new().with_params(MapParameters::new().with("test", 1));
        let no = Context::new().with_params(MapParameters::new().with("test", 0));
        assert!(cond.satisfy(&yes).unwrap());
        assert!(!cond.satisfy(&no).unwrap());
    }

    #[test]
    fn runtime_failure_is_template_execution() {
        let cond = Condition::test(".a > 1").unwrap();
        let err = cond.satisfy(&Context::new()).unwrap_err();
        assert!(matches!(err, DynSqlError::TemplateExecution(_)));
    }

    #[test]
    fn malformed_expression_fails_at_construction() {
        assert!(Condition::test("eq .a").is_err());
    }
}
