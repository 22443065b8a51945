//! Rendered SQL statements.
//!
//! A [`Statement`] is what a template evaluates to: the final SQL text plus
//! the ordered names of the values to bind. Statements are immutable; merging
//! always builds a new one.

use crate::error::{DynSqlError, DynSqlResult};
use crate::params::Parameters;
use serde_json::Value;
use std::fmt::{self, Write as _};

/// Final SQL text plus ordered bound-argument names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Statement {
    sql: String,
    arg_names: Vec<String>,
}

impl Statement {
    /// Create a statement; surrounding whitespace is trimmed from `sql`.
    pub fn new(sql: impl AsRef<str>, arg_names: Vec<String>) -> Self {
        Self {
            sql: sql.as_ref().trim().to_string(),
            arg_names,
        }
    }

    /// The statement a skipped branch contributes.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Merge statements into one.
    ///
    /// `prefix`, when given, becomes the first token; each statement's text
    /// follows, space separated. Empty texts contribute no token. Argument
    /// names are concatenated in input order.
    pub fn merge<I>(statements: I, prefix: Option<&str>) -> Self
    where
        I: IntoIterator<Item = Statement>,
    {
        let statements = statements.into_iter();
        let mut tokens: Vec<String> = Vec::with_capacity(statements.size_hint().0 + 1);
        let mut arg_names = Vec::new();

        if let Some(prefix) = prefix.filter(|p| !p.is_empty()) {
            tokens.push(prefix.to_string());
        }
        for stmt in statements {
            if !stmt.sql.is_empty() {
                tokens.push(stmt.sql);
            }
            arg_names.extend(stmt.arg_names);
        }

        Self {
            sql: tokens.join(" "),
            arg_names,
        }
    }

    /// SQL text.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Bound-argument names, left to right.
    pub fn arg_names(&self) -> &[String] {
        &self.arg_names
    }

    /// Split into `(sql, arg_names)`.
    pub fn into_parts(self) -> (String, Vec<String>) {
        (self.sql, self.arg_names)
    }

    /// No text and no arguments.
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty() && self.arg_names.is_empty()
    }

    pub(crate) fn with_sql(self, sql: &str) -> Self {
        Self::new(sql, self.arg_names)
    }

    /// Resolve argument names against `params`, in binding order.
    ///
    /// This is what a positional executor binds to the `?` placeholders.
    pub fn bind(&self, params: &dyn Parameters) -> DynSqlResult<Vec<Value>> {
        self.arg_names
            .iter()
            .map(|name| {
                params
                    .get(name)
                    .cloned()
                    .ok_or_else(|| DynSqlError::missing(name.as_str()))
            })
            .collect()
    }

    /// Rewrite `?` placeholders into PostgreSQL `$1, $2, ...` form.
    ///
    /// Question marks inside quoted literals or quoted identifiers are left
    /// untouched.
    pub fn to_numbered(&self) -> String {
        let mut out = String::with_capacity(self.sql.len() + 8);
        let mut idx: usize = 0;
        let mut quote: Option<char> = None;

        for c in self.sql.chars() {
            match (quote, c) {
                (Some(q), c) if c == q => {
                    quote = None;
                    out.push(c);
                }
                (Some(_), c) => out.push(c),
                (None, '\'' | '"') => {
                    quote = Some(c);
                    out.push(c);
                }
                (None, '?') => {
                    idx += 1;
                    let _ = write!(out, "${idx}");
                }
                (None, c) => out.push(c),
            }
        }
        out
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}
