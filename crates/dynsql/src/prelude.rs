//! Convenient imports for typical `dynsql` usage.
//!
//! ```ignore
//! use dynsql::prelude::*;
//! ```

pub use crate::{
    Collection, Condition, Context, DynSqlError, DynSqlResult, Elem, MapParameters, Parameters,
    Statement, params,
};
pub use crate::{
    choose, composite, frag, if_, include, include_dynamic, otherwise, set, trim, when, where_,
};
