//! # dynsql
//!
//! Dynamic SQL templates in the style of SQL mapper files: compose statements
//! from fragments whose inclusion depends on runtime parameters, and get back
//! the final SQL text plus the ordered names of the values to bind.
//!
//! ## Features
//!
//! - **Placeholders**: `${name}` splices text verbatim, `#{name}` binds a value
//!   as `?` (positional) or `:name` (named)
//! - **Dynamic nodes**: `if` / `choose` / `when` / `otherwise`, `where`, `set`,
//!   `trim` and unconditional `composite`
//! - **Fragment reuse**: `include` registered fragments with remapped props
//! - **Test expressions**: a small boolean language (`.title`, `eq .state 1`,
//!   `.age >= 18 and .name`)
//! - **Eager checks**: unresolved includes and include cycles are rejected when
//!   the collection is built
//! - **Mapper files**: declare fragments in TOML (feature `mapper`)
//!
//! ## Example
//!
//! ```ignore
//! use dynsql::prelude::*;
//!
//! let find = composite([
//!     frag("SELECT * FROM blog"),
//!     where_([
//!         if_(Condition::test(".state")?, ["state = #{state}"]),
//!         if_(Condition::test(".title")?, ["AND title like #{title}"]),
//!     ]),
//! ]);
//!
//! let stmt = Context::new()
//!     .with_params(params! { "state" => 1, "title" => "%rust%" })
//!     .evaluate(&find)?;
//!
//! assert_eq!(stmt.sql(), "SELECT * FROM blog WHERE state = ? AND title like ?");
//! assert_eq!(stmt.arg_names(), ["state", "title"]);
//! ```

pub mod collection;
pub mod condition;
pub mod context;
pub mod elem;
pub mod error;
pub mod expr;
pub mod params;
pub mod placeholder;
pub mod prelude;
pub mod statement;

#[cfg(feature = "mapper")]
pub mod mapper;

pub use collection::{Collection, CollectionBuilder};
pub use condition::Condition;
pub use context::{Context, DEFAULT_MAX_INCLUDE_DEPTH};
pub use elem::{
    Conditional, Elem, Fragment, Include, PROP_SIGIL, Trim, choose, composite, frag, if_,
    include, include_dynamic, otherwise, set, trim, when, where_,
};
pub use error::{DynSqlError, DynSqlResult};
pub use expr::Expression;
pub use params::{MapParameters, Parameters, merge_parameters, stringify};
pub use statement::Statement;

#[cfg(feature = "mapper")]
pub use mapper::MapperFile;

#[doc(hidden)]
pub mod __private {
    pub use serde_json;
}
