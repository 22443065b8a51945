//! Declarative mapper files.
//!
//! A mapper file is TOML describing the fragments of one namespace. Each
//! `[[sql]]` entry registers `namespace.id`; its `body` is a tree of nodes
//! where a bare string is template text and a one-key table selects the node
//! kind.
//!
//! ```toml
//! namespace = "Blog"
//!
//! [[sql]]
//! id = "columns"
//! body = "${alias}.id, ${alias}.title, ${alias}.state"
//!
//! [[sql]]
//! id = "find"
//! body = [
//!     "SELECT",
//!     { include = { refid = "columns", props = { alias = "b" } } },
//!     "FROM blog b",
//!     { where = [
//!         { if = { test = ".state", body = "b.state = #{state}" } },
//!         { if = { test = ".title", body = "AND b.title like #{title}" } },
//!     ] },
//! ]
//! ```
//!
//! Include ids without a `.` refer to the same namespace.

use crate::collection::{Collection, CollectionBuilder};
use crate::condition::Condition;
use crate::elem::{self, Conditional, Elem};
use crate::error::{DynSqlError, DynSqlResult};
use crate::params::MapParameters;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::Path;

/// One mapper file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MapperFile {
    pub namespace: String,
    #[serde(default, rename = "sql")]
    pub fragments: Vec<FragmentDef>,
}

/// One registered fragment.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FragmentDef {
    pub id: String,
    pub body: Body,
}

/// Text, a node, or a list of either.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Body {
    Text(String),
    List(Vec<Body>),
    Node(Box<NodeDef>),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WhenDef {
    pub test: String,
    pub body: Body,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum NodeDef {
    Include {
        refid: String,
        #[serde(default)]
        dynamic: bool,
        #[serde(default)]
        props: Map<String, Value>,
    },
    If(WhenDef),
    Choose {
        #[serde(default)]
        when: Vec<WhenDef>,
        otherwise: Option<Body>,
    },
    Where(Body),
    Set(Body),
    Trim {
        #[serde(default)]
        prefix: String,
        #[serde(default)]
        prefix_overrides: Vec<String>,
        #[serde(default)]
        suffix_overrides: Vec<String>,
        body: Body,
    },
    Composite(Body),
}

impl MapperFile {
    /// Parse a mapper file from TOML text.
    pub fn from_toml_str(src: &str) -> DynSqlResult<Self> {
        toml::from_str(src).map_err(|e| DynSqlError::Mapper(e.to_string()))
    }

    /// Compile every fragment into `builder` as `namespace.id`.
    pub fn register_into(&self, builder: &mut CollectionBuilder) -> DynSqlResult<()> {
        if self.namespace.trim().is_empty() {
            return Err(DynSqlError::Mapper("namespace must not be empty".to_string()));
        }
        for def in &self.fragments {
            let node = self.compile(&def.body).map_err(|e| match e {
                DynSqlError::Mapper(msg) => {
                    DynSqlError::Mapper(format!("{}.{}: {msg}", self.namespace, def.id))
                }
                other => other,
            })?;
            builder.insert(format!("{}.{}", self.namespace, def.id), node);
        }
        Ok(())
    }

    fn qualify(&self, id: &str) -> String {
        if id.contains('.') {
            id.to_string()
        } else {
            format!("{}.{}", self.namespace, id)
        }
    }

    fn compile(&self, body: &Body) -> DynSqlResult<Elem> {
        match body {
            Body::Text(text) => Ok(elem::frag(text)),
            Body::List(_) => {
                let mut children = self.compile_list(body)?;
                Ok(if children.len() == 1 {
                    children.remove(0)
                } else {
                    elem::composite(children)
                })
            }
            Body::Node(node) => self.compile_node(node),
        }
    }

    fn compile_list(&self, body: &Body) -> DynSqlResult<Vec<Elem>> {
        match body {
            Body::List(items) => items.iter().map(|item| self.compile(item)).collect(),
            other => Ok(vec![self.compile(other)?]),
        }
    }

    fn compile_branches(&self, body: &Body) -> DynSqlResult<Vec<Conditional>> {
        Ok(self
            .compile_list(body)?
            .into_iter()
            .map(Conditional::from)
            .collect())
    }

    fn compile_when(&self, def: &WhenDef) -> DynSqlResult<Conditional> {
        Ok(Conditional::new(
            Condition::test(&def.test)?,
            self.compile_list(&def.body)?,
        ))
    }

    fn compile_node(&self, node: &NodeDef) -> DynSqlResult<Elem> {
        Ok(match node {
            NodeDef::Include {
                refid,
                dynamic,
                props,
            } => {
                if refid.trim().is_empty() {
                    return Err(DynSqlError::Mapper("include refid must not be empty".into()));
                }
                let include = if *dynamic {
                    elem::include_dynamic(refid.as_str())
                } else {
                    elem::include(self.qualify(refid))
                };
                include.props(MapParameters::from(props.clone())).into()
            }
            NodeDef::If(def) => self.compile_when(def)?.into(),
            NodeDef::Choose { when, otherwise } => {
                let mut branches = when
                    .iter()
                    .map(|def| self.compile_when(def))
                    .collect::<DynSqlResult<Vec<_>>>()?;
                if let Some(body) = otherwise {
                    branches.push(elem::otherwise(self.compile_list(body)?));
                }
                elem::choose(branches)
            }
            NodeDef::Where(body) => elem::where_(self.compile_branches(body)?),
            NodeDef::Set(body) => elem::set(self.compile_branches(body)?),
            NodeDef::Trim {
                prefix,
                prefix_overrides,
                suffix_overrides,
                body,
            } => {
                let prefix_overrides: Vec<&str> =
                    prefix_overrides.iter().map(String::as_str).collect();
                let suffix_overrides: Vec<&str> =
                    suffix_overrides.iter().map(String::as_str).collect();
                elem::trim(
                    prefix.as_str(),
                    &prefix_overrides,
                    &suffix_overrides,
                    self.compile_branches(body)?,
                )
            }
            NodeDef::Composite(body) => elem::composite(self.compile_list(body)?),
        })
    }
}

impl CollectionBuilder {
    /// Register every fragment of a TOML mapper file.
    pub fn load_toml(mut self, src: &str) -> DynSqlResult<Self> {
        MapperFile::from_toml_str(src)?.register_into(&mut self)?;
        Ok(self)
    }

    /// Read and register a TOML mapper file from disk.
    pub fn load_toml_file(self, path: impl AsRef<Path>) -> DynSqlResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            DynSqlError::Mapper(format!("failed to read mapper file {}: {e}", path.display()))
        })?;
        self.load_toml(&raw).map_err(|e| match e {
            DynSqlError::Mapper(msg) => DynSqlError::Mapper(format!("{}: {msg}", path.display())),
            other => other,
        })
    }
}

impl Collection {
    /// Build a validated collection from one TOML mapper file.
    pub fn from_toml_str(src: &str) -> DynSqlResult<Self> {
        Collection::builder().load_toml(src)?.build()
    }
}
