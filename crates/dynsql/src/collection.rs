//! Fragment registry.
//!
//! A [`Collection`] maps ids (commonly `Namespace.name`) to template nodes.
//! It is assembled once through a [`CollectionBuilder`], validated, and then
//! only read, so it can be shared across threads behind an `Arc`.

use crate::elem::Elem;
use crate::error::{DynSqlError, DynSqlResult};
use std::collections::{BTreeSet, HashMap};

/// Registered fragments, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct Collection {
    fragments: HashMap<String, Elem>,
}

impl Collection {
    /// Start registering fragments.
    pub fn builder() -> CollectionBuilder {
        CollectionBuilder::default()
    }

    pub fn get(&self, id: &str) -> Option<&Elem> {
        self.fragments.get(id)
    }

    /// Like [`Collection::get`], but a missing id is a `FragmentNotFound` error.
    pub fn get_or_err(&self, id: &str) -> DynSqlResult<&Elem> {
        self.get(id)
            .ok_or_else(|| DynSqlError::FragmentNotFound(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.fragments.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.fragments.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Check that every static include resolves and that no fragment can
    /// reach itself through includes.
    ///
    /// Dynamic includes are only known at evaluation time; those are bounded
    /// by the context's include depth instead.
    pub fn validate(&self) -> DynSqlResult<()> {
        let mut edges: HashMap<&str, Vec<&str>> = HashMap::with_capacity(self.len());
        for id in self.ids() {
            let mut targets = Vec::new();
            if let Some(elem) = self.get(id) {
                elem.visit_includes(&mut |include| {
                    if !include.is_dynamic() {
                        targets.push(include.id());
                    }
                });
            }
            for target in &targets {
                if !self.contains(target) {
                    return Err(DynSqlError::FragmentNotFound(target.to_string()));
                }
            }
            edges.insert(id, targets);
        }

        let mut done = BTreeSet::new();
        for id in self.ids() {
            let mut path = Vec::new();
            find_cycle(id, &edges, &mut path, &mut done)?;
        }
        Ok(())
    }
}

fn find_cycle<'a>(
    id: &'a str,
    edges: &HashMap<&'a str, Vec<&'a str>>,
    path: &mut Vec<&'a str>,
    done: &mut BTreeSet<&'a str>,
) -> DynSqlResult<()> {
    if done.contains(id) {
        return Ok(());
    }
    if let Some(start) = path.iter().position(|p| *p == id) {
        let mut cycle: Vec<String> = path[start..].iter().map(|s| s.to_string()).collect();
        cycle.push(id.to_string());
        return Err(DynSqlError::IncludeCycle(cycle));
    }

    path.push(id);
    for target in edges.get(id).into_iter().flatten() {
        find_cycle(*target, edges, path, done)?;
    }
    path.pop();
    done.insert(id);
    Ok(())
}

/// Collects fragments before they become a read-only [`Collection`].
#[derive(Debug, Default)]
pub struct CollectionBuilder {
    fragments: HashMap<String, Elem>,
    duplicates: Vec<String>,
}

impl CollectionBuilder {
    /// Register a fragment (chainable).
    pub fn register(mut self, id: impl Into<String>, elem: impl Into<Elem>) -> Self {
        self.insert(id, elem.into());
        self
    }

    /// Register a fragment.
    pub fn insert(&mut self, id: impl Into<String>, elem: Elem) -> &mut Self {
        let id = id.into();
        if self.fragments.contains_key(&id) {
            self.duplicates.push(id.clone());
        }
        self.fragments.insert(id, elem);
        self
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Validate and freeze the registry.
    pub fn build(self) -> DynSqlResult<Collection> {
        if let Some(id) = self.duplicates.into_iter().next() {
            return Err(DynSqlError::DuplicateFragment(id));
        }

        let collection = Collection {
            fragments: self.fragments,
        };
        collection.validate()?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            target: "dynsql",
            fragments = collection.len(),
            "collection validated"
        );

        Ok(collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elem::{frag, include, include_dynamic};

    #[test]
    fn build_and_lookup() {
        let c = Collection::builder()
            .register("User.columns", frag("id, name"))
            .register("User.byId", frag("id = #{id}"))
            .build()
            .unwrap();

        assert_eq!(c.len(), 2);
        assert_eq!(c.ids(), vec!["User.byId", "User.columns"]);
        assert!(c.get("User.columns").is_some());
        assert!(c.get("user.columns").is_none());
        assert_eq!(
            c.get_or_err("User.nope").unwrap_err(),
            DynSqlError::FragmentNotFound("User.nope".into())
        );
    }

    #[test]
    fn unresolved_static_include_fails_build() {
        let err = Collection::builder()
            .register("A.a", include("B.b"))
            .build()
            .unwrap_err();
        assert_eq!(err, DynSqlError::FragmentNotFound("B.b".into()));
    }

    #[test]
    fn dynamic_includes_are_not_checked_statically() {
        let c = Collection::builder()
            .register("A.a", include_dynamic("which"))
            .build();
        assert!(c.is_ok());
    }

    #[test]
    fn include_cycles_fail_build() {
        let err = Collection::builder()
            .register("A", include("B"))
            .register("B", include("C"))
            .register("C", include("A"))
            .register("D", include("A"))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            DynSqlError::IncludeCycle(vec!["A".into(), "B".into(), "C".into(), "A".into()])
        );
    }

    #[test]
    fn self_include_is_a_cycle() {
        let err = Collection::builder()
            .register("A", include("A"))
            .build()
            .unwrap_err();
        assert_eq!(err, DynSqlError::IncludeCycle(vec!["A".into(), "A".into()]));
    }

    #[test]
    fn shared_targets_are_not_cycles() {
        let c = Collection::builder()
            .register("cols", frag("id"))
            .register("A", include("cols"))
            .register("B", include("cols"))
            .register("C", crate::elem::composite([include("A"), include("B")]))
            .build();
        assert!(c.is_ok());
    }

    #[test]
    fn duplicate_ids_fail_build() {
        let err = Collection::builder()
            .register("A", frag("x"))
            .register("A", frag("y"))
            .build()
            .unwrap_err();
        assert_eq!(err, DynSqlError::DuplicateFragment("A".into()));
    }
}
