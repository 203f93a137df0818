//! Secondary indices over the atom store.
//!
//! Two indices, both keyed by structural role rather than content, because
//! queries are dominated by "expressions with this relation applied to X"
//! patterns:
//!
//! - **head index**: relation tag → expression ids carrying that tag
//! - **target index**: atom id → expression ids that reference it as a child
//!
//! Both are maintained incrementally on intern and evict, never rebuilt.
//! Index mutation is idempotent, so a lost insert race re-applies cleanly and
//! an atom is always either fully indexed or absent from both indices.

use std::collections::HashSet;

use dashmap::DashMap;

use crate::atom::{AtomId, Expression};

/// Head-tag and reverse-target indices for expression atoms.
pub struct SpaceIndex {
    /// Relation tag → expression ids with that tag.
    by_head: DashMap<String, HashSet<AtomId>>,
    /// Child atom id → expression ids referencing it.
    by_target: DashMap<AtomId, HashSet<AtomId>>,
}

impl SpaceIndex {
    /// Create empty indices.
    pub fn new() -> Self {
        Self {
            by_head: DashMap::new(),
            by_target: DashMap::new(),
        }
    }

    /// Register an expression in both indices. Idempotent.
    pub fn insert(&self, id: &AtomId, expr: &Expression) {
        self.by_head
            .entry(expr.tag.clone())
            .or_default()
            .insert(id.clone());
        for child in &expr.children {
            self.by_target
                .entry(child.clone())
                .or_default()
                .insert(id.clone());
        }
    }

    /// Remove an expression from both indices, dropping emptied buckets.
    pub fn remove(&self, id: &AtomId, expr: &Expression) {
        if let Some(mut bucket) = self.by_head.get_mut(&expr.tag) {
            bucket.remove(id);
            let empty = bucket.is_empty();
            drop(bucket);
            if empty {
                self.by_head.remove_if(&expr.tag, |_, set| set.is_empty());
            }
        }
        for child in &expr.children {
            if let Some(mut bucket) = self.by_target.get_mut(child) {
                bucket.remove(id);
                let empty = bucket.is_empty();
                drop(bucket);
                if empty {
                    self.by_target.remove_if(child, |_, set| set.is_empty());
                }
            }
        }
    }

    /// Expression ids carrying the given relation tag.
    pub fn heads(&self, tag: &str) -> Vec<AtomId> {
        self.by_head
            .get(tag)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Expression ids that reference the given atom as a child.
    pub fn referencing(&self, child: &AtomId) -> Vec<AtomId> {
        self.by_target
            .get(child)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether any live expression references the given atom.
    pub fn is_referenced(&self, child: &AtomId) -> bool {
        self.by_target
            .get(child)
            .is_some_and(|set| !set.is_empty())
    }

    /// Number of distinct relation tags indexed.
    pub fn tag_count(&self) -> usize {
        self.by_head.len()
    }
}

impl Default for SpaceIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SpaceIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpaceIndex")
            .field("tags", &self.by_head.len())
            .field("targets", &self.by_target.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::Atom;

    fn id(s: &str) -> AtomId {
        Atom::symbol(s).unwrap().identity()
    }

    fn expr(tag: &str, children: &[&str]) -> (AtomId, Expression) {
        let e = Expression::new(tag, children.iter().map(|c| id(c)).collect(), false).unwrap();
        let eid = Atom::Expression(e.clone()).identity();
        (eid, e)
    }

    #[test]
    fn heads_after_insert() {
        let index = SpaceIndex::new();
        let (eid, e) = expr("Likes", &["Sam", "Pizza"]);
        index.insert(&eid, &e);

        assert_eq!(index.heads("Likes"), vec![eid]);
        assert!(index.heads("Hates").is_empty());
    }

    #[test]
    fn target_index_tracks_children() {
        let index = SpaceIndex::new();
        let (e1, ex1) = expr("Likes", &["Sam", "Pizza"]);
        let (e2, ex2) = expr("Likes", &["Dean", "Pizza"]);
        index.insert(&e1, &ex1);
        index.insert(&e2, &ex2);

        let refs = index.referencing(&id("Pizza"));
        assert_eq!(refs.len(), 2);
        assert!(index.is_referenced(&id("Pizza")));
        assert!(!index.is_referenced(&id("Sushi")));
    }

    #[test]
    fn insert_is_idempotent() {
        let index = SpaceIndex::new();
        let (eid, e) = expr("Likes", &["Sam", "Pizza"]);
        index.insert(&eid, &e);
        index.insert(&eid, &e);

        assert_eq!(index.heads("Likes").len(), 1);
        assert_eq!(index.referencing(&id("Sam")).len(), 1);
    }

    #[test]
    fn remove_clears_both_indices() {
        let index = SpaceIndex::new();
        let (eid, e) = expr("Likes", &["Sam", "Pizza"]);
        index.insert(&eid, &e);
        index.remove(&eid, &e);

        assert!(index.heads("Likes").is_empty());
        assert!(!index.is_referenced(&id("Sam")));
        assert_eq!(index.tag_count(), 0);
    }

    #[test]
    fn remove_keeps_other_entries() {
        let index = SpaceIndex::new();
        let (e1, ex1) = expr("Likes", &["Sam", "Pizza"]);
        let (e2, ex2) = expr("Likes", &["Dean", "Pizza"]);
        index.insert(&e1, &ex1);
        index.insert(&e2, &ex2);
        index.remove(&e1, &ex1);

        assert_eq!(index.heads("Likes"), vec![e2]);
        assert!(index.is_referenced(&id("Pizza")));
        assert!(!index.is_referenced(&id("Sam")));
    }
}
