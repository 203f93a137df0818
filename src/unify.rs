//! Structural unification: pattern matching that produces variable bindings.
//!
//! [`unify`] runs a worklist of (pattern, instance) id pairs rather than
//! recursing, so deeply nested expressions cannot exhaust the call stack.
//! Variables resolve symmetrically — a variable on either side may bind — and
//! an occurs check refuses bindings that would make a variable contain itself.
//!
//! Failure to match is a normal outcome (`None`), never an error.
//!
//! [`subst`] applies bindings to an atom, following binding chains to a fixed
//! point and rebuilding expressions only where a descendant actually changed,
//! so unchanged subtrees keep their canonical identity.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::atom::{Atom, AtomId};
use crate::space::AtomSpace;

/// An immutable map from variable name to the atom id it is bound to.
///
/// Extension returns a new map; the empty bindings is the identity for merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bindings {
    map: BTreeMap<String, AtomId>,
}

impl Bindings {
    /// The empty bindings.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether no variables are bound.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Number of bound variables.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// The id bound to a variable name, if any.
    pub fn get(&self, name: &str) -> Option<&AtomId> {
        self.map.get(name)
    }

    /// Extend with one binding, returning the new map.
    pub fn bind(&self, name: &str, id: &AtomId) -> Bindings {
        let mut map = self.map.clone();
        map.insert(name.to_string(), id.clone());
        Bindings { map }
    }

    /// Union of two binding sets. `None` if the same variable is bound to
    /// different ids on each side.
    pub fn merge(&self, other: &Bindings) -> Option<Bindings> {
        let mut map = self.map.clone();
        for (name, id) in &other.map {
            match map.get(name) {
                Some(existing) if existing != id => return None,
                _ => {
                    map.insert(name.clone(), id.clone());
                }
            }
        }
        Some(Bindings { map })
    }

    /// Deterministic identity of this binding set, used in visitation keys.
    pub fn fingerprint(&self) -> String {
        let mut s = String::new();
        for (name, id) in &self.map {
            s.push_str(name);
            s.push('=');
            s.push_str(id.as_str());
            s.push(';');
        }
        s
    }

    /// Iterate over (variable name, bound id) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &AtomId)> {
        self.map.iter()
    }
}

/// A matched or derived atom paired with the bindings that produced it.
#[derive(Debug, Clone)]
pub struct Answer {
    pub atom: Arc<Atom>,
    pub bindings: Bindings,
}

/// Variable ids are their `$`-sigiled names.
fn is_var(id: &AtomId) -> bool {
    id.as_str().starts_with('$')
}

/// Follow a variable's binding chain to its terminal id.
///
/// Stops at an unbound variable, a non-variable atom, or (defensively) a
/// cycle in the chain.
fn resolve(id: &AtomId, bindings: &Bindings) -> AtomId {
    let mut current = id.clone();
    let mut seen: HashSet<AtomId> = HashSet::new();
    while is_var(&current) {
        if !seen.insert(current.clone()) {
            tracing::debug!(var = %current, "binding chain cycle");
            return current;
        }
        match bindings.get(current.as_str()) {
            Some(next) => current = next.clone(),
            None => return current,
        }
    }
    current
}

/// Whether `var` occurs inside `id` under the current bindings.
fn occurs(space: &AtomSpace, bindings: &Bindings, var: &AtomId, id: &AtomId) -> bool {
    let mut stack = vec![id.clone()];
    let mut visited: HashSet<AtomId> = HashSet::new();
    while let Some(current) = stack.pop() {
        let resolved = resolve(&current, bindings);
        if &resolved == var {
            return true;
        }
        if !visited.insert(resolved.clone()) {
            continue;
        }
        if let Some(Atom::Expression(expr)) = space.peek(&resolved).as_deref() {
            stack.extend(expr.children.iter().cloned());
        }
    }
    false
}

/// Unify a pattern against an instance under existing bindings.
///
/// Returns the extended bindings on success, `None` on mismatch. Matching is
/// bidirectional: a variable on the instance side binds just like one on the
/// pattern side.
pub fn unify(
    space: &AtomSpace,
    pattern: &AtomId,
    instance: &AtomId,
    bindings: &Bindings,
) -> Option<Bindings> {
    let mut bound = bindings.clone();
    let mut work: Vec<(AtomId, AtomId)> = vec![(pattern.clone(), instance.clone())];

    while let Some((p_raw, i_raw)) = work.pop() {
        let p = resolve(&p_raw, &bound);
        let i = resolve(&i_raw, &bound);

        if p == i {
            continue;
        }
        if is_var(&p) {
            if occurs(space, &bound, &p, &i) {
                return None;
            }
            bound = bound.bind(p.as_str(), &i);
            continue;
        }
        if is_var(&i) {
            if occurs(space, &bound, &i, &p) {
                return None;
            }
            bound = bound.bind(i.as_str(), &p);
            continue;
        }

        match (space.peek(&p).as_deref(), space.peek(&i).as_deref()) {
            (Some(Atom::Expression(pe)), Some(Atom::Expression(ie))) => {
                if pe.tag != ie.tag || pe.arity() != ie.arity() {
                    return None;
                }
                for (pc, ic) in pe.children.iter().zip(ie.children.iter()) {
                    work.push((pc.clone(), ic.clone()));
                }
            }
            // Distinct symbols, grounded atoms, mixed shapes, or an id that
            // no longer resolves (evicted mid-match): no match.
            _ => return None,
        }
    }
    Some(bound)
}

/// Unify two atoms starting from empty bindings.
pub fn unify_atoms(space: &AtomSpace, pattern: &Arc<Atom>, instance: &Arc<Atom>) -> Option<Bindings> {
    unify(space, &pattern.identity(), &instance.identity(), &Bindings::empty())
}

/// Apply bindings to an atom, interning any rebuilt expressions.
///
/// Expressions are rebuilt only when a descendant actually changed, preserving
/// canonical identity (and index entries) for unchanged subtrees. Returns
/// `None` when an id cannot be resolved in the space.
pub fn subst(space: &AtomSpace, id: &AtomId, bindings: &Bindings) -> Option<Arc<Atom>> {
    subst_inner(space, id, bindings, &mut HashSet::new())
}

fn subst_inner(
    space: &AtomSpace,
    id: &AtomId,
    bindings: &Bindings,
    in_progress: &mut HashSet<AtomId>,
) -> Option<Arc<Atom>> {
    let resolved = resolve(id, bindings);
    if !in_progress.insert(resolved.clone()) {
        // Substitution cycle: stop following, keep the atom as-is.
        tracing::debug!(atom = %resolved, "substitution cycle");
        return space.peek(&resolved);
    }

    let result = match space.peek(&resolved).as_deref() {
        Some(Atom::Expression(expr)) => {
            let mut changed = false;
            let mut children = Vec::with_capacity(expr.children.len());
            for child in &expr.children {
                let new_child = subst_inner(space, child, bindings, in_progress)?;
                let new_id = new_child.identity();
                if new_id != *child {
                    changed = true;
                }
                children.push(new_id);
            }
            if changed {
                space.expr_from_ids(&expr.tag, children).ok()
            } else {
                space.peek(&resolved)
            }
        }
        Some(_) => space.peek(&resolved),
        None => None,
    };

    in_progress.remove(&resolved);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpaceConfig;

    fn space() -> AtomSpace {
        AtomSpace::new(SpaceConfig::default()).unwrap()
    }

    #[test]
    fn variable_binds_to_symbol() {
        let space = space();
        let sam = space.sym("Sam").unwrap();
        let pizza = space.sym("Pizza").unwrap();
        let x = space.var("$x").unwrap();

        let pattern = space.expr("Likes", &[sam.clone(), x]).unwrap();
        let fact = space.expr("Likes", &[sam, pizza.clone()]).unwrap();

        let bindings = unify_atoms(&space, &pattern, &fact).unwrap();
        assert_eq!(bindings.get("$x").unwrap(), &pizza.identity());
    }

    #[test]
    fn mismatched_symbols_fail() {
        let space = space();
        let sam = space.sym("Sam").unwrap();
        let dean = space.sym("Dean").unwrap();
        let pizza = space.sym("Pizza").unwrap();
        let x = space.var("$x").unwrap();

        let pattern = space.expr("Likes", &[sam, x]).unwrap();
        let fact = space.expr("Likes", &[dean, pizza]).unwrap();

        assert!(unify_atoms(&space, &pattern, &fact).is_none());
    }

    #[test]
    fn mismatched_tag_or_arity_fails() {
        let space = space();
        let a = space.sym("A").unwrap();
        let b = space.sym("B").unwrap();
        let likes = space.expr("Likes", &[a.clone(), b.clone()]).unwrap();
        let hates = space.expr("Hates", &[a.clone(), b.clone()]).unwrap();
        let triple = space.expr("Likes", &[a.clone(), b.clone(), a.clone()]).unwrap();

        assert!(unify_atoms(&space, &likes, &hates).is_none());
        assert!(unify_atoms(&space, &likes, &triple).is_none());
    }

    #[test]
    fn repeated_variable_must_agree() {
        let space = space();
        let sam = space.sym("Sam").unwrap();
        let dean = space.sym("Dean").unwrap();
        let x = space.var("$x").unwrap();

        let pattern = space.expr("Knows", &[x.clone(), x]).unwrap();
        let same = space.expr("Knows", &[sam.clone(), sam.clone()]).unwrap();
        let diff = space.expr("Knows", &[sam, dean]).unwrap();

        assert!(unify_atoms(&space, &pattern, &same).is_some());
        assert!(unify_atoms(&space, &pattern, &diff).is_none());
    }

    #[test]
    fn unify_is_bidirectional() {
        let space = space();
        let sam = space.sym("Sam").unwrap();
        let pizza = space.sym("Pizza").unwrap();
        let x = space.var("$x").unwrap();

        let pattern = space.expr("Likes", &[sam.clone(), x]).unwrap();
        let fact = space.expr("Likes", &[sam, pizza]).unwrap();

        // Success must agree regardless of argument order.
        assert!(unify_atoms(&space, &pattern, &fact).is_some());
        assert!(unify_atoms(&space, &fact, &pattern).is_some());
    }

    #[test]
    fn two_variables_unify() {
        let space = space();
        let x = space.var("$x").unwrap();
        let y = space.var("$y").unwrap();
        let bindings = unify_atoms(&space, &x, &y).unwrap();
        assert_eq!(bindings.len(), 1);
    }

    #[test]
    fn occurs_check_rejects_self_containment() {
        let space = space();
        let x = space.var("$x").unwrap();
        let wrapped = space.expr("Not", &[x.clone()]).unwrap();

        // $x against (Not $x) would make $x contain itself.
        assert!(unify_atoms(&space, &x, &wrapped).is_none());
    }

    #[test]
    fn nested_expressions_unify() {
        let space = space();
        let sam = space.sym("Sam").unwrap();
        let pizza = space.sym("Pizza").unwrap();
        let x = space.var("$x").unwrap();

        let inner_p = space.expr("Likes", &[sam.clone(), x]).unwrap();
        let pattern = space.expr("Not", &[inner_p]).unwrap();
        let inner_f = space.expr("Likes", &[sam, pizza.clone()]).unwrap();
        let fact = space.expr("Not", &[inner_f]).unwrap();

        let bindings = unify_atoms(&space, &pattern, &fact).unwrap();
        assert_eq!(bindings.get("$x").unwrap(), &pizza.identity());
    }

    #[test]
    fn deep_nesting_does_not_overflow() {
        let space = space();
        let mut p = space.var("$x").unwrap();
        let mut f = space.sym("Leaf").unwrap();
        for _ in 0..2_000 {
            p = space.expr("Wrap", &[p]).unwrap();
            f = space.expr("Wrap", &[f]).unwrap();
        }
        let bindings = unify_atoms(&space, &p, &f).unwrap();
        assert_eq!(bindings.get("$x").unwrap().as_str(), "Leaf");
    }

    #[test]
    fn subst_follows_chains() {
        let space = space();
        let pizza = space.sym("Pizza").unwrap();
        let x_id = space.var("$x").unwrap().identity();
        let y_id = space.var("$y").unwrap().identity();

        let bindings = Bindings::empty()
            .bind("$x", &y_id)
            .bind("$y", &pizza.identity());
        let result = subst(&space, &x_id, &bindings).unwrap();
        assert_eq!(result.identity().as_str(), "Pizza");
    }

    #[test]
    fn subst_preserves_unchanged_subtrees() {
        let space = space();
        let sam = space.sym("Sam").unwrap();
        let pizza = space.sym("Pizza").unwrap();
        let ground = space.expr("Likes", &[sam.clone(), pizza]).unwrap();
        let x = space.var("$x").unwrap();
        let pattern = space.expr("And", &[ground.clone(), x]).unwrap();

        let bindings = Bindings::empty().bind("$x", &sam.identity());
        let result = subst(&space, &pattern.identity(), &bindings).unwrap();

        let result_expr = result.as_expression().unwrap();
        // The untouched (Likes Sam Pizza) keeps its canonical identity.
        assert!(result_expr.children.contains(&ground.identity()));
    }

    #[test]
    fn subst_without_change_is_identity() {
        let space = space();
        let sam = space.sym("Sam").unwrap();
        let pizza = space.sym("Pizza").unwrap();
        let fact = space.expr("Likes", &[sam, pizza]).unwrap();

        let result = subst(&space, &fact.identity(), &Bindings::empty()).unwrap();
        assert!(Arc::ptr_eq(&result, &fact));
    }

    #[test]
    fn merge_detects_conflicts() {
        let space = space();
        let sam = space.sym("Sam").unwrap();
        let dean = space.sym("Dean").unwrap();

        let a = Bindings::empty().bind("$x", &sam.identity());
        let b = Bindings::empty().bind("$x", &dean.identity());
        let c = Bindings::empty().bind("$y", &dean.identity());

        assert!(a.merge(&b).is_none());
        let merged = a.merge(&c).unwrap();
        assert_eq!(merged.len(), 2);
        // Empty bindings is the merge identity.
        assert_eq!(a.merge(&Bindings::empty()).unwrap(), a);
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let space = space();
        let sam = space.sym("Sam").unwrap();
        let dean = space.sym("Dean").unwrap();

        let a = Bindings::empty()
            .bind("$x", &sam.identity())
            .bind("$y", &dean.identity());
        let b = Bindings::empty()
            .bind("$y", &dean.identity())
            .bind("$x", &sam.identity());
        assert_eq!(a.fingerprint(), b.fingerprint());
    }
}
