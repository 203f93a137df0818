//! Core atom types: the unit of knowledge in the heka engine.
//!
//! An [`Atom`] is one of four variants: an interned `Symbol`, a pattern
//! `Variable`, a tagged `Expression` over child atom ids, or an opaque
//! `Grounded` value bridging to host code.
//!
//! Every atom has a deterministic identity string ([`AtomId`]) built from its
//! structure, which is what makes hash-consing possible: two expressions with
//! the same tag and children produce the same identity and therefore intern to
//! the same canonical instance. Identity comparison is id comparison — deep
//! equality is never needed after interning.

use std::any::Any;
use std::sync::Arc;

use crate::error::AtomError;
use crate::space::AtomSpace;

/// Result type for atom construction.
pub type AtomResult<T> = std::result::Result<T, AtomError>;

/// Deterministic structural identity of an atom.
///
/// Cheap to clone (shared string) and usable as a map key. The identity of an
/// expression embeds the identities of its children, so equal structure means
/// equal id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AtomId(Arc<str>);

impl AtomId {
    fn new(s: String) -> Self {
        Self(s.into())
    }

    /// The identity string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AtomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A tagged, ordered collection of child atoms representing a relation.
///
/// Children are stored by id; the owning [`AtomSpace`](crate::space::AtomSpace)
/// resolves them back to atoms. For commutative relation tags the children are
/// canonically sorted at construction, so `(Similarity A B)` and
/// `(Similarity B A)` intern to the same atom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    /// The relation/operator tag.
    pub tag: String,
    /// Child atom identities, in order (or sorted, for commutative tags).
    pub children: Vec<AtomId>,
}

impl Expression {
    /// Build an expression, validating the tag and children.
    pub fn new(
        tag: impl Into<String>,
        mut children: Vec<AtomId>,
        commutative: bool,
    ) -> AtomResult<Self> {
        let tag = tag.into();
        if tag.trim().is_empty() {
            return Err(AtomError::BlankName { what: "relation tag" });
        }
        if children.is_empty() {
            return Err(AtomError::EmptyExpression { tag });
        }
        if commutative {
            children.sort();
        }
        Ok(Self { tag, children })
    }

    /// Number of children.
    pub fn arity(&self) -> usize {
        self.children.len()
    }
}

/// Host callback invoked when a grounded atom is applied during chaining.
///
/// Receives the already-resolved argument atoms and may intern its result
/// through the space it is handed.
pub type GroundedFn =
    Arc<dyn Fn(&AtomSpace, &[Arc<Atom>]) -> Option<Arc<Atom>> + Send + Sync>;

/// An opaque host value and/or callable wrapped as an atom.
///
/// Equality is by identity token, never by deep value comparison — the engine
/// treats the payload as a black box.
#[derive(Clone)]
pub struct Grounded {
    token: String,
    payload: Option<Arc<dyn Any + Send + Sync>>,
    func: Option<GroundedFn>,
}

impl Grounded {
    /// Create a grounded atom with the given identity token.
    pub fn new(token: impl Into<String>) -> AtomResult<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(AtomError::BlankGroundedToken);
        }
        Ok(Self {
            token,
            payload: None,
            func: None,
        })
    }

    /// Attach an opaque host value.
    pub fn with_payload(mut self, payload: Arc<dyn Any + Send + Sync>) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Attach a callable.
    pub fn with_fn(mut self, func: GroundedFn) -> Self {
        self.func = Some(func);
        self
    }

    /// The identity token.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// The opaque payload, if any.
    pub fn payload(&self) -> Option<&Arc<dyn Any + Send + Sync>> {
        self.payload.as_ref()
    }

    /// The callable, if any.
    pub fn func(&self) -> Option<&GroundedFn> {
        self.func.as_ref()
    }
}

impl PartialEq for Grounded {
    fn eq(&self, other: &Self) -> bool {
        self.token == other.token
    }
}

impl Eq for Grounded {}

impl std::fmt::Debug for Grounded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Grounded")
            .field("token", &self.token)
            .field("has_payload", &self.payload.is_some())
            .field("has_fn", &self.func.is_some())
            .finish()
    }
}

/// The unit of knowledge: symbol, variable, expression, or grounded value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Atom {
    /// An interned name; two symbols are identical iff their names match.
    Symbol(String),
    /// A pattern variable; names carry a `$` sigil.
    Variable(String),
    /// A tagged relation over child atoms.
    Expression(Expression),
    /// An opaque host value/callable.
    Grounded(Grounded),
}

impl Atom {
    /// Construct a symbol atom.
    pub fn symbol(name: impl Into<String>) -> AtomResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(AtomError::BlankName { what: "symbol" });
        }
        if name.starts_with('$') {
            return Err(AtomError::ReservedSigil { name });
        }
        Ok(Atom::Symbol(name))
    }

    /// Construct a variable atom. The name must carry the `$` sigil.
    pub fn variable(name: impl Into<String>) -> AtomResult<Self> {
        let name = name.into();
        match name.strip_prefix('$') {
            Some(rest) if !rest.trim().is_empty() => Ok(Atom::Variable(name)),
            Some(_) => Err(AtomError::BlankName { what: "variable" }),
            None => Err(AtomError::BadVariableName { name }),
        }
    }

    /// Deterministic structural identity.
    pub fn identity(&self) -> AtomId {
        match self {
            Atom::Symbol(name) => AtomId::new(name.clone()),
            Atom::Variable(name) => AtomId::new(name.clone()),
            Atom::Expression(expr) => {
                let mut s = String::with_capacity(16 * (expr.children.len() + 1));
                s.push('(');
                s.push_str(&expr.tag);
                for child in &expr.children {
                    s.push(' ');
                    s.push_str(child.as_str());
                }
                s.push(')');
                AtomId::new(s)
            }
            Atom::Grounded(g) => AtomId::new(format!("gnd:{}", g.token)),
        }
    }

    /// Whether this atom is a variable.
    pub fn is_variable(&self) -> bool {
        matches!(self, Atom::Variable(_))
    }

    /// Whether this atom is a symbol.
    pub fn is_symbol(&self) -> bool {
        matches!(self, Atom::Symbol(_))
    }

    /// Name of a symbol or variable, if this is one.
    pub fn name(&self) -> Option<&str> {
        match self {
            Atom::Symbol(name) | Atom::Variable(name) => Some(name),
            _ => None,
        }
    }

    /// The expression payload, if this is an expression.
    pub fn as_expression(&self) -> Option<&Expression> {
        match self {
            Atom::Expression(expr) => Some(expr),
            _ => None,
        }
    }

    /// The grounded payload, if this is a grounded atom.
    pub fn as_grounded(&self) -> Option<&Grounded> {
        match self {
            Atom::Grounded(g) => Some(g),
            _ => None,
        }
    }
}

impl std::fmt::Display for Atom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.identity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> AtomId {
        AtomId::new(s.to_string())
    }

    #[test]
    fn symbol_identity_is_its_name() {
        let atom = Atom::symbol("Cat").unwrap();
        assert_eq!(atom.identity().as_str(), "Cat");
    }

    #[test]
    fn blank_symbol_rejected() {
        assert!(matches!(
            Atom::symbol("  "),
            Err(AtomError::BlankName { .. })
        ));
    }

    #[test]
    fn variable_requires_sigil() {
        assert!(Atom::variable("$x").is_ok());
        assert!(matches!(
            Atom::variable("x"),
            Err(AtomError::BadVariableName { .. })
        ));
        assert!(matches!(
            Atom::variable("$"),
            Err(AtomError::BlankName { .. })
        ));
    }

    #[test]
    fn expression_identity_embeds_children() {
        let expr = Expression::new("Likes", vec![id("Sam"), id("Pizza")], false).unwrap();
        let atom = Atom::Expression(expr);
        assert_eq!(atom.identity().as_str(), "(Likes Sam Pizza)");
    }

    #[test]
    fn nested_expression_identity() {
        let inner = Expression::new("Likes", vec![id("Sam"), id("Pizza")], false).unwrap();
        let inner_id = Atom::Expression(inner).identity();
        let outer = Expression::new("Not", vec![inner_id], false).unwrap();
        assert_eq!(
            Atom::Expression(outer).identity().as_str(),
            "(Not (Likes Sam Pizza))"
        );
    }

    #[test]
    fn commutative_children_are_sorted() {
        let ab = Expression::new("Similarity", vec![id("A"), id("B")], true).unwrap();
        let ba = Expression::new("Similarity", vec![id("B"), id("A")], true).unwrap();
        assert_eq!(
            Atom::Expression(ab).identity(),
            Atom::Expression(ba).identity()
        );
    }

    #[test]
    fn ordered_children_are_not_sorted() {
        let ab = Expression::new("Inheritance", vec![id("A"), id("B")], false).unwrap();
        let ba = Expression::new("Inheritance", vec![id("B"), id("A")], false).unwrap();
        assert_ne!(
            Atom::Expression(ab).identity(),
            Atom::Expression(ba).identity()
        );
    }

    #[test]
    fn empty_expression_rejected() {
        assert!(matches!(
            Expression::new("Likes", vec![], false),
            Err(AtomError::EmptyExpression { .. })
        ));
    }

    #[test]
    fn grounded_equality_is_by_token() {
        let a = Grounded::new("add").unwrap().with_payload(Arc::new(1u32));
        let b = Grounded::new("add").unwrap().with_payload(Arc::new(2u32));
        assert_eq!(a, b);
        let c = Grounded::new("sub").unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn grounded_identity_is_prefixed() {
        let g = Grounded::new("now").unwrap();
        assert_eq!(Atom::Grounded(g).identity().as_str(), "gnd:now");
    }

    #[test]
    fn blank_grounded_token_rejected() {
        assert!(matches!(
            Grounded::new(""),
            Err(AtomError::BlankGroundedToken)
        ));
    }
}
