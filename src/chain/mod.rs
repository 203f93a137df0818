//! Inference: forward (opportunistic) and backward (goal-directed) chaining.
//!
//! Both chainers sit on the unifier and the atom space's indices. Forward
//! chaining sweeps for premise combinations matching known rule shapes and
//! executes the highest-scoring candidates; backward chaining resolves a goal
//! pattern recursively. Derived atoms are interned back into the space through
//! ordinary revision, closing the loop.

pub mod backward;
pub mod forward;

use crate::atom::AtomId;

/// The built-in derivation rule shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum RuleKind {
    /// A→B, B→C ⇒ A→C for transitive relation tags.
    Deduction,
    /// A→B ⇒ B→A with damped evidence.
    Inversion,
    /// Fact A plus rule A→B ⇒ revise B (modus ponens).
    Detachment,
    /// (ForAll $x body) ⇒ body instance at a witness.
    Instantiation,
    /// Effect projection through a planner rule.
    Projection,
}

impl RuleKind {
    /// Evidence discount applied to this kind's derivations. Projected
    /// conclusions take the largest haircut.
    pub fn discount(self) -> f32 {
        match self {
            RuleKind::Deduction => 0.9,
            RuleKind::Inversion => 0.5,
            RuleKind::Detachment => 0.8,
            RuleKind::Instantiation => 0.7,
            RuleKind::Projection => 0.4,
        }
    }

    /// Stable name, used in dedup signatures and report stats.
    pub fn name(self) -> &'static str {
        match self {
            RuleKind::Deduction => "deduction",
            RuleKind::Inversion => "inversion",
            RuleKind::Detachment => "detachment",
            RuleKind::Instantiation => "instantiation",
            RuleKind::Projection => "projection",
        }
    }
}

impl std::fmt::Display for RuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Dedup signature for one derivation: rule kind plus sorted premise ids.
///
/// Sorting makes the signature order-insensitive, so the symmetric form of a
/// commutative derivation collides with the original and is not re-run.
pub(crate) fn derivation_signature(kind: RuleKind, premises: &[&AtomId]) -> String {
    let mut ids: Vec<&str> = premises.iter().map(|p| p.as_str()).collect();
    ids.sort_unstable();
    let mut s = String::from(kind.name());
    for id in ids {
        s.push('|');
        s.push_str(id);
    }
    s
}
