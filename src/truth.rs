//! Truth values: (strength, evidence) pairs with a derived confidence.
//!
//! `strength` is the frequency-like degree of belief in [0, 1]; `evidence` is
//! the (possibly fractional) amount of support behind it. Confidence is
//! derived, never stored: `confidence = evidence / (evidence + k)` where `k`
//! is the configured sensitivity constant.
//!
//! Revision merges two truth values about the same atom by evidence-weighted
//! averaging, which is commutative and associative up to floating-point
//! tolerance — concurrent revisions converge regardless of interleaving.
//!
//! Derivation combinators (deduction, conversion, detachment, instantiation)
//! all cap the derived evidence at `discount * min(premise evidence)`, so a
//! conclusion can never be better supported than its weakest premise.

use serde::{Deserialize, Serialize};

/// A (strength, evidence) truth value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Truth {
    /// Degree of belief in [0, 1].
    pub strength: f32,
    /// Amount of supporting evidence, >= 0.
    pub evidence: f32,
}

impl Truth {
    /// Create a truth value, clamping strength to [0, 1] and evidence to >= 0.
    pub fn new(strength: f32, evidence: f32) -> Self {
        Self {
            strength: strength.clamp(0.0, 1.0),
            evidence: evidence.max(0.0),
        }
    }

    /// Full belief backed by a single unit of evidence.
    pub fn certain() -> Self {
        Self::new(1.0, 1.0)
    }

    /// Maximally uncertain: strength 0.5 with no evidence.
    pub fn unknown() -> Self {
        Self::new(0.5, 0.0)
    }

    /// Derived confidence in [0, 1): `evidence / (evidence + sensitivity)`.
    pub fn confidence(&self, sensitivity: f32) -> f32 {
        self.evidence / (self.evidence + sensitivity)
    }

    /// Bayesian-style revision: evidence-weighted mean of strengths, summed
    /// evidence. Commutative and associative in the steady state.
    pub fn revise(&self, other: &Truth) -> Truth {
        let total = self.evidence + other.evidence;
        if total <= f32::EPSILON {
            return Truth::new((self.strength + other.strength) / 2.0, 0.0);
        }
        Truth::new(
            (self.strength * self.evidence + other.strength * other.evidence) / total,
            total,
        )
    }

    /// Deduction: from A→B and B→C, the strength of A→C is the product of the
    /// premise strengths.
    pub fn deduction(ab: &Truth, bc: &Truth, discount: f32) -> Truth {
        Truth::new(
            ab.strength * bc.strength,
            derived_evidence(&[ab, bc], discount),
        )
    }

    /// Conversion (inversion/abduction): from A→B, derive B→A. Strength is
    /// carried over; the evidence discount does the epistemic damping.
    pub fn conversion(ab: &Truth, discount: f32) -> Truth {
        Truth::new(ab.strength, derived_evidence(&[ab], discount))
    }

    /// Detachment (modus ponens): from fact A and rule A→B, revise B.
    pub fn detachment(fact: &Truth, rule: &Truth, discount: f32) -> Truth {
        Truth::new(
            fact.strength * rule.strength,
            derived_evidence(&[fact, rule], discount),
        )
    }

    /// Instantiation of a universally quantified statement at a witness.
    pub fn instantiation(forall: &Truth, discount: f32) -> Truth {
        Truth::new(forall.strength, derived_evidence(&[forall], discount))
    }
}

impl Default for Truth {
    fn default() -> Self {
        Self::certain()
    }
}

impl std::fmt::Display for Truth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{:.2}, {:.1}>", self.strength, self.evidence)
    }
}

/// Evidence of a derived truth: discounted minimum over the premises.
fn derived_evidence(premises: &[&Truth], discount: f32) -> f32 {
    let min = premises
        .iter()
        .map(|t| t.evidence)
        .fold(f32::INFINITY, f32::min);
    min * discount.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f32 = 1e-4;

    #[test]
    fn new_clamps() {
        let t = Truth::new(1.5, -3.0);
        assert_eq!(t.strength, 1.0);
        assert_eq!(t.evidence, 0.0);
    }

    #[test]
    fn confidence_monotone_in_evidence() {
        let mut last = -1.0f32;
        for n in 0..100 {
            let c = Truth::new(0.8, n as f32).confidence(1.0);
            assert!(c >= last, "confidence decreased at n={n}");
            last = c;
        }
        assert!(last < 1.0);
    }

    #[test]
    fn revision_is_commutative() {
        let a = Truth::new(0.9, 20.0);
        let b = Truth::new(0.4, 5.0);
        let ab = a.revise(&b);
        let ba = b.revise(&a);
        assert!((ab.strength - ba.strength).abs() < TOL);
        assert!((ab.evidence - ba.evidence).abs() < TOL);
    }

    #[test]
    fn revision_is_associative() {
        let a = Truth::new(0.9, 20.0);
        let b = Truth::new(0.4, 5.0);
        let c = Truth::new(0.1, 2.0);
        let left = a.revise(&b).revise(&c);
        let right = a.revise(&b.revise(&c));
        assert!((left.strength - right.strength).abs() < TOL);
        assert!((left.evidence - right.evidence).abs() < TOL);
    }

    #[test]
    fn revision_accumulates_evidence() {
        let a = Truth::new(0.9, 20.0);
        let b = Truth::new(0.9, 10.0);
        let merged = a.revise(&b);
        assert_eq!(merged.evidence, 30.0);
        assert!((merged.strength - 0.9).abs() < TOL);
    }

    #[test]
    fn revision_of_zero_evidence_pair() {
        let merged = Truth::unknown().revise(&Truth::unknown());
        assert_eq!(merged.evidence, 0.0);
        assert!((merged.strength - 0.5).abs() < TOL);
    }

    #[test]
    fn deduction_multiplies_strength() {
        let ab = Truth::new(0.9, 20.0);
        let bc = Truth::new(0.95, 50.0);
        let ac = Truth::deduction(&ab, &bc, 0.9);
        assert!((ac.strength - 0.855).abs() < TOL);
        // Evidence capped at discount * min(premises).
        assert!((ac.evidence - 18.0).abs() < TOL);
        assert!(ac.evidence < ab.evidence.min(bc.evidence));
    }

    #[test]
    fn derived_confidence_below_premises() {
        let ab = Truth::new(0.9, 20.0);
        let bc = Truth::new(0.95, 50.0);
        let ac = Truth::deduction(&ab, &bc, 0.9);
        let k = 1.0;
        assert!(ac.confidence(k) < ab.confidence(k));
        assert!(ac.confidence(k) < bc.confidence(k));
    }

    #[test]
    fn conversion_keeps_strength() {
        let ab = Truth::new(0.8, 10.0);
        let ba = Truth::conversion(&ab, 0.5);
        assert_eq!(ba.strength, 0.8);
        assert_eq!(ba.evidence, 5.0);
    }

    #[test]
    fn display_format() {
        assert_eq!(Truth::new(0.9, 20.0).to_string(), "<0.90, 20.0>");
    }
}
