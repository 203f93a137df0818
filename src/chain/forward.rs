//! Forward chaining: opportunistic, priority-ordered derivation of new facts.
//!
//! Each round scans the space (through the indices, never a full table walk)
//! for premise combinations matching the built-in rule shapes, scores every
//! candidate by the product of its premises' salience × confidence, and
//! executes a bounded batch from the top of a priority queue. Derived atoms
//! are interned back through ordinary revision.
//!
//! A run ends on an empty queue, a zero-derivation round (quiescence), or an
//! exhausted step budget — so cyclic rule sets terminate. Per-candidate
//! failures (a premise evicted mid-round) are skipped and counted, never
//! aborting the batch.

use std::collections::{BinaryHeap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::atom::AtomId;
use crate::space::AtomSpace;
use crate::truth::Truth;

use super::{RuleKind, derivation_signature};

/// Configuration for a forward-chaining run.
#[derive(Debug, Clone)]
pub struct ForwardConfig {
    /// Total derivation budget for the run (default: 256).
    pub max_steps: usize,
    /// Candidates executed per round (default: 32).
    pub batch_size: usize,
    /// Maximum rounds before giving up on quiescence (default: 16).
    pub max_rounds: usize,
    /// Derivations whose confidence falls below this floor are discarded
    /// rather than interned (default: 0.01).
    pub min_confidence: f32,
    /// Premises must be at least this confident to generate candidates
    /// (default: 0.05).
    pub min_premise_confidence: f32,
    /// Relation tags treated as transitive for deduction
    /// (default: `Inheritance`, `Implication`).
    pub transitive_tags: Vec<String>,
    /// Relation tags whose converse is derivable (default: `Inheritance`).
    pub invertible_tags: Vec<String>,
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self {
            max_steps: 256,
            batch_size: 32,
            max_rounds: 16,
            min_confidence: 0.01,
            min_premise_confidence: 0.05,
            transitive_tags: vec!["Inheritance".into(), "Implication".into()],
            invertible_tags: vec!["Inheritance".into()],
        }
    }
}

/// Result of a forward-chaining run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardReport {
    /// Rounds executed.
    pub rounds: usize,
    /// Derivations interned (or revised into existing atoms).
    pub derived: usize,
    /// Candidates dropped because a premise vanished mid-run.
    pub skipped: usize,
    /// Derivations discarded below the confidence floor.
    pub below_floor: usize,
    /// True when the run ended because a round produced nothing new.
    pub reached_quiescence: bool,
    /// Derivation counts per rule kind.
    pub rule_stats: HashMap<String, usize>,
}

impl ForwardReport {
    /// JSON rendering for host-side diagnostics.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".into())
    }
}

/// What a candidate derivation produces.
#[derive(Debug, Clone)]
enum Conclusion {
    /// A (possibly new) expression to intern.
    Expr { tag: String, children: Vec<AtomId> },
    /// An existing atom whose truth gets revised.
    Existing(AtomId),
}

/// One scored derivation waiting in the priority queue.
#[derive(Debug, Clone)]
struct Candidate {
    kind: RuleKind,
    premises: Vec<AtomId>,
    conclusion: Conclusion,
    signature: String,
    score: f32,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score
    }
}
impl Eq for Candidate {}
impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.score.total_cmp(&other.score)
    }
}

/// Priority-queue-driven forward chainer over an atom space.
pub struct ForwardChainer<'a> {
    space: &'a AtomSpace,
    config: ForwardConfig,
}

impl<'a> ForwardChainer<'a> {
    pub fn new(space: &'a AtomSpace, config: ForwardConfig) -> Self {
        Self { space, config }
    }

    /// Run rounds until quiescence or the step budget is exhausted.
    pub fn run(&self) -> ForwardReport {
        let mut report = ForwardReport {
            rounds: 0,
            derived: 0,
            skipped: 0,
            below_floor: 0,
            reached_quiescence: false,
            rule_stats: HashMap::new(),
        };
        let mut seen: HashSet<String> = HashSet::new();
        let mut steps = 0usize;

        for _ in 0..self.config.max_rounds {
            let mut queue = self.gather(&seen);
            report.rounds += 1;
            if queue.is_empty() {
                report.reached_quiescence = true;
                break;
            }

            let mut derived_this_round = 0usize;
            let mut executed = 0usize;
            while executed < self.config.batch_size && steps < self.config.max_steps {
                let Some(candidate) = queue.pop() else { break };
                seen.insert(candidate.signature.clone());
                executed += 1;
                steps += 1;

                match self.execute(&candidate) {
                    Outcome::Derived => {
                        derived_this_round += 1;
                        report.derived += 1;
                        *report
                            .rule_stats
                            .entry(candidate.kind.name().to_string())
                            .or_insert(0) += 1;
                    }
                    Outcome::BelowFloor => report.below_floor += 1,
                    Outcome::PremiseVanished => report.skipped += 1,
                }
            }

            if derived_this_round == 0 {
                report.reached_quiescence = true;
                break;
            }
            if steps >= self.config.max_steps {
                break;
            }
        }

        tracing::info!(
            rounds = report.rounds,
            derived = report.derived,
            quiescent = report.reached_quiescence,
            "forward chaining complete"
        );
        report
    }

    /// Generate all candidates not yet executed, scored and queued.
    fn gather(&self, seen: &HashSet<String>) -> BinaryHeap<Candidate> {
        let mut queue = BinaryHeap::new();

        for tag in &self.config.transitive_tags {
            self.gather_deductions(tag, seen, &mut queue);
        }
        for tag in &self.config.invertible_tags {
            self.gather_inversions(tag, seen, &mut queue);
        }
        self.gather_detachments("Implication", RuleKind::Detachment, seen, &mut queue);
        // Temporally-projected rules derive with a steeper discount.
        self.gather_detachments(
            "PredictiveImplication",
            RuleKind::Projection,
            seen,
            &mut queue,
        );

        queue
    }

    /// Ground binary expressions with the given tag, with usable confidence.
    fn usable_links(&self, tag: &str) -> Vec<(AtomId, AtomId, AtomId, f32)> {
        let sensitivity = self.space.config().sensitivity;
        self.space
            .heads(tag)
            .into_iter()
            .filter_map(|id| {
                if self.space.contains_variable(&id) {
                    return None; // variable-bearing rules belong to backward chaining
                }
                let atom = self.space.peek(&id)?;
                let expr = atom.as_expression()?;
                if expr.arity() != 2 {
                    return None;
                }
                let value = self.space.value_of(&id);
                let confidence = value.truth.confidence(sensitivity);
                if confidence < self.config.min_premise_confidence {
                    return None;
                }
                let weight = value.importance.salience(self.space.config()) * confidence;
                Some((id, expr.children[0].clone(), expr.children[1].clone(), weight))
            })
            .collect()
    }

    fn gather_deductions(
        &self,
        tag: &str,
        seen: &HashSet<String>,
        queue: &mut BinaryHeap<Candidate>,
    ) {
        let links = self.usable_links(tag);
        let mut by_first: HashMap<&AtomId, Vec<usize>> = HashMap::new();
        for (i, (_, first, _, _)) in links.iter().enumerate() {
            by_first.entry(first).or_default().push(i);
        }

        for (id_ab, a, b, w_ab) in &links {
            let Some(successors) = by_first.get(b) else {
                continue;
            };
            for &j in successors {
                let (id_bc, _, c, w_bc) = &links[j];
                if a == c || id_ab == id_bc {
                    continue;
                }
                let signature = derivation_signature(RuleKind::Deduction, &[id_ab, id_bc]);
                if seen.contains(&signature) {
                    continue;
                }
                queue.push(Candidate {
                    kind: RuleKind::Deduction,
                    premises: vec![id_ab.clone(), id_bc.clone()],
                    conclusion: Conclusion::Expr {
                        tag: tag.to_string(),
                        children: vec![a.clone(), c.clone()],
                    },
                    signature,
                    score: w_ab * w_bc,
                });
            }
        }
    }

    fn gather_inversions(
        &self,
        tag: &str,
        seen: &HashSet<String>,
        queue: &mut BinaryHeap<Candidate>,
    ) {
        for (id_ab, a, b, weight) in self.usable_links(tag) {
            if a == b {
                continue;
            }
            let signature = derivation_signature(RuleKind::Inversion, &[&id_ab]);
            if seen.contains(&signature) {
                continue;
            }
            queue.push(Candidate {
                kind: RuleKind::Inversion,
                premises: vec![id_ab.clone()],
                conclusion: Conclusion::Expr {
                    tag: tag.to_string(),
                    children: vec![b, a],
                },
                signature,
                score: weight,
            });
        }
    }

    fn gather_detachments(
        &self,
        tag: &str,
        kind: RuleKind,
        seen: &HashSet<String>,
        queue: &mut BinaryHeap<Candidate>,
    ) {
        let sensitivity = self.space.config().sensitivity;
        for (id_rule, premise, conclusion, rule_weight) in self.usable_links(tag) {
            let fact_value = self.space.value_of(&premise);
            let fact_confidence = fact_value.truth.confidence(sensitivity);
            if fact_confidence < self.config.min_premise_confidence {
                continue;
            }
            let signature = derivation_signature(kind, &[&id_rule, &premise]);
            if seen.contains(&signature) {
                continue;
            }
            let fact_weight =
                fact_value.importance.salience(self.space.config()) * fact_confidence;
            queue.push(Candidate {
                kind,
                premises: vec![id_rule, premise],
                conclusion: Conclusion::Existing(conclusion),
                signature,
                score: rule_weight * fact_weight,
            });
        }
    }

    /// Execute one candidate: re-read premises, compute the derived truth, and
    /// intern or revise the conclusion.
    fn execute(&self, candidate: &Candidate) -> Outcome {
        let mut truths = Vec::with_capacity(candidate.premises.len());
        for premise in &candidate.premises {
            if !self.space.contains(premise) {
                return Outcome::PremiseVanished;
            }
            truths.push(self.space.value_of(premise).truth);
        }

        let discount = candidate.kind.discount();
        let derived = match (candidate.kind, truths.as_slice()) {
            (RuleKind::Deduction, [ab, bc]) => Truth::deduction(ab, bc, discount),
            (RuleKind::Inversion, [ab]) => Truth::conversion(ab, discount),
            (RuleKind::Detachment | RuleKind::Projection, [rule, fact]) => {
                Truth::detachment(fact, rule, discount)
            }
            _ => return Outcome::PremiseVanished,
        };

        if derived.confidence(self.space.config().sensitivity) < self.config.min_confidence {
            return Outcome::BelowFloor;
        }

        match &candidate.conclusion {
            Conclusion::Expr { tag, children } => {
                match self.space.expr_from_ids(tag, children.clone()) {
                    Ok(atom) => {
                        self.space.revise_truth(&atom.identity(), &derived);
                        tracing::debug!(kind = %candidate.kind, atom = %atom, "derived");
                        Outcome::Derived
                    }
                    Err(_) => Outcome::PremiseVanished,
                }
            }
            Conclusion::Existing(id) => {
                if self.space.revise_truth(id, &derived).is_none() {
                    return Outcome::PremiseVanished;
                }
                tracing::debug!(kind = %candidate.kind, atom = %id, "revised");
                Outcome::Derived
            }
        }
    }
}

enum Outcome {
    Derived,
    BelowFloor,
    PremiseVanished,
}
