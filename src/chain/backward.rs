//! Backward chaining: goal-directed resolution of whether (and how) a pattern
//! holds.
//!
//! Resolution is recursive with an explicit depth counter and a visitation key
//! per (substituted goal, bindings) pair, so cyclic rule sets produce a
//! defined empty result instead of unbounded recursion. Every distinct
//! (bindings, derived-atom) combination found is returned.
//!
//! A derivation-signature set spans the whole search: the same premises run
//! through the same rule kind revise their conclusion once, no matter how many
//! recursion paths rediscover them — evidence is never double-counted.
//!
//! The [`Planner`] specializes backward chaining to rules of the shape
//! `(Rule (And pre..) action effect)`: it satisfies each precondition
//! (recursing for ones that do not already hold) and appends the rule's
//! action, within plan-length and search-depth bounds.

use std::collections::HashSet;
use std::sync::Arc;

use crate::atom::{Atom, AtomId};
use crate::attention::BoostEvent;
use crate::space::AtomSpace;
use crate::truth::Truth;
use crate::unify::{Answer, Bindings, subst, unify};

use super::{RuleKind, derivation_signature};

/// Configuration for goal resolution.
#[derive(Debug, Clone)]
pub struct BackwardConfig {
    /// Maximum recursion depth (default: 6).
    pub max_depth: usize,
    /// Answer cap per query (default: 64).
    pub max_answers: usize,
    /// Matched and derived atoms must clear this confidence (default: 0.05).
    pub min_confidence: f32,
    /// Relation tags resolvable by deduction (default: `Inheritance`,
    /// `Implication`).
    pub transitive_tags: Vec<String>,
    /// Relation tags resolvable by inversion (default: `Inheritance`).
    pub invertible_tags: Vec<String>,
}

impl Default for BackwardConfig {
    fn default() -> Self {
        Self {
            max_depth: 6,
            max_answers: 64,
            min_confidence: 0.05,
            transitive_tags: vec!["Inheritance".into(), "Implication".into()],
            invertible_tags: vec!["Inheritance".into()],
        }
    }
}

/// Mutable search state threaded through one resolution.
struct SearchCtx {
    /// (goal, bindings) keys on the current path; removed on backtrack.
    visited: HashSet<String>,
    /// Derivations already applied anywhere in this search.
    derived: HashSet<String>,
}

impl SearchCtx {
    fn new() -> Self {
        Self {
            visited: HashSet::new(),
            derived: HashSet::new(),
        }
    }
}

/// Goal-directed chainer over an atom space.
pub struct BackwardChainer<'a> {
    space: &'a AtomSpace,
    config: BackwardConfig,
}

impl<'a> BackwardChainer<'a> {
    pub fn new(space: &'a AtomSpace, config: BackwardConfig) -> Self {
        Self { space, config }
    }

    /// Resolve a goal pattern, returning every distinct answer found.
    pub fn resolve(&self, goal: &Arc<Atom>) -> Vec<Answer> {
        let mut ctx = SearchCtx::new();
        self.resolve_inner(
            &goal.identity(),
            &Bindings::empty(),
            self.config.max_depth,
            &mut ctx,
        )
    }

    /// Evaluate an expression: apply a grounded callable when the shape is
    /// `(Apply gnd args..)`, otherwise backward-chain and return the matched
    /// atoms.
    pub fn eval(&self, expr: &Arc<Atom>, max_depth: usize) -> Vec<Arc<Atom>> {
        if let Some(e) = expr.as_expression() {
            if e.tag == "Apply" {
                if let Some(result) = self.apply_grounded(e) {
                    return result;
                }
                return Vec::new();
            }
        }

        let mut ctx = SearchCtx::new();
        let answers =
            self.resolve_inner(&expr.identity(), &Bindings::empty(), max_depth.max(1), &mut ctx);

        let mut out: Vec<Arc<Atom>> = Vec::new();
        let mut seen: HashSet<AtomId> = HashSet::new();
        for answer in answers {
            let Some(atom) = subst(self.space, &answer.atom.identity(), &answer.bindings)
            else {
                continue;
            };
            if seen.insert(atom.identity()) {
                out.push(atom);
            }
        }
        out
    }

    /// `(Apply gnd args..)`: invoke the grounded callable on the resolved
    /// argument atoms.
    fn apply_grounded(&self, e: &crate::atom::Expression) -> Option<Vec<Arc<Atom>>> {
        let head = self.space.peek(&e.children[0])?;
        let grounded = head.as_grounded()?;
        let func = grounded.func()?;
        let args: Vec<Arc<Atom>> = e.children[1..]
            .iter()
            .filter_map(|c| self.space.peek(c))
            .collect();
        if args.len() != e.children.len() - 1 {
            return None; // an argument vanished
        }
        let result = func(self.space, &args)?;
        Some(vec![self.space.intern((*result).clone())])
    }

    fn resolve_inner(
        &self,
        goal: &AtomId,
        bindings: &Bindings,
        depth: usize,
        ctx: &mut SearchCtx,
    ) -> Vec<Answer> {
        if depth == 0 {
            return Vec::new();
        }
        let Some(goal_atom) = subst(self.space, goal, bindings) else {
            return Vec::new();
        };
        let goal_id = goal_atom.identity();

        let key = format!("{}|{}", goal_id, bindings.fingerprint());
        if !ctx.visited.insert(key.clone()) {
            return Vec::new(); // already on this path
        }
        self.space.boost(&goal_id, BoostEvent::GoalFocus);

        let mut answers: Vec<Answer> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        self.direct_matches(&goal_atom, bindings, &mut answers, &mut seen);
        if let Some(expr) = goal_atom.as_expression() {
            if expr.arity() == 2 && self.config.transitive_tags.contains(&expr.tag) {
                self.by_deduction(&goal_id, expr, bindings, depth, ctx, &mut answers, &mut seen);
            }
            if expr.arity() == 2 && self.config.invertible_tags.contains(&expr.tag) {
                self.by_inversion(&goal_id, expr, bindings, depth, ctx, &mut answers, &mut seen);
            }
        }
        self.by_detachment(&goal_id, bindings, depth, ctx, &mut answers, &mut seen);
        self.by_instantiation(&goal_id, bindings, ctx, &mut answers, &mut seen);

        ctx.visited.remove(&key);
        answers
    }

    /// Step 2: unify the goal against stored facts through the indices.
    fn direct_matches(
        &self,
        goal_atom: &Arc<Atom>,
        bindings: &Bindings,
        answers: &mut Vec<Answer>,
        seen: &mut HashSet<String>,
    ) {
        let sensitivity = self.space.config().sensitivity;
        for matched in self.space.query(goal_atom) {
            let confidence = self
                .space
                .value_of(&matched.atom.identity())
                .truth
                .confidence(sensitivity);
            if confidence < self.config.min_confidence {
                continue;
            }
            let Some(merged) = bindings.merge(&matched.bindings) else {
                continue; // conflicting branch, siblings continue
            };
            self.push(answers, seen, matched.atom, merged);
        }
    }

    /// Goal `(tag x z)` via `(tag x $mid)` + `(tag $mid z)`.
    #[allow(clippy::too_many_arguments)]
    fn by_deduction(
        &self,
        goal_id: &AtomId,
        expr: &crate::atom::Expression,
        bindings: &Bindings,
        depth: usize,
        ctx: &mut SearchCtx,
        answers: &mut Vec<Answer>,
        seen: &mut HashSet<String>,
    ) {
        let Ok(mid) = self.space.var(&format!("$mid:{depth}")) else {
            return;
        };
        let Ok(sub1) = self
            .space
            .expr_from_ids(&expr.tag, vec![expr.children[0].clone(), mid.identity()])
        else {
            return;
        };

        for first in self.resolve_inner(&sub1.identity(), bindings, depth - 1, ctx) {
            let Ok(sub2) = self
                .space
                .expr_from_ids(&expr.tag, vec![mid.identity(), expr.children[1].clone()])
            else {
                continue;
            };
            for second in self.resolve_inner(&sub2.identity(), &first.bindings, depth - 1, ctx) {
                let (Some(e1), Some(e2)) =
                    (first.atom.as_expression(), second.atom.as_expression())
                else {
                    continue;
                };
                if e1.children[0] == e2.children[1] {
                    continue; // would conclude (tag a a)
                }
                let t1 = self.space.value_of(&first.atom.identity()).truth;
                let t2 = self.space.value_of(&second.atom.identity()).truth;
                let derived = Truth::deduction(&t1, &t2, RuleKind::Deduction.discount());
                let signature = derivation_signature(
                    RuleKind::Deduction,
                    &[&first.atom.identity(), &second.atom.identity()],
                );
                self.conclude(
                    &expr.tag,
                    vec![e1.children[0].clone(), e2.children[1].clone()],
                    derived,
                    signature,
                    goal_id,
                    &second.bindings,
                    ctx,
                    answers,
                    seen,
                );
            }
        }
    }

    /// Goal `(tag x y)` via `(tag y x)`.
    #[allow(clippy::too_many_arguments)]
    fn by_inversion(
        &self,
        goal_id: &AtomId,
        expr: &crate::atom::Expression,
        bindings: &Bindings,
        depth: usize,
        ctx: &mut SearchCtx,
        answers: &mut Vec<Answer>,
        seen: &mut HashSet<String>,
    ) {
        let Ok(converse) = self
            .space
            .expr_from_ids(&expr.tag, vec![expr.children[1].clone(), expr.children[0].clone()])
        else {
            return;
        };
        for found in self.resolve_inner(&converse.identity(), bindings, depth - 1, ctx) {
            let Some(fe) = found.atom.as_expression() else {
                continue;
            };
            let truth = self.space.value_of(&found.atom.identity()).truth;
            let derived = Truth::conversion(&truth, RuleKind::Inversion.discount());
            let signature =
                derivation_signature(RuleKind::Inversion, &[&found.atom.identity()]);
            self.conclude(
                &expr.tag,
                vec![fe.children[1].clone(), fe.children[0].clone()],
                derived,
                signature,
                goal_id,
                &found.bindings,
                ctx,
                answers,
                seen,
            );
        }
    }

    /// Goal B via `(Implication A B')` where B' unifies with B; premise A
    /// becomes a subgoal.
    fn by_detachment(
        &self,
        goal_id: &AtomId,
        bindings: &Bindings,
        depth: usize,
        ctx: &mut SearchCtx,
        answers: &mut Vec<Answer>,
        seen: &mut HashSet<String>,
    ) {
        let sensitivity = self.space.config().sensitivity;
        for rule_id in self.space.heads("Implication") {
            let Some(rule) = self.space.peek(&rule_id) else {
                continue;
            };
            let Some(re) = rule.as_expression() else {
                continue;
            };
            if re.arity() != 2 {
                continue;
            }
            let (premise, conclusion) = (&re.children[0], &re.children[1]);
            let Some(extended) = unify(self.space, conclusion, goal_id, bindings) else {
                continue;
            };
            let rule_truth = self.space.value_of(&rule_id).truth;
            if rule_truth.confidence(sensitivity) < self.config.min_confidence {
                continue;
            }

            for found in self.resolve_inner(premise, &extended, depth - 1, ctx) {
                let fact_truth = self.space.value_of(&found.atom.identity()).truth;
                let derived =
                    Truth::detachment(&fact_truth, &rule_truth, RuleKind::Detachment.discount());
                if derived.confidence(sensitivity) < self.config.min_confidence {
                    continue;
                }
                let Some(instance) = subst(self.space, conclusion, &found.bindings) else {
                    continue;
                };
                let signature = derivation_signature(
                    RuleKind::Detachment,
                    &[&rule_id, &found.atom.identity()],
                );
                if ctx.derived.insert(signature) {
                    self.space.revise_truth(&instance.identity(), &derived);
                }
                if let Some(final_bindings) =
                    unify(self.space, goal_id, &instance.identity(), &found.bindings)
                {
                    self.push(answers, seen, instance, final_bindings);
                }
            }
        }
    }

    /// Goal via `(ForAll $v body)` statements.
    fn by_instantiation(
        &self,
        goal_id: &AtomId,
        bindings: &Bindings,
        ctx: &mut SearchCtx,
        answers: &mut Vec<Answer>,
        seen: &mut HashSet<String>,
    ) {
        let sensitivity = self.space.config().sensitivity;
        for forall_id in self.space.heads("ForAll") {
            let Some(forall) = self.space.peek(&forall_id) else {
                continue;
            };
            let Some(fe) = forall.as_expression() else {
                continue;
            };
            if fe.arity() != 2 {
                continue;
            }
            let body = &fe.children[1];
            let Some(extended) = unify(self.space, body, goal_id, bindings) else {
                continue;
            };
            let Some(instance) = subst(self.space, body, &extended) else {
                continue;
            };
            if self.space.contains_variable(&instance.identity()) {
                continue; // goal did not pin the quantified variable
            }
            let truth = self.space.value_of(&forall_id).truth;
            let derived = Truth::instantiation(&truth, RuleKind::Instantiation.discount());
            if derived.confidence(sensitivity) < self.config.min_confidence {
                continue;
            }
            let signature = derivation_signature(
                RuleKind::Instantiation,
                &[&forall_id, &instance.identity()],
            );
            if ctx.derived.insert(signature) {
                self.space.revise_truth(&instance.identity(), &derived);
            }
            self.push(answers, seen, instance, extended);
        }
    }

    /// Apply a derivation (once per signature), intern the conclusion, and
    /// keep it if it unifies with the original goal.
    #[allow(clippy::too_many_arguments)]
    fn conclude(
        &self,
        tag: &str,
        children: Vec<AtomId>,
        derived: Truth,
        signature: String,
        goal_id: &AtomId,
        bindings: &Bindings,
        ctx: &mut SearchCtx,
        answers: &mut Vec<Answer>,
        seen: &mut HashSet<String>,
    ) {
        if derived.confidence(self.space.config().sensitivity) < self.config.min_confidence {
            return;
        }
        let Ok(conclusion) = self.space.expr_from_ids(tag, children) else {
            return;
        };
        if ctx.derived.insert(signature) {
            self.space.revise_truth(&conclusion.identity(), &derived);
        }
        if let Some(final_bindings) = unify(self.space, goal_id, &conclusion.identity(), bindings)
        {
            self.push(answers, seen, conclusion, final_bindings);
        }
    }

    /// Deduplicate on (atom, bindings) and enforce the answer cap.
    fn push(
        &self,
        answers: &mut Vec<Answer>,
        seen: &mut HashSet<String>,
        atom: Arc<Atom>,
        bindings: Bindings,
    ) {
        if answers.len() >= self.config.max_answers {
            return;
        }
        let key = format!("{}|{}", atom.identity(), bindings.fingerprint());
        if seen.insert(key) {
            answers.push(Answer { atom, bindings });
        }
    }
}

// ---------------------------------------------------------------------------
// Planner
// ---------------------------------------------------------------------------

/// Action-sequencing planner over `(Rule (And pre..) action effect)` atoms.
pub struct Planner<'a> {
    space: &'a AtomSpace,
    /// Confidence a fact needs to count as already true (default: 0.1).
    min_confidence: f32,
}

impl<'a> Planner<'a> {
    pub fn new(space: &'a AtomSpace) -> Self {
        Self {
            space,
            min_confidence: 0.1,
        }
    }

    pub fn with_min_confidence(mut self, min_confidence: f32) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    /// Find an action sequence whose effects reach the goal, or `None`.
    ///
    /// Actions already used earlier in the plan are skipped, which breaks
    /// trivial cycles; depth and plan length bound the search.
    pub fn plan(
        &self,
        goal: &Arc<Atom>,
        max_plan_len: usize,
        max_search_depth: usize,
    ) -> Option<Vec<Arc<Atom>>> {
        let mut actions: Vec<Arc<Atom>> = Vec::new();
        if self.plan_rec(
            &goal.identity(),
            &Bindings::empty(),
            max_search_depth,
            max_plan_len,
            &mut actions,
        ) {
            tracing::debug!(steps = actions.len(), goal = %goal, "plan found");
            Some(actions)
        } else {
            None
        }
    }

    fn plan_rec(
        &self,
        goal: &AtomId,
        bindings: &Bindings,
        depth: usize,
        max_len: usize,
        actions: &mut Vec<Arc<Atom>>,
    ) -> bool {
        if depth == 0 {
            return false;
        }
        let Some(goal_atom) = subst(self.space, goal, bindings) else {
            return false;
        };
        if self.already_true(&goal_atom) {
            return true;
        }
        self.space.boost(&goal_atom.identity(), BoostEvent::GoalFocus);

        for rule_id in self.space.heads("Rule") {
            let Some(rule) = self.space.peek(&rule_id) else {
                continue;
            };
            let Some(re) = rule.as_expression() else {
                continue;
            };
            if re.arity() != 3 {
                tracing::warn!(rule = %rule_id, "planner rule is not (Rule pre action effect)");
                continue;
            }
            let (pre, action, effect) = (&re.children[0], &re.children[1], &re.children[2]);

            let Some(extended) =
                unify(self.space, effect, &goal_atom.identity(), &Bindings::empty())
            else {
                continue;
            };
            let Some(action_atom) = subst(self.space, action, &extended) else {
                continue;
            };
            if actions
                .iter()
                .any(|a| a.identity() == action_atom.identity())
            {
                continue; // this action is already in the plan
            }

            let saved = actions.len();
            let mut satisfied = true;
            for precondition in self.preconditions(pre) {
                if !self.plan_rec(&precondition, &extended, depth - 1, max_len, actions) {
                    satisfied = false;
                    break;
                }
            }

            if satisfied && actions.len() < max_len {
                actions.push(action_atom);
                return true;
            }
            actions.truncate(saved);
        }
        false
    }

    /// Unpack `(And p1 .. pn)`, or treat the atom as a single precondition.
    fn preconditions(&self, pre: &AtomId) -> Vec<AtomId> {
        match self.space.peek(pre).as_deref() {
            Some(Atom::Expression(e)) if e.tag == "And" => e.children.clone(),
            _ => vec![pre.clone()],
        }
    }

    /// A goal counts as already true when a confident matching fact exists.
    fn already_true(&self, goal: &Arc<Atom>) -> bool {
        let sensitivity = self.space.config().sensitivity;
        if self.space.contains_variable(&goal.identity()) {
            return self.space.query(goal).iter().any(|answer| {
                let truth = self.space.value_of(&answer.atom.identity()).truth;
                truth.confidence(sensitivity) >= self.min_confidence && truth.strength > 0.5
            });
        }
        let truth = self.space.value_of(&goal.identity()).truth;
        truth.confidence(sensitivity) >= self.min_confidence && truth.strength > 0.5
    }
}
