//! The atom space: a canonicalizing, concurrently-accessed store of atoms and
//! their mutable values.
//!
//! Interning the same logical atom twice returns the same shared instance, so
//! identity comparison is id comparison everywhere downstream. Each tracked
//! atom carries an [`AtomValue`] (truth + importance + access stamp) revised
//! through an optimistic retry loop — concurrent revisions of different atoms
//! never contend, and concurrent revisions of the same atom converge because
//! truth revision is order-independent.
//!
//! The space also owns the secondary indices ([`SpaceIndex`]) and the
//! importance-driven eviction sweep ("forgetting").

pub mod index;

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::atom::{Atom, AtomId, Expression, Grounded};
use crate::attention::{AtomValue, BoostEvent};
use crate::clock::LogicalClock;
use crate::config::SpaceConfig;
use crate::error::HekaResult;
use crate::truth::Truth;
use crate::unify::{Answer, Bindings, unify};

use self::index::SpaceIndex;

/// Outcome of one eviction sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepReport {
    /// False when another sweep was already in progress and this one bailed.
    pub ran: bool,
    /// Atoms whose importance was decayed and scored.
    pub examined: usize,
    /// Atoms scoring below the configured floor after decay.
    pub below_floor: usize,
    /// Atoms removed.
    pub evicted: usize,
    /// Eligible-looking atoms skipped because they are protected.
    pub protected_skipped: usize,
    /// Atoms skipped because a live expression still references them.
    pub referenced_skipped: usize,
    pub size_before: usize,
    pub size_after: usize,
}

impl SweepReport {
    /// JSON rendering for host-side diagnostics.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".into())
    }

    fn skipped(size: usize) -> Self {
        Self {
            ran: false,
            examined: 0,
            below_floor: 0,
            evicted: 0,
            protected_skipped: 0,
            referenced_skipped: 0,
            size_before: size,
            size_after: size,
        }
    }
}

/// Canonicalizing atom store with truth/importance metadata and indices.
pub struct AtomSpace {
    config: SpaceConfig,
    clock: Arc<LogicalClock>,
    /// Identity → canonical instance.
    atoms: dashmap::DashMap<AtomId, Arc<Atom>>,
    /// Identity → mutable value, revised via optimistic retry.
    values: dashmap::DashMap<AtomId, AtomValue>,
    index: SpaceIndex,
    /// Self-exclusion guard for the eviction sweep.
    sweeping: AtomicBool,
}

impl AtomSpace {
    /// Create a space with its own logical clock.
    pub fn new(config: SpaceConfig) -> HekaResult<Self> {
        Self::with_clock(config, Arc::new(LogicalClock::new()))
    }

    /// Create a space sharing a host-owned clock.
    pub fn with_clock(config: SpaceConfig, clock: Arc<LogicalClock>) -> HekaResult<Self> {
        config.validate()?;
        tracing::info!(
            high_water = config.high_water,
            protected = config.protected_symbols.len(),
            "initializing atom space"
        );
        Ok(Self {
            config,
            clock,
            atoms: dashmap::DashMap::new(),
            values: dashmap::DashMap::new(),
            index: SpaceIndex::new(),
            sweeping: AtomicBool::new(false),
        })
    }

    /// The space's configuration.
    pub fn config(&self) -> &SpaceConfig {
        &self.config
    }

    /// The logical clock this space stamps access times from.
    pub fn clock(&self) -> &Arc<LogicalClock> {
        &self.clock
    }

    /// Number of tracked atoms.
    pub fn size(&self) -> usize {
        self.atoms.len()
    }

    // -----------------------------------------------------------------------
    // Interning
    // -----------------------------------------------------------------------

    /// Intern an atom, returning the canonical shared instance.
    ///
    /// First insert initializes the atom's value with the configured initial
    /// importance and an unknown truth. Expressions are registered in both
    /// indices before they become visible, so a visible atom is always fully
    /// indexed.
    pub fn intern(&self, atom: Atom) -> Arc<Atom> {
        let id = atom.identity();
        if let Some(existing) = self.atoms.get(&id) {
            return Arc::clone(existing.value());
        }

        let arc = Arc::new(atom);
        if let Atom::Expression(expr) = arc.as_ref() {
            self.index.insert(&id, expr);
        }
        let now = self.clock.now();
        self.values
            .entry(id.clone())
            .or_insert_with(|| AtomValue::initial(Truth::unknown(), &self.config, now));
        let canonical = self
            .atoms
            .entry(id)
            .or_insert_with(|| Arc::clone(&arc));
        Arc::clone(canonical.value())
    }

    /// Intern an atom and revise its truth with the given evidence.
    ///
    /// Adding an already-present atom merges truth (Bayesian revision, never
    /// overwrite) and boosts its importance.
    pub fn add(&self, atom: Atom, truth: Truth) -> Arc<Atom> {
        let canonical = self.intern(atom);
        let id = canonical.identity();
        self.cas_value(&id, true, |v| AtomValue {
            truth: v.truth.revise(&truth),
            importance: v.importance.boost(BoostEvent::Revision, &self.config),
            ..*v
        });
        canonical
    }

    /// Intern a symbol by name.
    pub fn sym(&self, name: &str) -> HekaResult<Arc<Atom>> {
        Ok(self.intern(Atom::symbol(name)?))
    }

    /// Intern a variable by name (`$`-prefixed).
    pub fn var(&self, name: &str) -> HekaResult<Arc<Atom>> {
        Ok(self.intern(Atom::variable(name)?))
    }

    /// Intern an expression over already-interned children.
    ///
    /// Child order canonicalizes automatically for commutative tags.
    pub fn expr(&self, tag: &str, children: &[Arc<Atom>]) -> HekaResult<Arc<Atom>> {
        self.expr_from_ids(tag, children.iter().map(|c| c.identity()).collect())
    }

    /// Intern an expression from child ids.
    pub fn expr_from_ids(&self, tag: &str, children: Vec<AtomId>) -> HekaResult<Arc<Atom>> {
        let commutative = self.config.commutative_tags.contains(tag);
        let expr = Expression::new(tag, children, commutative)?;
        Ok(self.intern(Atom::Expression(expr)))
    }

    /// Intern a grounded atom.
    pub fn grounded(&self, grounded: Grounded) -> Arc<Atom> {
        self.intern(Atom::Grounded(grounded))
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    /// Look up an atom by identity, stamping its access time and applying the
    /// access boost (read implies relevance).
    pub fn get(&self, id: &AtomId) -> Option<Arc<Atom>> {
        let atom = self.peek(id)?;
        self.boost(id, BoostEvent::Access);
        Some(atom)
    }

    /// Look up an atom by identity with no attention side effects.
    ///
    /// Internal traversal (substitution, index plumbing) uses this so that
    /// mechanical reads do not distort the attention economy.
    pub fn peek(&self, id: &AtomId) -> Option<Arc<Atom>> {
        self.atoms.get(id).map(|a| Arc::clone(a.value()))
    }

    /// Whether an atom with this identity is tracked.
    pub fn contains(&self, id: &AtomId) -> bool {
        self.atoms.contains_key(id)
    }

    /// Current value of an atom, or the configured default if untracked.
    pub fn value_of(&self, id: &AtomId) -> AtomValue {
        self.values.get(id).map(|v| *v).unwrap_or_else(|| {
            AtomValue::initial(Truth::unknown(), &self.config, self.clock.now())
        })
    }

    /// Expression ids carrying the given relation tag.
    pub fn heads(&self, tag: &str) -> Vec<AtomId> {
        self.index.heads(tag)
    }

    /// Expression ids referencing the given atom as a child.
    pub fn referencing(&self, id: &AtomId) -> Vec<AtomId> {
        self.index.referencing(id)
    }

    /// Snapshot of all tracked atom ids.
    pub fn atom_ids(&self) -> Vec<AtomId> {
        self.atoms.iter().map(|e| e.key().clone()).collect()
    }

    /// Whether the atom (or any descendant) is a variable.
    pub fn contains_variable(&self, id: &AtomId) -> bool {
        let mut stack = vec![id.clone()];
        let mut visited = HashSet::new();
        while let Some(current) = stack.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }
            match self.peek(&current).as_deref() {
                Some(Atom::Variable(_)) => return true,
                Some(Atom::Expression(expr)) => stack.extend(expr.children.iter().cloned()),
                _ => {}
            }
        }
        false
    }

    // -----------------------------------------------------------------------
    // Value revision
    // -----------------------------------------------------------------------

    /// Atomically apply `updater` to the atom's value, re-stamping its access
    /// time. Returns the published value, or `None` if the atom is untracked.
    ///
    /// Uses optimistic retry on a per-atom revision counter: revising atom X
    /// never waits on a revision of atom Y, and a lost race re-reads and
    /// re-applies.
    pub fn revise_value<F>(&self, id: &AtomId, updater: F) -> Option<AtomValue>
    where
        F: Fn(&AtomValue) -> AtomValue,
    {
        self.cas_value(id, true, updater)
    }

    /// Merge evidence into an atom's truth and boost its importance.
    pub fn revise_truth(&self, id: &AtomId, truth: &Truth) -> Option<AtomValue> {
        self.cas_value(id, true, |v| AtomValue {
            truth: v.truth.revise(truth),
            importance: v.importance.boost(BoostEvent::Revision, &self.config),
            ..*v
        })
    }

    /// Apply an attention boost to an atom.
    pub fn boost(&self, id: &AtomId, event: BoostEvent) {
        self.cas_value(id, true, |v| AtomValue {
            importance: v.importance.boost(event, &self.config),
            ..*v
        });
    }

    /// Read-modify-compare-retry loop over the value table.
    ///
    /// `stamp` controls whether the access time is refreshed; the decay pass
    /// of the sweep keeps the old stamp so aging is observable.
    fn cas_value<F>(&self, id: &AtomId, stamp: bool, updater: F) -> Option<AtomValue>
    where
        F: Fn(&AtomValue) -> AtomValue,
    {
        loop {
            let seen = *self.values.get(id)?;
            let mut next = updater(&seen);
            next.revision = seen.revision.wrapping_add(1);
            next.accessed_at = if stamp {
                self.clock.now()
            } else {
                seen.accessed_at
            };
            match self.values.get_mut(id) {
                Some(mut current) if current.revision == seen.revision => {
                    *current = next;
                    return Some(next);
                }
                Some(_) => continue,
                None => return None,
            }
        }
    }

    // -----------------------------------------------------------------------
    // Query
    // -----------------------------------------------------------------------

    /// Unify a pattern against the store, returning every match with its
    /// bindings.
    ///
    /// Expression patterns go through the head index; symbol and grounded
    /// patterns are existence checks; a bare variable pattern scans everything.
    /// Candidates containing variables are skipped — stored rule shapes are
    /// matched by the chaining engine, not by data queries.
    pub fn query(&self, pattern: &Arc<Atom>) -> Vec<Answer> {
        let pid = pattern.identity();
        match pattern.as_ref() {
            Atom::Expression(expr) => {
                let mut answers = Vec::new();
                for cid in self.index.heads(&expr.tag) {
                    if cid == pid && self.contains_variable(&pid) {
                        continue; // the pattern itself, not a fact
                    }
                    if self.contains_variable(&cid) {
                        continue;
                    }
                    let Some(candidate) = self.peek(&cid) else {
                        continue;
                    };
                    if let Some(bindings) = unify(self, &pid, &cid, &Bindings::empty()) {
                        self.boost(&cid, BoostEvent::Access);
                        answers.push(Answer {
                            atom: candidate,
                            bindings,
                        });
                    }
                }
                answers
            }
            Atom::Variable(name) => {
                let mut answers = Vec::new();
                for cid in self.atom_ids() {
                    if cid == pid || self.contains_variable(&cid) {
                        continue;
                    }
                    let Some(candidate) = self.peek(&cid) else {
                        continue;
                    };
                    answers.push(Answer {
                        atom: candidate,
                        bindings: Bindings::empty().bind(name, &cid),
                    });
                }
                answers
            }
            _ => match self.get(&pid) {
                Some(atom) => vec![Answer {
                    atom,
                    bindings: Bindings::empty(),
                }],
                None => Vec::new(),
            },
        }
    }

    // -----------------------------------------------------------------------
    // Eviction
    // -----------------------------------------------------------------------

    /// Whether eviction must never remove this atom.
    pub fn is_protected(&self, atom: &Atom) -> bool {
        match atom {
            Atom::Variable(_) => true,
            Atom::Symbol(name) => self.config.protected_symbols.contains(name),
            _ => false,
        }
    }

    /// Decay all importances, then evict the lowest-scoring eligible atoms if
    /// a trigger fires.
    ///
    /// Self-exclusive: a sweep that finds another in progress returns
    /// immediately with `ran == false`. Ordinary traffic is never blocked
    /// beyond the per-atom critical sections.
    ///
    /// Triggers compose as follows: if the size exceeds the high-water mark,
    /// evict lowest-first down to `high_water * target_factor` regardless of
    /// the score floor; independently, if more than `low_score_fraction` of
    /// atoms score below the floor, every eligible below-floor atom is purged.
    pub fn eviction_sweep(&self, now: u64) -> SweepReport {
        if self
            .sweeping
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("eviction sweep already in progress, skipping");
            return SweepReport::skipped(self.size());
        }
        let report = self.sweep_inner(now);
        self.sweeping.store(false, Ordering::Release);
        report
    }

    fn sweep_inner(&self, now: u64) -> SweepReport {
        let size_before = self.size();
        let ids: Vec<AtomId> = self.values.iter().map(|e| e.key().clone()).collect();

        // Decay and score in parallel; the CAS loop keeps each update isolated
        // to its own atom.
        let mut scored: Vec<(AtomId, f32)> = ids
            .par_iter()
            .filter_map(|id| {
                let updated = self.cas_value(id, false, |v| AtomValue {
                    importance: v.importance.decay(&self.config, &mut rand::thread_rng()),
                    ..*v
                })?;
                Some((id.clone(), updated.eviction_score(now, &self.config)))
            })
            .collect();

        let examined = scored.len();
        let below_floor = scored
            .iter()
            .filter(|(_, score)| *score < self.config.score_floor)
            .count();

        let size_trigger = size_before > self.config.high_water;
        let floor_trigger = examined > 0
            && below_floor as f32 / examined as f32 > self.config.low_score_fraction;

        let mut evicted = 0;
        let mut protected_skipped = 0;
        let mut referenced_skipped = 0;

        if size_trigger || floor_trigger {
            let target = self.config.target_size();
            scored.sort_by(|a, b| a.1.total_cmp(&b.1));

            for (id, score) in scored {
                let over_target = size_trigger && self.size() > target;
                let below_floor_purge = floor_trigger && score < self.config.score_floor;
                if !over_target && !below_floor_purge {
                    break; // ascending order: nothing further is evictable
                }
                let Some(atom) = self.peek(&id) else {
                    continue;
                };
                // Protection is checked before removal, never repaired after.
                if self.is_protected(&atom) {
                    protected_skipped += 1;
                    continue;
                }
                if self.index.is_referenced(&id) {
                    referenced_skipped += 1;
                    continue;
                }
                self.evict(&id, &atom);
                evicted += 1;
            }
        }

        let report = SweepReport {
            ran: true,
            examined,
            below_floor,
            evicted,
            protected_skipped,
            referenced_skipped,
            size_before,
            size_after: self.size(),
        };
        tracing::info!(
            examined = report.examined,
            evicted = report.evicted,
            size = report.size_after,
            "eviction sweep complete"
        );
        report
    }

    /// Remove one atom from storage and both indices.
    fn evict(&self, id: &AtomId, atom: &Atom) {
        self.atoms.remove(id);
        if let Atom::Expression(expr) = atom {
            self.index.remove(id, expr);
        }
        self.values.remove(id);
        tracing::debug!(atom = %id, "evicted");
    }
}

impl std::fmt::Debug for AtomSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtomSpace")
            .field("atoms", &self.atoms.len())
            .field("tags", &self.index.tag_count())
            .finish()
    }
}
