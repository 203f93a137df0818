//! # heka
//!
//! An in-memory, concurrently-accessed symbolic knowledge base: typed atoms
//! with truth and attention values, pattern-matching queries, forward- and
//! backward-chaining inference, and importance-weighted forgetting.
//!
//! ## Architecture
//!
//! - **Atoms** (`atom`): hash-consed Symbol / Variable / Expression / Grounded
//! - **Values** (`truth`, `attention`): (strength, evidence) truth with
//!   Bayesian revision; STI/LTI attention driving eviction
//! - **Atom space** (`space`): canonicalizing concurrent store with head-tag
//!   and reverse-target indices, optimistic value revision, eviction sweeps
//! - **Unifier** (`unify`): worklist-based structural matching with bindings
//! - **Chaining** (`chain`): priority-queued forward derivation; goal-directed
//!   backward resolution and planning
//! - **Maintenance** (`maintenance`): host-owned periodic forgetting driver
//!
//! ## Library usage
//!
//! ```
//! use heka::config::SpaceConfig;
//! use heka::space::AtomSpace;
//! use heka::truth::Truth;
//!
//! let space = AtomSpace::new(SpaceConfig::default()).unwrap();
//! let cat = space.sym("Cat").unwrap();
//! let mammal = space.sym("Mammal").unwrap();
//! let fact = space.expr("Inheritance", &[cat, mammal]).unwrap();
//! space.add((*fact).clone(), Truth::new(0.9, 20.0));
//!
//! let x = space.var("$x").unwrap();
//! let cat = space.sym("Cat").unwrap();
//! let pattern = space.expr("Inheritance", &[cat, x]).unwrap();
//! assert_eq!(space.query(&pattern).len(), 1);
//! ```

pub mod atom;
pub mod attention;
pub mod chain;
pub mod clock;
pub mod config;
pub mod error;
pub mod maintenance;
pub mod space;
pub mod truth;
pub mod unify;
