//! # dd-rs: Reorderable Decision Diagrams in Rust
//!
//! **`dd-rs`** is a manager-centric library for **Binary Decision Diagrams (BDDs)**
//! and **Algebraic Decision Diagrams (ADDs)** with dynamic variable reordering.
//!
//! ## What is a decision diagram?
//!
//! A BDD represents a boolean function as a directed acyclic graph whose inner
//! nodes test one variable each. For a fixed variable order it is **canonical**:
//! equal functions are the same node, so equivalence is a handle comparison.
//! An ADD is the same structure with arbitrary numeric terminals.
//!
//! The size of a diagram depends heavily on the order of its variables. The
//! manager can change that order at any time while every handle held by the
//! client keeps denoting the same function.
//!
//! ## Key Features
//!
//! - **Manager-Centric Architecture**: every node lives in one [`Manager`]. It
//!   owns the per-level unique subtables, the computed cache, the garbage
//!   collector and the reordering machinery.
//! - **Complemented edges**: negation is free and `f` and `¬f` share all nodes.
//! - **Explicit reference counting**: results come back held; call
//!   [`Manager::release`] when done. Dead nodes are reclaimed lazily.
//! - **Dynamic reordering**: sifting and its converging, symmetric, group
//!   and linear variants, window permutation, random swapping, simulated
//!   annealing, a genetic search and exact reordering. See [`reorder`].
//! - **Automatic reordering** triggered by diagram growth, with hooks around
//!   every reordering and garbage collection.
//!
//! ## Basic Usage
//!
//! ```rust
//! use dd_rs::Manager;
//!
//! let mut mgr = Manager::new(3);
//! let (x0, x1, x2) = (mgr.var(0), mgr.var(1), mgr.var(2));
//!
//! // f = (x0 AND x1) OR x2
//! let a = mgr.and(x0, x1).unwrap();
//! let f = mgr.or(a, x2).unwrap();
//! mgr.release(a);
//!
//! assert!(mgr.eval(f, &[true, true, false]));
//! assert!(!mgr.eval(f, &[true, false, false]));
//!
//! // Negation is a complemented edge.
//! let g = mgr.not(f);
//! assert!(mgr.eval(g, &[false, false, false]));
//! mgr.release(g);
//! mgr.release(f);
//! ```
//!
//! ## Reordering
//!
//! ```rust
//! use dd_rs::{Manager, ReorderMethod};
//!
//! let mut mgr = Manager::new(6);
//! // (x0 ∧ x3) ∨ (x1 ∧ x4) ∨ (x2 ∧ x5): exponential in this order.
//! let mut f = mgr.zero();
//! for i in 0..3u32 {
//!     let t = mgr.and(mgr.var(i), mgr.var(i + 3)).unwrap();
//!     let g = mgr.or(f, t).unwrap();
//!     mgr.release(t);
//!     mgr.release(f);
//!     f = g;
//! }
//! let stats = mgr.reduce_heap(ReorderMethod::Sift, 0).unwrap();
//! assert!(stats.final_size < stats.initial_size);
//! mgr.release(f);
//! ```
//!
//! ## Core Components
//!
//! - **[`manager`]**: the [`Manager`] and its statistics and hooks.
//! - **[`bdd`]** / **[`add`]**: boolean and algebraic operations.
//! - **[`reorder`]**: the swap primitive and every reordering heuristic.
//! - **[`unique`]**, **[`subtable`]**, **[`gc`]**: node creation, hashing and
//!   reclamation.
//! - **[`debug`]**: consistency checks and dumps.

pub mod add;
pub mod bdd;
pub mod bitset;
pub mod cache;
pub mod config;
pub mod debug;
pub mod error;
pub mod gc;
pub mod interact;
pub mod manager;
pub mod node;
pub mod reference;
pub mod reorder;
pub mod storage;
pub mod subtable;
pub mod types;
pub mod unique;

pub use add::AddOp;
pub use config::ManagerConfig;
pub use error::{DdError, Result};
pub use manager::{Hook, HookInfo, HookKind, Manager};
pub use reference::Ref;
pub use reorder::{GroupCheck, ReorderMethod, ReorderStats};
pub use types::{Level, Var};
