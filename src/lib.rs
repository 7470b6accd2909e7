//! A pattern-driven tree-rewrite engine for optimizing ECMAScript-like
//! abstract syntax trees: constant folding, algebraic simplification, and a
//! handful of control-flow rewrites, all expressed as data rather than as
//! a hand-written pass per rule.
//!
//! # Examples
//!
//! Folding `3 + 4` to `7`:
//!
//! ```
//! use tree_rewrite::diagnostics::Diagnostics;
//! use tree_rewrite::node::{Arena, NodeKind};
//! use tree_rewrite::options::Options;
//!
//! let mut arena = Arena::new();
//! let add = arena.new_node(NodeKind::Add);
//! let lhs = arena.new_integer(3);
//! let rhs = arena.new_integer(4);
//! arena.append_child(add, lhs);
//! arena.append_child(add, rhs);
//!
//! // optimize() replaces a rewritten root in its parent slot, so the root
//! // passed in needs somewhere to attach the replacement; callers wrap the
//! // real program in a container node such as `Block`.
//! let program = arena.new_node(NodeKind::Block);
//! arena.append_child(program, add);
//!
//! let options = Options::new();
//! let mut diagnostics = Diagnostics::new();
//! let errors = tree_rewrite::optimize(&mut arena, program, &options, &mut diagnostics).unwrap();
//!
//! let result = arena.get_child(program, 0).unwrap();
//! assert_eq!(arena.get_type(result), NodeKind::Integer);
//! assert_eq!(arena.get_integer(result), Some(7));
//! assert_eq!(errors, 0);
//! ```
//!
//! # What this optimizes
//!
//! * Constant folding across the arithmetic, bitwise, logical, comparison,
//!   equality, and regex-match operators;
//! * A handful of algebraic simplifications (`x ** 0 => 1`, `x + 0 => x`
//!   behind an explicit unsafe gate, canonicalizing comparison operand
//!   order);
//! * Statement-level rewrites: `while (true)` to a bare `for (;;)`, a
//!   `do`-`while (false)` loop collapsing to its body, literal-branch
//!   `if`/`else` collapsing to a `Conditional` expression.
//!
//! Parsing is out of scope — the crate operates on an already-built tree
//! (see [`node::Arena`]).
mod driver;
mod matcher;
mod transform;

pub mod diagnostics;
pub mod node;
pub mod options;
pub mod rules;

pub use crate::driver::{optimize, InternalError};
