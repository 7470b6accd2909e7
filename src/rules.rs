//! The optimization catalogue, expressed as data.
//!
//! Mirrors the `as2js` optimizer's own split into per-category tables
//! (`optimizer_tables.cpp` links a dozen of these as read-only static
//! arrays); this crate keeps the same shape but collapses them into one
//! `RuleTable` built once behind a [`std::sync::LazyLock`]. Adding a rule
//! means adding one [`Rule`] literal to a category's `Vec` — no code
//! changes anywhere else.

use std::sync::LazyLock;

use thiserror::Error;

use crate::node::{AttributeSet, FlagSet, NodeKind};

/// One bit per "unsafe" gate a rule may require. See `options::Options`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SafetyFlags(u8);

impl SafetyFlags {
    pub const NONE: Self = Self(0);
    pub const UNSAFE_MATH: Self = Self(1 << 0);
    pub const UNSAFE_OBJECT: Self = Self(1 << 1);

    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[inline]
    pub fn requires_unsafe_math(self) -> bool {
        self.0 & Self::UNSAFE_MATH.0 != 0
    }

    #[inline]
    pub fn requires_unsafe_object(self) -> bool {
        self.0 & Self::UNSAFE_OBJECT.0 != 0
    }

    #[inline]
    pub fn is_unsafe(self) -> bool {
        self.0 != 0
    }
}

/// One of the disjoint predicates a [`MatchEntry`] may carry, per spec.md
/// §3's "Match Pattern" — exactly one of these, never a combination.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralConstraint {
    /// The candidate reports `has_side_effects() == false`.
    NoSideEffect,
    /// The candidate's string must equal another capture's string (when
    /// `index` is `Some`) or a literal string carried on the entry.
    IdentifierEquals {
        index: Option<usize>,
        literal: Option<&'static str>,
    },
    /// The candidate must be `Integer`/`FloatingPoint`; `(value & mask) ==
    /// expected`.
    MaskEquals { mask: i64, expected: i64 },
    LiteralEqualsInt(i64),
    LiteralEqualsFloat(f64),
    LiteralEqualsStr(&'static str),
    /// `to_boolean_type_only()` must be `true`.
    Truthy,
    /// `to_boolean_type_only()` must be `false`.
    Falsy,
}

/// One node, at a known depth, in a match pattern's depth-first
/// linearization. See spec.md §3.
#[derive(Debug, Clone)]
pub struct MatchEntry {
    pub depth: u8,
    /// When `false`, the matcher does not recurse under this entry even
    /// if the candidate node has children.
    pub has_children: bool,
    /// Empty means "any kind".
    pub node_kinds: &'static [NodeKind],
    pub literal_constraint: Option<LiteralConstraint>,
    pub attributes_constraint: Option<&'static [AttributeSet]>,
    pub flags_constraint: Option<&'static [FlagSet]>,
}

impl MatchEntry {
    pub const fn new(depth: u8, has_children: bool, node_kinds: &'static [NodeKind]) -> Self {
        Self {
            depth,
            has_children,
            node_kinds,
            literal_constraint: None,
            attributes_constraint: None,
            flags_constraint: None,
        }
    }

    pub const fn with_literal(mut self, constraint: LiteralConstraint) -> Self {
        self.literal_constraint = Some(constraint);
        self
    }

    pub const fn with_flags(mut self, flags: &'static [FlagSet]) -> Self {
        self.flags_constraint = Some(flags);
        self
    }

    pub const fn with_attributes(mut self, attributes: &'static [AttributeSet]) -> Self {
        self.attributes_constraint = Some(attributes);
        self
    }
}

pub type MatchPattern = &'static [MatchEntry];

/// Builds a `&'static [MatchEntry]` from terse `[depth, has_children,
/// kinds]` / `[depth, has_children, kinds, literal_constraint]` rows, so a
/// rule's pattern reads as the depth-first table spec.md §3 describes
/// instead of a wall of `MatchEntry::new(...).with_literal(...)` calls.
macro_rules! entries {
    ($([$depth:expr, $has_children:expr, $kinds:expr $(, $literal:expr)?]),* $(,)?) => {
        &[
            $(
                entries!(@entry $depth, $has_children, $kinds $(, $literal)?)
            ),*
        ]
    };
    (@entry $depth:expr, $has_children:expr, $kinds:expr) => {
        MatchEntry::new($depth, $has_children, $kinds)
    };
    (@entry $depth:expr, $has_children:expr, $kinds:expr, $literal:expr) => {
        MatchEntry::new($depth, $has_children, $kinds).with_literal($literal)
    };
}

/// One primitive of the transform bytecode. Indices are positions in the
/// capture array built by the matcher; index 0 is always the matched
/// subtree's root.
#[derive(Debug, Clone, Copy)]
pub enum TransformOp {
    Add { lhs: usize, rhs: usize, dest: usize },
    Subtract { lhs: usize, rhs: usize, dest: usize },
    Multiply { lhs: usize, rhs: usize, dest: usize },
    Divide { lhs: usize, rhs: usize, dest: usize },
    Modulo { lhs: usize, rhs: usize, dest: usize },
    Power { lhs: usize, rhs: usize, dest: usize },
    Negate { src: usize, dest: usize },

    BitwiseAnd { lhs: usize, rhs: usize, dest: usize },
    BitwiseOr { lhs: usize, rhs: usize, dest: usize },
    BitwiseXor { lhs: usize, rhs: usize, dest: usize },
    BitwiseNot { src: usize, dest: usize },
    ShiftLeft { lhs: usize, rhs: usize, dest: usize },
    ShiftRight { lhs: usize, rhs: usize, dest: usize },
    ShiftRightUnsigned { lhs: usize, rhs: usize, dest: usize },
    RotateLeft { lhs: usize, rhs: usize, dest: usize },
    RotateRight { lhs: usize, rhs: usize, dest: usize },

    LogicalNot { src: usize, dest: usize },
    LogicalXor { lhs: usize, rhs: usize, dest: usize },

    Concatenate { lhs: usize, rhs: usize, dest: usize },
    Compare { lhs: usize, rhs: usize, dest: usize },
    Equal { lhs: usize, rhs: usize, dest: usize },
    StrictlyEqual { lhs: usize, rhs: usize, dest: usize },
    Less { lhs: usize, rhs: usize, dest: usize },
    LessEqual { lhs: usize, rhs: usize, dest: usize },
    Match { lhs: usize, rhs: usize, dest: usize },
    SmartMatch { lhs: usize, rhs: usize, dest: usize },
    Maximum { lhs: usize, rhs: usize, dest: usize },
    Minimum { lhs: usize, rhs: usize, dest: usize },

    Move { src: usize, dest: usize },
    Swap { a: usize, b: usize },
    Remove { index: usize },
    SetInteger { index: usize, value: i64 },
    SetNodeType { index: usize, kind: NodeKind },
    ToConditional { cond: usize, then_branch: usize, else_branch: usize, dest: usize },
    ToInteger { index: usize },
    ToNumber { index: usize },
    WhileTrueToForever { src: usize, dest: usize },
}

pub type TransformProgram = &'static [TransformOp];

#[derive(Debug, Clone)]
pub struct Rule {
    pub name: &'static str,
    pub safety: SafetyFlags,
    pub pattern: MatchPattern,
    pub program: TransformProgram,
}

#[derive(Debug, Clone)]
pub struct RuleCategory {
    pub name: &'static str,
    pub rules: &'static [Rule],
}

#[derive(Debug, Default)]
pub struct RuleTable {
    pub categories: Vec<RuleCategory>,
}

impl RuleTable {
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.categories.iter().flat_map(|category| category.rules.iter())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuleTableError {
    #[error("rule {rule:?}: empty match pattern")]
    EmptyPattern { rule: &'static str },
    #[error("rule {rule:?}: entry {index} has depth {depth} which does not follow entry {index}-1's depth by +1/same/less")]
    BadDepthSequence {
        rule: &'static str,
        index: usize,
        depth: u8,
    },
    #[error("rule {rule:?}: entry 0 must have depth 0")]
    RootNotAtZero { rule: &'static str },
    #[error("rule {rule:?}: transform op {op_index} references capture {capture} but the pattern only has {len} entries")]
    CaptureOutOfBounds {
        rule: &'static str,
        op_index: usize,
        capture: usize,
        len: usize,
    },
}

/// Structural validator from spec.md §4.1, run once inside the table's
/// `LazyLock` initializer. A violation here is a build-time-class bug in
/// the rule table, so it panics rather than returning through `optimize`.
fn validate(category: &RuleCategory) -> Result<(), RuleTableError> {
    for rule in category.rules {
        validate_rule(rule)?;
    }
    Ok(())
}

fn validate_rule(rule: &Rule) -> Result<(), RuleTableError> {
    let pattern = rule.pattern;
    if pattern.is_empty() {
        return Err(RuleTableError::EmptyPattern { rule: rule.name });
    }
    if pattern[0].depth != 0 {
        return Err(RuleTableError::RootNotAtZero { rule: rule.name });
    }
    for index in 1..pattern.len() {
        let previous = pattern[index - 1].depth;
        let current = pattern[index].depth;
        let valid = current == previous || current == previous + 1 || current < previous;
        if !valid {
            return Err(RuleTableError::BadDepthSequence {
                rule: rule.name,
                index,
                depth: current,
            });
        }
    }

    for (op_index, op) in rule.program.iter().enumerate() {
        for capture in op_captures(op) {
            if capture >= pattern.len() {
                return Err(RuleTableError::CaptureOutOfBounds {
                    rule: rule.name,
                    op_index,
                    capture,
                    len: pattern.len(),
                });
            }
        }
    }
    Ok(())
}

/// Every capture-array index a transform op reads or writes, used by the
/// validator to bounds-check against the pattern's entry count.
fn op_captures(op: &TransformOp) -> Vec<usize> {
    use TransformOp::*;
    match *op {
        Add { lhs, rhs, dest }
        | Subtract { lhs, rhs, dest }
        | Multiply { lhs, rhs, dest }
        | Divide { lhs, rhs, dest }
        | Modulo { lhs, rhs, dest }
        | Power { lhs, rhs, dest }
        | BitwiseAnd { lhs, rhs, dest }
        | BitwiseOr { lhs, rhs, dest }
        | BitwiseXor { lhs, rhs, dest }
        | ShiftLeft { lhs, rhs, dest }
        | ShiftRight { lhs, rhs, dest }
        | ShiftRightUnsigned { lhs, rhs, dest }
        | RotateLeft { lhs, rhs, dest }
        | RotateRight { lhs, rhs, dest }
        | LogicalXor { lhs, rhs, dest }
        | Concatenate { lhs, rhs, dest }
        | Compare { lhs, rhs, dest }
        | Equal { lhs, rhs, dest }
        | StrictlyEqual { lhs, rhs, dest }
        | Less { lhs, rhs, dest }
        | LessEqual { lhs, rhs, dest }
        | Match { lhs, rhs, dest }
        | SmartMatch { lhs, rhs, dest }
        | Maximum { lhs, rhs, dest }
        | Minimum { lhs, rhs, dest } => vec![lhs, rhs, dest],
        Negate { src, dest } | BitwiseNot { src, dest } | LogicalNot { src, dest } | Move { src, dest } | WhileTrueToForever { src, dest } => {
            vec![src, dest]
        }
        Swap { a, b } => vec![a, b],
        Remove { index } | SetInteger { index, .. } | SetNodeType { index, .. } | ToInteger { index } | ToNumber { index } => {
            vec![index]
        }
        ToConditional { cond, then_branch, else_branch, dest } => vec![cond, then_branch, else_branch, dest],
    }
}

const NUMERIC: &[NodeKind] = &[NodeKind::Integer, NodeKind::FloatingPoint];
const ANY: &[NodeKind] = &[];
/// Every constant-foldable literal kind. Comparison/equality/logical rules
/// must restrict their operands to this set (rather than `ANY`): an
/// operand that isn't a literal may be an identifier, call, or other
/// side-effecting subtree, and folding one of those away changes program
/// behavior instead of just simplifying a constant.
const LITERAL: &[NodeKind] = &[
    NodeKind::Integer,
    NodeKind::FloatingPoint,
    NodeKind::String,
    NodeKind::True,
    NodeKind::False,
    NodeKind::Null,
    NodeKind::Undefined,
];

static ADDITIVE_RULES: &[Rule] = &[
    Rule {
        name: "fold_add_literals",
        safety: SafetyFlags::NONE,
        pattern: entries![[0, true, &[NodeKind::Add]], [1, false, NUMERIC], [1, false, NUMERIC]],
        program: &[TransformOp::Add { lhs: 1, rhs: 2, dest: 0 }],
    },
    Rule {
        name: "fold_subtract_literals",
        safety: SafetyFlags::NONE,
        pattern: entries![[0, true, &[NodeKind::Subtract]], [1, false, NUMERIC], [1, false, NUMERIC]],
        program: &[TransformOp::Subtract { lhs: 1, rhs: 2, dest: 0 }],
    },
    Rule {
        // `x + 0 => x`. Only safe when `x` cannot be a string (string + 0
        // concatenates) or an object with a custom `valueOf`/`toString`;
        // gated behind `unsafe-object` per spec.md's L1 and §9's Open
        // Question resolution (treat any possibly-object operand as
        // disqualifying until a typed front-end exists).
        name: "eliminate_add_zero",
        safety: SafetyFlags::UNSAFE_OBJECT,
        pattern: entries![
            [0, true, &[NodeKind::Add]],
            [1, false, ANY],
            [1, false, &[NodeKind::Integer], LiteralConstraint::LiteralEqualsInt(0)],
        ],
        program: &[TransformOp::Move { src: 1, dest: 0 }],
    },
    Rule {
        // `true/false + Integer` folds once the boolean operand is
        // promoted, exercising TO_INTEGER.
        name: "promote_boolean_then_add",
        safety: SafetyFlags::NONE,
        pattern: entries![
            [0, true, &[NodeKind::Add]],
            [1, false, &[NodeKind::True, NodeKind::False]],
            [1, false, &[NodeKind::Integer]],
        ],
        program: &[TransformOp::ToInteger { index: 1 }, TransformOp::Add { lhs: 1, rhs: 2, dest: 0 }],
    },
];

static MULTIPLICATIVE_RULES: &[Rule] = &[
    Rule {
        name: "fold_multiply_literals",
        safety: SafetyFlags::NONE,
        pattern: entries![[0, true, &[NodeKind::Multiply]], [1, false, NUMERIC], [1, false, NUMERIC]],
        program: &[TransformOp::Multiply { lhs: 1, rhs: 2, dest: 0 }],
    },
    Rule {
        name: "fold_divide_literals",
        safety: SafetyFlags::NONE,
        pattern: entries![[0, true, &[NodeKind::Divide]], [1, false, NUMERIC], [1, false, NUMERIC]],
        program: &[TransformOp::Divide { lhs: 1, rhs: 2, dest: 0 }],
    },
    Rule {
        name: "fold_modulo_literals",
        safety: SafetyFlags::NONE,
        pattern: entries![[0, true, &[NodeKind::Modulo]], [1, false, NUMERIC], [1, false, NUMERIC]],
        program: &[TransformOp::Modulo { lhs: 1, rhs: 2, dest: 0 }],
    },
    Rule {
        name: "fold_power_literals",
        safety: SafetyFlags::NONE,
        pattern: entries![[0, true, &[NodeKind::Power]], [1, false, NUMERIC], [1, false, NUMERIC]],
        program: &[TransformOp::Power { lhs: 1, rhs: 2, dest: 0 }],
    },
    Rule {
        // `x ** 0 => 1` for side-effect-free `x`. Reuses the already-`Integer`
        // exponent node in place (SET_INTEGER) instead of allocating a new
        // literal, then promotes it to the root (MOVE).
        name: "power_of_zero_exponent_is_one",
        safety: SafetyFlags::NONE,
        pattern: entries![
            [0, true, &[NodeKind::Power]],
            [1, false, ANY, LiteralConstraint::NoSideEffect],
            [1, false, &[NodeKind::Integer], LiteralConstraint::LiteralEqualsInt(0)],
        ],
        program: &[TransformOp::SetInteger { index: 2, value: 1 }, TransformOp::Move { src: 2, dest: 0 }],
    },
    Rule {
        name: "fold_negate_literal",
        safety: SafetyFlags::NONE,
        pattern: entries![[0, true, &[NodeKind::Negate]], [1, false, NUMERIC]],
        program: &[TransformOp::Negate { src: 1, dest: 0 }],
    },
];

static BITWISE_RULES: &[Rule] = &[
    Rule {
        name: "fold_bitwise_and_literals",
        safety: SafetyFlags::NONE,
        pattern: entries![[0, true, &[NodeKind::BitwiseAnd]], [1, false, NUMERIC], [1, false, NUMERIC]],
        program: &[TransformOp::BitwiseAnd { lhs: 1, rhs: 2, dest: 0 }],
    },
    Rule {
        // Demonstrates `mask-equals`: the right operand is `1` and the
        // left is a statically-known-even literal (low bit clear), so the
        // AND is always zero without needing a full bitwise evaluation.
        // (General `Integer & Integer` is still covered by
        // `fold_bitwise_and_literals`, which never gets a chance to run
        // here since this rule, listed first, already rewrote the node.)
        name: "and_with_one_of_even_literal_is_zero",
        safety: SafetyFlags::NONE,
        pattern: entries![
            [0, true, &[NodeKind::BitwiseAnd]],
            [1, false, &[NodeKind::Integer], LiteralConstraint::MaskEquals { mask: 1, expected: 0 }],
            [1, false, &[NodeKind::Integer], LiteralConstraint::LiteralEqualsInt(1)],
        ],
        program: &[TransformOp::SetInteger { index: 1, value: 0 }, TransformOp::Move { src: 1, dest: 0 }],
    },
    Rule {
        name: "fold_bitwise_or_literals",
        safety: SafetyFlags::NONE,
        pattern: entries![[0, true, &[NodeKind::BitwiseOr]], [1, false, NUMERIC], [1, false, NUMERIC]],
        program: &[TransformOp::BitwiseOr { lhs: 1, rhs: 2, dest: 0 }],
    },
    Rule {
        name: "fold_bitwise_xor_literals",
        safety: SafetyFlags::NONE,
        pattern: entries![[0, true, &[NodeKind::BitwiseXor]], [1, false, NUMERIC], [1, false, NUMERIC]],
        program: &[TransformOp::BitwiseXor { lhs: 1, rhs: 2, dest: 0 }],
    },
    Rule {
        name: "fold_bitwise_not_literal",
        safety: SafetyFlags::NONE,
        pattern: entries![[0, true, &[NodeKind::BitwiseNot]], [1, false, NUMERIC]],
        program: &[TransformOp::BitwiseNot { src: 1, dest: 0 }],
    },
    Rule {
        name: "fold_shift_left_literals",
        safety: SafetyFlags::NONE,
        pattern: entries![[0, true, &[NodeKind::ShiftLeft]], [1, false, NUMERIC], [1, false, NUMERIC]],
        program: &[TransformOp::ShiftLeft { lhs: 1, rhs: 2, dest: 0 }],
    },
    Rule {
        name: "fold_shift_right_literals",
        safety: SafetyFlags::NONE,
        pattern: entries![[0, true, &[NodeKind::ShiftRight]], [1, false, NUMERIC], [1, false, NUMERIC]],
        program: &[TransformOp::ShiftRight { lhs: 1, rhs: 2, dest: 0 }],
    },
    Rule {
        name: "fold_shift_right_unsigned_literals",
        safety: SafetyFlags::NONE,
        pattern: entries![[0, true, &[NodeKind::ShiftRightUnsigned]], [1, false, NUMERIC], [1, false, NUMERIC]],
        program: &[TransformOp::ShiftRightUnsigned { lhs: 1, rhs: 2, dest: 0 }],
    },
    Rule {
        name: "fold_rotate_left_literals",
        safety: SafetyFlags::NONE,
        pattern: entries![[0, true, &[NodeKind::RotateLeft]], [1, false, NUMERIC], [1, false, NUMERIC]],
        program: &[TransformOp::RotateLeft { lhs: 1, rhs: 2, dest: 0 }],
    },
    Rule {
        name: "fold_rotate_right_literals",
        safety: SafetyFlags::NONE,
        pattern: entries![[0, true, &[NodeKind::RotateRight]], [1, false, NUMERIC], [1, false, NUMERIC]],
        program: &[TransformOp::RotateRight { lhs: 1, rhs: 2, dest: 0 }],
    },
];

static LOGICAL_RULES: &[Rule] = &[
    Rule {
        // Restricted to literal operands: a non-literal (e.g. a `Call`)
        // may carry a side effect that folding away would discard.
        name: "fold_logical_not_literal",
        safety: SafetyFlags::NONE,
        pattern: entries![[0, true, &[NodeKind::LogicalNot]], [1, false, LITERAL]],
        program: &[TransformOp::LogicalNot { src: 1, dest: 0 }],
    },
    Rule {
        name: "fold_logical_xor_literals",
        safety: SafetyFlags::NONE,
        pattern: entries![[0, true, &[NodeKind::LogicalXor]], [1, false, LITERAL], [1, false, LITERAL]],
        program: &[TransformOp::LogicalXor { lhs: 1, rhs: 2, dest: 0 }],
    },
];

static COMPARISON_RULES: &[Rule] = &[
    Rule {
        name: "fold_compare_literals",
        safety: SafetyFlags::NONE,
        pattern: entries![[0, true, &[NodeKind::Compare]], [1, false, LITERAL], [1, false, LITERAL]],
        program: &[TransformOp::Compare { lhs: 1, rhs: 2, dest: 0 }],
    },
    Rule {
        name: "fold_less_literals",
        safety: SafetyFlags::NONE,
        pattern: entries![[0, true, &[NodeKind::Less]], [1, false, LITERAL], [1, false, LITERAL]],
        program: &[TransformOp::Less { lhs: 1, rhs: 2, dest: 0 }],
    },
    Rule {
        name: "fold_less_equal_literals",
        safety: SafetyFlags::NONE,
        pattern: entries![[0, true, &[NodeKind::LessEqual]], [1, false, LITERAL], [1, false, LITERAL]],
        program: &[TransformOp::LessEqual { lhs: 1, rhs: 2, dest: 0 }],
    },
    Rule {
        // Demonstrates SWAP: canonicalize `literal == identifier` to
        // `identifier == literal`, hoisting the literal to the right like
        // most compilers canonicalize commutative comparisons. Purely
        // syntactic, so no safety gate is needed.
        name: "normalize_equal_operand_order",
        safety: SafetyFlags::NONE,
        pattern: entries![
            [0, true, &[NodeKind::Equal]],
            [1, false, &[NodeKind::Integer, NodeKind::FloatingPoint, NodeKind::String]],
            [1, false, &[NodeKind::Identifier]],
        ],
        program: &[TransformOp::Swap { a: 1, b: 2 }],
    },
];

static EQUALITY_RULES: &[Rule] = &[
    Rule {
        name: "fold_equal_literals",
        safety: SafetyFlags::NONE,
        pattern: entries![[0, true, &[NodeKind::Equal]], [1, false, LITERAL], [1, false, LITERAL]],
        program: &[TransformOp::Equal { lhs: 1, rhs: 2, dest: 0 }],
    },
    Rule {
        name: "fold_strictly_equal_literals",
        safety: SafetyFlags::NONE,
        pattern: entries![[0, true, &[NodeKind::StrictlyEqual]], [1, false, LITERAL], [1, false, LITERAL]],
        program: &[TransformOp::StrictlyEqual { lhs: 1, rhs: 2, dest: 0 }],
    },
    Rule {
        // Demonstrates TO_NUMBER: normalize a whole-valued float operand
        // before the strict-equality fold. `FloatingPoint` is always
        // convertible, so this can never hit the "coercion that the match
        // pattern should have prevented" internal-error case (I3).
        name: "strictly_equal_normalizes_whole_float",
        safety: SafetyFlags::NONE,
        pattern: entries![
            [0, true, &[NodeKind::StrictlyEqual]],
            [1, false, &[NodeKind::Integer]],
            [1, false, &[NodeKind::FloatingPoint]],
        ],
        program: &[TransformOp::ToNumber { index: 2 }, TransformOp::StrictlyEqual { lhs: 1, rhs: 2, dest: 0 }],
    },
];

static MATCH_RULES: &[Rule] = &[
    Rule {
        // `"a" + "b" => "ab"`. Both operands restricted to literals for the
        // same reason as the comparison/equality/logical rules above: a
        // non-literal operand may carry a side effect.
        name: "fold_concatenate_literals",
        safety: SafetyFlags::NONE,
        pattern: entries![[0, true, &[NodeKind::Concatenate]], [1, false, LITERAL], [1, false, LITERAL]],
        program: &[TransformOp::Concatenate { lhs: 1, rhs: 2, dest: 0 }],
    },
    Rule {
        name: "fold_match_literal_regex",
        safety: SafetyFlags::NONE,
        pattern: entries![[0, true, &[NodeKind::Match]], [1, false, &[NodeKind::String]], [1, false, &[NodeKind::String]]],
        program: &[TransformOp::Match { lhs: 1, rhs: 2, dest: 0 }],
    },
    Rule {
        name: "fold_smart_match_literal_strings",
        safety: SafetyFlags::NONE,
        pattern: entries![[0, true, &[NodeKind::SmartMatch]], [1, false, &[NodeKind::String]], [1, false, &[NodeKind::String]]],
        program: &[TransformOp::SmartMatch { lhs: 1, rhs: 2, dest: 0 }],
    },
];

static BUILTIN_CALL_RULES: &[Rule] = &[
    Rule {
        // `Math.max(<int-or-float literal>, <int-or-float literal>)`.
        // Demonstrates `identifier-equals` against a fixed literal name.
        name: "fold_math_max_call",
        safety: SafetyFlags::NONE,
        pattern: entries![
            [0, true, &[NodeKind::Call]],
            [1, false, &[NodeKind::Identifier], LiteralConstraint::IdentifierEquals { index: None, literal: Some("Math.max") }],
            [1, true, &[NodeKind::List]],
            [2, false, NUMERIC],
            [2, false, NUMERIC],
        ],
        program: &[TransformOp::Maximum { lhs: 3, rhs: 4, dest: 0 }],
    },
    Rule {
        name: "fold_math_min_call",
        safety: SafetyFlags::NONE,
        pattern: entries![
            [0, true, &[NodeKind::Call]],
            [1, false, &[NodeKind::Identifier], LiteralConstraint::IdentifierEquals { index: None, literal: Some("Math.min") }],
            [1, true, &[NodeKind::List]],
            [2, false, NUMERIC],
            [2, false, NUMERIC],
        ],
        program: &[TransformOp::Minimum { lhs: 3, rhs: 4, dest: 0 }],
    },
];

static STATEMENT_RULES: &[Rule] = &[
    Rule {
        name: "while_true_to_forever",
        safety: SafetyFlags::NONE,
        pattern: entries![
            [0, true, &[NodeKind::While]],
            [1, false, &[NodeKind::True]],
            [1, false, &[NodeKind::Block]],
        ],
        program: &[TransformOp::WhileTrueToForever { src: 2, dest: 0 }],
    },
    Rule {
        // `do { body } while (false)` runs `body` exactly once;
        // demonstrates REMOVE (drop the dead condition) followed by
        // SET_NODE_TYPE (retag the node as a plain `Block` around the
        // remaining child).
        name: "do_while_false_runs_once",
        safety: SafetyFlags::NONE,
        pattern: entries![
            [0, true, &[NodeKind::DoWhile]],
            [1, false, &[NodeKind::Block]],
            [1, false, ANY, LiteralConstraint::Falsy],
        ],
        program: &[TransformOp::Remove { index: 2 }, TransformOp::SetNodeType { index: 0, kind: NodeKind::Block }],
    },
    Rule {
        // `if (cond) { literalA } else { literalB }` with side-effect-free
        // literal branches becomes a `Conditional` expression.
        name: "if_literal_branches_to_conditional",
        safety: SafetyFlags::NONE,
        pattern: entries![
            [0, true, &[NodeKind::If]],
            [1, false, ANY, LiteralConstraint::NoSideEffect],
            [1, false, ANY, LiteralConstraint::NoSideEffect],
            [1, false, ANY, LiteralConstraint::NoSideEffect],
        ],
        program: &[TransformOp::ToConditional { cond: 1, then_branch: 2, else_branch: 3, dest: 0 }],
    },
];

pub static RULES: LazyLock<RuleTable> = LazyLock::new(|| {
    let categories = vec![
        RuleCategory { name: "additive", rules: ADDITIVE_RULES },
        RuleCategory { name: "multiplicative", rules: MULTIPLICATIVE_RULES },
        RuleCategory { name: "bitwise", rules: BITWISE_RULES },
        RuleCategory { name: "logical", rules: LOGICAL_RULES },
        RuleCategory { name: "comparison", rules: COMPARISON_RULES },
        RuleCategory { name: "equality", rules: EQUALITY_RULES },
        RuleCategory { name: "match", rules: MATCH_RULES },
        RuleCategory { name: "builtin_call", rules: BUILTIN_CALL_RULES },
        RuleCategory { name: "statement", rules: STATEMENT_RULES },
    ];
    for category in &categories {
        validate(category).unwrap_or_else(|error| panic!("invalid rule table: {error}"));
    }
    RuleTable { categories }
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_table_builds_and_validates() {
        let table = &*RULES;
        assert!(table.rules().count() > 20);
    }

    #[test]
    fn every_rule_name_is_unique() {
        let mut names: Vec<&str> = RULES.rules().map(|rule| rule.name).collect();
        names.sort_unstable();
        let mut deduped = names.clone();
        deduped.dedup();
        assert_eq!(names.len(), deduped.len());
    }

    #[test]
    fn bad_depth_sequence_is_rejected() {
        let pattern: MatchPattern = entries![[0, true, ANY], [2, false, ANY]];
        let rule = Rule {
            name: "bad",
            safety: SafetyFlags::NONE,
            pattern,
            program: &[],
        };
        assert_eq!(
            validate_rule(&rule),
            Err(RuleTableError::BadDepthSequence { rule: "bad", index: 1, depth: 2 })
        );
    }

    #[test]
    fn out_of_bounds_capture_is_rejected() {
        let pattern: MatchPattern = entries![[0, true, ANY], [1, false, ANY]];
        let rule = Rule {
            name: "bad_capture",
            safety: SafetyFlags::NONE,
            pattern,
            program: &[TransformOp::Move { src: 1, dest: 5 }],
        };
        assert_eq!(
            validate_rule(&rule),
            Err(RuleTableError::CaptureOutOfBounds { rule: "bad_capture", op_index: 0, capture: 5, len: 2 })
        );
    }
}
