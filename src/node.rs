//! The external Node API the rewrite engine is written against.
//!
//! Mirrors the shape spec'd for the front-end's node module: a closed kind
//! enum, flags/attributes whose legal domain depends on the kind, literal
//! payload with coercions, and parent/child tree edits. Nodes live in a
//! single owning [`Arena`]; a node never owns its parent, it only knows the
//! parent's [`NodeId`] and its own offset in the parent's child list.

use std::fmt;

use slab::Slab;
use thiserror::Error;

pub type NodeId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Sentinel used to mark nodes pending removal by [`Arena::clean_tree`].
    Unknown,
    Empty,

    Integer,
    FloatingPoint,
    String,
    True,
    False,
    Null,
    Undefined,
    Identifier,

    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
    Negate,

    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    BitwiseNot,
    ShiftLeft,
    ShiftRight,
    ShiftRightUnsigned,
    RotateLeft,
    RotateRight,

    LogicalNot,
    LogicalAnd,
    LogicalOr,
    LogicalXor,

    Compare,
    Equal,
    NotEqual,
    StrictlyEqual,
    StrictlyNotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,

    Concatenate,
    Match,
    SmartMatch,

    Conditional,

    Block,
    If,
    While,
    DoWhile,
    For,
    Throw,
    Call,
    List,
}

impl NodeKind {
    #[inline]
    pub const fn is_literal(self) -> bool {
        matches!(
            self,
            Self::Integer
                | Self::FloatingPoint
                | Self::String
                | Self::True
                | Self::False
                | Self::Null
                | Self::Undefined
        )
    }
}

/// Comparison modes corresponding to the source language's `===`, `==` and
/// a smart-match semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareMode {
    Strict,
    Loose,
    Smart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonResult {
    Less,
    Equal,
    Greater,
    /// Operands were ordered but uncomparable under the requested mode
    /// (e.g. NaN).
    Unordered,
    /// Comparing values of incompatible kinds (e.g. string against a list).
    Error,
    /// The candidate's own coercion yields the "undefined" literal.
    Undefined,
}

/// A single flag bit. The legal set of flags for a given [`NodeKind`] is
/// determined by rule authors, not enforced here (matches the front-end
/// contract spec'd for the external node module).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flag {
    Const,
    Defined,
    Foreach,
    Forever,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct FlagSet(u32);

impl FlagSet {
    pub const EMPTY: Self = Self(0);

    #[inline]
    pub const fn bit(flag: Flag) -> u32 {
        1 << (flag as u32)
    }

    #[inline]
    pub fn set(&mut self, flag: Flag) {
        self.0 |= Self::bit(flag);
    }

    #[inline]
    pub fn clear(&mut self, flag: Flag) {
        self.0 &= !Self::bit(flag);
    }

    #[inline]
    pub fn has(&self, flag: Flag) -> bool {
        self.0 & Self::bit(flag) != 0
    }

    pub fn from_flags(flags: &[Flag]) -> Self {
        let mut set = Self::EMPTY;
        for &flag in flags {
            set.set(flag);
        }
        set
    }
}

/// A single attribute bit (visibility, linkage, deprecation, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    Public,
    Private,
    Protected,
    Static,
    Final,
    Abstract,
    Deprecated,
    Unused,
    Enumerable,
    Foreach,
    Native,
    Dynamic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct AttributeSet(u32);

impl AttributeSet {
    pub const EMPTY: Self = Self(0);

    #[inline]
    pub const fn bit(attribute: Attribute) -> u32 {
        1 << (attribute as u32)
    }

    #[inline]
    pub fn set(&mut self, attribute: Attribute) {
        self.0 |= Self::bit(attribute);
    }

    #[inline]
    pub fn has(&self, attribute: Attribute) -> bool {
        self.0 & Self::bit(attribute) != 0
    }

    pub fn from_attributes(attributes: &[Attribute]) -> Self {
        let mut set = Self::EMPTY;
        for &attribute in attributes {
            set.set(attribute);
        }
        set
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, PartialEq)]
enum Literal {
    None,
    Integer(i64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    literal: Literal,
    flags: FlagSet,
    attributes: AttributeSet,
    parent: Option<NodeId>,
    offset: usize,
    children: Vec<NodeId>,
    position: Position,
}

impl NodeData {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            literal: Literal::None,
            flags: FlagSet::EMPTY,
            attributes: AttributeSet::EMPTY,
            parent: None,
            offset: 0,
            children: Vec::new(),
            position: Position::default(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NodeError {
    #[error("node {0} has no parent")]
    NoParent(NodeId),
    #[error("index {index} out of bounds for node {node} with {len} children")]
    OutOfBounds {
        node: NodeId,
        index: usize,
        len: usize,
    },
    #[error("cannot coerce {kind:?} node to a number")]
    NotCoercible { kind: NodeKind },
}

/// The AST arena. Every [`NodeId`] handed out by a given `Arena` is only
/// valid against that same arena.
#[derive(Debug, Default)]
pub struct Arena {
    nodes: Slab<NodeData>,
}

impl Arena {
    pub fn new() -> Self {
        Self { nodes: Slab::new() }
    }

    #[inline]
    pub fn new_node(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.insert(NodeData::new(kind))
    }

    pub fn new_integer(&mut self, value: i64) -> NodeId {
        let id = self.new_node(NodeKind::Integer);
        self.set_integer(id, value);
        id
    }

    pub fn new_float(&mut self, value: f64) -> NodeId {
        let id = self.new_node(NodeKind::FloatingPoint);
        self.set_floating_point(id, value);
        id
    }

    pub fn new_string(&mut self, value: impl Into<String>) -> NodeId {
        let id = self.new_node(NodeKind::String);
        self.set_string(id, value.into());
        id
    }

    #[inline]
    pub fn get_type(&self, id: NodeId) -> NodeKind {
        self.nodes[id].kind
    }

    #[inline]
    pub fn set_type(&mut self, id: NodeId, kind: NodeKind) {
        self.nodes[id].kind = kind;
    }

    #[inline]
    pub fn get_position(&self, id: NodeId) -> Position {
        self.nodes[id].position
    }

    #[inline]
    pub fn set_position(&mut self, id: NodeId, position: Position) {
        self.nodes[id].position = position;
    }

    // -- literal accessors ---------------------------------------------

    pub fn get_integer(&self, id: NodeId) -> Option<i64> {
        match self.nodes[id].literal {
            Literal::Integer(value) => Some(value),
            _ => None,
        }
    }

    pub fn set_integer(&mut self, id: NodeId, value: i64) {
        self.nodes[id].literal = Literal::Integer(value);
    }

    pub fn get_floating_point(&self, id: NodeId) -> Option<f64> {
        match self.nodes[id].literal {
            Literal::Float(value) => Some(value),
            _ => None,
        }
    }

    pub fn set_floating_point(&mut self, id: NodeId, value: f64) {
        self.nodes[id].literal = Literal::Float(value);
    }

    pub fn get_string(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id].literal {
            Literal::Str(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn set_string(&mut self, id: NodeId, value: impl Into<String>) {
        self.nodes[id].literal = Literal::Str(value.into());
    }

    pub fn get_boolean(&self, id: NodeId) -> Option<bool> {
        match self.nodes[id].kind {
            NodeKind::True => Some(true),
            NodeKind::False => Some(false),
            _ => None,
        }
    }

    pub fn set_boolean(&mut self, id: NodeId, value: bool) {
        self.nodes[id].kind = if value { NodeKind::True } else { NodeKind::False };
    }

    // -- coercions --------------------------------------------------------

    /// Coerce the node's value to an integer using the source language's
    /// ToInt32-like rules: floats truncate toward zero, NaN/Infinity become
    /// 0, strings that parse as integers convert, booleans are 0/1.
    pub fn to_integer(&self, id: NodeId) -> Result<i64, NodeError> {
        match self.nodes[id].kind {
            NodeKind::Integer => Ok(self.get_integer(id).unwrap()),
            NodeKind::FloatingPoint => {
                let value = self.get_floating_point(id).unwrap();
                Ok(if value.is_finite() { value as i64 } else { 0 })
            }
            NodeKind::True => Ok(1),
            NodeKind::False => Ok(0),
            NodeKind::String => self
                .get_string(id)
                .unwrap()
                .trim()
                .parse::<i64>()
                .map_err(|_| NodeError::NotCoercible {
                    kind: NodeKind::String,
                }),
            kind => Err(NodeError::NotCoercible { kind }),
        }
    }

    /// Coerce to a double; NaN is represented as `f64::NAN` and must be
    /// compared with [`f64::is_nan`], never `==`.
    pub fn to_floating_point(&self, id: NodeId) -> Result<f64, NodeError> {
        match self.nodes[id].kind {
            NodeKind::Integer => Ok(self.get_integer(id).unwrap() as f64),
            NodeKind::FloatingPoint => Ok(self.get_floating_point(id).unwrap()),
            NodeKind::True => Ok(1.0),
            NodeKind::False => Ok(0.0),
            NodeKind::String => Ok(self
                .get_string(id)
                .unwrap()
                .trim()
                .parse::<f64>()
                .unwrap_or(f64::NAN)),
            NodeKind::Null => Ok(0.0),
            NodeKind::Undefined => Ok(f64::NAN),
            kind => Err(NodeError::NotCoercible { kind }),
        }
    }

    /// `to_number`: integer when the literal is exactly representable and
    /// has no fractional part, otherwise floating point. Used by
    /// `TO_NUMBER`.
    pub fn to_number_is_integer(&self, id: NodeId) -> Result<bool, NodeError> {
        match self.nodes[id].kind {
            NodeKind::Integer => Ok(true),
            NodeKind::FloatingPoint => {
                let value = self.get_floating_point(id).unwrap();
                Ok(value.fract() == 0.0 && value.is_finite())
            }
            _ => {
                self.to_floating_point(id)?;
                Ok(false)
            }
        }
    }

    pub fn to_string_value(&self, id: NodeId) -> Result<String, NodeError> {
        match self.nodes[id].kind {
            NodeKind::String => Ok(self.get_string(id).unwrap().to_string()),
            NodeKind::Integer => Ok(self.get_integer(id).unwrap().to_string()),
            NodeKind::FloatingPoint => Ok(format_float(self.get_floating_point(id).unwrap())),
            NodeKind::True => Ok("true".to_string()),
            NodeKind::False => Ok("false".to_string()),
            NodeKind::Null => Ok("null".to_string()),
            NodeKind::Undefined => Ok("undefined".to_string()),
            kind => Err(NodeError::NotCoercible { kind }),
        }
    }

    /// `to_boolean`: same as [`Self::to_boolean_type_only`] but reserved
    /// for call sites that may need to account for side effects in a
    /// richer front-end; here the two are equivalent since this crate's
    /// node model carries no side-effecting sub-expressions of its own.
    pub fn to_boolean(&self, id: NodeId) -> bool {
        self.to_boolean_type_only(id)
    }

    /// Computes truthiness without mutating the node.
    pub fn to_boolean_type_only(&self, id: NodeId) -> bool {
        match self.nodes[id].kind {
            NodeKind::True => true,
            NodeKind::False => false,
            NodeKind::Integer => self.get_integer(id).unwrap() != 0,
            NodeKind::FloatingPoint => {
                let value = self.get_floating_point(id).unwrap();
                !value.is_nan() && value != 0.0
            }
            NodeKind::String => !self.get_string(id).unwrap().is_empty(),
            NodeKind::Null | NodeKind::Undefined => false,
            _ => true,
        }
    }

    pub fn to_unknown(&mut self, id: NodeId) {
        self.nodes[id].kind = NodeKind::Unknown;
    }

    // -- flags / attributes ----------------------------------------------

    #[inline]
    pub fn flags(&self, id: NodeId) -> FlagSet {
        self.nodes[id].flags
    }

    #[inline]
    pub fn set_flags(&mut self, id: NodeId, flags: FlagSet) {
        self.nodes[id].flags = flags;
    }

    #[inline]
    pub fn attributes(&self, id: NodeId) -> AttributeSet {
        self.nodes[id].attributes
    }

    #[inline]
    pub fn set_attributes(&mut self, id: NodeId, attributes: AttributeSet) {
        self.nodes[id].attributes = attributes;
    }

    pub fn compare_all_flags(&self, id: NodeId, candidates: &[FlagSet]) -> bool {
        candidates.is_empty() || candidates.contains(&self.flags(id))
    }

    pub fn compare_all_attributes(&self, id: NodeId, candidates: &[AttributeSet]) -> bool {
        candidates.is_empty() || candidates.contains(&self.attributes(id))
    }

    /// The source language's rewrite-relevant notion of side effects: a
    /// plain literal, identifier or `true`/`false`/`null`/`undefined` has
    /// none; anything else (calls, assignments-bearing subtrees) is
    /// conservatively assumed to.
    pub fn has_side_effects(&self, id: NodeId) -> bool {
        match self.nodes[id].kind {
            NodeKind::Integer
            | NodeKind::FloatingPoint
            | NodeKind::String
            | NodeKind::True
            | NodeKind::False
            | NodeKind::Null
            | NodeKind::Undefined
            | NodeKind::Identifier => false,
            _ => true,
        }
    }

    // -- tree edits --------------------------------------------------------

    #[inline]
    pub fn get_parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].parent
    }

    #[inline]
    pub fn get_offset(&self, id: NodeId) -> usize {
        self.nodes[id].offset
    }

    #[inline]
    pub fn get_children_size(&self, id: NodeId) -> usize {
        self.nodes[id].children.len()
    }

    pub fn get_child(&self, id: NodeId, index: usize) -> Option<NodeId> {
        self.nodes[id].children.get(index).copied()
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        let offset = self.nodes[parent].children.len();
        self.nodes[parent].children.push(child);
        self.set_parent(child, Some(parent), offset);
    }

    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.nodes[parent].children.insert(index, child);
        self.fix_offsets_from(parent, index);
    }

    /// Replace the child at `index`, returning the node that was there.
    pub fn set_child(&mut self, parent: NodeId, index: usize, child: NodeId) -> NodeId {
        let previous = self.nodes[parent].children[index];
        self.nodes[parent].children[index] = child;
        self.nodes[previous].parent = None;
        self.set_parent(child, Some(parent), index);
        previous
    }

    /// Detach and return the child at `index`, shifting later siblings'
    /// offsets down by one.
    pub fn delete_child(&mut self, parent: NodeId, index: usize) -> NodeId {
        let child = self.nodes[parent].children.remove(index);
        self.nodes[child].parent = None;
        self.nodes[child].offset = 0;
        self.fix_offsets_from(parent, index);
        child
    }

    /// Replace `id` with `replacement` in `id`'s parent's child list.
    /// `id` becomes parentless. Internal error if `id` has no parent.
    pub fn replace_with(&mut self, id: NodeId, replacement: NodeId) -> Result<(), NodeError> {
        let parent = self.nodes[id].parent.ok_or(NodeError::NoParent(id))?;
        let offset = self.nodes[id].offset;
        self.set_child(parent, offset, replacement);
        Ok(())
    }

    pub fn set_parent(&mut self, child: NodeId, parent: Option<NodeId>, offset: usize) {
        self.nodes[child].parent = parent;
        self.nodes[child].offset = offset;
    }

    fn fix_offsets_from(&mut self, parent: NodeId, start: usize) {
        let children = self.nodes[parent].children.clone();
        for (offset, &child) in children.iter().enumerate().skip(start) {
            self.nodes[child].parent = Some(parent);
            self.nodes[child].offset = offset;
        }
    }

    /// Remove every [`NodeKind::Unknown`] node reachable from `root`, from
    /// the leaves up, so offsets stay consistent while deleting.
    pub fn clean_tree(&mut self, root: NodeId) {
        let children = self.nodes[root].children.clone();
        for child in children {
            self.clean_tree(child);
        }

        let mut index = 0;
        while index < self.nodes[root].children.len() {
            let child = self.nodes[root].children[index];
            if self.nodes[child].kind == NodeKind::Unknown {
                self.delete_child(root, index);
            } else {
                index += 1;
            }
        }
    }

    /// Compare two literal nodes under the given mode.
    pub fn compare(&self, a: NodeId, b: NodeId, mode: CompareMode) -> ComparisonResult {
        use NodeKind::*;
        let (ka, kb) = (self.nodes[a].kind, self.nodes[b].kind);

        if mode == CompareMode::Strict && ka != kb && !(is_numeric(ka) && is_numeric(kb)) {
            return ComparisonResult::Unordered;
        }

        match (ka, kb) {
            (String, String) => {
                let (sa, sb) = (self.get_string(a).unwrap(), self.get_string(b).unwrap());
                compare_ord(sa, sb)
            }
            (String, _) | (_, String) if mode == CompareMode::Strict => ComparisonResult::Unordered,
            _ if is_numeric(ka) && is_numeric(kb) => {
                let fa = self.to_floating_point(a).unwrap();
                let fb = self.to_floating_point(b).unwrap();
                if fa.is_nan() || fb.is_nan() {
                    ComparisonResult::Unordered
                } else {
                    compare_ord(fa, fb)
                }
            }
            (True | False, True | False) => {
                let (ba, bb) = (ka == True, kb == True);
                compare_ord(ba, bb)
            }
            (Null, Null) | (Undefined, Undefined) => ComparisonResult::Equal,
            _ if mode == CompareMode::Smart => {
                let sa = self.to_string_value(a).unwrap_or_default();
                let sb = self.to_string_value(b).unwrap_or_default();
                let sa = normalize_whitespace(&sa);
                let sb = normalize_whitespace(&sb);
                compare_ord(sa, sb)
            }
            _ => ComparisonResult::Error,
        }
    }
}

fn is_numeric(kind: NodeKind) -> bool {
    matches!(kind, NodeKind::Integer | NodeKind::FloatingPoint)
}

fn compare_ord<T: PartialOrd>(a: T, b: T) -> ComparisonResult {
    if a < b {
        ComparisonResult::Less
    } else if a > b {
        ComparisonResult::Greater
    } else {
        ComparisonResult::Equal
    }
}

/// Trims surrounding whitespace and collapses internal whitespace runs to
/// a single space; an empty result becomes `"0"`, matching SMART_MATCH's
/// string simplification rule.
pub fn normalize_whitespace(value: &str) -> String {
    let normalized = value.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.is_empty() {
        "0".to_string()
    } else {
        normalized
    }
}

fn format_float(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else {
        value.to_string()
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "{self:?}")
    }
}
