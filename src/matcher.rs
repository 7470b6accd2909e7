//! Given a node and a rule's match pattern, decides applicability and
//! records the matched sub-nodes into an ordered capture array.
//!
//! The pattern is a flat, depth-first pre-order linearization of a small
//! subtree shape (see [`crate::rules::MatchEntry`]); the matcher walks the
//! candidate node's children in lock-step with that linearization,
//! recursing one [`MatchEntry`] at a time.

use thiserror::Error;

use crate::node::{Arena, NodeId};
use crate::rules::{LiteralConstraint, MatchEntry, MatchPattern, Rule};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MatchError {
    #[error("pattern depth exceeded the 255 bound the matcher supports")]
    DepthOverflow,
}

/// `match(node, rule) -> Option<CaptureArray>`, per spec.md §4.2.
pub fn try_match(arena: &Arena, node: NodeId, rule: &Rule) -> Result<Option<Vec<NodeId>>, MatchError> {
    let pattern = rule.pattern;
    if pattern.is_empty() {
        return Ok(None);
    }
    let mut captures = Vec::with_capacity(pattern.len());
    let mut cursor = 0usize;
    let matched = match_subtree(arena, node, pattern, &mut cursor, &mut captures)?;
    if matched && cursor == pattern.len() {
        Ok(Some(captures))
    } else {
        Ok(None)
    }
}

/// Matches the entry at `pattern[*cursor]` against `node`, then — if that
/// entry allows recursion — consumes one pattern entry per child of
/// `node`, left-to-right. Returns whether the subtree rooted at `node`
/// satisfies the pattern starting at `*cursor`; on success, `*cursor` has
/// advanced past every entry belonging to this subtree.
fn match_subtree(
    arena: &Arena,
    node: NodeId,
    pattern: MatchPattern,
    cursor: &mut usize,
    captures: &mut Vec<NodeId>,
) -> Result<bool, MatchError> {
    let depth = pattern[*cursor].depth;
    if depth == u8::MAX {
        return Err(MatchError::DepthOverflow);
    }
    let entry = &pattern[*cursor];
    if !entry_matches(arena, node, entry, captures) {
        return Ok(false);
    }
    *cursor += 1;
    captures.push(node);

    if !entry.has_children {
        return Ok(true);
    }

    let child_depth = depth + 1;
    let children = arena.children(node);
    let mut child_index = 0usize;
    while *cursor < pattern.len() && pattern[*cursor].depth == child_depth {
        if child_index >= children.len() {
            return Ok(false);
        }
        let child = children[child_index];
        if !match_subtree(arena, child, pattern, cursor, captures)? {
            return Ok(false);
        }
        child_index += 1;
    }

    // Every child of `node` must have been paired with a pattern entry;
    // extra, unmatched children are a failed (partial) match.
    Ok(child_index == children.len())
}

fn entry_matches(arena: &Arena, node: NodeId, entry: &MatchEntry, captures: &[NodeId]) -> bool {
    if !entry.node_kinds.is_empty() && !entry.node_kinds.contains(&arena.get_type(node)) {
        return false;
    }

    if let Some(constraint) = &entry.literal_constraint {
        if !literal_constraint_matches(arena, node, constraint, captures) {
            return false;
        }
    }

    if let Some(candidates) = entry.attributes_constraint {
        if !arena.compare_all_attributes(node, candidates) {
            return false;
        }
    }

    if let Some(candidates) = entry.flags_constraint {
        if !arena.compare_all_flags(node, candidates) {
            return false;
        }
    }

    true
}

fn literal_constraint_matches(
    arena: &Arena,
    node: NodeId,
    constraint: &LiteralConstraint,
    captures: &[NodeId],
) -> bool {
    match constraint {
        LiteralConstraint::NoSideEffect => !arena.has_side_effects(node),
        LiteralConstraint::IdentifierEquals { index, literal } => {
            let candidate = match arena.get_string(node) {
                Some(value) => value,
                None => return false,
            };
            let expected = match index {
                Some(capture_index) => match captures.get(*capture_index).and_then(|id| arena.get_string(*id)) {
                    Some(value) => value,
                    None => return false,
                },
                None => match literal {
                    Some(value) => value,
                    None => return false,
                },
            };
            candidate == expected
        }
        LiteralConstraint::MaskEquals { mask, expected } => match arena.to_integer(node) {
            Ok(value) => (value & mask) == *expected,
            Err(_) => false,
        },
        LiteralConstraint::LiteralEqualsInt(expected) => arena.get_integer(node) == Some(*expected),
        LiteralConstraint::LiteralEqualsFloat(expected) => match arena.get_floating_point(node) {
            Some(value) => (value.is_nan() && expected.is_nan()) || value == *expected,
            None => false,
        },
        LiteralConstraint::LiteralEqualsStr(expected) => arena.get_string(node) == Some(*expected),
        LiteralConstraint::Truthy => arena.to_boolean_type_only(node),
        LiteralConstraint::Falsy => !arena.to_boolean_type_only(node),
    }
}
