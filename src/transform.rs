//! Executes a rule's transform program — a short sequence of primitives —
//! against the capture array the matcher built, mutating the AST.
//!
//! Every operation routes its mutation through [`crate::node::Arena`]'s
//! public tree-edit surface (`replace_with`, `append_child`, `set_child`,
//! ...), never through a private shortcut, so (I1) — the tree stays
//! well-formed between operations — holds even if a later operation in
//! the same program fails.

use regex::RegexBuilder;
use thiserror::Error;

use crate::diagnostics::{Diagnostics, ErrorCode};
use crate::node::{Arena, ComparisonResult, CompareMode, NodeError, NodeId, NodeKind, Position};
use crate::rules::{Rule, TransformOp, TransformProgram};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransformError {
    #[error("capture {index} could not be coerced: {source}")]
    Coercion { index: usize, source: NodeError },
    #[error("capture {index} has no parent to replace")]
    ParentlessDestination { index: usize },
    #[error("capture {index} is not a string node")]
    NotAString { index: usize },
}

/// Executes `rule.program` against `captures`, which the matcher
/// populated in depth-first order; index 0 is always the matched
/// subtree's root. Diagnostics are attributed to the root's source
/// position, mirroring how the original system threads a single
/// "current node" position through a rewrite.
pub fn apply(
    arena: &mut Arena,
    rule: &Rule,
    mut captures: Vec<NodeId>,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<NodeId>, TransformError> {
    let position = arena.get_position(captures[0]);
    for op in rule.program {
        apply_one(arena, *op, &mut captures, diagnostics, position)?;
    }
    Ok(captures)
}

fn apply_one(
    arena: &mut Arena,
    op: TransformOp,
    captures: &mut [NodeId],
    diagnostics: &mut Diagnostics,
    position: Position,
) -> Result<(), TransformError> {
    use TransformOp::*;
    match op {
        Add { lhs, rhs, dest } => {
            let result = fold_add(arena, captures[lhs], captures[rhs], lhs)?;
            replace_capture(arena, captures, dest, result)
        }
        Subtract { lhs, rhs, dest } => {
            let result = fold_subtract(arena, captures[lhs], captures[rhs], lhs)?;
            replace_capture(arena, captures, dest, result)
        }
        Multiply { lhs, rhs, dest } => {
            let result = fold_multiply(arena, captures[lhs], captures[rhs], lhs)?;
            replace_capture(arena, captures, dest, result)
        }
        Divide { lhs, rhs, dest } => {
            let result = fold_divide(arena, diagnostics, position, captures[lhs], captures[rhs], lhs)?;
            replace_capture(arena, captures, dest, result)
        }
        Modulo { lhs, rhs, dest } => {
            let result = fold_modulo(arena, diagnostics, position, captures[lhs], captures[rhs], lhs)?;
            replace_capture(arena, captures, dest, result)
        }
        Power { lhs, rhs, dest } => {
            let result = fold_power(arena, captures[lhs], captures[rhs], lhs)?;
            replace_capture(arena, captures, dest, result)
        }
        Negate { src, dest } => {
            let result = fold_negate(arena, captures[src], src)?;
            replace_capture(arena, captures, dest, result)
        }
        BitwiseAnd { lhs, rhs, dest } => {
            let a = to_int32(arena, captures[lhs], lhs)?;
            let b = to_int32(arena, captures[rhs], rhs)?;
            let result = arena.new_integer((a & b) as i64);
            replace_capture(arena, captures, dest, result)
        }
        BitwiseOr { lhs, rhs, dest } => {
            let a = to_int32(arena, captures[lhs], lhs)?;
            let b = to_int32(arena, captures[rhs], rhs)?;
            let result = arena.new_integer((a | b) as i64);
            replace_capture(arena, captures, dest, result)
        }
        BitwiseXor { lhs, rhs, dest } => {
            let a = to_int32(arena, captures[lhs], lhs)?;
            let b = to_int32(arena, captures[rhs], rhs)?;
            let result = arena.new_integer((a ^ b) as i64);
            replace_capture(arena, captures, dest, result)
        }
        BitwiseNot { src, dest } => {
            let a = to_int32(arena, captures[src], src)?;
            let result = arena.new_integer((!a) as i64);
            replace_capture(arena, captures, dest, result)
        }
        ShiftLeft { lhs, rhs, dest } => {
            let a = to_int32(arena, captures[lhs], lhs)?;
            let amount = mask_shift_amount(arena, diagnostics, position, captures[rhs], rhs)?;
            let result = arena.new_integer(a.wrapping_shl(amount) as i64);
            replace_capture(arena, captures, dest, result)
        }
        ShiftRight { lhs, rhs, dest } => {
            let a = to_int32(arena, captures[lhs], lhs)?;
            let amount = mask_shift_amount(arena, diagnostics, position, captures[rhs], rhs)?;
            let result = arena.new_integer(a.wrapping_shr(amount) as i64);
            replace_capture(arena, captures, dest, result)
        }
        ShiftRightUnsigned { lhs, rhs, dest } => {
            let a = to_int32(arena, captures[lhs], lhs)? as u32;
            let amount = mask_shift_amount(arena, diagnostics, position, captures[rhs], rhs)?;
            let result = arena.new_integer(a.wrapping_shr(amount) as i64);
            replace_capture(arena, captures, dest, result)
        }
        RotateLeft { lhs, rhs, dest } => {
            let a = to_int32(arena, captures[lhs], lhs)?;
            let amount = mask_shift_amount(arena, diagnostics, position, captures[rhs], rhs)?;
            let result = arena.new_integer(a.rotate_left(amount) as i64);
            replace_capture(arena, captures, dest, result)
        }
        RotateRight { lhs, rhs, dest } => {
            let a = to_int32(arena, captures[lhs], lhs)?;
            let amount = mask_shift_amount(arena, diagnostics, position, captures[rhs], rhs)?;
            let result = arena.new_integer(a.rotate_right(amount) as i64);
            replace_capture(arena, captures, dest, result)
        }
        LogicalNot { src, dest } => {
            let value = !arena.to_boolean_type_only(captures[src]);
            let result = new_bool(arena, value);
            replace_capture(arena, captures, dest, result)
        }
        LogicalXor { lhs, rhs, dest } => {
            let a = arena.to_boolean_type_only(captures[lhs]);
            let b = arena.to_boolean_type_only(captures[rhs]);
            let result = if a == b {
                new_bool(arena, false)
            } else if a {
                captures[lhs]
            } else {
                captures[rhs]
            };
            replace_capture(arena, captures, dest, result)
        }
        Concatenate { lhs, rhs, dest } => {
            let a = coerce(arena.to_string_value(captures[lhs]), lhs)?;
            let b = coerce(arena.to_string_value(captures[rhs]), rhs)?;
            let result = arena.new_string(format!("{a}{b}"));
            replace_capture(arena, captures, dest, result)
        }
        Compare { lhs, rhs, dest } => {
            let result = match arena.compare(captures[lhs], captures[rhs], CompareMode::Loose) {
                ComparisonResult::Less => arena.new_integer(-1),
                ComparisonResult::Equal => arena.new_integer(0),
                ComparisonResult::Greater => arena.new_integer(1),
                ComparisonResult::Unordered | ComparisonResult::Error | ComparisonResult::Undefined => {
                    arena.new_node(NodeKind::Undefined)
                }
            };
            replace_capture(arena, captures, dest, result)
        }
        Equal { lhs, rhs, dest } => {
            let matched = arena.compare(captures[lhs], captures[rhs], CompareMode::Loose) == ComparisonResult::Equal;
            let result = new_bool(arena, matched);
            replace_capture(arena, captures, dest, result)
        }
        StrictlyEqual { lhs, rhs, dest } => {
            let matched = arena.compare(captures[lhs], captures[rhs], CompareMode::Strict) == ComparisonResult::Equal;
            let result = new_bool(arena, matched);
            replace_capture(arena, captures, dest, result)
        }
        Less { lhs, rhs, dest } => {
            let matched = arena.compare(captures[lhs], captures[rhs], CompareMode::Loose) == ComparisonResult::Less;
            let result = new_bool(arena, matched);
            replace_capture(arena, captures, dest, result)
        }
        LessEqual { lhs, rhs, dest } => {
            let matched = matches!(
                arena.compare(captures[lhs], captures[rhs], CompareMode::Loose),
                ComparisonResult::Less | ComparisonResult::Equal
            );
            let result = new_bool(arena, matched);
            replace_capture(arena, captures, dest, result)
        }
        Match { lhs, rhs, dest } => {
            let result = fold_match(arena, diagnostics, position, captures[lhs], captures[rhs], lhs, rhs)?;
            replace_capture(arena, captures, dest, result)
        }
        SmartMatch { lhs, rhs, dest } => {
            let a = string_of(arena, captures[lhs], lhs)?;
            let b = string_of(arena, captures[rhs], rhs)?;
            let matched = crate::node::normalize_whitespace(&a) == crate::node::normalize_whitespace(&b);
            let result = new_bool(arena, matched);
            replace_capture(arena, captures, dest, result)
        }
        Maximum { lhs, rhs, dest } => {
            let result = pick_extreme(arena, captures[lhs], captures[rhs], lhs, rhs, true)?;
            replace_capture(arena, captures, dest, result)
        }
        Minimum { lhs, rhs, dest } => {
            let result = pick_extreme(arena, captures[lhs], captures[rhs], lhs, rhs, false)?;
            replace_capture(arena, captures, dest, result)
        }
        Move { src, dest } => {
            let value = captures[src];
            replace_capture(arena, captures, dest, value)
        }
        Swap { a, b } => swap(arena, captures[a], captures[b], a, b),
        Remove { index: target } => {
            remove(arena, captures[target], target);
            Ok(())
        }
        SetInteger { index: target, value } => {
            arena.set_integer(captures[target], value);
            Ok(())
        }
        SetNodeType { index: target, kind } => set_node_type(arena, captures, target, kind),
        ToConditional { cond, then_branch, else_branch, dest } => {
            to_conditional(arena, captures, cond, then_branch, else_branch, dest)
        }
        ToInteger { index: target } => {
            let node = captures[target];
            let value = coerce(arena.to_integer(node), target)?;
            arena.set_type(node, NodeKind::Integer);
            arena.set_integer(node, value);
            Ok(())
        }
        ToNumber { index: target } => {
            let node = captures[target];
            if coerce(arena.to_number_is_integer(node), target)? {
                let value = coerce(arena.to_integer(node), target)?;
                arena.set_type(node, NodeKind::Integer);
                arena.set_integer(node, value);
            } else {
                let value = coerce(arena.to_floating_point(node), target)?;
                arena.set_type(node, NodeKind::FloatingPoint);
                arena.set_floating_point(node, value);
            }
            Ok(())
        }
        WhileTrueToForever { src, dest } => while_true_to_forever(arena, captures, src, dest),
    }
}

fn coerce<T>(result: Result<T, NodeError>, index: usize) -> Result<T, TransformError> {
    result.map_err(|source| TransformError::Coercion { index, source })
}

fn string_of(arena: &Arena, node: NodeId, index: usize) -> Result<String, TransformError> {
    arena.get_string(node).map(str::to_string).ok_or(TransformError::NotAString { index })
}

fn new_bool(arena: &mut Arena, value: bool) -> NodeId {
    arena.new_node(if value { NodeKind::True } else { NodeKind::False })
}

/// Replaces the node at `captures[dest]` with `replacement` (freshly built
/// or an existing captured node — the latter is how MOVE/MAXIMUM/MINIMUM
/// preserve node identity), then updates the capture array so later
/// operations in the same program observe the new node.
fn replace_capture(arena: &mut Arena, captures: &mut [NodeId], dest: usize, replacement: NodeId) -> Result<(), TransformError> {
    arena
        .replace_with(captures[dest], replacement)
        .map_err(|_| TransformError::ParentlessDestination { index: dest })?;
    captures[dest] = replacement;
    Ok(())
}

fn fold_add(arena: &mut Arena, lhs: NodeId, rhs: NodeId, lhs_index: usize) -> Result<NodeId, TransformError> {
    if arena.get_type(lhs) == NodeKind::Integer && arena.get_type(rhs) == NodeKind::Integer {
        let a = arena.get_integer(lhs).unwrap();
        let b = arena.get_integer(rhs).unwrap();
        Ok(arena.new_integer(a.wrapping_add(b)))
    } else {
        let a = coerce(arena.to_floating_point(lhs), lhs_index)?;
        let b = coerce(arena.to_floating_point(rhs), lhs_index)?;
        Ok(arena.new_float(a + b))
    }
}

fn fold_subtract(arena: &mut Arena, lhs: NodeId, rhs: NodeId, lhs_index: usize) -> Result<NodeId, TransformError> {
    if arena.get_type(lhs) == NodeKind::Integer && arena.get_type(rhs) == NodeKind::Integer {
        let a = arena.get_integer(lhs).unwrap();
        let b = arena.get_integer(rhs).unwrap();
        Ok(arena.new_integer(a.wrapping_sub(b)))
    } else {
        let a = coerce(arena.to_floating_point(lhs), lhs_index)?;
        let b = coerce(arena.to_floating_point(rhs), lhs_index)?;
        Ok(arena.new_float(a - b))
    }
}

fn fold_multiply(arena: &mut Arena, lhs: NodeId, rhs: NodeId, lhs_index: usize) -> Result<NodeId, TransformError> {
    if arena.get_type(lhs) == NodeKind::Integer && arena.get_type(rhs) == NodeKind::Integer {
        let a = arena.get_integer(lhs).unwrap();
        let b = arena.get_integer(rhs).unwrap();
        Ok(arena.new_integer(a.wrapping_mul(b)))
    } else {
        let a = coerce(arena.to_floating_point(lhs), lhs_index)?;
        let b = coerce(arena.to_floating_point(rhs), lhs_index)?;
        Ok(arena.new_float(a * b))
    }
}

fn fold_divide(
    arena: &mut Arena,
    diagnostics: &mut Diagnostics,
    position: Position,
    lhs: NodeId,
    rhs: NodeId,
    lhs_index: usize,
) -> Result<NodeId, TransformError> {
    if arena.get_type(lhs) == NodeKind::Integer && arena.get_type(rhs) == NodeKind::Integer {
        let a = arena.get_integer(lhs).unwrap();
        let b = arena.get_integer(rhs).unwrap();
        if b != 0 {
            return Ok(arena.new_integer(a.wrapping_div(b)));
        }
        diagnostics.warn(ErrorCode::InvalidNumber, position, format!("division by zero: {a} / 0"));
        let result = if a > 0 {
            f64::INFINITY
        } else if a < 0 {
            f64::NEG_INFINITY
        } else {
            f64::NAN
        };
        return Ok(arena.new_float(result));
    }
    let a = coerce(arena.to_floating_point(lhs), lhs_index)?;
    let b = coerce(arena.to_floating_point(rhs), lhs_index)?;
    if b == 0.0 {
        diagnostics.warn(ErrorCode::InvalidNumber, position, format!("division by zero: {a} / 0"));
    }
    Ok(arena.new_float(a / b))
}

fn fold_modulo(
    arena: &mut Arena,
    diagnostics: &mut Diagnostics,
    position: Position,
    lhs: NodeId,
    rhs: NodeId,
    lhs_index: usize,
) -> Result<NodeId, TransformError> {
    if arena.get_type(lhs) == NodeKind::Integer && arena.get_type(rhs) == NodeKind::Integer {
        let a = arena.get_integer(lhs).unwrap();
        let b = arena.get_integer(rhs).unwrap();
        if b != 0 {
            return Ok(arena.new_integer(a.wrapping_rem(b)));
        }
        diagnostics.warn(ErrorCode::InvalidNumber, position, format!("modulo by zero: {a} % 0"));
        return Ok(arena.new_float(f64::NAN));
    }
    let a = coerce(arena.to_floating_point(lhs), lhs_index)?;
    let b = coerce(arena.to_floating_point(rhs), lhs_index)?;
    if b == 0.0 {
        diagnostics.warn(ErrorCode::InvalidNumber, position, format!("modulo by zero: {a} % 0"));
    }
    Ok(arena.new_float(a % b))
}

fn fold_power(arena: &mut Arena, lhs: NodeId, rhs: NodeId, lhs_index: usize) -> Result<NodeId, TransformError> {
    let a = coerce(arena.to_floating_point(lhs), lhs_index)?;
    let b = coerce(arena.to_floating_point(rhs), lhs_index)?;
    Ok(arena.new_float(a.powf(b)))
}

fn fold_negate(arena: &mut Arena, src: NodeId, src_index: usize) -> Result<NodeId, TransformError> {
    match arena.get_type(src) {
        NodeKind::Integer => Ok(arena.new_integer(arena.get_integer(src).unwrap().wrapping_neg())),
        NodeKind::FloatingPoint => Ok(arena.new_float(-arena.get_floating_point(src).unwrap())),
        _ => {
            let value = coerce(arena.to_floating_point(src), src_index)?;
            Ok(arena.new_float(-value))
        }
    }
}

fn to_int32(arena: &Arena, node: NodeId, index: usize) -> Result<i32, TransformError> {
    let value = coerce(arena.to_integer(node), index)?;
    Ok(value as i32)
}

/// Masks a shift/rotate amount to 5 bits, warning when the original
/// amount (read fresh from `rhs`) was negative or `>= 32`.
fn mask_shift_amount(
    arena: &Arena,
    diagnostics: &mut Diagnostics,
    position: Position,
    rhs: NodeId,
    rhs_index: usize,
) -> Result<u32, TransformError> {
    let raw = coerce(arena.to_integer(rhs), rhs_index)?;
    let masked = (raw & 0x1F) as u32;
    if !(0..32).contains(&raw) {
        diagnostics.warn(
            ErrorCode::InvalidNumber,
            position,
            format!("shift/rotate amount {raw} out of range [0, 32), masked to {masked}"),
        );
    }
    Ok(masked)
}

fn pick_extreme(
    arena: &mut Arena,
    lhs: NodeId,
    rhs: NodeId,
    lhs_index: usize,
    rhs_index: usize,
    want_max: bool,
) -> Result<NodeId, TransformError> {
    let a = coerce(arena.to_floating_point(lhs), lhs_index)?;
    let b = coerce(arena.to_floating_point(rhs), rhs_index)?;
    if a.is_nan() {
        return Ok(rhs);
    }
    if b.is_nan() {
        return Ok(lhs);
    }
    let lhs_wins = if want_max { a >= b } else { a <= b };
    Ok(if lhs_wins { lhs } else { rhs })
}

fn swap(arena: &mut Arena, a: NodeId, b: NodeId, a_index: usize, b_index: usize) -> Result<(), TransformError> {
    let pa = arena.get_parent(a).ok_or(TransformError::ParentlessDestination { index: a_index })?;
    let oa = arena.get_offset(a);
    let pb = arena.get_parent(b).ok_or(TransformError::ParentlessDestination { index: b_index })?;
    let ob = arena.get_offset(b);

    // Route through a placeholder so a same-parent swap never needs two
    // concurrent parents for one node — see spec.md §4.3's SWAP note.
    let placeholder = arena.new_node(NodeKind::Empty);
    arena.set_child(pa, oa, placeholder);
    arena.set_child(pb, ob, a);
    arena.set_child(pa, oa, b);
    Ok(())
}

fn remove(arena: &mut Arena, node: NodeId, target_index: usize) {
    if target_index == 0 {
        arena.to_unknown(node);
        return;
    }
    if let Some(parent) = arena.get_parent(node) {
        let offset = arena.get_offset(node);
        arena.delete_child(parent, offset);
    }
}

fn set_node_type(arena: &mut Arena, captures: &mut [NodeId], target: usize, kind: NodeKind) -> Result<(), TransformError> {
    let old = captures[target];
    let new_node = arena.new_node(kind);
    for child in arena.children(old).to_vec() {
        arena.append_child(new_node, child);
    }
    let parent = arena.get_parent(old).ok_or(TransformError::ParentlessDestination { index: target })?;
    let offset = arena.get_offset(old);
    arena.set_child(parent, offset, new_node);
    captures[target] = new_node;
    Ok(())
}

fn to_conditional(
    arena: &mut Arena,
    captures: &mut [NodeId],
    cond: usize,
    then_branch: usize,
    else_branch: usize,
    dest: usize,
) -> Result<(), TransformError> {
    let new_node = arena.new_node(NodeKind::Conditional);
    arena.append_child(new_node, captures[cond]);
    arena.append_child(new_node, captures[then_branch]);
    arena.append_child(new_node, captures[else_branch]);
    replace_capture(arena, captures, dest, new_node)
}

fn while_true_to_forever(arena: &mut Arena, captures: &mut [NodeId], src: usize, dest: usize) -> Result<(), TransformError> {
    let block = captures[src];
    let for_node = arena.new_node(NodeKind::For);
    let init = arena.new_node(NodeKind::Empty);
    let cond = arena.new_node(NodeKind::Empty);
    let step = arena.new_node(NodeKind::Empty);
    arena.append_child(for_node, init);
    arena.append_child(for_node, cond);
    arena.append_child(for_node, step);
    arena.append_child(for_node, block);
    replace_capture(arena, captures, dest, for_node)
}

fn fold_match(
    arena: &mut Arena,
    diagnostics: &mut Diagnostics,
    position: Position,
    lhs: NodeId,
    rhs: NodeId,
    lhs_index: usize,
    rhs_index: usize,
) -> Result<NodeId, TransformError> {
    let haystack = string_of(arena, lhs, lhs_index)?;
    let raw = string_of(arena, rhs, rhs_index)?;
    let (body, flags) = parse_regex_literal(&raw);

    let mut builder = RegexBuilder::new(&body);
    builder.case_insensitive(flags.contains('i'));
    match builder.build() {
        Ok(regex) => Ok(new_bool(arena, regex.is_match(&haystack))),
        Err(error) => {
            let message = format!("invalid regular expression /{body}/: {error}");
            diagnostics.error(ErrorCode::InvalidRegex, position, message.clone());
            Ok(build_syntax_error_throw(arena, &message, position))
        }
    }
}

/// Splits a `/body/flags` literal into its body and flags; a string with
/// no delimiting slashes is treated as a raw regex body with no flags.
fn parse_regex_literal(raw: &str) -> (String, String) {
    if let Some(rest) = raw.strip_prefix('/') {
        if let Some(closing) = rest.rfind('/') {
            return (rest[..closing].to_string(), rest[closing + 1..].to_string());
        }
    }
    (raw.to_string(), String::new())
}

fn build_syntax_error_throw(arena: &mut Arena, message: &str, position: Position) -> NodeId {
    let identifier = arena.new_node(NodeKind::Identifier);
    arena.set_string(identifier, "SyntaxError");
    let message_node = arena.new_string(message.to_string());
    let filename_node = arena.new_string("<input>");
    let line_node = arena.new_integer(position.line as i64);

    let list = arena.new_node(NodeKind::List);
    arena.append_child(list, message_node);
    arena.append_child(list, filename_node);
    arena.append_child(list, line_node);

    let call = arena.new_node(NodeKind::Call);
    arena.append_child(call, identifier);
    arena.append_child(call, list);

    let throw = arena.new_node(NodeKind::Throw);
    arena.append_child(throw, call);
    throw
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::SafetyFlags;

    fn rule(program: TransformProgram) -> Rule {
        Rule { name: "test", safety: SafetyFlags::NONE, pattern: &[], program }
    }

    fn run(arena: &mut Arena, captures: Vec<NodeId>, program: TransformProgram) -> Vec<NodeId> {
        let mut diagnostics = Diagnostics::new();
        apply(arena, &rule(program), captures, &mut diagnostics).unwrap()
    }

    #[test]
    fn add_folds_two_integer_literals() {
        let mut arena = Arena::new();
        let root = arena.new_node(NodeKind::Add);
        let lhs = arena.new_integer(3);
        let rhs = arena.new_integer(4);
        arena.append_child(root, lhs);
        arena.append_child(root, rhs);

        let captures = run(&mut arena, vec![root, lhs, rhs], &[TransformOp::Add { lhs: 1, rhs: 2, dest: 0 }]);

        assert_eq!(arena.get_type(captures[0]), NodeKind::Integer);
        assert_eq!(arena.get_integer(captures[0]), Some(7));
    }

    #[test]
    fn add_promotes_to_float_when_either_operand_is_float() {
        let mut arena = Arena::new();
        let root = arena.new_node(NodeKind::Add);
        let lhs = arena.new_integer(3);
        let rhs = arena.new_float(0.5);
        arena.append_child(root, lhs);
        arena.append_child(root, rhs);

        let captures = run(&mut arena, vec![root, lhs, rhs], &[TransformOp::Add { lhs: 1, rhs: 2, dest: 0 }]);

        assert_eq!(arena.get_type(captures[0]), NodeKind::FloatingPoint);
        assert_eq!(arena.get_floating_point(captures[0]), Some(3.5));
    }

    #[test]
    fn integer_divide_by_zero_warns_and_produces_signed_infinity() {
        let mut arena = Arena::new();
        let root = arena.new_node(NodeKind::Divide);
        let lhs = arena.new_integer(-10);
        let rhs = arena.new_integer(0);
        arena.append_child(root, lhs);
        arena.append_child(root, rhs);

        let mut diagnostics = Diagnostics::new();
        let captures = apply(
            &mut arena,
            &rule(&[TransformOp::Divide { lhs: 1, rhs: 2, dest: 0 }]),
            vec![root, lhs, rhs],
            &mut diagnostics,
        )
        .unwrap();

        assert_eq!(diagnostics.messages().len(), 1);
        assert_eq!(diagnostics.messages()[0].code, ErrorCode::InvalidNumber);
        assert_eq!(arena.get_floating_point(captures[0]), Some(f64::NEG_INFINITY));
    }

    #[test]
    fn modulo_by_zero_warns_and_produces_nan() {
        let mut arena = Arena::new();
        let root = arena.new_node(NodeKind::Modulo);
        let lhs = arena.new_integer(10);
        let rhs = arena.new_integer(0);
        arena.append_child(root, lhs);
        arena.append_child(root, rhs);

        let mut diagnostics = Diagnostics::new();
        let captures = apply(
            &mut arena,
            &rule(&[TransformOp::Modulo { lhs: 1, rhs: 2, dest: 0 }]),
            vec![root, lhs, rhs],
            &mut diagnostics,
        )
        .unwrap();

        assert_eq!(diagnostics.messages().len(), 1);
        assert!(arena.get_floating_point(captures[0]).unwrap().is_nan());
    }

    #[test]
    fn shift_amount_out_of_range_is_masked_with_one_warning() {
        let mut arena = Arena::new();
        let root = arena.new_node(NodeKind::ShiftLeft);
        let lhs = arena.new_integer(1);
        let rhs = arena.new_integer(33);
        arena.append_child(root, lhs);
        arena.append_child(root, rhs);

        let mut diagnostics = Diagnostics::new();
        let captures = apply(
            &mut arena,
            &rule(&[TransformOp::ShiftLeft { lhs: 1, rhs: 2, dest: 0 }]),
            vec![root, lhs, rhs],
            &mut diagnostics,
        )
        .unwrap();

        assert_eq!(diagnostics.messages().len(), 1);
        assert!(diagnostics.messages()[0].message.contains("33"));
        // 33 & 0x1F == 1, so `1 << 33` behaves like `1 << 1`.
        assert_eq!(arena.get_integer(captures[0]), Some(2));
    }

    #[test]
    fn swap_exchanges_two_children_of_the_same_parent() {
        let mut arena = Arena::new();
        let parent = arena.new_node(NodeKind::List);
        let a = arena.new_integer(1);
        let b = arena.new_integer(2);
        arena.append_child(parent, a);
        arena.append_child(parent, b);

        run(&mut arena, vec![a, b], &[TransformOp::Swap { a: 0, b: 1 }]);

        assert_eq!(arena.get_child(parent, 0), Some(b));
        assert_eq!(arena.get_child(parent, 1), Some(a));
        assert_eq!(arena.get_parent(a), Some(parent));
        assert_eq!(arena.get_parent(b), Some(parent));
    }

    #[test]
    fn remove_at_index_zero_marks_the_root_unknown() {
        let mut arena = Arena::new();
        let root = arena.new_node(NodeKind::DoWhile);
        let body = arena.new_node(NodeKind::Block);
        let cond = arena.new_node(NodeKind::False);
        arena.append_child(root, body);
        arena.append_child(root, cond);

        let captures = run(
            &mut arena,
            vec![root, body, cond],
            &[TransformOp::Remove { index: 2 }, TransformOp::SetNodeType { index: 0, kind: NodeKind::Block }],
        );

        assert_eq!(arena.get_type(captures[0]), NodeKind::Block);
        assert_eq!(arena.get_children_size(captures[0]), 1);
        assert_eq!(arena.get_child(captures[0], 0), Some(body));
    }

    #[test]
    fn to_conditional_builds_a_three_child_conditional_node() {
        let mut arena = Arena::new();
        let root = arena.new_node(NodeKind::If);
        let cond = arena.new_node(NodeKind::True);
        let then_branch = arena.new_integer(1);
        let else_branch = arena.new_integer(2);
        arena.append_child(root, cond);
        arena.append_child(root, then_branch);
        arena.append_child(root, else_branch);

        let captures = run(
            &mut arena,
            vec![root, cond, then_branch, else_branch],
            &[TransformOp::ToConditional { cond: 1, then_branch: 2, else_branch: 3, dest: 0 }],
        );

        assert_eq!(arena.get_type(captures[0]), NodeKind::Conditional);
        assert_eq!(arena.get_children_size(captures[0]), 3);
    }

    #[test]
    fn while_true_to_forever_wraps_the_body_in_an_empty_for_loop() {
        let mut arena = Arena::new();
        let root = arena.new_node(NodeKind::While);
        let truth = arena.new_node(NodeKind::True);
        let body = arena.new_node(NodeKind::Block);
        arena.append_child(root, truth);
        arena.append_child(root, body);

        let captures = run(&mut arena, vec![root, truth, body], &[TransformOp::WhileTrueToForever { src: 2, dest: 0 }]);

        assert_eq!(arena.get_type(captures[0]), NodeKind::For);
        assert_eq!(arena.get_children_size(captures[0]), 4);
        for slot in 0..3 {
            assert_eq!(arena.get_type(arena.get_child(captures[0], slot).unwrap()), NodeKind::Empty);
        }
        assert_eq!(arena.get_child(captures[0], 3), Some(body));
    }

    #[test]
    fn match_succeeds_against_a_matching_regex_literal() {
        let mut arena = Arena::new();
        let root = arena.new_node(NodeKind::Match);
        let haystack = arena.new_string("hello world");
        let pattern = arena.new_string("/he.*/");
        arena.append_child(root, haystack);
        arena.append_child(root, pattern);

        let captures = run(&mut arena, vec![root, haystack, pattern], &[TransformOp::Match { lhs: 1, rhs: 2, dest: 0 }]);

        assert_eq!(arena.get_type(captures[0]), NodeKind::True);
    }

    #[test]
    fn match_with_an_invalid_regex_synthesizes_a_throw_and_emits_an_error() {
        let mut arena = Arena::new();
        let root = arena.new_node(NodeKind::Match);
        let haystack = arena.new_string("x");
        let pattern = arena.new_string("/[/");
        arena.append_child(root, haystack);
        arena.append_child(root, pattern);

        let mut diagnostics = Diagnostics::new();
        let captures = apply(
            &mut arena,
            &rule(&[TransformOp::Match { lhs: 1, rhs: 2, dest: 0 }]),
            vec![root, haystack, pattern],
            &mut diagnostics,
        )
        .unwrap();

        assert_eq!(diagnostics.error_count(), 1);
        assert_eq!(arena.get_type(captures[0]), NodeKind::Throw);
    }

    #[test]
    fn smart_match_normalizes_whitespace_before_comparing() {
        let mut arena = Arena::new();
        let root = arena.new_node(NodeKind::SmartMatch);
        let lhs = arena.new_string("  hello   world  ");
        let rhs = arena.new_string("hello world");
        arena.append_child(root, lhs);
        arena.append_child(root, rhs);

        let captures = run(&mut arena, vec![root, lhs, rhs], &[TransformOp::SmartMatch { lhs: 1, rhs: 2, dest: 0 }]);

        assert_eq!(arena.get_type(captures[0]), NodeKind::True);
    }
}
