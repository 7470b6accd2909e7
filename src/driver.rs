//! Walks the AST bottom-up, tries every rule at each visited node, and
//! repeats until a full pass finds no applicable rule.
//!
//! Per spec.md §9's Open Question, this driver **continues** the rule scan
//! after a successful rewrite at a node rather than restarting it from the
//! first category — both choices preserve termination (P3), and this one
//! is cheaper on the common case of a node matching only one rule. See
//! `DESIGN.md` for the recorded rationale.

use thiserror::Error;

use crate::diagnostics::Diagnostics;
use crate::matcher::{self, MatchError};
use crate::node::{Arena, NodeId, NodeKind};
use crate::options::Options;
use crate::rules::RULES;
use crate::transform::{self, TransformError};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InternalError {
    #[error("rule {rule:?} matched node {node} which has no parent")]
    ParentlessMatch { rule: &'static str, node: NodeId },
    #[error("rule {rule:?} pattern exceeded the supported depth")]
    Match { rule: &'static str, source: MatchError },
    #[error("rule {rule:?} failed to apply: {source}")]
    Transform { rule: &'static str, source: TransformError },
}

/// `optimize(root)` from spec.md §6: rewrites the tree reachable from
/// `root` in place and returns the number of ERROR/FATAL diagnostics
/// emitted during the call. `root` is typically wrapped in a container
/// node (e.g. a `Block`) by the caller so that a rewrite of `root` itself
/// — rare, since rules target specific operator/statement kinds, never a
/// bare container — still has somewhere to attach its replacement.
pub fn optimize(
    arena: &mut Arena,
    root: NodeId,
    options: &Options,
    diagnostics: &mut Diagnostics,
) -> Result<u32, InternalError> {
    let errors_before = diagnostics.error_count();
    optimize_node(arena, root, options, diagnostics)?;
    arena.clean_tree(root);
    Ok(diagnostics.error_count() - errors_before)
}

fn optimize_node(
    arena: &mut Arena,
    node: NodeId,
    options: &Options,
    diagnostics: &mut Diagnostics,
) -> Result<(), InternalError> {
    if arena.get_type(node) == NodeKind::Unknown {
        return Ok(());
    }

    // Post-order: optimize children first. The child count is read once,
    // up front — a rewrite of an earlier child may change `node`'s child
    // count, but children shifted in by that rewrite are picked up by a
    // later pass over `node`, not re-visited within this same recursion.
    let children_count = arena.get_children_size(node);
    for slot in 0..children_count {
        if let Some(child) = arena.get_child(node, slot) {
            optimize_node(arena, child, options, diagnostics)?;
        }
    }

    let mut current = node;
    loop {
        let mut rewritten = false;
        for category in &RULES.categories {
            for rule in category.rules {
                if arena.get_type(current) == NodeKind::Unknown {
                    return Ok(());
                }
                if rule.safety.requires_unsafe_math() && !options.unsafe_math() {
                    diagnostics.record_skipped_unsafe(current);
                    continue;
                }
                if rule.safety.requires_unsafe_object() && !options.unsafe_object() {
                    diagnostics.record_skipped_unsafe(current);
                    continue;
                }

                let captures = matcher::try_match(arena, current, rule)
                    .map_err(|source| InternalError::Match { rule: rule.name, source })?;
                let Some(captures) = captures else {
                    continue;
                };

                if arena.get_parent(current).is_none() {
                    return Err(InternalError::ParentlessMatch { rule: rule.name, node: current });
                }
                let parent = arena.get_parent(current).unwrap();
                let offset = arena.get_offset(current);

                transform::apply(arena, rule, captures, diagnostics)
                    .map_err(|source| InternalError::Transform { rule: rule.name, source })?;

                // The rewrite frequently replaces `current` with a
                // different node; re-fetch it from its parent at the
                // offset it used to occupy.
                current = arena.get_child(parent, offset).unwrap_or(current);
                rewritten = true;
            }
        }
        if !rewritten {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;

    fn wrapped(arena: &mut Arena, expression: NodeId) -> NodeId {
        let program = arena.new_node(NodeKind::Block);
        arena.append_child(program, expression);
        program
    }

    #[test]
    fn folds_a_literal_addition() {
        let mut arena = Arena::new();
        let add = arena.new_node(NodeKind::Add);
        let three = arena.new_integer(3);
        let four = arena.new_integer(4);
        arena.append_child(add, three);
        arena.append_child(add, four);
        let program = wrapped(&mut arena, add);

        let options = Options::new();
        let mut diagnostics = Diagnostics::new();
        let errors = optimize(&mut arena, program, &options, &mut diagnostics).unwrap();

        assert_eq!(errors, 0);
        let result = arena.get_child(program, 0).unwrap();
        assert_eq!(arena.get_type(result), NodeKind::Integer);
        assert_eq!(arena.get_integer(result), Some(7));
    }

    #[test]
    fn folds_nested_additions_bottom_up() {
        let mut arena = Arena::new();
        let inner = arena.new_node(NodeKind::Add);
        let one = arena.new_integer(1);
        let two = arena.new_integer(2);
        arena.append_child(inner, one);
        arena.append_child(inner, two);

        let outer = arena.new_node(NodeKind::Add);
        let ten = arena.new_integer(10);
        arena.append_child(outer, inner);
        arena.append_child(outer, ten);
        let program = wrapped(&mut arena, outer);

        let options = Options::new();
        let mut diagnostics = Diagnostics::new();
        optimize(&mut arena, program, &options, &mut diagnostics).unwrap();

        let result = arena.get_child(program, 0).unwrap();
        assert_eq!(arena.get_type(result), NodeKind::Integer);
        assert_eq!(arena.get_integer(result), Some(13));
    }

    #[test]
    fn divide_by_zero_emits_one_warning_and_no_errors() {
        let mut arena = Arena::new();
        let divide = arena.new_node(NodeKind::Divide);
        let ten = arena.new_integer(10);
        let zero = arena.new_integer(0);
        arena.append_child(divide, ten);
        arena.append_child(divide, zero);
        let program = wrapped(&mut arena, divide);

        let options = Options::new();
        let mut diagnostics = Diagnostics::new();
        let errors = optimize(&mut arena, program, &options, &mut diagnostics).unwrap();

        assert_eq!(errors, 0);
        assert_eq!(diagnostics.messages().len(), 1);
        let result = arena.get_child(program, 0).unwrap();
        assert_eq!(arena.get_type(result), NodeKind::FloatingPoint);
        assert_eq!(arena.get_floating_point(result), Some(f64::INFINITY));
    }

    #[test]
    fn while_true_becomes_a_forever_for_loop() {
        let mut arena = Arena::new();
        let while_node = arena.new_node(NodeKind::While);
        let truth = arena.new_node(NodeKind::True);
        let body = arena.new_node(NodeKind::Block);
        arena.append_child(while_node, truth);
        arena.append_child(while_node, body);
        let program = wrapped(&mut arena, while_node);

        let options = Options::new();
        let mut diagnostics = Diagnostics::new();
        optimize(&mut arena, program, &options, &mut diagnostics).unwrap();

        let result = arena.get_child(program, 0).unwrap();
        assert_eq!(arena.get_type(result), NodeKind::For);
        assert_eq!(arena.get_children_size(result), 4);
        assert_eq!(arena.get_child(result, 3), Some(body));
    }

    #[test]
    fn unsafe_object_rules_stay_gated_off_by_default() {
        let mut arena = Arena::new();
        let add = arena.new_node(NodeKind::Add);
        let name = arena.new_node(NodeKind::Identifier);
        arena.set_string(name, "x");
        let zero = arena.new_integer(0);
        arena.append_child(add, name);
        arena.append_child(add, zero);
        let program = wrapped(&mut arena, add);

        let options = Options::new();
        let mut diagnostics = Diagnostics::new();
        optimize(&mut arena, program, &options, &mut diagnostics).unwrap();

        // `eliminate_add_zero` is gated behind unsafe-object, which
        // defaults to closed, so the Add node must survive unfolded.
        let result = arena.get_child(program, 0).unwrap();
        assert_eq!(arena.get_type(result), NodeKind::Add);
    }

    #[test]
    fn unsafe_object_rules_fire_once_the_gate_is_opened() {
        let mut arena = Arena::new();
        let add = arena.new_node(NodeKind::Add);
        let name = arena.new_node(NodeKind::Identifier);
        arena.set_string(name, "x");
        let zero = arena.new_integer(0);
        arena.append_child(add, name);
        arena.append_child(add, zero);
        let program = wrapped(&mut arena, add);

        let options = Options::new().with_unsafe_object(true);
        let mut diagnostics = Diagnostics::new();
        optimize(&mut arena, program, &options, &mut diagnostics).unwrap();

        let result = arena.get_child(program, 0).unwrap();
        assert_eq!(arena.get_type(result), NodeKind::Identifier);
        assert_eq!(result, name);
    }

    #[test]
    fn running_optimize_twice_is_idempotent() {
        let mut arena = Arena::new();
        let add = arena.new_node(NodeKind::Add);
        let three = arena.new_integer(3);
        let four = arena.new_integer(4);
        arena.append_child(add, three);
        arena.append_child(add, four);
        let program = wrapped(&mut arena, add);

        let options = Options::new();
        let mut diagnostics = Diagnostics::new();
        optimize(&mut arena, program, &options, &mut diagnostics).unwrap();
        let once = arena.get_integer(arena.get_child(program, 0).unwrap());

        optimize(&mut arena, program, &options, &mut diagnostics).unwrap();
        let twice = arena.get_integer(arena.get_child(program, 0).unwrap());

        assert_eq!(once, twice);
    }

    #[test]
    fn invalid_regex_synthesizes_a_throw_and_counts_as_an_error() {
        let mut arena = Arena::new();
        let match_node = arena.new_node(NodeKind::Match);
        let haystack = arena.new_string("x");
        let pattern = arena.new_string("/[/");
        arena.append_child(match_node, haystack);
        arena.append_child(match_node, pattern);
        let program = wrapped(&mut arena, match_node);

        let options = Options::new();
        let mut diagnostics = Diagnostics::new();
        let errors = optimize(&mut arena, program, &options, &mut diagnostics).unwrap();

        assert_eq!(errors, 1);
        let result = arena.get_child(program, 0).unwrap();
        assert_eq!(arena.get_type(result), NodeKind::Throw);
    }
}
