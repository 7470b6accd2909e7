//! Property tests for the invariants in spec.md §8: P1 (well-formedness),
//! P2 (semantic equivalence, checked here against a tiny reference
//! evaluator for pure integer arithmetic), P4 (idempotence), and P5 (no
//! spontaneous diagnostics on inputs with nothing unsafe to warn about).

use proptest::prelude::*;

use tree_rewrite::diagnostics::Diagnostics;
use tree_rewrite::node::{Arena, NodeId, NodeKind};
use tree_rewrite::options::Options;

#[derive(Debug, Clone)]
enum Expr {
    Literal(i64),
    Add(Box<Expr>, Box<Expr>),
    Subtract(Box<Expr>, Box<Expr>),
    Multiply(Box<Expr>, Box<Expr>),
}

fn arbitrary_expr() -> impl Strategy<Value = Expr> {
    let leaf = (-1000i64..1000).prop_map(Expr::Literal);
    leaf.prop_recursive(4, 64, 4, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(a, b)| Expr::Add(Box::new(a), Box::new(b))),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| Expr::Subtract(Box::new(a), Box::new(b))),
            (inner.clone(), inner).prop_map(|(a, b)| Expr::Multiply(Box::new(a), Box::new(b))),
        ]
    })
}

fn build(arena: &mut Arena, expr: &Expr) -> NodeId {
    match expr {
        Expr::Literal(value) => arena.new_integer(*value),
        Expr::Add(lhs, rhs) => {
            let l = build(arena, lhs);
            let r = build(arena, rhs);
            let node = arena.new_node(NodeKind::Add);
            arena.append_child(node, l);
            arena.append_child(node, r);
            node
        }
        Expr::Subtract(lhs, rhs) => {
            let l = build(arena, lhs);
            let r = build(arena, rhs);
            let node = arena.new_node(NodeKind::Subtract);
            arena.append_child(node, l);
            arena.append_child(node, r);
            node
        }
        Expr::Multiply(lhs, rhs) => {
            let l = build(arena, lhs);
            let r = build(arena, rhs);
            let node = arena.new_node(NodeKind::Multiply);
            arena.append_child(node, l);
            arena.append_child(node, r);
            node
        }
    }
}

fn eval(expr: &Expr) -> i64 {
    match expr {
        Expr::Literal(value) => *value,
        Expr::Add(lhs, rhs) => eval(lhs).wrapping_add(eval(rhs)),
        Expr::Subtract(lhs, rhs) => eval(lhs).wrapping_sub(eval(rhs)),
        Expr::Multiply(lhs, rhs) => eval(lhs).wrapping_mul(eval(rhs)),
    }
}

fn assert_well_formed(arena: &Arena, node: NodeId) {
    for (offset, child) in arena.children(node).iter().enumerate() {
        assert_eq!(arena.get_parent(*child), Some(node));
        assert_eq!(arena.get_offset(*child), offset);
        assert_well_formed(arena, *child);
    }
}

fn wrapped_program(arena: &mut Arena, expr: &Expr) -> NodeId {
    let root = build(arena, expr);
    let program = arena.new_node(NodeKind::Block);
    arena.append_child(program, root);
    program
}

/// Builds `Equal(Identifier "x", Integer(value))` under a `Block`, so each
/// case below can assert the identifier operand blocks the fold.
fn equal_identifier_and_literal(arena: &mut Arena, value: i64) -> NodeId {
    let equal = arena.new_node(NodeKind::Equal);
    let identifier = arena.new_node(NodeKind::Identifier);
    arena.set_string(identifier, "x");
    let literal = arena.new_integer(value);
    arena.append_child(equal, identifier);
    arena.append_child(equal, literal);
    let program = arena.new_node(NodeKind::Block);
    arena.append_child(program, equal);
    program
}

proptest! {
    #[test]
    fn equal_against_an_identifier_never_folds(value in any::<i64>()) {
        let mut arena = Arena::new();
        let program = equal_identifier_and_literal(&mut arena, value);
        let mut diagnostics = Diagnostics::new();
        tree_rewrite::optimize(&mut arena, program, &Options::new(), &mut diagnostics).unwrap();

        // An identifier's runtime value is unknown, so `x == <literal>`
        // must survive as an `Equal` node, never `True`/`False`.
        let result = arena.get_child(program, 0).unwrap();
        prop_assert_eq!(arena.get_type(result), NodeKind::Equal);
    }
}

proptest! {
    #[test]
    fn optimize_preserves_tree_well_formedness(expr in arbitrary_expr()) {
        let mut arena = Arena::new();
        let program = wrapped_program(&mut arena, &expr);
        let mut diagnostics = Diagnostics::new();
        tree_rewrite::optimize(&mut arena, program, &Options::new(), &mut diagnostics).unwrap();
        assert_well_formed(&arena, program);
    }

    #[test]
    fn optimize_is_idempotent(expr in arbitrary_expr()) {
        let mut arena = Arena::new();
        let program = wrapped_program(&mut arena, &expr);
        let options = Options::new();
        let mut diagnostics = Diagnostics::new();

        tree_rewrite::optimize(&mut arena, program, &options, &mut diagnostics).unwrap();
        let once = arena.get_integer(arena.get_child(program, 0).unwrap());

        tree_rewrite::optimize(&mut arena, program, &options, &mut diagnostics).unwrap();
        let twice = arena.get_integer(arena.get_child(program, 0).unwrap());

        prop_assert_eq!(once, twice);
    }

    #[test]
    fn pure_literal_arithmetic_never_emits_diagnostics(expr in arbitrary_expr()) {
        let mut arena = Arena::new();
        let program = wrapped_program(&mut arena, &expr);
        let mut diagnostics = Diagnostics::new();
        tree_rewrite::optimize(&mut arena, program, &Options::new(), &mut diagnostics).unwrap();
        prop_assert!(diagnostics.messages().is_empty());
    }

    #[test]
    fn folding_agrees_with_wrapping_integer_evaluation(expr in arbitrary_expr()) {
        let expected = eval(&expr);
        let mut arena = Arena::new();
        let program = wrapped_program(&mut arena, &expr);
        let mut diagnostics = Diagnostics::new();
        tree_rewrite::optimize(&mut arena, program, &Options::new(), &mut diagnostics).unwrap();

        let result = arena.get_child(program, 0).unwrap();
        prop_assert_eq!(arena.get_type(result), NodeKind::Integer);
        prop_assert_eq!(arena.get_integer(result), Some(expected));
    }
}
