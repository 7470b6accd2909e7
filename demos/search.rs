use tree_rewrite::diagnostics::Diagnostics;
use tree_rewrite::node::{Arena, NodeKind};
use tree_rewrite::options::Options;

/// Builds `Math.max(2 ** 0, 10 / 0) + (x + 0)` and hands it to `optimize`,
/// exercising a constant fold, a divide-by-zero warning, and an
/// unsafe-object-gated simplification all in one tree.
fn main() {
    let mut arena = Arena::new();

    let power = arena.new_node(NodeKind::Power);
    let two = arena.new_integer(2);
    let zero_exp = arena.new_integer(0);
    arena.append_child(power, two);
    arena.append_child(power, zero_exp);

    let divide = arena.new_node(NodeKind::Divide);
    let ten = arena.new_integer(10);
    let zero_divisor = arena.new_integer(0);
    arena.append_child(divide, ten);
    arena.append_child(divide, zero_divisor);

    let call = arena.new_node(NodeKind::Call);
    let math_max = arena.new_node(NodeKind::Identifier);
    arena.set_string(math_max, "Math.max");
    let args = arena.new_node(NodeKind::List);
    arena.append_child(args, power);
    arena.append_child(args, divide);
    arena.append_child(call, math_max);
    arena.append_child(call, args);

    let add_x = arena.new_node(NodeKind::Add);
    let x = arena.new_node(NodeKind::Identifier);
    arena.set_string(x, "x");
    let zero = arena.new_integer(0);
    arena.append_child(add_x, x);
    arena.append_child(add_x, zero);

    let sum = arena.new_node(NodeKind::Add);
    arena.append_child(sum, call);
    arena.append_child(sum, add_x);

    let program = arena.new_node(NodeKind::Block);
    arena.append_child(program, sum);

    let mut diagnostics = Diagnostics::new();
    let errors = tree_rewrite::optimize(&mut arena, program, &Options::new(), &mut diagnostics).unwrap();

    let result = arena.get_child(program, 0).unwrap();
    println!("result kind: {:?}", arena.get_type(result));
    println!("errors: {errors}, diagnostics: {:?}", diagnostics.messages());

    // `x + 0` survives unfolded: unsafe-object is closed by default.
    println!("--- re-running with unsafe-object enabled ---");
    let mut arena = Arena::new();
    let add_x = arena.new_node(NodeKind::Add);
    let x = arena.new_node(NodeKind::Identifier);
    arena.set_string(x, "x");
    let zero = arena.new_integer(0);
    arena.append_child(add_x, x);
    arena.append_child(add_x, zero);
    let program = arena.new_node(NodeKind::Block);
    arena.append_child(program, add_x);

    let options = Options::new().with_unsafe_object(true);
    let mut diagnostics = Diagnostics::new();
    tree_rewrite::optimize(&mut arena, program, &options, &mut diagnostics).unwrap();
    let result = arena.get_child(program, 0).unwrap();
    println!("result kind: {:?}", arena.get_type(result));
}
