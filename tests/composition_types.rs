//! Signature resolution across compositions: propagation, specialization,
//! associativity and the read-only graph surface.

use confluence::prelude::*;
use serde_json::json;

fn sig(input: &str, output: &str) -> Signature {
    Signature::new(Type::concrete(input), Type::concrete(output))
}

fn node(label: &str, input: &str, output: &str) -> Node {
    Node::new(label, sig(input, output), |input: NodeValue| Ok(input))
}

fn generic_wrap(label: &str, head: &str) -> Node {
    // T -> head[T]
    Node::new(
        label,
        Signature::new(
            Type::variable("T"),
            Type::parameterized(head, [Type::variable("T")]),
        ),
        |input: NodeValue| Ok(NodeValue::Array(vec![input])),
    )
}

#[test]
fn test_serial_composition_propagates_endpoint_types() {
    let composed = node("A", "int", "str") >> node("B", "str", "float");
    assert_eq!(composed.input_type(), &Type::concrete("int"));
    assert_eq!(composed.output_type(), &Type::concrete("float"));
}

#[test]
fn test_type_resolution_is_associative() {
    let left = (node("A", "int", "str") >> node("B", "str", "float")) >> node("C", "float", "bool");
    let right = node("A", "int", "str") >> (node("B", "str", "float") >> node("C", "float", "bool"));

    assert_eq!(left.input_type(), right.input_type());
    assert_eq!(left.output_type(), right.output_type());
    assert_eq!(left.unit_count(), right.unit_count());
}

#[test]
fn test_associativity_with_generics() {
    let left = (node("A", "int", "int") >> generic_wrap("Wrap", "list")) >> node("C", "list", "str");
    let right = node("A", "int", "int") >> (generic_wrap("Wrap", "list") >> node("C", "list", "str"));

    assert_eq!(left.input_type(), &Type::concrete("int"));
    assert_eq!(left.input_type(), right.input_type());
    // The middle unit's output never reaches the endpoint signature, so both
    // groupings agree on the composed output as well.
    assert_eq!(left.output_type(), right.output_type());
}

#[test]
fn test_generic_specialization_through_chain() {
    let composed = node("Ints", "int", "int") >> generic_wrap("Wrap", "list");
    assert_eq!(
        composed.output_type(),
        &Type::parameterized("list", [Type::concrete("int")])
    );
}

#[test]
fn test_copy_identity_contract() {
    let original = node("A", "int", "int");
    let copied = original.copy(None, true);
    assert_eq!(copied.id(), original.id());
    assert_ne!(copied.instance_id(), original.instance_id());
}

#[test]
fn test_diverging_output_is_ordered_tuple() {
    let composed = node("A", "int", "int")
        >> (
            node("B", "int", "str"),
            node("C", "int", "float"),
            node("D", "int", "bool"),
        );
    assert_eq!(
        composed.output_type(),
        &Type::tuple([
            Type::concrete("str"),
            Type::concrete("float"),
            Type::concrete("bool"),
        ])
    );
}

#[test]
fn test_diverging_receivers_specialize_independently() {
    let composed = node("A", "int", "int") >> (generic_wrap("W1", "list"), generic_wrap("W2", "set"));
    assert_eq!(
        composed.output_type(),
        &Type::tuple([
            Type::parameterized("list", [Type::concrete("int")]),
            Type::parameterized("set", [Type::concrete("int")]),
        ])
    );
}

#[test]
fn test_mismatched_junction_is_tolerated() {
    // Serial matching is lenient: structurally unrelated neighbours still
    // compose, binding nothing at the junction.
    let composed = node("A", "int", "int") >> generic_wrap("Wrap", "list") >> node("C", "str", "str");
    assert_eq!(composed.input_type(), &Type::concrete("int"));
    assert_eq!(composed.output_type(), &Type::concrete("str"));
}

// ----------------------------------------------------------------------
// Read-only graph surface
// ----------------------------------------------------------------------

#[test]
fn test_graph_nodes_discovers_whole_chain() {
    let composed = node("A", "int", "int") >> node("B", "int", "int") >> node("C", "int", "int");
    let nodes = composed.graph_nodes();

    let labels: Vec<&str> = nodes.values().map(|n| n.label()).collect();
    assert!(labels.contains(&"A"));
    assert!(labels.contains(&"B"));
    assert!(labels.contains(&"C"));
}

#[test]
fn test_graph_nodes_discovers_fan_in_point() {
    let composed = node("A", "int", "int") >> (node("B", "int", "str"), node("C", "int", "float"));

    match composed.previous().unwrap() {
        Previous::Diverging(receivers) => {
            assert_eq!(receivers.len(), 2);
            // Both receivers share the same incident occurrence.
            let incident_ids: Vec<_> = receivers
                .iter()
                .map(|r| match r.previous().unwrap() {
                    Previous::Single(prev) => prev.instance_id(),
                    Previous::Diverging(_) => panic!("receiver should have a single previous"),
                })
                .collect();
            assert_eq!(incident_ids[0], incident_ids[1]);
        }
        Previous::Single(_) => panic!("expected diverging previous"),
    }

    assert_eq!(composed.graph_node_props().get("shape"), Some(&json!("diamond")));
}

#[test]
fn test_display_repr_reflects_resolved_types() {
    let composed = node("A", "int", "int") >> generic_wrap("Wrap", "list");
    assert_eq!(composed.to_string(), "int -> (Wrap) -> list[int]");
}

#[test]
fn test_composed_node_remains_composable() {
    let left = node("A", "int", "int") >> node("B", "int", "int");
    let right = node("C", "int", "str");
    let whole = left >> right;
    assert_eq!(whole.unit_count(), 3);
    assert_eq!(whole.output_type(), &Type::concrete("str"));
}
