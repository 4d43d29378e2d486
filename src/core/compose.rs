//! Serial and diverging composition.
//!
//! [`merge_serial`] fuses two nodes end-to-end, [`merge_diverging`] fans one
//! node's output into several receivers. Both are copy-on-compose: a node
//! whose chain head is consumed is copied with a fresh instance id first, so
//! the same declared transformer can appear in several pipelines (or twice in
//! one) without aliasing. The `>>` operator is sugar over these merges;
//! [`compose`] is the fallible entry point for dynamically assembled
//! operands.

use std::fmt;
use std::ops::Shr;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::node::{AsyncTransform, Node, Previous, Transform};
use crate::core::signature::Signature;
use crate::core::typing::{lenient_match, specify_types, Type, TypeMismatch};
use crate::core::{Behaviour, DynError, NodeValue};

/// A pipeline-construction failure. Raised synchronously while building,
/// never during execution.
#[derive(Debug, Error)]
pub enum CompositionError {
    /// An operand of `>>` was not a node (or a fan-out element was not).
    /// Names the offending value so the caller can identify which branch was
    /// malformed.
    #[error("unsupported composition argument: {value}")]
    UnsupportedArgument { value: String },
    /// Generic/concrete unification failed structurally where mismatches
    /// were not being ignored.
    #[error(transparent)]
    TypeMismatch(#[from] TypeMismatch),
}

/// A dynamically supplied composition operand: a node, a fan-out tuple of
/// operands, or an arbitrary non-node value kept for error reporting.
pub enum Operand {
    Node(Node),
    Fanout(Vec<Operand>),
    Other(NodeValue),
}

impl Operand {
    /// Wraps a non-node value, preserved verbatim for the
    /// [`CompositionError::UnsupportedArgument`] message.
    pub fn other(value: impl Into<NodeValue>) -> Self {
        Operand::Other(value.into())
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Node(node) => write!(f, "{node}"),
            Operand::Fanout(items) => {
                let formatted: Vec<String> = items.iter().map(Operand::to_string).collect();
                write!(f, "({})", formatted.join(", "))
            }
            Operand::Other(value) => write!(f, "{value}"),
        }
    }
}

impl From<Node> for Operand {
    fn from(node: Node) -> Self {
        Operand::Node(node)
    }
}

impl From<Vec<Node>> for Operand {
    fn from(nodes: Vec<Node>) -> Self {
        Operand::Fanout(nodes.into_iter().map(Operand::Node).collect())
    }
}

impl From<Vec<Operand>> for Operand {
    fn from(items: Vec<Operand>) -> Self {
        Operand::Fanout(items)
    }
}

/// Composes `current` with the next operand: serial for a single node,
/// diverging for a fan-out. The sole entry point behind the chaining
/// operator; validates dynamically assembled operands.
pub fn compose(current: Node, next: impl Into<Operand>) -> Result<Node, CompositionError> {
    match next.into() {
        Operand::Node(node) => Ok(merge_serial(current, node)),
        Operand::Fanout(items) => {
            let mut receivers = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Operand::Node(node) => receivers.push(node),
                    offending => {
                        return Err(CompositionError::UnsupportedArgument {
                            value: offending.to_string(),
                        });
                    }
                }
            }
            Ok(merge_diverging(current, receivers))
        }
        offending @ Operand::Other(_) => Err(CompositionError::UnsupportedArgument {
            value: offending.to_string(),
        }),
    }
}

// ----------------------------------------------------------------------
// Fused bodies
// ----------------------------------------------------------------------

/// `second.transform(first.transform(x))`
struct SerialSync {
    first: Node,
    second: Node,
}

impl Transform for SerialSync {
    fn apply(&self, input: NodeValue) -> Result<NodeValue, DynError> {
        let intermediate = self.first.transform(input)?;
        Ok(self.second.transform(intermediate)?)
    }
}

/// The async serial fusion. Awaits occur exactly at the boundaries where an
/// async component's result is needed by the next stage; sync components run
/// inline. Covers the async/sync, async/async and sync/async rows of the
/// strategy table.
struct SerialAsync {
    first: Node,
    second: Node,
}

#[async_trait]
impl AsyncTransform for SerialAsync {
    async fn apply(&self, input: NodeValue) -> Result<NodeValue, DynError> {
        let intermediate = self.first.transform_async(input).await?;
        Ok(self.second.transform_async(intermediate).await?)
    }
}

/// All-sync fan-out: resolve the incident, then each receiver in declared
/// order, collecting positionally into a tuple.
struct DivergingSync {
    incident: Node,
    receivers: Vec<Node>,
}

impl Transform for DivergingSync {
    fn apply(&self, input: NodeValue) -> Result<NodeValue, DynError> {
        let intermediate = self.incident.transform(input)?;
        let mut results = Vec::with_capacity(self.receivers.len());
        for receiver in &self.receivers {
            results.push(receiver.transform(intermediate.clone())?);
        }
        Ok(NodeValue::Array(results))
    }
}

/// Mixed fan-out. Receivers are evaluated strictly sequentially in the order
/// given, awaiting each async branch before starting the next; this ordering
/// is a documented guarantee, not an optimization detail.
struct DivergingAsync {
    incident: Node,
    receivers: Vec<Node>,
}

#[async_trait]
impl AsyncTransform for DivergingAsync {
    async fn apply(&self, input: NodeValue) -> Result<NodeValue, DynError> {
        let intermediate = self.incident.transform_async(input).await?;
        let mut results = Vec::with_capacity(self.receivers.len());
        for receiver in &self.receivers {
            results.push(receiver.transform_async(intermediate.clone()).await?);
        }
        Ok(NodeValue::Array(results))
    }
}

// ----------------------------------------------------------------------
// Serial composition
// ----------------------------------------------------------------------

/// Merges two nodes end-to-end: `first >> second`.
pub fn merge_serial(current: Node, next: Node) -> Node {
    // Head case: a not-yet-composed node is copied so the caller's value
    // stays reusable; a node already inside a chain is consumed as-is.
    let mut first = if current.previous().is_none() {
        current.copy(None, true)
    } else {
        current
    };
    let mut second = next.copy(None, true);

    let first_signature = first.signature().clone();
    let second_signature = second.signature().clone();

    // Matched in both directions so variables declared on either side of the
    // junction are captured in one table.
    let mut bindings = lenient_match(second_signature.input(), first_signature.output());
    bindings.extend(lenient_match(
        first_signature.output(),
        second_signature.input(),
    ));

    // Viewed from this composition, the upstream node's declared output is
    // now concrete.
    first.signature =
        first_signature.with_output(specify_types(first_signature.output(), &bindings));

    second.set_previous(Previous::Single(Box::new(first.clone())));

    // End-to-end view: the pipeline accepts the upstream input and produces
    // the downstream output, both specialized under the junction bindings.
    let composed_signature = Signature::new(
        specify_types(first_signature.input(), &bindings),
        specify_types(second_signature.output(), &bindings),
    );

    let length = first.unit_count() + second.unit_count();
    let behaviour = match (first.is_async(), second.is_async()) {
        (false, false) => Behaviour::Sync(Arc::new(SerialSync {
            first: first.clone(),
            second: second.clone(),
        })),
        // async/sync, async/async and sync/async all compose to an async
        // node; the fused body awaits only at the async boundaries.
        _ => Behaviour::Async(Arc::new(SerialAsync {
            first: first.clone(),
            second: second.clone(),
        })),
    };

    // The composed node presents itself as the downstream unit with the
    // upstream chain attached behind it.
    let mut composed = Node::with_behaviour(second.label().to_string(), composed_signature, behaviour);
    composed.invisible = second.invisible;
    composed.graph_node_props = second.graph_node_props.clone();
    composed.children = second.children.clone();
    composed.previous = second.previous.clone();
    composed.length = length;
    composed
}

// ----------------------------------------------------------------------
// Diverging composition
// ----------------------------------------------------------------------

fn join_graph_props() -> std::collections::HashMap<String, NodeValue> {
    std::collections::HashMap::from([("shape".to_string(), NodeValue::from("diamond"))])
}

/// Merges one incident node with N receivers into a fan-out node whose
/// output is the ordered N-tuple of the receivers' results.
pub fn merge_diverging(current: Node, receivers: Vec<Node>) -> Node {
    if receivers.is_empty() {
        log::warn!("diverging composition with no receivers produces an empty tuple");
    }

    let incident = if current.previous().is_none() {
        current.copy(None, true)
    } else {
        current
    };
    let incident_signature = incident.signature().clone();

    let mut copied: Vec<Node> = receivers
        .into_iter()
        .map(|receiver| receiver.copy(None, true))
        .collect();

    let mut receiving_outputs = Vec::with_capacity(copied.len());
    for receiver in &mut copied {
        receiver.set_previous(Previous::Single(Box::new(incident.clone())));

        // Each receiver binds independently; two branches may specialize the
        // same variable to different concrete types.
        let bindings = lenient_match(receiver.input_type(), incident_signature.output());
        let specialized_output = specify_types(receiver.signature().output(), &bindings);
        receiving_outputs.push(specialized_output.clone());

        // A chained receiver keeps its own resolved signature; the override
        // only applies when the incident is its direct predecessor.
        let directly_attached = matches!(
            receiver.previous(),
            Some(Previous::Single(prev)) if prev.id() == incident.id()
        );
        if directly_attached {
            receiver.signature = receiver.signature().with_output(specialized_output);
        }
    }

    let composed_signature = Signature::new(
        incident_signature.input().clone(),
        Type::tuple(receiving_outputs),
    );

    let length =
        incident.unit_count() + copied.iter().map(Node::unit_count).sum::<usize>();
    let all_sync = !incident.is_async() && copied.iter().all(|receiver| !receiver.is_async());
    let behaviour = if all_sync {
        Behaviour::Sync(Arc::new(DivergingSync {
            incident: incident.clone(),
            receivers: copied.clone(),
        }))
    } else {
        Behaviour::Async(Arc::new(DivergingAsync {
            incident: incident.clone(),
            receivers: copied.clone(),
        }))
    };

    // Synthetic converge node: unlabeled, join-shaped, with the receivers as
    // its backward edges so the DAG view can discover the fan-in point.
    let mut composed = Node::with_behaviour(String::new(), composed_signature, behaviour);
    composed.graph_node_props = join_graph_props();
    composed.previous = Some(Previous::Diverging(copied));
    composed.length = length;
    composed
}

// ----------------------------------------------------------------------
// The chaining operator
// ----------------------------------------------------------------------

impl Shr for Node {
    type Output = Node;

    fn shr(self, next: Node) -> Node {
        merge_serial(self, next)
    }
}

macro_rules! node_ty {
    ($name:ident) => {
        Node
    };
}

// Fan-out tuples of arity 2 through 7, matching the operator overloads the
// engine is specified to accept.
macro_rules! impl_diverging_shr {
    ($($name:ident),+) => {
        impl Shr<($(node_ty!($name),)+)> for Node {
            type Output = Node;

            #[allow(non_snake_case)]
            fn shr(self, ($($name,)+): ($(node_ty!($name),)+)) -> Node {
                merge_diverging(self, vec![$($name),+])
            }
        }
    };
}

impl_diverging_shr!(B, C);
impl_diverging_shr!(B, C, D);
impl_diverging_shr!(B, C, D, E);
impl_diverging_shr!(B, C, D, E, F);
impl_diverging_shr!(B, C, D, E, F, G);
impl_diverging_shr!(B, C, D, E, F, G, H);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sig(input: &str, output: &str) -> Signature {
        Signature::new(Type::concrete(input), Type::concrete(output))
    }

    fn double() -> Node {
        Node::new("Double", sig("int", "int"), |input: NodeValue| {
            Ok(json!(input.as_i64().unwrap_or(0) * 2))
        })
    }

    fn stringify() -> Node {
        Node::new("Stringify", sig("int", "str"), |input: NodeValue| {
            Ok(json!(input.to_string()))
        })
    }

    fn wrap_in_list() -> Node {
        // T -> list[T]
        Node::new(
            "WrapInList",
            Signature::new(
                Type::variable("T"),
                Type::parameterized("list", [Type::variable("T")]),
            ),
            |input: NodeValue| Ok(NodeValue::Array(vec![input])),
        )
    }

    #[test]
    fn test_serial_signature_propagation() {
        let composed = double() >> stringify();
        assert_eq!(composed.input_type(), &Type::concrete("int"));
        assert_eq!(composed.output_type(), &Type::concrete("str"));
        assert_eq!(composed.label(), "Stringify");
        assert_eq!(composed.unit_count(), 2);
    }

    #[test]
    fn test_serial_generic_specialization() {
        let composed = double() >> wrap_in_list();
        assert_eq!(composed.input_type(), &Type::concrete("int"));
        assert_eq!(
            composed.output_type(),
            &Type::parameterized("list", [Type::concrete("int")])
        );
    }

    #[test]
    fn test_serial_specializes_upstream_signature_in_chain() {
        let identity = Node::new(
            "Identity",
            Signature::new(Type::variable("T"), Type::variable("T")),
            |input: NodeValue| Ok(input),
        );
        let composed = identity >> double();

        let upstream = match composed.previous().unwrap() {
            Previous::Single(prev) => prev,
            Previous::Diverging(_) => panic!("expected single previous"),
        };
        assert_eq!(upstream.label(), "Identity");
        assert_eq!(upstream.output_type(), &Type::concrete("int"));
    }

    #[test]
    fn test_composition_does_not_mutate_operands() {
        let a = double();
        let a_instance = a.instance_id();
        let composed = a.clone() >> stringify();
        assert!(a.previous().is_none());

        // The head inside the composition is a fresh occurrence of A.
        let head = match composed.previous().unwrap() {
            Previous::Single(prev) => prev,
            Previous::Diverging(_) => panic!("expected single previous"),
        };
        assert_eq!(head.id(), a.id());
        assert_ne!(head.instance_id(), a_instance);
    }

    #[test]
    fn test_diverging_output_tuple_ordered() {
        let composed = double() >> (stringify(), double(), wrap_in_list());
        assert_eq!(composed.input_type(), &Type::concrete("int"));
        assert_eq!(
            composed.output_type(),
            &Type::tuple([
                Type::concrete("str"),
                Type::concrete("int"),
                Type::parameterized("list", [Type::concrete("int")]),
            ])
        );
        assert_eq!(composed.unit_count(), 4);
    }

    #[test]
    fn test_diverging_branches_bind_independently() {
        let int_source = double();
        // Both branches are generic; each binds T on its own.
        let composed = int_source >> (wrap_in_list(), wrap_in_list());
        assert_eq!(
            composed.output_type(),
            &Type::tuple([
                Type::parameterized("list", [Type::concrete("int")]),
                Type::parameterized("list", [Type::concrete("int")]),
            ])
        );
    }

    #[test]
    fn test_converge_node_shape() {
        let composed = double() >> (stringify(), double());
        assert_eq!(composed.label(), "");
        assert_eq!(
            composed.graph_node_props().get("shape"),
            Some(&json!("diamond"))
        );
        match composed.previous().unwrap() {
            Previous::Diverging(receivers) => {
                assert_eq!(receivers.len(), 2);
                assert_eq!(receivers[0].label(), "Stringify");
                assert_eq!(receivers[1].label(), "Double");
            }
            Previous::Single(_) => panic!("expected diverging previous"),
        }
    }

    #[test]
    fn test_compose_rejects_non_node_fanout_element() {
        let err = compose(
            double(),
            Operand::Fanout(vec![stringify().into(), Operand::other("not-a-node")]),
        )
        .unwrap_err();
        match err {
            CompositionError::UnsupportedArgument { value } => {
                assert_eq!(value, "\"not-a-node\"");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_compose_rejects_non_node_operand() {
        let err = compose(double(), Operand::other(42)).unwrap_err();
        assert!(matches!(
            err,
            CompositionError::UnsupportedArgument { .. }
        ));
    }

    #[test]
    fn test_compose_accepts_node_vec() {
        let composed = compose(double(), vec![stringify(), double()]).unwrap();
        assert_eq!(composed.unit_count(), 3);
    }

    #[test]
    fn test_serial_execution() {
        let composed = double() >> stringify();
        assert_eq!(composed.transform(json!(21)).unwrap(), json!("42"));
    }

    #[test]
    fn test_diverging_execution_sync() {
        let composed = double() >> (stringify(), double());
        assert_eq!(
            composed.transform(json!(3)).unwrap(),
            json!(["6", 12])
        );
    }

    #[test]
    fn test_strategy_selection() {
        let async_stringify = Node::from_future_fn("AsyncStringify", sig("int", "str"), |input| {
            Box::pin(async move { Ok(json!(input.to_string())) })
        });

        assert!(!(double() >> stringify()).is_async());
        assert!((double() >> async_stringify.copy(None, false)).is_async());
        assert!((async_stringify.copy(None, false) >> double()).is_async());
        assert!(
            (async_stringify.copy(None, false) >> async_stringify.copy(None, false)).is_async()
        );
        assert!((double() >> (stringify(), async_stringify)).is_async());
        assert!(!(double() >> (stringify(), double())).is_async());
    }
}
