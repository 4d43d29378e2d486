//! Small general-purpose transformer nodes.

use thiserror::Error;

use crate::core::node::Node;
use crate::core::signature::Signature;
use crate::core::typing::Type;
use crate::core::{DynError, NodeValue};

/// Raised by [`forward`] when it receives a null value.
#[derive(Debug, Error)]
#[error("input data cannot be null")]
pub struct NullInputError;

/// An invisible identity node: passes its input through unchanged. Rejects
/// null input. The visualization layer routes edges around it via
/// `visible_previous`.
pub fn forward(input_type: Type) -> Node {
    let mut node = Node::new(
        "forward",
        Signature::new(input_type.clone(), input_type),
        |input: NodeValue| {
            if input.is_null() {
                return Err(Box::new(NullInputError) as DynError);
            }
            Ok(input)
        },
    );
    node.invisible = true;
    node
}

/// Transforms any input into null.
pub fn forget() -> Node {
    Node::new(
        "forget",
        Signature::new(Type::concrete("Any"), Type::concrete("None")),
        |_input: NodeValue| Ok(NodeValue::Null),
    )
}

/// Applies `inner` to the input while also forwarding the original value:
/// the result is the pair `(inner's output, input)`.
pub fn forward_incoming(inner: Node) -> Node {
    let input_type = inner.input_type().clone();
    forward(input_type.clone()) >> (inner, forward(input_type))
}
