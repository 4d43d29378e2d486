//! The transformer node model.
//!
//! A [`Node`] is a single-input/single-output unit of work: a resolved
//! [`Signature`], an execution [`Behaviour`] (sync or async), identity, and
//! the backward DAG edges (`previous`) plus grouping metadata the
//! visualization layer reads. Composition never mutates a node that may
//! still be referenced elsewhere; it copies first (see [`Node::copy`]).

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use futures::future::BoxFuture;
use thiserror::Error;
use uuid::Uuid;

use crate::core::signature::Signature;
use crate::core::typing::Type;
use crate::core::{Behaviour, DynError, NodeValue};

/// A synchronous transform body: accepts one value, returns one value.
///
/// The engine consumes only this contract; it never inspects the
/// implementation. Any `Fn(NodeValue) -> Result<NodeValue, DynError>` closure
/// qualifies through the blanket impl.
pub trait Transform: Send + Sync {
    fn apply(&self, input: NodeValue) -> Result<NodeValue, DynError>;
}

impl<F> Transform for F
where
    F: Fn(NodeValue) -> Result<NodeValue, DynError> + Send + Sync,
{
    fn apply(&self, input: NodeValue) -> Result<NodeValue, DynError> {
        self(input)
    }
}

/// An asynchronous transform body: accepts one value, resolves to one value.
#[async_trait]
pub trait AsyncTransform: Send + Sync {
    async fn apply(&self, input: NodeValue) -> Result<NodeValue, DynError>;
}

/// Adapter turning a future-returning closure into an [`AsyncTransform`],
/// for callers without a named trait impl (see [`Node::from_future_fn`]).
pub struct FutureFnTransform<F>(pub F);

#[async_trait]
impl<F> AsyncTransform for FutureFnTransform<F>
where
    F: Fn(NodeValue) -> BoxFuture<'static, Result<NodeValue, DynError>> + Send + Sync,
{
    async fn apply(&self, input: NodeValue) -> Result<NodeValue, DynError> {
        (self.0)(input).await
    }
}

/// Backward edge(s) of a node in the pipeline DAG.
///
/// `Diverging` occurs only on the synthetic converge node produced by fan-out
/// composition, where it holds the receiving branches.
#[derive(Clone)]
pub enum Previous {
    Single(Box<Node>),
    Diverging(Vec<Node>),
}

/// Execution failure surfaced by a pipeline invocation.
#[derive(Debug, Error)]
pub enum TransformError {
    /// A unit's transform body failed. The unit's own error is preserved as
    /// the source so callers observe the original type and message; the
    /// enrichment identifies which named unit raised it.
    #[error("an error occurred in transformer \"{raiser}\": {source}")]
    Unit {
        raiser: String,
        raiser_instance_id: Uuid,
        #[source]
        source: DynError,
    },
    /// An asynchronous node was invoked through the synchronous entry point.
    #[error("transformer \"{label}\" is asynchronous; invoke it with transform_async")]
    NotSync { label: String },
}

impl TransformError {
    /// The label of the unit that raised the error, if any.
    pub fn raiser(&self) -> Option<&str> {
        match self {
            TransformError::Unit { raiser, .. } => Some(raiser),
            TransformError::NotSync { .. } => None,
        }
    }

    /// The instance id of the raising unit, if any.
    pub fn raiser_instance_id(&self) -> Option<Uuid> {
        match self {
            TransformError::Unit { raiser_instance_id, .. } => Some(*raiser_instance_id),
            TransformError::NotSync { .. } => None,
        }
    }

    /// Consumes the error, returning the unit's original boxed error.
    pub fn into_source(self) -> Option<DynError> {
        match self {
            TransformError::Unit { source, .. } => Some(source),
            TransformError::NotSync { .. } => None,
        }
    }
}

/// A transformer unit, composable with `>>`.
pub struct Node {
    /// Stable across copies of the same declared transformer.
    pub(crate) id: Uuid,
    /// Unique per occurrence in a pipeline; regenerated on copy-into-composition.
    pub(crate) instance_id: Uuid,
    pub(crate) label: String,
    pub(crate) invisible: bool,
    pub(crate) graph_node_props: HashMap<String, NodeValue>,
    pub(crate) previous: Option<Previous>,
    pub(crate) children: Vec<Node>,
    pub(crate) signature: Signature,
    pub(crate) behaviour: Behaviour,
    /// Count of underlying units, for diagnostics.
    pub(crate) length: usize,
}

impl Clone for Node {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            instance_id: self.instance_id,
            label: self.label.clone(),
            invisible: self.invisible,
            graph_node_props: self.graph_node_props.clone(),
            previous: self.previous.clone(),
            children: self.children.clone(),
            signature: self.signature.clone(),
            behaviour: self.behaviour.clone(),
            length: self.length,
        }
    }
}

fn default_graph_props() -> HashMap<String, NodeValue> {
    HashMap::from([("shape".to_string(), NodeValue::from("box"))])
}

impl Node {
    /// Creates a synchronous node with the given label, signature and
    /// transform closure.
    pub fn new<F>(label: impl Into<String>, signature: Signature, transform: F) -> Self
    where
        F: Fn(NodeValue) -> Result<NodeValue, DynError> + Send + Sync + 'static,
    {
        Self::from_transform(label, signature, transform)
    }

    /// Creates a synchronous node from a named [`Transform`] implementation.
    pub fn from_transform<T>(label: impl Into<String>, signature: Signature, transform: T) -> Self
    where
        T: Transform + 'static,
    {
        Self::with_behaviour(label, signature, Behaviour::Sync(std::sync::Arc::new(transform)))
    }

    /// Creates an asynchronous node with the given label, signature and
    /// transform body.
    pub fn new_async<T>(label: impl Into<String>, signature: Signature, transform: T) -> Self
    where
        T: AsyncTransform + 'static,
    {
        let mut node =
            Self::with_behaviour(label, signature, Behaviour::Async(std::sync::Arc::new(transform)));
        node.graph_node_props
            .insert("isAsync".to_string(), NodeValue::from(true));
        node
    }

    /// Creates an asynchronous node from a boxed-future-returning closure.
    pub fn from_future_fn<F>(label: impl Into<String>, signature: Signature, transform: F) -> Self
    where
        F: Fn(NodeValue) -> BoxFuture<'static, Result<NodeValue, DynError>>
            + Send
            + Sync
            + 'static,
    {
        Self::new_async(label, signature, FutureFnTransform(transform))
    }

    pub(crate) fn with_behaviour(
        label: impl Into<String>,
        signature: Signature,
        behaviour: Behaviour,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            instance_id: Uuid::new_v4(),
            label: label.into(),
            invisible: false,
            graph_node_props: default_graph_props(),
            previous: None,
            children: Vec::new(),
            signature,
            behaviour,
            length: 1,
        }
    }

    // ------------------------------------------------------------------
    // Read-only surface (decorator layer, ensure-DSL, visualization)
    // ------------------------------------------------------------------

    /// Stable id shared by copies of the same declared transformer.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Id unique to this occurrence in a pipeline.
    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    /// String form of the instance id, used as the graph node key.
    pub fn node_id(&self) -> String {
        self.instance_id.to_string()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn invisible(&self) -> bool {
        self.invisible
    }

    pub fn graph_node_props(&self) -> &HashMap<String, NodeValue> {
        &self.graph_node_props
    }

    pub fn previous(&self) -> Option<&Previous> {
        self.previous.as_ref()
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// The node's current effective signature, reflecting any specialization
    /// applied during composition.
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn input_type(&self) -> &Type {
        self.signature.input()
    }

    pub fn output_type(&self) -> &Type {
        self.signature.output()
    }

    /// Human-readable form of the input type.
    pub fn input_annotation(&self) -> String {
        self.input_type().to_string()
    }

    /// Human-readable form of the output type.
    pub fn output_annotation(&self) -> String {
        self.output_type().to_string()
    }

    /// True if invoking this node requires an async context.
    pub fn is_async(&self) -> bool {
        self.behaviour.is_async()
    }

    /// Number of underlying units composed into this node.
    pub fn unit_count(&self) -> usize {
        self.length
    }

    /// The nearest visible predecessor(s), skipping invisible single-chain
    /// nodes. Used by the visualization layer to route edges around hidden
    /// helper nodes.
    pub fn visible_previous(&self) -> Option<&Previous> {
        match self.previous.as_ref() {
            Some(Previous::Single(prev)) if prev.invisible => match prev.previous.as_ref() {
                None => self.previous.as_ref(),
                Some(Previous::Diverging(_)) => prev.previous.as_ref(),
                Some(Previous::Single(_)) => prev.visible_previous(),
            },
            other => other,
        }
    }

    /// Every node reachable through `previous` and `children`, keyed by
    /// instance id. Copies that share an instance id collapse to one entry.
    pub fn graph_nodes(&self) -> HashMap<Uuid, &Node> {
        let mut nodes = HashMap::new();
        self.collect_graph_nodes(&mut nodes);
        nodes
    }

    fn collect_graph_nodes<'a>(&'a self, nodes: &mut HashMap<Uuid, &'a Node>) {
        nodes.insert(self.instance_id, self);
        match self.previous.as_ref() {
            Some(Previous::Single(prev)) => prev.collect_graph_nodes(nodes),
            Some(Previous::Diverging(prevs)) => {
                for prev in prevs {
                    prev.collect_graph_nodes(nodes);
                }
            }
            None => {}
        }
        for child in &self.children {
            child.collect_graph_nodes(nodes);
        }
    }

    // ------------------------------------------------------------------
    // Copy-with-rebinding
    // ------------------------------------------------------------------

    /// Duplicates this node, optionally replacing its behaviour and
    /// regenerating its instance id.
    ///
    /// The declared-transformer `id` is always preserved. The `previous`
    /// chain is deep-copied so the copy never aliases the original's
    /// ancestry; children are copied with fresh instance ids.
    pub fn copy(&self, behaviour: Option<Behaviour>, regenerate_instance_id: bool) -> Node {
        let mut copied = self.clone();
        if let Some(behaviour) = behaviour {
            copied.behaviour = behaviour;
        }
        if regenerate_instance_id {
            copied.instance_id = Uuid::new_v4();
        }
        copied.previous = self.previous.as_ref().map(|previous| match previous {
            Previous::Single(prev) => Previous::Single(Box::new(prev.copy(None, false))),
            Previous::Diverging(prevs) => {
                Previous::Diverging(prevs.iter().map(|prev| prev.copy(None, false)).collect())
            }
        });
        copied.children = self
            .children
            .iter()
            .map(|child| child.copy(None, true))
            .collect();
        copied
    }

    /// Attaches a predecessor at the head of this node's chain. If the node
    /// already has predecessors the edge is installed on the chain's first
    /// unset slot, walking backwards through every branch.
    pub(crate) fn set_previous(&mut self, previous: Previous) {
        match self.previous.as_mut() {
            None => self.previous = Some(previous),
            Some(Previous::Diverging(prevs)) => {
                for prev in prevs {
                    prev.set_previous(previous.clone());
                }
            }
            Some(Previous::Single(prev)) => prev.set_previous(previous),
        }
    }

    // ------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------

    /// Invokes a synchronous node. Errors raised by the body are enriched at
    /// this boundary with the raising unit's identity.
    pub fn transform(&self, input: NodeValue) -> Result<NodeValue, TransformError> {
        match &self.behaviour {
            Behaviour::Sync(body) => body.apply(input).map_err(|error| self.enrich(error)),
            Behaviour::Async(_) => Err(TransformError::NotSync {
                label: self.label.clone(),
            }),
        }
    }

    /// Invokes any node. Synchronous bodies run inline without suspension;
    /// asynchronous bodies are awaited.
    pub async fn transform_async(&self, input: NodeValue) -> Result<NodeValue, TransformError> {
        let result = match &self.behaviour {
            Behaviour::Sync(body) => body.apply(input),
            Behaviour::Async(body) => body.apply(input).await,
        };
        result.map_err(|error| self.enrich(error))
    }

    /// Wraps a raw body error with this unit's identity. An error already
    /// enriched by an inner unit passes through unchanged, so the innermost
    /// raiser is the one reported.
    fn enrich(&self, error: DynError) -> TransformError {
        match error.downcast::<TransformError>() {
            Ok(inner) => *inner,
            Err(error) => TransformError::Unit {
                raiser: self.label.clone(),
                raiser_instance_id: self.instance_id,
                source: error,
            },
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> ({}) -> {}",
            self.input_annotation(),
            self.label,
            self.output_annotation()
        )
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("instance_id", &self.instance_id)
            .field("label", &self.label)
            .field("signature", &self.signature)
            .field("is_async", &self.is_async())
            .field("length", &self.length)
            .finish()
    }
}
