pub mod compose;
pub mod node;
pub mod signature;
pub mod typing;

use std::sync::Arc;

use node::{AsyncTransform, Transform};

/// The value currency flowing through transformers. Alias for
/// `serde_json::Value` since it is used everywhere.
pub type NodeValue = serde_json::Value;

/// Boxed error type returned by transform bodies.
pub type DynError = Box<dyn std::error::Error + Send + Sync>;

/// The execution behaviour of a node: the sync/async strategy tag together
/// with the stored transform body it dispatches to.
#[derive(Clone)]
pub enum Behaviour {
    Sync(Arc<dyn Transform>),
    Async(Arc<dyn AsyncTransform>),
}

impl Behaviour {
    /// Returns true for asynchronous behaviour.
    pub fn is_async(&self) -> bool {
        matches!(self, Behaviour::Async(_))
    }
}
