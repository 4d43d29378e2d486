//! # Confluence
//!
//! Typed, composable data-transformation pipelines: chain single-input/
//! single-output transformer nodes with `>>` into linear or fan-out
//! pipelines whose end-to-end signatures are inferred automatically, mixing
//! synchronous and asynchronous units freely.
//!
//! ## Features
//!
//! - **Typed composition**: every node declares a semantic signature, and
//!   composing nodes unifies generic type parameters structurally so the
//!   pipeline's signature is always a concrete, queryable value
//! - **Sync & Async Fusion**: the composed node's execution strategy is
//!   selected from its components; awaits happen exactly at async boundaries
//! - **Fan-out**: `a >> (b, c, d)` produces a node returning the ordered
//!   tuple of branch results, evaluated sequentially in declared order
//! - **Copy-on-compose**: composition never mutates a node you still hold;
//!   the same declared transformer can appear in many pipelines
//! - **Transparent failures**: a failing unit surfaces its own error to the
//!   caller, enriched with which named unit raised it
//!
//! ## Quick Start
//!
//! ```rust
//! use confluence::prelude::*;
//! use serde_json::json;
//!
//! let double = Node::new(
//!     "Double",
//!     Signature::new(Type::concrete("int"), Type::concrete("int")),
//!     |input: NodeValue| Ok(json!(input.as_i64().unwrap_or(0) * 2)),
//! );
//! let stringify = Node::new(
//!     "Stringify",
//!     Signature::new(Type::concrete("int"), Type::concrete("str")),
//!     |input: NodeValue| Ok(json!(input.to_string())),
//! );
//!
//! let pipeline = double >> stringify;
//! assert_eq!(pipeline.to_string(), "int -> (Stringify) -> str");
//! assert_eq!(pipeline.transform(json!(21)).unwrap(), json!("42"));
//! ```
//!
//! ## Module Organization
//!
//! - `core`: the node model, type unifier and composers (re-exported here)
//! - [`utils`]: small general-purpose nodes (`forward`, `forget`, ...)
//! - [`prelude`]: commonly used types (import with `use confluence::prelude::*`)

// ============================================================================
// Core Module
// ============================================================================

mod core;

pub mod utils;

// ============================================================================
// Public Re-exports - Granular Imports
// ============================================================================

// Value currency and execution behaviour
pub use crate::core::{Behaviour, DynError, NodeValue};

// Type model and unifier
pub use crate::core::typing::{
    lenient_match, match_types, specify_types, BindingTable, Type, TypeMismatch, TUPLE_HEAD,
    UNION_HEAD,
};

// Signature model
pub use crate::core::signature::Signature;

// Node model
pub use crate::core::node::{
    AsyncTransform, FutureFnTransform, Node, Previous, Transform, TransformError,
};

// Composition
pub use crate::core::compose::{compose, merge_diverging, merge_serial, CompositionError, Operand};

// ============================================================================
// Prelude Module - Convenient Bulk Imports
// ============================================================================

/// The main prelude: imports everything you need to build and run pipelines.
///
/// # Example
/// ```rust
/// use confluence::prelude::*;
/// ```
pub mod prelude {
    pub use super::{
        compose,
        AsyncTransform,
        Behaviour,
        BindingTable,
        CompositionError,
        DynError,
        // Node model
        Node,
        NodeValue,
        Operand,
        Previous,
        // Signature model
        Signature,
        Transform,
        TransformError,
        // Type model
        Type,
        TypeMismatch,
    };
}

// ============================================================================
// Re-export commonly used external types for convenience
// ============================================================================

pub use serde_json::Value as JsonValue;

// ============================================================================
// Library Metadata
// ============================================================================

/// The version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The name of this crate.
pub const NAME: &str = env!("CARGO_PKG_NAME");
