//! The semantic type model and the structural unifier.
//!
//! Types are explicit data rather than reflected native types: a [`Type`] is
//! either an opaque concrete type, an open generic variable, or a
//! parameterized type (a head constructor plus ordered arguments, which
//! covers tuples, unions and user generics uniformly). The two unifier
//! operations, [`match_types`] and [`specify_types`], are ordinary recursive
//! functions over that representation.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

/// Head constructor used for tuple types.
pub const TUPLE_HEAD: &str = "tuple";

/// Head constructor used for union types.
pub const UNION_HEAD: &str = "Union";

/// A semantic type description attached to a transformer signature.
///
/// Immutable once constructed; all unifier operations return new values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// An opaque concrete type, identified by name (`int`, `str`, ...).
    Concrete(String),
    /// An open generic variable (`T`, `U`, ...), bindable during unification.
    Variable(String),
    /// A parameterized type: head constructor plus ordered type arguments.
    Parameterized { head: String, args: Vec<Type> },
}

impl Type {
    /// Creates an opaque concrete type.
    pub fn concrete(name: impl Into<String>) -> Self {
        Type::Concrete(name.into())
    }

    /// Creates an open generic variable.
    pub fn variable(name: impl Into<String>) -> Self {
        Type::Variable(name.into())
    }

    /// Creates a parameterized type with the given head constructor.
    pub fn parameterized(head: impl Into<String>, args: impl Into<Vec<Type>>) -> Self {
        Type::Parameterized {
            head: head.into(),
            args: args.into(),
        }
    }

    /// Creates a tuple type with the given elements.
    pub fn tuple(args: impl Into<Vec<Type>>) -> Self {
        Type::parameterized(TUPLE_HEAD, args)
    }

    /// Creates a union type over the given alternatives.
    pub fn union(args: impl Into<Vec<Type>>) -> Self {
        Type::parameterized(UNION_HEAD, args)
    }

    /// Returns true if this is an open generic variable.
    pub fn is_variable(&self) -> bool {
        matches!(self, Type::Variable(_))
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Concrete(name) | Type::Variable(name) => f.write_str(name),
            Type::Parameterized { head, args } => {
                let formatted: Vec<String> = args.iter().map(Type::to_string).collect();
                match head.as_str() {
                    TUPLE_HEAD => write!(f, "({})", formatted.join(", ")),
                    UNION_HEAD => write!(f, "({})", formatted.join(" | ")),
                    _ => write!(f, "{}[{}]", head, formatted.join(", ")),
                }
            }
        }
    }
}

/// Substitution environment from generic variable name to concrete type.
///
/// Built fresh by [`match_types`] per composition, consumed immediately by
/// [`specify_types`], then discarded. Keys are unique; a variable bound twice
/// keeps the last binding.
pub type BindingTable = HashMap<String, Type>;

/// Structural unification failure: a parameterized template could not be
/// matched against a specific type (different heads, different arity, or a
/// parameterized type against a plain one).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("type {generic} does not match with {specific}")]
pub struct TypeMismatch {
    pub generic: Type,
    pub specific: Type,
}

/// Matches a generic template against a specific type, producing the bindings
/// for every variable encountered in the template.
///
/// A mismatch is distinct from "nothing to bind": two unrelated concrete
/// types yield an empty table, while incompatible parameterized structure is
/// a [`TypeMismatch`] unless `ignore_mismatches` is set, in which case the
/// offending branch contributes nothing.
pub fn match_types(
    generic: &Type,
    specific: &Type,
    ignore_mismatches: bool,
) -> Result<BindingTable, TypeMismatch> {
    match (generic, specific) {
        (Type::Variable(name), _) => {
            let mut bindings = BindingTable::new();
            bindings.insert(name.clone(), specific.clone());
            Ok(bindings)
        }
        (
            Type::Parameterized { head: generic_head, args: generic_args },
            Type::Parameterized { head: specific_head, args: specific_args },
        ) => {
            if generic_head != specific_head || generic_args.len() != specific_args.len() {
                return mismatch(generic, specific, ignore_mismatches);
            }
            let mut bindings = BindingTable::new();
            for (generic_arg, specific_arg) in generic_args.iter().zip(specific_args) {
                bindings.extend(match_types(generic_arg, specific_arg, ignore_mismatches)?);
            }
            Ok(bindings)
        }
        (Type::Parameterized { .. }, _) | (_, Type::Parameterized { .. }) => {
            mismatch(generic, specific, ignore_mismatches)
        }
        // Two plain types: no variables on the template side, nothing to bind.
        _ => Ok(BindingTable::new()),
    }
}

/// The ignore-mismatches form of [`match_types`], used by the composers:
/// incompatible structure binds nothing instead of failing.
pub fn lenient_match(generic: &Type, specific: &Type) -> BindingTable {
    match_types(generic, specific, true).unwrap_or_default()
}

fn mismatch(
    generic: &Type,
    specific: &Type,
    ignore_mismatches: bool,
) -> Result<BindingTable, TypeMismatch> {
    if ignore_mismatches {
        log::debug!("ignoring structural mismatch between {generic} and {specific}");
        return Ok(BindingTable::new());
    }
    Err(TypeMismatch {
        generic: generic.clone(),
        specific: specific.clone(),
    })
}

/// Substitutes bindings into a generic template, producing a (possibly still
/// open) type. Unbound variables pass through unchanged.
pub fn specify_types(template: &Type, bindings: &BindingTable) -> Type {
    match template {
        Type::Variable(name) => bindings
            .get(name)
            .cloned()
            .unwrap_or_else(|| template.clone()),
        Type::Parameterized { head, args } => Type::Parameterized {
            head: head.clone(),
            args: args.iter().map(|arg| specify_types(arg, bindings)).collect(),
        },
        other => other.clone(),
    }
}
