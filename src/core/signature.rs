//! The signature model: a transformer's declared input and output types.

use std::fmt;

use crate::core::typing::Type;

/// The typed contract of a transformer: exactly one parameter type and one
/// return type. Multi-argument transforms are rejected before they reach the
/// core, so the engine only ever unifies single-parameter signatures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    input: Type,
    output: Type,
}

impl Signature {
    /// Creates a signature from its parameter and return types.
    pub fn new(input: Type, output: Type) -> Self {
        Self { input, output }
    }

    /// The parameter type.
    pub fn input(&self) -> &Type {
        &self.input
    }

    /// The return type.
    pub fn output(&self) -> &Type {
        &self.output
    }

    /// Returns this signature with the parameter type replaced.
    pub fn with_input(&self, input: Type) -> Self {
        Self {
            input,
            output: self.output.clone(),
        }
    }

    /// Returns this signature with the return type replaced.
    pub fn with_output(&self, output: Type) -> Self {
        Self {
            input: self.input.clone(),
            output,
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.input, self.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projections() {
        let signature = Signature::new(Type::concrete("int"), Type::concrete("str"));
        assert_eq!(signature.input(), &Type::concrete("int"));
        assert_eq!(signature.output(), &Type::concrete("str"));
    }

    #[test]
    fn test_replacements_do_not_mutate() {
        let signature = Signature::new(Type::concrete("int"), Type::variable("T"));
        let specialized = signature.with_output(Type::concrete("str"));
        assert_eq!(signature.output(), &Type::variable("T"));
        assert_eq!(specialized.output(), &Type::concrete("str"));
        assert_eq!(specialized.input(), signature.input());
    }

    #[test]
    fn test_display() {
        let signature = Signature::new(
            Type::concrete("int"),
            Type::tuple([Type::concrete("str"), Type::concrete("float")]),
        );
        assert_eq!(signature.to_string(), "int -> (str, float)");
    }
}
