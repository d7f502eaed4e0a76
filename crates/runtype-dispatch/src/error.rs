//! Dispatch failures.

use std::fmt;

use serde::Serialize;

use runtype_typeck::TypeExpr;

use crate::signature::Signature;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum DispatchError {
    /// No registered overload accepts the arguments.
    NoMatch {
        name: String,
        arg_types: Vec<TypeExpr>,
    },
    /// Several overloads accept the arguments and none is most specific.
    Ambiguous {
        name: String,
        arg_types: Vec<TypeExpr>,
        /// The mutually undominated candidates, ordered by rendering.
        candidates: Vec<Signature>,
    },
    /// An equivalent signature is already registered under the name.
    DuplicateSignature { name: String, signature: Signature },
}

impl DispatchError {
    pub fn name(&self) -> &str {
        match self {
            DispatchError::NoMatch { name, .. }
            | DispatchError::Ambiguous { name, .. }
            | DispatchError::DuplicateSignature { name, .. } => name,
        }
    }
}

struct ArgList<'a>(&'a [TypeExpr]);

impl fmt::Display for ArgList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, t) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", t)?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::NoMatch { name, arg_types } => {
                write!(f, "no overload of `{}` accepts {}", name, ArgList(arg_types))
            }
            DispatchError::Ambiguous {
                name,
                arg_types,
                candidates,
            } => {
                write!(f, "ambiguous call to `{}` with {}; candidates:", name, ArgList(arg_types))?;
                for c in candidates {
                    write!(f, "\n  - {}{}", name, c)?;
                }
                Ok(())
            }
            DispatchError::DuplicateSignature { name, signature } => {
                write!(f, "`{}{}` is already registered", name, signature)
            }
        }
    }
}

impl std::error::Error for DispatchError {}
