//! Crate-level [Error].
//!
//! Every error aborts the generation session it occurred in; no partially emitted shader is ever
//! returned.

use crate::{shader::stage, syntax, types, value};

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Kind of element a reference points to.
pub enum Reference {
    #[allow(missing_docs)]
    Node,
    #[allow(missing_docs)]
    Input,
    #[allow(missing_docs)]
    Output,
    /// Graph-level input.
    Interface,
    /// Node graph in the catalog.
    Graph,
}

#[derive(Debug, thiserror::Error)]
/// Generation error
pub enum Error {
    #[error(transparent)]
    /// Registering or looking up a type failed.
    Type(#[from] types::Error),

    #[error(transparent)]
    /// The target language cannot express a type or value.
    Syntax(#[from] syntax::Error),

    #[error(transparent)]
    /// Stage assembly failed (scopes, interface blocks).
    Stage(#[from] stage::Error),

    #[error(transparent)]
    /// An authored literal does not fit its type.
    Value(#[from] value::ParseError),

    #[error("Detected a cycle: {}", .chain.join(" -> "))]
    /// The graph, or a chain of compound definitions, loops on itself.
    GraphCycle {
        /// Offending chain, first element repeated at the end.
        chain: Vec<String>,
    },

    #[error("No implementation of `{node}` matches target `{target}`")]
    /// Neither the host, the backend nor the catalog provide code for a node.
    NoMatchingImplementation {
        /// Node category or definition name.
        node: String,
        #[allow(missing_docs)]
        target: String,
    },

    #[error("Mismatched type between {from} ({from_type}) and {to} ({to_type})")]
    /// A connection links two ports of different types.
    TypeMismatch {
        /// Upstream port.
        from: String,
        #[allow(missing_docs)]
        from_type: String,
        /// Downstream port.
        to: String,
        #[allow(missing_docs)]
        to_type: String,
    },

    #[error("Unknown enumeration value `{value}`, expected one of: {}", .names.join(", "))]
    /// A symbolic value is absent from its mapping.
    UnknownEnumeration {
        #[allow(missing_docs)]
        value: String,
        /// Accepted names.
        names: Vec<String>,
    },

    #[error("Missing required input `{input}` on node `{node}`")]
    /// An input without default was left unbound.
    MissingRequiredInput {
        #[allow(missing_docs)]
        node: String,
        #[allow(missing_docs)]
        input: String,
    },

    #[error("Graph output `{output}` of `{graph}` left unconnected")]
    /// An unlinked graph output is likely unintended.
    UnconnectedOutput {
        #[allow(missing_docs)]
        graph: String,
        #[allow(missing_docs)]
        output: String,
    },

    #[error("Referencing missing {0:?} `{1}`")]
    /// Reference to an element that does not exist.
    Missing(Reference, String),

    #[error("Node name `{0}` is used more than once")]
    /// Two nodes of the same graph share a name.
    DuplicateNode(String),

    #[error("Invalid template in `{name}`: {message}")]
    /// An inline expression or source template could not be parsed or substituted.
    Template {
        /// Implementation name.
        name: String,
        #[allow(missing_docs)]
        message: String,
    },

    #[error("Could not load `{path}`")]
    /// The resource loader failed.
    Resource {
        #[allow(missing_docs)]
        path: String,
        #[source]
        #[allow(missing_docs)]
        source: anyhow::Error,
    },

    #[error("{} errors:\n{}", .0.len(), .0.iter().map(|e| format!("- {e}")).collect::<Vec<String>>().join("\n"))]
    /// Several independent problems found during one validation pass.
    Many(Vec<Error>),
}

impl Error {
    /// Fold the diagnostics of one pass into a single error, if there is any.
    pub fn from_diagnostics(mut errors: Vec<Error>) -> Option<Self> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(Self::Many(errors)),
        }
    }

    /// Every individual error, flattening [Many](Self::Many).
    pub fn diagnostics(&self) -> Vec<&Error> {
        match self {
            Error::Many(errors) => errors.iter().flat_map(Error::diagnostics).collect(),
            other => vec![other],
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn diagnostics_fold() {
        assert!(Error::from_diagnostics(vec![]).is_none());

        let single = Error::from_diagnostics(vec![Error::DuplicateNode("a".to_owned())]);
        assert!(matches!(single, Some(Error::DuplicateNode(_))));

        let many = Error::from_diagnostics(vec![
            Error::MissingRequiredInput {
                node: "a".to_owned(),
                input: "in1".to_owned(),
            },
            Error::MissingRequiredInput {
                node: "b".to_owned(),
                input: "in2".to_owned(),
            },
        ])
        .unwrap();

        assert_eq!(many.diagnostics().len(), 2);
        assert!(many.to_string().starts_with("2 errors:"));
    }

    #[test]
    fn messages() {
        let cycle = Error::GraphCycle {
            chain: vec!["a".to_owned(), "b".to_owned(), "a".to_owned()],
        };
        assert_eq!(cycle.to_string(), "Detected a cycle: a -> b -> a");

        let wrapped: Error = types::Error::Unknown("quaternion".to_owned()).into();
        assert!(matches!(wrapped, Error::Type(types::Error::Unknown(_))));
    }
}
