//! Nodes and ports of a [ShaderGraph](super::graph::ShaderGraph).

use std::sync::Arc;

use crate::{implementation::NodeImplementation, types::TypeRef, value::Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
/// Reference to the port a connection reads from.
pub enum PortRef {
    /// Output `output` of node `node`, both as indices into their graph.
    Node {
        #[allow(missing_docs)]
        node: usize,
        #[allow(missing_docs)]
        output: usize,
    },
    /// Interface input of the graph, as an index.
    Graph(usize),
}

#[derive(Clone, Debug, PartialEq)]
/// Typed port of a [ShaderNode] or of a graph interface.
pub struct ShaderPort {
    #[allow(missing_docs)]
    pub name: String,
    #[allow(missing_docs)]
    pub ty: TypeRef,
    /// Identifier of the port in generated code, unique within its graph.
    pub variable: String,
    /// Literal used when the port is not connected.
    pub value: Option<Value>,
    /// Upstream port, for inputs and graph outputs.
    pub connection: Option<PortRef>,
}

impl ShaderPort {
    #[allow(missing_docs)]
    pub fn new(name: &str, ty: TypeRef) -> Self {
        Self {
            name: name.to_owned(),
            ty,
            variable: String::new(),
            value: None,
            connection: None,
        }
    }

    #[allow(missing_docs)]
    pub fn with_variable(mut self, variable: &str) -> Self {
        self.variable = variable.to_owned();
        self
    }

    #[allow(missing_docs)]
    pub fn with_value(mut self, value: Option<Value>) -> Self {
        self.value = value;
        self
    }

    /// Connect the port, dropping any literal: a connected port has no value.
    pub fn connect(&mut self, from: PortRef) {
        self.connection = Some(from);
        self.value = None;
    }

    /// Either connected or holding a literal.
    pub fn is_bound(&self) -> bool {
        self.connection.is_some() || self.value.is_some()
    }
}

#[derive(Clone, Debug)]
/// Instantiated node: a definition, its resolved implementation and linked ports.
pub struct ShaderNode {
    /// Unique within its graph.
    pub name: String,
    #[allow(missing_docs)]
    pub category: String,
    /// Name of the resolved definition.
    pub nodedef: String,
    #[allow(missing_docs)]
    pub inputs: Vec<ShaderPort>,
    #[allow(missing_docs)]
    pub outputs: Vec<ShaderPort>,
    /// Shared with every node resolving to the same definition in the session.
    pub implementation: Arc<dyn NodeImplementation>,
    /// Closure node read by a single other node; emitted inside its consumer's scope.
    pub(crate) nested_closure: bool,
}

impl ShaderNode {
    #[allow(missing_docs)]
    pub fn input(&self, name: &str) -> Option<&ShaderPort> {
        self.inputs.iter().find(|port| port.name == name)
    }

    #[allow(missing_docs)]
    pub fn input_index(&self, name: &str) -> Option<usize> {
        self.inputs.iter().position(|port| port.name == name)
    }

    #[allow(missing_docs)]
    pub fn output(&self, name: &str) -> Option<&ShaderPort> {
        self.outputs.iter().find(|port| port.name == name)
    }

    /// Produces a closure (BSDF, EDF, VDF).
    pub fn is_closure(&self) -> bool {
        self.outputs.iter().any(|port| port.ty.is_closure())
    }

    /// Produces a shader (surface, volume, ...).
    pub fn is_shader(&self) -> bool {
        self.outputs.iter().any(|port| port.ty.is_shader())
    }

    /// Closure read by a single other node, emitted in the scope of that consumer.
    pub fn is_nested_closure(&self) -> bool {
        self.nested_closure
    }
}
