//! Read-only snapshot of the authored material description, and the catalogs the generators
//! query while building a [ShaderGraph](crate::shader::graph::ShaderGraph).
//!
//! The document model that edits these descriptions lives outside of this crate; generation
//! always works on a frozen copy taken before the session starts.

use std::collections::HashMap;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
/// Symbolic names of an enumerated input, and optionally the values they stand for.
pub struct EnumMapping {
    /// Allowed symbolic names, in declaration order.
    pub names: Vec<String>,
    /// Underlying values, parallel to `names`. Indices are used when empty.
    pub values: Vec<String>,
}

impl EnumMapping {
    /// Build a mapping from comma-separated lists, e.g. `("over,add", "0,1")`.
    pub fn new(names: &str, values: &str) -> Self {
        Self {
            names: crate::util::split_string(names, ", "),
            values: crate::util::split_string(values, ", "),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
/// Typed port of a [NodeDef] or of a graph interface.
pub struct PortDef {
    #[allow(missing_docs)]
    pub name: String,
    /// Type name, resolved against the [TypeRegistry](crate::types::TypeRegistry).
    pub ty: String,
    /// Authored default value. Ports without one are required unless their type has no literal
    /// form (closures, shaders).
    pub default: Option<String>,
    /// Symbolic values accepted by the port.
    pub enumeration: Option<EnumMapping>,
    /// Color space of the default, for interface inputs.
    pub colorspace: Option<String>,
}

impl PortDef {
    #[allow(missing_docs)]
    pub fn new(name: &str, ty: &str) -> Self {
        Self {
            name: name.to_owned(),
            ty: ty.to_owned(),
            default: None,
            enumeration: None,
            colorspace: None,
        }
    }

    #[allow(missing_docs)]
    pub fn with_default(mut self, default: &str) -> Self {
        self.default = Some(default.to_owned());
        self
    }

    #[allow(missing_docs)]
    pub fn with_enum(mut self, names: &str, values: &str) -> Self {
        self.enumeration = Some(EnumMapping::new(names, values));
        self
    }

    #[allow(missing_docs)]
    pub fn with_colorspace(mut self, colorspace: &str) -> Self {
        self.colorspace = Some(colorspace.to_owned());
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
/// Declaration of a node type: its category and typed signature.
pub struct NodeDef {
    /// Unique definition name, e.g. `ND_add_float`.
    pub name: String,
    /// Node category this definition implements, e.g. `add`.
    pub category: String,
    #[allow(missing_docs)]
    pub inputs: Vec<PortDef>,
    #[allow(missing_docs)]
    pub outputs: Vec<PortDef>,
}

impl NodeDef {
    /// Single-output definition, the output being named `out`.
    pub fn new(name: &str, category: &str, output_type: &str) -> Self {
        Self {
            name: name.to_owned(),
            category: category.to_owned(),
            inputs: Vec::new(),
            outputs: vec![PortDef::new("out", output_type)],
        }
    }

    #[allow(missing_docs)]
    pub fn input(mut self, port: PortDef) -> Self {
        self.inputs.push(port);
        self
    }

    /// Add another output next to the default one.
    pub fn output(mut self, port: PortDef) -> Self {
        self.outputs.push(port);
        self
    }

    /// Type of the first output, used to pick definitions by category.
    pub fn output_type(&self) -> Option<&str> {
        self.outputs.first().map(|port| port.ty.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
/// Where an input reads its value from.
pub enum Connection {
    /// Output of another node of the same graph; `None` picks the node's first output.
    Node {
        #[allow(missing_docs)]
        node: String,
        #[allow(missing_docs)]
        output: Option<String>,
    },
    /// Interface input of the enclosing graph.
    Interface(String),
}

#[derive(Clone, Debug, PartialEq)]
/// Constructor helper for [InputBinding]s, see [bind].
pub enum Binding {
    #[allow(missing_docs)]
    Value(String),
    #[allow(missing_docs)]
    Connection(Connection),
}

#[derive(Clone, Debug, Default, PartialEq)]
/// Authored state of one node input.
///
/// Both a literal and a connection may be present when the document was edited after the value
/// was set; the connection always wins.
pub struct InputBinding {
    #[allow(missing_docs)]
    pub name: String,
    #[allow(missing_docs)]
    pub value: Option<String>,
    #[allow(missing_docs)]
    pub connection: Option<Connection>,
    /// Color space the literal is authored in.
    pub colorspace: Option<String>,
}

impl<T: AsRef<str>> From<(T, Binding)> for InputBinding {
    fn from((name, binding): (T, Binding)) -> Self {
        let name = name.as_ref().to_owned();
        match binding {
            Binding::Value(value) => Self {
                name,
                value: Some(value),
                ..Default::default()
            },
            Binding::Connection(connection) => Self {
                name,
                connection: Some(connection),
                ..Default::default()
            },
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
/// Node instance inside a [NodeGraph].
pub struct NodeInstance {
    /// Unique within its graph.
    pub name: String,
    #[allow(missing_docs)]
    pub category: String,
    /// Output type, used to pick a [NodeDef] when `nodedef` is not set.
    pub ty: String,
    /// Explicit definition name.
    pub nodedef: Option<String>,
    #[allow(missing_docs)]
    pub inputs: Vec<InputBinding>,
}

impl NodeInstance {
    #[allow(missing_docs)]
    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_owned();
        self
    }

    #[allow(missing_docs)]
    pub fn with_nodedef(mut self, nodedef: &str) -> Self {
        self.nodedef = Some(nodedef.to_owned());
        self
    }

    #[allow(missing_docs)]
    pub fn input(&self, name: &str) -> Option<&InputBinding> {
        self.inputs.iter().find(|input| input.name == name)
    }

    /// Set (or add) a binding, keeping any other state of the input.
    pub fn bind(mut self, name: &str, binding: Binding) -> Self {
        let input = self.input_mut(name);
        match binding {
            Binding::Value(value) => input.value = Some(value),
            Binding::Connection(connection) => input.connection = Some(connection),
        }

        self
    }

    /// Tag the literal of an input with the color space it is authored in.
    pub fn with_colorspace(mut self, name: &str, colorspace: &str) -> Self {
        self.input_mut(name).colorspace = Some(colorspace.to_owned());
        self
    }

    fn input_mut(&mut self, name: &str) -> &mut InputBinding {
        let index = match self.inputs.iter().position(|input| input.name == name) {
            Some(index) => index,
            None => {
                self.inputs.push(InputBinding {
                    name: name.to_owned(),
                    ..Default::default()
                });
                self.inputs.len() - 1
            }
        };
        &mut self.inputs[index]
    }
}

#[derive(Clone, Debug, PartialEq)]
/// Output socket of a [NodeGraph].
pub struct GraphOutput {
    #[allow(missing_docs)]
    pub name: String,
    #[allow(missing_docs)]
    pub ty: String,
    #[allow(missing_docs)]
    pub connection: Option<Connection>,
}

#[derive(Clone, Debug, Default, PartialEq)]
/// A graph of node instances, either the material itself or the body of a compound [NodeDef].
pub struct NodeGraph {
    #[allow(missing_docs)]
    pub name: String,
    /// Definition this graph implements, for compound graphs.
    pub nodedef: Option<String>,
    /// Graph-level inputs.
    pub interface: Vec<PortDef>,
    #[allow(missing_docs)]
    pub nodes: Vec<NodeInstance>,
    #[allow(missing_docs)]
    pub outputs: Vec<GraphOutput>,
}

/// Read-only view of a node graph.
pub trait InputGraph {
    #[allow(missing_docs)]
    fn name(&self) -> &str;

    /// Graph-level inputs.
    fn interface(&self) -> &[PortDef];

    /// Node instances, in declaration order.
    fn nodes(&self) -> &[NodeInstance];

    #[allow(missing_docs)]
    fn outputs(&self) -> &[GraphOutput];

    #[allow(missing_docs)]
    fn node(&self, name: &str) -> Option<&NodeInstance> {
        self.nodes().iter().find(|node| node.name == name)
    }

    /// Connection feeding a node input, if any.
    fn connected_output(&self, node: &str, input: &str) -> Option<&Connection> {
        self.node(node)?.input(input)?.connection.as_ref()
    }

    /// Literal authored on a node input, if any.
    fn input_value(&self, node: &str, input: &str) -> Option<&str> {
        self.node(node)?.input(input)?.value.as_deref()
    }
}

impl InputGraph for NodeGraph {
    fn name(&self) -> &str {
        &self.name
    }

    fn interface(&self) -> &[PortDef] {
        &self.interface
    }

    fn nodes(&self) -> &[NodeInstance] {
        &self.nodes
    }

    fn outputs(&self) -> &[GraphOutput] {
        &self.outputs
    }
}

#[derive(Clone, Debug, PartialEq)]
/// How an implementation produces code.
pub enum ImplementationSource {
    /// A function to define once and call per node.
    Function {
        /// Function name used at call sites.
        function: String,
        /// Source text, loaded from `file` when absent.
        code: Option<String>,
        /// Resource path handed to the [ResourceLoader].
        file: Option<String>,
    },
    /// An expression with `{{input}}` slots, substituted at each call site.
    Inline(String),
    /// The name of a [NodeGraph] implementing the definition.
    Graph(String),
}

#[derive(Clone, Debug, PartialEq)]
/// Catalog entry binding a [NodeDef] to code for one target.
pub struct ImplementationDesc {
    /// Unique implementation name, e.g. `IM_add_float_genglsl`.
    pub name: String,
    /// Implemented definition.
    pub nodedef: String,
    /// Target or language key; empty for implementations valid everywhere.
    pub target: String,
    #[allow(missing_docs)]
    pub source: ImplementationSource,
}

/// `IM_<definition>_<target>`, without the target suffix for target-independent entries.
fn implementation_name(nodedef: &str, target: &str) -> String {
    let base = nodedef.trim_start_matches("ND_");
    if target.is_empty() {
        format!("IM_{base}")
    } else {
        format!("IM_{base}_{target}")
    }
}

/// Source of node definitions and their implementations.
pub trait ImplementationCatalog {
    #[allow(missing_docs)]
    fn nodedef(&self, name: &str) -> Option<&NodeDef>;

    /// First definition of `category` whose first output has type `output_type`.
    fn find_nodedef(&self, category: &str, output_type: &str) -> Option<&NodeDef>;

    /// Implementation of `nodedef` for `target`, falling back to target-independent ones.
    fn implementation(&self, nodedef: &str, target: &str) -> Option<&ImplementationDesc>;

    #[allow(missing_docs)]
    fn node_graph(&self, name: &str) -> Option<&NodeGraph>;
}

#[derive(Clone, Debug, Default)]
/// In-memory [ImplementationCatalog].
pub struct Library {
    nodedefs: Vec<NodeDef>,
    implementations: Vec<ImplementationDesc>,
    graphs: Vec<NodeGraph>,
}

impl Library {
    #[allow(missing_docs)]
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(missing_docs)]
    pub fn add_nodedef(&mut self, nodedef: NodeDef) -> &mut Self {
        self.nodedefs.push(nodedef);
        self
    }

    #[allow(missing_docs)]
    pub fn add_implementation(&mut self, implementation: ImplementationDesc) -> &mut Self {
        self.implementations.push(implementation);
        self
    }

    /// Add a function-based implementation with inline source.
    pub fn add_function(
        &mut self,
        nodedef: &str,
        target: &str,
        function: &str,
        code: &str,
    ) -> &mut Self {
        self.add_implementation(ImplementationDesc {
            name: implementation_name(nodedef, target),
            nodedef: nodedef.to_owned(),
            target: target.to_owned(),
            source: ImplementationSource::Function {
                function: function.to_owned(),
                code: Some(code.to_owned()),
                file: None,
            },
        })
    }

    /// Add an inline-expression implementation.
    pub fn add_inline(&mut self, nodedef: &str, target: &str, expression: &str) -> &mut Self {
        self.add_implementation(ImplementationDesc {
            name: implementation_name(nodedef, target),
            nodedef: nodedef.to_owned(),
            target: target.to_owned(),
            source: ImplementationSource::Inline(expression.to_owned()),
        })
    }

    /// Add a compound graph, registering it as the target-independent implementation of its
    /// definition.
    pub fn add_graph(&mut self, graph: NodeGraph) -> &mut Self {
        if let Some(nodedef) = graph.nodedef.clone() {
            self.implementations.push(ImplementationDesc {
                name: graph.name.clone(),
                nodedef,
                target: String::new(),
                source: ImplementationSource::Graph(graph.name.clone()),
            });
        }
        self.graphs.push(graph);
        self
    }

    /// Move every entry of `other` into this library.
    pub fn merge(&mut self, other: Library) -> &mut Self {
        self.nodedefs.extend(other.nodedefs);
        self.implementations.extend(other.implementations);
        self.graphs.extend(other.graphs);
        self
    }

    #[allow(missing_docs)]
    pub fn nodedefs(&self) -> &[NodeDef] {
        &self.nodedefs
    }
}

impl ImplementationCatalog for Library {
    fn nodedef(&self, name: &str) -> Option<&NodeDef> {
        self.nodedefs.iter().find(|nodedef| nodedef.name == name)
    }

    fn find_nodedef(&self, category: &str, output_type: &str) -> Option<&NodeDef> {
        self.nodedefs.iter().find(|nodedef| {
            nodedef.category == category && nodedef.output_type() == Some(output_type)
        })
    }

    fn implementation(&self, nodedef: &str, target: &str) -> Option<&ImplementationDesc> {
        let mut candidates = self
            .implementations
            .iter()
            .filter(|implementation| implementation.nodedef == nodedef);

        candidates
            .clone()
            .find(|implementation| implementation.target == target)
            .or_else(|| candidates.find(|implementation| implementation.target.is_empty()))
    }

    fn node_graph(&self, name: &str) -> Option<&NodeGraph> {
        self.graphs.iter().find(|graph| graph.name == name)
    }
}

/// Synchronous loader for source files referenced by implementations.
pub trait ResourceLoader {
    /// Return the content of the resource at `path`.
    fn load(&self, path: &str) -> anyhow::Result<String>;
}

impl<F> ResourceLoader for F
where
    F: Fn(&str) -> anyhow::Result<String>,
{
    fn load(&self, path: &str) -> anyhow::Result<String> {
        self(path)
    }
}

#[derive(Clone, Debug, Default)]
/// [ResourceLoader] serving sources from memory.
pub struct MemoryLoader {
    files: HashMap<String, String>,
}

impl MemoryLoader {
    #[allow(missing_docs)]
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(missing_docs)]
    pub fn insert(&mut self, path: &str, content: &str) -> &mut Self {
        self.files.insert(path.to_owned(), content.to_owned());
        self
    }
}

impl From<HashMap<String, String>> for MemoryLoader {
    fn from(files: HashMap<String, String>) -> Self {
        Self { files }
    }
}

impl ResourceLoader for MemoryLoader {
    fn load(&self, path: &str) -> anyhow::Result<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no resource at `{path}`"))
    }
}

#[macro_export]
/// Shorthand for [Binding]s.
///
/// # Example
/// ```
/// use shadergen::{bind, document::{Binding, Connection}};
///
/// assert_eq!(bind!(value "1.0"), Binding::Value("1.0".to_owned()));
/// assert_eq!(
///     bind!(node "noise" "out"),
///     Binding::Connection(Connection::Node { node: "noise".to_owned(), output: Some("out".to_owned()) }),
/// );
/// assert_eq!(bind!(interface "base"), Binding::Connection(Connection::Interface("base".to_owned())));
/// ```
macro_rules! bind {
    (value $value:expr) => {
        $crate::document::Binding::Value($value.to_string())
    };

    (node $node:literal) => {
        $crate::document::Binding::Connection($crate::document::Connection::Node {
            node: $node.to_owned(),
            output: None,
        })
    };

    (node $node:literal $output:literal) => {
        $crate::document::Binding::Connection($crate::document::Connection::Node {
            node: $node.to_owned(),
            output: Some($output.to_owned()),
        })
    };

    (interface $name:literal) => {
        $crate::document::Binding::Connection($crate::document::Connection::Interface(
            $name.to_owned(),
        ))
    };
}

#[macro_export]
/// Instantiate a [NodeInstance] concisely; the name is given by [graph](crate::graph).
///
/// # Example
/// ```
/// use shadergen::{bind, node};
///
/// let node = node! {
///     "add" -> "float",
///     inputs:
///         "in1": bind!(value "1.0"),
///         "in2": bind!(node "constant"),
/// };
///
/// assert_eq!(node.category, "add");
/// assert_eq!(node.inputs.len(), 2);
/// ```
macro_rules! node {
    { $category:literal -> $ty:literal $(, inputs: $($input:literal : $binding:expr),+)? $(,)? } => {
        $crate::document::NodeInstance {
            name: ::std::string::String::new(),
            category: $category.to_owned(),
            ty: $ty.to_owned(),
            nodedef: None,
            inputs: vec![$($($crate::document::InputBinding::from(($input, $binding))),+)?],
        }
    };
}

#[macro_export]
/// Instantiate a [NodeGraph] concisely.
///
/// # Example
/// ```
/// use shadergen::{bind, graph, node};
///
/// let graph = graph! {
///     "NG_material",
///     interface:
///         "base": "color3" = "0.5, 0.5, 0.5",
///     nodes:
///         "scale": node! {
///             "multiply" -> "color3",
///             inputs:
///                 "in1": bind!(interface "base"),
///                 "in2": bind!(value "2, 2, 2"),
///         },
///     outputs:
///         "out": "color3" = bind!(node "scale"),
/// };
///
/// assert_eq!(graph.nodes[0].name, "scale");
/// assert_eq!(graph.interface[0].default.as_deref(), Some("0.5, 0.5, 0.5"));
/// ```
macro_rules! graph {
    {
        $name:literal $(implements $nodedef:literal)?
        $(, interface: $($input:literal : $input_ty:literal $(= $default:literal)?),+)?
        $(, nodes: $($node:literal : $value:expr),+)?
        $(, outputs: $($output:literal : $output_ty:literal = $binding:expr),+)?
        $(,)?
    } => {{
        let nodedef: ::std::option::Option<::std::string::String> = None
            $(.or(Some($nodedef.to_owned())))?;

        $crate::document::NodeGraph {
            name: $name.to_owned(),
            nodedef,
            interface: vec![$($({
                let port = $crate::document::PortDef::new($input, $input_ty);
                $(let port = port.with_default($default);)?
                port
            }),+)?],
            nodes: vec![$($($value.named($node)),+)?],
            outputs: vec![$($(
                $crate::document::GraphOutput {
                    name: $output.to_owned(),
                    ty: $output_ty.to_owned(),
                    connection: match $binding {
                        $crate::document::Binding::Connection(connection) => Some(connection),
                        $crate::document::Binding::Value(_) => None,
                    },
                }
            ),+)?],
        }
    }};
}

pub use {bind, graph, node};

#[cfg(test)]
mod test {
    use super::*;

    fn library() -> Library {
        let mut library = Library::new();
        library
            .add_nodedef(
                NodeDef::new("ND_add_float", "add", "float")
                    .input(PortDef::new("in1", "float").with_default("0.0"))
                    .input(PortDef::new("in2", "float").with_default("0.0")),
            )
            .add_nodedef(NodeDef::new("ND_add_color3", "add", "color3"))
            .add_function("ND_add_float", "genglsl", "mx_add_float", "")
            .add_inline("ND_add_float", "genosl", "{{in1}} + {{in2}}")
            .add_graph(graph! {
                "NG_add_color3" implements "ND_add_color3",
                nodes:
                    "inner": node! { "add" -> "color3" },
                outputs:
                    "out": "color3" = bind!(node "inner"),
            });
        library
    }

    #[test]
    fn nodedef_lookup() {
        let library = library();

        assert_eq!(
            library.find_nodedef("add", "color3").map(|nd| nd.name.as_str()),
            Some("ND_add_color3")
        );
        assert!(library.find_nodedef("add", "vector3").is_none());
        assert!(library.nodedef("ND_add_float").is_some());
    }

    #[test]
    fn implementation_lookup_prefers_target() {
        let library = library();

        let glsl = library.implementation("ND_add_float", "genglsl").unwrap();
        assert!(matches!(glsl.source, ImplementationSource::Function { .. }));

        let osl = library.implementation("ND_add_float", "genosl").unwrap();
        assert!(matches!(osl.source, ImplementationSource::Inline(_)));

        assert!(library.implementation("ND_add_float", "essl").is_none());

        let compound = library.implementation("ND_add_color3", "essl").unwrap();
        assert_eq!(
            compound.source,
            ImplementationSource::Graph("NG_add_color3".to_owned())
        );
    }

    #[test]
    fn connection_lookup() {
        let graph = graph! {
            "NG_test",
            nodes:
                "a": node! { "constant" -> "float", inputs: "value": bind!(value 1.5) },
                "b": node! { "add" -> "float", inputs: "in1": bind!(node "a") },
        };

        assert_eq!(graph.input_value("a", "value"), Some("1.5"));
        assert_eq!(
            graph.connected_output("b", "in1"),
            Some(&Connection::Node {
                node: "a".to_owned(),
                output: None
            })
        );
        assert!(graph.connected_output("b", "in2").is_none());
    }

    #[test]
    fn stale_value_kept_next_to_connection() {
        let node = node! { "add" -> "float", inputs: "in1": bind!(value "1.0") }
            .bind("in1", bind!(node "other"));

        let input = node.input("in1").unwrap();
        assert_eq!(input.value.as_deref(), Some("1.0"));
        assert!(input.connection.is_some());
    }

    #[test]
    fn loaders() {
        let mut memory = MemoryLoader::new();
        memory.insert("mx_add.glsl", "void mx_add() {}");
        assert_eq!(memory.load("mx_add.glsl").unwrap(), "void mx_add() {}");
        assert!(memory.load("missing.glsl").is_err());

        let closure = |path: &str| -> anyhow::Result<String> { Ok(format!("// {path}")) };
        assert_eq!(closure.load("a.glsl").unwrap(), "// a.glsl");
    }
}
