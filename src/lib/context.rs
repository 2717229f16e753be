//! Per-session generation state: options, collaborators and caches.

use std::{collections::HashMap, sync::Arc};

use derive_more::Display;
use log::{debug, trace};

use crate::{
    color_management::{ColorManagementSystem, DEFAULT_TARGET_SPACE},
    document::{ImplementationCatalog, ImplementationSource, NodeDef, ResourceLoader},
    error::Reference,
    generator::Backend,
    implementation::{
        compound::CompoundImplementation, source_code::SourceCodeImplementation,
        NodeImplementation,
    },
    shader::{
        graph::ShaderGraph,
        node::{PortRef, ShaderNode, ShaderPort},
        stage::ShaderStage,
    },
    syntax::Syntax,
    types::TypeRegistry,
    Error, Result,
};

#[derive(Clone, Copy, Debug, Default, Display, PartialEq, Eq)]
/// Which node inputs become part of the public shader interface.
pub enum ShaderInterface {
    #[display(fmt = "complete")]
    /// Every unconnected node input is published as a uniform.
    Complete,
    #[default]
    #[display(fmt = "reduced")]
    /// Only the graph interface is published; node literals are inlined.
    Reduced,
}

#[derive(Clone, Debug, PartialEq)]
/// Options of a generation session.
pub struct GenOptions {
    #[allow(missing_docs)]
    pub shader_interface: ShaderInterface,
    /// Emit comments naming the nodes in the generated code.
    pub emit_comments: bool,
    /// Flip the V texture coordinate when reading it in the pixel stage.
    pub flip_texcoord_v: bool,
    /// `#version` of GLSL targets. ES targets always use `300 es`.
    pub glsl_version: String,
    /// Color space the shader works in; color literals authored in another space are converted
    /// when a [ColorManagementSystem] is set.
    pub target_color_space: String,
}

impl Default for GenOptions {
    fn default() -> Self {
        Self {
            shader_interface: ShaderInterface::default(),
            emit_comments: true,
            flip_texcoord_v: false,
            glsl_version: "400".to_owned(),
            target_color_space: DEFAULT_TARGET_SPACE.to_owned(),
        }
    }
}

/// Graph id, node, input and stage.
type UpstreamKey = (usize, String, String, String);

/// State of one generation session. Created by
/// [ShaderGenerator::context](crate::generator::ShaderGenerator::context) and owned by the
/// session; never shared between sessions.
pub struct GenContext<'a> {
    backend: &'a dyn Backend,
    registry: &'a TypeRegistry,
    catalog: &'a dyn ImplementationCatalog,
    loader: &'a dyn ResourceLoader,
    overrides: &'a HashMap<String, Box<dyn NodeImplementation>>,
    color_management: Option<&'a dyn ColorManagementSystem>,
    options: GenOptions,

    graphs: usize,
    implementations: HashMap<String, Arc<dyn NodeImplementation>>,
    sources: HashMap<String, String>,
    upstream: HashMap<UpstreamKey, String>,
    build_stack: Vec<String>,
}

impl<'a> GenContext<'a> {
    #[allow(missing_docs)]
    pub fn new(
        backend: &'a dyn Backend,
        registry: &'a TypeRegistry,
        catalog: &'a dyn ImplementationCatalog,
        loader: &'a dyn ResourceLoader,
        overrides: &'a HashMap<String, Box<dyn NodeImplementation>>,
        options: GenOptions,
    ) -> Self {
        Self {
            backend,
            registry,
            catalog,
            loader,
            overrides,
            color_management: None,
            options,
            graphs: 0,
            implementations: HashMap::new(),
            sources: HashMap::new(),
            upstream: HashMap::new(),
            build_stack: Vec::new(),
        }
    }

    /// Convert color literals through `system`.
    pub fn with_color_management(mut self, system: Option<&'a dyn ColorManagementSystem>) -> Self {
        self.color_management = system;
        self
    }

    #[allow(missing_docs)]
    pub fn color_management(&self) -> Option<&'a dyn ColorManagementSystem> {
        self.color_management
    }

    /// Identity of a new graph of the session, distinguishing graphs sharing a name.
    pub(crate) fn next_graph_id(&mut self) -> usize {
        self.graphs += 1;
        self.graphs
    }

    #[allow(missing_docs)]
    pub fn backend(&self) -> &'a dyn Backend {
        self.backend
    }

    #[allow(missing_docs)]
    pub fn syntax(&self) -> &'a Syntax {
        self.backend.syntax()
    }

    #[allow(missing_docs)]
    pub fn registry(&self) -> &'a TypeRegistry {
        self.registry
    }

    #[allow(missing_docs)]
    pub fn catalog(&self) -> &'a dyn ImplementationCatalog {
        self.catalog
    }

    #[allow(missing_docs)]
    pub fn options(&self) -> &GenOptions {
        &self.options
    }

    /// Load a source file through the resource loader, once per session.
    pub fn load_source(&mut self, path: &str) -> Result<String> {
        if let Some(source) = self.sources.get(path) {
            return Ok(source.clone());
        }

        debug!("Loading `{path}`");
        let source = self.loader.load(path).map_err(|source| Error::Resource {
            path: path.to_owned(),
            source,
        })?;
        self.sources.insert(path.to_owned(), source.clone());
        Ok(source)
    }

    /// Resolve the implementation of `nodedef` for the backend's target.
    ///
    /// Lookup order: host overrides, backend built-ins, catalog entries for the target, then
    /// for the language, then target-independent ones. Results are memoized for the session so
    /// nodes sharing a definition share their implementation.
    pub fn implementation(&mut self, nodedef: &NodeDef) -> Result<Arc<dyn NodeImplementation>> {
        let target = self.backend.target();
        let key = format!("{}:{target}", nodedef.name);

        if let Some(implementation) = self.implementations.get(&key) {
            trace!("Reusing implementation of `{}`", nodedef.name);
            return Ok(implementation.clone());
        }

        if self.build_stack.contains(&key) {
            let mut chain: Vec<String> = self
                .build_stack
                .iter()
                .map(|key| key.split(':').next().unwrap_or(key).to_owned())
                .collect();
            chain.push(nodedef.name.clone());
            return Err(Error::GraphCycle { chain });
        }

        let implementation = self.create_implementation(nodedef, &key)?;
        self.implementations.insert(key, implementation.clone());
        Ok(implementation)
    }

    fn create_implementation(
        &mut self,
        nodedef: &NodeDef,
        key: &str,
    ) -> Result<Arc<dyn NodeImplementation>> {
        if let Some(implementation) = self.overrides.get(&nodedef.name) {
            debug!("Using host implementation `{}`", implementation.name());
            return Ok(Arc::from(dyn_clone::clone_box(&**implementation)));
        }

        if let Some(implementation) = self.backend.custom_implementation(&nodedef.name) {
            debug!("Using built-in implementation `{}`", implementation.name());
            return Ok(Arc::from(implementation));
        }

        let (backend, catalog) = (self.backend, self.catalog);
        let target = backend.target();
        let language = backend.language();
        let description = catalog
            .implementation(&nodedef.name, target)
            .filter(|description| description.target == target)
            .or_else(|| catalog.implementation(&nodedef.name, language))
            .ok_or_else(|| Error::NoMatchingImplementation {
                node: nodedef.name.clone(),
                target: target.to_owned(),
            })?;

        debug!(
            "Resolved `{}` to `{}` for `{target}`",
            nodedef.name, description.name
        );

        Ok(match &description.source {
            ImplementationSource::Function {
                function,
                code,
                file,
            } => {
                let code = match (code, file) {
                    (Some(code), _) => code.clone(),
                    (None, Some(file)) => self.load_source(file)?,
                    (None, None) => String::new(),
                };
                Arc::new(SourceCodeImplementation::function(
                    &description.name,
                    function,
                    &code,
                )?)
            }
            ImplementationSource::Inline(expression) => Arc::new(
                SourceCodeImplementation::inline(&description.name, expression)?,
            ),
            ImplementationSource::Graph(name) => {
                let graph = catalog
                    .node_graph(name)
                    .ok_or_else(|| Error::Missing(Reference::Graph, name.clone()))?;

                self.build_stack.push(key.to_owned());
                let compound = CompoundImplementation::new(nodedef, graph, self);
                self.build_stack.pop();

                Arc::new(compound?)
            }
        })
    }

    /// Expression reading the value of `input`: the variable of the connected output or
    /// interface input, else the formatted literal, else the type's default.
    ///
    /// Results are cached per graph, node, input and stage, so repeated queries always yield the
    /// same string. Graphs are told apart by identity, not by name.
    pub fn upstream_result(
        &mut self,
        graph: &ShaderGraph,
        node: &ShaderNode,
        input: &ShaderPort,
        stage: &ShaderStage,
    ) -> Result<String> {
        let key = (
            graph.id(),
            node.name.clone(),
            input.name.clone(),
            stage.name().to_owned(),
        );
        if let Some(result) = self.upstream.get(&key) {
            return Ok(result.clone());
        }

        let result = self.port_expression(graph, input)?;
        self.upstream.insert(key, result.clone());
        Ok(result)
    }

    /// Expression reading a port, without caching. Used for graph outputs.
    pub fn port_expression(&self, graph: &ShaderGraph, port: &ShaderPort) -> Result<String> {
        let syntax = self.syntax();
        Ok(match port.connection {
            Some(PortRef::Node { node, output }) => graph.nodes()[node].outputs[output]
                .variable
                .clone(),
            Some(PortRef::Graph(index)) => graph.inputs()[index].variable.clone(),
            None => match &port.value {
                Some(value) => syntax.format_value(&port.ty, value)?,
                None => syntax.default_value(&port.ty, false)?,
            },
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_options() {
        let options = GenOptions::default();

        assert_eq!(options.shader_interface, ShaderInterface::Reduced);
        assert!(options.emit_comments);
        assert!(!options.flip_texcoord_v);
        assert_eq!(options.shader_interface.to_string(), "reduced");
        assert_eq!(options.target_color_space, "lin_rec709");
    }
}
