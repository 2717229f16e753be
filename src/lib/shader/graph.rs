//! Validated, ordered [ShaderGraph] built from a frozen [InputGraph].

use std::{
    cmp::Reverse,
    collections::{BTreeSet, BinaryHeap, HashMap, HashSet},
};

use log::{debug, trace};

use super::node::{PortRef, ShaderNode, ShaderPort};
use crate::{
    color_management::ColorSpaceTransform,
    context::{GenContext, ShaderInterface},
    document::{Connection, InputGraph, NodeDef, NodeGraph, NodeInstance, PortDef},
    error::Reference,
    syntax::IdentifierSet,
    types::TypeRef,
    util::increment_name,
    value::Value,
    Error, Result,
};

/// Category of pass-through nodes, which are never instantiated.
pub const DOT: &str = "dot";

#[derive(Clone, Debug)]
/// Graph of [ShaderNode]s with its interface, in a valid emission order.
///
/// Built by [build](Self::build) for a material or by [compound](Self::compound) for the body of
/// a compound definition. Node names are unique and the graph is acyclic.
pub struct ShaderGraph {
    id: usize,
    name: String,
    inputs: Vec<ShaderPort>,
    outputs: Vec<ShaderPort>,
    nodes: Vec<ShaderNode>,
    order: Vec<usize>,
}

/// Outcome of following a connection.
enum Resolved<'s> {
    Port(PortRef),
    /// Literal found on a pass-through node.
    Literal(&'s str),
    /// Pass-through node with nothing bound.
    Unbound,
}

/// Output socket description: name and type name.
type OutputSocket<'s> = (&'s str, &'s str);

impl ShaderGraph {
    /// Build the top-level graph of a material.
    pub fn build(source: &dyn InputGraph, ctx: &mut GenContext) -> Result<Self> {
        debug!("Building shader graph `{}`", source.name());

        let outputs: Vec<OutputSocket> = source
            .outputs()
            .iter()
            .map(|output| (output.name.as_str(), output.ty.as_str()))
            .collect();

        let mut builder = Builder::new(source, true, ctx.next_graph_id());
        builder.interface(source.interface(), &outputs, ctx)?;
        builder.finish(ctx)
    }

    /// Build the body of a compound definition; its interface is the definition's signature.
    pub fn compound(nodedef: &NodeDef, source: &NodeGraph, ctx: &mut GenContext) -> Result<Self> {
        debug!("Building compound graph `{}`", source.name);

        let outputs: Vec<OutputSocket> = nodedef
            .outputs
            .iter()
            .map(|port| (port.name.as_str(), port.ty.as_str()))
            .collect();

        let mut builder = Builder::new(source, false, ctx.next_graph_id());
        builder.interface(&nodedef.inputs, &outputs, ctx)?;
        builder.finish(ctx)
    }

    /// Identity of the graph within its session.
    pub fn id(&self) -> usize {
        self.id
    }

    #[allow(missing_docs)]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Graph-level inputs.
    pub fn inputs(&self) -> &[ShaderPort] {
        &self.inputs
    }

    /// Graph-level outputs.
    pub fn outputs(&self) -> &[ShaderPort] {
        &self.outputs
    }

    /// Nodes in declaration order.
    pub fn nodes(&self) -> &[ShaderNode] {
        &self.nodes
    }

    #[allow(missing_docs)]
    pub fn node(&self, name: &str) -> Option<&ShaderNode> {
        self.nodes.iter().find(|node| node.name == name)
    }

    /// Emission order, as indices into [nodes](Self::nodes).
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Nodes in emission order.
    pub fn ordered(&self) -> impl Iterator<Item = &ShaderNode> {
        self.order.iter().map(|&index| &self.nodes[index])
    }

    /// Indices of the nodes `node` reads from, without duplicates.
    pub fn dependencies(&self, node: usize) -> BTreeSet<usize> {
        self.nodes[node]
            .inputs
            .iter()
            .filter_map(|port| match port.connection {
                Some(PortRef::Node { node, .. }) => Some(node),
                _ => None,
            })
            .collect()
    }

    /// Nested closure nodes feeding `node`, directly or through other nested closures, in
    /// emission order.
    pub fn nested_closures(&self, node: usize) -> Vec<usize> {
        let mut found = HashSet::new();
        let mut next = vec![node];

        while let Some(current) = next.pop() {
            for dependency in self.dependencies(current) {
                if self.nodes[dependency].nested_closure && found.insert(dependency) {
                    next.push(dependency);
                }
            }
        }

        self.order
            .iter()
            .copied()
            .filter(|index| found.contains(index))
            .collect()
    }

    /// Every type used by a port of this graph or of the compounds it instantiates, in first use
    /// order.
    pub fn used_types(&self) -> Vec<TypeRef> {
        let mut types = Vec::new();
        self.collect_types(&mut types);
        types
    }

    fn collect_types(&self, types: &mut Vec<TypeRef>) {
        let ports = self.inputs.iter().chain(self.outputs.iter()).chain(
            self.nodes
                .iter()
                .flat_map(|node| node.inputs.iter().chain(node.outputs.iter())),
        );
        for port in ports {
            if !types.contains(&port.ty) {
                types.push(port.ty.clone());
            }
        }

        for node in self.nodes.iter() {
            if let Some(graph) = node.implementation.graph() {
                graph.collect_types(types);
            }
        }
    }

    /// Find a cycle, returned as the chain of node names with the first one repeated last.
    fn find_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            New,
            Active,
            Done,
        }

        fn visit(
            graph: &ShaderGraph,
            node: usize,
            marks: &mut [Mark],
            path: &mut Vec<usize>,
        ) -> Option<Vec<String>> {
            marks[node] = Mark::Active;
            path.push(node);

            for dependency in graph.dependencies(node) {
                match marks[dependency] {
                    Mark::Active => {
                        let start = path
                            .iter()
                            .position(|&index| index == dependency)
                            .unwrap_or(0);
                        let mut chain: Vec<String> = path[start..]
                            .iter()
                            .map(|&index| graph.nodes[index].name.clone())
                            .collect();
                        chain.push(graph.nodes[dependency].name.clone());
                        return Some(chain);
                    }
                    Mark::New => {
                        if let Some(chain) = visit(graph, dependency, marks, path) {
                            return Some(chain);
                        }
                    }
                    Mark::Done => {}
                }
            }

            path.pop();
            marks[node] = Mark::Done;
            None
        }

        let mut marks = vec![Mark::New; self.nodes.len()];
        let mut path = Vec::new();

        (0..self.nodes.len()).find_map(|node| {
            if marks[node] == Mark::New {
                visit(self, node, &mut marks, &mut path)
            } else {
                None
            }
        })
    }

    /// Topological sort, ties broken by declaration order.
    fn sort(&mut self) -> Result<()> {
        let count = self.nodes.len();
        let mut pending = vec![0; count];
        let mut dependents = vec![Vec::new(); count];

        for node in 0..count {
            for dependency in self.dependencies(node) {
                pending[node] += 1;
                dependents[dependency].push(node);
            }
        }

        let mut ready: BinaryHeap<Reverse<usize>> = (0..count)
            .filter(|&node| pending[node] == 0)
            .map(Reverse)
            .collect();

        let mut order = Vec::with_capacity(count);
        while let Some(Reverse(node)) = ready.pop() {
            order.push(node);
            for &dependent in dependents[node].iter() {
                pending[dependent] -= 1;
                if pending[dependent] == 0 {
                    ready.push(Reverse(dependent));
                }
            }
        }

        if order.len() != count {
            return Err(Error::GraphCycle {
                chain: (0..count)
                    .filter(|node| !order.contains(node))
                    .map(|node| self.nodes[node].name.clone())
                    .collect(),
            });
        }

        self.order = order;
        Ok(())
    }

    /// Mark closure nodes read by exactly one node, and by no graph output, so they are emitted
    /// in their consumer's scope. Shared closures stay at function level.
    fn classify_closures(&mut self) {
        let mut consumers = vec![0usize; self.nodes.len()];
        for node in 0..self.nodes.len() {
            for dependency in self.dependencies(node) {
                consumers[dependency] += 1;
            }
        }

        let feeds_output: HashSet<usize> = self
            .outputs
            .iter()
            .filter_map(|port| match port.connection {
                Some(PortRef::Node { node, .. }) => Some(node),
                _ => None,
            })
            .collect();

        for (index, node) in self.nodes.iter_mut().enumerate() {
            node.nested_closure =
                node.is_closure() && consumers[index] == 1 && !feeds_output.contains(&index);
        }
    }
}

struct Builder<'s> {
    source: &'s dyn InputGraph,
    top_level: bool,
    graph: ShaderGraph,
    instances: Vec<(&'s NodeInstance, NodeDef)>,
    index: HashMap<String, usize>,
    /// Authored types of the interface inputs, before any enumeration remapping.
    declared: Vec<TypeRef>,
    colorspaces: Vec<Option<String>>,
    /// Color conversion node of each converted interface input.
    conversions: HashMap<usize, usize>,
    identifiers: IdentifierSet,
    diagnostics: Vec<Error>,
}

impl<'s> Builder<'s> {
    fn new(source: &'s dyn InputGraph, top_level: bool, id: usize) -> Self {
        Self {
            source,
            top_level,
            graph: ShaderGraph {
                id,
                name: source.name().to_owned(),
                inputs: Vec::new(),
                outputs: Vec::new(),
                nodes: Vec::new(),
                order: Vec::new(),
            },
            instances: Vec::new(),
            index: HashMap::new(),
            declared: Vec::new(),
            colorspaces: Vec::new(),
            conversions: HashMap::new(),
            identifiers: IdentifierSet::new(),
            diagnostics: Vec::new(),
        }
    }

    fn identifier(&mut self, name: &str, ctx: &GenContext) -> String {
        ctx.syntax().make_identifier(name, &mut self.identifiers)
    }

    /// Create the interface sockets; output connections are linked later.
    fn interface(
        &mut self,
        inputs: &[PortDef],
        outputs: &[OutputSocket],
        ctx: &mut GenContext,
    ) -> Result<()> {
        for port in inputs {
            let ty = ctx.registry().get(&port.ty)?;
            let variable = self.identifier(&port.name, ctx);
            let mut socket = ShaderPort::new(&port.name, ty.clone()).with_variable(&variable);
            self.declared.push(ty);
            self.colorspaces.push(port.colorspace.clone());

            if let Some(text) = port.default.as_deref() {
                let (ty, value) = literal(ctx, port, &socket.ty, text)?;
                socket.ty = ty;
                socket.value = Some(value);
            }

            self.graph.inputs.push(socket);
        }

        for &(name, ty) in outputs {
            let ty = ctx.registry().get(ty)?;
            let variable = self.identifier(name, ctx);
            self.graph
                .outputs
                .push(ShaderPort::new(name, ty).with_variable(&variable));
        }

        Ok(())
    }

    fn finish(mut self, ctx: &mut GenContext) -> Result<ShaderGraph> {
        self.instantiate(ctx)?;
        self.link_nodes(ctx);
        self.link_outputs(ctx);

        if let Some(error) = Error::from_diagnostics(std::mem::take(&mut self.diagnostics)) {
            return Err(error);
        }

        if self.top_level && ctx.options().shader_interface == ShaderInterface::Complete {
            self.publish_inputs(ctx);
        }

        let mut graph = self.graph;
        if let Some(chain) = graph.find_cycle() {
            return Err(Error::GraphCycle { chain });
        }
        graph.sort()?;
        graph.classify_closures();

        debug!(
            "Graph `{}` ready with {} node(s)",
            graph.name,
            graph.nodes.len()
        );
        Ok(graph)
    }

    fn instantiate(&mut self, ctx: &mut GenContext) -> Result<()> {
        let source = self.source;

        for instance in source.nodes().iter() {
            if instance.category == DOT {
                continue;
            }
            if self.index.contains_key(&instance.name) {
                return Err(Error::DuplicateNode(instance.name.clone()));
            }

            let nodedef = resolve_nodedef(instance, ctx)?;
            let implementation = ctx.implementation(nodedef)?;
            trace!(
                "Instantiating `{}` as `{}` with `{}`",
                instance.name,
                nodedef.name,
                implementation.name()
            );

            let inputs = nodedef
                .inputs
                .iter()
                .map(|port| Ok(ShaderPort::new(&port.name, ctx.registry().get(&port.ty)?)))
                .collect::<Result<Vec<_>>>()?;

            let outputs = self.outputs(&instance.name, nodedef, ctx)?;

            for binding in instance.inputs.iter() {
                if !nodedef.inputs.iter().any(|port| port.name == binding.name) {
                    self.diagnostics.push(Error::Missing(
                        Reference::Input,
                        format!("{}.{}", instance.name, binding.name),
                    ));
                }
            }

            self.index
                .insert(instance.name.clone(), self.graph.nodes.len());
            self.instances.push((instance, nodedef.clone()));
            self.graph.nodes.push(ShaderNode {
                name: instance.name.clone(),
                category: instance.category.clone(),
                nodedef: nodedef.name.clone(),
                inputs,
                outputs,
                implementation,
                nested_closure: false,
            });
        }

        Ok(())
    }

    /// Output ports of a node named `node`, with their variables.
    fn outputs(
        &mut self,
        node: &str,
        nodedef: &NodeDef,
        ctx: &GenContext,
    ) -> Result<Vec<ShaderPort>> {
        let mut outputs = Vec::with_capacity(nodedef.outputs.len());
        for port in nodedef.outputs.iter() {
            let ty = ctx.registry().get(&port.ty)?;
            let variable = self.identifier(&format!("{node}_{}", port.name), ctx);
            outputs.push(ShaderPort::new(&port.name, ty).with_variable(&variable));
        }
        Ok(outputs)
    }

    fn link_nodes(&mut self, ctx: &mut GenContext) {
        for node in 0..self.instances.len() {
            let instance: &'s NodeInstance = self.instances[node].0;
            let nodedef = self.instances[node].1.clone();

            for (input, port) in nodedef.inputs.iter().enumerate() {
                if let Err(error) = self.link_input(instance, node, input, port, ctx) {
                    self.diagnostics.push(error);
                }
            }
        }
    }

    fn link_input(
        &mut self,
        instance: &'s NodeInstance,
        node: usize,
        input: usize,
        port: &PortDef,
        ctx: &mut GenContext,
    ) -> Result<()> {
        let consumer = format!("{}.{}", instance.name, port.name);
        let binding = instance.input(&port.name);
        let expected = self.graph.nodes[node].inputs[input].ty.clone();

        // A connection always wins over a stale literal.
        let mut text = binding.and_then(|binding| binding.value.as_deref());
        if let Some(connection) = binding.and_then(|binding| binding.connection.as_ref()) {
            text = None;
            match self.resolve(connection, &expected, &consumer, ctx, &mut Vec::new())? {
                Resolved::Port(from) => {
                    self.graph.nodes[node].inputs[input].connect(from);
                    if let PortRef::Graph(index) = from {
                        self.forward_enumeration(node, input, index, port, ctx)?;
                        if let Some(space) = self.colorspaces[index].clone() {
                            self.convert_color(node, input, &space, ctx)?;
                        }
                    }
                    return Ok(());
                }
                Resolved::Literal(literal) => text = Some(literal),
                Resolved::Unbound => {}
            }
        }

        match text.or(port.default.as_deref()) {
            Some(text) => {
                let (ty, value) = literal(ctx, port, &expected, text)?;
                let target = &mut self.graph.nodes[node].inputs[input];
                target.ty = ty;
                target.value = Some(value);

                match binding.and_then(|binding| binding.colorspace.as_deref()) {
                    Some(space) => self.convert_color(node, input, space, ctx),
                    None => Ok(()),
                }
            }
            // Closures and shaders fall back to their language default.
            None if Value::zero(&expected).is_some() => Err(Error::MissingRequiredInput {
                node: instance.name.clone(),
                input: port.name.clone(),
            }),
            None => Ok(()),
        }
    }

    /// An interface input read by an enumerated input takes the remapped type and value of its
    /// first such consumer; every consumer then reads the remapped type.
    fn forward_enumeration(
        &mut self,
        node: usize,
        input: usize,
        index: usize,
        port: &PortDef,
        ctx: &GenContext,
    ) -> Result<()> {
        if port.enumeration.is_none() {
            return Ok(());
        }

        let declared = self.declared[index].clone();
        let interface = &self.graph.inputs[index];
        if interface.ty == declared {
            let text = match &interface.value {
                Some(Value::String(text)) => Some(text.clone()),
                _ => port.default.clone(),
            };
            if let Some(text) = text {
                let (ty, value) = literal(ctx, port, &declared, &text)?;
                trace!("Remapped interface input `{}` to `{}`", interface.name, ty.name());

                let interface = &mut self.graph.inputs[index];
                interface.ty = ty;
                interface.value = Some(value);
            }
        }

        self.graph.nodes[node].inputs[input].ty = self.graph.inputs[index].ty.clone();
        Ok(())
    }

    /// Read `node.input` through a conversion from `space` to the working color space, when a
    /// color management system provides one. Interface inputs share a single conversion.
    fn convert_color(
        &mut self,
        node: usize,
        input: usize,
        space: &str,
        ctx: &mut GenContext,
    ) -> Result<()> {
        let Some(system) = ctx.color_management() else {
            return Ok(());
        };
        let target = ctx.options().target_color_space.clone();
        if space.is_empty() || space == target {
            return Ok(());
        }

        let port = &self.graph.nodes[node].inputs[input];
        let (ty, source, value) = (port.ty.clone(), port.connection, port.value.clone());
        let consumer = format!("{}_{}", self.graph.nodes[node].name, port.name);
        let origin = match source {
            Some(PortRef::Graph(index)) => {
                if let Some(&converter) = self.conversions.get(&index) {
                    self.graph.nodes[node].inputs[input].connect(PortRef::Node {
                        node: converter,
                        output: 0,
                    });
                    return Ok(());
                }
                self.graph.inputs[index].name.clone()
            }
            _ => consumer,
        };

        let transform = ColorSpaceTransform::new(space, &target, ty);
        let Some(nodedef) = system.nodedef(&transform, ctx.catalog()) else {
            debug!(
                "`{}` cannot convert `{}` from `{space}` to `{target}`",
                system.name(),
                transform.ty.name()
            );
            return Ok(());
        };

        let converter = self.add_converter(nodedef, &origin, ctx)?;
        let converted = self.graph.nodes[converter]
            .input_index("in")
            .ok_or_else(|| Error::Missing(Reference::Input, format!("{}.in", nodedef.name)))?;
        {
            let converted = &mut self.graph.nodes[converter].inputs[converted];
            match source {
                Some(from) => converted.connect(from),
                None => converted.value = value,
            }
        }

        if let Some(PortRef::Graph(index)) = source {
            self.conversions.insert(index, converter);
        }
        self.graph.nodes[node].inputs[input].connect(PortRef::Node {
            node: converter,
            output: 0,
        });
        Ok(())
    }

    /// Instantiate a color conversion node named after `origin`.
    fn add_converter(
        &mut self,
        nodedef: &NodeDef,
        origin: &str,
        ctx: &mut GenContext,
    ) -> Result<usize> {
        let implementation = ctx.implementation(nodedef)?;

        let mut name = format!("{origin}_cm");
        while self.index.contains_key(&name)
            || self.source.node(&name).is_some()
            || self.graph.node(&name).is_some()
        {
            name = increment_name(&name);
        }
        trace!("Converting `{origin}` through `{name}` ({})", nodedef.name);

        let inputs = nodedef
            .inputs
            .iter()
            .map(|port| -> Result<ShaderPort> {
                let ty = ctx.registry().get(&port.ty)?;
                let value = port
                    .default
                    .as_deref()
                    .map(|text| Value::parse(&ty, text))
                    .transpose()?;
                Ok(ShaderPort::new(&port.name, ty).with_value(value))
            })
            .collect::<Result<Vec<_>>>()?;
        let outputs = self.outputs(&name, nodedef, ctx)?;

        self.graph.nodes.push(ShaderNode {
            name,
            category: nodedef.category.clone(),
            nodedef: nodedef.name.clone(),
            inputs,
            outputs,
            implementation,
            nested_closure: false,
        });
        Ok(self.graph.nodes.len() - 1)
    }

    fn link_outputs(&mut self, ctx: &GenContext) {
        let source = self.source;
        let connections: Vec<Option<&Connection>> = if self.top_level {
            source
                .outputs()
                .iter()
                .map(|output| output.connection.as_ref())
                .collect()
        } else {
            // Compound outputs follow the definition's signature.
            self.graph
                .outputs
                .iter()
                .map(|port| {
                    source
                        .outputs()
                        .iter()
                        .find(|output| output.name == port.name)
                        .and_then(|output| output.connection.as_ref())
                })
                .collect()
        };

        for (index, connection) in connections.into_iter().enumerate() {
            let expected = self.graph.outputs[index].ty.clone();
            let name = self.graph.outputs[index].name.clone();

            let unconnected = Error::UnconnectedOutput {
                graph: self.graph.name.clone(),
                output: name.clone(),
            };
            let Some(connection) = connection else {
                self.diagnostics.push(unconnected);
                continue;
            };

            match self.resolve(connection, &expected, &name, ctx, &mut Vec::new()) {
                Ok(Resolved::Port(from)) => self.graph.outputs[index].connect(from),
                Ok(Resolved::Literal(text)) => match Value::parse(&expected, text) {
                    Ok(value) => self.graph.outputs[index].value = Some(value),
                    Err(error) => self.diagnostics.push(error.into()),
                },
                Ok(Resolved::Unbound) => self.diagnostics.push(unconnected),
                Err(error) => self.diagnostics.push(error),
            }
        }
    }

    /// Follow `connection` through pass-through nodes, checking the type at each hop. `dots`
    /// holds the pass-through nodes followed so far.
    fn resolve(
        &self,
        connection: &'s Connection,
        expected: &TypeRef,
        consumer: &str,
        ctx: &GenContext,
        dots: &mut Vec<String>,
    ) -> Result<Resolved<'s>> {
        let source = self.source;

        match connection {
            Connection::Interface(name) => {
                let index = self
                    .graph
                    .inputs
                    .iter()
                    .position(|port| port.name == *name)
                    .ok_or_else(|| Error::Missing(Reference::Interface, name.clone()))?;
                check_types(&self.declared[index], name, expected, consumer)?;
                Ok(Resolved::Port(PortRef::Graph(index)))
            }
            Connection::Node { node, output } => {
                let instance = source
                    .node(node)
                    .ok_or_else(|| Error::Missing(Reference::Node, node.clone()))?;

                if instance.category == DOT {
                    if let Some(start) = dots.iter().position(|dot| dot == node) {
                        let mut chain = dots.split_off(start);
                        chain.push(node.clone());
                        return Err(Error::GraphCycle { chain });
                    }
                    dots.push(node.clone());

                    let ty = ctx.registry().get(&instance.ty)?;
                    check_types(&ty, node, expected, consumer)?;

                    return Ok(match instance.input("in") {
                        Some(binding) => match (&binding.connection, &binding.value) {
                            (Some(upstream), _) => self.resolve(upstream, &ty, node, ctx, dots)?,
                            (None, Some(value)) => Resolved::Literal(value),
                            (None, None) => Resolved::Unbound,
                        },
                        None => Resolved::Unbound,
                    });
                }

                let &index = self
                    .index
                    .get(node)
                    .ok_or_else(|| Error::Missing(Reference::Node, node.clone()))?;
                let producer = &self.graph.nodes[index];

                let output = match output {
                    Some(name) => producer
                        .outputs
                        .iter()
                        .position(|port| port.name == *name)
                        .ok_or_else(|| {
                            Error::Missing(Reference::Output, format!("{node}.{name}"))
                        })?,
                    None => 0,
                };
                let port = producer
                    .outputs
                    .get(output)
                    .ok_or_else(|| Error::Missing(Reference::Output, node.clone()))?;

                check_types(
                    &port.ty,
                    &format!("{node}.{}", port.name),
                    expected,
                    consumer,
                )?;
                Ok(Resolved::Port(PortRef::Node {
                    node: index,
                    output,
                }))
            }
        }
    }

    /// Publish every unconnected literal input as a graph input.
    fn publish_inputs(&mut self, ctx: &GenContext) {
        for node in 0..self.graph.nodes.len() {
            for input in 0..self.graph.nodes[node].inputs.len() {
                let port = &self.graph.nodes[node].inputs[input];
                if port.connection.is_some() || port.value.is_none() {
                    continue;
                }

                let name = format!("{}_{}", self.graph.nodes[node].name, port.name);
                let variable = self.identifier(&name, ctx);

                let port = &mut self.graph.nodes[node].inputs[input];
                let published = ShaderPort::new(&name, port.ty.clone())
                    .with_variable(&variable)
                    .with_value(port.value.take());

                trace!("Publishing `{name}` as `{variable}`");
                port.connect(PortRef::Graph(self.graph.inputs.len()));
                self.graph.inputs.push(published);
            }
        }
    }
}

fn resolve_nodedef<'a>(instance: &NodeInstance, ctx: &GenContext<'a>) -> Result<&'a NodeDef> {
    let catalog = ctx.catalog();
    let target = ctx.backend().target();

    match &instance.nodedef {
        Some(name) => catalog
            .nodedef(name)
            .ok_or_else(|| Error::NoMatchingImplementation {
                node: name.clone(),
                target: target.to_owned(),
            }),
        None => catalog
            .find_nodedef(&instance.category, &instance.ty)
            .ok_or_else(|| Error::NoMatchingImplementation {
                node: format!("{}({})", instance.category, instance.ty),
                target: target.to_owned(),
            }),
    }
}

/// Parse a literal for `port`, remapping enumerations when the backend asks for it.
fn literal(ctx: &GenContext, port: &PortDef, ty: &TypeRef, text: &str) -> Result<(TypeRef, Value)> {
    if let Some(mapping) = &port.enumeration {
        if let Some(remapped) =
            ctx.backend()
                .remap_enumeration(text, mapping, ty, ctx.registry())?
        {
            return Ok(remapped);
        }
    }

    Ok((ty.clone(), Value::parse(ty, text)?))
}

fn check_types(from_ty: &TypeRef, from: &str, to_ty: &TypeRef, to: &str) -> Result<()> {
    if from_ty == to_ty {
        Ok(())
    } else {
        Err(Error::TypeMismatch {
            from: from.to_owned(),
            from_type: from_ty.name().to_owned(),
            to: to.to_owned(),
            to_type: to_ty.name().to_owned(),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        bind,
        context::GenOptions,
        document::MemoryLoader,
        generator::glsl::GlslBackend,
        graph, node, shaderlib,
        types::TypeRegistry,
    };

    fn build_with(source: &NodeGraph, options: GenOptions) -> Result<ShaderGraph> {
        let registry = TypeRegistry::initialize();
        let backend = GlslBackend::new();
        let library = shaderlib::library();
        let loader = MemoryLoader::new();
        let overrides = HashMap::new();
        let mut ctx = GenContext::new(&backend, &registry, &library, &loader, &overrides, options);

        ShaderGraph::build(source, &mut ctx)
    }

    fn build(source: &NodeGraph) -> Result<ShaderGraph> {
        build_with(source, GenOptions::default())
    }

    #[cfg(test)]
    mod validation {
        use super::*;

        #[test]
        fn cycle() {
            let result = build(&graph! {
                "NG_cycle",
                nodes:
                    "a": node! { "add" -> "float", inputs: "in1": bind!(node "b") },
                    "b": node! { "add" -> "float", inputs: "in1": bind!(node "a") },
                outputs:
                    "out": "float" = bind!(node "a"),
            });

            match result {
                Err(Error::GraphCycle { chain }) => assert_eq!(chain, vec!["a", "b", "a"]),
                other => panic!("Expected a cycle, got `{other:?}`"),
            }
        }

        #[test]
        fn dot_cycle() {
            let result = build(&graph! {
                "NG_dot_cycle",
                nodes:
                    "d1": node! { "dot" -> "float", inputs: "in": bind!(node "d2") },
                    "d2": node! { "dot" -> "float", inputs: "in": bind!(node "d1") },
                    "add": node! { "add" -> "float", inputs: "in1": bind!(node "d1") },
                outputs:
                    "out": "float" = bind!(node "add"),
            });

            match result {
                Err(Error::GraphCycle { chain }) => assert_eq!(chain, vec!["d1", "d2", "d1"]),
                other => panic!("Expected a cycle, got `{other:?}`"),
            }
        }

        #[test]
        fn type_mismatch() {
            let result = build(&graph! {
                "NG_mismatch",
                nodes:
                    "position": node! { "constant" -> "vector3", inputs: "value": bind!(value "0, 1, 0") },
                    "add": node! { "add" -> "float", inputs: "in1": bind!(node "position") },
                outputs:
                    "out": "float" = bind!(node "add"),
            });

            assert!(
                matches!(result, Err(Error::TypeMismatch { ref from_type, ref to_type, .. })
                    if from_type == "vector3" && to_type == "float"),
                "Expected a type mismatch, got `{result:?}`"
            );
        }

        #[test]
        fn diagnostics_are_aggregated() {
            let result = build(&graph! {
                "NG_missing",
                nodes:
                    "a": node! { "divide" -> "float" },
                    "b": node! { "divide" -> "float" },
                outputs:
                    "out": "float" = bind!(node "a"),
                    "out2": "float" = bind!(node "b"),
            });

            let error = result.unwrap_err();
            let diagnostics = error.diagnostics();
            assert_eq!(diagnostics.len(), 2);
            assert!(diagnostics
                .iter()
                .all(|error| matches!(error, Error::MissingRequiredInput { input, .. } if input == "in1")));
        }

        #[test]
        fn duplicate_node() {
            let result = build(&graph! {
                "NG_duplicate",
                nodes:
                    "a": node! { "constant" -> "float" },
                    "a": node! { "constant" -> "float" },
                outputs:
                    "out": "float" = bind!(node "a"),
            });

            assert!(matches!(result, Err(Error::DuplicateNode(name)) if name == "a"));
        }

        #[test]
        fn unknown_node() {
            let result = build(&graph! {
                "NG_unknown",
                nodes:
                    "a": node! { "teleport" -> "float" },
                outputs:
                    "out": "float" = bind!(node "a"),
            });

            assert!(matches!(result, Err(Error::NoMatchingImplementation { .. })));
        }

        #[test]
        fn unconnected_output() {
            let result = build(&graph! {
                "NG_unconnected",
                nodes:
                    "a": node! { "constant" -> "float" },
                outputs:
                    "out": "float" = bind!(value "1.0"),
            });

            assert!(matches!(result, Err(Error::UnconnectedOutput { .. })));
        }
    }

    #[cfg(test)]
    mod linking {
        use super::*;

        #[test]
        fn connection_wins_over_stale_literal() {
            let graph = build(&graph! {
                "NG_stale",
                nodes:
                    "one": node! { "constant" -> "float", inputs: "value": bind!(value "1.0") },
                    "add": node! { "add" -> "float", inputs: "in1": bind!(value "5.0") }
                        .bind("in1", bind!(node "one")),
                outputs:
                    "out": "float" = bind!(node "add"),
            })
            .unwrap();

            let input = graph.node("add").unwrap().input("in1").unwrap();
            assert_eq!(input.connection, Some(PortRef::Node { node: 0, output: 0 }));
            assert!(input.value.is_none());
        }

        #[test]
        fn dot_nodes_are_followed() {
            let graph = build(&graph! {
                "NG_dot",
                interface:
                    "amount": "float" = "0.25",
                nodes:
                    "relay": node! { "dot" -> "float", inputs: "in": bind!(interface "amount") },
                    "literal": node! { "dot" -> "float", inputs: "in": bind!(value "3.0") },
                    "add": node! {
                        "add" -> "float",
                        inputs:
                            "in1": bind!(node "relay"),
                            "in2": bind!(node "literal"),
                    },
                outputs:
                    "out": "float" = bind!(node "add"),
            })
            .unwrap();

            assert_eq!(graph.nodes().len(), 1);
            let add = graph.node("add").unwrap();
            assert_eq!(add.inputs[0].connection, Some(PortRef::Graph(0)));
            assert_eq!(add.inputs[1].value, Some(Value::Float(3.)));
        }

        #[test]
        fn dot_hops_are_type_checked() {
            let result = build(&graph! {
                "NG_dot_mismatch",
                nodes:
                    "color": node! { "constant" -> "color3" },
                    "relay": node! { "dot" -> "float", inputs: "in": bind!(node "color") },
                    "add": node! { "add" -> "float", inputs: "in1": bind!(node "relay") },
                outputs:
                    "out": "float" = bind!(node "add"),
            });

            assert!(matches!(result, Err(Error::TypeMismatch { .. })));
        }

        #[test]
        fn enumerations_are_remapped() {
            let graph = build(&graph! {
                "NG_blend",
                nodes:
                    "blend": node! { "blend" -> "color3", inputs: "mode": bind!(value "add") },
                outputs:
                    "out": "color3" = bind!(node "blend"),
            })
            .unwrap();

            let mode = graph.node("blend").unwrap().input("mode").unwrap();
            assert_eq!(mode.ty.name(), "integer");
            assert_eq!(mode.value, Some(Value::Integer(1)));

            let result = build(&graph! {
                "NG_blend_unknown",
                nodes:
                    "blend": node! { "blend" -> "color3", inputs: "mode": bind!(value "screen") },
                outputs:
                    "out": "color3" = bind!(node "blend"),
            });
            assert!(matches!(result, Err(Error::UnknownEnumeration { .. })));
        }

        #[test]
        fn interface_enumerations_are_remapped() {
            let graph = build(&graph! {
                "NG_blend",
                interface:
                    "mode": "string" = "add",
                nodes:
                    "relay": node! { "dot" -> "string", inputs: "in": bind!(interface "mode") },
                    "first": node! { "blend" -> "color3", inputs: "mode": bind!(interface "mode") },
                    "second": node! { "blend" -> "color3", inputs: "mode": bind!(node "relay") },
                outputs:
                    "out": "color3" = bind!(node "first"),
                    "out2": "color3" = bind!(node "second"),
            })
            .unwrap();

            let mode = &graph.inputs()[0];
            assert_eq!(mode.ty.name(), "integer");
            assert_eq!(mode.value, Some(Value::Integer(1)));

            for node in ["first", "second"] {
                let input = graph.node(node).unwrap().input("mode").unwrap();
                assert_eq!(input.ty.name(), "integer");
                assert_eq!(input.connection, Some(PortRef::Graph(0)));
            }
        }

        #[test]
        fn complete_interface_publishes_literals() {
            let options = GenOptions {
                shader_interface: ShaderInterface::Complete,
                ..Default::default()
            };
            let graph = build_with(
                &graph! {
                    "NG_complete",
                    nodes:
                        "add": node! { "add" -> "float", inputs: "in1": bind!(value "1.0") },
                    outputs:
                        "out": "float" = bind!(node "add"),
                },
                options,
            )
            .unwrap();

            let names: Vec<&str> = graph.inputs().iter().map(|port| port.name.as_str()).collect();
            assert_eq!(names, vec!["add_in1", "add_in2"]);
            assert_eq!(graph.inputs()[0].value, Some(Value::Float(1.)));
            assert!(graph.node("add").unwrap().inputs.iter().all(|port| port.value.is_none()));
        }
    }

    #[cfg(test)]
    mod ordering {
        use super::*;

        #[test]
        fn ties_follow_declaration_order() {
            let graph = build(&graph! {
                "NG_order",
                nodes:
                    "sum": node! {
                        "add" -> "float",
                        inputs:
                            "in1": bind!(node "b"),
                            "in2": bind!(node "a"),
                    },
                    "b": node! { "constant" -> "float" },
                    "a": node! { "constant" -> "float" },
                outputs:
                    "out": "float" = bind!(node "sum"),
            })
            .unwrap();

            let order: Vec<&str> = graph.ordered().map(|node| node.name.as_str()).collect();
            assert_eq!(order, vec!["b", "a", "sum"]);
        }

        #[test]
        fn closures_are_nested() {
            let graph = build(&graph! {
                "NG_surface",
                nodes:
                    "diffuse": node! { "diffuse_bsdf" -> "BSDF" },
                    "surface": node! {
                        "surface" -> "surfaceshader",
                        inputs: "bsdf": bind!(node "diffuse"),
                    },
                outputs:
                    "out": "surfaceshader" = bind!(node "surface"),
            })
            .unwrap();

            assert!(graph.node("diffuse").unwrap().is_nested_closure());
            assert!(!graph.node("surface").unwrap().is_nested_closure());
            assert_eq!(graph.nested_closures(1), vec![0]);
        }

        #[test]
        fn shared_closures_are_not_nested() {
            let graph = build(&graph! {
                "NG_surfaces",
                nodes:
                    "diffuse": node! { "diffuse_bsdf" -> "BSDF" },
                    "s1": node! { "surface" -> "surfaceshader", inputs: "bsdf": bind!(node "diffuse") },
                    "s2": node! { "surface" -> "surfaceshader", inputs: "bsdf": bind!(node "diffuse") },
                outputs:
                    "out": "surfaceshader" = bind!(node "s1"),
                    "out2": "surfaceshader" = bind!(node "s2"),
            })
            .unwrap();

            assert!(!graph.node("diffuse").unwrap().is_nested_closure());
            assert!(graph.nested_closures(1).is_empty());
            assert!(graph.nested_closures(2).is_empty());
        }
    }
}
