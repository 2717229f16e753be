//! Implementations backed by a nested node graph, emitted as their own function.

use log::trace;

use super::NodeImplementation;
use crate::{
    context::GenContext,
    document::{NodeDef, NodeGraph},
    generator::emit,
    shader::{
        graph::ShaderGraph,
        node::ShaderNode,
        stage::{Brackets, ShaderStage, PIXEL},
    },
    Result,
};

#[derive(Clone, Debug)]
/// Compound node: a [ShaderGraph] wrapped in a function.
pub struct CompoundImplementation {
    name: String,
    function: String,
    graph: ShaderGraph,
}

impl CompoundImplementation {
    /// Build the nested graph of `source`, which implements `nodedef`.
    pub fn new(nodedef: &NodeDef, source: &NodeGraph, ctx: &mut GenContext) -> Result<Self> {
        trace!("Building compound `{}` for `{}`", source.name, nodedef.name);

        let graph = ShaderGraph::compound(nodedef, source, ctx)?;
        let function = ctx.syntax().make_valid_name(&source.name);

        Ok(Self {
            name: source.name.clone(),
            function,
            graph,
        })
    }

    /// Name of the emitted function.
    pub fn function(&self) -> &str {
        &self.function
    }

    fn signature(&self, ctx: &GenContext) -> Result<String> {
        let syntax = ctx.syntax();
        let mut parameters = Vec::new();

        for input in self.graph.inputs() {
            parameters.push(syntax.declaration("", &input.ty, &input.variable, None)?);
        }
        for output in self.graph.outputs() {
            parameters.push(syntax.declaration(
                &syntax.qualifiers().output,
                &output.ty,
                &output.variable,
                None,
            )?);
        }

        Ok(format!("void {}({})", self.function, parameters.join(", ")))
    }
}

impl NodeImplementation for CompoundImplementation {
    fn name(&self) -> &str {
        &self.name
    }

    fn graph(&self) -> Option<&ShaderGraph> {
        Some(&self.graph)
    }

    fn create_variables(
        &self,
        _node: &ShaderNode,
        ctx: &mut GenContext,
        stages: &mut [ShaderStage],
    ) -> Result<()> {
        for node in self.graph.nodes() {
            node.implementation.create_variables(node, ctx, stages)?;
        }
        Ok(())
    }

    fn emit_function_definition(
        &self,
        _node: &ShaderNode,
        ctx: &mut GenContext,
        stage: &mut ShaderStage,
    ) -> Result<()> {
        if stage.name() != PIXEL {
            return Ok(());
        }

        // Nested definitions must precede this one.
        emit::function_definitions(&self.graph, ctx, stage)?;

        if !stage.add_function_definition(&self.function) {
            return Ok(());
        }

        let backend = ctx.backend();
        stage.add_line(&self.signature(ctx)?, false);
        backend.emit_scope_begin(stage, Brackets::Braces);

        let enclosing = stage.enter_function();
        emit::function_calls(&self.graph, ctx, stage)?;
        for output in self.graph.outputs() {
            let result = ctx.port_expression(&self.graph, output)?;
            stage.add_line(&format!("{} = {result}", output.variable), true);
        }
        stage.restore_declarations(enclosing);

        backend.emit_scope_end(stage, false, true)?;
        stage.new_line();

        Ok(())
    }

    fn emit_function_call(
        &self,
        node: &ShaderNode,
        graph: &ShaderGraph,
        ctx: &mut GenContext,
        stage: &mut ShaderStage,
    ) -> Result<()> {
        if stage.name() != PIXEL {
            // Nested nodes may still contribute to other stages.
            for nested in self.graph.ordered() {
                nested
                    .implementation
                    .emit_function_call(nested, &self.graph, ctx, stage)?;
            }
            return Ok(());
        }

        emit::function_call(&self.function, node, graph, ctx, stage)
    }
}
