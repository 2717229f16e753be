//! Emission helpers shared by every [Backend](super::Backend) and node implementation.

use std::collections::HashSet;

use log::trace;

use crate::{
    context::GenContext,
    document::EnumMapping,
    shader::{
        graph::ShaderGraph,
        node::{ShaderNode, ShaderPort},
        stage::{Brackets, ShaderStage, PIXEL},
    },
    types::{names, TypeDesc, TypeRef, TypeRegistry},
    value::Value,
    Error, Result,
};

/// Let every node create the variables it needs in each stage.
pub fn create_variables(
    graph: &ShaderGraph,
    ctx: &mut GenContext,
    stages: &mut [ShaderStage],
) -> Result<()> {
    for node in graph.ordered() {
        node.implementation.create_variables(node, ctx, stages)?;
    }
    Ok(())
}

/// Emit the definitions of every type used by `graph`, members first, each once.
pub fn type_definitions(
    graph: &ShaderGraph,
    ctx: &GenContext,
    stage: &mut ShaderStage,
) -> Result<()> {
    fn define(
        ty: &TypeDesc,
        ctx: &GenContext,
        emitted: &mut HashSet<String>,
        stage: &mut ShaderStage,
    ) -> Result<()> {
        for (_, member) in ty.members() {
            define(member, ctx, emitted, stage)?;
        }

        if let Some(definition) = ctx.syntax().type_definition(ty)? {
            if emitted.insert(definition.clone()) {
                stage.add_block(&definition);
                stage.new_line();
            }
        }
        Ok(())
    }

    let mut emitted = HashSet::new();
    for ty in graph.used_types() {
        define(&ty, ctx, &mut emitted, stage)?;
    }
    Ok(())
}

/// Emit the function definitions of every node, each function once per stage.
pub fn function_definitions(
    graph: &ShaderGraph,
    ctx: &mut GenContext,
    stage: &mut ShaderStage,
) -> Result<()> {
    for node in graph.ordered() {
        node.implementation
            .emit_function_definition(node, ctx, stage)?;
    }
    Ok(())
}

/// Emit the calls of every node of `graph` in order.
///
/// In the pixel stage, nested closures are skipped here and emitted inside a scope just before
/// their consumer.
pub fn function_calls(
    graph: &ShaderGraph,
    ctx: &mut GenContext,
    stage: &mut ShaderStage,
) -> Result<()> {
    let pixel = stage.name() == PIXEL;

    for &index in graph.order() {
        let node = &graph.nodes()[index];
        if pixel && node.is_nested_closure() {
            continue;
        }
        if pixel {
            node_call(graph, index, ctx, stage)?;
        } else {
            node.implementation
                .emit_function_call(node, graph, ctx, stage)?;
        }
    }
    Ok(())
}

fn node_call(
    graph: &ShaderGraph,
    index: usize,
    ctx: &mut GenContext,
    stage: &mut ShaderStage,
) -> Result<()> {
    let node = &graph.nodes()[index];
    if ctx.options().emit_comments {
        stage.add_comment(&format!("{} ({})", node.name, node.nodedef));
    }

    let nested = graph.nested_closures(index);
    if nested.is_empty() {
        return node
            .implementation
            .emit_function_call(node, graph, ctx, stage);
    }

    trace!("Emitting {} nested closure(s) for `{}`", nested.len(), node.name);

    // The result must outlive the scope holding the closures.
    for output in node.outputs.iter() {
        declare_output(output, ctx, stage)?;
    }

    let backend = ctx.backend();
    backend.emit_scope_begin(stage, Brackets::Braces);
    let declared = stage.save_declarations();

    for closure in nested {
        let closure = &graph.nodes()[closure];
        closure
            .implementation
            .emit_function_call(closure, graph, ctx, stage)?;
    }
    node.implementation
        .emit_function_call(node, graph, ctx, stage)?;

    stage.restore_declarations(declared);
    backend.emit_scope_end(stage, false, true)
}

/// Declare `port`'s variable initialized to its type's default, unless already declared.
pub fn declare_output(port: &ShaderPort, ctx: &GenContext, stage: &mut ShaderStage) -> Result<()> {
    if stage.is_declared(&port.variable) {
        return Ok(());
    }

    let syntax = ctx.syntax();
    let declaration = syntax.declaration("", &port.ty, &port.variable, None)?;
    let value = syntax.default_value(&port.ty, false)?;

    stage.declare(&port.variable);
    stage.add_line(&format!("{declaration} = {value}"), true);
    Ok(())
}

/// Assign `expression` to `port`'s variable, declaring it on first assignment.
pub fn assign_output(
    port: &ShaderPort,
    expression: &str,
    ctx: &GenContext,
    stage: &mut ShaderStage,
) -> Result<()> {
    let target = if stage.is_declared(&port.variable) {
        port.variable.clone()
    } else {
        let declaration = ctx
            .syntax()
            .declaration("", &port.ty, &port.variable, None)?;
        stage.declare(&port.variable);
        declaration
    };

    stage.add_line(&format!("{target} = {expression}"), true);
    Ok(())
}

/// `function(inputs..., outputs...);`, after declaring the node's outputs.
pub fn function_call(
    function: &str,
    node: &ShaderNode,
    graph: &ShaderGraph,
    ctx: &mut GenContext,
    stage: &mut ShaderStage,
) -> Result<()> {
    for output in node.outputs.iter() {
        declare_output(output, ctx, stage)?;
    }

    let mut arguments = Vec::with_capacity(node.inputs.len() + node.outputs.len());
    for input in node.inputs.iter() {
        arguments.push(ctx.upstream_result(graph, node, input, stage)?);
    }
    arguments.extend(node.outputs.iter().map(|output| output.variable.clone()));

    stage.add_line(&format!("{function}({})", arguments.join(", ")), true);
    Ok(())
}

/// Replace an enumerated name by its integer value: the matching entry of `values` when given,
/// else its index in `names`.
///
/// # Example
/// ```
/// use shadergen::{document::EnumMapping, generator::emit, types::TypeRegistry, value::Value};
///
/// let registry = TypeRegistry::initialize();
///
/// let (_, value) = emit::remap_enumeration("add", &EnumMapping::new("over, add", ""), &registry).unwrap();
/// assert_eq!(value, Value::Integer(1));
///
/// let (_, value) = emit::remap_enumeration("add", &EnumMapping::new("over, add", "4, 8"), &registry).unwrap();
/// assert_eq!(value, Value::Integer(8));
/// ```
pub fn remap_enumeration(
    value: &str,
    mapping: &EnumMapping,
    registry: &TypeRegistry,
) -> Result<(TypeRef, Value)> {
    let unknown = || Error::UnknownEnumeration {
        value: value.to_owned(),
        names: mapping.names.clone(),
    };

    let index = mapping
        .names
        .iter()
        .position(|name| name == value.trim())
        .ok_or_else(unknown)?;
    let integer = registry.get(names::INTEGER)?;

    if mapping.values.is_empty() {
        let index = i32::try_from(index).map_err(|_| unknown())?;
        return Ok((integer, Value::Integer(index)));
    }

    let text = mapping.values.get(index).ok_or_else(unknown)?;
    match Value::parse(&integer, text) {
        Ok(value) => Ok((integer, value)),
        Err(_) => {
            let float = registry.get(names::FLOAT)?;
            let value = Value::parse(&float, text)?;
            Ok((float, value))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{generator::glsl::GlslBackend, types::TypeRegistry};

    #[test]
    fn remap_values() {
        let registry = TypeRegistry::initialize();
        let mapping = EnumMapping::new("low, high", "0.25, 0.75");

        let (ty, value) = remap_enumeration("high", &mapping, &registry).unwrap();
        assert_eq!(ty.name(), names::FLOAT);
        assert_eq!(value, Value::Float(0.75));

        assert!(matches!(
            remap_enumeration("medium", &mapping, &registry),
            Err(Error::UnknownEnumeration { .. })
        ));
    }

    #[test]
    fn declare_then_assign() {
        let registry = TypeRegistry::initialize();
        let backend = GlslBackend::new();
        let library = crate::shaderlib::library();
        let loader = crate::document::MemoryLoader::new();
        let overrides = std::collections::HashMap::new();
        let ctx = GenContext::new(
            &backend,
            &registry,
            &library,
            &loader,
            &overrides,
            Default::default(),
        );

        let port = ShaderPort::new("out", registry.get(names::FLOAT).unwrap()).with_variable("x");
        let mut stage = ShaderStage::new(PIXEL, "//");

        declare_output(&port, &ctx, &mut stage).unwrap();
        declare_output(&port, &ctx, &mut stage).unwrap();
        assign_output(&port, "1.0", &ctx, &mut stage).unwrap();

        assert_eq!(stage.code(), "float x = 0.0;\nx = 1.0;\n");
    }
}
