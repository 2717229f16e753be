//! OSL backend: one pixel stage holding a `shader` with its parameter list.

use std::collections::HashMap;

use super::{emit, Backend};
use crate::{
    context::GenContext,
    shader::{
        graph::ShaderGraph,
        node::ShaderPort,
        stage::{BlockKind, Brackets, ShaderStage, PIXEL},
    },
    syntax::{osl, Syntax},
    Result,
};

/// Target key of OSL.
pub const TARGET: &str = "genosl";

/// Shader parameters published from the graph interface.
pub const INPUTS: &str = "ShaderInputs";
/// Output parameters of the shader.
pub const OUTPUTS: &str = "ShaderOutputs";

const STAGES: [&str; 1] = [PIXEL];

#[derive(Clone, Debug)]
/// OSL [Backend].
pub struct OslBackend {
    syntax: Syntax,
    tokens: HashMap<String, String>,
}

impl OslBackend {
    #[allow(missing_docs)]
    pub fn new() -> Self {
        Self {
            syntax: osl::syntax(),
            tokens: HashMap::from([
                ("epsilon".to_owned(), "1.0e-6".to_owned()),
                ("pi".to_owned(), "M_PI".to_owned()),
            ]),
        }
    }

    /// `type name = value` for each parameter, comma separated.
    fn parameters(&self, ctx: &GenContext, stage: &ShaderStage) -> Result<Vec<String>> {
        let syntax = ctx.syntax();
        let mut parameters = Vec::new();

        if let Some(block) = stage.block(INPUTS) {
            for port in block.iter() {
                let declaration = syntax.declaration("", &port.ty, &port.variable, None)?;
                let value = match &port.value {
                    Some(value) => syntax.format_value(&port.ty, value)?,
                    None => syntax.default_value(&port.ty, true)?,
                };
                parameters.push(format!("{declaration} = {value}"));
            }
        }

        if let Some(block) = stage.block(OUTPUTS) {
            for port in block.iter() {
                let declaration = syntax.declaration(
                    &syntax.qualifiers().output,
                    &port.ty,
                    &port.variable,
                    None,
                )?;
                let value = syntax.default_value(&port.ty, false)?;
                parameters.push(format!("{declaration} = {value}"));
            }
        }

        Ok(parameters)
    }
}

impl Default for OslBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for OslBackend {
    fn language(&self) -> &str {
        osl::LANGUAGE
    }

    fn target(&self) -> &str {
        TARGET
    }

    fn syntax(&self) -> &Syntax {
        &self.syntax
    }

    fn stages(&self) -> &[&'static str] {
        &STAGES
    }

    fn tokens(&self) -> &HashMap<String, String> {
        &self.tokens
    }

    fn create_variables(
        &self,
        graph: &ShaderGraph,
        ctx: &mut GenContext,
        stages: &mut [ShaderStage],
    ) -> Result<()> {
        for stage in stages.iter_mut().filter(|stage| stage.name() == PIXEL) {
            let inputs = stage.create_block(BlockKind::Uniform, INPUTS, "")?;
            for input in graph.inputs() {
                inputs.add(input.clone())?;
            }

            let outputs = stage.create_block(BlockKind::Output, OUTPUTS, "")?;
            for output in graph.outputs() {
                outputs.add(
                    ShaderPort::new(&output.name, output.ty.clone())
                        .with_variable(&output.variable),
                )?;
            }
        }

        emit::create_variables(graph, ctx, stages)
    }

    fn emit_stage(
        &self,
        graph: &ShaderGraph,
        ctx: &mut GenContext,
        stage: &mut ShaderStage,
    ) -> Result<()> {
        if stage.name() != PIXEL {
            return Ok(());
        }

        stage.add_line("#include \"stdosl.h\"", false);
        stage.new_line();

        emit::type_definitions(graph, ctx, stage)?;
        emit::function_definitions(graph, ctx, stage)?;

        let name = ctx.syntax().make_valid_name(graph.name());
        stage.add_line(&format!("shader {name}"), false);

        let parameters = self.parameters(ctx, stage)?;
        self.emit_scope_begin(stage, Brackets::Parentheses);
        for (index, parameter) in parameters.iter().enumerate() {
            if index + 1 < parameters.len() {
                stage.add_line(&format!("{parameter},"), false);
            } else {
                stage.add_line(parameter, false);
            }
        }
        self.emit_scope_end(stage, false, true)?;

        self.emit_scope_begin(stage, Brackets::Braces);
        emit::function_calls(graph, ctx, stage)?;
        for output in graph.outputs() {
            let result = ctx.port_expression(graph, output)?;
            stage.add_line(&format!("{} = {result}", output.variable), true);
        }
        self.emit_scope_end(stage, false, true)
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::*;
    use crate::{
        bind, context::GenOptions, document::MemoryLoader, generator::ShaderGenerator, graph,
        node, shaderlib, types::TypeRegistry,
    };

    #[test]
    fn shader_parameters() {
        let generator = ShaderGenerator::new(OslBackend::new(), Arc::new(TypeRegistry::initialize()));
        let material = graph! {
            "NG_material",
            interface:
                "gain": "float" = "0.5",
            nodes:
                "blend": node! {
                    "blend" -> "color3",
                    inputs:
                        "fg": bind!(value "1, 0, 0"),
                        "bg": bind!(value "0, 0, 1"),
                        "mode": bind!(value "add"),
                },
                "add": node! {
                    "add" -> "float",
                    inputs:
                        "in1": bind!(interface "gain"),
                        "in2": bind!(value "1"),
                },
            outputs:
                "color": "color3" = bind!(node "blend"),
                "value": "float" = bind!(node "add"),
        };

        let shader = generator
            .generate(
                "material",
                &material,
                &shaderlib::library(),
                &MemoryLoader::new(),
                GenOptions::default(),
            )
            .unwrap();

        assert_eq!(shader.stages().count(), 1);

        let source = shader.source_code(PIXEL).unwrap();
        assert!(source.starts_with("#include \"stdosl.h\"\n"));
        assert!(source.contains(
            "shader NG_material\n(\n    float gain = 0.5,\n    output color color2 = color(0.0),\n    output float value = 0.0\n)\n"
        ));
        // Strings survive as such in OSL.
        assert!(source.contains("mx_blend_color3(color(1.0, 0.0, 0.0), color(0.0, 0.0, 1.0), \"add\", blend_out);"));
        assert!(source.contains("mx_add_float(gain, 1.0, add_out);"));
        assert!(source.contains("value = add_out;"));
    }
}
