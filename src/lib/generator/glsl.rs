//! GLSL backend, emitting a vertex and a pixel stage for desktop GLSL or OpenGL ES.

use std::collections::HashMap;

use log::trace;

use super::{emit, Backend};
use crate::{
    context::GenContext,
    document::EnumMapping,
    implementation::{
        geometry::{GeometryNode, VERTEX_INPUTS},
        NodeImplementation,
    },
    shader::{
        graph::ShaderGraph,
        node::ShaderPort,
        stage::{BlockKind, Brackets, ShaderStage, VariableBlock, PIXEL, VERTEX},
    },
    syntax::{glsl, Syntax},
    types::{names, BaseType, Semantic, TypeDesc, TypeRef, TypeRegistry},
    value::Value,
    Result,
};

/// Target key of desktop GLSL.
pub const TARGET: &str = "genglsl";
/// Target key of OpenGL ES 3.
pub const ESSL_TARGET: &str = "essl";

/// Uniforms set by the renderer.
pub const PRIVATE_UNIFORMS: &str = "PrivateUniforms";
/// Uniforms published from the graph interface.
pub const PUBLIC_UNIFORMS: &str = "PublicUniforms";
/// Framebuffer outputs of the pixel stage.
pub const PIXEL_OUTPUTS: &str = "PixelOutputs";

const WORLD_MATRIX: &str = "u_worldMatrix";
const VIEW_PROJECTION_MATRIX: &str = "u_viewProjectionMatrix";
const POSITION: &str = "i_position";

const STAGES: [&str; 2] = [VERTEX, PIXEL];

#[derive(Clone, Debug)]
/// GLSL [Backend].
pub struct GlslBackend {
    target: &'static str,
    syntax: Syntax,
    tokens: HashMap<String, String>,
}

impl GlslBackend {
    /// Desktop GLSL; the version comes from [GenOptions](crate::context::GenOptions).
    pub fn new() -> Self {
        Self::with_target(TARGET)
    }

    /// OpenGL ES 3.0.
    pub fn essl() -> Self {
        Self::with_target(ESSL_TARGET)
    }

    fn with_target(target: &'static str) -> Self {
        let tokens = [("epsilon", "1.0e-6"), ("pi", "3.14159265358979323846")]
            .into_iter()
            .map(|(token, value)| (token.to_owned(), value.to_owned()))
            .collect();

        Self {
            target,
            syntax: glsl::syntax(),
            tokens,
        }
    }

    #[allow(missing_docs)]
    pub fn is_essl(&self) -> bool {
        self.target == ESSL_TARGET
    }

    fn emit_version(&self, ctx: &GenContext, stage: &mut ShaderStage) {
        if self.is_essl() {
            stage.add_line("#version 300 es", false);
            stage.new_line();
            stage.add_line("precision mediump float", true);
        } else {
            stage.add_line(&format!("#version {}", ctx.options().glsl_version), false);
        }
        stage.new_line();
    }

    fn emit_uniforms(&self, ctx: &GenContext, stage: &mut ShaderStage) -> Result<()> {
        let syntax = ctx.syntax();
        let blocks: Vec<VariableBlock> = stage.blocks(BlockKind::Uniform).cloned().collect();

        for block in blocks.iter().filter(|block| !block.is_empty()) {
            if ctx.options().emit_comments {
                stage.add_comment(&format!("Uniform block: {}", block.name()));
            }

            for port in block.iter() {
                let declaration = syntax.declaration(
                    &syntax.qualifiers().uniform,
                    &port.ty,
                    &port.variable,
                    None,
                )?;

                // ES and samplers reject initializers.
                let initializer = match &port.value {
                    Some(value)
                        if !self.is_essl() && port.ty.semantic() != Semantic::Filename =>
                    {
                        format!(" = {}", syntax.format_value(&port.ty, value)?)
                    }
                    _ => String::new(),
                };
                stage.add_line(&format!("{declaration}{initializer}"), true);
            }
            stage.new_line();
        }

        Ok(())
    }

    /// `qualifier Name { ... } instance;`, or loose variables for blocks without an instance.
    fn emit_interface_blocks(
        &self,
        kind: BlockKind,
        ctx: &GenContext,
        stage: &mut ShaderStage,
    ) -> Result<()> {
        let syntax = ctx.syntax();
        let qualifier = match kind {
            BlockKind::Input => &syntax.qualifiers().input,
            _ => &syntax.qualifiers().output,
        };
        let blocks: Vec<VariableBlock> = stage.blocks(kind).cloned().collect();

        for block in blocks.iter().filter(|block| !block.is_empty()) {
            if block.instance().is_empty() {
                for port in block.iter() {
                    let declaration =
                        syntax.declaration(qualifier, &port.ty, &port.variable, None)?;
                    stage.add_line(&declaration, true);
                }
            } else {
                stage.add_line(&format!("{qualifier} {}", block.name()), false);
                self.emit_scope_begin(stage, Brackets::Braces);
                for port in block.iter() {
                    stage.add_line(&syntax.declaration("", &port.ty, &port.variable, None)?, true);
                }
                self.emit_scope_end(stage, false, false)?;
                stage.add_string(&format!(" {};", block.instance()));
                stage.new_line();
            }
            stage.new_line();
        }

        Ok(())
    }

    fn emit_vertex(
        &self,
        graph: &ShaderGraph,
        ctx: &mut GenContext,
        stage: &mut ShaderStage,
    ) -> Result<()> {
        self.emit_version(ctx, stage);
        self.emit_uniforms(ctx, stage)?;
        self.emit_interface_blocks(BlockKind::Input, ctx, stage)?;
        self.emit_interface_blocks(BlockKind::Output, ctx, stage)?;

        stage.add_line("void main()", false);
        self.emit_scope_begin(stage, Brackets::Braces);
        stage.add_line(
            &format!("vec4 hPositionWorld = {WORLD_MATRIX} * vec4({POSITION}, 1.0)"),
            true,
        );
        stage.add_line(
            &format!("gl_Position = {VIEW_PROJECTION_MATRIX} * hPositionWorld"),
            true,
        );
        emit::function_calls(graph, ctx, stage)?;
        self.emit_scope_end(stage, false, true)
    }

    fn emit_pixel(
        &self,
        graph: &ShaderGraph,
        ctx: &mut GenContext,
        stage: &mut ShaderStage,
    ) -> Result<()> {
        self.emit_version(ctx, stage);
        emit::type_definitions(graph, ctx, stage)?;
        self.emit_uniforms(ctx, stage)?;
        self.emit_interface_blocks(BlockKind::Input, ctx, stage)?;
        self.emit_interface_blocks(BlockKind::Output, ctx, stage)?;

        emit::function_definitions(graph, ctx, stage)?;

        stage.add_line("void main()", false);
        self.emit_scope_begin(stage, Brackets::Braces);
        emit::function_calls(graph, ctx, stage)?;

        for output in graph.outputs() {
            let result = ctx.port_expression(graph, output)?;
            stage.add_line(
                &format!("{} = {}", output.variable, to_vec4(&output.ty, &result)),
                true,
            );
        }

        self.emit_scope_end(stage, false, true)
    }
}

impl Default for GlslBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Widen a value of `ty` to the `vec4` written to the framebuffer.
fn to_vec4(ty: &TypeDesc, expression: &str) -> String {
    match ty.name() {
        names::FLOAT => format!("vec4(vec3({expression}), 1.0)"),
        names::INTEGER | names::BOOLEAN => format!("vec4(vec3(float({expression})), 1.0)"),
        names::VECTOR2 | names::COLOR2 => format!("vec4({expression}, 0.0, 1.0)"),
        names::VECTOR3 | names::COLOR3 | names::EDF => format!("vec4({expression}, 1.0)"),
        names::VECTOR4 | names::COLOR4 => expression.to_owned(),
        names::BSDF => format!("vec4({expression}.response, 1.0)"),
        names::SURFACESHADER | names::VOLUMESHADER => {
            format!("vec4({expression}.color, 1.0)")
        }
        _ => "vec4(0.0, 0.0, 0.0, 1.0)".to_owned(),
    }
}

impl Backend for GlslBackend {
    fn language(&self) -> &str {
        glsl::LANGUAGE
    }

    fn target(&self) -> &str {
        self.target
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

    fn custom_implementation(&self, nodedef: &str) -> Option<Box<dyn NodeImplementation>> {
        match nodedef {
            "ND_texcoord_vector2" => Some(Box::new(GeometryNode::texcoord())),
            "ND_position_vector3" => Some(Box::new(GeometryNode::position())),
            _ => None,
        }
    }

    fn remap_enumeration(
        &self,
        value: &str,
        mapping: &EnumMapping,
        ty: &TypeRef,
        registry: &TypeRegistry,
    ) -> Result<Option<(TypeRef, Value)>> {
        // GLSL has no strings.
        if ty.basetype() != BaseType::String || ty.semantic() == Semantic::Filename {
            return Ok(None);
        }
        emit::remap_enumeration(value, mapping, registry).map(Some)
    }

    fn create_variables(
        &self,
        graph: &ShaderGraph,
        ctx: &mut GenContext,
        stages: &mut [ShaderStage],
    ) -> Result<()> {
        let registry = ctx.registry();
        let matrix44 = registry.get(names::MATRIX44)?;
        let vector3 = registry.get(names::VECTOR3)?;
        let color4 = registry.get(names::COLOR4)?;

        for stage in stages.iter_mut() {
            let name = stage.name().to_owned();
            match name.as_str() {
                VERTEX => {
                    let uniforms = stage.create_block(BlockKind::Uniform, PRIVATE_UNIFORMS, "")?;
                    for matrix in [WORLD_MATRIX, VIEW_PROJECTION_MATRIX] {
                        uniforms.add(ShaderPort::new(matrix, matrix44.clone()).with_variable(matrix))?;
                    }
                    stage
                        .create_block(BlockKind::Input, VERTEX_INPUTS, "")?
                        .add(ShaderPort::new(POSITION, vector3.clone()).with_variable(POSITION))?;
                }
                PIXEL => {
                    let uniforms = stage.create_block(BlockKind::Uniform, PUBLIC_UNIFORMS, "")?;
                    for input in graph.inputs() {
                        uniforms.add(input.clone())?;
                    }

                    let outputs = stage.create_block(BlockKind::Output, PIXEL_OUTPUTS, "")?;
                    for output in graph.outputs() {
                        outputs.add(
                            ShaderPort::new(&output.name, color4.clone())
                                .with_variable(&output.variable),
                        )?;
                    }
                }
                _ => {}
            }
            trace!("Created variables of stage `{name}`");
        }

        emit::create_variables(graph, ctx, stages)
    }

    fn emit_stage(
        &self,
        graph: &ShaderGraph,
        ctx: &mut GenContext,
        stage: &mut ShaderStage,
    ) -> Result<()> {
        let name = stage.name().to_owned();
        match name.as_str() {
            VERTEX => self.emit_vertex(graph, ctx, stage),
            PIXEL => self.emit_pixel(graph, ctx, stage),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::*;
    use crate::{
        bind,
        context::GenOptions,
        document::MemoryLoader,
        generator::ShaderGenerator,
        graph, node, shaderlib,
    };

    fn generate(backend: GlslBackend, options: GenOptions) -> crate::shader::shader::Shader {
        let generator = ShaderGenerator::new(backend, Arc::new(TypeRegistry::initialize()));
        let material = graph! {
            "NG_material",
            interface:
                "tint": "color3" = "1, 0.5, 0",
            nodes:
                "uv": node! { "texcoord" -> "vector2" },
                "tinted": node! {
                    "multiply" -> "color3",
                    inputs:
                        "in1": bind!(interface "tint"),
                        "in2": bind!(value "2, 2, 2"),
                },
            outputs:
                "color": "color3" = bind!(node "tinted"),
                "uv": "vector2" = bind!(node "uv"),
        };

        generator
            .generate(
                "material",
                &material,
                &shaderlib::library(),
                &MemoryLoader::new(),
                options,
            )
            .unwrap()
    }

    #[test]
    fn vertex_stage() {
        let shader = generate(GlslBackend::new(), GenOptions::default());
        let vertex = shader.source_code(VERTEX).unwrap();

        assert!(vertex.starts_with("#version 400\n"));
        assert!(vertex.contains("uniform mat4 u_worldMatrix;"));
        assert!(vertex.contains("in vec3 i_position;"));
        assert!(vertex.contains("in vec2 i_texcoord_0;"));
        assert!(vertex.contains("out VertexData\n{\n    vec2 texcoord_0;\n} vd;"));
        assert!(vertex.contains("gl_Position = u_viewProjectionMatrix * hPositionWorld;"));
        assert!(vertex.contains("vd.texcoord_0 = i_texcoord_0;"));
    }

    #[test]
    fn pixel_stage() {
        let shader = generate(GlslBackend::new(), GenOptions::default());
        let pixel = shader.source_code(PIXEL).unwrap();

        assert!(pixel.contains("uniform vec3 tint = vec3(1.0, 0.5, 0.0);"));
        assert!(pixel.contains("in VertexData\n{\n    vec2 texcoord_0;\n} vd;"));
        assert!(pixel.contains("out vec4 color;"));
        assert!(pixel.contains("vec2 uv_out = vd.texcoord_0;"));
        assert!(pixel.contains("vec3 tinted_out = tint * vec3(2.0, 2.0, 2.0);"));
        assert!(pixel.contains("color = vec4(tinted_out, 1.0);"));
        assert!(pixel.contains("uv = vec4(uv_out, 0.0, 1.0);"));
    }

    #[test]
    fn essl_has_no_initializers() {
        let shader = generate(GlslBackend::essl(), GenOptions::default());
        let pixel = shader.source_code(PIXEL).unwrap();

        assert!(pixel.starts_with("#version 300 es\n\nprecision mediump float;\n"));
        assert!(pixel.contains("uniform vec3 tint;"));
    }

    #[test]
    fn flipped_texcoord() {
        let options = GenOptions {
            flip_texcoord_v: true,
            ..Default::default()
        };
        let shader = generate(GlslBackend::new(), options);

        assert!(shader
            .source_code(PIXEL)
            .unwrap()
            .contains("vec2 uv_out = vec2(vd.texcoord_0.x, 1.0 - vd.texcoord_0.y);"));
    }
}
