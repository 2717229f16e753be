//! Hardware geometric nodes reading vertex attributes through the vertex → pixel interface.

use super::NodeImplementation;
use crate::{
    context::GenContext,
    error::Reference,
    generator::emit,
    shader::{
        graph::ShaderGraph,
        node::{ShaderNode, ShaderPort},
        stage::{BlockKind, ShaderStage, PIXEL, VERTEX},
    },
    types::names,
    value::Value,
    Error, Result,
};

/// Vertex attributes block of the vertex stage.
pub const VERTEX_INPUTS: &str = "VertexInputs";
/// Block passing attributes from the vertex to the pixel stage.
pub const VERTEX_DATA: &str = "VertexData";
/// Instance name of [VERTEX_DATA].
pub const VERTEX_DATA_INSTANCE: &str = "vd";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Attribute {
    Texcoord,
    Position,
}

#[derive(Clone, Debug)]
/// `texcoord` or `position` node.
pub struct GeometryNode {
    name: String,
    attribute: Attribute,
}

impl GeometryNode {
    /// Texture coordinates of the set given by the `index` input.
    pub fn texcoord() -> Self {
        Self {
            name: "IM_texcoord_vector2_genglsl".to_owned(),
            attribute: Attribute::Texcoord,
        }
    }

    /// World-space position.
    pub fn position() -> Self {
        Self {
            name: "IM_position_vector3_genglsl".to_owned(),
            attribute: Attribute::Position,
        }
    }

    fn attribute_name(&self, node: &ShaderNode) -> String {
        match self.attribute {
            Attribute::Texcoord => {
                let index = match node.input("index").and_then(|port| port.value.as_ref()) {
                    Some(Value::Integer(index)) => *index,
                    _ => 0,
                };
                format!("texcoord_{index}")
            }
            Attribute::Position => "position".to_owned(),
        }
    }

    fn type_name(&self) -> &'static str {
        match self.attribute {
            Attribute::Texcoord => names::VECTOR2,
            Attribute::Position => names::VECTOR3,
        }
    }
}

impl NodeImplementation for GeometryNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn create_variables(
        &self,
        node: &ShaderNode,
        ctx: &mut GenContext,
        stages: &mut [ShaderStage],
    ) -> Result<()> {
        let ty = ctx.registry().get(self.type_name())?;
        let attribute = self.attribute_name(node);
        let input = format!("i_{attribute}");

        for stage in stages.iter_mut() {
            let name = stage.name().to_owned();
            match name.as_str() {
                VERTEX => {
                    stage
                        .create_block(BlockKind::Input, VERTEX_INPUTS, "")?
                        .add(ShaderPort::new(&input, ty.clone()).with_variable(&input))?;
                    stage
                        .create_block(BlockKind::Output, VERTEX_DATA, VERTEX_DATA_INSTANCE)?
                        .add(ShaderPort::new(&attribute, ty.clone()).with_variable(&attribute))?;
                }
                PIXEL => {
                    stage
                        .create_block(BlockKind::Input, VERTEX_DATA, VERTEX_DATA_INSTANCE)?
                        .add(ShaderPort::new(&attribute, ty.clone()).with_variable(&attribute))?;
                }
                _ => {}
            }
        }

        Ok(())
    }

    fn emit_function_call(
        &self,
        node: &ShaderNode,
        _graph: &ShaderGraph,
        ctx: &mut GenContext,
        stage: &mut ShaderStage,
    ) -> Result<()> {
        let attribute = self.attribute_name(node);
        let variable = format!("{VERTEX_DATA_INSTANCE}.{attribute}");
        let name = stage.name().to_owned();

        match name.as_str() {
            VERTEX => {
                if stage.mark_emitted(&variable) {
                    let source = match self.attribute {
                        Attribute::Texcoord => format!("i_{attribute}"),
                        Attribute::Position => "hPositionWorld.xyz".to_owned(),
                    };
                    stage.add_line(&format!("{variable} = {source}"), true);
                }
                Ok(())
            }
            PIXEL => {
                let output = node
                    .outputs
                    .first()
                    .ok_or_else(|| Error::Missing(Reference::Output, node.name.clone()))?;
                let expression = if self.attribute == Attribute::Texcoord
                    && ctx.options().flip_texcoord_v
                {
                    format!("vec2({variable}.x, 1.0 - {variable}.y)")
                } else {
                    variable
                };
                emit::assign_output(output, &expression, ctx, stage)
            }
            _ => Ok(()),
        }
    }
}
