//! Implementations backed by source text from the catalog.

use std::collections::HashMap;

use super::{template::Template, NodeImplementation};
use crate::{
    context::GenContext,
    error::Reference,
    generator::emit,
    shader::{
        graph::ShaderGraph,
        node::ShaderNode,
        stage::{ShaderStage, PIXEL},
    },
    Error, Result,
};

#[derive(Clone, Debug)]
enum Kind {
    /// Definition emitted once per stage, one call per node.
    Function {
        function: String,
        definition: Template,
    },
    /// Expression substituted at each call site.
    Inline(Template),
}

#[derive(Clone, Debug)]
/// Function or inline-expression implementation.
pub struct SourceCodeImplementation {
    name: String,
    kind: Kind,
}

impl SourceCodeImplementation {
    /// Implementation calling `function`, defined by `code`.
    ///
    /// An empty `code` means the function is provided by an include or by the target itself.
    pub fn function(name: &str, function: &str, code: &str) -> Result<Self> {
        Ok(Self {
            name: name.to_owned(),
            kind: Kind::Function {
                function: function.to_owned(),
                definition: Template::parse(name, code)?,
            },
        })
    }

    /// Implementation substituting `expression`, e.g. `{{in1}} * {{in2}}`.
    pub fn inline(name: &str, expression: &str) -> Result<Self> {
        Ok(Self {
            name: name.to_owned(),
            kind: Kind::Inline(Template::parse(name, expression)?),
        })
    }

    /// Whether calls are substituted inline.
    pub fn is_inline(&self) -> bool {
        matches!(self.kind, Kind::Inline(_))
    }
}

impl NodeImplementation for SourceCodeImplementation {
    fn name(&self) -> &str {
        &self.name
    }

    fn emit_function_definition(
        &self,
        _node: &ShaderNode,
        ctx: &mut GenContext,
        stage: &mut ShaderStage,
    ) -> Result<()> {
        let Kind::Function { function, definition } = &self.kind else {
            return Ok(());
        };

        if stage.name() != PIXEL || !stage.add_function_definition(function) {
            return Ok(());
        }

        let code = definition.render(&HashMap::new(), ctx.backend().tokens())?;
        if !code.trim().is_empty() {
            stage.add_block(code.trim());
            stage.new_line();
        }

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
            return Ok(());
        }

        match &self.kind {
            Kind::Function { function, .. } => emit::function_call(function, node, graph, ctx, stage),
            Kind::Inline(template) => {
                let mut slots = HashMap::new();
                for slot in template.slots() {
                    let input = node.input(slot).ok_or_else(|| Error::Template {
                        name: self.name.clone(),
                        message: format!("node `{}` has no input `{slot}`", node.name),
                    })?;
                    slots.insert(
                        slot.to_owned(),
                        ctx.upstream_result(graph, node, input, stage)?,
                    );
                }

                let expression = template.render(&slots, ctx.backend().tokens())?;
                let output = node
                    .outputs
                    .first()
                    .ok_or_else(|| Error::Missing(Reference::Output, node.name.clone()))?;

                emit::assign_output(output, &expression, ctx, stage)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn constructors() {
        let function =
            SourceCodeImplementation::function("IM_add_float_genglsl", "mx_add_float", "").unwrap();
        assert!(!function.is_inline());
        assert_eq!(function.name(), "IM_add_float_genglsl");

        let inline = SourceCodeImplementation::inline("IM_multiply_float", "{{in1}} * {{in2}}")
            .unwrap();
        assert!(inline.is_inline());

        assert!(SourceCodeImplementation::inline("IM_broken", "{{in1").is_err());
    }
}
