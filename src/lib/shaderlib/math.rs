//! Constants and arithmetic.
//!
//! Definitions:
//! - constant: float, color3, vector3; `value`
//! - add: float (function), color3 (inline); `in1 + in2`
//! - multiply: float, color3 (inline); `in1 * in2`
//! - divide: float (function); `in1 / in2`, `in1` is required
//! - mix: color3 (inline); `mix(bg, fg, mix)`
//! - blend: color3 (function); `mode` is one of `over`, `add`
//! - scale_add: float (compound); `in * scale + offset`

use crate::{bind, document::Library, document::PortDef, graph, node};

const ADD_FLOAT_GLSL: &str = r#"
void mx_add_float(float in1, float in2, out float result)
{
    result = in1 + in2;
}
"#;

const ADD_FLOAT_OSL: &str = r#"
void mx_add_float(float in1, float in2, output float result)
{
    result = in1 + in2;
}
"#;

// Near-zero divisors are clamped to `$epsilon`, keeping the sign.
const DIVIDE_FLOAT_GLSL: &str = r#"
void mx_divide_float(float in1, float in2, out float result)
{
    float divisor = abs(in2) < $epsilon ? sign(in2 + $epsilon) * $epsilon : in2;
    result = in1 / divisor;
}
"#;

const DIVIDE_FLOAT_OSL: &str = r#"
void mx_divide_float(float in1, float in2, output float result)
{
    float divisor = abs(in2) < $epsilon ? sign(in2 + $epsilon) * $epsilon : in2;
    result = in1 / divisor;
}
"#;

const BLEND_COLOR3_GLSL: &str = r#"
void mx_blend_color3(vec3 fg, vec3 bg, int mode, out vec3 result)
{
    result = mode == 1 ? bg + fg : fg;
}
"#;

const BLEND_COLOR3_OSL: &str = r#"
void mx_blend_color3(color fg, color bg, string mode, output color result)
{
    result = mode == "add" ? bg + fg : fg;
}
"#;

/// Definitions and implementations of this module.
pub fn library() -> Library {
    let mut library = Library::new();

    library
        .add_nodedef(nodedef!("constant" -> "float", "value": "float" = "0.0"))
        .add_nodedef(nodedef!("constant" -> "color3", "value": "color3" = "0, 0, 0"))
        .add_nodedef(nodedef!("constant" -> "vector3", "value": "vector3" = "0, 0, 0"))
        .add_inline("ND_constant_float", "", "{{value}}")
        .add_inline("ND_constant_color3", "", "{{value}}")
        .add_inline("ND_constant_vector3", "", "{{value}}");

    library
        .add_nodedef(nodedef!("add" -> "float", "in1": "float" = "0.0", "in2": "float" = "0.0"))
        .add_nodedef(nodedef!(
            "add" -> "color3",
            "in1": "color3" = "0, 0, 0",
            "in2": "color3" = "0, 0, 0",
        ))
        .add_function("ND_add_float", "genglsl", "mx_add_float", ADD_FLOAT_GLSL)
        .add_function("ND_add_float", "genosl", "mx_add_float", ADD_FLOAT_OSL)
        .add_inline("ND_add_color3", "", "{{in1}} + {{in2}}");

    library
        .add_nodedef(nodedef!("multiply" -> "float", "in1": "float" = "0.0", "in2": "float" = "1.0"))
        .add_nodedef(nodedef!(
            "multiply" -> "color3",
            "in1": "color3" = "0, 0, 0",
            "in2": "color3" = "1, 1, 1",
        ))
        .add_inline("ND_multiply_float", "", "{{in1}} * {{in2}}")
        .add_inline("ND_multiply_color3", "", "{{in1}} * {{in2}}");

    library
        .add_nodedef(nodedef!("divide" -> "float", "in1": "float", "in2": "float" = "1.0"))
        .add_function("ND_divide_float", "genglsl", "mx_divide_float", DIVIDE_FLOAT_GLSL)
        .add_function("ND_divide_float", "genosl", "mx_divide_float", DIVIDE_FLOAT_OSL);

    library
        .add_nodedef(nodedef!(
            "mix" -> "color3",
            "fg": "color3" = "0, 0, 0",
            "bg": "color3" = "0, 0, 0",
            "mix": "float" = "0.5",
        ))
        .add_inline("ND_mix_color3", "", "mix({{bg}}, {{fg}}, {{mix}})");

    library
        .add_nodedef(
            nodedef!(
                "blend" -> "color3",
                "fg": "color3" = "0, 0, 0",
                "bg": "color3" = "0, 0, 0",
            )
            .input(
                PortDef::new("mode", "string")
                    .with_default("over")
                    .with_enum("over, add", ""),
            ),
        )
        .add_function("ND_blend_color3", "genglsl", "mx_blend_color3", BLEND_COLOR3_GLSL)
        .add_function("ND_blend_color3", "genosl", "mx_blend_color3", BLEND_COLOR3_OSL);

    library
        .add_nodedef(nodedef!(
            "scale_add" -> "float",
            "in": "float" = "0.0",
            "scale": "float" = "1.0",
            "offset": "float" = "0.0",
        ))
        .add_graph(graph! {
            "NG_scale_add_float" implements "ND_scale_add_float",
            nodes:
                "scaled": node! {
                    "multiply" -> "float",
                    inputs:
                        "in1": bind!(interface "in"),
                        "in2": bind!(interface "scale"),
                },
                "sum": node! {
                    "add" -> "float",
                    inputs:
                        "in1": bind!(node "scaled"),
                        "in2": bind!(interface "offset"),
                },
            outputs:
                "out": "float" = bind!(node "sum"),
        });

    library
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::document::{ImplementationCatalog, ImplementationSource};

    #[test]
    fn divide_requires_numerator() {
        let library = library();
        let divide = library.nodedef("ND_divide_float").unwrap();

        assert!(divide.inputs[0].default.is_none());
        assert_eq!(divide.inputs[1].default.as_deref(), Some("1.0"));
    }

    #[test]
    fn implementations_by_target() {
        let library = library();

        let glsl = library.implementation("ND_add_float", "genglsl").unwrap();
        assert_eq!(glsl.name, "IM_add_float_genglsl");

        // Inline implementations are shared by every target.
        let inline = library.implementation("ND_multiply_color3", "genosl").unwrap();
        assert!(inline.target.is_empty());
        assert!(matches!(inline.source, ImplementationSource::Inline(_)));

        let compound = library.implementation("ND_scale_add_float", "genglsl").unwrap();
        assert_eq!(compound.source, ImplementationSource::Graph("NG_scale_add_float".to_owned()));
        assert!(library.node_graph("NG_scale_add_float").is_some());
    }
}
