//! Color space conversions, picked by
//! [DefaultColorManagementSystem](crate::color_management::DefaultColorManagementSystem).
//!
//! Definitions:
//! - srgb_texture_to_lin_rec709: color3; `in`

use crate::document::Library;

const SRGB_TEXTURE_TO_LIN_REC709_GLSL: &str = r#"
void mx_srgb_texture_to_lin_rec709_color3(vec3 color, out vec3 result)
{
    bvec3 isAbove = greaterThan(color, vec3(0.04045));
    vec3 linSeg = color / 12.92;
    vec3 powSeg = pow(max(color + vec3(0.055), vec3(0.0)) / 1.055, vec3(2.4));
    result = mix(linSeg, powSeg, isAbove);
}
"#;

const SRGB_TEXTURE_TO_LIN_REC709_OSL: &str = r#"
void mx_srgb_texture_to_lin_rec709_color3(color c, output color result)
{
    color linSeg = c / 12.92;
    color powSeg = pow(max(c + color(0.055), color(0.0)) / 1.055, color(2.4));
    for (int i = 0; i < 3; i++)
        result[i] = c[i] > 0.04045 ? powSeg[i] : linSeg[i];
}
"#;

/// Definitions and implementations of this module.
pub fn library() -> Library {
    let mut library = Library::new();

    library
        .add_nodedef(nodedef!(
            "ND_srgb_texture_to_lin_rec709_color3": "srgb_texture_to_lin_rec709" -> "color3",
            "in": "color3" = "0, 0, 0",
        ))
        .add_function(
            "ND_srgb_texture_to_lin_rec709_color3",
            "genglsl",
            "mx_srgb_texture_to_lin_rec709_color3",
            SRGB_TEXTURE_TO_LIN_REC709_GLSL,
        )
        .add_function(
            "ND_srgb_texture_to_lin_rec709_color3",
            "genosl",
            "mx_srgb_texture_to_lin_rec709_color3",
            SRGB_TEXTURE_TO_LIN_REC709_OSL,
        );

    library
}
