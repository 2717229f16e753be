//! Closures and surface shaders.
//!
//! Definitions:
//! - diffuse_bsdf: BSDF; `color`, `roughness`
//! - uniform_edf: EDF; `color`
//! - surface: surfaceshader; `bsdf` and `edf` are optional, `opacity` defaults to opaque

use crate::document::Library;

const DIFFUSE_BSDF_GLSL: &str = r#"
void mx_diffuse_bsdf(vec3 color, float roughness, out BSDF result)
{
    result.response = color * (1.0 - 0.5 * roughness);
    result.throughput = vec3(0.0);
}
"#;

const SURFACE_GLSL: &str = r#"
void mx_surface(BSDF bsdf, EDF edf, float opacity, out surfaceshader result)
{
    result.color = (bsdf.response + edf) * opacity;
    result.transparency = vec3(1.0 - opacity);
}
"#;

/// Definitions and implementations of this module.
pub fn library() -> Library {
    let mut library = Library::new();

    library
        .add_nodedef(nodedef!(
            "ND_diffuse_bsdf": "diffuse_bsdf" -> "BSDF",
            "color": "color3" = "0.18, 0.18, 0.18",
            "roughness": "float" = "0.0",
        ))
        .add_function("ND_diffuse_bsdf", "genglsl", "mx_diffuse_bsdf", DIFFUSE_BSDF_GLSL)
        .add_inline(
            "ND_diffuse_bsdf",
            "genosl",
            "{{color}} * oren_nayar(N, {{roughness}})",
        );

    library
        .add_nodedef(nodedef!("ND_uniform_edf": "uniform_edf" -> "EDF", "color": "color3" = "1, 1, 1"))
        .add_inline("ND_uniform_edf", "genglsl", "{{color}}")
        .add_inline("ND_uniform_edf", "genosl", "{{color}} * emission()");

    library
        .add_nodedef(nodedef!(
            "ND_surface": "surface" -> "surfaceshader",
            "bsdf": "BSDF",
            "edf": "EDF",
            "opacity": "float" = "1.0",
        ))
        .add_function("ND_surface", "genglsl", "mx_surface", SURFACE_GLSL)
        .add_inline(
            "ND_surface",
            "genosl",
            "({{bsdf}} + {{edf}}) * {{opacity}} + (1.0 - {{opacity}}) * transparent()",
        );

    library
}
