//! GLSL syntax, shared by the desktop and ES targets.

use super::{Qualifiers, Syntax, TypeSyntax};
use crate::types::names;

use lazy_static::lazy_static;

/// Language key of GLSL implementations.
pub const LANGUAGE: &str = "genglsl";

lazy_static! {
    static ref RESERVED: Vec<&'static str> = vec![
        "centroid", "flat", "smooth", "noperspective", "patch", "sample", "break", "continue",
        "do", "for", "while", "switch", "case", "default", "if", "else", "subroutine", "in",
        "out", "inout", "float", "double", "int", "void", "bool", "true", "false", "invariant",
        "discard", "return", "mat2", "mat3", "mat4", "dmat2", "dmat3", "dmat4", "mat2x2",
        "mat2x3", "mat2x4", "mat3x2", "mat3x3", "mat3x4", "mat4x2", "mat4x3", "mat4x4", "vec2",
        "vec3", "vec4", "ivec2", "ivec3", "ivec4", "bvec2", "bvec3", "bvec4", "dvec2", "dvec3",
        "dvec4", "uint", "uvec2", "uvec3", "uvec4", "lowp", "mediump", "highp", "precision",
        "sampler1D", "sampler2D", "sampler3D", "samplerCube", "sampler2DShadow", "struct",
        "attribute", "const", "uniform", "varying", "buffer", "shared", "coherent",
        "volatile", "restrict", "readonly", "writeonly", "layout", "atomic_uint", "common",
        "partition", "active", "asm", "class", "union", "enum", "typedef", "template", "this",
        "resource", "goto", "inline", "noinline", "public", "static", "extern", "external",
        "interface", "long", "short", "half", "fixed", "unsigned", "superp", "input", "output",
        "hvec2", "hvec3", "hvec4", "fvec2", "fvec3", "fvec4", "sampler3DRect", "filter",
        "image1D", "image2D", "image3D", "imageCube", "sizeof", "cast", "namespace", "using",
        "main",
    ];
}

const BSDF_DEFINITION: &str = "struct BSDF\n{\n    vec3 response;\n    vec3 throughput;\n};";
const VDF_DEFINITION: &str = "struct VDF\n{\n    vec3 absorption;\n    vec3 scattering;\n};";
const SURFACE_DEFINITION: &str =
    "struct surfaceshader\n{\n    vec3 color;\n    vec3 transparency;\n};";
const VOLUME_DEFINITION: &str =
    "struct volumeshader\n{\n    vec3 color;\n    vec3 transparency;\n};";
const DISPLACEMENT_DEFINITION: &str =
    "struct displacementshader\n{\n    vec3 offset;\n    float scale;\n};";
const LIGHT_DEFINITION: &str = "struct lightshader\n{\n    vec3 intensity;\n    vec3 direction;\n};";

/// The GLSL [Syntax].
pub fn syntax() -> Syntax {
    let mut syntax = Syntax::new(
        LANGUAGE,
        Qualifiers {
            uniform: "uniform".to_owned(),
            input: "in".to_owned(),
            output: "out".to_owned(),
            constant: "const".to_owned(),
        },
        ".glsl",
    );

    syntax
        .register_type(names::BOOLEAN, TypeSyntax::scalar("bool", "false"))
        .register_type(names::INTEGER, TypeSyntax::scalar("int", "0"))
        .register_type(names::FLOAT, TypeSyntax::scalar("float", "0.0"))
        .register_type(names::VECTOR2, TypeSyntax::aggregate("vec2", "vec2(0.0)"))
        .register_type(names::VECTOR3, TypeSyntax::aggregate("vec3", "vec3(0.0)"))
        .register_type(names::VECTOR4, TypeSyntax::aggregate("vec4", "vec4(0.0)"))
        .register_type(names::COLOR2, TypeSyntax::aggregate("vec2", "vec2(0.0)"))
        .register_type(names::COLOR3, TypeSyntax::aggregate("vec3", "vec3(0.0)"))
        .register_type(names::COLOR4, TypeSyntax::aggregate("vec4", "vec4(0.0)"))
        .register_type(names::MATRIX33, TypeSyntax::aggregate("mat3", "mat3(1.0)"))
        .register_type(names::MATRIX44, TypeSyntax::aggregate("mat4", "mat4(1.0)"))
        // Strings only survive as remapped enumerations.
        .register_type(names::STRING, TypeSyntax::opaque("int", "0"))
        .register_type(names::FILENAME, TypeSyntax::opaque("sampler2D", "0"))
        .register_type(
            names::BSDF,
            TypeSyntax::opaque("BSDF", "BSDF(vec3(0.0), vec3(1.0))")
                .with_definition(BSDF_DEFINITION),
        )
        .register_type(names::EDF, TypeSyntax::opaque("EDF", "EDF(0.0)").with_definition("#define EDF vec3"))
        .register_type(
            names::VDF,
            TypeSyntax::opaque("VDF", "VDF(vec3(0.0), vec3(0.0))").with_definition(VDF_DEFINITION),
        )
        .register_type(
            names::SURFACESHADER,
            TypeSyntax::opaque("surfaceshader", "surfaceshader(vec3(0.0), vec3(0.0))")
                .with_definition(SURFACE_DEFINITION),
        )
        .register_type(
            names::VOLUMESHADER,
            TypeSyntax::opaque("volumeshader", "volumeshader(vec3(0.0), vec3(0.0))")
                .with_definition(VOLUME_DEFINITION),
        )
        .register_type(
            names::DISPLACEMENTSHADER,
            TypeSyntax::opaque("displacementshader", "displacementshader(vec3(0.0), 1.0)")
                .with_definition(DISPLACEMENT_DEFINITION),
        )
        .register_type(
            names::LIGHTSHADER,
            TypeSyntax::opaque("lightshader", "lightshader(vec3(0.0), vec3(0.0))")
                .with_definition(LIGHT_DEFINITION),
        )
        .register_reserved(RESERVED.iter().copied())
        .register_reserved(["gl_Position", "gl_FragCoord"])
        .register_invalid_token("__", "_")
        .register_invalid_token("gl_", "gll");

    syntax
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{types::TypeRegistry, value::Value};

    #[test]
    fn builtin_types_are_covered() {
        let registry = TypeRegistry::initialize();
        let syntax = syntax();

        for ty in registry.iter().filter(|ty| ty.name() != names::NONE) {
            assert!(syntax.type_name(ty).is_ok(), "missing syntax for {ty}");
        }
    }

    #[test]
    fn closures_are_structs() {
        let registry = TypeRegistry::initialize();
        let syntax = syntax();
        let bsdf = registry.get(names::BSDF).unwrap();

        assert_eq!(syntax.type_name(&bsdf).unwrap(), "BSDF");
        assert!(syntax.type_definition(&bsdf).unwrap().is_some());
        assert!(syntax.format_value(&bsdf, &Value::Float(0.)).is_err());
    }

    #[test]
    fn reserved_words() {
        let syntax = syntax();

        assert!(!syntax.is_valid_identifier("main"));
        assert!(syntax.is_valid_identifier("texture_out"));
        assert_eq!(syntax.make_valid_name("uniform"), "uniform2");
        assert_eq!(syntax.make_valid_name("gl_Normal"), "gllNormal");
        assert_eq!(syntax.make_valid_name("vec3"), "vec5");
    }
}
