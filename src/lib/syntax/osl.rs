//! OSL syntax.

use super::{Qualifiers, Syntax, TypeSyntax, ValueFormat};
use crate::types::names;

use lazy_static::lazy_static;

/// Language key of OSL implementations.
pub const LANGUAGE: &str = "genosl";

lazy_static! {
    static ref RESERVED: Vec<&'static str> = vec![
        "and", "break", "closure", "color", "continue", "do", "else", "emit", "float", "for",
        "if", "illuminance", "illuminate", "int", "matrix", "normal", "not", "or", "output",
        "point", "public", "return", "string", "struct", "vector", "void", "while", "bool",
        "case", "catch", "char", "class", "const", "delete", "default", "double", "enum",
        "extern", "false", "friend", "goto", "inline", "long", "new", "operator", "private",
        "protected", "short", "signed", "sizeof", "static", "switch", "template", "this",
        "throw", "true", "try", "typedef", "uniform", "union", "unsigned", "varying",
        "virtual", "volatile", "shader", "surface", "volume", "displacement", "light",
    ];
}

const VECTOR2_DEFINITION: &str = "struct vector2\n{\n    float x;\n    float y;\n};";
const VECTOR4_DEFINITION: &str =
    "struct vector4\n{\n    float x;\n    float y;\n    float z;\n    float w;\n};";
const COLOR2_DEFINITION: &str = "struct color2\n{\n    float r;\n    float a;\n};";
const COLOR4_DEFINITION: &str = "struct color4\n{\n    color rgb;\n    float a;\n};";

/// The OSL [Syntax].
pub fn syntax() -> Syntax {
    let mut syntax = Syntax::new(
        LANGUAGE,
        Qualifiers {
            uniform: String::new(),
            input: String::new(),
            output: "output".to_owned(),
            constant: String::new(),
        },
        ".osl",
    );

    syntax
        .register_type(names::BOOLEAN, TypeSyntax::scalar("int", "0"))
        .register_type(names::INTEGER, TypeSyntax::scalar("int", "0"))
        .register_type(names::FLOAT, TypeSyntax::scalar("float", "0.0"))
        .register_type(
            names::VECTOR2,
            TypeSyntax::aggregate("vector2", "vector2(0.0, 0.0)").with_definition(VECTOR2_DEFINITION),
        )
        .register_type(
            names::VECTOR3,
            TypeSyntax::aggregate("vector", "vector(0.0)"),
        )
        .register_type(
            names::VECTOR4,
            TypeSyntax::aggregate("vector4", "vector4(0.0, 0.0, 0.0, 0.0)")
                .with_definition(VECTOR4_DEFINITION),
        )
        .register_type(
            names::COLOR2,
            TypeSyntax::aggregate("color2", "color2(0.0, 1.0)").with_definition(COLOR2_DEFINITION),
        )
        .register_type(names::COLOR3, TypeSyntax::aggregate("color", "color(0.0)"))
        .register_type(
            names::COLOR4,
            TypeSyntax::opaque("color4", "color4(color(0.0), 1.0)").with_definition(COLOR4_DEFINITION),
        )
        .register_type(
            names::MATRIX33,
            TypeSyntax::aggregate("matrix", "matrix(1.0)")
                .with_format(ValueFormat::PaddedMatrix("matrix".to_owned())),
        )
        .register_type(names::MATRIX44, TypeSyntax::aggregate("matrix", "matrix(1.0)"))
        .register_type(
            names::STRING,
            TypeSyntax::scalar("string", "\"\"").with_format(ValueFormat::Quoted),
        )
        .register_type(
            names::FILENAME,
            TypeSyntax::scalar("string", "\"\"").with_format(ValueFormat::Quoted),
        )
        .register_type(names::BSDF, TypeSyntax::opaque("closure color", "0"))
        .register_type(names::EDF, TypeSyntax::opaque("closure color", "0"))
        .register_type(names::VDF, TypeSyntax::opaque("closure color", "0"))
        .register_type(names::SURFACESHADER, TypeSyntax::opaque("closure color", "0"))
        .register_type(names::VOLUMESHADER, TypeSyntax::opaque("closure color", "0"))
        .register_type(
            names::DISPLACEMENTSHADER,
            TypeSyntax::opaque("vector", "vector(0.0)"),
        )
        .register_type(names::LIGHTSHADER, TypeSyntax::opaque("closure color", "0"))
        .register_reserved(RESERVED.iter().copied());

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
    fn literals() {
        let registry = TypeRegistry::initialize();
        let syntax = syntax();

        let string = registry.get(names::STRING).unwrap();
        assert_eq!(
            syntax
                .format_value(&string, &Value::String("over".to_owned()))
                .unwrap(),
            "\"over\""
        );

        let boolean = registry.get(names::BOOLEAN).unwrap();
        assert_eq!(syntax.format_value(&boolean, &Value::Boolean(false)).unwrap(), "0");

        let vector3 = registry.get(names::VECTOR3).unwrap();
        assert_eq!(
            syntax
                .format_value(&vector3, &Value::Floats(vec![0., 1., 0.]))
                .unwrap(),
            "vector(0.0, 1.0, 0.0)"
        );
    }

    #[test]
    fn output_declaration() {
        let registry = TypeRegistry::initialize();
        let syntax = syntax();
        let bsdf = registry.get(names::BSDF).unwrap();

        assert_eq!(
            syntax
                .declaration(&syntax.qualifiers().output, &bsdf, "result", None)
                .unwrap(),
            "output closure color result"
        );
        assert_eq!(syntax.make_valid_name("color"), "color2");
    }
}
