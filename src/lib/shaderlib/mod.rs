//! Standard node library: definitions and their GLSL and OSL implementations.
//!
//! Every submodule exposes a `library()` with its own definitions; [library] merges them all.

/// Declare a [NodeDef](crate::document::NodeDef) named `ND_<category>_<type>` unless a name is
/// given, with optional defaults on its inputs.
macro_rules! nodedef {
    (@build $name:expr, $category:literal, $ty:literal $(, $input:literal : $input_ty:literal $(= $default:literal)?)*) => {{
        let nodedef = $crate::document::NodeDef::new($name, $category, $ty);
        $(
            let nodedef = nodedef.input({
                let port = $crate::document::PortDef::new($input, $input_ty);
                $(let port = port.with_default($default);)?
                port
            });
        )*
        nodedef
    }};

    ($name:literal : $category:literal -> $ty:literal $(, $input:literal : $input_ty:literal $(= $default:literal)?)* $(,)?) => {
        nodedef!(@build $name, $category, $ty $(, $input: $input_ty $(= $default)?)*)
    };

    ($category:literal -> $ty:literal $(, $input:literal : $input_ty:literal $(= $default:literal)?)* $(,)?) => {
        nodedef!(
            @build concat!("ND_", $category, "_", $ty), $category, $ty
            $(, $input: $input_ty $(= $default)?)*
        )
    };
}

pub mod closures;
pub mod colorspace;
pub mod geometry;
pub mod math;

use crate::document::Library;

macro_rules! create_library {
    ($($lib:ident),+ $(,)?) => {
        /// Every definition and implementation of the standard library.
        pub fn library() -> Library {
            let mut library = Library::new();
            $(
                library.merge($lib::library());
            )+
            library
        }
    };
}

create_library! {
    // Arithmetic and constants
    math,

    // Vertex data
    geometry,

    // BSDFs, EDFs and surfaces
    closures,

    // Color space conversions
    colorspace,
}

lazy_static::lazy_static! {
    /// Shared instance of [library], for hosts that never extend it.
    pub static ref SHADERLIB: Library = library();
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{document::ImplementationCatalog, types::TypeRegistry};

    #[test]
    fn definitions_are_unique_and_typed() {
        let registry = TypeRegistry::initialize();
        let mut names = std::collections::HashSet::new();

        for nodedef in SHADERLIB.nodedefs() {
            assert!(names.insert(nodedef.name.as_str()), "`{}` is defined twice", nodedef.name);
            for port in nodedef.inputs.iter().chain(nodedef.outputs.iter()) {
                assert!(registry.contains(&port.ty), "`{}` uses unknown `{}`", nodedef.name, port.ty);
            }
        }
    }

    #[test]
    fn every_definition_is_implemented() {
        for nodedef in SHADERLIB.nodedefs() {
            for target in ["genglsl", "genosl"] {
                let found = SHADERLIB.implementation(&nodedef.name, target).is_some()
                    // Geometry nodes are built into the GLSL backend.
                    || (target == "genglsl" && nodedef.category == "texcoord")
                    || (target == "genglsl" && nodedef.category == "position");
                assert!(found, "`{}` has no `{target}` implementation", nodedef.name);
            }
        }
    }
}
