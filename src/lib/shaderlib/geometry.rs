//! Vertex data.
//!
//! GLSL implementations are built into the backend, see
//! [GeometryNode](crate::implementation::geometry::GeometryNode); OSL reads its globals.

use crate::document::Library;

/// Definitions and implementations of this module.
pub fn library() -> Library {
    let mut library = Library::new();

    library
        .add_nodedef(nodedef!("texcoord" -> "vector2", "index": "integer" = "0"))
        .add_inline("ND_texcoord_vector2", "genosl", "vector2(u, v)");

    library
        .add_nodedef(nodedef!("position" -> "vector3"))
        .add_inline("ND_position_vector3", "genosl", "P");

    library
}
