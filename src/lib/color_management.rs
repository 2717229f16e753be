//! Color management: conversions inserted in front of color inputs authored in another color
//! space than the one the shader works in.

use crate::{
    document::{ImplementationCatalog, NodeDef},
    types::{Semantic, TypeRef},
};

/// Color space shaders work in unless [GenOptions](crate::context::GenOptions) says otherwise.
pub const DEFAULT_TARGET_SPACE: &str = "lin_rec709";

#[derive(Clone, Debug, PartialEq)]
/// Conversion of values of a color type between two color spaces.
pub struct ColorSpaceTransform {
    #[allow(missing_docs)]
    pub source: String,
    #[allow(missing_docs)]
    pub target: String,
    /// Type of the converted values.
    pub ty: TypeRef,
}

impl ColorSpaceTransform {
    #[allow(missing_docs)]
    pub fn new(source: &str, target: &str, ty: TypeRef) -> Self {
        Self {
            source: source.to_owned(),
            target: target.to_owned(),
            ty,
        }
    }
}

/// Provider of color space conversions.
///
/// A conversion is a node definition with a single input `in` and an output of the converted
/// type; the graph builder instantiates it like any other node.
pub trait ColorManagementSystem: Send + Sync {
    /// Name of the system, for diagnostics.
    fn name(&self) -> &str;

    /// Definition performing `transform`, or `None` if the system cannot convert it.
    fn nodedef<'c>(
        &self,
        transform: &ColorSpaceTransform,
        catalog: &'c dyn ImplementationCatalog,
    ) -> Option<&'c NodeDef>;
}

#[derive(Clone, Copy, Debug, Default)]
/// Looks conversions up in the catalog as `ND_<source>_to_<target>_<type>`.
///
/// # Example
/// ```
/// use shadergen::{
///     color_management::{ColorManagementSystem, ColorSpaceTransform, DefaultColorManagementSystem},
///     shaderlib,
///     types::{names, TypeRegistry},
/// };
///
/// let registry = TypeRegistry::initialize();
/// let library = shaderlib::library();
/// let transform = ColorSpaceTransform::new(
///     "srgb_texture",
///     "lin_rec709",
///     registry.get(names::COLOR3).unwrap(),
/// );
///
/// let nodedef = DefaultColorManagementSystem.nodedef(&transform, &library).unwrap();
/// assert_eq!(nodedef.name, "ND_srgb_texture_to_lin_rec709_color3");
/// ```
pub struct DefaultColorManagementSystem;

impl ColorManagementSystem for DefaultColorManagementSystem {
    fn name(&self) -> &str {
        "default_cms"
    }

    fn nodedef<'c>(
        &self,
        transform: &ColorSpaceTransform,
        catalog: &'c dyn ImplementationCatalog,
    ) -> Option<&'c NodeDef> {
        if transform.ty.semantic() != Semantic::Color {
            return None;
        }

        let name = format!(
            "ND_{}_to_{}_{}",
            transform.source,
            transform.target,
            transform.ty.name()
        );
        catalog
            .nodedef(&name)
            .filter(|nodedef| nodedef.output_type() == Some(transform.ty.name()))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        shaderlib,
        types::{names, TypeRegistry},
    };

    #[test]
    fn default_system_lookup() {
        let registry = TypeRegistry::initialize();
        let library = shaderlib::library();
        let color3 = registry.get(names::COLOR3).unwrap();

        let supported =
            ColorSpaceTransform::new("srgb_texture", DEFAULT_TARGET_SPACE, color3.clone());
        let nodedef = DefaultColorManagementSystem
            .nodedef(&supported, &library)
            .unwrap();
        assert_eq!(nodedef.inputs[0].name, "in");

        let unknown = ColorSpaceTransform::new("acescg", DEFAULT_TARGET_SPACE, color3);
        assert!(DefaultColorManagementSystem
            .nodedef(&unknown, &library)
            .is_none());

        // Only color types are managed.
        let vector3 = ColorSpaceTransform::new(
            "srgb_texture",
            DEFAULT_TARGET_SPACE,
            registry.get(names::VECTOR3).unwrap(),
        );
        assert!(DefaultColorManagementSystem
            .nodedef(&vector3, &library)
            .is_none());
    }
}
