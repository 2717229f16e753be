//! Type descriptors and the [TypeRegistry] owning them.
//!
//! A [TypeDesc] is never compared structurally: two handles are equal only if they point to the
//! same registered descriptor.

use std::{
    collections::HashMap,
    fmt::{self, Debug, Display},
    hash::{Hash, Hasher},
    ops::Deref,
    sync::Arc,
};

use paste::paste;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
/// [TypeRegistry] error
pub enum Error {
    #[error("A type with name `{0}` is already registered")]
    /// Registering a name twice.
    Duplicate(String),

    #[error("No registered type with name `{0}` could be found")]
    /// Looking up a name that was never registered.
    Unknown(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
/// Underlying storage kind of a type.
pub enum BaseType {
    #[allow(missing_docs)]
    None,
    #[allow(missing_docs)]
    Boolean,
    #[allow(missing_docs)]
    Integer,
    #[allow(missing_docs)]
    Float,
    #[allow(missing_docs)]
    String,
    /// Custom structured type, see [TypeDesc::members].
    Struct,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
/// What a type means, on top of how it is stored.
pub enum Semantic {
    #[default]
    #[allow(missing_docs)]
    Default,
    #[allow(missing_docs)]
    Color,
    #[allow(missing_docs)]
    Vector,
    #[allow(missing_docs)]
    Matrix,
    #[allow(missing_docs)]
    Filename,
    /// Light-transport closure (BSDF, EDF, VDF).
    Closure,
    /// Shader-level result (surface, volume, ...).
    Shader,
}

#[derive(Debug)]
/// Immutable type descriptor.
pub struct TypeDesc {
    name: String,
    basetype: BaseType,
    semantic: Semantic,
    size: usize,
    members: Vec<(String, TypeRef)>,
}

impl TypeDesc {
    /// Type name, unique within its registry.
    pub fn name(&self) -> &str {
        &self.name
    }

    #[allow(missing_docs)]
    pub fn basetype(&self) -> BaseType {
        self.basetype
    }

    #[allow(missing_docs)]
    pub fn semantic(&self) -> Semantic {
        self.semantic
    }

    /// Number of components.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Ordered members of a structured type, empty otherwise.
    pub fn members(&self) -> &[(String, TypeRef)] {
        &self.members
    }

    #[allow(missing_docs)]
    pub fn is_closure(&self) -> bool {
        self.semantic == Semantic::Closure
    }

    #[allow(missing_docs)]
    pub fn is_shader(&self) -> bool {
        self.semantic == Semantic::Shader
    }

    /// Single-component numeric or boolean type.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self.basetype,
            BaseType::Boolean | BaseType::Integer | BaseType::Float
        ) && self.size == 1
    }

    /// Multi-component float type (vectors, colors, matrices).
    pub fn is_aggregate(&self) -> bool {
        self.basetype == BaseType::Float && self.size > 1
    }
}

#[derive(Clone)]
/// Shared handle to a registered [TypeDesc], compared by identity.
pub struct TypeRef(Arc<TypeDesc>);

impl Deref for TypeRef {
    type Target = TypeDesc;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl PartialEq for TypeRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for TypeRef {}

impl Hash for TypeRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(Arc::as_ptr(&self.0), state)
    }
}

impl Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeRef({})", self.0.name)
    }
}

impl Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}

#[derive(Debug, Default)]
/// Catalog of every type known to the generators.
///
/// Populated once, then shared read-only (usually behind an [Arc]) by every generation session.
pub struct TypeRegistry {
    types: HashMap<String, TypeRef>,
    order: Vec<TypeRef>,
}

macro_rules! builtin_types {
    { $($ident:ident = $name:literal : $base:ident $(, $semantic:ident $(, $size:literal)?)?);+ $(;)? } => {
        paste! {
            /// Names of the builtin types installed by [TypeRegistry::initialize].
            pub mod names {
                $(
                    #[allow(missing_docs)]
                    pub const [<$ident:upper>]: &str = $name;
                )+
            }

            impl TypeRegistry {
                fn install_builtins(&mut self) {
                    $(
                        self.insert(TypeDesc {
                            name: $name.to_owned(),
                            basetype: BaseType::$base,
                            semantic: builtin_types!(@semantic $($semantic)?),
                            size: builtin_types!(@size $($($size)?)?),
                            members: Vec::new(),
                        });
                    )+
                }
            }
        }
    };

    (@semantic) => { Semantic::Default };
    (@semantic $semantic:ident) => { Semantic::$semantic };
    (@size) => { 1 };
    (@size $size:literal) => { $size };
}

builtin_types! {
    none = "none": None;
    boolean = "boolean": Boolean;
    integer = "integer": Integer;
    float = "float": Float;
    vector2 = "vector2": Float, Vector, 2;
    vector3 = "vector3": Float, Vector, 3;
    vector4 = "vector4": Float, Vector, 4;
    color2 = "color2": Float, Color, 2;
    color3 = "color3": Float, Color, 3;
    color4 = "color4": Float, Color, 4;
    matrix33 = "matrix33": Float, Matrix, 9;
    matrix44 = "matrix44": Float, Matrix, 16;
    string = "string": String;
    filename = "filename": String, Filename;
    bsdf = "BSDF": None, Closure;
    edf = "EDF": None, Closure;
    vdf = "VDF": None, Closure;
    surfaceshader = "surfaceshader": None, Shader;
    volumeshader = "volumeshader": None, Shader;
    displacementshader = "displacementshader": None, Shader;
    lightshader = "lightshader": None, Shader;
}

impl TypeRegistry {
    /// Empty registry, without builtins.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the builtin type set.
    pub fn initialize() -> Self {
        let mut registry = Self::new();
        registry.install_builtins();
        registry
    }

    fn insert(&mut self, desc: TypeDesc) -> TypeRef {
        let handle = TypeRef(Arc::new(desc));
        self.types.insert(handle.name.clone(), handle.clone());
        self.order.push(handle.clone());
        handle
    }

    /// Register a new type.
    ///
    /// # Example
    /// ```
    /// use shadergen::types::{BaseType, Semantic, TypeRegistry};
    ///
    /// let mut registry = TypeRegistry::new();
    /// let float = registry.register("float", BaseType::Float, Semantic::Default, 1).unwrap();
    /// assert_eq!(registry.get("float").unwrap(), float);
    /// assert!(registry.register("float", BaseType::Float, Semantic::Default, 1).is_err());
    /// ```
    pub fn register(
        &mut self,
        name: &str,
        basetype: BaseType,
        semantic: Semantic,
        size: usize,
    ) -> Result<TypeRef, Error> {
        if self.types.contains_key(name) {
            return Err(Error::Duplicate(name.to_owned()));
        }

        Ok(self.insert(TypeDesc {
            name: name.to_owned(),
            basetype,
            semantic,
            size,
            members: Vec::new(),
        }))
    }

    /// Register a structured type made of already registered member types.
    pub fn register_struct(
        &mut self,
        name: &str,
        members: Vec<(String, TypeRef)>,
    ) -> Result<TypeRef, Error> {
        if self.types.contains_key(name) {
            return Err(Error::Duplicate(name.to_owned()));
        }

        let size = members.iter().map(|(_, ty)| ty.size()).sum();
        Ok(self.insert(TypeDesc {
            name: name.to_owned(),
            basetype: BaseType::Struct,
            semantic: Semantic::Default,
            size,
            members,
        }))
    }

    /// Look a type up by name.
    pub fn get(&self, name: &str) -> Result<TypeRef, Error> {
        self.types
            .get(name)
            .cloned()
            .ok_or_else(|| Error::Unknown(name.to_owned()))
    }

    #[allow(missing_docs)]
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Registered types, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &TypeRef> {
        self.order.iter()
    }

    #[allow(missing_docs)]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[allow(missing_docs)]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn builtins() {
        let registry = TypeRegistry::initialize();

        assert_eq!(registry.len(), 21);

        let vector3 = registry.get(names::VECTOR3).unwrap();
        assert_eq!(vector3.basetype(), BaseType::Float);
        assert_eq!(vector3.semantic(), Semantic::Vector);
        assert_eq!(vector3.size(), 3);

        assert!(registry.get(names::BSDF).unwrap().is_closure());
        assert!(registry.get(names::SURFACESHADER).unwrap().is_shader());
        assert_eq!(registry.get(names::MATRIX33).unwrap().size(), 9);
    }

    #[test]
    fn duplicate_leaves_registry_unchanged() {
        let mut registry = TypeRegistry::initialize();
        let before = registry.get(names::FLOAT).unwrap();
        let count = registry.len();

        let result = registry.register("float", BaseType::Integer, Semantic::Color, 4);

        assert_eq!(result.unwrap_err(), Error::Duplicate("float".to_owned()));
        assert_eq!(registry.len(), count);

        let after = registry.get(names::FLOAT).unwrap();
        assert_eq!(before, after);
        assert_eq!(after.basetype(), BaseType::Float);
    }

    #[test]
    fn unknown() {
        let registry = TypeRegistry::initialize();

        assert_eq!(
            registry.get("quaternion").unwrap_err(),
            Error::Unknown("quaternion".to_owned())
        );
    }

    #[test]
    fn identity_not_structure() {
        let mut first = TypeRegistry::new();
        let mut second = TypeRegistry::new();

        let a = first
            .register("float", BaseType::Float, Semantic::Default, 1)
            .unwrap();
        let b = second
            .register("float", BaseType::Float, Semantic::Default, 1)
            .unwrap();

        assert_ne!(a, b);
        assert_eq!(a, first.get("float").unwrap());
    }

    #[test]
    fn structs() {
        let mut registry = TypeRegistry::initialize();
        let float = registry.get(names::FLOAT).unwrap();
        let color3 = registry.get(names::COLOR3).unwrap();

        let layer = registry
            .register_struct(
                "layer",
                vec![("weight".to_owned(), float), ("tint".to_owned(), color3)],
            )
            .unwrap();

        assert_eq!(layer.basetype(), BaseType::Struct);
        assert_eq!(layer.size(), 4);
        assert_eq!(layer.members()[1].0, "tint");
        assert_eq!(registry.iter().last(), Some(&layer));
    }
}
