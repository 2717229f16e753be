#![warn(missing_docs)]

//! Shader generation library. Compiles target-independent material node graphs into source code
//! for a given shading language and target.
//!
//! The usual flow is:
//! 1. initialize a [TypeRegistry](types::TypeRegistry) once and share it,
//! 2. create a [ShaderGenerator](generator::ShaderGenerator) for a backend,
//! 3. call [generate](generator::ShaderGenerator::generate) with a frozen snapshot of the
//!    material graph and an implementation catalog such as [shaderlib::library].

pub mod color_management;
pub mod context;
pub mod document;
pub mod error;
pub mod generator;
pub mod implementation;
pub mod shader;
pub mod shaderlib;
pub mod syntax;
pub mod types;
pub mod util;
pub mod value;

pub use error::{Error, Result};

macro_rules! states {
    {$($(#[$attr:meta])* $state:ident),+ $(,)?} => {
        $(
            #[derive(Clone, Debug, Default)]
            $(#[$attr])*
            pub struct $state;
        )+
    };
}

states! {
    /// The shader graph has been built and validated.
    GraphBuilt,
    /// Stages and their interface blocks exist, nothing has been emitted yet.
    StagesCreated,
    /// Every stage has been emitted; the session can only be finalized.
    Done,
}

/// Commonly used items.
pub mod prelude {
    pub use crate::{
        color_management::{ColorManagementSystem, DefaultColorManagementSystem},
        context::{GenContext, GenOptions, ShaderInterface},
        document::{
            Connection, ImplementationCatalog, InputGraph, Library, MemoryLoader, NodeDef,
            NodeGraph, PortDef, ResourceLoader,
        },
        generator::{glsl::GlslBackend, osl::OslBackend, Backend, ShaderGenerator},
        shader::{shader::Shader, stage::ShaderStage},
        types::{names, TypeRegistry},
        Error, Result,
    };
}
