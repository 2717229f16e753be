//! Shader generators: a per-target [Backend] driven through a typestate [Session].
//!
//! A [ShaderGenerator] is the idle state. Each call to [session](ShaderGenerator::session) builds
//! a graph and walks it through [GraphBuilt] → [StagesCreated] → [Done], after which the session
//! is [finalized](Session::finalize) into an immutable [Shader].

pub mod emit;
pub mod glsl;
pub mod osl;

use std::{collections::HashMap, marker::PhantomData, sync::Arc};

use log::debug;

use crate::{
    color_management::ColorManagementSystem,
    context::{GenContext, GenOptions},
    document::{EnumMapping, ImplementationCatalog, InputGraph, ResourceLoader},
    implementation::NodeImplementation,
    shader::{
        graph::ShaderGraph,
        shader::Shader,
        stage::{Brackets, ShaderStage},
    },
    syntax::Syntax,
    types::{TypeRef, TypeRegistry},
    value::Value,
    Done, GraphBuilt, Result, StagesCreated,
};

/// Capabilities of one shading language and target pair.
///
/// Default methods delegate to the helpers of [emit], which overriding backends may call too.
pub trait Backend: Send + Sync {
    /// Language key, used as fallback when looking up implementations.
    fn language(&self) -> &str;

    /// Target key, e.g. `genglsl` or `essl`.
    fn target(&self) -> &str;

    #[allow(missing_docs)]
    fn syntax(&self) -> &Syntax;

    /// Names of the stages to emit, in order.
    fn stages(&self) -> &[&'static str];

    /// `$token` substitutions applied to source templates.
    fn tokens(&self) -> &HashMap<String, String>;

    /// Built-in implementation of a definition, taking precedence over the catalog.
    fn custom_implementation(&self, _nodedef: &str) -> Option<Box<dyn NodeImplementation>> {
        None
    }

    /// Replace an enumerated value the target cannot express. `None` keeps the value as is.
    fn remap_enumeration(
        &self,
        _value: &str,
        _mapping: &EnumMapping,
        _ty: &TypeRef,
        _registry: &TypeRegistry,
    ) -> Result<Option<(TypeRef, Value)>> {
        Ok(None)
    }

    /// Create the interface blocks of every stage.
    fn create_variables(
        &self,
        graph: &ShaderGraph,
        ctx: &mut GenContext,
        stages: &mut [ShaderStage],
    ) -> Result<()> {
        emit::create_variables(graph, ctx, stages)
    }

    /// Emit the complete source of one stage.
    fn emit_stage(
        &self,
        graph: &ShaderGraph,
        ctx: &mut GenContext,
        stage: &mut ShaderStage,
    ) -> Result<()>;

    #[allow(missing_docs)]
    fn emit_scope_begin(&self, stage: &mut ShaderStage, brackets: Brackets) {
        stage.begin_scope(brackets);
    }

    #[allow(missing_docs)]
    fn emit_scope_end(&self, stage: &mut ShaderStage, semicolon: bool, newline: bool) -> Result<()> {
        Ok(stage.end_scope(semicolon, newline)?)
    }
}

/// Generator for one backend. Sessions borrow it; distinct sessions may run in parallel.
pub struct ShaderGenerator<B: Backend> {
    backend: B,
    registry: Arc<TypeRegistry>,
    overrides: HashMap<String, Box<dyn NodeImplementation>>,
    color_management: Option<Box<dyn ColorManagementSystem>>,
}

impl<B: Backend> ShaderGenerator<B> {
    #[allow(missing_docs)]
    pub fn new(backend: B, registry: Arc<TypeRegistry>) -> Self {
        Self {
            backend,
            registry,
            overrides: HashMap::new(),
            color_management: None,
        }
    }

    #[allow(missing_docs)]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[allow(missing_docs)]
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Use `implementation` for every node of definition `nodedef`, whatever the catalog says.
    pub fn register_implementation(
        &mut self,
        nodedef: &str,
        implementation: Box<dyn NodeImplementation>,
    ) -> &mut Self {
        self.overrides.insert(nodedef.to_owned(), implementation);
        self
    }

    /// Convert color literals authored in another color space than
    /// [GenOptions::target_color_space] through `system`. `None` turns conversions off.
    pub fn set_color_management_system(
        &mut self,
        system: Option<Box<dyn ColorManagementSystem>>,
    ) -> &mut Self {
        self.color_management = system;
        self
    }

    #[allow(missing_docs)]
    pub fn color_management_system(&self) -> Option<&dyn ColorManagementSystem> {
        self.color_management.as_deref()
    }

    /// Fresh context for one session.
    pub fn context<'a>(
        &'a self,
        catalog: &'a dyn ImplementationCatalog,
        loader: &'a dyn ResourceLoader,
        options: GenOptions,
    ) -> GenContext<'a> {
        GenContext::new(
            &self.backend,
            &self.registry,
            catalog,
            loader,
            &self.overrides,
            options,
        )
        .with_color_management(self.color_management_system())
    }

    /// Start a session by building the shader graph of `source`.
    pub fn session<'a>(
        &'a self,
        name: &str,
        source: &dyn InputGraph,
        mut ctx: GenContext<'a>,
    ) -> Result<Session<'a, GraphBuilt>> {
        debug!(
            "Starting session `{name}` for `{}` ({} interface)",
            self.backend.target(),
            ctx.options().shader_interface
        );

        let graph = ShaderGraph::build(source, &mut ctx)?;

        Ok(Session {
            ctx,
            name: name.to_owned(),
            graph,
            stages: Vec::new(),
            state: PhantomData,
        })
    }

    /// Run a whole session.
    ///
    /// # Example
    /// ```
    /// use std::sync::Arc;
    /// use shadergen::{bind, graph, node, prelude::*, shaderlib};
    ///
    /// let generator = ShaderGenerator::new(GlslBackend::new(), Arc::new(TypeRegistry::initialize()));
    /// let material = graph! {
    ///     "NG_material",
    ///     nodes:
    ///         "add": node! {
    ///             "add" -> "float",
    ///             inputs:
    ///                 "in1": bind!(value "1.0"),
    ///                 "in2": bind!(value "2.0"),
    ///         },
    ///     outputs:
    ///         "out": "float" = bind!(node "add"),
    /// };
    ///
    /// let shader = generator
    ///     .generate("material", &material, &shaderlib::library(), &MemoryLoader::new(), GenOptions::default())
    ///     .unwrap();
    ///
    /// assert!(shader.source_code("pixel").unwrap().contains("mx_add_float(1.0, 2.0, add_out);"));
    /// ```
    pub fn generate(
        &self,
        name: &str,
        source: &dyn InputGraph,
        catalog: &dyn ImplementationCatalog,
        loader: &dyn ResourceLoader,
        options: GenOptions,
    ) -> Result<Shader> {
        let ctx = self.context(catalog, loader, options);
        Ok(self
            .session(name, source, ctx)?
            .create_stages()?
            .emit()?
            .finalize())
    }
}

/// One generation call, in state `State`.
pub struct Session<'a, State> {
    ctx: GenContext<'a>,
    name: String,
    graph: ShaderGraph,
    stages: Vec<ShaderStage>,
    state: PhantomData<State>,
}

impl<'a, State> Session<'a, State> {
    #[allow(missing_docs)]
    pub fn graph(&self) -> &ShaderGraph {
        &self.graph
    }

    #[allow(missing_docs)]
    pub fn context(&self) -> &GenContext<'a> {
        &self.ctx
    }

    /// Stages created so far.
    pub fn stages(&self) -> &[ShaderStage] {
        &self.stages
    }
}

impl<'a> Session<'a, GraphBuilt> {
    /// Create the backend's stages and their interface blocks.
    pub fn create_stages(mut self) -> Result<Session<'a, StagesCreated>> {
        let backend = self.ctx.backend();
        let comment = self.ctx.syntax().comment();

        let mut stages: Vec<ShaderStage> = backend
            .stages()
            .iter()
            .map(|name| ShaderStage::new(name, comment))
            .collect();
        backend.create_variables(&self.graph, &mut self.ctx, &mut stages)?;

        debug!("Session `{}` created {} stage(s)", self.name, stages.len());

        Ok(Session {
            ctx: self.ctx,
            name: self.name,
            graph: self.graph,
            stages,
            state: PhantomData,
        })
    }
}

impl<'a> Session<'a, StagesCreated> {
    /// Emit every stage. Fails if any stage is left with open scopes.
    pub fn emit(mut self) -> Result<Session<'a, Done>> {
        let backend = self.ctx.backend();

        for stage in self.stages.iter_mut() {
            debug!("Emitting stage `{}` of `{}`", stage.name(), self.name);
            backend.emit_stage(&self.graph, &mut self.ctx, stage)?;
            stage.finalize()?;
        }

        Ok(Session {
            ctx: self.ctx,
            name: self.name,
            graph: self.graph,
            stages: self.stages,
            state: PhantomData,
        })
    }
}

impl Session<'_, Done> {
    /// Produce the immutable result.
    pub fn finalize(self) -> Shader {
        debug!("Session `{}` done", self.name);
        Shader::new(&self.name, self.stages)
    }
}
