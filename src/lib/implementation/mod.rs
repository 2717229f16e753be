//! Strategies producing code for node definitions.
//!
//! An implementation is resolved once per definition and session, then shared by every node
//! using that definition; see [GenContext::implementation](crate::context::GenContext::implementation).

pub mod compound;
pub mod geometry;
pub mod source_code;
pub mod template;

use std::fmt::Debug;

use dyn_clone::DynClone;

use crate::{
    context::GenContext,
    shader::{graph::ShaderGraph, node::ShaderNode, stage::ShaderStage},
    Result,
};

/// Code generation hooks of a node definition for one target.
///
/// Hosts may register their own implementations on a
/// [ShaderGenerator](crate::generator::ShaderGenerator); they are cloned into each session.
pub trait NodeImplementation: DynClone + Debug + Send + Sync {
    /// Unique implementation name.
    fn name(&self) -> &str;

    /// Body of graph-based implementations.
    fn graph(&self) -> Option<&ShaderGraph> {
        None
    }

    /// Add the interface variables the node needs to any of the stages.
    fn create_variables(
        &self,
        _node: &ShaderNode,
        _ctx: &mut GenContext,
        _stages: &mut [ShaderStage],
    ) -> Result<()> {
        Ok(())
    }

    /// Emit whatever must precede the first call, at most once per stage.
    fn emit_function_definition(
        &self,
        _node: &ShaderNode,
        _ctx: &mut GenContext,
        _stage: &mut ShaderStage,
    ) -> Result<()> {
        Ok(())
    }

    /// Emit the code computing the node's outputs into `stage`.
    fn emit_function_call(
        &self,
        node: &ShaderNode,
        graph: &ShaderGraph,
        ctx: &mut GenContext,
        stage: &mut ShaderStage,
    ) -> Result<()>;
}

dyn_clone::clone_trait_object!(NodeImplementation);
