//! Intermediate representation of a shader: the validated [graph](graph::ShaderGraph), the
//! [stages](stage::ShaderStage) it is emitted into, and the resulting [shader](shader::Shader).

pub mod graph;
pub mod node;
pub mod shader;
pub mod stage;
