//! Final product of a generation session.

use super::stage::ShaderStage;

#[derive(Clone, Debug)]
/// Immutable set of generated stages.
pub struct Shader {
    name: String,
    stages: Vec<ShaderStage>,
}

impl Shader {
    pub(crate) fn new(name: &str, stages: Vec<ShaderStage>) -> Self {
        Self {
            name: name.to_owned(),
            stages,
        }
    }

    #[allow(missing_docs)]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[allow(missing_docs)]
    pub fn stage(&self, name: &str) -> Option<&ShaderStage> {
        self.stages.iter().find(|stage| stage.name() == name)
    }

    /// Stages in emission order.
    pub fn stages(&self) -> impl Iterator<Item = &ShaderStage> {
        self.stages.iter()
    }

    /// Source code of a stage.
    pub fn source_code(&self, stage: &str) -> Option<&str> {
        self.stage(stage).map(ShaderStage::code)
    }
}
