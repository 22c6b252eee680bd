use super::Orchestrator;
use crate::{ArtifactGenerator, ArtifactKind, GenerationConfig, Generators, Result};
use std::sync::Arc;

pub struct OrchestratorBuilder {
  config: Option<GenerationConfig>,
  generators: Generators,
}

impl OrchestratorBuilder {
  pub fn new() -> Self {
    OrchestratorBuilder {
      config: None,
      generators: Generators::new(),
    }
  }

  pub fn config(mut self, config: GenerationConfig) -> Self {
    self.config = Some(config);
    self
  }

  pub fn generator<T>(mut self, kind: ArtifactKind, generator: T) -> Self
  where
    T: ArtifactGenerator + 'static,
  {
    self.generators.register(kind, generator);
    self
  }

  pub fn generators(mut self, generators: Generators) -> Self {
    self.generators = generators;
    self
  }

  /// Fails when a configured kind has no generator.
  pub fn build(self) -> Result<Orchestrator> {
    let config = self.config.unwrap_or_default();
    let orchestrator = Orchestrator {
      config: Arc::new(config),
      generators: self.generators,
    };

    orchestrator.check_generators(&orchestrator.config.kinds())?;

    Ok(orchestrator)
  }
}

impl Default for OrchestratorBuilder {
  fn default() -> Self {
    Self::new()
  }
}
