use crate::{progress::ProgressReceiver, ArtifactKind, JobId, Result, RunId, RunSignal};
use std::{collections::HashMap, fmt, sync::Arc};

pub type GenerateResponse = Result<ProgressReceiver>;

#[derive(Clone, Debug)]
pub struct GenerationContext {
  pub job_id: JobId,
  pub run_id: RunId,
  pub kind: ArtifactKind,
  /// Raised when the orchestrator gives up on this artifact (cancel or timeout).
  pub signal: RunSignal,
}

/// # ArtifactGenerator
/// Produces one kind of artifact for a job. Rendering happens here; the
/// orchestrator only sees progress and the final result.
///
/// `generate` should hand back a [`ProgressReceiver`] quickly and do the work
/// on a separate task, reporting through the matching
/// [`ProgressSender`](crate::ProgressSender). Returning `Err` fails the artifact
/// without any progress.
///
/// ## Example
///
/// ```rust
/// struct ReportGenerator;
///
/// #[docstream::async_trait]
/// impl docstream::ArtifactGenerator for ReportGenerator {
///   async fn generate(&self, ctx: docstream::GenerationContext) -> docstream::GenerateResponse {
///     let (tx, rx) = docstream::progress_channel(docstream::DEFAULT_PROGRESS_CAPACITY);
///
///     tokio::task::spawn(async move {
///       let _ = tx.progress(50, "Rendering pages").await;
///       let _ = tx.succeeded(format!("reports/{}.pdf", ctx.job_id)).await;
///     });
///
///     Ok(rx)
///   }
/// }
/// ```
#[async_trait::async_trait]
pub trait ArtifactGenerator: Send + Sync {
  async fn generate(&self, ctx: GenerationContext) -> GenerateResponse;
}

/// Lookup table from artifact kind to the generator that produces it.
#[derive(Clone, Default)]
pub struct Generators {
  generators: HashMap<ArtifactKind, Arc<dyn ArtifactGenerator>>,
}

impl Generators {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register<T>(&mut self, kind: ArtifactKind, generator: T)
  where
    T: ArtifactGenerator + 'static,
  {
    self.generators.insert(kind, Arc::new(generator));
  }

  pub fn with<T>(mut self, kind: ArtifactKind, generator: T) -> Self
  where
    T: ArtifactGenerator + 'static,
  {
    self.register(kind, generator);
    self
  }

  pub fn get(&self, kind: ArtifactKind) -> Option<Arc<dyn ArtifactGenerator>> {
    self.generators.get(&kind).cloned()
  }

  pub fn contains(&self, kind: ArtifactKind) -> bool {
    self.generators.contains_key(&kind)
  }

  pub fn len(&self) -> usize {
    self.generators.len()
  }

  pub fn is_empty(&self) -> bool {
    self.generators.is_empty()
  }
}

impl fmt::Debug for Generators {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Generators")
      .field("kinds", &self.generators.keys().collect::<Vec<_>>())
      .finish()
  }
}
