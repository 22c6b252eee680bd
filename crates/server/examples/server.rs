use docstream::{
  async_trait, progress_channel, ArtifactGenerator, ArtifactKind, GenerateResponse,
  GenerationContext, Orchestrator, DEFAULT_PROGRESS_CAPACITY,
};
use docstream_server::{DocstreamServer, ServerConfig};
use std::time::Duration;

/// Pretends to render an artifact in ten steps.
struct SimulatedGenerator {
  step: Duration,
}

#[async_trait]
impl ArtifactGenerator for SimulatedGenerator {
  async fn generate(&self, ctx: GenerationContext) -> GenerateResponse {
    let (tx, rx) = progress_channel(DEFAULT_PROGRESS_CAPACITY);
    let step = self.step;

    tokio::spawn(async move {
      for progress in (10..100).step_by(10) {
        tokio::select! {
          _ = tokio::time::sleep(step) => {}
          signal = ctx.signal.recv() => {
            log::info!("Stopping {} of job {} on {}", ctx.kind, ctx.job_id, signal);
            return Ok(());
          }
        }
        tx.progress(progress, format!("Rendering {}", ctx.kind)).await?;
      }

      tx.succeeded(format!("{}/{}", ctx.job_id, ctx.kind)).await
    });

    Ok(rx)
  }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  dotenv::dotenv().ok();
  docstream_logger::init_logger();

  let config = ServerConfig::from_env()?;

  let mut builder = Orchestrator::builder().config(config.generation.clone());
  for kind in ArtifactKind::ALL {
    builder = builder.generator(
      kind,
      SimulatedGenerator {
        step: Duration::from_millis(300),
      },
    );
  }
  let orchestrator = builder.build()?;

  // Try it with:
  //   curl -N -X POST http://127.0.0.1:5338/jobs/claim-1/generate
  DocstreamServer::new(orchestrator).serve(&config.addr).await?;

  Ok(())
}
