use docstream::{Error, GenerationConfig, Result};
use std::env;

pub const DEFAULT_ADDR: &str = "127.0.0.1:5338";

/// Server settings read from the environment.
///
/// `DOCSTREAM_ADDR` sets the listen address. `DOCSTREAM_CONFIG` points to a
/// YAML generation config; without it the default artifact set is used.
#[derive(Debug, Clone)]
pub struct ServerConfig {
  pub addr: String,
  pub generation: GenerationConfig,
}

impl ServerConfig {
  pub fn from_env() -> Result<Self> {
    let addr = env::var("DOCSTREAM_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());

    let generation = match env::var("DOCSTREAM_CONFIG") {
      Ok(path) => Self::load_generation(&path)?,
      Err(_) => GenerationConfig::default(),
    };

    Ok(ServerConfig { addr, generation })
  }

  fn load_generation(path: &str) -> Result<GenerationConfig> {
    let content = std::fs::read_to_string(path).map_err(|err| {
      Error::config_error(format!("Failed to read config file {}: {}", path, err))
    })?;

    GenerationConfig::try_from(content)
  }
}

impl Default for ServerConfig {
  fn default() -> Self {
    ServerConfig {
      addr: DEFAULT_ADDR.to_string(),
      generation: GenerationConfig::default(),
    }
  }
}
